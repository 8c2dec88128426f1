use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod database;
mod dtos;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use config::AppConfig;
use database::connection::get_db_client;
use database::payment_repo::MongoPaymentRepo;
use services::cloudinary::CloudinaryService;
use services::mail_service::MailService;
use services::payment_service::PaymentService;
use services::paystack_service::PaystackService;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("🌐 Environment: {}", config.app_env);

    let db = get_db_client(&config).await?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let app_state = initialize_app_state(db, config)?;
    let app = build_router(app_state);

    tracing::info!("🚀 Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn initialize_app_state(db: mongodb::Database, config: AppConfig) -> anyhow::Result<AppState> {
    let paystack = config.paystack.clone();
    let mail = config.mail.clone();
    let cloudinary = config.cloudinary.clone();

    let mut app_state = AppState::new(db.clone(), config);

    match paystack {
        Some(paystack_config) => {
            let currency = paystack_config.currency.clone();
            let gateway = Arc::new(PaystackService::new(paystack_config)?);
            let repo = Arc::new(MongoPaymentRepo::new(db));
            app_state = app_state.with_payments(Arc::new(PaymentService::new(gateway, repo, currency)));
            tracing::info!("✅ Paystack payments enabled");
        }
        None => tracing::warn!("PAYSTACK_SECRET_KEY not set, payment endpoints will return 503"),
    }

    match mail {
        Some(mail_config) => {
            app_state = app_state.with_mail(MailService::new(mail_config));
            tracing::info!("✅ Mail service enabled");
        }
        None => tracing::warn!("Mail API not configured, OTP emails are disabled"),
    }

    match cloudinary {
        Some(cloudinary_config) => {
            app_state = app_state.with_cloudinary(CloudinaryService::new(cloudinary_config));
            tracing::info!("✅ Cloudinary uploads enabled");
        }
        None => tracing::warn!("Cloudinary not configured, image uploads are disabled"),
    }

    Ok(app_state)
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    let state = &app_state;

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api/auth", routes::auth::routes(state))
        .nest("/api/tracks", routes::tracks::routes(state))
        .nest("/api/courses", routes::courses::routes(state))
        .nest("/api/invoices", routes::invoices::routes(state))
        .nest("/api/learners", routes::learners::routes(state))
        .nest("/api/report", routes::report::routes(state))
        .nest("/api/cart", routes::cart::routes(state))
        .nest("/api/payment", routes::payment::routes(state))
        .nest("/api/reviews", routes::reviews::routes(state))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "CourseStack API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! {"ping": 1}).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "payments": state.payment_service.is_some(),
        "mail": state.mail_service.is_some(),
        "uploads": state.cloudinary.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
