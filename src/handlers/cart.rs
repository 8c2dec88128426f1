use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use mongodb::bson::doc;
use mongodb::Collection;
use serde::Deserialize;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::handlers::auth::load_user;
use crate::models::cart::{Cart, CartItem, CartResponse, ItemType};
use crate::models::course::Course;
use crate::models::track::{PublishStatus, Track};
use crate::models::user::{Claims, User};
use crate::models::parse_object_id;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItem {
    #[validate(length(min = 1, message = "Item id is required"))]
    pub item_id: String,
    pub item_type: ItemType,
}

fn carts(state: &AppState) -> Collection<Cart> {
    state.db.collection("carts")
}

pub(crate) async fn load_cart(state: &AppState, user_id: &str) -> Result<Cart> {
    Ok(carts(state)
        .find_one(doc! { "_id": user_id })
        .await?
        .unwrap_or_else(|| Cart::empty(user_id)))
}

async fn save_cart(state: &AppState, cart: &Cart) -> Result<()> {
    carts(state)
        .replace_one(doc! { "_id": &cart.user_id }, cart)
        .upsert(true)
        .await?;
    Ok(())
}

impl From<&CartItem> for AddCartItem {
    fn from(item: &CartItem) -> Self {
        AddCartItem {
            item_id: item.item_id.clone(),
            item_type: item.item_type,
        }
    }
}

/// What the catalogue says an item costs.
struct CatalogueEntry {
    title: String,
    price: f64,
    status: PublishStatus,
}

fn item_label(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Track => "Track",
        ItemType::Course => "Course",
    }
}

fn already_enrolled(user: &User, item: &AddCartItem) -> bool {
    let owned = match item.item_type {
        ItemType::Track => &user.enrolled_tracks,
        ItemType::Course => &user.enrolled_courses,
    };
    owned.iter().any(|id| id == &item.item_id)
}

fn priced_item(item: &AddCartItem, entry: CatalogueEntry) -> Result<CartItem> {
    if entry.status != PublishStatus::Published {
        return Err(AppError::invalid_data(format!(
            "{} is not available for purchase",
            item_label(item.item_type)
        )));
    }

    Ok(CartItem {
        item_id: item.item_id.clone(),
        item_type: item.item_type,
        title: entry.title,
        price: entry.price,
    })
}

async fn catalogue_entry(state: &AppState, item: &AddCartItem) -> Result<CatalogueEntry> {
    let what = item_label(item.item_type);
    let id = parse_object_id(&item.item_id, what)?;

    let entry = match item.item_type {
        ItemType::Track => {
            let tracks: Collection<Track> = state.db.collection("tracks");
            tracks.find_one(doc! { "_id": id }).await?.map(|track| CatalogueEntry {
                title: track.title,
                price: track.price,
                status: track.status,
            })
        }
        ItemType::Course => {
            let courses: Collection<Course> = state.db.collection("courses");
            courses.find_one(doc! { "_id": id }).await?.map(|course| CatalogueEntry {
                title: course.title,
                price: course.price,
                status: course.status,
            })
        }
    };

    entry.ok_or_else(|| AppError::not_found(what))
}

/// Title and price always come from the catalogue, never from the client.
pub(crate) async fn resolve_item(state: &AppState, item: &AddCartItem) -> Result<CartItem> {
    let entry = catalogue_entry(state, item).await?;
    priced_item(item, entry)
}

/// Re-prices checkout items from the catalogue. Only ids and kinds are taken
/// from `requested`; owned items are rejected and repeats collapse to one.
pub(crate) async fn price_checkout(
    state: &AppState,
    user: &User,
    requested: &[CartItem],
) -> Result<Vec<CartItem>> {
    let mut priced = Cart::empty(user.id.map(|id| id.to_hex()).unwrap_or_default());

    for item in requested.iter().map(AddCartItem::from) {
        if already_enrolled(user, &item) {
            return Err(AppError::DuplicateKey(format!(
                "Already enrolled in {} {}",
                item_label(item.item_type).to_lowercase(),
                item.item_id
            )));
        }
        priced.add_item(resolve_item(state, &item).await?);
    }

    Ok(priced.items)
}

pub async fn get_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<CartResponse>> {
    Ok(Json(load_cart(&state, &claims.sub).await?.into()))
}

pub async fn add_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddCartItem>,
) -> Result<Json<CartResponse>> {
    payload.validate()?;

    let user = load_user(&state, &claims.sub).await?;
    if already_enrolled(&user, &payload) {
        return Err(AppError::DuplicateKey("Already enrolled in this item".to_string()));
    }

    let item = resolve_item(&state, &payload).await?;
    let mut cart = load_cart(&state, &claims.sub).await?;
    if !cart.add_item(item) {
        return Err(AppError::DuplicateKey("Item is already in the cart".to_string()));
    }

    save_cart(&state, &cart).await?;
    tracing::debug!("Cart for {} now has {} items", claims.sub, cart.items.len());
    Ok(Json(cart.into()))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(item_id): Path<String>,
) -> Result<Json<CartResponse>> {
    let mut cart = load_cart(&state, &claims.sub).await?;
    if !cart.remove_item(&item_id) {
        return Err(AppError::not_found("Cart item"));
    }

    save_cart(&state, &cart).await?;
    Ok(Json(cart.into()))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<CartResponse>> {
    carts(&state).delete_one(doc! { "_id": &claims.sub }).await?;
    Ok(Json(Cart::empty(claims.sub).into()))
}
