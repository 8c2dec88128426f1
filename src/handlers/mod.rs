pub mod auth;
pub mod auth_otp;
pub mod cart;
pub mod courses;
pub mod invoices;
pub mod learners;
pub mod payment;
pub mod report;
pub mod reviews;
pub mod tracks;
pub mod upload;
