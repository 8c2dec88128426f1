pub mod cloudinary;
pub mod mail_service;
pub mod otp_service;
pub mod payment_service;
pub mod paystack_service;
