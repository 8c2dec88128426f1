pub mod auth_dtos;
