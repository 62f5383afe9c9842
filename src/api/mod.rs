//! API module - request/response models and HTTP routes

pub mod models;
pub mod routes;
