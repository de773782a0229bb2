//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Username/password signup and login
//! - Password hashing and verification
//! - JWT token issuance and validation
//! - AuthedUser extractor for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod validators;


pub use extractors::AuthedUser;
pub use handlers::{decode_token, issue_token};
pub use routes::auth_routes;
