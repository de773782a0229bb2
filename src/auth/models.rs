//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// Account database model
///
/// The password hash never leaves the server; it is skipped on serialization.
#[derive(FromRow, Serialize, Debug)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: Option<String>,
}

/// Form payload shared by signup and login
#[derive(Deserialize, Debug)]
pub struct CredentialsPayload {
    pub username: String,
    pub password: String,
}

/// Response body for POST /signup
#[derive(Serialize, Deserialize, Debug)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
}

/// Response body for POST /login
#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub user_id: String,
    pub token: String,
}
