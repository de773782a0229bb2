//! Authentication handlers

use axum::extract::{Extension, Form, Json};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::extractors::AuthedUser;
use super::models::{Claims, CredentialsPayload, LoginResponse, SignupResponse, User};
use crate::common::{
    generate_user_id, safe_token_log, safe_username_log, ApiError, AppState, Validator,
};

/// POST /signup
/// Creates an account from form fields `username` and `password`
///
/// # Response
/// ```json
/// {
///   "success": true,
///   "message": "Account created successfully!"
/// }
/// ```
///
/// Failures keep the same shape with `success: false`. Storage errors are
/// logged server-side; only fixed messages reach the client.
pub async fn signup(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Form(payload): Form<CredentialsPayload>,
) -> Json<SignupResponse> {
    let state = state_lock.read().await.clone();

    let validation = payload.validate(&payload);
    if !validation.is_valid {
        return Json(SignupResponse {
            success: false,
            message: validation.message(),
        });
    }

    let hashed = match bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "password hashing failed during signup");
            return Json(SignupResponse {
                success: false,
                message: "Could not create account".to_string(),
            });
        }
    };

    let id = generate_user_id();

    match sqlx::query(
        "INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, datetime('now'))",
    )
    .bind(&id)
    .bind(&payload.username)
    .bind(&hashed)
    .execute(&state.db)
    .await
    {
        Ok(_) => {
            info!(
                user_id = %id,
                username = %safe_username_log(&payload.username),
                "account created"
            );
            Json(SignupResponse {
                success: true,
                message: "Account created successfully!".to_string(),
            })
        }
        Err(e) if e
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation()) =>
        {
            warn!(
                username = %safe_username_log(&payload.username),
                "signup rejected: username already taken"
            );
            Json(SignupResponse {
                success: false,
                message: "Username is already taken".to_string(),
            })
        }
        Err(e) => {
            error!(error = %e, "database error inserting account during signup");
            Json(SignupResponse {
                success: false,
                message: "Could not create account".to_string(),
            })
        }
    }
}

/// POST /login
/// Verifies credentials and issues a signed bearer token
///
/// # Response
/// ```json
/// {
///   "success": true,
///   "user_id": "U_K7NP3X",
///   "token": "<jwt token>"
/// }
/// ```
pub async fn login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Form(payload): Form<CredentialsPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    let state = state_lock.read().await.clone();

    let user: Option<User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(&payload.username)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            error!(error = %e, "database error during login lookup");
            ApiError::DatabaseError(e)
        })?;

    let user = match user {
        Some(u) => u,
        None => {
            warn!(
                username = %safe_username_log(&payload.username),
                "login failed: unknown username"
            );
            return Err(ApiError::NotFound("user not found".to_string()));
        }
    };

    let verified = bcrypt::verify(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = %user.id, "password verification error");
        ApiError::InternalServer("credential check failed".to_string())
    })?;

    if !verified {
        warn!(user_id = %user.id, "login failed: invalid password");
        return Err(ApiError::Unauthorized("invalid credentials".to_string()));
    }

    let token = issue_token(&user.id, &state.jwt_secret, state.token_ttl_hours)?;

    info!(user_id = %user.id, "login successful");

    Ok(Json(LoginResponse {
        success: true,
        user_id: user.id,
        token,
    }))
}

/// GET /api/me
/// Returns the current authenticated account
pub async fn me_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&authed.id)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(Json(serde_json::json!({ "user": user })))
}

// ---- Helper Functions ----

/// Issue a signed bearer token binding the account id
pub fn issue_token(user_id: &str, secret: &str, ttl_hours: i64) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(ttl_hours)).timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!(error = %e, user_id = %user_id, "JWT encoding error");
        ApiError::InternalServer("token issuance failed".to_string())
    })
}

/// Resolve a bearer token to its account id
///
/// Malformed, badly signed or expired tokens yield `None`; callers treat
/// that as unauthenticated, never as a crash.
pub fn decode_token(token: &str, secret: &str) -> Option<String> {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    ) {
        Ok(data) => Some(data.claims.sub),
        Err(e) => {
            warn!(
                error = %e,
                token = %safe_token_log(token),
                "token resolution failed"
            );
            None
        }
    }
}
