// src/predictions/routes.rs

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

pub fn predictions_routes() -> Router {
    Router::new()
        // Prediction pipeline
        .route("/predict", post(handlers::predict))
        // Per-user history ledger
        .route("/history/:user_id", get(handlers::history))
        // File serving for stored images and speech clips
        .route("/uploads/*path", get(handlers::serve_upload))
}
