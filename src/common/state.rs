// Application state shared across all modules

use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::services::{Classifier, Narrator};

/// Application state containing database pool, services, and configuration
///
/// The classifier and narrator are held as trait objects so tests can swap in
/// fakes without touching the handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub uploads_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub classifier: Arc<dyn Classifier>,
    pub narrator: Arc<dyn Narrator>,
}
