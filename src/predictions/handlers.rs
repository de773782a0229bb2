// src/predictions/handlers.rs

use axum::{
    extract::{Extension, Json, Multipart, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use infer::Infer;
use std::sync::Arc;
use tokio::fs as tokio_fs;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::models::{HistoryQuery, HistoryResponse, PredictResponse, PredictionRecord};
use crate::auth::{decode_token, AuthedUser};
use crate::common::{
    generate_prediction_id, generate_raw_id, safe_username_log, ApiError, AppState,
};
use crate::services::advice::advice_for;
use crate::services::classifier;

// File size limit: 10MB
const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// POST /predict - Upload a leaf photo, classify it, return advice plus audio
///
/// Requires the same bearer-token authorization as the history endpoint; the
/// prediction is attributed to the authenticated account. A `user_id` form
/// field is accepted for wire compatibility but must match the token.
pub async fn predict(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let state = state_lock.read().await.clone();

    info!(
        user_id = %authed.id,
        username = %safe_username_log(&authed.username),
        "prediction upload initiated"
    );

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut claimed_user_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .ok_or_else(|| ApiError::BadRequest("No filename provided".to_string()))?
                    .to_string();

                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::BadRequest("Failed to read file data".to_string()))?;

                if data.len() > MAX_FILE_SIZE {
                    return Err(ApiError::BadRequest(
                        "File size exceeds 10MB limit".to_string(),
                    ));
                }

                file = Some((filename, data.to_vec()));
            }
            Some("user_id") => {
                claimed_user_id = field.text().await.ok().filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| ApiError::BadRequest("No file found in request".to_string()))?;

    // Never trust a client-supplied account id over the token
    if let Some(claimed) = claimed_user_id {
        if claimed != authed.id {
            warn!(
                user_id = %authed.id,
                claimed = %claimed,
                "predict rejected: user_id field does not match token"
            );
            return Err(ApiError::Forbidden(
                "user_id does not match token".to_string(),
            ));
        }
    }

    let response = run_prediction(&state, &authed.id, &filename, &data).await?;
    Ok(Json(response))
}

/// The upload -> classify -> advise -> narrate -> record pipeline
///
/// Strictly sequential, no retries. Any failure after the image is persisted
/// removes the artifacts written so far before the error is returned, so a
/// failed request leaves neither files nor a ledger row behind.
pub async fn run_prediction(
    state: &AppState,
    user_id: &str,
    original_filename: &str,
    data: &[u8],
) -> Result<PredictResponse, ApiError> {
    let account: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;
    if account.is_none() {
        return Err(ApiError::NotFound("user not found".to_string()));
    }

    // Reject payloads that are not recognizably images before anything is stored
    if !is_valid_image_type(data) {
        warn!(
            user_id = %user_id,
            filename = %original_filename,
            "upload rejected: not a supported image type"
        );
        return Err(ApiError::DecodeError(
            "unsupported or corrupt image".to_string(),
        ));
    }

    // 1. Persist the upload under a server-chosen name
    let stem = format!("leaf_{}_{}", user_id, generate_raw_id(8));
    let extension = get_extension_from_filename(original_filename).unwrap_or("jpg");
    let stored_name = format!("{}.{}", stem, extension);
    let image_path = state.uploads_dir.join(&stored_name);

    tokio_fs::write(&image_path, data).await.map_err(|e| {
        error!(error = %e, path = %image_path.display(), "failed to persist uploaded image");
        ApiError::StorageError("failed to store uploaded image".to_string())
    })?;

    // 2. Decode, resize and normalize into a single-sample batch
    let batch = match classifier::preprocess(data) {
        Ok(batch) => batch,
        Err(e) => {
            warn!(error = %e, filename = %original_filename, "uploaded file could not be decoded");
            cleanup(state, &[&stored_name]).await;
            return Err(ApiError::DecodeError(
                "could not decode uploaded image".to_string(),
            ));
        }
    };

    // 3. Classify on the blocking pool; the session must not stall the runtime
    let model = state.classifier.clone();
    let label = match tokio::task::spawn_blocking(move || model.predict(&batch)).await {
        Ok(Ok(label)) => label,
        Ok(Err(e)) => {
            error!(error = %e, "model inference failed");
            cleanup(state, &[&stored_name]).await;
            return Err(ApiError::InferenceError(
                "model inference failed".to_string(),
            ));
        }
        Err(e) => {
            error!(error = %e, "inference task failed to complete");
            cleanup(state, &[&stored_name]).await;
            return Err(ApiError::InferenceError(
                "model inference failed".to_string(),
            ));
        }
    };

    // 4. Advisory lookup; unknown labels fall back instead of failing
    let advice = advice_for(label.as_str());

    // 5. Synthesize the advice into a speech clip
    let audio_path = match state.narrator.narrate(advice, &stem).await {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, "speech synthesis failed");
            cleanup(state, &[&stored_name]).await;
            return Err(ApiError::NarrationError(
                "speech synthesis failed".to_string(),
            ));
        }
    };

    // 6. Append the ledger record
    let record_id = generate_prediction_id();
    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO predictions (id, user_id, filename, prediction, advice, audio_path, created_at)
        VALUES (?, ?, ?, ?, ?, ?, datetime('now'))
        "#,
    )
    .bind(&record_id)
    .bind(user_id)
    .bind(original_filename)
    .bind(label.as_str())
    .bind(advice)
    .bind(&audio_path)
    .execute(&state.db)
    .await
    {
        error!(error = %e, user_id = %user_id, "failed to append prediction record");
        let audio_name = format!("{}.wav", stem);
        cleanup(state, &[&stored_name, &audio_name]).await;
        return Err(ApiError::DatabaseError(e));
    }

    info!(
        user_id = %user_id,
        record_id = %record_id,
        prediction = %label,
        "prediction recorded"
    );

    Ok(PredictResponse {
        filename: original_filename.to_string(),
        prediction: label.as_str().to_string(),
        advice: advice.to_string(),
        audio_file: audio_path,
    })
}

/// GET /history/:user_id - All prediction records for one account
///
/// The `token` query parameter must resolve to exactly the requested account;
/// anything else is an authorization failure, never partial data.
pub async fn history(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let state = state_lock.read().await.clone();

    match decode_token(&params.token, &state.jwt_secret) {
        Some(token_user) if token_user == user_id => {}
        _ => {
            warn!(
                user_id = %user_id,
                "history rejected: token does not authorize this account"
            );
            return Err(ApiError::Unauthorized("Unauthorized".to_string()));
        }
    }

    let records: Vec<PredictionRecord> =
        sqlx::query_as("SELECT * FROM predictions WHERE user_id = ? ORDER BY rowid")
            .bind(&user_id)
            .fetch_all(&state.db)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user_id, "database error fetching history");
                ApiError::DatabaseError(e)
            })?;

    let history = records
        .into_iter()
        .map(|r| {
            (
                r.filename,
                r.prediction,
                r.advice,
                r.audio_path,
                r.created_at.unwrap_or_default(),
            )
        })
        .collect();

    Ok(Json(HistoryResponse { history }))
}

/// GET /uploads/*path - Serve stored images and speech clips
pub async fn serve_upload(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    // Sanitize filename to prevent path traversal
    let safe_filename = sanitize_filename(&path);
    let file_path = state.uploads_dir.join(&safe_filename);

    if !file_path.exists() {
        return Err(ApiError::NotFound("file not found".to_string()));
    }

    let file_content = tokio_fs::read(&file_path)
        .await
        .map_err(|_| ApiError::InternalServer("failed to read stored file".to_string()))?;

    let content_type = get_content_type_from_extension(&safe_filename);

    Ok((
        StatusCode::OK,
        [
            ("Content-Type", content_type),
            ("Cache-Control", "public, max-age=31536000"), // 1 year cache
        ],
        file_content,
    ))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Best-effort removal of artifacts left behind by a failed pipeline run
async fn cleanup(state: &AppState, names: &[&str]) {
    for name in names {
        let path = state.uploads_dir.join(name);
        if path.exists() {
            let _ = tokio_fs::remove_file(&path).await;
        }
    }
}

fn is_valid_image_type(data: &[u8]) -> bool {
    let infer = Infer::new();
    if let Some(info) = infer.get(data) {
        matches!(
            info.mime_type(),
            "image/jpeg" | "image/jpg" | "image/png" | "image/gif" | "image/webp"
        )
    } else {
        false
    }
}

fn get_content_type_from_extension(filename: &str) -> &'static str {
    match filename.split('.').last() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

fn get_extension_from_filename(filename: &str) -> Option<&str> {
    filename
        .split('.')
        .last()
        .filter(|ext| matches!(*ext, "jpg" | "jpeg" | "png" | "gif" | "webp"))
}

pub(crate) fn sanitize_filename(filename: &str) -> String {
    // Remove path traversal sequences and directory separators
    let cleaned = filename
        .replace("..", "")
        .replace('/', "")
        .replace('\\', "")
        .replace('\0', "");

    // Whitelist safe characters: alphanumeric, dots, hyphens, underscores
    let sanitized: String = cleaned
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '.' || *c == '-' || *c == '_')
        .collect();

    // Limit filename length
    let max_length = 255;
    let truncated = if sanitized.len() > max_length {
        sanitized.chars().take(max_length).collect()
    } else {
        sanitized
    };

    // Ensure we don't end up with an empty filename
    if truncated.is_empty() {
        "sanitized_file".to_string()
    } else {
        truncated
    }
}
