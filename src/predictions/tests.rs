//! Tests for predictions module
//!
//! These tests verify the prediction pipeline including:
//! - Advisory lookup totality and fallback
//! - Label set closure and argmax tie-breaking
//! - Image preprocessing and decode failure handling
//! - The end-to-end pipeline and history authorization rules

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::auth::issue_token;
    use crate::common::{ApiError, AppState};
    use crate::services::advice::{advice_for, FALLBACK_ADVICE};
    use crate::services::classifier::{self, Classifier, ClassifierError, BATCH_LEN};
    use crate::services::narrator::{Narrator, NarratorError};
    use super::super::models::DiseaseLabel;
    use async_trait::async_trait;
    use axum::extract::{Extension, Path, Query};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashSet;
    use std::io::Cursor;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Always answers with one configured label
    struct FixedClassifier(DiseaseLabel);

    impl Classifier for FixedClassifier {
        fn predict(&self, batch: &[f32]) -> Result<DiseaseLabel, ClassifierError> {
            assert_eq!(batch.len(), BATCH_LEN);
            Ok(self.0)
        }
    }

    /// Reports the artifact path without running a synthesizer
    struct SilentNarrator;

    #[async_trait]
    impl Narrator for SilentNarrator {
        async fn narrate(&self, _text: &str, stem: &str) -> Result<String, NarratorError> {
            Ok(format!("uploads/{}.wav", stem))
        }
    }

    /// Fails every synthesis request
    struct FailingNarrator;

    #[async_trait]
    impl Narrator for FailingNarrator {
        async fn narrate(&self, _text: &str, _stem: &str) -> Result<String, NarratorError> {
            Err(NarratorError::SynthesisFailed {
                status: "exit status: 1".to_string(),
                stderr: "no audio device".to_string(),
            })
        }
    }

    async fn test_state(
        classifier: Arc<dyn Classifier>,
        narrator: Arc<dyn Narrator>,
    ) -> Arc<RwLock<AppState>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("failed to open in-memory database");
        crate::common::migrations::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let uploads_dir = std::env::temp_dir().join(format!(
            "leafcheck-test-{}",
            crate::common::generate_raw_id(8)
        ));
        std::fs::create_dir_all(&uploads_dir).expect("failed to create uploads dir");

        Arc::new(RwLock::new(AppState {
            db: pool,
            uploads_dir,
            jwt_secret: "test_secret_key".to_string(),
            token_ttl_hours: 24,
            classifier,
            narrator,
        }))
    }

    async fn insert_user(state: &Arc<RwLock<AppState>>, id: &str, username: &str) {
        let db = state.read().await.db.clone();
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, 'x', datetime('now'))",
        )
        .bind(id)
        .bind(username)
        .execute(&db)
        .await
        .expect("failed to insert user");
    }

    /// A small valid PNG to push through the pipeline
    fn sample_png() -> Vec<u8> {
        let mut img = image::RgbImage::new(32, 32);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([40, 180, 60]);
        }
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("failed to encode png");
        bytes
    }

    #[test]
    fn test_advice_for_all_labels() {
        for label in DiseaseLabel::ALL {
            let advice = advice_for(label.as_str());
            assert!(!advice.is_empty(), "empty advice for {}", label);
            assert_ne!(advice, FALLBACK_ADVICE, "fallback advice for {}", label);
        }

        assert_eq!(
            advice_for("Tomato_healthy"),
            "Your plant is healthy! No action is needed."
        );
    }

    #[test]
    fn test_advice_falls_back_for_unknown_labels() {
        assert_eq!(advice_for("Potato_Late_blight"), FALLBACK_ADVICE);
        assert_eq!(advice_for(""), FALLBACK_ADVICE);
    }

    #[test]
    fn test_label_set_is_closed() {
        let mut seen = HashSet::new();
        for index in 0..10 {
            let label = DiseaseLabel::from_index(index).expect("index inside the label set");
            assert!(seen.insert(label.as_str()), "duplicate label string");
        }
        assert!(DiseaseLabel::from_index(10).is_none());

        assert_eq!(DiseaseLabel::from_index(0), Some(DiseaseLabel::BacterialSpot));
        assert_eq!(DiseaseLabel::from_index(9), Some(DiseaseLabel::Healthy));
    }

    #[test]
    fn test_argmax_first_index_wins_on_ties() {
        assert_eq!(classifier::argmax(&[0.1, 0.7, 0.2]), 1);
        assert_eq!(classifier::argmax(&[0.2, 0.5, 0.5]), 1);
        assert_eq!(classifier::argmax(&[0.5, 0.5, 0.5]), 0);
        assert_eq!(classifier::argmax(&[1.0]), 0);
    }

    #[test]
    fn test_preprocess_rejects_non_image() {
        let result = classifier::preprocess(b"definitely not an image");
        assert!(matches!(result, Err(ClassifierError::Decode(_))));
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let batch = classifier::preprocess(&sample_png()).expect("valid png should preprocess");

        assert_eq!(batch.len(), BATCH_LEN);
        assert!(batch.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(handlers::sanitize_filename("leaf.png"), "leaf.png");
        assert_eq!(handlers::sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(handlers::sanitize_filename("a/b\\c.png"), "abc.png");
        assert_eq!(handlers::sanitize_filename(""), "sanitized_file");
    }

    #[tokio::test]
    async fn test_predict_records_history() {
        let state = test_state(
            Arc::new(FixedClassifier(DiseaseLabel::Healthy)),
            Arc::new(SilentNarrator),
        )
        .await;
        insert_user(&state, "U_TEST01", "gardener42").await;

        let app_state = state.read().await.clone();
        let response =
            handlers::run_prediction(&app_state, "U_TEST01", "leaf.png", &sample_png())
                .await
                .expect("pipeline should succeed");

        assert_eq!(response.filename, "leaf.png");
        assert_eq!(response.prediction, "Tomato_healthy");
        assert_eq!(response.advice, "Your plant is healthy! No action is needed.");
        assert!(response.audio_file.starts_with("uploads/leaf_U_TEST01_"));
        assert!(response.audio_file.ends_with(".wav"));

        // The uploaded image was persisted under the server-chosen name
        let stored: Vec<_> = std::fs::read_dir(&app_state.uploads_dir)
            .expect("uploads dir readable")
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(stored.len(), 1);

        // The ledger now holds the record, visible with a valid token
        let token = issue_token("U_TEST01", &app_state.jwt_secret, 24).expect("token");
        let history = handlers::history(
            Extension(state.clone()),
            Path("U_TEST01".to_string()),
            Query(models::HistoryQuery { token }),
        )
        .await
        .expect("history should succeed");

        assert_eq!(history.0.history.len(), 1);
        let row = &history.0.history[0];
        assert_eq!(row.0, "leaf.png");
        assert_eq!(row.1, "Tomato_healthy");
        assert_eq!(row.2, "Your plant is healthy! No action is needed.");
        assert_eq!(row.3, response.audio_file);

        // Timestamp renders in the fixed YYYY-MM-DD HH:MM:SS format
        let timestamp = &row.4;
        assert_eq!(timestamp.len(), 19);
        assert_eq!(&timestamp[4..5], "-");
        assert_eq!(&timestamp[13..14], ":");
    }

    #[tokio::test]
    async fn test_history_rejects_foreign_token() {
        let state = test_state(
            Arc::new(FixedClassifier(DiseaseLabel::Healthy)),
            Arc::new(SilentNarrator),
        )
        .await;
        insert_user(&state, "U_ALICE1", "alice").await;
        insert_user(&state, "U_BOB001", "bob").await;

        let app_state = state.read().await.clone();
        handlers::run_prediction(&app_state, "U_ALICE1", "leaf.png", &sample_png())
            .await
            .expect("pipeline should succeed");

        // Bob's token must not open Alice's history
        let bob_token = issue_token("U_BOB001", &app_state.jwt_secret, 24).expect("token");
        let result = handlers::history(
            Extension(state.clone()),
            Path("U_ALICE1".to_string()),
            Query(models::HistoryQuery { token: bob_token }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));

        // Neither must a malformed token
        let result = handlers::history(
            Extension(state.clone()),
            Path("U_ALICE1".to_string()),
            Query(models::HistoryQuery {
                token: "garbage".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_predict_surfaces_decode_error() {
        let state = test_state(
            Arc::new(FixedClassifier(DiseaseLabel::Healthy)),
            Arc::new(SilentNarrator),
        )
        .await;
        insert_user(&state, "U_TEST01", "gardener42").await;

        let app_state = state.read().await.clone();
        let result = handlers::run_prediction(
            &app_state,
            "U_TEST01",
            "notes.txt",
            b"definitely not an image",
        )
        .await;

        assert!(matches!(result, Err(ApiError::DecodeError(_))));

        // Nothing was stored for the rejected upload
        let stored = std::fs::read_dir(&app_state.uploads_dir)
            .expect("uploads dir readable")
            .count();
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn test_predict_rejects_unknown_account() {
        let state = test_state(
            Arc::new(FixedClassifier(DiseaseLabel::Healthy)),
            Arc::new(SilentNarrator),
        )
        .await;

        let app_state = state.read().await.clone();
        let result =
            handlers::run_prediction(&app_state, "U_GHOST1", "leaf.png", &sample_png()).await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_narration_failure_cleans_up_stored_image() {
        let state = test_state(
            Arc::new(FixedClassifier(DiseaseLabel::EarlyBlight)),
            Arc::new(FailingNarrator),
        )
        .await;
        insert_user(&state, "U_TEST01", "gardener42").await;

        let app_state = state.read().await.clone();
        let result =
            handlers::run_prediction(&app_state, "U_TEST01", "leaf.png", &sample_png()).await;

        assert!(matches!(result, Err(ApiError::NarrationError(_))));

        // The persisted image was rolled back, and no ledger row was written
        let stored = std::fs::read_dir(&app_state.uploads_dir)
            .expect("uploads dir readable")
            .count();
        assert_eq!(stored, 0);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM predictions")
            .fetch_one(&app_state.db)
            .await
            .expect("count query");
        assert_eq!(count.0, 0);
    }
}
