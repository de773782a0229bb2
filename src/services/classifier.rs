// src/services/classifier.rs
//! Leaf disease classifier
//!
//! Wraps a pretrained ONNX image-classification model behind the [`Classifier`]
//! trait so the request pipeline never touches the inference runtime directly
//! and tests can substitute a fake.

use std::path::PathBuf;
use std::sync::Mutex;

use hf_hub::api::sync::ApiBuilder;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use thiserror::Error;
use tracing::info;

use crate::predictions::models::DiseaseLabel;

/// Edge length of the square input the model expects
pub const IMAGE_SIZE: u32 = 256;

const CHANNELS: usize = 3;

/// Length of a single-sample NHWC batch
pub const BATCH_LEN: usize = (IMAGE_SIZE as usize) * (IMAGE_SIZE as usize) * CHANNELS;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to decode image")]
    Decode(#[from] image::ImageError),

    #[error("batch has {0} values, expected {BATCH_LEN}")]
    BadBatch(usize),

    #[error("model download from hub failed")]
    Download(#[source] hf_hub::api::sync::ApiError),

    #[error("failed to build inference session for {model_path}")]
    Session {
        model_path: String,
        #[source]
        source: ort::Error,
    },

    #[error("model inference failed")]
    Inference(#[source] ort::Error),

    #[error("classifier lock poisoned")]
    LockPoisoned,

    #[error("model produced class index {0} outside the label set")]
    UnknownClass(usize),
}

/// A disease classifier over normalized single-sample batches
///
/// Implementations must be shareable across requests; the process holds
/// exactly one instance for its whole lifetime.
pub trait Classifier: Send + Sync {
    /// Classify one preprocessed NHWC batch (see [`preprocess`])
    fn predict(&self, batch: &[f32]) -> Result<DiseaseLabel, ClassifierError>;
}

/// Where the model artifact comes from
pub struct ClassifierConfig {
    /// Hub repository holding the pretrained model
    pub model_repo: String,
    /// Artifact filename within the repository
    pub model_file: String,
    /// Local path override; skips the hub entirely when set
    pub model_path: Option<String>,
    /// Hub access token for gated repositories
    pub hub_token: Option<String>,
}

/// The production classifier: one ONNX session, built once at startup
///
/// The session sits behind a `Mutex`; inference calls are serialized, which
/// keeps the loaded model effectively read-only for the process lifetime.
pub struct LeafClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl LeafClassifier {
    /// Resolve the model artifact and build the inference session
    pub fn load(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let model_path = match &config.model_path {
            Some(path) => PathBuf::from(path),
            None => download_model(config)?,
        };

        info!(model_path = %model_path.display(), "loading classifier model");

        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(&model_path))
            .map_err(|source| ClassifierError::Session {
                model_path: model_path.display().to_string(),
                source,
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "input".to_string());
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .unwrap_or_else(|| "output".to_string());

        info!(input = %input_name, output = %output_name, "classifier session ready");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl Classifier for LeafClassifier {
    fn predict(&self, batch: &[f32]) -> Result<DiseaseLabel, ClassifierError> {
        if batch.len() != BATCH_LEN {
            return Err(ClassifierError::BadBatch(batch.len()));
        }

        let tensor = ort::value::Tensor::from_array((
            [1usize, IMAGE_SIZE as usize, IMAGE_SIZE as usize, CHANNELS],
            batch.to_vec(),
        ))
        .map_err(ClassifierError::Inference)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::LockPoisoned)?;

        let outputs = session
            .run(
                ort::inputs![self.input_name.as_str() => tensor]
                    .map_err(ClassifierError::Inference)?,
            )
            .map_err(ClassifierError::Inference)?;

        let (_, scores) = outputs[self.output_name.as_str()]
            .try_extract_raw_tensor::<f32>()
            .map_err(ClassifierError::Inference)?;

        let index = argmax(scores);
        DiseaseLabel::from_index(index).ok_or(ClassifierError::UnknownClass(index))
    }
}

fn download_model(config: &ClassifierConfig) -> Result<PathBuf, ClassifierError> {
    info!(
        repo = %config.model_repo,
        file = %config.model_file,
        "fetching model artifact from hub"
    );

    let api = ApiBuilder::new()
        .with_token(config.hub_token.clone())
        .build()
        .map_err(ClassifierError::Download)?;

    api.model(config.model_repo.clone())
        .get(&config.model_file)
        .map_err(ClassifierError::Download)
}

/// Decode, resize to the model resolution and normalize pixels to [0, 1]
///
/// Returns a single-sample NHWC batch in row-major order.
pub fn preprocess(bytes: &[u8]) -> Result<Vec<f32>, ClassifierError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = decoded
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let mut batch = Vec::with_capacity(BATCH_LEN);
    for pixel in rgb.pixels() {
        batch.push(pixel[0] as f32 / 255.0);
        batch.push(pixel[1] as f32 / 255.0);
        batch.push(pixel[2] as f32 / 255.0);
    }

    Ok(batch)
}

/// Highest score wins; the first index wins on exact ties
pub fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (index, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = index;
        }
    }
    best
}
