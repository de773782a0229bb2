// src/services/narrator.rs
//! Speech synthesis for advisory text
//!
//! Shells out to an external synthesizer (espeak-ng by default) and stores
//! the resulting clip next to the uploaded images.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("failed to run speech synthesizer `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("speech synthesizer exited with {status}: {stderr}")]
    SynthesisFailed { status: String, stderr: String },
}

/// Converts advisory text into a stored audio artifact
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Synthesize speech for `text` into `<stem>.wav` under the uploads dir
    ///
    /// Returns the artifact path relative to the serving root.
    async fn narrate(&self, text: &str, stem: &str) -> Result<String, NarratorError>;
}

/// Production narrator backed by an external synthesizer binary
pub struct SpeechSynthesizer {
    uploads_dir: PathBuf,
    command: String,
}

impl SpeechSynthesizer {
    pub fn new(uploads_dir: PathBuf, command: String) -> Self {
        Self {
            uploads_dir,
            command,
        }
    }
}

#[async_trait]
impl Narrator for SpeechSynthesizer {
    async fn narrate(&self, text: &str, stem: &str) -> Result<String, NarratorError> {
        let filename = format!("{}.wav", stem);
        let wav_path = self.uploads_dir.join(&filename);

        let output = tokio::process::Command::new(&self.command)
            .arg("-w")
            .arg(&wav_path)
            .arg(text)
            .output()
            .await
            .map_err(|source| NarratorError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(NarratorError::SynthesisFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(file = %filename, "speech clip written");

        Ok(format!("uploads/{}", filename))
    }
}
