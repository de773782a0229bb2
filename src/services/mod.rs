// src/services/mod.rs
//
// Shared services module containing business logic services
// that can be used across different domain modules

pub mod advice;
pub mod classifier;
pub mod narrator;

// Re-export commonly used types for convenience
pub use classifier::{Classifier, LeafClassifier};
pub use narrator::{Narrator, SpeechSynthesizer};
