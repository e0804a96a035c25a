//! `fraudwatch-ai`
//!
//! **Responsibility:** inference boundary for fraud analysis.
//!
//! The decision itself is delegated to an external language model; this crate
//! only builds the prompt, talks to the generation service and turns its answer
//! into a [`fraudwatch_core::Verdict`]. It never touches history or job state.

pub mod classifier;
pub mod error;
pub mod ollama;
pub mod prompt;

pub use classifier::FraudClassifier;
pub use error::AiError;
pub use ollama::{OllamaClient, OllamaConfig};
