pub mod client;
pub mod prompts;
pub mod references;
pub mod validate;

pub use client::{GeminiClient, GenerationRequest, TextGenerator};
