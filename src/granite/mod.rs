//! IBM IAM token exchange and Granite text generation

pub mod client;
pub mod models;
pub mod token;

use async_trait::async_trait;

use crate::error::Result;

pub use client::GraniteClient;
pub use token::{BearerToken, BearerTokenCache, Clock, SystemClock};

/// A text-generation backend.
///
/// Implementations return the raw generated text. An empty string is a valid
/// result; a malformed upstream response is an error.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f64) -> Result<String>;

    /// Identifier reported as `model_used`
    fn model_id(&self) -> &str;
}
