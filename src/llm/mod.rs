//! Description generator
//!
//! Turns a prompt into a short description through a hosted model.

pub mod client;
pub mod types;

use crate::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;

pub use client::ServingEndpointClient;

/// Generated texts starting with this marker are failures, never descriptions
pub const ERROR_MARKER: &str = "ERROR:";

pub fn is_soft_failure(text: &str) -> bool {
    text.trim_start().starts_with(ERROR_MARKER)
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AppError>;

    /// Recorded as `model_used` on every stored description
    fn model_name(&self) -> &str;
}

pub type SharedGenerator = Arc<dyn TextGenerator>;
