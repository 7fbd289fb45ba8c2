//! Description generation pipeline

pub mod limiter;
pub mod orchestrator;
pub mod prompt;

pub use limiter::RateLimiter;
pub use orchestrator::{GenerationOrchestrator, GenerationRequest, GenerationSummary, GeneratedItem};
