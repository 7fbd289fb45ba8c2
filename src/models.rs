//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains all request/response structures used by the API.

pub mod catalog;
pub mod governance;

// Re-export commonly used types
pub use catalog::*;
pub use governance::*;

use serde::Serialize;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Identifier allow-list check for request fields
fn validate_identifier(value: &str) -> Result<(), validator::ValidationError> {
    crate::db::queries::validate_identifier(value, "identifier").map_err(|e| {
        let mut err = validator::ValidationError::new("invalid_identifier");
        err.message = Some(e.to_string().into());
        err
    })
}

/// Message-only response (no data)
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
