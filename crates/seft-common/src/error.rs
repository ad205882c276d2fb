//! Error types shared across SEFT crates

use thiserror::Error;

/// Errors raised while reading SEFT settings
#[derive(Error, Debug)]
pub enum SeftError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },
}

impl SeftError {
    /// Shorthand for a rejected setting
    pub fn invalid(key: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        SeftError::InvalidSetting {
            key: key.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
