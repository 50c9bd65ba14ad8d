//! ytmp3 - A Rust CLI tool for converting YouTube videos to MP3
//!
//! This library extracts the video identifier from a YouTube link, asks a hosted
//! conversion API for the audio, and polls it until a download link is ready.

pub mod cli;
pub mod config;
pub mod convert;
pub mod extractors;
pub mod output;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use convert::{
    ConversionController, ConversionService, ConversionState, ConversionView, Converted,
    RapidApiClient,
};
pub use extractors::{extract_video_id, Thumbnails, VideoId};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Fallback text when the service reports a failure without a message
pub const DEFAULT_FAILURE_MESSAGE: &str = "Conversion failed. Please try again.";

/// Terminal outcomes of a failed conversion.
///
/// `Display` is the message shown to the user. Diagnostic context carried by some
/// variants is for logs only and never part of the rendered text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Please enter a valid YouTube URL")]
    Validation,

    #[error("MP3 link not accessible. Please try again.")]
    NotFound,

    #[error("Too many requests. Please try again later.")]
    RateLimited,

    #[error("{}", .message.as_deref().unwrap_or(DEFAULT_FAILURE_MESSAGE))]
    ServiceFailure { message: Option<String> },

    #[error("Unknown status received. Please try again.")]
    UnknownStatus { status: String },

    #[error("Conversion is taking too long. Please try again.")]
    Timeout,

    #[error("An error occurred. Please try again later.")]
    Transport { detail: String },
}

impl ConversionError {
    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionError::Validation => "validation",
            ConversionError::NotFound => "not_found",
            ConversionError::RateLimited => "rate_limited",
            ConversionError::ServiceFailure { .. } => "service_failure",
            ConversionError::UnknownStatus { .. } => "unknown_status",
            ConversionError::Timeout => "timeout",
            ConversionError::Transport { .. } => "transport",
        }
    }

    pub(crate) fn transport(detail: impl std::fmt::Display) -> Self {
        ConversionError::Transport {
            detail: detail.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_failure_message_falls_back_to_default() {
        let err = ConversionError::ServiceFailure { message: None };
        assert_eq!(err.to_string(), DEFAULT_FAILURE_MESSAGE);

        let err = ConversionError::ServiceFailure {
            message: Some("Video is too long".to_string()),
        };
        assert_eq!(err.to_string(), "Video is too long");
    }

    #[test]
    fn test_diagnostic_detail_is_not_user_visible() {
        let err = ConversionError::transport("connection refused (os error 111)");
        assert_eq!(err.to_string(), "An error occurred. Please try again later.");

        let err = ConversionError::UnknownStatus {
            status: "exploded".to_string(),
        };
        assert!(!err.to_string().contains("exploded"));
    }
}
