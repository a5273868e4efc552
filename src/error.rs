use thiserror::Error;

use crate::delete_confirm::DeleteError;
use crate::types::Tab;

/// Errors from the REST gateway.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(err) => err.status().map(|s| s.as_u16()),
            ApiError::Parse(_) => None,
        }
    }

    /// Message the server put in the error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Why the anime metadata could not be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("anime not found")]
    NotFound,
    #[error("server error while loading anime")]
    ServerError,
    #[error("failed to load anime")]
    GenericError,
}

impl From<&ApiError> for LoadError {
    fn from(err: &ApiError) -> Self {
        match err.status() {
            Some(404) => LoadError::NotFound,
            Some(status) if (500..600).contains(&status) => LoadError::ServerError,
            _ => LoadError::GenericError,
        }
    }
}

/// Errors from page operations. None of them are fatal to the page.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("authentication required")]
    AuthRequired,

    #[error("anime is not loaded")]
    NotLoaded,

    #[error("tab '{0}' is not available for this anime")]
    TabUnavailable(Tab),

    #[error("another request for this item is still running")]
    InFlight,

    #[error("text must not be empty")]
    EmptyText,

    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("only the author can change this entry")]
    NotOwner,

    #[error("no such comment or reply")]
    UnknownEntry,

    #[error(transparent)]
    Delete(#[from] DeleteError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            status: code,
            message: String::new(),
        }
    }

    #[test]
    fn load_error_follows_status() {
        assert_eq!(LoadError::from(&status(404)), LoadError::NotFound);
        assert_eq!(LoadError::from(&status(503)), LoadError::ServerError);
        assert_eq!(LoadError::from(&status(403)), LoadError::GenericError);
        assert_eq!(
            LoadError::from(&ApiError::Parse("bad".into())),
            LoadError::GenericError
        );
    }

    #[test]
    fn blank_server_message_is_ignored() {
        assert_eq!(status(500).server_message(), None);
        let err = ApiError::Status {
            status: 429,
            message: "slow down".into(),
        };
        assert_eq!(err.server_message(), Some("slow down"));
    }
}
