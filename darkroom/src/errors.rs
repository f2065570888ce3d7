use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data (missing field, malformed form body)
    #[error("{message}")]
    BadRequest { message: String },

    /// Request body encoding the endpoint cannot parse
    #[error("Unsupported media type \"{content_type}\" in request")]
    UnsupportedMediaType { content_type: String },

    /// Upload exceeds the configured size limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// The uploaded payload could not be decoded as an image
    #[error("Failed to develop image: {0}")]
    Decode(#[from] image::ImageError),

    /// The developed image could not be written to its output path
    #[error("Failed to store image: {0:#}")]
    Store(anyhow::Error),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error payload returned on every non-2xx response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message sent to the client. Decode and store failures
    /// carry the underlying cause text so the caller can see why its payload
    /// was rejected.
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::UnsupportedMediaType { .. } => self.to_string(),
            Error::PayloadTooLarge { message } => message.clone(),
            Error::Decode(_) => self.to_string(),
            Error::Store(_) => self.to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Store(_) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Decode(_) => {
                tracing::warn!("Develop error: {}", self);
            }
            Error::BadRequest { .. } | Error::UnsupportedMediaType { .. } | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = ErrorBody {
            error: self.user_message(),
        };

        (status, axum::response::Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
