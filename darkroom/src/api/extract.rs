//! Request extractors for the image API.

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{StatusCode, header::CONTENT_TYPE};
use bytes::Bytes;
use tracing::trace;

use crate::{
    AppState,
    errors::{Error, Result},
};

/// Form field the image payload is expected under
pub const IMAGE_FIELD: &str = "image";

/// An image payload pulled out of a form request.
///
/// Both body encodings browsers produce for form submissions are accepted:
/// `multipart/form-data` (the normal case for file inputs) and
/// `application/x-www-form-urlencoded`. Anything else is rejected with 415
/// before the body is read.
#[derive(Debug)]
pub struct ImageUpload {
    /// Raw payload bytes from the `image` field
    pub data: Bytes,
    /// Client-supplied filename, when the field was a multipart file part
    pub filename: Option<String>,
    /// Client-declared content type of the part. Informational only - the
    /// decoder trusts magic bytes, not this
    pub declared_content_type: Option<String>,
}

impl FromRequest<AppState> for ImageUpload {
    type Rejection = Error;

    async fn from_request(req: Request, state: &AppState) -> Result<Self> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            Self::from_multipart(req, state).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            Self::from_urlencoded(req, state).await
        } else {
            Err(Error::UnsupportedMediaType { content_type })
        }
    }
}

impl ImageUpload {
    /// Buffer the `image` field out of a multipart body, enforcing the
    /// configured size limit as chunks stream in. If the field repeats, the
    /// last occurrence wins.
    async fn from_multipart(req: Request, state: &AppState) -> Result<Self> {
        let max_bytes = state.config.upload.max_bytes;

        let mut multipart = Multipart::from_request(req, state).await.map_err(|e| Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e),
        })?;

        let mut upload: Option<ImageUpload> = None;

        while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e),
        })? {
            if field.name() != Some(IMAGE_FIELD) {
                trace!(field = ?field.name(), "Skipping unexpected multipart field");
                continue;
            }

            let filename = field.file_name().map(|s| s.to_string());
            let declared_content_type = field.content_type().map(|s| s.to_string());

            let mut data = Vec::new();
            let mut total_size = 0u64;

            while let Some(chunk) = field.chunk().await.map_err(|e| {
                // The transport body cap rejects with its own 413; keep that status
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    payload_too_large(max_bytes)
                } else {
                    Error::BadRequest {
                        message: format!("Failed to read image chunk: {}", e),
                    }
                }
            })? {
                total_size += chunk.len() as u64;

                // Check the size limit incrementally to fail fast
                if total_size > max_bytes {
                    return Err(payload_too_large(max_bytes));
                }

                data.extend_from_slice(&chunk);
            }

            // An empty file part still counts as a provided image; the decoder
            // is the one to reject it
            upload = Some(ImageUpload {
                data: data.into(),
                filename,
                declared_content_type,
            });
        }

        upload.ok_or_else(|| Error::BadRequest {
            message: "No image data provided".to_string(),
        })
    }

    /// Take the `image` value out of a urlencoded form body. The value's bytes
    /// are handed to the decoder unchanged. If the field repeats, the last
    /// occurrence wins; an empty value counts as absent.
    async fn from_urlencoded(req: Request, state: &AppState) -> Result<Self> {
        let max_bytes = state.config.upload.max_bytes;

        let axum::Form(fields) = axum::Form::<Vec<(String, String)>>::from_request(req, state)
            .await
            .map_err(|e| {
                // A body past the transport cap rejects with its own 413; keep that status
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    payload_too_large(max_bytes)
                } else {
                    Error::BadRequest {
                        message: format!("Failed to parse form data: {}", e),
                    }
                }
            })?;

        let value = fields.into_iter().rev().find(|(name, _)| name == IMAGE_FIELD).map(|(_, value)| value);

        match value {
            Some(value) if value.is_empty() => Err(Error::BadRequest {
                message: "No image data provided".to_string(),
            }),
            Some(value) if value.len() as u64 > max_bytes => Err(payload_too_large(max_bytes)),
            Some(value) => Ok(ImageUpload {
                data: Bytes::from(value.into_bytes()),
                filename: None,
                declared_content_type: None,
            }),
            None => Err(Error::BadRequest {
                message: "No image data provided".to_string(),
            }),
        }
    }
}

fn payload_too_large(max_bytes: u64) -> Error {
    Error::PayloadTooLarge {
        message: format!(
            "Image exceeds maximum allowed size of {} bytes ({} MB)",
            max_bytes,
            max_bytes / (1024 * 1024)
        ),
    }
}
