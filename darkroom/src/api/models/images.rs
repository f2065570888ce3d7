use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::develop::DevelopedImage;

/// Metadata for a developed and stored image
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImageUploadResponse {
    /// Pixel width of the decoded image
    pub width: u32,
    /// Pixel height of the decoded image
    pub height: u32,
    /// Detected source format (e.g. "png", "jpg")
    pub format: String,
    /// Size of the stored file in bytes
    pub size_bytes: u64,
}

impl ImageUploadResponse {
    /// Build the response from a developed image and the stored byte count
    pub fn from_developed(developed: &DevelopedImage, size_bytes: u64) -> Self {
        Self {
            width: developed.width(),
            height: developed.height(),
            format: developed.format_name().to_string(),
            size_bytes,
        }
    }
}
