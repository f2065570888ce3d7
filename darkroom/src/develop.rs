//! Image decoding ("developing") for uploaded payloads.

use image::{DynamicImage, GenericImageView, ImageFormat};

/// A decoded upload: pixel data plus the format sniffed from its magic bytes.
#[derive(Debug)]
pub struct DevelopedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

impl DevelopedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Canonical lowercase name of the detected source format (e.g. "png", "jpg")
    pub fn format_name(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("unknown")
    }
}

/// Decode a raw upload into pixels.
///
/// The format is sniffed from the payload's magic bytes, never from the client's
/// declared content type or filename. Anything the imaging library cannot
/// identify or parse comes back as an error carrying the decoder's reason.
pub fn develop(data: &[u8]) -> Result<DevelopedImage, image::ImageError> {
    let format = image::guess_format(data)?;
    let image = image::load_from_memory_with_format(data, format)?;

    Ok(DevelopedImage { image, format })
}
