//! Local storage for developed images.

use anyhow::Context;
use image::{DynamicImage, ImageFormat};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::develop::DevelopedImage;

/// Writes developed images to a single configured path.
///
/// The output encoding is fixed at construction from the path's extension.
/// Every write replaces the previous file.
#[derive(Debug, Clone)]
pub struct ImageStore {
    path: PathBuf,
    format: ImageFormat,
}

impl ImageStore {
    /// Resolve the output format from the configured path and make sure its
    /// parent directory exists.
    pub fn open(config: &StorageConfig) -> anyhow::Result<Self> {
        let format = ImageFormat::from_path(&config.path)
            .with_context(|| format!("unrecognized image extension on storage path '{}'", config.path.display()))?;

        let store = Self {
            path: config.path.clone(),
            format,
        };

        fs::create_dir_all(store.storage_dir())
            .with_context(|| format!("create storage directory '{}'", store.storage_dir().display()))?;

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode `developed` to the output path, replacing whatever was there.
    ///
    /// The image is encoded into a temporary file in the same directory and
    /// renamed over the target, so concurrent uploads and readers never see a
    /// partial file. Returns the stored byte count.
    pub fn write(&self, developed: &DevelopedImage) -> anyhow::Result<u64> {
        let encodable = self.encodable_image(developed);

        let tmp = tempfile::NamedTempFile::new_in(self.storage_dir())
            .with_context(|| format!("create temporary file in '{}'", self.storage_dir().display()))?;

        encodable
            .save_with_format(tmp.path(), self.format)
            .with_context(|| format!("encode image as {:?}", self.format))?;

        let size_bytes = tmp.as_file().metadata().context("stat encoded image")?.len();

        tmp.persist(&self.path)
            .with_context(|| format!("move image into place at '{}'", self.path.display()))?;

        Ok(size_bytes)
    }

    // JPEG has no alpha channel, so transparent uploads are flattened to RGB
    // before encoding. Everything else passes through untouched.
    fn encodable_image<'a>(&self, developed: &'a DevelopedImage) -> Cow<'a, DynamicImage> {
        if self.format == ImageFormat::Jpeg && developed.image.color().has_alpha() {
            Cow::Owned(DynamicImage::ImageRgb8(developed.image.to_rgb8()))
        } else {
            Cow::Borrowed(&developed.image)
        }
    }

    // Temporary files must live next to the target: rename is only atomic
    // within one filesystem
    fn storage_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}
