//! Source images and finished batch items.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};

use crate::error::{Error, Result};

/// MIME type of the lossless intermediate encoding sent to generators.
pub const PNG_MIME: &str = "image/png";

/// One uploaded source image. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    name: String,
    mime_type: String,
    image: RgbaImage,
}

impl ImageRecord {
    /// Wrap already-decoded pixels.
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            image,
        }
    }

    /// Decode an uploaded file's bytes, sniffing the format from the content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageDecode`] if the bytes are not a readable image.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let name = name.into();
        let format = image::guess_format(bytes).map_err(|source| Error::ImageDecode {
            name: name.clone(),
            source,
        })?;
        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|source| Error::ImageDecode {
                name: name.clone(),
                source,
            })?
            .to_rgba8();
        Ok(Self {
            name,
            mime_type: format.to_mime_type().to_string(),
            image,
        })
    }

    /// Read and decode an image file. The record is named after the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::ImageDecode`] if it is not a readable image.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |f| f.to_string_lossy().into_owned());
        Self::from_bytes(name, &bytes)
    }

    /// Identifying name (usually the file name).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type of the original upload.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Decoded RGBA pixels at native size.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Native width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Native height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// An original image paired with its generated, cropped-back result.
///
/// Only created after a successful generation call.
#[derive(Debug, Clone)]
pub struct BatchItem {
    original: Arc<ImageRecord>,
    result_png: Vec<u8>,
}

impl BatchItem {
    /// Pair an original with its result pixels, storing them losslessly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if PNG encoding fails.
    pub fn new(original: Arc<ImageRecord>, result: &RgbaImage) -> Result<Self> {
        Ok(Self {
            original,
            result_png: encode_png(result)?,
        })
    }

    /// Pair an original with already-encoded result bytes, unchecked.
    #[cfg(test)]
    pub(crate) fn from_raw(original: Arc<ImageRecord>, result_png: Vec<u8>) -> Self {
        Self {
            original,
            result_png,
        }
    }

    /// The source image this result belongs to.
    #[must_use]
    pub fn original(&self) -> &ImageRecord {
        &self.original
    }

    /// PNG-encoded result bytes, same dimensions as the original.
    #[must_use]
    pub fn result_png(&self) -> &[u8] {
        &self.result_png
    }

    /// Decode the stored result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageDecode`] if the stored bytes are not a valid PNG.
    pub fn result_image(&self) -> Result<RgbaImage> {
        decode_image(&self.result_png, self.original.name())
    }

    /// File name for the exported composite: `cleaned_<name>`.
    #[must_use]
    pub fn export_name(&self) -> String {
        export_name(self.original.name())
    }
}

/// File name for an exported composite, `cleaned_image.png` when unnamed.
#[must_use]
pub fn export_name(original_name: &str) -> String {
    if original_name.is_empty() {
        "cleaned_image.png".to_string()
    } else {
        format!("cleaned_{original_name}")
    }
}

/// Encode pixels as PNG.
///
/// # Errors
///
/// Returns [`Error::Image`] if encoding fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Decode image bytes into RGBA pixels, sniffing the format from the content.
///
/// Generators may answer in any format the `image` crate reads, not only PNG.
///
/// # Errors
///
/// Returns [`Error::ImageDecode`] tagged with `name` on failure.
pub fn decode_image(bytes: &[u8], name: &str) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|source| Error::ImageDecode {
            name: name.to_string(),
            source,
        })
}
