//! Error types for the batch-eraser crate.

/// Errors that can occur while preparing, running, or rendering a batch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Processing was requested before a mask rectangle was drawn.
    #[error("no mask area defined: draw a mask on the reference image first")]
    MaskNotDefined,

    /// Processing was requested with no images in the batch.
    #[error("batch contains no images")]
    EmptyBatch,

    /// The external generator failed for one image.
    #[error("failed to remove watermark from {name}: {message}")]
    Generation {
        /// Name of the image being processed.
        name: String,
        /// Description of the failure reported by the generator.
        message: String,
    },

    /// The external generator answered without any image data.
    #[error("no image data returned from generator for {name}")]
    NoImageReturned {
        /// Name of the image being processed.
        name: String,
    },

    /// A mask settings file could not be parsed or failed validation.
    #[error("invalid mask settings: {0}")]
    SettingsDecode(String),

    /// An uploaded image could not be decoded.
    #[error("failed to decode image {name}: {source}")]
    ImageDecode {
        /// Name of the image that failed to decode.
        name: String,
        /// Underlying decoder error.
        source: image::ImageError,
    },

    /// The batch was cancelled between items.
    #[error("batch cancelled after {completed} image(s); results discarded")]
    Cancelled {
        /// Number of items finished before cancellation was observed.
        completed: usize,
    },

    /// An HTTP client could not be built or a request could not be sent.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (encode, save).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::SettingsDecode(e.to_string())
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));

        let generation = Error::Generation {
            name: "beach.jpg".to_string(),
            message: "quota exceeded".to_string(),
        };
        let msg = generation.to_string();
        assert!(msg.contains("beach.jpg"));
        assert!(msg.contains("quota exceeded"));

        let cancelled = Error::Cancelled { completed: 2 };
        assert!(cancelled.to_string().contains("after 2 image(s)"));
    }

    #[test]
    fn json_errors_become_settings_decode() {
        let err: Error = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(err, Error::SettingsDecode(_)));
    }
}
