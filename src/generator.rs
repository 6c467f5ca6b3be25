//! The external image generator the batch pipeline talks to.

use std::future::Future;

use crate::error::Result;

/// Instruction sent along with every square image.
pub const DEFAULT_PROMPT: &str = "Remove the text, watermark, or object in the highlighted area. \
Reconstruct the background seamlessly to match the surrounding texture. High quality.";

/// A generative image service: one encoded square image in, one image out.
///
/// Implementations make a single attempt per call. A response without any
/// image data must be reported as [`Error::NoImageReturned`], never as an
/// empty success.
///
/// [`Error::NoImageReturned`]: crate::Error::NoImageReturned
pub trait Generator {
    /// Send `image` (encoded as `mime_type`) with `prompt`; return the encoded result.
    ///
    /// `name` identifies the source image in error messages.
    fn generate(
        &self,
        name: &str,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

impl<G: Generator> Generator for &G {
    fn generate(
        &self,
        name: &str,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send {
        (**self).generate(name, image, mime_type, prompt)
    }
}
