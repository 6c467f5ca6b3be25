//! Erase a marked region across a batch of photos with a generative model.
//!
//! A mask rectangle is drawn once, as percentages of a reference photo, and
//! reused for every image of the batch. Each image is padded into a white
//! square (the shape image models accept), sent to a [`Generator`], cropped
//! back to its native size, and finally blended over the original through a
//! feathered copy of the mask.
//!
//! # Quick Start
//!
//! ```no_run
//! use batch_eraser::gemini::{GeminiConfig, GeminiGenerator};
//! use batch_eraser::{BatchRun, CancelToken, EraserEngine, ImageRecord, MaskSettings};
//!
//! # async fn demo() -> batch_eraser::Result<()> {
//! let settings = MaskSettings::load("mask_settings_9-16.json".as_ref())?;
//! let images = vec![ImageRecord::open("photo.jpg".as_ref())?];
//! let run = BatchRun::new(images, settings)?;
//!
//! let generator = GeminiGenerator::new(GeminiConfig::new("api-key"))?;
//! let engine = EraserEngine::new(generator);
//! let items = engine.run(&run, &CancelToken::new(), |_| {}).await?;
//! let finished = batch_eraser::render_all(&items, run.settings());
//! finished[0].save("cleaned_photo.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Geometry
//!
//! The square padding is exactly reversible:
//!
//! ```
//! use batch_eraser::{denormalize, normalize, AspectRatio};
//! use image::RgbaImage;
//!
//! let photo = RgbaImage::new(800, 1000);
//! let square = normalize(&photo, AspectRatio::FourFive);
//! assert_eq!(square.dimensions(), (1000, 1000));
//! assert_eq!(denormalize(&square, 800, 1000, AspectRatio::FourFive), photo);
//! ```

#![deny(missing_docs)]

pub mod blending;
mod engine;
pub mod error;
pub mod feather;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod generator;
pub mod geometry;
pub mod record;
pub mod settings;
pub mod square;

pub use blending::{composite, composite_with_settings, render_item};
pub use engine::{
    collect_inputs, export_all, is_supported_image, render_all, save_image, BatchProgress,
    BatchRun, BatchState, CancelToken, EraserEngine, ExportResult, PipelineOptions,
};
pub use error::{Error, Result};
pub use generator::{Generator, DEFAULT_PROMPT};
pub use geometry::{to_percent, to_pixel_rect, PercentRect, PixelRect};
pub use record::{BatchItem, ImageRecord};
pub use settings::{AspectRatio, MaskSettings};
pub use square::{denormalize, normalize};
