//! Batch pipeline: normalize, generate, crop back, then composite for export.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbaImage};
use rayon::prelude::*;

use crate::blending;
use crate::error::{Error, Result};
use crate::generator::{Generator, DEFAULT_PROMPT};
use crate::record::{self, BatchItem, ImageRecord, PNG_MIME};
use crate::settings::MaskSettings;
use crate::square;

/// Options controlling how each image goes through the generator.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Instruction sent with every image.
    pub prompt: String,
    /// Resize generated images back to the normalized side before cropping.
    pub rescale_generated: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            rescale_generated: true,
        }
    }
}

/// An immutable snapshot of everything one batch run needs.
///
/// The mask settings are copied in at construction, so later edits by the
/// caller never affect a run in progress.
#[derive(Debug, Clone)]
pub struct BatchRun {
    images: Vec<Arc<ImageRecord>>,
    settings: MaskSettings,
}

impl BatchRun {
    /// Validate inputs and snapshot the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaskNotDefined`] if no rectangle is drawn and
    /// [`Error::EmptyBatch`] if there are no images.
    pub fn new(
        images: impl IntoIterator<Item = ImageRecord>,
        settings: MaskSettings,
    ) -> Result<Self> {
        if !settings.has_mask() {
            return Err(Error::MaskNotDefined);
        }
        let images: Vec<_> = images.into_iter().map(Arc::new).collect();
        if images.is_empty() {
            return Err(Error::EmptyBatch);
        }
        Ok(Self { images, settings })
    }

    /// Images in processing order.
    #[must_use]
    pub fn images(&self) -> &[Arc<ImageRecord>] {
        &self.images
    }

    /// The settings snapshot shared by every image.
    #[must_use]
    pub fn settings(&self) -> &MaskSettings {
        &self.settings
    }

    /// Number of images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Always false: a run holds at least one image.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Cooperative cancellation flag, checked between batch items.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The item in flight still finishes.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress of the item about to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    /// Zero-based index of the current item.
    pub index: usize,
    /// Number of items in the batch.
    pub total: usize,
    /// Name of the current image.
    pub name: String,
}

impl BatchProgress {
    /// Completion percentage once this item is done, rounded.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        ((self.index + 1) as f64 / self.total as f64 * 100.0).round() as u32
    }
}

/// Lifecycle of a batch run as reported to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchState {
    /// Nothing started yet.
    Idle,
    /// Processing the given item.
    Running(BatchProgress),
    /// Every item succeeded.
    Done,
    /// The run stopped; no results were kept.
    Failed,
}

/// Result of exporting one composited item.
#[derive(Debug)]
pub struct ExportResult {
    /// Path written (or attempted).
    pub path: PathBuf,
    /// Whether the file was written.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
}

/// The batch engine holding the generator and pipeline options.
///
/// Create once and reuse for multiple runs.
pub struct EraserEngine<G> {
    generator: G,
    options: PipelineOptions,
}

impl<G: Generator> EraserEngine<G> {
    /// Engine with default options.
    pub fn new(generator: G) -> Self {
        Self::with_options(generator, PipelineOptions::default())
    }

    /// Engine with explicit options.
    pub fn with_options(generator: G, options: PipelineOptions) -> Self {
        Self { generator, options }
    }

    /// The active options.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process every image of `run` strictly in order, one generator call at a time.
    ///
    /// `on_state` observes `Running` before each item and `Done` or `Failed`
    /// at the end. The run is all-or-nothing: the first failure, or a
    /// cancellation seen between items, discards every result produced so far.
    ///
    /// # Errors
    ///
    /// Returns the first generation or encoding error, or
    /// [`Error::Cancelled`] if `cancel` fired.
    pub async fn run(
        &self,
        run: &BatchRun,
        cancel: &CancelToken,
        mut on_state: impl FnMut(&BatchState),
    ) -> Result<Vec<BatchItem>> {
        let total = run.len();
        let mut items = Vec::with_capacity(total);

        for (index, original) in run.images().iter().enumerate() {
            if cancel.is_cancelled() {
                log::warn!("batch cancelled after {index} of {total} image(s)");
                on_state(&BatchState::Failed);
                return Err(Error::Cancelled { completed: index });
            }

            on_state(&BatchState::Running(BatchProgress {
                index,
                total,
                name: original.name().to_string(),
            }));
            log::info!("[{}/{total}] processing {}", index + 1, original.name());

            match self.process_one(original, run.settings()).await {
                Ok(item) => items.push(item),
                Err(e) => {
                    log::error!("batch failed at {}: {e}", original.name());
                    on_state(&BatchState::Failed);
                    return Err(e);
                }
            }
        }

        on_state(&BatchState::Done);
        Ok(items)
    }

    /// Run one image through normalize, generate and denormalize.
    async fn process_one(
        &self,
        original: &Arc<ImageRecord>,
        settings: &MaskSettings,
    ) -> Result<BatchItem> {
        let ratio = settings.aspect_ratio;
        let (w, h) = (original.width(), original.height());

        let square = square::normalize(original.image(), ratio);
        let side = square.width();
        let payload = record::encode_png(&square)?;

        let bytes = self
            .generator
            .generate(original.name(), &payload, PNG_MIME, &self.options.prompt)
            .await?;
        if bytes.is_empty() {
            return Err(Error::NoImageReturned {
                name: original.name().to_string(),
            });
        }

        let mut generated = record::decode_image(&bytes, original.name()).map_err(|e| {
            Error::Generation {
                name: original.name().to_string(),
                message: format!("unreadable image returned: {e}"),
            }
        })?;
        if self.options.rescale_generated {
            generated = square::fit_to_side(generated, side);
        }

        let cropped = square::denormalize(&generated, w, h, ratio);
        BatchItem::new(Arc::clone(original), &cropped)
    }
}

/// Composite every item over its original with the shared mask.
///
/// Items are independent, so they are rendered in parallel.
#[must_use]
pub fn render_all(items: &[BatchItem], settings: &MaskSettings) -> Vec<RgbaImage> {
    items
        .par_iter()
        .map(|item| blending::render_item(item, settings))
        .collect()
}

/// Composite and save every item as `cleaned_<name>` inside `output_dir`.
///
/// Returns an [`ExportResult`] per item, in input order.
#[must_use]
pub fn export_all(
    items: &[BatchItem],
    settings: &MaskSettings,
    output_dir: &Path,
) -> Vec<ExportResult> {
    if !output_dir.exists() {
        if let Err(e) = std::fs::create_dir_all(output_dir) {
            return vec![ExportResult {
                path: output_dir.to_path_buf(),
                success: false,
                message: format!("Failed to create output directory: {e}"),
            }];
        }
    }

    items
        .par_iter()
        .map(|item| {
            let path = output_dir.join(item.export_name());
            let rendered = blending::render_item(item, settings);
            match save_image(&rendered, &path) {
                Ok(()) => ExportResult {
                    path,
                    success: true,
                    message: "Saved".to_string(),
                },
                Err(e) => ExportResult {
                    path,
                    success: false,
                    message: format!("Failed to save: {e}"),
                },
            }
        })
        .collect()
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Expand inputs into image files: files are kept, directories contribute
/// their supported images sorted by name.
///
/// # Errors
///
/// Returns [`Error::Io`] if a directory cannot be read.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

/// Save an RGBA image with format-specific settings.
///
/// JPEG has no alpha channel, so it is written as RGB at quality 100.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}
