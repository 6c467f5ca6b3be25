use std::path::PathBuf;
use std::process;

use clap::Parser;

use batch_eraser::gemini::{GeminiConfig, GeminiGenerator, DEFAULT_MODEL};
use batch_eraser::{
    collect_inputs, export_all, AspectRatio, BatchRun, BatchState, CancelToken, EraserEngine,
    Error, ExportResult, ImageRecord, MaskSettings, PercentRect, PipelineOptions, Result,
};

#[derive(Parser)]
#[command(
    name = "batch-eraser",
    about = "Erase the same marked region from a batch of photos with Gemini",
    version,
    after_help = "Example: batch-eraser shots/ --rect 30,40,20,10 --ratio 9:16 -o cleaned\n\n\
                  The rectangle is x,y,width,height in percent of each image. Images are\n\
                  processed one at a time; if any image fails, nothing is written."
)]
struct Cli {
    /// Input image files or directories
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for cleaned_<name> files
    #[arg(short, long, default_value = "cleaned")]
    output: PathBuf,

    /// Load mask settings from a JSON file
    #[arg(short, long)]
    mask: Option<PathBuf>,

    /// Mask rectangle as x,y,width,height percentages (overrides --mask rectangle)
    #[arg(short, long, value_parser = parse_rect)]
    rect: Option<PercentRect>,

    /// Feather radius in pixels
    #[arg(long)]
    feather: Option<f64>,

    /// Opacity of the generated layer (0.0-1.0)
    #[arg(long)]
    opacity: Option<f64>,

    /// Target aspect ratio: 9:16 or 4:5
    #[arg(long)]
    ratio: Option<AspectRatio>,

    /// Write the effective mask settings to this JSON file
    #[arg(long)]
    save_mask: Option<PathBuf>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Gemini model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Override the removal prompt
    #[arg(long)]
    prompt: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn parse_rect(s: &str) -> std::result::Result<PercentRect, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid number in rectangle: {e}"))?;
    match values[..] {
        [mask_x, mask_y, width, height] => Ok(PercentRect {
            mask_x,
            mask_y,
            width,
            height,
        }),
        _ => Err(format!("expected x,y,width,height, got {} value(s)", values.len())),
    }
}

fn effective_settings(cli: &Cli) -> Result<MaskSettings> {
    let mut settings = match &cli.mask {
        Some(path) => MaskSettings::load(path)?,
        None => MaskSettings::default(),
    };
    if let Some(rect) = cli.rect {
        settings = settings.with_rect(rect);
    }
    if let Some(feather) = cli.feather {
        settings.feather = feather;
    }
    if let Some(opacity) = cli.opacity {
        settings.opacity = opacity;
    }
    if let Some(ratio) = cli.ratio {
        settings.aspect_ratio = ratio;
    }
    settings.validate()?;
    Ok(settings)
}

fn load_images(cli: &Cli) -> Result<Vec<ImageRecord>> {
    let files = collect_inputs(&cli.inputs)?;
    let mut images = Vec::with_capacity(files.len());
    for path in &files {
        match ImageRecord::open(path) {
            Ok(record) => images.push(record),
            Err(e) => eprintln!("[SKIP] {}: {e}", path.display()),
        }
    }
    Ok(images)
}

async fn run(cli: &Cli) -> Result<Vec<ExportResult>> {
    let settings = effective_settings(cli)?;
    if !settings.has_mask() {
        return Err(Error::MaskNotDefined);
    }
    if let Some(path) = &cli.save_mask {
        settings.save(path)?;
        log::info!("mask settings saved to {}", path.display());
    }

    let images = load_images(cli)?;
    let batch = BatchRun::new(images, settings)?;

    let mut config = GeminiConfig::new(cli.api_key.clone());
    config.model.clone_from(&cli.model);
    let generator = GeminiGenerator::new(config)?;
    let mut options = PipelineOptions::default();
    if let Some(prompt) = &cli.prompt {
        options.prompt.clone_from(prompt);
    }
    let engine = EraserEngine::with_options(generator, options);

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted: stopping after the current image");
            on_interrupt.cancel();
        }
    });

    let quiet = cli.quiet;
    let items = engine
        .run(&batch, &cancel, |state| {
            if let BatchState::Running(p) = state {
                if !quiet {
                    eprintln!("[{}%] {} ({}/{})", p.percent(), p.name, p.index + 1, p.total);
                }
            }
        })
        .await?;

    Ok(export_all(&items, batch.settings(), &cli.output))
}

fn print_result(result: &ExportResult, quiet: bool) {
    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );
    if result.success {
        if !quiet {
            eprintln!("[OK] {filename}");
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose && cli.quiet {
        eprintln!("Error: Cannot specify both --verbose and --quiet");
        process::exit(1);
    }

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let results = match run(&cli).await {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Error: {e}");
            if matches!(e, Error::MaskNotDefined) {
                eprintln!("Usage: batch-eraser <inputs>... --rect x,y,width,height  (or --mask settings.json)");
            }
            process::exit(1);
        }
    };

    let mut fail_count = 0u32;
    for r in &results {
        print_result(r, cli.quiet);
        if !r.success {
            fail_count += 1;
        }
    }

    if !cli.quiet {
        eprintln!();
        eprint!("[Summary] Saved: {}", results.len() - fail_count as usize);
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Output: {})", cli.output.display());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}
