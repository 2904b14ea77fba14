//! Segment overlay CLI tool
//!
//! Renders a segmentation response onto its base image as numbered tints or
//! black redaction patches.

use super::config::CliConfigBuilder;
use crate::{
    pipeline::CompositingPipeline,
    response::SegmentationResponse,
    services::{
        ConsoleProgressReporter, ImageIOService, OutputFormatHandler, ProcessingStage,
        ProgressReporter, ProgressTracker,
    },
    tracing_config::{events, init_cli_tracing, new_session_id, spans},
    types::{OverlayResult, OverlayStatus},
    Mode, OutputFormat, OverlayConfig,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Instrument};

/// Mask compositing and annotation tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "segment-overlay")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Base image the masks were produced for
    #[arg(long, value_name = "IMAGE", required_unless_present = "print_prompt")]
    pub image: Option<PathBuf>,

    /// Segmentation response JSON (use "-" for stdin)
    #[arg(long, value_name = "JSON", required_unless_present = "print_prompt")]
    pub response: Option<String>,

    /// Rendering mode
    #[arg(long, value_enum, default_value_t = CliMode::Count)]
    pub mode: CliMode,

    /// Output file. Use "-" for stdout. [default: <image>_<mode>.<ext>]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format [default: inferred from --output, else png]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 90)]
    pub jpeg_quality: u8,

    /// Write a JSON summary (count, markers, failures, timings) to this path
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,

    /// Skip numbered markers in count mode
    #[arg(long)]
    pub no_annotations: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print the redaction prompt for the selected categories and exit
    #[arg(long)]
    pub print_prompt: bool,

    /// Redact faces
    #[arg(long, requires = "print_prompt")]
    pub faces: bool,

    /// Redact license plates
    #[arg(long, requires = "print_prompt")]
    pub license_plates: bool,

    /// Redact screens and monitors
    #[arg(long, requires = "print_prompt")]
    pub screens: bool,

    /// Extra free-form redaction prompt
    #[arg(long, value_name = "TEXT", requires = "print_prompt")]
    pub custom: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliMode {
    Count,
    Redact,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Count => Mode::Count,
            CliMode::Redact => Mode::Redact,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Tiff,
    Rgba8,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
            CliOutputFormat::Rgba8 => OutputFormat::Rgba8,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = new_session_id();
    init_cli_tracing(cli.verbose, &session_id).context("Failed to initialize tracing")?;

    if cli.print_prompt {
        let prompt = CliConfigBuilder::redaction_targets(&cli)
            .prompt_text()
            .context("No redaction category selected")?;
        println!("{}", prompt);
        return Ok(());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    let span = spans::session(&session_id, config.mode);
    let outcome = run(&cli, config).instrument(span).await;
    if let Err(e) = &outcome {
        events::error_with_context(&**e, "overlay rendering");
    }
    outcome
}

async fn run(cli: &Cli, config: OverlayConfig) -> Result<()> {
    let (Some(image_path), Some(response_source)) = (cli.image.as_deref(), cli.response.as_deref())
    else {
        anyhow::bail!("--image and --response are required");
    };

    let base = ImageIOService::load_raster(image_path)
        .with_context(|| format!("Failed to load base image {}", image_path.display()))?;
    let body = read_response(response_source)?;
    let response =
        SegmentationResponse::from_slice(&body).context("Failed to parse segmentation response")?;
    let objects = response.into_objects();

    debug!(masks = objects.len(), "Loaded segmentation response");
    let span = spans::overlay(image_path, base.dimensions(), objects.len());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Rendering {} masks ({})", objects.len(), config.mode));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let reporter: Arc<dyn ProgressReporter> = Arc::new(ConsoleProgressReporter::new(cli.verbose > 0));
    let pipeline = CompositingPipeline::with_reporter(config.clone(), Arc::clone(&reporter))?;
    let outcome = pipeline.run(&base, objects).instrument(span).await;
    spinner.finish_and_clear();
    let result = outcome.context("Failed to render overlay")?;

    report_outcome(&result);
    events::timings(&result.timings);

    let mut tracker = ProgressTracker::new(reporter);
    write_result(&result, &config, cli.output.as_deref(), image_path, &mut tracker)?;
    info!("{}", result.timings.summary());

    if let Some(summary_path) = &cli.summary {
        let json = result.summary().to_json()?;
        std::fs::write(summary_path, json)
            .with_context(|| format!("Failed to write summary {}", summary_path.display()))?;
        debug!("Summary written to {}", summary_path.display());
    }

    Ok(())
}

/// Encode the rendered image to stdout (`-`) or a file
fn write_result(
    result: &OverlayResult,
    config: &OverlayConfig,
    target: Option<&str>,
    image_path: &Path,
    tracker: &mut ProgressTracker,
) -> Result<()> {
    tracker.report_stage_with_description(
        ProcessingStage::Encoding,
        format!("Encoding result as {:?}", config.output_format),
    );

    if target == Some("-") {
        let bytes = result.to_bytes(config.output_format, config.jpeg_quality)?;
        write_stdout(&bytes)?;
        info!("Image written to stdout");
        return Ok(());
    }

    let output_path = target.map_or_else(
        || generate_output_path(image_path, config.mode, config.output_format),
        PathBuf::from,
    );
    if let Err(e) = ImageIOService::save_raster(
        &result.image,
        &output_path,
        config.output_format,
        config.jpeg_quality,
    ) {
        tracker.report_error(&e.to_string());
        return Err(e).with_context(|| format!("Failed to save {}", output_path.display()));
    }
    info!("Saved {}", output_path.display());
    Ok(())
}

/// Print the user-facing outcome and per-mask warnings
fn report_outcome(result: &OverlayResult) {
    for failure in &result.mask_failures {
        eprintln!("Warning: mask {} skipped: {}", failure.index, failure.reason);
    }

    match (result.status, result.mode) {
        (OverlayStatus::NothingDetected, Mode::Redact) => eprintln!("No regions found to redact"),
        (OverlayStatus::NothingDetected, Mode::Count) => eprintln!("No objects found (count: 0)"),
        (OverlayStatus::Rendered, Mode::Count) => eprintln!("Count: {}", result.count),
        (OverlayStatus::Rendered, Mode::Redact) => {
            eprintln!("Redacted {} region(s)", result.count);
        },
    }
}

/// Read the response body from a file or stdin
fn read_response(source: &str) -> Result<Vec<u8>> {
    if source == "-" {
        let mut buffer = Vec::new();
        io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read response from stdin")?;
        if buffer.is_empty() {
            anyhow::bail!("No data received from stdin");
        }
        return Ok(buffer);
    }
    std::fs::read(source).with_context(|| format!("Failed to read response file {}", source))
}

/// Write image data to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    io::stdout()
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    io::stdout().flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Default output path: `<stem>_<mode>.<ext>` next to the input
fn generate_output_path(input_path: &Path, mode: Mode, format: OutputFormat) -> PathBuf {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let file_name = format!(
        "{}_{}.{}",
        stem,
        mode,
        OutputFormatHandler::get_extension(format)
    );
    input_path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{services::ProgressUpdate, types::ProcessingTimings, RasterImage};
    use std::sync::Mutex;

    #[derive(Default)]
    struct StageRecorder {
        stages: Mutex<Vec<ProcessingStage>>,
    }

    impl ProgressReporter for StageRecorder {
        fn report_progress(&self, update: ProgressUpdate) {
            self.stages.lock().unwrap().push(update.stage);
        }

        fn report_completion(&self, _timings: &ProcessingTimings) {}

        fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
    }

    #[tokio::test]
    async fn test_write_result_reports_encoding_and_saves() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = OverlayConfig::for_mode(Mode::Redact);
        let base = RasterImage::new_filled(8, 8, [10, 20, 30, 255]);
        let result = CompositingPipeline::new(config.clone())
            .unwrap()
            .run(&base, Vec::new())
            .await
            .unwrap();

        let recorder = Arc::new(StageRecorder::default());
        let mut tracker = ProgressTracker::new(recorder.clone());
        let output = temp_dir.path().join("nested").join("out.png");
        write_result(
            &result,
            &config,
            output.to_str(),
            Path::new("in.png"),
            &mut tracker,
        )
        .unwrap();

        assert_eq!(*recorder.stages.lock().unwrap(), vec![ProcessingStage::Encoding]);
        assert_eq!(ImageIOService::load_raster(&output).unwrap(), base);
    }

    #[test]
    fn test_generate_output_path() {
        assert_eq!(
            generate_output_path(Path::new("photos/street.jpg"), Mode::Redact, OutputFormat::Png),
            PathBuf::from("photos/street_redact.png")
        );
        assert_eq!(
            generate_output_path(Path::new("bucket.png"), Mode::Count, OutputFormat::Jpeg),
            PathBuf::from("bucket_count.jpg")
        );
    }

    #[test]
    fn test_parse_count_invocation() {
        let cli = Cli::try_parse_from([
            "segment-overlay",
            "--image",
            "in.png",
            "--response",
            "resp.json",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.mode, CliMode::Count);
        assert_eq!(cli.image, Some(PathBuf::from("in.png")));
        assert_eq!(cli.verbose, 1);
        assert!(!cli.no_annotations);
    }

    #[test]
    fn test_image_required_unless_printing_prompt() {
        assert!(Cli::try_parse_from(["segment-overlay", "--mode", "redact"]).is_err());
        let cli =
            Cli::try_parse_from(["segment-overlay", "--print-prompt", "--faces"]).unwrap();
        assert!(cli.print_prompt);
        assert!(cli.faces);
    }

    #[test]
    fn test_category_flags_require_print_prompt() {
        let result = Cli::try_parse_from([
            "segment-overlay",
            "--image",
            "in.png",
            "--response",
            "r.json",
            "--faces",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_response_file() {
        assert!(read_response("/definitely/not/here.json").is_err());
    }
}
