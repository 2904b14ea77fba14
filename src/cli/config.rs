//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::{OutputFormat, OverlayConfig},
    response::RedactionTargets,
    services::OutputFormatHandler,
};
use anyhow::{Context, Result};

/// Convert CLI arguments to an `OverlayConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `OverlayConfig` from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<OverlayConfig> {
        OverlayConfig::builder()
            .mode(cli.mode.into())
            .output_format(Self::output_format(cli))
            .jpeg_quality(cli.jpeg_quality)
            .annotate(!cli.no_annotations)
            .build()
            .context("Invalid configuration")
    }

    /// Explicit `--format` wins, then the `--output` extension, then PNG
    fn output_format(cli: &Cli) -> OutputFormat {
        if let Some(format) = cli.format {
            return format.into();
        }
        cli.output
            .as_deref()
            .filter(|o| *o != "-")
            .and_then(|o| OutputFormatHandler::from_path(o).ok())
            .unwrap_or_default()
    }

    pub(crate) fn redaction_targets(cli: &Cli) -> RedactionTargets {
        RedactionTargets {
            faces: cli.faces,
            license_plates: cli.license_plates,
            screens: cli.screens,
            custom: cli.custom.clone(),
        }
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.jpeg_quality > 100 {
            anyhow::bail!("JPEG quality must be between 0 and 100, got {}", cli.jpeg_quality);
        }
        if let Some(image) = &cli.image {
            if !image.exists() {
                anyhow::bail!("Image file not found: {}", image.display());
            }
        }
        Ok(())
    }
}
