//! Segment overlay CLI tool
//!
//! Renders segmentation masks onto a base image as numbered tints or
//! redaction patches.

#[cfg(feature = "cli")]
use segment_overlay::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
