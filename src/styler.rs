//! Per-mask visual treatment

use crate::{config::Mode, threshold, types::Style};

/// Count-mode tint colors, cycled by mask index
pub const COUNT_PALETTE: [[u8; 3]; 7] = [
    [255, 0, 0],   // red
    [0, 255, 0],   // green
    [0, 0, 255],   // blue
    [255, 165, 0], // orange
    [128, 0, 128], // purple
    [0, 255, 255], // cyan
    [255, 0, 255], // magenta
];

/// Redaction fill
pub const REDACT_COLOR: [u8; 3] = [0, 0, 0];

/// Style for the mask at `index`
///
/// Indices that differ by a multiple of the palette length share a color.
#[must_use]
pub fn style_for(index: usize, mode: Mode) -> Style {
    match mode {
        Mode::Count => Style {
            color: COUNT_PALETTE[index % COUNT_PALETTE.len()],
            opacity: threshold::opacity_for(mode),
            hard_edge: false,
        },
        Mode::Redact => Style {
            color: REDACT_COLOR,
            opacity: threshold::opacity_for(mode),
            hard_edge: true,
        },
    }
}
