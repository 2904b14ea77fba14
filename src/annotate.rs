//! Numbered object markers for count mode
//!
//! Each box gets a white disc with a black outline at its midpoint and a
//! 1-based label drawn inside. Labels are stroked vector digits, so no font
//! database is needed.

use crate::{
    error::{OverlayError, Result},
    types::{BoundingBox, RasterImage},
};
use serde::Serialize;
use tiny_skia::{
    ColorU8, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform,
};
use tracing::{debug, warn};

pub const MIN_RADIUS: f32 = 10.0;
pub const MAX_RADIUS: f32 = 20.0;
pub const MIN_FONT_SIZE: f32 = 16.0;
pub const MAX_FONT_SIZE: f32 = 32.0;

const OUTLINE_WIDTH: f32 = 2.0;
const DISC_ALPHA: u8 = 230;
const SHADOW_BLUR: u8 = 4;
const SHADOW_ALPHA: u8 = 128;

// Glyph box relative to the font size.
const GLYPH_WIDTH: f32 = 0.5;
const GLYPH_HEIGHT: f32 = 0.7;
const GLYPH_ADVANCE: f32 = 0.62;
const GLYPH_WEIGHT: f32 = 0.13;

/// A marker as drawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Marker {
    /// 1-based object number
    pub label: usize,
    pub center: (f32, f32),
    pub radius: f32,
    pub font_size: f32,
}

impl Marker {
    /// Marker geometry for the object numbered `label` inside `bbox`
    ///
    /// Returns `None` for boxes with non-finite coordinates.
    #[must_use]
    pub fn for_box(label: usize, bbox: &BoundingBox) -> Option<Self> {
        let width = bbox.width();
        let (cx, cy) = bbox.center();
        if !(width.is_finite() && cx.is_finite() && cy.is_finite()) {
            return None;
        }
        Some(Self {
            label,
            center: (cx, cy),
            radius: (width / 3.0).clamp(MIN_RADIUS, MAX_RADIUS),
            font_size: (width * 0.4).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE),
        })
    }
}

/// Path segments of one digit in a unit box, y pointing down
#[derive(Clone, Copy)]
enum GlyphOp {
    Move(f32, f32),
    Line(f32, f32),
    Cubic(f32, f32, f32, f32, f32, f32),
    Oval(f32, f32, f32, f32),
}

use GlyphOp::{Cubic, Line, Move, Oval};

const DIGITS: [&[GlyphOp]; 10] = [
    &[Oval(0.0, 0.0, 1.0, 1.0)],
    &[Move(0.2, 0.22), Line(0.6, 0.0), Line(0.6, 1.0)],
    &[
        Move(0.04, 0.26),
        Cubic(0.1, -0.06, 0.96, -0.06, 0.94, 0.3),
        Cubic(0.92, 0.52, 0.3, 0.7, 0.0, 1.0),
        Line(1.0, 1.0),
    ],
    &[
        Move(0.04, 0.12),
        Cubic(0.3, -0.06, 0.96, 0.0, 0.9, 0.25),
        Cubic(0.85, 0.45, 0.55, 0.48, 0.4, 0.48),
        Move(0.4, 0.48),
        Cubic(0.7, 0.48, 1.02, 0.6, 0.96, 0.78),
        Cubic(0.9, 1.03, 0.25, 1.05, 0.02, 0.88),
    ],
    &[Move(0.75, 1.0), Line(0.75, 0.0), Line(0.0, 0.7), Line(1.0, 0.7)],
    &[
        Move(0.94, 0.0),
        Line(0.12, 0.0),
        Line(0.06, 0.46),
        Cubic(0.4, 0.32, 1.0, 0.4, 0.97, 0.7),
        Cubic(0.95, 1.03, 0.25, 1.05, 0.02, 0.88),
    ],
    &[
        Move(0.86, 0.04),
        Cubic(0.4, -0.1, 0.0, 0.3, 0.02, 0.68),
        Oval(0.02, 0.38, 0.98, 1.0),
    ],
    &[Move(0.0, 0.0), Line(1.0, 0.0), Line(0.35, 1.0)],
    &[Oval(0.1, 0.0, 0.9, 0.48), Oval(0.0, 0.46, 1.0, 1.0)],
    &[
        Oval(0.02, 0.0, 0.98, 0.62),
        Move(0.98, 0.32),
        Cubic(1.0, 0.7, 0.6, 1.1, 0.14, 0.96),
    ],
];

fn to_pixmap(image: &RasterImage) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height()).ok_or_else(|| {
        OverlayError::render_surface(format!(
            "cannot allocate {}x{} drawing surface",
            image.width(),
            image.height()
        ))
    })?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels().chunks_exact(4)) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Ok(pixmap)
}

/// Write back only the pixels that drawing touched
///
/// Untouched pixels keep their exact straight-alpha bytes; a premultiply
/// round trip would otherwise shift translucent colors.
fn copy_back(pixmap: &Pixmap, original: &Pixmap, image: &mut RasterImage) {
    let drawn = pixmap.pixels().iter().zip(original.pixels());
    for (dst, (src, before)) in image.pixels_mut().chunks_exact_mut(4).zip(drawn) {
        if src == before {
            continue;
        }
        let color = src.demultiply();
        dst.copy_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
}

fn solid(r: u8, g: u8, b: u8, a: u8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn label_path(marker: &Marker) -> Option<tiny_skia::Path> {
    let text = marker.label.to_string();
    let size = marker.font_size;
    let (glyph_w, glyph_h, advance) = (GLYPH_WIDTH * size, GLYPH_HEIGHT * size, GLYPH_ADVANCE * size);
    let digit_count = text.chars().count() as f32;
    let total_width = (digit_count - 1.0) * advance + glyph_w;
    let left = marker.center.0 - total_width / 2.0;
    let top = marker.center.1 - glyph_h / 2.0;

    let mut pb = PathBuilder::new();
    for (slot, digit) in text.chars().filter_map(|c| c.to_digit(10)).enumerate() {
        let x0 = left + slot as f32 * advance;
        let at = |u: f32, v: f32| (x0 + u * glyph_w, top + v * glyph_h);
        let Some(ops) = DIGITS.get(digit as usize) else {
            continue;
        };
        for op in ops.iter() {
            match *op {
                Move(u, v) => {
                    let (x, y) = at(u, v);
                    pb.move_to(x, y);
                },
                Line(u, v) => {
                    let (x, y) = at(u, v);
                    pb.line_to(x, y);
                },
                Cubic(u1, v1, u2, v2, u, v) => {
                    let (x1, y1) = at(u1, v1);
                    let (x2, y2) = at(u2, v2);
                    let (x, y) = at(u, v);
                    pb.cubic_to(x1, y1, x2, y2, x, y);
                },
                Oval(l, t, r, b) => {
                    let (x1, y1) = at(l, t);
                    let (x2, y2) = at(r, b);
                    if let Some(rect) = Rect::from_ltrb(x1, y1, x2, y2) {
                        pb.push_oval(rect);
                    }
                },
            }
        }
    }
    pb.finish()
}

fn draw_marker(pixmap: &mut Pixmap, marker: &Marker) {
    let (cx, cy) = marker.center;
    let identity = Transform::identity();

    // Soft shadow: stacked translucent rings fading outward.
    let ring_alpha = SHADOW_ALPHA / (SHADOW_BLUR + 1);
    for step in (1..=SHADOW_BLUR).rev() {
        if let Some(ring) = PathBuilder::from_circle(cx, cy, marker.radius + f32::from(step)) {
            pixmap.fill_path(&ring, &solid(0, 0, 0, ring_alpha), FillRule::Winding, identity, None);
        }
    }

    if let Some(disc) = PathBuilder::from_circle(cx, cy, marker.radius) {
        pixmap.fill_path(
            &disc,
            &solid(255, 255, 255, DISC_ALPHA),
            FillRule::Winding,
            identity,
            None,
        );
        let outline = Stroke {
            width: OUTLINE_WIDTH,
            ..Stroke::default()
        };
        pixmap.stroke_path(&disc, &solid(0, 0, 0, 255), &outline, identity, None);
    }

    if let Some(label) = label_path(marker) {
        let weight = Stroke {
            width: marker.font_size * GLYPH_WEIGHT,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        pixmap.stroke_path(&label, &solid(0, 0, 0, 255), &weight, identity, None);
    }
}

/// Draw one numbered marker per object, labels starting at 1
///
/// `boxes[i]` belongs to the object labelled `i + 1`. Objects without a box
/// or with non-finite coordinates get no marker but keep their number, so
/// every label matches its object's position.
pub fn annotate(
    mut image: RasterImage,
    boxes: &[Option<BoundingBox>],
) -> Result<(RasterImage, Vec<Marker>)> {
    let markers: Vec<Marker> = boxes
        .iter()
        .enumerate()
        .filter_map(|(i, bbox)| {
            let bbox = bbox.as_ref()?;
            let marker = Marker::for_box(i + 1, bbox);
            if marker.is_none() {
                warn!(label = i + 1, ?bbox, "Skipping marker for box with non-finite coordinates");
            }
            marker
        })
        .collect();

    if markers.is_empty() {
        return Ok((image, markers));
    }

    let original = to_pixmap(&image)?;
    let mut pixmap = original.clone();
    for marker in &markers {
        debug!(
            label = marker.label,
            cx = marker.center.0,
            cy = marker.center.1,
            radius = marker.radius,
            font_size = marker.font_size,
            "Drawing marker"
        );
        draw_marker(&mut pixmap, marker);
    }
    copy_back(&pixmap, &original, &mut image);

    Ok((image, markers))
}
