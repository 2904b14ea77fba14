//! Segmentation service payloads
//!
//! Parses the grounding response (masks plus boxes) into paired
//! [`SegmentedObject`]s and builds the request body. Sending the request is
//! left to the caller.

use crate::{
    error::{OverlayError, Result},
    types::{pair_optional_boxes, BoundingBox, EncodedMask, SegmentedObject},
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_BOX_THRESHOLD: f32 = 0.25;
pub const DEFAULT_TEXT_THRESHOLD: f32 = 0.2;

/// Joins prompts into one grounding query
pub const PROMPT_SEPARATOR: &str = ". ";

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    masks_b64: Option<Vec<String>>,
    #[serde(default)]
    masks: Option<Vec<String>>,
    #[serde(default)]
    boxes: Option<Vec<Option<BoundingBox>>>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    output: Option<Payload>,
    #[serde(flatten)]
    direct: Payload,
}

/// Masks and boxes returned by the segmentation service
///
/// Accepts both the wrapped `{"output": {...}}` form and the flat object.
/// Masks are read from `masks_b64`, falling back to `masks`. A `null` box
/// entry means the object has no box.
#[derive(Debug, Clone, Default)]
pub struct SegmentationResponse {
    pub masks: Vec<String>,
    pub boxes: Vec<Option<BoundingBox>>,
}

impl SegmentationResponse {
    /// Parse a response body
    pub fn from_json(body: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(body)?;
        let payload = envelope.output.unwrap_or(envelope.direct);
        let response = Self {
            masks: payload.masks_b64.or(payload.masks).unwrap_or_default(),
            boxes: payload.boxes.unwrap_or_default(),
        };
        debug!(
            masks = response.masks.len(),
            boxes = response.boxes.len(),
            "Parsed segmentation response"
        );
        Ok(response)
    }

    /// Parse a response body from raw bytes
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| OverlayError::invalid_response(format!("body is not UTF-8: {}", e)))?;
        Self::from_json(text)
    }

    #[must_use]
    pub fn mask_count(&self) -> usize {
        self.masks.len()
    }

    /// Pair each mask with the box at the same position
    ///
    /// A mask that is not valid base64 is passed through as raw bytes so the
    /// decoder reports it as a per-mask failure at its original index.
    #[must_use]
    pub fn into_objects(self) -> Vec<SegmentedObject> {
        let masks: Vec<EncodedMask> = self
            .masks
            .into_iter()
            .enumerate()
            .map(|(index, encoded)| match decode_base64_mask(&encoded) {
                Ok(bytes) => EncodedMask::new(bytes),
                Err(e) => {
                    warn!(index, error = %e, "Mask is not valid base64");
                    EncodedMask::new(encoded.into_bytes())
                },
            })
            .collect();
        pair_optional_boxes(masks, &self.boxes)
    }
}

/// Decode a base64 mask, accepting an optional `data:` URL prefix
pub fn decode_base64_mask(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| OverlayError::invalid_response(format!("invalid base64 mask: {}", e)))
}

/// Request body for the grounding endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundRequest {
    /// Base64-encoded image, without a data URL prefix
    pub image: String,
    pub action: String,
    /// Text prompt naming the objects to find
    pub text: String,
    pub box_threshold: f32,
    pub text_threshold: f32,
}

impl GroundRequest {
    #[must_use]
    pub fn new(image_bytes: &[u8], text: impl Into<String>) -> Self {
        Self {
            image: general_purpose::STANDARD.encode(image_bytes),
            action: "ground".to_string(),
            text: text.into(),
            box_threshold: DEFAULT_BOX_THRESHOLD,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Categories to redact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionTargets {
    pub faces: bool,
    pub license_plates: bool,
    pub screens: bool,
    /// Free-form extra prompt; blank means none
    pub custom: Option<String>,
}

impl RedactionTargets {
    /// Individual prompts for the selected categories, in a fixed order
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        let mut prompts = Vec::new();
        if self.faces {
            prompts.push("face".to_string());
        }
        if self.license_plates {
            prompts.push("license plate".to_string());
        }
        if self.screens {
            prompts.extend(["computer screen", "monitor", "laptop"].map(String::from));
        }
        if let Some(custom) = self.custom.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            prompts.push(custom.to_string());
        }
        prompts
    }

    /// Prompt text for the grounding request
    ///
    /// Fails when no category is selected.
    pub fn prompt_text(&self) -> Result<String> {
        let prompts = self.prompts();
        if prompts.is_empty() {
            return Err(OverlayError::invalid_config(
                "select at least one redaction category",
            ));
        }
        Ok(prompts.join(PROMPT_SEPARATOR))
    }
}
