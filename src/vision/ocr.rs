//! Precomputed OCR detections
//!
//! Reads detection lists produced by an external OCR engine. Two JSON layouts
//! are accepted per entry (confidence optional in both):
//! - EasyOCR `readtext` tuples: `[[[x, y], [x, y], [x, y], [x, y]], "text", 0.93]`
//! - objects: `{ "points": [[x, y], ...], "text": "...", "confidence": 0.93 }`

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::OcrProvider;
use crate::reading::RawDetection;

/// Parse a JSON array of detections
///
/// Entries are converted one at a time. Unusable points or coordinates are
/// kept as non-finite values so reconstruction rejects only that detection.
/// Entries without a text string are skipped.
pub fn parse_detections(json: &str) -> Result<Vec<RawDetection>> {
    let entries: Vec<Value> = serde_json::from_str(json).context("Failed to parse detection list")?;

    let mut detections = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match parse_entry(entry) {
            Some(raw) => detections.push(raw),
            None => warn!("Skipping unrecognized detection entry #{}: {}", index, entry),
        }
    }

    Ok(detections)
}

fn parse_entry(entry: &Value) -> Option<RawDetection> {
    let (points, text, confidence) = match entry {
        Value::Array(items) => (items.first()?, items.get(1)?, items.get(2)),
        Value::Object(fields) => (fields.get("points")?, fields.get("text")?, fields.get("confidence")),
        _ => return None,
    };

    let mut raw = RawDetection::new(parse_points(points), text.as_str()?);
    raw.confidence = confidence.and_then(Value::as_f64).map(|c| c as f32);
    Some(raw)
}

fn parse_points(value: &Value) -> Vec<[f64; 2]> {
    match value.as_array() {
        Some(points) => points.iter().map(parse_point).collect(),
        None => Vec::new(),
    }
}

fn parse_point(value: &Value) -> [f64; 2] {
    match value.as_array().map(Vec::as_slice) {
        Some([x, y]) => [coordinate(x), coordinate(y)],
        _ => [f64::NAN, f64::NAN],
    }
}

fn coordinate(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

/// Load detections from a JSON file
pub fn load_detections(path: &Path) -> Result<Vec<RawDetection>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read detections from {:?}", path))?;
    let detections = parse_detections(&content)
        .with_context(|| format!("Invalid detection file {:?}", path))?;
    debug!("Loaded {} detections from {:?}", detections.len(), path);
    Ok(detections)
}

/// OCR provider that replays detections saved by an external engine
///
/// The image bytes are ignored; the detections come from the file.
#[derive(Debug, Clone)]
pub struct DetectionFileProvider {
    path: PathBuf,
}

impl DetectionFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OcrProvider for DetectionFileProvider {
    fn name(&self) -> &str {
        "detection-file"
    }

    fn detect(&self, _image: &[u8]) -> Result<Vec<RawDetection>> {
        load_detections(&self.path)
    }
}
