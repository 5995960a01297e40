//! Detection geometry
//!
//! Value types for OCR detections: points, quads, and the per-word
//! candidates derived from them.

use serde::{Deserialize, Serialize};

/// A 2D coordinate in image pixel space (origin top-left, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Bounding polygon of a detection
///
/// Corners are stored in the fixed order top-left, top-right, bottom-right,
/// bottom-left. Construct through [`Quad::new`] to get validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    top_left: Point,
    top_right: Point,
    bottom_right: Point,
    bottom_left: Point,
}

impl Quad {
    /// Create a quad from its four corners (TL, TR, BR, BL)
    pub fn new(
        top_left: Point,
        top_right: Point,
        bottom_right: Point,
        bottom_left: Point,
    ) -> Result<Self, DetectionError> {
        let corners = [top_left, top_right, bottom_right, bottom_left];

        if let Some(bad) = corners.iter().find(|p| !p.is_finite()) {
            return Err(DetectionError::NonFiniteCoordinate { x: bad.x, y: bad.y });
        }

        if corners.iter().all(|p| *p == top_left) {
            return Err(DetectionError::Degenerate);
        }

        Ok(Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        })
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn top_right(&self) -> Point {
        self.top_right
    }

    pub fn bottom_right(&self) -> Point {
        self.bottom_right
    }

    pub fn bottom_left(&self) -> Point {
        self.bottom_left
    }

    /// Vertical extent measured along the left edge
    pub fn height(&self) -> f64 {
        (self.bottom_left.y - self.top_left.y).abs()
    }

    /// Midpoint of the left edge on the y axis
    pub fn y_center(&self) -> f64 {
        (self.top_left.y + self.bottom_left.y) / 2.0
    }

    pub fn x_start(&self) -> f64 {
        self.top_left.x
    }
}

/// Reasons a raw detection is rejected before reconstruction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionError {
    #[error("expected 4 quad points, got {0}")]
    WrongPointCount(usize),

    #[error("non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },

    #[error("all quad points coincide")]
    Degenerate,
}

/// Untyped detection as delivered by an OCR backend
///
/// Points are expected in TL, TR, BR, BL order. Nothing is validated until
/// the value is converted into a [`Detection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub points: Vec<[f64; 2]>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl RawDetection {
    pub fn new(points: Vec<[f64; 2]>, text: impl Into<String>) -> Self {
        Self {
            points,
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// A validated OCR detection
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub quad: Quad,
    pub text: String,
    /// Recognition confidence when the backend reports one (0.0 - 1.0)
    pub confidence: Option<f32>,
}

impl Detection {
    pub fn new(quad: Quad, text: impl Into<String>) -> Self {
        Self {
            quad,
            text: text.into(),
            confidence: None,
        }
    }

    /// Derive the word candidate used for clustering and ordering
    pub fn to_candidate(&self) -> WordCandidate {
        WordCandidate {
            x_start: self.quad.x_start(),
            y_center: self.quad.y_center(),
            height: self.quad.height(),
            text: self.text.clone(),
        }
    }
}

impl TryFrom<RawDetection> for Detection {
    type Error = DetectionError;

    fn try_from(raw: RawDetection) -> Result<Self, Self::Error> {
        let [tl, tr, br, bl]: [[f64; 2]; 4] = raw
            .points
            .as_slice()
            .try_into()
            .map_err(|_| DetectionError::WrongPointCount(raw.points.len()))?;

        let quad = Quad::new(
            Point::new(tl[0], tl[1]),
            Point::new(tr[0], tr[1]),
            Point::new(br[0], br[1]),
            Point::new(bl[0], bl[1]),
        )?;

        Ok(Self {
            quad,
            text: raw.text,
            confidence: raw.confidence,
        })
    }
}

/// Positional summary of one detection that passed the script filter
#[derive(Debug, Clone, PartialEq)]
pub struct WordCandidate {
    pub x_start: f64,
    pub y_center: f64,
    pub height: f64,
    pub text: String,
}
