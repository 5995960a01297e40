//! Reading-Order Reconstruction
//!
//! Turns the unordered detections of one image into right-to-left,
//! top-to-bottom lines of target-script text:
//! script filter -> line clustering -> word and line ordering ->
//! degenerate-line filter -> newline join.
//!
//! The reconstructor performs no I/O. When nothing survives it returns
//! [`ReadingOutcome::NoText`] and leaves the captioning fallback to the caller.

pub mod geometry;
pub mod line;
pub mod script;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ConfigError;

pub use geometry::{Detection, DetectionError, Point, Quad, RawDetection, WordCandidate};
pub use line::{cluster_lines, Line};
pub use script::{ScriptBlock, ScriptClassifier, UnicodeBlockClassifier};

/// Result of reconstructing one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadingOutcome {
    /// Newline-joined lines; never empty
    Text(String),
    /// Nothing survived filtering; the caller should fall back to captioning
    NoText,
}

impl ReadingOutcome {
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::NoText => None,
        }
    }
}

/// Target script settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Label used in logs
    pub name: String,
    /// Inclusive code point ranges accepted as target script
    pub blocks: Vec<ScriptBlock>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            name: "arabic".to_string(),
            blocks: vec![ScriptBlock::ARABIC],
        }
    }
}

/// Tuning for the reconstruction heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingConfig {
    /// A word joins a line when its y center is within `line_tolerance * height`
    /// of the line's mean y center
    pub line_tolerance: f64,
    /// Lines with fewer whitespace-separated tokens are dropped as noise
    pub min_tokens_per_line: usize,
    /// Detections with a reported confidence below this are dropped (0.0 disables)
    pub min_confidence: f32,
    /// Target script
    pub script: ScriptConfig,
}

impl ReadingConfig {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.line_tolerance.is_finite() || self.line_tolerance <= 0.0 {
            return Err(ConfigError::InvalidTolerance(self.line_tolerance));
        }
        if self.min_tokens_per_line == 0 {
            return Err(ConfigError::ZeroMinTokens);
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidConfidence(self.min_confidence));
        }
        if self.script.blocks.is_empty() {
            return Err(ConfigError::NoScriptBlocks);
        }
        if let Some(block) = self.script.blocks.iter().find(|b| b.start > b.end) {
            return Err(ConfigError::InvertedBlock {
                start: block.start,
                end: block.end,
            });
        }

        Ok(())
    }
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 0.8,
            min_tokens_per_line: 2,
            min_confidence: 0.0,
            script: ScriptConfig::default(),
        }
    }
}

/// Counters collected while building a page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    /// Detections handed to the reconstructor
    pub received: usize,
    /// Raw detections dropped for malformed geometry
    pub rejected_malformed: usize,
    /// Detections dropped for low confidence
    pub rejected_confidence: usize,
    /// Detections dropped by the script filter
    pub rejected_script: usize,
    /// Lines formed by clustering
    pub lines: usize,
    /// Lines flagged as degenerate
    pub degenerate_lines: usize,
}

/// One ordered line of a page
#[derive(Debug, Clone, PartialEq)]
pub struct PageLine {
    pub text: String,
    pub mean_y: f64,
    pub word_count: usize,
    /// Too few tokens to count as text
    pub degenerate: bool,
}

/// All lines of one image, ordered top to bottom
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    lines: Vec<PageLine>,
    stats: PageStats,
}

impl Page {
    /// Every line including degenerate ones, top to bottom
    pub fn lines(&self) -> &[PageLine] {
        &self.lines
    }

    pub fn stats(&self) -> PageStats {
        self.stats
    }

    /// Lines that survive the degenerate filter, top to bottom
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|line| !line.degenerate)
            .map(|line| line.text.as_str())
    }

    /// Join surviving lines, or signal that none survived
    pub fn into_outcome(self) -> ReadingOutcome {
        let text = self.text_lines().collect::<Vec<_>>().join("\n");
        if text.is_empty() {
            ReadingOutcome::NoText
        } else {
            ReadingOutcome::Text(text)
        }
    }
}

/// Rebuilds reading order from raw OCR detections
pub struct ReadingOrderReconstructor {
    config: ReadingConfig,
    classifier: Box<dyn ScriptClassifier>,
}

impl ReadingOrderReconstructor {
    /// Create a reconstructor using the configured Unicode blocks as target script
    pub fn new(config: ReadingConfig) -> Self {
        let classifier = UnicodeBlockClassifier::new(config.script.blocks.clone());
        Self::with_classifier(config, classifier)
    }

    /// Create a reconstructor with a custom script classifier
    pub fn with_classifier(config: ReadingConfig, classifier: impl ScriptClassifier + 'static) -> Self {
        Self {
            config,
            classifier: Box::new(classifier),
        }
    }

    pub fn config(&self) -> &ReadingConfig {
        &self.config
    }

    /// Reconstruct text from validated detections
    pub fn reconstruct(&self, detections: &[Detection]) -> ReadingOutcome {
        self.build_page(detections).into_outcome()
    }

    /// Reconstruct text from raw detections, skipping malformed ones
    pub fn reconstruct_raw<I>(&self, raw: I) -> ReadingOutcome
    where
        I: IntoIterator<Item = RawDetection>,
    {
        self.build_page_raw(raw).into_outcome()
    }

    /// Build the ordered page for validated detections
    pub fn build_page(&self, detections: &[Detection]) -> Page {
        let stats = PageStats {
            received: detections.len(),
            ..Default::default()
        };
        self.assemble(detections.iter(), stats)
    }

    /// Build the ordered page for raw detections, skipping malformed ones
    pub fn build_page_raw<I>(&self, raw: I) -> Page
    where
        I: IntoIterator<Item = RawDetection>,
    {
        let mut stats = PageStats::default();
        let mut detections = Vec::new();

        for (index, item) in raw.into_iter().enumerate() {
            stats.received += 1;
            match Detection::try_from(item) {
                Ok(detection) => detections.push(detection),
                Err(e) => {
                    warn!("Skipping malformed detection #{}: {}", index, e);
                    stats.rejected_malformed += 1;
                }
            }
        }

        self.assemble(detections.iter(), stats)
    }

    fn assemble<'a, I>(&self, detections: I, mut stats: PageStats) -> Page
    where
        I: Iterator<Item = &'a Detection>,
    {
        let mut candidates = Vec::new();
        for detection in detections {
            if !self.passes_confidence(detection) {
                stats.rejected_confidence += 1;
                continue;
            }
            if !self.classifier.is_target_script(&detection.text) {
                stats.rejected_script += 1;
                continue;
            }
            candidates.push(detection.to_candidate());
        }

        let mut clustered: Vec<(f64, usize, String)> = cluster_lines(candidates, self.config.line_tolerance)
            .into_iter()
            .map(|line| (line.mean_y(), line.len(), line.into_text()))
            .collect();

        // Stable sort keeps creation order for lines sharing a mean
        clustered.sort_by(|a, b| a.0.total_cmp(&b.0));

        let lines: Vec<PageLine> = clustered
            .into_iter()
            .map(|(mean_y, word_count, text)| {
                // A line with no tokens is never text, whatever the threshold
                let tokens = text.split_whitespace().count();
                PageLine {
                    degenerate: tokens == 0 || tokens < self.config.min_tokens_per_line,
                    text,
                    mean_y,
                    word_count,
                }
            })
            .collect();

        stats.lines = lines.len();
        stats.degenerate_lines = lines.iter().filter(|l| l.degenerate).count();

        debug!(
            "Reading order ({}): {} detections, {} malformed, {} low confidence, {} off-script, {} lines ({} degenerate)",
            self.config.script.name,
            stats.received,
            stats.rejected_malformed,
            stats.rejected_confidence,
            stats.rejected_script,
            stats.lines,
            stats.degenerate_lines
        );

        Page { lines, stats }
    }

    fn passes_confidence(&self, detection: &Detection) -> bool {
        match detection.confidence {
            Some(confidence) if self.config.min_confidence > 0.0 => confidence >= self.config.min_confidence,
            _ => true,
        }
    }
}

impl Default for ReadingOrderReconstructor {
    fn default() -> Self {
        Self::new(ReadingConfig::default())
    }
}
