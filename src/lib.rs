//! ocr-reading-order - right-to-left reading-order reconstruction for OCR output
//!
//! Takes the unordered quadrilateral detections an OCR engine returns for one
//! image, keeps the target-script ones, clusters them into visual lines, and
//! emits the lines top to bottom with words ordered right to left. When no
//! usable text survives, the caller is told so explicitly and can fall back
//! to an image caption.

pub mod batch;
pub mod config;
pub mod reading;
pub mod vision;

pub use reading::{
    Detection, Page, Point, Quad, RawDetection, ReadingConfig, ReadingOrderReconstructor,
    ReadingOutcome,
};
pub use vision::{ExtractedText, ImageTextExtractor, TextSource};
