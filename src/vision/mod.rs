//! Image Text Extraction
//!
//! Wires the external collaborators around the reading-order core:
//! an OCR provider supplies detections, the reconstructor orders them, and a
//! captioning provider describes the image when no text survives.

pub mod caption;
pub mod ocr;

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::reading::{RawDetection, ReadingOrderReconstructor, ReadingOutcome};

pub use caption::{CaptionError, OllamaCaptioner};
pub use ocr::{load_detections, parse_detections, DetectionFileProvider};

/// Source of unordered text detections for an image
pub trait OcrProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Detect text in an encoded image
    fn detect(&self, image: &[u8]) -> Result<Vec<RawDetection>>;
}

/// Describes an image in the target language
pub trait CaptionProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Produce a non-empty description of an encoded image
    fn describe(&self, image: &[u8]) -> Result<String, CaptionError>;
}

/// Where the final text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Reconstructed from OCR detections
    Ocr,
    /// Generated by the captioning fallback
    Caption,
}

/// Final text for one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedText {
    pub text: String,
    pub source: TextSource,
}

/// OCR-then-caption pipeline for single images
pub struct ImageTextExtractor {
    reconstructor: ReadingOrderReconstructor,
    ocr: Box<dyn OcrProvider>,
    captioner: Option<Box<dyn CaptionProvider>>,
}

impl ImageTextExtractor {
    /// Create an extractor without a captioning fallback
    pub fn new(reconstructor: ReadingOrderReconstructor, ocr: impl OcrProvider + 'static) -> Self {
        Self {
            reconstructor,
            ocr: Box::new(ocr),
            captioner: None,
        }
    }

    /// Attach the captioning fallback
    pub fn with_captioner(mut self, captioner: impl CaptionProvider + 'static) -> Self {
        self.captioner = Some(Box::new(captioner));
        self
    }

    pub fn reconstructor(&self) -> &ReadingOrderReconstructor {
        &self.reconstructor
    }

    /// Extract ordered text from an image, falling back to a caption
    pub fn extract(&self, image: &[u8]) -> Result<ExtractedText> {
        let start = Instant::now();

        let detections = self
            .ocr
            .detect(image)
            .with_context(|| format!("OCR provider '{}' failed", self.ocr.name()))?;

        let outcome = self.reconstructor.reconstruct_raw(detections);
        debug!("Reconstruction complete in {:?}", start.elapsed());

        self.finish(outcome, image)
    }

    /// Turn a reconstruction outcome into final text, invoking the fallback on `NoText`
    pub fn finish(&self, outcome: ReadingOutcome, image: &[u8]) -> Result<ExtractedText> {
        match outcome {
            ReadingOutcome::Text(text) => Ok(ExtractedText {
                text,
                source: TextSource::Ocr,
            }),
            ReadingOutcome::NoText => self.caption(image),
        }
    }

    fn caption(&self, image: &[u8]) -> Result<ExtractedText> {
        let Some(captioner) = &self.captioner else {
            warn!("No text survived filtering and captioning is disabled");
            return Err(CaptionError::Disabled.into());
        };

        info!("No text survived filtering, falling back to '{}' captioning", captioner.name());

        let text = captioner
            .describe(image)
            .with_context(|| format!("Captioning provider '{}' failed", captioner.name()))?;

        Ok(ExtractedText {
            text,
            source: TextSource::Caption,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockOcr {
        detections: Vec<RawDetection>,
    }

    impl OcrProvider for MockOcr {
        fn name(&self) -> &str {
            "mock"
        }

        fn detect(&self, _image: &[u8]) -> Result<Vec<RawDetection>> {
            Ok(self.detections.clone())
        }
    }

    struct FailingOcr;

    impl OcrProvider for FailingOcr {
        fn name(&self) -> &str {
            "failing"
        }

        fn detect(&self, _image: &[u8]) -> Result<Vec<RawDetection>> {
            anyhow::bail!("engine crashed")
        }
    }

    struct MockCaptioner {
        response: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    impl CaptionProvider for MockCaptioner {
        fn name(&self) -> &str {
            "mock"
        }

        fn describe(&self, _image: &[u8]) -> Result<String, CaptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response
                .clone()
                .ok_or_else(|| CaptionError::InvalidResponse("no caption".to_string()))
        }
    }

    fn raw(x: f64, y: f64, text: &str) -> RawDetection {
        RawDetection::new(vec![[x, y], [x + 40.0, y], [x + 40.0, y + 20.0], [x, y + 20.0]], text)
    }

    fn captioner(response: Option<&str>) -> (MockCaptioner, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mock = MockCaptioner {
            response: response.map(str::to_string),
            calls: calls.clone(),
        };
        (mock, calls)
    }

    #[test]
    fn test_ocr_text_skips_caption() {
        let ocr = MockOcr {
            detections: vec![raw(10.0, 100.0, "بكم"), raw(200.0, 101.0, "مرحبا")],
        };
        let (caption, calls) = captioner(Some("وصف"));
        let extractor = ImageTextExtractor::new(ReadingOrderReconstructor::default(), ocr).with_captioner(caption);

        let result = extractor.extract(b"image").unwrap();
        assert_eq!(result.text, "مرحبا بكم");
        assert_eq!(result.source, TextSource::Ocr);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_text_uses_caption() {
        let ocr = MockOcr {
            detections: vec![raw(10.0, 100.0, "logo"), raw(10.0, 300.0, "كلمة")],
        };
        let (caption, calls) = captioner(Some("رجل يقف أمام متجر"));
        let extractor = ImageTextExtractor::new(ReadingOrderReconstructor::default(), ocr).with_captioner(caption);

        let result = extractor.extract(b"image").unwrap();
        assert_eq!(result.text, "رجل يقف أمام متجر");
        assert_eq!(result.source, TextSource::Caption);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_detections_use_caption() {
        let ocr = MockOcr { detections: vec![] };
        let (caption, _) = captioner(Some("سماء زرقاء"));
        let extractor = ImageTextExtractor::new(ReadingOrderReconstructor::default(), ocr).with_captioner(caption);

        assert_eq!(extractor.extract(b"image").unwrap().source, TextSource::Caption);
    }

    #[test]
    fn test_no_text_without_captioner_is_error() {
        let ocr = MockOcr { detections: vec![] };
        let extractor = ImageTextExtractor::new(ReadingOrderReconstructor::default(), ocr);

        let err = extractor.extract(b"image").unwrap_err();
        assert!(matches!(err.downcast_ref::<CaptionError>(), Some(CaptionError::Disabled)));
    }

    #[test]
    fn test_caption_failure_propagates() {
        let ocr = MockOcr { detections: vec![] };
        let (caption, calls) = captioner(None);
        let extractor = ImageTextExtractor::new(ReadingOrderReconstructor::default(), ocr).with_captioner(caption);

        assert!(extractor.extract(b"image").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ocr_failure_propagates() {
        let (caption, calls) = captioner(Some("وصف"));
        let extractor =
            ImageTextExtractor::new(ReadingOrderReconstructor::default(), FailingOcr).with_captioner(caption);

        let err = extractor.extract(b"image").unwrap_err();
        assert!(format!("{:#}", err).contains("engine crashed"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_finish_passes_text_through() {
        let extractor = ImageTextExtractor::new(ReadingOrderReconstructor::default(), MockOcr { detections: vec![] });
        let result = extractor
            .finish(ReadingOutcome::Text("سطر واحد".to_string()), &[])
            .unwrap();
        assert_eq!(result.source, TextSource::Ocr);
    }

    #[test]
    fn test_extracted_text_serializes_source() {
        let value = serde_json::to_value(ExtractedText {
            text: "نص".to_string(),
            source: TextSource::Caption,
        })
        .unwrap();
        assert_eq!(value["source"], "caption");
    }
}
