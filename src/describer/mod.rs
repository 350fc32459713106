//! The `Describer` and `Ocr` collaborator interfaces (spec.md §1, §6): external vision-model
//! captioning and optional OCR enrichment, injected rather than hard-wired so a null
//! implementation still produces a valid, if less descriptive, document (spec.md §9).

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriberKind {
    Figure,
    Formula,
}

impl DescriberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriberKind::Figure => "figure",
            DescriberKind::Formula => "formula",
        }
    }
}

/// Captions an image or transcribes a formula region. Implementations call out to a
/// vision model; guidance on phrasing (brief for figures, explicit row-wise readout for
/// formulas, never prefixed "Image of") lives in the prompt, not in this trait.
#[async_trait::async_trait]
pub trait Describer: Send + Sync {
    async fn describe(&self, image_bytes: &[u8], context: &str, kind: DescriberKind) -> Result<String>;
}

/// Extracts text from an image with a confidence score in `[0.0, 1.0]`.
#[async_trait::async_trait]
pub trait Ocr: Send + Sync {
    async fn ocr(&self, image_bytes: &[u8]) -> Result<(String, f64)>;
}

/// Used when no vision-model endpoint is configured. Always fails so the orchestrator's
/// fallback-substitution path (spec.md §4.5) is exercised instead of silently emitting
/// an empty description.
pub struct NullDescriber;

#[async_trait::async_trait]
impl Describer for NullDescriber {
    async fn describe(&self, _image_bytes: &[u8], _context: &str, _kind: DescriberKind) -> Result<String> {
        Err(crate::error::PdfError::DescriberFailure(
            "no describer configured".to_string(),
        ))
    }
}

/// Used when no OCR binding is available; the orchestrator treats this as "OCR
/// unavailable" and skips enrichment rather than failing the run.
pub struct NullOcr;

#[async_trait::async_trait]
impl Ocr for NullOcr {
    async fn ocr(&self, _image_bytes: &[u8]) -> Result<(String, f64)> {
        Err(crate::error::PdfError::OcrUnavailable(
            "no OCR binding configured".to_string(),
        ))
    }
}
