//! Error taxonomy for the tagging pipeline.
//!
//! Mirrors the propagation policy in the specification: describer/OCR failures are
//! recovered locally by the orchestrator and must never reach this enum as an error —
//! only [`PdfError::StructuralConsistencyError`] and the CosLayer variants abort a run.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed PDF: {0}")]
    BadPdf(String),

    #[error("document is encrypted and no credentials were supplied")]
    Encrypted,

    #[error("failed to write output PDF: {0}")]
    WriteError(String),

    #[error("describer call failed: {0}")]
    DescriberFailure(String),

    #[error("OCR binding not available: {0}")]
    OcrUnavailable(String),

    #[error("validator subprocess exceeded its 120s timeout")]
    ValidationTimeout,

    #[error("validator binary not installed: {0}")]
    ValidatorNotInstalled(String),

    #[error("unknown PDF/UA validation profile: {0}")]
    InvalidProfile(String),

    #[error("internal consistency error: {0}")]
    StructuralConsistencyError(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid structure tree: {0}")]
    InvalidStructure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(
            PdfError::BadPdf("truncated xref".into()).to_string(),
            "malformed PDF: truncated xref"
        );
        assert_eq!(
            PdfError::Encrypted.to_string(),
            "document is encrypted and no credentials were supplied"
        );
        assert_eq!(
            PdfError::ValidationTimeout.to_string(),
            "validator subprocess exceeded its 120s timeout"
        );
    }

    #[test]
    fn io_error_is_wrapped() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: PdfError = io.into();
        assert!(matches!(err, PdfError::Io(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfError>();
    }
}
