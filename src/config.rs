//! Pipeline configuration. No part of the pipeline reads process-global state or
//! environment variables directly — everything is threaded through as a `Config`.

use std::path::PathBuf;
use std::time::Duration;

/// Which external PDF/UA (or PDF/A) profile the [`crate::validator`] should check against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationProfile {
    Ua1,
    Ua2,
    A1a,
    A1b,
    A2a,
    A2b,
    A3a,
    A3b,
    A4,
    A4e,
    A4f,
}

impl ValidationProfile {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "ua1" => Self::Ua1,
            "ua2" => Self::Ua2,
            "1a" => Self::A1a,
            "1b" => Self::A1b,
            "2a" => Self::A2a,
            "2b" => Self::A2b,
            "3a" => Self::A3a,
            "3b" => Self::A3b,
            "4" => Self::A4,
            "4e" => Self::A4e,
            "4f" => Self::A4f,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ua1 => "ua1",
            Self::Ua2 => "ua2",
            Self::A1a => "1a",
            Self::A1b => "1b",
            Self::A2a => "2a",
            Self::A2b => "2b",
            Self::A3a => "3a",
            Self::A3b => "3b",
            Self::A4 => "4",
            Self::A4e => "4e",
            Self::A4f => "4f",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Document language written to `Root.Lang` and the XMP packet when none is present.
    pub lang: String,
    /// Configured document title, takes priority over heuristic title detection.
    pub title: Option<String>,
    /// Directory uploaded files are read from (CLI/HTTP front-ends only).
    pub upload_dir: Option<PathBuf>,
    /// Directory output files are written to.
    pub output_dir: Option<PathBuf>,
    /// Name of the validator binary to invoke (e.g. `verapdf`).
    pub validator_bin: String,
    /// Profile passed to the validator.
    pub validation_profile: ValidationProfile,
    /// Hard wall-clock timeout for the validator subprocess (spec: 120s).
    pub validation_timeout: Duration,
    /// Maximum concurrent describer/OCR calls in flight.
    pub describer_concurrency: usize,
    /// Number of retries for a transient describer failure before falling back.
    pub describer_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lang: "en-US".to_string(),
            title: None,
            upload_dir: None,
            output_dir: None,
            validator_bin: "verapdf".to_string(),
            validation_profile: ValidationProfile::Ua1,
            validation_timeout: Duration::from_secs(120),
            describer_concurrency: 4,
            describer_retries: 2,
        }
    }
}
