//! The external `Validator` collaborator (spec.md §6): invokes a PDF/UA validator
//! subprocess, parses its XML record into a closed set of fields, and offers an
//! in-process `quick_check` sanity pass that needs no subprocess at all.

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::{Config, ValidationProfile};
use crate::cos::Document;
use crate::error::{PdfError, Result};
use crate::objects::Object;
use crate::structure::{alt_text_coverage, struct_tree_root_present};

/// `summary` block of the validator's XML record.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ValidationSummary {
    #[serde(rename = "passed_rules")]
    pub passed_rules: u32,
    #[serde(rename = "failed_rules")]
    pub failed_rules: u32,
    #[serde(rename = "passed_checks")]
    pub passed_checks: u32,
    #[serde(rename = "failed_checks")]
    pub failed_checks: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CheckContext {
    #[serde(rename = "context")]
    pub context: String,
}

/// One failed PDF/UA rule, with the individual check contexts that triggered it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ValidationFailure {
    pub clause: String,
    #[serde(rename = "test_number")]
    pub test_number: i64,
    pub description: String,
    #[serde(default, rename = "checks")]
    pub checks: Vec<CheckContext>,
}

/// The full validator record (spec.md §6's "closed set of fields used").
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename = "report")]
pub struct ValidationRecord {
    pub compliant: bool,
    pub profile: String,
    pub summary: ValidationSummary,
    #[serde(default, rename = "failures")]
    pub failures: Vec<ValidationFailure>,
}

impl ValidationRecord {
    fn from_xml(xml: &str) -> Result<Self> {
        quick_xml::de::from_str(xml)
            .map_err(|e| PdfError::BadPdf(format!("could not parse validator XML output: {e}")))
    }
}

/// Validates `pdf_bytes` against `profile` by invoking `config.validator_bin` as a
/// subprocess, feeding the PDF on stdin and reading its XML report from stdout. Hard
/// 120-second wall-clock timeout (spec.md §5); expiry is a `ValidationTimeout`, never a
/// partial result.
pub async fn validate(pdf_bytes: &[u8], profile: ValidationProfile, config: &Config) -> Result<ValidationRecord> {
    run_validator(pdf_bytes, profile, config, config.validation_timeout).await
}

async fn run_validator(
    pdf_bytes: &[u8],
    profile: ValidationProfile,
    config: &Config,
    wall_clock: Duration,
) -> Result<ValidationRecord> {
    let invocation = async {
        let mut child = Command::new(&config.validator_bin)
            .arg("--profile")
            .arg(profile.as_str())
            .arg("--format")
            .arg("xml")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PdfError::ValidatorNotInstalled(format!("{}: {e}", config.validator_bin)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(pdf_bytes)
                .await
                .map_err(|e| PdfError::BadPdf(format!("failed writing PDF to validator stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| PdfError::BadPdf(format!("validator subprocess failed: {e}")))?;

        if !output.status.success() {
            warn!(stderr = %String::from_utf8_lossy(&output.stderr), "validator exited non-zero");
        }

        let xml = String::from_utf8_lossy(&output.stdout).into_owned();
        ValidationRecord::from_xml(&xml)
    };

    match timeout(wall_clock, invocation).await {
        Ok(result) => result,
        Err(_) => Err(PdfError::ValidationTimeout),
    }
}

/// An in-process sanity pass over a tagged `Document`, needing no validator subprocess.
/// Not a substitute for full PDF/UA conformance, but catches the handful of structural
/// omissions a remediation run could plausibly leave behind (spec.md §6 "File formats").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickCheckReport {
    pub passed: Vec<String>,
    pub issues: Vec<String>,
    pub likely_valid: bool,
}

pub fn quick_check(doc: &Document) -> QuickCheckReport {
    let mut passed = Vec::new();
    let mut issues = Vec::new();

    let catalog = doc.catalog();

    let marked = catalog
        .and_then(|c| c.get("MarkInfo"))
        .and_then(|m| doc.resolve(m).as_dict().cloned())
        .and_then(|d| d.get("Marked").and_then(Object::as_bool))
        .unwrap_or(false);
    if marked {
        passed.push("MarkInfo.Marked is true".to_string());
    } else {
        issues.push("MarkInfo.Marked is missing or false".to_string());
    }

    let has_lang = catalog.map(|c| c.contains_key("Lang")).unwrap_or(false);
    if has_lang {
        passed.push("Root.Lang is set".to_string());
    } else {
        issues.push("Root.Lang is missing".to_string());
    }

    let has_title = catalog
        .and_then(|c| c.get("Metadata"))
        .is_some();
    if has_title {
        passed.push("Root.Metadata is present".to_string());
    } else {
        issues.push("Root.Metadata is missing".to_string());
    }

    if struct_tree_root_present(doc) {
        passed.push("StructTreeRoot is present".to_string());
    } else {
        issues.push("StructTreeRoot is missing".to_string());
    }

    let coverage = alt_text_coverage(doc);
    let total_figures: usize = coverage.values().map(|(_, total)| *total).sum();
    let with_alt: usize = coverage.values().map(|(alt, _)| *alt).sum();
    if total_figures == 0 {
        passed.push("document has no Figure/Formula elements requiring alt text".to_string());
    } else if with_alt == total_figures {
        passed.push(format!("all {total_figures} Figure/Formula elements carry /Alt"));
    } else {
        issues.push(format!("{} of {total_figures} Figure/Formula elements are missing /Alt", total_figures - with_alt));
    }

    let likely_valid = issues.is_empty();
    info!(likely_valid, issue_count = issues.len(), "quick_check completed");

    QuickCheckReport { passed, issues, likely_valid }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"
        <report>
            <compliant>false</compliant>
            <profile>ua1</profile>
            <summary>
                <passed_rules>20</passed_rules>
                <failed_rules>10</failed_rules>
                <passed_checks>120</passed_checks>
                <failed_checks>14</failed_checks>
            </summary>
            <failures>
                <failure>
                    <clause>7.1</clause>
                    <test_number>1</test_number>
                    <description>Figure lacks alternate description</description>
                    <checks>
                        <check><context>/Document/Figure[3]</context></check>
                    </checks>
                </failure>
            </failures>
        </report>
    "#;

    #[test]
    fn parses_validator_xml_into_record() {
        let record = ValidationRecord::from_xml(SAMPLE_XML).unwrap();
        assert!(!record.compliant);
        assert_eq!(record.profile, "ua1");
        assert_eq!(record.summary.passed_rules, 20);
        assert_eq!(record.summary.failed_rules, 10);
        assert_eq!(record.failures.len(), 1);
        assert_eq!(record.failures[0].clause, "7.1");
        assert_eq!(record.failures[0].checks[0].context, "/Document/Figure[3]");
    }

    #[test]
    fn malformed_xml_is_a_bad_pdf_error() {
        let result = ValidationRecord::from_xml("not xml at all");
        assert!(matches!(result, Err(PdfError::BadPdf(_))));
    }

    #[test]
    fn quick_check_on_empty_document_reports_missing_everything() {
        let doc = Document::empty();
        let report = quick_check(&doc);
        assert!(!report.likely_valid);
        assert!(report.issues.iter().any(|i| i.contains("MarkInfo")));
        assert!(report.issues.iter().any(|i| i.contains("Lang")));
        assert!(report.issues.iter().any(|i| i.contains("StructTreeRoot")));
    }

    #[test]
    fn quick_check_passes_when_no_figures_present() {
        let doc = Document::empty();
        let report = quick_check(&doc);
        assert!(report.passed.iter().any(|p| p.contains("no Figure/Formula")));
    }

    #[tokio::test]
    async fn missing_validator_binary_surfaces_not_installed() {
        let mut config = Config::default();
        config.validator_bin = "definitely-not-a-real-validator-binary".to_string();
        let result = run_validator(b"%PDF-1.7", ValidationProfile::Ua1, &config, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(PdfError::ValidatorNotInstalled(_))));
    }
}
