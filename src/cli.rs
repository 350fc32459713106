//! Command-line surface: `analyze`, `make-accessible`, `extract-figures`,
//! `validate`, `add-tags`. Each command loads a [`Document`], drives [`crate::pipeline`]
//! and (where relevant) [`crate::validator`]/[`crate::scoring`], and prints a report.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::config::{Config, ValidationProfile};
use crate::cos::Document;
use crate::describer::{NullDescriber, NullOcr};
use crate::error::Result;
use crate::pipeline::{self, AnalysisReport, RemediationReport};
use crate::render::NullRasterizer;
use crate::scoring;
use crate::validator;

const DEFAULT_DOC_TYPE: &str = "academic paper";

#[derive(Parser)]
#[command(name = "pdfua-tagger")]
#[command(author, version)]
#[command(about = "Make PDFs accessible: tag structure, describe figures, validate PDF/UA-1 compliance")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze a PDF's current accessibility status
    Analyze {
        pdf_path: PathBuf,
        /// Emit the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Make a PDF accessible: add structure tags and alt text, then validate
    MakeAccessible {
        pdf_path: PathBuf,
        /// Output file path (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Document type, given to the describer as extra context
        #[arg(long, default_value = DEFAULT_DOC_TYPE)]
        doc_type: String,
    },
    /// Extract figures and formulas from a PDF
    ExtractFigures {
        pdf_path: PathBuf,
        /// Directory to save extracted images into
        #[arg(short, long)]
        save_to: Option<PathBuf>,
        #[arg(long, default_value = DEFAULT_DOC_TYPE)]
        doc_type: String,
    },
    /// Run the full external PDF/UA validator and print the MorphMind score
    Validate {
        pdf_path: PathBuf,
        /// Validation profile to check against
        #[arg(long, default_value = "ua1")]
        profile: String,
    },
    /// Add structure tags to a PDF without generating AI alt text
    AddTags {
        pdf_path: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn file_stem(path: &std::path::Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

fn checkmark(value: bool) -> &'static str {
    if value { "Yes ✓" } else { "No ✗" }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn print_analysis_table(report: &AnalysisReport) {
    println!("PDF Information");
    println!("  Pages                  {}", report.page_count);
    println!("  Tagged                 {}", checkmark(report.is_tagged));
    println!("  Has Structure Tree     {}", checkmark(report.has_struct_tree));
    println!("  Language Set           {}", report.lang.as_deref().unwrap_or("No ✗"));
    let title = report.title.as_deref().map(|t| truncate_chars(t, 50)).unwrap_or_else(|| "No ✗".to_string());
    println!("  Title                  {title}");
    println!("  Figures Found          {}", report.figures_found);
    println!("  Figures with Alt-text  {}", report.figures_with_alt);

    println!("\nValidation Results:");
    for check in &report.quick_check.passed {
        println!("  ✓ {check}");
    }
    for issue in &report.quick_check.issues {
        println!("  ✗ {issue}");
    }

    // Structural and metadata fixes (tagging, language, title) come before alt-text
    // fixes: they're prerequisites a validator checks before it even looks at figures.
    println!("\nRecommendations:");
    if !report.is_tagged {
        println!("  → Add structure tags: pdfua-tagger add-tags <pdf>");
    }
    if report.lang.is_none() {
        println!("  → Set a document language: pdfua-tagger make-accessible <pdf>");
    }
    if report.title.is_none() {
        println!("  → Set a document title: pdfua-tagger make-accessible <pdf>");
    }
    if report.figures_found > report.figures_with_alt {
        println!("  → Generate alt text: pdfua-tagger make-accessible <pdf>");
    }
    if report.quick_check.likely_valid {
        println!("  PDF appears to meet basic accessibility requirements!");
    }
}

fn print_remediation_report(report: &RemediationReport, output_path: &std::path::Path) {
    if report.skipped_already_tagged {
        println!("  Document already tagged, re-ran catalog finalisation only");
    } else {
        println!("  ✓ Found {} figures/formulas", report.figures_found);
        println!("  ✓ Described {} ({} used a fallback)", report.figures_described, report.figures_using_fallback);
        println!("  ✓ Built {} structure elements", report.structure_elements);
        for warning in &report.alt_text_warnings {
            println!("  ⚠ {warning}");
        }
    }
    println!("  ✓ Title: {}", report.finalize.title);
    println!("  ✓ Tabs order set on {} pages", report.finalize.pages_tabs_set);
    println!("  ✓ Enriched {} link annotations", report.finalize.links_enriched);
    println!("\nSuccess! Output: {}", output_path.display());
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze { pdf_path, json } => {
            let doc = Document::load(&pdf_path)?;
            let report = pipeline::analyze_document(&doc);
            if json {
                let text = serde_json::to_string_pretty(&report)
                    .expect("AnalysisReport always serialises");
                println!("{text}");
            } else {
                print_analysis_table(&report);
            }
            Ok(())
        }

        Command::MakeAccessible { pdf_path, output, doc_type } => {
            let mut doc = Document::load(&pdf_path)?;
            let config = Config::default();
            // The CLI ships no bundled vision-model client: library
            // consumers wire a real `Describer`/`Ocr` through `pipeline::make_accessible`
            // directly. Run through the Null collaborators here so alt text still lands
            // on its documented fallback text rather than failing the whole command.
            let describer = Arc::new(NullDescriber);
            let ocr = Arc::new(NullOcr);
            let report = pipeline::make_accessible(
                &mut doc,
                &config,
                describer,
                ocr,
                &NullRasterizer,
                &doc_type,
                file_stem(&pdf_path).as_deref(),
                Utc::now(),
            )
            .await?;

            let output_path = output.unwrap_or_else(|| pdf_path.clone());
            doc.save(&output_path)?;
            print_remediation_report(&report, &output_path);
            Ok(())
        }

        Command::ExtractFigures { pdf_path, save_to, doc_type } => {
            let doc = Document::load(&pdf_path)?;
            let config = Config::default();
            let figures = pipeline::extract_figures(
                &doc,
                &config,
                Arc::new(NullDescriber),
                Arc::new(NullOcr),
                &NullRasterizer,
                &doc_type,
            )
            .await;

            if figures.is_empty() {
                println!("No figures found in PDF");
                return Ok(());
            }

            println!("Found {} Figures", figures.len());
            println!("{:<6}{:<8}{:<14}BBox", "Page", "Index", "Size");
            for figure in &figures {
                let (x0, y0, x1, y1) = figure.bbox;
                println!(
                    "{:<6}{:<8}{:<14}({x0:.0}, {y0:.0}, {x1:.0}, {y1:.0})",
                    figure.page_index,
                    figure.block_index,
                    format!("{} bytes", figure.image_bytes.len()),
                );
            }

            if let Some(dir) = save_to {
                std::fs::create_dir_all(&dir)?;
                for figure in &figures {
                    let path = dir.join(format!("page{}_fig{}.png", figure.page_index, figure.block_index));
                    std::fs::write(&path, &figure.image_bytes)?;
                    println!("  {}", path.display());
                }
            }
            Ok(())
        }

        Command::Validate { pdf_path, profile } => {
            let pdf_bytes = std::fs::read(&pdf_path)?;
            let config = Config::default();
            let profile = ValidationProfile::parse(&profile).unwrap_or(config.validation_profile);
            let record = validator::validate(&pdf_bytes, profile, &config).await?;
            let result = scoring::score(&record);

            println!("Checks Passed: {}", record.summary.passed_rules);
            if !record.failures.is_empty() {
                println!("\nIssues Found:");
                // Structure/language/metadata fixes are prerequisites for alt text to
                // mean anything, so they're listed first; category order also matches
                // the score breakdown's own table (Structure, Language, Figures, ...).
                let mut failures: Vec<_> = record.failures.iter().collect();
                failures.sort_by_key(|f| scoring::categorize(f));
                for failure in failures {
                    println!("  ✗ {} ({}): {}", failure.clause, failure.test_number, failure.description);
                }
            }
            let status = if record.compliant { "LIKELY VALID" } else { "NEEDS WORK" };
            println!("\nOverall Status: {status}");
            println!("MorphMind score: {} ({})", result.value, result.grade.as_str());
            Ok(())
        }

        Command::AddTags { pdf_path, output } => {
            let mut doc = Document::load(&pdf_path)?;
            let config = Config::default();
            let report =
                pipeline::add_tags(&mut doc, &config, &NullRasterizer, file_stem(&pdf_path).as_deref(), Utc::now())
                    .await?;

            let output_path = output.unwrap_or_else(|| pdf_path.clone());
            doc.save(&output_path)?;
            println!("✓ Created tagged PDF: {}", output_path.display());
            println!("  Tagged: {}", pipeline::is_tagged_pdf(&doc));
            println!("  Title: {}", report.finalize.title);
            Ok(())
        }
    }
}
