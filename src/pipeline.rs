//! Orchestrates every collaborator into the document-level workflows the CLI exposes:
//! `analyze`, `make-accessible`, `extract-figures`, `validate`, `add-tags`.
//!
//! Per page, a remediation run moves through five states: Unprocessed -> Classified ->
//! Rewritten -> Indexed -> Finalised. Layout extraction and classification produce the
//! Classified state for every page up front (the classifier's heading thresholds are
//! document-wide, so it cannot run per-page in isolation); the content-stream rewrite
//! then advances every page to Rewritten; the structure tree builds in one pass
//! (Indexed); catalog finalisation finishes every page at once (Finalised). Only the
//! describer/OCR calls in between suspend -- everything else here is synchronous.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::alttext::{describe_document, AltTextResult};
use crate::catalog::{self, FinalizeReport};
use crate::classifier::{classify_document, ClassifiedBlock, PageLayout, Role};
use crate::config::Config;
use crate::cos::content::Op;
use crate::cos::{parse_content_stream, unparse_content_stream, Document};
use crate::describer::{DescriberKind, Ocr};
use crate::describer::Describer;
use crate::error::Result;
use crate::layout::extract::{extract_page, FontTable};
use crate::layout::{analyse_page, BBox, PageExtraction};
use crate::objects::{Dictionary, Object};
use crate::render::Rasterizer;
use crate::structure::builder::AltTextMap;
use crate::structure::{assign_struct_parents, build_structure_tree, struct_tree_root_present, write_struct_tree};
use crate::validator::{quick_check, QuickCheckReport};

/// A [`Describer`] wrapper that prepends the run's document-type hint to every call's
/// context string. Mirrors the original tool's `--doc-type` option: extra prompt context
/// for the vision model, not a structural switch.
struct ContextualDescriber {
    inner: Arc<dyn Describer>,
    doc_type: String,
}

#[async_trait::async_trait]
impl Describer for ContextualDescriber {
    async fn describe(&self, image_bytes: &[u8], context: &str, kind: DescriberKind) -> Result<String> {
        let hinted = if context.is_empty() {
            format!("Document type: {}.", self.doc_type)
        } else {
            format!("Document type: {}. {context}", self.doc_type)
        };
        self.inner.describe(image_bytes, &hinted, kind).await
    }
}

/// Caps how many describer calls are in flight at once and retries a transient failure a
/// fixed number of times before giving up to the orchestrator's own fallback path
/// (`Config::describer_concurrency`/`describer_retries`).
struct ManagedDescriber {
    inner: Arc<dyn Describer>,
    semaphore: Arc<Semaphore>,
    retries: u32,
}

#[async_trait::async_trait]
impl Describer for ManagedDescriber {
    async fn describe(&self, image_bytes: &[u8], context: &str, kind: DescriberKind) -> Result<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| crate::error::PdfError::Internal(format!("describer concurrency limiter closed: {e}")))?;
        let mut attempt = 0;
        loop {
            match self.inner.describe(image_bytes, context, kind).await {
                Ok(text) => return Ok(text),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    warn!(attempt, %err, "describer call failed, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

struct ManagedOcr {
    inner: Arc<dyn Ocr>,
    semaphore: Arc<Semaphore>,
}

#[async_trait::async_trait]
impl Ocr for ManagedOcr {
    async fn ocr(&self, image_bytes: &[u8]) -> Result<(String, f64)> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| crate::error::PdfError::Internal(format!("describer concurrency limiter closed: {e}")))?;
        self.inner.ocr(image_bytes).await
    }
}

/// Whether `doc` already carries tagged structure: skips the rewrite/structure pass and
/// re-runs only catalog finalisation on an already-tagged document, so `make-accessible`
/// stays idempotent and never produces duplicate MCIDs or structure leaves.
pub fn is_tagged_pdf(doc: &Document) -> bool {
    let marked = doc
        .catalog()
        .and_then(|c| c.get("MarkInfo"))
        .and_then(|m| doc.resolve(m).as_dict().cloned())
        .and_then(|d| d.get("Marked").and_then(Object::as_bool))
        .unwrap_or(false);
    marked || struct_tree_root_present(doc)
}

/// Bit 19 (`0x40000`) of a `/FontDescriptor`'s `/Flags`, ISO 32000-1 Table 123's
/// `ForceBold`. Falls back to a `BaseFont` name check for fonts with no descriptor at all
/// (common in simple, non-embedded-font documents this engine is asked to repair).
fn font_is_bold(doc: &Document, font_dict: &Dictionary) -> bool {
    let descriptor_bold = font_dict
        .get("FontDescriptor")
        .map(|d| doc.resolve(d))
        .and_then(Object::as_dict)
        .and_then(|descriptor| descriptor.get("Flags"))
        .and_then(Object::as_int)
        .map(|flags| flags & 0x40000 != 0)
        .unwrap_or(false);
    if descriptor_bold {
        return true;
    }
    font_dict
        .get("BaseFont")
        .and_then(Object::as_name)
        .map(|name| name.to_lowercase().contains("bold"))
        .unwrap_or(false)
}

/// Builds the `FontTable` `LayoutAnalyser` needs from a page's `/Resources/Font`
/// dictionary, translating `ForceBold` into this crate's bit-4 style-flag convention.
fn build_font_table(doc: &Document, page_index: usize) -> FontTable {
    let mut table = FontTable::new();
    let Some(fonts) = doc
        .page_dict(page_index)
        .and_then(|page| page.get("Resources"))
        .map(|r| doc.resolve(r))
        .and_then(Object::as_dict)
        .and_then(|resources| resources.get("Font"))
        .map(|f| doc.resolve(f))
        .and_then(Object::as_dict)
    else {
        return table;
    };

    for (name, font_ref) in fonts.iter() {
        if let Some(font_dict) = doc.resolve(font_ref).as_dict() {
            if font_is_bold(doc, font_dict) {
                table.insert(name.as_str().to_string(), 0x10);
            }
        }
    }
    table
}

/// Parses every page's content stream and classifies the whole document in one pass,
/// returning the parsed operators alongside the classification so a later rewrite doesn't
/// have to re-parse. A page with no `/Contents` at all is treated as blank rather than a
/// fatal error -- plenty of source documents this engine repairs have them.
fn extract_and_classify(doc: &Document) -> (Vec<Vec<Op>>, Vec<Vec<ClassifiedBlock>>) {
    let mut page_ops = Vec::with_capacity(doc.page_count());
    let mut layouts = Vec::with_capacity(doc.page_count());

    for page_index in 0..doc.page_count() {
        let ops = match doc.page_content_bytes(page_index) {
            Ok(bytes) => parse_content_stream(&bytes).unwrap_or_else(|err| {
                warn!(page_index, %err, "content stream failed to parse, treating page as blank");
                Vec::new()
            }),
            Err(err) => {
                warn!(page_index, %err, "page has no readable content stream, treating as blank");
                Vec::new()
            }
        };

        let fonts = build_font_table(doc, page_index);
        let extraction: PageExtraction = extract_page(&ops, &fonts);
        let (text_blocks, image_blocks) = analyse_page(&extraction);
        layouts.push(PageLayout { text_blocks, image_blocks });
        page_ops.push(ops);
    }

    let classified = classify_document(&layouts);
    (page_ops, classified)
}

/// The text of the largest-font text block on the document's first page, the heuristic
/// title fallback catalog finalisation uses ahead of the file stem.
fn largest_text_on_first_page(pages: &[Vec<ClassifiedBlock>]) -> Option<String> {
    pages.first()?.iter()
        .filter(|b| !matches!(b.role, Role::Figure) && !b.text.trim().is_empty())
        .max_by(|a, b| a.font_size_max.partial_cmp(&b.font_size_max).unwrap())
        .map(|b| b.text.clone())
}

fn rewrite_pages(doc: &mut Document, page_ops: &[Vec<Op>], pages: &[Vec<ClassifiedBlock>]) -> Result<()> {
    for (page_index, ops) in page_ops.iter().enumerate() {
        let blocks = pages.get(page_index).map(|v| v.as_slice()).unwrap_or(&[]);
        let rewritten = crate::rewriter::rewrite_page(ops, blocks);
        let bytes = unparse_content_stream(&rewritten);
        doc.set_page_content(page_index, bytes)?;
    }
    Ok(())
}

fn figure_and_formula_blocks(pages: &[Vec<ClassifiedBlock>]) -> usize {
    pages.iter().flatten().filter(|b| matches!(b.role, Role::Figure | Role::Formula)).count()
}

/// Assembles `Describer`/`Ocr` collaborators into the concurrency- and retry-bounded,
/// doc-type-aware pair the orchestrator actually calls.
fn wrap_collaborators(
    describer: Arc<dyn Describer>,
    ocr: Arc<dyn Ocr>,
    config: &Config,
    doc_type: &str,
) -> (Arc<dyn Describer>, Arc<dyn Ocr>) {
    let semaphore = Arc::new(Semaphore::new(config.describer_concurrency.max(1)));
    let managed_describer: Arc<dyn Describer> = Arc::new(ManagedDescriber {
        inner: describer,
        semaphore: Arc::clone(&semaphore),
        retries: config.describer_retries,
    });
    let hinted_describer: Arc<dyn Describer> = Arc::new(ContextualDescriber {
        inner: managed_describer,
        doc_type: doc_type.to_string(),
    });
    let managed_ocr: Arc<dyn Ocr> = Arc::new(ManagedOcr { inner: ocr, semaphore });
    (hinted_describer, managed_ocr)
}

async fn resolve_alt_text(
    pages: &[Vec<ClassifiedBlock>],
    doc: &Document,
    rasterizer: &dyn Rasterizer,
    describer: Arc<dyn Describer>,
    ocr: Arc<dyn Ocr>,
) -> Vec<AltTextResult> {
    describe_document(describer, ocr, pages, |page_index, block_index| {
        let block = pages[page_index].iter().find(|b| b.block_index == block_index);
        match block {
            Some(block) => rasterizer.render_block(doc, page_index, block),
            None => Vec::new(),
        }
    })
    .await
}

/// Summary of a `make-accessible`/`add-tags` run, surfaced by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationReport {
    pub pages: usize,
    pub skipped_already_tagged: bool,
    pub structure_elements: usize,
    pub figures_found: usize,
    pub figures_described: usize,
    pub figures_using_fallback: usize,
    pub finalize: FinalizeReport,
    pub alt_text_warnings: Vec<String>,
}

/// Runs the full remediation pipeline against `doc`: layout -> classify -> describe ->
/// rewrite -> structure -> finalize. If `doc` is already tagged, skips straight to
/// re-running catalog finalisation so a repeat run stays
/// idempotent instead of doubling up MCIDs and structure leaves.
pub async fn make_accessible(
    doc: &mut Document,
    config: &Config,
    describer: Arc<dyn Describer>,
    ocr: Arc<dyn Ocr>,
    rasterizer: &dyn Rasterizer,
    doc_type: &str,
    file_stem: Option<&str>,
    now: DateTime<Utc>,
) -> Result<RemediationReport> {
    if is_tagged_pdf(doc) {
        info!("document already tagged, re-running CatalogWriter only");
        let finalize = catalog::finalize(doc, config, None, file_stem, now);
        return Ok(RemediationReport {
            pages: doc.page_count(),
            skipped_already_tagged: true,
            structure_elements: 0,
            figures_found: 0,
            figures_described: 0,
            figures_using_fallback: 0,
            finalize,
            alt_text_warnings: Vec::new(),
        });
    }

    let (page_ops, pages) = extract_and_classify(doc);
    let figures_found = figure_and_formula_blocks(&pages);

    let (describer, ocr) = wrap_collaborators(describer, ocr, config, doc_type);
    let alt_results = resolve_alt_text(&pages, doc, rasterizer, describer, ocr).await;

    let mut alt_text = AltTextMap::new();
    let mut figures_described = 0;
    let mut figures_using_fallback = 0;
    let mut alt_text_warnings = Vec::new();
    for result in &alt_results {
        if result.used_fallback {
            figures_using_fallback += 1;
        } else {
            figures_described += 1;
        }
        for warning in &result.warnings {
            alt_text_warnings.push(format!("page {} block {}: {warning}", result.page_index, result.block_index));
        }
        alt_text.insert((result.page_index, result.block_index), result.alt_text.clone());
    }

    rewrite_pages(doc, &page_ops, &pages)?;

    let struct_parents: Vec<u32> = (0..doc.page_count() as u32).collect();
    let (tree, parent_tree) = build_structure_tree(&pages, &struct_parents, &alt_text)
        .map_err(crate::error::PdfError::StructuralConsistencyError)?;
    let structure_elements = tree.len();
    write_struct_tree(doc, &tree, &parent_tree)?;
    assign_struct_parents(doc, &struct_parents);

    let page1_title = largest_text_on_first_page(&pages);
    let finalize = catalog::finalize(doc, config, page1_title.as_deref(), file_stem, now);

    Ok(RemediationReport {
        pages: doc.page_count(),
        skipped_already_tagged: false,
        structure_elements,
        figures_found,
        figures_described,
        figures_using_fallback,
        finalize,
        alt_text_warnings,
    })
}

/// Structure-only remediation (no alt text generation), mirroring the original tool's
/// `add-tags` command: always routes through `NullDescriber`/`NullOcr`, so every figure
/// lands on the fixed fallback alt text rather than calling out to a vision model.
pub async fn add_tags(
    doc: &mut Document,
    config: &Config,
    rasterizer: &dyn Rasterizer,
    file_stem: Option<&str>,
    now: DateTime<Utc>,
) -> Result<RemediationReport> {
    let describer: Arc<dyn Describer> = Arc::new(crate::describer::NullDescriber);
    let ocr: Arc<dyn Ocr> = Arc::new(crate::describer::NullOcr);
    make_accessible(doc, config, describer, ocr, rasterizer, "document", file_stem, now).await
}

/// One extracted figure/formula, cropped and described, for the `extract-figures`
/// command: a thin consumer of layout extraction, context gathering, and alt-text
/// description that never mutates the document.
#[derive(Debug, Clone)]
pub struct ExtractedFigure {
    pub page_index: usize,
    pub block_index: usize,
    pub bbox: BBox,
    pub role: Role,
    pub image_bytes: Vec<u8>,
    pub context: String,
    pub alt_text: String,
}

pub async fn extract_figures(
    doc: &Document,
    config: &Config,
    describer: Arc<dyn Describer>,
    ocr: Arc<dyn Ocr>,
    rasterizer: &dyn Rasterizer,
    doc_type: &str,
) -> Vec<ExtractedFigure> {
    let (_page_ops, pages) = extract_and_classify(doc);
    let (describer, ocr) = wrap_collaborators(describer, ocr, config, doc_type);
    let alt_results = resolve_alt_text(&pages, doc, rasterizer, describer, ocr).await;

    let mut alt_by_block: HashMap<(usize, usize), &AltTextResult> = HashMap::new();
    for result in &alt_results {
        alt_by_block.insert((result.page_index, result.block_index), result);
    }

    let mut figures = Vec::new();
    for page in &pages {
        for block in page {
            if !matches!(block.role, Role::Figure | Role::Formula) {
                continue;
            }
            let image_bytes = rasterizer.render_block(doc, block.page_index, block);
            let context = crate::context::extract_context(block, page);
            let alt_text = alt_by_block
                .get(&(block.page_index, block.block_index))
                .map(|r| r.alt_text.clone())
                .unwrap_or_default();
            figures.push(ExtractedFigure {
                page_index: block.page_index,
                block_index: block.block_index,
                bbox: block.bbox,
                role: block.role,
                image_bytes,
                context,
                alt_text,
            });
        }
    }
    figures
}

/// A point-in-time accessibility snapshot for the `analyze` command: cheap, read-only,
/// and safe to run against an untagged document.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub page_count: usize,
    pub is_tagged: bool,
    pub has_struct_tree: bool,
    pub lang: Option<String>,
    pub title: Option<String>,
    pub figures_found: usize,
    pub figures_with_alt: usize,
    pub quick_check: QuickCheckReport,
}

pub fn analyze_document(doc: &Document) -> AnalysisReport {
    let catalog = doc.catalog();
    let lang = catalog
        .and_then(|c| c.get("Lang"))
        .and_then(Object::as_string_bytes)
        .map(|b| String::from_utf8_lossy(b).into_owned());
    let title = doc
        .trailer()
        .get("Info")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get(id))
        .and_then(Object::as_dict)
        .and_then(|info| info.get("Title"))
        .and_then(Object::as_string_bytes)
        .map(|b| String::from_utf8_lossy(b).into_owned());

    let (with_alt, total) = crate::structure::alt_text_coverage(doc)
        .values()
        .fold((0, 0), |(alt_acc, total_acc), (alt, total)| (alt_acc + alt, total_acc + total));

    let figures_found = if total > 0 {
        total
    } else {
        let (_, pages) = extract_and_classify(doc);
        figure_and_formula_blocks(&pages)
    };

    AnalysisReport {
        page_count: doc.page_count(),
        is_tagged: is_tagged_pdf(doc),
        has_struct_tree: struct_tree_root_present(doc),
        lang,
        title,
        figures_found,
        figures_with_alt: with_alt,
        quick_check: quick_check(doc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cos::Document;
    use crate::objects::{Dictionary, Object};

    struct StubDescriber;

    #[async_trait::async_trait]
    impl Describer for StubDescriber {
        async fn describe(&self, _image_bytes: &[u8], _context: &str, _kind: DescriberKind) -> Result<String> {
            Ok("A stub description of the figure.".to_string())
        }
    }

    struct StubOcr;

    #[async_trait::async_trait]
    impl Ocr for StubOcr {
        async fn ocr(&self, _image_bytes: &[u8]) -> Result<(String, f64)> {
            Err(crate::error::PdfError::OcrUnavailable("stub has no ocr".into()))
        }
    }

    fn text_content(text: &str, size: i64) -> Vec<u8> {
        format!("BT /F1 {size} Tf 1 0 0 1 0 700 Tm ({text}) Tj ET").into_bytes()
    }

    fn doc_with_page(content: Vec<u8>) -> Document {
        let mut doc = Document::empty();
        let mut page = Dictionary::new();
        let stream_id = doc.make_stream(Dictionary::new(), content);
        page.set("Contents", Object::Reference(stream_id));
        doc.add_page(page);
        doc
    }

    #[tokio::test]
    async fn make_accessible_tags_a_simple_untagged_document() {
        let mut doc = doc_with_page(text_content("Introduction", 24));
        let config = Config::default();
        let describer: Arc<dyn Describer> = Arc::new(StubDescriber);
        let ocr: Arc<dyn Ocr> = Arc::new(StubOcr);
        let report = make_accessible(
            &mut doc,
            &config,
            describer,
            ocr,
            &crate::render::NullRasterizer,
            "academic paper",
            Some("report"),
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(!report.skipped_already_tagged);
        assert!(is_tagged_pdf(&doc));
        assert!(struct_tree_root_present(&doc));
        assert_eq!(report.finalize.title, "Introduction");
    }

    #[tokio::test]
    async fn make_accessible_is_idempotent_on_a_second_run() {
        let mut doc = doc_with_page(text_content("Introduction", 24));
        let config = Config::default();
        make_accessible(
            &mut doc,
            &config,
            Arc::new(StubDescriber),
            Arc::new(StubOcr),
            &crate::render::NullRasterizer,
            "academic paper",
            Some("report"),
            Utc::now(),
        )
        .await
        .unwrap();

        let struct_elem_count_before = doc.objects_by_type("StructElem").count();

        let report = make_accessible(
            &mut doc,
            &config,
            Arc::new(StubDescriber),
            Arc::new(StubOcr),
            &crate::render::NullRasterizer,
            "academic paper",
            Some("report"),
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(report.skipped_already_tagged);
        assert_eq!(doc.objects_by_type("StructElem").count(), struct_elem_count_before);
    }

    #[tokio::test]
    async fn add_tags_uses_fallback_alt_text_for_figures() {
        let mut doc = Document::empty();
        let mut page = Dictionary::new();
        let content = b"q 50 0 0 50 10 20 cm /Im0 Do Q".to_vec();
        let stream_id = doc.make_stream(Dictionary::new(), content);
        page.set("Contents", Object::Reference(stream_id));
        doc.add_page(page);

        let config = Config::default();
        let report = add_tags(&mut doc, &config, &crate::render::NullRasterizer, Some("scan"), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.figures_found, 1);
        assert_eq!(report.figures_using_fallback, 1);
        assert_eq!(report.figures_described, 0);
    }

    #[tokio::test]
    async fn analyze_on_empty_document_reports_untagged() {
        let doc = Document::empty();
        let report = analyze_document(&doc);
        assert!(!report.is_tagged);
        assert!(!report.has_struct_tree);
        assert_eq!(report.figures_found, 0);
    }

    #[tokio::test]
    async fn analyze_reports_doc_info_title_with_no_metadata_stream() {
        let mut doc = Document::empty();
        let mut info = Dictionary::new();
        info.set("Title", Object::string("Quarterly Report"));
        let info_id = doc.make_indirect(Object::Dictionary(info));
        doc.trailer_mut().set("Info", Object::Reference(info_id));

        let report = analyze_document(&doc);
        assert_eq!(report.title.as_deref(), Some("Quarterly Report"));
    }

    #[tokio::test]
    async fn extract_figures_returns_one_entry_per_image_block() {
        let mut doc = Document::empty();
        let mut page = Dictionary::new();
        let content = b"q 50 0 0 50 10 20 cm /Im0 Do Q".to_vec();
        let stream_id = doc.make_stream(Dictionary::new(), content);
        page.set("Contents", Object::Reference(stream_id));
        doc.add_page(page);

        let figures = extract_figures(
            &doc,
            &Config::default(),
            Arc::new(StubDescriber),
            Arc::new(StubOcr),
            &crate::render::NullRasterizer,
            "academic paper",
        )
        .await;
        assert_eq!(figures.len(), 1);
        assert_eq!(figures[0].alt_text, "A stub description of the figure.");
    }
}
