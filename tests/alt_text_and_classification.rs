//! spec.md §8 property 3 (alt presence on every Figure/Formula StructElem) and two of the
//! boundary cases: zero-figure/zero-text documents, and PUA-encoded mathematical glyphs
//! forcing a `Formula` classification.

use std::sync::Arc;

use chrono::Utc;
use pdfua_tagger::cos::Document;
use pdfua_tagger::describer::{NullDescriber, NullOcr};
use pdfua_tagger::objects::{Dictionary, Object};
use pdfua_tagger::pipeline::make_accessible;
use pdfua_tagger::render::NullRasterizer;
use pdfua_tagger::structure::{alt_text_coverage, struct_tree_root_present};
use pdfua_tagger::Config;

/// Sums `alt_text_coverage`'s per-role buckets; these tests only care about the totals
/// across Figure and Formula, not the per-role split.
fn total_coverage(doc: &Document) -> (usize, usize) {
    alt_text_coverage(doc)
        .values()
        .fold((0, 0), |(alt, total), (a, t)| (alt + a, total + t))
}

fn doc_with_page(content: Vec<u8>) -> Document {
    let mut doc = Document::empty();
    let mut page = Dictionary::new();
    let stream_id = doc.make_stream(Dictionary::new(), content);
    page.set("Contents", Object::Reference(stream_id));
    doc.add_page(page);
    doc
}

async fn tag_document(mut doc: Document) -> Document {
    let config = Config::default();
    make_accessible(
        &mut doc,
        &config,
        Arc::new(NullDescriber),
        Arc::new(NullOcr),
        &NullRasterizer,
        "academic paper",
        Some("report"),
        Utc::now(),
    )
    .await
    .unwrap();
    doc
}

#[tokio::test]
async fn figure_gets_nonempty_alt_text_even_on_describer_failure() {
    let content = b"q 50 0 0 50 10 20 cm /Im0 Do Q".to_vec();
    let doc = tag_document(doc_with_page(content)).await;

    let (with_alt, total) = total_coverage(&doc);
    assert_eq!(total, 1, "exactly one Figure element expected");
    assert_eq!(with_alt, 1, "every Figure must carry a non-empty /Alt");
}

#[tokio::test]
async fn pua_encoded_glyphs_classify_as_formula_and_get_alt_text() {
    // U+E001 is inside the Private Use Area; short, low alphabetic-fraction text next to
    // it must trip the formula heuristic ahead of the heading/paragraph tests.
    let formula_text = "\u{E001} = 2";
    let content = format!("BT /F1 12 Tf 1 0 0 1 0 700 Tm ({formula_text}) Tj ET").into_bytes();
    let doc = tag_document(doc_with_page(content)).await;

    let (with_alt, total) = total_coverage(&doc);
    assert_eq!(total, 1, "the PUA block must be classified Formula, not P");
    assert_eq!(with_alt, 1);
}

#[tokio::test]
async fn zero_figure_zero_text_document_still_gets_a_valid_empty_tree() {
    let doc = tag_document(doc_with_page(Vec::new())).await;

    assert!(struct_tree_root_present(&doc), "StructTreeRoot must exist even with no content");
    let marked = doc
        .catalog()
        .and_then(|c| c.get("MarkInfo"))
        .and_then(|m| doc.resolve(m).as_dict().cloned())
        .and_then(|d| d.get("Marked").and_then(Object::as_bool))
        .unwrap_or(false);
    assert!(marked, "MarkInfo.Marked must be true regardless of content");

    let (with_alt, total) = total_coverage(&doc);
    assert_eq!((with_alt, total), (0, 0));
}

#[tokio::test]
async fn numeric_bracketed_matrix_block_classifies_as_formula() {
    let content = b"BT /F1 11 Tf 1 0 0 1 0 700 Tm ([16000 23; 33000 47; 21000 35]) Tj ET".to_vec();
    let doc = tag_document(doc_with_page(content)).await;

    let (with_alt, total) = total_coverage(&doc);
    assert_eq!(total, 1);
    assert_eq!(with_alt, 1);
}
