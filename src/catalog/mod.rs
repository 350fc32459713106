//! CatalogWriter: idempotent finalisation of the document catalog and page annotations
//! (spec.md §4.8). Runs last in the pipeline, after the structure tree and ParentTree are
//! in place — it only ever touches the catalog, `Info`, page dictionaries, and
//! link-annotation dictionaries, never the content streams or structure tree.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::cos::Document;
use crate::objects::{Dictionary, Object, ObjectId};
use crate::xmp::XmpMetadata;

const PRODUCER: &str = "pdfua-tagger";

/// Counts of catalog-level changes made by a [`finalize`] call, surfaced by the `analyze`
/// and `make-accessible` CLI commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizeReport {
    pub title: String,
    pub pages_tabs_set: usize,
    pub links_enriched: usize,
}

/// Runs every CatalogWriter step (spec.md §4.8) against an already-tagged document.
/// `page1_largest_text` is the text of the largest-font block on page 1, as found by
/// [`crate::layout`]/[`crate::classifier`]; `file_stem` is the source file's name without
/// extension. Both feed the title fallback chain when `config.title` is unset.
pub fn finalize(
    doc: &mut Document,
    config: &Config,
    page1_largest_text: Option<&str>,
    file_stem: Option<&str>,
    now: DateTime<Utc>,
) -> FinalizeReport {
    set_mark_info(doc);
    set_lang(doc, &config.lang);
    set_viewer_preferences(doc);

    let title = resolve_title(config.title.as_deref(), page1_largest_text, file_stem);
    let author = existing_author(doc);
    set_doc_info_title(doc, &title);
    set_metadata(doc, &title, &author, &config.lang, now);

    let pages_tabs_set = set_tabs_for_pages_with_annots(doc);
    let links_enriched = enrich_link_annotations(doc);

    FinalizeReport {
        title,
        pages_tabs_set,
        links_enriched,
    }
}

/// `Root.MarkInfo = { /Marked true, /Suspects false }`.
fn set_mark_info(doc: &mut Document) {
    let mut mark_info = Dictionary::new();
    mark_info.set("Marked", Object::Boolean(true));
    mark_info.set("Suspects", Object::Boolean(false));
    if let Some(catalog) = doc.catalog_mut() {
        catalog.set("MarkInfo", Object::Dictionary(mark_info));
    }
}

/// `Root.Lang`, defaulting to `"en-US"` via `Config`'s own default.
fn set_lang(doc: &mut Document, lang: &str) {
    if let Some(catalog) = doc.catalog_mut() {
        catalog.set("Lang", Object::string(lang));
    }
}

/// `Root.ViewerPreferences.DisplayDocTitle = true`.
fn set_viewer_preferences(doc: &mut Document) {
    let mut viewer_prefs = Dictionary::new();
    viewer_prefs.set("DisplayDocTitle", Object::Boolean(true));
    if let Some(catalog) = doc.catalog_mut() {
        catalog.set("ViewerPreferences", Object::Dictionary(viewer_prefs));
    }
}

/// Configured title, then the largest-font string on page 1, then the file stem
/// (spec.md §4.8), falling back to a fixed placeholder if none of those are available.
fn resolve_title(configured: Option<&str>, page1_largest_text: Option<&str>, file_stem: Option<&str>) -> String {
    configured
        .filter(|s| !s.trim().is_empty())
        .or_else(|| page1_largest_text.filter(|s| !s.trim().is_empty()))
        .or_else(|| file_stem.filter(|s| !s.trim().is_empty()))
        .unwrap_or("Untitled")
        .to_string()
}

fn existing_author(doc: &Document) -> String {
    doc.trailer()
        .get("Info")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get(id))
        .and_then(Object::as_dict)
        .and_then(|info| info.get("Author"))
        .and_then(Object::as_string_bytes)
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default()
}

/// Sets `DocInfo.Title`, creating the `Info` dictionary as a fresh indirect object if the
/// document has none.
fn set_doc_info_title(doc: &mut Document, title: &str) {
    let info_id = match doc.trailer().get("Info").and_then(Object::as_reference) {
        Some(id) => id,
        None => {
            let id = doc.make_indirect(Object::Dictionary(Dictionary::new()));
            doc.trailer_mut().set("Info", Object::Reference(id));
            id
        }
    };
    if let Some(info) = doc.get_mut(info_id).and_then(Object::as_dict_mut) {
        info.set("Title", Object::string(title));
    }
}

fn set_metadata(doc: &mut Document, title: &str, author: &str, lang: &str, now: DateTime<Utc>) {
    let xmp = XmpMetadata::new(title, author, lang, PRODUCER, now);
    let stream_id = doc.make_indirect(Object::Stream(xmp.into_stream()));
    if let Some(catalog) = doc.catalog_mut() {
        catalog.set("Metadata", Object::Reference(stream_id));
    }
}

/// Sets `/Tabs /S` on every page that has a non-empty `/Annots` array and no `/Tabs`
/// already. Returns the number of pages changed.
fn set_tabs_for_pages_with_annots(doc: &mut Document) -> usize {
    let mut targets = Vec::new();
    for i in 0..doc.page_count() {
        if let Some(page) = doc.page_dict(i) {
            let has_annots = page
                .get("Annots")
                .and_then(Object::as_array)
                .map(|a| !a.is_empty())
                .unwrap_or(false);
            if has_annots && !page.contains_key("Tabs") {
                targets.push(i);
            }
        }
    }
    for i in &targets {
        if let Some(page) = doc.page_dict_mut(*i) {
            page.set("Tabs", Object::name("S"));
        }
    }
    targets.len()
}

/// Adds a synthesised `/Contents` string to every Link annotation missing one. Returns the
/// number of annotations changed.
fn enrich_link_annotations(doc: &mut Document) -> usize {
    let mut annot_ids: Vec<ObjectId> = Vec::new();
    for i in 0..doc.page_count() {
        if let Some(page) = doc.page_dict(i) {
            if let Some(annots) = page.get("Annots").and_then(Object::as_array) {
                annot_ids.extend(annots.iter().filter_map(Object::as_reference));
            }
        }
    }

    let mut enriched = 0;
    for id in annot_ids {
        let Some(dict) = doc.get_mut(id).and_then(Object::as_dict_mut) else {
            continue;
        };
        if dict.get("Subtype").and_then(Object::as_name) != Some("Link") {
            continue;
        }
        let has_contents = dict
            .get("Contents")
            .and_then(Object::as_string_bytes)
            .map(|b| !b.is_empty())
            .unwrap_or(false);
        if has_contents {
            continue;
        }

        let uri = dict
            .get("A")
            .and_then(Object::as_dict)
            .and_then(|action| action.get("URI"))
            .and_then(Object::as_string_bytes)
            .map(|b| String::from_utf8_lossy(b).into_owned());

        dict.set("Contents", Object::string(synthesize_link_contents(uri.as_deref())));
        enriched += 1;
    }
    enriched
}

/// Synthesises a `/Contents` string for a link annotation from its URI (spec.md §4.8).
fn synthesize_link_contents(uri: Option<&str>) -> String {
    let Some(uri) = uri else {
        return "Link".to_string();
    };

    if let Some(address) = uri.strip_prefix("mailto:") {
        return format!("Email link to {address}");
    }

    if let Some(rest) = uri.strip_prefix("https://").or_else(|| uri.strip_prefix("http://")) {
        let (host, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], rest[idx..].trim_matches('/')),
            None => (rest, ""),
        };
        let host = host.strip_prefix("www.").unwrap_or(host);
        return if path.is_empty() {
            format!("Link to {host}")
        } else {
            format!("Link to {path} on {host}")
        };
    }

    let truncated: String = uri.chars().take(50).collect();
    format!("Link: {truncated}")
}
