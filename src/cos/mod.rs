//! CosLayer: loads and saves PDF object graphs and parses/re-emits content streams
//! (spec.md §4.1). "Cos" names the classic PDF object-graph layer (Carousel Object
//! System) that every higher layer — layout, structure, catalog — sits on top of.

pub mod content;
pub mod lexer;
mod writer;

use std::collections::{BTreeMap, HashMap};
use std::io::Read as _;
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Name, Object, ObjectId, Stream};

pub use content::{parse_content_stream, unparse_content_stream, Op};
use lexer::{Lexer, Token};

/// A loaded PDF: its full object graph plus the page order resolved from the page tree.
#[derive(Debug, Clone)]
pub struct Document {
    objects: HashMap<ObjectId, Object>,
    trailer: Dictionary,
    page_ids: Vec<ObjectId>,
    next_obj_num: u32,
}

impl Document {
    /// An empty document with a fresh, minimal catalog — used by tests and by
    /// `add-tags`-style flows that synthesise a document rather than loading one.
    pub fn empty() -> Self {
        let mut objects = HashMap::new();
        let pages_id = ObjectId(2, 0);
        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::name("Pages"));
        pages_dict.set("Kids", Object::Array(Vec::new()));
        pages_dict.set("Count", Object::Integer(0));
        objects.insert(pages_id, Object::Dictionary(pages_dict));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name("Catalog"));
        catalog.set("Pages", Object::Reference(pages_id));
        objects.insert(ObjectId(1, 0), Object::Dictionary(catalog));

        let mut trailer = Dictionary::new();
        trailer.set("Root", Object::Reference(ObjectId(1, 0)));

        Self {
            objects,
            trailer,
            page_ids: Vec::new(),
            next_obj_num: 3,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::load_bytes(&bytes)
    }

    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let (objects, trailer) = parse_objects(data)?;
        if trailer.contains_key("Encrypt") {
            return Err(PdfError::Encrypted);
        }
        let next_obj_num = objects.keys().map(|id| id.0).max().unwrap_or(0) + 1;

        let mut doc = Self {
            objects,
            trailer,
            page_ids: Vec::new(),
            next_obj_num,
        };
        doc.page_ids = doc.collect_pages()?;
        Ok(doc)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.save_bytes();
        std::fs::write(path, bytes).map_err(|e| PdfError::WriteError(e.to_string()))
    }

    pub fn save_bytes(&self) -> Vec<u8> {
        let ordered: BTreeMap<ObjectId, Object> = self.objects.clone().into_iter().collect();
        writer::write_document(&ordered, &self.trailer)
    }

    fn collect_pages(&self) -> Result<Vec<ObjectId>> {
        let root_id = self
            .trailer
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| PdfError::BadPdf("trailer has no /Root".to_string()))?;
        let catalog = self
            .get(root_id)
            .and_then(Object::as_dict)
            .ok_or_else(|| PdfError::BadPdf("catalog object missing".to_string()))?;
        let pages_id = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| PdfError::BadPdf("catalog has no /Pages".to_string()))?;

        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        self.walk_page_tree(pages_id, &mut out, &mut seen)?;
        Ok(out)
    }

    fn walk_page_tree(
        &self,
        node_id: ObjectId,
        out: &mut Vec<ObjectId>,
        seen: &mut std::collections::HashSet<ObjectId>,
    ) -> Result<()> {
        if !seen.insert(node_id) {
            return Err(PdfError::BadPdf("cyclic page tree".to_string()));
        }
        let dict = self
            .get(node_id)
            .and_then(Object::as_dict)
            .ok_or_else(|| PdfError::BadPdf(format!("dangling page tree node {node_id}")))?;
        match dict.get("Type").and_then(Object::as_name) {
            Some("Pages") => {
                let kids = dict
                    .get("Kids")
                    .and_then(Object::as_array)
                    .map(|a| a.to_vec())
                    .unwrap_or_default();
                for kid in kids {
                    if let Some(kid_id) = kid.as_reference() {
                        self.walk_page_tree(kid_id, out, seen)?;
                    }
                }
            }
            _ => out.push(node_id),
        }
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    /// Follows one level of indirection; PDF object graphs in practice never nest
    /// references more than one deep in the places CosLayer's callers care about.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.objects.get(id).unwrap_or(&Object::Null),
            other => other,
        }
    }

    pub fn catalog_id(&self) -> Option<ObjectId> {
        self.trailer.get("Root").and_then(Object::as_reference)
    }

    pub fn catalog(&self) -> Option<&Dictionary> {
        self.catalog_id().and_then(|id| self.get(id)).and_then(Object::as_dict)
    }

    pub fn catalog_mut(&mut self) -> Option<&mut Dictionary> {
        let id = self.catalog_id()?;
        self.objects.get_mut(&id).and_then(Object::as_dict_mut)
    }

    pub fn page_id(&self, index: usize) -> Option<ObjectId> {
        self.page_ids.get(index).copied()
    }

    pub fn page_dict(&self, index: usize) -> Option<&Dictionary> {
        self.page_id(index).and_then(|id| self.get(id)).and_then(Object::as_dict)
    }

    pub fn page_dict_mut(&mut self, index: usize) -> Option<&mut Dictionary> {
        let id = self.page_id(index)?;
        self.objects.get_mut(&id).and_then(Object::as_dict_mut)
    }

    /// Decodes and concatenates a page's content stream(s) (`/Contents` may be a single
    /// stream reference or an array of them) into one operator-ready byte buffer.
    pub fn page_content_bytes(&self, index: usize) -> Result<Vec<u8>> {
        let dict = self
            .page_dict(index)
            .ok_or_else(|| PdfError::BadPdf(format!("no such page {index}")))?;
        let contents = dict
            .get("Contents")
            .ok_or_else(|| PdfError::BadPdf(format!("page {index} has no /Contents")))?;

        let stream_ids: Vec<ObjectId> = match contents {
            Object::Reference(id) => vec![*id],
            Object::Array(items) => items.iter().filter_map(Object::as_reference).collect(),
            _ => Vec::new(),
        };

        let mut out = Vec::new();
        for id in stream_ids {
            if let Some(Object::Stream(stream)) = self.get(id) {
                out.extend_from_slice(&decode_stream(stream)?);
                out.push(b'\n');
            }
        }
        Ok(out)
    }

    /// Replaces a page's content with a single new stream built from `data`, compressed
    /// with `FlateDecode` the way the rest of the object graph's streams typically are.
    pub fn set_page_content(&mut self, index: usize, data: Vec<u8>) -> Result<()> {
        let page_id = self
            .page_id(index)
            .ok_or_else(|| PdfError::BadPdf(format!("no such page {index}")))?;

        let compressed = compress_flate(&data);
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("FlateDecode"));
        dict.set("Length", Object::Integer(compressed.len() as i64));
        let stream_id = self.make_stream(dict, compressed);

        if let Some(page_dict) = self.page_dict_mut(index) {
            page_dict.set("Contents", Object::Reference(stream_id));
        }
        let _ = page_id;
        Ok(())
    }

    /// Appends a new page to the document's page tree, linking it to the catalog's
    /// `/Pages` node. Used by `add-tags`-style flows and tests that synthesise a document
    /// from scratch rather than loading one (see [`Document::empty`]).
    pub fn add_page(&mut self, mut dict: Dictionary) -> ObjectId {
        if !dict.contains_key("Type") {
            dict.set("Type", Object::name("Page"));
        }

        let pages_id = self.catalog().and_then(|c| c.get("Pages")).and_then(Object::as_reference);
        if let Some(pages_id) = pages_id {
            dict.set("Parent", Object::Reference(pages_id));
        }

        let page_id = self.make_indirect(Object::Dictionary(dict));

        if let Some(pages_id) = pages_id {
            if let Some(pages_dict) = self.objects.get_mut(&pages_id).and_then(Object::as_dict_mut) {
                let mut kids = pages_dict
                    .get("Kids")
                    .and_then(Object::as_array)
                    .map(|k| k.to_vec())
                    .unwrap_or_default();
                kids.push(Object::Reference(page_id));
                let count = kids.len() as i64;
                pages_dict.set("Kids", Object::Array(kids));
                pages_dict.set("Count", Object::Integer(count));
            }
        }

        self.page_ids.push(page_id);
        page_id
    }

    pub fn make_indirect(&mut self, object: Object) -> ObjectId {
        let id = ObjectId(self.next_obj_num, 0);
        self.next_obj_num += 1;
        self.objects.insert(id, object);
        id
    }

    pub fn make_stream(&mut self, dict: Dictionary, data: Vec<u8>) -> ObjectId {
        self.make_indirect(Object::Stream(Stream::new(dict, data)))
    }

    /// Every indirect object whose dictionary's `/Type` equals `type_name`, e.g.
    /// `"StructElem"` — used by the structure-tree serialiser and `quick_check` to inspect
    /// what got written without keeping the original in-memory tree around.
    pub fn objects_by_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = (ObjectId, &'a Object)> + 'a {
        self.objects.iter().filter_map(move |(&id, obj)| {
            let matches = obj
                .as_dict()
                .and_then(|d| d.get("Type"))
                .and_then(Object::as_name)
                == Some(type_name);
            matches.then_some((id, obj))
        })
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }
}

fn decode_stream(stream: &Stream) -> Result<Vec<u8>> {
    let is_flate = match stream.dict.get("Filter") {
        Some(Object::Name(n)) => n.as_str() == "FlateDecode",
        Some(Object::Array(items)) => items
            .iter()
            .any(|o| matches!(o.as_name(), Some("FlateDecode"))),
        _ => false,
    };
    if !is_flate {
        return Ok(stream.data.clone());
    }
    let mut decoder = ZlibDecoder::new(&stream.data[..]);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| PdfError::BadPdf(format!("FlateDecode failed: {e}")))?;
    Ok(out)
}

fn compress_flate(data: &[u8]) -> Vec<u8> {
    use std::io::Write as _;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory write cannot fail");
    encoder.finish().expect("in-memory finish cannot fail")
}

/// Brute-force object-table reconstruction: scans the whole file for `N G obj` headers
/// rather than trusting the cross-reference table, which is routinely stale or absent in
/// the documents this engine is asked to repair. Mirrors the recovery mode real PDF
/// tools fall back to when `startxref` doesn't resolve.
fn parse_objects(data: &[u8]) -> Result<(HashMap<ObjectId, Object>, Dictionary)> {
    let mut lexer = Lexer::new(data);
    let mut objects = HashMap::new();
    let mut trailer = Dictionary::new();

    loop {
        let tok = match lexer.next_token() {
            Some(t) => t,
            None => break,
        };

        match tok {
            Token::Integer(num) if num >= 0 => {
                let after_num = lexer.position();
                match lexer.next_token() {
                    Some(Token::Integer(gen)) if gen >= 0 => {
                        match lexer.next_token() {
                            Some(Token::Keyword(ref k)) if k == "obj" => {
                                let id = ObjectId(num as u32, gen as u16);
                                let value = parse_value(&mut lexer);
                                let value = attach_stream_if_present(&mut lexer, data, value);
                                objects.insert(id, value);
                            }
                            _ => lexer.seek(after_num),
                        }
                    }
                    _ => lexer.seek(after_num),
                }
            }
            Token::Keyword(ref k) if k == "trailer" => {
                if let Some(Token::DictStart) = lexer.next_token() {
                    if let Object::Dictionary(d) = parse_dict_body(&mut lexer) {
                        for (key, value) in d.iter() {
                            trailer.set(key.as_str().to_string(), value.clone());
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if !trailer.contains_key("Root") {
        // No trailer keyword found (e.g. a file using only cross-reference streams, or
        // brute-force recovery on a file whose trailer got truncated): fall back to
        // whichever object declares itself `/Type /Catalog`.
        if let Some((&id, _)) = objects
            .iter()
            .find(|(_, obj)| matches!(obj.as_dict().and_then(|d| d.get("Type")).and_then(Object::as_name), Some("Catalog")))
        {
            trailer.set("Root", Object::Reference(id));
        } else {
            return Err(PdfError::BadPdf("no trailer and no /Catalog object found".to_string()));
        }
    }

    Ok((objects, trailer))
}

fn attach_stream_if_present(lexer: &mut Lexer, data: &[u8], value: Object) -> Object {
    let save = lexer.position();
    let next = lexer.next_token();
    if let Some(Token::Keyword(ref k)) = next {
        if k == "stream" {
            let dict = match value {
                Object::Dictionary(d) => d,
                other => {
                    // Malformed: `stream` keyword with no preceding dictionary. Treat the
                    // value as opaque and keep it rather than losing data.
                    lexer.seek(save);
                    return other;
                }
            };
            let mut start = lexer.position();
            if data.get(start) == Some(&b'\r') {
                start += 1;
            }
            if data.get(start) == Some(&b'\n') {
                start += 1;
            }
            let tail = &data[start..];
            let end_rel = find_subsequence(tail, b"endstream").unwrap_or(tail.len());
            let mut stream_end = start + end_rel;
            // Trim a single trailing EOL that precedes the `endstream` keyword.
            if stream_end > start && data.get(stream_end - 1) == Some(&b'\n') {
                stream_end -= 1;
            }
            if stream_end > start && data.get(stream_end - 1) == Some(&b'\r') {
                stream_end -= 1;
            }
            let raw = data[start..stream_end].to_vec();
            lexer.seek(start + end_rel + b"endstream".len());
            return Object::Stream(Stream::new(dict, raw));
        }
    }
    lexer.seek(save);
    value
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_value(lexer: &mut Lexer) -> Object {
    match lexer.next_token() {
        Some(tok) => parse_value_from(lexer, tok),
        None => Object::Null,
    }
}

fn parse_value_from(lexer: &mut Lexer, tok: Token) -> Object {
    match tok {
        Token::Integer(i) => {
            let after_first = lexer.position();
            if let Some(Token::Integer(g)) = lexer.next_token() {
                if let Some(Token::Keyword(ref k)) = lexer.next_token() {
                    if k == "R" {
                        return Object::Reference(ObjectId(i as u32, g as u16));
                    }
                }
            }
            lexer.seek(after_first);
            Object::Integer(i)
        }
        Token::Real(r) => Object::Real(r),
        Token::Name(n) => Object::Name(Name::new(n)),
        Token::String(s) => Object::String(s),
        Token::ArrayStart => {
            let mut items = Vec::new();
            loop {
                match lexer.next_token() {
                    Some(Token::ArrayEnd) | None => break,
                    Some(t) => items.push(parse_value_from(lexer, t)),
                }
            }
            Object::Array(items)
        }
        Token::DictStart => parse_dict_body(lexer),
        Token::Keyword(k) => match k.as_str() {
            "true" => Object::Boolean(true),
            "false" => Object::Boolean(false),
            _ => Object::Null,
        },
        Token::ArrayEnd | Token::DictEnd => Object::Null,
    }
}

fn parse_dict_body(lexer: &mut Lexer) -> Object {
    let mut dict = Dictionary::new();
    loop {
        match lexer.next_token() {
            Some(Token::DictEnd) | None => break,
            Some(Token::Name(key)) => {
                let value = parse_value(lexer);
                dict.set(key, value);
            }
            Some(_) => continue,
        }
    }
    Object::Dictionary(dict)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pdf() -> Vec<u8> {
        let body = b"%PDF-1.7\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
3 0 obj\n<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>\nendobj\n\
4 0 obj\n<< /Length 13 >>\nstream\nBT (hi) Tj ET\nendstream\nendobj\n\
trailer\n<< /Root 1 0 R >>\n%%EOF";
        body.to_vec()
    }

    #[test]
    fn loads_page_tree_and_content() {
        let doc = Document::load_bytes(&sample_pdf()).unwrap();
        assert_eq!(doc.page_count(), 1);
        let content = doc.page_content_bytes(0).unwrap();
        assert!(String::from_utf8_lossy(&content).contains("BT (hi) Tj ET"));
    }

    #[test]
    fn catalog_is_reachable() {
        let doc = Document::load_bytes(&sample_pdf()).unwrap();
        assert_eq!(doc.catalog().unwrap().get("Type").and_then(Object::as_name), Some("Catalog"));
    }

    #[test]
    fn encrypted_trailer_is_rejected() {
        let mut data = sample_pdf();
        let marker = b"trailer\n<< /Root 1 0 R >>";
        let pos = find_subsequence(&data, marker).unwrap();
        let replacement = b"trailer\n<< /Root 1 0 R /Encrypt 9 0 R >>".to_vec();
        data.splice(pos..pos + marker.len(), replacement);
        assert!(matches!(Document::load_bytes(&data), Err(PdfError::Encrypted)));
    }

    #[test]
    fn set_page_content_round_trips_through_flate() {
        let mut doc = Document::load_bytes(&sample_pdf()).unwrap();
        doc.set_page_content(0, b"/P << /MCID 0 >> BDC (x) Tj EMC".to_vec()).unwrap();
        let saved = doc.save_bytes();
        let reloaded = Document::load_bytes(&saved).unwrap();
        let content = reloaded.page_content_bytes(0).unwrap();
        assert!(String::from_utf8_lossy(&content).contains("BDC"));
    }

    #[test]
    fn empty_document_has_zero_pages() {
        assert_eq!(Document::empty().page_count(), 0);
    }

    #[test]
    fn add_page_registers_it_in_the_page_tree() {
        let mut doc = Document::empty();
        let page_id = doc.add_page(Dictionary::new());
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.page_id(0), Some(page_id));
        assert_eq!(doc.page_dict(0).and_then(|d| d.get("Type")).and_then(Object::as_name), Some("Page"));

        let second = doc.add_page(Dictionary::new());
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_id(1), Some(second));
    }
}
