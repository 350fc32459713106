//! Supplies the raster bytes `AltTextOrchestrator` hands to the `Describer`/`Ocr`
//! collaborators. Rasterising an arbitrary content-stream region is a rendering engine in
//! its own right and out of scope for a tagging pass — so, like `Describer` and `Ocr`,
//! it is a trait-typed, injectable collaborator (spec.md §9) rather than a hard dependency.
//!
//! [`XObjectRasterizer`] covers the common case directly: a `Figure` block's bbox usually
//! comes from a single embedded image XObject, whose already-encoded bytes are exactly
//! what a vision model wants. `Formula` blocks have no such XObject — there is no text
//! layout engine here to paint glyphs into a raster — so those fall through to a blank
//! placeholder image via [`NullRasterizer`].

use std::io::Cursor;

use image::{ImageFormat, RgbImage};

use crate::classifier::{ClassifiedBlock, Role};
use crate::cos::Document;
use crate::objects::Object;

pub trait Rasterizer: Send + Sync {
    /// Produces PNG (or JPEG passthrough) bytes for `block`'s bbox on `page_index`.
    fn render_block(&self, doc: &Document, page_index: usize, block: &ClassifiedBlock) -> Vec<u8>;
}

fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width.max(1), height.max(1), image::Rgb([255, 255, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encoding an in-memory RgbImage as PNG cannot fail");
    bytes.into_inner()
}

/// Always returns a small blank placeholder image, regardless of block or document.
/// Used when no embedded-image extraction is wanted (tests) or as the fallback path for
/// blocks with no backing XObject.
pub struct NullRasterizer;

impl Rasterizer for NullRasterizer {
    fn render_block(&self, _doc: &Document, _page_index: usize, _block: &ClassifiedBlock) -> Vec<u8> {
        blank_png(1, 1)
    }
}

/// Extracts the raw bytes of a page's embedded image XObject for `Figure` blocks, looked
/// up in the page's `/Resources /XObject` dictionary by the name `LayoutAnalyser` recorded
/// against the block. `Formula` blocks (and any `Figure` whose XObject can't be resolved)
/// fall back to a blank placeholder the same size as the block's bbox.
pub struct XObjectRasterizer;

impl XObjectRasterizer {
    fn lookup_xobject_bytes(&self, doc: &Document, page_index: usize, xobject_name: &str) -> Option<Vec<u8>> {
        let page_dict = doc.page_dict(page_index)?;
        let resources = doc.resolve(page_dict.get("Resources")?).as_dict()?;
        let xobjects = doc.resolve(resources.get("XObject")?).as_dict()?;
        let xobject_ref = xobjects.get(xobject_name)?;
        match doc.resolve(xobject_ref) {
            Object::Stream(stream) => Some(stream.data.clone()),
            _ => None,
        }
    }
}

impl Rasterizer for XObjectRasterizer {
    fn render_block(&self, doc: &Document, page_index: usize, block: &ClassifiedBlock) -> Vec<u8> {
        if block.role == Role::Figure {
            if let Some(name) = &block.xobject_name {
                if let Some(bytes) = self.lookup_xobject_bytes(doc, page_index, name) {
                    return bytes;
                }
            }
        }
        let (x0, y0, x1, y1) = block.bbox;
        let width = (x1 - x0).abs().round().max(1.0) as u32;
        let height = (y1 - y0).abs().round().max(1.0) as u32;
        blank_png(width.min(4096), height.min(4096))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Dictionary, Stream};

    fn figure_block(xobject_name: &str) -> ClassifiedBlock {
        ClassifiedBlock {
            page_index: 0,
            block_index: 0,
            bbox: (0.0, 0.0, 40.0, 30.0),
            role: Role::Figure,
            text: String::new(),
            font_size_max: 0.0,
            is_bold: false,
            xobject_name: Some(xobject_name.to_string()),
        }
    }

    #[test]
    fn null_rasterizer_always_returns_decodable_png() {
        let doc = Document::empty();
        let bytes = NullRasterizer.render_block(&doc, 0, &figure_block("Im0"));
        assert!(image::load_from_memory(&bytes).is_ok());
    }

    #[test]
    fn xobject_rasterizer_extracts_embedded_image_bytes() {
        let mut doc = Document::empty();
        let mut img_dict = Dictionary::new();
        img_dict.set("Subtype", Object::name("Image"));
        let img_id = doc.make_stream(img_dict, b"fake-jpeg-bytes".to_vec());

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(img_id));
        let xobjects_id = doc.make_indirect(Object::Dictionary(xobjects));

        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Reference(xobjects_id));
        let resources_id = doc.make_indirect(Object::Dictionary(resources));

        let mut page = Dictionary::new();
        page.set("Resources", Object::Reference(resources_id));
        doc.add_page(page);

        let bytes = XObjectRasterizer.render_block(&doc, 0, &figure_block("Im0"));
        assert_eq!(bytes, b"fake-jpeg-bytes");
    }

    #[test]
    fn formula_block_falls_back_to_blank_image_sized_to_bbox() {
        let doc = Document::empty();
        let block = ClassifiedBlock {
            page_index: 0,
            block_index: 0,
            bbox: (0.0, 0.0, 64.0, 16.0),
            role: Role::Formula,
            text: "x = y".to_string(),
            font_size_max: 11.0,
            is_bold: false,
            xobject_name: None,
        };
        let bytes = XObjectRasterizer.render_block(&doc, 0, &block);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 16);
    }

    #[test]
    fn missing_xobject_falls_back_to_blank_image() {
        let doc = Document::empty();
        let bytes = XObjectRasterizer.render_block(&doc, 0, &figure_block("DoesNotExist"));
        assert!(image::load_from_memory(&bytes).is_ok());
    }
}
