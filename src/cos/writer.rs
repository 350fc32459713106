//! Serialises a [`super::Document`] back to PDF bytes: classic cross-reference table plus
//! trailer. No object streams or cross-reference streams — CosLayer only needs to emit
//! something every PDF/UA validator can read, not the most compact encoding.

use std::collections::BTreeMap;

use crate::objects::{Dictionary, Object, ObjectId};

use super::content::write_object;

pub fn write_document(objects: &BTreeMap<ObjectId, Object>, trailer: &Dictionary) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n");

    let max_obj_num = objects.keys().map(|id| id.0).max().unwrap_or(0);
    let mut offsets: Vec<Option<usize>> = vec![None; (max_obj_num + 1) as usize];

    for (id, object) in objects {
        offsets[id.0 as usize] = Some(out.len());
        out.extend_from_slice(format!("{} {} obj\n", id.0, id.1).as_bytes());
        write_top_level_object(&mut out, object);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", max_obj_num + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for num in 1..=max_obj_num {
        match offsets[num as usize] {
            Some(offset) => {
                out.extend_from_slice(format!("{:010} {:05} n \n", offset, 0).as_bytes());
            }
            None => out.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }

    let mut trailer = trailer.clone();
    trailer.set("Size", Object::Integer((max_obj_num + 1) as i64));
    out.extend_from_slice(b"trailer\n");
    let mut trailer_bytes = Vec::new();
    write_object(&mut trailer_bytes, &Object::Dictionary(trailer));
    out.extend_from_slice(&trailer_bytes);
    out.extend_from_slice(b"\nstartxref\n");
    out.extend_from_slice(xref_offset.to_string().as_bytes());
    out.extend_from_slice(b"\n%%EOF\n");

    out
}

fn write_top_level_object(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Stream(stream) => {
            let mut dict = stream.dict.clone();
            dict.set("Length", Object::Integer(stream.data.len() as i64));
            write_object(out, &Object::Dictionary(dict));
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.data);
            out.extend_from_slice(b"\nendstream");
        }
        other => write_object(out, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Stream;

    #[test]
    fn writes_parsable_header_and_trailer() {
        let mut objects = BTreeMap::new();
        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name("Catalog"));
        objects.insert(ObjectId(1, 0), Object::Dictionary(catalog));

        let mut trailer = Dictionary::new();
        trailer.set("Root", Object::Reference(ObjectId(1, 0)));

        let bytes = write_document(&objects, &trailer);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.7"));
        assert!(text.contains("1 0 obj"));
        assert!(text.contains("trailer"));
        assert!(text.contains("/Root 1 0 R"));
        assert!(text.ends_with("%%EOF\n"));
    }

    #[test]
    fn stream_length_recomputed_from_actual_bytes() {
        let mut objects = BTreeMap::new();
        let mut dict = Dictionary::new();
        dict.set("Length", Object::Integer(999));
        objects.insert(ObjectId(2, 0), Object::Stream(Stream::new(dict, b"hi".to_vec())));

        let bytes = write_document(&objects, &Dictionary::new());
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Length 2"));
        assert!(!text.contains("/Length 999"));
    }
}
