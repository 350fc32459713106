//! XMP metadata packet emission for `Root.Metadata` (spec.md §4.8).
//!
//! Only emission is needed: the document model carries title/creator/language directly,
//! so re-running `make-accessible` rebuilds the packet from scratch rather than parsing
//! the previous one back — idempotence (spec.md §8 property 4) holds for every field
//! except the three timestamps, which are refreshed on each run by design.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::objects::{Dictionary, Name, Object, Stream};

const PDFUAID_PART: &str = "1";
const PADDING_BYTES: usize = 2000;

/// The handful of Dublin Core / XMP / PDF/UA properties the catalog writer attaches to a
/// remediated document (spec.md §4.8). Producer is fixed; everything else comes from the
/// run's `Config` or the source document's existing `Info` dictionary.
#[derive(Debug, Clone)]
pub struct XmpMetadata {
    pub title: String,
    pub creator: String,
    pub language: String,
    pub producer: String,
    pub create_date: DateTime<Utc>,
    pub modify_date: DateTime<Utc>,
    pub metadata_date: DateTime<Utc>,
}

impl XmpMetadata {
    pub fn new(
        title: impl Into<String>,
        creator: impl Into<String>,
        language: impl Into<String>,
        producer: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            creator: creator.into(),
            language: language.into(),
            producer: producer.into(),
            create_date: now,
            modify_date: now,
            metadata_date: now,
        }
    }

    fn write_simple(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> quick_xml::Result<()> {
        writer.write_event(Event::Start(BytesStart::new(tag)))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    fn write_alt(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, lang: &str, text: &str) -> quick_xml::Result<()> {
        writer.write_event(Event::Start(BytesStart::new(tag)))?;
        writer.write_event(Event::Start(BytesStart::new("rdf:Alt")))?;
        let mut li = BytesStart::new("rdf:li");
        li.push_attribute(("xml:lang", lang));
        writer.write_event(Event::Start(li))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new("rdf:li")))?;
        writer.write_event(Event::End(BytesEnd::new("rdf:Alt")))?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    fn write_seq_or_bag(
        writer: &mut Writer<Cursor<Vec<u8>>>,
        tag: &str,
        container: &str,
        text: &str,
    ) -> quick_xml::Result<()> {
        writer.write_event(Event::Start(BytesStart::new(tag)))?;
        writer.write_event(Event::Start(BytesStart::new(container)))?;
        writer.write_event(Event::Start(BytesStart::new("rdf:li")))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new("rdf:li")))?;
        writer.write_event(Event::End(BytesEnd::new(container)))?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    /// Serialises the XMP packet. `quick_xml::events::BytesText::new` escapes its content,
    /// so every injected string (title, creator, language) is XML-safe by construction.
    pub fn to_xmp_packet(&self) -> String {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // The xpacket wrapper is not a standard XML declaration, so it is written as raw
        // bytes rather than through an `Event::Decl`.
        let header = "<?xpacket begin=\"\u{FEFF}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n";
        writer.get_mut().get_mut().extend_from_slice(header.as_bytes());

        let mut xmpmeta = BytesStart::new("x:xmpmeta");
        xmpmeta.push_attribute(("xmlns:x", "adobe:ns:meta/"));
        writer.write_event(Event::Start(xmpmeta)).ok();

        writer.write_event(Event::Start(BytesStart::new("rdf:RDF").with_attributes([(
            "xmlns:rdf",
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
        )]))).ok();

        let mut description = BytesStart::new("rdf:Description");
        description.push_attribute(("rdf:about", ""));
        description.push_attribute(("xmlns:dc", "http://purl.org/dc/elements/1.1/"));
        description.push_attribute(("xmlns:xmp", "http://ns.adobe.com/xap/1.0/"));
        description.push_attribute(("xmlns:pdf", "http://ns.adobe.com/pdf/1.3/"));
        description.push_attribute(("xmlns:pdfuaid", "http://www.aiim.org/pdfua/ns/id/"));
        writer.write_event(Event::Start(description)).ok();

        Self::write_alt(&mut writer, "dc:title", "x-default", &self.title).ok();
        Self::write_seq_or_bag(&mut writer, "dc:creator", "rdf:Seq", &self.creator).ok();
        Self::write_seq_or_bag(&mut writer, "dc:language", "rdf:Bag", &self.language).ok();

        Self::write_simple(&mut writer, "xmp:CreateDate", &self.create_date.to_rfc3339()).ok();
        Self::write_simple(&mut writer, "xmp:ModifyDate", &self.modify_date.to_rfc3339()).ok();
        Self::write_simple(&mut writer, "xmp:MetadataDate", &self.metadata_date.to_rfc3339()).ok();
        Self::write_simple(&mut writer, "pdf:Producer", &self.producer).ok();
        Self::write_simple(&mut writer, "pdfuaid:part", PDFUAID_PART).ok();

        writer.write_event(Event::End(BytesEnd::new("rdf:Description"))).ok();
        writer.write_event(Event::End(BytesEnd::new("rdf:RDF"))).ok();
        writer.write_event(Event::End(BytesEnd::new("x:xmpmeta"))).ok();

        let body = writer.into_inner().into_inner();
        let mut packet = String::from_utf8(body).expect("quick-xml writer output is valid UTF-8");

        // ISO 16684-1 recommends 2-4KB of trailing whitespace so an in-place editor can
        // rewrite the packet without growing the PDF stream.
        packet.push_str("<?xpacket end=\"w\"?>");
        packet.push_str(&" ".repeat(PADDING_BYTES));
        packet
    }

    /// Wraps the packet as a `/Metadata /XML` stream ready to attach to `Root.Metadata`.
    pub fn into_stream(&self) -> Stream {
        let packet = self.to_xmp_packet();
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(Name("Metadata".to_string())));
        dict.set("Subtype", Object::Name(Name("XML".to_string())));
        Stream {
            dict,
            data: packet.into_bytes(),
        }
    }
}
