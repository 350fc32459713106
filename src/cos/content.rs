//! Page content-stream tokenizer/writer: `(operands…, op)` pairs (spec.md §3/§4.1).
//!
//! Deliberately generic rather than an exhaustive enum of PDF content operators — the
//! rewriter only ever needs to recognise `BDC`/`EMC`/`BI` and pass everything else
//! through unchanged, so a closed operator enum would buy nothing but surface area.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Name, Object};

use super::lexer::{Lexer, Token};

/// One operator application: its operands in order, then the operator keyword itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub operands: Vec<Object>,
    pub operator: String,
}

impl Op {
    pub fn new(operator: impl Into<String>, operands: Vec<Object>) -> Self {
        Self {
            operator: operator.into(),
            operands,
        }
    }

    pub fn is_begin_marked_content(&self) -> bool {
        self.operator == "BDC" || self.operator == "BMC"
    }

    pub fn is_end_marked_content(&self) -> bool {
        self.operator == "EMC"
    }

    /// The marked-content tag of a `BDC`/`BMC` operator (its first operand), if present.
    pub fn mc_tag(&self) -> Option<&str> {
        if !self.is_begin_marked_content() {
            return None;
        }
        self.operands.first().and_then(Object::as_name)
    }
}

fn object_from_tokens(lexer: &mut Lexer, first: Token) -> Object {
    match first {
        Token::Integer(i) => Object::Integer(i),
        Token::Real(r) => Object::Real(r),
        Token::Name(n) => Object::Name(Name::new(n)),
        Token::String(s) => Object::String(s),
        Token::ArrayStart => {
            let mut items = Vec::new();
            loop {
                match lexer.next_token() {
                    Some(Token::ArrayEnd) | None => break,
                    Some(t) => items.push(object_from_tokens(lexer, t)),
                }
            }
            Object::Array(items)
        }
        Token::DictStart => {
            let mut dict = Dictionary::new();
            loop {
                match lexer.next_token() {
                    Some(Token::DictEnd) | None => break,
                    Some(Token::Name(key)) => {
                        let value_tok = lexer.next_token();
                        let value = match value_tok {
                            Some(t) => object_from_tokens(lexer, t),
                            None => Object::Null,
                        };
                        dict.set(key, value);
                    }
                    Some(_) => continue,
                }
            }
            Object::Dictionary(dict)
        }
        Token::Keyword(k) => match k.as_str() {
            "true" => Object::Boolean(true),
            "false" => Object::Boolean(false),
            "null" => Object::Null,
            _ => Object::Name(Name::new(k)),
        },
        Token::ArrayEnd | Token::DictEnd => Object::Null,
    }
}

/// Parses a page content stream into an ordered list of operator applications.
///
/// Inline images (`BI … ID … EI`) are captured whole: the `BI` operator's operands are
/// `[image dict, raw sample bytes]` so the rewriter can pass them through untouched.
pub fn parse_content_stream(data: &[u8]) -> Result<Vec<Op>> {
    let mut lexer = Lexer::new(data);
    let mut ops = Vec::new();
    let mut operands: Vec<Object> = Vec::new();

    while let Some(tok) = lexer.next_token() {
        match tok {
            Token::Keyword(k) if k == "true" || k == "false" || k == "null" => {
                operands.push(object_from_tokens(&mut lexer, Token::Keyword(k)));
            }
            Token::Keyword(k) if k == "BI" => {
                let (op, consumed_operands) = parse_inline_image(&mut lexer)?;
                let _ = consumed_operands;
                ops.push(op);
                operands.clear();
            }
            Token::Keyword(operator) => {
                ops.push(Op::new(operator, std::mem::take(&mut operands)));
            }
            other => {
                operands.push(object_from_tokens(&mut lexer, other));
            }
        }
    }

    if !operands.is_empty() {
        return Err(PdfError::BadPdf(
            "content stream ends with unconsumed operands".to_string(),
        ));
    }

    Ok(ops)
}

fn parse_inline_image(lexer: &mut Lexer) -> Result<(Op, Vec<Object>)> {
    let mut dict = Dictionary::new();
    loop {
        match lexer.next_token() {
            Some(Token::Keyword(ref k)) if k == "ID" => break,
            Some(Token::Name(key)) => {
                let value = lexer
                    .next_token()
                    .map(|t| object_from_tokens(lexer, t))
                    .unwrap_or(Object::Null);
                dict.set(key, value);
            }
            Some(_) => continue,
            None => {
                return Err(PdfError::BadPdf("unterminated inline image dictionary".into()));
            }
        }
    }

    // A single whitespace byte separates `ID` from the raw sample data.
    let after_id = lexer.position() + 1;
    lexer.seek(after_id);
    let remaining = lexer.remaining();
    let ei_offset = find_ei_marker(remaining).ok_or_else(|| {
        PdfError::BadPdf("inline image missing EI terminator".to_string())
    })?;
    let raw = remaining[..ei_offset].to_vec();
    lexer.seek(after_id + ei_offset);
    // Skip the `EI` keyword itself.
    let _ = lexer.next_token();

    let op = Op::new("BI", vec![Object::Dictionary(dict.clone()), Object::String(raw)]);
    Ok((op, vec![Object::Dictionary(dict)]))
}

/// Finds the byte offset of the `EI` marker terminating inline image data: a whitespace
/// byte, then `EI`, then whitespace or end of input. Returns the offset of that leading
/// whitespace byte, which is excluded from the returned sample data.
fn find_ei_marker(data: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i + 2 < data.len() {
        if is_whitespace(data[i]) && data[i + 1] == b'E' && data[i + 2] == b'I' {
            let after = data.get(i + 3);
            if after.is_none() || after.map(|b| is_whitespace(*b)).unwrap_or(false) {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | 0x0c | b'\r' | b' ')
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let mut s = format!("{:.6}", n);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

fn escape_literal_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            other => out.push(other),
        }
    }
    out.push(b')');
    out
}

/// Renders a single object's PDF syntax. Shared with [`super::writer`], which additionally
/// frames `Stream` objects with `stream`/`endstream` keywords around their raw bytes —
/// something that only makes sense for a top-level indirect object, never a nested operand.
pub(crate) fn write_object(out: &mut Vec<u8>, obj: &Object) {
    match obj {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Object::Real(r) => out.extend_from_slice(render_number(*r).as_bytes()),
        Object::Name(n) => {
            out.push(b'/');
            out.extend_from_slice(n.as_str().as_bytes());
        }
        Object::String(s) => out.extend(escape_literal_string(s)),
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => {
            out.extend_from_slice(b"<< ");
            for (key, value) in dict.iter() {
                out.push(b'/');
                out.extend_from_slice(key.as_str().as_bytes());
                out.push(b' ');
                write_object(out, value);
                out.push(b' ');
            }
            out.extend_from_slice(b">>");
        }
        Object::Stream(stream) => write_object(out, &Object::Dictionary(stream.dict.clone())),
        Object::Reference(id) => {
            out.extend_from_slice(format!("{} {} R", id.0, id.1).as_bytes());
        }
    }
}

/// Re-emits an operator list as content-stream bytes. Operand rendering preserves
/// numeric precision to at least six significant digits (spec.md §4.1).
pub fn unparse_content_stream(ops: &[Op]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in ops {
        if op.operator == "BI" {
            write_inline_image(&mut out, op);
            continue;
        }
        for operand in &op.operands {
            write_object(&mut out, operand);
            out.push(b' ');
        }
        out.extend_from_slice(op.operator.as_bytes());
        out.push(b'\n');
    }
    out
}

fn write_inline_image(out: &mut Vec<u8>, op: &Op) {
    out.extend_from_slice(b"BI\n");
    if let Some(Object::Dictionary(dict)) = op.operands.first() {
        for (key, value) in dict.iter() {
            out.push(b'/');
            out.extend_from_slice(key.as_str().as_bytes());
            out.push(b' ');
            write_object(out, value);
            out.push(b'\n');
        }
    }
    out.extend_from_slice(b"ID ");
    if let Some(Object::String(data)) = op.operands.get(1) {
        out.extend_from_slice(data);
    }
    out.extend_from_slice(b"\nEI\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_operator_sequence() {
        let ops = parse_content_stream(b"1 0 0 RG 100 200 m 300 400 l S").unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].operator, "RG");
        assert_eq!(ops[0].operands.len(), 3);
        assert_eq!(ops[2].operator, "S");
    }

    #[test]
    fn marked_content_tag_extraction() {
        let ops = parse_content_stream(b"/P << /MCID 0 >> BDC (hi) Tj EMC").unwrap();
        assert!(ops[0].is_begin_marked_content());
        assert_eq!(ops[0].mc_tag(), Some("P"));
        assert!(ops[2].is_end_marked_content());
    }

    #[test]
    fn round_trip_preserves_operand_order() {
        let input = b"1 2 3 re W n";
        let ops = parse_content_stream(input).unwrap();
        let out = unparse_content_stream(&ops);
        let reparsed = parse_content_stream(&out).unwrap();
        assert_eq!(ops, reparsed);
    }

    #[test]
    fn numeric_precision_preserved_to_six_digits() {
        let ops = parse_content_stream(b"0.123456 0.1 m").unwrap();
        let rendered = unparse_content_stream(&ops);
        let text = String::from_utf8(rendered).unwrap();
        assert!(text.contains("0.123456"));
    }

    #[test]
    fn trailing_operands_without_operator_is_an_error() {
        assert!(parse_content_stream(b"1 2 3").is_err());
    }

    #[test]
    fn inline_image_captured_as_single_op() {
        let input = b"q BI /W 2 /H 2 /BPC 8 /CS /G ID \x01\x02\x03\x04 EI Q";
        let ops = parse_content_stream(input).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1].operator, "BI");
        match &ops[1].operands[1] {
            Object::String(data) => assert_eq!(data, &vec![1, 2, 3, 4]),
            other => panic!("expected raw sample bytes, got {other:?}"),
        }
        assert_eq!(ops[2].operator, "Q");
    }
}
