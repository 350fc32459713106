//! Byte-level tokenizer for PDF's object syntax (ISO 32000-1 §7.2-7.3).
//!
//! Shared between indirect-object parsing ([`super::mod`]) and content-stream parsing
//! ([`super::content`]) — both sit on top of the same literal/name/array/dict grammar,
//! differing only in what they do with bare keywords (`obj`/`endobj`/`R` vs. operators).

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Real(f64),
    Name(String),
    String(Vec<u8>),
    /// A bare keyword: `obj`, `endobj`, `stream`, `R`, `true`, `false`, `null`, or — in
    /// content-stream context — an operator like `BDC`/`Tj`/`re`.
    Keyword(String),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | 0x0c | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// The unconsumed tail of the input, starting at the current position.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b) if is_whitespace(b) => {
                    self.pos += 1;
                }
                Some(b'%') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' || b == b'\r' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Reads the next token. Returns `None` at end of input.
    pub fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();
        let b = self.peek()?;
        match b {
            b'/' => Some(self.read_name()),
            b'(' => Some(self.read_literal_string()),
            b'<' => {
                if self.data.get(self.pos + 1) == Some(&b'<') {
                    self.pos += 2;
                    Some(Token::DictStart)
                } else {
                    Some(self.read_hex_string())
                }
            }
            b'>' => {
                if self.data.get(self.pos + 1) == Some(&b'>') {
                    self.pos += 2;
                    Some(Token::DictEnd)
                } else {
                    self.pos += 1;
                    self.next_token()
                }
            }
            b'[' => {
                self.pos += 1;
                Some(Token::ArrayStart)
            }
            b']' => {
                self.pos += 1;
                Some(Token::ArrayEnd)
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => Some(self.read_number()),
            _ => Some(self.read_keyword()),
        }
    }

    fn read_name(&mut self) -> Token {
        self.pos += 1; // consume '/'
        let mut out = String::new();
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            if b == b'#' {
                if let (Some(h1), Some(h2)) = (self.data.get(self.pos + 1), self.data.get(self.pos + 2)) {
                    if let Ok(byte) = u8::from_str_radix(&format!("{}{}", *h1 as char, *h2 as char), 16) {
                        out.push(byte as char);
                        self.pos += 3;
                        continue;
                    }
                }
            }
            out.push(b as char);
            self.pos += 1;
        }
        Token::Name(out)
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        let mut is_real = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' => {
                    is_real = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.data[start..self.pos]).unwrap_or("0");
        if is_real {
            Token::Real(text.parse().unwrap_or(0.0))
        } else {
            match text.parse::<i64>() {
                Ok(i) => Token::Integer(i),
                Err(_) => Token::Real(text.parse().unwrap_or(0.0)),
            }
        }
    }

    fn read_keyword(&mut self) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            // Stray delimiter we don't otherwise handle (e.g. unmatched '>' or '{').
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.data[start..self.pos]).into_owned();
        Token::Keyword(text)
    }

    fn read_literal_string(&mut self) -> Token {
        self.pos += 1; // consume '('
        let mut out = Vec::new();
        let mut depth = 1;
        while let Some(b) = self.advance() {
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                b'\\' => {
                    if let Some(esc) = self.advance() {
                        match esc {
                            b'n' => out.push(b'\n'),
                            b'r' => out.push(b'\r'),
                            b't' => out.push(b'\t'),
                            b'b' => out.push(0x08),
                            b'f' => out.push(0x0c),
                            b'(' => out.push(b'('),
                            b')' => out.push(b')'),
                            b'\\' => out.push(b'\\'),
                            b'\r' | b'\n' => {} // line continuation
                            d @ b'0'..=b'7' => {
                                let mut val = (d - b'0') as u32;
                                for _ in 0..2 {
                                    if let Some(o @ b'0'..=b'7') = self.peek() {
                                        val = val * 8 + (o - b'0') as u32;
                                        self.pos += 1;
                                    } else {
                                        break;
                                    }
                                }
                                out.push(val as u8);
                            }
                            other => out.push(other),
                        }
                    }
                }
                other => out.push(other),
            }
        }
        Token::String(out)
    }

    fn read_hex_string(&mut self) -> Token {
        self.pos += 1; // consume '<'
        let mut digits = Vec::new();
        while let Some(b) = self.advance() {
            if b == b'>' {
                break;
            }
            if b.is_ascii_hexdigit() {
                digits.push(b);
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(b'0');
        }
        let bytes = digits
            .chunks(2)
            .map(|pair| {
                let s = std::str::from_utf8(pair).unwrap_or("00");
                u8::from_str_radix(s, 16).unwrap_or(0)
            })
            .collect();
        Token::String(bytes)
    }
}
