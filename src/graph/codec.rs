//! Graph persistence.
//!
//! Binary layout, per triple: subject word, predicate word, then a kind
//! byte. Kind `0` is followed by the resource word; kind `1` by the
//! datatype word and the value word. A word is a big-endian `u32` length
//! and that many bytes. Byte literals store their raw bytes; every other
//! literal stores its lexical form.

use super::{GraphError, Literal, Object, Triple};

const RESOURCE: u8 = 0;
const LITERAL: u8 = 1;

/// Namespace of literal datatypes in N-Triples.
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

fn put_word(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Encode triples in the given order.
pub fn encode_binary<'a, I>(triples: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Triple>,
{
    let mut out = Vec::new();
    for t in triples {
        put_word(&mut out, t.subject.as_bytes());
        put_word(&mut out, t.predicate.as_bytes());
        match &t.object {
            Object::Resource(id) => {
                out.push(RESOURCE);
                put_word(&mut out, id.as_bytes());
            }
            Object::Literal(lit) => {
                out.push(LITERAL);
                put_word(&mut out, lit.datatype().as_bytes());
                match lit {
                    Literal::Bytes(b) => put_word(&mut out, b),
                    other => put_word(&mut out, other.lexical().as_bytes()),
                }
            }
        }
    }
    out
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], GraphError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| GraphError::Truncated(format!("{} at byte {}", what, self.pos)))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn word(&mut self, what: &str) -> Result<&'a [u8], GraphError> {
        let len = self.take(4, what)?;
        let n = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
        self.take(n, what)
    }

    fn text(&mut self, what: &'static str) -> Result<String, GraphError> {
        let bytes = self.word(what)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| GraphError::InvalidUtf8(what))
    }

    fn done(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

pub fn decode_binary(buf: &[u8]) -> Result<Vec<Triple>, GraphError> {
    let mut r = Reader { buf, pos: 0 };
    let mut triples = Vec::new();
    while !r.done() {
        let subject = r.text("subject")?;
        let predicate = r.text("predicate")?;
        let object = match r.take(1, "object kind")?[0] {
            RESOURCE => Object::Resource(r.text("resource")?),
            LITERAL => {
                let datatype = r.text("datatype")?;
                if datatype == "base64Binary" {
                    Object::Literal(Literal::Bytes(r.word("value")?.to_vec()))
                } else {
                    let value = r.text("value")?;
                    Object::Literal(Literal::parse(&datatype, &value)?)
                }
            }
            tag => return Err(GraphError::InvalidTag(tag)),
        };
        triples.push(Triple {
            subject,
            predicate,
            object,
        });
    }
    Ok(triples)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// One N-Triples statement, without the line break.
pub fn ntriple(t: &Triple) -> String {
    let object = match &t.object {
        Object::Resource(id) => format!("<{}>", id),
        Object::Literal(lit) => format!(
            "\"{}\"^^<{}{}>",
            escape(&lit.lexical()),
            XSD,
            lit.datatype()
        ),
    };
    format!("<{}> <{}> {} .", t.subject, t.predicate, object)
}

/// Sorted N-Triples document.
pub fn to_ntriples<'a, I>(triples: I) -> String
where
    I: IntoIterator<Item = &'a Triple>,
{
    let mut lines: Vec<String> = triples.into_iter().map(ntriple).collect();
    lines.sort();
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

struct Line<'a> {
    rest: &'a str,
    line: usize,
}

impl<'a> Line<'a> {
    fn err(&self, message: impl Into<String>) -> GraphError {
        GraphError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn iri(&mut self) -> Result<&'a str, GraphError> {
        self.skip_ws();
        let body = self
            .rest
            .strip_prefix('<')
            .ok_or_else(|| self.err("expected '<'"))?;
        let end = body.find('>').ok_or_else(|| self.err("unterminated IRI"))?;
        self.rest = &body[end + 1..];
        Ok(&body[..end])
    }

    fn literal(&mut self) -> Result<Literal, GraphError> {
        let body = &self.rest[1..];
        let mut value = String::new();
        let mut chars = body.char_indices();
        let close = loop {
            match chars.next() {
                Some((i, '"')) => break i,
                Some((_, '\\')) => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, c @ ('"' | '\\'))) => value.push(c),
                    Some((_, c)) => return Err(self.err(format!("unknown escape '\\{}'", c))),
                    None => return Err(self.err("unterminated literal")),
                },
                Some((_, c)) => value.push(c),
                None => return Err(self.err("unterminated literal")),
            }
        };
        self.rest = &body[close + 1..];
        let datatype = match self.rest.strip_prefix("^^") {
            Some(after) => {
                self.rest = after;
                let iri = self.iri()?;
                iri.strip_prefix(XSD)
                    .ok_or_else(|| self.err(format!("unsupported datatype <{}>", iri)))?
            }
            None => "string",
        };
        Literal::parse(datatype, &value)
    }

    fn object(&mut self) -> Result<Object, GraphError> {
        self.skip_ws();
        if self.rest.starts_with('"') {
            Ok(Object::Literal(self.literal()?))
        } else {
            Ok(Object::Resource(self.iri()?.to_string()))
        }
    }
}

/// Parse an N-Triples document. Blank lines and `#` comments are skipped.
pub fn from_ntriples(text: &str) -> Result<Vec<Triple>, GraphError> {
    let mut triples = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut line = Line {
            rest: trimmed,
            line: i + 1,
        };
        let subject = line.iri()?.to_string();
        let predicate = line.iri()?.to_string();
        let object = line.object()?;
        line.skip_ws();
        if line.rest != "." {
            return Err(line.err("expected '.' at end of statement"));
        }
        triples.push(Triple {
            subject,
            predicate,
            object,
        });
    }
    Ok(triples)
}
