//! CS-060: Inventory triples.
//!
//! A [`Store`] collects `(subject, predicate, object)` facts; a [`Graph`] is
//! an immutable, indexed snapshot of it. Two codecs persist graphs: a
//! length-prefixed binary form and N-Triples.

pub mod codec;
pub mod store;

pub use store::{Graph, Store};

use chrono::{DateTime, Utc};
use std::fmt;

/// Predicate linking a parent resource to each child.
pub const PARENT_OF: &str = "parent_of";

/// Predicate giving a resource's type, compared by [`Graph::visit_siblings`].
pub const TYPE_OF: &str = "type";

/// Typed literal object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    Text(String),
    Int(i64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    Bytes(Vec<u8>),
}

impl Literal {
    /// XSD local type name.
    pub fn datatype(&self) -> &'static str {
        match self {
            Literal::Text(_) => "string",
            Literal::Int(_) => "integer",
            Literal::Bool(_) => "boolean",
            Literal::DateTime(_) => "dateTime",
            Literal::Bytes(_) => "base64Binary",
        }
    }

    /// Lexical form, as written in N-Triples.
    pub fn lexical(&self) -> String {
        use base64::Engine;
        match self {
            Literal::Text(s) => s.clone(),
            Literal::Int(i) => i.to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::DateTime(t) => t.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
            Literal::Bytes(b) => base64::engine::general_purpose::STANDARD.encode(b),
        }
    }

    /// Rebuild a literal from its datatype and lexical form.
    pub fn parse(datatype: &str, lexical: &str) -> Result<Literal, GraphError> {
        use base64::Engine;
        let invalid = || GraphError::InvalidLiteral {
            datatype: datatype.to_string(),
            value: lexical.to_string(),
        };
        match datatype {
            "string" => Ok(Literal::Text(lexical.to_string())),
            "integer" => lexical.parse().map(Literal::Int).map_err(|_| invalid()),
            "boolean" => lexical.parse().map(Literal::Bool).map_err(|_| invalid()),
            "dateTime" => DateTime::parse_from_rfc3339(lexical)
                .map(|t| Literal::DateTime(t.with_timezone(&Utc)))
                .map_err(|_| invalid()),
            "base64Binary" => base64::engine::general_purpose::STANDARD
                .decode(lexical)
                .map(Literal::Bytes)
                .map_err(|_| invalid()),
            _ => Err(GraphError::UnknownDatatype(datatype.to_string())),
        }
    }
}

/// Object of a triple: another resource or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Object {
    Resource(String),
    Literal(Literal),
}

impl Object {
    pub fn resource(id: impl Into<String>) -> Self {
        Object::Resource(id.into())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Object::Literal(Literal::Text(s.into()))
    }

    pub fn as_resource(&self) -> Option<&str> {
        match self {
            Object::Resource(id) => Some(id),
            Object::Literal(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Object) -> Self {
        Triple {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&codec::ntriple(self))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("truncated input: {0}")]
    Truncated(String),

    #[error("invalid object tag {0}")]
    InvalidTag(u8),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("invalid {datatype} literal '{value}'")]
    InvalidLiteral { datatype: String, value: String },

    #[error("unknown datatype '{0}'")]
    UnknownDatatype(String),

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cs060_literal_lexical_forms() {
        let t = Utc.with_ymd_and_hms(2017, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(Literal::DateTime(t).lexical(), "2017-03-01T12:30:00Z");
        assert_eq!(Literal::Bytes(b"hi".to_vec()).lexical(), "aGk=");
        assert_eq!(Literal::Int(-4).lexical(), "-4");
    }

    #[test]
    fn test_cs060_literal_parse() {
        assert_eq!(Literal::parse("integer", "42").unwrap(), Literal::Int(42));
        assert_eq!(Literal::parse("boolean", "true").unwrap(), Literal::Bool(true));
        assert!(matches!(
            Literal::parse("integer", "x"),
            Err(GraphError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            Literal::parse("float", "1.0"),
            Err(GraphError::UnknownDatatype(_))
        ));
    }

    #[test]
    fn test_cs060_triples_order_by_subject_first() {
        let mut triples = vec![
            Triple::new("b", "p", Object::resource("x")),
            Triple::new("a", "q", Object::text("y")),
            Triple::new("a", "p", Object::text("z")),
        ];
        triples.sort();
        let heads: Vec<(&str, &str)> = triples
            .iter()
            .map(|t| (t.subject.as_str(), t.predicate.as_str()))
            .collect();
        assert_eq!(heads, vec![("a", "p"), ("a", "q"), ("b", "p")]);
    }
}
