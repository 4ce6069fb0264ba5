//! CS-001: Shared script types.
//!
//! Values are loosely typed at parse time (strings, integers, lists) and stay
//! in one sum type all the way to the driver boundary.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Actions
// ============================================================================

/// The closed set of verbs a script statement may start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Delete,
    Update,
    Start,
    Stop,
    Check,
    Attach,
    Detach,
    Copy,
    Import,
    Authenticate,
}

impl Action {
    pub const ALL: [Action; 11] = [
        Action::Create,
        Action::Delete,
        Action::Update,
        Action::Start,
        Action::Stop,
        Action::Check,
        Action::Attach,
        Action::Detach,
        Action::Copy,
        Action::Import,
        Action::Authenticate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Delete => "delete",
            Action::Update => "update",
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Check => "check",
            Action::Attach => "attach",
            Action::Detach => "detach",
            Action::Copy => "copy",
            Action::Import => "import",
            Action::Authenticate => "authenticate",
        }
    }

    /// Parse a lowercase action word.
    pub fn parse(word: &str) -> Option<Action> {
        Action::ALL.iter().copied().find(|a| a.as_str() == word)
    }

    /// The action that undoes this one, when there is one.
    pub fn inverse(&self) -> Option<Action> {
        match self {
            Action::Create => Some(Action::Delete),
            Action::Start => Some(Action::Stop),
            Action::Stop => Some(Action::Start),
            Action::Attach => Some(Action::Detach),
            Action::Detach => Some(Action::Attach),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Parameter values
// ============================================================================

/// A concrete parameter value.
///
/// Holes, references and aliases never appear here: they live in their own
/// maps on the expression until something resolves them into a `Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<String>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Human name of the variant, used in coercion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }

    /// Loose conversion of a provider response into a bindable value.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(Value::Float),
            },
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            serde_json::Value::Array(items) => {
                let strings: Option<Vec<String>> = items
                    .iter()
                    .map(|i| i.as_str().map(str::to_string))
                    .collect();
                match strings {
                    Some(list) => Some(Value::List(list)),
                    None => Some(Value::Str(json.to_string())),
                }
            }
            serde_json::Value::Object(_) => Some(Value::Str(json.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Ordered parameter map, keyed by parameter name.
pub type Params = IndexMap<String, Value>;

/// Build a `Params` map from literal pairs. Handy in tests and cascades.
pub fn params<const N: usize>(pairs: [(&str, Value); N]) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cs001_action_parse_roundtrip() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("destroy"), None);
        assert_eq!(Action::parse("Create"), None);
    }

    #[test]
    fn test_cs001_action_inverse() {
        assert_eq!(Action::Create.inverse(), Some(Action::Delete));
        assert_eq!(Action::Attach.inverse(), Some(Action::Detach));
        assert_eq!(Action::Check.inverse(), None);
    }

    #[test]
    fn test_cs001_value_display() {
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(
            Value::List(vec!["a".into(), "b".into()]).to_string(),
            "a,b"
        );
        assert_eq!(Value::str("vpc-1").to_string(), "vpc-1");
    }

    #[test]
    fn test_cs001_value_from_json() {
        let json = serde_json::json!({"Vpc": {"VpcId": "vpc-1"}});
        assert_eq!(
            Value::from_json(&json["Vpc"]["VpcId"]),
            Some(Value::str("vpc-1"))
        );
        assert_eq!(Value::from_json(&serde_json::json!(7)), Some(Value::Int(7)));
        assert_eq!(
            Value::from_json(&serde_json::json!(["a", "b"])),
            Some(Value::List(vec!["a".into(), "b".into()]))
        );
        assert_eq!(Value::from_json(&serde_json::Value::Null), None);
        let opaque = Value::from_json(&json).unwrap();
        assert!(matches!(opaque, Value::Str(s) if s.contains("vpc-1")));
    }

    #[test]
    fn test_cs001_params_helper_keeps_order() {
        let p = params([("b", Value::Int(1)), ("a", Value::str("x"))]);
        let keys: Vec<&String> = p.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
