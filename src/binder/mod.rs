//! CS-010: Parameter binder. Loose values onto typed request records.
//!
//! A request record is an instance of a static [`StructShape`]: an ordered list
//! of named fields, each with a [`Shape`]. [`bind`] walks a field path inside a
//! record and assigns a value through the coercion rule of a [`SetterKind`].
//!
//! Path grammar:
//! - `A.B.C` descends struct fields
//! - `A[key]` sets one entry of a string map
//! - `A[0]B` sets field `B` of the first element of a struct list, appending
//!   that element when the list is empty

pub mod coerce;
pub mod fetch;

use crate::core::log::Logger;
use crate::core::types::{Params, Value};
use base64::Engine;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Shapes and records
// ============================================================================

/// Kind of one field of a request record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Str,
    Int,
    Float,
    Bool,
    /// `{ Value: bool }` wrapper
    BoolAttr,
    /// `{ Value: string }` wrapper
    StrAttr,
    Bytes,
    StrList,
    IntList,
    StrMap,
    Struct(&'static StructShape),
    StructList(&'static StructShape),
}

/// Static description of a request record type.
#[derive(Debug, PartialEq)]
pub struct StructShape {
    pub name: &'static str,
    pub fields: &'static [(&'static str, Shape)],
}

impl StructShape {
    pub const fn new(name: &'static str, fields: &'static [(&'static str, Shape)]) -> Self {
        StructShape { name, fields }
    }

    fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| *n == field)
    }
}

/// One field slot of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Str(Option<String>),
    Int(Option<i64>),
    Float(Option<f64>),
    Bool(Option<bool>),
    BoolAttr(Option<bool>),
    StrAttr(Option<String>),
    Bytes(Option<Vec<u8>>),
    StrList(Vec<String>),
    IntList(Vec<i64>),
    StrMap(BTreeMap<String, String>),
    Struct(Box<Record>),
    StructList(Vec<Record>),
}

impl Field {
    fn empty(shape: Shape) -> Field {
        match shape {
            Shape::Str => Field::Str(None),
            Shape::Int => Field::Int(None),
            Shape::Float => Field::Float(None),
            Shape::Bool => Field::Bool(None),
            Shape::BoolAttr => Field::BoolAttr(None),
            Shape::StrAttr => Field::StrAttr(None),
            Shape::Bytes => Field::Bytes(None),
            Shape::StrList => Field::StrList(Vec::new()),
            Shape::IntList => Field::IntList(Vec::new()),
            Shape::StrMap => Field::StrMap(BTreeMap::new()),
            Shape::Struct(s) => Field::Struct(Box::new(Record::new(s))),
            Shape::StructList(_) => Field::StructList(Vec::new()),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Field::Str(_) => "string",
            Field::Int(_) => "int64",
            Field::Float(_) => "float64",
            Field::Bool(_) => "bool",
            Field::BoolAttr(_) => "bool attribute",
            Field::StrAttr(_) => "string attribute",
            Field::Bytes(_) => "bytes",
            Field::StrList(_) => "string list",
            Field::IntList(_) => "int64 list",
            Field::StrMap(_) => "string map",
            Field::Struct(_) => "struct",
            Field::StructList(_) => "struct list",
        }
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::json;
        match self {
            Field::Str(v) => v.as_ref().map(|s| json!(s)),
            Field::Int(v) => v.map(|i| json!(i)),
            Field::Float(v) => v.map(|f| json!(f)),
            Field::Bool(v) => v.map(|b| json!(b)),
            Field::BoolAttr(v) => v.map(|b| json!({ "Value": b })),
            Field::StrAttr(v) => v.as_ref().map(|s| json!({ "Value": s })),
            Field::Bytes(v) => v
                .as_ref()
                .map(|b| json!(base64::engine::general_purpose::STANDARD.encode(b))),
            Field::StrList(v) if !v.is_empty() => Some(json!(v)),
            Field::IntList(v) if !v.is_empty() => Some(json!(v)),
            Field::StrMap(m) if !m.is_empty() => Some(json!(m)),
            Field::Struct(r) => {
                let inner = r.to_json();
                match &inner {
                    serde_json::Value::Object(o) if o.is_empty() => None,
                    _ => Some(inner),
                }
            }
            Field::StructList(v) if !v.is_empty() => {
                Some(serde_json::Value::Array(v.iter().map(Record::to_json).collect()))
            }
            _ => None,
        }
    }
}

/// An instance of a [`StructShape`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    shape: &'static StructShape,
    fields: Vec<Field>,
}

impl Record {
    pub fn new(shape: &'static StructShape) -> Self {
        Record {
            shape,
            fields: shape.fields.iter().map(|(_, s)| Field::empty(*s)).collect(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.shape.name
    }

    pub fn shape(&self) -> &'static StructShape {
        self.shape
    }

    /// Direct field access by name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.shape.index_of(name).map(|i| &self.fields[i])
    }

    /// Field at a dotted/indexed path, if present.
    pub fn field(&self, path: &str) -> Option<&Field> {
        let steps = parse_path(path).ok()?;
        let mut rec = self;
        for (i, step) in steps.iter().enumerate() {
            let last = i + 1 == steps.len();
            match step {
                Step::Field(name) => {
                    let f = rec.get(name)?;
                    if last {
                        return Some(f);
                    }
                    match f {
                        Field::Struct(r) => rec = r.as_ref(),
                        _ => return None,
                    }
                }
                Step::First(name) => match rec.get(name)? {
                    Field::StructList(v) => rec = v.first()?,
                    _ => return None,
                },
                Step::MapKey(..) => return None,
            }
        }
        None
    }

    pub fn str_at(&self, path: &str) -> Option<&str> {
        match self.field(path)? {
            Field::Str(Some(s)) | Field::StrAttr(Some(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn int_at(&self, path: &str) -> Option<i64> {
        match self.field(path)? {
            Field::Int(v) => *v,
            _ => None,
        }
    }

    pub fn float_at(&self, path: &str) -> Option<f64> {
        match self.field(path)? {
            Field::Float(v) => *v,
            _ => None,
        }
    }

    pub fn bool_at(&self, path: &str) -> Option<bool> {
        match self.field(path)? {
            Field::Bool(v) | Field::BoolAttr(v) => *v,
            _ => None,
        }
    }

    pub fn list_at(&self, path: &str) -> Option<&[String]> {
        match self.field(path)? {
            Field::StrList(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn records_at(&self, path: &str) -> Option<&[Record]> {
        match self.field(path)? {
            Field::StructList(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn bytes_at(&self, path: &str) -> Option<&[u8]> {
        match self.field(path)? {
            Field::Bytes(Some(b)) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Bind `value` at `path` with `kind`, using default options.
    pub fn put(
        &mut self,
        path: &str,
        value: impl Into<Value>,
        kind: SetterKind,
    ) -> Result<(), BindError> {
        bind(&value.into(), self, path, kind)
    }

    /// Store raw bytes at `path`, which must name a bytes field.
    pub fn put_bytes(&mut self, path: &str, bytes: Vec<u8>) -> Result<(), BindError> {
        let mismatch = |found: &str| BindError::TypeMismatch {
            path: path.to_string(),
            expected: "bytes".to_string(),
            found: found.to_string(),
        };
        match resolve(self, path)? {
            Slot::Field(field, _) => match field {
                Field::Bytes(slot) => {
                    *slot = Some(bytes);
                    Ok(())
                }
                other => Err(mismatch(other.kind_name())),
            },
            Slot::MapEntry(..) => Err(mismatch("string map")),
        }
    }

    /// JSON form sent to the provider. Unset fields are omitted.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for ((name, _), field) in self.shape.fields.iter().zip(&self.fields) {
            if let Some(v) = field.to_json() {
                map.insert((*name).to_string(), v);
            }
        }
        serde_json::Value::Object(map)
    }
}

// ============================================================================
// Setter kinds
// ============================================================================

/// Coercion rule applied by a setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetterKind {
    Str,
    Int,
    Int64,
    Float,
    Bool,
    BoolAttr,
    StrAttr,
    StrSlice,
    Int64Slice,
    CsvStr,
    DimensionSlice,
    KeyValueSlice,
    ParameterSlice,
    TagSlice,
    PortMappings,
    StepAdjustments,
    SubnetMappings,
    ClassicLbListeners,
    FileToBase64,
    FileToBytes,
    FileToString,
    SixDigitsString,
    StrPointerMap,
    SliceStruct,
    SliceStructInt64,
}

impl SetterKind {
    /// What the kind expects from the user, for error messages.
    pub fn expected(&self) -> &'static str {
        match self {
            SetterKind::Int | SetterKind::Int64 | SetterKind::SliceStructInt64 => "integer",
            SetterKind::Int64Slice => "integer",
            SetterKind::Float => "number",
            SetterKind::Bool | SetterKind::BoolAttr => "boolean",
            SetterKind::StrSlice | SetterKind::CsvStr => "string list",
            SetterKind::DimensionSlice
            | SetterKind::KeyValueSlice
            | SetterKind::ParameterSlice
            | SetterKind::TagSlice => "list of key:value",
            SetterKind::PortMappings => "list of [host:]container[/proto]",
            SetterKind::StepAdjustments => "list of lower:upper:adjustment",
            SetterKind::SubnetMappings => "subnet id list",
            SetterKind::ClassicLbListeners => "list of PROTO:port:PROTO:port",
            SetterKind::FileToBase64 => "file path or URL",
            SetterKind::FileToBytes | SetterKind::FileToString => "file path",
            SetterKind::SixDigitsString => "integer",
            _ => "string",
        }
    }
}

impl fmt::Display for SetterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    #[error("field '{path}' not found in {record}")]
    FieldNotFound { path: String, record: String },

    #[error("field '{path}' is a {found}, cannot set {expected}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("{kind}: {reason}")]
    Coercion { kind: SetterKind, reason: String },

    #[error("fetching {url}: {cause}")]
    Fetch { url: String, cause: String },

    #[error("set field {path} for {target}: {cause}")]
    Failure {
        path: String,
        target: String,
        cause: String,
    },
}

impl BindError {
    fn coercion(kind: SetterKind, reason: impl Into<String>) -> Self {
        BindError::Coercion {
            kind,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Paths
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Step<'p> {
    Field(&'p str),
    First(&'p str),
    MapKey(&'p str, &'p str),
}

fn parse_path(path: &str) -> Result<Vec<Step<'_>>, String> {
    let mut steps = Vec::new();
    let mut rest = path;
    while !rest.is_empty() {
        let cut = rest.find(|c| c == '.' || c == '[').unwrap_or(rest.len());
        let name = &rest[..cut];
        if name.is_empty() {
            return Err(format!("empty segment in '{}'", path));
        }
        rest = &rest[cut..];
        if let Some(after) = rest.strip_prefix('[') {
            let close = after
                .find(']')
                .ok_or_else(|| format!("unclosed '[' in '{}'", path))?;
            let index = &after[..close];
            rest = &after[close + 1..];
            if index == "0" {
                steps.push(Step::First(name));
                rest = rest.strip_prefix('.').unwrap_or(rest);
            } else {
                if !rest.is_empty() {
                    return Err(format!("map key must end '{}'", path));
                }
                steps.push(Step::MapKey(name, index));
            }
        } else {
            steps.push(Step::Field(name));
            rest = rest.strip_prefix('.').unwrap_or(rest);
        }
    }
    if steps.is_empty() {
        return Err("empty path".to_string());
    }
    if matches!(steps.last(), Some(Step::First(_))) {
        return Err(format!("'{}' must name a field after [0]", path));
    }
    Ok(steps)
}

enum Slot<'r> {
    Field(&'r mut Field, Shape),
    MapEntry(&'r mut BTreeMap<String, String>, String),
}

fn resolve<'r>(record: &'r mut Record, path: &str) -> Result<Slot<'r>, BindError> {
    let steps = parse_path(path).map_err(|cause| BindError::Failure {
        path: path.to_string(),
        target: record.type_name().to_string(),
        cause,
    })?;
    let not_found = |rec: &Record| BindError::FieldNotFound {
        path: path.to_string(),
        record: rec.type_name().to_string(),
    };
    let mismatch = |expected: &str, found: &Field| BindError::TypeMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        found: found.kind_name().to_string(),
    };

    let mut rec = record;
    let count = steps.len();
    for (i, step) in steps.into_iter().enumerate() {
        let last = i + 1 == count;
        match step {
            Step::Field(name) => {
                let idx = rec.shape.index_of(name).ok_or_else(|| not_found(rec))?;
                let shape = rec.shape.fields[idx].1;
                let field = &mut rec.fields[idx];
                if last {
                    return Ok(Slot::Field(field, shape));
                }
                match field {
                    Field::Struct(inner) => rec = inner.as_mut(),
                    other => return Err(mismatch("struct", &*other)),
                }
            }
            Step::First(name) => {
                let idx = rec.shape.index_of(name).ok_or_else(|| not_found(rec))?;
                let elem = match rec.shape.fields[idx].1 {
                    Shape::StructList(s) => s,
                    _ => return Err(mismatch("struct list", &rec.fields[idx])),
                };
                match &mut rec.fields[idx] {
                    Field::StructList(items) => {
                        if items.is_empty() {
                            items.push(Record::new(elem));
                        }
                        rec = &mut items[0];
                    }
                    other => return Err(mismatch("struct list", &*other)),
                }
            }
            Step::MapKey(name, key) => {
                let idx = rec.shape.index_of(name).ok_or_else(|| not_found(rec))?;
                return match &mut rec.fields[idx] {
                    Field::StrMap(map) => Ok(Slot::MapEntry(map, key.to_string())),
                    other => Err(mismatch("string map", &*other)),
                };
            }
        }
    }
    Err(not_found(rec))
}

// ============================================================================
// Binding
// ============================================================================

/// Ambient inputs some setter kinds need.
#[derive(Clone, Default)]
pub struct BindEnv<'a> {
    /// Timeout for URL downloads (defaults to 5 s)
    pub http_timeout: Option<Duration>,
    /// Data rendered into `{{ .key }}` file templates
    pub template_data: Option<&'a Params>,
    /// Receives template rendering warnings
    pub logger: Option<&'a Logger>,
}

/// Assign `value` into `target` at `path` using the coercion of `kind`.
pub fn bind(value: &Value, target: &mut Record, path: &str, kind: SetterKind) -> Result<(), BindError> {
    bind_with(value, target, path, kind, &BindEnv::default())
}

/// [`bind`] with explicit ambient inputs. Panics inside are recovered and
/// reported as [`BindError::Failure`].
pub fn bind_with(
    value: &Value,
    target: &mut Record,
    path: &str,
    kind: SetterKind,
    env: &BindEnv<'_>,
) -> Result<(), BindError> {
    let type_name = target.type_name();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        bind_inner(value, target, path, kind, env)
    }));
    match outcome {
        Ok(res) => res,
        Err(panic) => {
            let cause = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(BindError::Failure {
                path: path.to_string(),
                target: type_name.to_string(),
                cause,
            })
        }
    }
}

fn bind_inner(
    value: &Value,
    target: &mut Record,
    path: &str,
    kind: SetterKind,
    env: &BindEnv<'_>,
) -> Result<(), BindError> {
    use coerce::*;

    let slot = resolve(target, path)?;
    let (field, shape) = match slot {
        Slot::MapEntry(map, key) => {
            if kind != SetterKind::StrPointerMap {
                return Err(BindError::TypeMismatch {
                    path: path.to_string(),
                    expected: kind.to_string(),
                    found: "string map".to_string(),
                });
            }
            map.insert(key, cast_string(value));
            return Ok(());
        }
        Slot::Field(field, shape) => (field, shape),
    };
    let mismatch = |found: &Field| BindError::TypeMismatch {
        path: path.to_string(),
        expected: kind.to_string(),
        found: found.kind_name().to_string(),
    };

    match (kind, &mut *field) {
        (SetterKind::Str | SetterKind::SliceStruct, Field::Str(slot)) => {
            *slot = Some(cast_string(value));
        }
        (SetterKind::Int | SetterKind::Int64 | SetterKind::SliceStructInt64, Field::Int(slot)) => {
            *slot = Some(cast_int64(value).map_err(|r| BindError::coercion(kind, r))?);
        }
        (SetterKind::Float, Field::Float(slot)) => {
            *slot = Some(cast_float64(value).map_err(|r| BindError::coercion(kind, r))?);
        }
        (SetterKind::Bool, Field::Bool(slot)) | (SetterKind::BoolAttr, Field::BoolAttr(slot)) => {
            *slot = Some(cast_bool(value).map_err(|r| BindError::coercion(kind, r))?);
        }
        (SetterKind::StrAttr, Field::StrAttr(slot)) => {
            *slot = Some(cast_string(value));
        }
        (SetterKind::StrSlice, Field::StrList(slot)) => {
            *slot = cast_string_slice(value).map_err(|r| BindError::coercion(kind, r))?;
        }
        (SetterKind::Int64Slice, Field::IntList(slot)) => {
            *slot = vec![cast_int64(value).map_err(|r| BindError::coercion(kind, r))?];
        }
        (SetterKind::CsvStr, Field::Str(slot)) => {
            let items = cast_string_slice(value).map_err(|r| BindError::coercion(kind, r))?;
            *slot = Some(items.join(","));
        }
        (SetterKind::SixDigitsString, Field::Str(slot)) => {
            let n = cast_int64(value).map_err(|r| BindError::coercion(kind, r))?;
            *slot = Some(format!("{:06}", n));
        }
        (
            SetterKind::DimensionSlice
            | SetterKind::KeyValueSlice
            | SetterKind::ParameterSlice
            | SetterKind::TagSlice,
            Field::StructList(items),
        ) => {
            let (k, v) = match kind {
                SetterKind::ParameterSlice => ("ParameterKey", "ParameterValue"),
                SetterKind::TagSlice => ("Key", "Value"),
                _ => ("Name", "Value"),
            };
            let elem = elem_shape(shape, path)?;
            *items = key_value_records(value, elem, k, v, kind)?;
        }
        (SetterKind::PortMappings, Field::StructList(items)) => {
            *items = port_mappings(value, elem_shape(shape, path)?)?;
        }
        (SetterKind::StepAdjustments, Field::StructList(items)) => {
            *items = step_adjustments(value, elem_shape(shape, path)?)?;
        }
        (SetterKind::SubnetMappings, Field::StructList(items)) => {
            let elem = elem_shape(shape, path)?;
            let ids = cast_string_slice(value).map_err(|r| BindError::coercion(kind, r))?;
            let mut out = Vec::new();
            for id in ids {
                let mut rec = Record::new(elem);
                bind_inner(&Value::Str(id), &mut rec, "SubnetId", SetterKind::Str, env)?;
                out.push(rec);
            }
            *items = out;
        }
        (SetterKind::ClassicLbListeners, Field::StructList(items)) => {
            *items = classic_listeners(value, elem_shape(shape, path)?)?;
        }
        (SetterKind::FileToBase64, Field::Str(slot)) => {
            let source = cast_string(value);
            let timeout = env.http_timeout.unwrap_or(Duration::from_secs(5));
            let raw = fetch::read_source(&source, timeout)?;
            let content = match env.template_data {
                Some(data) => {
                    let text = String::from_utf8_lossy(&raw).into_owned();
                    match fetch::render_template(&text, data) {
                        Ok(rendered) => rendered.into_bytes(),
                        Err(e) => {
                            if let Some(logger) = env.logger {
                                logger.warn(&format!("{}: template not rendered: {}", source, e));
                            }
                            raw
                        }
                    }
                }
                None => raw,
            };
            *slot = Some(base64::engine::general_purpose::STANDARD.encode(content));
        }
        (SetterKind::FileToBytes, Field::Bytes(slot)) => {
            *slot = Some(fetch::read_file(&cast_string(value))?);
        }
        (SetterKind::FileToString, Field::Str(slot)) => {
            let bytes = fetch::read_file(&cast_string(value))?;
            *slot = Some(String::from_utf8_lossy(&bytes).into_owned());
        }
        (_, other) => return Err(mismatch(&*other)),
    }
    Ok(())
}

fn elem_shape(shape: Shape, path: &str) -> Result<&'static StructShape, BindError> {
    match shape {
        Shape::StructList(s) => Ok(s),
        _ => Err(BindError::TypeMismatch {
            path: path.to_string(),
            expected: "struct list".to_string(),
            found: format!("{:?}", shape),
        }),
    }
}

fn set_in(rec: &mut Record, field: &str, value: Value, kind: SetterKind) -> Result<(), BindError> {
    bind_inner(&value, rec, field, kind, &BindEnv::default())
}

fn key_value_records(
    value: &Value,
    elem: &'static StructShape,
    key_field: &str,
    value_field: &str,
    kind: SetterKind,
) -> Result<Vec<Record>, BindError> {
    let entries = coerce::cast_string_slice(value).map_err(|r| BindError::coercion(kind, r))?;
    let mut out = Vec::new();
    for entry in entries {
        let (k, v) = entry
            .split_once(':')
            .ok_or_else(|| BindError::coercion(kind, format!("'{}' is not key:value", entry)))?;
        let mut rec = Record::new(elem);
        set_in(&mut rec, key_field, Value::str(k), SetterKind::Str)?;
        set_in(&mut rec, value_field, Value::str(v), SetterKind::Str)?;
        out.push(rec);
    }
    Ok(out)
}

fn port_mappings(value: &Value, elem: &'static StructShape) -> Result<Vec<Record>, BindError> {
    let kind = SetterKind::PortMappings;
    let entries = coerce::cast_string_slice(value).map_err(|r| BindError::coercion(kind, r))?;
    let mut out = Vec::new();
    for entry in entries {
        if entry.contains('-') {
            return Err(BindError::coercion(kind, format!("port ranges are not supported: '{}'", entry)));
        }
        let (ports, proto) = match entry.split_once('/') {
            Some((ports, proto)) => {
                let proto = proto.to_lowercase();
                if proto != "tcp" && proto != "udp" {
                    return Err(BindError::coercion(
                        kind,
                        format!("invalid protocol '{}' (expect tcp or udp)", proto),
                    ));
                }
                (ports, Some(proto))
            }
            None => (entry.as_str(), None),
        };
        let mut rec = Record::new(elem);
        match ports.split_once(':') {
            Some((host, container)) => {
                set_in(&mut rec, "HostPort", Value::str(host), SetterKind::Int64)?;
                set_in(&mut rec, "ContainerPort", Value::str(container), SetterKind::Int64)?;
            }
            None => set_in(&mut rec, "ContainerPort", Value::str(ports), SetterKind::Int64)?,
        }
        if let Some(p) = proto {
            set_in(&mut rec, "Protocol", Value::Str(p), SetterKind::Str)?;
        }
        out.push(rec);
    }
    Ok(out)
}

fn step_adjustments(value: &Value, elem: &'static StructShape) -> Result<Vec<Record>, BindError> {
    let kind = SetterKind::StepAdjustments;
    let entries = coerce::cast_string_slice(value).map_err(|r| BindError::coercion(kind, r))?;
    let mut out = Vec::new();
    for entry in entries {
        let parts: Vec<&str> = entry.split(':').collect();
        if parts.len() != 3 {
            return Err(BindError::coercion(
                kind,
                format!("'{}' is not lower:upper:adjustment", entry),
            ));
        }
        let mut rec = Record::new(elem);
        if !parts[0].is_empty() {
            set_in(&mut rec, "MetricIntervalLowerBound", Value::str(parts[0]), SetterKind::Float)?;
        }
        if !parts[1].is_empty() {
            set_in(&mut rec, "MetricIntervalUpperBound", Value::str(parts[1]), SetterKind::Float)?;
        }
        set_in(&mut rec, "ScalingAdjustment", Value::str(parts[2]), SetterKind::Int64)?;
        out.push(rec);
    }
    Ok(out)
}

fn classic_listeners(value: &Value, elem: &'static StructShape) -> Result<Vec<Record>, BindError> {
    let kind = SetterKind::ClassicLbListeners;
    let entries = coerce::cast_string_slice(value).map_err(|r| BindError::coercion(kind, r))?;
    let mut out = Vec::new();
    for entry in entries {
        let parts: Vec<&str> = entry.split(':').collect();
        if parts.len() != 4 {
            return Err(BindError::coercion(
                kind,
                format!("'{}' is not PROTO:port:PROTO:port", entry),
            ));
        }
        let mut rec = Record::new(elem);
        set_in(&mut rec, "Protocol", Value::str(parts[0]), SetterKind::Str)?;
        set_in(&mut rec, "LoadBalancerPort", Value::str(parts[1]), SetterKind::Int64)?;
        set_in(&mut rec, "InstanceProtocol", Value::str(parts[2]), SetterKind::Str)?;
        set_in(&mut rec, "InstancePort", Value::str(parts[3]), SetterKind::Int64)?;
        out.push(rec);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    static TAG: StructShape = StructShape::new("Tag", &[("Key", Shape::Str), ("Value", Shape::Str)]);
    static DIMENSION: StructShape =
        StructShape::new("Dimension", &[("Name", Shape::Str), ("Value", Shape::Str)]);
    static PARAMETER: StructShape = StructShape::new(
        "Parameter",
        &[("ParameterKey", Shape::Str), ("ParameterValue", Shape::Str)],
    );
    static PORT: StructShape = StructShape::new(
        "PortMapping",
        &[
            ("ContainerPort", Shape::Int),
            ("HostPort", Shape::Int),
            ("Protocol", Shape::Str),
        ],
    );
    static STEP: StructShape = StructShape::new(
        "StepAdjustment",
        &[
            ("MetricIntervalLowerBound", Shape::Float),
            ("MetricIntervalUpperBound", Shape::Float),
            ("ScalingAdjustment", Shape::Int),
        ],
    );
    static LISTENER: StructShape = StructShape::new(
        "Listener",
        &[
            ("Protocol", Shape::Str),
            ("LoadBalancerPort", Shape::Int),
            ("InstanceProtocol", Shape::Str),
            ("InstancePort", Shape::Int),
        ],
    );
    static SUBNET_MAPPING: StructShape = StructShape::new("SubnetMapping", &[("SubnetId", Shape::Str)]);
    static PLACEMENT: StructShape =
        StructShape::new("Placement", &[("AvailabilityZone", Shape::Str), ("Tenancy", Shape::Str)]);
    static FILTER: StructShape =
        StructShape::new("Filter", &[("Name", Shape::Str), ("Values", Shape::StrList)]);
    static INPUT: StructShape = StructShape::new(
        "TestInput",
        &[
            ("Name", Shape::Str),
            ("Count", Shape::Int),
            ("Threshold", Shape::Float),
            ("DryRun", Shape::Bool),
            ("Enabled", Shape::BoolAttr),
            ("Description", Shape::StrAttr),
            ("Ids", Shape::StrList),
            ("Ports", Shape::IntList),
            ("Code", Shape::Str),
            ("Body", Shape::Bytes),
            ("Attributes", Shape::StrMap),
            ("Placement", Shape::Struct(&PLACEMENT)),
            ("Filters", Shape::StructList(&FILTER)),
            ("Tags", Shape::StructList(&TAG)),
            ("Dimensions", Shape::StructList(&DIMENSION)),
            ("Parameters", Shape::StructList(&PARAMETER)),
            ("PortMappings", Shape::StructList(&PORT)),
            ("StepAdjustments", Shape::StructList(&STEP)),
            ("Listeners", Shape::StructList(&LISTENER)),
            ("SubnetMappings", Shape::StructList(&SUBNET_MAPPING)),
        ],
    );

    fn rec() -> Record {
        Record::new(&INPUT)
    }

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_cs010_string_from_any() {
        let mut r = rec();
        bind(&Value::Int(12), &mut r, "Name", SetterKind::Str).unwrap();
        assert_eq!(r.str_at("Name"), Some("12"));
        bind(&list(&["a", "b"]), &mut r, "Name", SetterKind::Str).unwrap();
        assert_eq!(r.str_at("Name"), Some("a,b"));
    }

    #[test]
    fn test_cs010_int64_from_string_and_int() {
        let mut r = rec();
        bind(&Value::str("42"), &mut r, "Count", SetterKind::Int64).unwrap();
        assert_eq!(r.int_at("Count"), Some(42));
        bind(&Value::Int(7), &mut r, "Count", SetterKind::Int).unwrap();
        assert_eq!(r.int_at("Count"), Some(7));
    }

    #[test]
    fn test_cs010_int64_invalid() {
        let mut r = rec();
        let err = bind(&Value::str("forty"), &mut r, "Count", SetterKind::Int64).unwrap_err();
        assert_eq!(
            err,
            BindError::Coercion {
                kind: SetterKind::Int64,
                reason: "invalid integer value 'forty'".to_string()
            }
        );
    }

    #[test]
    fn test_cs010_float_and_bool() {
        let mut r = rec();
        bind(&Value::str("0.5"), &mut r, "Threshold", SetterKind::Float).unwrap();
        assert_eq!(r.float_at("Threshold"), Some(0.5));
        bind(&Value::Int(3), &mut r, "Threshold", SetterKind::Float).unwrap();
        assert_eq!(r.float_at("Threshold"), Some(3.0));
        bind(&Value::str("true"), &mut r, "DryRun", SetterKind::Bool).unwrap();
        assert_eq!(r.bool_at("DryRun"), Some(true));
        assert!(bind(&Value::str("maybe"), &mut r, "DryRun", SetterKind::Bool).is_err());
    }

    #[test]
    fn test_cs010_attribute_wrappers() {
        let mut r = rec();
        bind(&Value::Bool(true), &mut r, "Enabled", SetterKind::BoolAttr).unwrap();
        bind(&Value::str("web"), &mut r, "Description", SetterKind::StrAttr).unwrap();
        let json = r.to_json();
        assert_eq!(json["Enabled"], serde_json::json!({"Value": true}));
        assert_eq!(json["Description"], serde_json::json!({"Value": "web"}));
    }

    #[test]
    fn test_cs010_string_slice() {
        let mut r = rec();
        bind(&Value::str("sg-1"), &mut r, "Ids", SetterKind::StrSlice).unwrap();
        assert_eq!(r.list_at("Ids").unwrap(), &["sg-1".to_string()]);
        bind(&list(&["a", "b"]), &mut r, "Ids", SetterKind::StrSlice).unwrap();
        assert_eq!(r.list_at("Ids").unwrap().len(), 2);
        let err = bind(&Value::Bool(true), &mut r, "Ids", SetterKind::StrSlice).unwrap_err();
        assert!(matches!(err, BindError::Coercion { .. }));
    }

    #[test]
    fn test_cs010_int64_slice_single_element() {
        let mut r = rec();
        bind(&Value::str("8080"), &mut r, "Ports", SetterKind::Int64Slice).unwrap();
        assert_eq!(r.to_json()["Ports"], serde_json::json!([8080]));
    }

    #[test]
    fn test_cs010_csv_and_six_digits() {
        let mut r = rec();
        bind(&list(&["a", "b", "c"]), &mut r, "Name", SetterKind::CsvStr).unwrap();
        assert_eq!(r.str_at("Name"), Some("a,b,c"));
        bind(&Value::Int(42), &mut r, "Code", SetterKind::SixDigitsString).unwrap();
        assert_eq!(r.str_at("Code"), Some("000042"));
    }

    #[test]
    fn test_cs010_key_value_slices() {
        let mut r = rec();
        bind(
            &list(&["InstanceId:i-1", "url:http://x:8080"]),
            &mut r,
            "Dimensions",
            SetterKind::DimensionSlice,
        )
        .unwrap();
        let dims = r.records_at("Dimensions").unwrap();
        assert_eq!(dims[0].str_at("Name"), Some("InstanceId"));
        assert_eq!(dims[1].str_at("Value"), Some("http://x:8080"));

        bind(&list(&["Env:prod"]), &mut r, "Parameters", SetterKind::ParameterSlice).unwrap();
        let p = &r.records_at("Parameters").unwrap()[0];
        assert_eq!(p.str_at("ParameterKey"), Some("Env"));
        assert_eq!(p.str_at("ParameterValue"), Some("prod"));

        bind(&Value::str("Name:web"), &mut r, "Tags", SetterKind::TagSlice).unwrap();
        assert_eq!(r.records_at("Tags").unwrap()[0].str_at("Key"), Some("Name"));

        let err = bind(&list(&["novalue"]), &mut r, "Dimensions", SetterKind::DimensionSlice)
            .unwrap_err();
        assert!(matches!(err, BindError::Coercion { .. }));
    }

    #[test]
    fn test_cs010_port_mappings() {
        let mut r = rec();
        bind(
            &list(&["8080:80/tcp", "53/udp", "443"]),
            &mut r,
            "PortMappings",
            SetterKind::PortMappings,
        )
        .unwrap();
        let m = r.records_at("PortMappings").unwrap();
        assert_eq!(m[0].int_at("HostPort"), Some(8080));
        assert_eq!(m[0].int_at("ContainerPort"), Some(80));
        assert_eq!(m[0].str_at("Protocol"), Some("tcp"));
        assert_eq!(m[1].int_at("HostPort"), None);
        assert_eq!(m[1].str_at("Protocol"), Some("udp"));
        assert_eq!(m[2].int_at("ContainerPort"), Some(443));
    }

    #[test]
    fn test_cs010_port_mappings_rejects_ranges_and_protocols() {
        let mut r = rec();
        assert!(bind(&Value::str("80-90"), &mut r, "PortMappings", SetterKind::PortMappings).is_err());
        assert!(bind(&Value::str("80/icmp"), &mut r, "PortMappings", SetterKind::PortMappings).is_err());
    }

    #[test]
    fn test_cs010_step_adjustments() {
        let mut r = rec();
        bind(
            &list(&["0:25:1", "25::2", ":0:-1"]),
            &mut r,
            "StepAdjustments",
            SetterKind::StepAdjustments,
        )
        .unwrap();
        let s = r.records_at("StepAdjustments").unwrap();
        assert_eq!(s[0].float_at("MetricIntervalLowerBound"), Some(0.0));
        assert_eq!(s[0].float_at("MetricIntervalUpperBound"), Some(25.0));
        assert_eq!(s[1].float_at("MetricIntervalUpperBound"), None);
        assert_eq!(s[2].float_at("MetricIntervalLowerBound"), None);
        assert_eq!(s[2].int_at("ScalingAdjustment"), Some(-1));
        assert!(bind(&Value::str("1:2"), &mut r, "StepAdjustments", SetterKind::StepAdjustments).is_err());
    }

    #[test]
    fn test_cs010_subnet_mappings_and_listeners() {
        let mut r = rec();
        bind(&list(&["subnet-1", "subnet-2"]), &mut r, "SubnetMappings", SetterKind::SubnetMappings)
            .unwrap();
        assert_eq!(r.records_at("SubnetMappings").unwrap()[1].str_at("SubnetId"), Some("subnet-2"));
        bind(&Value::str("HTTP:80:HTTP:8080"), &mut r, "Listeners", SetterKind::ClassicLbListeners)
            .unwrap();
        let l = &r.records_at("Listeners").unwrap()[0];
        assert_eq!(l.int_at("InstancePort"), Some(8080));
        assert_eq!(l.str_at("InstanceProtocol"), Some("HTTP"));
    }

    #[test]
    fn test_cs010_string_pointer_map() {
        let mut r = rec();
        bind(&Value::Int(30), &mut r, "Attributes[VisibilityTimeout]", SetterKind::StrPointerMap)
            .unwrap();
        assert_eq!(r.to_json()["Attributes"]["VisibilityTimeout"], "30");
        let err = bind(&Value::Int(1), &mut r, "Attributes[Delay]", SetterKind::Str).unwrap_err();
        assert!(matches!(err, BindError::TypeMismatch { .. }));
    }

    #[test]
    fn test_cs010_slice_of_struct() {
        let mut r = rec();
        bind(&Value::str("tag:Name"), &mut r, "Filters[0]Name", SetterKind::SliceStruct).unwrap();
        bind(&Value::str("web"), &mut r, "Tags[0]Value", SetterKind::SliceStruct).unwrap();
        bind(&Value::str("Name"), &mut r, "Tags[0].Key", SetterKind::SliceStruct).unwrap();
        assert_eq!(r.records_at("Filters").unwrap().len(), 1);
        assert_eq!(r.str_at("Filters[0]Name"), Some("tag:Name"));
        let tags = r.records_at("Tags").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].str_at("Key"), Some("Name"));
        assert_eq!(tags[0].str_at("Value"), Some("web"));
    }

    #[test]
    fn test_cs010_slice_of_struct_int64() {
        static ITEM: StructShape = StructShape::new("Item", &[("Port", Shape::Int)]);
        static HOLDER: StructShape = StructShape::new("Holder", &[("Items", Shape::StructList(&ITEM))]);
        let mut r = Record::new(&HOLDER);
        bind(&Value::str("80"), &mut r, "Items[0]Port", SetterKind::SliceStructInt64).unwrap();
        assert_eq!(r.int_at("Items[0]Port"), Some(80));
    }

    #[test]
    fn test_cs010_nested_struct_path() {
        let mut r = rec();
        bind(&Value::str("us-east-1a"), &mut r, "Placement.AvailabilityZone", SetterKind::Str)
            .unwrap();
        assert_eq!(r.to_json()["Placement"]["AvailabilityZone"], "us-east-1a");
        assert!(r.to_json()["Placement"].get("Tenancy").is_none());
    }

    #[test]
    fn test_cs010_field_not_found() {
        let mut r = rec();
        let err = bind(&Value::str("x"), &mut r, "Missing", SetterKind::Str).unwrap_err();
        assert_eq!(
            err,
            BindError::FieldNotFound {
                path: "Missing".into(),
                record: "TestInput".into()
            }
        );
        assert!(bind(&Value::str("x"), &mut r, "Placement.Nope", SetterKind::Str).is_err());
    }

    #[test]
    fn test_cs010_type_mismatch() {
        let mut r = rec();
        let err = bind(&Value::str("x"), &mut r, "Count", SetterKind::Str).unwrap_err();
        assert!(matches!(err, BindError::TypeMismatch { ref found, .. } if found == "int64"));
    }

    #[test]
    fn test_cs010_bad_path_is_failure() {
        let mut r = rec();
        let err = bind(&Value::str("x"), &mut r, "Tags[0", SetterKind::Str).unwrap_err();
        assert!(matches!(err, BindError::Failure { .. }));
    }

    #[test]
    fn test_cs010_file_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "hello").unwrap();
        let p = path.to_string_lossy().to_string();
        let mut r = rec();
        bind(&Value::str(p.clone()), &mut r, "Body", SetterKind::FileToBytes).unwrap();
        assert_eq!(r.bytes_at("Body"), Some(&b"hello"[..]));
        bind(&Value::str(p.clone()), &mut r, "Name", SetterKind::FileToString).unwrap();
        assert_eq!(r.str_at("Name"), Some("hello"));
        bind(&Value::str(p), &mut r, "Code", SetterKind::FileToBase64).unwrap();
        assert_eq!(r.str_at("Code"), Some("aGVsbG8="));
    }

    #[test]
    fn test_cs010_file_to_base64_renders_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("userdata.sh");
        std::fs::write(&path, "hostname {{ .name }}").unwrap();
        let data = crate::core::types::params([("name", Value::str("web"))]);
        let env = BindEnv {
            template_data: Some(&data),
            ..Default::default()
        };
        let mut r = rec();
        bind_with(
            &Value::str(path.to_string_lossy().to_string()),
            &mut r,
            "Code",
            SetterKind::FileToBase64,
            &env,
        )
        .unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(r.str_at("Code").unwrap())
            .unwrap();
        assert_eq!(decoded, b"hostname web");
    }

    #[test]
    fn test_cs010_template_failure_only_warns() {
        let (logger, sink) = Logger::memory();
        let data = crate::core::types::params([]);
        let env = BindEnv {
            template_data: Some(&data),
            logger: Some(&logger),
            ..Default::default()
        };
        let mut r = rec();
        bind_with(&Value::str("#echo {{ .missing }}"), &mut r, "Code", SetterKind::FileToBase64, &env)
            .unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(r.str_at("Code").unwrap())
            .unwrap();
        assert_eq!(decoded, b"#echo {{ .missing }}");
        assert_eq!(sink.at(crate::core::log::Level::Warn).len(), 1);
    }

    #[test]
    fn test_cs010_missing_file() {
        let mut r = rec();
        assert!(bind(&Value::str("/nonexistent/x"), &mut r, "Body", SetterKind::FileToBytes).is_err());
    }

    #[test]
    fn test_cs010_to_json_omits_unset() {
        let mut r = rec();
        r.put("Name", "vpc", SetterKind::Str).unwrap();
        let json = r.to_json();
        assert_eq!(json, serde_json::json!({"Name": "vpc"}));
    }

    #[test]
    fn test_cs010_parse_path() {
        assert_eq!(
            parse_path("A.B[0]C").unwrap(),
            vec![Step::Field("A"), Step::First("B"), Step::Field("C")]
        );
        assert_eq!(parse_path("M[key]").unwrap(), vec![Step::MapKey("M", "key")]);
        assert!(parse_path("").is_err());
        assert!(parse_path("A[0]").is_err());
        assert!(parse_path("M[k]X").is_err());
    }
}
