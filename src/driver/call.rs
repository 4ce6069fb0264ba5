//! Call descriptors: the four phases shared by every mutation.
//!
//! 1. bind required params (missing keys fail before anything else)
//! 2. bind the optional params that are present
//! 3. invoke, with `DryRun=true` in dry-run mode when the API supports it
//! 4. extract the identifier from the response

use super::{fake_dry_run_id, CallResult, Ctx, DriverError};
use crate::binder::{bind_with, BindError, Record, SetterKind, Shape, StructShape};
use crate::core::types::{Params, Value};

/// Binding directive from a script key to a request field.
#[derive(Debug, Clone, Copy)]
pub struct Setter {
    pub key: &'static str,
    pub path: &'static str,
    pub kind: SetterKind,
}

pub const fn set(key: &'static str, path: &'static str, kind: SetterKind) -> Setter {
    Setter { key, path, kind }
}

/// Where the command result comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Output {
    /// JSON path into the response (`Vpc.VpcId`)
    Path(&'static str),
    /// The whole response document
    Whole,
    /// No result
    Nothing,
    /// Echo one of the command params
    Param(&'static str),
}

/// How the dry-run variant validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DryRunMode {
    /// Send the request with `DryRun=true`
    Flag,
    /// Bind params locally, never call the provider
    Params,
}

#[derive(Debug)]
pub struct CallSpec {
    pub service: &'static str,
    pub operation: &'static str,
    pub input: &'static StructShape,
    pub required: &'static [Setter],
    pub extras: &'static [Setter],
    pub output: Output,
    pub dry_run: DryRunMode,
}

// ============================================================================
// Shared request shapes
// ============================================================================

pub static TAG: StructShape = StructShape::new("Tag", &[("Key", Shape::Str), ("Value", Shape::Str)]);

pub static FILTER: StructShape =
    StructShape::new("Filter", &[("Name", Shape::Str), ("Values", Shape::StrList)]);

// ============================================================================
// Execution
// ============================================================================

fn bind_error(key: &str, err: BindError) -> DriverError {
    match err {
        BindError::Coercion { kind, reason } => DriverError::invalid(key, kind.expected(), reason),
        BindError::Fetch { url, cause } => DriverError::Fetch { url, cause },
        other => DriverError::Bind(other),
    }
}

/// Bind one param value at `path`, mapping coercion failures to the param key.
pub fn bind_param(
    ctx: &Ctx<'_>,
    input: &mut Record,
    key: &str,
    value: &Value,
    path: &str,
    kind: SetterKind,
    params: &Params,
) -> Result<(), DriverError> {
    bind_with(value, input, path, kind, &ctx.bind_env(Some(params))).map_err(|e| bind_error(key, e))
}

/// Phases 1 and 2: a request record with every present param bound.
pub fn prepare(ctx: &Ctx<'_>, spec: &CallSpec, params: &Params) -> Result<Record, DriverError> {
    for s in spec.required {
        if !params.contains_key(s.key) {
            return Err(DriverError::MissingRequiredParam(s.key.to_string()));
        }
    }
    let mut input = Record::new(spec.input);
    for s in spec.required.iter().chain(spec.extras) {
        if let Some(value) = params.get(s.key) {
            bind_param(ctx, &mut input, s.key, value, s.path, s.kind, params)?;
        }
    }
    Ok(input)
}

/// Phases 3 and 4 for an already prepared request.
pub fn invoke(ctx: &Ctx<'_>, spec: &CallSpec, input: Record, params: &Params) -> CallResult {
    if ctx.dry_run {
        return match spec.dry_run {
            DryRunMode::Params => ctx.dry_run_ok(),
            DryRunMode::Flag => {
                send(ctx, spec.service, spec.operation, input)?;
                ctx.logger
                    .verbose(&format!("dry run: {} ok", ctx.command()));
                Ok(Some(Value::Str(fake_dry_run_id(ctx.entity))))
            }
        };
    }
    let resp = ctx.call(spec.service, spec.operation, &input)?;
    extract(&resp, spec.output, params)
}

/// Send a hand-built request. In dry-run mode the request carries
/// `DryRun=true` and `None` means the provider accepted it.
pub fn send(
    ctx: &Ctx<'_>,
    service: &str,
    operation: &str,
    mut input: Record,
) -> Result<Option<serde_json::Value>, DriverError> {
    if !ctx.dry_run {
        return ctx.call(service, operation, &input).map(Some);
    }
    input.put("DryRun", true, SetterKind::Bool)?;
    match ctx.call(service, operation, &input) {
        Ok(_) => Ok(None),
        Err(DriverError::Provider(e)) if e.is_dry_run_success() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Run a descriptor end to end.
pub fn exec_spec(ctx: &Ctx<'_>, spec: &CallSpec, params: &Params) -> CallResult {
    let input = prepare(ctx, spec, params)?;
    invoke(ctx, spec, input, params)
}

/// Apply an [`Output`] rule to a response.
pub fn extract(resp: &serde_json::Value, output: Output, params: &Params) -> CallResult {
    match output {
        Output::Nothing => Ok(None),
        Output::Whole => Ok(Value::from_json(resp)),
        Output::Param(key) => Ok(params.get(key).cloned()),
        Output::Path(path) => match json_path(resp, path) {
            Some(v) if !v.is_null() => Ok(Value::from_json(v)),
            _ => Err(DriverError::Other(format!(
                "no value at '{}' in provider response",
                path
            ))),
        },
    }
}

/// Look up `A.B[0].C` (or `A.B[0]C`) in a JSON document.
pub fn json_path<'v>(doc: &'v serde_json::Value, path: &str) -> Option<&'v serde_json::Value> {
    let mut cur = doc;
    for segment in path.split('.') {
        let mut rest = segment;
        while !rest.is_empty() {
            let cut = rest.find('[').unwrap_or(rest.len());
            let name = &rest[..cut];
            if !name.is_empty() {
                cur = cur.get(name)?;
            }
            rest = &rest[cut..];
            if let Some(after) = rest.strip_prefix('[') {
                let close = after.find(']')?;
                let index: usize = after[..close].parse().ok()?;
                cur = cur.get(index)?;
                rest = &after[close + 1..];
            }
        }
    }
    Some(cur)
}

/// String at a JSON path.
pub fn json_str<'v>(doc: &'v serde_json::Value, path: &str) -> Option<&'v str> {
    json_path(doc, path).and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::Logger;
    use crate::core::settings::Settings;
    use crate::core::types::{params, Action};
    use crate::provider::sim::SimCloud;
    use serde_json::json;

    static INPUT: StructShape = StructShape::new(
        "CreateThingInput",
        &[("Name", Shape::Str), ("Size", Shape::Int), ("DryRun", Shape::Bool)],
    );

    static SPEC: CallSpec = CallSpec {
        service: "test",
        operation: "CreateThing",
        input: &INPUT,
        required: &[set("name", "Name", SetterKind::Str)],
        extras: &[set("size", "Size", SetterKind::Int64)],
        output: Output::Path("Thing.Id"),
        dry_run: DryRunMode::Flag,
    };

    fn ctx<'a>(sim: &'a SimCloud, logger: &'a Logger, settings: &'a Settings, dry_run: bool) -> Ctx<'a> {
        Ctx {
            api: sim,
            logger,
            settings,
            dry_run,
            action: Action::Create,
            entity: "thing",
        }
    }

    #[test]
    fn test_cs031_json_path() {
        let doc = json!({"Instances": [{"InstanceId": "i-1"}], "Vpc": {"VpcId": "vpc-1"}});
        assert_eq!(json_str(&doc, "Vpc.VpcId"), Some("vpc-1"));
        assert_eq!(json_str(&doc, "Instances[0].InstanceId"), Some("i-1"));
        assert_eq!(json_str(&doc, "Instances[0]InstanceId"), Some("i-1"));
        assert!(json_path(&doc, "Instances[3].InstanceId").is_none());
    }

    #[test]
    fn test_cs031_missing_required_before_binding() {
        let sim = SimCloud::new();
        let (logger, settings) = (Logger::default(), Settings::default());
        let err = exec_spec(&ctx(&sim, &logger, &settings, false), &SPEC, &params([]))
            .unwrap_err();
        assert!(matches!(err, DriverError::MissingRequiredParam(ref k) if k == "name"));
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn test_cs031_invalid_param_type() {
        let sim = SimCloud::new();
        let (logger, settings) = (Logger::default(), Settings::default());
        let p = params([("name", Value::str("x")), ("size", Value::str("big"))]);
        let err = exec_spec(&ctx(&sim, &logger, &settings, false), &SPEC, &p).unwrap_err();
        assert!(matches!(
            err,
            DriverError::InvalidParamType { ref key, ref expected, .. } if key == "size" && expected == "integer"
        ));
    }

    #[test]
    fn test_cs031_dry_run_flag_sets_dry_run_and_fakes_id() {
        let sim = SimCloud::new();
        let (logger, settings) = (Logger::default(), Settings::default());
        let p = params([("name", Value::str("x"))]);
        let out = exec_spec(&ctx(&sim, &logger, &settings, true), &SPEC, &p)
            .unwrap()
            .unwrap();
        assert!(out.to_string().starts_with("dryrunid-"));
        let calls = sim.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].input["DryRun"], json!(true));
    }

    #[test]
    fn test_cs031_dry_run_other_error_is_reported() {
        let sim = SimCloud::new();
        sim.fail("test", "CreateThing", "UnauthorizedOperation", "denied");
        let (logger, settings) = (Logger::default(), Settings::default());
        let p = params([("name", Value::str("x"))]);
        let err = exec_spec(&ctx(&sim, &logger, &settings, true), &SPEC, &p).unwrap_err();
        assert_eq!(err.to_string(), "UnauthorizedOperation: denied");
    }

    #[test]
    fn test_cs031_live_extracts_path() {
        let sim = SimCloud::new();
        sim.respond("test", "CreateThing", json!({"Thing": {"Id": "t-9"}}));
        let (logger, settings) = (Logger::default(), Settings::default());
        let p = params([("name", Value::str("x")), ("size", Value::Int(3))]);
        let out = exec_spec(&ctx(&sim, &logger, &settings, false), &SPEC, &p).unwrap();
        assert_eq!(out, Some(Value::str("t-9")));
        let calls = sim.calls();
        assert_eq!(calls[0].input, json!({"Name": "x", "Size": 3}));
    }

    #[test]
    fn test_cs031_extract_rules() {
        let p = params([("name", Value::str("b"))]);
        let doc = json!({"A": 1});
        assert_eq!(extract(&doc, Output::Nothing, &p).unwrap(), None);
        assert_eq!(extract(&doc, Output::Param("name"), &p).unwrap(), Some(Value::str("b")));
        assert_eq!(extract(&doc, Output::Path("A"), &p).unwrap(), Some(Value::Int(1)));
        assert!(extract(&doc, Output::Path("B"), &p).is_err());
        assert!(extract(&doc, Output::Whole, &p).unwrap().is_some());
    }
}
