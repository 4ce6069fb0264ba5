//! CloudWatch metric alarms.
//!
//! The provider's put call replaces the whole alarm, so attaching or
//! detaching an action reads the current definition and writes it back.

use super::call::{set, CallSpec, DryRunMode, Output};
use super::{param_str, require, CallResult, Command, Ctx, DriverError};
use crate::binder::{Record, SetterKind as K, Shape, StructShape};
use crate::core::types::{Action::*, Params, Value};
use serde_json::Value as Json;

static DIMENSION: StructShape =
    StructShape::new("Dimension", &[("Name", Shape::Str), ("Value", Shape::Str)]);
static PUT_ALARM: StructShape = StructShape::new(
    "PutMetricAlarmInput",
    &[
        ("AlarmName", Shape::Str),
        ("ComparisonOperator", Shape::Str),
        ("MetricName", Shape::Str),
        ("Namespace", Shape::Str),
        ("EvaluationPeriods", Shape::Int),
        ("Period", Shape::Int),
        ("Statistic", Shape::Str),
        ("Threshold", Shape::Float),
        ("ActionsEnabled", Shape::Bool),
        ("AlarmActions", Shape::StrList),
        ("InsufficientDataActions", Shape::StrList),
        ("OKActions", Shape::StrList),
        ("AlarmDescription", Shape::Str),
        ("Dimensions", Shape::StructList(&DIMENSION)),
        ("Unit", Shape::Str),
    ],
);
static ALARM_NAMES: StructShape =
    StructShape::new("AlarmNamesInput", &[("AlarmNames", Shape::StrList)]);

const fn cloudwatch(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [super::call::Setter],
    extras: &'static [super::call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "cloudwatch",
        operation,
        input,
        required,
        extras,
        output,
        dry_run: DryRunMode::Params,
    }
}

static CREATE_ALARM_CALL: CallSpec = cloudwatch(
    "PutMetricAlarm",
    &PUT_ALARM,
    &[
        set("name", "AlarmName", K::Str),
        set("operator", "ComparisonOperator", K::Str),
        set("metric", "MetricName", K::Str),
        set("namespace", "Namespace", K::Str),
        set("evaluation-periods", "EvaluationPeriods", K::Int64),
        set("period", "Period", K::Int64),
        set("statistic-function", "Statistic", K::Str),
        set("threshold", "Threshold", K::Float),
    ],
    &[
        set("enabled", "ActionsEnabled", K::Bool),
        set("alarm-actions", "AlarmActions", K::StrSlice),
        set("insufficientdata-actions", "InsufficientDataActions", K::StrSlice),
        set("ok-actions", "OKActions", K::StrSlice),
        set("description", "AlarmDescription", K::Str),
        set("dimensions", "Dimensions", K::DimensionSlice),
        set("unit", "Unit", K::Str),
    ],
    Output::Param("name"),
);
static DELETE_ALARM_CALL: CallSpec = cloudwatch(
    "DeleteAlarms",
    &ALARM_NAMES,
    &[set("name", "AlarmNames", K::StrSlice)],
    &[],
    Output::Nothing,
);
static START_ALARM_CALL: CallSpec = cloudwatch(
    "EnableAlarmActions",
    &ALARM_NAMES,
    &[set("names", "AlarmNames", K::StrSlice)],
    &[],
    Output::Nothing,
);
static STOP_ALARM_CALL: CallSpec = cloudwatch(
    "DisableAlarmActions",
    &ALARM_NAMES,
    &[set("names", "AlarmNames", K::StrSlice)],
    &[],
    Output::Nothing,
);

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "alarm", &CREATE_ALARM_CALL),
    Command::spec(Delete, "alarm", &DELETE_ALARM_CALL),
    Command::spec(Start, "alarm", &START_ALARM_CALL),
    Command::spec(Stop, "alarm", &STOP_ALARM_CALL),
    Command::custom(Attach, "alarm", attach_alarm),
    Command::custom(Detach, "alarm", detach_alarm),
];

fn describe_alarm(ctx: &Ctx<'_>, name: &str) -> Result<Json, DriverError> {
    let mut input = Record::new(&ALARM_NAMES);
    input.put("AlarmNames", Value::List(vec![name.to_string()]), K::StrSlice)?;
    let resp = ctx.call("cloudwatch", "DescribeAlarms", &input)?;
    resp.get("MetricAlarms")
        .and_then(|a| a.get(0))
        .cloned()
        .ok_or_else(|| DriverError::Other(format!("alarm '{}' not found", name)))
}

/// Put request reproducing an existing alarm definition.
fn alarm_input(alarm: &Json) -> Result<Record, DriverError> {
    const FIELDS: &[(&str, K)] = &[
        ("AlarmName", K::Str),
        ("ComparisonOperator", K::Str),
        ("MetricName", K::Str),
        ("Namespace", K::Str),
        ("EvaluationPeriods", K::Int64),
        ("Period", K::Int64),
        ("Statistic", K::Str),
        ("Threshold", K::Float),
        ("ActionsEnabled", K::Bool),
        ("AlarmActions", K::StrSlice),
        ("InsufficientDataActions", K::StrSlice),
        ("OKActions", K::StrSlice),
        ("AlarmDescription", K::Str),
        ("Unit", K::Str),
    ];
    let mut input = Record::new(&PUT_ALARM);
    for (field, kind) in FIELDS {
        if let Some(value) = alarm.get(*field).and_then(Value::from_json) {
            input.put(field, value, *kind)?;
        }
    }
    let dimensions: Vec<String> = alarm
        .get("Dimensions")
        .and_then(|d| d.as_array())
        .map(|dims| {
            dims.iter()
                .filter_map(|d| {
                    let name = d.get("Name")?.as_str()?;
                    let value = d.get("Value")?.as_str()?;
                    Some(format!("{}:{}", name, value))
                })
                .collect()
        })
        .unwrap_or_default();
    if !dimensions.is_empty() {
        input.put("Dimensions", Value::List(dimensions), K::DimensionSlice)?;
    }
    Ok(input)
}

fn update_actions(ctx: &Ctx<'_>, params: &Params, attach: bool) -> CallResult {
    require(params, &["name", "action-arn"])?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let (name, arn) = (param_str(params, "name")?, param_str(params, "action-arn")?);
    let alarm = describe_alarm(ctx, &name)?;
    let mut actions: Vec<String> = alarm
        .get("AlarmActions")
        .and_then(|a| a.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).map(str::to_string).collect())
        .unwrap_or_default();
    if attach {
        if !actions.contains(&arn) {
            actions.push(arn);
        }
    } else {
        actions.retain(|a| *a != arn);
    }

    let mut input = alarm_input(&alarm)?;
    input.put("AlarmActions", Value::List(actions), K::StrSlice)?;
    ctx.call("cloudwatch", "PutMetricAlarm", &input)?;
    Ok(None)
}

fn attach_alarm(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    update_actions(ctx, params, true)
}

fn detach_alarm(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    update_actions(ctx, params, false)
}
