//! Application load balancers, listeners and target groups.

use super::call::{self, json_str, set, CallSpec, DryRunMode, Output};
use super::checker::{await_state, NOT_FOUND};
use super::{CallResult, Command, Ctx, DriverError};
use crate::binder::{Record, SetterKind as K, Shape, StructShape};
use crate::core::types::{Action::*, Params, Value};

static CREATE_LB: StructShape = StructShape::new(
    "CreateLoadBalancerInput",
    &[
        ("Name", Shape::Str),
        ("Subnets", Shape::StrList),
        ("IpAddressType", Shape::Str),
        ("Scheme", Shape::Str),
        ("SecurityGroups", Shape::StrList),
        ("Type", Shape::Str),
    ],
);
static LB_ARN: StructShape = StructShape::new("DeleteLoadBalancerInput", &[("LoadBalancerArn", Shape::Str)]);
static DESCRIBE_LBS: StructShape =
    StructShape::new("DescribeLoadBalancersInput", &[("LoadBalancerArns", Shape::StrList)]);
static CERTIFICATE: StructShape = StructShape::new("Certificate", &[("CertificateArn", Shape::Str)]);
static ACTION: StructShape =
    StructShape::new("Action", &[("Type", Shape::Str), ("TargetGroupArn", Shape::Str)]);
static CREATE_LISTENER: StructShape = StructShape::new(
    "CreateListenerInput",
    &[
        ("LoadBalancerArn", Shape::Str),
        ("Port", Shape::Int),
        ("Protocol", Shape::Str),
        ("Certificates", Shape::StructList(&CERTIFICATE)),
        ("SslPolicy", Shape::Str),
        ("DefaultActions", Shape::StructList(&ACTION)),
    ],
);
static LISTENER_ARN: StructShape = StructShape::new("DeleteListenerInput", &[("ListenerArn", Shape::Str)]);
static MATCHER: StructShape = StructShape::new("Matcher", &[("HttpCode", Shape::Str)]);
static CREATE_TG: StructShape = StructShape::new(
    "CreateTargetGroupInput",
    &[
        ("Name", Shape::Str),
        ("Port", Shape::Int),
        ("Protocol", Shape::Str),
        ("VpcId", Shape::Str),
        ("HealthCheckIntervalSeconds", Shape::Int),
        ("HealthCheckPath", Shape::Str),
        ("HealthCheckPort", Shape::Str),
        ("HealthCheckProtocol", Shape::Str),
        ("HealthCheckTimeoutSeconds", Shape::Int),
        ("HealthyThresholdCount", Shape::Int),
        ("UnhealthyThresholdCount", Shape::Int),
        ("Matcher", Shape::Struct(&MATCHER)),
    ],
);
static TG_ARN: StructShape = StructShape::new("DeleteTargetGroupInput", &[("TargetGroupArn", Shape::Str)]);
static TARGET: StructShape = StructShape::new("TargetDescription", &[("Id", Shape::Str), ("Port", Shape::Int)]);
static TARGETS: StructShape = StructShape::new(
    "TargetsInput",
    &[("TargetGroupArn", Shape::Str), ("Targets", Shape::StructList(&TARGET))],
);

const fn elbv2(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [call::Setter],
    extras: &'static [call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "elbv2",
        operation,
        input,
        required,
        extras,
        output,
        dry_run: DryRunMode::Params,
    }
}

static CREATE_LB_CALL: CallSpec = elbv2(
    "CreateLoadBalancer",
    &CREATE_LB,
    &[set("name", "Name", K::Str), set("subnets", "Subnets", K::StrSlice)],
    &[
        set("iptype", "IpAddressType", K::Str),
        set("scheme", "Scheme", K::Str),
        set("securitygroups", "SecurityGroups", K::StrSlice),
        set("type", "Type", K::Str),
    ],
    Output::Path("LoadBalancers[0].LoadBalancerArn"),
);
static DELETE_LB_CALL: CallSpec = elbv2(
    "DeleteLoadBalancer",
    &LB_ARN,
    &[set("id", "LoadBalancerArn", K::Str)],
    &[],
    Output::Nothing,
);
static CREATE_LISTENER_CALL: CallSpec = elbv2(
    "CreateListener",
    &CREATE_LISTENER,
    &[
        set("actiontype", "DefaultActions[0]Type", K::SliceStruct),
        set("target", "DefaultActions[0]TargetGroupArn", K::SliceStruct),
        set("loadbalancer", "LoadBalancerArn", K::Str),
        set("port", "Port", K::Int64),
        set("protocol", "Protocol", K::Str),
    ],
    &[
        set("certificate", "Certificates[0]CertificateArn", K::SliceStruct),
        set("sslpolicy", "SslPolicy", K::Str),
    ],
    Output::Path("Listeners[0].ListenerArn"),
);
static DELETE_LISTENER_CALL: CallSpec = elbv2(
    "DeleteListener",
    &LISTENER_ARN,
    &[set("id", "ListenerArn", K::Str)],
    &[],
    Output::Nothing,
);
static CREATE_TG_CALL: CallSpec = elbv2(
    "CreateTargetGroup",
    &CREATE_TG,
    &[
        set("name", "Name", K::Str),
        set("port", "Port", K::Int64),
        set("protocol", "Protocol", K::Str),
        set("vpc", "VpcId", K::Str),
    ],
    &[
        set("healthcheckinterval", "HealthCheckIntervalSeconds", K::Int64),
        set("healthcheckpath", "HealthCheckPath", K::Str),
        set("healthcheckport", "HealthCheckPort", K::Str),
        set("healthcheckprotocol", "HealthCheckProtocol", K::Str),
        set("healthchecktimeout", "HealthCheckTimeoutSeconds", K::Int64),
        set("healthythreshold", "HealthyThresholdCount", K::Int64),
        set("unhealthythreshold", "UnhealthyThresholdCount", K::Int64),
        set("matcher", "Matcher.HttpCode", K::Str),
    ],
    Output::Path("TargetGroups[0].TargetGroupArn"),
);
static DELETE_TG_CALL: CallSpec = elbv2(
    "DeleteTargetGroup",
    &TG_ARN,
    &[set("id", "TargetGroupArn", K::Str)],
    &[],
    Output::Nothing,
);
static ATTACH_INSTANCE_CALL: CallSpec = elbv2(
    "RegisterTargets",
    &TARGETS,
    &[
        set("targetgroup", "TargetGroupArn", K::Str),
        set("id", "Targets[0]Id", K::SliceStruct),
    ],
    &[set("port", "Targets[0]Port", K::SliceStructInt64)],
    Output::Nothing,
);
static DETACH_INSTANCE_CALL: CallSpec = elbv2(
    "DeregisterTargets",
    &TARGETS,
    &[
        set("targetgroup", "TargetGroupArn", K::Str),
        set("id", "Targets[0]Id", K::SliceStruct),
    ],
    &[],
    Output::Nothing,
);

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "loadbalancer", &CREATE_LB_CALL),
    Command::spec(Delete, "loadbalancer", &DELETE_LB_CALL),
    Command::custom(Check, "loadbalancer", check_loadbalancer),
    Command::spec(Create, "listener", &CREATE_LISTENER_CALL),
    Command::spec(Delete, "listener", &DELETE_LISTENER_CALL),
    Command::spec(Create, "targetgroup", &CREATE_TG_CALL),
    Command::spec(Delete, "targetgroup", &DELETE_TG_CALL),
    Command::spec(Attach, "instance", &ATTACH_INSTANCE_CALL),
    Command::spec(Detach, "instance", &DETACH_INSTANCE_CALL),
];

const LB_STATES: &[&str] = &["provisioning", "active", "failed", NOT_FOUND];

fn loadbalancer_state(ctx: &Ctx<'_>, arn: &str) -> Result<String, DriverError> {
    let mut input = Record::new(&DESCRIBE_LBS);
    input.put("LoadBalancerArns", Value::List(vec![arn.to_string()]), K::StrSlice)?;
    match ctx.call("elbv2", "DescribeLoadBalancers", &input) {
        Ok(resp) => Ok(json_str(&resp, "LoadBalancers[0].State.Code")
            .unwrap_or(NOT_FOUND)
            .to_string()),
        Err(DriverError::Provider(e)) if e.is_not_found() => Ok(NOT_FOUND.to_string()),
        Err(e) => Err(e),
    }
}

fn check_loadbalancer(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    await_state(ctx, params, LB_STATES, |arn| loadbalancer_state(ctx, arn))
}
