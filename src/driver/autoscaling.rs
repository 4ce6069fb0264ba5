//! Autoscaling launch configurations, groups and scaling policies.

use super::call::{self, set, CallSpec, DryRunMode, Output};
use super::checker::{wait_timeout, Checker};
use super::{param_int, param_str, require, CallResult, Command, Ctx, DriverError};
use crate::binder::{Record, SetterKind as K, Shape, StructShape};
use crate::core::types::{Action::*, Params, Value};

static CREATE_LAUNCH_CONFIG: StructShape = StructShape::new(
    "CreateLaunchConfigurationInput",
    &[
        ("LaunchConfigurationName", Shape::Str),
        ("ImageId", Shape::Str),
        ("InstanceType", Shape::Str),
        ("AssociatePublicIpAddress", Shape::Bool),
        ("KeyName", Shape::Str),
        ("UserData", Shape::Str),
        ("SecurityGroups", Shape::StrList),
        ("IamInstanceProfile", Shape::Str),
        ("SpotPrice", Shape::Str),
    ],
);
static LAUNCH_CONFIG_NAME: StructShape = StructShape::new(
    "DeleteLaunchConfigurationInput",
    &[("LaunchConfigurationName", Shape::Str)],
);
static SCALING_GROUP: StructShape = StructShape::new(
    "AutoScalingGroupInput",
    &[
        ("AutoScalingGroupName", Shape::Str),
        ("LaunchConfigurationName", Shape::Str),
        ("MaxSize", Shape::Int),
        ("MinSize", Shape::Int),
        ("VPCZoneIdentifier", Shape::Str),
        ("DefaultCooldown", Shape::Int),
        ("DesiredCapacity", Shape::Int),
        ("HealthCheckGracePeriod", Shape::Int),
        ("HealthCheckType", Shape::Str),
        ("NewInstancesProtectedFromScaleIn", Shape::Bool),
        ("TargetGroupARNs", Shape::StrList),
    ],
);
static DELETE_GROUP: StructShape = StructShape::new(
    "DeleteAutoScalingGroupInput",
    &[("AutoScalingGroupName", Shape::Str), ("ForceDelete", Shape::Bool)],
);
static DESCRIBE_GROUPS: StructShape = StructShape::new(
    "DescribeAutoScalingGroupsInput",
    &[("AutoScalingGroupNames", Shape::StrList)],
);
static STEP_ADJUSTMENT: StructShape = StructShape::new(
    "StepAdjustment",
    &[
        ("MetricIntervalLowerBound", Shape::Float),
        ("MetricIntervalUpperBound", Shape::Float),
        ("ScalingAdjustment", Shape::Int),
    ],
);
static PUT_POLICY: StructShape = StructShape::new(
    "PutScalingPolicyInput",
    &[
        ("AdjustmentType", Shape::Str),
        ("AutoScalingGroupName", Shape::Str),
        ("PolicyName", Shape::Str),
        ("ScalingAdjustment", Shape::Int),
        ("MinAdjustmentMagnitude", Shape::Int),
        ("Cooldown", Shape::Int),
        ("PolicyType", Shape::Str),
        ("StepAdjustments", Shape::StructList(&STEP_ADJUSTMENT)),
    ],
);
static POLICY_NAME: StructShape = StructShape::new("DeletePolicyInput", &[("PolicyName", Shape::Str)]);

const fn autoscaling(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [call::Setter],
    extras: &'static [call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "autoscaling",
        operation,
        input,
        required,
        extras,
        output,
        dry_run: DryRunMode::Params,
    }
}

static CREATE_LAUNCH_CONFIG_CALL: CallSpec = autoscaling(
    "CreateLaunchConfiguration",
    &CREATE_LAUNCH_CONFIG,
    &[
        set("image", "ImageId", K::Str),
        set("type", "InstanceType", K::Str),
        set("name", "LaunchConfigurationName", K::Str),
    ],
    &[
        set("public", "AssociatePublicIpAddress", K::Bool),
        set("keypair", "KeyName", K::Str),
        set("userdata", "UserData", K::FileToBase64),
        set("securitygroups", "SecurityGroups", K::StrSlice),
        set("role", "IamInstanceProfile", K::Str),
        set("spotprice", "SpotPrice", K::Str),
    ],
    Output::Param("name"),
);
static DELETE_LAUNCH_CONFIG_CALL: CallSpec = autoscaling(
    "DeleteLaunchConfiguration",
    &LAUNCH_CONFIG_NAME,
    &[set("name", "LaunchConfigurationName", K::Str)],
    &[],
    Output::Nothing,
);
static CREATE_GROUP_CALL: CallSpec = autoscaling(
    "CreateAutoScalingGroup",
    &SCALING_GROUP,
    &[
        set("name", "AutoScalingGroupName", K::Str),
        set("launchconfiguration", "LaunchConfigurationName", K::Str),
        set("max-size", "MaxSize", K::Int64),
        set("min-size", "MinSize", K::Int64),
        set("subnets", "VPCZoneIdentifier", K::CsvStr),
    ],
    &[
        set("cooldown", "DefaultCooldown", K::Int64),
        set("desired-capacity", "DesiredCapacity", K::Int64),
        set("healthcheck-grace-period", "HealthCheckGracePeriod", K::Int64),
        set("healthcheck-type", "HealthCheckType", K::Str),
        set("new-instances-protected", "NewInstancesProtectedFromScaleIn", K::Bool),
        set("targetgroups", "TargetGroupARNs", K::StrSlice),
    ],
    Output::Param("name"),
);
static UPDATE_GROUP_CALL: CallSpec = autoscaling(
    "UpdateAutoScalingGroup",
    &SCALING_GROUP,
    &[set("name", "AutoScalingGroupName", K::Str)],
    &[
        set("cooldown", "DefaultCooldown", K::Int64),
        set("desired-capacity", "DesiredCapacity", K::Int64),
        set("healthcheck-grace-period", "HealthCheckGracePeriod", K::Int64),
        set("healthcheck-type", "HealthCheckType", K::Str),
        set("launchconfiguration", "LaunchConfigurationName", K::Str),
        set("max-size", "MaxSize", K::Int64),
        set("min-size", "MinSize", K::Int64),
        set("new-instances-protected", "NewInstancesProtectedFromScaleIn", K::Bool),
        set("subnets", "VPCZoneIdentifier", K::CsvStr),
    ],
    Output::Param("name"),
);
static DELETE_GROUP_CALL: CallSpec = autoscaling(
    "DeleteAutoScalingGroup",
    &DELETE_GROUP,
    &[set("name", "AutoScalingGroupName", K::Str)],
    &[set("force", "ForceDelete", K::Bool)],
    Output::Nothing,
);
static CREATE_POLICY_CALL: CallSpec = autoscaling(
    "PutScalingPolicy",
    &PUT_POLICY,
    &[
        set("adjustment-type", "AdjustmentType", K::Str),
        set("scalinggroup", "AutoScalingGroupName", K::Str),
        set("name", "PolicyName", K::Str),
    ],
    &[
        set("adjustment-scaling", "ScalingAdjustment", K::Int64),
        set("adjustment-magnitude", "MinAdjustmentMagnitude", K::Int64),
        set("cooldown", "Cooldown", K::Int64),
        set("policy-type", "PolicyType", K::Str),
        set("step-adjustments", "StepAdjustments", K::StepAdjustments),
    ],
    Output::Path("PolicyARN"),
);
static DELETE_POLICY_CALL: CallSpec = autoscaling(
    "DeletePolicy",
    &POLICY_NAME,
    &[set("id", "PolicyName", K::Str)],
    &[],
    Output::Nothing,
);

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "launchconfiguration", &CREATE_LAUNCH_CONFIG_CALL),
    Command::spec(Delete, "launchconfiguration", &DELETE_LAUNCH_CONFIG_CALL),
    Command::spec(Create, "scalinggroup", &CREATE_GROUP_CALL),
    Command::spec(Update, "scalinggroup", &UPDATE_GROUP_CALL),
    Command::spec(Delete, "scalinggroup", &DELETE_GROUP_CALL),
    Command::custom(Check, "scalinggroup", check_scalinggroup),
    Command::spec(Create, "scalingpolicy", &CREATE_POLICY_CALL),
    Command::spec(Delete, "scalingpolicy", &DELETE_POLICY_CALL),
];

fn instance_count(ctx: &Ctx<'_>, name: &str) -> Result<String, DriverError> {
    let mut input = Record::new(&DESCRIBE_GROUPS);
    input.put("AutoScalingGroupNames", Value::List(vec![name.to_string()]), K::StrSlice)?;
    let resp = ctx.call("autoscaling", "DescribeAutoScalingGroups", &input)?;
    let group = call::json_path(&resp, "AutoScalingGroups[0]")
        .ok_or_else(|| DriverError::Other(format!("scalinggroup '{}' not found", name)))?;
    let count = group
        .get("Instances")
        .and_then(|i| i.as_array())
        .map_or(0, |i| i.len());
    Ok(count.to_string())
}

/// Wait until the group runs exactly `count` instances.
fn check_scalinggroup(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["name", "count", "timeout"])?;
    let name = param_str(params, "name")?;
    let count = param_int(params, "count")?;
    if count < 0 {
        return Err(DriverError::invalid("count", "integer", "must not be negative"));
    }
    let timeout = wait_timeout(params)?;
    if ctx.dry_run {
        ctx.logger.verbose(&format!("dry run: {} ok", ctx.command()));
        return Ok(None);
    }
    let description = format!("scalinggroup {}", name);
    Checker::new(
        &description,
        timeout,
        &count.to_string(),
        Box::new(|| instance_count(ctx, &name)),
    )
    .frequency(ctx.settings.poll_period())
    .logger(ctx.logger.clone())
    .check_name("instances count")
    .check()?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::Level;
    use crate::core::types::{params, Action};
    use crate::driver::testing::Harness;
    use serde_json::json;

    #[test]
    fn test_cs048_scalinggroup_subnets_as_csv() {
        let h = Harness::new();
        let p = params([
            ("name", Value::str("web")),
            ("launchconfiguration", Value::str("web-lc")),
            ("max-size", Value::Int(4)),
            ("min-size", Value::str("1")),
            ("subnets", Value::List(vec!["subnet-1".into(), "subnet-2".into()])),
        ]);
        assert_eq!(h.live(Action::Create, "scalinggroup", &p).unwrap(), Some(Value::str("web")));
        assert_eq!(
            h.sim.calls()[0].input,
            json!({
                "AutoScalingGroupName": "web",
                "LaunchConfigurationName": "web-lc",
                "MaxSize": 4,
                "MinSize": 1,
                "VPCZoneIdentifier": "subnet-1,subnet-2"
            })
        );
    }

    #[test]
    fn test_cs048_scaling_policy_steps() {
        let h = Harness::new();
        let p = params([
            ("adjustment-type", Value::str("ChangeInCapacity")),
            ("scalinggroup", Value::str("web")),
            ("name", Value::str("scale-out")),
            ("policy-type", Value::str("StepScaling")),
            ("step-adjustments", Value::List(vec!["0:10:1".into(), "10::2".into()])),
        ]);
        let arn = h.live(Action::Create, "scalingpolicy", &p).unwrap().unwrap();
        assert!(arn.to_string().contains(":scalingPolicy:"));
        assert_eq!(
            h.sim.calls()[0].input["StepAdjustments"],
            json!([
                {"MetricIntervalLowerBound": 0.0, "MetricIntervalUpperBound": 10.0, "ScalingAdjustment": 1},
                {"MetricIntervalLowerBound": 10.0, "ScalingAdjustment": 2}
            ])
        );
    }

    #[test]
    fn test_cs048_check_instance_count() {
        let h = Harness::new();
        h.sim.respond(
            "autoscaling",
            "DescribeAutoScalingGroups",
            json!({"AutoScalingGroups": [{"Instances": [{"InstanceId": "i-1"}]}]}),
        );
        h.sim.respond(
            "autoscaling",
            "DescribeAutoScalingGroups",
            json!({"AutoScalingGroups": [{"Instances": [{"InstanceId": "i-1"}, {"InstanceId": "i-2"}]}]}),
        );
        let p = params([
            ("name", Value::str("web")),
            ("count", Value::Int(2)),
            ("timeout", Value::Int(10)),
        ]);
        assert_eq!(h.live(Action::Check, "scalinggroup", &p).unwrap(), None);
        let info = h.sink.at(Level::Info);
        assert_eq!(info.len(), 1);
        assert!(info[0].starts_with("scalinggroup web instances count observed 1, expected 2"));
    }

    #[test]
    fn test_cs048_check_missing_group_fails() {
        let h = Harness::new();
        let p = params([
            ("name", Value::str("ghost")),
            ("count", Value::Int(0)),
            ("timeout", Value::Int(10)),
        ]);
        let err = h.live(Action::Check, "scalinggroup", &p).unwrap_err();
        assert_eq!(err.to_string(), "scalinggroup 'ghost' not found");
    }
}
