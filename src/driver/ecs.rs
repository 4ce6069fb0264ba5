//! ECS clusters and task definitions.

use super::call::{self, set, CallSpec, DryRunMode, Output};
use super::{param_str, require, CallResult, Command, Ctx, DriverError};
use crate::binder::{Record, SetterKind as K, Shape, StructShape};
use crate::core::types::{Action::*, Params};

static CREATE_CLUSTER: StructShape = StructShape::new("CreateClusterInput", &[("ClusterName", Shape::Str)]);
static CLUSTER: StructShape = StructShape::new("DeleteClusterInput", &[("Cluster", Shape::Str)]);
static KEY_VALUE: StructShape =
    StructShape::new("KeyValuePair", &[("Name", Shape::Str), ("Value", Shape::Str)]);
static PORT_MAPPING: StructShape = StructShape::new(
    "PortMapping",
    &[
        ("ContainerPort", Shape::Int),
        ("HostPort", Shape::Int),
        ("Protocol", Shape::Str),
    ],
);
static CONTAINER: StructShape = StructShape::new(
    "ContainerDefinition",
    &[
        ("Name", Shape::Str),
        ("Image", Shape::Str),
        ("Memory", Shape::Int),
        ("Command", Shape::StrList),
        ("Environment", Shape::StructList(&KEY_VALUE)),
        ("Privileged", Shape::Bool),
        ("WorkingDirectory", Shape::Str),
        ("PortMappings", Shape::StructList(&PORT_MAPPING)),
    ],
);
static REGISTER_TASK: StructShape = StructShape::new(
    "RegisterTaskDefinitionInput",
    &[
        ("Family", Shape::Str),
        ("ContainerDefinitions", Shape::StructList(&CONTAINER)),
    ],
);
static LIST_TASKS: StructShape =
    StructShape::new("ListTaskDefinitionsInput", &[("FamilyPrefix", Shape::Str)]);
static DEREGISTER_TASK: StructShape =
    StructShape::new("DeregisterTaskDefinitionInput", &[("TaskDefinition", Shape::Str)]);

const fn ecs(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [call::Setter],
    extras: &'static [call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "ecs",
        operation,
        input,
        required,
        extras,
        output,
        dry_run: DryRunMode::Params,
    }
}

static CREATE_CLUSTER_CALL: CallSpec = ecs(
    "CreateCluster",
    &CREATE_CLUSTER,
    &[set("name", "ClusterName", K::Str)],
    &[],
    Output::Path("Cluster.ClusterArn"),
);
static DELETE_CLUSTER_CALL: CallSpec =
    ecs("DeleteCluster", &CLUSTER, &[set("id", "Cluster", K::Str)], &[], Output::Nothing);
static CREATE_TASK_CALL: CallSpec = ecs(
    "RegisterTaskDefinition",
    &REGISTER_TASK,
    &[
        set("name", "Family", K::Str),
        set("image", "ContainerDefinitions[0]Image", K::SliceStruct),
        set("memory-hard-limit", "ContainerDefinitions[0]Memory", K::SliceStructInt64),
        set("container-name", "ContainerDefinitions[0]Name", K::SliceStruct),
    ],
    &[
        set("command", "ContainerDefinitions[0]Command", K::StrSlice),
        set("env", "ContainerDefinitions[0]Environment", K::KeyValueSlice),
        set("privileged", "ContainerDefinitions[0]Privileged", K::Bool),
        set("workdir", "ContainerDefinitions[0]WorkingDirectory", K::SliceStruct),
        set("ports", "ContainerDefinitions[0]PortMappings", K::PortMappings),
    ],
    Output::Path("TaskDefinition.TaskDefinitionArn"),
);

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "containercluster", &CREATE_CLUSTER_CALL),
    Command::spec(Delete, "containercluster", &DELETE_CLUSTER_CALL),
    Command::spec(Create, "containertask", &CREATE_TASK_CALL),
    Command::custom(Delete, "containertask", delete_containertask),
];

/// Deregister every revision of the task family.
fn delete_containertask(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["name"])?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let family = param_str(params, "name")?;

    let mut list = Record::new(&LIST_TASKS);
    list.put("FamilyPrefix", family.as_str(), K::Str)?;
    let resp = ctx.call("ecs", "ListTaskDefinitions", &list)?;
    let arns: Vec<String> = resp
        .get("TaskDefinitionArns")
        .and_then(|a| a.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).map(str::to_string).collect())
        .unwrap_or_default();
    if arns.is_empty() {
        return Err(DriverError::Other(format!(
            "no task definition found with family '{}'",
            family
        )));
    }

    for arn in &arns {
        let mut input = Record::new(&DEREGISTER_TASK);
        input.put("TaskDefinition", arn.as_str(), K::Str)?;
        ctx.call("ecs", "DeregisterTaskDefinition", &input)?;
        ctx.logger.verbose(&format!("deregistered task definition {}", arn));
    }
    Ok(None)
}
