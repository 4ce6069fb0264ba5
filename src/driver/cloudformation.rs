//! CloudFormation stacks.

use super::call::{self, set, CallSpec, DryRunMode, Output};
use super::{CallResult, Command, Ctx};
use crate::binder::{SetterKind as K, Shape, StructShape};
use crate::core::types::{Action::*, Params};

static PARAMETER: StructShape = StructShape::new(
    "Parameter",
    &[("ParameterKey", Shape::Str), ("ParameterValue", Shape::Str)],
);
static CREATE_STACK: StructShape = StructShape::new(
    "CreateStackInput",
    &[
        ("StackName", Shape::Str),
        ("TemplateBody", Shape::Str),
        ("Capabilities", Shape::StrList),
        ("DisableRollback", Shape::Bool),
        ("NotificationARNs", Shape::StrList),
        ("OnFailure", Shape::Str),
        ("Parameters", Shape::StructList(&PARAMETER)),
        ("ResourceTypes", Shape::StrList),
        ("RoleARN", Shape::Str),
        ("StackPolicyBody", Shape::Str),
        ("TimeoutInMinutes", Shape::Int),
    ],
);
static UPDATE_STACK: StructShape = StructShape::new(
    "UpdateStackInput",
    &[
        ("StackName", Shape::Str),
        ("TemplateBody", Shape::Str),
        ("UsePreviousTemplate", Shape::Bool),
        ("Capabilities", Shape::StrList),
        ("NotificationARNs", Shape::StrList),
        ("Parameters", Shape::StructList(&PARAMETER)),
        ("ResourceTypes", Shape::StrList),
        ("RoleARN", Shape::Str),
        ("StackPolicyBody", Shape::Str),
    ],
);
static DELETE_STACK: StructShape = StructShape::new(
    "DeleteStackInput",
    &[("StackName", Shape::Str), ("RetainResources", Shape::StrList)],
);

const fn cloudformation(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [call::Setter],
    extras: &'static [call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "cloudformation",
        operation,
        input,
        required,
        extras,
        output,
        dry_run: DryRunMode::Params,
    }
}

static CREATE_STACK_CALL: CallSpec = cloudformation(
    "CreateStack",
    &CREATE_STACK,
    &[
        set("name", "StackName", K::Str),
        set("template-file", "TemplateBody", K::FileToString),
    ],
    &[
        set("capabilities", "Capabilities", K::StrSlice),
        set("disable-rollback", "DisableRollback", K::Bool),
        set("notifications", "NotificationARNs", K::StrSlice),
        set("on-failure", "OnFailure", K::Str),
        set("parameters", "Parameters", K::ParameterSlice),
        set("resource-types", "ResourceTypes", K::StrSlice),
        set("role", "RoleARN", K::Str),
        set("policy-file", "StackPolicyBody", K::FileToString),
        set("timeout", "TimeoutInMinutes", K::Int64),
    ],
    Output::Path("StackId"),
);
static UPDATE_STACK_CALL: CallSpec = cloudformation(
    "UpdateStack",
    &UPDATE_STACK,
    &[set("name", "StackName", K::Str)],
    &[
        set("template-file", "TemplateBody", K::FileToString),
        set("capabilities", "Capabilities", K::StrSlice),
        set("notifications", "NotificationARNs", K::StrSlice),
        set("parameters", "Parameters", K::ParameterSlice),
        set("resource-types", "ResourceTypes", K::StrSlice),
        set("role", "RoleARN", K::Str),
        set("policy-file", "StackPolicyBody", K::FileToString),
    ],
    Output::Path("StackId"),
);
static DELETE_STACK_CALL: CallSpec = cloudformation(
    "DeleteStack",
    &DELETE_STACK,
    &[set("name", "StackName", K::Str)],
    &[set("retain-resources", "RetainResources", K::StrSlice)],
    Output::Nothing,
);

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "stack", &CREATE_STACK_CALL),
    Command::custom(Update, "stack", update_stack),
    Command::spec(Delete, "stack", &DELETE_STACK_CALL),
];

/// Without a new template body the provider reuses the current one.
fn update_stack(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    let mut input = call::prepare(ctx, &UPDATE_STACK_CALL, params)?;
    if !params.contains_key("template-file") {
        input.put("UsePreviousTemplate", true, K::Bool)?;
    }
    call::invoke(ctx, &UPDATE_STACK_CALL, input, params)
}
