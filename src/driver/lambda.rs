//! Lambda functions.

use super::call::{set, CallSpec, DryRunMode, Output};
use super::Command;
use crate::binder::{SetterKind as K, Shape, StructShape};
use crate::core::types::Action::*;

static FUNCTION_CODE: StructShape = StructShape::new(
    "FunctionCode",
    &[
        ("S3Bucket", Shape::Str),
        ("S3Key", Shape::Str),
        ("S3ObjectVersion", Shape::Str),
        ("ZipFile", Shape::Bytes),
    ],
);
static CREATE_FUNCTION: StructShape = StructShape::new(
    "CreateFunctionInput",
    &[
        ("FunctionName", Shape::Str),
        ("Handler", Shape::Str),
        ("Role", Shape::Str),
        ("Runtime", Shape::Str),
        ("Code", Shape::Struct(&FUNCTION_CODE)),
        ("Description", Shape::Str),
        ("MemorySize", Shape::Int),
        ("Publish", Shape::Bool),
        ("Timeout", Shape::Int),
    ],
);
static DELETE_FUNCTION: StructShape = StructShape::new(
    "DeleteFunctionInput",
    &[("FunctionName", Shape::Str), ("Qualifier", Shape::Str)],
);

static CREATE_FUNCTION_CALL: CallSpec = CallSpec {
    service: "lambda",
    operation: "CreateFunction",
    input: &CREATE_FUNCTION,
    required: &[
        set("name", "FunctionName", K::Str),
        set("handler", "Handler", K::Str),
        set("role", "Role", K::Str),
        set("runtime", "Runtime", K::Str),
    ],
    extras: &[
        set("bucket", "Code.S3Bucket", K::Str),
        set("object", "Code.S3Key", K::Str),
        set("objectversion", "Code.S3ObjectVersion", K::Str),
        set("zipfile", "Code.ZipFile", K::FileToBytes),
        set("description", "Description", K::Str),
        set("memory", "MemorySize", K::Int64),
        set("publish", "Publish", K::Bool),
        set("timeout", "Timeout", K::Int64),
    ],
    output: Output::Path("FunctionArn"),
    dry_run: DryRunMode::Params,
};

static DELETE_FUNCTION_CALL: CallSpec = CallSpec {
    service: "lambda",
    operation: "DeleteFunction",
    input: &DELETE_FUNCTION,
    required: &[set("id", "FunctionName", K::Str)],
    extras: &[set("version", "Qualifier", K::Str)],
    output: Output::Nothing,
    dry_run: DryRunMode::Params,
};

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "function", &CREATE_FUNCTION_CALL),
    Command::spec(Delete, "function", &DELETE_FUNCTION_CALL),
];
