//! ECR registries and repositories.

use super::call::{self, set, CallSpec, DryRunMode, Output};
use super::{param_list, CallResult, Command, Ctx, DriverError};
use crate::binder::{Record, SetterKind as K, Shape, StructShape};
use crate::core::types::{Action::*, Params, Value};
use base64::Engine;

static CREATE_REPOSITORY: StructShape =
    StructShape::new("CreateRepositoryInput", &[("repositoryName", Shape::Str)]);
static DELETE_REPOSITORY: StructShape = StructShape::new(
    "DeleteRepositoryInput",
    &[("repositoryName", Shape::Str), ("force", Shape::Bool)],
);
static AUTH_TOKEN: StructShape =
    StructShape::new("GetAuthorizationTokenInput", &[("registryIds", Shape::StrList)]);

const fn ecr(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [call::Setter],
    extras: &'static [call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "ecr",
        operation,
        input,
        required,
        extras,
        output,
        dry_run: DryRunMode::Params,
    }
}

static CREATE_REPOSITORY_CALL: CallSpec = ecr(
    "CreateRepository",
    &CREATE_REPOSITORY,
    &[set("name", "repositoryName", K::Str)],
    &[],
    Output::Path("repository.repositoryArn"),
);
static DELETE_REPOSITORY_CALL: CallSpec = ecr(
    "DeleteRepository",
    &DELETE_REPOSITORY,
    &[set("name", "repositoryName", K::Str)],
    &[set("force", "force", K::Bool)],
    Output::Nothing,
);

pub static COMMANDS: &[Command] = &[
    Command::custom(Authenticate, "registry", authenticate_registry),
    Command::spec(Create, "repository", &CREATE_REPOSITORY_CALL),
    Command::spec(Delete, "repository", &DELETE_REPOSITORY_CALL),
];

/// Split a base64 `user:password` authorization token.
fn decode_token(token: &str) -> Result<(String, String), DriverError> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(token)
        .map_err(|e| DriverError::Other(format!("invalid authorization token: {}", e)))?;
    let text = String::from_utf8_lossy(&raw);
    match text.split_once(':') {
        Some((user, password)) => Ok((user.to_string(), password.to_string())),
        None => Err(DriverError::Other(format!(
            "invalid authorization token: expect user:password, got {}",
            text
        ))),
    }
}

/// Fetch registry tokens and report the docker login command for each
/// endpoint. Returns the first endpoint.
fn authenticate_registry(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    let mut input = Record::new(&AUTH_TOKEN);
    if params.contains_key("accounts") {
        input.put("registryIds", Value::List(param_list(params, "accounts")?), K::StrSlice)?;
    }
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }

    let resp = ctx.call("ecr", "GetAuthorizationToken", &input)?;
    let data = resp
        .get("authorizationData")
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default();
    let mut first = None;
    for auth in &data {
        let token = auth
            .get("authorizationToken")
            .and_then(|t| t.as_str())
            .unwrap_or_default();
        let endpoint = auth
            .get("proxyEndpoint")
            .and_then(|e| e.as_str())
            .unwrap_or_default();
        let (user, password) = decode_token(token)?;
        ctx.logger.info(&format!(
            "docker authentication command:\ndocker login --username {} --password {} {}",
            user, password, endpoint
        ));
        first.get_or_insert_with(|| Value::str(endpoint));
    }
    Ok(first)
}
