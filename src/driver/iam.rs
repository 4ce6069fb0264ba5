//! IAM commands: users, groups, roles, instance profiles, policies,
//! access keys and login profiles.
//!
//! Role and policy commands cascade into several provider calls; every
//! sub-call is logged so the cascade is visible.

use super::call::{self, json_path, json_str, set, CallSpec, DryRunMode, Output};
use super::credentials::{append_credentials, Credentials};
use super::policy::{
    lookup_policy, merge_statement, policy_suggestions, query_unescape, statement_from_params,
    trust_document, PolicyDocument,
};
use super::{param_bool, param_int, param_str, require, CallResult, Command, Ctx, DriverError};
use crate::binder::{Record, SetterKind as K, Shape, StructShape};
use crate::core::types::{Action::*, Params, Value};
use std::time::Duration;

// ============================================================================
// Request shapes
// ============================================================================

static USER_NAME: StructShape = StructShape::new("UserInput", &[("UserName", Shape::Str)]);
static GROUP_NAME: StructShape = StructShape::new("GroupInput", &[("GroupName", Shape::Str)]);
static USER_GROUP: StructShape = StructShape::new(
    "UserGroupInput",
    &[("GroupName", Shape::Str), ("UserName", Shape::Str)],
);
static ACCESS_KEY: StructShape = StructShape::new(
    "DeleteAccessKeyInput",
    &[("AccessKeyId", Shape::Str), ("UserName", Shape::Str)],
);
static CREATE_ROLE: StructShape = StructShape::new(
    "CreateRoleInput",
    &[("RoleName", Shape::Str), ("AssumeRolePolicyDocument", Shape::Str)],
);
static ROLE_NAME: StructShape = StructShape::new("RoleInput", &[("RoleName", Shape::Str)]);
static ROLE_POLICY: StructShape = StructShape::new(
    "RolePolicyInput",
    &[("RoleName", Shape::Str), ("PolicyName", Shape::Str), ("PolicyArn", Shape::Str)],
);
static PROFILE_NAME: StructShape =
    StructShape::new("InstanceProfileInput", &[("InstanceProfileName", Shape::Str)]);
static PROFILE_ROLE: StructShape = StructShape::new(
    "InstanceProfileRoleInput",
    &[("InstanceProfileName", Shape::Str), ("RoleName", Shape::Str)],
);
static CREATE_POLICY: StructShape = StructShape::new(
    "CreatePolicyInput",
    &[
        ("PolicyName", Shape::Str),
        ("PolicyDocument", Shape::Str),
        ("Description", Shape::Str),
    ],
);
static POLICY_ARN: StructShape = StructShape::new("PolicyInput", &[("PolicyArn", Shape::Str)]);
static POLICY_VERSION: StructShape = StructShape::new(
    "PolicyVersionInput",
    &[("PolicyArn", Shape::Str), ("VersionId", Shape::Str)],
);
static CREATE_POLICY_VERSION: StructShape = StructShape::new(
    "CreatePolicyVersionInput",
    &[
        ("PolicyArn", Shape::Str),
        ("PolicyDocument", Shape::Str),
        ("SetAsDefault", Shape::Bool),
    ],
);
static ATTACH_POLICY: StructShape = StructShape::new(
    "AttachPolicyInput",
    &[
        ("PolicyArn", Shape::Str),
        ("UserName", Shape::Str),
        ("GroupName", Shape::Str),
        ("RoleName", Shape::Str),
    ],
);
static LOGIN_PROFILE: StructShape = StructShape::new(
    "LoginProfileInput",
    &[
        ("UserName", Shape::Str),
        ("Password", Shape::Str),
        ("PasswordResetRequired", Shape::Bool),
    ],
);

// ============================================================================
// Call descriptors
// ============================================================================

const fn iam(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [call::Setter],
    extras: &'static [call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "iam",
        operation,
        input,
        required,
        extras,
        output,
        dry_run: DryRunMode::Params,
    }
}

static CREATE_USER_CALL: CallSpec = iam(
    "CreateUser",
    &USER_NAME,
    &[set("name", "UserName", K::Str)],
    &[],
    Output::Path("User.UserId"),
);
static DELETE_USER_CALL: CallSpec =
    iam("DeleteUser", &USER_NAME, &[set("name", "UserName", K::Str)], &[], Output::Nothing);
static ATTACH_USER_CALL: CallSpec = iam(
    "AddUserToGroup",
    &USER_GROUP,
    &[set("group", "GroupName", K::Str), set("name", "UserName", K::Str)],
    &[],
    Output::Nothing,
);
static DETACH_USER_CALL: CallSpec = iam(
    "RemoveUserFromGroup",
    &USER_GROUP,
    &[set("group", "GroupName", K::Str), set("name", "UserName", K::Str)],
    &[],
    Output::Nothing,
);
static DELETE_ACCESSKEY_CALL: CallSpec = iam(
    "DeleteAccessKey",
    &ACCESS_KEY,
    &[set("id", "AccessKeyId", K::Str)],
    &[set("user", "UserName", K::Str)],
    Output::Nothing,
);
static CREATE_GROUP_CALL: CallSpec = iam(
    "CreateGroup",
    &GROUP_NAME,
    &[set("name", "GroupName", K::Str)],
    &[],
    Output::Path("Group.GroupId"),
);
static DELETE_GROUP_CALL: CallSpec =
    iam("DeleteGroup", &GROUP_NAME, &[set("name", "GroupName", K::Str)], &[], Output::Nothing);
static ATTACH_ROLE_CALL: CallSpec = iam(
    "AddRoleToInstanceProfile",
    &PROFILE_ROLE,
    &[
        set("instanceprofile", "InstanceProfileName", K::Str),
        set("name", "RoleName", K::Str),
    ],
    &[],
    Output::Nothing,
);
static DETACH_ROLE_CALL: CallSpec = iam(
    "RemoveRoleFromInstanceProfile",
    &PROFILE_ROLE,
    &[
        set("instanceprofile", "InstanceProfileName", K::Str),
        set("name", "RoleName", K::Str),
    ],
    &[],
    Output::Nothing,
);
static CREATE_PROFILE_CALL: CallSpec = iam(
    "CreateInstanceProfile",
    &PROFILE_NAME,
    &[set("name", "InstanceProfileName", K::Str)],
    &[],
    Output::Path("InstanceProfile.InstanceProfileId"),
);
static DELETE_PROFILE_CALL: CallSpec = iam(
    "DeleteInstanceProfile",
    &PROFILE_NAME,
    &[set("name", "InstanceProfileName", K::Str)],
    &[],
    Output::Nothing,
);
static CREATE_LOGIN_CALL: CallSpec = iam(
    "CreateLoginProfile",
    &LOGIN_PROFILE,
    &[set("username", "UserName", K::Str), set("password", "Password", K::Str)],
    &[set("password-reset", "PasswordResetRequired", K::Bool)],
    Output::Param("username"),
);
static UPDATE_LOGIN_CALL: CallSpec = iam(
    "UpdateLoginProfile",
    &LOGIN_PROFILE,
    &[set("username", "UserName", K::Str), set("password", "Password", K::Str)],
    &[set("password-reset", "PasswordResetRequired", K::Bool)],
    Output::Param("username"),
);
static DELETE_LOGIN_CALL: CallSpec = iam(
    "DeleteLoginProfile",
    &LOGIN_PROFILE,
    &[set("username", "UserName", K::Str)],
    &[],
    Output::Nothing,
);

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "user", &CREATE_USER_CALL),
    Command::spec(Delete, "user", &DELETE_USER_CALL),
    Command::spec(Attach, "user", &ATTACH_USER_CALL),
    Command::spec(Detach, "user", &DETACH_USER_CALL),
    Command::custom(Create, "accesskey", create_accesskey),
    Command::spec(Delete, "accesskey", &DELETE_ACCESSKEY_CALL),
    Command::spec(Create, "group", &CREATE_GROUP_CALL),
    Command::spec(Delete, "group", &DELETE_GROUP_CALL),
    Command::custom(Create, "role", create_role),
    Command::custom(Delete, "role", delete_role),
    Command::spec(Attach, "role", &ATTACH_ROLE_CALL),
    Command::spec(Detach, "role", &DETACH_ROLE_CALL),
    Command::spec(Create, "instanceprofile", &CREATE_PROFILE_CALL),
    Command::spec(Delete, "instanceprofile", &DELETE_PROFILE_CALL),
    Command::custom(Create, "policy", create_policy),
    Command::custom(Update, "policy", update_policy),
    Command::custom(Delete, "policy", delete_policy),
    Command::custom(Attach, "policy", attach_policy),
    Command::custom(Detach, "policy", detach_policy),
    Command::spec(Create, "loginprofile", &CREATE_LOGIN_CALL),
    Command::spec(Update, "loginprofile", &UPDATE_LOGIN_CALL),
    Command::spec(Delete, "loginprofile", &DELETE_LOGIN_CALL),
];

fn named(shape: &'static StructShape, field: &str, value: &str) -> Result<Record, DriverError> {
    let mut input = Record::new(shape);
    input.put(field, value, K::Str)?;
    Ok(input)
}

fn names_at(doc: &serde_json::Value, list: &str, field: &str) -> Vec<String> {
    json_path(doc, list)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| json_str(i, field))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// Access keys
// ============================================================================

fn create_accesskey(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["user"])?;
    let save = param_bool(params, "save")?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let user = param_str(params, "user")?;
    let resp = ctx.call("iam", "CreateAccessKey", &named(&USER_NAME, "UserName", &user)?)?;
    let id = json_str(&resp, "AccessKey.AccessKeyId")
        .ok_or_else(|| DriverError::Other("no access key in provider response".to_string()))?
        .to_string();
    let secret = json_str(&resp, "AccessKey.SecretAccessKey").unwrap_or_default().to_string();

    if save {
        let creds = Credentials {
            profile: user.clone(),
            access_key_id: id.clone(),
            secret_access_key: secret,
        };
        let path = &ctx.settings.credentials_path;
        if append_credentials(path, &creds)? {
            ctx.logger.verbose(&format!("created directory for {}", path.display()));
        }
        ctx.logger.info(&format!(
            "access key of user '{}' saved as profile '{}' in {}",
            user,
            user,
            path.display()
        ));
    } else {
        ctx.logger.info(&format!("aws_access_key_id = {}", id));
        ctx.logger.info(&format!("aws_secret_access_key = {}", secret));
        ctx.logger.warn("store the secret access key now, it cannot be retrieved later");
    }
    Ok(Some(Value::Str(id)))
}

// ============================================================================
// Roles
// ============================================================================

fn create_role(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["name"])?;
    let document = trust_document(params)?;
    let sleep_after = match params.get("sleep-after") {
        Some(_) => {
            let secs = param_int(params, "sleep-after")?;
            if secs < 0 {
                return Err(DriverError::invalid("sleep-after", "integer", "must not be negative"));
            }
            Duration::from_secs(secs as u64)
        }
        None => Duration::ZERO,
    };
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let name = param_str(params, "name")?;

    let mut input = Record::new(&CREATE_ROLE);
    input.put("RoleName", name.as_str(), K::Str)?;
    input.put("AssumeRolePolicyDocument", document, K::Str)?;
    let resp = ctx.call("iam", "CreateRole", &input)?;
    let arn = json_str(&resp, "Role.Arn")
        .ok_or_else(|| DriverError::Other("no value at 'Role.Arn' in provider response".to_string()))?
        .to_string();
    ctx.logger.info(&format!("create role '{}' ok", name));

    ctx.call("iam", "CreateInstanceProfile", &named(&PROFILE_NAME, "InstanceProfileName", &name)?)?;
    ctx.logger.info(&format!("create instanceprofile '{}' ok", name));

    let mut attach = Record::new(&PROFILE_ROLE);
    attach.put("InstanceProfileName", name.as_str(), K::Str)?;
    attach.put("RoleName", name.as_str(), K::Str)?;
    ctx.call("iam", "AddRoleToInstanceProfile", &attach)?;
    ctx.logger.info(&format!("attach role '{}' to instanceprofile '{}' ok", name, name));

    if !sleep_after.is_zero() {
        ctx.logger
            .info(&format!("sleeping for {:?} to let the role propagate", sleep_after));
        std::thread::sleep(sleep_after);
    }
    Ok(Some(Value::Str(arn)))
}

fn delete_role(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["name"])?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let name = param_str(params, "name")?;
    let role = named(&ROLE_NAME, "RoleName", &name)?;

    let resp = ctx.call("iam", "ListInstanceProfilesForRole", &role)?;
    for profile in names_at(&resp, "InstanceProfiles", "InstanceProfileName") {
        let mut detach = Record::new(&PROFILE_ROLE);
        detach.put("InstanceProfileName", profile.as_str(), K::Str)?;
        detach.put("RoleName", name.as_str(), K::Str)?;
        ctx.call("iam", "RemoveRoleFromInstanceProfile", &detach)?;
        ctx.logger.info(&format!("detach role '{}' from instanceprofile '{}' ok", name, profile));
        ctx.call("iam", "DeleteInstanceProfile", &named(&PROFILE_NAME, "InstanceProfileName", &profile)?)?;
        ctx.logger.info(&format!("delete instanceprofile '{}' ok", profile));
    }

    let resp = ctx.call("iam", "ListAttachedRolePolicies", &role)?;
    for arn in names_at(&resp, "AttachedPolicies", "PolicyArn") {
        let mut detach = Record::new(&ROLE_POLICY);
        detach.put("RoleName", name.as_str(), K::Str)?;
        detach.put("PolicyArn", arn.as_str(), K::Str)?;
        ctx.call("iam", "DetachRolePolicy", &detach)?;
        ctx.logger.info(&format!("detach policy '{}' from role '{}' ok", arn, name));
    }

    let resp = ctx.call("iam", "ListRolePolicies", &role)?;
    let inline: Vec<String> = json_path(&resp, "PolicyNames")
        .and_then(|v| v.as_array())
        .map(|names| names.iter().filter_map(|n| n.as_str()).map(str::to_string).collect())
        .unwrap_or_default();
    for policy in inline {
        let mut delete = Record::new(&ROLE_POLICY);
        delete.put("RoleName", name.as_str(), K::Str)?;
        delete.put("PolicyName", policy.as_str(), K::Str)?;
        ctx.call("iam", "DeleteRolePolicy", &delete)?;
        ctx.logger.info(&format!("delete inline policy '{}' of role '{}' ok", policy, name));
    }

    ctx.call("iam", "DeleteRole", &role)?;
    Ok(None)
}

// ============================================================================
// Policies
// ============================================================================

fn create_policy(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["name", "effect", "action", "resource"])?;
    let document = PolicyDocument::new(vec![statement_from_params(params)?]).to_json()?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let mut input = Record::new(&CREATE_POLICY);
    input.put("PolicyName", param_str(params, "name")?, K::Str)?;
    input.put("PolicyDocument", document, K::Str)?;
    if let Some(description) = params.get("description") {
        input.put("Description", description.clone(), K::Str)?;
    }
    let resp = ctx.call("iam", "CreatePolicy", &input)?;
    call::extract(&resp, Output::Path("Policy.Arn"), params)
}

/// Add a statement to the default version and make the result the new default.
fn update_policy(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["arn", "effect", "action", "resource"])?;
    let stmt = statement_from_params(params)?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let arn = param_str(params, "arn")?;

    let resp = ctx.call("iam", "GetPolicy", &named(&POLICY_ARN, "PolicyArn", &arn)?)?;
    let version = json_str(&resp, "Policy.DefaultVersionId")
        .ok_or_else(|| DriverError::Other(format!("no default version for policy {}", arn)))?
        .to_string();

    let mut get = Record::new(&POLICY_VERSION);
    get.put("PolicyArn", arn.as_str(), K::Str)?;
    get.put("VersionId", version.as_str(), K::Str)?;
    let resp = ctx.call("iam", "GetPolicyVersion", &get)?;
    let current = json_str(&resp, "PolicyVersion.Document")
        .ok_or_else(|| DriverError::Other(format!("no document for policy {} version {}", arn, version)))?;
    let merged = merge_statement(&query_unescape(current)?, &stmt)?;

    let mut create = Record::new(&CREATE_POLICY_VERSION);
    create.put("PolicyArn", arn.as_str(), K::Str)?;
    create.put("PolicyDocument", merged, K::Str)?;
    create.put("SetAsDefault", true, K::Bool)?;
    let resp = ctx.call("iam", "CreatePolicyVersion", &create)?;
    if let Some(new_version) = json_str(&resp, "PolicyVersion.VersionId") {
        ctx.logger.verbose(&format!(
            "policy {} default version {} replaced by {}",
            arn, version, new_version
        ));
    }
    Ok(Some(Value::Str(arn)))
}

fn delete_policy(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["arn"])?;
    let all_versions = param_bool(params, "all-versions")?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let arn = param_str(params, "arn")?;
    if all_versions {
        let resp = ctx.call("iam", "ListPolicyVersions", &named(&POLICY_ARN, "PolicyArn", &arn)?)?;
        let versions = json_path(&resp, "Versions")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for v in versions {
            if v.get("IsDefaultVersion").and_then(|d| d.as_bool()) == Some(true) {
                continue;
            }
            let Some(id) = json_str(&v, "VersionId") else { continue };
            let mut delete = Record::new(&POLICY_VERSION);
            delete.put("PolicyArn", arn.as_str(), K::Str)?;
            delete.put("VersionId", id, K::Str)?;
            ctx.call("iam", "DeletePolicyVersion", &delete)?;
            ctx.logger.info(&format!("delete policy version '{}' ok", id));
        }
    }
    ctx.call("iam", "DeletePolicy", &named(&POLICY_ARN, "PolicyArn", &arn)?)?;
    Ok(None)
}

/// Policy ARN from `arn`, or from a managed policy lookup on `service`
/// and `access`.
fn resolve_policy_arn(ctx: &Ctx<'_>, params: &Params) -> Result<String, DriverError> {
    if params.contains_key("arn") {
        return param_str(params, "arn");
    }
    match (params.get("service"), params.get("access")) {
        (Some(service), Some(access)) => {
            let service = service.to_string();
            lookup_policy(&service, &access.to_string()).map_err(|e| {
                let suggestions = policy_suggestions(&service);
                if !suggestions.is_empty() {
                    ctx.logger
                        .info(&format!("policies for '{}': {}", service, suggestions.join(", ")));
                }
                e
            })
        }
        _ => Err(DriverError::Other(
            "missing 'arn' param or 'service' and 'access' params".to_string(),
        )),
    }
}

/// The principal a policy is attached to: (operation suffix, field, name).
fn policy_target(params: &Params) -> Result<(&'static str, &'static str, String), DriverError> {
    let targets = [("user", "User", "UserName"), ("group", "Group", "GroupName"), ("role", "Role", "RoleName")];
    targets
        .iter()
        .find_map(|(key, kind, field)| params.get(*key).map(|v| (*kind, *field, v.to_string())))
        .ok_or_else(|| DriverError::Other("missing one of 'user, group, role' param".to_string()))
}

fn policy_attachment(ctx: &Ctx<'_>, params: &Params, verb: &str) -> CallResult {
    let arn = resolve_policy_arn(ctx, params)?;
    let (kind, field, name) = policy_target(params)?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let mut input = Record::new(&ATTACH_POLICY);
    input.put("PolicyArn", arn.as_str(), K::Str)?;
    input.put(field, name.as_str(), K::Str)?;
    ctx.call("iam", &format!("{}{}Policy", verb, kind), &input)?;
    Ok(Some(Value::Str(arn)))
}

fn attach_policy(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    policy_attachment(ctx, params, "Attach")
}

fn detach_policy(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["arn"])?;
    policy_attachment(ctx, params, "Detach")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::Level;
    use crate::core::types::{params, Action};
    use crate::driver::testing::Harness;
    use serde_json::json;

    fn ops(h: &Harness) -> Vec<String> {
        h.sim.calls().into_iter().map(|c| c.operation).collect()
    }

    #[test]
    fn test_cs042_create_role_cascade() {
        let h = Harness::new();
        let p = params([
            ("name", Value::str("dev")),
            ("principal-service", Value::str("ec2.amazonaws.com")),
            ("sleep-after", Value::Int(0)),
        ]);
        let arn = h.live(Action::Create, "role", &p).unwrap().unwrap().to_string();
        assert!(arn.starts_with("arn:aws:iam::000000000000:role/"));
        assert_eq!(
            ops(&h),
            vec!["CreateRole", "CreateInstanceProfile", "AddRoleToInstanceProfile"]
        );
        let calls = h.sim.calls();
        let doc: serde_json::Value =
            serde_json::from_str(calls[0].input["AssumeRolePolicyDocument"].as_str().unwrap()).unwrap();
        assert_eq!(doc["Statement"][0]["Principal"]["Service"], json!("ec2.amazonaws.com"));
        assert_eq!(doc["Statement"][0]["Action"], json!(["sts:AssumeRole"]));
        assert_eq!(
            calls[2].input,
            json!({"InstanceProfileName": "dev", "RoleName": "dev"})
        );
        assert_eq!(h.sink.at(Level::Info).len(), 3);
    }

    #[test]
    fn test_cs042_create_role_dry_run_calls_nothing() {
        let h = Harness::new();
        let p = params([("name", Value::str("dev")), ("sleep-after", Value::Int(-1))]);
        let err = h.dry(Action::Create, "role", &p).unwrap_err();
        assert!(matches!(err, DriverError::InvalidParamType { ref key, .. } if key == "sleep-after"));
        let p = params([("name", Value::str("dev"))]);
        assert!(h.dry(Action::Create, "role", &p).unwrap().is_some());
        assert!(h.sim.calls().is_empty());
    }

    #[test]
    fn test_cs042_delete_role_cascade() {
        let h = Harness::new();
        h.sim.respond(
            "iam",
            "ListInstanceProfilesForRole",
            json!({"InstanceProfiles": [{"InstanceProfileName": "dev"}]}),
        );
        h.sim.respond(
            "iam",
            "ListAttachedRolePolicies",
            json!({"AttachedPolicies": [{"PolicyArn": "arn:p"}]}),
        );
        h.sim
            .respond("iam", "ListRolePolicies", json!({"PolicyNames": ["inline"]}));
        h.live(Action::Delete, "role", &params([("name", Value::str("dev"))]))
            .unwrap();
        assert_eq!(
            ops(&h),
            vec![
                "ListInstanceProfilesForRole",
                "RemoveRoleFromInstanceProfile",
                "DeleteInstanceProfile",
                "ListAttachedRolePolicies",
                "DetachRolePolicy",
                "ListRolePolicies",
                "DeleteRolePolicy",
                "DeleteRole",
            ]
        );
    }

    #[test]
    fn test_cs042_create_policy_document() {
        let h = Harness::new();
        let p = params([
            ("name", Value::str("readers")),
            ("effect", Value::str("allow")),
            ("action", Value::List(vec!["s3:Get*".into(), "s3:List*".into()])),
            ("resource", Value::str("all")),
        ]);
        let arn = h.live(Action::Create, "policy", &p).unwrap().unwrap();
        assert!(arn.to_string().contains(":policy/"));
        let input = &h.sim.calls_to("CreatePolicy")[0].input;
        let doc: serde_json::Value =
            serde_json::from_str(input["PolicyDocument"].as_str().unwrap()).unwrap();
        assert_eq!(doc["Version"], json!("2012-10-17"));
        assert_eq!(doc["Statement"][0]["Effect"], json!("Allow"));
        assert_eq!(doc["Statement"][0]["Resource"], json!(["*"]));
    }

    #[test]
    fn test_cs042_create_policy_requires_statement_parts() {
        let h = Harness::new();
        let p = params([("name", Value::str("x")), ("effect", Value::str("allow"))]);
        let err = h.dry(Action::Create, "policy", &p).unwrap_err();
        assert!(matches!(err, DriverError::MissingRequiredParam(ref k) if k == "action"));
    }

    #[test]
    fn test_cs042_update_policy_merges_default_version() {
        let h = Harness::new();
        h.sim
            .respond("iam", "GetPolicy", json!({"Policy": {"DefaultVersionId": "v1"}}));
        h.sim.respond(
            "iam",
            "GetPolicyVersion",
            json!({"PolicyVersion": {"Document":
                "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%5D%7D"}}),
        );
        let p = params([
            ("arn", Value::str("arn:p")),
            ("effect", Value::str("deny")),
            ("action", Value::str("ec2:*")),
            ("resource", Value::str("*")),
        ]);
        h.live(Action::Update, "policy", &p).unwrap();
        let create = &h.sim.calls_to("CreatePolicyVersion")[0].input;
        assert_eq!(create["SetAsDefault"], json!(true));
        let doc: serde_json::Value =
            serde_json::from_str(create["PolicyDocument"].as_str().unwrap()).unwrap();
        assert_eq!(doc["Statement"][0]["Effect"], json!("Deny"));
        assert_eq!(doc["Statement"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_cs042_delete_policy_all_versions() {
        let h = Harness::new();
        h.sim.respond(
            "iam",
            "ListPolicyVersions",
            json!({"Versions": [
                {"VersionId": "v1", "IsDefaultVersion": false},
                {"VersionId": "v2", "IsDefaultVersion": true}
            ]}),
        );
        let p = params([("arn", Value::str("arn:p")), ("all-versions", Value::Bool(true))]);
        h.live(Action::Delete, "policy", &p).unwrap();
        assert_eq!(ops(&h), vec!["ListPolicyVersions", "DeletePolicyVersion", "DeletePolicy"]);
        assert_eq!(h.sim.calls_to("DeletePolicyVersion")[0].input["VersionId"], json!("v1"));
    }

    #[test]
    fn test_cs042_attach_policy_by_lookup() {
        let h = Harness::new();
        let p = params([
            ("service", Value::str("ec2")),
            ("access", Value::str("readonly")),
            ("role", Value::str("dev")),
        ]);
        let arn = h.live(Action::Attach, "policy", &p).unwrap().unwrap();
        assert_eq!(arn.to_string(), "arn:aws:iam::aws:policy/AmazonEC2ReadOnlyAccess");
        let call = &h.sim.calls_to("AttachRolePolicy")[0];
        assert_eq!(call.input["RoleName"], json!("dev"));
    }

    #[test]
    fn test_cs042_attach_policy_errors() {
        let h = Harness::new();
        let err = h
            .dry(Action::Attach, "policy", &params([("arn", Value::str("arn:p"))]))
            .unwrap_err();
        assert_eq!(err.to_string(), "missing one of 'user, group, role' param");

        let p = params([
            ("service", Value::str("nosuchservice")),
            ("access", Value::str("full")),
            ("user", Value::str("bob")),
        ]);
        let err = h.dry(Action::Attach, "policy", &p).unwrap_err();
        assert!(matches!(err, DriverError::PolicyLookup { .. }));
        assert!(h.sim.calls().is_empty());
    }

    #[test]
    fn test_cs042_detach_policy_from_group() {
        let h = Harness::new();
        let p = params([("arn", Value::str("arn:p")), ("group", Value::str("ops"))]);
        h.live(Action::Detach, "policy", &p).unwrap();
        assert_eq!(
            h.sim.calls_to("DetachGroupPolicy")[0].input,
            json!({"PolicyArn": "arn:p", "GroupName": "ops"})
        );
    }

    #[test]
    fn test_cs042_create_accesskey_saves_credentials() {
        let mut h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        h.settings.credentials_path = dir.path().join("aws").join("credentials");
        let p = params([("user", Value::str("bob")), ("save", Value::Bool(true))]);
        let id = h.live(Action::Create, "accesskey", &p).unwrap().unwrap().to_string();
        assert!(id.starts_with("AKIA"));
        let content = std::fs::read_to_string(&h.settings.credentials_path).unwrap();
        assert!(content.contains("[bob]"));
        assert!(content.contains(&format!("aws_access_key_id = {}", id)));
    }

    #[test]
    fn test_cs042_create_accesskey_without_save_prints() {
        let h = Harness::new();
        let p = params([("user", Value::str("bob"))]);
        h.live(Action::Create, "accesskey", &p).unwrap();
        let info = h.sink.at(Level::Info);
        assert!(info[0].starts_with("aws_access_key_id = AKIA"));
        assert_eq!(h.sink.at(Level::Warn).len(), 1);
    }
}
