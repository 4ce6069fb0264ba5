//! RDS database instances.

use super::call::{self, json_path, set, CallSpec, DryRunMode, Output};
use super::checker::{await_state, NOT_FOUND};
use super::{param_str, CallResult, Command, Ctx, DriverError};
use crate::binder::{Record, SetterKind as K, Shape, StructShape};
use crate::core::types::{Action::*, Params};

static CREATE_DB: StructShape = StructShape::new(
    "CreateDBInstanceInput",
    &[
        ("DBInstanceClass", Shape::Str),
        ("DBInstanceIdentifier", Shape::Str),
        ("Engine", Shape::Str),
        ("MasterUserPassword", Shape::Str),
        ("MasterUsername", Shape::Str),
        ("AllocatedStorage", Shape::Int),
        ("AutoMinorVersionUpgrade", Shape::Bool),
        ("AvailabilityZone", Shape::Str),
        ("BackupRetentionPeriod", Shape::Int),
        ("DBName", Shape::Str),
        ("Port", Shape::Int),
        ("PubliclyAccessible", Shape::Bool),
        ("StorageEncrypted", Shape::Bool),
        ("StorageType", Shape::Str),
        ("DBSubnetGroupName", Shape::Str),
        ("VpcSecurityGroupIds", Shape::StrList),
        ("MultiAZ", Shape::Bool),
    ],
);
static DELETE_DB: StructShape = StructShape::new(
    "DeleteDBInstanceInput",
    &[
        ("DBInstanceIdentifier", Shape::Str),
        ("SkipFinalSnapshot", Shape::Bool),
        ("FinalDBSnapshotIdentifier", Shape::Str),
    ],
);
static DESCRIBE_DB: StructShape =
    StructShape::new("DescribeDBInstancesInput", &[("DBInstanceIdentifier", Shape::Str)]);

const fn rds(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [call::Setter],
    extras: &'static [call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "rds",
        operation,
        input,
        required,
        extras,
        output,
        dry_run: DryRunMode::Params,
    }
}

static CREATE_DB_CALL: CallSpec = rds(
    "CreateDBInstance",
    &CREATE_DB,
    &[
        set("type", "DBInstanceClass", K::Str),
        set("id", "DBInstanceIdentifier", K::Str),
        set("engine", "Engine", K::Str),
        set("password", "MasterUserPassword", K::Str),
        set("username", "MasterUsername", K::Str),
        set("size", "AllocatedStorage", K::Int64),
    ],
    &[
        set("autoupgrade", "AutoMinorVersionUpgrade", K::Bool),
        set("availabilityzone", "AvailabilityZone", K::Str),
        set("backupretention", "BackupRetentionPeriod", K::Int64),
        set("dbname", "DBName", K::Str),
        set("port", "Port", K::Int64),
        set("public", "PubliclyAccessible", K::Bool),
        set("encrypted", "StorageEncrypted", K::Bool),
        set("storagetype", "StorageType", K::Str),
        set("subnetgroup", "DBSubnetGroupName", K::Str),
        set("vpcsecuritygroups", "VpcSecurityGroupIds", K::StrSlice),
        set("multiaz", "MultiAZ", K::Bool),
    ],
    Output::Path("DBInstance.DBInstanceIdentifier"),
);
static DELETE_DB_CALL: CallSpec = rds(
    "DeleteDBInstance",
    &DELETE_DB,
    &[set("id", "DBInstanceIdentifier", K::Str)],
    &[
        set("skip-snapshot", "SkipFinalSnapshot", K::Bool),
        set("snapshot", "FinalDBSnapshotIdentifier", K::Str),
    ],
    Output::Nothing,
);

pub static COMMANDS: &[Command] = &[
    Command::custom(Create, "database", create_database),
    Command::spec(Delete, "database", &DELETE_DB_CALL),
    Command::custom(Check, "database", check_database),
];

const MIN_PASSWORD_LEN: usize = 8;

fn create_database(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    if params.contains_key("password") {
        let password = param_str(params, "password")?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DriverError::invalid(
                "password",
                "string",
                format!("should at least be {} characters", MIN_PASSWORD_LEN),
            ));
        }
    }
    call::exec_spec(ctx, &CREATE_DB_CALL, params)
}

const DB_STATES: &[&str] = &[
    "available",
    "backing-up",
    "creating",
    "deleting",
    "failed",
    "maintenance",
    "modifying",
    "rebooting",
    "renaming",
    "resetting-master-credentials",
    "restore-error",
    "storage-full",
    "upgrading",
    NOT_FOUND,
];

fn database_state(ctx: &Ctx<'_>, id: &str) -> Result<String, DriverError> {
    let mut input = Record::new(&DESCRIBE_DB);
    input.put("DBInstanceIdentifier", id, K::Str)?;
    let resp = match ctx.call("rds", "DescribeDBInstances", &input) {
        Ok(resp) => resp,
        Err(DriverError::Provider(e)) if e.is_not_found() => return Ok(NOT_FOUND.to_string()),
        Err(e) => return Err(e),
    };
    let status = json_path(&resp, "DBInstances")
        .and_then(|dbs| dbs.as_array())
        .and_then(|dbs| {
            dbs.iter()
                .find(|db| db.get("DBInstanceIdentifier").and_then(|v| v.as_str()) == Some(id))
        })
        .and_then(|db| db.get("DBInstanceStatus"))
        .and_then(|s| s.as_str());
    Ok(status.unwrap_or(NOT_FOUND).to_string())
}

fn check_database(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    await_state(ctx, params, DB_STATES, |id| database_state(ctx, id))
}
