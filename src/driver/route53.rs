//! Route53 hosted zones and resource record sets.

use super::call::{self, set, CallSpec, DryRunMode, Output};
use super::{CallResult, Command, Ctx};
use crate::binder::{SetterKind as K, Shape, StructShape};
use crate::core::types::{Action::*, Params};

static ZONE_CONFIG: StructShape = StructShape::new(
    "HostedZoneConfig",
    &[("Comment", Shape::Str), ("PrivateZone", Shape::Bool)],
);
static ZONE_VPC: StructShape =
    StructShape::new("VPC", &[("VPCId", Shape::Str), ("VPCRegion", Shape::Str)]);
static CREATE_ZONE: StructShape = StructShape::new(
    "CreateHostedZoneInput",
    &[
        ("CallerReference", Shape::Str),
        ("Name", Shape::Str),
        ("DelegationSetId", Shape::Str),
        ("HostedZoneConfig", Shape::Struct(&ZONE_CONFIG)),
        ("VPC", Shape::Struct(&ZONE_VPC)),
    ],
);
static ZONE_ID: StructShape = StructShape::new("DeleteHostedZoneInput", &[("Id", Shape::Str)]);

static RESOURCE_RECORD: StructShape = StructShape::new("ResourceRecord", &[("Value", Shape::Str)]);
static RECORD_SET: StructShape = StructShape::new(
    "ResourceRecordSet",
    &[
        ("Name", Shape::Str),
        ("Type", Shape::Str),
        ("TTL", Shape::Int),
        ("ResourceRecords", Shape::StructList(&RESOURCE_RECORD)),
    ],
);
static CHANGE: StructShape = StructShape::new(
    "Change",
    &[("Action", Shape::Str), ("ResourceRecordSet", Shape::Struct(&RECORD_SET))],
);
static CHANGE_BATCH: StructShape = StructShape::new(
    "ChangeBatch",
    &[("Comment", Shape::Str), ("Changes", Shape::StructList(&CHANGE))],
);
static CHANGE_RECORDS: StructShape = StructShape::new(
    "ChangeResourceRecordSetsInput",
    &[("HostedZoneId", Shape::Str), ("ChangeBatch", Shape::Struct(&CHANGE_BATCH))],
);

static CREATE_ZONE_CALL: CallSpec = CallSpec {
    service: "route53",
    operation: "CreateHostedZone",
    input: &CREATE_ZONE,
    required: &[
        set("callerreference", "CallerReference", K::Str),
        set("name", "Name", K::Str),
    ],
    extras: &[
        set("delegationsetid", "DelegationSetId", K::Str),
        set("comment", "HostedZoneConfig.Comment", K::Str),
        set("isprivate", "HostedZoneConfig.PrivateZone", K::Bool),
        set("vpcid", "VPC.VPCId", K::Str),
        set("vpcregion", "VPC.VPCRegion", K::Str),
    ],
    output: Output::Path("HostedZone.Id"),
    dry_run: DryRunMode::Params,
};

static DELETE_ZONE_CALL: CallSpec = CallSpec {
    service: "route53",
    operation: "DeleteHostedZone",
    input: &ZONE_ID,
    required: &[set("id", "Id", K::Str)],
    extras: &[],
    output: Output::Nothing,
    dry_run: DryRunMode::Params,
};

const RECORD_SETTERS: &[call::Setter] = &[
    set("zone", "HostedZoneId", K::Str),
    set("name", "ChangeBatch.Changes[0]ResourceRecordSet.Name", K::SliceStruct),
    set("type", "ChangeBatch.Changes[0]ResourceRecordSet.Type", K::SliceStruct),
    set(
        "value",
        "ChangeBatch.Changes[0]ResourceRecordSet.ResourceRecords[0]Value",
        K::SliceStruct,
    ),
    set("ttl", "ChangeBatch.Changes[0]ResourceRecordSet.TTL", K::SliceStructInt64),
];

static CREATE_RECORD_CALL: CallSpec = CallSpec {
    service: "route53",
    operation: "ChangeResourceRecordSets",
    input: &CHANGE_RECORDS,
    required: RECORD_SETTERS,
    extras: &[set("comment", "ChangeBatch.Comment", K::Str)],
    output: Output::Path("ChangeInfo.Id"),
    dry_run: DryRunMode::Params,
};

static DELETE_RECORD_CALL: CallSpec = CallSpec {
    service: "route53",
    operation: "ChangeResourceRecordSets",
    input: &CHANGE_RECORDS,
    required: RECORD_SETTERS,
    extras: &[],
    output: Output::Path("ChangeInfo.Id"),
    dry_run: DryRunMode::Params,
};

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "zone", &CREATE_ZONE_CALL),
    Command::spec(Delete, "zone", &DELETE_ZONE_CALL),
    Command::custom(Create, "record", create_record),
    Command::custom(Delete, "record", delete_record),
];

/// Record changes share one request; only the change action differs.
fn change_record(ctx: &Ctx<'_>, spec: &CallSpec, change: &str, params: &Params) -> CallResult {
    let mut input = call::prepare(ctx, spec, params)?;
    input.put("ChangeBatch.Changes[0]Action", change, K::SliceStruct)?;
    call::invoke(ctx, spec, input, params)
}

fn create_record(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    change_record(ctx, &CREATE_RECORD_CALL, "CREATE", params)
}

fn delete_record(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    change_record(ctx, &DELETE_RECORD_CALL, "DELETE", params)
}
