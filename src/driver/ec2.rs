//! EC2 commands: networking, instances, volumes, snapshots, images, keypairs.
//!
//! Every EC2 mutation supports the provider-side `DryRun` flag, except
//! `update subnet`.

use super::call::{self, json_path, json_str, send, set, CallSpec, DryRunMode, Output, FILTER, TAG};
use super::checker::{await_state, NOT_FOUND};
use super::keypair;
use super::{fake_dry_run_id, param_bool, param_str, require, CallResult, Command, Ctx, DriverError};
use crate::binder::{Record, SetterKind as K, Shape, StructShape};
use crate::core::types::{Action::*, Params, Value};

// ============================================================================
// Request shapes
// ============================================================================

static CREATE_VPC: StructShape =
    StructShape::new("CreateVpcInput", &[("CidrBlock", Shape::Str), ("DryRun", Shape::Bool)]);
static VPC_ID: StructShape = StructShape::new("DeleteVpcInput", &[("VpcId", Shape::Str), ("DryRun", Shape::Bool)]);
static CREATE_SUBNET: StructShape = StructShape::new(
    "CreateSubnetInput",
    &[
        ("CidrBlock", Shape::Str),
        ("VpcId", Shape::Str),
        ("AvailabilityZone", Shape::Str),
        ("DryRun", Shape::Bool),
    ],
);
static MODIFY_SUBNET: StructShape = StructShape::new(
    "ModifySubnetAttributeInput",
    &[("SubnetId", Shape::Str), ("MapPublicIpOnLaunch", Shape::BoolAttr)],
);
static SUBNET_ID: StructShape =
    StructShape::new("DeleteSubnetInput", &[("SubnetId", Shape::Str), ("DryRun", Shape::Bool)]);
static IAM_PROFILE: StructShape =
    StructShape::new("IamInstanceProfileSpecification", &[("Arn", Shape::Str), ("Name", Shape::Str)]);
static RUN_INSTANCES: StructShape = StructShape::new(
    "RunInstancesInput",
    &[
        ("ImageId", Shape::Str),
        ("MaxCount", Shape::Int),
        ("MinCount", Shape::Int),
        ("InstanceType", Shape::Str),
        ("SubnetId", Shape::Str),
        ("KeyName", Shape::Str),
        ("PrivateIpAddress", Shape::Str),
        ("UserData", Shape::Str),
        ("SecurityGroupIds", Shape::StrList),
        ("DisableApiTermination", Shape::Bool),
        ("IamInstanceProfile", Shape::Struct(&IAM_PROFILE)),
        ("DryRun", Shape::Bool),
    ],
);
static MODIFY_INSTANCE: StructShape = StructShape::new(
    "ModifyInstanceAttributeInput",
    &[
        ("InstanceId", Shape::Str),
        ("InstanceType", Shape::StrAttr),
        ("DisableApiTermination", Shape::BoolAttr),
        ("Groups", Shape::StrList),
        ("DryRun", Shape::Bool),
    ],
);
static INSTANCE_IDS: StructShape =
    StructShape::new("InstanceIdsInput", &[("InstanceIds", Shape::StrList), ("DryRun", Shape::Bool)]);
static CREATE_GROUP: StructShape = StructShape::new(
    "CreateSecurityGroupInput",
    &[
        ("GroupName", Shape::Str),
        ("VpcId", Shape::Str),
        ("Description", Shape::Str),
        ("DryRun", Shape::Bool),
    ],
);
static GROUP_ID: StructShape =
    StructShape::new("DeleteSecurityGroupInput", &[("GroupId", Shape::Str), ("DryRun", Shape::Bool)]);
static IP_RANGE: StructShape = StructShape::new("IpRange", &[("CidrIp", Shape::Str)]);
static IP_PERMISSION: StructShape = StructShape::new(
    "IpPermission",
    &[
        ("IpProtocol", Shape::Str),
        ("FromPort", Shape::Int),
        ("ToPort", Shape::Int),
        ("IpRanges", Shape::StructList(&IP_RANGE)),
    ],
);
static GROUP_PERMISSIONS: StructShape = StructShape::new(
    "SecurityGroupPermissionsInput",
    &[
        ("GroupId", Shape::Str),
        ("IpPermissions", Shape::StructList(&IP_PERMISSION)),
        ("DryRun", Shape::Bool),
    ],
);
static CREATE_VOLUME: StructShape = StructShape::new(
    "CreateVolumeInput",
    &[("AvailabilityZone", Shape::Str), ("Size", Shape::Int), ("DryRun", Shape::Bool)],
);
static VOLUME_ID: StructShape =
    StructShape::new("DeleteVolumeInput", &[("VolumeId", Shape::Str), ("DryRun", Shape::Bool)]);
static VOLUME_ATTACHMENT: StructShape = StructShape::new(
    "VolumeAttachmentInput",
    &[
        ("Device", Shape::Str),
        ("VolumeId", Shape::Str),
        ("InstanceId", Shape::Str),
        ("Force", Shape::Bool),
        ("DryRun", Shape::Bool),
    ],
);
static CREATE_SNAPSHOT: StructShape = StructShape::new(
    "CreateSnapshotInput",
    &[("VolumeId", Shape::Str), ("Description", Shape::Str), ("DryRun", Shape::Bool)],
);
static SNAPSHOT_ID: StructShape =
    StructShape::new("DeleteSnapshotInput", &[("SnapshotId", Shape::Str), ("DryRun", Shape::Bool)]);
static COPY_SNAPSHOT: StructShape = StructShape::new(
    "CopySnapshotInput",
    &[
        ("SourceSnapshotId", Shape::Str),
        ("SourceRegion", Shape::Str),
        ("Encrypted", Shape::Bool),
        ("Description", Shape::Str),
        ("DryRun", Shape::Bool),
    ],
);
static CREATE_GATEWAY: StructShape = StructShape::new("CreateInternetGatewayInput", &[("DryRun", Shape::Bool)]);
static GATEWAY_ID: StructShape = StructShape::new(
    "DeleteInternetGatewayInput",
    &[("InternetGatewayId", Shape::Str), ("DryRun", Shape::Bool)],
);
static GATEWAY_VPC: StructShape = StructShape::new(
    "InternetGatewayVpcInput",
    &[("InternetGatewayId", Shape::Str), ("VpcId", Shape::Str), ("DryRun", Shape::Bool)],
);
static CREATE_ROUTE_TABLE: StructShape =
    StructShape::new("CreateRouteTableInput", &[("VpcId", Shape::Str), ("DryRun", Shape::Bool)]);
static ROUTE_TABLE_ID: StructShape =
    StructShape::new("DeleteRouteTableInput", &[("RouteTableId", Shape::Str), ("DryRun", Shape::Bool)]);
static ASSOCIATE_ROUTE_TABLE: StructShape = StructShape::new(
    "AssociateRouteTableInput",
    &[("RouteTableId", Shape::Str), ("SubnetId", Shape::Str), ("DryRun", Shape::Bool)],
);
static ASSOCIATION_ID: StructShape =
    StructShape::new("DisassociateInput", &[("AssociationId", Shape::Str), ("DryRun", Shape::Bool)]);
static ROUTE: StructShape = StructShape::new(
    "RouteInput",
    &[
        ("RouteTableId", Shape::Str),
        ("DestinationCidrBlock", Shape::Str),
        ("GatewayId", Shape::Str),
        ("DryRun", Shape::Bool),
    ],
);
static TAGS: StructShape = StructShape::new(
    "TagsInput",
    &[("Resources", Shape::StrList), ("Tags", Shape::StructList(&TAG)), ("DryRun", Shape::Bool)],
);
static KEY_NAME: StructShape =
    StructShape::new("DeleteKeyPairInput", &[("KeyName", Shape::Str), ("DryRun", Shape::Bool)]);
static IMPORT_KEY_PAIR: StructShape = StructShape::new(
    "ImportKeyPairInput",
    &[("KeyName", Shape::Str), ("PublicKeyMaterial", Shape::Bytes), ("DryRun", Shape::Bool)],
);
static ALLOCATE_ADDRESS: StructShape =
    StructShape::new("AllocateAddressInput", &[("Domain", Shape::Str), ("DryRun", Shape::Bool)]);
static RELEASE_ADDRESS: StructShape = StructShape::new(
    "ReleaseAddressInput",
    &[("AllocationId", Shape::Str), ("PublicIp", Shape::Str), ("DryRun", Shape::Bool)],
);
static ASSOCIATE_ADDRESS: StructShape = StructShape::new(
    "AssociateAddressInput",
    &[
        ("AllocationId", Shape::Str),
        ("InstanceId", Shape::Str),
        ("AllowReassociation", Shape::Bool),
        ("DryRun", Shape::Bool),
    ],
);
static COPY_IMAGE: StructShape = StructShape::new(
    "CopyImageInput",
    &[
        ("Name", Shape::Str),
        ("SourceImageId", Shape::Str),
        ("SourceRegion", Shape::Str),
        ("Encrypted", Shape::Bool),
        ("Description", Shape::Str),
        ("DryRun", Shape::Bool),
    ],
);
static USER_BUCKET: StructShape =
    StructShape::new("UserBucket", &[("S3Bucket", Shape::Str), ("S3Key", Shape::Str)]);
static DISK_CONTAINER: StructShape = StructShape::new(
    "ImageDiskContainer",
    &[
        ("SnapshotId", Shape::Str),
        ("Url", Shape::Str),
        ("UserBucket", Shape::Struct(&USER_BUCKET)),
    ],
);
static IMPORT_IMAGE: StructShape = StructShape::new(
    "ImportImageInput",
    &[
        ("Architecture", Shape::Str),
        ("Description", Shape::Str),
        ("LicenseType", Shape::Str),
        ("Platform", Shape::Str),
        ("RoleName", Shape::Str),
        ("DiskContainers", Shape::StructList(&DISK_CONTAINER)),
        ("DryRun", Shape::Bool),
    ],
);
static IMAGE_ID: StructShape =
    StructShape::new("DeregisterImageInput", &[("ImageId", Shape::Str), ("DryRun", Shape::Bool)]);
static DESCRIBE_IMAGES: StructShape = StructShape::new("DescribeImagesInput", &[("ImageIds", Shape::StrList)]);
static DESCRIBE_INSTANCES: StructShape =
    StructShape::new("DescribeInstancesInput", &[("InstanceIds", Shape::StrList)]);
static DESCRIBE_VOLUMES: StructShape = StructShape::new("DescribeVolumesInput", &[("VolumeIds", Shape::StrList)]);
static DESCRIBE_INTERFACES: StructShape = StructShape::new(
    "DescribeNetworkInterfacesInput",
    &[("Filters", Shape::StructList(&FILTER))],
);
static DESCRIBE_INSTANCE_ATTRIBUTE: StructShape = StructShape::new(
    "DescribeInstanceAttributeInput",
    &[("Attribute", Shape::Str), ("InstanceId", Shape::Str)],
);

// ============================================================================
// Call descriptors
// ============================================================================

const fn ec2(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [call::Setter],
    extras: &'static [call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "ec2",
        operation,
        input,
        required,
        extras,
        output,
        dry_run: DryRunMode::Flag,
    }
}

static CREATE_VPC_CALL: CallSpec = ec2(
    "CreateVpc",
    &CREATE_VPC,
    &[set("cidr", "CidrBlock", K::Str)],
    &[],
    Output::Path("Vpc.VpcId"),
);
static DELETE_VPC_CALL: CallSpec = ec2("DeleteVpc", &VPC_ID, &[set("id", "VpcId", K::Str)], &[], Output::Nothing);
static CREATE_SUBNET_CALL: CallSpec = ec2(
    "CreateSubnet",
    &CREATE_SUBNET,
    &[set("cidr", "CidrBlock", K::Str), set("vpc", "VpcId", K::Str)],
    &[set("availabilityzone", "AvailabilityZone", K::Str)],
    Output::Path("Subnet.SubnetId"),
);
static UPDATE_SUBNET_CALL: CallSpec = CallSpec {
    service: "ec2",
    operation: "ModifySubnetAttribute",
    input: &MODIFY_SUBNET,
    required: &[set("id", "SubnetId", K::Str)],
    extras: &[set("public", "MapPublicIpOnLaunch", K::BoolAttr)],
    output: Output::Nothing,
    dry_run: DryRunMode::Params,
};
static DELETE_SUBNET_CALL: CallSpec =
    ec2("DeleteSubnet", &SUBNET_ID, &[set("id", "SubnetId", K::Str)], &[], Output::Nothing);
static RUN_INSTANCES_CALL: CallSpec = ec2(
    "RunInstances",
    &RUN_INSTANCES,
    &[
        set("image", "ImageId", K::Str),
        set("count", "MaxCount", K::Int64),
        set("count", "MinCount", K::Int64),
        set("type", "InstanceType", K::Str),
        set("subnet", "SubnetId", K::Str),
    ],
    &[
        set("keypair", "KeyName", K::Str),
        set("ip", "PrivateIpAddress", K::Str),
        set("userdata", "UserData", K::FileToBase64),
        set("securitygroup", "SecurityGroupIds", K::StrSlice),
        set("lock", "DisableApiTermination", K::Bool),
        set("role", "IamInstanceProfile.Name", K::Str),
    ],
    Output::Path("Instances[0].InstanceId"),
);
static UPDATE_INSTANCE_CALL: CallSpec = ec2(
    "ModifyInstanceAttribute",
    &MODIFY_INSTANCE,
    &[set("id", "InstanceId", K::Str)],
    &[
        set("type", "InstanceType", K::StrAttr),
        set("lock", "DisableApiTermination", K::BoolAttr),
    ],
    Output::Nothing,
);
static DELETE_INSTANCE_CALL: CallSpec = ec2(
    "TerminateInstances",
    &INSTANCE_IDS,
    &[set("id", "InstanceIds", K::StrSlice)],
    &[],
    Output::Nothing,
);
static START_INSTANCE_CALL: CallSpec = ec2(
    "StartInstances",
    &INSTANCE_IDS,
    &[set("id", "InstanceIds", K::StrSlice)],
    &[],
    Output::Param("id"),
);
static STOP_INSTANCE_CALL: CallSpec = ec2(
    "StopInstances",
    &INSTANCE_IDS,
    &[set("id", "InstanceIds", K::StrSlice)],
    &[],
    Output::Param("id"),
);
static CREATE_GROUP_CALL: CallSpec = ec2(
    "CreateSecurityGroup",
    &CREATE_GROUP,
    &[
        set("name", "GroupName", K::Str),
        set("vpc", "VpcId", K::Str),
        set("description", "Description", K::Str),
    ],
    &[],
    Output::Path("GroupId"),
);
static DELETE_GROUP_CALL: CallSpec =
    ec2("DeleteSecurityGroup", &GROUP_ID, &[set("id", "GroupId", K::Str)], &[], Output::Nothing);
static CREATE_VOLUME_CALL: CallSpec = ec2(
    "CreateVolume",
    &CREATE_VOLUME,
    &[set("availabilityzone", "AvailabilityZone", K::Str), set("size", "Size", K::Int64)],
    &[],
    Output::Path("VolumeId"),
);
static DELETE_VOLUME_CALL: CallSpec =
    ec2("DeleteVolume", &VOLUME_ID, &[set("id", "VolumeId", K::Str)], &[], Output::Nothing);
static ATTACH_VOLUME_CALL: CallSpec = ec2(
    "AttachVolume",
    &VOLUME_ATTACHMENT,
    &[
        set("device", "Device", K::Str),
        set("id", "VolumeId", K::Str),
        set("instance", "InstanceId", K::Str),
    ],
    &[],
    Output::Param("id"),
);
static DETACH_VOLUME_CALL: CallSpec = ec2(
    "DetachVolume",
    &VOLUME_ATTACHMENT,
    &[
        set("device", "Device", K::Str),
        set("id", "VolumeId", K::Str),
        set("instance", "InstanceId", K::Str),
    ],
    &[set("force", "Force", K::Bool)],
    Output::Param("id"),
);
static CREATE_SNAPSHOT_CALL: CallSpec = ec2(
    "CreateSnapshot",
    &CREATE_SNAPSHOT,
    &[set("volume", "VolumeId", K::Str)],
    &[set("description", "Description", K::Str)],
    Output::Path("SnapshotId"),
);
static DELETE_SNAPSHOT_CALL: CallSpec =
    ec2("DeleteSnapshot", &SNAPSHOT_ID, &[set("id", "SnapshotId", K::Str)], &[], Output::Nothing);
static COPY_SNAPSHOT_CALL: CallSpec = ec2(
    "CopySnapshot",
    &COPY_SNAPSHOT,
    &[
        set("source-id", "SourceSnapshotId", K::Str),
        set("source-region", "SourceRegion", K::Str),
    ],
    &[set("encrypted", "Encrypted", K::Bool), set("description", "Description", K::Str)],
    Output::Path("SnapshotId"),
);
static CREATE_GATEWAY_CALL: CallSpec = ec2(
    "CreateInternetGateway",
    &CREATE_GATEWAY,
    &[],
    &[],
    Output::Path("InternetGateway.InternetGatewayId"),
);
static DELETE_GATEWAY_CALL: CallSpec = ec2(
    "DeleteInternetGateway",
    &GATEWAY_ID,
    &[set("id", "InternetGatewayId", K::Str)],
    &[],
    Output::Nothing,
);
static ATTACH_GATEWAY_CALL: CallSpec = ec2(
    "AttachInternetGateway",
    &GATEWAY_VPC,
    &[set("id", "InternetGatewayId", K::Str), set("vpc", "VpcId", K::Str)],
    &[],
    Output::Nothing,
);
static DETACH_GATEWAY_CALL: CallSpec = ec2(
    "DetachInternetGateway",
    &GATEWAY_VPC,
    &[set("id", "InternetGatewayId", K::Str), set("vpc", "VpcId", K::Str)],
    &[],
    Output::Nothing,
);
static CREATE_ROUTE_TABLE_CALL: CallSpec = ec2(
    "CreateRouteTable",
    &CREATE_ROUTE_TABLE,
    &[set("vpc", "VpcId", K::Str)],
    &[],
    Output::Path("RouteTable.RouteTableId"),
);
static DELETE_ROUTE_TABLE_CALL: CallSpec = ec2(
    "DeleteRouteTable",
    &ROUTE_TABLE_ID,
    &[set("id", "RouteTableId", K::Str)],
    &[],
    Output::Nothing,
);
static ATTACH_ROUTE_TABLE_CALL: CallSpec = ec2(
    "AssociateRouteTable",
    &ASSOCIATE_ROUTE_TABLE,
    &[set("id", "RouteTableId", K::Str), set("subnet", "SubnetId", K::Str)],
    &[],
    Output::Path("AssociationId"),
);
static DETACH_ROUTE_TABLE_CALL: CallSpec = ec2(
    "DisassociateRouteTable",
    &ASSOCIATION_ID,
    &[set("association", "AssociationId", K::Str)],
    &[],
    Output::Nothing,
);
static CREATE_ROUTE_CALL: CallSpec = ec2(
    "CreateRoute",
    &ROUTE,
    &[
        set("table", "RouteTableId", K::Str),
        set("cidr", "DestinationCidrBlock", K::Str),
        set("gateway", "GatewayId", K::Str),
    ],
    &[],
    Output::Nothing,
);
static DELETE_ROUTE_CALL: CallSpec = ec2(
    "DeleteRoute",
    &ROUTE,
    &[set("table", "RouteTableId", K::Str), set("cidr", "DestinationCidrBlock", K::Str)],
    &[],
    Output::Nothing,
);
static CREATE_TAG_CALL: CallSpec = ec2(
    "CreateTags",
    &TAGS,
    &[
        set("resource", "Resources", K::StrSlice),
        set("key", "Tags[0]Key", K::SliceStruct),
        set("value", "Tags[0]Value", K::SliceStruct),
    ],
    &[],
    Output::Nothing,
);
static DELETE_TAG_CALL: CallSpec = ec2(
    "DeleteTags",
    &TAGS,
    &[
        set("resource", "Resources", K::StrSlice),
        set("key", "Tags[0]Key", K::SliceStruct),
        set("value", "Tags[0]Value", K::SliceStruct),
    ],
    &[],
    Output::Nothing,
);
static DELETE_KEYPAIR_CALL: CallSpec =
    ec2("DeleteKeyPair", &KEY_NAME, &[set("id", "KeyName", K::Str)], &[], Output::Nothing);
static CREATE_ELASTICIP_CALL: CallSpec = ec2(
    "AllocateAddress",
    &ALLOCATE_ADDRESS,
    &[set("domain", "Domain", K::Str)],
    &[],
    Output::Path("AllocationId"),
);
static DELETE_ELASTICIP_CALL: CallSpec = ec2(
    "ReleaseAddress",
    &RELEASE_ADDRESS,
    &[set("id", "AllocationId", K::Str)],
    &[set("ip", "PublicIp", K::Str)],
    Output::Nothing,
);
static ATTACH_ELASTICIP_CALL: CallSpec = ec2(
    "AssociateAddress",
    &ASSOCIATE_ADDRESS,
    &[set("id", "AllocationId", K::Str), set("instance", "InstanceId", K::Str)],
    &[set("allow-reassociation", "AllowReassociation", K::Bool)],
    Output::Path("AssociationId"),
);
static DETACH_ELASTICIP_CALL: CallSpec = ec2(
    "DisassociateAddress",
    &ASSOCIATION_ID,
    &[set("association", "AssociationId", K::Str)],
    &[],
    Output::Nothing,
);
static COPY_IMAGE_CALL: CallSpec = ec2(
    "CopyImage",
    &COPY_IMAGE,
    &[
        set("name", "Name", K::Str),
        set("source-id", "SourceImageId", K::Str),
        set("source-region", "SourceRegion", K::Str),
    ],
    &[set("encrypted", "Encrypted", K::Bool), set("description", "Description", K::Str)],
    Output::Path("ImageId"),
);
static IMPORT_IMAGE_CALL: CallSpec = ec2(
    "ImportImage",
    &IMPORT_IMAGE,
    &[],
    &[
        set("architecture", "Architecture", K::Str),
        set("description", "Description", K::Str),
        set("license", "LicenseType", K::Str),
        set("platform", "Platform", K::Str),
        set("role", "RoleName", K::Str),
        set("snapshot", "DiskContainers[0]SnapshotId", K::SliceStruct),
        set("url", "DiskContainers[0]Url", K::SliceStruct),
        set("bucket", "DiskContainers[0]UserBucket.S3Bucket", K::SliceStruct),
        set("s3object", "DiskContainers[0]UserBucket.S3Key", K::SliceStruct),
    ],
    Output::Path("ImportTaskId"),
);

pub static COMMANDS: &[Command] = &[
    Command::custom(Create, "vpc", create_vpc),
    Command::spec(Delete, "vpc", &DELETE_VPC_CALL),
    Command::custom(Create, "subnet", create_subnet),
    Command::spec(Update, "subnet", &UPDATE_SUBNET_CALL),
    Command::spec(Delete, "subnet", &DELETE_SUBNET_CALL),
    Command::custom(Create, "instance", create_instance),
    Command::spec(Update, "instance", &UPDATE_INSTANCE_CALL),
    Command::spec(Delete, "instance", &DELETE_INSTANCE_CALL),
    Command::spec(Start, "instance", &START_INSTANCE_CALL),
    Command::spec(Stop, "instance", &STOP_INSTANCE_CALL),
    Command::custom(Check, "instance", check_instance),
    Command::spec(Create, "securitygroup", &CREATE_GROUP_CALL),
    Command::custom(Update, "securitygroup", update_securitygroup),
    Command::spec(Delete, "securitygroup", &DELETE_GROUP_CALL),
    Command::custom(Check, "securitygroup", check_securitygroup),
    Command::custom(Attach, "securitygroup", attach_securitygroup),
    Command::custom(Detach, "securitygroup", detach_securitygroup),
    Command::spec(Create, "volume", &CREATE_VOLUME_CALL),
    Command::custom(Check, "volume", check_volume),
    Command::spec(Delete, "volume", &DELETE_VOLUME_CALL),
    Command::spec(Attach, "volume", &ATTACH_VOLUME_CALL),
    Command::spec(Detach, "volume", &DETACH_VOLUME_CALL),
    Command::spec(Create, "snapshot", &CREATE_SNAPSHOT_CALL),
    Command::spec(Delete, "snapshot", &DELETE_SNAPSHOT_CALL),
    Command::spec(Copy, "snapshot", &COPY_SNAPSHOT_CALL),
    Command::spec(Create, "internetgateway", &CREATE_GATEWAY_CALL),
    Command::spec(Delete, "internetgateway", &DELETE_GATEWAY_CALL),
    Command::spec(Attach, "internetgateway", &ATTACH_GATEWAY_CALL),
    Command::spec(Detach, "internetgateway", &DETACH_GATEWAY_CALL),
    Command::spec(Create, "routetable", &CREATE_ROUTE_TABLE_CALL),
    Command::spec(Delete, "routetable", &DELETE_ROUTE_TABLE_CALL),
    Command::spec(Attach, "routetable", &ATTACH_ROUTE_TABLE_CALL),
    Command::spec(Detach, "routetable", &DETACH_ROUTE_TABLE_CALL),
    Command::spec(Create, "route", &CREATE_ROUTE_CALL),
    Command::spec(Delete, "route", &DELETE_ROUTE_CALL),
    Command::spec(Create, "tag", &CREATE_TAG_CALL),
    Command::spec(Delete, "tag", &DELETE_TAG_CALL),
    Command::custom(Create, "keypair", create_keypair),
    Command::spec(Delete, "keypair", &DELETE_KEYPAIR_CALL),
    Command::spec(Create, "elasticip", &CREATE_ELASTICIP_CALL),
    Command::spec(Delete, "elasticip", &DELETE_ELASTICIP_CALL),
    Command::spec(Attach, "elasticip", &ATTACH_ELASTICIP_CALL),
    Command::spec(Detach, "elasticip", &DETACH_ELASTICIP_CALL),
    Command::spec(Copy, "image", &COPY_IMAGE_CALL),
    Command::spec(Import, "image", &IMPORT_IMAGE_CALL),
    Command::custom(Delete, "image", delete_image),
];

// ============================================================================
// Named resources
// ============================================================================

/// Tag a new resource with `Name=<name>`.
fn tag_name(ctx: &Ctx<'_>, id: &str, name: &str) -> Result<(), DriverError> {
    let mut input = Record::new(&TAGS);
    input.put("Resources", Value::List(vec![id.to_string()]), K::StrSlice)?;
    input.put("Tags[0]Key", "Name", K::SliceStruct)?;
    input.put("Tags[0]Value", name, K::SliceStruct)?;
    ctx.call("ec2", "CreateTags", &input)?;
    ctx.logger.verbose(&format!("tagged {} with Name={}", id, name));
    Ok(())
}

fn create_named(ctx: &Ctx<'_>, spec: &CallSpec, params: &Params) -> CallResult {
    let out = call::exec_spec(ctx, spec, params)?;
    if !ctx.dry_run {
        if let (Some(id), Some(name)) = (&out, params.get("name")) {
            tag_name(ctx, &id.to_string(), &name.to_string())?;
        }
    }
    Ok(out)
}

fn create_vpc(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    create_named(ctx, &CREATE_VPC_CALL, params)
}

fn create_subnet(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    let public = param_bool(params, "public")?;
    let out = create_named(ctx, &CREATE_SUBNET_CALL, params)?;
    if public && !ctx.dry_run {
        if let Some(id) = &out {
            let mut input = Record::new(&MODIFY_SUBNET);
            input.put("SubnetId", id.to_string(), K::Str)?;
            input.put("MapPublicIpOnLaunch", true, K::BoolAttr)?;
            ctx.call("ec2", "ModifySubnetAttribute", &input)?;
        }
    }
    Ok(out)
}

fn create_instance(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["image", "count", "type", "subnet", "name"])?;
    create_named(ctx, &RUN_INSTANCES_CALL, params)
}

// ============================================================================
// Security groups
// ============================================================================

fn is_tcp_or_udp(protocol: &str) -> bool {
    protocol.eq_ignore_ascii_case("tcp") || protocol.eq_ignore_ascii_case("udp")
}

/// `any`, `from-to` or a single port.
fn port_range(ports: &str, protocol: &str) -> Result<(i64, i64), DriverError> {
    let parse = |s: &str| {
        s.trim()
            .parse::<i64>()
            .map_err(|_| DriverError::invalid("portrange", "port or from-to range", format!("got '{}'", ports)))
    };
    if ports.contains("any") {
        return Ok(if is_tcp_or_udp(protocol) { (0, 65535) } else { (-1, -1) });
    }
    match ports.split_once('-') {
        Some((from, to)) => Ok((parse(from)?, parse(to)?)),
        None => {
            let port = parse(ports)?;
            Ok((port, port))
        }
    }
}

fn rule_operation(params: &Params) -> Result<&'static str, DriverError> {
    let pick = |key: &str, value: &Value, authorize: &'static str, revoke: &'static str| {
        match value.to_string().as_str() {
            "authorize" => Ok(authorize),
            "revoke" => Ok(revoke),
            other => Err(DriverError::invalid(key, "authorize or revoke", format!("got '{}'", other))),
        }
    };
    match (params.get("inbound"), params.get("outbound")) {
        (Some(v), None) => pick(
            "inbound",
            v,
            "AuthorizeSecurityGroupIngress",
            "RevokeSecurityGroupIngress",
        ),
        (None, Some(v)) => pick(
            "outbound",
            v,
            "AuthorizeSecurityGroupEgress",
            "RevokeSecurityGroupEgress",
        ),
        _ => Err(DriverError::Other(
            "expect either 'inbound' or 'outbound' parameter".to_string(),
        )),
    }
}

fn update_securitygroup(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["id", "cidr", "protocol"])?;
    let operation = rule_operation(params)?;
    let protocol = param_str(params, "protocol")?;

    let mut input = Record::new(&GROUP_PERMISSIONS);
    input.put("GroupId", param_str(params, "id")?, K::Str)?;
    input.put("IpPermissions[0]IpRanges[0]CidrIp", param_str(params, "cidr")?, K::SliceStruct)?;
    let (ip_protocol, ports) = if protocol.eq_ignore_ascii_case("any") {
        ("-1".to_string(), Some((-1, -1)))
    } else {
        let ports = match params.get("portrange") {
            Some(range) => Some(port_range(&range.to_string(), &protocol)?),
            None if is_tcp_or_udp(&protocol) => {
                return Err(DriverError::Other(
                    "missing 'portrange' when protocol is TCP/UDP".to_string(),
                ))
            }
            None => None,
        };
        (protocol, ports)
    };
    input.put("IpPermissions[0]IpProtocol", ip_protocol, K::SliceStruct)?;
    if let Some((from, to)) = ports {
        input.put("IpPermissions[0]FromPort", from, K::SliceStructInt64)?;
        input.put("IpPermissions[0]ToPort", to, K::SliceStructInt64)?;
    }

    if send(ctx, "ec2", operation, input)?.is_none() {
        ctx.logger.verbose(&format!("dry run: {} ok", ctx.command()));
    }
    Ok(None)
}

fn instance_groups(ctx: &Ctx<'_>, instance: &str) -> Result<Vec<String>, DriverError> {
    let mut input = Record::new(&DESCRIBE_INSTANCE_ATTRIBUTE);
    input.put("Attribute", "groupSet", K::Str)?;
    input.put("InstanceId", instance, K::Str)?;
    let resp = ctx
        .call("ec2", "DescribeInstanceAttribute", &input)
        .map_err(|e| DriverError::Other(format!("fetching securitygroups for instance {}: {}", instance, e)))?;
    Ok(string_list(&resp, "Groups", "GroupId"))
}

fn set_instance_groups(ctx: &Ctx<'_>, instance: &str, groups: Vec<String>) -> CallResult {
    let mut input = Record::new(&MODIFY_INSTANCE);
    input.put("InstanceId", instance, K::Str)?;
    input.put("Groups", Value::List(groups), K::StrSlice)?;
    ctx.call("ec2", "ModifyInstanceAttribute", &input)?;
    Ok(None)
}

fn attach_securitygroup(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["id", "instance"])?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let (id, instance) = (param_str(params, "id")?, param_str(params, "instance")?);
    let mut groups = instance_groups(ctx, &instance)?;
    if !groups.contains(&id) {
        groups.push(id);
    }
    set_instance_groups(ctx, &instance, groups)
}

fn detach_securitygroup(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["id", "instance"])?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let (id, instance) = (param_str(params, "id")?, param_str(params, "instance")?);
    let mut groups = instance_groups(ctx, &instance)?;
    groups.retain(|g| *g != id);
    if groups.is_empty() {
        ctx.logger.error("AWS instances must have at least one securitygroup");
    }
    set_instance_groups(ctx, &instance, groups)
}

// ============================================================================
// Checks
// ============================================================================

const INSTANCE_STATES: &[&str] = &[
    "pending",
    "running",
    "shutting-down",
    "terminated",
    "stopping",
    "stopped",
    NOT_FOUND,
];

const VOLUME_STATES: &[&str] = &["available", "in-use", NOT_FOUND];

/// Map "not found" provider errors to the `not-found` state.
fn observed(res: Result<String, DriverError>) -> Result<String, DriverError> {
    match res {
        Err(DriverError::Provider(e)) if e.is_not_found() => Ok(NOT_FOUND.to_string()),
        other => other,
    }
}

fn instance_state(ctx: &Ctx<'_>, id: &str) -> Result<String, DriverError> {
    let mut input = Record::new(&DESCRIBE_INSTANCES);
    input.put("InstanceIds", Value::List(vec![id.to_string()]), K::StrSlice)?;
    let resp = ctx.call("ec2", "DescribeInstances", &input)?;
    Ok(json_str(&resp, "Reservations[0].Instances[0].State.Name")
        .unwrap_or(NOT_FOUND)
        .to_string())
}

fn volume_state(ctx: &Ctx<'_>, id: &str) -> Result<String, DriverError> {
    let mut input = Record::new(&DESCRIBE_VOLUMES);
    input.put("VolumeIds", Value::List(vec![id.to_string()]), K::StrSlice)?;
    let resp = ctx.call("ec2", "DescribeVolumes", &input)?;
    let state = resp
        .get("Volumes")
        .and_then(|v| v.as_array())
        .and_then(|vols| vols.iter().find(|v| json_str(v, "VolumeId") == Some(id)))
        .and_then(|v| json_str(v, "State"));
    Ok(state.unwrap_or(NOT_FOUND).to_string())
}

fn check_instance(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    await_state(ctx, params, INSTANCE_STATES, |id| observed(instance_state(ctx, id)))
}

fn check_volume(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    await_state(ctx, params, VOLUME_STATES, |id| observed(volume_state(ctx, id)))
}

fn check_securitygroup(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    await_state(ctx, params, &["unused"], |id| {
        let mut input = Record::new(&DESCRIBE_INTERFACES);
        input.put("Filters[0]Name", "group-id", K::SliceStruct)?;
        input.put("Filters[0]Values", Value::List(vec![id.to_string()]), K::StrSlice)?;
        let resp = ctx.call("ec2", "DescribeNetworkInterfaces", &input)?;
        let used = string_list(&resp, "NetworkInterfaces", "NetworkInterfaceId");
        if used.is_empty() {
            Ok("unused".to_string())
        } else {
            Ok(format!("used by {}", used.join(", ")))
        }
    })
}

/// `field` of every object in the array at `list`.
fn string_list(doc: &serde_json::Value, list: &str, field: &str) -> Vec<String> {
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
// Keypairs and images
// ============================================================================

fn create_keypair(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["name"])?;
    let name = param_str(params, "name")?;
    let path = keypair::private_key_path(ctx.settings.keys_dir.as_deref(), &name)?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    ctx.logger.info(&format!(
        "Generating locally {} RSA at {}",
        keypair::KEY_BITS,
        path.display()
    ));
    let pair = keypair::generate(keypair::KEY_BITS)?;
    keypair::write_private_key(&path, &pair.private_pem)?;

    let mut input = Record::new(&IMPORT_KEY_PAIR);
    input.put("KeyName", name.as_str(), K::Str)?;
    input.put_bytes("PublicKeyMaterial", pair.public_ssh.into_bytes())?;
    ctx.call("ec2", "ImportKeyPair", &input)?;
    Ok(Some(Value::Str(name)))
}

fn image_snapshots(ctx: &Ctx<'_>, image: &str) -> Result<Vec<String>, DriverError> {
    let mut input = Record::new(&DESCRIBE_IMAGES);
    input.put("ImageIds", Value::List(vec![image.to_string()]), K::StrSlice)?;
    let resp = ctx.call("ec2", "DescribeImages", &input)?;
    let mappings = json_path(&resp, "Images[0].BlockDeviceMappings")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    Ok(mappings
        .iter()
        .filter_map(|m| json_str(m, "Ebs.SnapshotId"))
        .map(str::to_string)
        .collect())
}

fn delete_image(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["id"])?;
    let id = param_str(params, "id")?;
    let snapshots = if param_bool(params, "delete-snapshots")? {
        image_snapshots(ctx, &id)?
    } else {
        Vec::new()
    };
    let mut input = Record::new(&IMAGE_ID);
    input.put("ImageId", id.as_str(), K::Str)?;

    if ctx.dry_run {
        if !snapshots.is_empty() {
            ctx.logger.info(&format!(
                "deleting image will also delete snapshot {}",
                snapshots.join(", ")
            ));
        }
        send(ctx, "ec2", "DeregisterImage", input)?;
        ctx.logger.verbose(&format!("dry run: {} ok", ctx.command()));
        return Ok(Some(Value::Str(fake_dry_run_id(ctx.entity))));
    }

    ctx.call("ec2", "DeregisterImage", &input)?;
    for snapshot in snapshots {
        let mut del = Record::new(&SNAPSHOT_ID);
        del.put("SnapshotId", snapshot.as_str(), K::Str)?;
        ctx.call("ec2", "DeleteSnapshot", &del)?;
        ctx.logger.info(&format!("deleted snapshot {}", snapshot));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::Level;
    use crate::core::types::{params, Action};
    use crate::driver::testing::Harness;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cs040_create_vpc_dry_run_and_live_tagging() {
        let h = Harness::new();
        let p = params([("cidr", Value::str("10.0.0.0/16")), ("name", Value::str("prod"))]);

        let dry = h.dry(Action::Create, "vpc", &p).unwrap().unwrap();
        assert!(dry.to_string().starts_with("vpc-"));
        assert!(h.sim.calls_to("CreateTags").is_empty());

        let id = h.live(Action::Create, "vpc", &p).unwrap().unwrap().to_string();
        assert!(id.starts_with("vpc-"));
        let tags = h.sim.calls_to("CreateTags");
        assert_eq!(tags.len(), 1);
        assert_eq!(
            tags[0].input,
            json!({"Resources": [id], "Tags": [{"Key": "Name", "Value": "prod"}]})
        );
    }

    #[test]
    fn test_cs040_create_public_subnet() {
        let h = Harness::new();
        let p = params([
            ("cidr", Value::str("10.0.1.0/24")),
            ("vpc", Value::str("vpc-1")),
            ("public", Value::Bool(true)),
        ]);
        let id = h.live(Action::Create, "subnet", &p).unwrap().unwrap().to_string();
        let modify = h.sim.calls_to("ModifySubnetAttribute");
        assert_eq!(modify.len(), 1);
        assert_eq!(
            modify[0].input,
            json!({"SubnetId": id, "MapPublicIpOnLaunch": {"Value": true}})
        );
        assert!(h.sim.calls_to("CreateTags").is_empty());
    }

    #[test]
    fn test_cs040_create_instance_binding() {
        let h = Harness::new();
        let p = params([
            ("image", Value::str("ami-1")),
            ("count", Value::Int(2)),
            ("type", Value::str("t2.micro")),
            ("subnet", Value::str("subnet-1")),
            ("name", Value::str("web")),
            ("securitygroup", Value::List(vec!["sg-1".into(), "sg-2".into()])),
            ("role", Value::str("reader")),
            ("userdata", Value::str("#echo hi")),
        ]);
        let id = h.live(Action::Create, "instance", &p).unwrap().unwrap();
        assert!(id.to_string().starts_with("i-"));
        let run = &h.sim.calls_to("RunInstances")[0];
        assert_eq!(run.input["MinCount"], json!(2));
        assert_eq!(run.input["MaxCount"], json!(2));
        assert_eq!(run.input["SecurityGroupIds"], json!(["sg-1", "sg-2"]));
        assert_eq!(run.input["IamInstanceProfile"], json!({"Name": "reader"}));
        assert_eq!(run.input["UserData"], json!("I2VjaG8gaGk="));
        assert!(run.input.get("DryRun").is_none());
    }

    #[test]
    fn test_cs040_create_instance_requires_name() {
        let h = Harness::new();
        let p = params([
            ("image", Value::str("ami-1")),
            ("count", Value::Int(1)),
            ("type", Value::str("t2.micro")),
            ("subnet", Value::str("subnet-1")),
        ]);
        let err = h.dry(Action::Create, "instance", &p).unwrap_err();
        assert_eq!(err.to_string(), "missing required params 'name'");
        assert!(h.sim.calls().is_empty());
    }

    #[test]
    fn test_cs040_authorize_ingress_port_range() {
        let h = Harness::new();
        let p = params([
            ("id", Value::str("sg-1")),
            ("inbound", Value::str("authorize")),
            ("cidr", Value::str("0.0.0.0/0")),
            ("protocol", Value::str("tcp")),
            ("portrange", Value::str("22-23")),
        ]);
        assert_eq!(h.live(Action::Update, "securitygroup", &p).unwrap(), None);
        let calls = h.sim.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, "AuthorizeSecurityGroupIngress");
        assert_eq!(
            calls[0].input,
            json!({
                "GroupId": "sg-1",
                "IpPermissions": [{
                    "IpProtocol": "tcp",
                    "FromPort": 22,
                    "ToPort": 23,
                    "IpRanges": [{"CidrIp": "0.0.0.0/0"}]
                }]
            })
        );
    }

    #[test]
    fn test_cs040_revoke_egress_any_protocol() {
        let h = Harness::new();
        let p = params([
            ("id", Value::str("sg-1")),
            ("outbound", Value::str("revoke")),
            ("cidr", Value::str("10.0.0.0/8")),
            ("protocol", Value::str("any")),
        ]);
        h.live(Action::Update, "securitygroup", &p).unwrap();
        let call = &h.sim.calls_to("RevokeSecurityGroupEgress")[0];
        assert_eq!(call.input["IpPermissions"][0]["IpProtocol"], json!("-1"));
        assert_eq!(call.input["IpPermissions"][0]["FromPort"], json!(-1));
    }

    #[test]
    fn test_cs040_update_securitygroup_validation() {
        let h = Harness::new();
        let base = [
            ("id", Value::str("sg-1")),
            ("cidr", Value::str("0.0.0.0/0")),
            ("protocol", Value::str("tcp")),
        ];
        let err = h.live(Action::Update, "securitygroup", &params(base.clone())).unwrap_err();
        assert_eq!(err.to_string(), "expect either 'inbound' or 'outbound' parameter");

        let mut p = params(base.clone());
        p.insert("inbound".into(), Value::str("allow"));
        let err = h.live(Action::Update, "securitygroup", &p).unwrap_err();
        assert!(matches!(err, DriverError::InvalidParamType { ref key, .. } if key == "inbound"));

        let mut p = params(base);
        p.insert("inbound".into(), Value::str("authorize"));
        let err = h.live(Action::Update, "securitygroup", &p).unwrap_err();
        assert_eq!(err.to_string(), "missing 'portrange' when protocol is TCP/UDP");
        assert!(h.sim.calls().is_empty());
    }

    #[test]
    fn test_cs040_port_range_forms() {
        assert_eq!(port_range("any", "tcp").unwrap(), (0, 65535));
        assert_eq!(port_range("any", "icmp").unwrap(), (-1, -1));
        assert_eq!(port_range("80", "tcp").unwrap(), (80, 80));
        assert_eq!(port_range("8000-8080", "udp").unwrap(), (8000, 8080));
        assert!(port_range("http", "tcp").is_err());
    }

    #[test]
    fn test_cs040_update_securitygroup_dry_run_sends_flag() {
        let h = Harness::new();
        let p = params([
            ("id", Value::str("sg-1")),
            ("inbound", Value::str("authorize")),
            ("cidr", Value::str("0.0.0.0/0")),
            ("protocol", Value::str("tcp")),
            ("portrange", Value::Int(443)),
        ]);
        assert_eq!(h.dry(Action::Update, "securitygroup", &p).unwrap(), None);
        assert_eq!(h.sim.calls()[0].input["DryRun"], json!(true));
    }

    #[test]
    fn test_cs040_check_instance_retries_until_running() {
        let h = Harness::new();
        let polls = AtomicUsize::new(0);
        h.sim.handle("ec2", "DescribeInstances", move |_| {
            let n = polls.fetch_add(1, Ordering::SeqCst);
            let state = if n < 3 { "pending" } else { "running" };
            Ok(json!({"Reservations": [{"Instances": [{"State": {"Name": state}}]}]}))
        });
        let p = params([
            ("id", Value::str("i-abc")),
            ("state", Value::str("running")),
            ("timeout", Value::Int(60)),
        ]);
        assert_eq!(h.live(Action::Check, "instance", &p).unwrap(), None);
        let info = h.sink.at(Level::Info);
        assert_eq!(info.len(), 3);
        assert!(info
            .iter()
            .all(|l| l.contains("observed pending, expected running")));
        assert_eq!(h.sim.calls_to("DescribeInstances").len(), 4);
    }

    #[test]
    fn test_cs040_check_instance_not_found() {
        let h = Harness::new();
        h.sim
            .fail("ec2", "DescribeInstances", "InvalidInstanceID.NotFound", "gone");
        let p = params([
            ("id", Value::str("i-abc")),
            ("state", Value::str("not-found")),
            ("timeout", Value::Int(5)),
        ]);
        h.live(Action::Check, "instance", &p).unwrap();
    }

    #[test]
    fn test_cs040_check_rejects_unknown_state() {
        let h = Harness::new();
        let p = params([
            ("id", Value::str("sg-1")),
            ("state", Value::str("used")),
            ("timeout", Value::Int(5)),
        ]);
        let err = h.dry(Action::Check, "securitygroup", &p).unwrap_err();
        assert!(matches!(err, DriverError::InvalidParamType { ref key, .. } if key == "state"));
        let ok = params([
            ("id", Value::str("sg-1")),
            ("state", Value::str("unused")),
            ("timeout", Value::Int(5)),
        ]);
        assert_eq!(h.dry(Action::Check, "securitygroup", &ok).unwrap(), None);
        assert!(h.sim.calls().is_empty());
    }

    #[test]
    fn test_cs040_check_securitygroup_unused() {
        let h = Harness::new();
        h.sim.respond(
            "ec2",
            "DescribeNetworkInterfaces",
            json!({"NetworkInterfaces": [{"NetworkInterfaceId": "eni-1"}]}),
        );
        let p = params([
            ("id", Value::str("sg-1")),
            ("state", Value::str("unused")),
            ("timeout", Value::Int(5)),
        ]);
        h.live(Action::Check, "securitygroup", &p).unwrap();
        let calls = h.sim.calls_to("DescribeNetworkInterfaces");
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].input,
            json!({"Filters": [{"Name": "group-id", "Values": ["sg-1"]}]})
        );
        assert!(h.sink.at(Level::Info)[0].contains("observed used by eni-1"));
    }

    #[test]
    fn test_cs040_attach_and_detach_securitygroup() {
        let h = Harness::new();
        h.sim.respond(
            "ec2",
            "DescribeInstanceAttribute",
            json!({"Groups": [{"GroupId": "sg-1"}]}),
        );
        let p = params([("id", Value::str("sg-2")), ("instance", Value::str("i-1"))]);
        h.live(Action::Attach, "securitygroup", &p).unwrap();
        let modify = h.sim.calls_to("ModifyInstanceAttribute");
        assert_eq!(modify[0].input, json!({"InstanceId": "i-1", "Groups": ["sg-1", "sg-2"]}));

        h.sim.respond(
            "ec2",
            "DescribeInstanceAttribute",
            json!({"Groups": [{"GroupId": "sg-1"}, {"GroupId": "sg-2"}]}),
        );
        h.live(Action::Detach, "securitygroup", &p).unwrap();
        let modify = h.sim.calls_to("ModifyInstanceAttribute");
        assert_eq!(modify[1].input["Groups"], json!(["sg-1"]));
    }

    #[test]
    fn test_cs040_delete_image_cascades_to_snapshots() {
        let h = Harness::new();
        h.sim.respond(
            "ec2",
            "DescribeImages",
            json!({"Images": [{"BlockDeviceMappings": [
                {"Ebs": {"SnapshotId": "snap-1"}},
                {"DeviceName": "/dev/sdb"},
                {"Ebs": {"SnapshotId": "snap-2"}}
            ]}]}),
        );
        let p = params([("id", Value::str("ami-1")), ("delete-snapshots", Value::Bool(true))]);
        assert_eq!(h.live(Action::Delete, "image", &p).unwrap(), None);
        let ops: Vec<String> = h.sim.calls().into_iter().map(|c| c.operation).collect();
        assert_eq!(
            ops,
            vec!["DescribeImages", "DeregisterImage", "DeleteSnapshot", "DeleteSnapshot"]
        );
        assert_eq!(h.sim.calls_to("DeleteSnapshot")[1].input["SnapshotId"], json!("snap-2"));
    }

    #[test]
    fn test_cs040_delete_image_without_snapshots() {
        let h = Harness::new();
        let p = params([("id", Value::str("ami-1"))]);
        let dry = h.dry(Action::Delete, "image", &p).unwrap().unwrap();
        assert!(dry.to_string().starts_with("dryrunid-"));
        h.live(Action::Delete, "image", &p).unwrap();
        assert!(h.sim.calls_to("DescribeImages").is_empty());
        assert!(h.sim.calls_to("DeleteSnapshot").is_empty());
    }

    #[test]
    fn test_cs040_create_keypair_checks_directory() {
        let mut h = Harness::new();
        let p = params([("name", Value::str("deploy"))]);
        let err = h.dry(Action::Create, "keypair", &p).unwrap_err();
        assert!(err.to_string().starts_with("empty env var"));

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deploy.pem"), "old").unwrap();
        h.settings.keys_dir = Some(dir.path().to_path_buf());
        let err = h.dry(Action::Create, "keypair", &p).unwrap_err();
        assert!(err.to_string().starts_with("file already exists at path"));

        let fresh = params([("name", Value::str("other"))]);
        assert!(h.dry(Action::Create, "keypair", &fresh).unwrap().is_some());
        assert!(!dir.path().join("other.pem").exists());
        assert!(h.sim.calls().is_empty());
    }

    #[test]
    fn test_cs040_create_keypair_live() {
        let mut h = Harness::new();
        let dir = tempfile::tempdir().unwrap();
        h.settings.keys_dir = Some(dir.path().to_path_buf());
        let p = params([("name", Value::str("deploy"))]);
        let out = h.live(Action::Create, "keypair", &p).unwrap();
        assert_eq!(out, Some(Value::str("deploy")));
        let pem = std::fs::read_to_string(dir.path().join("deploy.pem")).unwrap();
        assert!(pem.contains("PRIVATE KEY"));

        let import = &h.sim.calls_to("ImportKeyPair")[0];
        assert_eq!(import.input["KeyName"], json!("deploy"));
        use base64::Engine;
        let material = base64::engine::general_purpose::STANDARD
            .decode(import.input["PublicKeyMaterial"].as_str().unwrap())
            .unwrap();
        assert!(String::from_utf8(material).unwrap().starts_with("ssh-rsa "));
        assert!(h.sink.at(Level::Info)[0].starts_with("Generating locally 4096 RSA at "));
    }

    #[test]
    fn test_cs040_import_image_nested_paths() {
        let h = Harness::new();
        let p = params([
            ("bucket", Value::str("images")),
            ("s3object", Value::str("disk.vmdk")),
            ("description", Value::str("imported")),
        ]);
        let id = h.live(Action::Import, "image", &p).unwrap().unwrap();
        assert!(id.to_string().starts_with("import-ami-"));
        let call = &h.sim.calls_to("ImportImage")[0];
        assert_eq!(
            call.input["DiskContainers"],
            json!([{"UserBucket": {"S3Bucket": "images", "S3Key": "disk.vmdk"}}])
        );
    }

    #[test]
    fn test_cs040_start_instance_echoes_id() {
        let h = Harness::new();
        let p = params([("id", Value::str("i-9"))]);
        assert_eq!(h.live(Action::Start, "instance", &p).unwrap(), Some(Value::str("i-9")));
        assert_eq!(h.sim.calls()[0].input, json!({"InstanceIds": ["i-9"]}));
    }
}
