//! CS-006: Template definitions registry.
//!
//! One static entry per (action, entity): the owning API, the required
//! parameter keys and the optional ("extra") keys. The parser checks entity
//! names against it, the engine validates scripts with it and the CLI uses it
//! to prompt for holes and print help.

use super::types::Action;
use std::collections::BTreeMap;

/// Static metadata for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub action: Action,
    pub entity: &'static str,
    pub api: &'static str,
    pub required: &'static [&'static str],
    pub extras: &'static [&'static str],
}

impl Definition {
    /// Registry key: action and entity concatenated.
    pub fn key(&self) -> String {
        format!("{}{}", self.action.as_str(), self.entity)
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.action, self.entity)
    }

    pub fn is_known_key(&self, key: &str) -> bool {
        self.required.contains(&key) || self.extras.contains(&key)
    }
}

const fn def(
    action: Action,
    entity: &'static str,
    api: &'static str,
    required: &'static [&'static str],
    extras: &'static [&'static str],
) -> Definition {
    Definition {
        action,
        entity,
        api,
        required,
        extras,
    }
}

use Action::*;

const CHECK: &[&str] = &["id", "state", "timeout"];

static DEFINITIONS: &[Definition] = &[
    // ===== ec2 =====
    def(Create, "vpc", "ec2", &["cidr"], &["name"]),
    def(Delete, "vpc", "ec2", &["id"], &[]),
    def(Create, "subnet", "ec2", &["cidr", "vpc"], &["availabilityzone", "name", "public"]),
    def(Update, "subnet", "ec2", &["id"], &["public"]),
    def(Delete, "subnet", "ec2", &["id"], &[]),
    def(
        Create,
        "instance",
        "ec2",
        &["image", "count", "type", "subnet", "name"],
        &["keypair", "ip", "userdata", "securitygroup", "lock", "role"],
    ),
    def(Update, "instance", "ec2", &["id"], &["type", "lock"]),
    def(Delete, "instance", "ec2", &["id"], &[]),
    def(Start, "instance", "ec2", &["id"], &[]),
    def(Stop, "instance", "ec2", &["id"], &[]),
    def(Check, "instance", "ec2", CHECK, &[]),
    def(Create, "securitygroup", "ec2", &["name", "vpc", "description"], &[]),
    def(
        Update,
        "securitygroup",
        "ec2",
        &["id", "cidr", "protocol"],
        &["inbound", "outbound", "portrange"],
    ),
    def(Delete, "securitygroup", "ec2", &["id"], &[]),
    def(Check, "securitygroup", "ec2", CHECK, &[]),
    def(Attach, "securitygroup", "ec2", &["id", "instance"], &[]),
    def(Detach, "securitygroup", "ec2", &["id", "instance"], &[]),
    def(Create, "volume", "ec2", &["availabilityzone", "size"], &[]),
    def(Check, "volume", "ec2", CHECK, &[]),
    def(Delete, "volume", "ec2", &["id"], &[]),
    def(Attach, "volume", "ec2", &["device", "id", "instance"], &[]),
    def(Detach, "volume", "ec2", &["device", "id", "instance"], &["force"]),
    def(Create, "snapshot", "ec2", &["volume"], &["description"]),
    def(Delete, "snapshot", "ec2", &["id"], &[]),
    def(Copy, "snapshot", "ec2", &["source-id", "source-region"], &["encrypted", "description"]),
    def(Create, "internetgateway", "ec2", &[], &[]),
    def(Delete, "internetgateway", "ec2", &["id"], &[]),
    def(Attach, "internetgateway", "ec2", &["id", "vpc"], &[]),
    def(Detach, "internetgateway", "ec2", &["id", "vpc"], &[]),
    def(Create, "routetable", "ec2", &["vpc"], &[]),
    def(Delete, "routetable", "ec2", &["id"], &[]),
    def(Attach, "routetable", "ec2", &["id", "subnet"], &[]),
    def(Detach, "routetable", "ec2", &["association"], &[]),
    def(Create, "route", "ec2", &["table", "cidr", "gateway"], &[]),
    def(Delete, "route", "ec2", &["table", "cidr"], &[]),
    def(Create, "tag", "ec2", &["resource", "key", "value"], &[]),
    def(Delete, "tag", "ec2", &["resource", "key", "value"], &[]),
    def(Create, "keypair", "ec2", &["name"], &[]),
    def(Delete, "keypair", "ec2", &["id"], &[]),
    def(Create, "elasticip", "ec2", &["domain"], &[]),
    def(Delete, "elasticip", "ec2", &["id"], &["ip"]),
    def(Attach, "elasticip", "ec2", &["id", "instance"], &["allow-reassociation"]),
    def(Detach, "elasticip", "ec2", &["association"], &[]),
    def(Copy, "image", "ec2", &["name", "source-id", "source-region"], &["encrypted", "description"]),
    def(
        Import,
        "image",
        "ec2",
        &[],
        &["architecture", "description", "license", "platform", "role", "snapshot", "url", "bucket", "s3object"],
    ),
    def(Delete, "image", "ec2", &["id"], &["delete-snapshots"]),
    // ===== elbv2 =====
    def(
        Create,
        "loadbalancer",
        "elbv2",
        &["name", "subnets"],
        &["iptype", "scheme", "securitygroups", "type"],
    ),
    def(Delete, "loadbalancer", "elbv2", &["id"], &[]),
    def(Check, "loadbalancer", "elbv2", CHECK, &[]),
    def(
        Create,
        "listener",
        "elbv2",
        &["actiontype", "target", "loadbalancer", "port", "protocol"],
        &["certificate", "sslpolicy"],
    ),
    def(Delete, "listener", "elbv2", &["id"], &[]),
    def(
        Create,
        "targetgroup",
        "elbv2",
        &["name", "port", "protocol", "vpc"],
        &[
            "healthcheckinterval",
            "healthcheckpath",
            "healthcheckport",
            "healthcheckprotocol",
            "healthchecktimeout",
            "healthythreshold",
            "unhealthythreshold",
            "matcher",
        ],
    ),
    def(Delete, "targetgroup", "elbv2", &["id"], &[]),
    def(Attach, "instance", "elbv2", &["targetgroup", "id"], &["port"]),
    def(Detach, "instance", "elbv2", &["targetgroup", "id"], &[]),
    // ===== iam =====
    def(Create, "user", "iam", &["name"], &[]),
    def(Delete, "user", "iam", &["name"], &[]),
    def(Attach, "user", "iam", &["group", "name"], &[]),
    def(Detach, "user", "iam", &["group", "name"], &[]),
    def(Create, "accesskey", "iam", &["user"], &["save"]),
    def(Delete, "accesskey", "iam", &["id"], &["user"]),
    def(Create, "group", "iam", &["name"], &[]),
    def(Delete, "group", "iam", &["name"], &[]),
    def(
        Create,
        "role",
        "iam",
        &["name"],
        &["principal-account", "principal-user", "principal-service", "conditions", "sleep-after"],
    ),
    def(Delete, "role", "iam", &["name"], &[]),
    def(Attach, "role", "iam", &["instanceprofile", "name"], &[]),
    def(Detach, "role", "iam", &["instanceprofile", "name"], &[]),
    def(Create, "instanceprofile", "iam", &["name"], &[]),
    def(Delete, "instanceprofile", "iam", &["name"], &[]),
    def(
        Create,
        "policy",
        "iam",
        &["name", "effect", "action", "resource"],
        &["description", "conditions"],
    ),
    def(Update, "policy", "iam", &["arn", "effect", "action", "resource"], &["conditions"]),
    def(Delete, "policy", "iam", &["arn"], &["all-versions"]),
    def(Attach, "policy", "iam", &[], &["arn", "service", "access", "user", "group", "role"]),
    def(Detach, "policy", "iam", &["arn"], &["user", "group", "role"]),
    def(Create, "loginprofile", "iam", &["username", "password"], &["password-reset"]),
    def(Update, "loginprofile", "iam", &["username", "password"], &["password-reset"]),
    def(Delete, "loginprofile", "iam", &["username"], &[]),
    // ===== s3 =====
    def(Create, "bucket", "s3", &["name"], &["acl"]),
    def(Delete, "bucket", "s3", &["name"], &[]),
    def(Create, "s3object", "s3", &["bucket", "file"], &["name", "acl"]),
    def(Delete, "s3object", "s3", &["bucket", "name"], &[]),
    // ===== sns =====
    def(Create, "topic", "sns", &["name"], &[]),
    def(Delete, "topic", "sns", &["id"], &[]),
    def(Create, "subscription", "sns", &["topic", "endpoint", "protocol"], &[]),
    def(Delete, "subscription", "sns", &["id"], &[]),
    // ===== sqs =====
    def(
        Create,
        "queue",
        "sqs",
        &["name"],
        &[
            "delay",
            "maxMsgSize",
            "retentionPeriod",
            "policy",
            "msgWait",
            "redrivePolicy",
            "visibilityTimeout",
        ],
    ),
    def(Delete, "queue", "sqs", &["url"], &[]),
    // ===== route53 =====
    def(
        Create,
        "zone",
        "route53",
        &["callerreference", "name"],
        &["delegationsetid", "comment", "isprivate", "vpcid", "vpcregion"],
    ),
    def(Delete, "zone", "route53", &["id"], &[]),
    def(Create, "record", "route53", &["zone", "name", "type", "value", "ttl"], &["comment"]),
    def(Delete, "record", "route53", &["zone", "name", "type", "value", "ttl"], &[]),
    // ===== lambda =====
    def(
        Create,
        "function",
        "lambda",
        &["name", "handler", "role", "runtime"],
        &["bucket", "object", "objectversion", "zipfile", "description", "memory", "publish", "timeout"],
    ),
    def(Delete, "function", "lambda", &["id"], &["version"]),
    // ===== autoscaling =====
    def(
        Create,
        "launchconfiguration",
        "autoscaling",
        &["image", "type", "name"],
        &["public", "keypair", "userdata", "securitygroups", "role", "spotprice"],
    ),
    def(Delete, "launchconfiguration", "autoscaling", &["name"], &[]),
    def(
        Create,
        "scalinggroup",
        "autoscaling",
        &["name", "launchconfiguration", "max-size", "min-size", "subnets"],
        &[
            "cooldown",
            "desired-capacity",
            "healthcheck-grace-period",
            "healthcheck-type",
            "new-instances-protected",
            "targetgroups",
        ],
    ),
    def(
        Update,
        "scalinggroup",
        "autoscaling",
        &["name"],
        &[
            "cooldown",
            "desired-capacity",
            "healthcheck-grace-period",
            "healthcheck-type",
            "launchconfiguration",
            "max-size",
            "min-size",
            "new-instances-protected",
            "subnets",
        ],
    ),
    def(Delete, "scalinggroup", "autoscaling", &["name"], &["force"]),
    def(Check, "scalinggroup", "autoscaling", &["name", "count", "timeout"], &[]),
    def(
        Create,
        "scalingpolicy",
        "autoscaling",
        &["adjustment-type", "scalinggroup", "name"],
        &["adjustment-scaling", "adjustment-magnitude", "cooldown", "policy-type", "step-adjustments"],
    ),
    def(Delete, "scalingpolicy", "autoscaling", &["id"], &[]),
    // ===== cloudwatch =====
    def(
        Create,
        "alarm",
        "cloudwatch",
        &[
            "name",
            "operator",
            "metric",
            "namespace",
            "evaluation-periods",
            "period",
            "statistic-function",
            "threshold",
        ],
        &[
            "enabled",
            "alarm-actions",
            "insufficientdata-actions",
            "ok-actions",
            "description",
            "dimensions",
            "unit",
        ],
    ),
    def(Delete, "alarm", "cloudwatch", &["name"], &[]),
    def(Start, "alarm", "cloudwatch", &["names"], &[]),
    def(Stop, "alarm", "cloudwatch", &["names"], &[]),
    def(Attach, "alarm", "cloudwatch", &["name", "action-arn"], &[]),
    def(Detach, "alarm", "cloudwatch", &["name", "action-arn"], &[]),
    // ===== ecs =====
    def(Create, "containercluster", "ecs", &["name"], &[]),
    def(Delete, "containercluster", "ecs", &["id"], &[]),
    def(
        Create,
        "containertask",
        "ecs",
        &["name", "image", "memory-hard-limit", "container-name"],
        &["command", "env", "privileged", "workdir", "ports"],
    ),
    def(Delete, "containertask", "ecs", &["name"], &[]),
    // ===== ecr =====
    def(Authenticate, "registry", "ecr", &[], &["accounts"]),
    def(Create, "repository", "ecr", &["name"], &[]),
    def(Delete, "repository", "ecr", &["name"], &["force"]),
    // ===== rds =====
    def(
        Create,
        "database",
        "rds",
        &["type", "id", "engine", "password", "username", "size"],
        &[
            "autoupgrade",
            "availabilityzone",
            "backupretention",
            "dbname",
            "port",
            "public",
            "encrypted",
            "storagetype",
            "subnetgroup",
            "vpcsecuritygroups",
            "multiaz",
        ],
    ),
    def(Delete, "database", "rds", &["id"], &["skip-snapshot", "snapshot"]),
    def(Check, "database", "rds", CHECK, &[]),
    // ===== cloudformation =====
    def(
        Create,
        "stack",
        "cloudformation",
        &["name", "template-file"],
        &[
            "capabilities",
            "disable-rollback",
            "notifications",
            "on-failure",
            "parameters",
            "resource-types",
            "role",
            "policy-file",
            "timeout",
        ],
    ),
    def(
        Update,
        "stack",
        "cloudformation",
        &["name"],
        &["template-file", "capabilities", "notifications", "parameters", "resource-types", "role", "policy-file"],
    ),
    def(Delete, "stack", "cloudformation", &["name"], &["retain-resources"]),
];

/// Every definition, in declaration order.
pub fn definitions() -> &'static [Definition] {
    DEFINITIONS
}

/// Look up the definition for (action, entity).
pub fn lookup(action: Action, entity: &str) -> Option<&'static Definition> {
    DEFINITIONS
        .iter()
        .find(|d| d.action == action && d.entity == entity)
}

/// Look up by registry key (`createvpc`).
pub fn by_key(key: &str) -> Option<&'static Definition> {
    DEFINITIONS.iter().find(|d| d.key() == key)
}

/// Whether any command uses `entity`.
pub fn is_entity(entity: &str) -> bool {
    DEFINITIONS.iter().any(|d| d.entity == entity)
}

/// Inverse map used by help output: action → sorted, deduplicated entities.
pub fn entities_by_action() -> BTreeMap<Action, Vec<&'static str>> {
    let mut map: BTreeMap<Action, Vec<&'static str>> = BTreeMap::new();
    for d in DEFINITIONS {
        map.entry(d.action).or_default().push(d.entity);
    }
    for entities in map.values_mut() {
        entities.sort_unstable();
        entities.dedup();
    }
    map
}

/// Definitions owned by one API.
pub fn by_api(api: &str) -> Vec<&'static Definition> {
    DEFINITIONS.iter().filter(|d| d.api == api).collect()
}
