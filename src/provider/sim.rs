//! In-memory provider used by tests and `run --simulate`.
//!
//! Records every call, honours `DryRun=true` with `DryRunOperation`, mints
//! identifiers for create operations and serves scripted responses.

use super::{CloudApi, ProviderError, ReadSeek};
use crate::binder::Record;
use serde_json::{json, Value as Json};
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct SimCall {
    pub service: String,
    pub operation: String,
    pub input: Json,
    pub body: Option<Vec<u8>>,
}

/// Outcome served for one call.
pub type Reply = Result<Json, ProviderError>;
type Handler = Box<dyn Fn(&Json) -> Reply + Send + Sync>;

/// Identifier minted per create operation: response path and id prefix.
static MINTS: &[(&str, &str, &str, &str)] = &[
    ("ec2", "CreateVpc", "Vpc.VpcId", "vpc-"),
    ("ec2", "CreateSubnet", "Subnet.SubnetId", "subnet-"),
    ("ec2", "RunInstances", "Instances[0].InstanceId", "i-"),
    ("ec2", "CreateSecurityGroup", "GroupId", "sg-"),
    ("ec2", "CreateVolume", "VolumeId", "vol-"),
    ("ec2", "CreateSnapshot", "SnapshotId", "snap-"),
    ("ec2", "CopySnapshot", "SnapshotId", "snap-"),
    ("ec2", "CreateInternetGateway", "InternetGateway.InternetGatewayId", "igw-"),
    ("ec2", "CreateRouteTable", "RouteTable.RouteTableId", "rtb-"),
    ("ec2", "AssociateRouteTable", "AssociationId", "rtbassoc-"),
    ("ec2", "AllocateAddress", "AllocationId", "eipalloc-"),
    ("ec2", "AssociateAddress", "AssociationId", "eipassoc-"),
    ("ec2", "CopyImage", "ImageId", "ami-"),
    ("ec2", "ImportImage", "ImportTaskId", "import-ami-"),
    ("elbv2", "CreateLoadBalancer", "LoadBalancers[0].LoadBalancerArn", "arn:aws:elasticloadbalancing:us-east-1:000000000000:loadbalancer/app/"),
    ("elbv2", "CreateListener", "Listeners[0].ListenerArn", "arn:aws:elasticloadbalancing:us-east-1:000000000000:listener/app/"),
    ("elbv2", "CreateTargetGroup", "TargetGroups[0].TargetGroupArn", "arn:aws:elasticloadbalancing:us-east-1:000000000000:targetgroup/"),
    ("iam", "CreateUser", "User.UserId", "AIDA"),
    ("iam", "CreateGroup", "Group.GroupId", "AGPA"),
    ("iam", "CreateRole", "Role.Arn", "arn:aws:iam::000000000000:role/"),
    ("iam", "CreateInstanceProfile", "InstanceProfile.InstanceProfileId", "AIPA"),
    ("iam", "CreatePolicy", "Policy.Arn", "arn:aws:iam::000000000000:policy/"),
    ("iam", "CreatePolicyVersion", "PolicyVersion.VersionId", "v"),
    ("sns", "CreateTopic", "TopicArn", "arn:aws:sns:us-east-1:000000000000:"),
    ("sns", "Subscribe", "SubscriptionArn", "arn:aws:sns:us-east-1:000000000000:sub-"),
    ("sqs", "CreateQueue", "QueueUrl", "https://sqs.us-east-1.amazonaws.com/000000000000/"),
    ("route53", "CreateHostedZone", "HostedZone.Id", "/hostedzone/"),
    ("route53", "ChangeResourceRecordSets", "ChangeInfo.Id", "/change/"),
    ("lambda", "CreateFunction", "FunctionArn", "arn:aws:lambda:us-east-1:000000000000:function:"),
    ("autoscaling", "PutScalingPolicy", "PolicyARN", "arn:aws:autoscaling:us-east-1:000000000000:scalingPolicy:"),
    ("ecs", "CreateCluster", "Cluster.ClusterArn", "arn:aws:ecs:us-east-1:000000000000:cluster/"),
    ("ecs", "RegisterTaskDefinition", "TaskDefinition.TaskDefinitionArn", "arn:aws:ecs:us-east-1:000000000000:task-definition/"),
    ("ecr", "CreateRepository", "repository.repositoryArn", "arn:aws:ecr:us-east-1:000000000000:repository/"),
    ("rds", "CreateDBInstance", "DBInstance.DBInstanceIdentifier", "db-"),
    ("cloudformation", "CreateStack", "StackId", "arn:aws:cloudformation:us-east-1:000000000000:stack/"),
    ("cloudformation", "UpdateStack", "StackId", "arn:aws:cloudformation:us-east-1:000000000000:stack/"),
];

/// Simulated cloud.
#[derive(Default)]
pub struct SimCloud {
    calls: Mutex<Vec<SimCall>>,
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    handlers: Mutex<HashMap<String, Handler>>,
    counter: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn key(service: &str, operation: &str) -> String {
    format!("{}.{}", service, operation)
}

/// Build the nested document holding `leaf` at `path`.
fn nest(path: &str, leaf: Json) -> Json {
    let mut tokens: Vec<Option<&str>> = Vec::new();
    for segment in path.split('.') {
        match segment.split_once("[0]") {
            Some((name, rest)) => {
                tokens.push(Some(name));
                tokens.push(None);
                if !rest.is_empty() {
                    tokens.push(Some(rest));
                }
            }
            None => tokens.push(Some(segment)),
        }
    }
    tokens.into_iter().rev().fold(leaf, |acc, t| match t {
        Some(name) => {
            let mut map = serde_json::Map::new();
            map.insert(name.to_string(), acc);
            Json::Object(map)
        }
        None => Json::Array(vec![acc]),
    })
}

impl SimCloud {
    pub fn new() -> Self {
        SimCloud::default()
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<SimCall> {
        lock(&self.calls).clone()
    }

    /// Calls to one operation.
    pub fn calls_to(&self, operation: &str) -> Vec<SimCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation == operation)
            .cloned()
            .collect()
    }

    /// Queue a response for the next call to `service.operation`.
    pub fn respond(&self, service: &str, operation: &str, response: Json) {
        lock(&self.replies)
            .entry(key(service, operation))
            .or_default()
            .push_back(Ok(response));
    }

    /// Queue an error for the next call to `service.operation`.
    pub fn fail(&self, service: &str, operation: &str, code: &str, message: &str) {
        lock(&self.replies)
            .entry(key(service, operation))
            .or_default()
            .push_back(Err(ProviderError::new(code, message)));
    }

    /// Serve every call to `service.operation` from `handler`. Queued
    /// responses still take precedence.
    pub fn handle<F>(&self, service: &str, operation: &str, handler: F)
    where
        F: Fn(&Json) -> Reply + Send + Sync + 'static,
    {
        lock(&self.handlers).insert(key(service, operation), Box::new(handler));
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn mint(&self, service: &str, operation: &str) -> Json {
        let n = self.next_id();
        let mut doc = match MINTS
            .iter()
            .find(|(s, o, _, _)| *s == service && *o == operation)
        {
            Some((_, _, path, prefix)) => nest(path, json!(format!("{}{:08x}", prefix, n))),
            None => json!({}),
        };
        if service == "iam" && operation == "CreateAccessKey" {
            doc = json!({
                "AccessKey": {
                    "AccessKeyId": format!("AKIA{:016X}", n),
                    "SecretAccessKey": format!("{:040x}", u128::from(n) * 0x9e37_79b9_7f4a_7c15),
                    "Status": "Active",
                }
            });
        }
        doc
    }

    fn reply(&self, service: &str, operation: &str, input: &Json) -> Reply {
        let k = key(service, operation);
        if let Some(reply) = lock(&self.replies).get_mut(&k).and_then(|q| q.pop_front()) {
            return reply;
        }
        if input.get("DryRun") == Some(&json!(true)) {
            return Err(ProviderError::new(
                "DryRunOperation",
                "Request would have succeeded, but DryRun flag is set.",
            ));
        }
        if let Some(handler) = lock(&self.handlers).get(&k) {
            return handler(input);
        }
        Ok(self.mint(service, operation))
    }

    fn record(&self, service: &str, operation: &str, input: Json, body: Option<Vec<u8>>) {
        lock(&self.calls).push(SimCall {
            service: service.to_string(),
            operation: operation.to_string(),
            input,
            body,
        });
    }
}

impl CloudApi for SimCloud {
    fn call(&self, service: &str, operation: &str, input: &Record) -> Result<Json, ProviderError> {
        let doc = input.to_json();
        let reply = self.reply(service, operation, &doc);
        self.record(service, operation, doc, None);
        reply
    }

    /// Reads the body twice, like an SDK that signs the payload before sending.
    fn upload(
        &self,
        service: &str,
        operation: &str,
        input: &Record,
        body: &mut dyn ReadSeek,
    ) -> Result<Json, ProviderError> {
        let io = |e: std::io::Error| ProviderError::new("ReadError", &e.to_string());
        let mut signed = Vec::new();
        body.read_to_end(&mut signed).map_err(io)?;
        body.seek(SeekFrom::Start(0)).map_err(io)?;
        let mut sent = Vec::new();
        body.read_to_end(&mut sent).map_err(io)?;
        let doc = input.to_json();
        let reply = self.reply(service, operation, &doc);
        self.record(service, operation, doc, Some(sent));
        reply
    }
}
