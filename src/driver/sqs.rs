//! SQS queues. Optional settings travel in the `Attributes` map.

use super::call::{set, CallSpec, DryRunMode, Output};
use super::Command;
use crate::binder::{SetterKind as K, Shape, StructShape};
use crate::core::types::Action::*;

static CREATE_QUEUE: StructShape = StructShape::new(
    "CreateQueueInput",
    &[("QueueName", Shape::Str), ("Attributes", Shape::StrMap)],
);
static QUEUE_URL: StructShape = StructShape::new("DeleteQueueInput", &[("QueueUrl", Shape::Str)]);

static CREATE_QUEUE_CALL: CallSpec = CallSpec {
    service: "sqs",
    operation: "CreateQueue",
    input: &CREATE_QUEUE,
    required: &[set("name", "QueueName", K::Str)],
    extras: &[
        set("delay", "Attributes[DelaySeconds]", K::StrPointerMap),
        set("maxMsgSize", "Attributes[MaximumMessageSize]", K::StrPointerMap),
        set("retentionPeriod", "Attributes[MessageRetentionPeriod]", K::StrPointerMap),
        set("policy", "Attributes[Policy]", K::StrPointerMap),
        set("msgWait", "Attributes[ReceiveMessageWaitTimeSeconds]", K::StrPointerMap),
        set("redrivePolicy", "Attributes[RedrivePolicy]", K::StrPointerMap),
        set("visibilityTimeout", "Attributes[VisibilityTimeout]", K::StrPointerMap),
    ],
    output: Output::Path("QueueUrl"),
    dry_run: DryRunMode::Params,
};

static DELETE_QUEUE_CALL: CallSpec = CallSpec {
    service: "sqs",
    operation: "DeleteQueue",
    input: &QUEUE_URL,
    required: &[set("url", "QueueUrl", K::Str)],
    extras: &[],
    output: Output::Nothing,
    dry_run: DryRunMode::Params,
};

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "queue", &CREATE_QUEUE_CALL),
    Command::spec(Delete, "queue", &DELETE_QUEUE_CALL),
];

#[cfg(test)]
mod tests {
    use crate::core::types::{params, Action, Value};
    use crate::driver::testing::Harness;
    use serde_json::json;

    #[test]
    fn test_cs045_queue_attributes() {
        let h = Harness::new();
        let p = params([
            ("name", Value::str("jobs")),
            ("delay", Value::Int(5)),
            ("visibilityTimeout", Value::Int(60)),
        ]);
        let url = h.live(Action::Create, "queue", &p).unwrap().unwrap();
        assert!(url.to_string().starts_with("https://sqs."));
        assert_eq!(
            h.sim.calls()[0].input,
            json!({
                "QueueName": "jobs",
                "Attributes": {"DelaySeconds": "5", "VisibilityTimeout": "60"}
            })
        );
    }
}
