//! SNS topics and subscriptions.

use super::call::{self, set, CallSpec, DryRunMode, Output};
use super::Command;
use crate::binder::{SetterKind as K, Shape, StructShape};
use crate::core::types::Action::*;

static CREATE_TOPIC: StructShape = StructShape::new("CreateTopicInput", &[("Name", Shape::Str)]);
static TOPIC_ARN: StructShape = StructShape::new("DeleteTopicInput", &[("TopicArn", Shape::Str)]);
static SUBSCRIBE: StructShape = StructShape::new(
    "SubscribeInput",
    &[("TopicArn", Shape::Str), ("Endpoint", Shape::Str), ("Protocol", Shape::Str)],
);
static SUBSCRIPTION_ARN: StructShape =
    StructShape::new("UnsubscribeInput", &[("SubscriptionArn", Shape::Str)]);

const fn sns(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "sns",
        operation,
        input,
        required,
        extras: &[],
        output,
        dry_run: DryRunMode::Params,
    }
}

static CREATE_TOPIC_CALL: CallSpec = sns(
    "CreateTopic",
    &CREATE_TOPIC,
    &[set("name", "Name", K::Str)],
    Output::Path("TopicArn"),
);
static DELETE_TOPIC_CALL: CallSpec =
    sns("DeleteTopic", &TOPIC_ARN, &[set("id", "TopicArn", K::Str)], Output::Nothing);
static CREATE_SUBSCRIPTION_CALL: CallSpec = sns(
    "Subscribe",
    &SUBSCRIBE,
    &[
        set("topic", "TopicArn", K::Str),
        set("endpoint", "Endpoint", K::Str),
        set("protocol", "Protocol", K::Str),
    ],
    Output::Path("SubscriptionArn"),
);
static DELETE_SUBSCRIPTION_CALL: CallSpec = sns(
    "Unsubscribe",
    &SUBSCRIPTION_ARN,
    &[set("id", "SubscriptionArn", K::Str)],
    Output::Nothing,
);

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "topic", &CREATE_TOPIC_CALL),
    Command::spec(Delete, "topic", &DELETE_TOPIC_CALL),
    Command::spec(Create, "subscription", &CREATE_SUBSCRIPTION_CALL),
    Command::spec(Delete, "subscription", &DELETE_SUBSCRIPTION_CALL),
];
