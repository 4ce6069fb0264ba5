//! CS-030: Driver dispatch.
//!
//! A [`Driver`] maps an (action, entity) pair to a [`DriverCall`]. Every command
//! has one implementation parameterized by the driver's dry-run flag: in dry-run
//! mode it validates and, where the provider supports it, sends the request with
//! `DryRun=true`; in live mode it performs the mutation and extracts the new
//! resource identifier.

pub mod call;
pub mod checker;
pub mod credentials;
pub mod keypair;
pub mod policy;

pub mod autoscaling;
pub mod cloudformation;
pub mod cloudwatch;
pub mod ec2;
pub mod ecr;
pub mod ecs;
pub mod elbv2;
pub mod iam;
pub mod lambda;
pub mod rds;
pub mod route53;
pub mod s3;
pub mod sns;
pub mod sqs;

use crate::binder::{BindEnv, BindError, Record};
use crate::core::log::Logger;
use crate::core::registry;
use crate::core::settings::Settings;
use crate::core::types::{Action, Params, Value};
use crate::provider::{CloudApi, ProviderError};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("missing required params '{0}'")]
    MissingRequiredParam(String),

    #[error("invalid param '{key}' (expected {expected}): {reason}")]
    InvalidParamType {
        key: String,
        expected: String,
        reason: String,
    },

    #[error("unsupported command '{action} {entity}'")]
    UnsupportedCommand { action: Action, entity: String },

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("timeout of {timeout:?} expired while waiting for {description}")]
    Timeout {
        description: String,
        timeout: Duration,
    },

    #[error("fetching {url}: {cause}")]
    Fetch { url: String, cause: String },

    #[error("no existing AWS policy with service '{service}' and access '{access}'")]
    PolicyLookup { service: String, access: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    pub fn invalid(key: &str, expected: &str, reason: impl Into<String>) -> Self {
        DriverError::InvalidParamType {
            key: key.to_string(),
            expected: expected.to_string(),
            reason: reason.into(),
        }
    }
}

/// Outcome of one driver call: an identifier, an opaque result or nothing.
pub type CallResult = Result<Option<Value>, DriverError>;

// ============================================================================
// Contract
// ============================================================================

/// Callable returned by [`Driver::lookup`].
pub struct DriverCall<'a> {
    name: String,
    dry_run: bool,
    f: Box<dyn Fn(&Params) -> CallResult + 'a>,
}

impl<'a> DriverCall<'a> {
    pub fn new(name: String, dry_run: bool, f: Box<dyn Fn(&Params) -> CallResult + 'a>) -> Self {
        DriverCall { name, dry_run, f }
    }

    pub fn call(&self, params: &Params) -> CallResult {
        (self.f)(params)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// `create vpc`, or `dry run: create vpc` for the validating variant.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Per-service driver capability set.
pub trait Driver {
    fn set_dry_run(&mut self, dry_run: bool);
    fn set_logger(&mut self, logger: Logger);
    fn lookup(&self, action: Action, entity: &str) -> Result<DriverCall<'_>, DriverError>;
}

/// Execution context handed to every command implementation.
pub struct Ctx<'a> {
    pub api: &'a dyn CloudApi,
    pub logger: &'a Logger,
    pub settings: &'a Settings,
    pub dry_run: bool,
    pub action: Action,
    pub entity: &'a str,
}

impl Ctx<'_> {
    /// Invoke the provider and log the call duration at verbose level.
    pub fn call(
        &self,
        service: &str,
        operation: &str,
        input: &Record,
    ) -> Result<serde_json::Value, DriverError> {
        let start = Instant::now();
        let res = self.api.call(service, operation, input);
        self.logger
            .verbose(&format!("{}.{} took {:?}", service, operation, start.elapsed()));
        Ok(res?)
    }

    /// Stream `body` with `input`, logging the duration like [`Ctx::call`].
    pub fn upload(
        &self,
        service: &str,
        operation: &str,
        input: &Record,
        body: &mut dyn crate::provider::ReadSeek,
    ) -> Result<serde_json::Value, DriverError> {
        let start = Instant::now();
        let res = self.api.upload(service, operation, input, body);
        self.logger
            .verbose(&format!("{}.{} took {:?}", service, operation, start.elapsed()));
        Ok(res?)
    }

    /// Command label used in messages: `create vpc`.
    pub fn command(&self) -> String {
        format!("{} {}", self.action, self.entity)
    }

    pub fn bind_env<'e>(&'e self, data: Option<&'e Params>) -> BindEnv<'e> {
        BindEnv {
            http_timeout: Some(self.settings.http_timeout()),
            template_data: data,
            logger: Some(self.logger),
        }
    }

    /// Dry-run success for commands the provider cannot validate remotely.
    pub fn dry_run_ok(&self) -> CallResult {
        self.logger
            .verbose(&format!("params dry run: {} ok", self.command()));
        Ok(Some(Value::Str(fake_dry_run_id(self.entity))))
    }
}

/// Fail with `MissingRequiredParam` for the first absent key.
pub fn require(params: &Params, keys: &[&str]) -> Result<(), DriverError> {
    match keys.iter().find(|k| !params.contains_key(**k)) {
        Some(k) => Err(DriverError::MissingRequiredParam(k.to_string())),
        None => Ok(()),
    }
}

/// String form of a required parameter.
pub fn param_str(params: &Params, key: &str) -> Result<String, DriverError> {
    params
        .get(key)
        .map(|v| v.to_string())
        .ok_or_else(|| DriverError::MissingRequiredParam(key.to_string()))
}

/// Integer form of a parameter.
pub fn param_int(params: &Params, key: &str) -> Result<i64, DriverError> {
    let v = params
        .get(key)
        .ok_or_else(|| DriverError::MissingRequiredParam(key.to_string()))?;
    crate::binder::coerce::cast_int64(v).map_err(|r| DriverError::invalid(key, "integer", r))
}

/// Boolean form of an optional parameter; absent is false.
pub fn param_bool(params: &Params, key: &str) -> Result<bool, DriverError> {
    match params.get(key) {
        Some(v) => crate::binder::coerce::cast_bool(v).map_err(|r| DriverError::invalid(key, "boolean", r)),
        None => Ok(false),
    }
}

/// String list form of a parameter.
pub fn param_list(params: &Params, key: &str) -> Result<Vec<String>, DriverError> {
    let v = params
        .get(key)
        .ok_or_else(|| DriverError::MissingRequiredParam(key.to_string()))?;
    crate::binder::coerce::cast_string_slice(v).map_err(|r| DriverError::invalid(key, "string list", r))
}

/// Fabricated identifier returned by dry-runs.
pub fn fake_dry_run_id(entity: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    let prefix = match entity {
        "instance" => "i-",
        "subnet" => "subnet-",
        "vpc" => "vpc-",
        "volume" => "vol-",
        "securitygroup" => "sg-",
        "internetgateway" => "igw-",
        "natgateway" => "nat-",
        "routetable" => "rtb-",
        _ => "dryrunid-",
    };
    format!("{}{}", prefix, suffix)
}

// ============================================================================
// Service drivers
// ============================================================================

/// Implementation of one command.
pub type CommandFn = fn(&Ctx<'_>, &Params) -> CallResult;

pub enum Exec {
    /// Declarative call descriptor.
    Spec(&'static call::CallSpec),
    /// Hand-written command (cascades, read-modify-write, checkers).
    Custom(CommandFn),
}

pub struct Command {
    pub action: Action,
    pub entity: &'static str,
    pub exec: Exec,
}

impl Command {
    pub const fn spec(action: Action, entity: &'static str, spec: &'static call::CallSpec) -> Self {
        Command {
            action,
            entity,
            exec: Exec::Spec(spec),
        }
    }

    pub const fn custom(action: Action, entity: &'static str, f: CommandFn) -> Self {
        Command {
            action,
            entity,
            exec: Exec::Custom(f),
        }
    }

    pub fn run(&self, ctx: &Ctx<'_>, params: &Params) -> CallResult {
        match &self.exec {
            Exec::Spec(spec) => call::exec_spec(ctx, spec, params),
            Exec::Custom(f) => f(ctx, params),
        }
    }
}

/// Driver over one provider API, backed by a static command table.
pub struct ServiceDriver {
    api_name: &'static str,
    commands: &'static [Command],
    api: Arc<dyn CloudApi>,
    settings: Arc<Settings>,
    logger: Logger,
    dry_run: bool,
}

impl ServiceDriver {
    pub fn new(
        api_name: &'static str,
        commands: &'static [Command],
        api: Arc<dyn CloudApi>,
        settings: Arc<Settings>,
    ) -> Self {
        ServiceDriver {
            api_name,
            commands,
            api,
            settings,
            logger: Logger::default(),
            dry_run: false,
        }
    }

    pub fn api_name(&self) -> &'static str {
        self.api_name
    }

    pub fn commands(&self) -> &'static [Command] {
        self.commands
    }
}

impl Driver for ServiceDriver {
    fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    fn lookup(&self, action: Action, entity: &str) -> Result<DriverCall<'_>, DriverError> {
        let cmd = self
            .commands
            .iter()
            .find(|c| c.action == action && c.entity == entity)
            .ok_or_else(|| DriverError::UnsupportedCommand {
                action,
                entity: entity.to_string(),
            })?;
        let dry_run = self.dry_run;
        let name = if dry_run {
            format!("dry run: {} {}", action, entity)
        } else {
            format!("{} {}", action, entity)
        };
        Ok(DriverCall::new(
            name,
            dry_run,
            Box::new(move |params: &Params| {
                let ctx = Ctx {
                    api: self.api.as_ref(),
                    logger: &self.logger,
                    settings: &self.settings,
                    dry_run,
                    action,
                    entity: cmd.entity,
                };
                cmd.run(&ctx, params)
            }),
        ))
    }
}

/// Every service driver over the same provider client.
pub fn all_drivers(api: Arc<dyn CloudApi>, settings: Arc<Settings>) -> Vec<ServiceDriver> {
    let tables: [(&'static str, &'static [Command]); 14] = [
        ("ec2", ec2::COMMANDS),
        ("elbv2", elbv2::COMMANDS),
        ("iam", iam::COMMANDS),
        ("s3", s3::COMMANDS),
        ("sns", sns::COMMANDS),
        ("sqs", sqs::COMMANDS),
        ("route53", route53::COMMANDS),
        ("lambda", lambda::COMMANDS),
        ("autoscaling", autoscaling::COMMANDS),
        ("cloudwatch", cloudwatch::COMMANDS),
        ("ecs", ecs::COMMANDS),
        ("ecr", ecr::COMMANDS),
        ("rds", rds::COMMANDS),
        ("cloudformation", cloudformation::COMMANDS),
    ];
    tables
        .into_iter()
        .map(|(name, commands)| ServiceDriver::new(name, commands, api.clone(), settings.clone()))
        .collect()
}

/// Routes each lookup to the driver owning the command's API.
pub struct MultiDriver {
    drivers: Vec<ServiceDriver>,
}

impl MultiDriver {
    pub fn new(drivers: Vec<ServiceDriver>) -> Self {
        MultiDriver { drivers }
    }

    pub fn with_api(api: Arc<dyn CloudApi>, settings: Arc<Settings>) -> Self {
        MultiDriver::new(all_drivers(api, settings))
    }
}

impl Driver for MultiDriver {
    fn set_dry_run(&mut self, dry_run: bool) {
        for d in &mut self.drivers {
            d.set_dry_run(dry_run);
        }
    }

    fn set_logger(&mut self, logger: Logger) {
        for d in &mut self.drivers {
            d.set_logger(logger.clone());
        }
    }

    fn lookup(&self, action: Action, entity: &str) -> Result<DriverCall<'_>, DriverError> {
        let unsupported = || DriverError::UnsupportedCommand {
            action,
            entity: entity.to_string(),
        };
        let def = registry::lookup(action, entity).ok_or_else(unsupported)?;
        self.drivers
            .iter()
            .find(|d| d.api_name == def.api)
            .ok_or_else(unsupported)?
            .lookup(action, entity)
    }
}
