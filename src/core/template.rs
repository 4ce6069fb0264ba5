//! CS-007: Template engine.
//!
//! A [`Template`] owns a parsed script and carries it through hole filling,
//! validation, dry-run compilation and the live run. Runs always execute a
//! deep copy, so one template can be compiled and then run.

use super::ast::{Expression, Script, Statement};
use super::log::Logger;
use super::parser::{self, ParseError};
use super::registry;
use super::types::{Action, Params, Value};
use crate::driver::{Driver, DriverError};
use indexmap::{IndexMap, IndexSet};
use std::fmt;

/// Engine failures.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("{command}: missing required params '{key}'")]
    MissingRequiredParam { command: String, key: String },

    #[error("unsupported command '{0}'")]
    UnsupportedCommand(String),

    #[error("unbound reference '${0}'")]
    UnboundReference(String),

    #[error("unresolved holes: {}", .0.join(", "))]
    UnresolvedHoles(Vec<String>),

    #[error("unresolved alias '@{0}'")]
    UnresolvedAlias(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("cannot revert '{0}'")]
    NotRevertible(String),
}

/// A run stopped at `step` (zero-based). `executed` holds the partial
/// progress: earlier steps are marked executed with their results.
#[derive(Debug, thiserror::Error)]
#[error("step {step} ({command}): {error}")]
pub struct RunFailure {
    pub step: usize,
    pub command: String,
    #[source]
    pub error: ScriptError,
    pub executed: Template,
}

/// A script plus a unique id.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: String,
    pub script: Script,
}

impl Template {
    pub fn new(script: Script) -> Self {
        Template {
            id: uuid::Uuid::new_v4().to_string(),
            script,
        }
    }

    pub fn parse(src: &str) -> Result<Self, ParseError> {
        parser::parse(src).map(Template::new)
    }

    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.script.expressions()
    }

    /// Remaining hole names, deduplicated, in script order.
    pub fn holes(&self) -> Vec<String> {
        let mut names: IndexSet<String> = IndexSet::new();
        for expr in self.expressions() {
            names.extend(expr.holes.values().cloned());
        }
        names.into_iter().collect()
    }

    /// Identifiers bound by declarations, in script order.
    pub fn declared(&self) -> Vec<&str> {
        self.script.statements.iter().filter_map(Statement::ident).collect()
    }

    /// Move every filled hole into its expression's params. Returns the
    /// fills actually used, keyed by hole name.
    pub fn resolve_holes(&mut self, fills: &Params) -> Params {
        let mut used = Params::new();
        self.script.visit_expressions(|expr| {
            used.extend(expr.process_holes(fills));
        });
        used
    }

    /// Ask `prompt` for each remaining hole, once per distinct name. A
    /// `None` answer leaves the hole in place.
    pub fn resolve_holes_with<F>(&mut self, mut prompt: F) -> Params
    where
        F: FnMut(&str) -> Option<Value>,
    {
        let mut answers = Params::new();
        for hole in self.holes() {
            if let Some(value) = prompt(&hole) {
                answers.insert(hole, value);
            }
        }
        self.resolve_holes(&answers)
    }

    /// Resolve `@alias` values. `resolve` receives the entity, the param key
    /// and the alias, and answers with a resource id.
    pub fn resolve_aliases<F>(&mut self, mut resolve: F) -> usize
    where
        F: FnMut(&str, &str, &str) -> Option<String>,
    {
        let mut resolved = 0;
        self.script.visit_expressions(|expr| {
            resolved += expr.process_aliases(&mut resolve);
        });
        resolved
    }

    /// Check every expression against the registry. Returns warnings for
    /// keys the command does not know.
    pub fn validate(&self) -> Result<Vec<String>, ScriptError> {
        let mut warnings = Vec::new();
        for expr in self.expressions() {
            let def = registry::lookup(expr.action, &expr.entity)
                .ok_or_else(|| ScriptError::UnsupportedCommand(expr.name()))?;
            if let Some(key) = def.required.iter().find(|k| !expr.has_key(k)) {
                return Err(ScriptError::MissingRequiredParam {
                    command: expr.name(),
                    key: key.to_string(),
                });
            }
            for key in expr.keys() {
                if !def.is_known_key(key) {
                    warnings.push(format!("{}: unexpected param key '{}'", expr.name(), key));
                }
            }
        }
        Ok(warnings)
    }

    /// Run every step in dry-run mode. The driver is back in live mode
    /// afterwards, whatever the outcome.
    pub fn compile(&self, driver: &mut dyn Driver, logger: &Logger) -> Result<Template, RunFailure> {
        driver.set_dry_run(true);
        let compiled = self.run(&*driver, logger);
        driver.set_dry_run(false);
        compiled
    }

    /// Execute the statements in order on a copy, binding each declaration
    /// to its step's result.
    pub fn run(&self, driver: &dyn Driver, logger: &Logger) -> Result<Template, RunFailure> {
        let mut executed = self.clone();
        let mut vars: IndexMap<String, Value> = IndexMap::new();

        for step in 0..executed.script.len() {
            let stmt = &mut executed.script.statements[step];
            let ident = stmt.ident().map(str::to_string);
            let expr = stmt.expr_mut();
            let command = expr.name();
            match run_step(expr, &vars, driver) {
                Ok((result, dry_run)) => {
                    let line = match &result {
                        Some(v) => format!("OK {} ({})", command, v),
                        None => format!("OK {}", command),
                    };
                    if dry_run {
                        logger.verbose(&line);
                    } else {
                        logger.info(&line);
                    }
                    if let (Some(ident), Some(value)) = (ident, result.clone()) {
                        vars.insert(ident, value);
                    }
                    expr.result = result;
                    expr.executed = true;
                }
                Err(error) => {
                    expr.error = Some(error.to_string());
                    logger.error(&format!("KO {}: {}", command, error));
                    return Err(RunFailure {
                        step,
                        command,
                        error,
                        executed,
                    });
                }
            }
        }
        Ok(executed)
    }

    /// Inverse script for what this executed template changed: creates
    /// become deletes, attach/start become detach/stop, newest first.
    pub fn revert(&self) -> Result<Template, ScriptError> {
        let mut statements = Vec::new();
        for expr in self.expressions().filter(|e| e.executed) {
            if !matches!(expr.action, Action::Create | Action::Attach | Action::Start) {
                continue;
            }
            let inverse = expr
                .action
                .inverse()
                .and_then(|a| registry::lookup(a, &expr.entity))
                .ok_or_else(|| ScriptError::NotRevertible(expr.name()))?;
            let mut undo = Expression::new(inverse.action, &expr.entity);
            if expr.action == Action::Create {
                let result = expr
                    .result
                    .clone()
                    .ok_or_else(|| ScriptError::NotRevertible(expr.name()))?;
                let id_key = ["id", "name", "arn"]
                    .into_iter()
                    .find(|k| inverse.required.contains(k))
                    .ok_or_else(|| ScriptError::NotRevertible(expr.name()))?;
                undo.params.insert(id_key.to_string(), result);
            }
            for (k, v) in &expr.params {
                if inverse.is_known_key(k) && !undo.params.contains_key(k) {
                    undo.params.insert(k.clone(), v.clone());
                }
            }
            statements.push(Statement::Expr(undo));
        }
        statements.reverse();
        Ok(Template::new(Script { statements }))
    }
}

/// Resolve one expression against the bindings and call its driver.
/// Also reports whether the call was a dry run.
fn run_step(
    expr: &mut Expression,
    vars: &IndexMap<String, Value>,
    driver: &dyn Driver,
) -> Result<(Option<Value>, bool), ScriptError> {
    expr.process_refs(vars).map_err(ScriptError::UnboundReference)?;
    expr.process_holes(vars);
    if !expr.holes.is_empty() {
        return Err(ScriptError::UnresolvedHoles(expr.holes.values().cloned().collect()));
    }
    if let Some(alias) = expr.aliases.values().next() {
        return Err(ScriptError::UnresolvedAlias(alias.clone()));
    }
    let call = driver.lookup(expr.action, &expr.entity)?;
    let result = call.call(&expr.params)?;
    Ok((result, call.is_dry_run()))
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::Level;
    use crate::core::settings::Settings;
    use crate::driver::MultiDriver;
    use crate::provider::sim::SimCloud;
    use crate::core::types::params;
    use proptest::prelude::*;
    use std::sync::Arc;

    const NETWORK: &str = "\
vpc = create vpc cidr=10.0.0.0/16 name={vpc.name}
sub = create subnet cidr=10.0.1.0/24 vpc=$vpc name={subnet.name}
create internetgateway
";

    fn driver(sim: &Arc<SimCloud>) -> MultiDriver {
        let settings = Settings {
            poll_period_ms: 5,
            keys_dir: None,
            ..Settings::default()
        };
        MultiDriver::with_api(sim.clone(), Arc::new(settings))
    }

    fn filled() -> Template {
        let mut tpl = Template::parse(NETWORK).unwrap();
        tpl.resolve_holes(&params([
            ("vpc.name", Value::str("prod")),
            ("subnet.name", Value::str("prod-a")),
        ]));
        tpl
    }

    #[test]
    fn test_cs007_holes_in_script_order() {
        let tpl = Template::parse(NETWORK).unwrap();
        assert_eq!(tpl.holes(), vec!["vpc.name", "subnet.name"]);
        assert_eq!(tpl.declared(), vec!["vpc", "sub"]);
    }

    #[test]
    fn test_cs007_resolve_holes_reports_used_fills() {
        let mut tpl = Template::parse(NETWORK).unwrap();
        let used = tpl.resolve_holes(&params([
            ("vpc.name", Value::str("prod")),
            ("other", Value::str("x")),
        ]));
        assert_eq!(used, params([("vpc.name", Value::str("prod"))]));
        assert_eq!(tpl.holes(), vec!["subnet.name"]);
    }

    #[test]
    fn test_cs007_prompt_once_per_hole() {
        let mut tpl = Template::parse(
            "create vpc cidr=10.0.0.0/16 name={n}\ncreate vpc cidr=10.1.0.0/16 name={n}\n",
        )
        .unwrap();
        let mut asked = Vec::new();
        tpl.resolve_holes_with(|hole| {
            asked.push(hole.to_string());
            Some(Value::str("shared"))
        });
        assert_eq!(asked, vec!["n"]);
        assert!(tpl.expressions().all(|e| e.params["name"] == Value::str("shared")));
    }

    #[test]
    fn test_cs007_validate_missing_and_unknown() {
        let tpl = Template::parse("create subnet cidr=10.0.1.0/24 color=blue\n").unwrap();
        let err = tpl.validate().unwrap_err();
        assert_eq!(err.to_string(), "create subnet: missing required params 'vpc'");

        let tpl = Template::parse("create vpc cidr=10.0.0.0/16 color=blue\n").unwrap();
        assert_eq!(
            tpl.validate().unwrap(),
            vec!["create vpc: unexpected param key 'color'".to_string()]
        );
    }

    #[test]
    fn test_cs007_validate_counts_holes_and_refs() {
        let tpl = Template::parse(NETWORK).unwrap();
        assert!(tpl.validate().unwrap().is_empty());
    }

    #[test]
    fn test_cs007_run_binds_declarations() {
        let sim = Arc::new(SimCloud::new());
        let (logger, _) = Logger::memory();
        let tpl = filled();
        let done = tpl.run(&driver(&sim), &logger).unwrap();

        let subnet = &sim.calls_to("CreateSubnet")[0];
        let vpc_id = done.script.statements[0].expr().result.clone().unwrap();
        assert_eq!(subnet.input["VpcId"], serde_json::json!(vpc_id.to_string()));
        assert!(done.expressions().all(|e| e.executed));
        assert!(done.expressions().all(|e| e.refs.is_empty()));
        // the original stays untouched
        assert!(tpl.expressions().all(|e| !e.executed));
        assert_eq!(tpl.script.statements[1].expr().refs["vpc"], "vpc");
    }

    #[test]
    fn test_cs007_compile_restores_live_mode() {
        let sim = Arc::new(SimCloud::new());
        let (logger, _) = Logger::memory();
        let mut d = driver(&sim);
        let tpl = filled();
        let compiled = tpl.compile(&mut d, &logger).unwrap();
        let fake = compiled.script.statements[0].expr().result.clone().unwrap();
        assert!(fake.to_string().starts_with("vpc-"));
        // dry runs carry the flag, nothing was minted
        assert!(sim.calls().iter().all(|c| c.input["DryRun"] == serde_json::json!(true)));

        let before = sim.calls().len();
        tpl.run(&d, &logger).unwrap();
        assert!(sim.calls()[before..].iter().all(|c| c.input.get("DryRun").is_none()));
    }

    #[test]
    fn test_cs007_step_failure_keeps_progress() {
        let sim = Arc::new(SimCloud::new());
        sim.fail("ec2", "CreateSubnet", "InvalidVpcID.Malformed", "bad vpc");
        let (logger, sink) = Logger::memory();
        let err = filled().run(&driver(&sim), &logger).unwrap_err();
        assert_eq!(err.step, 1);
        assert!(matches!(err.error, ScriptError::Driver(DriverError::Provider(_))));
        let stmts = &err.executed.script.statements;
        assert!(stmts[0].expr().executed);
        assert!(!stmts[1].expr().executed);
        assert!(stmts[1].expr().error.as_deref().unwrap().contains("bad vpc"));
        assert!(sim.calls_to("CreateInternetGateway").is_empty());
        assert_eq!(
            sink.at(Level::Error),
            vec!["KO create subnet: InvalidVpcID.Malformed: bad vpc".to_string()]
        );
        assert!(sink.at(Level::Info).iter().any(|l| l.starts_with("OK create vpc (vpc-")));
    }

    #[test]
    fn test_cs007_unresolved_holes_fail_run() {
        let sim = Arc::new(SimCloud::new());
        let (logger, _) = Logger::memory();
        let err = Template::parse(NETWORK)
            .unwrap()
            .run(&driver(&sim), &logger)
            .unwrap_err();
        assert_eq!(err.to_string(), "step 0 (create vpc): unresolved holes: vpc.name");
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn test_cs007_hole_named_like_binding() {
        let sim = Arc::new(SimCloud::new());
        let (logger, _) = Logger::memory();
        let tpl = Template::parse("net = create vpc cidr=10.0.0.0/16\ncreate subnet cidr=10.0.1.0/24 vpc={net}\n")
            .unwrap();
        let done = tpl.run(&driver(&sim), &logger).unwrap();
        assert_eq!(
            done.script.statements[1].expr().params["vpc"],
            done.script.statements[0].expr().result.clone().unwrap()
        );
    }

    #[test]
    fn test_cs007_unbound_reference() {
        let sim = Arc::new(SimCloud::new());
        let (logger, _) = Logger::memory();
        let tpl = Template::parse("create subnet cidr=10.0.1.0/24 vpc=$ghost\n").unwrap();
        let err = tpl.run(&driver(&sim), &logger).unwrap_err();
        assert_eq!(
            err.to_string(),
            "step 0 (create subnet): unbound reference '$ghost'"
        );
    }

    #[test]
    fn test_cs007_revert_executed_steps() {
        let sim = Arc::new(SimCloud::new());
        let (logger, _) = Logger::memory();
        let done = filled().run(&driver(&sim), &logger).unwrap();
        let undo = done.revert().unwrap();
        let names: Vec<String> = undo.expressions().map(Expression::name).collect();
        assert_eq!(
            names,
            vec!["delete internetgateway", "delete subnet", "delete vpc"]
        );
        let vpc_id = done.script.statements[0].expr().result.clone().unwrap();
        assert_eq!(undo.script.statements[2].expr().params["id"], vpc_id);
        assert_ne!(undo.id, done.id);
    }

    #[test]
    fn test_cs007_display_reemits_script() {
        let tpl = Template::parse(NETWORK).unwrap();
        assert_eq!(
            tpl.to_string(),
            "vpc = create vpc cidr=10.0.0.0/16 name={vpc.name}\n\
             sub = create subnet cidr=10.0.1.0/24 name={subnet.name} vpc=$vpc\n\
             create internetgateway\n"
        );
    }

    proptest! {
        #[test]
        fn test_cs007_filled_holes_never_remain(names in proptest::collection::vec("[a-z]{1,6}", 1..5)) {
            let src: String = names
                .iter()
                .map(|n| format!("create vpc cidr=10.0.0.0/16 name={{{}}}\n", n))
                .collect();
            let mut tpl = Template::parse(&src).unwrap();
            let fills: Params = names.iter().map(|n| (n.clone(), Value::str("x"))).collect();
            tpl.resolve_holes(&fills);
            prop_assert!(tpl.holes().is_empty());
            prop_assert!(tpl.expressions().all(|e| e.params["name"] == Value::str("x")));
        }
    }
}
