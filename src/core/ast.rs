//! CS-003: Script AST (statements, expressions, declarations).
//!
//! An expression is one command: action, entity and its parameters. Each
//! parameter is filled by exactly one of four maps (params, holes, refs,
//! aliases) until resolution moves it into `params`.

use super::types::{Action, Value};
use indexmap::IndexMap;
use std::fmt;

/// One command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub action: Action,
    pub entity: String,
    /// Concrete values
    pub params: IndexMap<String, Value>,
    /// key → hole name, filled before execution
    pub holes: IndexMap<String, String>,
    /// key → identifier, bound by an earlier declaration
    pub refs: IndexMap<String, String>,
    /// key → alias, resolved to a resource id by name
    pub aliases: IndexMap<String, String>,
    /// Provider result once executed
    pub result: Option<Value>,
    /// Failure text once executed
    pub error: Option<String>,
    /// Set once the provider call succeeded
    pub executed: bool,
}

impl Expression {
    pub fn new(action: Action, entity: &str) -> Self {
        Expression {
            action,
            entity: entity.to_string(),
            params: IndexMap::new(),
            holes: IndexMap::new(),
            refs: IndexMap::new(),
            aliases: IndexMap::new(),
            result: None,
            error: None,
            executed: false,
        }
    }

    /// Registry key: action and entity concatenated.
    pub fn key(&self) -> String {
        format!("{}{}", self.action.as_str(), self.entity)
    }

    /// "create vpc", used as a prefix in logs and errors.
    pub fn name(&self) -> String {
        if self.entity.is_empty() {
            self.action.to_string()
        } else {
            format!("{} {}", self.action, self.entity)
        }
    }

    /// Every parameter key, whichever map fills it.
    pub fn keys(&self) -> Vec<&str> {
        self.params
            .keys()
            .chain(self.holes.keys())
            .chain(self.refs.keys())
            .chain(self.aliases.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
            || self.holes.contains_key(key)
            || self.refs.contains_key(key)
            || self.aliases.contains_key(key)
    }

    /// Move filled holes into `params`. Returns the holes that were filled,
    /// keyed by hole name. Existing params are never overwritten.
    pub fn process_holes(&mut self, fills: &IndexMap<String, Value>) -> IndexMap<String, Value> {
        let mut processed = IndexMap::new();
        let keys: Vec<String> = self.holes.keys().cloned().collect();
        for key in keys {
            let Some(hole) = self.holes.get(&key).cloned() else {
                continue;
            };
            let Some(value) = fills.get(&hole) else {
                continue;
            };
            self.holes.shift_remove(&key);
            if self.params.contains_key(&key) {
                continue;
            }
            self.params.insert(key, value.clone());
            processed.insert(hole, value.clone());
        }
        processed
    }

    /// Replace every reference with its bound value. Fails on the first
    /// identifier missing from `vars`, leaving that reference in place.
    pub fn process_refs(&mut self, vars: &IndexMap<String, Value>) -> Result<(), String> {
        let keys: Vec<String> = self.refs.keys().cloned().collect();
        for key in keys {
            let Some(ident) = self.refs.get(&key).cloned() else {
                continue;
            };
            let value = vars.get(&ident).ok_or_else(|| ident.clone())?;
            self.refs.shift_remove(&key);
            self.params.insert(key, value.clone());
        }
        Ok(())
    }

    /// Resolve aliases through `resolve`. Unresolved aliases stay.
    pub fn process_aliases<F>(&mut self, mut resolve: F) -> usize
    where
        F: FnMut(&str, &str, &str) -> Option<String>,
    {
        let mut resolved = 0;
        let keys: Vec<String> = self.aliases.keys().cloned().collect();
        for key in keys {
            let Some(alias) = self.aliases.get(&key).cloned() else {
                continue;
            };
            if let Some(id) = resolve(&self.entity, &key, &alias) {
                self.aliases.shift_remove(&key);
                self.params.insert(key, Value::Str(id));
                resolved += 1;
            }
        }
        resolved
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Str(s) if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '=') => {
            format!("'{}'", s)
        }
        Value::List(items) => items.join(","),
        other => other.to_string(),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = Vec::new();
        for (k, v) in &self.refs {
            entries.push(format!("{}=${}", k, v));
        }
        for (k, v) in &self.params {
            entries.push(format!("{}={}", k, format_value(v)));
        }
        for (k, v) in &self.holes {
            entries.push(format!("{}={{{}}}", k, v));
        }
        for (k, v) in &self.aliases {
            entries.push(format!("{}=@{}", k, v));
        }
        entries.sort();
        write!(f, "{}", self.name())?;
        for e in entries {
            write!(f, " {}", e)?;
        }
        Ok(())
    }
}

/// `ident = expression`.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub ident: String,
    pub expr: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expr(Expression),
    Decl(Declaration),
}

impl Statement {
    pub fn expr(&self) -> &Expression {
        match self {
            Statement::Expr(e) => e,
            Statement::Decl(d) => &d.expr,
        }
    }

    pub fn expr_mut(&mut self) -> &mut Expression {
        match self {
            Statement::Expr(e) => e,
            Statement::Decl(d) => &mut d.expr,
        }
    }

    /// Declared identifier, for declarations.
    pub fn ident(&self) -> Option<&str> {
        match self {
            Statement::Expr(_) => None,
            Statement::Decl(d) => Some(&d.ident),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Expr(e) => write!(f, "{}", e),
            Statement::Decl(d) => write!(f, "{} = {}", d.ident, d.expr),
        }
    }
}

/// Root of the AST. `Clone` is deep: every map is owned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub statements: Vec<Statement>,
}

impl Script {
    /// Call `f` on every expression in document order. Declarations yield
    /// their right-hand side.
    pub fn visit_expressions<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Expression),
    {
        for stmt in &mut self.statements {
            f(stmt.expr_mut());
        }
    }

    /// Fallible visitor; stops at the first error.
    pub fn try_visit_expressions<F, E>(&mut self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&mut Expression) -> Result<(), E>,
    {
        for stmt in &mut self.statements {
            f(stmt.expr_mut())?;
        }
        Ok(())
    }

    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.statements.iter().map(Statement::expr)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            writeln!(f, "{}", stmt)?;
        }
        Ok(())
    }
}
