//! The scoped environment: variable slots, constant enforcement, dotted-path
//! resolution, and built-in function registration.
//!
//! Scopes are kept as a stack; index 0 is the global scope and lookup walks
//! from the innermost scope outward, so the nearest enclosing definition wins.
//! A child environment is pushed for each nested lexical scope (for-loop
//! bodies) and popped when the scope exits.

use std::rc::Rc;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    error::{CbError, ErrorKind, RunResult, Warning},
    functions::FuncDef,
    sloc::SourceLoc,
    value::Value,
};

/// Name of the reserved slot holding the current task.
///
/// Declared constant at environment construction so user code cannot `set` it;
/// the runner overwrites it with constant checking disabled.
pub const TASK_SLOT: &str = "task";

/// Global interpreter options, reachable through the environment.
///
/// There is exactly one context per interpreter; it lives for the whole
/// process and is never mutated during evaluation.
#[derive(Debug, Clone)]
pub struct Context {
    /// Emit run narration and AST dumps through the trace writer.
    pub debug_mode: bool,
    /// Report entry-level and ingestion errors and keep going instead of
    /// aborting the run.
    pub continue_on_exception: bool,
    /// How many source locations a continue-after-exception report may show;
    /// negative disables location reporting entirely.
    pub traceback_limit: i32,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            debug_mode: false,
            continue_on_exception: false,
            traceback_limit: 1,
        }
    }
}

/// One declared variable or constant slot.
///
/// The slot remembers where it was declared so redeclaration and constant
/// reassignment errors can point at both sites.
#[derive(Debug, Clone)]
pub struct EnvVar {
    sloc: SourceLoc,
    name: String,
    description: String,
    value: Value,
    is_constant: bool,
}

impl EnvVar {
    fn new(sloc: SourceLoc, name: String, description: String, value: Value, is_constant: bool) -> Self {
        Self {
            sloc,
            name,
            description,
            value,
            is_constant,
        }
    }

    #[must_use]
    pub fn sloc(&self) -> SourceLoc {
        self.sloc
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.is_constant
    }

    /// Reads the slot value, traversing a dotted path when present.
    fn stored_value(&self, sloc: SourceLoc, path: &[String]) -> RunResult<Value> {
        if path.is_empty() {
            Ok(self.value.clone())
        } else {
            self.value.get_property(sloc, &self.name, path)
        }
    }

    /// Replaces the slot value, or writes through a dotted path.
    fn set_value(&mut self, sloc: SourceLoc, path: &[String], value: Value, check_const: bool) -> RunResult<()> {
        if check_const && self.is_constant {
            return Err(CbError::new_with_previous(
                ErrorKind::ConstAssignment,
                format!(
                    "identifier '{}' was declared constant with value {} and cannot be set to {}",
                    self.name,
                    self.value.as_nice_string(false),
                    value.as_nice_string(false)
                ),
                sloc,
                self.sloc,
            ));
        }
        if path.is_empty() {
            self.value = value;
            Ok(())
        } else {
            self.value.set_property(sloc, &self.name, path, value)
        }
    }
}

#[derive(Debug, Default)]
struct Scope {
    vars: AHashMap<String, EnvVar>,
}

/// The hierarchical scope chain plus the global context.
#[derive(Debug)]
pub struct Environment {
    context: Context,
    scopes: Vec<Scope>,
    warnings: Vec<Warning>,
}

impl Environment {
    /// Creates the root environment with the reserved `task` slot declared.
    #[must_use]
    pub fn new(context: Context) -> Self {
        let mut env = Self {
            context,
            scopes: vec![Scope::default()],
            warnings: Vec::new(),
        };
        env.declare(SourceLoc::UNKNOWN, TASK_SLOT, "", Value::null(SourceLoc::UNKNOWN), true)
            .expect("reserved task slot declares into an empty scope");
        env
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Enters a child scope. Every `push_scope` must be paired with a
    /// `pop_scope` when the lexical scope exits.
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "the global scope must never be popped");
        self.scopes.pop();
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Splits a possibly-dotted identifier into its base name and the
    /// property path tail.
    fn split_identifier(name: &str) -> (&str, Vec<String>) {
        match name.split_once('.') {
            None => (name, Vec::new()),
            Some((base, tail)) => (base, tail.split('.').map(str::to_owned).collect()),
        }
    }

    /// Finds the innermost scope index holding `base`, searching outward.
    fn lookup_scope(&self, base: &str) -> Option<usize> {
        (0..self.scopes.len())
            .rev()
            .find(|&index| self.scopes[index].vars.contains_key(base))
    }

    /// Declares a fresh slot in the innermost scope.
    ///
    /// Dotted names cannot be declared. Redeclaring a name already present in
    /// the innermost scope is an error; shadowing a name from an enclosing
    /// scope is allowed with a warning.
    pub fn declare(
        &mut self,
        sloc: SourceLoc,
        name: &str,
        description: &str,
        value: Value,
        is_constant: bool,
    ) -> RunResult<()> {
        let (base, path) = Self::split_identifier(name);
        if !path.is_empty() {
            return Err(CbError::new(
                ErrorKind::InvalidDeclaration,
                format!("dotted object identifier '{name}' cannot be declared"),
                sloc,
            ));
        }
        let local = self.scopes.last().expect("at least the global scope exists");
        if let Some(existing) = local.vars.get(base) {
            return Err(CbError::new_with_previous(
                ErrorKind::Redeclaration,
                format!("identifier '{name}' already exists in the current scope and cannot be redeclared"),
                sloc,
                existing.sloc(),
            ));
        }
        if let Some(scope_index) = self.lookup_scope(base) {
            let previous = self.scopes[scope_index].vars[base].sloc();
            self.warnings.push(Warning::new_with_previous(
                format!("declaring variable '{name}' shadows an existing variable in a parent scope"),
                sloc,
                previous,
            ));
        }
        let slot = EnvVar::new(sloc, base.to_owned(), description.to_owned(), value, is_constant);
        self.scopes
            .last_mut()
            .expect("at least the global scope exists")
            .vars
            .insert(base.to_owned(), slot);
        Ok(())
    }

    /// Assigns to an existing slot, walking the scope chain.
    ///
    /// All variables must be declared before use; assignment never creates a
    /// slot. Dotted names write through the base slot's object or mapping.
    pub fn set(&mut self, sloc: SourceLoc, name: &str, value: Value, check_const: bool) -> RunResult<()> {
        let (base, path) = Self::split_identifier(name);
        let Some(scope_index) = self.lookup_scope(base) else {
            return Err(CbError::new(
                ErrorKind::Undeclared,
                format!("identifier '{name}' has not been declared in this or any parent scope"),
                sloc,
            ));
        };
        let slot = self.scopes[scope_index]
            .vars
            .get_mut(base)
            .expect("lookup_scope returned a scope containing the name");
        slot.set_value(sloc, &path, value, check_const)
    }

    /// Reads a slot, walking the scope chain; returns `default` on a miss.
    ///
    /// A dotted name traverses properties of the base value; traversal
    /// failures surface as `PropertyMissing`.
    pub fn get(&self, sloc: SourceLoc, name: &str, default: Option<Value>) -> RunResult<Option<Value>> {
        let (base, path) = Self::split_identifier(name);
        let Some(scope_index) = self.lookup_scope(base) else {
            return Ok(default);
        };
        let slot = &self.scopes[scope_index].vars[base];
        slot.stored_value(sloc, &path).map(Some)
    }

    /// Looks up a slot's metadata (declaration site, constness) without
    /// reading through dotted paths.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&EnvVar> {
        let (base, _) = Self::split_identifier(name);
        self.lookup_scope(base).map(|index| &self.scopes[index].vars[base])
    }

    /// Declares every descriptor in the list as a function value.
    ///
    /// Name clashes surface as `Redeclaration`, exactly like variables.
    pub fn load_functions_from_list(&mut self, functions: Vec<FuncDef>) -> RunResult<()> {
        for func in functions {
            let description = func.description;
            let name = func.name;
            let value = Value::function(SourceLoc::UNKNOWN, Rc::new(func));
            self.declare(SourceLoc::UNKNOWN, name, description, value, false)?;
        }
        Ok(())
    }

    /// Declares the pre-registered mappings every document can reference.
    pub fn declare_builtin_vars(&mut self) -> RunResult<()> {
        let info = mapping_of(&[
            "name",
            "title",
            "subtitle",
            "authors",
            "version",
            "versionDate",
            "difficulty",
            "duration",
            "cautions",
            "summary",
            "extraInfo",
            "url",
        ]);
        let game = mapping_of(&["clocked", "clockTimeStep", "clockTimeDefaultLead"]);
        let data = mapping_of(&["version", "versionPrevious"]);
        let mut parser = IndexMap::new();
        parser.insert("autoStyleQuotes".to_owned(), Value::bool(SourceLoc::UNKNOWN, true));
        parser.insert(
            "disabledBalancedQuoteCheck".to_owned(),
            Value::bool(SourceLoc::UNKNOWN, false),
        );

        self.declare(SourceLoc::UNKNOWN, "info", "information about the game", info, false)?;
        self.declare(SourceLoc::UNKNOWN, "game", "game settings", game, false)?;
        self.declare(SourceLoc::UNKNOWN, "data", "highlow data settings", data, false)?;
        self.declare(
            SourceLoc::UNKNOWN,
            "parser",
            "parser settings",
            Value::mapping(SourceLoc::UNKNOWN, parser),
            false,
        )?;
        Ok(())
    }

    /// Installs the current task value, bypassing the constant check on the
    /// reserved slot.
    pub fn set_task(&mut self, task: Value) -> RunResult<()> {
        self.set(SourceLoc::UNKNOWN, TASK_SLOT, task, false)
    }

    /// Reads the current task value, if a runner installed one.
    pub fn task(&self) -> RunResult<Option<Value>> {
        self.get(SourceLoc::UNKNOWN, TASK_SLOT, None)
    }

    /// Drains warnings accumulated since the last call.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}

fn mapping_of(keys: &[&str]) -> Value {
    let entries = keys
        .iter()
        .map(|key| ((*key).to_owned(), Value::null(SourceLoc::UNKNOWN)))
        .collect();
    Value::mapping(SourceLoc::UNKNOWN, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn env() -> Environment {
        Environment::new(Context::default())
    }

    #[test]
    fn get_after_set_roundtrips_in_scope() {
        let mut env = env();
        env.declare(SourceLoc::UNKNOWN, "x", "", Value::from(1.0), false).unwrap();
        env.set(SourceLoc::UNKNOWN, "x", Value::from(3.0), true).unwrap();
        let got = env.get(SourceLoc::UNKNOWN, "x", None).unwrap().unwrap();
        assert_eq!(got, Value::from(3.0));
    }

    #[test]
    fn set_of_undeclared_name_fails() {
        let mut env = env();
        let err = env.set(SourceLoc::UNKNOWN, "nope", Value::from(1.0), true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Undeclared);
    }

    #[test]
    fn task_slot_is_constant_for_user_code() {
        let mut env = env();
        let err = env
            .set(SourceLoc::UNKNOWN, TASK_SLOT, Value::from("hijack"), true)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConstAssignment);
        env.set_task(Value::from("runner")).unwrap();
    }

    #[test]
    fn dotted_declaration_is_rejected() {
        let mut env = env();
        let err = env
            .declare(SourceLoc::UNKNOWN, "a.b", "", Value::from(1.0), false)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidDeclaration);
    }

    #[test]
    fn shadowing_warns_but_succeeds() {
        let mut env = env();
        env.declare(SourceLoc::UNKNOWN, "x", "", Value::from(1.0), false).unwrap();
        env.push_scope();
        env.declare(SourceLoc::UNKNOWN, "x", "", Value::from(2.0), false).unwrap();
        let warnings = env.take_warnings();
        assert_eq!(warnings.len(), 1);
        let got = env.get(SourceLoc::UNKNOWN, "x", None).unwrap().unwrap();
        assert_eq!(got, Value::from(2.0));
        env.pop_scope();
        let got = env.get(SourceLoc::UNKNOWN, "x", None).unwrap().unwrap();
        assert_eq!(got, Value::from(1.0));
    }
}
