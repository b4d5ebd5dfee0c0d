//! Argument lists at call sites.

use indexmap::IndexMap;

use crate::{
    expressions::ExprLoc,
    sloc::SourceLoc,
    value::Value,
};

/// The positional and named argument expressions of one call site.
///
/// Shared by parse-derived call sites and synthetic ones built by the runtime
/// (entry options application injects `_entry` as a named value). Arguments
/// stay unevaluated until the invocation protocol binds them to parameters;
/// they may contain identifiers and operators that only make sense against a
/// runtime environment.
#[derive(Debug, Clone)]
pub struct ArgumentList {
    pub sloc: SourceLoc,
    pub positional: Vec<ExprLoc>,
    pub named: IndexMap<String, ExprLoc>,
}

impl PartialEq for ArgumentList {
    /// Structural equality over the argument expressions; the call site's
    /// own location is ignored so repeated identical headers compare equal.
    fn eq(&self, other: &Self) -> bool {
        self.positional == other.positional && self.named == other.named
    }
}

impl ArgumentList {
    #[must_use]
    pub fn empty(sloc: SourceLoc) -> Self {
        Self {
            sloc,
            positional: Vec::new(),
            named: IndexMap::new(),
        }
    }

    /// Injects an already-built value as a named argument, replacing any
    /// parse-derived binding of the same name.
    pub fn set_named_value(&mut self, name: &str, value: Value) {
        self.named.insert(name.to_owned(), ExprLoc::from_value(value));
    }

    /// Compact `a, b, key=c` form for run narration.
    #[must_use]
    pub fn as_debug_str(&self) -> String {
        let mut parts: Vec<String> = self.positional.iter().map(ExprLoc::as_debug_str).collect();
        for (key, arg) in &self.named {
            parts.push(format!("{key}={}", arg.as_debug_str()));
        }
        parts.join(", ")
    }
}
