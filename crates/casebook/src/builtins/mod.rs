//! The Casebook built-in function vocabulary.
//!
//! Each descriptor is declared once with its parameters, defaults, return
//! kind, and target-group arity, then registered into the environment at
//! startup. Handlers live in the submodule that owns their concern.

mod content;
mod declare;
mod entry_options;

pub use entry_options::{APPLY_OPTIONS_FUNC, ENTRY_ARG};

use crate::functions::FuncDef;

/// Builds the full descriptor table registered into a fresh environment.
#[must_use]
pub fn core_function_list() -> Vec<FuncDef> {
    let mut functions = Vec::new();
    functions.extend(entry_options::function_list());
    functions.extend(declare::function_list());
    functions.extend(content::function_list());
    functions
}
