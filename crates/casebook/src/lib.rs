//! An interpreter for the Casebook language.
//!
//! Casebook documents author branching, lead-based investigative game
//! scenarios: entries (sections, leads, sub-leads), options, tags, inline
//! text, and a small expression language. An external grammar-driven parser
//! turns a document into a parse tree; this crate ingests that tree into an
//! AST, runs it under one of two execution modes (`run` or `render`), and
//! collects per-entry output fragments into a render document consumed by an
//! external typesetter driver.
//!
//! The typical embedding:
//!
//! ```no_run
//! use casebook::{Context, Interpreter, StdTrace, Task, parse_tree_from_json};
//!
//! # fn main() -> Result<(), casebook::CbError> {
//! let tree = parse_tree_from_json(r#"{"rule": "start", "children": []}"#)?;
//! let mut interp = Interpreter::from_parse_tree(Context::default(), &tree, None, &mut StdTrace)?;
//! let task = interp.task_render_run(Task::latex(), &mut StdTrace)?;
//! let doc = task.renderer.expect("task ran");
//! println!("{}", doc.to_json().expect("render doc serializes"));
//! # Ok(())
//! # }
//! ```

#![expect(clippy::float_cmp, reason = "number semantics require exact comparison")]
#![expect(clippy::unnecessary_wraps, reason = "handler signatures are uniform")]

mod args;
mod ast;
mod builtins;
mod environment;
mod error;
mod expressions;
mod functions;
mod ingest;
mod io;
mod parsetree;
mod render;
mod run;
mod sloc;
mod value;

pub use crate::{
    args::ArgumentList,
    ast::{
        Ast, BLANK_ENTRY_ID, Block, BlockSeq, BlockText, ChildSort, ControlStatement, ENTRY_ID_COVER,
        ENTRY_ID_OPTIONS, ENTRY_ID_SETUP, Entry, EntryChildren, EntryId, EntryRunOptions, ForStatement, FunctionCall,
        IfStatement, LayoutStyle, OutputFragment, SPECIAL_ENTRY_IDS_ALWAYS_RUN,
    },
    builtins::{APPLY_OPTIONS_FUNC, ENTRY_ARG, core_function_list},
    environment::{Context, EnvVar, Environment, TASK_SLOT},
    error::{CbError, ErrorKind, RunResult, Warning},
    expressions::{BinaryOp, Expr, ExprLoc, UnaryOp},
    functions::{BoundArgs, FuncDef, FuncHandler, ParamDef, ParamKind, ReturnKind},
    ingest::convert_parse_tree,
    io::{CollectTrace, NoTrace, StdTrace, TraceWriter},
    parsetree::{ParseMeta, ParseNode, ParseToken, ParseTree, RawSource, parse_tree_from_json, rules},
    render::{RenderChunk, RenderDoc, RenderEntry},
    run::{Interpreter, Rmode, RunCtx, TagStore, Task},
    sloc::{SourceLoc, UNKNOWN_POS},
    value::{ObjectHandle, ObjectRecord, Value, ValueData},
};
