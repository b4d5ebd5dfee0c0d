//! The two-mode evaluator: the `render_run` walk over the AST, task
//! dispatch, and the runtime state builtin handlers can reach.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexSet;
use strum::{Display, EnumString};

use crate::{
    args::ArgumentList,
    ast::{Ast, Block, BlockSeq, ControlStatement, EntryId, ForStatement, FunctionCall, IfStatement, OutputFragment},
    builtins::{self, APPLY_OPTIONS_FUNC, ENTRY_ARG},
    environment::{Context, Environment},
    error::{CbError, ErrorKind, RunResult},
    functions::ReturnKind,
    ingest::convert_parse_tree,
    io::TraceWriter,
    parsetree::{ParseNode, RawSource},
    render::RenderDoc,
    sloc::SourceLoc,
    value::{ObjectHandle, Value, ValueData},
};

/// The two evaluation modes.
///
/// `Run` evaluates everything and applies side effects to the environment;
/// `Render` evaluates output-producing constructs for display. Top-level
/// entries with special ids run under `Run` regardless of the task's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Rmode {
    #[strum(serialize = "run")]
    Run,
    #[strum(serialize = "render")]
    Render,
}

/// One unit of interpreter work: an id, an execution mode, and the render
/// target. Installed into the reserved `task` environment slot while running.
#[derive(Debug, Clone)]
pub struct Task {
    pub task_id: String,
    pub rmode: Rmode,
    pub render_format: Option<String>,
    /// Filled with the collected render document after the task runs.
    pub renderer: Option<RenderDoc>,
}

impl Task {
    pub fn new(task_id: impl Into<String>, rmode: Rmode) -> Self {
        Self {
            task_id: task_id.into(),
            rmode,
            render_format: None,
            renderer: None,
        }
    }

    /// The default typeset-output task: render mode targeting latex.
    #[must_use]
    pub fn latex() -> Self {
        let mut task = Self::new("latex", Rmode::Render);
        task.render_format = Some("latex".to_owned());
        task.renderer = Some(RenderDoc::new());
        task
    }
}

/// Tags the player can hold: defined via `defineTag`, gained via `gaintag`.
#[derive(Debug, Default)]
pub struct TagStore {
    defined: IndexSet<String>,
    gained: IndexSet<String>,
}

impl TagStore {
    pub fn define(&mut self, tag_id: &str) {
        self.defined.insert(tag_id.to_owned());
    }

    #[must_use]
    pub fn is_defined(&self, tag_id: &str) -> bool {
        self.defined.contains(tag_id)
    }

    /// Marks a tag as gained. Unknown tags are an error unless `define` asks
    /// for definition on first gain.
    pub fn gain(&mut self, sloc: SourceLoc, tag_id: &str, define: bool) -> RunResult<()> {
        if !self.defined.contains(tag_id) {
            if !define {
                return Err(CbError::type_error(
                    format!("tag '{tag_id}' has not been defined (pass define=true to define it on first gain)"),
                    sloc,
                ));
            }
            self.defined.insert(tag_id.to_owned());
        }
        self.gained.insert(tag_id.to_owned());
        Ok(())
    }

    #[must_use]
    pub fn is_gained(&self, tag_id: &str) -> bool {
        self.gained.contains(tag_id)
    }

    #[must_use]
    pub fn defined_tags(&self) -> impl Iterator<Item = &str> {
        self.defined.iter().map(String::as_str)
    }
}

/// Everything the evaluator and builtin handlers can reach during a run:
/// the AST (entries accumulate output in place), the environment, the tag
/// store, the trace writer, and the entry currently being evaluated.
pub struct RunCtx<'a> {
    pub ast: &'a mut Ast,
    pub env: &'a mut Environment,
    pub tags: &'a mut TagStore,
    pub trace: &'a mut dyn TraceWriter,
    pub current_entry: Option<EntryId>,
}

impl RunCtx<'_> {
    /// Appends a text fragment to the current entry's output. Output
    /// produced outside any entry is dropped.
    pub fn emit_text(&mut self, text: impl Into<String>) {
        if let Some(id) = self.current_entry {
            self.ast.entry_mut(id).output.push(OutputFragment::Text(text.into()));
        }
    }

    pub fn emit_newline(&mut self) {
        if let Some(id) = self.current_entry {
            self.ast.entry_mut(id).output.push(OutputFragment::Newline);
        }
    }

    fn debug_line(&mut self, text: &str) {
        if self.env.context().debug_mode {
            self.trace.line(text);
        }
    }

    /// Drains environment warnings to the trace writer.
    pub fn flush_warnings(&mut self) {
        for warning in self.env.take_warnings() {
            self.trace.line(&warning.to_string());
        }
    }

    /// Reports an error that evaluation is continuing past.
    fn report_continue(&mut self, err: &CbError) {
        let detail = if self.env.context().traceback_limit >= 0 {
            err.render(self.ast.raw_source.as_ref())
        } else {
            format!("{}: {} (traceback disabled)", err.kind, err.message)
        };
        self.trace.line(&format!("CONTINUING AFTER EXCEPTION: {detail}"));
    }

    /// Runs every top-level entry.
    ///
    /// The always-run override lives here and only here: entries whose id is
    /// `OPTIONS`, `SETUP`, or `COVER` run under `Run` mode whatever the
    /// task's mode; nested entries inherit their caller's mode.
    pub fn render_run_root(&mut self, rmode: Rmode) -> RunResult<()> {
        for id in self.ast.root.list.clone() {
            let mode = if self.ast.entry(id).is_special_always_run() {
                Rmode::Run
            } else {
                rmode
            };
            self.render_run_entry(id, mode)?;
        }
        Ok(())
    }

    /// Runs one entry: options application, body block sequences, then
    /// children. Errors from the first two phases honor the context's
    /// continue-on-exception flag; each child catches its own the same way.
    pub fn render_run_entry(&mut self, id: EntryId, rmode: Rmode) -> RunResult<()> {
        let display = self.ast.entry(id).runtime_debug_display();
        self.debug_line(&format!("RenderRun ({rmode}): {display}"));

        let previous = self.current_entry.replace(id);
        if let Err(err) = self.apply_options_and_body(id, rmode) {
            if self.env.context().continue_on_exception {
                self.report_continue(&err);
            } else {
                self.current_entry = previous;
                return Err(err);
            }
        }

        let children = self.ast.entry(id).children.list.clone();
        let mut outcome = Ok(());
        for child in children {
            if let Err(err) = self.render_run_entry(child, rmode) {
                outcome = Err(err);
                break;
            }
        }
        self.current_entry = previous;
        self.flush_warnings();
        outcome
    }

    fn apply_options_and_body(&mut self, id: EntryId, rmode: Rmode) -> RunResult<()> {
        self.apply_entry_options(id)?;
        let body = self.ast.entry(id).body.clone();
        for seq in &body {
            self.render_run_block_seq(seq, rmode)?;
        }
        Ok(())
    }

    /// Applies the entry's declared options (or an empty argument list) by
    /// invoking `_entryApplyOptions` through the normal function-call
    /// protocol, with a synthetic object handle to the entry injected as the
    /// named argument `_entry`. Always runs under `Run` mode.
    fn apply_entry_options(&mut self, id: EntryId) -> RunResult<()> {
        let entry = self.ast.entry(id);
        let sloc = entry.sloc;
        let mut args = entry.options.clone().unwrap_or_else(|| ArgumentList::empty(sloc));
        args.set_named_value(ENTRY_ARG, Value::object(sloc, ObjectHandle::Entry(id)));

        let Some(func_value) = self.env.get(sloc, APPLY_OPTIONS_FUNC, None)? else {
            return Err(CbError::internal(
                format!("could not find special entry options function '{APPLY_OPTIONS_FUNC}' in the environment"),
                sloc,
            ));
        };
        let func = func_value.expect_function()?.clone();
        func.invoke(self, Rmode::Run, sloc, &args, &[])?;
        Ok(())
    }

    pub fn render_run_block_seq(&mut self, seq: &BlockSeq, rmode: Rmode) -> RunResult<()> {
        for block in &seq.blocks {
            self.render_run_block(block, rmode)?;
        }
        Ok(())
    }

    fn render_run_block(&mut self, block: &Block, rmode: Rmode) -> RunResult<()> {
        match block {
            Block::Text(text) => {
                self.emit_text(text.text.clone());
                Ok(())
            }
            Block::Newline(_) => {
                self.emit_newline();
                Ok(())
            }
            Block::FunctionCall(call) => self.render_run_function_call(call, rmode),
            Block::Expression(expr) => {
                expr.resolve(self.env, true)?;
                Ok(())
            }
            Block::Control(ControlStatement::If(stmt)) => self.render_run_if(stmt, rmode),
            Block::Control(ControlStatement::For(stmt)) => self.render_run_for(stmt, rmode),
        }
    }

    /// Statement-level function call: resolve the callee, invoke it, and
    /// contribute the result to the entry's output when the function has a
    /// text return kind. Non-text return values are discarded.
    fn render_run_function_call(&mut self, call: &FunctionCall, rmode: Rmode) -> RunResult<()> {
        let Some(func_value) = self.env.get(call.sloc, &call.name, None)? else {
            return Err(CbError::new(
                ErrorKind::UndefinedFunction,
                format!("attempted to invoke undefined function: {}(..)", call.name),
                call.sloc,
            ));
        };
        let func = func_value.expect_function()?.clone();
        let result = func.invoke(self, rmode, call.sloc, &call.args, &call.target_groups)?;
        self.debug_line(&format!(
            "run ({rmode}) FUNCTION {}({}) returned {}",
            call.name,
            call.args.as_debug_str(),
            result.as_nice_string(true)
        ));
        if func.return_kind == Some(ReturnKind::Text) {
            match result.data() {
                ValueData::Null => {}
                ValueData::Str(text) => {
                    let text = text.clone();
                    self.emit_text(text);
                }
                _ => {
                    let text = result.as_nice_string(true);
                    self.emit_text(text);
                }
            }
        }
        Ok(())
    }

    /// The condition must resolve to a bool. The else path simply evaluates
    /// the else consequence block sequence.
    fn render_run_if(&mut self, stmt: &IfStatement, rmode: Rmode) -> RunResult<()> {
        let condition = stmt.condition.resolve(self.env, true)?;
        if condition.expect_bool()? {
            self.render_run_block_seq(&stmt.consequence, rmode)
        } else if let Some(else_if) = &stmt.else_if {
            self.render_run_if(else_if, rmode)
        } else if let Some(else_consequence) = &stmt.else_consequence {
            self.render_run_block_seq(else_consequence, rmode)
        } else {
            Ok(())
        }
    }

    /// The in-expression must resolve to a list; iterating a mapping is
    /// rejected. The loop identifier is declared in a child scope that is
    /// discarded when the loop exits, on success or error.
    fn render_run_for(&mut self, stmt: &ForStatement, rmode: Rmode) -> RunResult<()> {
        let in_value = stmt.in_expression.resolve(self.env, true)?;
        let ValueData::List(items) = in_value.data() else {
            return Err(CbError::type_error(
                format!(
                    "the for-loop in-expression must resolve to a list, found {} ({})",
                    in_value.kind_name(),
                    in_value.as_nice_string(false)
                ),
                stmt.sloc,
            ));
        };
        let items = items.clone();

        self.env.push_scope();
        let result: RunResult<()> = (|| {
            self.env.declare(stmt.sloc, &stmt.identifier, "", Value::null(stmt.sloc), false)?;
            for item in items {
                self.env.set(stmt.sloc, &stmt.identifier, item, true)?;
                self.render_run_block_seq(&stmt.body, rmode)?;
            }
            Ok(())
        })();
        self.env.pop_scope();
        result
    }
}

/// Owns the AST and all runtime state across tasks: the stateful half of the
/// interpreter, as opposed to the per-call [`RunCtx`] view handed to
/// handlers.
#[derive(Debug)]
pub struct Interpreter {
    pub ast: Ast,
    pub env: Environment,
    pub tags: TagStore,
}

impl Interpreter {
    /// Builds an interpreter with the pre-registered variables and the core
    /// function vocabulary loaded.
    pub fn new(context: Context) -> RunResult<Self> {
        let mut env = Environment::new(context);
        env.declare_builtin_vars()?;
        env.load_functions_from_list(builtins::core_function_list())?;
        Ok(Self {
            ast: Ast::new(),
            env,
            tags: TagStore::default(),
        })
    }

    /// Builds an interpreter and ingests an external parse tree in one step.
    pub fn from_parse_tree(
        context: Context,
        tree: &ParseNode,
        raw_source: Option<RawSource>,
        trace: &mut dyn TraceWriter,
    ) -> RunResult<Self> {
        let mut interp = Self::new(context)?;
        if let Some(raw) = raw_source {
            interp.ast.set_raw_source(raw);
        }
        interp.ingest(tree, trace)?;
        Ok(interp)
    }

    /// Ingests an external parse tree into this interpreter's AST.
    pub fn ingest(&mut self, tree: &ParseNode, trace: &mut dyn TraceWriter) -> RunResult<()> {
        convert_parse_tree(&mut self.ast, self.env.context(), tree, trace)?;
        if self.env.context().debug_mode {
            trace.line("Created Abstract Syntax Tree (AST):");
            trace.line(&self.ast.debug_dump());
        }
        Ok(())
    }

    /// Runs one task to completion and returns it with the collected render
    /// document installed.
    ///
    /// The task value is placed in the reserved `task` slot (bypassing its
    /// constant protection) so functions can inspect the target output
    /// format while running.
    pub fn task_render_run(&mut self, task: Task, trace: &mut dyn TraceWriter) -> RunResult<Task> {
        trace.line(&format!("Running task {}..", task.task_id));
        let rmode = task.rmode;
        let task_rc = Rc::new(RefCell::new(task));
        self.env
            .set_task(Value::object(SourceLoc::UNKNOWN, ObjectHandle::Task(Rc::clone(&task_rc))))?;

        let mut ctx = RunCtx {
            ast: &mut self.ast,
            env: &mut self.env,
            tags: &mut self.tags,
            trace,
            current_entry: None,
        };
        let result = ctx.render_run_root(rmode);
        ctx.flush_warnings();
        result?;

        task_rc.borrow_mut().renderer = Some(RenderDoc::from_ast(&self.ast));
        let task = Rc::try_unwrap(task_rc)
            .map(RefCell::into_inner)
            .unwrap_or_else(|rc| rc.borrow().clone());
        Ok(task)
    }

    /// Snapshots the current per-entry output into a render document.
    #[must_use]
    pub fn render_doc(&self) -> RenderDoc {
        RenderDoc::from_ast(&self.ast)
    }
}
