//! The abstract syntax tree: the entry arena, block sequences, and the block
//! taxonomy the evaluator walks.
//!
//! Entries form a tree but live in a dense arena on the root; parents and
//! children reference each other with [`EntryId`] indices. The arena owns
//! every entry for the lifetime of the compilation unit, which keeps parent
//! back-pointers trivial and lets the ingestor merge repeated headers by
//! mutating entries in place.

use std::{fmt::Write as _, rc::Rc};

use ahash::AHashMap;
use strum::{Display, EnumString};

use crate::{
    args::ArgumentList,
    expressions::ExprLoc,
    parsetree::RawSource,
    sloc::SourceLoc,
};

/// Entry id used as the sentinel "no id".
pub const BLANK_ENTRY_ID: &str = "";
pub const ENTRY_ID_OPTIONS: &str = "OPTIONS";
pub const ENTRY_ID_SETUP: &str = "SETUP";
pub const ENTRY_ID_COVER: &str = "COVER";
/// Top-level entries with these ids run under `run` mode regardless of the
/// task's mode.
pub const SPECIAL_ENTRY_IDS_ALWAYS_RUN: [&str; 3] = [ENTRY_ID_OPTIONS, ENTRY_ID_SETUP, ENTRY_ID_COVER];

/// Index of an entry in the AST's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u32);

impl EntryId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("entry arena exceeds u32 indices"))
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ordered children of an entry (or of the root), with an id index.
///
/// `list` preserves authoring order; `by_id` omits children whose effective
/// id is blank.
#[derive(Debug, Clone, Default)]
pub struct EntryChildren {
    pub list: Vec<EntryId>,
    pub by_id: AHashMap<String, EntryId>,
}

impl EntryChildren {
    #[must_use]
    pub fn find(&self, effective_id: &str) -> Option<EntryId> {
        if effective_id == BLANK_ENTRY_ID {
            return None;
        }
        self.by_id.get(effective_id).copied()
    }

    pub(crate) fn push(&mut self, effective_id: &str, child: EntryId) {
        self.list.push(child);
        if effective_id != BLANK_ENTRY_ID {
            self.by_id.insert(effective_id.to_owned(), child);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// Sort order an entry requests for its children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
pub enum ChildSort {
    #[default]
    #[strum(serialize = "")]
    Unsorted,
    #[strum(serialize = "alpha")]
    Alpha,
    #[strum(serialize = "index")]
    Index,
}

/// Layout style an entry requests from the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
pub enum LayoutStyle {
    #[default]
    #[strum(serialize = "")]
    Inherit,
    #[strum(serialize = "cover")]
    Cover,
    #[strum(serialize = "oneColumn")]
    OneColumn,
    #[strum(serialize = "solo")]
    Solo,
    #[strum(serialize = "twoColumn")]
    TwoColumn,
}

/// Option state applied to an entry by `_entryApplyOptions` before its body
/// runs. Consumed by the renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryRunOptions {
    pub auto_id: Option<bool>,
    pub special: bool,
    pub sort_index: f64,
    pub child_sort: ChildSort,
    pub layout_style: LayoutStyle,
    pub tombstones: bool,
    pub label_contd: String,
    pub time: f64,
    pub deadline: f64,
}

/// One fragment of an entry's accumulated output, in block-sequence order.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFragment {
    Text(String),
    Newline,
}

/// An authored unit: a level-1 section, level-2 lead, or level-3 sub-lead.
///
/// Entries collect and store output; their blocks do not. Repeated headers
/// with the same id merge into one entry whose body holds every occurrence's
/// block sequences in source order.
#[derive(Debug)]
pub struct Entry {
    pub sloc: SourceLoc,
    pub level: u8,
    pub id: String,
    pub label: String,
    pub options: Option<ArgumentList>,
    pub body: Vec<Rc<BlockSeq>>,
    pub children: EntryChildren,
    pub parent: Option<EntryId>,
    pub run_options: EntryRunOptions,
    pub output: Vec<OutputFragment>,
}

impl Entry {
    #[must_use]
    pub fn new(sloc: SourceLoc, parent: Option<EntryId>, level: u8) -> Self {
        Self {
            sloc,
            level,
            id: String::new(),
            label: String::new(),
            options: None,
            body: Vec::new(),
            children: EntryChildren::default(),
            parent,
            run_options: EntryRunOptions::default(),
            output: Vec::new(),
        }
    }

    /// Whether this entry always runs under `run` mode at the top level.
    #[must_use]
    pub fn is_special_always_run(&self) -> bool {
        SPECIAL_ENTRY_IDS_ALWAYS_RUN.contains(&self.id.as_str())
    }

    /// The id used for child indexing and merging: the explicit id, falling
    /// back to the label when the id is blank.
    #[must_use]
    pub fn effective_id(&self) -> &str {
        if self.id.is_empty() { &self.label } else { &self.id }
    }

    /// `ID:'label'` form used in merge diagnostics.
    #[must_use]
    pub fn display_id_label(&self) -> String {
        format!("{}:'{}'", self.id, self.label)
    }

    /// `ENTRY id:'label' (level n)` form used in run narration.
    #[must_use]
    pub fn runtime_debug_display(&self) -> String {
        format!("ENTRY {}:{} (level {})", self.id, self.label, self.level)
    }

    pub fn add_body_block_seq(&mut self, seq: Rc<BlockSeq>) {
        self.body.push(seq);
    }
}

/// The AST root: raw source for diagnostics, preliminary/end matter, the
/// entry arena, and the top-level entry children.
#[derive(Debug, Default)]
pub struct Ast {
    pub raw_source: Option<RawSource>,
    /// Document prologue; captured but not processed by the evaluator.
    pub preliminary_matter: Option<Rc<BlockSeq>>,
    /// Document epilogue; captured but not processed by the evaluator.
    pub end_matter: Option<Rc<BlockSeq>>,
    arena: Vec<Entry>,
    pub root: EntryChildren,
}

impl Ast {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_raw_source(&mut self, raw_source: RawSource) {
        self.raw_source = Some(raw_source);
    }

    #[must_use]
    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.arena[id.index()]
    }

    pub fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.arena[id.index()]
    }

    pub(crate) fn alloc_entry(&mut self, entry: Entry) -> EntryId {
        let id = EntryId::new(self.arena.len());
        self.arena.push(entry);
        id
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.arena.len()
    }

    /// Hierarchical tabbed dump of the entry tree, for debug mode.
    #[must_use]
    pub fn debug_dump(&self) -> String {
        let mut out = String::from("ROOT\n");
        for &child in &self.root.list {
            self.dump_entry(&mut out, child, 1);
        }
        out
    }

    fn dump_entry(&self, out: &mut String, id: EntryId, depth: usize) {
        let entry = self.entry(id);
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{indent}ENTRY LEVEL {}", entry.level);
        let _ = writeln!(out, "{indent}  ID: {}", entry.id);
        let _ = writeln!(out, "{indent}  LABEL: {}", entry.label);
        if let Some(options) = &entry.options {
            let _ = writeln!(out, "{indent}  OPTIONS: ({})", options.as_debug_str());
        }
        if !entry.body.is_empty() {
            let _ = writeln!(out, "{indent}  BLOCK SEQS ({}):", entry.body.len());
            for seq in &entry.body {
                let _ = writeln!(out, "{indent}    {} blocks @ {}", seq.blocks.len(), seq.sloc.debug_string());
            }
        }
        if !entry.children.is_empty() {
            let _ = writeln!(out, "{indent}  {} children:", entry.children.len());
            for &child in &entry.children.list {
                self.dump_entry(out, child, depth + 2);
            }
        }
    }
}

/// A sequence of blocks evaluated strictly left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSeq {
    pub sloc: SourceLoc,
    pub blocks: Vec<Block>,
}

impl BlockSeq {
    #[must_use]
    pub fn new(sloc: SourceLoc, blocks: Vec<Block>) -> Self {
        Self { sloc, blocks }
    }
}

/// The block taxonomy inside a block sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A literal text fragment; no environment effect.
    Text(BlockText),
    /// A significant whitespace boundary in output.
    Newline(SourceLoc),
    FunctionCall(FunctionCall),
    /// A bare expression: resolved for side effects, result discarded.
    Expression(ExprLoc),
    Control(ControlStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockText {
    pub sloc: SourceLoc,
    pub text: String,
}

/// A function-call statement, with optional target brace-groups following the
/// argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub sloc: SourceLoc,
    pub name: String,
    pub args: ArgumentList,
    pub target_groups: Vec<Rc<BlockSeq>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlStatement {
    If(IfStatement),
    For(ForStatement),
}

/// `$if (cond): { ... } $elif: { ... } $else: { ... }`. The elif chain is
/// itself an `IfStatement`; at most one of `else_if` / `else_consequence`
/// is set.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub sloc: SourceLoc,
    pub condition: ExprLoc,
    pub consequence: Rc<BlockSeq>,
    pub else_if: Option<Box<IfStatement>>,
    pub else_consequence: Option<Rc<BlockSeq>>,
}

/// `$for (ident in expr): { ... }`. The in-expression must resolve to a
/// list; the loop identifier lives in a child scope that never escapes the
/// loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub sloc: SourceLoc,
    pub identifier: String,
    pub in_expression: ExprLoc,
    pub body: Rc<BlockSeq>,
}
