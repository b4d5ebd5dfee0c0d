//! The render-document interface consumed by the external typesetter driver.
//!
//! After a task runs, the per-entry output fragments are snapshotted into a
//! [`RenderDoc`]: a tree of [`RenderEntry`] records in authoring order, each
//! holding its chunks in block-sequence order. The document serializes to
//! JSON for the external backend.

use crate::ast::{Ast, EntryId, OutputFragment};

/// A lightweight wrapper around what would otherwise be a bare string of
/// rendered output.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum RenderChunk {
    Text(String),
    Newline,
}

/// One entry's rendered form.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RenderEntry {
    pub id: String,
    pub label: String,
    pub level: u8,
    pub layout_style: String,
    pub chunks: Vec<RenderChunk>,
    pub children: Vec<RenderEntry>,
}

/// The whole rendered document.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RenderDoc {
    pub entries: Vec<RenderEntry>,
}

impl RenderDoc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots every entry's accumulated output, preserving authoring
    /// order and block-sequence order.
    #[must_use]
    pub fn from_ast(ast: &Ast) -> Self {
        let entries = ast.root.list.iter().map(|&id| collect_entry(ast, id)).collect();
        Self { entries }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Total number of entries, all levels included.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        fn count(entries: &[RenderEntry]) -> usize {
            entries.iter().map(|e| 1 + count(&e.children)).sum()
        }
        count(&self.entries)
    }
}

fn collect_entry(ast: &Ast, id: EntryId) -> RenderEntry {
    let entry = ast.entry(id);
    let chunks = entry
        .output
        .iter()
        .map(|fragment| match fragment {
            OutputFragment::Text(text) => RenderChunk::Text(text.clone()),
            OutputFragment::Newline => RenderChunk::Newline,
        })
        .collect();
    let children = entry.children.list.iter().map(|&child| collect_entry(ast, child)).collect();
    RenderEntry {
        id: entry.id.clone(),
        label: entry.label.clone(),
        level: entry.level,
        layout_style: entry.run_options.layout_style.to_string(),
        chunks,
        children,
    }
}
