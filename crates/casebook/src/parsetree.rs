//! Shape contract for the external grammar-driven parser.
//!
//! Parsing itself is an external collaborator: a grammar file plus a source
//! document go into the parser engine, and a tree of rule nodes and leaf
//! tokens comes out. This module fixes the shape of that tree (rule names
//! from a known closed set, ordered children, per-node location metadata,
//! token values) and provides the serde adapter used to load a tree the
//! parser exported as JSON.

use crate::{
    error::{CbError, RunResult},
    sloc::{SourceLoc, UNKNOWN_POS},
};

/// The raw source record handed over by the parser engine alongside the tree.
///
/// Kept on the AST root so diagnostics can quote the offending line.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RawSource {
    pub path: String,
    pub text: String,
}

/// Location metadata carried by parse nodes and tokens.
///
/// Every field is optional; the parser may not propagate positions for
/// synthesized nodes. Missing fields degrade to [`SourceLoc::UNKNOWN`] fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ParseMeta {
    pub line: Option<i64>,
    pub column: Option<i64>,
    pub start_pos: Option<i64>,
    pub end_pos: Option<i64>,
    pub end_line: Option<i64>,
    pub end_column: Option<i64>,
}

impl ParseMeta {
    /// Converts to a [`SourceLoc`], substituting the unknown sentinel for
    /// missing fields.
    #[must_use]
    pub fn sloc(&self) -> SourceLoc {
        SourceLoc::new(
            self.line.unwrap_or(UNKNOWN_POS),
            self.column.unwrap_or(UNKNOWN_POS),
            self.start_pos.unwrap_or(UNKNOWN_POS),
            self.end_pos.unwrap_or(UNKNOWN_POS),
            self.end_line.unwrap_or(UNKNOWN_POS),
            self.end_column.unwrap_or(UNKNOWN_POS),
        )
    }
}

/// A node in the external parse tree: an interior rule node or a leaf token.
///
/// The serde representation is untagged: rule nodes carry `rule`, tokens carry
/// `type` and `value`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParseNode {
    Tree(ParseTree),
    Token(ParseToken),
}

/// An interior parse node named by a grammar rule.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParseTree {
    pub rule: String,
    #[serde(default)]
    pub children: Vec<ParseNode>,
    #[serde(default)]
    pub meta: ParseMeta,
}

/// A leaf token with its lexeme text.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParseToken {
    #[serde(rename = "type")]
    pub token_type: String,
    pub value: String,
    #[serde(default)]
    pub meta: ParseMeta,
}

impl ParseNode {
    #[must_use]
    pub fn sloc(&self) -> SourceLoc {
        match self {
            Self::Tree(tree) => tree.meta.sloc(),
            Self::Token(token) => token.meta.sloc(),
        }
    }

    /// The rule name for interior nodes, `None` for tokens.
    #[must_use]
    pub fn rule_name(&self) -> Option<&str> {
        match self {
            Self::Tree(tree) => Some(tree.rule.as_str()),
            Self::Token(_) => None,
        }
    }

    #[must_use]
    pub fn as_tree(&self) -> Option<&ParseTree> {
        match self {
            Self::Tree(tree) => Some(tree),
            Self::Token(_) => None,
        }
    }

    #[must_use]
    pub fn as_token(&self) -> Option<&ParseToken> {
        match self {
            Self::Token(token) => Some(token),
            Self::Tree(_) => None,
        }
    }
}

impl ParseTree {
    pub fn new(rule: impl Into<String>, children: Vec<ParseNode>) -> Self {
        Self {
            rule: rule.into(),
            children,
            meta: ParseMeta::default(),
        }
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Option<&ParseNode> {
        self.children.get(index)
    }

    /// The value of the first token child, if any.
    #[must_use]
    pub fn first_token_value(&self) -> Option<&str> {
        self.children
            .iter()
            .find_map(|child| child.as_token().map(|t| t.value.as_str()))
    }
}

/// Deserializes a parse tree the external parser exported as JSON.
pub fn parse_tree_from_json(json: &str) -> RunResult<ParseNode> {
    serde_json::from_str(json)
        .map_err(|err| CbError::uncaught_syntax(format!("could not read exported parse tree: {err}"), SourceLoc::UNKNOWN))
}

/// Rule names of the known closed set produced by the Casebook grammar.
///
/// Any node whose rule name falls outside this set is an ingestion error.
pub mod rules {
    pub const PRELIMINARY_MATTER: &str = "preliminary_matter";
    pub const END_MATTER: &str = "end_matter";

    pub const LEVEL1_ENTRY: &str = "level1_entry";
    pub const LEVEL2_ENTRY: &str = "level2_entry";
    pub const LEVEL3_ENTRY: &str = "level3_entry";
    /// Alternate top-level entry rule used by overview documents.
    pub const OVERVIEW_LEVEL1_ENTRY: &str = "overview_level1_entry";

    pub const ENTRY_HEADER: &str = "entry_header";
    pub const ENTRY_ID_OPT_LABEL: &str = "entry_id_opt_label";
    pub const OVERVIEW_LEVEL1_ID: &str = "overview_level1_id";
    pub const ENTRY_ID: &str = "entry_id";
    pub const OVERVIEW_ENTRY_ID: &str = "overview_entry_id";
    pub const ENTRY_LABEL: &str = "entry_label";
    pub const ENTRY_OPTIONS: &str = "entry_options";
    pub const ENTRY_BODY: &str = "entry_body";

    pub const BLOCK_SEQ: &str = "block_seq";
    pub const BRACE_GROUP: &str = "brace_group";
    pub const MULTI_BRACE_GROUP: &str = "multi_brace_group";
    pub const BLOCK: &str = "block";
    pub const BLOCK_NEWLINE: &str = "block_newline";
    pub const BLOCK_TEXT: &str = "block_text";
    pub const BLOCK_FUNCTION_CALL: &str = "block_function_call";
    pub const BLOCK_CONTROL_STATEMENT: &str = "block_control_statement";
    pub const BLOCK_EXPRESSION: &str = "block_expression";

    pub const IF_STATEMENT: &str = "if_statement";
    pub const ELIF_STATEMENT: &str = "elif_statement";
    pub const ELSE_STATEMENT: &str = "else_statement";
    pub const IF_CONSEQUENCE: &str = "if_consequence";
    pub const FOR_STATEMENT: &str = "for_statement";
    pub const FOR_EXPRESSION_IN: &str = "for_expression_in";

    pub const ARGUMENT_LIST: &str = "argument_list";
    pub const POSITIONAL_ARGUMENT_LIST: &str = "positional_argument_list";
    pub const NAMED_ARGUMENT_LIST: &str = "named_argument_list";
    pub const NAMED_ARGUMENT: &str = "named_argument";

    pub const EXPRESSION: &str = "expression";
    pub const OP_ADD: &str = "op_add";
    pub const OP_SUB: &str = "op_sub";
    pub const OP_MUL: &str = "op_mul";
    pub const OP_DIV: &str = "op_div";
    pub const OP_AND: &str = "op_and";
    pub const OP_OR: &str = "op_or";
    pub const OP_LESSTHAN: &str = "op_lessthan";
    pub const OP_LESSTHANEQUAL: &str = "op_lessthanequal";
    pub const OP_GREATERTHAN: &str = "op_greaterthan";
    pub const OP_GREATERTHANEQUAL: &str = "op_greaterthanequal";
    pub const OP_EQUAL: &str = "op_equal";
    pub const OP_NOTEQUAL: &str = "op_notequal";
    pub const OP_IN: &str = "op_in";
    pub const OP_NEG: &str = "op_neg";
    pub const OP_NOT: &str = "op_not";

    pub const ATOM_STRING: &str = "atom_string";
    pub const ATOM_NUMBER: &str = "atom_number";
    pub const ATOM_BOOLEAN: &str = "atom_boolean";
    pub const ATOM_IDENTIFIER: &str = "atom_identifier";
    pub const ATOM_NULL: &str = "atom_null";
    pub const COLLECTION_LIST: &str = "collection_list";
    pub const COLLECTION_DICT: &str = "collection_dict";
    pub const DICT_ITEM: &str = "dict_item";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_roundtrip_distinguishes_trees_and_tokens() {
        let json = r#"{
            "rule": "atom_number",
            "children": [{"type": "NUMBER", "value": "42", "meta": {"line": 3, "column": 7}}],
            "meta": {"line": 3, "column": 7, "start_pos": 20, "end_pos": 22}
        }"#;
        let node = parse_tree_from_json(json).unwrap();
        let tree = node.as_tree().expect("rule node");
        assert_eq!(tree.rule, rules::ATOM_NUMBER);
        assert_eq!(tree.first_token_value(), Some("42"));
        assert_eq!(node.sloc().line, 3);
        assert_eq!(tree.children[0].sloc().start_pos, crate::sloc::UNKNOWN_POS);
    }

    #[test]
    fn missing_meta_degrades_to_unknown() {
        let json = r#"{"rule": "block_newline"}"#;
        let node = parse_tree_from_json(json).unwrap();
        assert!(!node.sloc().is_known());
    }
}
