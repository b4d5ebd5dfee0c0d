//! Shared builders for hand-assembled parse trees.
//!
//! Tests drive the interpreter the way the external parser would: by handing
//! it a tree of rule nodes and tokens. These helpers keep the node plumbing
//! out of the test bodies.

#![expect(dead_code, reason = "each test binary uses a subset of these helpers")]

use casebook::{
    CollectTrace, Context, EntryId, Interpreter, OutputFragment, ParseMeta, ParseNode, ParseToken, ParseTree, rules,
};

pub fn tree(rule: &str, children: Vec<ParseNode>) -> ParseNode {
    ParseNode::Tree(ParseTree::new(rule, children))
}

/// A rule node with line/column/span metadata, for sloc-sensitive tests.
pub fn tree_at(rule: &str, children: Vec<ParseNode>, line: i64, column: i64, start: i64, end: i64) -> ParseNode {
    let mut node = ParseTree::new(rule, children);
    node.meta = ParseMeta {
        line: Some(line),
        column: Some(column),
        start_pos: Some(start),
        end_pos: Some(end),
        end_line: Some(line),
        end_column: Some(column + (end - start)),
    };
    ParseNode::Tree(node)
}

pub fn token(token_type: &str, value: &str) -> ParseNode {
    ParseNode::Token(ParseToken {
        token_type: token_type.to_owned(),
        value: value.to_owned(),
        meta: ParseMeta::default(),
    })
}

pub fn start(items: Vec<ParseNode>) -> ParseNode {
    tree("start", items)
}

// ---------------------------------------------------------------------------
// entries
// ---------------------------------------------------------------------------

pub fn entry_node(
    level: u8,
    id: &str,
    label: Option<&str>,
    options: Option<ParseNode>,
    body_blocks: Option<Vec<ParseNode>>,
    children: Vec<ParseNode>,
) -> ParseNode {
    let rule = match level {
        1 => rules::LEVEL1_ENTRY,
        2 => rules::LEVEL2_ENTRY,
        _ => rules::LEVEL3_ENTRY,
    };
    let mut id_label = Vec::new();
    if !id.is_empty() {
        id_label.push(tree(rules::ENTRY_ID, vec![token("ID", id)]));
    }
    if let Some(label) = label {
        id_label.push(tree(rules::ENTRY_LABEL, vec![token("STRING", &format!("\"{label}\""))]));
    }
    let mut header_children = vec![tree(rules::ENTRY_ID_OPT_LABEL, id_label)];
    if let Some(options) = options {
        header_children.push(tree(rules::ENTRY_OPTIONS, vec![options]));
    }
    let header = tree(rules::ENTRY_HEADER, header_children);
    let body = match body_blocks {
        Some(blocks) => tree(rules::ENTRY_BODY, vec![block_seq(blocks)]),
        None => tree(rules::ENTRY_BODY, vec![]),
    };
    let mut entry_children = vec![header, body];
    entry_children.extend(children);
    tree(rule, entry_children)
}

/// A level-1 entry with just an id and body blocks.
pub fn section(id: &str, body_blocks: Vec<ParseNode>) -> ParseNode {
    entry_node(1, id, None, None, Some(body_blocks), vec![])
}

// ---------------------------------------------------------------------------
// blocks
// ---------------------------------------------------------------------------

pub fn block_seq(blocks: Vec<ParseNode>) -> ParseNode {
    tree(rules::BLOCK_SEQ, blocks)
}

pub fn brace_group(blocks: Vec<ParseNode>) -> ParseNode {
    tree(rules::BRACE_GROUP, blocks)
}

pub fn text_block(text: &str) -> ParseNode {
    tree(rules::BLOCK, vec![tree(rules::BLOCK_TEXT, vec![token("TEXT", text)])])
}

pub fn newline_block() -> ParseNode {
    tree(rules::BLOCK_NEWLINE, vec![])
}

pub fn expr_block(expr: ParseNode) -> ParseNode {
    tree(rules::BLOCK, vec![tree(rules::BLOCK_EXPRESSION, vec![expr])])
}

pub fn call_block(name: &str, args: ParseNode, targets: Vec<Vec<ParseNode>>) -> ParseNode {
    let mut children = vec![token("FUNCNAME", name), args];
    if !targets.is_empty() {
        let groups = targets.into_iter().map(brace_group).collect();
        children.push(tree(rules::MULTI_BRACE_GROUP, groups));
    }
    tree(rules::BLOCK, vec![tree(rules::BLOCK_FUNCTION_CALL, children)])
}

pub fn if_else_block(cond: ParseNode, then_blocks: Vec<ParseNode>, else_blocks: Option<Vec<ParseNode>>) -> ParseNode {
    let mut consequence_children = vec![brace_group(then_blocks)];
    if let Some(else_blocks) = else_blocks {
        consequence_children.push(tree(rules::ELSE_STATEMENT, vec![brace_group(else_blocks)]));
    }
    let if_statement = tree(
        rules::IF_STATEMENT,
        vec![cond, tree(rules::IF_CONSEQUENCE, consequence_children)],
    );
    tree(rules::BLOCK, vec![tree(rules::BLOCK_CONTROL_STATEMENT, vec![if_statement])])
}

pub fn if_elif_block(
    cond: ParseNode,
    then_blocks: Vec<ParseNode>,
    elif_cond: ParseNode,
    elif_blocks: Vec<ParseNode>,
    else_blocks: Option<Vec<ParseNode>>,
) -> ParseNode {
    let mut inner_consequence = vec![brace_group(elif_blocks)];
    if let Some(else_blocks) = else_blocks {
        inner_consequence.push(tree(rules::ELSE_STATEMENT, vec![brace_group(else_blocks)]));
    }
    let inner_if = tree(
        rules::IF_STATEMENT,
        vec![elif_cond, tree(rules::IF_CONSEQUENCE, inner_consequence)],
    );
    let consequence = tree(
        rules::IF_CONSEQUENCE,
        vec![brace_group(then_blocks), tree(rules::ELIF_STATEMENT, vec![inner_if])],
    );
    let if_statement = tree(rules::IF_STATEMENT, vec![cond, consequence]);
    tree(rules::BLOCK, vec![tree(rules::BLOCK_CONTROL_STATEMENT, vec![if_statement])])
}

pub fn for_block(identifier: &str, in_expr: ParseNode, body_blocks: Vec<ParseNode>) -> ParseNode {
    let for_expr = tree(rules::FOR_EXPRESSION_IN, vec![token("IDENTIFIER", identifier), in_expr]);
    let for_statement = tree(rules::FOR_STATEMENT, vec![for_expr, brace_group(body_blocks)]);
    tree(rules::BLOCK, vec![tree(rules::BLOCK_CONTROL_STATEMENT, vec![for_statement])])
}

// ---------------------------------------------------------------------------
// argument lists & expressions
// ---------------------------------------------------------------------------

pub fn arg_list(positional: Vec<ParseNode>, named: Vec<(&str, ParseNode)>) -> ParseNode {
    let mut children = Vec::new();
    if !positional.is_empty() {
        children.push(tree(rules::POSITIONAL_ARGUMENT_LIST, positional));
    }
    if !named.is_empty() {
        let named_nodes = named
            .into_iter()
            .map(|(name, value)| tree(rules::NAMED_ARGUMENT, vec![token("NAME", name), value]))
            .collect();
        children.push(tree(rules::NAMED_ARGUMENT_LIST, named_nodes));
    }
    tree(rules::ARGUMENT_LIST, children)
}

pub fn no_args() -> ParseNode {
    tree(rules::ARGUMENT_LIST, vec![])
}

pub fn ident(name: &str) -> ParseNode {
    tree(rules::ATOM_IDENTIFIER, vec![token("IDENTIFIER", name)])
}

pub fn num(value: f64) -> ParseNode {
    tree(rules::ATOM_NUMBER, vec![token("NUMBER", &value.to_string())])
}

pub fn sstr(value: &str) -> ParseNode {
    tree(rules::ATOM_STRING, vec![token("STRING", &format!("\"{value}\""))])
}

pub fn boolean(value: bool) -> ParseNode {
    tree(rules::ATOM_BOOLEAN, vec![token("BOOL", if value { "true" } else { "false" })])
}

pub fn null_atom() -> ParseNode {
    tree(rules::ATOM_NULL, vec![])
}

pub fn binop(rule: &str, left: ParseNode, right: ParseNode) -> ParseNode {
    tree(rule, vec![left, right])
}

pub fn list_expr(items: Vec<ParseNode>) -> ParseNode {
    if items.is_empty() {
        tree(rules::COLLECTION_LIST, vec![])
    } else {
        tree(
            rules::COLLECTION_LIST,
            vec![tree(rules::POSITIONAL_ARGUMENT_LIST, items)],
        )
    }
}

// ---------------------------------------------------------------------------
// driving the interpreter
// ---------------------------------------------------------------------------

pub fn interp_from(items: Vec<ParseNode>) -> (Interpreter, CollectTrace) {
    interp_from_with_context(items, Context::default())
}

pub fn interp_from_with_context(items: Vec<ParseNode>, context: Context) -> (Interpreter, CollectTrace) {
    let root = start(items);
    let mut trace = CollectTrace::new();
    let interp = Interpreter::from_parse_tree(context, &root, None, &mut trace).expect("ingestion succeeds");
    (interp, trace)
}

/// Looks up a top-level entry by effective id.
pub fn top_entry(interp: &Interpreter, id: &str) -> EntryId {
    interp.ast.root.find(id).expect("entry exists")
}

/// Flattens an entry's output fragments: text verbatim, newlines as `\n`.
pub fn output_text(interp: &Interpreter, id: EntryId) -> String {
    interp
        .ast
        .entry(id)
        .output
        .iter()
        .map(|fragment| match fragment {
            OutputFragment::Text(text) => text.clone(),
            OutputFragment::Newline => "\n".to_owned(),
        })
        .collect()
}
