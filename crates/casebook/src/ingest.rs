//! Converts the external parser's tree into the interpreter AST.
//!
//! The ingestor recognizes the closed rule set of the Casebook grammar; any
//! other rule name is an `UncaughtSyntaxError` (the parser should have
//! rejected the document). Repeated entry headers merge into the entry
//! already in place: labels and options must agree, bodies accumulate. Body
//! accumulation is what lets repeated `# SETUP` or `# OPTIONS` sections
//! pile up.

use std::rc::Rc;

use crate::{
    args::ArgumentList,
    ast::{
        Ast, Block, BlockSeq, BlockText, ControlStatement, Entry, EntryChildren, EntryId, ForStatement, FunctionCall,
        IfStatement,
    },
    environment::Context,
    error::{CbError, ErrorKind, RunResult},
    expressions::{BinaryOp, Expr, ExprLoc, UnaryOp},
    io::TraceWriter,
    parsetree::{ParseNode, ParseTree, rules},
    sloc::SourceLoc,
    value::Value,
};

/// Walks the parse tree's top-level items into the AST.
///
/// Entry-level failures honor the context's continue-on-exception flag: the
/// error is reported through the trace writer and ingestion moves on to the
/// next top-level item.
pub fn convert_parse_tree(
    ast: &mut Ast,
    context: &Context,
    tree: &ParseNode,
    trace: &mut dyn TraceWriter,
) -> RunResult<()> {
    let Some(root) = tree.as_tree() else {
        return Err(CbError::uncaught_syntax(
            "expected a rule node at the parse tree root",
            tree.sloc(),
        ));
    };
    for child in &root.children {
        convert_top_level_item(ast, context, child, trace)?;
    }
    Ok(())
}

/// Top level can only be preliminary matter, end matter, or a level-1 entry.
fn convert_top_level_item(
    ast: &mut Ast,
    context: &Context,
    pnode: &ParseNode,
    trace: &mut dyn TraceWriter,
) -> RunResult<()> {
    let Some(tree) = pnode.as_tree() else {
        return Err(CbError::uncaught_syntax(
            "expected a rule node as a top level item, found a token",
            pnode.sloc(),
        ));
    };
    match tree.rule.as_str() {
        rules::PRELIMINARY_MATTER => {
            ast.preliminary_matter = Some(Rc::new(convert_matter(tree)?));
            Ok(())
        }
        rules::END_MATTER => {
            ast.end_matter = Some(Rc::new(convert_matter(tree)?));
            Ok(())
        }
        rules::LEVEL1_ENTRY | rules::OVERVIEW_LEVEL1_ENTRY => add_merge_entry(ast, context, None, tree, 1, trace),
        other => Err(CbError::uncaught_syntax(
            format!(
                "expected top level item to be one of [{}, {}, {}, {}], found '{other}'",
                rules::PRELIMINARY_MATTER,
                rules::END_MATTER,
                rules::LEVEL1_ENTRY,
                rules::OVERVIEW_LEVEL1_ENTRY
            ),
            tree.meta.sloc(),
        )),
    }
}

/// Preliminary/end matter: captured, never evaluated. A block sequence when
/// the grammar produced one, otherwise the raw token text.
fn convert_matter(tree: &ParseTree) -> RunResult<BlockSeq> {
    if let Some(child) = tree.child(0).and_then(ParseNode::as_tree) {
        if child.rule == rules::BLOCK_SEQ || child.rule == rules::BRACE_GROUP {
            return convert_block_seq(child);
        }
    }
    let blocks = tree
        .children
        .iter()
        .filter_map(ParseNode::as_token)
        .map(|token| {
            Block::Text(BlockText {
                sloc: token.meta.sloc(),
                text: token.value.clone(),
            })
        })
        .collect();
    Ok(BlockSeq::new(tree.meta.sloc(), blocks))
}

fn children_of(ast: &Ast, parent: Option<EntryId>) -> &EntryChildren {
    match parent {
        None => &ast.root,
        Some(id) => &ast.entry(id).children,
    }
}

/// Ingests one entry node, merging into an existing sibling with the same
/// effective id, then recurses into the entry's own child nodes against the
/// chosen target.
fn add_merge_entry(
    ast: &mut Ast,
    context: &Context,
    parent: Option<EntryId>,
    pnode: &ParseTree,
    expected_level: u8,
    trace: &mut dyn TraceWriter,
) -> RunResult<()> {
    match add_merge_entry_do_work(ast, context, parent, pnode, expected_level, trace) {
        Ok(()) => Ok(()),
        Err(err) if context.continue_on_exception => {
            let detail = err.render(ast.raw_source.as_ref());
            trace.line(&format!("CONTINUING AFTER EXCEPTION: {detail}"));
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn add_merge_entry_do_work(
    ast: &mut Ast,
    context: &Context,
    parent: Option<EntryId>,
    pnode: &ParseTree,
    expected_level: u8,
    trace: &mut dyn TraceWriter,
) -> RunResult<()> {
    verify_rule(
        pnode,
        "adding entry children",
        &[
            rules::LEVEL1_ENTRY,
            rules::LEVEL2_ENTRY,
            rules::LEVEL3_ENTRY,
            rules::OVERVIEW_LEVEL1_ENTRY,
        ],
    )?;

    let mut new_entry = Entry::new(pnode.meta.sloc(), parent, expected_level);
    convert_entry_core(&mut new_entry, pnode)?;

    let effective_id = new_entry.effective_id().to_owned();
    let target = match children_of(ast, parent).find(&effective_id) {
        None => {
            let id = ast.alloc_entry(new_entry);
            match parent {
                None => ast.root.push(&effective_id, id),
                Some(parent_id) => ast.entry_mut(parent_id).children.push(&effective_id, id),
            }
            id
        }
        Some(existing_id) => {
            merge_into_existing(ast, existing_id, new_entry)?;
            existing_id
        }
    };

    // Children follow the head and body in the node's child list.
    for child in pnode.children.iter().skip(2) {
        let Some(child_tree) = child.as_tree() else {
            return Err(CbError::uncaught_syntax(
                "expected an entry rule node as an entry child, found a token",
                child.sloc(),
            ));
        };
        add_merge_entry(ast, context, Some(target), child_tree, expected_level + 1, trace)?;
    }
    Ok(())
}

/// Reconciles a repeated header with the entry already in place.
fn merge_into_existing(ast: &mut Ast, existing_id: EntryId, new_entry: Entry) -> RunResult<()> {
    let display = new_entry.display_id_label();
    let existing = ast.entry_mut(existing_id);

    if !new_entry.label.is_empty() {
        if !existing.label.is_empty() && existing.label != new_entry.label {
            return Err(CbError::new_with_previous(
                ErrorKind::LabelRedefinition,
                format!(
                    "redefinition of label in repeat use of entry header for entry {display}; old='{}' vs new='{}'",
                    existing.label, new_entry.label
                ),
                new_entry.sloc,
                existing.sloc,
            ));
        }
        existing.label = new_entry.label;
    }
    if let Some(new_options) = new_entry.options {
        if let Some(existing_options) = &existing.options {
            if *existing_options != new_options {
                return Err(CbError::new_with_previous(
                    ErrorKind::OptionsRedefinition,
                    format!("redefinition of options in repeat use of entry header for entry {display}"),
                    new_entry.sloc,
                    existing.sloc,
                ));
            }
        }
        existing.options = Some(new_options);
    }
    // Bodies always append; repeated SETUP/OPTIONS sections accumulate.
    for seq in new_entry.body {
        existing.add_body_block_seq(seq);
    }
    Ok(())
}

/// Converts the head and body of an entry node, but not its children.
fn convert_entry_core(entry: &mut Entry, pnode: &ParseTree) -> RunResult<()> {
    if pnode.children.len() < 2 {
        return Err(CbError::uncaught_syntax(
            "expected the first two children of an entry to be its header and body",
            pnode.meta.sloc(),
        ));
    }
    let head = expect_tree(pnode.child(0), "processing entry head", &[rules::ENTRY_HEADER])?;
    convert_header(entry, head)?;
    let body = expect_tree(pnode.child(1), "processing entry body", &[rules::ENTRY_BODY])?;
    // An absent body is an entry_body node with no children.
    if let Some(content) = body.child(0) {
        let seq_tree = expect_tree(Some(content), "processing entry body content", &[rules::BLOCK_SEQ])?;
        entry.add_body_block_seq(Rc::new(convert_block_seq(seq_tree)?));
    }
    Ok(())
}

/// A header yields up to three parts: the id token, an optional label string,
/// and an optional options argument list. Top-level special entries may carry
/// only a label and fall back to it as their id.
fn convert_header(entry: &mut Entry, head: &ParseTree) -> RunResult<()> {
    for child in &head.children {
        let tree = child.as_tree().ok_or_else(|| {
            CbError::uncaught_syntax("expected a rule node inside an entry header, found a token", child.sloc())
        })?;
        match tree.rule.as_str() {
            rules::ENTRY_ID_OPT_LABEL | rules::OVERVIEW_LEVEL1_ID => {
                for part in &tree.children {
                    let part_tree = part.as_tree().ok_or_else(|| {
                        CbError::uncaught_syntax("expected a rule node in an entry id/label, found a token", part.sloc())
                    })?;
                    match part_tree.rule.as_str() {
                        rules::ENTRY_ID | rules::OVERVIEW_ENTRY_ID => {
                            entry.id = part_tree
                                .first_token_value()
                                .ok_or_else(|| {
                                    CbError::uncaught_syntax("entry id rule carries no token", part.sloc())
                                })?
                                .trim()
                                .to_owned();
                        }
                        rules::ENTRY_LABEL => {
                            let raw = part_tree.first_token_value().ok_or_else(|| {
                                CbError::uncaught_syntax("entry label rule carries no token", part.sloc())
                            })?;
                            entry.label = unquote(raw);
                        }
                        other => {
                            return Err(CbError::uncaught_syntax(
                                format!(
                                    "expected to find one of [{}, {}, {}], found '{other}'",
                                    rules::ENTRY_ID,
                                    rules::OVERVIEW_ENTRY_ID,
                                    rules::ENTRY_LABEL
                                ),
                                part.sloc(),
                            ));
                        }
                    }
                }
            }
            rules::ENTRY_OPTIONS => {
                // Options come as an argument list which is child 0; nothing else.
                let args_tree = expect_tree(tree.child(0), "processing entry options", &[rules::ARGUMENT_LIST])?;
                entry.options = Some(convert_argument_list(args_tree)?);
            }
            other => {
                return Err(CbError::uncaught_syntax(
                    format!(
                        "expected an entry header element from [{}, {}, {}], found '{other}'",
                        rules::ENTRY_ID_OPT_LABEL,
                        rules::OVERVIEW_LEVEL1_ID,
                        rules::ENTRY_OPTIONS
                    ),
                    tree.meta.sloc(),
                ));
            }
        }
    }
    Ok(())
}

fn convert_block_seq(tree: &ParseTree) -> RunResult<BlockSeq> {
    verify_rule(tree, "block sequence", &[rules::BLOCK_SEQ, rules::BRACE_GROUP])?;
    let mut blocks = Vec::with_capacity(tree.children.len());
    for child in &tree.children {
        let child_tree = child.as_tree().ok_or_else(|| {
            CbError::uncaught_syntax("expected a rule node inside a block sequence, found a token", child.sloc())
        })?;
        if child_tree.rule == rules::BLOCK_NEWLINE {
            blocks.push(Block::Newline(child_tree.meta.sloc()));
        } else {
            blocks.push(convert_block(child_tree)?);
        }
    }
    Ok(BlockSeq::new(tree.meta.sloc(), blocks))
}

fn convert_block(tree: &ParseTree) -> RunResult<Block> {
    let concrete = if tree.rule == rules::BLOCK {
        expect_tree(
            tree.child(0),
            "block contents",
            &[
                rules::BLOCK_TEXT,
                rules::BLOCK_FUNCTION_CALL,
                rules::BLOCK_CONTROL_STATEMENT,
                rules::BLOCK_EXPRESSION,
            ],
        )?
    } else {
        tree
    };
    match concrete.rule.as_str() {
        rules::BLOCK_TEXT => Ok(Block::Text(BlockText {
            sloc: concrete.meta.sloc(),
            text: collect_token_text(concrete),
        })),
        rules::BLOCK_FUNCTION_CALL => Ok(Block::FunctionCall(convert_function_call(concrete)?)),
        rules::BLOCK_CONTROL_STATEMENT => Ok(Block::Control(convert_control_statement(concrete)?)),
        rules::BLOCK_EXPRESSION => {
            let expr_node = concrete.child(0).ok_or_else(|| {
                CbError::uncaught_syntax("expression block carries no expression", concrete.meta.sloc())
            })?;
            Ok(Block::Expression(convert_expression(expr_node)?))
        }
        other => Err(CbError::internal(
            format!(
                "expected to process a block of type [{}, {}, {}, {}] but got '{other}'",
                rules::BLOCK_FUNCTION_CALL,
                rules::BLOCK_TEXT,
                rules::BLOCK_CONTROL_STATEMENT,
                rules::BLOCK_EXPRESSION
            ),
            concrete.meta.sloc(),
        )),
    }
}

fn convert_control_statement(tree: &ParseTree) -> RunResult<ControlStatement> {
    let inner = expect_tree(
        tree.child(0),
        "control statement",
        &[rules::IF_STATEMENT, rules::FOR_STATEMENT],
    )?;
    match inner.rule.as_str() {
        rules::IF_STATEMENT => Ok(ControlStatement::If(convert_if_statement(inner)?)),
        rules::FOR_STATEMENT => Ok(ControlStatement::For(convert_for_statement(inner)?)),
        other => Err(CbError::internal(
            format!(
                "unknown control statement, expected [{}, {}] got '{other}'",
                rules::IF_STATEMENT,
                rules::FOR_STATEMENT
            ),
            inner.meta.sloc(),
        )),
    }
}

fn convert_if_statement(tree: &ParseTree) -> RunResult<IfStatement> {
    let condition_node = tree
        .child(0)
        .ok_or_else(|| CbError::uncaught_syntax("if statement carries no condition", tree.meta.sloc()))?;
    let condition = convert_expression(condition_node)?;

    let consequence_set = expect_tree(tree.child(1), "if consequence", &[rules::IF_CONSEQUENCE])?;
    let consequence_node = expect_tree(
        consequence_set.child(0),
        "if consequence contents",
        &[rules::BRACE_GROUP, rules::BLOCK_SEQ],
    )?;
    let consequence = Rc::new(convert_block_seq(consequence_node)?);

    let mut statement = IfStatement {
        sloc: tree.meta.sloc(),
        condition,
        consequence,
        else_if: None,
        else_consequence: None,
    };

    // A further child is either an elif (itself an if) or an else.
    if let Some(else_child) = consequence_set.child(1) {
        let else_tree = else_child.as_tree().ok_or_else(|| {
            CbError::uncaught_syntax("expected a rule node after an if consequence, found a token", else_child.sloc())
        })?;
        match else_tree.rule.as_str() {
            rules::ELIF_STATEMENT => {
                let inner = expect_tree(else_tree.child(0), "elif statement", &[rules::IF_STATEMENT])?;
                statement.else_if = Some(Box::new(convert_if_statement(inner)?));
            }
            rules::ELSE_STATEMENT => {
                let inner = expect_tree(
                    else_tree.child(0),
                    "else consequence",
                    &[rules::BRACE_GROUP, rules::BLOCK_SEQ],
                )?;
                statement.else_consequence = Some(Rc::new(convert_block_seq(inner)?));
            }
            other => {
                return Err(CbError::uncaught_syntax(
                    format!(
                        "if consequence set expected [{}, {}], found '{other}'",
                        rules::ELIF_STATEMENT,
                        rules::ELSE_STATEMENT
                    ),
                    else_tree.meta.sloc(),
                ));
            }
        }
    }
    Ok(statement)
}

fn convert_for_statement(tree: &ParseTree) -> RunResult<ForStatement> {
    let for_expr = expect_tree(tree.child(0), "for expression", &[rules::FOR_EXPRESSION_IN])?;
    let identifier = for_expr
        .child(0)
        .and_then(ParseNode::as_token)
        .ok_or_else(|| CbError::uncaught_syntax("for statement carries no loop identifier", for_expr.meta.sloc()))?
        .value
        .trim()
        .to_owned();
    let in_node = for_expr
        .child(1)
        .ok_or_else(|| CbError::uncaught_syntax("for statement carries no in-expression", for_expr.meta.sloc()))?;
    let in_expression = convert_expression(in_node)?;

    let body_node = expect_tree(
        tree.child(1),
        "for loop consequence",
        &[rules::BRACE_GROUP, rules::BLOCK_SEQ],
    )?;
    Ok(ForStatement {
        sloc: tree.meta.sloc(),
        identifier,
        in_expression,
        body: Rc::new(convert_block_seq(body_node)?),
    })
}

fn convert_function_call(tree: &ParseTree) -> RunResult<FunctionCall> {
    if tree.children.len() > 3 {
        return Err(CbError::internal(
            "expected 2 or 3 children for a function call parse",
            tree.meta.sloc(),
        ));
    }
    let name = tree
        .child(0)
        .and_then(ParseNode::as_token)
        .ok_or_else(|| CbError::uncaught_syntax("function call carries no name token", tree.meta.sloc()))?
        .value
        .trim()
        .to_owned();
    let args_tree = expect_tree(tree.child(1), "function call arguments", &[rules::ARGUMENT_LIST])?;
    let args = convert_argument_list(args_tree)?;

    let target_groups = match tree.child(2) {
        None => Vec::new(),
        Some(targets_node) => {
            let targets_tree = expect_tree(
                Some(targets_node),
                "function call target groups",
                &[rules::MULTI_BRACE_GROUP, rules::BRACE_GROUP, rules::BLOCK_SEQ],
            )?;
            convert_target_groups(targets_tree)?
        }
    };

    Ok(FunctionCall {
        sloc: tree.meta.sloc(),
        name,
        args,
        target_groups,
    })
}

/// A multi brace group yields one block sequence per brace group; a bare
/// brace group or block sequence yields a single target.
fn convert_target_groups(tree: &ParseTree) -> RunResult<Vec<Rc<BlockSeq>>> {
    if tree.rule == rules::MULTI_BRACE_GROUP {
        let mut groups = Vec::with_capacity(tree.children.len());
        for child in &tree.children {
            let group = expect_tree(Some(child), "brace group", &[rules::BRACE_GROUP, rules::BLOCK_SEQ])?;
            groups.push(Rc::new(convert_block_seq(group)?));
        }
        Ok(groups)
    } else {
        Ok(vec![Rc::new(convert_block_seq(tree)?)])
    }
}

fn convert_argument_list(tree: &ParseTree) -> RunResult<ArgumentList> {
    verify_rule(tree, "parsing argument list", &[rules::ARGUMENT_LIST])?;
    let mut args = ArgumentList::empty(tree.meta.sloc());
    for child in &tree.children {
        let child_tree = expect_tree(
            Some(child),
            "parsing argument child list",
            &[rules::POSITIONAL_ARGUMENT_LIST, rules::NAMED_ARGUMENT_LIST],
        )?;
        match child_tree.rule.as_str() {
            rules::POSITIONAL_ARGUMENT_LIST => {
                for item in &child_tree.children {
                    args.positional.push(convert_expression(item)?);
                }
            }
            rules::NAMED_ARGUMENT_LIST => {
                for item in &child_tree.children {
                    let named = expect_tree(Some(item), "parsing named argument", &[rules::NAMED_ARGUMENT])?;
                    let name = named
                        .child(0)
                        .and_then(ParseNode::as_token)
                        .ok_or_else(|| {
                            CbError::uncaught_syntax("named argument carries no name token", named.meta.sloc())
                        })?
                        .value
                        .trim()
                        .to_owned();
                    let value_node = named.child(1).ok_or_else(|| {
                        CbError::uncaught_syntax("named argument carries no value expression", named.meta.sloc())
                    })?;
                    args.named.insert(name, convert_expression(value_node)?);
                }
            }
            _ => unreachable!("expect_tree restricted the rule"),
        }
    }
    Ok(args)
}

fn convert_expression(node: &ParseNode) -> RunResult<ExprLoc> {
    let tree = node.as_tree().ok_or_else(|| {
        CbError::uncaught_syntax("expected an expression rule node, found a bare token", node.sloc())
    })?;
    let sloc = tree.meta.sloc();
    match tree.rule.as_str() {
        rules::EXPRESSION => {
            let inner = tree
                .child(0)
                .ok_or_else(|| CbError::uncaught_syntax("expression rule carries no operand", sloc))?;
            convert_expression(inner)
        }
        rules::ATOM_STRING => {
            let raw = tree
                .first_token_value()
                .ok_or_else(|| CbError::uncaught_syntax("string atom carries no token", sloc))?;
            Ok(ExprLoc::new(sloc, Expr::Atom(Value::str(sloc, unquote(raw)))))
        }
        rules::ATOM_NUMBER => {
            let raw = tree
                .first_token_value()
                .ok_or_else(|| CbError::uncaught_syntax("number atom carries no token", sloc))?;
            let number: f64 = raw
                .trim()
                .parse()
                .map_err(|_| CbError::uncaught_syntax(format!("malformed number token '{raw}'"), sloc))?;
            Ok(ExprLoc::new(sloc, Expr::Atom(Value::number(sloc, number))))
        }
        rules::ATOM_BOOLEAN => {
            let raw = tree
                .first_token_value()
                .ok_or_else(|| CbError::uncaught_syntax("boolean atom carries no token", sloc))?;
            let value = match raw.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                other => {
                    return Err(CbError::uncaught_syntax(format!("malformed boolean token '{other}'"), sloc));
                }
            };
            Ok(ExprLoc::new(sloc, Expr::Atom(Value::bool(sloc, value))))
        }
        rules::ATOM_IDENTIFIER => {
            let raw = tree
                .first_token_value()
                .ok_or_else(|| CbError::uncaught_syntax("identifier atom carries no token", sloc))?;
            Ok(ExprLoc::new(sloc, Expr::Atom(Value::identifier(sloc, raw.trim()))))
        }
        rules::ATOM_NULL => Ok(ExprLoc::new(sloc, Expr::Atom(Value::null(sloc)))),
        rules::OP_NEG | rules::OP_NOT => {
            let operand_node = tree
                .child(0)
                .ok_or_else(|| CbError::uncaught_syntax("unary operator carries no operand", sloc))?;
            let op = if tree.rule == rules::OP_NEG { UnaryOp::Neg } else { UnaryOp::Not };
            Ok(ExprLoc::new(
                sloc,
                Expr::Unary {
                    op,
                    operand: Box::new(convert_expression(operand_node)?),
                },
            ))
        }
        rules::COLLECTION_LIST => {
            let items = match tree.child(0) {
                None => Vec::new(),
                Some(items_node) => {
                    let items_tree = expect_tree(
                        Some(items_node),
                        "list collection items",
                        &[rules::POSITIONAL_ARGUMENT_LIST],
                    )?;
                    items_tree
                        .children
                        .iter()
                        .map(convert_expression)
                        .collect::<RunResult<Vec<_>>>()?
                }
            };
            Ok(ExprLoc::new(sloc, Expr::ListLiteral(items)))
        }
        rules::COLLECTION_DICT => {
            let mut entries = Vec::new();
            if let Some(items_node) = tree.child(0) {
                let items_tree = expect_tree(Some(items_node), "dict collection items", &[rules::NAMED_ARGUMENT_LIST])?;
                for item in &items_tree.children {
                    let pair = expect_tree(Some(item), "dict item", &[rules::DICT_ITEM, rules::NAMED_ARGUMENT])?;
                    let key_raw = pair
                        .child(0)
                        .and_then(ParseNode::as_token)
                        .ok_or_else(|| CbError::uncaught_syntax("dict item carries no key token", pair.meta.sloc()))?
                        .value
                        .clone();
                    let value_node = pair.child(1).ok_or_else(|| {
                        CbError::uncaught_syntax("dict item carries no value expression", pair.meta.sloc())
                    })?;
                    entries.push((unquote(&key_raw), convert_expression(value_node)?));
                }
            }
            Ok(ExprLoc::new(sloc, Expr::MappingLiteral(entries)))
        }
        other => {
            if let Some(op) = binary_op_for_rule(other) {
                let left_node = tree
                    .child(0)
                    .ok_or_else(|| CbError::uncaught_syntax("binary operator carries no left operand", sloc))?;
                let right_node = tree
                    .child(1)
                    .ok_or_else(|| CbError::uncaught_syntax("binary operator carries no right operand", sloc))?;
                Ok(ExprLoc::new(
                    sloc,
                    Expr::Binary {
                        op,
                        left: Box::new(convert_expression(left_node)?),
                        right: Box::new(convert_expression(right_node)?),
                    },
                ))
            } else {
                Err(CbError::uncaught_syntax(
                    format!("unknown expression rule '{other}'"),
                    sloc,
                ))
            }
        }
    }
}

fn binary_op_for_rule(rule: &str) -> Option<BinaryOp> {
    let op = match rule {
        rules::OP_ADD => BinaryOp::Add,
        rules::OP_SUB => BinaryOp::Sub,
        rules::OP_MUL => BinaryOp::Mul,
        rules::OP_DIV => BinaryOp::Div,
        rules::OP_AND => BinaryOp::And,
        rules::OP_OR => BinaryOp::Or,
        rules::OP_LESSTHAN => BinaryOp::Lt,
        rules::OP_LESSTHANEQUAL => BinaryOp::LtE,
        rules::OP_GREATERTHAN => BinaryOp::Gt,
        rules::OP_GREATERTHANEQUAL => BinaryOp::GtE,
        rules::OP_EQUAL => BinaryOp::Eq,
        rules::OP_NOTEQUAL => BinaryOp::NotEq,
        rules::OP_IN => BinaryOp::In,
        _ => return None,
    };
    Some(op)
}

/// Flattens every token value in the subtree, in order.
fn collect_token_text(tree: &ParseTree) -> String {
    let mut out = String::new();
    for child in &tree.children {
        match child {
            ParseNode::Token(token) => out.push_str(&token.value),
            ParseNode::Tree(inner) => out.push_str(&collect_token_text(inner)),
        }
    }
    out
}

/// Strips one layer of matching quotes from a string token's lexeme.
fn unquote(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return raw[1..raw.len() - 1].to_owned();
        }
    }
    raw.to_owned()
}

fn expect_tree<'a>(node: Option<&'a ParseNode>, purpose: &str, allowed: &[&str]) -> RunResult<&'a ParseTree> {
    let Some(node) = node else {
        return Err(CbError::uncaught_syntax(
            format!("{purpose}: expected a rule node from {allowed:?}, found nothing"),
            SourceLoc::UNKNOWN,
        ));
    };
    let Some(tree) = node.as_tree() else {
        return Err(CbError::uncaught_syntax(
            format!("{purpose}: expected a rule node from {allowed:?}, found a token"),
            node.sloc(),
        ));
    };
    verify_rule(tree, purpose, allowed)?;
    Ok(tree)
}

fn verify_rule(tree: &ParseTree, purpose: &str, allowed: &[&str]) -> RunResult<()> {
    if allowed.contains(&tree.rule.as_str()) {
        Ok(())
    } else {
        Err(CbError::uncaught_syntax(
            format!("{purpose}: expected a rule from {allowed:?}, found '{}'", tree.rule),
            tree.meta.sloc(),
        ))
    }
}
