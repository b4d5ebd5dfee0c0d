//! End-to-end evaluation: tasks, modes, the always-run override, control
//! flow, options application, and error propagation.

mod common;

use casebook::{ChildSort, Context, ErrorKind, LayoutStyle, NoTrace, Rmode, Task, rules};
use common::*;
use pretty_assertions::assert_eq;

fn run_task(interp: &mut casebook::Interpreter, rmode: Rmode) -> casebook::RunResult<Task> {
    interp.task_render_run(Task::new("test", rmode), &mut NoTrace)
}

// =============================================================================
// 1. declarations & assignment through documents
// =============================================================================

/// declareVar + set + print: `x = 1; x = x + 2; print(x)` emits 3.
#[test]
fn var_set_print_emits_sum() {
    let blocks = vec![
        call_block("declareVar", arg_list(vec![ident("x"), num(1.0)], vec![]), vec![]),
        call_block(
            "set",
            arg_list(vec![ident("x"), binop(rules::OP_ADD, ident("x"), num(2.0))], vec![]),
            vec![],
        ),
        call_block("print", arg_list(vec![ident("x")], vec![]), vec![]),
    ];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    run_task(&mut interp, Rmode::Render).unwrap();
    let id = top_entry(&interp, "SETUP");
    assert_eq!(output_text(&interp, id), "3");
}

/// Reassigning a constant fails with both the assignment and declaration
/// sites attached.
#[test]
fn const_reassignment_fails_with_two_locations() {
    let blocks = vec![
        call_block("declareConst", arg_list(vec![ident("y"), num(5.0)], vec![]), vec![]),
        call_block("set", arg_list(vec![ident("y"), num(6.0)], vec![]), vec![]),
    ];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    let err = run_task(&mut interp, Rmode::Render).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConstAssignment);
    assert_eq!(err.slocs.len(), 2);
}

/// Dotted assignment writes through a pre-registered mapping and reads back.
#[test]
fn dotted_set_on_builtin_mapping_roundtrips() {
    let blocks = vec![
        call_block("set", arg_list(vec![ident("info.title"), sstr("Noir")], vec![]), vec![]),
        call_block("print", arg_list(vec![ident("info.title")], vec![]), vec![]),
    ];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    run_task(&mut interp, Rmode::Render).unwrap();
    assert_eq!(output_text(&interp, top_entry(&interp, "SETUP")), "Noir");
}

/// Declaring in run mode is fine; the same call in a non-special entry under
/// a render task refuses to run.
#[test]
fn declare_outside_run_mode_is_an_error() {
    let blocks = vec![call_block(
        "declareVar",
        arg_list(vec![ident("x"), num(1.0)], vec![]),
        vec![],
    )];
    let (mut interp, _) = interp_from(vec![section("DAY1", blocks)]);
    let err = run_task(&mut interp, Rmode::Render).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InternalError);
}

// =============================================================================
// 2. the always-run override
// =============================================================================

/// COVER runs under run mode even on a render task, so a variable it
/// declares is visible when DAY1's body evaluates under render.
#[test]
fn always_run_entries_run_before_render_entries() {
    let cover = section(
        "COVER",
        vec![call_block("declareVar", arg_list(vec![ident("z"), num(1.0)], vec![]), vec![])],
    );
    let day = section("DAY1", vec![expr_block(binop(rules::OP_ADD, ident("z"), num(1.0)))]);
    let (mut interp, _) = interp_from(vec![cover, day]);
    run_task(&mut interp, Rmode::Render).unwrap();
}

/// The override applies only at the top level: an entry named SETUP nested
/// inside another entry inherits its caller's render mode.
#[test]
fn always_run_override_is_top_level_only() {
    let nested_setup = entry_node(
        2,
        "SETUP",
        None,
        None,
        Some(vec![call_block(
            "declareVar",
            arg_list(vec![ident("q"), num(1.0)], vec![]),
            vec![],
        )]),
        vec![],
    );
    let (mut interp, _) = interp_from(vec![entry_node(1, "DAY1", None, None, None, vec![nested_setup])]);
    let err = run_task(&mut interp, Rmode::Render).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InternalError);
}

// =============================================================================
// 3. control flow
// =============================================================================

/// The taken if-branch contributes output; the untaken one does not.
#[test]
fn if_takes_true_branch() {
    let blocks = vec![
        call_block("declareVar", arg_list(vec![ident("x"), num(2.0)], vec![]), vec![]),
        if_else_block(
            binop(rules::OP_GREATERTHAN, ident("x"), num(1.0)),
            vec![text_block("big")],
            Some(vec![text_block("small")]),
        ),
    ];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    run_task(&mut interp, Rmode::Render).unwrap();
    assert_eq!(output_text(&interp, top_entry(&interp, "SETUP")), "big");
}

/// The else path evaluates the else consequence block sequence.
#[test]
fn if_takes_else_branch() {
    let blocks = vec![if_else_block(
        boolean(false),
        vec![text_block("then")],
        Some(vec![text_block("else")]),
    )];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    run_task(&mut interp, Rmode::Render).unwrap();
    assert_eq!(output_text(&interp, top_entry(&interp, "SETUP")), "else");
}

/// An elif chain is itself an if: the matching arm wins.
#[test]
fn elif_chain_selects_matching_arm() {
    let blocks = vec![
        call_block("declareVar", arg_list(vec![ident("x"), num(2.0)], vec![]), vec![]),
        if_elif_block(
            binop(rules::OP_EQUAL, ident("x"), num(1.0)),
            vec![text_block("one")],
            binop(rules::OP_EQUAL, ident("x"), num(2.0)),
            vec![text_block("two")],
            Some(vec![text_block("other")]),
        ),
    ];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    run_task(&mut interp, Rmode::Render).unwrap();
    assert_eq!(output_text(&interp, top_entry(&interp, "SETUP")), "two");
}

/// A non-bool condition is a type error.
#[test]
fn if_condition_must_be_bool() {
    let blocks = vec![if_else_block(num(1.0), vec![text_block("then")], None)];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    let err = run_task(&mut interp, Rmode::Render).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}

/// The for loop binds each list item in order in a child scope.
#[test]
fn for_loop_iterates_list_in_order() {
    let blocks = vec![for_block(
        "item",
        list_expr(vec![sstr("a"), sstr("b"), sstr("c")]),
        vec![call_block("print", arg_list(vec![ident("item")], vec![]), vec![])],
    )];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    run_task(&mut interp, Rmode::Render).unwrap();
    assert_eq!(output_text(&interp, top_entry(&interp, "SETUP")), "abc");
}

/// The loop variable does not escape the loop's child scope.
#[test]
fn for_loop_variable_does_not_escape() {
    let blocks = vec![
        for_block(
            "item",
            list_expr(vec![num(1.0)]),
            vec![expr_block(ident("item"))],
        ),
        expr_block(ident("item")),
    ];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    let err = run_task(&mut interp, Rmode::Render).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Undeclared);
}

/// Iterating anything but a list is a type error.
#[test]
fn for_loop_rejects_non_list() {
    let blocks = vec![for_block("item", num(3.0), vec![text_block("x")])];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    let err = run_task(&mut interp, Rmode::Render).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}

// =============================================================================
// 4. output accumulation
// =============================================================================

/// Text, newlines, and text-returning function calls land in the entry's
/// output in block order.
#[test]
fn output_preserves_block_order() {
    let blocks = vec![
        text_block("You arrive early."),
        newline_block(),
        call_block("image", arg_list(vec![], vec![("path", sstr("docks.png"))]), vec![]),
    ];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    run_task(&mut interp, Rmode::Render).unwrap();
    assert_eq!(
        output_text(&interp, top_entry(&interp, "SETUP")),
        "You arrive early.\nIMAGE INSERT TODO"
    );
}

/// The render document snapshot mirrors entry structure and chunk order.
#[test]
fn render_doc_mirrors_entries() {
    let lead = entry_node(2, "12 SW", None, None, Some(vec![text_block("dock text")]), vec![]);
    let (mut interp, _) = interp_from(vec![
        section("SETUP", vec![text_block("setup text")]),
        entry_node(1, "LEADS", None, None, None, vec![lead]),
    ]);
    let task = run_task(&mut interp, Rmode::Render).unwrap();
    let doc = task.renderer.expect("task collects a render doc");
    assert_eq!(doc.entries.len(), 2);
    assert_eq!(doc.entry_count(), 3);
    assert_eq!(doc.entries[1].children[0].id, "12 SW");
}

// =============================================================================
// 5. entry options
// =============================================================================

/// Header options flow through _entryApplyOptions into the entry's run
/// state before its body evaluates.
#[test]
fn entry_options_apply_before_body() {
    let options = arg_list(
        vec![],
        vec![
            ("autoid", boolean(true)),
            ("layoutStyle", sstr("cover")),
            ("childSort", sstr("alpha")),
        ],
    );
    let (mut interp, _) = interp_from(vec![entry_node(
        1,
        "COVER",
        None,
        Some(options),
        Some(vec![text_block("front")]),
        vec![],
    )]);
    run_task(&mut interp, Rmode::Render).unwrap();
    let entry = interp.ast.entry(top_entry(&interp, "COVER"));
    assert_eq!(entry.run_options.auto_id, Some(true));
    assert_eq!(entry.run_options.layout_style, LayoutStyle::Cover);
    assert_eq!(entry.run_options.child_sort, ChildSort::Alpha);
    assert!(entry.run_options.tombstones);
}

/// An options value outside the declared choice set is rejected.
#[test]
fn entry_options_reject_unknown_choice() {
    let options = arg_list(vec![], vec![("childSort", sstr("bogus"))]);
    let (mut interp, _) = interp_from(vec![entry_node(1, "SETUP", None, Some(options), None, vec![])]);
    let err = run_task(&mut interp, Rmode::Render).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}

// =============================================================================
// 6. tags
// =============================================================================

/// defineTag then gaintag records the tag; gaining an unknown tag without
/// define=true is an error.
#[test]
fn tags_define_and_gain() {
    let blocks = vec![
        call_block("defineTag", arg_list(vec![sstr("cond.alibi")], vec![]), vec![]),
        call_block("gaintag", arg_list(vec![], vec![("id", sstr("cond.alibi"))]), vec![]),
    ];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    run_task(&mut interp, Rmode::Render).unwrap();
    assert!(interp.tags.is_defined("cond.alibi"));
    assert!(interp.tags.is_gained("cond.alibi"));
}

#[test]
fn gaintag_requires_defined_tag() {
    let blocks = vec![call_block(
        "gaintag",
        arg_list(vec![], vec![("id", sstr("cond.unknown"))]),
        vec![],
    )];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    let err = run_task(&mut interp, Rmode::Render).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);

    let blocks = vec![call_block(
        "gaintag",
        arg_list(vec![], vec![("id", sstr("cond.unknown")), ("define", boolean(true))]),
        vec![],
    )];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    run_task(&mut interp, Rmode::Render).unwrap();
    assert!(interp.tags.is_gained("cond.unknown"));
}

// =============================================================================
// 7. error propagation
// =============================================================================

/// An undefined function name surfaces as UndefinedFunction.
#[test]
fn undefined_function_is_reported() {
    let blocks = vec![call_block("conjure", no_args(), vec![])];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    let err = run_task(&mut interp, Rmode::Render).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedFunction);
}

/// With continue-on-exception set, an entry's failure is reported and the
/// next entry still runs.
#[test]
fn run_continues_past_failing_entry_when_flagged() {
    let failing = section(
        "SETUP",
        vec![call_block("set", arg_list(vec![ident("ghost"), num(1.0)], vec![]), vec![])],
    );
    let healthy = section(
        "COVER",
        vec![call_block("declareVar", arg_list(vec![ident("ok"), num(1.0)], vec![]), vec![])],
    );
    let context = Context {
        continue_on_exception: true,
        ..Context::default()
    };
    let (mut interp, _) = interp_from_with_context(vec![failing, healthy], context);
    let mut trace = casebook::CollectTrace::new();
    interp.task_render_run(Task::new("test", Rmode::Render), &mut trace).unwrap();
    assert!(trace.as_str().contains("CONTINUING AFTER EXCEPTION"));
    assert!(interp.env.get(casebook::SourceLoc::UNKNOWN, "ok", None).unwrap().is_some());
}

/// Without the flag, the first failing entry aborts the task.
#[test]
fn run_aborts_without_continue_flag() {
    let failing = section(
        "SETUP",
        vec![call_block("set", arg_list(vec![ident("ghost"), num(1.0)], vec![]), vec![])],
    );
    let (mut interp, _) = interp_from(vec![failing]);
    let err = run_task(&mut interp, Rmode::Render).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Undeclared);
}

/// Declaring a loop variable that shadows an outer name warns but runs.
#[test]
fn shadowing_loop_variable_warns() {
    let blocks = vec![
        call_block("declareVar", arg_list(vec![ident("item"), num(0.0)], vec![]), vec![]),
        for_block("item", list_expr(vec![num(1.0)]), vec![expr_block(ident("item"))]),
    ];
    let (mut interp, _) = interp_from(vec![section("SETUP", blocks)]);
    let mut trace = casebook::CollectTrace::new();
    interp.task_render_run(Task::new("test", Rmode::Render), &mut trace).unwrap();
    assert!(trace.as_str().contains("warning"));
    assert!(trace.as_str().contains("shadow"));
}
