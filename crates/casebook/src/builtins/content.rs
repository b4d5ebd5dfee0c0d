//! Output-producing builtins.
//!
//! These validate their arguments through the normal protocol and contribute
//! deterministic placeholder text; the concrete typeset rendering of each is
//! supplied by the external renderer. `print` and `gaintag` carry real
//! interpreter-side behavior on top of the placeholder.

use std::rc::Rc;

use crate::{
    ast::BlockSeq,
    error::RunResult,
    functions::{BoundArgs, FuncDef, ParamDef, ParamKind, ReturnKind},
    run::{Rmode, RunCtx},
    sloc::SourceLoc,
    value::Value,
};

pub(crate) fn function_list() -> Vec<FuncDef> {
    let text = Some(ReturnKind::Text);
    vec![
        FuncDef::new(
            "blurbCoverPage",
            "Creates a cover page blurb",
            vec![],
            text,
            Some(1),
            func_blurb_cover_page,
        ),
        FuncDef::new(
            "image",
            "Insert an image",
            vec![
                ParamDef::new("path", "Relative path to file image", None, ParamKind::Str, true),
                ParamDef::new("height", "Height (e.g. 3in)", Some(Value::from("")), ParamKind::Str, true),
            ],
            text,
            None,
            func_image,
        ),
        FuncDef::new(
            "include",
            "Include a file in output",
            vec![ParamDef::new(
                "path",
                "Relative path to file to insert",
                None,
                ParamKind::Str,
                true,
            )],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "leadid",
            "Add reference to a lead",
            vec![ParamDef::new("id", "ID of lead", None, ParamKind::Str, true)],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "golead",
            "Add text to go to lead",
            vec![
                ParamDef::new("id", "ID of lead", None, ParamKind::Str, true),
                ParamDef::new("link", "Text link", Some(Value::from("")), ParamKind::Str, true),
            ],
            text,
            None,
            func_unimplemented,
        ),
        FuncDef::new(
            "returnlead",
            "Add text to go to lead",
            vec![
                ParamDef::new("id", "ID of lead", None, ParamKind::Str, true),
                ParamDef::new("link", "Text link", Some(Value::from("")), ParamKind::Str, true),
            ],
            text,
            None,
            func_unimplemented,
        ),
        FuncDef::new(
            "reflead",
            "Add text to refer to lead",
            vec![ParamDef::new("id", "ID of lead", None, ParamKind::Str, true)],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "gaintag",
            "Mark a tag",
            vec![
                ParamDef::new("id", "ID of tag", None, ParamKind::Str, true),
                ParamDef::new(
                    "define",
                    "Should the tag be defined if it doesn't exist?",
                    Some(Value::from(false)),
                    ParamKind::Bool,
                    true,
                ),
            ],
            text,
            None,
            func_gaintag,
        ),
        FuncDef::new(
            "hastag",
            "Check if user has tag",
            vec![
                ParamDef::new("id", "ID of tag", None, ParamKind::Str, true),
                ParamDef::new("time", "how many clicks", Some(Value::from(0.0)), ParamKind::Number, true),
            ],
            text,
            None,
            func_unimplemented,
        ),
        FuncDef::new(
            "requiretag",
            "Put the target block in a new lead and only let them go there if they have tag",
            vec![
                ParamDef::new("id", "ID of tag", None, ParamKind::Str, true),
                ParamDef::new("time", "how many clicks", Some(Value::from(0.0)), ParamKind::Number, true),
            ],
            text,
            Some(1),
            func_unimplemented,
        ),
        FuncDef::new(
            "missingtag",
            "Is player missing a tag",
            vec![ParamDef::new("id", "ID of tag", None, ParamKind::Str, true)],
            text,
            None,
            func_unimplemented,
        ),
        FuncDef::new(
            "mentiontags",
            "Mention a list of tags",
            vec![ParamDef::new(
                "tags",
                "list of tags",
                Some(Value::from(Vec::new())),
                ParamKind::List,
                true,
            )],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "dictfunc",
            "test",
            vec![ParamDef::new(
                "adict",
                "test dictionary",
                Some(Value::mapping(SourceLoc::UNKNOWN, indexmap::IndexMap::new())),
                ParamKind::Mapping,
                true,
            )],
            text,
            None,
            func_unimplemented,
        ),
        FuncDef::new(
            "deadlineinfo",
            "Insert deadline info",
            vec![
                ParamDef::new("day", "description n/a", None, ParamKind::Number, true),
                ParamDef::new("section", "description n/a", None, ParamKind::Str, true),
                ParamDef::new("time", "description n/a", None, ParamKind::Number, true),
                ParamDef::new("start", "description n/a", None, ParamKind::Number, true),
                ParamDef::new("end", "description n/a", None, ParamKind::Number, true),
                ParamDef::new("last", "description n/a", Some(Value::from(false)), ParamKind::Bool, true),
            ],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "remind",
            "Insert reminder",
            vec![ParamDef::new("type", "Reminder type", None, ParamKind::Str, true)],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "stop",
            "Insert stop text",
            vec![ParamDef::new("type", "Stop type", None, ParamKind::Str, true)],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "symbol",
            "Insert symbol (unicode/icon) text",
            vec![ParamDef::new("id", "Symbol id", None, ParamKind::Str, true)],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "mark",
            "Mark checkboxes",
            vec![
                ParamDef::new("type", "Mark type", None, ParamKind::Str, true),
                ParamDef::new("count", "How many to mark", Some(Value::from(1.0)), ParamKind::Number, true),
            ],
            text,
            None,
            func_unimplemented,
        ),
        FuncDef::new(
            "format",
            "Format text",
            vec![ParamDef::new("style", "style type", None, ParamKind::Str, true)],
            text,
            Some(1),
            func_unimplemented_unified,
        ),
        FuncDef::new("radio", "Format for radio", vec![], text, Some(1), func_unimplemented_unified),
        FuncDef::new("box", "Format in box", vec![], text, Some(1), func_unimplemented_unified),
        FuncDef::new(
            "logicsuggests",
            "Add mindmap node",
            vec![
                ParamDef::new("id", "Lead id", None, ParamKind::Str, true),
                ParamDef::new("link", "Link label", Some(Value::from("")), ParamKind::Str, true),
            ],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "logicsuggestedby",
            "Add mindmap node",
            vec![
                ParamDef::new("id", "Lead id", None, ParamKind::Str, true),
                ParamDef::new("link", "Link label", Some(Value::from("")), ParamKind::Str, true),
            ],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "logicimplies",
            "Add mindmap node",
            vec![
                ParamDef::new("id", "Lead id", None, ParamKind::Str, true),
                ParamDef::new("link", "Link label", Some(Value::from("")), ParamKind::Str, true),
            ],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "logicimpliedby",
            "Add mindmap node",
            vec![
                ParamDef::new("id", "Lead id", None, ParamKind::Str, true),
                ParamDef::new("link", "Link label", Some(Value::from("")), ParamKind::Str, true),
            ],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "logicirrelevant",
            "Add mindmap node",
            vec![
                ParamDef::new("id", "Lead id", Some(Value::from("")), ParamKind::Str, true),
                ParamDef::new("link", "Link label", Some(Value::from("")), ParamKind::Str, true),
            ],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "inlineback",
            "Create inline",
            vec![
                ParamDef::new("link", "Text link", Some(Value::from("")), ParamKind::Str, true),
                ParamDef::new("time", "Time clicks", Some(Value::from(0.0)), ParamKind::Number, true),
            ],
            text,
            Some(1),
            func_unimplemented,
        ),
        FuncDef::new(
            "inline",
            "Create inline",
            vec![
                ParamDef::new("link", "Text link", Some(Value::from("")), ParamKind::Str, true),
                ParamDef::new("time", "Time clicks", Some(Value::from(0.0)), ParamKind::Number, true),
                ParamDef::new(
                    "demerits",
                    "Demerit checkboxes",
                    Some(Value::from(0.0)),
                    ParamKind::Number,
                    true,
                ),
                ParamDef::new("unless", "Unless text", Some(Value::from("")), ParamKind::Str, true),
            ],
            text,
            Some(1),
            func_unimplemented,
        ),
        FuncDef::new(
            "inlinehint",
            "Create inline",
            vec![
                ParamDef::new("link", "Text link", Some(Value::from("")), ParamKind::Str, true),
                ParamDef::new("time", "Time clicks", Some(Value::from(0.0)), ParamKind::Number, true),
                ParamDef::new(
                    "demerits",
                    "Demerit checkboxes",
                    Some(Value::from(2.0)),
                    ParamKind::Number,
                    true,
                ),
            ],
            text,
            Some(1),
            func_unimplemented,
        ),
        FuncDef::new(
            "time",
            "Instruct player to advance clock by some clicks",
            vec![ParamDef::new(
                "count",
                "How many clicks",
                Some(Value::from(1.0)),
                ParamKind::Number,
                true,
            )],
            text,
            None,
            func_unimplemented,
        ),
        FuncDef::new(
            "beforeday",
            "Text saying if before day",
            vec![ParamDef::new("day", "Day number", None, ParamKind::Number, true)],
            text,
            None,
            func_unimplemented,
        ),
        FuncDef::new(
            "afterday",
            "Text saying if after day",
            vec![ParamDef::new("day", "Day number", None, ParamKind::Number, true)],
            text,
            None,
            func_unimplemented,
        ),
        FuncDef::new(
            "onday",
            "Text saying if on day",
            vec![ParamDef::new("day", "Day number", None, ParamKind::Number, true)],
            text,
            None,
            func_unimplemented,
        ),
        FuncDef::new("otherwise", "Text saying otherwise", vec![], text, None, func_unimplemented),
        FuncDef::new(
            "form",
            "Form field insert",
            vec![ParamDef::new("type", "Form field type", None, ParamKind::Str, true)],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "separator",
            "separator insert",
            vec![ParamDef::new("type", "Separator type", None, ParamKind::Str, true)],
            text,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new(
            "copynext",
            "instruction to copy body from next entry",
            vec![],
            None,
            None,
            func_unimplemented_unified,
        ),
        FuncDef::new("autohint", "generate an autohint", vec![], None, None, func_unimplemented_unified),
        FuncDef::new(
            "print",
            "print value",
            vec![ParamDef::new("expression", "Expression to print", None, ParamKind::Any, true)],
            text,
            None,
            func_print,
        ),
    ]
}

fn func_blurb_cover_page(
    _ctx: &mut RunCtx<'_>,
    _rmode: Rmode,
    astloc: SourceLoc,
    _args: &BoundArgs,
    _targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    Ok(Value::str(astloc, "BLURB COVER PAGE TODO"))
}

fn func_image(
    _ctx: &mut RunCtx<'_>,
    _rmode: Rmode,
    astloc: SourceLoc,
    _args: &BoundArgs,
    _targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    Ok(Value::str(astloc, "IMAGE INSERT TODO"))
}

/// Records the gained tag in the tag store, then yields the shared
/// placeholder text.
fn func_gaintag(
    ctx: &mut RunCtx<'_>,
    rmode: Rmode,
    astloc: SourceLoc,
    args: &BoundArgs,
    targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    let tag_id = args.value(astloc, "id")?.expect_str()?.to_owned();
    let define = args.value(astloc, "define")?.expect_bool()?;
    if rmode == Rmode::Run {
        ctx.tags.gain(astloc, &tag_id, define)?;
    }
    func_unimplemented(ctx, rmode, astloc, args, targets)
}

/// Renders the bound expression's display form.
fn func_print(
    _ctx: &mut RunCtx<'_>,
    _rmode: Rmode,
    astloc: SourceLoc,
    args: &BoundArgs,
    _targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    let value = args.value(astloc, "expression")?;
    Ok(Value::str(astloc, value.as_nice_string(true)))
}

fn func_unimplemented(
    _ctx: &mut RunCtx<'_>,
    rmode: Rmode,
    astloc: SourceLoc,
    _args: &BoundArgs,
    _targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    let text = if rmode == Rmode::Run {
        "Unimplemented function output".to_owned()
    } else {
        format!("Unimplemented function output (WARNING THIS FUNCTION IS NOT EXPECTED TO RUN IN '{rmode}' mode)")
    };
    Ok(Value::str(astloc, text))
}

fn func_unimplemented_unified(
    _ctx: &mut RunCtx<'_>,
    _rmode: Rmode,
    astloc: SourceLoc,
    _args: &BoundArgs,
    _targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    Ok(Value::str(astloc, "Unimplemented unified run/render function output"))
}
