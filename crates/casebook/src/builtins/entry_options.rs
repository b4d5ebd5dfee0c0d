//! The distinguished internal entry-options applier.
//!
//! Synthesized per entry before the entry's body runs: the evaluator injects
//! an object handle to the entry as the named argument `_entry` and invokes
//! this function through the normal call protocol, always in run mode.

use std::rc::Rc;

use crate::{
    ast::{BlockSeq, ChildSort, EntryRunOptions, LayoutStyle},
    error::{CbError, RunResult},
    functions::{BoundArgs, FuncDef, ParamDef, ParamKind},
    run::{Rmode, RunCtx},
    sloc::SourceLoc,
    value::{ObjectHandle, Value},
};

/// Name of the internal options applier; not user-callable by convention.
pub const APPLY_OPTIONS_FUNC: &str = "_entryApplyOptions";
/// Name of the synthetic argument carrying the entry object handle.
pub const ENTRY_ARG: &str = "_entry";

pub(crate) fn function_list() -> Vec<FuncDef> {
    vec![FuncDef::new(
        APPLY_OPTIONS_FUNC,
        "Internal function for applying options to an entry",
        vec![
            ParamDef::new(
                ENTRY_ARG,
                "Object pointer to the entry whose options are being set",
                None,
                ParamKind::Object,
                false,
            ),
            ParamDef::new(
                "autoid",
                "Automatically assign a lead id",
                Some(Value::from(false)),
                ParamKind::Bool,
                true,
            ),
            ParamDef::new(
                "special",
                "Is this a special entry?",
                Some(Value::from(false)),
                ParamKind::Bool,
                true,
            ),
            ParamDef::new("sortindex", "Sort index", Some(Value::from(-1.0)), ParamKind::Number, true),
            ParamDef::new(
                "childSort",
                "Sort order for children",
                Some(Value::from("")),
                ParamKind::Choice(&["", "alpha", "index"]),
                true,
            ),
            ParamDef::new(
                "layoutStyle",
                "Style for layout of entry",
                Some(Value::from("")),
                ParamKind::Choice(&["", "cover", "oneColumn", "solo", "twoColumn"]),
                true,
            ),
            ParamDef::new(
                "tombstones",
                "Should we show tombstones between child entries",
                Some(Value::from(true)),
                ParamKind::Bool,
                true,
            ),
            ParamDef::new(
                "labelcontd",
                "Add label saying 'continued from'",
                Some(Value::from("")),
                ParamKind::Str,
                true,
            ),
            ParamDef::new("time", "Time clicks", Some(Value::from(1.0)), ParamKind::Number, true),
            ParamDef::new(
                "deadline",
                "Deadline day for a check",
                Some(Value::from(-1.0)),
                ParamKind::Number,
                true,
            ),
        ],
        None,
        None,
        func_apply_entry_options,
    )]
}

fn func_apply_entry_options(
    ctx: &mut RunCtx<'_>,
    rmode: Rmode,
    astloc: SourceLoc,
    args: &BoundArgs,
    _targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    if rmode != Rmode::Run {
        return Err(CbError::internal(
            "in function _entryApplyOptions but rmode != run; do not know what to do",
            astloc,
        ));
    }
    let handle = args.value(astloc, ENTRY_ARG)?.expect_object()?;
    let &ObjectHandle::Entry(entry_id) = handle else {
        return Err(CbError::type_error(
            "the _entry argument must be an entry object handle",
            astloc,
        ));
    };

    let auto_id = args.value(astloc, "autoid")?.expect_bool()?;
    let special = args.value(astloc, "special")?.expect_bool()?;
    let sort_index = args.value(astloc, "sortindex")?.expect_number()?;
    let child_sort: ChildSort = parse_choice(args.value(astloc, "childSort")?, astloc)?;
    let layout_style: LayoutStyle = parse_choice(args.value(astloc, "layoutStyle")?, astloc)?;
    let tombstones = args.value(astloc, "tombstones")?.expect_bool()?;
    let label_contd = args.value(astloc, "labelcontd")?.expect_str()?.to_owned();
    let time = args.value(astloc, "time")?.expect_number()?;
    let deadline = args.value(astloc, "deadline")?.expect_number()?;

    ctx.ast.entry_mut(entry_id).run_options = EntryRunOptions {
        auto_id: Some(auto_id),
        special,
        sort_index,
        child_sort,
        layout_style,
        tombstones,
        label_contd,
        time,
        deadline,
    };
    Ok(Value::null(astloc))
}

/// Parses a choice-validated string argument into its enum. The binding step
/// already restricted the literal set, so failure here is an internal error.
fn parse_choice<T: std::str::FromStr>(value: &Value, astloc: SourceLoc) -> RunResult<T> {
    value
        .expect_str()?
        .parse()
        .map_err(|_| CbError::internal("choice-validated argument failed to parse", astloc))
}
