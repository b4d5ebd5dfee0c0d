//! Declarative builtins: variable/constant declaration, assignment, and tag
//! definition.

use std::rc::Rc;

use crate::{
    ast::BlockSeq,
    error::{CbError, RunResult},
    functions::{BoundArgs, FuncDef, ParamDef, ParamKind},
    run::{Rmode, RunCtx},
    sloc::SourceLoc,
    value::Value,
};

pub(crate) fn function_list() -> Vec<FuncDef> {
    vec![
        FuncDef::new(
            "declareVar",
            "Declares a variable",
            vec![
                ParamDef::new("var", "The variable name to set", None, ParamKind::Identifier, false),
                ParamDef::new(
                    "val",
                    "Initial value for the variable",
                    Some(Value::null(SourceLoc::UNKNOWN)),
                    ParamKind::Any,
                    true,
                ),
                ParamDef::new("desc", "Description", Some(Value::from("")), ParamKind::Any, true),
            ],
            None,
            None,
            func_declare_var,
        ),
        FuncDef::new(
            "declareConst",
            "Declares a constant",
            vec![
                ParamDef::new("var", "The variable name to set", None, ParamKind::Identifier, false),
                ParamDef::new("val", "Initial value for the constant", None, ParamKind::Any, true),
                ParamDef::new("desc", "Description", Some(Value::from("")), ParamKind::Any, true),
            ],
            None,
            None,
            func_declare_const,
        ),
        FuncDef::new(
            "set",
            "Sets a variable to a value",
            vec![
                ParamDef::new("var", "The variable name to set", None, ParamKind::Identifier, false),
                ParamDef::new("val", "The new value for the variable", None, ParamKind::Any, true),
            ],
            None,
            None,
            func_set,
        ),
        FuncDef::new(
            "defineTag",
            "Defines a tag",
            vec![ParamDef::new(
                "tagId",
                "The dotted identifier used to refer to the tag",
                None,
                ParamKind::Str,
                true,
            )],
            None,
            None,
            func_define_tag,
        ),
    ]
}

fn require_run_mode(rmode: Rmode, function_name: &str, astloc: SourceLoc) -> RunResult<()> {
    if rmode == Rmode::Run {
        Ok(())
    } else {
        Err(CbError::internal(
            format!("in function {function_name} but rmode != run; do not know what to do"),
            astloc,
        ))
    }
}

fn func_declare_var(
    ctx: &mut RunCtx<'_>,
    rmode: Rmode,
    astloc: SourceLoc,
    args: &BoundArgs,
    _targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    require_run_mode(rmode, "declareVar", astloc)?;
    let name = args.value(astloc, "var")?.expect_identifier()?.to_owned();
    let description = args.value(astloc, "desc")?.expect_str()?.to_owned();
    let value = args.value(astloc, "val")?.clone();
    ctx.env.declare(astloc, &name, &description, value, false)?;
    Ok(Value::null(astloc))
}

fn func_declare_const(
    ctx: &mut RunCtx<'_>,
    rmode: Rmode,
    astloc: SourceLoc,
    args: &BoundArgs,
    _targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    require_run_mode(rmode, "declareConst", astloc)?;
    let name = args.value(astloc, "var")?.expect_identifier()?.to_owned();
    let description = args.value(astloc, "desc")?.expect_str()?.to_owned();
    let value = args.value(astloc, "val")?.clone();
    ctx.env.declare(astloc, &name, &description, value, true)?;
    Ok(Value::null(astloc))
}

fn func_set(
    ctx: &mut RunCtx<'_>,
    rmode: Rmode,
    astloc: SourceLoc,
    args: &BoundArgs,
    _targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    require_run_mode(rmode, "set", astloc)?;
    let name = args.value(astloc, "var")?.expect_identifier()?.to_owned();
    let value = args.value(astloc, "val")?.clone();
    ctx.env.set(astloc, &name, value, true)?;
    Ok(Value::null(astloc))
}

fn func_define_tag(
    ctx: &mut RunCtx<'_>,
    rmode: Rmode,
    astloc: SourceLoc,
    args: &BoundArgs,
    _targets: &[Rc<BlockSeq>],
) -> RunResult<Value> {
    require_run_mode(rmode, "defineTag", astloc)?;
    let tag_id = args.value(astloc, "tagId")?.expect_str()?.to_owned();
    ctx.tags.define(&tag_id);
    Ok(Value::null(astloc))
}
