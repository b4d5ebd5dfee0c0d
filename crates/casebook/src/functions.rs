//! Built-in function descriptors and the call-lowering protocol.
//!
//! Every built-in is declared once as a [`FuncDef`]: an ordered parameter
//! list with defaults, kinds, and optionality, a return kind, a target
//! brace-group arity, and a handler. Parse-derived and synthetic call sites
//! go through the same binding steps: positional fill, named fill, per-kind
//! resolution, validation, target arity check, invoke.

use std::{fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    args::ArgumentList,
    ast::BlockSeq,
    error::{CbError, ErrorKind, RunResult},
    expressions::ExprLoc,
    run::{Rmode, RunCtx},
    sloc::SourceLoc,
    value::{Value, ValueData},
};

/// Which values a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any value.
    Any,
    Bool,
    Number,
    Str,
    /// The argument expression is resolved with identifier resolution
    /// disabled, so the handler receives the raw identifier token.
    Identifier,
    List,
    Mapping,
    Object,
    /// The resolved value must be a string drawn from the listed literals.
    Choice(&'static [&'static str]),
}

/// Return kind of a built-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// The returned string contributes an output fragment to the current
    /// entry at statement level.
    Text,
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: &'static str,
    pub description: &'static str,
    /// Bound when the caller supplies nothing. An optional parameter with no
    /// default binds null.
    pub default: Option<Value>,
    pub kind: ParamKind,
    pub optional: bool,
}

impl ParamDef {
    pub fn new(
        name: &'static str,
        description: &'static str,
        default: Option<Value>,
        kind: ParamKind,
        optional: bool,
    ) -> Self {
        Self {
            name,
            description,
            default,
            kind,
            optional,
        }
    }

    fn kind_label(&self) -> &'static str {
        match self.kind {
            ParamKind::Any => "value",
            ParamKind::Bool => "bool",
            ParamKind::Number => "number",
            ParamKind::Str => "string",
            ParamKind::Identifier => "identifier",
            ParamKind::List => "list",
            ParamKind::Mapping => "mapping",
            ParamKind::Object => "object",
            ParamKind::Choice(_) => "string choice",
        }
    }
}

/// Handler invoked once arguments are bound and validated.
pub type FuncHandler =
    fn(&mut RunCtx<'_>, Rmode, SourceLoc, &BoundArgs, &[Rc<BlockSeq>]) -> RunResult<Value>;

/// A built-in function descriptor. Registered into the environment at
/// startup and first-class from then on.
pub struct FuncDef {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamDef>,
    pub return_kind: Option<ReturnKind>,
    /// Required number of target brace-groups; `None` accepts any count.
    pub target_group_arity: Option<usize>,
    pub handler: FuncHandler,
}

impl fmt::Debug for FuncDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("return_kind", &self.return_kind)
            .field("target_group_arity", &self.target_group_arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for FuncDef {
    /// Descriptors are registered once per name; identity follows the name.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Arguments after binding and resolution, keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    map: IndexMap<&'static str, Value>,
}

impl BoundArgs {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get(name)
    }

    /// Fetches a bound argument that the descriptor guarantees is present.
    pub fn value(&self, sloc: SourceLoc, name: &str) -> RunResult<&Value> {
        self.map
            .get(name)
            .ok_or_else(|| CbError::internal(format!("bound argument '{name}' is missing"), sloc))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl FuncDef {
    pub fn new(
        name: &'static str,
        description: &'static str,
        params: Vec<ParamDef>,
        return_kind: Option<ReturnKind>,
        target_group_arity: Option<usize>,
        handler: FuncHandler,
    ) -> Self {
        Self {
            name,
            description,
            params,
            return_kind,
            target_group_arity,
            handler,
        }
    }

    /// Binds a call site's arguments to this descriptor's parameters.
    ///
    /// Positional arguments fill the leading parameters in order, then named
    /// arguments fill the rest by name. Collisions, unknown names, and
    /// missing required parameters are errors. Each bound expression is
    /// resolved according to its parameter's kind and validated.
    pub fn bind_args(
        &self,
        ctx: &RunCtx<'_>,
        call_sloc: SourceLoc,
        args: &ArgumentList,
    ) -> RunResult<BoundArgs> {
        if args.positional.len() > self.params.len() {
            return Err(CbError::new(
                ErrorKind::UnknownArgument,
                format!(
                    "function '{}' takes at most {} positional arguments, got {}",
                    self.name,
                    self.params.len(),
                    args.positional.len()
                ),
                call_sloc,
            ));
        }

        // Pair each parameter with the caller expression bound to it.
        let mut bound_exprs: Vec<Option<&ExprLoc>> = vec![None; self.params.len()];
        for (index, expr) in args.positional.iter().enumerate() {
            bound_exprs[index] = Some(expr);
        }
        for (name, expr) in &args.named {
            let Some(param_index) = self.params.iter().position(|p| p.name == name.as_str()) else {
                return Err(CbError::new(
                    ErrorKind::UnknownArgument,
                    format!("function '{}' has no parameter named '{name}'", self.name),
                    expr.sloc,
                ));
            };
            if bound_exprs[param_index].is_some() {
                return Err(CbError::new(
                    ErrorKind::DoubleBind,
                    format!(
                        "parameter '{name}' of function '{}' is bound both positionally and by name",
                        self.name
                    ),
                    expr.sloc,
                ));
            }
            bound_exprs[param_index] = Some(expr);
        }

        let mut bound = BoundArgs::default();
        for (param, expr) in self.params.iter().zip(&bound_exprs) {
            let value = match expr {
                Some(expr) => {
                    let resolve_identifiers = param.kind != ParamKind::Identifier;
                    let value = expr.resolve(ctx.env, resolve_identifiers)?;
                    self.check_param_value(param, &value)?;
                    value
                }
                None => match &param.default {
                    Some(default) => default.clone(),
                    None if param.optional => Value::null(call_sloc),
                    None => {
                        return Err(CbError::new(
                            ErrorKind::MissingArgument,
                            format!(
                                "function '{}' is missing its required '{}' argument",
                                self.name, param.name
                            ),
                            call_sloc,
                        ));
                    }
                },
            };
            bound.map.insert(param.name, value);
        }
        Ok(bound)
    }

    /// Validates a caller-supplied value against the parameter's kind.
    fn check_param_value(&self, param: &ParamDef, value: &Value) -> RunResult<()> {
        let ok = match param.kind {
            ParamKind::Any => true,
            ParamKind::Bool => matches!(value.data(), ValueData::Bool(_)),
            ParamKind::Number => matches!(value.data(), ValueData::Number(_)),
            ParamKind::Str => matches!(value.data(), ValueData::Str(_)),
            ParamKind::Identifier => matches!(value.data(), ValueData::Identifier(_)),
            ParamKind::List => matches!(value.data(), ValueData::List(_)),
            ParamKind::Mapping => matches!(value.data(), ValueData::Mapping(_)),
            ParamKind::Object => matches!(value.data(), ValueData::Object(_)),
            ParamKind::Choice(choices) => match value.data() {
                ValueData::Str(s) => {
                    if choices.contains(&s.as_str()) {
                        true
                    } else {
                        return Err(CbError::type_error(
                            format!(
                                "argument '{}' of function '{}' must be one of {choices:?}, got '{s}'",
                                param.name, self.name
                            ),
                            value.sloc(),
                        ));
                    }
                }
                _ => false,
            },
        };
        if ok {
            Ok(())
        } else {
            Err(CbError::type_error(
                format!(
                    "argument '{}' of function '{}' expects a {} value, found {} ({})",
                    param.name,
                    self.name,
                    param.kind_label(),
                    value.kind_name(),
                    value.as_nice_string(false)
                ),
                value.sloc(),
            ))
        }
    }

    /// Lowers one call: bind, validate target arity, run the handler.
    pub fn invoke(
        &self,
        ctx: &mut RunCtx<'_>,
        rmode: Rmode,
        astloc: SourceLoc,
        args: &ArgumentList,
        targets: &[Rc<BlockSeq>],
    ) -> RunResult<Value> {
        let bound = self.bind_args(ctx, astloc, args)?;
        if let Some(arity) = self.target_group_arity {
            if targets.len() != arity {
                return Err(CbError::type_error(
                    format!(
                        "function '{}' expects exactly {arity} target group(s), got {}",
                        self.name,
                        targets.len()
                    ),
                    astloc,
                ));
            }
        }
        (self.handler)(ctx, rmode, astloc, &bound, targets)
    }
}
