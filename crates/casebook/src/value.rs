//! The runtime value model.
//!
//! Values are a closed tagged union; operators and builtin parameter checks
//! dispatch on the variant at runtime. Every value carries the source location
//! that produced it so diagnostics can point back into the document; equality
//! deliberately ignores location.

use std::{cell::RefCell, fmt::Write as _, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::EntryId,
    error::{CbError, ErrorKind, RunResult},
    functions::FuncDef,
    run::Task,
    sloc::SourceLoc,
};

/// A runtime value together with the source location that produced it.
#[derive(Debug, Clone)]
pub struct Value {
    sloc: SourceLoc,
    data: ValueData,
}

/// The value payload variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueData {
    Null,
    Bool(bool),
    /// Numeric value; IEEE-754 double semantics for arithmetic and ordering.
    /// Equality on integral doubles is exact.
    Number(f64),
    Str(String),
    /// A symbolic reference not yet resolved against the environment. May be
    /// dotted (`a.b.c`). Produced when an expression is resolved with
    /// identifier resolution disabled.
    Identifier(String),
    List(Vec<Value>),
    Mapping(IndexMap<String, Value>),
    /// Opaque host-side record supporting property access via a dotted path.
    Object(ObjectHandle),
    /// A built-in function descriptor. First-class: can be stored in
    /// variables and passed around.
    Function(Rc<FuncDef>),
}

/// Handle to a host-side record. Reference-semantic: clones share the
/// underlying record, unlike `List`/`Mapping` values which clone deeply.
#[derive(Debug, Clone)]
pub enum ObjectHandle {
    /// An entry in the AST arena. Injected as the `_entry` argument of
    /// `_entryApplyOptions`; its properties are managed by the interpreter
    /// and are not reachable through dotted paths.
    Entry(EntryId),
    /// The task installed in the reserved `task` slot by the runner.
    Task(Rc<RefCell<Task>>),
    /// A generic property record.
    Record(Rc<RefCell<ObjectRecord>>),
}

/// A host record: a type tag plus named properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectRecord {
    pub type_name: String,
    pub props: IndexMap<String, Value>,
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Entry(a), Self::Entry(b)) => a == b,
            (Self::Task(a), Self::Task(b)) => Rc::ptr_eq(a, b),
            (Self::Record(a), Self::Record(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    /// Payload equality; the attached source location is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Value {
    pub fn new(sloc: SourceLoc, data: ValueData) -> Self {
        Self { sloc, data }
    }

    pub fn null(sloc: SourceLoc) -> Self {
        Self::new(sloc, ValueData::Null)
    }

    pub fn bool(sloc: SourceLoc, value: bool) -> Self {
        Self::new(sloc, ValueData::Bool(value))
    }

    pub fn number(sloc: SourceLoc, value: f64) -> Self {
        Self::new(sloc, ValueData::Number(value))
    }

    pub fn str(sloc: SourceLoc, value: impl Into<String>) -> Self {
        Self::new(sloc, ValueData::Str(value.into()))
    }

    pub fn identifier(sloc: SourceLoc, name: impl Into<String>) -> Self {
        Self::new(sloc, ValueData::Identifier(name.into()))
    }

    pub fn list(sloc: SourceLoc, items: Vec<Self>) -> Self {
        Self::new(sloc, ValueData::List(items))
    }

    pub fn mapping(sloc: SourceLoc, entries: IndexMap<String, Self>) -> Self {
        Self::new(sloc, ValueData::Mapping(entries))
    }

    pub fn object(sloc: SourceLoc, handle: ObjectHandle) -> Self {
        Self::new(sloc, ValueData::Object(handle))
    }

    pub fn function(sloc: SourceLoc, func: Rc<FuncDef>) -> Self {
        Self::new(sloc, ValueData::Function(func))
    }

    #[must_use]
    pub fn sloc(&self) -> SourceLoc {
        self.sloc
    }

    #[must_use]
    pub fn data(&self) -> &ValueData {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> ValueData {
        self.data
    }

    #[must_use]
    pub fn with_sloc(mut self, sloc: SourceLoc) -> Self {
        self.sloc = sloc;
        self
    }

    /// Short kind tag used in error messages and operand dumps.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match &self.data {
            ValueData::Null => "null",
            ValueData::Bool(_) => "bool",
            ValueData::Number(_) => "number",
            ValueData::Str(_) => "string",
            ValueData::Identifier(_) => "identifier",
            ValueData::List(_) => "list",
            ValueData::Mapping(_) => "mapping",
            ValueData::Object(_) => "object",
            ValueData::Function(_) => "function",
        }
    }

    pub fn expect_bool(&self) -> RunResult<bool> {
        match &self.data {
            ValueData::Bool(b) => Ok(*b),
            _ => Err(self.expect_error("bool")),
        }
    }

    pub fn expect_number(&self) -> RunResult<f64> {
        match &self.data {
            ValueData::Number(n) => Ok(*n),
            _ => Err(self.expect_error("number")),
        }
    }

    pub fn expect_str(&self) -> RunResult<&str> {
        match &self.data {
            ValueData::Str(s) => Ok(s),
            _ => Err(self.expect_error("string")),
        }
    }

    pub fn expect_identifier(&self) -> RunResult<&str> {
        match &self.data {
            ValueData::Identifier(name) => Ok(name),
            _ => Err(self.expect_error("identifier")),
        }
    }

    pub fn expect_list(&self) -> RunResult<&[Self]> {
        match &self.data {
            ValueData::List(items) => Ok(items),
            _ => Err(self.expect_error("list")),
        }
    }

    pub fn expect_mapping(&self) -> RunResult<&IndexMap<String, Self>> {
        match &self.data {
            ValueData::Mapping(entries) => Ok(entries),
            _ => Err(self.expect_error("mapping")),
        }
    }

    pub fn expect_object(&self) -> RunResult<&ObjectHandle> {
        match &self.data {
            ValueData::Object(handle) => Ok(handle),
            _ => Err(self.expect_error("object")),
        }
    }

    pub fn expect_function(&self) -> RunResult<&Rc<FuncDef>> {
        match &self.data {
            ValueData::Function(func) => Ok(func),
            _ => Err(self.expect_error("function")),
        }
    }

    fn expect_error(&self, wanted: &str) -> CbError {
        CbError::type_error(
            format!(
                "expected a {wanted} value, found {} ({})",
                self.kind_name(),
                self.as_nice_string(false)
            ),
            self.sloc,
        )
    }

    /// Stable textual form used in diagnostics and by `print`.
    ///
    /// With `for_display` strings render bare; otherwise they are quoted.
    /// Deterministic per variant.
    #[must_use]
    pub fn as_nice_string(&self, for_display: bool) -> String {
        match &self.data {
            ValueData::Null => "null".to_owned(),
            ValueData::Bool(b) => b.to_string(),
            ValueData::Number(n) => format_number(*n),
            ValueData::Str(s) => {
                if for_display {
                    s.clone()
                } else {
                    format!("'{s}'")
                }
            }
            ValueData::Identifier(name) => name.clone(),
            ValueData::List(items) => {
                let mut out = String::from("[");
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&item.as_nice_string(false));
                }
                out.push(']');
                out
            }
            ValueData::Mapping(entries) => {
                let mut out = String::from("{");
                for (index, (key, item)) in entries.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{key}: {}", item.as_nice_string(false));
                }
                out.push('}');
                out
            }
            ValueData::Object(handle) => match handle {
                ObjectHandle::Entry(_) => "<object entry>".to_owned(),
                ObjectHandle::Task(_) => "<object task>".to_owned(),
                ObjectHandle::Record(record) => format!("<object {}>", record.borrow().type_name),
            },
            ValueData::Function(func) => format!("<function {}>", func.name),
        }
    }

    /// Traverses a dotted property path for reading.
    ///
    /// Only legal on `Object` and `Mapping` values; each missing segment is a
    /// `PropertyMissing` error naming the base variable and the segment.
    pub fn get_property(&self, sloc: SourceLoc, base_name: &str, path: &[String]) -> RunResult<Self> {
        debug_assert!(!path.is_empty(), "property path must be non-empty");
        let (segment, rest) = path.split_first().expect("non-empty path");
        let next = match &self.data {
            ValueData::Mapping(entries) => entries.get(segment).cloned().ok_or_else(|| {
                property_missing(sloc, base_name, segment, "mapping")
            })?,
            ValueData::Object(handle) => handle.get_property(sloc, base_name, segment)?,
            _ => {
                return Err(CbError::type_error(
                    format!(
                        "property access on '{base_name}' requires an object or mapping, found {}",
                        self.kind_name()
                    ),
                    sloc,
                ));
            }
        };
        if rest.is_empty() {
            Ok(next.with_sloc(sloc))
        } else {
            next.get_property(sloc, base_name, rest)
        }
    }

    /// Traverses a dotted property path for writing. For `Object` values the
    /// final write routes to the host accessor.
    pub fn set_property(&mut self, sloc: SourceLoc, base_name: &str, path: &[String], value: Self) -> RunResult<()> {
        debug_assert!(!path.is_empty(), "property path must be non-empty");
        let (segment, rest) = path.split_first().expect("non-empty path");
        match &mut self.data {
            ValueData::Mapping(entries) => {
                if rest.is_empty() {
                    entries.insert(segment.clone(), value);
                    Ok(())
                } else {
                    let next = entries
                        .get_mut(segment)
                        .ok_or_else(|| property_missing(sloc, base_name, segment, "mapping"))?;
                    next.set_property(sloc, base_name, rest, value)
                }
            }
            ValueData::Object(handle) => handle.set_property(sloc, base_name, path, value),
            _ => Err(CbError::type_error(
                format!(
                    "property assignment on '{base_name}' requires an object or mapping, found {}",
                    self.kind_name()
                ),
                sloc,
            )),
        }
    }
}

impl ObjectHandle {
    fn get_property(&self, sloc: SourceLoc, base_name: &str, segment: &str) -> RunResult<Value> {
        match self {
            Self::Record(record) => record
                .borrow()
                .props
                .get(segment)
                .cloned()
                .ok_or_else(|| property_missing(sloc, base_name, segment, "object")),
            Self::Task(task) => {
                let task = task.borrow();
                match segment {
                    "taskId" => Ok(Value::str(sloc, task.task_id.clone())),
                    "rmode" => Ok(Value::str(sloc, task.rmode.to_string())),
                    "renderFormat" => Ok(match &task.render_format {
                        Some(format) => Value::str(sloc, format.clone()),
                        None => Value::null(sloc),
                    }),
                    _ => Err(property_missing(sloc, base_name, segment, "task")),
                }
            }
            Self::Entry(_) => Err(property_missing(sloc, base_name, segment, "entry")),
        }
    }

    fn set_property(&self, sloc: SourceLoc, base_name: &str, path: &[String], value: Value) -> RunResult<()> {
        let (segment, rest) = path.split_first().expect("non-empty path");
        match self {
            Self::Record(record) => {
                if rest.is_empty() {
                    record.borrow_mut().props.insert(segment.clone(), value);
                    Ok(())
                } else {
                    let mut next = record
                        .borrow()
                        .props
                        .get(segment)
                        .cloned()
                        .ok_or_else(|| property_missing(sloc, base_name, segment, "object"))?;
                    next.set_property(sloc, base_name, rest, value)?;
                    record.borrow_mut().props.insert(segment.clone(), next);
                    Ok(())
                }
            }
            Self::Task(task) => {
                if !rest.is_empty() {
                    return Err(property_missing(sloc, base_name, segment, "task"));
                }
                match segment.as_str() {
                    "renderFormat" => {
                        let format = match value.into_data() {
                            ValueData::Null => None,
                            ValueData::Str(s) => Some(s),
                            other => {
                                let kind = Value::new(sloc, other).kind_name();
                                return Err(CbError::type_error(
                                    format!("task render format must be a string or null, found {kind}"),
                                    sloc,
                                ));
                            }
                        };
                        task.borrow_mut().render_format = format;
                        Ok(())
                    }
                    "taskId" | "rmode" => Err(CbError::type_error(
                        format!("property '{segment}' of the task is read-only"),
                        sloc,
                    )),
                    _ => Err(property_missing(sloc, base_name, segment, "task")),
                }
            }
            Self::Entry(_) => Err(property_missing(sloc, base_name, segment, "entry")),
        }
    }
}

fn property_missing(sloc: SourceLoc, base_name: &str, segment: &str, kind: &str) -> CbError {
    CbError::new(
        ErrorKind::PropertyMissing,
        format!("{kind} '{base_name}' has no property '{segment}'"),
        sloc,
    )
}

/// Formats a number the way diagnostics and output expect: integral values
/// print without a fractional part, everything else uses the shortest
/// round-trippable decimal form.
#[must_use]
#[expect(clippy::cast_possible_truncation, reason = "integrality is checked first")]
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let mut buffer = ryu::Buffer::new();
        buffer.format(n).to_owned()
    }
}

// wrap(): coerce native values into the matching variant. Values pass through
// untouched because handlers already return `Value`.

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::null(SourceLoc::UNKNOWN)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::bool(SourceLoc::UNKNOWN, value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::number(SourceLoc::UNKNOWN, value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::str(SourceLoc::UNKNOWN, value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::str(SourceLoc::UNKNOWN, value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::list(SourceLoc::UNKNOWN, items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(entries: IndexMap<String, Self>) -> Self {
        Self::mapping(SourceLoc::UNKNOWN, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_sloc() {
        let a = Value::number(SourceLoc::new(1, 1, 0, 1, 1, 2), 3.0);
        let b = Value::number(SourceLoc::UNKNOWN, 3.0);
        assert_eq!(a, b);
    }

    #[test]
    fn integral_numbers_format_without_fraction() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn nice_string_is_deterministic_per_variant() {
        let v = Value::list(
            SourceLoc::UNKNOWN,
            vec![Value::str(SourceLoc::UNKNOWN, "a"), Value::number(SourceLoc::UNKNOWN, 1.0)],
        );
        assert_eq!(v.as_nice_string(false), "['a', 1]");
        assert_eq!(Value::str(SourceLoc::UNKNOWN, "a").as_nice_string(true), "a");
    }

    #[test]
    fn mapping_property_roundtrip() {
        let mut entries = IndexMap::new();
        entries.insert("title".to_owned(), Value::null(SourceLoc::UNKNOWN));
        let mut v = Value::mapping(SourceLoc::UNKNOWN, entries);
        let path = vec!["title".to_owned()];
        v.set_property(SourceLoc::UNKNOWN, "info", &path, Value::str(SourceLoc::UNKNOWN, "Noir"))
            .unwrap();
        let got = v.get_property(SourceLoc::UNKNOWN, "info", &path).unwrap();
        assert_eq!(got, Value::str(SourceLoc::UNKNOWN, "Noir"));
    }

    #[test]
    fn missing_property_names_base_and_segment() {
        let v = Value::mapping(SourceLoc::UNKNOWN, IndexMap::new());
        let err = v
            .get_property(SourceLoc::UNKNOWN, "info", &["missing".to_owned()])
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::PropertyMissing);
        assert!(err.message.contains("'info'"));
        assert!(err.message.contains("'missing'"));
    }
}
