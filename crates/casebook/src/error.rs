use std::fmt::{self, Write};

use smallvec::{SmallVec, smallvec};
use strum::{Display, IntoStaticStr};

use crate::{parsetree::RawSource, sloc::SourceLoc};

/// Result type alias for operations that can produce an interpreter error.
pub type RunResult<T> = Result<T, CbError>;

/// The closed set of interpreter error kinds.
///
/// Uses strum derives so the kind renders exactly as its variant name
/// (e.g. `ConstAssignment` -> "ConstAssignment") in diagnostic summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ErrorKind {
    /// A parse-tree node the ingestor does not recognize. The external parser
    /// should have rejected the document, hence "uncaught".
    UncaughtSyntaxError,
    /// Declaring a dotted identifier.
    InvalidDeclaration,
    /// Declaring a name that already exists in the local scope.
    Redeclaration,
    /// Assigning to a name never declared in any enclosing scope.
    Undeclared,
    /// Reassigning a constant.
    ConstAssignment,
    /// A dotted-path segment that does not exist on the base value.
    PropertyMissing,
    TypeError,
    /// Binary operands of different value kinds.
    OperandMismatch,
    /// Binary operands of matching kinds the operator does not support.
    UnsupportedOperands,
    ArithmeticError,
    /// Invoking a function name with no binding in scope.
    UndefinedFunction,
    /// A required parameter with no caller binding.
    MissingArgument,
    /// A named argument matching no declared parameter.
    UnknownArgument,
    /// A parameter bound both positionally and by name.
    DoubleBind,
    /// Conflicting non-empty labels across repeated entry headers.
    LabelRedefinition,
    /// Conflicting options across repeated entry headers.
    OptionsRedefinition,
    InternalError,
}

/// An interpreter error: a kind, a message, and zero or more source locations.
///
/// When an error involves a prior declaration (redeclaration, constant
/// reassignment) both the current site and the original declaration site are
/// attached, current site first.
#[derive(Debug, Clone, PartialEq)]
pub struct CbError {
    pub kind: ErrorKind,
    pub message: String,
    pub slocs: SmallVec<[SourceLoc; 2]>,
}

impl CbError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, sloc: SourceLoc) -> Self {
        Self {
            kind,
            message: message.into(),
            slocs: smallvec![sloc],
        }
    }

    /// An error carrying two locations: the offending site and a prior site.
    pub fn new_with_previous(kind: ErrorKind, message: impl Into<String>, sloc: SourceLoc, previous: SourceLoc) -> Self {
        Self {
            kind,
            message: message.into(),
            slocs: smallvec![sloc, previous],
        }
    }

    pub fn type_error(message: impl Into<String>, sloc: SourceLoc) -> Self {
        Self::new(ErrorKind::TypeError, message, sloc)
    }

    pub fn internal(message: impl Into<String>, sloc: SourceLoc) -> Self {
        Self::new(ErrorKind::InternalError, message, sloc)
    }

    pub fn uncaught_syntax(message: impl Into<String>, sloc: SourceLoc) -> Self {
        Self::new(ErrorKind::UncaughtSyntaxError, message, sloc)
    }

    /// Renders the error with per-location detail, annotating each known span
    /// with the offending raw source line and a caret range beneath it when
    /// the raw source is available.
    #[must_use]
    pub fn render(&self, raw: Option<&RawSource>) -> String {
        let mut out = format!("{}: {}", self.kind, self.message);
        let numbered = self.slocs.len() > 1;
        for (index, sloc) in self.slocs.iter().enumerate() {
            out.push('\n');
            if numbered {
                let _ = write!(out, "  {}. {sloc}", index + 1);
            } else {
                let _ = write!(out, "  {sloc}");
            }
            if let Some(raw) = raw {
                if let Some(caret) = render_caret_line(raw, sloc) {
                    out.push('\n');
                    out.push_str(&caret);
                }
            }
        }
        out
    }
}

impl fmt::Display for CbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        for sloc in &self.slocs {
            if sloc.is_known() {
                write!(f, "; {sloc}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for CbError {}

/// A non-fatal diagnostic. Warnings never halt evaluation; they are collected
/// by the environment and drained by the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub message: String,
    pub slocs: SmallVec<[SourceLoc; 2]>,
}

impl Warning {
    pub fn new_with_previous(message: impl Into<String>, sloc: SourceLoc, previous: SourceLoc) -> Self {
        Self {
            message: message.into(),
            slocs: smallvec![sloc, previous],
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning: {}", self.message)?;
        for sloc in &self.slocs {
            if sloc.is_known() {
                write!(f, "; {sloc}")?;
            }
        }
        Ok(())
    }
}

/// Extracts the source line covering `sloc` and draws a caret range under the
/// offending span, in the form:
///
/// ```text
/// [12]: $set(y, 6)
///       ^^^^^^^^^^
/// ```
fn render_caret_line(raw: &RawSource, sloc: &SourceLoc) -> Option<String> {
    if !sloc.has_span() {
        return None;
    }
    let text = raw.text.as_str();
    let start = usize::try_from(sloc.start_pos).ok()?;
    if start > text.len() {
        return None;
    }
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[start..].find('\n').map_or(text.len(), |i| start + i);
    let line_text = &text[line_start..line_end];

    let end = usize::try_from(sloc.end_pos).ok()?.min(line_end);
    let span_start = start - line_start;
    let span_len = end.saturating_sub(start).max(1);

    let line_no = if sloc.is_known() {
        sloc.line.to_string()
    } else {
        "?".to_owned()
    };
    let prefix = format!("[{line_no}]: ");
    let mut out = format!("{prefix}{line_text}\n");
    out.push_str(&" ".repeat(prefix.len() + span_start));
    out.push_str(&"^".repeat(span_len));
    Some(out)
}
