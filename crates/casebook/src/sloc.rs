use std::fmt;

/// Sentinel stored in any [`SourceLoc`] field whose value is unknown.
pub const UNKNOWN_POS: i64 = -1;

/// Source position metadata attached to AST nodes, runtime values, and
/// diagnostics.
///
/// Positions are copied from the external parser's node metadata, which may
/// omit any field; unknown fields hold [`UNKNOWN_POS`]. `line`/`column` are
/// 1-based, `start_pos`/`end_pos` are byte offsets into the raw source.
/// Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceLoc {
    pub line: i64,
    pub column: i64,
    pub start_pos: i64,
    pub end_pos: i64,
    pub end_line: i64,
    pub end_column: i64,
}

impl SourceLoc {
    /// A location with every field unknown.
    pub const UNKNOWN: Self = Self {
        line: UNKNOWN_POS,
        column: UNKNOWN_POS,
        start_pos: UNKNOWN_POS,
        end_pos: UNKNOWN_POS,
        end_line: UNKNOWN_POS,
        end_column: UNKNOWN_POS,
    };

    pub fn new(line: i64, column: i64, start_pos: i64, end_pos: i64, end_line: i64, end_column: i64) -> Self {
        Self {
            line,
            column,
            start_pos,
            end_pos,
            end_line,
            end_column,
        }
    }

    /// Whether at least the line/column pair is known.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.line != UNKNOWN_POS
    }

    /// Whether the byte span is usable for caret rendering against raw source.
    #[must_use]
    pub fn has_span(&self) -> bool {
        self.start_pos != UNKNOWN_POS && self.end_pos >= self.start_pos
    }

    /// Short `line L:C` form used in run narration.
    #[must_use]
    pub fn debug_string(&self) -> String {
        if self.is_known() {
            format!("line {}:{}", self.line, self.column)
        } else {
            "line ?:?".to_owned()
        }
    }
}

impl Default for SourceLoc {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "line {}, col {}", self.line, self.column)
        } else {
            write!(f, "[no source location information available]")
        }
    }
}
