use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    MalformedTable,
    MissingColumns,
    InvalidCell,
    InvalidDate,
    DuplicateTitle,
    InvalidDirective,
    UnknownRemapTarget,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::MalformedTable => "E2001",
            Self::MissingColumns => "E2002",
            Self::InvalidCell => "E2003",
            Self::InvalidDate => "E2004",
            Self::DuplicateTitle => "E3001",
            Self::InvalidDirective => "E4001",
            Self::UnknownRemapTarget => "E4002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::MalformedTable => "Input table is malformed",
            Self::MissingColumns => "Required columns are missing",
            Self::InvalidCell => "Cell has an unexpected type",
            Self::InvalidDate => "Date cell could not be parsed",
            Self::DuplicateTitle => "Work item title is not unique",
            Self::InvalidDirective => "Invalid mapping directive",
            Self::UnknownRemapTarget => "Remap target is not a known assignee",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .epicload/config.toml and retry."),
            Self::MalformedTable => {
                Some("Provide a JSON array of records, a split table, or JSONL rows.")
            }
            Self::MissingColumns => Some(
                "Add the listed columns or map them to existing headers under [columns] in .epicload/config.toml.",
            ),
            Self::InvalidCell => None,
            Self::InvalidDate => Some("Use YYYY-MM-DD or an RFC 3339 timestamp."),
            Self::DuplicateTitle => Some(
                "Rename one of the items, or set hierarchy.duplicate_titles = \"first-wins\".",
            ),
            Self::InvalidDirective => Some("Use keep, remove, or remap:<assignee>."),
            Self::UnknownRemapTarget => {
                Some("Remap only onto names listed in the UserLoad table.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors that abort a single engine run.
///
/// Every variant carries enough context to point at the offending input.
/// Malformed hierarchies (cycles, dangling parents) are *not* errors: they
/// resolve to "no epic" and show up in diagnostics instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Config file could not be parsed.
    #[error("failed to parse {}: {reason}", path.display())]
    ConfigParse { path: PathBuf, reason: String },

    /// Input could not be decoded as a table at all.
    #[error("malformed {table} table: {reason}")]
    MalformedTable { table: String, reason: String },

    /// One or more required columns are absent.
    #[error("{table} table is missing required columns: {}", missing.join(", "))]
    MissingColumns { table: String, missing: Vec<String> },

    /// A cell holds a value of the wrong shape.
    #[error("{table} row {row}: column '{column}' must be {expected}")]
    InvalidCell {
        table: String,
        row: usize,
        column: String,
        expected: &'static str,
    },

    /// A date cell could not be parsed.
    #[error("{table} row {row}: column '{column}' has unparseable date '{value}'")]
    InvalidDate {
        table: String,
        row: usize,
        column: String,
        value: String,
    },

    /// Two work items share a title.
    #[error("duplicate title '{title}' at rows {first_row} and {duplicate_row}")]
    DuplicateTitle {
        title: String,
        first_row: usize,
        duplicate_row: usize,
    },

    /// A mapping directive could not be parsed.
    #[error("invalid directive '{raw}'")]
    InvalidDirective { raw: String },

    /// A remap directive names an unknown assignee.
    #[error("cannot remap '{user}' onto '{target}': not an assignee in the load table")]
    UnknownRemapTarget { user: String, target: String },
}

impl EngineError {
    /// The stable error code for this failure.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Self::MalformedTable { .. } => ErrorCode::MalformedTable,
            Self::MissingColumns { .. } => ErrorCode::MissingColumns,
            Self::InvalidCell { .. } => ErrorCode::InvalidCell,
            Self::InvalidDate { .. } => ErrorCode::InvalidDate,
            Self::DuplicateTitle { .. } => ErrorCode::DuplicateTitle,
            Self::InvalidDirective { .. } => ErrorCode::InvalidDirective,
            Self::UnknownRemapTarget { .. } => ErrorCode::UnknownRemapTarget,
        }
    }

    /// Remediation text suitable for a `suggestion:` line.
    #[must_use]
    pub fn suggestion(&self) -> String {
        self.error_code()
            .hint()
            .unwrap_or_else(|| self.error_code().message())
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineError, ErrorCode};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::MalformedTable,
            ErrorCode::MissingColumns,
            ErrorCode::InvalidCell,
            ErrorCode::InvalidDate,
            ErrorCode::DuplicateTitle,
            ErrorCode::InvalidDirective,
            ErrorCode::UnknownRemapTarget,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::MissingColumns.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn missing_columns_message_lists_every_name() {
        let err = EngineError::MissingColumns {
            table: "WorkItems".to_string(),
            missing: vec!["Parent".to_string(), "DueDate".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "WorkItems table is missing required columns: Parent, DueDate"
        );
        assert_eq!(err.error_code(), ErrorCode::MissingColumns);
    }

    #[test]
    fn suggestion_falls_back_to_message() {
        let err = EngineError::InvalidCell {
            table: "TeamMembers".to_string(),
            row: 3,
            column: "Name".to_string(),
            expected: "text",
        };
        assert_eq!(err.suggestion(), "Cell has an unexpected type");
    }
}
