// Compiler diagnostics: code, severity, message and zero-based source position.

use serde::Serialize;
use std::fmt;

/// Zero-based line/column position in the snippet source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub position: Position,
    /// Warning promoted to an error by compile options.
    pub escalated: bool,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>, position: Position) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            position,
            escalated: false,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>, position: Position) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            message: message.into(),
            position,
            escalated: false,
        }
    }

    /// Errors and escalated warnings fail a compilation.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error || self.escalated
    }
}

/// One-line report form: `Error (<code>): <message> at line <N>`, N one-based.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.is_error() { "Error" } else { "Warning" };
        write!(
            f,
            "{} ({}): {} at line {}",
            label,
            self.code,
            self.message,
            self.position.line + 1
        )
    }
}

/// Diagnostic codes reported by the snippet front end.
pub mod codes {
    /// Reported by hosts when a backend fails without saying why.
    pub const COMPILATION_FAILED: &str = "SN0000";
    pub const IDENTIFIER_EXPECTED: &str = "SN1001";
    pub const SEMICOLON_EXPECTED: &str = "SN1002";
    pub const TOKEN_EXPECTED: &str = "SN1003";
    pub const UNTERMINATED_LITERAL: &str = "SN1010";
    pub const CONSTANT_TOO_LARGE: &str = "SN1021";
    pub const UNEXPECTED_CHARACTER: &str = "SN1056";
    pub const INVALID_EXPRESSION: &str = "SN1525";
    pub const ARGUMENT_COUNT: &str = "SN1501";
    pub const BINARY_OPERATOR: &str = "SN0019";
    pub const INDEXING: &str = "SN0021";
    pub const UNARY_OPERATOR: &str = "SN0023";
    pub const SELF_OUTSIDE_METHOD: &str = "SN0026";
    pub const TYPE_MISMATCH: &str = "SN0029";
    pub const INVALID_CAST: &str = "SN0030";
    pub const UNKNOWN_NAME: &str = "SN0103";
    pub const DUPLICATE_MEMBER: &str = "SN0111";
    pub const OBJECT_REFERENCE_REQUIRED: &str = "SN0120";
    pub const AMBIGUOUS_CALL: &str = "SN0121";
    pub const INACCESSIBLE: &str = "SN0122";
    pub const MISSING_RETURN_VALUE: &str = "SN0126";
    pub const UNEXPECTED_RETURN_VALUE: &str = "SN0127";
    pub const DUPLICATE_LOCAL: &str = "SN0128";
    pub const NOT_ALL_PATHS_RETURN: &str = "SN0161";
    pub const UNREACHABLE_CODE: &str = "SN0162";
    pub const UNUSED_VARIABLE: &str = "SN0168";
    pub const INSTANCE_REFERENCE: &str = "SN0176";
    pub const NOT_A_STATEMENT: &str = "SN0201";
    pub const MISSING_NAMESPACE: &str = "SN0234";
    pub const UNKNOWN_TYPE: &str = "SN0246";
    pub const UNASSIGNED_FIELD: &str = "SN0843";
    pub const TOO_COMPLEX: &str = "SN8078";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_line_is_one_based() {
        let d = Diagnostic::error(codes::SEMICOLON_EXPECTED, "; expected", Position::new(2, 14));
        assert_eq!(d.to_string(), "Error (SN1002): ; expected at line 3");
    }

    #[test]
    fn escalated_warning_reports_as_error() {
        let mut d = Diagnostic::warning(codes::UNUSED_VARIABLE, "unused", Position::new(0, 0));
        assert!(!d.is_error());
        d.escalated = true;
        assert!(d.is_error());
        assert!(d.to_string().starts_with("Error (SN0168)"));
    }
}
