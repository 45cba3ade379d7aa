use std::fmt;

/// Error codes for all dictionary-compiler diagnostics.
///
/// Format: E#### where the first digit indicates the stage:
/// - E0xxx: Selection-rule loading
/// - E1xxx: Selection and completeness
/// - E2xxx: Streamer code generation
/// - E3xxx: Metadata and index artifacts
/// - E9xxx: Invariant violations and I/O
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ErrorCode {
    // Rule Errors (E0xxx)
    /// Malformed pragma directive
    E0001,
    /// Unknown selection file type
    E0002,
    /// Malformed declarative rule file
    E0003,
    /// Invalid wildcard pattern
    E0004,
    /// Conflicting selection modifiers
    E0005,

    // Selection Errors (E1xxx)
    /// Selected declaration has no definition
    E1001,
    /// Selected class has an incomplete base
    E1002,
    /// Selection rule matched nothing
    E1003,
    /// Unsupported standard type selected
    E1004,
    /// Selecting a standard type that needs no dictionary
    E1005,
    /// Container of an unsupported numeric alias
    E1006,

    // Codegen Errors (E2xxx)
    /// Pointer to fundamental without a length field
    E2001,
    /// Invalid array length field
    E2002,
    /// Pointer-to-pointer member
    E2003,
    /// Array of pointers to fundamental
    E2004,
    /// Class must declare its own streamer
    E2005,
    /// Inconsistent custom buffer operators
    E2006,
    /// Unsupported string member shape
    E2007,
    /// Container element that cannot be streamed
    E2008,

    // Metadata Errors (E3xxx)
    /// Malformed index (rootmap) file
    E3001,
    /// Index requested without a library list
    E3002,

    // Invariant and I/O Errors (E9xxx)
    /// Duplicate normalized name for distinct declarations
    E9001,
    /// I/O failure on an input or output artifact
    E9002,
    /// Internal pipeline error
    E9003,
}

impl ErrorCode {
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::E0001,
        ErrorCode::E0002,
        ErrorCode::E0003,
        ErrorCode::E0004,
        ErrorCode::E0005,
        ErrorCode::E1001,
        ErrorCode::E1002,
        ErrorCode::E1003,
        ErrorCode::E1004,
        ErrorCode::E1005,
        ErrorCode::E1006,
        ErrorCode::E2001,
        ErrorCode::E2002,
        ErrorCode::E2003,
        ErrorCode::E2004,
        ErrorCode::E2005,
        ErrorCode::E2006,
        ErrorCode::E2007,
        ErrorCode::E2008,
        ErrorCode::E3001,
        ErrorCode::E3002,
        ErrorCode::E9001,
        ErrorCode::E9002,
        ErrorCode::E9003,
    ];

    /// Get the string representation of this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E0001 => "E0001",
            ErrorCode::E0002 => "E0002",
            ErrorCode::E0003 => "E0003",
            ErrorCode::E0004 => "E0004",
            ErrorCode::E0005 => "E0005",
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            ErrorCode::E1006 => "E1006",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E2007 => "E2007",
            ErrorCode::E2008 => "E2008",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
            ErrorCode::E9003 => "E9003",
        }
    }

    /// Parse a code as typed on the command line (`E2001`, `e2001`).
    pub fn parse(text: &str) -> Option<ErrorCode> {
        let upper = text.trim().to_ascii_uppercase();
        Self::ALL.iter().copied().find(|code| code.as_str() == upper)
    }

    pub fn is_rule_error(&self) -> bool {
        self.as_str().starts_with("E0")
    }

    /// Codes that are warnings unless fail-on-warnings is requested.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ErrorCode::E1001
                | ErrorCode::E1002
                | ErrorCode::E1003
                | ErrorCode::E1006
                | ErrorCode::E2007
                | ErrorCode::E3002
        )
    }

    /// Codes that abort the run immediately.
    pub fn is_fatal(&self) -> bool {
        self.is_rule_error() || matches!(self, ErrorCode::E9001 | ErrorCode::E9002)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
