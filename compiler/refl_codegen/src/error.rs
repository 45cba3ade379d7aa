use refl_diagnostic::{Diagnostic, ErrorCode};
use refl_ir::SourceLoc;
use thiserror::Error;

/// Why an array-length comment could not be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LengthProblem {
    /// The comment does not start with `[...]`.
    NoSizeIndication,
    NotInteger(String),
    NotDefinedBefore(String),
    Unknown(String),
}

/// A member the streamer generator cannot transfer.
///
/// These are reported per member; generation continues for everything else.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{class}::{member}: pointer to fundamental type needs a length field")]
    MissingLength { class: String, member: String },
    #[error("{class}::{member}: {detail}", detail = describe_length(.problem))]
    InvalidLength {
        class: String,
        member: String,
        problem: LengthProblem,
    },
    #[error("{class}::{member}: pointer to pointer cannot be streamed")]
    PointerToPointer { class: String, member: String },
    #[error("{class}::{member}: array of pointers to fundamental type cannot be streamed")]
    PointerArray { class: String, member: String },
    #[error("{class}::{member}: array of pointers to string is not supported")]
    StringPointerArray { class: String, member: String },
    #[error("{class}::{member}: container element `{element}` cannot be streamed")]
    ContainerElement {
        class: String,
        member: String,
        element: String,
    },
}

fn describe_length(problem: &LengthProblem) -> String {
    match problem {
        LengthProblem::NoSizeIndication => "no size indication".to_string(),
        LengthProblem::NotInteger(name) => format!("size of array ({name}) is not an integer"),
        LengthProblem::NotDefinedBefore(name) => {
            format!("size of array ({name}) has not been defined before the array")
        }
        LengthProblem::Unknown(name) => format!("size of array ({name}) is not known"),
    }
}

impl PlanError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PlanError::MissingLength { .. } => ErrorCode::E2001,
            PlanError::InvalidLength { .. } => ErrorCode::E2002,
            PlanError::PointerToPointer { .. } => ErrorCode::E2003,
            PlanError::PointerArray { .. } => ErrorCode::E2004,
            PlanError::StringPointerArray { .. } => ErrorCode::E2007,
            PlanError::ContainerElement { .. } => ErrorCode::E2008,
        }
    }

    pub fn to_diagnostic(&self, location: &SourceLoc) -> Diagnostic {
        let diag = Diagnostic::for_code(self.code())
            .with_message(self.to_string())
            .at(location);
        match self {
            PlanError::MissingLength { .. } => diag
                .with_note("the binary layout of the member would be ambiguous")
                .with_suggestion("name the length field in the member comment, e.g. `//[fN]`"),
            PlanError::InvalidLength { .. } => diag.with_suggestion(
                "the length must be an integer data member declared before the array",
            ),
            PlanError::PointerToPointer { .. } | PlanError::PointerArray { .. } => {
                diag.with_suggestion("write a custom Streamer or mark the member transient (`//!`)")
            }
            PlanError::StringPointerArray { .. } | PlanError::ContainerElement { .. } => diag,
        }
    }
}
