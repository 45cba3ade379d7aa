//! Diagnostic system for the dictionary compiler.
//!
//! - Error codes for searchability (`refl explain E2001`)
//! - Clear messages (what went wrong)
//! - Declaration or rule-file location (where it went wrong)
//! - Notes and suggestions (how to fix)
//!
//! Stages never print directly; they push `Diagnostic`s into a
//! `DiagnosticQueue`, whose error count decides the exit status.
//!
//! # Error Guarantees
//!
//! `ErrorGuaranteed` is proof that at least one error was reported:
//!
//! ```text
//! let guarantee = queue.emit_error(diagnostic);
//! fn generate() -> Result<Generated, ErrorGuaranteed> { ... }
//! ```

mod diagnostic;
pub mod emitter;
mod error_code;
pub mod errors;
mod guarantee;
pub mod queue;

pub use diagnostic::{Diagnostic, Severity};
pub use error_code::ErrorCode;
pub use errors::ErrorDocs;
pub use guarantee::ErrorGuaranteed;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
