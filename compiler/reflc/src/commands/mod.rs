//! CLI commands. Each returns the process exit code.

mod check;
mod explain;
mod generate;

pub use check::check_selection;
pub use explain::explain_error;
pub use generate::generate_dictionary;

use refl_diagnostic::emitter::{ColorMode, DiagnosticEmitter, TerminalEmitter};

use crate::pipeline::DictReport;

/// Print the diagnostics of a run and the error/warning summary.
fn emit_report(report: &DictReport) {
    let is_tty = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let mut emitter = TerminalEmitter::with_color_mode(std::io::stderr(), ColorMode::Auto, is_tty);
    emitter.emit_all(&report.diagnostics);
    emitter.emit_summary(report.error_count, report.warning_count);
    emitter.flush();
}
