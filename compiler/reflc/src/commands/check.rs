//! The `check` command: select and generate in memory, report, write
//! nothing.

use super::emit_report;
use crate::options::DictOptions;
use crate::pipeline::{Pipeline, PipelineState};

pub fn check_selection(options: &DictOptions) -> i32 {
    let report = Pipeline::new(options).check();
    emit_report(&report);
    let summary = &report.summary;
    if report.succeeded() {
        if report.state == PipelineState::RulesLoaded {
            println!("OK: {} selection rules", summary.rules);
        } else {
            println!(
                "OK: {} selected ({} rejected), {} container instances, {} registrations",
                summary.selected, summary.rejected, summary.closure, summary.registered
            );
        }
    }
    report.exit_code()
}
