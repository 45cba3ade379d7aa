//! The `generate` command: produce a dictionary and its metadata.

use tracing::info;

use super::emit_report;
use crate::options::DictOptions;
use crate::pipeline::Pipeline;

pub fn generate_dictionary(options: &DictOptions) -> i32 {
    let report = Pipeline::new(options).run();
    emit_report(&report);
    for artifact in &report.artifacts {
        info!(path = %artifact.display(), "written");
    }
    report.exit_code()
}
