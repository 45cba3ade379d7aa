//! The refl dictionary compiler driver.
//!
//! Ties the stages together: rules are loaded, the declaration universe
//! scanned, a selection made and closed over container instances, code
//! generated and metadata collected. Artifacts go through a temporary
//! catalog so that a failed run leaves the previous outputs untouched.
//!
//! ```text
//! let options = DictOptions::new("EventDict.cxx", "decls.json");
//! let report = Pipeline::new(&options).run();
//! std::process::exit(report.exit_code());
//! ```

mod catalog;
pub mod commands;
mod error;
mod options;
mod pipeline;

pub use catalog::ArtifactCatalog;
pub use error::PipelineError;
pub use options::DictOptions;
pub use pipeline::{DictReport, Pipeline, PipelineState, RunSummary};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install the log subscriber, once per process.
///
/// `RUST_LOG` wins when set. Otherwise `verbosity` 1, 2 and 3 enable info,
/// debug and trace output; 0 keeps the log silent. Logs go to stderr.
pub fn init_tracing(verbosity: u8) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            let level = match verbosity {
                0 => return,
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            EnvFilter::new(level)
        };
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    });
}
