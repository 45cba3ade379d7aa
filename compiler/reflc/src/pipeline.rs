//! The dictionary pipeline.
//!
//! ```text
//! Init → RulesLoaded → Scanned → Selected → ClosureExpanded
//!      → Generated → MetadataEmitted → Committed
//! ```
//!
//! Any stage may end the run in `Failed` instead. Stages run once each, in
//! order. Nothing reaches its final path before `Committed`.

use std::fmt;
use std::path::PathBuf;

use refl_codegen::source::{assemble, emit_module_registration, emit_preamble, ModulePayload};
use refl_codegen::{generate, resolve_closure, CodegenContext};
use refl_diagnostic::{Diagnostic, DiagnosticConfig, DiagnosticQueue, ErrorCode};
use refl_ir::DeclUniverse;
use refl_meta::lib_list::{lib_list_paths, load_dependencies, needed_libraries, render_lib_list};
use refl_meta::rootmap::library_list;
use refl_meta::{collect_metadata, Metadata};
use refl_select::{load_rules, parse_pragmas, pragma_list_from_headers, RuleSet, Selection, SelectionEngine};
use tracing::{debug, info};

use crate::catalog::ArtifactCatalog;
use crate::error::PipelineError;
use crate::options::DictOptions;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    RulesLoaded,
    Scanned,
    Selected,
    ClosureExpanded,
    Generated,
    MetadataEmitted,
    Committed,
    Failed,
}

impl PipelineState {
    /// The state a successful stage leads to.
    pub fn next(self) -> Option<PipelineState> {
        match self {
            PipelineState::Init => Some(PipelineState::RulesLoaded),
            PipelineState::RulesLoaded => Some(PipelineState::Scanned),
            PipelineState::Scanned => Some(PipelineState::Selected),
            PipelineState::Selected => Some(PipelineState::ClosureExpanded),
            PipelineState::ClosureExpanded => Some(PipelineState::Generated),
            PipelineState::Generated => Some(PipelineState::MetadataEmitted),
            PipelineState::MetadataEmitted => Some(PipelineState::Committed),
            PipelineState::Committed | PipelineState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "init",
            PipelineState::RulesLoaded => "rules loaded",
            PipelineState::Scanned => "scanned",
            PipelineState::Selected => "selected",
            PipelineState::ClosureExpanded => "closure expanded",
            PipelineState::Generated => "generated",
            PipelineState::MetadataEmitted => "metadata emitted",
            PipelineState::Committed => "committed",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counts gathered along the way.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rules: usize,
    pub declarations: usize,
    pub selected: usize,
    pub rejected: usize,
    pub closure: usize,
    pub registered: usize,
}

/// Outcome of one run.
#[derive(Debug)]
pub struct DictReport {
    pub state: PipelineState,
    /// Files now present under their final names.
    pub artifacts: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
    pub error_count: usize,
    pub warning_count: usize,
    pub summary: RunSummary,
    /// The reason the run failed, if it did.
    pub error: Option<PipelineError>,
}

impl DictReport {
    pub fn succeeded(&self) -> bool {
        self.state != PipelineState::Failed && self.error_count == 0
    }

    pub fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }
}

/// How far a run goes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Goal {
    /// Through code generation, writing nothing.
    Check,
    Commit,
}

/// One dictionary run.
pub struct Pipeline<'o> {
    options: &'o DictOptions,
    state: PipelineState,
    queue: DiagnosticQueue,
    summary: RunSummary,
}

impl<'o> Pipeline<'o> {
    pub fn new(options: &'o DictOptions) -> Self {
        let config = if options.fail_on_warnings {
            DiagnosticConfig::fail_on_warnings()
        } else {
            DiagnosticConfig::default()
        };
        Pipeline {
            options,
            state: PipelineState::Init,
            queue: DiagnosticQueue::with_config(config),
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run every stage and commit the artifacts.
    pub fn run(mut self) -> DictReport {
        let outcome = self.execute(Goal::Commit);
        self.finish(outcome)
    }

    /// Run up to code generation and report, writing nothing.
    pub fn check(mut self) -> DictReport {
        let outcome = self.execute(Goal::Check);
        self.finish(outcome)
    }

    fn finish(mut self, outcome: Result<Vec<PathBuf>, PipelineError>) -> DictReport {
        let (artifacts, error) = match outcome {
            Ok(artifacts) => (artifacts, None),
            Err(error) => {
                if !matches!(error, PipelineError::Aborted { .. }) {
                    self.queue.emit_error(error.to_diagnostic());
                }
                info!(from = %self.state, %error, "pipeline failed");
                self.state = PipelineState::Failed;
                (Vec::new(), Some(error))
            }
        };
        DictReport {
            state: self.state,
            artifacts,
            error_count: self.queue.error_count(),
            warning_count: self.queue.warning_count(),
            diagnostics: self.queue.flush(),
            summary: self.summary,
            error,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert_eq!(self.state.next(), Some(next), "pipeline stages run in order");
        debug!(from = %self.state, to = %next, "pipeline transition");
        self.state = next;
    }

    fn report(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.queue.add(diagnostic);
        }
    }

    fn execute(&mut self, goal: Goal) -> Result<Vec<PathBuf>, PipelineError> {
        let rules = self.load_rules()?;
        self.summary.rules = rules.len();
        self.advance(PipelineState::RulesLoaded);
        if self.options.selection_syntax_only {
            info!(rules = rules.len(), "selection syntax checked");
            return Ok(Vec::new());
        }

        let universe = DeclUniverse::load(&self.options.universe)?;
        self.summary.declarations = universe.len();
        info!(declarations = universe.len(), "declaration universe scanned");
        self.advance(PipelineState::Scanned);

        let selection = self.select(&universe, &rules)?;
        self.advance(PipelineState::Selected);

        let closure = resolve_closure(&universe, &selection)?;
        self.summary.closure = closure.registry.len();
        self.report(closure.diagnostics);
        self.advance(PipelineState::ClosureExpanded);

        // Rejected classes stay out of generation; metadata still sees them.
        let generated = generate(&universe, &selection, &closure.registry, &rules.read_rules);
        self.summary.registered = generated.registered;
        self.report(generated.diagnostics);
        self.advance(PipelineState::Generated);
        if goal == Goal::Check {
            return Ok(Vec::new());
        }

        let mut catalog = ArtifactCatalog::new();
        if let Err(error) =
            self.emit_artifacts(&mut catalog, &universe, &selection, &rules, &generated.class_code)
        {
            catalog.rollback();
            return Err(error);
        }
        self.advance(PipelineState::MetadataEmitted);

        if self.queue.has_errors().is_some() {
            catalog.rollback();
            return Err(PipelineError::Aborted {
                errors: self.queue.error_count(),
            });
        }
        let committed = catalog.commit()?;
        self.advance(PipelineState::Committed);
        Ok(committed)
    }

    fn load_rules(&self) -> Result<RuleSet, PipelineError> {
        match &self.options.selection_file {
            Some(path) => Ok(load_rules(path)?),
            None => {
                let list = pragma_list_from_headers(&self.options.headers);
                debug!(list = %list, "synthesized pragma list");
                Ok(parse_pragmas(&list, "<synthesized>")?)
            }
        }
    }

    fn select(
        &mut self,
        universe: &DeclUniverse,
        rules: &RuleSet,
    ) -> Result<Selection, PipelineError> {
        let mut engine = SelectionEngine::new(universe, rules);
        engine.optimize();
        let mut selection = engine.select()?;
        let rejected = selection.reject_unusable(universe);
        self.report(rejected);
        // After rejection: a rule whose matches were all rejected is unused.
        let unused = engine.unused_rules(&selection);
        self.report(unused);
        self.summary.selected = selection.len();
        self.summary.rejected = selection.rejected.len();
        info!(
            selected = selection.len(),
            rejected = selection.rejected.len(),
            "selection done"
        );
        Ok(selection)
    }

    fn emit_artifacts(
        &mut self,
        catalog: &mut ArtifactCatalog,
        universe: &DeclUniverse,
        selection: &Selection,
        rules: &RuleSet,
        class_code: &str,
    ) -> Result<(), PipelineError> {
        let options = self.options;
        let metadata = collect_metadata(universe, selection)?;

        let mut ctx = CodegenContext::new(universe);
        emit_preamble(&mut ctx, &options.headers, &rules.extra_includes);
        let preamble = ctx.take_output();
        let module = ModulePayload {
            module_name: options.module_name(),
            headers: options.headers.clone(),
            include_paths: options.include_paths.clone(),
            fwd_decls: metadata.payload_decls.to_text(),
            payload: payload_code(options),
            header_map: metadata.header_map(options.inline_headers),
        };
        emit_module_registration(&mut ctx, &module);
        let registration = ctx.take_output();

        let sources = assemble(&preamble, class_code, &registration, options.split);
        catalog.add(&options.dict_file, &sources.primary)?;
        if let Some(classdef) = &sources.classdef {
            catalog.add(&options.classdef_file(), classdef)?;
        }

        self.emit_rootmap(catalog, &metadata)?;
        if let Some(prefix) = &options.lib_list_prefix {
            let autoload = load_dependencies(prefix)?;
            let libraries = needed_libraries(universe, selection, &autoload);
            let classes: Vec<&str> = selection
                .all_classes()
                .map(|entity| entity.normalized_name.as_str())
                .collect();
            let (_, output) = lib_list_paths(prefix);
            catalog.add(&output, &render_lib_list(&libraries, &classes))?;
        }
        Ok(())
    }

    fn emit_rootmap(
        &mut self,
        catalog: &mut ArtifactCatalog,
        metadata: &Metadata,
    ) -> Result<(), PipelineError> {
        let options = self.options;
        let Some(path) = options.rootmap_path() else {
            return Ok(());
        };
        let libraries = options.rootmap_libraries();
        if libraries.is_empty() {
            self.queue.add(
                Diagnostic::for_code(ErrorCode::E3002)
                    .with_message(format!(
                        "no library given for `{}`; the index is not written",
                        path.display()
                    ))
                    .with_suggestion("pass -rml <library> or -s <shared library>"),
            );
            return Ok(());
        }
        let text = metadata.rootmap(
            library_list(&libraries),
            options.headers_to_ignore(),
            options.rootmap_format(),
        );
        catalog.add(&path, &text)
    }
}

/// The inline header payload: the input headers, as the dictionary sees
/// them.
fn payload_code(options: &DictOptions) -> String {
    let mut payload = format!("#line 1 \"{} dictionary payload\"\n\n", options.module_name());
    for header in &options.headers {
        payload.push_str(&format!("#include \"{header}\"\n"));
    }
    payload
}
