//! Dictionary code generation for refl.
//!
//! Turns a selection into the class-specific part of a dictionary source:
//! namespace initializers, per-class registration, class accessor
//! functions and streamers, plus a registration and collection streamer for
//! every container instance the closure discovered.
//!
//! # Architecture
//!
//! ```text
//! Selection
//!     ↓
//!  ClosureResolver   (container instances reachable from selected classes)
//!     ↓
//!  plan_class        (member stream plans, per-member errors)
//!     ↓
//!  generate          (registration + streamers, diagnostics)
//!     ↓
//!  source::assemble  (preamble, class code, module registration)
//! ```
//!
//! The [`wire`] module is a reference model of the buffer format that the
//! generated streamers read and write.

pub mod checks;
pub mod class_init;
mod closure;
mod context;
mod error;
pub mod plan;
mod scope;
pub mod source;
pub mod streamer;
pub mod wire;

pub use closure::{resolve_closure, Closure, ClosureEntry, ClosureRegistry, ClosureResolver};
pub use context::{mangle, quote, CodegenContext};
pub use error::{LengthProblem, PlanError};

use refl_diagnostic::Diagnostic;
use refl_ir::Introspect;
use refl_select::{EntityFlags, ReadRule, Selection};
use tracing::{debug, trace};

use crate::checks::{check_input_operator, check_missing_streamer, OperatorIndex};
use crate::class_init::{
    emit_class_functions, emit_class_init, emit_namespace_init, emit_wrappers, Registration,
};
use crate::plan::{plan_class, plan_container};
use crate::streamer::{emit_collection_streamer, emit_streamer, StreamerKind};

/// Class-specific code of one dictionary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Generated {
    pub class_code: String,
    /// Per-member and per-class problems. Generation continued past them.
    pub diagnostics: Vec<Diagnostic>,
    /// Classes and container instances that got a registration.
    pub registered: usize,
}

/// Generate registration and streamers for a selection and its closure.
///
/// Selected containers are generated from the closure, like discovered
/// ones.
#[tracing::instrument(level = "debug", skip_all)]
pub fn generate<P: Introspect + ?Sized>(
    port: &P,
    selection: &Selection,
    closure: &ClosureRegistry,
    read_rules: &[ReadRule],
) -> Generated {
    let mut ctx = CodegenContext::new(port);
    let mut generated = Generated::default();
    let operators = OperatorIndex::build(port);

    for namespace in &selection.namespaces {
        emit_namespace_init(&mut ctx, namespace);
    }

    for entity in &selection.classes {
        if entity.flags.contains(EntityFlags::GENERIC_CONTAINER) {
            continue;
        }
        debug!(class = %entity.normalized_name, "generating code for class");
        let decl = port.decl(entity.decl);
        let (plan, errors) = plan_class(port, entity.decl, Some(entity));
        generated.diagnostics.extend(
            errors
                .iter()
                .map(|error| error.to_diagnostic(&decl.location)),
        );
        generated
            .diagnostics
            .extend(check_input_operator(port, &operators, entity));
        generated
            .diagnostics
            .extend(check_missing_streamer(port, entity));

        let has_streamer = decl.as_class().is_some_and(|class| class.declares_streamer());
        let registration = Registration::for_class(port, &plan, entity, read_rules, has_streamer);
        emit_class_init(&mut ctx, &registration);
        if plan.version.is_some() {
            emit_class_functions(&mut ctx, &plan);
        }
        emit_wrappers(&mut ctx, &registration);
        if let Some(kind) = StreamerKind::of(&plan, entity.flags) {
            emit_streamer(&mut ctx, &plan, kind);
        }
        generated.registered += 1;
    }

    for entry in closure.iter() {
        match plan_container(port, &entry.normalized_name) {
            Ok(Some(plan)) => {
                trace!(container = %entry.normalized_name, "generating collection streamer");
                let registration = Registration::for_container(port, entry);
                emit_class_init(&mut ctx, &registration);
                emit_wrappers(&mut ctx, &registration);
                ctx.open("namespace refl_dict");
                emit_collection_streamer(&mut ctx, entry, &plan);
                ctx.close(" // namespace refl_dict");
                ctx.newline();
                generated.registered += 1;
            }
            Ok(None) => {}
            Err(error) => {
                let location = entry
                    .decl
                    .map(|id| port.decl(id).location.clone())
                    .unwrap_or_default();
                generated.diagnostics.push(error.to_diagnostic(&location));
            }
        }
    }

    generated.class_code = ctx.take_output();
    debug!(
        registered = generated.registered,
        diagnostics = generated.diagnostics.len(),
        "class code generated"
    );
    generated
}

#[cfg(test)]
mod tests;
