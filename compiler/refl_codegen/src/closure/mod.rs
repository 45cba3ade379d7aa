//! Closure resolution for container instantiations.
//!
//! Every container instance reachable from a selected class (through data
//! members, bases and template arguments) needs its own dictionary entry.
//! A discovered instance with a declaration also reaches further instances
//! through its method signatures. The resolver walks those types with a worklist until no
//! new instance turns up and records each one exactly once, in discovery
//! order, in a [`ClosureRegistry`].
//!
//! The registry owns its sequence counter, so two runs over the same
//! universe and selection assign the same ids.

use std::collections::VecDeque;

use refl_diagnostic::{Diagnostic, ErrorCode};
use refl_ir::names::normalize_type;
use refl_ir::{split_template, DeclId, Introspect, StlKind, TemplateArg, TypeRef};
use refl_select::{SelectedEntity, Selection, SelectionError};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// A container instance that needs a dictionary entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureEntry {
    /// Insertion-order id, starting at 1.
    pub id: u32,
    pub normalized_name: String,
    /// Name as first spelled, or as requested by a selection rule.
    pub requested_name: String,
    pub kind: StlKind,
    /// Declaration of the instance, when the universe has one.
    pub decl: Option<DeclId>,
    /// Selected explicitly rather than discovered.
    pub selected: bool,
}

/// Insertion-ordered set of container instances, keyed by normalized name.
#[derive(Clone, Debug, Default)]
pub struct ClosureRegistry {
    entries: Vec<ClosureEntry>,
    index: FxHashMap<String, usize>,
    next_id: u32,
}

impl ClosureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClosureEntry> {
        self.entries.iter()
    }

    pub fn get(&self, normalized_name: &str) -> Option<&ClosureEntry> {
        self.index
            .get(normalized_name)
            .map(|&position| &self.entries[position])
    }

    pub fn contains(&self, normalized_name: &str) -> bool {
        self.index.contains_key(normalized_name)
    }

    /// Insert an instance unless its normalized name is already present.
    ///
    /// Returns `Ok(true)` for a new entry. Two different declarations under
    /// one normalized name are a corruption of the universe.
    pub fn insert(
        &mut self,
        normalized_name: String,
        requested_name: String,
        kind: StlKind,
        decl: Option<DeclId>,
        selected: bool,
    ) -> Result<bool, SelectionError> {
        if let Some(&position) = self.index.get(&normalized_name) {
            let existing = &mut self.entries[position];
            match (existing.decl, decl) {
                (Some(first), Some(second)) if first != second => {
                    return Err(SelectionError::DuplicateName {
                        name: normalized_name,
                        first,
                        second,
                    })
                }
                (None, Some(found)) => existing.decl = Some(found),
                _ => {}
            }
            existing.selected |= selected;
            return Ok(false);
        }
        self.next_id += 1;
        let entry = ClosureEntry {
            id: self.next_id,
            normalized_name: normalized_name.clone(),
            requested_name,
            kind,
            decl,
            selected,
        };
        self.index.insert(normalized_name, self.entries.len());
        self.entries.push(entry);
        Ok(true)
    }
}

/// Result of a closure run.
#[derive(Debug)]
pub struct Closure {
    pub registry: ClosureRegistry,
    /// Warnings raised while discovering instances.
    pub diagnostics: Vec<Diagnostic>,
}

/// A type waiting to be examined.
struct Pending {
    ty: TypeRef,
    /// Requested spelling for explicitly selected containers.
    requested: Option<String>,
    selected: bool,
}

/// Whether method parameter and return types are followed.
///
/// Selected classes only reach instances through bases, members and
/// template arguments; a discovered instance also through its methods.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Signatures {
    Skip,
    Walk,
}

/// Worklist-driven fixed point over container instances.
pub struct ClosureResolver<'a, P: Introspect + ?Sized> {
    port: &'a P,
    registry: ClosureRegistry,
    worklist: VecDeque<Pending>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, P: Introspect + ?Sized> ClosureResolver<'a, P> {
    pub fn new(port: &'a P) -> Self {
        ClosureResolver {
            port,
            registry: ClosureRegistry::new(),
            worklist: VecDeque::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Seed with everything a selected class can reach directly.
    ///
    /// Explicitly selected containers are registered themselves. Rejected
    /// classes do not contribute.
    pub fn seed(&mut self, selection: &Selection) {
        for entity in &selection.classes {
            self.seed_entity(entity);
        }
    }

    fn seed_entity(&mut self, entity: &SelectedEntity) {
        let decl = self.port.decl(entity.decl);
        if StlKind::of_instance(&entity.normalized_name).is_some() {
            self.worklist.push_back(Pending {
                ty: TypeRef::named(&decl.qualified_name),
                requested: Some(entity.requested_name.clone()),
                selected: true,
            });
            return;
        }
        self.enqueue_class_types(entity.decl, Signatures::Skip);
    }

    /// Queue the bases, data members and template arguments of a class,
    /// and its method signatures when asked to.
    fn enqueue_class_types(&mut self, id: DeclId, signatures: Signatures) {
        let Some(class) = self.port.class(id) else {
            return;
        };
        if !class.complete {
            return;
        }
        let mut types: Vec<TypeRef> = Vec::new();
        types.extend(class.bases.iter().map(|base| base.ty.clone()));
        types.extend(class.fields.iter().map(|field| field.ty.clone()));
        if signatures == Signatures::Walk {
            for method in &class.methods {
                types.extend(method.params.iter().cloned());
                types.extend(method.returns.iter().cloned());
            }
        }
        if let Some(template) = &class.template {
            types.extend(template.args.iter().filter_map(TemplateArg::as_type).cloned());
        }
        for ty in types {
            self.enqueue(ty);
        }
    }

    fn enqueue(&mut self, ty: TypeRef) {
        self.worklist.push_back(Pending {
            ty,
            requested: None,
            selected: false,
        });
    }

    /// Run the worklist to its fixed point.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn resolve(mut self) -> Result<Closure, SelectionError> {
        while let Some(pending) = self.worklist.pop_front() {
            self.visit(pending)?;
        }
        debug!(instances = self.registry.len(), "closure complete");
        Ok(Closure {
            registry: self.registry,
            diagnostics: self.diagnostics,
        })
    }

    fn visit(&mut self, pending: Pending) -> Result<(), SelectionError> {
        let Some(spelled) = pending.ty.innermost_name() else {
            return Ok(());
        };
        let normalized = normalize_type(self.port, pending.ty.innermost());
        let Some(kind) = StlKind::of_instance(&normalized) else {
            // A typedef may name a container; a plain class only matters
            // through its template arguments.
            self.enqueue_arguments(&normalized);
            return Ok(());
        };
        let decl = self.port.lookup(&normalized);
        let requested = pending
            .requested
            .clone()
            .unwrap_or_else(|| spelled.to_string());
        let inserted =
            self.registry
                .insert(normalized.clone(), requested, kind, decl, pending.selected)?;
        if !inserted {
            return Ok(());
        }
        trace!(instance = %normalized, "closure instance registered");
        if kind == StlKind::Vector {
            self.check_element_alias(&normalized, decl);
        }
        self.enqueue_arguments(&normalized);
        if let Some(id) = decl {
            self.enqueue_class_types(id, Signatures::Walk);
        }
        Ok(())
    }

    /// Queue the type arguments of a template instance name.
    fn enqueue_arguments(&mut self, normalized: &str) {
        let Some((_, args)) = split_template(normalized) else {
            return;
        };
        let types: Vec<TypeRef> = args
            .iter()
            .filter_map(|arg| TypeRef::parse(arg).ok())
            .collect();
        for ty in types {
            if ty.innermost_name().is_some() {
                self.enqueue(ty);
            }
        }
    }

    /// `vector<bool>` is a bit field, not a sequence of `bool`s.
    fn check_element_alias(&mut self, normalized: &str, decl: Option<DeclId>) {
        let Some((_, args)) = split_template(normalized) else {
            return;
        };
        if args.first().copied() != Some("bool") {
            return;
        }
        let mut diag = Diagnostic::for_code(ErrorCode::E1006)
            .with_message(format!("`{normalized}` is not fully supported"))
            .with_suggestion("use `vector<char>` or `deque<bool>` instead");
        if let Some(id) = decl {
            diag = diag.at(&self.port.decl(id).location);
        }
        self.diagnostics.push(diag);
    }
}

/// Resolve the closure of a selection.
pub fn resolve_closure<P: Introspect + ?Sized>(
    port: &P,
    selection: &Selection,
) -> Result<Closure, SelectionError> {
    let mut resolver = ClosureResolver::new(port);
    resolver.seed(selection);
    resolver.resolve()
}

#[cfg(test)]
mod tests;
