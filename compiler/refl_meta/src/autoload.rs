//! Autoload keys: the names under which the runtime finds the library
//! that provides an entity.

use refl_ir::Introspect;
use refl_select::{SelectedEntity, Selection};
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::error::IndexError;

/// Autoload keys per section of the index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutoloadKeys {
    /// Sorted and deduplicated.
    pub classes: Vec<String>,
    pub namespaces: Vec<String>,
    pub typedefs: Vec<String>,
    pub enums: Vec<String>,
    pub variables: Vec<String>,
}

impl AutoloadKeys {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.namespaces.is_empty()
            && self.typedefs.is_empty()
            && self.enums.is_empty()
            && self.variables.is_empty()
    }
}

/// Collect the autoload keys of a selection.
///
/// A class nested in another class is published under its outermost
/// class, unless it is a template instance. Otherwise a class gets its
/// normalized name, its requested spelling and the demangled linker name
/// when those differ. Narrowed pseudo-typedefs never reach the linker, so
/// classes mentioning them get no linker-name alias.
#[tracing::instrument(level = "debug", skip_all)]
pub fn extract_autoload_keys<P: Introspect + ?Sized>(
    port: &P,
    selection: &Selection,
) -> Result<AutoloadKeys, IndexError> {
    let mut keys = AutoloadKeys::default();
    let mut classes_seen: FxHashSet<String> = FxHashSet::default();
    let mut outer_seen: FxHashSet<String> = FxHashSet::default();

    for entity in selection.all_classes() {
        let normalized = &entity.normalized_name;
        if !classes_seen.insert(normalized.clone()) && !outer_seen.contains(normalized) {
            return Err(IndexError::DuplicateClass(normalized.clone()));
        }
        if !entity.in_rootmap() {
            trace!(class = %normalized, "kept out of the index");
            continue;
        }

        let is_template = port
            .class(entity.decl)
            .is_some_and(|class| class.is_template_instance());
        let outer = port
            .outermost_class(entity.decl)
            .map(|id| port.normalized_decl_name(id));
        if let Some(outer) = outer.filter(|_| !is_template) {
            if classes_seen.insert(outer.clone()) && outer_seen.insert(outer.clone()) {
                keys.classes.push(outer);
                continue;
            }
        }

        keys.classes.push(normalized.clone());
        if !entity.requested_name.is_empty() && entity.requested_name != *normalized {
            keys.classes.push(entity.requested_name.clone());
        }
        if let Some(alias) = linker_alias(port, entity) {
            keys.classes.push(alias);
        }
    }
    keys.classes.sort();
    keys.classes.dedup();

    keys.namespaces = selection
        .namespaces
        .iter()
        .filter(|entity| entity.in_rootmap())
        .map(|entity| port.decl(entity.decl).qualified_name.clone())
        .collect();
    keys.typedefs = outermost_keys(port, &selection.typedefs);
    keys.enums = outermost_keys(port, &selection.enums);
    keys.variables = outermost_keys(port, &selection.variables);

    Ok(keys)
}

/// The demangled linker name, when it adds a new spelling.
fn linker_alias<P: Introspect + ?Sized>(port: &P, entity: &SelectedEntity) -> Option<String> {
    let normalized = &entity.normalized_name;
    if normalized.contains("Double32_t") || normalized.contains("Float16_t") {
        return None;
    }
    let demangled = port.normalized_name(port.typeinfo_name(entity.decl)?);
    (demangled != *normalized && demangled != entity.requested_name).then_some(demangled)
}

/// Entities nested in a class are reached through the class key already.
fn outermost_keys<P: Introspect + ?Sized>(port: &P, entities: &[SelectedEntity]) -> Vec<String> {
    entities
        .iter()
        .filter(|entity| entity.in_rootmap() && port.outermost_class(entity.decl).is_none())
        .map(|entity| port.decl(entity.decl).qualified_name.clone())
        .collect()
}
