//! Header provenance.
//!
//! For every selected entity, the minimal list of headers that declares it:
//! its own header first, then the headers of whatever a template instance
//! drags in through its arguments, bases, data members and method
//! signatures. Lists are deduplicated keeping the first occurrence.

use std::collections::BTreeMap;

use refl_ir::names::resolve_typedefs;
use refl_ir::{split_template, DeclId, DeclKind, Introspect, StlKind, TemplateArg, TypeRef};
use refl_select::{SelectedEntity, Selection};
use rustc_hash::FxHashSet;
use tracing::trace;

/// Headers per autoload key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderCatalog {
    /// Every key of every selected kind.
    pub decls: BTreeMap<String, Vec<String>>,
    /// Non-template classes only. The first header of each list becomes
    /// the `header` line of the index.
    pub classes: BTreeMap<String, Vec<String>>,
}

impl HeaderCatalog {
    pub fn headers_for(&self, key: &str) -> Option<&[String]> {
        self.decls.get(key).map(Vec::as_slice)
    }
}

/// Collect the header catalog of a selection.
///
/// Classes held back from code generation still contribute.
#[tracing::instrument(level = "debug", skip_all)]
pub fn extract_headers<P: Introspect + ?Sized>(port: &P, selection: &Selection) -> HeaderCatalog {
    let mut catalog = HeaderCatalog::default();

    for entity in selection.all_classes() {
        let mut visited = FxHashSet::default();
        let headers = dedup(record_headers(port, entity.decl, &mut visited));
        let key = outer_key(port, entity);
        trace!(key = %key, headers = headers.len(), "class headers");
        let is_template = port
            .class(entity.decl)
            .is_some_and(|class| class.is_template_instance());

        if is_std(port, entity.decl) {
            trace!(key = %key, "standard instance is not an autoparse key");
        } else {
            catalog.decls.insert(key.clone(), headers.clone());
            catalog
                .decls
                .insert(entity.requested_name.clone(), headers.clone());
        }
        if !is_template {
            catalog.classes.insert(key, headers.clone());
            catalog.classes.insert(entity.requested_name.clone(), headers);
        }
    }

    for entity in &selection.typedefs {
        let decl = port.decl(entity.decl);
        let DeclKind::Typedef(typedef) = &decl.kind else {
            continue;
        };
        let target = resolve_typedefs(port, &typedef.target);
        let Some((class_id, _)) = record_name(&target).and_then(|name| port.lookup_class(name))
        else {
            continue;
        };
        let mut visited = FxHashSet::default();
        let mut headers = record_headers(port, class_id, &mut visited);
        if decl.location.is_known() {
            headers.push(decl.location.file.clone());
        }
        let key = match port.outermost_class(entity.decl) {
            Some(outer) => port.normalized_decl_name(outer),
            None => decl.qualified_name.clone(),
        };
        catalog.decls.insert(key, dedup(headers));
    }

    for entity in selection
        .functions
        .iter()
        .chain(&selection.variables)
        .chain(&selection.enums)
    {
        let decl = port.decl(entity.decl);
        let headers = if decl.location.is_known() {
            vec![decl.location.file.clone()]
        } else {
            Vec::new()
        };
        catalog.decls.insert(decl.qualified_name.clone(), headers);
    }

    catalog
}

/// Nested classes are found through their outermost class.
fn outer_key<P: Introspect + ?Sized>(port: &P, entity: &SelectedEntity) -> String {
    match port.outermost_class(entity.decl) {
        Some(outer) => port.normalized_decl_name(outer),
        None => entity.normalized_name.clone(),
    }
}

fn is_std<P: Introspect + ?Sized>(port: &P, id: DeclId) -> bool {
    let decl = port.decl(id);
    decl.qualified_name.starts_with("std::") || StlKind::of_instance(&decl.qualified_name).is_some()
}

/// Only class types (not pointers to them) have a record behind them.
fn record_name(ty: &TypeRef) -> Option<&str> {
    match ty.unqualified() {
        TypeRef::Named(name) => Some(name),
        _ => None,
    }
}

/// Headers needed by a class, own header first.
///
/// The list is built dependencies first and reversed at the end, so that
/// the class's own header leads and each dependency keeps its own order.
fn record_headers<P: Introspect + ?Sized>(
    port: &P,
    id: DeclId,
    visited: &mut FxHashSet<DeclId>,
) -> Vec<String> {
    if !visited.insert(id) {
        return Vec::new();
    }
    let decl = port.decl(id);
    let mut headers = Vec::new();

    if let Some(class) = decl.as_class() {
        if let Some(template) = &class.template {
            for arg in template.args.iter().filter_map(TemplateArg::as_type) {
                headers.extend(type_headers(port, arg, visited, false));
            }
            if !is_std(port, id) && class.complete {
                for base in &class.bases {
                    headers.extend(type_headers(port, &base.ty, visited, false));
                }
                for field in &class.fields {
                    headers.extend(type_headers(port, &field.ty, visited, true));
                }
                for method in &class.methods {
                    for param in &method.params {
                        headers.extend(type_headers(port, param, visited, true));
                    }
                    if let Some(returns) = &method.returns {
                        headers.extend(type_headers(port, returns, visited, true));
                    }
                }
            }
        }
    }

    if decl.location.is_known() {
        headers.push(decl.location.file.clone());
    }
    headers.reverse();
    headers
}

/// Headers of the class behind a type, looking through pointers,
/// references and arrays.
fn type_headers<P: Introspect + ?Sized>(
    port: &P,
    ty: &TypeRef,
    visited: &mut FxHashSet<DeclId>,
    needs_definition: bool,
) -> Vec<String> {
    let resolved = resolve_typedefs(port, ty);
    let Some(name) = resolved.innermost_name() else {
        return Vec::new();
    };
    match port.lookup_class(name) {
        Some((id, class)) => {
            if needs_definition && !class.complete {
                return Vec::new();
            }
            record_headers(port, id, visited)
        }
        None => instance_headers(port, name, visited),
    }
}

/// A standard container instance the universe does not declare: its
/// element types, then the container's own header.
fn instance_headers<P: Introspect + ?Sized>(
    port: &P,
    name: &str,
    visited: &mut FxHashSet<DeclId>,
) -> Vec<String> {
    let Some((base, args)) = split_template(name) else {
        return Vec::new();
    };
    let Some(kind) = StlKind::from_template_name(base) else {
        return Vec::new();
    };
    let mut headers = Vec::new();
    for arg in args {
        if let Ok(ty) = TypeRef::parse(arg) {
            headers.extend(type_headers(port, &ty, visited, false));
        }
    }
    headers.push(kind.template_name().to_string());
    headers.reverse();
    headers
}

fn dedup(headers: Vec<String>) -> Vec<String> {
    let mut seen = FxHashSet::default();
    headers
        .into_iter()
        .filter(|header| seen.insert(header.clone()))
        .collect()
}
