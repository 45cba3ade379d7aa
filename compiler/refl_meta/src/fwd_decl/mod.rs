//! Forward declarations of selected entities.
//!
//! Each entity is declared (not defined) inside its enclosing namespaces,
//! one line per entity:
//!
//! ```text
//! namespace ev { namespace io { class Reader; } }
//! namespace ev { template <typename T0> class Holder; }
//! extern int gRun;
//! ```
//!
//! Entities nested in classes and entities of the standard library cannot
//! be forward-declared and are left out.

use refl_ir::{
    split_scopes, ClassDecl, Decl, DeclId, DeclKind, Introspect, TemplateArg, TemplateInfo,
    TypeRef,
};
use refl_select::Selection;
use rustc_hash::{FxHashMap, FxHashSet};

/// Order-preserving set of declaration lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForwardDecls {
    lines: Vec<String>,
    seen: FxHashSet<String>,
}

impl ForwardDecls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declarations for the `{ decls }` block of the index: variables,
    /// enums, then classes (held-back ones included).
    pub fn for_index<P: Introspect + ?Sized>(port: &P, selection: &Selection) -> Self {
        let mut decls = ForwardDecls::new();
        for entity in selection.variables.iter().chain(&selection.enums) {
            decls.push_decl(port, entity.decl);
        }
        for entity in selection.all_classes() {
            decls.push_decl(port, entity.decl);
        }
        decls
    }

    /// Declarations embedded in the module registration: the index
    /// declarations plus selected typedefs.
    pub fn for_payload<P: Introspect + ?Sized>(port: &P, selection: &Selection) -> Self {
        let mut decls = Self::for_index(port, selection);
        for entity in &selection.typedefs {
            if let DeclKind::Typedef(typedef) = &port.decl(entity.decl).kind {
                if let Some(target) = typedef.target.innermost_name() {
                    if let Some(id) = port.lookup(target) {
                        decls.push_decl(port, id);
                    }
                }
            }
            decls.push_decl(port, entity.decl);
        }
        decls
    }

    fn push_decl<P: Introspect + ?Sized>(&mut self, port: &P, id: DeclId) {
        if let Some(text) = forward_declaration(port, id) {
            if let Some(wrapped) = enclose_in_namespaces(port, id, &text) {
                self.push(&wrapped);
            }
        }
    }

    /// Append every line of `text` not seen before.
    ///
    /// Returns `true` if anything was added.
    pub fn push(&mut self, text: &str) -> bool {
        let mut added = false;
        for line in text.lines() {
            if !line.is_empty() && self.seen.insert(line.to_string()) {
                self.lines.push(line.to_string());
                added = true;
            }
        }
        added
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The lines, each terminated by a newline.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// The bare declaration of an entity, without its namespaces.
pub fn forward_declaration<P: Introspect + ?Sized>(port: &P, id: DeclId) -> Option<String> {
    let decl = port.decl(id);
    match &decl.kind {
        DeclKind::Class(class) => Some(class_declaration(decl, class)),
        DeclKind::Enum(spec) => {
            let name = &decl.name;
            match (&spec.underlying, spec.scoped) {
                (Some(underlying), true) => Some(format!("enum class {name} : {underlying};")),
                (None, true) => Some(format!("enum class {name};")),
                (Some(underlying), false) => Some(format!("enum {name} : {underlying};")),
                // An unscoped enum without a fixed type cannot be declared
                // ahead of its definition.
                (None, false) => None,
            }
        }
        DeclKind::Variable(variable) => {
            Some(format!("extern {};", declarator(&variable.ty, &decl.name)))
        }
        DeclKind::Typedef(typedef) => {
            Some(format!("typedef {};", declarator(&typedef.target, &decl.name)))
        }
        DeclKind::Namespace | DeclKind::Function(_) => None,
    }
}

fn class_declaration(decl: &Decl, class: &ClassDecl) -> String {
    let keyword = class.tag.keyword();
    match &class.template {
        Some(template) if !template.args.is_empty() => {
            let name = split_scopes(&template.name)
                .last()
                .copied()
                .unwrap_or(template.name.as_str());
            let mut text = format!(
                "template <{}> {keyword} {name};",
                template_parameters(template)
            );
            if template.explicit_specialization {
                text.push_str(&format!(" template <> {keyword} {};", decl.name));
            }
            text
        }
        _ => format!("{keyword} {};", decl.name),
    }
}

/// Parameter list of the primary template. When the frontend did not
/// report the parameters, they are reconstructed from the arguments.
fn template_parameters(template: &TemplateInfo) -> String {
    if !template.params.is_empty() {
        return template
            .params
            .iter()
            .map(|param| match &param.value_type {
                Some(ty) => format!("{ty} {}", param.name),
                None => format!("typename {}", param.name),
            })
            .collect::<Vec<_>>()
            .join(", ");
    }
    template
        .args
        .iter()
        .enumerate()
        .map(|(index, arg)| match arg {
            TemplateArg::Type(_) => format!("typename T{index}"),
            TemplateArg::Value(value) if value == "true" || value == "false" => {
                format!("bool N{index}")
            }
            TemplateArg::Value(_) => format!("int N{index}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `type name`, with array extents after the name.
fn declarator(ty: &TypeRef, name: &str) -> String {
    let (dims, elem) = ty.array_dims();
    let mut out = format!("{elem} {name}");
    for dim in dims {
        out.push_str(&format!("[{dim}]"));
    }
    out
}

/// Wrap a declaration in the namespaces enclosing `id`.
///
/// Returns `None` when an enclosing scope is a class or the standard
/// namespace.
pub fn enclose_in_namespaces<P: Introspect + ?Sized>(
    port: &P,
    id: DeclId,
    text: &str,
) -> Option<String> {
    let scopes = port.enclosing_scopes(id);
    let mut out = String::new();
    for scope in scopes.iter().rev() {
        let scope = port.decl(*scope);
        if !scope.is_namespace() || scope.qualified_name == "std" {
            return None;
        }
        out.push_str(&format!("namespace {} {{ ", scope.name));
    }
    out.push_str(text);
    for _ in &scopes {
        out.push_str(" }");
    }
    Some(out)
}

/// Split a wrapped line into its namespace prefix (up to the innermost
/// `{`) and the declarations inside it.
fn split_namespace(line: &str) -> Option<(&str, &str)> {
    let open = line.rfind('{')?;
    let close = line[open..].find('}')? + open;
    let prefix = &line[..=open];
    prefix.starts_with("namespace ").then(|| (prefix, line[open + 1..close].trim()))
}

/// Merge lines with identical namespace nesting into one line.
///
/// ```text
/// namespace A { namespace B { class X; } }
/// namespace A { namespace B { class Y; } }
/// ```
/// becomes `namespace A { namespace B { class X; class Y; } }`. Lines
/// outside any namespace come first, in their original order; merged lines
/// follow in order of first appearance.
pub fn collapse_identical_namespaces(lines: &[String]) -> Vec<String> {
    let mut plain = Vec::new();
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();

    for line in lines {
        match split_namespace(line) {
            Some((prefix, contained)) => {
                let slot = *index.entry(prefix).or_insert_with(|| {
                    groups.push((prefix, Vec::new()));
                    groups.len() - 1
                });
                if !contained.is_empty() {
                    groups[slot].1.push(contained);
                }
            }
            None => plain.push(line.clone()),
        }
    }

    let mut out = plain;
    for (prefix, contained) in groups {
        let depth = prefix.matches('{').count();
        let mut line = prefix.to_string();
        for entity in contained {
            line.push(' ');
            line.push_str(entity);
        }
        line.push_str(&" }".repeat(depth));
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests;
