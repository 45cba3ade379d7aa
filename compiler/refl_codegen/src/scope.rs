//! Namespace nesting of class-level generated code.

use refl_ir::{DeclId, Introspect};

use crate::context::CodegenContext;

/// Where a class sits relative to its enclosing namespaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nesting {
    /// Enclosing namespaces, outermost first.
    pub namespaces: Vec<String>,
    /// Name relative to the innermost namespace; nested classes keep
    /// their enclosing class (`Outer::Inner`).
    pub local: String,
    pub qualified: String,
    /// `template <> ` for implicit template instances, empty otherwise.
    pub template_prefix: &'static str,
}

impl Nesting {
    /// Fully qualified spelling usable from any scope.
    pub fn global(&self) -> String {
        format!("::{}", self.qualified)
    }
}

pub fn nesting<P: Introspect + ?Sized>(port: &P, id: DeclId) -> Nesting {
    let decl = port.decl(id);
    let mut namespaces: Vec<String> = port
        .enclosing_scopes(id)
        .into_iter()
        .map(|scope| port.decl(scope))
        .filter(|scope| scope.is_namespace())
        .map(|scope| scope.name.clone())
        .collect();
    namespaces.reverse();

    let prefix = if namespaces.is_empty() {
        String::new()
    } else {
        format!("{}::", namespaces.join("::"))
    };
    let local = decl
        .qualified_name
        .strip_prefix(&prefix)
        .unwrap_or(&decl.qualified_name)
        .to_string();
    let template_prefix = match decl.as_class().and_then(|class| class.template.as_ref()) {
        Some(template) if !template.explicit_specialization => "template <> ",
        _ => "",
    };
    Nesting {
        namespaces,
        local,
        qualified: decl.qualified_name.clone(),
        template_prefix,
    }
}

pub fn open_namespaces<P: Introspect + ?Sized>(ctx: &mut CodegenContext<'_, P>, nesting: &Nesting) {
    for namespace in &nesting.namespaces {
        ctx.writeln(&format!("namespace {namespace} {{"));
    }
}

pub fn close_namespaces<P: Introspect + ?Sized>(ctx: &mut CodegenContext<'_, P>, nesting: &Nesting) {
    for namespace in nesting.namespaces.iter().rev() {
        ctx.writeln(&format!("}} // namespace {namespace}"));
    }
}
