//! The introspection port: everything the pipeline asks of a frontend.

use crate::decl::{ClassDecl, Decl, DeclId, DeclKind};
use crate::names;
use crate::types::TypeRef;

/// Synchronous query surface over a declaration universe.
///
/// Implementations must return declarations in a stable (source) order so
/// that every pipeline stage is deterministic.
pub trait Introspect {
    /// Every declaration, in source order. `DeclId::index` indexes this slice.
    fn declarations(&self) -> &[Decl];

    /// Find a declaration by qualified or normalized spelling.
    fn lookup(&self, name: &str) -> Option<DeclId>;

    fn decl(&self, id: DeclId) -> &Decl {
        &self.declarations()[id.index()]
    }

    fn class(&self, id: DeclId) -> Option<&ClassDecl> {
        self.decl(id).as_class()
    }

    fn lookup_class(&self, name: &str) -> Option<(DeclId, &ClassDecl)> {
        let id = self.lookup(name)?;
        self.class(id).map(|class| (id, class))
    }

    /// Underlying type of a typedef.
    fn typedef_target(&self, name: &str) -> Option<&TypeRef> {
        let id = self.lookup(name)?;
        match &self.decl(id).kind {
            DeclKind::Typedef(typedef) => Some(&typedef.target),
            _ => None,
        }
    }

    fn is_enum(&self, name: &str) -> bool {
        self.lookup(name)
            .is_some_and(|id| matches!(self.decl(id).kind, DeclKind::Enum(_)))
    }

    /// Demangled linker-level name of a class.
    fn typeinfo_name(&self, id: DeclId) -> Option<&str> {
        self.class(id).and_then(|class| class.typeinfo_name.as_deref())
    }

    /// Canonical, typedef-expanded name for a type spelling.
    fn normalized_name(&self, spelling: &str) -> String {
        names::normalize_spelling(self, spelling)
    }

    fn normalized_decl_name(&self, id: DeclId) -> String {
        self.normalized_name(self.decl(id).qualified_name())
    }

    /// Walk enclosing scopes from the innermost outwards.
    fn enclosing_scopes(&self, id: DeclId) -> Vec<DeclId> {
        let mut scopes = Vec::new();
        let mut current = self.decl(id).parent;
        while let Some(parent) = current {
            scopes.push(parent);
            current = self.decl(parent).parent;
        }
        scopes
    }

    /// Outermost enclosing class, when the declaration is nested in one.
    fn outermost_class(&self, id: DeclId) -> Option<DeclId> {
        self.enclosing_scopes(id)
            .into_iter()
            .filter(|scope| self.class(*scope).is_some())
            .last()
    }
}
