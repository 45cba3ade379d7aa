//! The output of the selection engine.

use bitflags::bitflags;
use refl_diagnostic::{Diagnostic, ErrorCode};
use refl_ir::stl::{is_selection_unnecessary, is_unsupported_std};
use refl_ir::{Decl, DeclId, Introspect, TypeRef};
use smallvec::SmallVec;

use crate::rule::{attr, Attributes, MemberKind, RuleId};

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EntityFlags: u8 {
        /// Registered and indexed, but no streamer is generated.
        const METADATA_ONLY = 1 << 0;
        const GENERIC_CONTAINER = 1 << 1;
        const TEMPLATE_INSTANCE = 1 << 2;
        const NO_STREAMER = 1 << 3;
        const NO_INPUT_OPERATOR = 1 << 4;
        /// Schema-driven streamer requested with `+`.
        const STREAMER_INFO = 1 << 5;
    }
}

/// Per-member adjustments collected from nested rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberOverride {
    pub kind: MemberKind,
    pub name: String,
    pub attributes: Attributes,
    /// Set by an exclusion rule naming this member.
    pub suppressed: bool,
}

/// A declaration chosen for dictionary generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedEntity {
    pub decl: DeclId,
    /// Name as spelled by the rule that selected it.
    pub requested_name: String,
    pub normalized_name: String,
    pub flags: EntityFlags,
    pub attributes: Attributes,
    pub members: Vec<MemberOverride>,
    /// First inclusion rule that selected the declaration.
    pub rule: RuleId,
    /// Every inclusion rule that contributed.
    pub matched_rules: SmallVec<[RuleId; 2]>,
}

impl SelectedEntity {
    pub fn is_metadata_only(&self) -> bool {
        self.flags.contains(EntityFlags::METADATA_ONLY)
    }

    pub fn member(&self, kind: MemberKind, name: &str) -> Option<&MemberOverride> {
        self.members
            .iter()
            .find(|member| member.kind == kind && member.name == name)
    }

    pub fn is_field_suppressed(&self, name: &str) -> bool {
        self.member(MemberKind::Field, name)
            .is_some_and(|member| member.suppressed)
    }

    /// Attributes a nested `<field>` rule attached to a data member.
    pub fn field_attributes(&self, name: &str) -> Option<&Attributes> {
        self.member(MemberKind::Field, name)
            .map(|member| &member.attributes)
    }

    /// `rootmap="false"` keeps the entity out of the index.
    pub fn in_rootmap(&self) -> bool {
        !self.attributes.is_false(attr::ROOTMAP)
    }
}

/// Why a selected class was held back from code generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Only a forward declaration is visible.
    Incomplete,
    /// A (transitive) base is missing or incomplete.
    IncompleteBase(String),
    UnsupportedStd,
    SelectionUnnecessary,
}

/// Selected entities partitioned by declaration kind, in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub classes: Vec<SelectedEntity>,
    pub namespaces: Vec<SelectedEntity>,
    pub typedefs: Vec<SelectedEntity>,
    pub enums: Vec<SelectedEntity>,
    pub functions: Vec<SelectedEntity>,
    pub variables: Vec<SelectedEntity>,
    /// Classes held back from code generation. They still contribute
    /// headers and forward declarations.
    pub rejected: Vec<(SelectedEntity, Rejection)>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.classes.len()
            + self.namespaces.len()
            + self.typedefs.len()
            + self.enums.len()
            + self.functions.len()
            + self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entities of every kind.
    pub fn iter(&self) -> impl Iterator<Item = &SelectedEntity> {
        self.classes
            .iter()
            .chain(&self.namespaces)
            .chain(&self.typedefs)
            .chain(&self.enums)
            .chain(&self.functions)
            .chain(&self.variables)
    }

    pub fn class(&self, normalized_name: &str) -> Option<&SelectedEntity> {
        self.classes
            .iter()
            .find(|entity| entity.normalized_name == normalized_name)
    }

    /// Live classes followed by rejected ones, for header extraction.
    pub fn all_classes(&self) -> impl Iterator<Item = &SelectedEntity> {
        self.classes
            .iter()
            .chain(self.rejected.iter().map(|(entity, _)| entity))
    }

    /// Move classes that cannot be generated to the reject list.
    ///
    /// Standard types that cannot or need not be selected are errors;
    /// missing definitions are warnings.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn reject_unusable<P: Introspect + ?Sized>(&mut self, port: &P) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut kept = Vec::with_capacity(self.classes.len());
        for entity in std::mem::take(&mut self.classes) {
            match rejection(port, &entity) {
                Some(reason) => {
                    let decl = port.decl(entity.decl);
                    diagnostics.push(rejection_diagnostic(decl, &entity, &reason));
                    tracing::debug!(class = %entity.normalized_name, ?reason, "rejected");
                    self.rejected.push((entity, reason));
                }
                None => kept.push(entity),
            }
        }
        self.classes = kept;
        diagnostics
    }
}

fn rejection<P: Introspect + ?Sized>(port: &P, entity: &SelectedEntity) -> Option<Rejection> {
    let name = entity.normalized_name.as_str();
    if is_unsupported_std(name) {
        return Some(Rejection::UnsupportedStd);
    }
    if is_selection_unnecessary(name) {
        return Some(Rejection::SelectionUnnecessary);
    }
    let decl = port.decl(entity.decl);
    if !decl.is_complete() {
        return Some(Rejection::Incomplete);
    }
    incomplete_base(port, entity.decl, 0).map(Rejection::IncompleteBase)
}

/// First missing or incomplete base in the inheritance graph.
fn incomplete_base<P: Introspect + ?Sized>(port: &P, id: DeclId, depth: usize) -> Option<String> {
    // Inheritance cycles only occur in malformed dumps.
    if depth > 64 {
        return None;
    }
    let class = port.class(id)?;
    for base in &class.bases {
        let Some(name) = base_name(&base.ty) else {
            continue;
        };
        match port.lookup_class(name) {
            Some((base_id, base_class)) if base_class.complete => {
                if let Some(missing) = incomplete_base(port, base_id, depth + 1) {
                    return Some(missing);
                }
            }
            _ => return Some(name.to_string()),
        }
    }
    None
}

fn base_name(ty: &TypeRef) -> Option<&str> {
    match ty.unqualified() {
        TypeRef::Named(name) => Some(name),
        _ => None,
    }
}

fn rejection_diagnostic(decl: &Decl, entity: &SelectedEntity, reason: &Rejection) -> Diagnostic {
    let name = &entity.requested_name;
    let diag = match reason {
        Rejection::Incomplete => Diagnostic::for_code(ErrorCode::E1001).with_message(format!(
            "`{name}` is selected but only forward-declared; it will not be generated"
        )),
        Rejection::IncompleteBase(base) => Diagnostic::for_code(ErrorCode::E1002)
            .with_message(format!(
                "`{name}` derives from `{base}`, which has no definition; it will not be generated"
            )),
        Rejection::UnsupportedStd => Diagnostic::for_code(ErrorCode::E1004).with_message(format!(
            "`{name}` is a standard facility that cannot be streamed"
        )),
        Rejection::SelectionUnnecessary => Diagnostic::for_code(ErrorCode::E1005)
            .with_message(format!("`{name}` does not need to be selected"))
            .with_suggestion("remove it from the selection; its users are handled automatically"),
    };
    diag.at(&decl.location)
}
