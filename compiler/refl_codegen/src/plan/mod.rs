//! Member stream plans.
//!
//! A plan is the per-member case analysis the streamer generator and the
//! wire interpreter share: which category a data member falls into, its
//! array extents or data-dependent length, whether it is narrowed and
//! whether it is transient. Members that cannot be transferred yield a
//! [`PlanError`] instead of a plan.

use refl_ir::names::{normalize_type, resolve_typedefs};
use refl_ir::stl::is_std_string;
use refl_ir::{
    split_template, ClassDecl, DeclId, FieldDecl, Fundamental, Introspect, StlKind, TypeRef,
};
use refl_select::rule::attr;
use refl_select::SelectedEntity;

use crate::error::{LengthProblem, PlanError};

/// The member categories of the streamer protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Fundamental,
    Enumeral,
    FixedArray,
    Pointer,
    CharacterString,
    GenericContainer,
    NestedObject,
}

/// Element of a fixed array of numbers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArrayElement {
    Fundamental(Fundamental),
    Enumeral,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StringForm {
    Value,
    Array(Vec<u64>),
    Pointer,
}

/// How a container member is held by its class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Holder {
    Value,
    Array(Vec<u64>),
    Pointer,
    PointerArray(Vec<u64>),
}

impl Holder {
    pub fn dims(&self) -> &[u64] {
        match self {
            Holder::Array(dims) | Holder::PointerArray(dims) => dims,
            Holder::Value | Holder::Pointer => &[],
        }
    }
}

/// One element slot of a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Element {
    Fundamental(Fundamental),
    /// Enumerations travel as `Int_t`; the name is needed for the cast back.
    Enumeral(String),
    String,
    Object(String),
    ObjectPointer(String),
    Container(Box<ContainerPlan>),
}

impl Element {
    /// Whether the element is transferred through a runtime class lookup.
    pub fn needs_class(&self) -> bool {
        matches!(
            self,
            Element::Object(_) | Element::ObjectPointer(_) | Element::Container(_)
        )
    }

    /// Spelling of the element type in generated code.
    pub fn cxx_type(&self) -> String {
        match self {
            Element::Fundamental(fundamental) => fundamental.spelling().to_string(),
            Element::Enumeral(name) | Element::Object(name) => cxx_name(name),
            Element::String => "std::string".to_string(),
            Element::ObjectPointer(name) => format!("{}*", cxx_name(name)),
            Element::Container(plan) => cxx_name(&plan.type_name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerPlan {
    pub kind: StlKind,
    /// Normalized container name.
    pub type_name: String,
    /// Element type, or key type for maps.
    pub first: Element,
    /// Mapped type for maps.
    pub second: Option<Element>,
}

/// Whether a nested object streams itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectStreamer {
    /// The class declares a version or a `Streamer` method.
    Own,
    /// Transferred through the generic typed-object call.
    Generic,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemberShape {
    Fundamental(Fundamental),
    Enumeral,
    FixedArray {
        element: ArrayElement,
        dims: Vec<u64>,
    },
    /// Pointer to a run of numbers whose length is another data member.
    FundamentalPointer {
        element: Fundamental,
        length: String,
    },
    String(StringForm),
    Container {
        plan: ContainerPlan,
        holder: Holder,
    },
    Object {
        class: String,
        streamer: ObjectStreamer,
        dims: Vec<u64>,
    },
    ObjectPointer {
        class: String,
        dims: Vec<u64>,
    },
}

/// How one data member is streamed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberStreamPlan {
    pub name: String,
    /// Declared type.
    pub ty: TypeRef,
    pub shape: MemberShape,
    /// Reduced-precision `Float16_t`/`Double32_t` storage.
    pub narrowed: bool,
    pub transient: bool,
}

impl MemberStreamPlan {
    pub fn category(&self) -> Category {
        match &self.shape {
            MemberShape::Fundamental(_) => Category::Fundamental,
            MemberShape::Enumeral => Category::Enumeral,
            MemberShape::FixedArray { .. } => Category::FixedArray,
            MemberShape::FundamentalPointer { .. } | MemberShape::ObjectPointer { .. } => {
                Category::Pointer
            }
            MemberShape::String(_) => Category::CharacterString,
            MemberShape::Container { .. } => Category::GenericContainer,
            MemberShape::Object { .. } => Category::NestedObject,
        }
    }

    /// Sibling field holding the element count of a pointer member.
    pub fn length(&self) -> Option<&str> {
        match &self.shape {
            MemberShape::FundamentalPointer { length, .. } => Some(length),
            _ => None,
        }
    }
}

/// Everything the generator needs to stream one class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassPlan {
    pub decl: DeclId,
    /// Qualified name as declared.
    pub class: String,
    pub version: Option<i32>,
    /// Bases that stream themselves, in declaration order.
    pub bases: Vec<String>,
    /// Non-static data members in declaration order, transient ones included.
    pub members: Vec<MemberStreamPlan>,
}

impl ClassPlan {
    pub fn persistent(&self) -> impl Iterator<Item = &MemberStreamPlan> {
        self.members.iter().filter(|member| !member.transient)
    }

    pub fn member(&self, name: &str) -> Option<&MemberStreamPlan> {
        self.members.iter().find(|member| member.name == name)
    }
}

/// Build the stream plan of a class.
///
/// `entity` carries the member overrides of the rule that selected it;
/// classes reached only as nested objects have none.
pub fn plan_class<P: Introspect + ?Sized>(
    port: &P,
    id: DeclId,
    entity: Option<&SelectedEntity>,
) -> (ClassPlan, Vec<PlanError>) {
    let decl = port.decl(id);
    let mut plan = ClassPlan {
        decl: id,
        class: decl.qualified_name.clone(),
        version: None,
        bases: Vec::new(),
        members: Vec::new(),
    };
    let mut errors = Vec::new();
    let Some(class) = decl.as_class() else {
        return (plan, errors);
    };
    plan.version = class.version;
    plan.bases = streamable_bases(port, class);

    let planner = Planner {
        port,
        class,
        class_name: &decl.qualified_name,
    };
    for (index, field) in class.fields.iter().enumerate() {
        if field.is_static {
            continue;
        }
        match planner.member(index, field) {
            Ok(mut member) => {
                member.transient = is_transient(field, entity);
                plan.members.push(member);
            }
            // A transient member is never streamed, so its shape does not matter.
            Err(_) if is_transient(field, entity) => {}
            Err(error) => errors.push(error),
        }
    }
    (plan, errors)
}

/// Bases whose own streamer is called before the members.
pub fn streamable_bases<P: Introspect + ?Sized>(port: &P, class: &ClassDecl) -> Vec<String> {
    class
        .bases
        .iter()
        .filter_map(|base| {
            let name = normalize_type(port, base.ty.unqualified());
            let (_, base_class) = port.lookup_class(&name)?;
            base_class.declares_streamer().then_some(name)
        })
        .collect()
}

fn is_transient(field: &FieldDecl, entity: Option<&SelectedEntity>) -> bool {
    if field.comment.starts_with('!') {
        return true;
    }
    let Some(entity) = entity else {
        return false;
    };
    if entity.is_field_suppressed(&field.name) {
        return true;
    }
    entity.field_attributes(&field.name).is_some_and(|attrs| {
        attrs.is_true(attr::TRANSIENT)
            || attrs.is_false(attr::PERSISTENT)
            || attrs.get(attr::COMMENT).is_some_and(|c| c.starts_with('!'))
    })
}

struct Planner<'a, P: ?Sized> {
    port: &'a P,
    class: &'a ClassDecl,
    class_name: &'a str,
}

impl<P: Introspect + ?Sized> Planner<'_, P> {
    fn site<'f>(&'f self, field: &'f FieldDecl) -> Site<'f> {
        Site {
            class: self.class_name,
            member: &field.name,
        }
    }

    fn member(&self, index: usize, field: &FieldDecl) -> Result<MemberStreamPlan, PlanError> {
        let resolved = resolve_typedefs(self.port, &field.ty);
        let (dims, element) = resolved.array_dims();
        let shape = match element.unqualified() {
            TypeRef::Fundamental(fundamental) if dims.is_empty() => {
                MemberShape::Fundamental(*fundamental)
            }
            TypeRef::Fundamental(fundamental) => MemberShape::FixedArray {
                element: ArrayElement::Fundamental(*fundamental),
                dims,
            },
            TypeRef::Named(name) if self.port.is_enum(name) => {
                if dims.is_empty() {
                    MemberShape::Enumeral
                } else {
                    MemberShape::FixedArray {
                        element: ArrayElement::Enumeral,
                        dims,
                    }
                }
            }
            TypeRef::Named(name) => self.named(field, name, dims, false)?,
            TypeRef::Pointer(pointee) => self.pointer(index, field, pointee, dims)?,
            // `unqualified` strips references and const.
            _ => return Err(element_error(self.port, self.site(field), &resolved)),
        };
        let narrowed = match &shape {
            MemberShape::Fundamental(f)
            | MemberShape::FixedArray {
                element: ArrayElement::Fundamental(f),
                ..
            }
            | MemberShape::FundamentalPointer { element: f, .. } => f.is_narrowed(),
            _ => false,
        };
        Ok(MemberStreamPlan {
            name: field.name.clone(),
            ty: field.ty.clone(),
            shape,
            narrowed,
            transient: false,
        })
    }

    fn pointer(
        &self,
        index: usize,
        field: &FieldDecl,
        pointee: &TypeRef,
        dims: Vec<u64>,
    ) -> Result<MemberShape, PlanError> {
        let pointee = pointee.unqualified();
        if matches!(pointee, TypeRef::Pointer(_)) {
            return Err(PlanError::PointerToPointer {
                class: self.class_name.to_string(),
                member: field.name.clone(),
            });
        }
        let fundamental = match pointee {
            TypeRef::Fundamental(fundamental) => Some(*fundamental),
            TypeRef::Named(name) if self.port.is_enum(name) => Some(Fundamental::Int),
            _ => None,
        };
        if let Some(element) = fundamental {
            if !dims.is_empty() {
                return Err(PlanError::PointerArray {
                    class: self.class_name.to_string(),
                    member: field.name.clone(),
                });
            }
            let length = self.length(index, field)?;
            return Ok(MemberShape::FundamentalPointer { element, length });
        }
        match pointee {
            TypeRef::Named(name) => self.named(field, name, dims, true),
            _ => Err(element_error(self.port, self.site(field), pointee)),
        }
    }

    fn named(
        &self,
        field: &FieldDecl,
        name: &str,
        dims: Vec<u64>,
        pointer: bool,
    ) -> Result<MemberShape, PlanError> {
        let normalized = self.port.normalized_name(name);
        if is_std_string(name) || normalized == "string" {
            let form = match (pointer, dims.is_empty()) {
                (false, true) => StringForm::Value,
                (false, false) => StringForm::Array(dims),
                (true, true) => StringForm::Pointer,
                (true, false) => {
                    return Err(PlanError::StringPointerArray {
                        class: self.class_name.to_string(),
                        member: field.name.clone(),
                    })
                }
            };
            return Ok(MemberShape::String(form));
        }
        if let Some(plan) = container(self.port, self.site(field), &normalized)? {
            let holder = match (pointer, dims.is_empty()) {
                (false, true) => Holder::Value,
                (false, false) => Holder::Array(dims),
                (true, true) => Holder::Pointer,
                (true, false) => Holder::PointerArray(dims),
            };
            return Ok(MemberShape::Container { plan, holder });
        }
        if pointer {
            return Ok(MemberShape::ObjectPointer {
                class: normalized,
                dims,
            });
        }
        let streamer = match self.port.lookup_class(&normalized) {
            Some((_, class)) if class.declares_streamer() => ObjectStreamer::Own,
            _ => ObjectStreamer::Generic,
        };
        Ok(MemberShape::Object {
            class: normalized,
            streamer,
            dims,
        })
    }

    /// Validate the `[expr]` length comment of a pointer member.
    fn length(&self, index: usize, field: &FieldDecl) -> Result<String, PlanError> {
        let Some(expression) = length_expression(&field.comment) else {
            return Err(PlanError::MissingLength {
                class: self.class_name.to_string(),
                member: field.name.clone(),
            });
        };
        let invalid = |problem| PlanError::InvalidLength {
            class: self.class_name.to_string(),
            member: field.name.clone(),
            problem,
        };
        if expression.is_empty() {
            return Err(invalid(LengthProblem::NoSizeIndication));
        }
        for token in expression
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|token| !token.is_empty())
        {
            if token.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            match self.class.field(token) {
                Some((position, _)) if position >= index => {
                    return Err(invalid(LengthProblem::NotDefinedBefore(token.to_string())))
                }
                Some((_, length_field)) => {
                    if !self.is_integer(&length_field.ty) {
                        return Err(invalid(LengthProblem::NotInteger(token.to_string())));
                    }
                }
                None => match self.base_field(token) {
                    Some(ty) if self.is_integer(&ty) => {}
                    Some(_) => return Err(invalid(LengthProblem::NotInteger(token.to_string()))),
                    None => return Err(invalid(LengthProblem::Unknown(token.to_string()))),
                },
            }
        }
        Ok(expression.to_string())
    }

    fn is_integer(&self, ty: &TypeRef) -> bool {
        resolve_typedefs(self.port, ty)
            .as_fundamental()
            .is_some_and(Fundamental::is_integer)
    }

    /// Type of a data member inherited from a (transitive) base.
    fn base_field(&self, name: &str) -> Option<TypeRef> {
        let mut pending: Vec<&ClassDecl> = vec![self.class];
        let mut depth = 0;
        while let Some(class) = pending.pop() {
            depth += 1;
            if depth > 64 {
                break;
            }
            for base in &class.bases {
                let base_name = normalize_type(self.port, base.ty.unqualified());
                if let Some((_, base_class)) = self.port.lookup_class(&base_name) {
                    if let Some((_, field)) = base_class.field(name) {
                        return Some(field.ty.clone());
                    }
                    pending.push(base_class);
                }
            }
        }
        None
    }
}

/// Member a container analysis is reported against.
#[derive(Copy, Clone)]
struct Site<'a> {
    class: &'a str,
    member: &'a str,
}

/// Plan a container instance by normalized name.
///
/// `Ok(None)` when the name is not a container. Errors are reported against
/// the container itself, with `value_type` as the member.
pub fn plan_container<P: Introspect + ?Sized>(
    port: &P,
    normalized: &str,
) -> Result<Option<ContainerPlan>, PlanError> {
    let site = Site {
        class: normalized,
        member: "value_type",
    };
    container(port, site, normalized)
}

fn container<P: Introspect + ?Sized>(
    port: &P,
    site: Site<'_>,
    normalized: &str,
) -> Result<Option<ContainerPlan>, PlanError> {
    let Some(kind) = StlKind::of_instance(normalized) else {
        return Ok(None);
    };
    let args = split_template(normalized)
        .map(|(_, args)| args)
        .unwrap_or_default();
    let slot = |position: usize| -> Result<Element, PlanError> {
        let spelling = args.get(position).copied().unwrap_or_default();
        let ty = TypeRef::parse(spelling).map_err(|_| PlanError::ContainerElement {
            class: site.class.to_string(),
            member: site.member.to_string(),
            element: spelling.to_string(),
        })?;
        element(port, site, &ty)
    };
    let first = slot(0)?;
    let second = if kind.is_map() { Some(slot(1)?) } else { None };
    Ok(Some(ContainerPlan {
        kind,
        type_name: normalized.to_string(),
        first,
        second,
    }))
}

fn element<P: Introspect + ?Sized>(
    port: &P,
    site: Site<'_>,
    ty: &TypeRef,
) -> Result<Element, PlanError> {
    let resolved = resolve_typedefs(port, ty);
    match resolved.unqualified() {
        TypeRef::Fundamental(fundamental) => Ok(Element::Fundamental(fundamental.storage())),
        TypeRef::Named(name) if port.is_enum(name) => {
            Ok(Element::Enumeral(port.normalized_name(name)))
        }
        TypeRef::Named(name) => {
            let normalized = port.normalized_name(name);
            if normalized == "string" {
                return Ok(Element::String);
            }
            match container(port, site, &normalized)? {
                Some(plan) => Ok(Element::Container(Box::new(plan))),
                None => Ok(Element::Object(normalized)),
            }
        }
        TypeRef::Pointer(inner) => match inner.unqualified() {
            TypeRef::Named(name) if !port.is_enum(name) => {
                let normalized = port.normalized_name(name);
                if normalized == "string" || StlKind::of_instance(&normalized).is_some() {
                    Err(element_error(port, site, &resolved))
                } else {
                    Ok(Element::ObjectPointer(normalized))
                }
            }
            _ => Err(element_error(port, site, &resolved)),
        },
        _ => Err(element_error(port, site, &resolved)),
    }
}

fn element_error<P: Introspect + ?Sized>(port: &P, site: Site<'_>, ty: &TypeRef) -> PlanError {
    PlanError::ContainerElement {
        class: site.class.to_string(),
        member: site.member.to_string(),
        element: normalize_type(port, ty),
    }
}

/// The bracketed length expression at the start of a member comment.
pub fn length_expression(comment: &str) -> Option<&str> {
    let rest = comment.trim_start().strip_prefix('[')?;
    let end = rest.find(']')?;
    Some(rest[..end].trim())
}

const STD_TEMPLATES: &[&str] = &[
    "vector",
    "list",
    "deque",
    "forward_list",
    "set",
    "multiset",
    "unordered_set",
    "unordered_multiset",
    "map",
    "multimap",
    "unordered_map",
    "unordered_multimap",
    "pair",
    "basic_string",
];

/// Spell a normalized name for generated code: standard templates and
/// `string` get their `std::` qualification back.
pub fn cxx_name(normalized: &str) -> String {
    if normalized == "string" {
        return "std::string".to_string();
    }
    let Some((base, args)) = split_template(normalized) else {
        return normalized.to_string();
    };
    let base = if STD_TEMPLATES.contains(&base) {
        format!("std::{base}")
    } else {
        base.to_string()
    };
    let args: Vec<String> = args
        .iter()
        .map(|arg| match TypeRef::parse(arg) {
            Ok(ty) => cxx_type(&ty),
            Err(_) => (*arg).to_string(),
        })
        .collect();
    refl_ir::names::join_template(&base, &args)
}

/// Spell a type expression for generated code.
pub fn cxx_type(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Fundamental(fundamental) => fundamental.spelling().to_string(),
        TypeRef::Named(name) => cxx_name(name),
        TypeRef::Pointer(inner) => format!("{}*", cxx_type(inner)),
        TypeRef::Reference(inner) => format!("{}&", cxx_type(inner)),
        TypeRef::Const(inner) => match inner.as_ref() {
            TypeRef::Pointer(_) => format!("{} const", cxx_type(inner)),
            _ => format!("const {}", cxx_type(inner)),
        },
        TypeRef::Array(..) => {
            let (dims, element) = ty.array_dims();
            let mut out = cxx_type(element);
            for dim in dims {
                out.push_str(&format!("[{dim}]"));
            }
            out
        }
    }
}
