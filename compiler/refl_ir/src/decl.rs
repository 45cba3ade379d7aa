//! The declaration model handed to the pipeline by the frontend.
//!
//! Declarations are a flat, source-ordered list addressed by [`DeclId`].
//! Each one is a tagged variant over the kinds the selection rules can
//! name; enclosing scopes are referenced by id instead of mirroring the
//! frontend's own class hierarchy.

use std::fmt;

use crate::types::TypeRef;

/// Index of a declaration in its universe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);

impl DeclId {
    /// # Panics
    /// Panics if `index` does not fit in `u32`.
    pub fn new(index: usize) -> Self {
        DeclId(u32::try_from(index).unwrap_or_else(|_| panic!("declaration index {index} overflow")))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a declaration was written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

impl SourceLoc {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        SourceLoc {
            file: file.into(),
            line,
        }
    }

    pub fn is_known(&self) -> bool {
        !self.file.is_empty()
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}", self.file, self.line)
        } else {
            f.write_str(&self.file)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decl {
    pub id: DeclId,
    /// Unqualified name; template instances keep their argument list.
    pub name: String,
    pub qualified_name: String,
    /// Enclosing namespace or class.
    pub parent: Option<DeclId>,
    pub location: SourceLoc,
    /// Free-form annotations attached by the frontend.
    pub annotations: Vec<String>,
    pub kind: DeclKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Class(ClassDecl),
    Namespace,
    Typedef(TypedefDecl),
    Enum(EnumDecl),
    Function(FunctionDecl),
    Variable(VariableDecl),
}

impl Decl {
    pub fn has_attributes(&self) -> bool {
        !self.annotations.is_empty()
    }

    /// Only classes can be forward-declared without a definition.
    pub fn is_complete(&self) -> bool {
        match &self.kind {
            DeclKind::Class(class) => class.complete,
            _ => true,
        }
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn as_class(&self) -> Option<&ClassDecl> {
        match &self.kind {
            DeclKind::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self.kind, DeclKind::Namespace)
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            DeclKind::Class(class) => class.tag.keyword(),
            DeclKind::Namespace => "namespace",
            DeclKind::Typedef(_) => "typedef",
            DeclKind::Enum(_) => "enum",
            DeclKind::Function(_) => "function",
            DeclKind::Variable(_) => "variable",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClassTag {
    Class,
    Struct,
    Union,
}

impl ClassTag {
    pub fn keyword(self) -> &'static str {
        match self {
            ClassTag::Class => "class",
            ClassTag::Struct => "struct",
            ClassTag::Union => "union",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassDecl {
    pub tag: ClassTag,
    pub complete: bool,
    /// Declared schema version; `None` when the class declares none.
    pub version: Option<i32>,
    pub bases: Vec<BaseSpec>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub template: Option<TemplateInfo>,
    pub is_abstract: bool,
    /// Demangled linker-level type name, when the frontend knows it.
    pub typeinfo_name: Option<String>,
}

impl ClassDecl {
    pub fn new(tag: ClassTag) -> Self {
        ClassDecl {
            tag,
            complete: true,
            version: None,
            bases: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            template: None,
            is_abstract: false,
            typeinfo_name: None,
        }
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }

    /// A class streams itself if it declares a version or a `Streamer`.
    pub fn declares_streamer(&self) -> bool {
        self.version.is_some() || self.has_method("Streamer")
    }

    pub fn field(&self, name: &str) -> Option<(usize, &FieldDecl)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    pub fn is_template_instance(&self) -> bool {
        self.template.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseSpec {
    pub ty: TypeRef,
    pub is_virtual: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    /// Trailing comment text, without the comment markers.
    pub comment: String,
    pub is_static: bool,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        FieldDecl {
            name: name.into(),
            ty,
            comment: String::new(),
            is_static: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<TypeRef>,
    pub returns: Option<TypeRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateInfo {
    /// Qualified name of the primary template.
    pub name: String,
    pub args: Vec<TemplateArg>,
    pub params: Vec<TemplateParam>,
    pub explicit_specialization: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateArg {
    Type(TypeRef),
    Value(String),
}

impl TemplateArg {
    pub fn as_type(&self) -> Option<&TypeRef> {
        match self {
            TemplateArg::Type(ty) => Some(ty),
            TemplateArg::Value(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateParam {
    pub name: String,
    /// Type of a non-type parameter; `None` for `typename` parameters.
    pub value_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedefDecl {
    pub target: TypeRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDecl {
    pub underlying: Option<TypeRef>,
    pub scoped: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDecl {
    pub params: Vec<TypeRef>,
    pub returns: Option<TypeRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableDecl {
    pub ty: TypeRef,
}
