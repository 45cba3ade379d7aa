//! In-memory declaration universe loaded from a frontend dump.
//!
//! The dump is a JSON document with a flat `declarations` list in source
//! order. Scopes are referenced by qualified name; namespaces that are
//! only mentioned as scopes are created on the fly.
//!
//! ```text
//! { "declarations": [
//!     { "kind": "class", "name": "Point3D", "scope": "geo", "file": "geo/Point3D.h",
//!       "line": 12, "version": 1,
//!       "fields": [ { "name": "x", "type": "double" } ] } ] }
//! ```

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

use crate::decl::{
    BaseSpec, ClassDecl, ClassTag, Decl, DeclId, DeclKind, EnumDecl, FieldDecl, FunctionDecl,
    MethodDecl, SourceLoc, TemplateArg, TemplateInfo, TemplateParam, TypedefDecl, VariableDecl,
};
use crate::port::Introspect;
use crate::types::{canonical_spelling, split_scopes, split_template, TypeParseError, TypeRef};

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("cannot read declaration dump `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed declaration dump: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad type `{spelling}` in declaration of `{decl}`: {source}")]
    Type {
        decl: String,
        spelling: String,
        #[source]
        source: TypeParseError,
    },
    #[error("`{name}` is declared as a scope but is a {kind}")]
    BadScope { name: String, kind: &'static str },
}

/// A loaded declaration universe.
#[derive(Clone, Debug, Default)]
pub struct DeclUniverse {
    decls: Vec<Decl>,
    by_name: FxHashMap<String, DeclId>,
}

impl Introspect for DeclUniverse {
    fn declarations(&self) -> &[Decl] {
        &self.decls
    }

    fn lookup(&self, name: &str) -> Option<DeclId> {
        let name = name.trim();
        let name = name.strip_prefix("::").unwrap_or(name);
        self.by_name
            .get(name)
            .or_else(|| self.by_name.get(&canonical_spelling(name)))
            .copied()
    }
}

impl DeclUniverse {
    pub fn load(path: &Path) -> Result<DeclUniverse, UniverseError> {
        let text = std::fs::read_to_string(path).map_err(|source| UniverseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn from_json(text: &str) -> Result<DeclUniverse, UniverseError> {
        let file: UniverseFile = serde_json::from_str(text)?;
        let mut universe = DeclUniverse::default();
        for spec in file.declarations {
            universe.add(spec)?;
        }
        universe.index_normalized_names();
        tracing::debug!(declarations = universe.decls.len(), "declaration universe loaded");
        Ok(universe)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    fn add(&mut self, spec: DeclSpec) -> Result<(), UniverseError> {
        let (common, kind) = match spec {
            DeclSpec::Class(class) => lower_class(class, ClassTag::Class)?,
            DeclSpec::Struct(class) => lower_class(class, ClassTag::Struct)?,
            DeclSpec::Union(class) => lower_class(class, ClassTag::Union)?,
            DeclSpec::Namespace(common) => (common, DeclKind::Namespace),
            DeclSpec::Typedef(typedef) => {
                let target = parse_type(&typedef.common.name, &typedef.ty)?;
                (typedef.common, DeclKind::Typedef(TypedefDecl { target }))
            }
            DeclSpec::Enum(spec) => {
                let underlying = spec
                    .underlying
                    .as_deref()
                    .map(|ty| parse_type(&spec.common.name, ty))
                    .transpose()?;
                let kind = DeclKind::Enum(EnumDecl {
                    underlying,
                    scoped: spec.scoped,
                });
                (spec.common, kind)
            }
            DeclSpec::Function(spec) => {
                let params = parse_types(&spec.common.name, &spec.params)?;
                let returns = spec
                    .returns
                    .as_deref()
                    .map(|ty| parse_type(&spec.common.name, ty))
                    .transpose()?;
                (spec.common, DeclKind::Function(FunctionDecl { params, returns }))
            }
            DeclSpec::Variable(spec) => {
                let ty = parse_type(&spec.common.name, &spec.ty)?;
                (spec.common, DeclKind::Variable(VariableDecl { ty }))
            }
        };
        self.insert(common, kind)
    }

    fn insert(&mut self, common: CommonSpec, mut kind: DeclKind) -> Result<(), UniverseError> {
        let parent = match common.scope.as_deref().map(str::trim) {
            Some(scope) if !scope.is_empty() => Some(self.scope(scope)?),
            _ => None,
        };
        let name = canonical_spelling(&common.name);
        let qualified_name = match parent {
            Some(parent) => format!("{}::{name}", self.decls[parent.index()].qualified_name),
            None => name.clone(),
        };

        if let DeclKind::Class(class) = &mut kind {
            if let Some((base, args)) = split_template(&name) {
                let template_name = match parent {
                    Some(parent) => format!("{}::{base}", self.decls[parent.index()].qualified_name),
                    None => base.to_string(),
                };
                let info = class.template.get_or_insert_with(|| TemplateInfo {
                    name: String::new(),
                    args: Vec::new(),
                    params: Vec::new(),
                    explicit_specialization: false,
                });
                info.name = template_name;
                info.args = args.into_iter().map(template_arg).collect();
            }
        }

        let location = SourceLoc::new(common.file, common.line);
        if let Some(existing) = self.by_name.get(&qualified_name).copied() {
            let slot = &mut self.decls[existing.index()];
            let redeclaration = match (&slot.kind, &kind) {
                (DeclKind::Namespace, DeclKind::Namespace) => Some(Redeclaration::Reopen),
                (DeclKind::Class(old), DeclKind::Class(new)) if !old.complete && new.complete => {
                    Some(Redeclaration::Define)
                }
                (DeclKind::Class(_), DeclKind::Class(_)) => Some(Redeclaration::Ignore),
                _ => None,
            };
            match redeclaration {
                // Namespaces reopen; keep the first location that is known.
                Some(Redeclaration::Reopen) => {
                    if !slot.location.is_known() {
                        slot.location = location;
                    }
                    return Ok(());
                }
                // A definition supersedes an earlier forward declaration.
                Some(Redeclaration::Define) => {
                    slot.kind = kind;
                    slot.location = location;
                    slot.annotations = common.annotations;
                    return Ok(());
                }
                Some(Redeclaration::Ignore) => return Ok(()),
                None => {}
            }
        }

        let id = DeclId::new(self.decls.len());
        self.by_name.entry(qualified_name.clone()).or_insert(id);
        self.decls.push(Decl {
            id,
            name,
            qualified_name,
            parent,
            location,
            annotations: common.annotations,
            kind,
        });
        Ok(())
    }

    /// Resolve (creating namespaces as needed) a qualified scope name.
    fn scope(&mut self, scope: &str) -> Result<DeclId, UniverseError> {
        let mut parent: Option<DeclId> = None;
        let mut qualified = String::new();
        for segment in split_scopes(scope) {
            let segment = canonical_spelling(segment);
            if !qualified.is_empty() {
                qualified.push_str("::");
            }
            qualified.push_str(&segment);
            let id = if let Some(id) = self.by_name.get(&qualified).copied() {
                let decl = &self.decls[id.index()];
                if !(decl.is_namespace() || decl.as_class().is_some()) {
                    return Err(UniverseError::BadScope {
                        name: qualified,
                        kind: decl.kind_name(),
                    });
                }
                id
            } else {
                let id = DeclId::new(self.decls.len());
                self.by_name.insert(qualified.clone(), id);
                self.decls.push(Decl {
                    id,
                    name: segment,
                    qualified_name: qualified.clone(),
                    parent,
                    location: SourceLoc::default(),
                    annotations: Vec::new(),
                    kind: DeclKind::Namespace,
                });
                id
            };
            parent = Some(id);
        }
        parent.ok_or_else(|| UniverseError::BadScope {
            name: scope.to_string(),
            kind: "empty scope",
        })
    }

    /// Make every declaration reachable under its normalized name too.
    fn index_normalized_names(&mut self) {
        let aliases: Vec<(String, DeclId)> = self
            .decls
            .iter()
            .filter(|decl| !matches!(decl.kind, DeclKind::Typedef(_)))
            .map(|decl| (self.normalized_name(&decl.qualified_name), decl.id))
            .collect();
        for (name, id) in aliases {
            self.by_name.entry(name).or_insert(id);
        }
    }
}

enum Redeclaration {
    Reopen,
    Define,
    Ignore,
}

fn template_arg(arg: &str) -> TemplateArg {
    let looks_like_value = arg
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-')
        || arg == "true"
        || arg == "false";
    if looks_like_value {
        return TemplateArg::Value(arg.to_string());
    }
    match TypeRef::parse(arg) {
        Ok(ty) => TemplateArg::Type(ty),
        Err(_) => TemplateArg::Value(canonical_spelling(arg)),
    }
}

fn parse_type(decl: &str, spelling: &str) -> Result<TypeRef, UniverseError> {
    TypeRef::parse(spelling).map_err(|source| UniverseError::Type {
        decl: decl.to_string(),
        spelling: spelling.to_string(),
        source,
    })
}

fn parse_types(decl: &str, spellings: &[String]) -> Result<Vec<TypeRef>, UniverseError> {
    spellings.iter().map(|s| parse_type(decl, s)).collect()
}

fn lower_class(spec: ClassSpec, tag: ClassTag) -> Result<(CommonSpec, DeclKind), UniverseError> {
    let owner = spec.common.name.clone();
    let bases = spec
        .bases
        .iter()
        .map(|base| {
            let (spelling, is_virtual) = match base {
                BaseIn::Name(name) => (name.as_str(), false),
                BaseIn::Full { ty, is_virtual } => (ty.as_str(), *is_virtual),
            };
            Ok(BaseSpec {
                ty: parse_type(&owner, spelling)?,
                is_virtual,
            })
        })
        .collect::<Result<Vec<_>, UniverseError>>()?;
    let fields = spec
        .fields
        .into_iter()
        .map(|field| {
            Ok(FieldDecl {
                ty: parse_type(&owner, &field.ty)?,
                name: field.name,
                comment: field.comment.trim().to_string(),
                is_static: field.is_static,
            })
        })
        .collect::<Result<Vec<_>, UniverseError>>()?;
    let methods = spec
        .methods
        .into_iter()
        .map(|method| {
            Ok(MethodDecl {
                params: parse_types(&owner, &method.params)?,
                returns: method
                    .returns
                    .as_deref()
                    .map(|ty| parse_type(&owner, ty))
                    .transpose()?,
                name: method.name,
            })
        })
        .collect::<Result<Vec<_>, UniverseError>>()?;

    let template = if spec.template_params.is_empty() && !spec.explicit_specialization {
        None
    } else {
        Some(TemplateInfo {
            name: String::new(),
            args: Vec::new(),
            params: spec
                .template_params
                .into_iter()
                .map(|param| match param {
                    ParamIn::Name(name) => TemplateParam {
                        name,
                        value_type: None,
                    },
                    ParamIn::Full { name, ty } => TemplateParam {
                        name,
                        value_type: ty,
                    },
                })
                .collect(),
            explicit_specialization: spec.explicit_specialization,
        })
    };

    let class = ClassDecl {
        tag,
        complete: spec.complete,
        version: spec.version,
        bases,
        fields,
        methods,
        template,
        is_abstract: spec.is_abstract,
        typeinfo_name: spec.typeinfo_name,
    };
    Ok((spec.common, DeclKind::Class(class)))
}

// Serialized form

#[derive(Deserialize)]
struct UniverseFile {
    #[serde(default)]
    declarations: Vec<DeclSpec>,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum DeclSpec {
    Class(ClassSpec),
    Struct(ClassSpec),
    Union(ClassSpec),
    Namespace(CommonSpec),
    Typedef(TypedefSpec),
    Enum(EnumSpec),
    Function(FunctionSpec),
    Variable(VariableSpec),
}

#[derive(Deserialize)]
struct CommonSpec {
    name: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    file: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    annotations: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct ClassSpec {
    #[serde(flatten)]
    common: CommonSpec,
    #[serde(default = "default_true")]
    complete: bool,
    #[serde(default)]
    version: Option<i32>,
    #[serde(default)]
    bases: Vec<BaseIn>,
    #[serde(default)]
    fields: Vec<FieldSpec>,
    #[serde(default)]
    methods: Vec<MethodSpec>,
    #[serde(default)]
    template_params: Vec<ParamIn>,
    #[serde(default)]
    explicit_specialization: bool,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default)]
    typeinfo_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BaseIn {
    Name(String),
    Full {
        #[serde(rename = "type")]
        ty: String,
        #[serde(default, rename = "virtual")]
        is_virtual: bool,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParamIn {
    Name(String),
    Full {
        name: String,
        #[serde(default, rename = "type")]
        ty: Option<String>,
    },
}

#[derive(Deserialize)]
struct FieldSpec {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    comment: String,
    #[serde(default, rename = "static")]
    is_static: bool,
}

#[derive(Deserialize)]
struct MethodSpec {
    name: String,
    #[serde(default)]
    params: Vec<String>,
    #[serde(default)]
    returns: Option<String>,
}

#[derive(Deserialize)]
struct TypedefSpec {
    #[serde(flatten)]
    common: CommonSpec,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Deserialize)]
struct EnumSpec {
    #[serde(flatten)]
    common: CommonSpec,
    #[serde(default)]
    underlying: Option<String>,
    #[serde(default)]
    scoped: bool,
}

#[derive(Deserialize)]
struct FunctionSpec {
    #[serde(flatten)]
    common: CommonSpec,
    #[serde(default)]
    params: Vec<String>,
    #[serde(default)]
    returns: Option<String>,
}

#[derive(Deserialize)]
struct VariableSpec {
    #[serde(flatten)]
    common: CommonSpec,
    #[serde(rename = "type")]
    ty: String,
}

#[cfg(test)]
mod tests;
