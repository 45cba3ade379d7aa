//! Declaration model for the refl dictionary compiler.
//!
//! This crate holds what every pipeline stage shares:
//! - `Decl`/`DeclKind`: declarations as a tagged variant with scope links
//! - `TypeRef`: parsed type expressions (fundamentals, pointers, arrays, names)
//! - `Introspect`: the query port over a declaration universe
//! - name normalization, the identity of a type across the pipeline
//! - `DeclUniverse`: an in-memory universe loaded from a JSON dump

mod decl;
pub mod names;
mod port;
pub mod stl;
mod types;
mod universe;

pub use decl::{
    BaseSpec, ClassDecl, ClassTag, Decl, DeclId, DeclKind, EnumDecl, FieldDecl, FunctionDecl,
    MethodDecl, SourceLoc, TemplateArg, TemplateInfo, TemplateParam, TypedefDecl, VariableDecl,
};
pub use port::Introspect;
pub use stl::StlKind;
pub use types::{
    canonical_spelling, split_scopes, split_template, Fundamental, TypeParseError, TypeRef,
};
pub use universe::{DeclUniverse, UniverseError};
