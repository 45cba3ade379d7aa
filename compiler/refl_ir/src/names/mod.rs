//! Name normalization.
//!
//! The normalized name is the identity of a type across the pipeline:
//! selection deduplicates on it, the closure registry is keyed by it and
//! the index artifacts publish it. Two spellings of the same type must
//! normalize identically:
//!
//! - canonical spacing, nested closing brackets as `> >`
//! - `std::` and leading `::` qualification dropped
//! - defaulted allocator/comparator/hash arguments of containers dropped
//! - typedefs expanded, except the narrowed `Float16_t`/`Double32_t`

use crate::port::Introspect;
use crate::stl::{is_std_string, strip_std, StlKind};
use crate::types::{canonical_spelling, split_template, TypeRef};

/// Guards against typedef cycles in a malformed universe.
const MAX_TYPEDEF_DEPTH: usize = 32;

/// Normalize a spelled type. Spellings that do not parse as a type
/// (non-type template arguments, for instance) only get canonical spacing.
pub fn normalize_spelling<P: Introspect + ?Sized>(port: &P, spelling: &str) -> String {
    match TypeRef::parse(spelling) {
        Ok(ty) => normalize_type(port, &ty),
        Err(_) => canonical_spelling(spelling),
    }
}

pub fn normalize_type<P: Introspect + ?Sized>(port: &P, ty: &TypeRef) -> String {
    Normalizer { port, depth: 0 }.type_name(ty)
}

/// Resolve typedefs (except the narrowed pseudo-typedefs) down to the
/// type they name.
pub fn resolve_typedefs<P: Introspect + ?Sized>(port: &P, ty: &TypeRef) -> TypeRef {
    let mut depth = 0;
    resolve_inner(port, ty, &mut depth)
}

fn resolve_inner<P: Introspect + ?Sized>(port: &P, ty: &TypeRef, depth: &mut usize) -> TypeRef {
    match ty {
        TypeRef::Named(name) => {
            if *depth < MAX_TYPEDEF_DEPTH {
                if let Some(target) = port.typedef_target(name) {
                    *depth += 1;
                    return resolve_inner(port, target, depth);
                }
            }
            ty.clone()
        }
        TypeRef::Pointer(inner) => TypeRef::Pointer(Box::new(resolve_inner(port, inner, depth))),
        TypeRef::Reference(inner) => {
            TypeRef::Reference(Box::new(resolve_inner(port, inner, depth)))
        }
        TypeRef::Const(inner) => TypeRef::Const(Box::new(resolve_inner(port, inner, depth))),
        TypeRef::Array(inner, len) => {
            TypeRef::Array(Box::new(resolve_inner(port, inner, depth)), *len)
        }
        TypeRef::Fundamental(_) => ty.clone(),
    }
}

struct Normalizer<'a, P: ?Sized> {
    port: &'a P,
    depth: usize,
}

impl<P: Introspect + ?Sized> Normalizer<'_, P> {
    fn type_name(&mut self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Fundamental(fundamental) => fundamental.spelling().to_string(),
            TypeRef::Named(name) => self.named(name),
            TypeRef::Pointer(inner) => format!("{}*", self.type_name(inner)),
            TypeRef::Reference(inner) => format!("{}&", self.type_name(inner)),
            TypeRef::Const(inner) => match inner.as_ref() {
                TypeRef::Pointer(_) => format!("{} const", self.type_name(inner)),
                _ => format!("const {}", self.type_name(inner)),
            },
            TypeRef::Array(..) => {
                let (dims, elem) = ty.array_dims();
                let mut out = self.type_name(elem);
                for dim in dims {
                    out.push_str(&format!("[{dim}]"));
                }
                out
            }
        }
    }

    fn named(&mut self, name: &str) -> String {
        let name = name.strip_prefix("::").unwrap_or(name);

        if self.depth < MAX_TYPEDEF_DEPTH {
            if let Some(target) = self.port.typedef_target(name) {
                let target = target.clone();
                self.depth += 1;
                let resolved = self.type_name(&target);
                self.depth -= 1;
                return resolved;
            }
        }

        if is_std_string(name) {
            return "string".to_string();
        }

        let Some((base, args)) = split_template(name) else {
            return canonical_spelling(strip_std(name));
        };

        let base = strip_std(base);
        let mut args: Vec<String> = args.iter().map(|arg| self.argument(arg)).collect();
        if let Some(kind) = StlKind::from_template_name(base) {
            args.truncate(kind.essential_args());
        }
        join_template(&canonical_spelling(base), &args)
    }

    fn argument(&mut self, arg: &str) -> String {
        match TypeRef::parse(arg) {
            Ok(ty) => self.type_name(&ty),
            Err(_) => canonical_spelling(arg),
        }
    }
}

/// Assemble `base<a,b>` with the `> >` convention for nested instances.
pub fn join_template(base: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(base.len() + 2 + args.iter().map(String::len).sum::<usize>());
    out.push_str(base);
    out.push('<');
    out.push_str(&args.join(","));
    if out.ends_with('>') {
        out.push(' ');
    }
    out.push('>');
    out
}
