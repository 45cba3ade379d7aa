//! Consistency checks run on every selected class before its code is
//! generated.

use refl_diagnostic::{Diagnostic, ErrorCode};
use refl_ir::{DeclId, DeclKind, Introspect};
use refl_select::{EntityFlags, SelectedEntity};
use rustc_hash::FxHashMap;

/// Custom buffer operators a class has in the universe.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferOperators {
    pub input: bool,
    pub output: bool,
}

/// Free `operator>>`/`operator<<` declarations, keyed by the normalized
/// name of the class they take.
#[derive(Debug, Default)]
pub struct OperatorIndex {
    by_class: FxHashMap<String, BufferOperators>,
}

impl OperatorIndex {
    pub fn build<P: Introspect + ?Sized>(port: &P) -> Self {
        let mut by_class: FxHashMap<String, BufferOperators> = FxHashMap::default();
        for decl in port.declarations() {
            let DeclKind::Function(function) = &decl.kind else {
                continue;
            };
            // Canonical spacing writes `operator>>` as `operator> >`.
            let bare: String = decl.name.split_whitespace().collect();
            let input = match bare.as_str() {
                "operator>>" => true,
                "operator<<" => false,
                _ => continue,
            };
            // The class is the operand that is not the buffer.
            for param in &function.params {
                let Some(name) = param.innermost_name() else {
                    continue;
                };
                let normalized = port.normalized_name(name);
                if normalized.ends_with("Buffer") {
                    continue;
                }
                let entry = by_class.entry(normalized).or_default();
                if input {
                    entry.input = true;
                } else {
                    entry.output = true;
                }
            }
        }
        OperatorIndex { by_class }
    }

    pub fn get(&self, normalized_name: &str) -> BufferOperators {
        self.by_class
            .get(normalized_name)
            .copied()
            .unwrap_or_default()
    }
}

/// Check the custom buffer operators of a class against its selection.
pub fn check_input_operator<P: Introspect + ?Sized>(
    port: &P,
    operators: &OperatorIndex,
    entity: &SelectedEntity,
) -> Option<Diagnostic> {
    let found = operators.get(&entity.normalized_name);
    let name = &entity.requested_name;
    let location = &port.decl(entity.decl).location;
    if entity.flags.contains(EntityFlags::NO_INPUT_OPERATOR) {
        if found.input == found.output {
            return None;
        }
        let (present, missing) = if found.input {
            ("operator>>", "operator<<")
        } else {
            ("operator<<", "operator>>")
        };
        return Some(
            Diagnostic::for_code(ErrorCode::E2006)
                .with_message(format!(
                    "`{name}` declares a custom `{present}` but no matching `{missing}`"
                ))
                .at(location)
                .with_suggestion("declare both buffer operators, or neither"),
        );
    }
    found.input.then(|| {
        Diagnostic::for_code(ErrorCode::E2006)
            .with_message(format!(
                "`{name}` declares a custom `operator>>` that conflicts with the generated one"
            ))
            .at(location)
            .with_suggestion("suppress the generated operator with the `!` modifier")
    })
}

/// A class below a versioned base must declare its own version, unless
/// its streamer is suppressed.
pub fn check_missing_streamer<P: Introspect + ?Sized>(
    port: &P,
    entity: &SelectedEntity,
) -> Option<Diagnostic> {
    if entity
        .flags
        .intersects(EntityFlags::NO_STREAMER | EntityFlags::METADATA_ONLY)
    {
        return None;
    }
    let decl = port.decl(entity.decl);
    let class = decl.as_class()?;
    if class.version.is_some() {
        return None;
    }
    let base = versioned_base(port, entity.decl, 0)?;
    Some(
        Diagnostic::for_code(ErrorCode::E2005)
            .with_message(format!(
                "`{}` derives from `{base}` but does not declare its own version",
                entity.requested_name
            ))
            .at(&decl.location)
            .with_note("the base streamer would be called for the derived data")
            .with_suggestion("declare a version, or suppress the streamer with `-`"),
    )
}

fn versioned_base<P: Introspect + ?Sized>(port: &P, id: DeclId, depth: usize) -> Option<String> {
    if depth > 64 {
        return None;
    }
    let class = port.class(id)?;
    for base in &class.bases {
        let Some(name) = base.ty.innermost_name() else {
            continue;
        };
        let Some((base_id, base_class)) = port.lookup_class(name) else {
            continue;
        };
        if base_class.version.is_some() {
            return Some(port.normalized_decl_name(base_id));
        }
        if let Some(found) = versioned_base(port, base_id, depth + 1) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use refl_ir::DeclUniverse;
    use refl_select::{parse_pragmas, SelectionEngine};

    const OPERATORS: &str = r#"{
      "declarations": [
        { "kind": "class", "name": "Point3D", "file": "Point3D.h", "version": 1 },
        { "kind": "class", "name": "Reader", "file": "Reader.h", "version": 1 },
        { "kind": "function", "name": "operator>>", "file": "Reader.h",
          "params": ["refl::Buffer&", "Reader*&"], "returns": "refl::Buffer&" },
        { "kind": "class", "name": "Both", "file": "Both.h", "version": 1 },
        { "kind": "function", "name": "operator>>", "file": "Both.h",
          "params": ["refl::Buffer&", "Both*&"] },
        { "kind": "function", "name": "operator<<", "file": "Both.h",
          "params": ["refl::Buffer&", "const Both*"] },
        { "kind": "class", "name": "Base", "file": "Base.h", "version": 2 },
        { "kind": "class", "name": "Middle", "file": "Middle.h", "bases": ["Base"] },
        { "kind": "class", "name": "Leaf", "file": "Leaf.h", "bases": ["Middle"] },
        { "kind": "class", "name": "Versioned", "file": "Versioned.h", "version": 1,
          "bases": ["Base"] }
      ]
    }"#;

    fn select(universe: &DeclUniverse, linkdef: &str) -> refl_select::Selection {
        let rules = parse_pragmas(linkdef, "LinkDef.h").unwrap();
        SelectionEngine::new(universe, &rules).select().unwrap()
    }

    #[test]
    fn point3d_without_operators_passes() {
        let universe = DeclUniverse::from_json(OPERATORS).unwrap();
        let operators = OperatorIndex::build(&universe);
        let selection = select(&universe, "#pragma link C++ class Point3D!;\n");
        let entity = selection.class("Point3D").unwrap();
        assert!(check_input_operator(&universe, &operators, entity).is_none());
    }

    #[test]
    fn one_sided_operators_are_inconsistent() {
        let universe = DeclUniverse::from_json(OPERATORS).unwrap();
        let operators = OperatorIndex::build(&universe);
        assert_eq!(
            operators.get("Reader"),
            BufferOperators {
                input: true,
                output: false
            }
        );

        let selection = select(
            &universe,
            "#pragma link C++ class Reader!;\n#pragma link C++ class Both!;\n",
        );
        let diag =
            check_input_operator(&universe, &operators, selection.class("Reader").unwrap())
                .unwrap();
        assert_eq!(diag.code, ErrorCode::E2006);
        assert!(diag.message.contains("no matching `operator<<`"));
        assert!(
            check_input_operator(&universe, &operators, selection.class("Both").unwrap())
                .is_none()
        );
    }

    #[test]
    fn custom_input_operator_conflicts_unless_suppressed() {
        let universe = DeclUniverse::from_json(OPERATORS).unwrap();
        let operators = OperatorIndex::build(&universe);
        let selection = select(&universe, "#pragma link C++ class Both;\n");
        let diag =
            check_input_operator(&universe, &operators, selection.class("Both").unwrap())
                .unwrap();
        assert!(diag.message.contains("conflicts with the generated one"));
    }

    #[test]
    fn unversioned_classes_below_a_versioned_base_need_a_streamer() {
        let universe = DeclUniverse::from_json(OPERATORS).unwrap();
        let selection = select(
            &universe,
            "#pragma link C++ class Leaf;\n\
             #pragma link C++ class Versioned;\n\
             #pragma link C++ class Middle-;\n",
        );
        let diag = check_missing_streamer(&universe, selection.class("Leaf").unwrap()).unwrap();
        assert_eq!(diag.code, ErrorCode::E2005);
        assert_eq!(
            diag.message,
            "`Leaf` derives from `Base` but does not declare its own version"
        );
        assert!(check_missing_streamer(&universe, selection.class("Versioned").unwrap()).is_none());
        assert!(check_missing_streamer(&universe, selection.class("Middle").unwrap()).is_none());
    }
}
