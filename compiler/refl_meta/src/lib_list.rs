//! The library list: which already-built libraries a dictionary depends
//! on, found by looking up the record types its classes mention in the
//! autoload map of those libraries.

use std::path::{Path, PathBuf};

use refl_ir::names::resolve_typedefs;
use refl_ir::{split_template, DeclId, Introspect, TemplateArg, TypeRef};
use refl_select::Selection;
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::rootmap::AutoloadMap;

/// `<prefix>.in` lists index files, `<prefix>.out` receives the result.
pub fn lib_list_paths(prefix: &str) -> (PathBuf, PathBuf) {
    (
        PathBuf::from(format!("{prefix}.in")),
        PathBuf::from(format!("{prefix}.out")),
    )
}

/// Libraries owning the record types referenced by selected classes,
/// in first-use order.
///
/// Bases, data members and template arguments are followed transitively.
/// A class does not depend on itself.
pub fn needed_libraries<P: Introspect + ?Sized>(
    port: &P,
    selection: &Selection,
    autoload: &AutoloadMap,
) -> Vec<String> {
    let mut libraries = Vec::new();
    let mut seen_libraries: FxHashSet<String> = FxHashSet::default();
    let mut visited: FxHashSet<String> = FxHashSet::default();

    for entity in selection.all_classes() {
        visited.insert(entity.normalized_name.clone());
    }
    for entity in selection.all_classes() {
        let mut names = Vec::new();
        class_references(port, entity.decl, &mut visited, &mut names);
        for name in names {
            let Some(libs) = autoload.get(&name) else {
                continue;
            };
            trace!(record = %name, libs, "dependency found in autoload map");
            for lib in libs.split_whitespace() {
                if seen_libraries.insert(lib.to_string()) {
                    libraries.push(lib.to_string());
                }
            }
        }
    }
    libraries
}

/// Contents of `<prefix>.out`.
pub fn render_lib_list<L: AsRef<str>, C: AsRef<str>>(libraries: &[L], classes: &[C]) -> String {
    let mut out = libraries
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");
    out.push_str("\n# Now the list of classes\n");
    for class in classes {
        out.push_str(class.as_ref());
        out.push('\n');
    }
    out
}

/// Read the index files listed in `<prefix>.in`.
pub fn load_dependencies(prefix: &str) -> Result<AutoloadMap, crate::IndexError> {
    let (input, _) = lib_list_paths(prefix);
    AutoloadMap::load_list(Path::new(&input))
}

fn class_references<P: Introspect + ?Sized>(
    port: &P,
    id: DeclId,
    visited: &mut FxHashSet<String>,
    names: &mut Vec<String>,
) {
    let Some(class) = port.class(id) else {
        return;
    };
    let template_args = class
        .template
        .iter()
        .flat_map(|template| template.args.iter().filter_map(TemplateArg::as_type));
    let referenced = class
        .bases
        .iter()
        .map(|base| &base.ty)
        .chain(class.fields.iter().filter(|f| !f.is_static).map(|f| &f.ty))
        .chain(template_args);
    for ty in referenced {
        type_references(port, ty, visited, names);
    }
}

fn type_references<P: Introspect + ?Sized>(
    port: &P,
    ty: &TypeRef,
    visited: &mut FxHashSet<String>,
    names: &mut Vec<String>,
) {
    let resolved = resolve_typedefs(port, ty);
    let Some(name) = resolved.innermost_name() else {
        return;
    };
    match port.lookup_class(name) {
        Some((id, _)) => {
            let normalized = port.normalized_decl_name(id);
            if visited.insert(normalized.clone()) {
                names.push(normalized);
                class_references(port, id, visited, names);
            }
        }
        None => {
            // Undeclared instances: only their arguments can be records.
            let Some((_, args)) = split_template(name) else {
                return;
            };
            for arg in args {
                if let Ok(ty) = TypeRef::parse(arg) {
                    type_references(port, &ty, visited, names);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use refl_ir::DeclUniverse;
    use refl_select::{parse_pragmas, SelectionEngine};

    const LINKED: &str = r#"{
      "declarations": [
        { "kind": "class", "name": "Base", "file": "Base.h" },
        { "kind": "class", "name": "Calib", "file": "Calib.h" },
        { "kind": "class", "name": "Hit", "file": "Hit.h", "bases": ["Base"] },
        { "kind": "class", "name": "Event", "file": "Event.h",
          "fields": [
            { "name": "fHits", "type": "std::vector<Hit>" },
            { "name": "fCalib", "type": "Calib*" },
            { "name": "fCount", "type": "int" }
          ] }
      ]
    }"#;

    fn event_selection(universe: &DeclUniverse) -> Selection {
        let rules = parse_pragmas("#pragma link C++ class Event;\n", "LinkDef.h").unwrap();
        SelectionEngine::new(universe, &rules).select().unwrap()
    }

    #[test]
    fn referenced_records_bring_their_libraries() {
        let universe = DeclUniverse::from_json(LINKED).unwrap();
        let selection = event_selection(&universe);
        let mut autoload = AutoloadMap::new();
        autoload
            .parse(
                "[ libHit.so libBase.so ]\nclass Hit\n[ libBase.so ]\nclass Base\n\
                 [ libCalib.so ]\nclass Calib\n[ libEvent.so ]\nclass Event\n",
                "deps.rootmap",
            )
            .unwrap();
        assert_eq!(
            needed_libraries(&universe, &selection, &autoload),
            ["libHit.so", "libBase.so", "libCalib.so"]
        );
    }

    #[test]
    fn unknown_records_are_skipped() {
        let universe = DeclUniverse::from_json(LINKED).unwrap();
        let selection = event_selection(&universe);
        assert!(needed_libraries(&universe, &selection, &AutoloadMap::new()).is_empty());
    }

    #[test]
    fn output_lists_libraries_then_classes() {
        assert_eq!(
            render_lib_list(&["libHit.so", "libBase.so"], &["Event", "Track"]),
            "libHit.so libBase.so\n# Now the list of classes\nEvent\nTrack\n"
        );
        assert_eq!(
            render_lib_list::<&str, &str>(&[], &[]),
            "\n# Now the list of classes\n"
        );
    }

    #[test]
    fn prefix_names_both_files() {
        let (input, output) = lib_list_paths("build/deps");
        assert_eq!(input, PathBuf::from("build/deps.in"));
        assert_eq!(output, PathBuf::from("build/deps.out"));
    }
}
