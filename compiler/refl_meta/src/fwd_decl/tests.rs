use pretty_assertions::assert_eq;
use proptest::prelude::*;
use refl_ir::DeclUniverse;
use refl_select::{parse_pragmas, SelectionEngine};

use super::*;

const DECLS: &str = r#"{
  "declarations": [
    { "kind": "class", "name": "Reader", "scope": "ev::io", "file": "ev/io/Reader.h" },
    { "kind": "struct", "name": "Writer", "scope": "ev::io", "file": "ev/io/Writer.h" },
    { "kind": "class", "name": "Hit", "file": "Hit.h" },
    { "kind": "class", "name": "Holder<Hit>", "scope": "ev", "file": "ev/Holder.h" },
    { "kind": "class", "name": "Inner", "scope": "ev::io::Reader", "file": "ev/io/Reader.h" },
    { "kind": "enum", "name": "Mode", "scope": "ev", "underlying": "unsigned char" },
    { "kind": "enum", "name": "Loose", "file": "Loose.h" },
    { "kind": "variable", "name": "gRun", "type": "int", "file": "Globals.h" },
    { "kind": "variable", "name": "gBins", "type": "double[4]", "file": "Globals.h" },
    { "kind": "typedef", "name": "HitHolder", "type": "ev::Holder<Hit>", "file": "Types.h" }
  ]
}"#;

fn selection(universe: &DeclUniverse, pragmas: &str) -> Selection {
    let rules = parse_pragmas(pragmas, "LinkDef.h").unwrap();
    SelectionEngine::new(universe, &rules).select().unwrap()
}

#[test]
fn classes_are_wrapped_in_their_namespaces() {
    let universe = DeclUniverse::from_json(DECLS).unwrap();
    let selection = selection(
        &universe,
        "#pragma link C++ class ev::io::Reader;\n\
         #pragma link C++ struct ev::io::Writer;\n\
         #pragma link C++ class Hit;\n",
    );
    let decls = ForwardDecls::for_index(&universe, &selection);
    assert_eq!(
        decls.lines(),
        [
            "namespace ev { namespace io { class Reader; } }",
            "namespace ev { namespace io { struct Writer; } }",
            "class Hit;",
        ]
    );
}

#[test]
fn template_instances_declare_their_primary_template() {
    let universe = DeclUniverse::from_json(DECLS).unwrap();
    let selection = selection(&universe, "#pragma link C++ class ev::Holder<Hit>;\n");
    let decls = ForwardDecls::for_index(&universe, &selection);
    assert_eq!(
        decls.lines(),
        ["namespace ev { template <typename T0> class Holder; }"]
    );
}

#[test]
fn nested_classes_and_loose_enums_are_skipped() {
    let universe = DeclUniverse::from_json(DECLS).unwrap();
    let selection = selection(
        &universe,
        "#pragma link C++ class ev::io::Reader::Inner;\n\
         #pragma link C++ enum Loose;\n\
         #pragma link C++ enum ev::Mode;\n",
    );
    let decls = ForwardDecls::for_index(&universe, &selection);
    assert_eq!(
        decls.lines(),
        ["namespace ev { enum Mode : unsigned char; }"]
    );
}

#[test]
fn variables_keep_their_extents() {
    let universe = DeclUniverse::from_json(DECLS).unwrap();
    let selection = selection(
        &universe,
        "#pragma link C++ global gRun;\n#pragma link C++ global gBins;\n",
    );
    let text = ForwardDecls::for_index(&universe, &selection).to_text();
    assert_eq!(text, "extern int gRun;\nextern double gBins[4];\n");
}

#[test]
fn payload_adds_typedefs_after_their_targets() {
    let universe = DeclUniverse::from_json(DECLS).unwrap();
    let selection = selection(&universe, "#pragma link C++ typedef HitHolder;\n");
    assert!(ForwardDecls::for_index(&universe, &selection).is_empty());
    let decls = ForwardDecls::for_payload(&universe, &selection);
    assert_eq!(
        decls.lines(),
        [
            "namespace ev { template <typename T0> class Holder; }",
            "typedef ev::Holder<Hit> HitHolder;",
        ]
    );
}

#[test]
fn push_skips_lines_already_present() {
    let mut decls = ForwardDecls::new();
    assert!(decls.push("class A;\nclass B;"));
    assert!(!decls.push("class B;\n\nclass A;"));
    assert!(decls.push("class C;"));
    assert_eq!(decls.lines(), ["class A;", "class B;", "class C;"]);
}

#[test]
fn identical_namespaces_collapse_into_one_line() {
    let lines: Vec<String> = [
        "namespace A { namespace B { class X; } }",
        "class Top;",
        "namespace A { class Y; }",
        "namespace A { namespace B { class Z; } }",
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    assert_eq!(
        collapse_identical_namespaces(&lines),
        [
            "class Top;",
            "namespace A { namespace B { class X; class Z; } }",
            "namespace A { class Y; }",
        ]
    );
}

fn ident() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{0,3}"
}

fn wrapped_line() -> impl Strategy<Value = (Vec<String>, String)> {
    (prop::collection::vec(ident(), 0..3), ident())
}

fn wrap(namespaces: &[String], class: &str) -> String {
    let mut line = String::new();
    for namespace in namespaces {
        line.push_str(&format!("namespace {namespace} {{ "));
    }
    line.push_str(&format!("class {class};"));
    line.push_str(&" }".repeat(namespaces.len()));
    line
}

/// Expand a (possibly collapsed) line back into one line per class.
fn expand(line: &str) -> Vec<String> {
    match split_namespace(line) {
        Some((prefix, contained)) => {
            let depth = prefix.matches('{').count();
            contained
                .split_inclusive(';')
                .map(|entity| format!("{prefix} {}{}", entity.trim(), " }".repeat(depth)))
                .collect()
        }
        None => vec![line.to_string()],
    }
}

proptest! {
    #[test]
    fn collapsing_keeps_every_declaration(entries in prop::collection::vec(wrapped_line(), 0..12)) {
        let lines: Vec<String> = entries.iter().map(|(ns, class)| wrap(ns, class)).collect();
        let collapsed = collapse_identical_namespaces(&lines);

        let mut before = lines.clone();
        let mut after: Vec<String> = collapsed.iter().flat_map(|line| expand(line)).collect();
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);

        let distinct: FxHashSet<&Vec<String>> =
            entries.iter().map(|(ns, _)| ns).filter(|ns| !ns.is_empty()).collect();
        let namespaced = collapsed.iter().filter(|line| line.starts_with("namespace ")).count();
        prop_assert_eq!(namespaced, distinct.len());
    }

    #[test]
    fn collapsing_is_idempotent(entries in prop::collection::vec(wrapped_line(), 0..12)) {
        let lines: Vec<String> = entries.iter().map(|(ns, class)| wrap(ns, class)).collect();
        let once = collapse_identical_namespaces(&lines);
        prop_assert_eq!(collapse_identical_namespaces(&once), once);
    }
}
