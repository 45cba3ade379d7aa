use refl_diagnostic::ErrorCode;
use refl_ir::DeclUniverse;
use refl_select::{parse_pragmas, parse_rule_file, RuleSet, SelectionEngine};

use super::*;

const POINTS: &str = r#"{
  "declarations": [
    { "kind": "class", "name": "Point3D", "file": "Point3D.h", "line": 4, "version": 1,
      "fields": [
        { "name": "x", "type": "double" },
        { "name": "y", "type": "double" },
        { "name": "z", "type": "double" }
      ] },
    { "kind": "class", "name": "Widget", "file": "Widget.h", "line": 1,
      "fields": [ { "name": "fWeight", "type": "int" } ] },
    { "kind": "class", "name": "Bag<std::vector<Widget> >", "file": "Bag.h", "line": 4,
      "version": 1,
      "fields": [ { "name": "fItems", "type": "std::vector<Widget>" } ] },
    { "kind": "class", "name": "Holes", "file": "Holes.h", "line": 2, "version": 1,
      "fields": [
        { "name": "fData", "type": "float*" },
        { "name": "fN", "type": "int" }
      ] }
  ]
}"#;

fn run(universe: &DeclUniverse, rules: &RuleSet) -> (Generated, ClosureRegistry) {
    let selection = SelectionEngine::new(universe, rules).select().unwrap();
    let closure = resolve_closure(universe, &selection).unwrap();
    let generated = generate(universe, &selection, &closure.registry, &rules.read_rules);
    (generated, closure.registry)
}

#[test]
fn point3d_without_input_operator_generates_cleanly() {
    let universe = DeclUniverse::from_json(POINTS).unwrap();
    let rules = parse_rule_file(
        r#"<lcgdict><selection>
             <class name="Point3D" noInputOperator="true"/>
           </selection></lcgdict>"#,
        "selection.xml",
    )
    .unwrap();
    let (generated, closure) = run(&universe, &rules);

    assert!(generated.diagnostics.is_empty(), "{:?}", generated.diagnostics);
    assert!(closure.is_empty());
    assert_eq!(generated.registered, 1);

    let code = &generated.class_code;
    let read = code.find("refl_b >> x;").unwrap();
    assert!(read < code.find("refl_b >> y;").unwrap());
    assert!(code.find("refl_b >> y;").unwrap() < code.find("refl_b >> z;").unwrap());
    assert!(code.contains("refl::Version_t refl_v = refl_b.ReadVersion(&refl_s, &refl_c);"));
    assert!(code.contains("refl_b.SetByteCount(refl_c, true);"));
    assert!(code.contains("static refl::ClassInfo instance(\"Point3D\", 1, \"Point3D.h\", 4,"));
    assert!(code.contains("const char *Point3D::Class_Name()"));
}

#[test]
fn bag_delegates_its_vector_to_the_container_generator() {
    let universe = DeclUniverse::from_json(POINTS).unwrap();
    let rules = parse_pragmas(
        "#pragma link C++ class Bag<std::vector<Widget> >;\n",
        "LinkDef.h",
    )
    .unwrap();
    let (generated, closure) = run(&universe, &rules);

    let names: Vec<&str> = closure.iter().map(|e| e.normalized_name.as_str()).collect();
    assert_eq!(names, vec!["vector<Widget>"]);
    assert!(generated.diagnostics.is_empty(), "{:?}", generated.diagnostics);
    assert_eq!(generated.registered, 2);

    let code = &generated.class_code;
    assert!(code.contains("template <> void Bag<std::vector<Widget> >::Streamer(refl::Buffer &refl_b)"));
    assert!(code.contains("std::vector<Widget> &refl_stl = fItems;"));
    assert!(code.contains("refl_b.StreamObject(&refl_t, refl_tcl1);"));
    assert!(code.contains("static void streamer_vectorlEWidgetgR(refl::Buffer &refl_b, void *refl_obj)"));
    // Widget is a plain class; it gets no code of its own.
    assert!(!code.contains("Widget::Streamer"));
}

#[test]
fn member_errors_do_not_stop_generation() {
    let universe = DeclUniverse::from_json(POINTS).unwrap();
    let rules = parse_pragmas(
        "#pragma link C++ class Holes;\n#pragma link C++ class Point3D;\n",
        "LinkDef.h",
    )
    .unwrap();
    let (generated, _) = run(&universe, &rules);

    let codes: Vec<ErrorCode> = generated.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E2001]);
    assert_eq!(generated.registered, 2);
    assert!(generated.class_code.contains("refl_b >> fN;"));
    assert!(!generated.class_code.contains("fData"));
    assert!(generated.class_code.contains("void Point3D::Streamer"));
}

#[test]
fn generation_is_deterministic() {
    let universe = DeclUniverse::from_json(POINTS).unwrap();
    let rules = parse_pragmas(
        "#pragma link C++ class Bag<std::vector<Widget> >;\n#pragma link C++ class Point3D;\n",
        "LinkDef.h",
    )
    .unwrap();
    let (first, _) = run(&universe, &rules);
    let (second, _) = run(&universe, &rules);
    assert_eq!(first, second);
}
