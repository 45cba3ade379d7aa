use pretty_assertions::assert_eq;
use proptest::prelude::*;
use refl_diagnostic::ErrorCode;
use refl_ir::{DeclId, DeclUniverse, Introspect, StlKind};
use refl_select::{parse_pragmas, SelectionEngine, SelectionError};

use super::*;

const BAGS: &str = r#"{
  "declarations": [
    { "kind": "class", "name": "Widget", "file": "Widget.h", "line": 1,
      "fields": [ { "name": "fCounts", "type": "std::list<int>" } ] },
    { "kind": "class", "name": "Bag<std::vector<Widget> >", "file": "Bag.h", "line": 4,
      "version": 1,
      "template_params": ["T"],
      "fields": [ { "name": "fItems", "type": "std::vector<Widget>" } ] },
    { "kind": "typedef", "name": "Bool_t", "type": "bool", "file": "Types.h" },
    { "kind": "class", "name": "Flags", "file": "Flags.h", "line": 2, "version": 1,
      "fields": [
        { "name": "fBits", "type": "std::vector<Bool_t>" },
        { "name": "fIndex", "type": "std::map<std::string,std::vector<int> >" },
        { "name": "fAgain", "type": "std::vector<bool>" }
      ],
      "methods": [ { "name": "Pairs", "returns": "std::set<long>" } ] },
    { "kind": "class", "name": "Derived", "file": "Derived.h", "line": 1, "version": 1,
      "bases": ["std::deque<float>"] },
    { "kind": "class", "name": "deque<float>", "scope": "std", "file": "deque" },
    { "kind": "class", "name": "vector<Widget>", "scope": "std", "file": "vector" }
  ]
}"#;

fn universe() -> DeclUniverse {
    DeclUniverse::from_json(BAGS).unwrap()
}

fn closure_of(universe: &DeclUniverse, linkdef: &str) -> Closure {
    let rules = parse_pragmas(linkdef, "LinkDef.h").unwrap();
    let selection = SelectionEngine::new(universe, &rules).select().unwrap();
    resolve_closure(universe, &selection).unwrap()
}

fn names(registry: &ClosureRegistry) -> Vec<&str> {
    registry.iter().map(|e| e.normalized_name.as_str()).collect()
}

#[test]
fn bag_of_vector_registers_only_the_vector() {
    let universe = universe();
    let closure = closure_of(
        &universe,
        "#pragma link C++ class Bag<std::vector<Widget> >;\n",
    );
    assert_eq!(names(&closure.registry), vec!["vector<Widget>"]);

    let entry = closure.registry.get("vector<Widget>").unwrap();
    assert_eq!(entry.id, 1);
    assert_eq!(entry.kind, StlKind::Vector);
    assert_eq!(entry.decl, universe.lookup("std::vector<Widget>"));
    assert_eq!(entry.requested_name, "std::vector<Widget>");
    assert!(!entry.selected);
    assert!(closure.diagnostics.is_empty());
}

#[test]
fn nested_containers_register_in_discovery_order() {
    let universe = universe();
    let closure = closure_of(&universe, "#pragma link C++ class Flags;\n");
    assert_eq!(
        names(&closure.registry),
        vec![
            "vector<bool>",
            "map<string,vector<int> >",
            "vector<int>",
        ]
    );
    let ids: Vec<u32> = closure.registry.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn method_signatures_of_selected_classes_are_not_walked() {
    let universe = DeclUniverse::from_json(
        r#"{ "declarations": [
          { "kind": "class", "name": "Holder", "file": "Holder.h", "version": 1,
            "fields": [ { "name": "fX", "type": "int" } ],
            "methods": [ { "name": "Set", "params": ["const std::vector<int>&"] } ] }
        ] }"#,
    )
    .unwrap();
    let closure = closure_of(&universe, "#pragma link C++ class Holder;\n");
    assert!(closure.registry.is_empty());
}

#[test]
fn discovered_instances_follow_their_method_signatures() {
    let universe = DeclUniverse::from_json(
        r#"{ "declarations": [
          { "kind": "class", "name": "Box", "file": "Box.h", "version": 1,
            "fields": [ { "name": "fItems", "type": "std::vector<double>" } ] },
          { "kind": "class", "name": "vector<double>", "scope": "std", "file": "vector",
            "methods": [ { "name": "Slices", "returns": "std::list<int>" } ] }
        ] }"#,
    )
    .unwrap();
    let closure = closure_of(&universe, "#pragma link C++ class Box;\n");
    assert_eq!(names(&closure.registry), vec!["vector<double>", "list<int>"]);
}

#[test]
fn vector_of_bool_warns_once() {
    let universe = universe();
    let closure = closure_of(&universe, "#pragma link C++ class Flags;\n");
    assert_eq!(closure.diagnostics.len(), 1);
    let diag = &closure.diagnostics[0];
    assert_eq!(diag.code, ErrorCode::E1006);
    assert!(diag.is_warning());
    assert_eq!(diag.message, "`vector<bool>` is not fully supported");
}

#[test]
fn bases_and_selected_containers_are_registered() {
    let universe = universe();
    let closure = closure_of(
        &universe,
        "#pragma link C++ class Derived;\n#pragma link C++ class std::vector<Widget>;\n",
    );
    assert_eq!(names(&closure.registry), vec!["deque<float>", "vector<Widget>"]);
    assert!(closure.registry.get("vector<Widget>").unwrap().selected);
    assert!(!closure.registry.get("deque<float>").unwrap().selected);
}

#[test]
fn plain_member_classes_are_not_walked() {
    let universe = universe();
    // Widget's own list<int> is only reachable through Widget, which is
    // not selected.
    let closure = closure_of(
        &universe,
        "#pragma link C++ class Bag<std::vector<Widget> >;\n",
    );
    assert!(!closure.registry.contains("list<int>"));
}

#[test]
fn registry_rejects_distinct_declarations_under_one_name() {
    let mut registry = ClosureRegistry::new();
    let first = DeclId::new(1);
    assert!(registry
        .insert("vector<int>".into(), "vector<int>".into(), StlKind::Vector, Some(first), false)
        .unwrap());
    assert!(!registry
        .insert("vector<int>".into(), "std::vector<int>".into(), StlKind::Vector, None, true)
        .unwrap());
    assert!(registry.get("vector<int>").unwrap().selected);

    let err = registry
        .insert(
            "vector<int>".into(),
            "vector<int>".into(),
            StlKind::Vector,
            Some(DeclId::new(2)),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, SelectionError::DuplicateName { .. }));
    assert_eq!(registry.len(), 1);
}

#[test]
fn closure_is_deterministic() {
    let universe = universe();
    let linkdef = "#pragma link C++ class Flags;\n#pragma link C++ class Derived;\n";
    let first = closure_of(&universe, linkdef);
    let second = closure_of(&universe, linkdef);
    assert_eq!(
        first.registry.iter().collect::<Vec<_>>(),
        second.registry.iter().collect::<Vec<_>>()
    );
}

// Fixed point: every container spelled inside a member type is registered,
// and nothing else is.

#[derive(Clone, Debug)]
enum Shape {
    Leaf(&'static str),
    Seq(&'static str, Box<Shape>),
    Map(&'static str, Box<Shape>, Box<Shape>),
}

impl Shape {
    fn spelling(&self) -> String {
        match self {
            Shape::Leaf(name) => (*name).to_string(),
            Shape::Seq(kind, inner) => close(format!("std::{kind}<{}", inner.spelling())),
            Shape::Map(kind, key, value) => {
                close(format!("std::{kind}<{},{}", key.spelling(), value.spelling()))
            }
        }
    }

    fn normalized(&self) -> String {
        match self {
            Shape::Leaf(name) => (*name).to_string(),
            Shape::Seq(kind, inner) => close(format!("{kind}<{}", inner.normalized())),
            Shape::Map(kind, key, value) => {
                close(format!("{kind}<{},{}", key.normalized(), value.normalized()))
            }
        }
    }

    fn containers(&self, out: &mut Vec<String>) {
        match self {
            Shape::Leaf(_) => {}
            Shape::Seq(_, inner) => {
                out.push(self.normalized());
                inner.containers(out);
            }
            Shape::Map(_, key, value) => {
                out.push(self.normalized());
                key.containers(out);
                value.containers(out);
            }
        }
    }
}

fn close(mut open: String) -> String {
    if open.ends_with('>') {
        open.push(' ');
    }
    open.push('>');
    open
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![Just("int"), Just("double"), Just("Widget")].prop_map(Shape::Leaf);
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (prop_oneof![Just("vector"), Just("list"), Just("set")], inner.clone())
                .prop_map(|(kind, elem)| Shape::Seq(kind, Box::new(elem))),
            (prop_oneof![Just("map"), Just("unordered_map")], inner.clone(), inner)
                .prop_map(|(kind, key, value)| Shape::Map(kind, Box::new(key), Box::new(value))),
        ]
    })
}

proptest! {
    #[test]
    fn closure_reaches_a_fixed_point(shapes in prop::collection::vec(shape(), 1..4)) {
        let fields: Vec<String> = shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| format!(r#"{{ "name": "f{i}", "type": "{}" }}"#, shape.spelling()))
            .collect();
        let json = format!(
            r#"{{ "declarations": [
                 {{ "kind": "class", "name": "Widget", "file": "Widget.h" }},
                 {{ "kind": "class", "name": "Holder", "file": "Holder.h", "version": 1,
                   "fields": [ {} ] }} ] }}"#,
            fields.join(",")
        );
        let universe = DeclUniverse::from_json(&json).unwrap();
        let closure = closure_of(&universe, "#pragma link C++ class Holder;\n");

        let mut expected = Vec::new();
        for shape in &shapes {
            shape.containers(&mut expected);
        }
        let mut registered: Vec<String> =
            closure.registry.iter().map(|e| e.normalized_name.clone()).collect();
        expected.sort();
        expected.dedup();
        registered.sort();
        prop_assert_eq!(registered, expected);
    }
}
