use pretty_assertions::assert_eq;
use proptest::prelude::*;
use refl_diagnostic::ErrorCode;
use refl_ir::{DeclUniverse, Introspect};

use super::SelectionEngine;
use crate::error::SelectionError;
use crate::linkdef::parse_pragmas;
use crate::rule::{
    attr, new_rule, Attributes, DeclKinds, Matcher, MemberKind, MemberRule, Polarity, RuleKind,
    RuleOrigin, RuleSet, WildcardPattern,
};
use crate::selection::{EntityFlags, Rejection};
use crate::xml::parse_rule_file;
use refl_ir::SourceLoc;

const UNIVERSE: &str = r#"{
  "declarations": [
    { "kind": "class", "name": "Point3D", "file": "Point3D.h", "line": 4, "version": 1,
      "fields": [
        { "name": "x", "type": "double" },
        { "name": "y", "type": "double" },
        { "name": "z", "type": "double" }
      ] },
    { "kind": "class", "name": "Foo", "file": "Foo.h", "line": 2, "version": 2,
      "fields": [
        { "name": "bar", "type": "int" },
        { "name": "baz", "type": "float" }
      ] },
    { "kind": "class", "name": "Shape", "scope": "geo", "file": "geo/Shapes.h", "line": 10 },
    { "kind": "class", "name": "Circle", "scope": "geo", "file": "geo/Shapes.h", "line": 20,
      "bases": ["geo::Shape"] },
    { "kind": "class", "name": "Hidden", "scope": "geo", "file": "geo/Hidden.h", "line": 1 },
    { "kind": "class", "name": "Opaque", "complete": false, "file": "Opaque.h", "line": 1 },
    { "kind": "class", "name": "Derived", "file": "Derived.h", "line": 1, "bases": ["Opaque"] },
    { "kind": "class", "name": "vector<Foo>", "scope": "std", "file": "vector" },
    { "kind": "function", "name": "area", "scope": "geo", "file": "geo/Shapes.h",
      "params": ["const geo::Shape&"], "returns": "double" },
    { "kind": "variable", "name": "gDetector", "type": "int", "file": "Detector.h" },
    { "kind": "enum", "name": "Kind", "scope": "geo", "file": "geo/Shapes.h" },
    { "kind": "typedef", "name": "FooList", "type": "std::vector<Foo>", "file": "Foo.h" }
  ]
}"#;

fn universe() -> DeclUniverse {
    DeclUniverse::from_json(UNIVERSE).unwrap()
}

fn names(entities: &[crate::SelectedEntity]) -> Vec<&str> {
    entities.iter().map(|e| e.normalized_name.as_str()).collect()
}

#[test]
fn point3d_with_no_input_operator() {
    let universe = universe();
    let rules = parse_pragmas("#pragma link C++ class Point3D!;\n", "LinkDef.h").unwrap();
    let engine = SelectionEngine::new(&universe, &rules);
    let selection = engine.select().unwrap();

    assert_eq!(names(&selection.classes), vec!["Point3D"]);
    let point = &selection.classes[0];
    assert!(point.flags.contains(EntityFlags::NO_INPUT_OPERATOR));
    assert_eq!(point.requested_name, "Point3D");
    assert!(engine.unused_rules(&selection).is_empty());
}

#[test]
fn member_exclusion_only_suppresses_the_member() {
    let universe = universe();
    let rules = parse_rule_file(
        r#"<lcgdict>
             <selection><class name="Foo"/></selection>
             <exclusion><class name="Foo"><field name="bar"/></class></exclusion>
           </lcgdict>"#,
        "selection.xml",
    )
    .unwrap();
    let selection = SelectionEngine::new(&universe, &rules).select().unwrap();
    let foo = selection.class("Foo").unwrap();
    assert!(foo.is_field_suppressed("bar"));
    assert!(!foo.is_field_suppressed("baz"));
}

#[test]
fn whole_exclusion_vetoes_earlier_inclusion() {
    let universe = universe();
    let rules = parse_pragmas(
        "#pragma link C++ class geo::*;\n#pragma link off class geo::Hidden;\n",
        "LinkDef.h",
    )
    .unwrap();
    let selection = SelectionEngine::new(&universe, &rules).select().unwrap();
    assert_eq!(names(&selection.classes), vec!["geo::Shape", "geo::Circle"]);
}

#[test]
fn selecting_twice_is_selecting_once() {
    let universe = universe();
    let once = parse_pragmas("#pragma link C++ class Foo;\n", "LinkDef.h").unwrap();
    let twice = parse_pragmas(
        "#pragma link C++ class Foo;\n#pragma link C++ class Foo;\n",
        "LinkDef.h",
    )
    .unwrap();
    let a = SelectionEngine::new(&universe, &once).select().unwrap();
    let b = SelectionEngine::new(&universe, &twice).select().unwrap();
    assert_eq!(names(&a.classes), names(&b.classes));
    assert_eq!(b.classes[0].matched_rules.len(), 2);
}

#[test]
fn attributes_merge_with_later_values_winning() {
    let universe = universe();
    let rules = parse_rule_file(
        r#"<selection>
             <class name="Foo" rootmap="true" comment="first"/>
             <class pattern="F*" rootmap="false"/>
           </selection>"#,
        "selection.xml",
    )
    .unwrap();
    let selection = SelectionEngine::new(&universe, &rules).select().unwrap();
    let foo = selection.class("Foo").unwrap();
    assert!(!foo.in_rootmap());
    assert_eq!(foo.attributes.get(attr::COMMENT), Some("first"));
}

#[test]
fn every_kind_is_partitioned() {
    let universe = universe();
    let rules = parse_pragmas(
        "#pragma link C++ namespace geo;\n\
         #pragma link C++ function geo::area;\n\
         #pragma link C++ global gDetector;\n\
         #pragma link C++ enum geo::Kind;\n\
         #pragma link C++ typedef FooList;\n\
         #pragma link C++ class std::vector<Foo>;\n",
        "LinkDef.h",
    )
    .unwrap();
    let selection = SelectionEngine::new(&universe, &rules).select().unwrap();
    assert_eq!(names(&selection.namespaces), vec!["geo"]);
    assert_eq!(names(&selection.functions), vec!["geo::area"]);
    assert_eq!(names(&selection.variables), vec!["gDetector"]);
    assert_eq!(names(&selection.enums), vec!["geo::Kind"]);
    assert_eq!(names(&selection.typedefs), vec!["FooList"]);
    assert_eq!(names(&selection.classes), vec!["vector<Foo>"]);
    let vector = &selection.classes[0];
    assert!(vector
        .flags
        .contains(EntityFlags::GENERIC_CONTAINER | EntityFlags::TEMPLATE_INSTANCE));
    assert_eq!(vector.requested_name, "std::vector<Foo>");
}

#[test]
fn normalized_spelling_selects_the_instance() {
    let universe = universe();
    let rules = parse_pragmas("#pragma link C++ class vector<Foo>;\n", "LinkDef.h").unwrap();
    let selection = SelectionEngine::new(&universe, &rules).select().unwrap();
    assert_eq!(names(&selection.classes), vec!["vector<Foo>"]);
}

#[test]
fn file_rules_select_what_the_file_declares() {
    let universe = universe();
    let rules = parse_pragmas("#pragma link C++ defined_in Shapes.h;\n", "LinkDef.h").unwrap();
    let selection = SelectionEngine::new(&universe, &rules).select().unwrap();
    assert_eq!(names(&selection.classes), vec!["geo::Shape", "geo::Circle"]);
    assert_eq!(names(&selection.functions), vec!["geo::area"]);
    assert_eq!(names(&selection.enums), vec!["geo::Kind"]);
    assert!(selection.namespaces.is_empty());
}

#[test]
fn metadata_only_entities_are_flagged() {
    let universe = universe();
    let rules = parse_pragmas("#pragma create TClass Foo;\n", "LinkDef.h").unwrap();
    let selection = SelectionEngine::new(&universe, &rules).select().unwrap();
    assert!(selection.classes[0].is_metadata_only());
}

#[test]
fn unused_rules_are_warnings() {
    let universe = universe();
    let rules = parse_pragmas(
        "#pragma link C++ class Foo;\n#pragma link C++ class Missing;\n",
        "LinkDef.h",
    )
    .unwrap();
    let engine = SelectionEngine::new(&universe, &rules);
    let selection = engine.select().unwrap();
    let unused = engine.unused_rules(&selection);
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].code, ErrorCode::E1003);
    assert!(unused[0].is_warning());
    assert_eq!(unused[0].location.as_ref().map(|l| l.line), Some(2));
}

#[test]
fn rules_matching_only_rejected_classes_are_unused() {
    let universe = universe();
    let rules = parse_pragmas(
        "#pragma link C++ class Opaque;\n#pragma link C++ class Derived;\n",
        "LinkDef.h",
    )
    .unwrap();
    let engine = SelectionEngine::new(&universe, &rules);
    let mut selection = engine.select().unwrap();
    let diagnostics = selection.reject_unusable(&universe);

    let codes: Vec<ErrorCode> = diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E1001, ErrorCode::E1002]);
    assert!(diagnostics.iter().all(|d| d.is_warning()));
    assert!(selection.classes.is_empty());
    assert_eq!(selection.rejected[1].1, Rejection::IncompleteBase("Opaque".into()));
    assert_eq!(selection.all_classes().count(), 2);
    assert_eq!(engine.unused_rules(&selection).len(), 2);
}

#[test]
fn duplicate_normalized_names_are_fatal() {
    let universe = DeclUniverse::from_json(
        r#"{ "declarations": [
             { "kind": "typedef", "name": "Long64_t", "type": "long long" },
             { "kind": "class", "name": "vector<long long>", "scope": "std" },
             { "kind": "class", "name": "vector<Long64_t>", "scope": "std" }
           ] }"#,
    )
    .unwrap();
    let rules = parse_pragmas("#pragma link C++ class std::vector<*>;\n", "LinkDef.h").unwrap();
    let err = SelectionEngine::new(&universe, &rules).select().unwrap_err();
    let SelectionError::DuplicateName { name, .. } = &err;
    assert_eq!(name, "vector<long long>");
    assert_eq!(err.to_diagnostic().code, ErrorCode::E9001);
}

// Cache equivalence

const NAMES: [&str; 5] = ["Track", "Hit", "Shape", "Point", "Trace"];
const SCOPES: [&str; 3] = ["", "geo", "det"];
const FILES: [&str; 3] = ["a.h", "geo/b.h", "det/c.h"];
const PATTERNS: [&str; 5] = ["*", "geo::*", "T*", "*a*", "det::?it"];

fn arb_universe() -> impl Strategy<Value = DeclUniverse> {
    prop::collection::vec((0..NAMES.len(), 0..SCOPES.len(), 0..FILES.len()), 1..12).prop_map(
        |decls| {
            let entries: Vec<String> = decls
                .into_iter()
                .map(|(name, scope, file)| {
                    format!(
                        r#"{{ "kind": "class", "name": "{}", "scope": "{}", "file": "{}" }}"#,
                        NAMES[name], SCOPES[scope], FILES[file]
                    )
                })
                .collect();
            let json = format!(r#"{{ "declarations": [{}] }}"#, entries.join(","));
            DeclUniverse::from_json(&json).unwrap()
        },
    )
}

#[derive(Clone, Debug)]
enum ArbMatcher {
    Name(usize, usize),
    Pattern(usize),
    File(usize),
}

fn arb_rules() -> impl Strategy<Value = RuleSet> {
    let matcher = prop_oneof![
        (0..NAMES.len(), 0..SCOPES.len()).prop_map(|(n, s)| ArbMatcher::Name(n, s)),
        (0..PATTERNS.len()).prop_map(ArbMatcher::Pattern),
        (0..FILES.len()).prop_map(ArbMatcher::File),
    ];
    let rule = (matcher, any::<bool>(), any::<bool>(), any::<bool>());
    prop::collection::vec(rule, 0..8).prop_map(|rules| {
        let mut set = RuleSet::new(RuleOrigin::RuleFile);
        for (matcher, include, streamer, member) in rules {
            let matcher = match matcher {
                ArbMatcher::Name(n, s) if SCOPES[s].is_empty() => Matcher::Name(NAMES[n].into()),
                ArbMatcher::Name(n, s) => Matcher::Name(format!("{}::{}", SCOPES[s], NAMES[n])),
                ArbMatcher::Pattern(p) => {
                    Matcher::Pattern(WildcardPattern::new(PATTERNS[p]).unwrap())
                }
                ArbMatcher::File(f) => Matcher::FileName(FILES[f].into()),
            };
            let polarity = if include {
                Polarity::Include
            } else {
                Polarity::Exclude
            };
            let mut rule = new_rule(RuleKind::Type, matcher, polarity, SourceLoc::default());
            rule.targets = DeclKinds::CLASS;
            if streamer {
                rule.attributes = Attributes::new().with(attr::NO_STREAMER, "true");
            }
            if member {
                rule.members.push(MemberRule {
                    kind: MemberKind::Field,
                    name: "fX".into(),
                    attributes: Attributes::new().with(attr::TRANSIENT, "true"),
                });
            }
            set.push(rule);
        }
        set
    })
}

proptest! {
    #[test]
    fn cached_evaluation_matches_plain_scan(universe in arb_universe(), rules in arb_rules()) {
        let plain = SelectionEngine::new(&universe, &rules);
        let mut cached = SelectionEngine::new(&universe, &rules);
        cached.fill_cache();
        let mut optimized = SelectionEngine::new(&universe, &rules);
        optimized.optimize();

        for decl in universe.declarations() {
            let expected = plain.evaluate_uncached(decl);
            prop_assert_eq!(&cached.evaluate(decl.id), &expected);
            prop_assert_eq!(&optimized.evaluate(decl.id), &expected);
        }
    }
}
