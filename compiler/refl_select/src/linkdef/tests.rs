use pretty_assertions::assert_eq;

use super::parse_pragmas;
use crate::error::RuleError;
use crate::rule::{attr, DeclKinds, Matcher, Polarity, RuleKind};
use refl_diagnostic::ErrorCode;

const LINKDEF: &str = r#"
#ifdef __CLING__
#pragma link off all classes;
#pragma link off all functions;
#pragma link C++ nestedclasses;

#pragma link C++ class Point3D!;    // no input operator
#pragma link C++ class Track+;
#pragma link C++ class geo::Shape-;
#pragma link C++ class std::vector<Track>;
#pragma link C++ namespace geo;
#pragma link C++ function geo::area;
#pragma link C++ global gDetector;
#pragma link C++ enum geo::Kind;
#pragma link C++ typedef TrackList;
#pragma link off class geo::Hidden;
#endif
"#;

#[test]
fn parses_link_directives_in_order() {
    let rules = parse_pragmas(LINKDEF, "LinkDef.h").unwrap();
    let summary: Vec<(String, Polarity, DeclKinds)> = rules
        .rules
        .iter()
        .map(|r| (r.matcher.to_string(), r.polarity, r.targets))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("`Point3D`".to_string(), Polarity::Include, DeclKinds::CLASS),
            ("`Track`".to_string(), Polarity::Include, DeclKinds::CLASS),
            ("`geo::Shape`".to_string(), Polarity::Include, DeclKinds::CLASS),
            (
                "`std::vector<Track>`".to_string(),
                Polarity::Include,
                DeclKinds::CLASS
            ),
            ("`geo`".to_string(), Polarity::Include, DeclKinds::NAMESPACE),
            (
                "`geo::area`".to_string(),
                Polarity::Include,
                DeclKinds::FUNCTION
            ),
            (
                "`gDetector`".to_string(),
                Polarity::Include,
                DeclKinds::VARIABLE
            ),
            ("`geo::Kind`".to_string(), Polarity::Include, DeclKinds::ENUM),
            ("`TrackList`".to_string(), Polarity::Include, DeclKinds::TYPEDEF),
            ("`geo::Hidden`".to_string(), Polarity::Exclude, DeclKinds::CLASS),
        ]
    );
    assert_eq!(rules.rules[0].location.line, 7);
    assert_eq!(rules.rules[6].kind, RuleKind::Variable);
}

#[test]
fn modifiers_become_attributes() {
    let rules = parse_pragmas(LINKDEF, "LinkDef.h").unwrap();
    assert!(rules.rules[0].attributes.is_true(attr::NO_INPUT_OPERATOR));
    assert!(rules.rules[1].attributes.is_true(attr::STREAMER_INFO));
    assert!(rules.rules[2].attributes.is_true(attr::NO_STREAMER));
    assert!(rules.rules[3].attributes.is_empty());
}

#[test]
fn combined_modifiers() {
    let rules = parse_pragmas("#pragma link C++ class A-!;\n", "LinkDef.h").unwrap();
    let attrs = &rules.rules[0].attributes;
    assert!(attrs.is_true(attr::NO_STREAMER));
    assert!(attrs.is_true(attr::NO_INPUT_OPERATOR));
    assert_eq!(rules.rules[0].matcher, Matcher::Name("A".into()));
}

#[test]
fn plus_and_minus_conflict() {
    let err = parse_pragmas("#pragma link C++ class A+-;\n", "LinkDef.h").unwrap_err();
    assert!(matches!(err, RuleError::ConflictingModifiers { ref name, .. } if name == "A"));
    assert_eq!(err.code(), ErrorCode::E0005);
}

#[test]
fn wildcards_become_patterns() {
    let rules = parse_pragmas(
        "#pragma link C++ class geo::*;\n#pragma link C++ all functions;\n",
        "LinkDef.h",
    )
    .unwrap();
    match &rules.rules[0].matcher {
        Matcher::Pattern(p) => assert_eq!(p.as_str(), "geo::*"),
        other => panic!("expected a pattern, got {other:?}"),
    }
    match &rules.rules[1].matcher {
        Matcher::Pattern(p) => assert_eq!(p.as_str(), "*"),
        other => panic!("expected a pattern, got {other:?}"),
    }
    assert_eq!(rules.rules[1].targets, DeclKinds::FUNCTION);
}

#[test]
fn defined_in_matches_files() {
    let rules = parse_pragmas("#pragma link C++ defined_in \"geo/Shapes.h\";\n", "L.h").unwrap();
    assert_eq!(
        rules.rules[0].matcher,
        Matcher::FileName("geo/Shapes.h".into())
    );
    assert!(!rules.rules[0].targets.contains(DeclKinds::NAMESPACE));
    assert!(rules.rules[0].targets.contains(DeclKinds::CLASS));
}

#[test]
fn create_marks_metadata_only() {
    let rules = parse_pragmas("#pragma create TClass Opaque;\n", "LinkDef.h").unwrap();
    assert!(rules.rules[0].attributes.is_true(attr::METADATA_ONLY));
    assert_eq!(rules.rules[0].targets, DeclKinds::CLASS);

    let err = parse_pragmas("#pragma create Opaque;\n", "LinkDef.h").unwrap_err();
    assert_eq!(err.code(), ErrorCode::E0001);
}

#[test]
fn read_rules_keep_their_fields() {
    let source = "#pragma read sourceClass=\"Track\" targetClass=\"Track\" \\\n    version=\"[1-2]\" source=\"float fPt\" target=\"fMomentum\" \\\n    code=\"{ fMomentum = onfile.fPt; }\"\n";
    let rules = parse_pragmas(source, "LinkDef.h").unwrap();
    assert!(rules.rules.is_empty());
    let read = &rules.read_rules[0];
    assert_eq!(read.source_class, "Track");
    assert_eq!(read.target_class, "Track");
    assert_eq!(read.code, "{ fMomentum = onfile.fPt; }");
    assert_eq!(
        read.fields,
        vec![
            ("version".to_string(), "[1-2]".to_string()),
            ("source".to_string(), "float fPt".to_string()),
            ("target".to_string(), "fMomentum".to_string()),
        ]
    );
}

#[test]
fn read_rule_without_target_is_rejected() {
    let err = parse_pragmas("#pragma read sourceClass=\"A\"\n", "LinkDef.h").unwrap_err();
    assert_eq!(err.code(), ErrorCode::E0001);
}

#[test]
fn extra_includes_are_collected() {
    let rules = parse_pragmas(
        "#pragma extra_include \"Extra.h\";\n#pragma extra_include <vector>;\n",
        "LinkDef.h",
    )
    .unwrap();
    assert_eq!(rules.extra_includes, vec!["Extra.h", "vector"]);
}

#[test]
fn malformed_pragmas_are_rule_errors() {
    for source in [
        "#pragma link C++ class A\n",
        "#pragma link C++ widget A;\n",
        "#pragma link C class A;\n",
        "#pragma link C++ class A%;\n",
        "#pragma link C++ all things;\n",
    ] {
        let err = parse_pragmas(source, "LinkDef.h").unwrap_err();
        assert_eq!(err.code(), ErrorCode::E0001, "{source}");
    }
}

#[test]
fn unrelated_pragmas_are_ignored() {
    let rules = parse_pragmas("#pragma once\n#include <vector>\nint x;\n", "LinkDef.h").unwrap();
    assert!(rules.is_empty());
}
