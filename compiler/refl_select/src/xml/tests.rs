use pretty_assertions::assert_eq;

use super::parse_rule_file;
use crate::rule::{attr, DeclKinds, Matcher, MemberKind, Polarity};
use refl_diagnostic::ErrorCode;

const SELECTION: &str = r#"<?xml version="1.0"?>
<!-- detector dictionary -->
<lcgdict>
  <selection>
    <class name="Track" noInputOperator="true">
      <field name="fCache" transient="true"/>
    </class>
    <class pattern="geo::*" rootmap="false"/>
    <struct file_name="Hits.h"/>
    <namespace name="geo"/>
    <function name="geo::area"/>
    <variable name="gDetector"/>
    <enum name="geo::Kind"/>
    <typedef name="TrackList"/>
  </selection>
  <exclusion>
    <class name="Track">
      <method name="Draw"/>
    </class>
    <class name="geo::Hidden"/>
  </exclusion>
  <ioread sourceClass="Track" targetClass="Track" version="[1-]" source="float fPt" target="fMomentum">
    <![CDATA[ fMomentum = onfile.fPt; ]]>
  </ioread>
</lcgdict>
"#;

#[test]
fn selection_and_exclusion_blocks() {
    let rules = parse_rule_file(SELECTION, "selection.xml").unwrap();
    let summary: Vec<(String, Polarity)> = rules
        .rules
        .iter()
        .map(|r| (r.matcher.to_string(), r.polarity))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("`Track`".to_string(), Polarity::Include),
            ("pattern `geo::*`".to_string(), Polarity::Include),
            ("file `Hits.h`".to_string(), Polarity::Include),
            ("`geo`".to_string(), Polarity::Include),
            ("`geo::area`".to_string(), Polarity::Include),
            ("`gDetector`".to_string(), Polarity::Include),
            ("`geo::Kind`".to_string(), Polarity::Include),
            ("`TrackList`".to_string(), Polarity::Include),
            ("`Track`".to_string(), Polarity::Exclude),
            ("`geo::Hidden`".to_string(), Polarity::Exclude),
        ]
    );
    assert_eq!(rules.rules[0].location.line, 5);
    assert_eq!(rules.rules[3].targets, DeclKinds::NAMESPACE);
    assert_eq!(rules.rules[5].targets, DeclKinds::VARIABLE);
}

#[test]
fn attributes_and_members() {
    let rules = parse_rule_file(SELECTION, "selection.xml").unwrap();
    let track = &rules.rules[0];
    assert!(track.attributes.is_true(attr::NO_INPUT_OPERATOR));
    assert!(track.attributes.get("name").is_none());
    assert_eq!(track.members.len(), 1);
    assert_eq!(track.members[0].kind, MemberKind::Field);
    assert_eq!(track.members[0].name, "fCache");
    assert!(track.members[0].attributes.is_true(attr::TRANSIENT));

    assert!(rules.rules[1].attributes.is_false(attr::ROOTMAP));

    let excluded = &rules.rules[8];
    assert!(excluded.is_member_exclusion());
    assert_eq!(excluded.members[0].kind, MemberKind::Method);
    assert!(!rules.rules[9].is_member_exclusion());
}

#[test]
fn ioread_collects_code() {
    let rules = parse_rule_file(SELECTION, "selection.xml").unwrap();
    let read = &rules.read_rules[0];
    assert_eq!(read.target_class, "Track");
    assert_eq!(read.code, "fMomentum = onfile.fPt;");
    assert_eq!(read.fields[0], ("version".to_string(), "[1-]".to_string()));
}

#[test]
fn name_with_wildcard_is_a_pattern() {
    let rules =
        parse_rule_file("<selection><class name=\"std::vector&lt;*&gt;\"/></selection>", "s.xml")
            .unwrap_or_else(|err| panic!("{err}"));
    assert!(matches!(rules.rules[0].matcher, Matcher::Pattern(_)));
}

#[test]
fn unknown_elements_are_rule_errors() {
    let err = parse_rule_file("<selection><widget name=\"A\"/></selection>", "s.xml").unwrap_err();
    assert_eq!(err.code(), ErrorCode::E0003);

    let err = parse_rule_file("<selection><class/></selection>", "s.xml").unwrap_err();
    assert_eq!(err.code(), ErrorCode::E0003);

    let err = parse_rule_file("<selection><class name=\"A\">", "s.xml").unwrap_err();
    assert_eq!(err.code(), ErrorCode::E0003);
}

#[test]
fn mismatched_tags_are_rule_errors() {
    let err = parse_rule_file("<selection></exclusion>", "s.xml").unwrap_err();
    assert_eq!(err.code(), ErrorCode::E0003);
}

#[test]
fn invalid_patterns_are_reported() {
    let err =
        parse_rule_file("<selection><class pattern=\"geo::[\"/></selection>", "s.xml").unwrap_err();
    assert_eq!(err.code(), ErrorCode::E0004);
}
