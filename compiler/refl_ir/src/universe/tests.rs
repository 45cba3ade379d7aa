use super::*;
use pretty_assertions::assert_eq;

const GEOMETRY: &str = r#"{
  "declarations": [
    { "kind": "class", "name": "Point3D", "scope": "geo", "file": "geo/Point3D.h", "line": 12,
      "version": 1,
      "fields": [
        { "name": "x", "type": "double" },
        { "name": "y", "type": "double" },
        { "name": "z", "type": "double", "comment": "!cached" }
      ] },
    { "kind": "struct", "name": "Widget", "file": "Widget.h", "line": 3 },
    { "kind": "class", "name": "vector<Widget>", "scope": "std", "file": "vector", "line": 1 },
    { "kind": "typedef", "name": "Long64_t", "type": "long long", "file": "Types.h" },
    { "kind": "enum", "name": "Color", "scope": "geo", "file": "geo/Color.h", "underlying": "int" },
    { "kind": "class", "name": "Fwd", "complete": false, "file": "a.h" },
    { "kind": "class", "name": "Fwd", "file": "Fwd.h", "line": 7 }
  ]
}"#;

#[test]
fn creates_implicit_namespaces_before_their_members() {
    let universe = DeclUniverse::from_json(GEOMETRY).unwrap();
    let geo = universe.lookup("geo").unwrap();
    let point = universe.lookup("geo::Point3D").unwrap();
    assert!(universe.decl(geo).is_namespace());
    assert!(geo < point);
    assert_eq!(universe.decl(point).parent, Some(geo));
    assert_eq!(universe.decl(point).location.to_string(), "geo/Point3D.h:12");
}

#[test]
fn parses_fields_and_comments() {
    let universe = DeclUniverse::from_json(GEOMETRY).unwrap();
    let (_, point) = universe.lookup_class("geo::Point3D").unwrap();
    assert_eq!(point.version, Some(1));
    let names: Vec<&str> = point.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y", "z"]);
    assert_eq!(point.fields[2].comment, "!cached");
    assert!(point.declares_streamer());
}

#[test]
fn template_instances_record_their_arguments() {
    let universe = DeclUniverse::from_json(GEOMETRY).unwrap();
    let (_, vector) = universe.lookup_class("std::vector<Widget>").unwrap();
    let info = vector.template.as_ref().unwrap();
    assert_eq!(info.name, "std::vector");
    assert_eq!(info.args, vec![TemplateArg::Type(TypeRef::named("Widget"))]);
}

#[test]
fn lookup_accepts_normalized_names() {
    let universe = DeclUniverse::from_json(GEOMETRY).unwrap();
    assert_eq!(
        universe.lookup("vector<Widget>"),
        universe.lookup("std::vector<Widget>")
    );
    assert_eq!(universe.lookup("::Widget"), universe.lookup("Widget"));
}

#[test]
fn definition_replaces_forward_declaration() {
    let universe = DeclUniverse::from_json(GEOMETRY).unwrap();
    let fwd = universe.lookup("Fwd").unwrap();
    assert!(universe.decl(fwd).is_complete());
    assert_eq!(universe.decl(fwd).location.file, "Fwd.h");
    let count = universe
        .declarations()
        .iter()
        .filter(|d| d.qualified_name == "Fwd")
        .count();
    assert_eq!(count, 1);
}

#[test]
fn typedef_and_enum_queries() {
    let universe = DeclUniverse::from_json(GEOMETRY).unwrap();
    assert_eq!(
        universe.typedef_target("Long64_t"),
        Some(&TypeRef::Fundamental(crate::Fundamental::LongLong))
    );
    assert!(universe.is_enum("geo::Color"));
    assert!(!universe.is_enum("Widget"));
}

#[test]
fn bad_type_spelling_is_reported() {
    let err = DeclUniverse::from_json(
        r#"{ "declarations": [
            { "kind": "variable", "name": "g", "type": "int[" } ] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, UniverseError::Type { .. }), "{err}");
}

#[test]
fn variable_cannot_be_a_scope() {
    let err = DeclUniverse::from_json(
        r#"{ "declarations": [
            { "kind": "variable", "name": "g", "type": "int" },
            { "kind": "class", "name": "Inner", "scope": "g" } ] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, UniverseError::BadScope { .. }), "{err}");
}
