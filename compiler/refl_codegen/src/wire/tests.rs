use pretty_assertions::assert_eq;
use proptest::prelude::*;
use refl_ir::DeclUniverse;
use refl_select::{parse_rule_file, SelectionEngine};

use super::*;

const TRACKS: &str = r#"{
  "declarations": [
    { "kind": "class", "name": "Point3D", "file": "Point3D.h", "version": 1,
      "fields": [
        { "name": "x", "type": "double" },
        { "name": "y", "type": "double" },
        { "name": "z", "type": "double" }
      ] },
    { "kind": "enum", "name": "Kind", "file": "Track.h" },
    { "kind": "class", "name": "Vertex", "file": "Vertex.h", "version": 2,
      "fields": [
        { "name": "fX", "type": "float" },
        { "name": "fY", "type": "double" }
      ] },
    { "kind": "class", "name": "Tag", "file": "Tag.h",
      "fields": [ { "name": "fName", "type": "std::string" } ] },
    { "kind": "class", "name": "Track", "file": "Track.h", "version": 3,
      "bases": ["Vertex"],
      "fields": [
        { "name": "fN", "type": "int" },
        { "name": "fFlag", "type": "bool" },
        { "name": "fCharge", "type": "short" },
        { "name": "fMask", "type": "unsigned int" },
        { "name": "fId", "type": "long long" },
        { "name": "fKind", "type": "Kind" },
        { "name": "fE", "type": "Double32_t" },
        { "name": "fCov", "type": "float[2][3]" },
        { "name": "fErr", "type": "Double32_t[4]" },
        { "name": "fAdc", "type": "short*", "comment": "[fN]" },
        { "name": "fLabel", "type": "std::string" },
        { "name": "fTags", "type": "std::vector<std::string>" },
        { "name": "fHits", "type": "std::map<int,double>" },
        { "name": "fSeen", "type": "std::forward_list<int>*" },
        { "name": "fTag", "type": "Tag" },
        { "name": "fParent", "type": "Vertex*" },
        { "name": "fCache", "type": "double", "comment": "!" }
      ] },
    { "kind": "class", "name": "Custom", "file": "Custom.h",
      "methods": [ { "name": "Streamer", "params": ["refl::Buffer&"] } ] },
    { "kind": "class", "name": "Broken", "file": "Broken.h", "version": 1,
      "fields": [ { "name": "fData", "type": "int*" } ] }
  ]
}"#;

fn universe() -> DeclUniverse {
    DeclUniverse::from_json(TRACKS).unwrap()
}

fn point(x: f64, y: f64, z: f64) -> Object {
    Object::new("Point3D")
        .with("x", Value::Real(x))
        .with("y", Value::Real(y))
        .with("z", Value::Real(z))
}

fn vertex(x: f32, y: f64) -> Object {
    Object::new("Vertex")
        .with("fX", Value::Real(f64::from(x)))
        .with("fY", Value::Real(y))
}

#[test]
fn point3d_bytes_are_an_envelope_of_three_doubles() {
    let universe = universe();
    let mut interp = Interpreter::new(&universe);
    let bytes = interp.write(&point(1.0, 2.0, 3.0)).unwrap();

    let mut expected = vec![0x40, 0x00, 0x00, 26, 0x00, 0x01];
    for value in [1.0f64, 2.0, 3.0] {
        expected.extend_from_slice(&value.to_be_bytes());
    }
    assert_eq!(bytes, expected);
    assert_eq!(interp.read("Point3D", &bytes).unwrap(), point(1.0, 2.0, 3.0));
}

#[test]
fn corrupted_byte_count_is_detected() {
    let universe = universe();
    let mut interp = Interpreter::new(&universe);
    let mut bytes = interp.write(&point(1.0, 2.0, 3.0)).unwrap();
    bytes[3] = 30;
    bytes.extend_from_slice(&[0; 4]);
    assert_eq!(
        interp.read("Point3D", &bytes),
        Err(WireError::ByteCountMismatch {
            class: "Point3D".into(),
            expected: 30,
            actual: 26,
        })
    );

    bytes[0] = 0;
    assert_eq!(
        interp.read("Point3D", &bytes),
        Err(WireError::MissingByteCount {
            class: "Point3D".into()
        })
    );
}

#[test]
fn long_strings_use_the_extended_prefix() {
    let mut writer = WireWriter::new();
    writer.write_string("abc");
    let long = "x".repeat(300);
    writer.write_string(&long);
    let bytes = writer.into_bytes();
    assert_eq!(&bytes[..4], &[3, b'a', b'b', b'c']);
    assert_eq!(&bytes[4..9], &[255, 0, 0, 1, 44]);

    let mut reader = WireReader::new(&bytes);
    assert_eq!(reader.read_string().unwrap(), "abc");
    assert_eq!(reader.read_string().unwrap(), long);
    assert!(reader.is_at_end());
}

#[test]
fn truncated_buffers_report_the_missing_bytes() {
    let mut reader = WireReader::new(&[0, 1]);
    assert_eq!(
        reader.read_i32(),
        Err(WireError::UnexpectedEnd {
            offset: 0,
            needed: 2
        })
    );
}

#[test]
fn excluded_members_are_not_transferred() {
    let universe = universe();
    let rules = parse_rule_file(
        r#"<lcgdict>
             <selection><class name="Point3D"/></selection>
             <exclusion><class name="Point3D"><field name="y"/></class></exclusion>
           </lcgdict>"#,
        "selection.xml",
    )
    .unwrap();
    let selection = SelectionEngine::new(&universe, &rules).select().unwrap();
    let mut interp = Interpreter::new(&universe).with_selection(&selection);

    let without_y = Object::new("Point3D")
        .with("x", Value::Real(1.0))
        .with("z", Value::Real(3.0));
    let bytes = interp.write(&point(1.0, 2.0, 3.0)).unwrap();
    assert_eq!(bytes.len(), 6 + 16);
    assert_eq!(interp.read("Point3D", &bytes).unwrap(), without_y);
}

#[test]
fn fast_array_length_must_match_its_field() {
    let universe = universe();
    let mut interp = Interpreter::new(&universe);
    let track = sample_track().with("fN", Value::Int(5));
    assert_eq!(
        interp.write(&track),
        Err(WireError::LengthMismatch {
            member: "fAdc".into(),
            expected: 5,
            actual: 2,
        })
    );
}

#[test]
fn classes_the_model_cannot_run_are_rejected() {
    let universe = universe();
    let mut interp = Interpreter::new(&universe);
    assert_eq!(
        interp.write(&Object::new("Custom")),
        Err(WireError::CustomStreamer {
            class: "Custom".into()
        })
    );
    assert!(matches!(
        interp.write(&Object::new("Broken")),
        Err(WireError::Unstreamable { .. })
    ));
    assert_eq!(
        interp.write(&Object::new("Nowhere")),
        Err(WireError::UnknownClass("Nowhere".into()))
    );
}

fn sample_track() -> Object {
    Object::new("Track")
        .with_base(vertex(0.5, -2.25))
        .with("fN", Value::Int(2))
        .with("fFlag", Value::Bool(true))
        .with("fCharge", Value::Int(-1))
        .with("fMask", Value::UInt(0xff))
        .with("fId", Value::Int(1 << 40))
        .with("fKind", Value::Int(3))
        .with("fE", Value::Real(12.5))
        .with("fCov", Value::Array((0..6).map(|i| Value::Real(f64::from(i))).collect()))
        .with("fErr", Value::Array(vec![Value::Real(0.25); 4]))
        .with("fAdc", Value::Array(vec![Value::Int(7), Value::Int(-7)]))
        .with("fLabel", Value::Str("muon".into()))
        .with("fTags", Value::Seq(vec![Value::Str("a".into()), Value::Str("b".into())]))
        .with("fHits", Value::Map(vec![(Value::Int(1), Value::Real(0.5))]))
        .with("fSeen", Value::Seq(vec![Value::Int(3), Value::Int(1), Value::Int(2)]))
        .with(
            "fTag",
            Value::Object(Object::new("Tag").with("fName", Value::Str("t".into()))),
        )
        .with("fParent", Value::Pointer(None))
}

#[test]
fn every_member_shape_survives_a_round_trip() {
    let universe = universe();
    let mut interp = Interpreter::new(&universe);
    let track = sample_track();
    let bytes = interp.write(&track).unwrap();
    assert_eq!(interp.read("Track", &bytes).unwrap(), track);
}

#[test]
fn transient_members_are_ignored_on_write_and_absent_on_read() {
    let universe = universe();
    let mut interp = Interpreter::new(&universe);
    let with_cache = sample_track().with("fCache", Value::Real(99.0));
    let bytes = interp.write(&with_cache).unwrap();
    assert_eq!(bytes, interp.write(&sample_track()).unwrap());
    assert!(!interp.read("Track", &bytes).unwrap().fields.contains_key("fCache"));
}

fn real32() -> impl Strategy<Value = Value> {
    (-1.0e6f32..1.0e6f32).prop_map(|v| Value::Real(f64::from(v)))
}

fn real64() -> impl Strategy<Value = Value> {
    (-1.0e9f64..1.0e9f64).prop_map(Value::Real)
}

fn text() -> impl Strategy<Value = String> {
    prop_oneof!["[a-z]{0,8}", "[a-z]{250,300}"]
}

fn vertex_object() -> impl Strategy<Value = Object> {
    (-1.0e6f32..1.0e6f32, -1.0e9f64..1.0e9f64).prop_map(|(x, y)| vertex(x, y))
}

prop_compose! {
    fn scalars()(
        flag in any::<bool>(),
        charge in any::<i16>(),
        mask in any::<u32>(),
        id in any::<i64>(),
        kind in 0i64..8,
        e in real32(),
    ) -> Vec<(&'static str, Value)> {
        vec![
            ("fFlag", Value::Bool(flag)),
            ("fCharge", Value::Int(i64::from(charge))),
            ("fMask", Value::UInt(u64::from(mask))),
            ("fId", Value::Int(id)),
            ("fKind", Value::Int(kind)),
            ("fE", e),
        ]
    }
}

prop_compose! {
    fn arrays()(
        cov in prop::collection::vec(real32(), 6),
        err in prop::collection::vec(real32(), 4),
        adc in prop::collection::vec(any::<i16>(), 0..16),
    ) -> Vec<(&'static str, Value)> {
        vec![
            ("fN", Value::Int(adc.len() as i64)),
            ("fCov", Value::Array(cov)),
            ("fErr", Value::Array(err)),
            ("fAdc", Value::Array(adc.into_iter().map(|v| Value::Int(i64::from(v))).collect())),
        ]
    }
}

prop_compose! {
    fn collections()(
        label in text(),
        tags in prop::collection::vec(text(), 0..4),
        hits in prop::collection::btree_map(any::<i32>(), real64(), 0..4),
        seen in prop::collection::vec(any::<i32>(), 0..6),
        tag in text(),
        parent in prop::option::of(vertex_object()),
    ) -> Vec<(&'static str, Value)> {
        vec![
            ("fLabel", Value::Str(label)),
            ("fTags", Value::Seq(tags.into_iter().map(Value::Str).collect())),
            ("fHits", Value::Map(
                hits.into_iter().map(|(k, v)| (Value::Int(i64::from(k)), v)).collect(),
            )),
            ("fSeen", Value::Seq(seen.into_iter().map(|v| Value::Int(i64::from(v))).collect())),
            ("fTag", Value::Object(Object::new("Tag").with("fName", Value::Str(tag)))),
            ("fParent", Value::Pointer(
                parent.map(|p| Box::new(Value::Object(p))),
            )),
        ]
    }
}

fn track() -> impl Strategy<Value = Object> {
    (vertex_object(), scalars(), arrays(), collections()).prop_map(
        |(base, scalars, arrays, collections)| {
            let mut object = Object::new("Track").with_base(base);
            for (name, value) in scalars.into_iter().chain(arrays).chain(collections) {
                object = object.with(name, value);
            }
            object
        },
    )
}

proptest! {
    #[test]
    fn read_reproduces_what_write_produced(track in track()) {
        let universe = universe();
        let mut interp = Interpreter::new(&universe);
        let bytes = interp.write(&track).unwrap();
        prop_assert_eq!(interp.read("Track", &bytes).unwrap(), track);
    }
}
