//! End-to-end runs of the dictionary pipeline against a temporary directory.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use refl_diagnostic::ErrorCode;
use refl_meta::AutoloadMap;
use reflc::{DictOptions, Pipeline, PipelineError, PipelineState};
use tempfile::TempDir;

const UNIVERSE: &str = r#"{
  "declarations": [
    { "kind": "namespace", "name": "geo", "file": "geo/Point3D.h" },
    { "kind": "class", "name": "Point3D", "scope": "geo", "file": "geo/Point3D.h", "line": 3,
      "version": 1,
      "fields": [
        { "name": "x", "type": "double" },
        { "name": "y", "type": "double" },
        { "name": "z", "type": "double" }
      ] },
    { "kind": "class", "name": "Track", "file": "Track.h", "line": 5, "version": 2,
      "fields": [
        { "name": "fOrigin", "type": "geo::Point3D" },
        { "name": "fN", "type": "int" }
      ] },
    { "kind": "class", "name": "Holes", "file": "Holes.h", "line": 2, "version": 1,
      "fields": [
        { "name": "fData", "type": "float*" },
        { "name": "fN", "type": "int" }
      ] },
    { "kind": "class", "name": "Opaque", "file": "Opaque.h", "complete": false }
  ]
}"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("decls.json"), UNIVERSE).unwrap();
        Workspace { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).unwrap()
    }

    /// Options selecting with the given pragma lines.
    fn options(&self, pragmas: &str) -> DictOptions {
        let linkdef = self.write("LinkDef.h", pragmas);
        let mut options = DictOptions::new(self.path("GeoDict.cxx"), self.path("decls.json"));
        options.headers = vec!["geo/Point3D.h".into()];
        options.selection_file = Some(linkdef);
        options
    }

    fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn assert_clean_directory(dir: &Path, expected: &[&str]) {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, expected);
}

#[test]
fn generates_dictionary_and_index() {
    let ws = Workspace::new();
    let mut options = ws.options("#pragma link C++ class geo::Point3D;\n");
    options.shared_library = Some(ws.path("libGeo.so"));

    let report = Pipeline::new(&options).run();
    assert!(report.succeeded(), "{:?}", report.diagnostics);
    assert_eq!(report.state, PipelineState::Committed);
    assert_eq!(
        report.artifacts,
        [ws.path("GeoDict.cxx"), ws.path("libGeo.rootmap")]
    );
    assert_eq!(report.summary.selected, 1);

    let dict = ws.read("GeoDict.cxx");
    assert!(dict.starts_with("// Do NOT change. Changes will be lost next time file is generated\n"));
    assert!(dict.contains("#include \"geo/Point3D.h\"\n"));
    assert!(dict.contains("void TriggerDictionaryInitialization_GeoDict_Impl()"));
    assert!(dict.contains("namespace geo { class Point3D; }\n"));
    assert!(dict.contains("\"geo::Point3D\", \"geo/Point3D.h\", \"@\",\nnullptr\n"));

    assert_eq!(
        ws.read("libGeo.rootmap"),
        "{ decls }\n\
         namespace geo { class Point3D; }\n\
         \n\
         [ libGeo.so ]\n\
         # List of selected classes\n\
         class geo::Point3D\n\
         header geo/Point3D.h\n"
    );
    let mut autoload = AutoloadMap::new();
    autoload.load(&ws.path("libGeo.rootmap")).unwrap();
    assert_eq!(autoload.get("geo::Point3D"), Some("libGeo.so"));
    assert_eq!(autoload.get("geo"), Some(""));
}

#[test]
fn identical_runs_write_identical_files() {
    let ws = Workspace::new();
    let options = ws.options(
        "#pragma link C++ class geo::Point3D;\n#pragma link C++ class Track;\n",
    );
    assert!(Pipeline::new(&options).run().succeeded());
    let first = ws.read("GeoDict.cxx");
    assert!(Pipeline::new(&options).run().succeeded());
    assert_eq!(ws.read("GeoDict.cxx"), first);
}

#[test]
fn split_moves_class_code_to_its_own_source() {
    let ws = Workspace::new();
    let mut options = ws.options("#pragma link C++ class geo::Point3D;\n");
    options.split = true;

    let report = Pipeline::new(&options).run();
    assert!(report.succeeded(), "{:?}", report.diagnostics);
    assert_eq!(
        report.artifacts,
        [ws.path("GeoDict.cxx"), ws.path("GeoDict_classdef.cxx")]
    );
    let primary = ws.read("GeoDict.cxx");
    let classdef = ws.read("GeoDict_classdef.cxx");
    assert!(!primary.contains("::Streamer("));
    assert!(classdef.contains("Point3D::Streamer("));
    assert!(primary.contains("TriggerDictionaryInitialization_GeoDict"));
}

#[test]
fn codegen_errors_leave_previous_outputs_untouched() {
    let ws = Workspace::new();
    ws.write("GeoDict.cxx", "// previous run\n");
    let mut options = ws.options("#pragma link C++ class Holes;\n");
    options.rootmap_file = Some(ws.path("Holes.rootmap"));
    options.rootmap_libs = vec!["libHoles.so".into()];

    let report = Pipeline::new(&options).run();
    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(report.exit_code(), 1);
    assert!(matches!(report.error, Some(PipelineError::Aborted { errors: 1 })));
    assert!(report.diagnostics.iter().any(|d| d.code == ErrorCode::E2001));
    assert!(report.artifacts.is_empty());

    assert_eq!(ws.read("GeoDict.cxx"), "// previous run\n");
    assert_eq!(ws.entries(), ["GeoDict.cxx", "LinkDef.h", "decls.json"]);
}

#[test]
fn incomplete_classes_warn_unless_warnings_fail() {
    let ws = Workspace::new();
    let options = ws.options("#pragma link C++ class Opaque;\n#pragma link C++ class Track;\n");

    let report = Pipeline::new(&options).run();
    assert!(report.succeeded(), "{:?}", report.diagnostics);
    assert!(report.warning_count >= 1);
    assert!(report.diagnostics.iter().any(|d| d.code == ErrorCode::E1001));
    assert_eq!(report.summary.rejected, 1);

    let mut strict = options.clone();
    strict.fail_on_warnings = true;
    std::fs::remove_file(ws.path("GeoDict.cxx")).unwrap();
    let report = Pipeline::new(&strict).run();
    assert_eq!(report.state, PipelineState::Failed);
    assert!(report.error_count >= 1);
    assert_eq!(report.warning_count, 0);
    assert_clean_directory(ws.dir.path(), &["LinkDef.h", "decls.json"]);
}

#[test]
fn malformed_selection_fails_before_scanning() {
    let ws = Workspace::new();
    let mut options = ws.options("#pragma link C++ class Track+-;\n");
    // Never read: the run stops at the rules.
    options.universe = ws.path("missing.json");

    let report = Pipeline::new(&options).run();
    assert_eq!(report.state, PipelineState::Failed);
    assert!(matches!(report.error, Some(PipelineError::Rules(_))));
    assert_eq!(report.diagnostics[0].code, ErrorCode::E0005);
    assert_eq!(report.summary.declarations, 0);
}

#[test]
fn check_writes_nothing() {
    let ws = Workspace::new();
    let mut options = DictOptions::new(ws.path("TrackDict.cxx"), ws.path("decls.json"));
    // No selection file: the header stem names the class.
    options.headers = vec!["Track.h".into()];

    let report = Pipeline::new(&options).check();
    assert!(report.succeeded(), "{:?}", report.diagnostics);
    assert_eq!(report.state, PipelineState::Generated);
    assert_eq!(report.summary.selected, 1);
    assert_eq!(report.summary.registered, 1);
    assert!(report.artifacts.is_empty());
    assert_eq!(ws.entries(), ["decls.json"]);
}

#[test]
fn legacy_index_lists_every_library() {
    let ws = Workspace::new();
    let mut options = ws.options("#pragma link C++ class geo::Point3D;\n");
    options.rootmap_file = Some(ws.path("geo.rootmap"));
    options.rootmap_libs = vec!["libGeo.so".into(), "libMath.so".into()];
    options.legacy_rootmap = true;

    let report = Pipeline::new(&options).run();
    assert!(report.succeeded(), "{:?}", report.diagnostics);
    assert_eq!(
        ws.read("geo.rootmap"),
        "Library.geo@@Point3D: libGeo.so libMath.so\n"
    );
}

#[test]
fn index_without_libraries_is_skipped_with_a_warning() {
    let ws = Workspace::new();
    let mut options = ws.options("#pragma link C++ class geo::Point3D;\n");
    options.rootmap_file = Some(ws.path("geo.rootmap"));

    let report = Pipeline::new(&options).run();
    assert!(report.succeeded(), "{:?}", report.diagnostics);
    assert_eq!(report.warning_count, 1);
    assert_eq!(report.diagnostics[0].code, ErrorCode::E3002);
    assert_eq!(report.artifacts, [ws.path("GeoDict.cxx")]);
}

#[test]
fn lib_list_names_libraries_of_referenced_records() {
    let ws = Workspace::new();
    let deps = ws.write("libGeo.rootmap", "[ libGeo.so ]\nclass geo::Point3D\n");
    ws.write("deps.in", &format!("{}\n", deps.display()));
    let mut options = ws.options("#pragma link C++ class Track;\n");
    options.lib_list_prefix = Some(ws.path("deps").display().to_string());

    let report = Pipeline::new(&options).run();
    assert!(report.succeeded(), "{:?}", report.diagnostics);
    assert_eq!(
        ws.read("deps.out"),
        "libGeo.so\n# Now the list of classes\nTrack\n"
    );
}

#[test]
fn failed_commit_keeps_the_previous_run() {
    let ws = Workspace::new();
    ws.write("GeoDict.cxx", "// previous run\n");
    // The index target is a directory, so renaming the index into place fails
    // after the dictionary has already been replaced.
    std::fs::create_dir(ws.path("geo.rootmap")).unwrap();
    std::fs::write(ws.path("geo.rootmap").join("keep"), "").unwrap();
    let mut options = ws.options("#pragma link C++ class geo::Point3D;\n");
    options.rootmap_file = Some(ws.path("geo.rootmap"));
    options.rootmap_libs = vec!["libGeo.so".into()];

    let report = Pipeline::new(&options).run();
    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(report.exit_code(), 1);
    assert!(matches!(report.error, Some(PipelineError::Io { .. })));
    assert!(report.diagnostics.iter().any(|d| d.code == ErrorCode::E9002));
    assert!(report.artifacts.is_empty());

    assert_eq!(ws.read("GeoDict.cxx"), "// previous run\n");
    assert_eq!(
        ws.entries(),
        ["GeoDict.cxx", "LinkDef.h", "decls.json", "geo.rootmap"]
    );
}
