//! Options of one dictionary run.

use std::path::PathBuf;

use refl_meta::rootmap::rootmap_names_for_library;
use refl_meta::RootmapFormat;

/// Everything a dictionary run needs to know.
///
/// The CLI assembles this from arguments; tests build it directly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DictOptions {
    /// Primary generated source.
    pub dict_file: PathBuf,
    /// Declaration dump standing in for the compiler frontend.
    pub universe: PathBuf,
    /// Input headers, included by the generated source.
    pub headers: Vec<String>,
    pub include_paths: Vec<String>,
    /// Pragma list (`LinkDef.h`) or XML rule file. Without one, every
    /// header's stem is selected as a class.
    pub selection_file: Option<PathBuf>,
    pub rootmap_file: Option<PathBuf>,
    pub rootmap_libs: Vec<String>,
    pub shared_library: Option<PathBuf>,
    pub legacy_rootmap: bool,
    /// Move class code into `<dict stem>_classdef.cxx`.
    pub split: bool,
    /// The header map points at the inline payload instead of headers.
    pub inline_headers: bool,
    pub lib_list_prefix: Option<String>,
    pub fail_on_warnings: bool,
    /// Load the selection rules and stop.
    pub selection_syntax_only: bool,
    /// 0 is quiet; 1, 2 and 3 map to info, debug and trace.
    pub verbosity: u8,
}

impl DictOptions {
    pub fn new(dict_file: impl Into<PathBuf>, universe: impl Into<PathBuf>) -> Self {
        DictOptions {
            dict_file: dict_file.into(),
            universe: universe.into(),
            ..Self::default()
        }
    }

    /// Stem of the dictionary source, used as the module name.
    pub fn module_name(&self) -> String {
        self.dict_file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `<dir>/<stem>_classdef.<ext>` next to the primary source.
    pub fn classdef_file(&self) -> PathBuf {
        let extension = self
            .dict_file
            .extension()
            .map_or_else(|| "cxx".to_string(), |ext| ext.to_string_lossy().into_owned());
        self.dict_file
            .with_file_name(format!("{}_classdef.{extension}", self.module_name()))
    }

    /// Where the index goes, if one was asked for. An explicit path wins
    /// over one derived from the shared library.
    pub fn rootmap_path(&self) -> Option<PathBuf> {
        self.rootmap_file.clone().or_else(|| {
            self.shared_library
                .as_deref()
                .map(|library| rootmap_names_for_library(library).0)
        })
    }

    /// Libraries the index maps keys to.
    pub fn rootmap_libraries(&self) -> Vec<String> {
        if !self.rootmap_libs.is_empty() {
            return self.rootmap_libs.clone();
        }
        self.shared_library
            .as_deref()
            .map(|library| rootmap_names_for_library(library).1)
            .filter(|name| !name.is_empty())
            .into_iter()
            .collect()
    }

    pub fn rootmap_format(&self) -> RootmapFormat {
        if self.legacy_rootmap {
            RootmapFormat::Legacy
        } else {
            RootmapFormat::Block
        }
    }

    /// Headers left out of the index because the payload carries them.
    pub fn headers_to_ignore(&self) -> &[String] {
        if self.inline_headers {
            &self.headers
        } else {
            &[]
        }
    }
}
