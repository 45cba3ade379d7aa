//! The index (rootmap) artifact.
//!
//! Block format, one section per library list:
//!
//! ```text
//! { decls }
//! namespace ev { class Event; }
//!
//! [ libEvent.so ]
//! # List of selected classes
//! class ev::Event
//! header ev/Event.h
//! # List of selected namespaces
//! namespace ev
//! ```
//!
//! Legacy format, one line per key:
//!
//! ```text
//! Library.ev@@Event: libEvent.so
//! ```

mod reader;

pub use reader::AutoloadMap;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::autoload::AutoloadKeys;

/// Which index syntax to write.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RootmapFormat {
    #[default]
    Block,
    Legacy,
}

/// Everything that goes into one index file.
#[derive(Clone, Debug)]
pub struct RootmapContent<'a> {
    /// Space-separated library list.
    pub libraries: String,
    /// Forward declarations for the `{ decls }` block.
    pub decls: &'a [String],
    pub keys: &'a AutoloadKeys,
    /// Headers of non-template classes.
    pub class_headers: &'a BTreeMap<String, Vec<String>>,
    /// Headers never listed, e.g. because they are shipped inline.
    pub headers_to_ignore: &'a [String],
}

/// Render the index in the requested format.
pub fn render_rootmap(content: &RootmapContent<'_>, format: RootmapFormat) -> String {
    match format {
        RootmapFormat::Block => render_block(content),
        RootmapFormat::Legacy => render_legacy(content),
    }
}

fn render_block(content: &RootmapContent<'_>) -> String {
    let mut out = String::new();
    let keys = content.keys;
    if keys.is_empty() {
        return out;
    }

    if !content.decls.is_empty() {
        out.push_str("{ decls }\n");
        for decl in content.decls {
            out.push_str(decl);
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(&format!("[ {} ]\n", content.libraries));

    // Typedef, enum and variable keys never repeat a class key.
    let mut published: FxHashSet<&str> = FxHashSet::default();

    if !keys.classes.is_empty() {
        out.push_str("# List of selected classes\n");
        for class in &keys.classes {
            out.push_str(&format!("class {class}\n"));
            published.insert(class);
        }
        let mut treated: FxHashSet<&str> = FxHashSet::default();
        for class in &keys.classes {
            if class.contains('<') {
                continue;
            }
            let Some(header) = content
                .class_headers
                .get(class)
                .and_then(|headers| headers.first())
            else {
                continue;
            };
            if treated.insert(header)
                && !content.headers_to_ignore.contains(header)
                && is_header_name(header)
            {
                out.push_str(&format!("header {header}\n"));
            }
        }
    }

    if !keys.namespaces.is_empty() {
        out.push_str("# List of selected namespaces\n");
        for namespace in &keys.namespaces {
            out.push_str(&format!("namespace {namespace}\n"));
        }
    }

    let sections: [(&str, &str, &[String]); 3] = [
        ("# List of selected typedefs and outer classes", "typedef", &keys.typedefs),
        ("# List of selected enums and outer classes", "enum", &keys.enums),
        ("# List of selected vars", "var", &keys.variables),
    ];
    for (title, keyword, names) in sections {
        if names.is_empty() {
            continue;
        }
        out.push_str(title);
        out.push('\n');
        for name in names {
            if published.insert(name) {
                out.push_str(&format!("{keyword} {name}\n"));
            }
        }
    }
    out
}

fn render_legacy(content: &RootmapContent<'_>) -> String {
    let keys = content.keys;
    let mut out = String::new();
    let mut published: FxHashSet<&str> = FxHashSet::default();
    let all = keys
        .classes
        .iter()
        .chain(&keys.namespaces)
        .chain(&keys.typedefs)
        .chain(&keys.enums)
        .chain(&keys.variables);
    for key in all {
        if published.insert(key) {
            out.push_str(&format!(
                "Library.{}: {}\n",
                escape_legacy_key(key),
                content.libraries
            ));
        }
    }
    out
}

/// `::` becomes `@@` and spaces become `-` so that a key is one token.
pub fn escape_legacy_key(key: &str) -> String {
    key.replace("::", "@@").replace(' ', "-")
}

pub fn unescape_legacy_key(key: &str) -> String {
    key.replace("@@", "::").replace('-', " ")
}

/// Whether a path names a header, judging by its extension.
pub fn is_header_name(path: &str) -> bool {
    const EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "h++", "H", "hp", "ipp", "inl", "icc"];
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext))
}

/// Index file and library name derived from a shared library path:
/// `out/libEvent.so` gives `out/libEvent.rootmap` and `libEvent.so`.
pub fn rootmap_names_for_library(shared_library: &Path) -> (PathBuf, String) {
    let rootmap = shared_library.with_extension("rootmap");
    let library = shared_library
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    (rootmap, library)
}

/// Join library names the way a `[ ... ]` section lists them.
pub fn library_list<S: AsRef<str>>(libraries: &[S]) -> String {
    libraries
        .iter()
        .map(AsRef::as_ref)
        .filter(|lib| !lib.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
