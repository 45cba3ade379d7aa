//! Dictionary metadata for refl.
//!
//! Everything a dictionary ships besides its generated code: which headers
//! declare each selected entity, forward declarations of them, the autoload
//! keys the runtime looks types up by, and the index (rootmap) file that
//! maps those keys to libraries.
//!
//! ```text
//! Selection
//!     ├─ extract_headers        → HeaderCatalog ─┬─ header_map_string
//!     ├─ ForwardDecls           → payload decls  │
//!     │                         → index decls ───┤
//!     └─ extract_autoload_keys  → AutoloadKeys ──┴─ render_rootmap
//! ```
//!
//! The [`rootmap::AutoloadMap`] reader goes the other way, and feeds the
//! [`lib_list`] computation of library dependencies.

mod autoload;
mod error;
pub mod fwd_decl;
pub mod header_map;
mod headers;
pub mod lib_list;
pub mod rootmap;

pub use autoload::{extract_autoload_keys, AutoloadKeys};
pub use error::IndexError;
pub use fwd_decl::{collapse_identical_namespaces, ForwardDecls};
pub use header_map::header_map_string;
pub use headers::{extract_headers, HeaderCatalog};
pub use rootmap::{render_rootmap, AutoloadMap, RootmapContent, RootmapFormat};

use refl_ir::Introspect;
use refl_select::Selection;
use tracing::debug;

/// All metadata of one selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub headers: HeaderCatalog,
    pub keys: AutoloadKeys,
    /// Embedded in the module registration.
    pub payload_decls: ForwardDecls,
    /// The `{ decls }` block of the index, namespaces collapsed.
    pub index_decls: Vec<String>,
}

impl Metadata {
    /// The index text for the given libraries.
    pub fn rootmap(
        &self,
        libraries: String,
        headers_to_ignore: &[String],
        format: RootmapFormat,
    ) -> String {
        let content = RootmapContent {
            libraries,
            decls: &self.index_decls,
            keys: &self.keys,
            class_headers: &self.headers.classes,
            headers_to_ignore,
        };
        render_rootmap(&content, format)
    }

    pub fn header_map(&self, inline_payload: bool) -> String {
        header_map_string(&self.headers.decls, inline_payload)
    }
}

/// Collect the metadata of a selection.
///
/// Fails only when two selected classes share a normalized name.
#[tracing::instrument(level = "debug", skip_all)]
pub fn collect_metadata<P: Introspect + ?Sized>(
    port: &P,
    selection: &Selection,
) -> Result<Metadata, IndexError> {
    let keys = extract_autoload_keys(port, selection)?;
    let headers = extract_headers(port, selection);
    let payload_decls = ForwardDecls::for_payload(port, selection);
    let index_decls = collapse_identical_namespaces(ForwardDecls::for_index(port, selection).lines());
    debug!(
        classes = keys.classes.len(),
        header_keys = headers.decls.len(),
        decls = payload_decls.lines().len(),
        "metadata collected"
    );
    Ok(Metadata {
        headers,
        keys,
        payload_decls,
        index_decls,
    })
}
