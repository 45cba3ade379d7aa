//! Selection-file loading.

use std::path::Path;

use tracing::info;

use crate::error::RuleError;
use crate::linkdef::parse_pragmas;
use crate::rule::RuleSet;
use crate::xml::parse_rule_file;

/// The two selection-file syntaxes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SelectionFileKind {
    PragmaList,
    RuleFile,
}

impl SelectionFileKind {
    /// Classify by file name: `*.xml` is a rule file, a header whose name
    /// contains `linkdef` (any case) is a pragma list.
    pub fn detect(path: &Path) -> Result<SelectionFileKind, RuleError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "xml" => Ok(SelectionFileKind::RuleFile),
            "h" | "hh" | "hpp" | "hxx" if name.contains("linkdef") => {
                Ok(SelectionFileKind::PragmaList)
            }
            _ => Err(RuleError::UnknownFileType(path.display().to_string())),
        }
    }
}

/// Read and parse a selection file.
#[tracing::instrument(level = "debug")]
pub fn load_rules(path: &Path) -> Result<RuleSet, RuleError> {
    let kind = SelectionFileKind::detect(path)?;
    let source = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file = path.display().to_string();
    let rules = match kind {
        SelectionFileKind::PragmaList => parse_pragmas(&source, &file)?,
        SelectionFileKind::RuleFile => parse_rule_file(&source, &file)?,
    };
    info!(file = %file, rules = rules.len(), "selection rules loaded");
    Ok(rules)
}

/// The pragma list used when no selection file is given: one class per
/// input header, named after the header's stem.
pub fn pragma_list_from_headers<S: AsRef<str>>(headers: &[S]) -> String {
    let mut out = String::from("#ifdef __CLING__\n");
    for header in headers {
        let header = header.as_ref();
        let stem = Path::new(header)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        if stem.is_empty() {
            continue;
        }
        out.push_str(&format!("#pragma link C++ class {stem};\n"));
    }
    out.push_str("#endif\n");
    out
}
