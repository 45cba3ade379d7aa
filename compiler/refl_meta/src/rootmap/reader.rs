use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use super::unescape_legacy_key;
use crate::error::IndexError;

/// Autoload key to the libraries that provide it, read from index files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutoloadMap {
    entries: BTreeMap<String, String>,
}

/// Keywords of the key lines of the block format.
const KEY_KEYWORDS: &[&str] = &["class ", "namespace ", "typedef ", "enum ", "var "];

impl AutoloadMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Read every index file named in a list file (whitespace separated).
    /// Directories in the list are skipped.
    pub fn load_list(list: &Path) -> Result<AutoloadMap, IndexError> {
        let text = std::fs::read_to_string(list).map_err(|source| IndexError::io(list, source))?;
        let mut map = AutoloadMap::new();
        for name in text.split_whitespace() {
            let path = Path::new(name);
            if path.is_dir() {
                continue;
            }
            map.load(path)?;
        }
        debug!(keys = map.len(), "autoload map loaded");
        Ok(map)
    }

    /// Read one index file, in either format.
    pub fn load(&mut self, path: &Path) -> Result<(), IndexError> {
        let text = std::fs::read_to_string(path).map_err(|source| IndexError::io(path, source))?;
        self.parse(&text, &path.display().to_string())
    }

    /// Parse index text into the map. Later files override earlier keys.
    pub fn parse(&mut self, text: &str, file: &str) -> Result<(), IndexError> {
        let is_block = text
            .split_whitespace()
            .next()
            .is_some_and(|token| token.starts_with('[') || token.starts_with('{'));
        if is_block {
            self.parse_block(text, file)
        } else {
            self.parse_legacy(text, file)
        }
    }

    fn parse_block(&mut self, text: &str, file: &str) -> Result<(), IndexError> {
        let mut libraries: Option<String> = None;
        let mut in_decls = false;
        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            if line == "{ decls }" {
                in_decls = true;
                continue;
            }
            if in_decls {
                if !line.starts_with('[') {
                    continue;
                }
                in_decls = false;
            }
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') || line.starts_with("header ") {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let Some(end) = rest.find(']') else {
                    return Err(malformed(file, line_no, "library section without `]`"));
                };
                libraries = Some(rest[..end].trim().to_string());
                continue;
            }
            let Some(key) = KEY_KEYWORDS
                .iter()
                .find_map(|keyword| line.strip_prefix(keyword))
            else {
                return Err(malformed(file, line_no, &format!("unexpected line `{line}`")));
            };
            let Some(libs) = &libraries else {
                return Err(malformed(file, line_no, "key before any library section"));
            };
            let key = key.trim().to_string();
            self.add_enclosing_namespaces(&key);
            self.entries.insert(key, libs.clone());
        }
        Ok(())
    }

    fn parse_legacy(&mut self, text: &str, file: &str) -> Result<(), IndexError> {
        for (index, line) in text.lines().enumerate() {
            let Some(rest) = line.trim_start().strip_prefix("Library.") else {
                continue;
            };
            let Some((key, libs)) = rest.split_once(':') else {
                return Err(malformed(file, index + 1, "`Library.` entry without `:`"));
            };
            let key = unescape_legacy_key(key);
            self.add_enclosing_namespaces(&key);
            self.entries.insert(key, libs.trim().to_string());
        }
        Ok(())
    }

    /// Namespaces enclosing a key are known but never loaded on their own:
    /// they map to no library. Template arguments and `std` are not
    /// namespaces of the key.
    fn add_enclosing_namespaces(&mut self, key: &str) {
        let bytes = key.as_bytes();
        let mut k = 0;
        while k < bytes.len() {
            match bytes[k] {
                b'<' => break,
                b':' => {
                    if bytes.get(k + 1) != Some(&b':') {
                        break;
                    }
                    if k > 0 {
                        let base = &key[..k];
                        if base == "std" {
                            break;
                        }
                        self.entries.entry(base.to_string()).or_default();
                    }
                    k += 1;
                }
                _ => {}
            }
            k += 1;
        }
    }
}

fn malformed(file: &str, line: usize, message: &str) -> IndexError {
    IndexError::Malformed {
        file: file.to_string(),
        line,
        message: message.to_string(),
    }
}
