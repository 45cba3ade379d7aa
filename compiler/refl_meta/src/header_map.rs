//! The header map embedded in the module registration.
//!
//! One line per autoload key: the quoted key, its headers (or the inline
//! payload sentinel), and the `"@"` end-of-entry marker. The whole map ends
//! with `nullptr`.

use std::collections::BTreeMap;

/// Identifier the registration code defines for the inline header payload.
pub const PAYLOAD_SENTINEL: &str = "payloadCode";

/// Marks the end of one key's header list.
const END_OF_ENTRY: &str = "\"@\"";

/// Render the header map.
///
/// With `inline_payload` every key points at the payload instead of its
/// headers. Keys come out sorted.
pub fn header_map_string(decls: &BTreeMap<String, Vec<String>>, inline_payload: bool) -> String {
    let mut out = String::new();
    for (key, headers) in decls {
        if key.is_empty() {
            continue;
        }
        out.push_str(&quoted(key));
        out.push_str(", ");
        if inline_payload {
            out.push_str(PAYLOAD_SENTINEL);
            out.push_str(", ");
        } else {
            for header in headers {
                out.push_str(&quoted(header));
                out.push_str(", ");
            }
        }
        out.push_str(END_OF_ENTRY);
        out.push_str(",\n");
    }
    out.push_str("nullptr\n");
    out
}

fn quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
