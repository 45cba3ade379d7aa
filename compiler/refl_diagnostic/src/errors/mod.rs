//! Embedded error documentation for `refl explain`.
//!
//! Each entry explains an error code, what triggers it, and how to fix it.

use crate::ErrorCode;

/// Registry of embedded error documentation.
pub struct ErrorDocs;

impl ErrorDocs {
    /// Get the documentation for an error code.
    pub fn get(code: ErrorCode) -> Option<&'static str> {
        DOCS.iter().find(|(c, _)| *c == code).map(|(_, doc)| *doc)
    }

    pub fn all_codes() -> impl Iterator<Item = ErrorCode> {
        DOCS.iter().map(|(code, _)| *code)
    }

    pub fn has_docs(code: ErrorCode) -> bool {
        DOCS.iter().any(|(c, _)| *c == code)
    }
}

static DOCS: &[(ErrorCode, &str)] = &[
    (
        ErrorCode::E0001,
        "E0001: malformed pragma directive\n\n\
         A `#pragma link`, `#pragma create`, `#pragma read` or\n\
         `#pragma extra_include` line in the selection file could not be\n\
         parsed. Every directive ends with `;`:\n\n\
         \x20   #pragma link C++ class geo::Point3D+;\n",
    ),
    (
        ErrorCode::E0002,
        "E0002: unknown selection file type\n\n\
         Selection files are either pragma lists (`LinkDef.h`,\n\
         `*_linkdef.h`) or declarative XML files (`*.xml`).\n",
    ),
    (
        ErrorCode::E0003,
        "E0003: malformed declarative rule file\n\n\
         The XML rule file is not well formed or uses an element outside\n\
         `selection`/`exclusion` blocks. Supported elements: class, struct,\n\
         namespace, typedef, function, variable, enum, field, method, ioread.\n",
    ),
    (
        ErrorCode::E0004,
        "E0004: invalid wildcard pattern\n\n\
         Patterns use shell-style `*` and `?`, anchored to the fully\n\
         qualified name.\n",
    ),
    (
        ErrorCode::E0005,
        "E0005: conflicting selection modifiers\n\n\
         `+` requests the schema-driven streamer and `-` suppresses the\n\
         streamer; a rule cannot ask for both.\n",
    ),
    (
        ErrorCode::E1001,
        "E1001: selected declaration has no definition\n\n\
         Only a forward declaration of the type is visible. The type is\n\
         skipped for code generation but still listed in the index.\n\
         Include the header that defines it.\n",
    ),
    (
        ErrorCode::E1002,
        "E1002: selected class has an incomplete base\n\n\
         A base class is only forward declared, so the layout of the\n\
         selected class is unknown. The class is skipped for code\n\
         generation but still listed in the index.\n",
    ),
    (
        ErrorCode::E1003,
        "E1003: selection rule matched nothing\n\n\
         No declaration matched the rule, or everything it matched was\n\
         rejected as incomplete. Check the spelling and the headers.\n",
    ),
    (
        ErrorCode::E1004,
        "E1004: unsupported standard type selected\n\n\
         `regex`, `thread`, `chrono::` types, `ratio<>` and `shared_ptr<>`\n\
         cannot be streamed. Remove the selection or mark the member\n\
         transient.\n",
    ),
    (
        ErrorCode::E1005,
        "E1005: selection is unnecessary\n\n\
         `array<>` and `unique_ptr<>` instances are handled without a\n\
         dictionary entry of their own. Remove the selection.\n",
    ),
    (
        ErrorCode::E1006,
        "E1006: container of an unsupported numeric alias\n\n\
         Containers of `bool` (`vector<bool>`) use a packed layout that the\n\
         element-wise streamer does not reproduce exactly.\n",
    ),
    (
        ErrorCode::E2001,
        "E2001: pointer to fundamental without a length field\n\n\
         A pointer to a fundamental type is streamed as an array whose\n\
         length is held in an integer member declared before it. Name\n\
         that member in the comment:\n\n\
         \x20   int     fN;\n\
         \x20   float  *fData; //[fN]\n",
    ),
    (
        ErrorCode::E2002,
        "E2002: invalid array length field\n\n\
         The member named in a `//[...]` comment must exist, be an integer\n\
         and be declared before the pointer it sizes.\n",
    ),
    (
        ErrorCode::E2003,
        "E2003: pointer-to-pointer member\n\n\
         Members such as `float **` have no defined on-disk layout. Mark\n\
         the member transient (`//!`) or write a custom streamer.\n",
    ),
    (
        ErrorCode::E2004,
        "E2004: array of pointers to fundamental\n\n\
         Fixed arrays of pointers to fundamentals need a custom streamer.\n",
    ),
    (
        ErrorCode::E2005,
        "E2005: class must declare its own streamer\n\n\
         The class derives from a versioned class but declares no version\n\
         of its own, so its data members would not be stored. Declare a\n\
         version or opt out with the `-` modifier / `noStreamer`.\n",
    ),
    (
        ErrorCode::E2006,
        "E2006: inconsistent custom buffer operators\n\n\
         With `!` / `noInputOperator` both custom buffer operators must be\n\
         provided or neither. Without it, a custom `operator>>` would\n\
         clash with the generated one.\n",
    ),
    (
        ErrorCode::E2007,
        "E2007: unsupported string member shape\n\n\
         Arrays of pointers to strings are not streamed; the member is\n\
         skipped.\n",
    ),
    (
        ErrorCode::E2008,
        "E2008: container element cannot be streamed\n\n\
         The element type of a container member is a pointer to a\n\
         fundamental, a container of pointers to containers, or unknown.\n",
    ),
    (
        ErrorCode::E3001,
        "E3001: malformed index file\n\n\
         A rootmap file listed for dependency resolution could not be\n\
         parsed.\n",
    ),
    (
        ErrorCode::E3002,
        "E3002: index requested without a library list\n\n\
         Pass the owning library with `--rootmap-lib` or `-s`.\n",
    ),
    (
        ErrorCode::E9001,
        "E9001: duplicate normalized name\n\n\
         Two distinct declarations normalize to the same name. Continuing\n\
         would corrupt the index, so the run aborts.\n",
    ),
    (
        ErrorCode::E9002,
        "E9002: I/O failure\n\n\
         An input could not be read or an output could not be written or\n\
         renamed into place. All outputs of the run are rolled back.\n",
    ),
    (
        ErrorCode::E9003,
        "E9003: internal pipeline error\n\n\
         The pipeline was driven out of order. This is a bug.\n",
    ),
];
