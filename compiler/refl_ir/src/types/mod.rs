//! Type expressions as they are spelled in declarations.
//!
//! A `TypeRef` is the structural view the code generator needs: which
//! fundamental it is, how many pointer levels, which fixed array extents.
//! Class, enum and typedef names stay opaque strings (`TypeRef::Named`) and
//! are resolved through the [`Introspect`](crate::Introspect) port.

use std::fmt;

use thiserror::Error;

/// Built-in arithmetic types, including the narrowed pseudo-typedefs.
///
/// `Float16` and `Double32` are spelled `Float16_t`/`Double32_t` in
/// declarations. In memory they are `float`/`double`; on the wire they are
/// stored with reduced precision.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fundamental {
    Bool,
    Char,
    SignedChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    Float16,
    Double32,
}

impl Fundamental {
    pub const ALL: [Fundamental; 16] = [
        Fundamental::Bool,
        Fundamental::Char,
        Fundamental::SignedChar,
        Fundamental::UChar,
        Fundamental::Short,
        Fundamental::UShort,
        Fundamental::Int,
        Fundamental::UInt,
        Fundamental::Long,
        Fundamental::ULong,
        Fundamental::LongLong,
        Fundamental::ULongLong,
        Fundamental::Float,
        Fundamental::Double,
        Fundamental::Float16,
        Fundamental::Double32,
    ];

    /// Canonical spelling used in generated code and normalized names.
    pub fn spelling(self) -> &'static str {
        match self {
            Fundamental::Bool => "bool",
            Fundamental::Char => "char",
            Fundamental::SignedChar => "signed char",
            Fundamental::UChar => "unsigned char",
            Fundamental::Short => "short",
            Fundamental::UShort => "unsigned short",
            Fundamental::Int => "int",
            Fundamental::UInt => "unsigned int",
            Fundamental::Long => "long",
            Fundamental::ULong => "unsigned long",
            Fundamental::LongLong => "long long",
            Fundamental::ULongLong => "unsigned long long",
            Fundamental::Float => "float",
            Fundamental::Double => "double",
            Fundamental::Float16 => "Float16_t",
            Fundamental::Double32 => "Double32_t",
        }
    }

    /// Recognize a sequence of fundamental keywords (`unsigned long int`).
    ///
    /// Keyword order matters only as far as C++ itself cares; the common
    /// spellings are accepted.
    pub fn from_words(words: &[&str]) -> Option<Fundamental> {
        let joined = words.join(" ");
        let fundamental = match joined.as_str() {
            "bool" => Fundamental::Bool,
            "char" => Fundamental::Char,
            "signed char" => Fundamental::SignedChar,
            "unsigned char" => Fundamental::UChar,
            "short" | "short int" | "signed short" | "signed short int" => Fundamental::Short,
            "unsigned short" | "unsigned short int" => Fundamental::UShort,
            "int" | "signed" | "signed int" => Fundamental::Int,
            "unsigned" | "unsigned int" => Fundamental::UInt,
            "long" | "long int" | "signed long" | "signed long int" => Fundamental::Long,
            "unsigned long" | "unsigned long int" => Fundamental::ULong,
            "long long" | "long long int" | "signed long long" | "signed long long int" => {
                Fundamental::LongLong
            }
            "unsigned long long" | "unsigned long long int" => Fundamental::ULongLong,
            "float" => Fundamental::Float,
            "double" => Fundamental::Double,
            "Float16_t" => Fundamental::Float16,
            "Double32_t" => Fundamental::Double32,
            _ => return None,
        };
        Some(fundamental)
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            Fundamental::Float | Fundamental::Double | Fundamental::Float16 | Fundamental::Double32
        )
    }

    /// Reduced-precision variants that need the narrowed transfer calls.
    pub fn is_narrowed(self) -> bool {
        matches!(self, Fundamental::Float16 | Fundamental::Double32)
    }

    /// The in-memory type a narrowed variant stands for.
    pub fn storage(self) -> Fundamental {
        match self {
            Fundamental::Float16 => Fundamental::Float,
            Fundamental::Double32 => Fundamental::Double,
            other => other,
        }
    }
}

impl fmt::Display for Fundamental {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

/// A parsed type expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Fundamental(Fundamental),
    /// A class, enum, or typedef name, possibly a template instance.
    ///
    /// Stored with canonical spacing (see [`canonical_spelling`]).
    Named(String),
    Pointer(Box<TypeRef>),
    Reference(Box<TypeRef>),
    Const(Box<TypeRef>),
    /// Fixed-extent array. `float[3][4]` is `Array(Array(float, 4), 3)`.
    Array(Box<TypeRef>, u64),
}

impl TypeRef {
    /// Parse a C++ type spelling such as `const std::vector<int>*` or
    /// `Double32_t[3][4]`.
    pub fn parse(spelling: &str) -> Result<TypeRef, TypeParseError> {
        let mut cursor = Cursor::new(spelling);
        let ty = cursor.parse_type()?;
        cursor.skip_ws();
        if cursor.at_end() {
            Ok(ty)
        } else {
            Err(TypeParseError::Trailing {
                spelling: spelling.to_string(),
                rest: cursor.rest().to_string(),
            })
        }
    }

    pub fn named(name: impl AsRef<str>) -> TypeRef {
        TypeRef::Named(canonical_spelling(name.as_ref()))
    }

    pub fn pointer_to(inner: TypeRef) -> TypeRef {
        TypeRef::Pointer(Box::new(inner))
    }

    pub fn array_of(inner: TypeRef, len: u64) -> TypeRef {
        TypeRef::Array(Box::new(inner), len)
    }

    /// Strip top-level `const` and reference qualifiers.
    pub fn unqualified(&self) -> &TypeRef {
        match self {
            TypeRef::Const(inner) | TypeRef::Reference(inner) => inner.unqualified(),
            other => other,
        }
    }

    pub fn is_const(&self) -> bool {
        match self {
            TypeRef::Const(_) => true,
            TypeRef::Reference(inner) => inner.is_const(),
            _ => false,
        }
    }

    /// The type left after removing every qualifier, pointer and array level.
    pub fn innermost(&self) -> &TypeRef {
        match self {
            TypeRef::Const(inner)
            | TypeRef::Reference(inner)
            | TypeRef::Pointer(inner)
            | TypeRef::Array(inner, _) => inner.innermost(),
            other => other,
        }
    }

    /// Name of the innermost named type, if any.
    pub fn innermost_name(&self) -> Option<&str> {
        match self.innermost() {
            TypeRef::Named(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_fundamental(&self) -> Option<Fundamental> {
        match self.unqualified() {
            TypeRef::Fundamental(f) => Some(*f),
            _ => None,
        }
    }

    /// Split off fixed array extents, outermost first.
    pub fn array_dims(&self) -> (Vec<u64>, &TypeRef) {
        let mut dims = Vec::new();
        let mut current = self.unqualified();
        while let TypeRef::Array(inner, len) = current {
            dims.push(*len);
            current = inner.unqualified();
        }
        (dims, current)
    }

    /// Count pointer levels, looking through `const`.
    pub fn pointer_depth(&self) -> usize {
        match self.unqualified() {
            TypeRef::Pointer(inner) => 1 + inner.pointer_depth(),
            _ => 0,
        }
    }

    /// The pointee of a pointer type.
    pub fn pointee(&self) -> Option<&TypeRef> {
        match self.unqualified() {
            TypeRef::Pointer(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Fundamental(fund) => write!(f, "{fund}"),
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::Pointer(inner) => write!(f, "{inner}*"),
            TypeRef::Reference(inner) => write!(f, "{inner}&"),
            TypeRef::Const(inner) => match inner.as_ref() {
                TypeRef::Pointer(_) => write!(f, "{inner} const"),
                _ => write!(f, "const {inner}"),
            },
            TypeRef::Array(..) => {
                let (dims, elem) = self.array_dims();
                write!(f, "{elem}")?;
                for dim in dims {
                    write!(f, "[{dim}]")?;
                }
                Ok(())
            }
        }
    }
}

/// Errors produced while parsing a type spelling.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TypeParseError {
    #[error("empty type spelling")]
    Empty,
    #[error("unbalanced angle brackets in `{0}`")]
    Unbalanced(String),
    #[error("invalid array extent in `{0}`")]
    BadExtent(String),
    #[error("unexpected `{rest}` after type in `{spelling}`")]
    Trailing { spelling: String, rest: String },
}

const FUNDAMENTAL_WORDS: &[&str] = &[
    "bool", "char", "signed", "unsigned", "short", "int", "long", "float", "double",
];

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Canonical spacing for a spelled name.
///
/// Whitespace survives only between two identifier characters
/// (`unsigned int`), and nested closing brackets are written `> >`.
pub fn canonical_spelling(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.trim().chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            if out.chars().next_back().is_some_and(is_ident_char) && is_ident_char(c) {
                out.push(' ');
            }
            pending_space = false;
        }
        if c == '>' && out.ends_with('>') {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

/// Split `base<args...>` into its template name and top-level arguments.
///
/// Only a trailing argument list is split, so `A<int>::B` is not a template
/// instance. Arguments are trimmed but otherwise left as spelled.
pub fn split_template(name: &str) -> Option<(&str, Vec<&str>)> {
    let name = name.trim();
    if !name.ends_with('>') {
        return None;
    }
    let mut depth = 0usize;
    let mut open = None;
    for (idx, c) in name.char_indices().rev() {
        match c {
            '>' => depth += 1,
            '<' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    open = Some(idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let open = open?;
    let base = name[..open].trim_end();
    if base.is_empty() {
        return None;
    }
    let inner = &name[open + 1..name.len() - 1];
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in inner.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(inner[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    let last = inner[start..].trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last);
    }
    Some((base, args))
}

/// Split a qualified name on `::` separators that are not inside a
/// template argument list.
pub fn split_scopes(name: &str) -> Vec<&str> {
    let bytes = name.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(idx + 1) == Some(&b':') => {
                if idx > start {
                    parts.push(&name[start..idx]);
                }
                start = idx + 2;
                idx += 1;
            }
            _ => {}
        }
        idx += 1;
    }
    if start < name.len() {
        parts.push(&name[start..]);
    }
    parts
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Cursor { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    /// Peek at the next identifier without consuming it.
    fn peek_word(&self) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        if self.peek_word() == Some(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef, TypeParseError> {
        let mut is_const = self.eat_keyword("const");
        let base = self.parse_base()?;
        if self.eat_keyword("const") {
            is_const = true;
        }
        let mut ty = if is_const {
            TypeRef::Const(Box::new(base))
        } else {
            base
        };

        let mut dims = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    ty = TypeRef::Pointer(Box::new(ty));
                    if self.eat_keyword("const") {
                        ty = TypeRef::Const(Box::new(ty));
                    }
                }
                Some('&') => {
                    self.pos += 1;
                    if self.peek() == Some('&') {
                        self.pos += 1;
                    }
                    ty = TypeRef::Reference(Box::new(ty));
                }
                Some('[') => {
                    let close = self
                        .rest()
                        .find(']')
                        .ok_or_else(|| TypeParseError::BadExtent(self.src.to_string()))?;
                    let extent = self.rest()[1..close].trim();
                    let len = extent
                        .parse::<u64>()
                        .map_err(|_| TypeParseError::BadExtent(self.src.to_string()))?;
                    dims.push(len);
                    self.pos += close + 1;
                }
                _ => break,
            }
        }
        for len in dims.into_iter().rev() {
            ty = TypeRef::Array(Box::new(ty), len);
        }
        Ok(ty)
    }

    fn parse_base(&mut self) -> Result<TypeRef, TypeParseError> {
        self.skip_ws();
        let Some(first) = self.peek_word() else {
            if self.rest().starts_with("::") {
                self.pos += 2;
                return self.parse_base();
            }
            return Err(TypeParseError::Empty);
        };

        if FUNDAMENTAL_WORDS.contains(&first) {
            let mut words = Vec::new();
            loop {
                self.skip_ws();
                match self.peek_word() {
                    Some(word) if FUNDAMENTAL_WORDS.contains(&word) => {
                        words.push(word);
                        self.pos += word.len();
                    }
                    _ => break,
                }
            }
            return Fundamental::from_words(&words)
                .map(TypeRef::Fundamental)
                .ok_or_else(|| TypeParseError::Trailing {
                    spelling: self.src.to_string(),
                    rest: words.join(" "),
                });
        }

        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '<' => depth += 1,
                '>' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                ':' if self.rest().starts_with("::") => {
                    self.pos += 1;
                }
                _ if depth > 0 => {}
                c if is_ident_char(c) => {}
                c if c.is_whitespace() => {
                    // A space at depth 0 ends the name unless `::` follows.
                    let after = self.rest().trim_start();
                    if !after.starts_with("::") {
                        break;
                    }
                }
                _ => break,
            }
            self.pos += c.len_utf8();
        }
        if depth != 0 {
            return Err(TypeParseError::Unbalanced(self.src.to_string()));
        }
        let raw = self.src[start..self.pos].trim();
        let raw = raw.strip_prefix("::").unwrap_or(raw);
        if raw.is_empty() {
            return Err(TypeParseError::Empty);
        }
        match raw {
            "Float16_t" => Ok(TypeRef::Fundamental(Fundamental::Float16)),
            "Double32_t" => Ok(TypeRef::Fundamental(Fundamental::Double32)),
            _ => Ok(TypeRef::Named(canonical_spelling(raw))),
        }
    }
}
