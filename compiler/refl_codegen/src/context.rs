//! Code generation context and state.
//!
//! The `CodegenContext` holds the introspection port, the output buffer and
//! the current indentation.

use refl_ir::Introspect;

/// Code generation context.
///
/// Holds all state needed to write dictionary source for one pipeline run.
pub struct CodegenContext<'a, P: Introspect + ?Sized> {
    /// Declaration universe the entities come from.
    pub port: &'a P,
    /// Current indentation level.
    indent: usize,
    /// Generated code output.
    output: String,
}

impl<'a, P: Introspect + ?Sized> CodegenContext<'a, P> {
    /// Create a new codegen context.
    pub fn new(port: &'a P) -> Self {
        Self {
            port,
            indent: 0,
            output: String::with_capacity(4096),
        }
    }

    /// Increase indentation level.
    pub fn indent(&mut self) {
        self.indent += 1;
    }

    /// Decrease indentation level.
    pub fn dedent(&mut self) {
        debug_assert!(self.indent > 0, "dedent called with zero indent");
        self.indent = self.indent.saturating_sub(1);
    }

    /// Write indentation to output.
    pub fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
    }

    /// Write a string to output.
    pub fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    /// Write a line to output (with indentation and newline).
    pub fn writeln(&mut self, s: &str) {
        self.write_indent();
        self.output.push_str(s);
        self.output.push('\n');
    }

    /// Write a newline.
    pub fn newline(&mut self) {
        self.output.push('\n');
    }

    /// Open a `{` block on its own line and indent.
    pub fn open(&mut self, header: &str) {
        if header.is_empty() {
            self.writeln("{");
        } else {
            self.writeln(&format!("{header} {{"));
        }
        self.indent();
    }

    /// Dedent and close the block opened by [`open`](Self::open).
    pub fn close(&mut self, trailer: &str) {
        self.dedent();
        self.writeln(&format!("}}{trailer}"));
    }

    /// Close the current block and open the next one on the same line
    /// (`} else {`).
    pub fn reopen(&mut self, header: &str) {
        self.dedent();
        self.writeln(&format!("}} {header} {{"));
        self.indent();
    }

    /// Write the separator line placed before every top-level function.
    pub fn separator(&mut self) {
        self.writeln(&format!("//{}", "_".repeat(78)));
    }

    /// Take the generated output.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

/// Mangle a type name into an identifier fragment.
///
/// Every character that cannot appear in an identifier is replaced by a
/// fixed two-letter code, so `std::vector<int>` and `std::vector<int*>`
/// never collide.
pub fn mangle(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 8);
    for c in name.chars() {
        let code = match c {
            '+' => "pL",
            '-' => "mI",
            '*' => "mU",
            '/' => "dI",
            '&' => "aN",
            '%' => "pE",
            '|' => "oR",
            '^' => "hA",
            '>' => "gR",
            '<' => "lE",
            '=' => "eQ",
            '~' => "wA",
            '.' => "dO",
            '(' => "oP",
            ')' => "cP",
            '[' => "oB",
            ']' => "cB",
            '!' => "nO",
            ',' => "cO",
            '$' => "dA",
            ' ' => "sP",
            ':' => "cL",
            '"' => "dQ",
            '@' => "aT",
            '\'' => "sQ",
            '\\' => "fI",
            c if c.is_ascii_alphanumeric() || c == '_' => {
                result.push(c);
                continue;
            }
            _ => "_",
        };
        result.push_str(code);
    }
    result
}

/// Quote text as a C string literal.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
