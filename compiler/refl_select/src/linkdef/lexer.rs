//! Tokenizer for pragma lists.
//!
//! The lexer only has to recognize enough structure to find `#pragma`
//! lines and their directive words. Selector names are sliced out of the
//! source by span so that template spellings survive untouched.

use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
pub(crate) enum RawToken {
    #[regex(r"//[^\n]*")]
    LineComment,

    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,

    #[token("\n")]
    Newline,

    #[regex(r"\\[ \t]*\r?\n")]
    LineContinuation,

    #[token("#")]
    Hash,
    #[token(";")]
    Semi,
    #[token("=")]
    Eq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("!")]
    Bang,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Word,
}

/// A token with the text it covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TokenKind {
    Raw(RawToken),
    /// Any character the grammar gives no meaning to (`<`, `:`, `*`, ...).
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    pub fn is(&self, raw: RawToken) -> bool {
        self.kind == TokenKind::Raw(raw)
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.is(RawToken::Word) && self.text == word
    }
}

/// One logical line: a physical line plus its continuations, without
/// comments or line breaks.
#[derive(Debug)]
pub(crate) struct LogicalLine<'a> {
    /// 1-based line of the first token.
    pub line: u32,
    pub tokens: Vec<Token<'a>>,
}

/// Split `source` into logical lines.
pub(crate) fn logical_lines(source: &str) -> Vec<LogicalLine<'_>> {
    let mut lines = Vec::new();
    let mut current = LogicalLine {
        line: 1,
        tokens: Vec::new(),
    };
    let mut line: u32 = 1;

    let mut lexer = RawToken::lexer(source);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let text = lexer.slice();
        match result {
            Ok(RawToken::Newline) => {
                line += 1;
                let next = LogicalLine {
                    line,
                    tokens: Vec::new(),
                };
                let done = std::mem::replace(&mut current, next);
                if !done.tokens.is_empty() {
                    lines.push(done);
                }
            }
            Ok(RawToken::LineContinuation) => line += 1,
            Ok(RawToken::LineComment) => {}
            Ok(RawToken::BlockComment) => line += newlines(text),
            Ok(raw) => {
                if current.tokens.is_empty() {
                    current.line = line;
                }
                current.tokens.push(Token {
                    kind: TokenKind::Raw(raw),
                    text,
                    start: span.start,
                    end: span.end,
                });
            }
            Err(()) => {
                if current.tokens.is_empty() {
                    current.line = line;
                }
                current.tokens.push(Token {
                    kind: TokenKind::Other,
                    text,
                    start: span.start,
                    end: span.end,
                });
            }
        }
    }
    if !current.tokens.is_empty() {
        lines.push(current);
    }
    lines
}

fn newlines(text: &str) -> u32 {
    u32::try_from(text.bytes().filter(|b| *b == b'\n').count()).unwrap_or(u32::MAX)
}

/// Strip the quotes of a string literal and resolve backslash escapes.
pub(crate) fn unquote(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &LogicalLine<'_>) -> Vec<TokenKind> {
        line.tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn comments_and_blank_lines_vanish() {
        let lines = logical_lines("// header\n\n/* a\n b */ #pragma once\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line, 4);
        assert_eq!(lines[0].tokens[0].text, "#");
        assert_eq!(lines[0].tokens[2].text, "once");
    }

    #[test]
    fn continuation_joins_lines() {
        let lines = logical_lines("#pragma link C++ \\\n  class A;\nint x;\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line, 1);
        assert!(lines[0].tokens.iter().any(|t| t.is_word("class")));
        assert_eq!(lines[1].line, 3);
    }

    #[test]
    fn unknown_characters_are_kept() {
        let lines = logical_lines("A<int>*;");
        assert_eq!(
            kinds(&lines[0]),
            vec![
                TokenKind::Raw(RawToken::Word),
                TokenKind::Other,
                TokenKind::Raw(RawToken::Word),
                TokenKind::Other,
                TokenKind::Other,
                TokenKind::Raw(RawToken::Semi),
            ]
        );
    }

    #[test]
    fn string_literals_keep_escaped_quotes() {
        let lines = logical_lines(r#"code="{ s = \"x\"; }""#);
        let literal = lines[0].tokens[2];
        assert!(literal.is(RawToken::Str));
        assert_eq!(unquote(literal.text), r#"{ s = "x"; }"#);
    }
}
