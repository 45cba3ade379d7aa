//! Pragma-list (`LinkDef.h`) parser.
//!
//! Recognized directives:
//!
//! ```text
//! #pragma link C++ class geo::Point3D+;
//! #pragma link off function helper;
//! #pragma link C++ all classes;
//! #pragma link C++ defined_in "Track.h";
//! #pragma create TClass Opaque;
//! #pragma read sourceClass="A" targetClass="A" version="[1-]" code="{ }"
//! #pragma extra_include "Extra.h";
//! ```
//!
//! Lines that are not `#pragma` directives, and pragmas other than
//! `link`, `create`, `read` and `extra_include`, are ignored.

mod lexer;

#[cfg(test)]
mod tests;

use refl_ir::SourceLoc;
use tracing::{debug, trace};

use crate::error::RuleError;
use crate::rule::{
    attr, is_wildcard, new_rule, DeclKinds, Matcher, Polarity, ReadRule, RuleKind, RuleOrigin,
    RuleSet, WildcardPattern,
};
use lexer::{logical_lines, unquote, LogicalLine, RawToken, Token};

/// Parse a pragma list. `file` is only used for locations.
#[tracing::instrument(level = "debug", skip(source))]
pub fn parse_pragmas(source: &str, file: &str) -> Result<RuleSet, RuleError> {
    let mut rules = RuleSet::new(RuleOrigin::PragmaList);
    for line in logical_lines(source) {
        let mut parser = PragmaParser {
            source,
            line: &line,
            pos: 0,
            location: SourceLoc::new(file, line.line),
        };
        parser.directive(&mut rules)?;
    }
    debug!(
        rules = rules.len(),
        read_rules = rules.read_rules.len(),
        "parsed pragma list"
    );
    Ok(rules)
}

struct PragmaParser<'a, 'l> {
    source: &'a str,
    line: &'l LogicalLine<'a>,
    pos: usize,
    location: SourceLoc,
}

/// What a `link` selector word names.
enum Selector {
    Entities { kind: RuleKind, targets: DeclKinds },
    DefinedIn,
    All,
    NoOp,
}

impl Selector {
    fn from_word(word: &str) -> Option<Selector> {
        let entities = |kind: RuleKind, targets: DeclKinds| Selector::Entities { kind, targets };
        Some(match word {
            "class" | "struct" | "union" => entities(RuleKind::Type, DeclKinds::CLASS),
            "namespace" => entities(RuleKind::Type, DeclKinds::NAMESPACE),
            "typedef" => entities(RuleKind::Type, DeclKinds::TYPEDEF),
            "function" => entities(RuleKind::Function, DeclKinds::FUNCTION),
            "global" => entities(RuleKind::Variable, DeclKinds::VARIABLE),
            "enum" => entities(RuleKind::Enum, DeclKinds::ENUM),
            "defined_in" => Selector::DefinedIn,
            "all" => Selector::All,
            "nestedclasses" | "nestedclass" | "nestedtypedefs" | "nestedtypedef" => Selector::NoOp,
            _ => return None,
        })
    }
}

/// `all <what>` groups.
fn all_group(word: &str) -> Option<(RuleKind, DeclKinds)> {
    Some(match word {
        "classes" => (RuleKind::Type, DeclKinds::CLASS),
        "functions" => (RuleKind::Function, DeclKinds::FUNCTION),
        "globals" => (RuleKind::Variable, DeclKinds::VARIABLE),
        "typedefs" => (RuleKind::Type, DeclKinds::TYPEDEF),
        "namespaces" => (RuleKind::Type, DeclKinds::NAMESPACE),
        "enums" => (RuleKind::Enum, DeclKinds::ENUM),
        _ => return None,
    })
}

#[derive(Default)]
struct Modifiers {
    full_streamer: bool,
    no_streamer: bool,
    no_input_operator: bool,
}

impl<'a> PragmaParser<'a, '_> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.line.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let token = self.line.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_word(word)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        RuleError::Pragma {
            location: self.location.clone(),
            message: message.into(),
        }
    }

    fn directive(&mut self, rules: &mut RuleSet) -> Result<(), RuleError> {
        if !self.peek().is_some_and(|t| t.is(RawToken::Hash)) {
            return Ok(());
        }
        self.pos += 1;
        if !self.eat_word("pragma") {
            return Ok(());
        }
        match self.bump() {
            Some(t) if t.is_word("link") => self.link(rules),
            Some(t) if t.is_word("create") => self.create(rules),
            Some(t) if t.is_word("read") => self.read(rules),
            Some(t) if t.is_word("extra_include") => self.extra_include(rules),
            other => {
                trace!(pragma = other.map(|t| t.text), "ignoring pragma");
                Ok(())
            }
        }
    }

    /// `C++` or `off`.
    fn link_polarity(&mut self) -> Result<Polarity, RuleError> {
        if self.eat_word("off") {
            return Ok(Polarity::Exclude);
        }
        if self.eat_word("C")
            && self.bump().is_some_and(|t| t.is(RawToken::Plus))
            && self.bump().is_some_and(|t| t.is(RawToken::Plus))
        {
            return Ok(Polarity::Include);
        }
        Err(self.error("expected `C++` or `off` after `#pragma link`"))
    }

    fn link(&mut self, rules: &mut RuleSet) -> Result<(), RuleError> {
        let polarity = self.link_polarity()?;
        let selector_word = match self.bump() {
            Some(t) if t.is(RawToken::Word) => t.text,
            _ => return Err(self.error("expected a selector after `#pragma link`")),
        };
        let selector = Selector::from_word(selector_word)
            .ok_or_else(|| self.error(format!("unknown selector `{selector_word}`")))?;

        match selector {
            Selector::NoOp => {
                self.rest_until_semi()?;
                Ok(())
            }
            Selector::All => {
                let group = match self.bump() {
                    Some(t) if t.is(RawToken::Word) => t.text,
                    _ => return Err(self.error("expected a group after `all`")),
                };
                let (kind, targets) = all_group(group)
                    .ok_or_else(|| self.error(format!("unknown group `all {group}`")))?;
                self.rest_until_semi()?;
                if polarity == Polarity::Exclude {
                    // Nothing is selected unless asked for.
                    return Ok(());
                }
                let mut rule = new_rule(kind, self.pattern("*")?, polarity, self.location.clone());
                rule.targets = targets;
                rules.push(rule);
                Ok(())
            }
            Selector::DefinedIn => {
                let raw = self.rest_until_semi()?;
                let path = unquote(raw.trim());
                if path.is_empty() {
                    return Err(self.error("`defined_in` needs a file name"));
                }
                let matcher = if is_wildcard(&path) {
                    Matcher::FilePattern(self.compile(&path)?)
                } else {
                    Matcher::FileName(path)
                };
                let mut rule = new_rule(RuleKind::Type, matcher, polarity, self.location.clone());
                rule.targets = DeclKinds::all() - DeclKinds::NAMESPACE;
                rules.push(rule);
                Ok(())
            }
            Selector::Entities { kind, targets } => {
                let raw = self.rest_until_semi()?;
                let (name, modifiers) = self.split_modifiers(raw)?;
                let mut rule =
                    new_rule(kind, self.name_matcher(name)?, polarity, self.location.clone());
                rule.targets = targets;
                if modifiers.full_streamer {
                    rule.attributes.insert(attr::STREAMER_INFO, "true");
                }
                if modifiers.no_streamer {
                    rule.attributes.insert(attr::NO_STREAMER, "true");
                }
                if modifiers.no_input_operator {
                    rule.attributes.insert(attr::NO_INPUT_OPERATOR, "true");
                }
                trace!(rule = %rule, "link pragma");
                rules.push(rule);
                Ok(())
            }
        }
    }

    fn create(&mut self, rules: &mut RuleSet) -> Result<(), RuleError> {
        if !self.eat_word("TClass") {
            return Err(self.error("expected `#pragma create TClass <name>;`"));
        }
        let raw = self.rest_until_semi()?;
        let name = raw.trim();
        if name.is_empty() {
            return Err(self.error("`#pragma create TClass` needs a class name"));
        }
        let mut rule = new_rule(
            RuleKind::Type,
            self.name_matcher(name)?,
            Polarity::Include,
            self.location.clone(),
        );
        rule.targets = DeclKinds::CLASS;
        rule.attributes.insert(attr::METADATA_ONLY, "true");
        rules.push(rule);
        Ok(())
    }

    fn read(&mut self, rules: &mut RuleSet) -> Result<(), RuleError> {
        let mut fields = Vec::new();
        while let Some(token) = self.bump() {
            if token.is(RawToken::Semi) {
                continue;
            }
            if !token.is(RawToken::Word) {
                return Err(self.error(format!("unexpected `{}` in read rule", token.text)));
            }
            let key = token.text;
            if !self.bump().is_some_and(|t| t.is(RawToken::Eq)) {
                return Err(self.error(format!("expected `=` after `{key}`")));
            }
            match self.bump() {
                Some(value) if value.is(RawToken::Str) => {
                    fields.push((key.to_string(), unquote(value.text)));
                }
                _ => return Err(self.error(format!("expected a quoted value for `{key}`"))),
            }
        }

        let mut take = |key: &str| {
            fields
                .iter()
                .position(|(k, _)| k == key)
                .map(|index| fields.remove(index).1)
        };
        let source_class = take("sourceClass");
        let target_class = take("targetClass");
        let code = take("code").unwrap_or_default();
        let (Some(source_class), Some(target_class)) = (source_class, target_class) else {
            return Err(self.error("read rules need `sourceClass` and `targetClass`"));
        };
        rules.read_rules.push(ReadRule {
            source_class,
            target_class,
            fields,
            code,
            location: self.location.clone(),
        });
        Ok(())
    }

    fn extra_include(&mut self, rules: &mut RuleSet) -> Result<(), RuleError> {
        let raw = self.rest_until_semi()?;
        let header = raw.trim();
        let header = header
            .strip_prefix('<')
            .and_then(|h| h.strip_suffix('>'))
            .map_or_else(|| unquote(header), str::to_string);
        if header.is_empty() {
            return Err(self.error("`extra_include` needs a header"));
        }
        rules.extra_includes.push(header);
        Ok(())
    }

    /// Source text from the current token up to the terminating `;`.
    fn rest_until_semi(&mut self) -> Result<&'a str, RuleError> {
        let source = self.source;
        let start = self.peek().map(|t| t.start);
        while let Some(token) = self.peek() {
            if token.is(RawToken::Semi) {
                let end = token.start;
                self.pos += 1;
                if let Some(extra) = self.peek() {
                    return Err(self.error(format!("unexpected `{}` after `;`", extra.text)));
                }
                return Ok(start.map_or("", |start| &source[start..end]));
            }
            self.pos += 1;
        }
        Err(self.error("missing `;`"))
    }

    /// Peel the trailing `+`, `-`, `!` run off a selector name.
    fn split_modifiers(&self, raw: &'a str) -> Result<(&'a str, Modifiers), RuleError> {
        let raw = raw.trim();
        let name = raw.trim_end_matches(['+', '-', '!', ' ', '\t']);
        let mut modifiers = Modifiers::default();
        for c in raw[name.len()..].chars() {
            match c {
                '+' => modifiers.full_streamer = true,
                '-' => modifiers.no_streamer = true,
                '!' => modifiers.no_input_operator = true,
                _ => {}
            }
        }
        if name.is_empty() {
            return Err(self.error("missing name"));
        }
        if let Some(last) = name.chars().last() {
            if !is_name_end(last) {
                return Err(self.error(format!("unknown modifier `{last}` on `{name}`")));
            }
        }
        if modifiers.full_streamer && modifiers.no_streamer {
            return Err(RuleError::ConflictingModifiers {
                location: self.location.clone(),
                name: name.to_string(),
            });
        }
        Ok((name, modifiers))
    }

    fn name_matcher(&self, name: &str) -> Result<Matcher, RuleError> {
        let name = unquote(name.trim());
        if is_wildcard(&name) {
            self.pattern(&name)
        } else {
            Ok(Matcher::Name(name))
        }
    }

    fn pattern(&self, source: &str) -> Result<Matcher, RuleError> {
        Ok(Matcher::Pattern(self.compile(source)?))
    }

    fn compile(&self, source: &str) -> Result<WildcardPattern, RuleError> {
        WildcardPattern::new(source).map_err(|err| RuleError::Pattern {
            location: self.location.clone(),
            pattern: source.to_string(),
            message: err.msg.to_string(),
        })
    }
}

/// Characters a type, function or variable spelling can end with.
fn is_name_end(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '>' | '*' | '?' | ')' | ']' | '"' | '&')
}
