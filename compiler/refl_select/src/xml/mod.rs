//! Declarative rule-file parser.
//!
//! ```xml
//! <lcgdict>
//!   <selection>
//!     <class name="Track" noInputOperator="true">
//!       <field name="fCache" transient="true"/>
//!     </class>
//!     <class pattern="geo::*"/>
//!     <function name="geo::area"/>
//!   </selection>
//!   <exclusion>
//!     <class name="Track"><method name="Draw"/></class>
//!   </exclusion>
//!   <ioread sourceClass="Track" targetClass="Track" version="[1-]">
//!     <![CDATA[ fMomentum = onfile.fPt; ]]>
//!   </ioread>
//! </lcgdict>
//! ```

#[cfg(test)]
mod tests;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use refl_ir::SourceLoc;
use tracing::debug;

use crate::error::RuleError;
use crate::rule::{
    is_wildcard, new_rule, Attributes, DeclKinds, Matcher, MemberKind, MemberRule, Polarity,
    ReadRule, RuleKind, RuleOrigin, RuleSet, SelectionRule, WildcardPattern,
};

/// Attributes that pick what a rule matches rather than annotate it.
const MATCHER_KEYS: [&str; 4] = ["name", "pattern", "file_name", "file_pattern"];

/// Where the reader currently is in the document.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Block {
    Root,
    Dict,
    Rules(Polarity),
    /// Inside a `<class>`; its rule is the last one pushed.
    Class(Polarity),
    Member,
    IoRead,
}

/// Parse an XML rule file. `file` is only used for locations.
#[tracing::instrument(level = "debug", skip(source))]
pub fn parse_rule_file(source: &str, file: &str) -> Result<RuleSet, RuleError> {
    let mut parser = XmlParser {
        source,
        file,
        rules: RuleSet::new(RuleOrigin::RuleFile),
        stack: vec![Block::Root],
        pending: None,
        io_read: None,
    };
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);

    loop {
        let position = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
        let event = reader.read_event().map_err(|err| RuleError::Xml {
            location: parser.location(position),
            message: err.to_string(),
        })?;
        match event {
            Event::Start(ref start) => parser.open(start, position, true)?,
            Event::Empty(ref start) => parser.open(start, position, false)?,
            Event::End(_) => parser.close(),
            Event::Text(ref text) => {
                let text = text.unescape().map_err(|err| RuleError::Xml {
                    location: parser.location(position),
                    message: err.to_string(),
                })?;
                parser.text(&text, position)?;
            }
            Event::CData(ref cdata) => {
                let text = String::from_utf8_lossy(cdata.as_ref()).into_owned();
                parser.text(&text, position)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if parser.stack.len() > 1 {
        return Err(RuleError::Xml {
            location: parser.location(source.len()),
            message: "unexpected end of file".to_string(),
        });
    }
    debug!(
        rules = parser.rules.len(),
        read_rules = parser.rules.read_rules.len(),
        "parsed rule file"
    );
    Ok(parser.rules)
}

struct XmlParser<'a> {
    source: &'a str,
    file: &'a str,
    rules: RuleSet,
    stack: Vec<Block>,
    /// A `<class>` whose members are still being read.
    pending: Option<SelectionRule>,
    io_read: Option<ReadRule>,
}

impl XmlParser<'_> {
    fn location(&self, position: usize) -> SourceLoc {
        let end = position.min(self.source.len());
        // Events start after the whitespace that trails the previous one.
        let end = self
            .source
            .get(end..)
            .map_or(end, |rest| end + rest.len() - rest.trim_start().len());
        let line = self.source.as_bytes()[..end]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1;
        SourceLoc::new(self.file, u32::try_from(line).unwrap_or(u32::MAX))
    }

    fn error(&self, position: usize, message: impl Into<String>) -> RuleError {
        RuleError::Xml {
            location: self.location(position),
            message: message.into(),
        }
    }

    fn current(&self) -> Block {
        self.stack.last().copied().unwrap_or(Block::Root)
    }

    fn attributes(
        &self,
        start: &BytesStart<'_>,
        position: usize,
    ) -> Result<Vec<(String, String)>, RuleError> {
        let mut out = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|err| self.error(position, err.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|err| self.error(position, err.to_string()))?
                .into_owned();
            out.push((key, value));
        }
        Ok(out)
    }

    fn open(
        &mut self,
        start: &BytesStart<'_>,
        position: usize,
        has_body: bool,
    ) -> Result<(), RuleError> {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attributes = self.attributes(start, position)?;
        let block = match (self.current(), tag.as_str()) {
            (Block::Root, "lcgdict") => Block::Dict,
            (Block::Root | Block::Dict, "selection") => Block::Rules(Polarity::Include),
            (Block::Root | Block::Dict, "exclusion") => Block::Rules(Polarity::Exclude),
            (Block::Root | Block::Dict, "ioread" | "read") => {
                self.io_read = Some(self.read_rule(&attributes, position)?);
                Block::IoRead
            }
            (Block::Rules(polarity), element) => {
                let (kind, targets) = entity_element(element)
                    .ok_or_else(|| self.error(position, format!("unknown element <{element}>")))?;
                let rule = self.entity_rule(kind, targets, polarity, &attributes, position)?;
                if targets == DeclKinds::CLASS {
                    self.pending = Some(rule);
                    Block::Class(polarity)
                } else {
                    self.rules.push(rule);
                    Block::Member
                }
            }
            (Block::Class(_), element @ ("field" | "method")) => {
                let kind = if element == "field" {
                    MemberKind::Field
                } else {
                    MemberKind::Method
                };
                let member = member_rule(kind, attributes)
                    .ok_or_else(|| self.error(position, format!("<{element}> needs a name")))?;
                if let Some(class) = self.pending.as_mut() {
                    class.members.push(member);
                }
                Block::Member
            }
            (_, element) => {
                return Err(self.error(position, format!("unexpected element <{element}>")))
            }
        };
        self.stack.push(block);
        if !has_body {
            self.close();
        }
        Ok(())
    }

    fn close(&mut self) {
        match self.stack.pop() {
            Some(Block::Class(_)) => {
                if let Some(rule) = self.pending.take() {
                    self.rules.push(rule);
                }
            }
            Some(Block::IoRead) => {
                if let Some(read) = self.io_read.take() {
                    self.rules.read_rules.push(read);
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str, position: usize) -> Result<(), RuleError> {
        let text = text.trim();
        if self.current() == Block::IoRead {
            if let Some(read) = self.io_read.as_mut() {
                if !read.code.is_empty() {
                    read.code.push('\n');
                }
                read.code.push_str(text);
            }
            return Ok(());
        }
        if text.is_empty() {
            return Ok(());
        }
        Err(self.error(position, format!("unexpected text `{text}`")))
    }

    fn entity_rule(
        &self,
        kind: RuleKind,
        targets: DeclKinds,
        polarity: Polarity,
        attributes: &[(String, String)],
        position: usize,
    ) -> Result<SelectionRule, RuleError> {
        let location = self.location(position);
        let value = |key: &str| {
            attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        let compile = |source: &str| {
            WildcardPattern::new(source).map_err(|err| RuleError::Pattern {
                location: location.clone(),
                pattern: source.to_string(),
                message: err.msg.to_string(),
            })
        };

        let matcher = if let Some(name) = value("name") {
            if is_wildcard(name) {
                Matcher::Pattern(compile(name)?)
            } else {
                Matcher::Name(name.to_string())
            }
        } else if let Some(pattern) = value("pattern") {
            Matcher::Pattern(compile(pattern)?)
        } else if let Some(file) = value("file_name") {
            Matcher::FileName(file.to_string())
        } else if let Some(pattern) = value("file_pattern") {
            Matcher::FilePattern(compile(pattern)?)
        } else {
            return Err(self.error(
                position,
                "element needs one of `name`, `pattern`, `file_name`, `file_pattern`",
            ));
        };

        let mut rule = new_rule(kind, matcher, polarity, location.clone());
        rule.targets = targets;
        for (key, value) in attributes {
            if !MATCHER_KEYS.contains(&key.as_str()) {
                rule.attributes.insert(key.as_str(), value.as_str());
            }
        }
        Ok(rule)
    }

    fn read_rule(
        &self,
        attributes: &[(String, String)],
        position: usize,
    ) -> Result<ReadRule, RuleError> {
        let mut fields: Vec<(String, String)> = attributes.to_vec();
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
            return Err(self.error(position, "<ioread> needs `sourceClass` and `targetClass`"));
        };
        Ok(ReadRule {
            source_class,
            target_class,
            fields,
            code,
            location: self.location(position),
        })
    }
}

fn entity_element(element: &str) -> Option<(RuleKind, DeclKinds)> {
    Some(match element {
        "class" | "struct" | "union" => (RuleKind::Type, DeclKinds::CLASS),
        "namespace" => (RuleKind::Type, DeclKinds::NAMESPACE),
        "typedef" => (RuleKind::Type, DeclKinds::TYPEDEF),
        "function" => (RuleKind::Function, DeclKinds::FUNCTION),
        "variable" => (RuleKind::Variable, DeclKinds::VARIABLE),
        "enum" => (RuleKind::Enum, DeclKinds::ENUM),
        _ => return None,
    })
}

fn member_rule(kind: MemberKind, attributes: Vec<(String, String)>) -> Option<MemberRule> {
    let mut name = None;
    let mut rest = Attributes::new();
    for (key, value) in attributes {
        if key == "name" {
            name = Some(value);
        } else {
            rest.insert(key, value);
        }
    }
    Some(MemberRule {
        kind,
        name: name?,
        attributes: rest,
    })
}
