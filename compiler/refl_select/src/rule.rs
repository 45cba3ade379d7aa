//! Selection rules as loaded from a pragma list or a declarative rule file.
//!
//! Rules are immutable once loaded. Their order is significant: they are
//! evaluated first to last and a later exclusion vetoes an earlier
//! inclusion.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use refl_ir::{Decl, DeclKind, SourceLoc};

/// Recognized attribute keys.
pub mod attr {
    pub const TRANSIENT: &str = "transient";
    pub const PERSISTENT: &str = "persistent";
    pub const COMMENT: &str = "comment";
    pub const NO_STREAMER: &str = "noStreamer";
    pub const NO_INPUT_OPERATOR: &str = "noInputOperator";
    pub const ROOTMAP: &str = "rootmap";
    pub const METADATA_ONLY: &str = "metadataOnly";
    pub const STREAMER_INFO: &str = "streamerInfo";
}

/// Position of a rule in its `RuleSet`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u32);

impl RuleId {
    /// # Panics
    /// Panics if `index` does not fit in `u32`.
    pub fn new(index: usize) -> Self {
        RuleId(u32::try_from(index).unwrap_or_else(|_| panic!("rule index {index} overflow")))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The four rule kinds a selection file can name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Classes, namespaces and typedefs.
    Type,
    Function,
    Variable,
    Enum,
}

bitflags! {
    /// Declaration kinds a rule can match.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct DeclKinds: u8 {
        const CLASS = 1 << 0;
        const NAMESPACE = 1 << 1;
        const TYPEDEF = 1 << 2;
        const FUNCTION = 1 << 3;
        const VARIABLE = 1 << 4;
        const ENUM = 1 << 5;
        const TYPES = Self::CLASS.bits() | Self::NAMESPACE.bits() | Self::TYPEDEF.bits();
    }
}

impl DeclKinds {
    pub fn of(decl: &Decl) -> DeclKinds {
        match decl.kind {
            DeclKind::Class(_) => DeclKinds::CLASS,
            DeclKind::Namespace => DeclKinds::NAMESPACE,
            DeclKind::Typedef(_) => DeclKinds::TYPEDEF,
            DeclKind::Function(_) => DeclKinds::FUNCTION,
            DeclKind::Variable(_) => DeclKinds::VARIABLE,
            DeclKind::Enum(_) => DeclKinds::ENUM,
        }
    }
}

impl RuleKind {
    pub fn default_targets(self) -> DeclKinds {
        match self {
            RuleKind::Type => DeclKinds::TYPES,
            RuleKind::Function => DeclKinds::FUNCTION,
            RuleKind::Variable => DeclKinds::VARIABLE,
            RuleKind::Enum => DeclKinds::ENUM,
        }
    }
}

/// A shell-style `*`/`?` pattern anchored to the whole name.
#[derive(Clone, Debug)]
pub struct WildcardPattern {
    source: String,
    pattern: glob::Pattern,
}

impl WildcardPattern {
    pub fn new(source: &str) -> Result<Self, glob::PatternError> {
        Ok(WildcardPattern {
            source: source.to_string(),
            pattern: glob::Pattern::new(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.matches(text)
    }
}

impl PartialEq for WildcardPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for WildcardPattern {}

/// Whether a spelled name should become a wildcard matcher.
pub fn is_wildcard(name: &str) -> bool {
    name.contains('*') || name.contains('?')
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Matcher {
    /// Exact qualified (or normalized) name.
    Name(String),
    Pattern(WildcardPattern),
    /// Declarations whose file is this path or ends with `/<path>`.
    FileName(String),
    FilePattern(WildcardPattern),
}

impl Matcher {
    pub fn is_exact(&self) -> bool {
        matches!(self, Matcher::Name(_))
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Name(name) => write!(f, "`{name}`"),
            Matcher::Pattern(pattern) => write!(f, "pattern `{}`", pattern.as_str()),
            Matcher::FileName(file) => write!(f, "file `{file}`"),
            Matcher::FilePattern(pattern) => write!(f, "file pattern `{}`", pattern.as_str()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Polarity {
    Include,
    Exclude,
}

/// String attributes attached by a rule, in deterministic key order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// `true`, `1` and `yes` (any case) are true.
    pub fn is_true(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| {
            matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
        })
    }

    pub fn is_false(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| {
            matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "no")
        })
    }

    /// Later values win.
    pub fn merge(&mut self, other: &Attributes) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Method,
}

/// A nested rule restricted to one member of the matched class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRule {
    pub kind: MemberKind,
    pub name: String,
    pub attributes: Attributes,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RuleOrigin {
    PragmaList,
    RuleFile,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionRule {
    pub id: RuleId,
    pub kind: RuleKind,
    pub targets: DeclKinds,
    pub matcher: Matcher,
    pub polarity: Polarity,
    pub attributes: Attributes,
    pub members: Vec<MemberRule>,
    pub location: SourceLoc,
}

impl SelectionRule {
    pub fn applies_to(&self, decl: &Decl) -> bool {
        self.targets.intersects(DeclKinds::of(decl))
    }

    /// Exclusions with nested members only suppress those members.
    pub fn is_member_exclusion(&self) -> bool {
        self.polarity == Polarity::Exclude && !self.members.is_empty()
    }
}

impl fmt::Display for SelectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.polarity {
            Polarity::Include => "selection",
            Polarity::Exclude => "exclusion",
        };
        write!(f, "{verb} rule for {}", self.matcher)
    }
}

/// A schema-evolution read rule, passed through to class registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadRule {
    pub source_class: String,
    pub target_class: String,
    /// Remaining `key="value"` pairs in declaration order.
    pub fields: Vec<(String, String)>,
    pub code: String,
    pub location: SourceLoc,
}

/// Everything loaded from one selection file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSet {
    pub origin: RuleOrigin,
    pub rules: Vec<SelectionRule>,
    pub read_rules: Vec<ReadRule>,
    pub extra_includes: Vec<String>,
}

impl RuleSet {
    pub fn new(origin: RuleOrigin) -> Self {
        RuleSet {
            origin,
            rules: Vec::new(),
            read_rules: Vec::new(),
            extra_includes: Vec::new(),
        }
    }

    /// Append a rule, assigning its id.
    pub fn push(&mut self, mut rule: SelectionRule) -> RuleId {
        let id = RuleId::new(self.rules.len());
        rule.id = id;
        self.rules.push(rule);
        id
    }

    pub fn rule(&self, id: RuleId) -> &SelectionRule {
        &self.rules[id.index()]
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Builder used by both parsers.
pub(crate) fn new_rule(
    kind: RuleKind,
    matcher: Matcher,
    polarity: Polarity,
    location: SourceLoc,
) -> SelectionRule {
    SelectionRule {
        id: RuleId(0),
        kind,
        targets: kind.default_targets(),
        matcher,
        polarity,
        attributes: Attributes::new(),
        members: Vec::new(),
        location,
    }
}
