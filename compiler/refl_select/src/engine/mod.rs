//! Rule evaluation.
//!
//! Every declaration is tested against the rules in file order. An
//! inclusion selects it and merges the rule's attributes (later values
//! win); a later whole exclusion vetoes everything before it; a member
//! exclusion only suppresses the members it names.
//!
//! `fill_cache` and `optimize` are pure accelerations: evaluation through
//! the cache or the precomputed verdicts gives the same answer as the
//! plain scan over all rules.

mod cache;

#[cfg(test)]
mod tests;

use refl_diagnostic::{Diagnostic, ErrorCode};
use refl_ir::stl::StlKind;
use refl_ir::{canonical_spelling, Decl, DeclId, DeclKind, Introspect};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace};

use crate::error::SelectionError;
use crate::rule::{attr, Attributes, Matcher, MemberRule, Polarity, RuleId, RuleSet, SelectionRule};
use crate::selection::{EntityFlags, MemberOverride, SelectedEntity, Selection};
use cache::{RuleCache, RuleIds};

/// The outcome of evaluating the rules against one declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub rule: RuleId,
    pub requested_name: String,
    pub attributes: Attributes,
    pub members: Vec<MemberOverride>,
    pub matched_rules: SmallVec<[RuleId; 2]>,
}

impl Verdict {
    fn new(rule: RuleId, requested_name: String) -> Self {
        Verdict {
            rule,
            requested_name,
            attributes: Attributes::new(),
            members: Vec::new(),
            matched_rules: smallvec![],
        }
    }

    fn member_slot(&mut self, member: &MemberRule) -> &mut MemberOverride {
        let index = match self
            .members
            .iter()
            .position(|m| m.kind == member.kind && m.name == member.name)
        {
            Some(index) => index,
            None => {
                self.members.push(MemberOverride {
                    kind: member.kind,
                    name: member.name.clone(),
                    attributes: Attributes::new(),
                    suppressed: false,
                });
                self.members.len() - 1
            }
        };
        &mut self.members[index]
    }
}

/// Spellings an exact-name rule is filed under.
#[derive(Clone, Debug)]
struct RuleNames {
    canonical: String,
    normalized: String,
}

pub struct SelectionEngine<'a, P: Introspect + ?Sized> {
    port: &'a P,
    rules: &'a RuleSet,
    names: Vec<Option<RuleNames>>,
    cache: Option<RuleCache>,
    verdicts: Option<Vec<Option<Verdict>>>,
}

impl<'a, P: Introspect + ?Sized> SelectionEngine<'a, P> {
    pub fn new(port: &'a P, rules: &'a RuleSet) -> Self {
        let names = rules
            .rules
            .iter()
            .map(|rule| match &rule.matcher {
                Matcher::Name(name) => {
                    let canonical = canonical_spelling(name.trim_start_matches("::"));
                    Some(RuleNames {
                        normalized: port.normalized_name(&canonical),
                        canonical,
                    })
                }
                _ => None,
            })
            .collect();
        SelectionEngine {
            port,
            rules,
            names,
            cache: None,
            verdicts: None,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        self.rules
    }

    /// Index exact-name rules by spelling.
    pub fn fill_cache(&mut self) {
        let mut cache = RuleCache::default();
        for (rule, names) in self.rules.rules.iter().zip(&self.names) {
            match names {
                Some(names) => {
                    cache.file_exact(&names.canonical, rule.id);
                    cache.file_exact(&names.normalized, rule.id);
                }
                None => cache.file_scanning(rule.id),
            }
        }
        debug!(empty = cache.is_empty(), "rule cache filled");
        self.cache = Some(cache);
    }

    /// Precompute the verdict for every declaration.
    pub fn optimize(&mut self) {
        if self.cache.is_none() {
            self.fill_cache();
        }
        let verdicts = self
            .port
            .declarations()
            .iter()
            .map(|decl| self.evaluate_cached(decl))
            .collect();
        self.verdicts = Some(verdicts);
    }

    /// The verdict for one declaration, using whatever acceleration is
    /// available.
    pub fn evaluate(&self, id: DeclId) -> Option<Verdict> {
        if let Some(verdict) = self.verdicts.as_ref().and_then(|v| v.get(id.index())) {
            return verdict.clone();
        }
        let decl = self.port.decl(id);
        if self.cache.is_some() {
            self.evaluate_cached(decl)
        } else {
            self.evaluate_uncached(decl)
        }
    }

    /// Scan every rule.
    pub fn evaluate_uncached(&self, decl: &Decl) -> Option<Verdict> {
        let names = self.decl_names(decl);
        self.evaluate_with(decl, &names, self.rules.rules.iter().map(|rule| rule.id))
    }

    fn evaluate_cached(&self, decl: &Decl) -> Option<Verdict> {
        let Some(cache) = &self.cache else {
            return self.evaluate_uncached(decl);
        };
        let names = self.decl_names(decl);
        let candidates: RuleIds = cache.candidates(names.iter().map(String::as_str));
        self.evaluate_with(decl, &names, candidates)
    }

    fn evaluate_with(
        &self,
        decl: &Decl,
        names: &[String],
        candidates: impl IntoIterator<Item = RuleId>,
    ) -> Option<Verdict> {
        let mut verdict: Option<Verdict> = None;
        let mut suppressed: Vec<&MemberRule> = Vec::new();
        for id in candidates {
            let rule = self.rules.rule(id);
            if !self.matches(rule, decl, names) {
                continue;
            }
            trace!(decl = %decl.qualified_name, rule = %rule, "rule matches");
            match rule.polarity {
                Polarity::Include => {
                    let verdict = verdict
                        .get_or_insert_with(|| Verdict::new(id, self.requested_name(rule, decl)));
                    verdict.attributes.merge(&rule.attributes);
                    for member in &rule.members {
                        verdict.member_slot(member).attributes.merge(&member.attributes);
                    }
                    verdict.matched_rules.push(id);
                }
                Polarity::Exclude if rule.is_member_exclusion() => {
                    suppressed.extend(&rule.members);
                }
                Polarity::Exclude => verdict = None,
            }
        }
        let mut verdict = verdict?;
        for member in suppressed {
            verdict.member_slot(member).suppressed = true;
        }
        Some(verdict)
    }

    /// Qualified name, plus the normalized name for classes.
    fn decl_names(&self, decl: &Decl) -> SmallVec<[String; 2]> {
        let mut names: SmallVec<[String; 2]> = smallvec![decl.qualified_name.clone()];
        if matches!(decl.kind, DeclKind::Class(_)) {
            let normalized = self.port.normalized_decl_name(decl.id);
            if normalized != decl.qualified_name {
                names.push(normalized);
            }
        }
        names
    }

    fn matches(&self, rule: &SelectionRule, decl: &Decl, names: &[String]) -> bool {
        if !rule.applies_to(decl) {
            return false;
        }
        match &rule.matcher {
            Matcher::Name(_) => self.names[rule.id.index()].as_ref().is_some_and(|rule_names| {
                names
                    .iter()
                    .any(|name| *name == rule_names.canonical || *name == rule_names.normalized)
            }),
            Matcher::Pattern(pattern) => names.iter().any(|name| pattern.matches(name)),
            Matcher::FileName(file) => {
                let path = decl.location.file.as_str();
                !path.is_empty()
                    && (path == file
                        || path
                            .strip_suffix(file.as_str())
                            .is_some_and(|prefix| prefix.ends_with('/')))
            }
            Matcher::FilePattern(pattern) => {
                let path = decl.location.file.as_str();
                let base = path.rsplit('/').next().unwrap_or(path);
                !path.is_empty() && (pattern.matches(path) || pattern.matches(base))
            }
        }
    }

    fn requested_name(&self, rule: &SelectionRule, decl: &Decl) -> String {
        match &self.names[rule.id.index()] {
            Some(names) => names.canonical.clone(),
            None => decl.qualified_name.clone(),
        }
    }

    /// Evaluate every declaration and partition the selected ones.
    ///
    /// Fails when two distinct declarations share a normalized name.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn select(&self) -> Result<Selection, SelectionError> {
        let mut selection = Selection::default();
        let mut seen: FxHashMap<(Bucket, String), DeclId> = FxHashMap::default();

        for decl in self.port.declarations() {
            let Some(verdict) = self.evaluate(decl.id) else {
                continue;
            };
            let entity = self.entity(decl, verdict);
            let bucket = Bucket::of(&decl.kind);
            if bucket != Bucket::Function {
                let key = (bucket, entity.normalized_name.clone());
                match seen.get(&key) {
                    Some(first) if *first == decl.id => continue,
                    Some(first) => {
                        return Err(SelectionError::DuplicateName {
                            name: entity.normalized_name,
                            first: *first,
                            second: decl.id,
                        })
                    }
                    None => {
                        seen.insert(key, decl.id);
                    }
                }
            }
            let list = match bucket {
                Bucket::Class => &mut selection.classes,
                Bucket::Namespace => &mut selection.namespaces,
                Bucket::Typedef => &mut selection.typedefs,
                Bucket::Enum => &mut selection.enums,
                Bucket::Function => &mut selection.functions,
                Bucket::Variable => &mut selection.variables,
            };
            list.push(entity);
        }
        debug!(
            classes = selection.classes.len(),
            namespaces = selection.namespaces.len(),
            typedefs = selection.typedefs.len(),
            enums = selection.enums.len(),
            functions = selection.functions.len(),
            variables = selection.variables.len(),
            "selection complete"
        );
        Ok(selection)
    }

    fn entity(&self, decl: &Decl, verdict: Verdict) -> SelectedEntity {
        let mut flags = EntityFlags::empty();
        let normalized_name = match &decl.kind {
            DeclKind::Class(class) => {
                let normalized = self.port.normalized_decl_name(decl.id);
                if class.is_template_instance() {
                    flags |= EntityFlags::TEMPLATE_INSTANCE;
                }
                if StlKind::of_instance(&normalized).is_some() {
                    flags |= EntityFlags::GENERIC_CONTAINER;
                }
                normalized
            }
            _ => decl.qualified_name.clone(),
        };
        let attributes = &verdict.attributes;
        for (key, flag) in [
            (attr::METADATA_ONLY, EntityFlags::METADATA_ONLY),
            (attr::NO_STREAMER, EntityFlags::NO_STREAMER),
            (attr::NO_INPUT_OPERATOR, EntityFlags::NO_INPUT_OPERATOR),
            (attr::STREAMER_INFO, EntityFlags::STREAMER_INFO),
        ] {
            if attributes.is_true(key) {
                flags |= flag;
            }
        }
        SelectedEntity {
            decl: decl.id,
            requested_name: verdict.requested_name,
            normalized_name,
            flags,
            attributes: verdict.attributes,
            members: verdict.members,
            rule: verdict.rule,
            matched_rules: verdict.matched_rules,
        }
    }

    /// Inclusion rules that contributed to no live entity.
    ///
    /// Matches that were rejected afterwards do not count.
    pub fn unused_rules(&self, selection: &Selection) -> Vec<Diagnostic> {
        let used: FxHashSet<RuleId> = selection
            .iter()
            .flat_map(|entity| entity.matched_rules.iter().copied())
            .collect();
        self.rules
            .rules
            .iter()
            .filter(|rule| rule.polarity == Polarity::Include && !used.contains(&rule.id))
            .map(|rule| {
                Diagnostic::for_code(ErrorCode::E1003)
                    .with_message(format!("unused {rule}"))
                    .at(&rule.location)
            })
            .collect()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum Bucket {
    Class,
    Namespace,
    Typedef,
    Enum,
    Function,
    Variable,
}

impl Bucket {
    fn of(kind: &DeclKind) -> Bucket {
        match kind {
            DeclKind::Class(_) => Bucket::Class,
            DeclKind::Namespace => Bucket::Namespace,
            DeclKind::Typedef(_) => Bucket::Typedef,
            DeclKind::Enum(_) => Bucket::Enum,
            DeclKind::Function(_) => Bucket::Function,
            DeclKind::Variable(_) => Bucket::Variable,
        }
    }
}
