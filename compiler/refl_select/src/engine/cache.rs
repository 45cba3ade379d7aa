//! Rule lookup cache.
//!
//! Exact-name rules are indexed by every spelling they can match, so a
//! declaration only needs to be tested against the rules filed under its
//! own names plus the rules that must scan (patterns and file matchers).

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::rule::RuleId;

pub(super) type RuleIds = SmallVec<[RuleId; 4]>;

#[derive(Clone, Debug, Default)]
pub(super) struct RuleCache {
    by_name: FxHashMap<String, RuleIds>,
    scanning: RuleIds,
}

impl RuleCache {
    pub(super) fn file_exact(&mut self, name: &str, rule: RuleId) {
        let slot = self.by_name.entry(name.to_string()).or_default();
        if !slot.contains(&rule) {
            slot.push(rule);
        }
    }

    pub(super) fn file_scanning(&mut self, rule: RuleId) {
        self.scanning.push(rule);
    }

    /// Candidate rules for a declaration known under `names`, in rule order.
    pub(super) fn candidates<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> RuleIds {
        let mut ids: RuleIds = self.scanning.clone();
        for name in names {
            if let Some(exact) = self.by_name.get(name) {
                ids.extend(exact.iter().copied());
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub(super) fn is_empty(&self) -> bool {
        self.by_name.is_empty() && self.scanning.is_empty()
    }
}
