//! Selection for the refl dictionary compiler.
//!
//! Loads selection rules from a pragma list (`LinkDef.h`) or a declarative
//! XML rule file and evaluates them against a declaration universe:
//!
//! ```text
//! let rules = load_rules(Path::new("LinkDef.h"))?;
//! let mut engine = SelectionEngine::new(&universe, &rules);
//! engine.optimize();
//! let selection = engine.select()?;
//! ```

mod engine;
mod error;
mod linkdef;
mod load;
pub mod rule;
mod selection;
mod xml;

pub use engine::{SelectionEngine, Verdict};
pub use error::{RuleError, SelectionError};
pub use linkdef::parse_pragmas;
pub use load::{load_rules, pragma_list_from_headers, SelectionFileKind};
pub use rule::{
    Attributes, Matcher, MemberKind, MemberRule, Polarity, ReadRule, RuleId, RuleKind, RuleOrigin,
    RuleSet, SelectionRule,
};
pub use selection::{EntityFlags, MemberOverride, Rejection, SelectedEntity, Selection};
pub use xml::parse_rule_file;
