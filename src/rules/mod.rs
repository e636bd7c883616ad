//! Destination rules for redirect-guard
//!
//! Compiles user rule strings into an ordered, immutable [`CompiledRuleSet`].
//! A rule that fails to compile is left out of the active set and reported
//! through [`CompiledRuleSet::rejected`]; it never aborts the others.

pub mod defaults;
pub mod pattern;

pub use defaults::{default_rules, DEFAULT_RULES};
pub use pattern::{build_matcher, RuleError};

use regex::Regex;

/// A rule string paired with its compiled matcher
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// The literal rule string the user wrote
    pub source: String,

    /// Matcher built from the rule
    pub matcher: Regex,
}

impl CompiledRule {
    /// Compile a single rule
    pub fn new(source: impl Into<String>) -> Result<Self, RuleError> {
        let source = source.into();
        let matcher = build_matcher(&source)?;
        Ok(Self { source, matcher })
    }

    /// Test the raw URL string against this rule
    pub fn is_match(&self, url: &str) -> bool {
        self.matcher.is_match(url)
    }
}

/// A persisted rule that did not compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRule {
    pub source: String,
    pub error: RuleError,
}

/// Ordered snapshot of compiled rules
///
/// Built wholesale from a rule list and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleSet {
    rules: Vec<CompiledRule>,
    rejected: Vec<RejectedRule>,
}

impl CompiledRuleSet {
    /// An empty rule set (matches nothing)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile a rule list, preserving order and skipping invalid entries
    pub fn compile<S: AsRef<str>>(sources: &[S]) -> Self {
        let mut set = Self::empty();

        for source in sources {
            let source = source.as_ref();
            match CompiledRule::new(source) {
                Ok(rule) => set.rules.push(rule),
                Err(error) => {
                    tracing::warn!(rule = %source, error = %error, "Invalid rule skipped");
                    set.rejected.push(RejectedRule {
                        source: source.to_string(),
                        error,
                    });
                }
            }
        }

        set
    }

    /// Whether any rule matches the URL
    pub fn matches(&self, url: &str) -> bool {
        self.rules.iter().any(|r| r.is_match(url))
    }

    /// First rule, in insertion order, that matches the URL
    pub fn find_match(&self, url: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.is_match(url))
    }

    /// Active rules in insertion order
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Rule strings in the active set
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.source.as_str())
    }

    /// Rules that were dropped at compile time
    pub fn rejected(&self) -> &[RejectedRule] {
        &self.rejected
    }

    /// Number of active matchers
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if there are no active matchers
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Compile a rule list (see [`CompiledRuleSet::compile`])
pub fn compile<S: AsRef<str>>(sources: &[S]) -> CompiledRuleSet {
    CompiledRuleSet::compile(sources)
}

/// Check whether a single rule string would compile
pub fn validate_rule(rule: &str) -> Result<(), RuleError> {
    build_matcher(rule).map(|_| ())
}
