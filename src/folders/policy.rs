//! Expansion policy for the Tree Builder.
//!
//! A policy is an ordered list of rules. Each top-level namespace entry is
//! checked against the rules in order; the first rule whose matcher accepts
//! the entry's name decides how deep (and through which anchor) it is
//! expanded. Entries no rule matches become leaves.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TreeError;

/// Hard ceiling on any rule's depth. Keeps listing fan-out bounded no matter
/// what a deployment configures.
pub const MAX_EXPANSION_DEPTH: usize = 4;

/// How a rule recognises a folder name.
#[derive(Debug, Clone)]
pub enum NameMatcher {
    /// Byte-for-byte equality.
    Exact(String),
    /// Equality ignoring case.
    IgnoreCase(String),
    /// Regular expression search.
    Pattern(Regex),
}

impl NameMatcher {
    pub fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Exact(expected) => name == expected,
            Self::IgnoreCase(expected) => name.to_lowercase() == expected.to_lowercase(),
            Self::Pattern(regex) => regex.is_match(name),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Exact(s) => format!("exact:{s}"),
            Self::IgnoreCase(s) => format!("ignore_case:{s}"),
            Self::Pattern(r) => format!("pattern:{}", r.as_str()),
        }
    }
}

/// Serialized form of a [`NameMatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MatcherSpec {
    Exact(String),
    IgnoreCase(String),
    Pattern(String),
}

/// Serialized form of an [`ExpansionRule`], as found in policy files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionRuleSpec {
    #[serde(rename = "match")]
    pub matcher: MatcherSpec,
    pub depth: usize,
    /// Child container to drill through before expanding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

/// A compiled expansion rule.
#[derive(Debug, Clone)]
pub struct ExpansionRule {
    pub matcher: NameMatcher,
    /// Levels to expand below the base (the entry itself, or its anchor).
    pub depth: usize,
    /// Name of a child that must be located first; expansion happens only
    /// under it.
    pub anchor: Option<String>,
}

impl ExpansionRule {
    /// Rule matching `name` exactly, expanded to `depth`.
    pub fn exact(name: impl Into<String>, depth: usize) -> Self {
        Self {
            matcher: NameMatcher::Exact(name.into()),
            depth,
            anchor: None,
        }
    }

    /// Rule matching names against `pattern`, expanded to `depth`.
    pub fn pattern(pattern: &str, depth: usize) -> Result<Self, TreeError> {
        let regex = Regex::new(pattern)
            .map_err(|e| TreeError::Policy(format!("bad pattern {pattern:?}: {e}")))?;
        Ok(Self {
            matcher: NameMatcher::Pattern(regex),
            depth,
            anchor: None,
        })
    }

    /// Drill through the child named `anchor` before expanding.
    pub fn through(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    /// Compile a rule from its serialized form.
    pub fn from_spec(spec: &ExpansionRuleSpec) -> Result<Self, TreeError> {
        let matcher = match &spec.matcher {
            MatcherSpec::Exact(s) => NameMatcher::Exact(s.clone()),
            MatcherSpec::IgnoreCase(s) => NameMatcher::IgnoreCase(s.clone()),
            MatcherSpec::Pattern(p) => NameMatcher::Pattern(
                Regex::new(p).map_err(|e| TreeError::Policy(format!("bad pattern {p:?}: {e}")))?,
            ),
        };
        Ok(Self {
            matcher,
            depth: spec.depth,
            anchor: spec.anchor.clone(),
        })
    }
}

/// Ordered set of expansion rules; first match wins.
#[derive(Debug, Clone, Default)]
pub struct ExpansionPolicy {
    rules: Vec<ExpansionRule>,
}

impl ExpansionPolicy {
    /// Build a policy, rejecting any rule deeper than [`MAX_EXPANSION_DEPTH`].
    pub fn new(rules: Vec<ExpansionRule>) -> Result<Self, TreeError> {
        if let Some(rule) = rules.iter().find(|r| r.depth > MAX_EXPANSION_DEPTH) {
            return Err(TreeError::Policy(format!(
                "rule {} asks for depth {}, maximum is {MAX_EXPANSION_DEPTH}",
                rule.matcher.describe(),
                rule.depth
            )));
        }
        Ok(Self { rules })
    }

    /// A policy with no rules: every top-level entry is a leaf.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile a policy from its serialized rules.
    pub fn from_specs(specs: &[ExpansionRuleSpec]) -> Result<Self, TreeError> {
        let rules = specs
            .iter()
            .map(ExpansionRule::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rules)
    }

    /// First rule matching `name`.
    pub fn rule_for(&self, name: &str) -> Option<&ExpansionRule> {
        let rule = self.rules.iter().find(|r| r.matcher.is_match(name));
        if let Some(rule) = rule {
            debug!(
                folder = %name,
                rule = %rule.matcher.describe(),
                depth = rule.depth,
                anchor = ?rule.anchor,
                "Expansion rule matched"
            );
        }
        rule
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
