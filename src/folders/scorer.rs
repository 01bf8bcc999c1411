//! Match Scorer: picks a destination folder for a set of attachments.
//!
//! A [`ScopeChain`] lists scope tiers to try in order. Each tier names a
//! subtree of the forest, a scoring [`Strategy`] and an acceptance
//! threshold. The first tier whose best candidate clears its threshold wins;
//! otherwise the chain's fallback node is suggested.
//!
//! Ties between equal scores resolve deterministically: shallower node
//! first, then lexical order of the normalized path, then traversal order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::folders::model::{Attachment, FolderNode, MatchCandidate, Suggestion, resolve_in_forest};
use crate::text;

/// How a candidate node is scored against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Character length of the longest contiguous target-token phrase that
    /// occurs in the node's normalized path.
    LongestSubstring,
    /// Share of the node's own name tokens that occur in the target.
    TokenOverlap,
    /// Bigram (Sørensen–Dice) similarity of node name and target.
    Similarity,
}

impl Strategy {
    /// Acceptance threshold used when a tier does not set one.
    pub fn default_threshold(&self) -> f64 {
        match self {
            Self::LongestSubstring => 1.0,
            Self::TokenOverlap => 0.4,
            Self::Similarity => 0.3,
        }
    }

    /// Score `node` against `target`. Higher is better; 0 means no overlap.
    pub fn score(&self, node: &FolderNode, target: &Target) -> f64 {
        match self {
            Self::LongestSubstring => {
                let path = node.normalized_path();
                target
                    .phrases
                    .iter()
                    .filter(|p| path.contains(p.as_str()))
                    .map(|p| p.chars().count())
                    .max()
                    .unwrap_or(0) as f64
            }
            Self::TokenOverlap => {
                let tokens = text::tokenize(&node.name);
                if tokens.is_empty() {
                    return 0.0;
                }
                let hits = tokens
                    .iter()
                    .filter(|t| target.normalized.contains(t.as_str()))
                    .count();
                hits as f64 / tokens.len() as f64
            }
            Self::Similarity => {
                let name = node.name.to_lowercase();
                target
                    .parts
                    .iter()
                    .map(|part| text::bigram_similarity(&name, part))
                    .fold(0.0, f64::max)
            }
        }
    }
}

/// A string to place: a filename stem, optionally combined with a secondary
/// string such as the mail subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Primary and secondary parts, each normalized on its own.
    parts: Vec<String>,
    /// All parts joined into one normalized string.
    normalized: String,
    /// Every contiguous token run of `normalized`.
    phrases: Vec<String>,
}

impl Target {
    pub fn new(primary: &str, secondary: Option<&str>) -> Self {
        let parts: Vec<String> = std::iter::once(primary)
            .chain(secondary)
            .map(text::normalize)
            .filter(|p| !p.is_empty())
            .collect();
        let tokens: Vec<String> = parts
            .iter()
            .flat_map(|p| p.split(' ').map(str::to_string))
            .collect();
        Self {
            normalized: tokens.join(" "),
            phrases: text::contiguous_phrases(&tokens),
            parts,
        }
    }

    /// Target for one attachment: its name without extension plus `subject`.
    pub fn for_attachment(attachment: &Attachment, subject: Option<&str>) -> Self {
        Self::new(attachment.stem(), subject.filter(|s| !s.trim().is_empty()))
    }

    /// One target per selected attachment, in attachment order.
    pub fn for_selection(
        attachments: &[Attachment],
        selected_ids: &[String],
        subject: Option<&str>,
    ) -> Vec<Self> {
        attachments
            .iter()
            .filter(|a| selected_ids.contains(&a.id))
            .map(|a| Self::for_attachment(a, subject))
            .collect()
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// One tier of the fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeTier {
    /// Folder names from the forest root to the scope node. Empty means the
    /// whole forest.
    #[serde(default)]
    pub scope: Vec<String>,
    pub strategy: Strategy,
    /// Overrides [`Strategy::default_threshold`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl ScopeTier {
    pub fn new<S: Into<String>>(scope: impl IntoIterator<Item = S>, strategy: Strategy) -> Self {
        Self {
            scope: scope.into_iter().map(Into::into).collect(),
            strategy,
            threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
            .unwrap_or_else(|| self.strategy.default_threshold())
    }

    /// Nodes this tier may suggest: strict descendants of the scope node,
    /// or every node when the scope is empty. `None` if the scope is not in
    /// the forest.
    pub fn candidates<'a>(&self, forest: &'a [FolderNode]) -> Option<Vec<&'a FolderNode>> {
        if self.scope.is_empty() {
            return Some(forest.iter().flat_map(|n| n.iter()).collect());
        }
        let root = resolve_in_forest(forest, &self.scope)?;
        Some(root.descendants().collect())
    }
}

/// Ordered scope tiers plus an optional fallback node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeChain {
    #[serde(default)]
    pub tiers: Vec<ScopeTier>,
    /// Folder names of the node suggested when no tier matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Vec<String>>,
}

impl ScopeChain {
    pub fn new(tiers: Vec<ScopeTier>) -> Self {
        Self {
            tiers,
            fallback: None,
        }
    }

    pub fn with_fallback<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        self.fallback = Some(path.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.tiers.is_empty() || self.fallback.is_some()
    }

    /// Run the chain for `targets`.
    ///
    /// Within a tier, the best candidate across all targets wins (an earlier
    /// target wins a tie). A tier is abandoned only when no target clears
    /// its threshold.
    pub fn suggest<'a>(&self, forest: &'a [FolderNode], targets: &[Target]) -> Suggestion<'a> {
        if !self.is_configured() {
            debug!("No scope chain configured, no suggestion");
            return Suggestion::None;
        }

        for (index, tier) in self.tiers.iter().enumerate() {
            let Some(candidates) = tier.candidates(forest) else {
                debug!(tier = index, scope = ?tier.scope, "Scope not present in forest");
                continue;
            };
            let scored = score_candidates(&candidates, targets, tier.strategy);
            if let Some(best) = select_best(&scored, tier.threshold()) {
                info!(
                    tier = index,
                    strategy = ?tier.strategy,
                    folder = %best.node.path,
                    score = best.score,
                    "Folder suggestion accepted"
                );
                return Suggestion::Match(best);
            }
            debug!(
                tier = index,
                strategy = ?tier.strategy,
                candidates = candidates.len(),
                "No candidate cleared threshold"
            );
        }

        match self
            .fallback
            .as_deref()
            .and_then(|path| resolve_in_forest(forest, path))
        {
            Some(node) => {
                info!(folder = %node.path, "Falling back to default folder");
                Suggestion::Fallback(node)
            }
            None => Suggestion::None,
        }
    }

    /// Up to `limit` accepted candidates for tier `tier`, best first.
    pub fn rank_tier<'a>(
        &self,
        tier: usize,
        forest: &'a [FolderNode],
        targets: &[Target],
        limit: usize,
    ) -> Vec<MatchCandidate<'a>> {
        let Some(tier) = self.tiers.get(tier) else {
            return Vec::new();
        };
        let Some(candidates) = tier.candidates(forest) else {
            return Vec::new();
        };
        rank(&candidates, targets, tier.strategy, tier.threshold(), limit)
    }
}

/// Score every candidate against every target, keeping each node's best score.
pub fn score_candidates<'a>(
    candidates: &[&'a FolderNode],
    targets: &[Target],
    strategy: Strategy,
) -> Vec<MatchCandidate<'a>> {
    candidates
        .iter()
        .map(|&node| MatchCandidate {
            node,
            score: targets
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| strategy.score(node, t))
                .fold(0.0, f64::max),
        })
        .collect()
}

/// Whether `score` is accepted at `threshold`. Zero never is.
pub fn is_accepted(score: f64, threshold: f64) -> bool {
    score > 0.0 && score >= threshold
}

/// Best accepted candidate, ties resolved by [`rank_order`].
pub fn select_best<'a>(
    scored: &[MatchCandidate<'a>],
    threshold: f64,
) -> Option<MatchCandidate<'a>> {
    scored
        .iter()
        .filter(|c| is_accepted(c.score, threshold))
        .min_by(|a, b| rank_order(a, b))
        .copied()
}

/// Accepted candidates sorted best first, truncated to `limit`.
pub fn rank<'a>(
    candidates: &[&'a FolderNode],
    targets: &[Target],
    strategy: Strategy,
    threshold: f64,
    limit: usize,
) -> Vec<MatchCandidate<'a>> {
    let mut accepted: Vec<MatchCandidate<'a>> = score_candidates(candidates, targets, strategy)
        .into_iter()
        .filter(|c| is_accepted(c.score, threshold))
        .collect();
    accepted.sort_by(rank_order);
    accepted.truncate(limit);
    accepted
}

/// Higher score first, then shallower node, then normalized path.
/// Equal elements keep traversal order (callers use stable operations).
pub fn rank_order(a: &MatchCandidate<'_>, b: &MatchCandidate<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.node.depth().cmp(&b.node.depth()))
        .then_with(|| a.node.normalized_path().cmp(&b.node.normalized_path()))
}
