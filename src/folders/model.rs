//! Folder tree data model.

use serde::{Deserialize, Serialize};

use crate::text;

/// Separator used when rendering a node's display path.
pub const PATH_SEPARATOR: &str = "/";

/// A folder in the partially-expanded namespace view.
///
/// `path_ids` and `path_names` always hold the full ancestor chain from the
/// namespace root down to and including this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FolderNode>,
    pub path_ids: Vec<String>,
    pub path_names: Vec<String>,
    pub path: String,
}

impl FolderNode {
    /// A node directly below the namespace root.
    pub fn top_level(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let name = name.into();
        Self {
            path: name.clone(),
            path_ids: vec![id.clone()],
            path_names: vec![name.clone()],
            id,
            name,
            children: Vec::new(),
        }
    }

    /// A node below `parent`, inheriting its ancestor chain.
    pub fn child_of(parent: &FolderNode, id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let name = name.into();
        let mut path_ids = parent.path_ids.clone();
        path_ids.push(id.clone());
        let mut path_names = parent.path_names.clone();
        path_names.push(name.clone());
        Self {
            path: path_names.join(PATH_SEPARATOR),
            path_ids,
            path_names,
            id,
            name,
            children: Vec::new(),
        }
    }

    /// Number of segments from the namespace root (top-level nodes are 1).
    pub fn depth(&self) -> usize {
        self.path_ids.len()
    }

    /// Lowercased path with every name tokenized and joined by single spaces.
    pub fn normalized_path(&self) -> String {
        text::normalize(&self.path_names.join(" "))
    }

    /// Pre-order iterator over this node and all of its descendants.
    pub fn iter(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Pre-order iterator over the strict descendants of this node.
    pub fn descendants(&self) -> impl Iterator<Item = &FolderNode> {
        self.iter().skip(1)
    }

    /// Follow `names` down from this node, matching one child per segment
    /// (case-insensitive). An empty `names` resolves to `self`.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Option<&FolderNode> {
        let mut current = self;
        for name in names {
            current = current
                .children
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name.as_ref()))?;
        }
        Some(current)
    }
}

/// Pre-order traversal over a folder subtree.
pub struct Descendants<'a> {
    stack: Vec<&'a FolderNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a FolderNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Resolve a name path against a forest: the first segment picks the
/// top-level node, the rest walk down its children.
pub fn resolve_in_forest<'a, S: AsRef<str>>(
    forest: &'a [FolderNode],
    names: &[S],
) -> Option<&'a FolderNode> {
    let (first, rest) = names.split_first()?;
    forest
        .iter()
        .find(|n| n.name.eq_ignore_ascii_case(first.as_ref()))?
        .resolve(rest)
}

/// Total number of nodes in a forest.
pub fn forest_size(forest: &[FolderNode]) -> usize {
    forest.iter().map(|n| n.iter().count()).sum()
}

// ── Attachments ─────────────────────────────────────────────────────

/// An attachment on the current mail item, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub size: u64,
}

impl Attachment {
    /// Inline images (signature logos, pasted screenshots) carry "image" in
    /// their host-generated names.
    pub fn is_inline_image(&self) -> bool {
        self.name.to_lowercase().contains("image")
    }

    /// Filename without its extension, used as the match target.
    pub fn stem(&self) -> &str {
        text::strip_extension(&self.name)
    }

    /// Ids of the attachments selected when the panel opens.
    pub fn default_selection(attachments: &[Attachment]) -> Vec<String> {
        attachments
            .iter()
            .filter(|a| !a.is_inline_image())
            .map(|a| a.id.clone())
            .collect()
    }
}

// ── Scoring results ─────────────────────────────────────────────────

/// A scored candidate node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate<'a> {
    pub node: &'a FolderNode,
    pub score: f64,
}

/// Outcome of a suggestion run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Suggestion<'a> {
    /// A candidate cleared the threshold of some scope tier.
    Match(MatchCandidate<'a>),
    /// No tier produced a match; the configured fallback node.
    Fallback(&'a FolderNode),
    /// Nothing configured or nothing to search.
    None,
}

impl<'a> Suggestion<'a> {
    /// The suggested node, if any.
    pub fn node(&self) -> Option<&'a FolderNode> {
        match self {
            Self::Match(candidate) => Some(candidate.node),
            Self::Fallback(node) => Some(node),
            Self::None => None,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Match(_) => "match",
            Self::Fallback(_) => "fallback",
            Self::None => "none",
        }
    }
}
