//! Tree Builder: a partial, depth-bounded view of the remote namespace.
//!
//! The build runs as an explicit worklist, one namespace level at a time:
//! 1. List the root; every container becomes a top-level node
//! 2. Resolve anchors for rules that drill through a wrapper folder
//! 3. Expand the frontier level by level until each item reaches its rule's depth
//!
//! Listings within a level are fetched concurrently (bounded by
//! `max_in_flight`) and attached by position, so the resulting tree does not
//! depend on completion order. Any failed listing aborts the whole build.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info};

use crate::error::TreeError;
use crate::folders::model::FolderNode;
use crate::folders::policy::ExpansionPolicy;
use crate::services::{NamespaceEntry, NamespaceService};

/// Default bound on concurrent listing fetches.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// A node under construction plus the arena indices of its children.
struct Slot {
    node: FolderNode,
    children: Vec<usize>,
}

/// Pending expansion: list the children of `slot`, which sits `depth` levels
/// below its expansion base, and keep going while `depth < max_depth`.
#[derive(Debug, Clone, Copy)]
struct WorkItem {
    slot: usize,
    depth: usize,
    max_depth: usize,
}

/// Pending anchor lookup for a top-level slot.
#[derive(Debug, Clone)]
struct AnchorItem {
    slot: usize,
    anchor: String,
    max_depth: usize,
}

/// Builds a [`FolderNode`] forest from a [`NamespaceService`].
pub struct TreeBuilder {
    namespace: Arc<dyn NamespaceService>,
    policy: ExpansionPolicy,
    max_in_flight: usize,
}

impl TreeBuilder {
    pub fn new(namespace: Arc<dyn NamespaceService>, policy: ExpansionPolicy) -> Self {
        Self {
            namespace,
            policy,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Bound the number of listings in flight at once (minimum 1).
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Build the forest below `root_id`.
    ///
    /// An empty root yields an empty forest. A failed listing anywhere
    /// returns an error and no partial tree.
    pub async fn build(&self, root_id: &str) -> Result<Vec<FolderNode>, TreeError> {
        let mut fetches = 1usize;
        let top = self
            .namespace
            .list_children(root_id)
            .await
            .map_err(|source| TreeError::Transport {
                container_id: root_id.to_string(),
                source,
            })?;

        let mut arena: Vec<Slot> = Vec::new();
        let mut roots: Vec<usize> = Vec::new();
        let mut frontier: Vec<WorkItem> = Vec::new();
        let mut anchors: Vec<AnchorItem> = Vec::new();

        for entry in top.into_iter().filter(|e| e.is_container) {
            let slot = arena.len();
            let rule = self.policy.rule_for(&entry.name);
            arena.push(Slot {
                node: FolderNode::top_level(entry.id, entry.name),
                children: Vec::new(),
            });
            roots.push(slot);

            match rule {
                None => {}
                Some(rule) => match &rule.anchor {
                    Some(anchor) => anchors.push(AnchorItem {
                        slot,
                        anchor: anchor.clone(),
                        max_depth: rule.depth,
                    }),
                    None if rule.depth > 0 => frontier.push(WorkItem {
                        slot,
                        depth: 0,
                        max_depth: rule.depth,
                    }),
                    None => {}
                },
            }
        }

        if !anchors.is_empty() {
            let ids = anchors
                .iter()
                .map(|a| arena[a.slot].node.id.clone())
                .collect();
            let listings = self.fetch_all(ids).await?;
            fetches += listings.len();

            for (item, entries) in anchors.iter().zip(listings) {
                let found = entries
                    .into_iter()
                    .find(|e| e.is_container && e.name == item.anchor);
                let Some(anchor) = found else {
                    debug!(
                        folder = %arena[item.slot].node.path,
                        anchor = %item.anchor,
                        "Anchor folder missing, skipping rule"
                    );
                    roots.retain(|r| *r != item.slot);
                    continue;
                };
                let child = Self::attach(&mut arena, item.slot, anchor);
                if item.max_depth > 0 {
                    frontier.push(WorkItem {
                        slot: child,
                        depth: 0,
                        max_depth: item.max_depth,
                    });
                }
            }
        }

        while !frontier.is_empty() {
            let ids = frontier
                .iter()
                .map(|w| arena[w.slot].node.id.clone())
                .collect();
            let listings = self.fetch_all(ids).await?;
            fetches += listings.len();

            let mut next = Vec::new();
            for (item, entries) in frontier.iter().zip(listings) {
                for entry in entries.into_iter().filter(|e| e.is_container) {
                    let child = Self::attach(&mut arena, item.slot, entry);
                    if item.depth + 1 < item.max_depth {
                        next.push(WorkItem {
                            slot: child,
                            depth: item.depth + 1,
                            max_depth: item.max_depth,
                        });
                    }
                }
            }
            frontier = next;
        }

        let node_count = arena.len();
        let forest = Self::assemble(arena, &roots);
        info!(
            root = %root_id,
            top_level = forest.len(),
            nodes = node_count,
            fetches,
            "Folder tree built"
        );
        Ok(forest)
    }

    /// Fetch several listings with bounded concurrency, preserving input order.
    async fn fetch_all(&self, ids: Vec<String>) -> Result<Vec<Vec<NamespaceEntry>>, TreeError> {
        let namespace = &self.namespace;
        stream::iter(ids)
            .map(|id| async move {
                let result = namespace.list_children(&id).await;
                result.map_err(|source| TreeError::Transport {
                    container_id: id,
                    source,
                })
            })
            .buffered(self.max_in_flight)
            .try_collect()
            .await
    }

    fn attach(arena: &mut Vec<Slot>, parent: usize, entry: NamespaceEntry) -> usize {
        let node = FolderNode::child_of(&arena[parent].node, entry.id, entry.name);
        let index = arena.len();
        arena.push(Slot {
            node,
            children: Vec::new(),
        });
        arena[parent].children.push(index);
        index
    }

    /// Turn the arena into owned trees. Children always sit at higher indices
    /// than their parent, so a single reverse pass sees every child first.
    fn assemble(arena: Vec<Slot>, roots: &[usize]) -> Vec<FolderNode> {
        let mut built: Vec<Option<FolderNode>> = Vec::with_capacity(arena.len());
        built.resize_with(arena.len(), || None);

        for (index, slot) in arena.into_iter().enumerate().rev() {
            let mut node = slot.node;
            node.children = slot
                .children
                .iter()
                .filter_map(|c| built[*c].take())
                .collect();
            built[index] = Some(node);
        }

        roots.iter().filter_map(|r| built[*r].take()).collect()
    }
}
