//! Folder placement pipeline.
//!
//! 1. `TreeBuilder::build()`: fetch a depth-bounded forest once per session
//! 2. `Target::for_selection()`: turn the selected attachments into targets
//! 3. `ScopeChain::suggest()`: score scope tiers in order, fall back when none match

pub mod model;
pub mod policy;
pub mod scorer;
pub mod tree;

pub use model::{Attachment, FolderNode, MatchCandidate, Suggestion};
pub use policy::{ExpansionPolicy, ExpansionRule, NameMatcher};
pub use scorer::{ScopeChain, ScopeTier, Strategy, Target};
pub use tree::TreeBuilder;
