//! Collaborator boundaries.
//!
//! The engine never talks to a network directly. Namespace listings and
//! directory reads/writes go through these traits, so any transport
//! (Graph over HTTP, an in-memory mock, a local cache) can back them.
//! Implementations validate remote shapes at this boundary and report
//! malformed responses as [`TransportError::Malformed`].

pub mod graph;
pub mod mail;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::contacts::model::{ContactRecord, ExistingDirectoryEntry};
use crate::error::TransportError;

pub use graph::GraphClient;
pub use mail::MailItem;
pub use memory::{MemoryDirectory, MemoryNamespace};

/// One entry of a namespace listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceEntry {
    pub id: String,
    pub name: String,
    pub is_container: bool,
}

impl NamespaceEntry {
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_container: true,
        }
    }

    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_container: false,
        }
    }
}

/// Read-only access to the remote hierarchical document store.
#[async_trait]
pub trait NamespaceService: Send + Sync {
    /// List the direct children of a container. One call is one fetch.
    async fn list_children(
        &self,
        container_id: &str,
    ) -> Result<Vec<NamespaceEntry>, TransportError>;
}

/// Predicate used to look up a directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryFilter {
    /// Entry whose primary email address equals the value.
    EmailAddress(String),
    /// Entry whose display name equals the value.
    DisplayName(String),
}

impl DirectoryFilter {
    /// Graph OData `$filter` expression for this predicate.
    pub fn to_odata(&self) -> String {
        match self {
            Self::EmailAddress(address) => {
                format!("emailAddresses/any(a:a/address eq '{}')", escape_odata(address))
            }
            Self::DisplayName(name) => format!("displayName eq '{}'", escape_odata(name)),
        }
    }
}

/// Escape single quotes for an OData string literal.
fn escape_odata(value: &str) -> String {
    value.replace('\'', "''")
}

/// The contacts directory the reconciliation engine reads and writes.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Zero or one entry matching `filter`.
    async fn find(
        &self,
        filter: &DirectoryFilter,
    ) -> Result<Option<ExistingDirectoryEntry>, TransportError>;

    /// Create a new entry. Returns its identifier.
    async fn create(&self, record: &ContactRecord) -> Result<String, TransportError>;

    /// Overwrite the entry with identifier `id`.
    ///
    /// Must fail with [`TransportError::NotFound`] when `id` does not exist.
    async fn update(&self, id: &str, record: &ContactRecord) -> Result<(), TransportError>;
}
