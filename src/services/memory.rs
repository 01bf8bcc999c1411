//! In-memory collaborators.
//!
//! Used by the test suite and for offline runs. Both record the calls they
//! receive and can be told to fail, so callers can exercise error paths.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::contacts::model::{ContactRecord, ExistingDirectoryEntry};
use crate::error::TransportError;
use crate::services::{DirectoryFilter, DirectoryService, NamespaceEntry, NamespaceService};

const NAMESPACE_SERVICE: &str = "memory namespace";
const DIRECTORY_SERVICE: &str = "memory directory";

// ── Namespace ───────────────────────────────────────────────────────

/// A namespace held as a parent → children map.
#[derive(Debug, Default)]
pub struct MemoryNamespace {
    children: HashMap<String, Vec<NamespaceEntry>>,
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MemoryNamespace {
    pub fn new(root_id: impl Into<String>) -> Self {
        let mut children = HashMap::new();
        children.insert(root_id.into(), Vec::new());
        Self {
            children,
            ..Default::default()
        }
    }

    /// Add a container under `parent_id`. Children keep insertion order.
    pub fn with_folder(
        mut self,
        parent_id: &str,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let entry = NamespaceEntry::folder(id, name);
        self.children.entry(entry.id.clone()).or_default();
        self.children
            .entry(parent_id.to_string())
            .or_default()
            .push(entry);
        self
    }

    /// Add a non-container item under `parent_id`.
    pub fn with_file(
        mut self,
        parent_id: &str,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.children
            .entry(parent_id.to_string())
            .or_default()
            .push(NamespaceEntry::file(id, name));
        self
    }

    /// Make listings of `container_id` fail with a 503.
    pub fn fail_on(mut self, container_id: impl Into<String>) -> Self {
        self.failing.push(container_id.into());
        self
    }

    /// Container ids listed so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl NamespaceService for MemoryNamespace {
    async fn list_children(
        &self,
        container_id: &str,
    ) -> Result<Vec<NamespaceEntry>, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(container_id.to_string());

        if self.failing.iter().any(|id| id == container_id) {
            return Err(TransportError::Status {
                service: NAMESPACE_SERVICE.to_string(),
                status: 503,
                context: format!("listing {container_id}"),
            });
        }

        self.children
            .get(container_id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound {
                service: NAMESPACE_SERVICE.to_string(),
                id: container_id.to_string(),
            })
    }
}

// ── Directory ───────────────────────────────────────────────────────

/// A contacts directory held in memory, keyed by generated UUIDs.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: Mutex<Vec<(String, ContactRecord)>>,
    latency: Option<Duration>,
    lookup_failure: Option<u16>,
    mutation_failure: Option<u16>,
    creates: Mutex<usize>,
    updates: Mutex<usize>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every create/update by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every lookup fail with `status`.
    pub fn fail_lookups_with(mut self, status: u16) -> Self {
        self.lookup_failure = Some(status);
        self
    }

    /// Make every create/update fail with `status`.
    pub fn fail_mutations_with(mut self, status: u16) -> Self {
        self.mutation_failure = Some(status);
        self
    }

    /// Seed an entry. Returns its id.
    pub fn insert(&self, record: ContactRecord) -> String {
        let id = Uuid::new_v4().to_string();
        self.lock_entries().push((id.clone(), record));
        id
    }

    /// Delete an entry, e.g. to simulate a concurrent removal.
    pub fn remove(&self, id: &str) -> Option<ContactRecord> {
        let mut entries = self.lock_entries();
        let pos = entries.iter().position(|(eid, _)| eid == id)?;
        Some(entries.remove(pos).1)
    }

    pub fn get(&self, id: &str) -> Option<ContactRecord> {
        self.lock_entries()
            .iter()
            .find(|(eid, _)| eid == id)
            .map(|(_, record)| record.clone())
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn create_calls(&self) -> usize {
        *self.creates.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn update_calls(&self) -> usize {
        *self.updates.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Vec<(String, ContactRecord)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn injected(&self, status: Option<u16>, context: &str) -> Result<(), TransportError> {
        match status {
            Some(status) => Err(TransportError::Status {
                service: DIRECTORY_SERVICE.to_string(),
                status,
                context: context.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn to_entry(id: &str, record: &ContactRecord) -> ExistingDirectoryEntry {
    ExistingDirectoryEntry {
        id: id.to_string(),
        email: record.email.clone(),
        phone: record.phone.clone(),
        organization: record.organization.clone(),
    }
}

#[async_trait]
impl DirectoryService for MemoryDirectory {
    async fn find(
        &self,
        filter: &DirectoryFilter,
    ) -> Result<Option<ExistingDirectoryEntry>, TransportError> {
        self.injected(self.lookup_failure, "lookup")?;

        let entries = self.lock_entries();
        let found = entries.iter().find(|(_, record)| match filter {
            DirectoryFilter::EmailAddress(address) => record.email.eq_ignore_ascii_case(address),
            DirectoryFilter::DisplayName(name) => record.name == *name,
        });
        Ok(found.map(|(id, record)| to_entry(id, record)))
    }

    async fn create(&self, record: &ContactRecord) -> Result<String, TransportError> {
        *self.creates.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        self.simulate_latency().await;
        self.injected(self.mutation_failure, "create")?;
        Ok(self.insert(record.clone()))
    }

    async fn update(&self, id: &str, record: &ContactRecord) -> Result<(), TransportError> {
        *self.updates.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        self.simulate_latency().await;
        self.injected(self.mutation_failure, "update")?;

        let mut entries = self.lock_entries();
        let slot = entries
            .iter_mut()
            .find(|(eid, _)| eid == id)
            .ok_or_else(|| TransportError::NotFound {
                service: DIRECTORY_SERVICE.to_string(),
                id: id.to_string(),
            })?;
        slot.1 = record.clone();
        Ok(())
    }
}
