//! Reconciliation Engine.
//!
//! Compares an extracted [`ContactRecord`] with what the directory already
//! holds and drives at most one create or update per cycle. Every step is
//! recorded as a [`StateTransition`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::contacts::guard::PendingGuard;
use crate::contacts::model::{ContactRecord, ExistingDirectoryEntry, ReconciliationState};
use crate::error::{ReconcileError, TransportError};
use crate::services::{DirectoryFilter, DirectoryService};

/// A state transition event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ReconciliationState,
    pub to: ReconciliationState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// What a confirmed action did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MutationOutcome {
    Created { id: String },
    Updated { id: String },
}

/// One reconciliation cycle for one contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconciliation {
    pub record: ContactRecord,
    pub existing: Option<ExistingDirectoryEntry>,
    state: ReconciliationState,
    transitions: Vec<StateTransition>,
}

impl Reconciliation {
    /// Start a cycle in `Checking`.
    pub fn new(record: ContactRecord) -> Self {
        Self {
            record,
            existing: None,
            state: ReconciliationState::Checking,
            transitions: Vec::new(),
        }
    }

    /// Apply a lookup result and move out of `Checking`.
    pub fn resolve(
        &mut self,
        existing: Option<ExistingDirectoryEntry>,
    ) -> Result<ReconciliationState, ReconcileError> {
        let decided = ReconciliationState::decide(&self.record, existing.as_ref());
        let reason = match &existing {
            None => "no directory entry".to_string(),
            Some(entry) => format!("directory entry {}", entry.id),
        };
        self.transition_to(decided, Some(reason), "resolve")?;
        self.existing = existing;
        Ok(decided)
    }

    pub fn state(&self) -> ReconciliationState {
        self.state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Whether the UI should offer a create (`NotFound`) or update (`Changed`).
    pub fn offers_mutation(&self) -> bool {
        self.state.offers_mutation()
    }

    fn transition_to(
        &mut self,
        new_state: ReconciliationState,
        reason: Option<String>,
        action: &str,
    ) -> Result<(), ReconcileError> {
        if !self.state.can_transition_to(new_state) {
            return Err(ReconcileError::InvalidTransition {
                from: self.state.to_string(),
                action: action.to_string(),
            });
        }

        self.transitions.push(StateTransition {
            from: self.state,
            to: new_state,
            timestamp: Utc::now(),
            reason,
        });
        self.state = new_state;
        Ok(())
    }
}

/// Drives reconciliation cycles against a directory.
///
/// The guard is owned by the reconciler and shared by every cycle it runs,
/// so two cycles for the same contact cannot mutate concurrently.
pub struct Reconciler {
    directory: Arc<dyn DirectoryService>,
    guard: PendingGuard,
}

impl Reconciler {
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self {
            directory,
            guard: PendingGuard::new(),
        }
    }

    /// Share an existing guard, e.g. between reconcilers for the same directory.
    pub fn with_guard(mut self, guard: PendingGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn guard(&self) -> &PendingGuard {
        &self.guard
    }

    /// Look the contact up by email and decide the cycle's state.
    ///
    /// A lookup failure is returned as-is; no cycle is produced.
    pub async fn check(&self, record: ContactRecord) -> Result<Reconciliation, ReconcileError> {
        let mut cycle = Reconciliation::new(record);
        let filter = DirectoryFilter::EmailAddress(cycle.record.email.clone());

        let existing = self.directory.find(&filter).await.map_err(|e| {
            warn!(contact = %cycle.record.identity(), error = %e, "Directory lookup failed");
            e
        })?;

        let state = cycle.resolve(existing)?;
        info!(contact = %cycle.record.identity(), state = %state, "Contact reconciled");
        Ok(cycle)
    }

    /// Run the create (`NotFound`) or update (`Changed`) the user confirmed.
    ///
    /// The cycle ends in `Idle` whether the call succeeds or fails. A
    /// concurrent confirm for the same contact is rejected with
    /// [`ReconcileError::OperationPending`] and leaves its cycle untouched.
    pub async fn confirm(
        &self,
        cycle: &mut Reconciliation,
    ) -> Result<MutationOutcome, ReconcileError> {
        if !cycle.offers_mutation() {
            return Err(ReconcileError::InvalidTransition {
                from: cycle.state.to_string(),
                action: "confirm".to_string(),
            });
        }

        let contact = cycle.record.identity();
        let Some(_ticket) = self.guard.try_acquire(&contact) else {
            return Err(ReconcileError::OperationPending { contact });
        };

        let result = self.mutate(cycle).await;

        let reason = match &result {
            Ok(MutationOutcome::Created { id }) => format!("created {id}"),
            Ok(MutationOutcome::Updated { id }) => format!("updated {id}"),
            Err(e) => format!("failed: {e}"),
        };
        cycle.transition_to(ReconciliationState::Idle, Some(reason), "confirm")?;

        match &result {
            Ok(outcome) => info!(contact = %contact, ?outcome, "Directory updated"),
            Err(e) => warn!(contact = %contact, error = %e, "Directory mutation failed"),
        }
        result
    }

    async fn mutate(&self, cycle: &Reconciliation) -> Result<MutationOutcome, ReconcileError> {
        match (&cycle.state, &cycle.existing) {
            (ReconciliationState::NotFound, _) => {
                let id = self.directory.create(&cycle.record).await?;
                Ok(MutationOutcome::Created { id })
            }
            (ReconciliationState::Changed, Some(entry)) => {
                match self.directory.update(&entry.id, &cycle.record).await {
                    Ok(()) => Ok(MutationOutcome::Updated {
                        id: entry.id.clone(),
                    }),
                    Err(TransportError::NotFound { .. }) => Err(ReconcileError::StaleReference {
                        id: entry.id.clone(),
                    }),
                    Err(e) => Err(e.into()),
                }
            }
            (state, _) => Err(ReconcileError::InvalidTransition {
                from: state.to_string(),
                action: "confirm".to_string(),
            }),
        }
    }

    /// Close the prompt without touching the directory.
    pub fn dismiss(&self, cycle: &mut Reconciliation) -> Result<(), ReconcileError> {
        cycle.transition_to(
            ReconciliationState::Idle,
            Some("dismissed".to_string()),
            "dismiss",
        )?;
        debug!(contact = %cycle.record.identity(), "Prompt dismissed");
        Ok(())
    }
}
