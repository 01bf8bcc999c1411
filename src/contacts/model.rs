//! Contact data model.

use serde::{Deserialize, Serialize};

use crate::text;

/// Contact details extracted from a signature. `""` means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub organization: String,
    pub postcode: String,
}

impl ContactRecord {
    /// Identity used to key pending directory mutations.
    pub fn identity(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// An entry already present in the directory, reduced to the fields the
/// reconciliation compares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingDirectoryEntry {
    pub id: String,
    pub email: String,
    pub phone: String,
    pub organization: String,
}

impl ExistingDirectoryEntry {
    /// Whether the entry carries exactly the record's email, phone and
    /// organization (strict string equality).
    pub fn matches(&self, record: &ContactRecord) -> bool {
        self.email == record.email
            && self.phone == record.phone
            && self.organization == record.organization
    }
}

/// Organization guessed from the sender's domain: the first label,
/// capitalized (`jane@acme.co.uk` → `Acme`).
pub fn organization_from_email(email: &str) -> String {
    email
        .split_once('@')
        .and_then(|(_, domain)| domain.split('.').next())
        .map(text::capitalize)
        .unwrap_or_default()
}

/// Reconciliation decision for one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationState {
    /// Directory lookup not finished.
    Checking,
    /// No entry exists; create is offered.
    NotFound,
    /// Entry exists and agrees with the record; nothing to do.
    Unchanged,
    /// Entry exists but differs; update is offered.
    Changed,
    /// A create/update finished or the prompt was dismissed.
    Idle,
}

impl ReconciliationState {
    /// Decide the post-lookup state for `record` given the lookup result.
    pub fn decide(record: &ContactRecord, existing: Option<&ExistingDirectoryEntry>) -> Self {
        match existing {
            None => Self::NotFound,
            Some(entry) if entry.matches(record) => Self::Unchanged,
            Some(_) => Self::Changed,
        }
    }

    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: ReconciliationState) -> bool {
        use ReconciliationState::*;

        matches!(
            (self, target),
            (Checking, NotFound) | (Checking, Unchanged) | (Checking, Changed) |
            (NotFound, Idle) | (Changed, Idle)
        )
    }

    /// Whether a create or update may be confirmed from this state.
    pub fn offers_mutation(&self) -> bool {
        matches!(self, Self::NotFound | Self::Changed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unchanged | Self::Idle)
    }
}

impl std::fmt::Display for ReconciliationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Checking => "checking",
            Self::NotFound => "not_found",
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::Idle => "idle",
        };
        write!(f, "{s}")
    }
}
