//! Contact capture pipeline.
//!
//! 1. `signature::extract_contact()`: pull name, phone and postcode from the body
//! 2. `Reconciler::check()`: look the sender up in the directory and decide
//! 3. `Reconciler::confirm()` / `dismiss()`: act on the user's answer

pub mod guard;
pub mod model;
pub mod reconcile;
pub mod signature;

pub use guard::{PendingGuard, PendingTicket};
pub use model::{ContactRecord, ExistingDirectoryEntry, ReconciliationState};
pub use reconcile::{MutationOutcome, Reconciler, Reconciliation, StateTransition};
pub use signature::extract_contact;
