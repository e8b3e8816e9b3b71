//! Reconciliation of local optimistic state with the remote service

pub mod bridge;
pub mod reconcile;

pub use bridge::ActionBridge;
pub use reconcile::{DeltaOrigin, LastWriterWins, ReconcilePolicy};
