//! Merge policy for remote state fragments

use serde_json::Value;
use tracing::debug;

use crate::game::store::StoreError;
use crate::game::{GameStateStore, GameVariant, StatePatch};

/// Where a remote fragment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOrigin {
    /// Response of a discrete confirmation call
    Confirmation,
    /// Unsolicited push over the streaming channel
    Stream,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Malformed state fragment: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Decides how a remote fragment lands on top of local state
pub trait ReconcilePolicy: Send {
    /// Apply `fragment` to `variant`. Returns whether anything changed.
    fn apply(
        &mut self,
        store: &mut GameStateStore,
        variant: GameVariant,
        origin: DeltaOrigin,
        fragment: &Value,
    ) -> Result<bool, ReconcileError>;
}

/// Fields present in a fragment overwrite local ones in the order fragments
/// complete, regardless of origin or of when the request was made.
#[derive(Debug, Default, Clone, Copy)]
pub struct LastWriterWins;

impl ReconcilePolicy for LastWriterWins {
    fn apply(
        &mut self,
        store: &mut GameStateStore,
        variant: GameVariant,
        origin: DeltaOrigin,
        fragment: &Value,
    ) -> Result<bool, ReconcileError> {
        let patch = StatePatch::from_fragment(variant, fragment)?;
        if patch.is_empty() {
            return Ok(false);
        }
        store.merge_partial(variant, &patch)?;
        debug!(game = %variant, ?origin, version = store.version(), "Applied remote fragment");
        Ok(true)
    }
}
