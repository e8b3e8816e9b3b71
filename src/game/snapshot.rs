//! Immutable snapshots handed to the renderer and other observers

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::api::personality::PersonalityProfile;
use crate::util::time::unix_millis;
use crate::ws::channel::ChannelStatus;

use super::fighting::HIT_RANGE;
use super::interpreter::AiAction;
use super::racing::is_overtaking;
use super::state::{GameState, GameVariant};

/// Values computed from the state, never stored in it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Derived {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overtaking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_hit_range: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuttle_in_flight: Option<bool>,
}

impl Derived {
    pub fn from_state(state: &GameState) -> Self {
        match state {
            GameState::Fighting(s) => Self {
                in_hit_range: Some(s.horizontal_distance() < HIT_RANGE),
                ..Default::default()
            },
            GameState::Badminton(s) => Self {
                shuttle_in_flight: Some(s.phase == super::badminton::RallyPhase::InFlight),
                ..Default::default()
            },
            GameState::Racing(s) => Self {
                overtaking: Some(is_overtaking(s)),
                ..Default::default()
            },
        }
    }
}

/// Reconciliation counters reported alongside each snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub confirmations_applied: u64,
    pub confirmations_failed: u64,
    pub stream_deltas_applied: u64,
    pub malformed_discarded: u64,
    pub ai_actions_applied: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub session_id: Uuid,
    /// Store version this snapshot was taken at
    pub version: u64,
    pub tick: u64,
    pub active: GameVariant,
    pub state: GameState,
    pub derived: Derived,
    pub last_ai_action: Option<AiAction>,
    pub personality: Option<PersonalityProfile>,
    pub channel: ChannelStatus,
    pub stats: SyncStats,
    pub taken_at: u64,
}

impl Snapshot {
    pub fn new(session_id: Uuid, version: u64, tick: u64, state: GameState) -> Self {
        Self {
            session_id,
            version,
            tick,
            active: state.variant(),
            derived: Derived::from_state(&state),
            state,
            last_ai_action: None,
            personality: None,
            channel: ChannelStatus::Disconnected,
            stats: SyncStats::default(),
            taken_at: unix_millis(),
        }
    }
}

/// Change key: store version plus a counter for everything else in a snapshot
pub type SnapshotKey = (u64, u64);

/// Publishes snapshots over a watch channel, skipping unchanged ones
pub struct SnapshotPublisher {
    tx: watch::Sender<Arc<Snapshot>>,
    last_key: Option<SnapshotKey>,
    published: u64,
}

impl SnapshotPublisher {
    pub fn new(initial: Snapshot) -> (Self, watch::Receiver<Arc<Snapshot>>) {
        let (tx, rx) = watch::channel(Arc::new(initial));
        (
            Self {
                tx,
                last_key: None,
                published: 0,
            },
            rx,
        )
    }

    pub fn is_stale(&self, key: SnapshotKey) -> bool {
        self.last_key != Some(key)
    }

    /// Publish `snapshot` if `key` differs from the last published key
    pub fn publish(&mut self, key: SnapshotKey, snapshot: Snapshot) -> bool {
        if !self.is_stale(key) {
            return false;
        }
        self.last_key = Some(key);
        self.published += 1;
        // send_replace keeps the value even with no receivers
        self.tx.send_replace(Arc::new(snapshot));
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}
