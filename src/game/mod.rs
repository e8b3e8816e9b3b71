//! Game state, per-variant physics and the local simulation

pub mod action;
pub mod badminton;
pub mod fighting;
pub mod interpreter;
pub mod racing;
pub mod simulation;
pub mod snapshot;
pub mod state;
pub mod store;

pub use action::{ActionInput, PlayerAction};
pub use interpreter::AiAction;
pub use simulation::SimulationLoop;
pub use snapshot::{Snapshot, SnapshotPublisher};
pub use state::{GameState, GameVariant, StatePatch};
pub use store::GameStateStore;

use serde::{Deserialize, Serialize};

/// Keys/pointer held since the last tick (reported by the renderer)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldInput {
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
}
