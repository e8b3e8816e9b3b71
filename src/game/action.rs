//! Player action inputs and the immutable `PlayerAction` records sent upstream

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::badminton::{self, ShotKind};
use super::fighting::{self, FightMove};
use super::racing::{self, RaceControl};
use super::state::{GameState, GameVariant, StatePatch, Vec3};
use crate::util::rng::RandomSource;
use crate::util::time::unix_millis;

fn default_power() -> f32 {
    0.5
}

/// What the player asked for, before any hit test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum ActionInput {
    Fighting {
        #[serde(rename = "move")]
        kind: FightMove,
    },
    Badminton {
        shot: ShotKind,
        #[serde(default = "default_power")]
        power: f32,
    },
    Racing {
        control: RaceControl,
    },
}

impl ActionInput {
    pub fn variant(&self) -> GameVariant {
        match self {
            ActionInput::Fighting { .. } => GameVariant::Fighting,
            ActionInput::Badminton { .. } => GameVariant::Badminton,
            ActionInput::Racing { .. } => GameVariant::Racing,
        }
    }
}

/// Score/health/rally/lap values at submission time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_health: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_health: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combo_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rally_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lap: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
}

impl ActionContext {
    pub fn capture(state: &GameState) -> Self {
        match state {
            GameState::Fighting(s) => Self {
                player_health: Some(s.player_health),
                ai_health: Some(s.ai_health),
                combo_count: Some(s.combo_count),
                ..Default::default()
            },
            GameState::Badminton(s) => Self {
                rally_count: Some(s.rally_count),
                player_score: Some(s.player_score),
                ai_score: Some(s.ai_score),
                ..Default::default()
            },
            GameState::Racing(s) => Self {
                lap: Some(s.player_lap),
                speed: Some(s.player_speed),
                ..Default::default()
            },
        }
    }
}

/// A player action as dispatched. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerAction {
    pub id: Uuid,
    #[serde(flatten)]
    pub input: ActionInput,
    pub position: Vec3,
    pub success: bool,
    pub context: ActionContext,
    pub timestamp: u64,
}

impl PlayerAction {
    pub fn variant(&self) -> GameVariant {
        self.input.variant()
    }

    /// Movement-only actions are emitted by the simulation, not by the player
    pub fn is_movement(&self) -> bool {
        matches!(
            self.input,
            ActionInput::Fighting {
                kind: FightMove::Move
            }
        )
    }

    fn new(input: ActionInput, position: Vec3, success: bool, state: &GameState) -> Self {
        Self {
            id: Uuid::new_v4(),
            input,
            position,
            success,
            context: ActionContext::capture(state),
            timestamp: unix_millis(),
        }
    }

    /// Movement record for the fighting variant
    pub fn movement(state: &GameState) -> Self {
        let position = actor_position(state);
        Self::new(
            ActionInput::Fighting {
                kind: FightMove::Move,
            },
            position,
            true,
            state,
        )
    }
}

fn actor_position(state: &GameState) -> Vec3 {
    match state {
        GameState::Fighting(s) => Vec3::new(s.player.x, s.player.y, 0.0),
        GameState::Badminton(s) => s.player,
        GameState::Racing(s) => Vec3::new(s.player.x, s.player.y, 0.0),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{input} action submitted while {state} state was supplied")]
pub struct ActionMismatch {
    pub input: GameVariant,
    pub state: GameVariant,
}

/// Run the local hit test / physics for `input` against `state`.
///
/// Returns the optimistic patch to apply locally and the action record to
/// dispatch. The context captures the state at submission time.
pub fn resolve(
    state: &GameState,
    input: ActionInput,
    rng: &mut dyn RandomSource,
) -> Result<(StatePatch, PlayerAction), ActionMismatch> {
    let position = actor_position(state);

    let (patch, success) = match (state, input) {
        (GameState::Fighting(s), ActionInput::Fighting { kind }) => {
            let outcome = fighting::resolve_player_attack(s, kind);
            (StatePatch::Fighting(outcome.patch), outcome.success)
        }
        (GameState::Badminton(s), ActionInput::Badminton { shot, power }) => {
            let outcome = badminton::resolve_player_shot(s, shot, power, rng);
            (StatePatch::Badminton(outcome.patch), outcome.success)
        }
        (GameState::Racing(s), ActionInput::Racing { control }) => {
            (StatePatch::Racing(racing::apply_control(s, control)), true)
        }
        _ => {
            return Err(ActionMismatch {
                input: input.variant(),
                state: state.variant(),
            })
        }
    };

    let action = PlayerAction::new(input, position, success, state);
    Ok((patch, action))
}
