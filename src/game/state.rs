//! Tagged per-variant game state, partial patches and shared bounds helpers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::badminton::{BadmintonPatch, BadmintonState};
use super::fighting::{FightingPatch, FightingState};
use super::racing::{RacingPatch, RacingState};

/// The three mini-games a session can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    Fighting,
    Badminton,
    Racing,
}

impl GameVariant {
    pub const ALL: [GameVariant; 3] = [
        GameVariant::Fighting,
        GameVariant::Badminton,
        GameVariant::Racing,
    ];

    /// Path segment used by the remote service
    pub fn as_str(self) -> &'static str {
        match self {
            GameVariant::Fighting => "fighting",
            GameVariant::Badminton => "badminton",
            GameVariant::Racing => "racing",
        }
    }
}

impl Default for GameVariant {
    fn default() -> Self {
        Self::Fighting
    }
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown game variant: {0}")]
pub struct UnknownVariant(pub String);

impl FromStr for GameVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fighting" => Ok(Self::Fighting),
            "badminton" => Ok(Self::Badminton),
            "racing" => Ok(Self::Racing),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Which competitor an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player,
    Ai,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::Player => Side::Ai,
            Side::Ai => Side::Player,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Distance on the ground plane (x/z)
    pub fn ground_distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }
}

// ============================================================================
// Bounds helpers
// ============================================================================

/// Clamp a scalar into `[min, max]`; NaN collapses to `min`
pub fn clamp_f32(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

pub fn in_range(value: f32, min: f32, max: f32) -> bool {
    value >= min && value <= max
}

/// Resolve an incoming counter against its previous value.
///
/// Counters never decrease outside an explicit reset, so the previous value
/// is the lower bound.
pub fn clamp_counter(previous: u32, incoming: i64) -> u32 {
    let floor = i64::from(previous);
    incoming.clamp(floor, i64::from(u32::MAX)) as u32
}

/// Resolve an incoming non-monotonic count (e.g. combo) into `u32`
pub fn clamp_count(incoming: i64) -> u32 {
    incoming.clamp(0, i64::from(u32::MAX)) as u32
}

// ============================================================================
// Tagged state and patch
// ============================================================================

/// Full state of one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum GameState {
    Fighting(FightingState),
    Badminton(BadmintonState),
    Racing(RacingState),
}

impl GameState {
    /// Fresh state used at session start and on reset
    pub fn initial(variant: GameVariant) -> Self {
        match variant {
            GameVariant::Fighting => GameState::Fighting(FightingState::default()),
            GameVariant::Badminton => GameState::Badminton(BadmintonState::default()),
            GameVariant::Racing => GameState::Racing(RacingState::default()),
        }
    }

    pub fn variant(&self) -> GameVariant {
        match self {
            GameState::Fighting(_) => GameVariant::Fighting,
            GameState::Badminton(_) => GameVariant::Badminton,
            GameState::Racing(_) => GameVariant::Racing,
        }
    }

    /// True when every clamped field lies within its documented bounds
    pub fn within_bounds(&self) -> bool {
        match self {
            GameState::Fighting(s) => s.within_bounds(),
            GameState::Badminton(s) => s.within_bounds(),
            GameState::Racing(s) => s.within_bounds(),
        }
    }

    /// Bare field object (no variant tag), as sent in `action_data`
    pub fn fields_json(&self) -> Value {
        let fields = match self {
            GameState::Fighting(s) => serde_json::to_value(s),
            GameState::Badminton(s) => serde_json::to_value(s),
            GameState::Racing(s) => serde_json::to_value(s),
        };
        fields.unwrap_or(Value::Null)
    }
}

/// Field-level partial update for one variant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum StatePatch {
    Fighting(FightingPatch),
    Badminton(BadmintonPatch),
    Racing(RacingPatch),
}

impl StatePatch {
    pub fn variant(&self) -> GameVariant {
        match self {
            StatePatch::Fighting(_) => GameVariant::Fighting,
            StatePatch::Badminton(_) => GameVariant::Badminton,
            StatePatch::Racing(_) => GameVariant::Racing,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            StatePatch::Fighting(p) => p.is_empty(),
            StatePatch::Badminton(p) => p.is_empty(),
            StatePatch::Racing(p) => p.is_empty(),
        }
    }

    /// Parse a remote `game_state` fragment as a patch for `variant`.
    ///
    /// Unknown keys are ignored; a present key with the wrong shape fails the
    /// whole fragment.
    pub fn from_fragment(variant: GameVariant, fragment: &Value) -> Result<Self, serde_json::Error> {
        Ok(match variant {
            GameVariant::Fighting => StatePatch::Fighting(FightingPatch::deserialize(fragment)?),
            GameVariant::Badminton => StatePatch::Badminton(BadmintonPatch::deserialize(fragment)?),
            GameVariant::Racing => StatePatch::Racing(RacingPatch::deserialize(fragment)?),
        })
    }
}
