//! Racing variant: speed/position integration, lap detection and finish

use serde::{Deserialize, Serialize};

use super::state::{clamp_counter, clamp_f32, in_range, Side, Vec2};
use super::HeldInput;
use crate::util::time::tick_delta;

pub const TRACK_MIN_X: f32 = 70.0;
pub const TRACK_MAX_X: f32 = 530.0;
pub const TRACK_LENGTH: f32 = 1000.0;
/// A lap completes when y wraps from above `FINISH_HIGH` to below `FINISH_LOW`
pub const FINISH_HIGH: f32 = 900.0;
pub const FINISH_LOW: f32 = 100.0;
/// Track distance covered per unit of speed per second
pub const DISTANCE_SCALE: f32 = 2.0;

pub const PLAYER_MAX_SPEED: f32 = 140.0;
pub const AI_CRUISE_MAX_SPEED: f32 = 150.0;
pub const AI_OVERTAKE_MAX_SPEED: f32 = 160.0;
pub const AI_MIN_SPEED: f32 = 60.0;

pub const ACCELERATION: f32 = 2.0;
pub const BRAKE_FORCE: f32 = 4.0;
pub const COAST_DRAG: f32 = 0.5;
pub const STEER_STEP: f32 = 5.0;
pub const TOTAL_LAPS: u32 = 3;

/// Gap under which two cars count as side by side
pub const OVERTAKE_RANGE_Y: f32 = 40.0;
pub const OVERTAKE_RANGE_X: f32 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceControl {
    Accelerate,
    Brake,
    SteerLeft,
    SteerRight,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RacePhase {
    Racing,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RacingState {
    pub player: Vec2,
    pub ai: Vec2,
    pub player_speed: f32,
    pub ai_speed: f32,
    pub player_lap: u32,
    pub ai_lap: u32,
    pub phase: RacePhase,
    pub winner: Option<Side>,
}

impl Default for RacingState {
    fn default() -> Self {
        Self {
            player: Vec2::new(230.0, 0.0),
            ai: Vec2::new(370.0, 0.0),
            player_speed: 0.0,
            ai_speed: AI_MIN_SPEED,
            player_lap: 0,
            ai_lap: 0,
            phase: RacePhase::Racing,
            winner: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RacingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<Vec2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai: Option<Vec2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_lap: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_lap: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<RacePhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Side>,
}

impl RacingPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn clamp_car(p: Vec2) -> Vec2 {
    Vec2::new(
        clamp_f32(p.x, TRACK_MIN_X, TRACK_MAX_X),
        wrap_track(p.y),
    )
}

/// Map any track coordinate into `[0, TRACK_LENGTH)`; non-finite values restart at 0
fn wrap_track(y: f32) -> f32 {
    if !y.is_finite() {
        return 0.0;
    }
    let wrapped = y.rem_euclid(TRACK_LENGTH);
    if wrapped >= TRACK_LENGTH {
        0.0
    } else {
        wrapped
    }
}

impl RacingState {
    pub fn merge(&mut self, patch: &RacingPatch) {
        if let Some(v) = patch.player {
            self.player = v;
        }
        if let Some(v) = patch.ai {
            self.ai = v;
        }
        if let Some(v) = patch.player_speed {
            self.player_speed = v;
        }
        if let Some(v) = patch.ai_speed {
            self.ai_speed = v;
        }
        if let Some(v) = patch.player_lap {
            self.player_lap = clamp_counter(self.player_lap, v);
        }
        if let Some(v) = patch.ai_lap {
            self.ai_lap = clamp_counter(self.ai_lap, v);
        }
        if let Some(v) = patch.phase {
            self.phase = v;
        }
        if let Some(v) = patch.winner {
            self.winner = Some(v);
        }
        self.clamp_to_bounds();
    }

    pub fn clamp_to_bounds(&mut self) {
        self.player = clamp_car(self.player);
        self.ai = clamp_car(self.ai);
        self.player_speed = clamp_f32(self.player_speed, 0.0, PLAYER_MAX_SPEED);
        self.ai_speed = clamp_f32(self.ai_speed, 0.0, AI_OVERTAKE_MAX_SPEED);
    }

    pub fn within_bounds(&self) -> bool {
        in_range(self.player.x, TRACK_MIN_X, TRACK_MAX_X)
            && in_range(self.ai.x, TRACK_MIN_X, TRACK_MAX_X)
            && self.player.y >= 0.0
            && self.player.y < TRACK_LENGTH
            && self.ai.y >= 0.0
            && self.ai.y < TRACK_LENGTH
            && in_range(self.player_speed, 0.0, PLAYER_MAX_SPEED)
            && in_range(self.ai_speed, 0.0, AI_OVERTAKE_MAX_SPEED)
    }
}

/// Derived: the cars are close enough that one is passing the other
pub fn is_overtaking(state: &RacingState) -> bool {
    let dy = (state.player.y - state.ai.y).abs();
    let dy = dy.min(TRACK_LENGTH - dy);
    dy < OVERTAKE_RANGE_Y && (state.player.x - state.ai.x).abs() < OVERTAKE_RANGE_X
}

fn advance(y: f32, speed: f32) -> f32 {
    wrap_track(y + speed * DISTANCE_SCALE * tick_delta())
}

/// Apply a single control to the player's car
pub fn apply_control(state: &RacingState, control: RaceControl) -> RacingPatch {
    let mut patch = RacingPatch::default();
    if state.phase == RacePhase::Finished {
        patch.player_speed = Some(0.0);
        return patch;
    }
    match control {
        RaceControl::Accelerate => {
            patch.player_speed = Some((state.player_speed + ACCELERATION).min(PLAYER_MAX_SPEED));
        }
        RaceControl::Brake => {
            patch.player_speed = Some((state.player_speed - BRAKE_FORCE).max(0.0));
        }
        RaceControl::SteerLeft => {
            let x = clamp_f32(state.player.x - STEER_STEP, TRACK_MIN_X, TRACK_MAX_X);
            patch.player = Some(Vec2::new(x, state.player.y));
        }
        RaceControl::SteerRight => {
            let x = clamp_f32(state.player.x + STEER_STEP, TRACK_MIN_X, TRACK_MAX_X);
            patch.player = Some(Vec2::new(x, state.player.y));
        }
        RaceControl::Other => {
            patch.player_speed = Some((state.player_speed - COAST_DRAG).max(0.0));
        }
    }
    patch
}

/// Advance both cars by one tick; the player's car follows held input
pub fn physics_step(state: &RacingState, input: &HeldInput) -> RacingPatch {
    let mut patch = RacingPatch::default();
    if state.phase == RacePhase::Finished {
        return patch;
    }

    let mut speed = state.player_speed;
    if input.up {
        speed += ACCELERATION;
    } else if input.down {
        speed -= BRAKE_FORCE;
    } else {
        speed -= COAST_DRAG;
    }
    let speed = clamp_f32(speed, 0.0, PLAYER_MAX_SPEED);

    let mut x = state.player.x;
    if input.left {
        x -= STEER_STEP;
    }
    if input.right {
        x += STEER_STEP;
    }
    let x = clamp_f32(x, TRACK_MIN_X, TRACK_MAX_X);

    let player = Vec2::new(x, advance(state.player.y, speed));
    if player != state.player {
        patch.player = Some(player);
    }
    if speed != state.player_speed {
        patch.player_speed = Some(speed);
    }

    let ai = Vec2::new(state.ai.x, advance(state.ai.y, state.ai_speed));
    if ai != state.ai {
        patch.ai = Some(ai);
    }
    patch
}

/// Lateral move clamped to the track
pub fn shift_x(car: Vec2, dx: f32) -> Vec2 {
    Vec2::new(clamp_f32(car.x + dx, TRACK_MIN_X, TRACK_MAX_X), car.y)
}

/// Forward drift applied to the AI car outside of normal integration
pub fn drift(y: f32, distance: f32) -> f32 {
    wrap_track(y + distance)
}

pub fn crossed_finish(before: f32, after: f32) -> bool {
    before > FINISH_HIGH && after < FINISH_LOW
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceEvent {
    LapCompleted { side: Side, lap: u32 },
    Finished { winner: Side },
}

/// Lap and finish rules, comparing the state at tick start with the current one
pub fn lap_step(before: &RacingState, after: &RacingState) -> (RacingPatch, Vec<RaceEvent>) {
    let mut patch = RacingPatch::default();
    let mut events = Vec::new();
    if after.phase == RacePhase::Finished {
        return (patch, events);
    }

    let mut player_lap = after.player_lap;
    let mut ai_lap = after.ai_lap;

    if crossed_finish(before.player.y, after.player.y) {
        player_lap += 1;
        patch.player_lap = Some(i64::from(player_lap));
        events.push(RaceEvent::LapCompleted {
            side: Side::Player,
            lap: player_lap,
        });
    }
    if crossed_finish(before.ai.y, after.ai.y) {
        ai_lap += 1;
        patch.ai_lap = Some(i64::from(ai_lap));
        events.push(RaceEvent::LapCompleted {
            side: Side::Ai,
            lap: ai_lap,
        });
    }

    let winner = if player_lap >= TOTAL_LAPS {
        Some(Side::Player)
    } else if ai_lap >= TOTAL_LAPS {
        Some(Side::Ai)
    } else {
        None
    };
    if let Some(winner) = winner {
        patch.phase = Some(RacePhase::Finished);
        patch.winner = Some(winner);
        patch.player_speed = Some(0.0);
        patch.ai_speed = Some(0.0);
        events.push(RaceEvent::Finished { winner });
    }

    (patch, events)
}
