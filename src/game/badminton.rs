//! Badminton variant: court movement, discrete shots, shuttlecock flight and points

use serde::{Deserialize, Serialize};

use super::state::{clamp_counter, clamp_count, clamp_f32, in_range, Side, Vec3};
use super::HeldInput;
use crate::util::rng::RandomSource;

pub const COURT_HALF_WIDTH: f32 = 3.05;
pub const COURT_HALF_LENGTH: f32 = 6.7;
/// Players keep this far off the net line
pub const NET_CLEARANCE: f32 = 0.3;
pub const MAX_PLAYER_HEIGHT: f32 = 2.5;
pub const MAX_SHUTTLE_HEIGHT: f32 = 8.0;
pub const HIT_HEIGHT: f32 = 1.0;
pub const MAX_SHUTTLE_SPEED: f32 = 1.0;

/// Probability that a player shot is executed cleanly
pub const SHOT_SUCCESS_RATE: f32 = 0.8;
/// Ground distance within which a receiver can return the shuttle
pub const REACH: f32 = 1.5;
/// Ticks a receiver has to return a reachable shuttle
pub const RETURN_WINDOW_TICKS: u32 = 90;

pub const PLAYER_SPEED: f32 = 0.08;
pub const AI_DRIFT_SPEED: f32 = 0.06;

pub const PLAYER_HOME: Vec3 = Vec3::new(0.0, 0.0, 4.5);
pub const AI_HOME: Vec3 = Vec3::new(0.0, 0.0, -4.5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotKind {
    Clear,
    Drop,
    Smash,
    Drive,
    Net,
    #[serde(other)]
    Other,
}

impl ShotKind {
    /// Flight speed in metres per tick
    pub fn speed(self) -> f32 {
        match self {
            ShotKind::Clear => 0.18,
            ShotKind::Drop => 0.10,
            ShotKind::Smash => 0.35,
            ShotKind::Drive => 0.25,
            ShotKind::Net => 0.08,
            ShotKind::Other => 0.15,
        }
    }

    /// Landing depth band (distance from the net) as `(near, far)`
    fn depth_band(self) -> (f32, f32) {
        match self {
            ShotKind::Clear => (4.5, 6.5),
            ShotKind::Drop => (0.5, 2.0),
            ShotKind::Smash => (2.5, 5.0),
            ShotKind::Drive => (2.0, 4.0),
            ShotKind::Net => (0.3, 1.2),
            ShotKind::Other => (2.5, 4.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RallyPhase {
    /// Shuttle held by the server
    Serve,
    /// Shuttle travelling toward its target
    InFlight,
    /// Shuttle reachable, waiting for the receiver's return
    Receiving,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadmintonState {
    pub player: Vec3,
    pub ai: Vec3,
    pub shuttle: Vec3,
    pub shuttle_target: Vec3,
    pub shuttle_speed: f32,
    pub rally_count: u32,
    pub player_score: u32,
    pub ai_score: u32,
    pub last_hitter: Option<Side>,
    pub server: Side,
    pub phase: RallyPhase,
    pub return_timer: u32,
}

impl Default for BadmintonState {
    fn default() -> Self {
        let serve_spot = serve_position(PLAYER_HOME);
        Self {
            player: PLAYER_HOME,
            ai: AI_HOME,
            shuttle: serve_spot,
            shuttle_target: serve_spot,
            shuttle_speed: 0.0,
            rally_count: 0,
            player_score: 0,
            ai_score: 0,
            last_hitter: None,
            server: Side::Player,
            phase: RallyPhase::Serve,
            return_timer: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadmintonPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuttle: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuttle_target: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuttle_speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rally_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_hitter: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<RallyPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_timer: Option<i64>,
}

impl BadmintonPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn clamp_to_court(p: Vec3, z_min: f32, z_max: f32, y_max: f32) -> Vec3 {
    Vec3::new(
        clamp_f32(p.x, -COURT_HALF_WIDTH, COURT_HALF_WIDTH),
        clamp_f32(p.y, 0.0, y_max),
        clamp_f32(p.z, z_min, z_max),
    )
}

fn on_court(p: &Vec3, z_min: f32, z_max: f32, y_max: f32) -> bool {
    in_range(p.x, -COURT_HALF_WIDTH, COURT_HALF_WIDTH)
        && in_range(p.y, 0.0, y_max)
        && in_range(p.z, z_min, z_max)
}

/// Where the shuttle sits when `server` is about to serve
fn serve_position(server: Vec3) -> Vec3 {
    Vec3::new(server.x, HIT_HEIGHT, server.z)
}

impl BadmintonState {
    pub fn merge(&mut self, patch: &BadmintonPatch) {
        if let Some(v) = patch.player {
            self.player = v;
        }
        if let Some(v) = patch.ai {
            self.ai = v;
        }
        if let Some(v) = patch.shuttle {
            self.shuttle = v;
        }
        if let Some(v) = patch.shuttle_target {
            self.shuttle_target = v;
        }
        if let Some(v) = patch.shuttle_speed {
            self.shuttle_speed = v;
        }
        if let Some(v) = patch.rally_count {
            self.rally_count = clamp_counter(self.rally_count, v);
        }
        if let Some(v) = patch.player_score {
            self.player_score = clamp_counter(self.player_score, v);
        }
        if let Some(v) = patch.ai_score {
            self.ai_score = clamp_counter(self.ai_score, v);
        }
        if let Some(v) = patch.last_hitter {
            self.last_hitter = Some(v);
        }
        if let Some(v) = patch.server {
            self.server = v;
        }
        if let Some(v) = patch.phase {
            self.phase = v;
            if v == RallyPhase::Serve {
                self.last_hitter = None;
            }
        }
        if let Some(v) = patch.return_timer {
            self.return_timer = clamp_count(v);
        }
        self.clamp_to_bounds();
    }

    pub fn clamp_to_bounds(&mut self) {
        self.player = clamp_to_court(self.player, NET_CLEARANCE, COURT_HALF_LENGTH, MAX_PLAYER_HEIGHT);
        self.ai = clamp_to_court(self.ai, -COURT_HALF_LENGTH, -NET_CLEARANCE, MAX_PLAYER_HEIGHT);
        self.shuttle = clamp_to_court(self.shuttle, -COURT_HALF_LENGTH, COURT_HALF_LENGTH, MAX_SHUTTLE_HEIGHT);
        self.shuttle_target =
            clamp_to_court(self.shuttle_target, -COURT_HALF_LENGTH, COURT_HALF_LENGTH, MAX_SHUTTLE_HEIGHT);
        self.shuttle_speed = clamp_f32(self.shuttle_speed, 0.0, MAX_SHUTTLE_SPEED);
    }

    pub fn within_bounds(&self) -> bool {
        on_court(&self.player, NET_CLEARANCE, COURT_HALF_LENGTH, MAX_PLAYER_HEIGHT)
            && on_court(&self.ai, -COURT_HALF_LENGTH, -NET_CLEARANCE, MAX_PLAYER_HEIGHT)
            && on_court(&self.shuttle, -COURT_HALF_LENGTH, COURT_HALF_LENGTH, MAX_SHUTTLE_HEIGHT)
            && on_court(&self.shuttle_target, -COURT_HALF_LENGTH, COURT_HALF_LENGTH, MAX_SHUTTLE_HEIGHT)
            && in_range(self.shuttle_speed, 0.0, MAX_SHUTTLE_SPEED)
    }

    fn position_of(&self, side: Side) -> Vec3 {
        match side {
            Side::Player => self.player,
            Side::Ai => self.ai,
        }
    }
}

// ============================================================================
// Shots
// ============================================================================

/// Result of one player shot
#[derive(Debug, Clone, PartialEq)]
pub struct ShotOutcome {
    pub success: bool,
    pub patch: BadmintonPatch,
}

/// Resolve a player shot.
///
/// The rally counter advances on every processed shot; only a successful
/// shot (an 80% trial) launches the shuttlecock toward the AI's half.
pub fn resolve_player_shot(
    state: &BadmintonState,
    shot: ShotKind,
    power: f32,
    rng: &mut dyn RandomSource,
) -> ShotOutcome {
    let power = clamp_f32(power, 0.0, 1.0);
    let success = rng.chance(SHOT_SUCCESS_RATE);

    let mut patch = BadmintonPatch {
        rally_count: Some(i64::from(state.rally_count) + 1),
        ..Default::default()
    };

    if success {
        let (near, far) = shot.depth_band();
        let depth = near + (far - near) * power;
        let target = Vec3::new(-state.player.x, HIT_HEIGHT, -depth);
        launch(&mut patch, state.player, target, shot.speed(), Side::Player);
    }

    ShotOutcome { success, patch }
}

/// AI shot: always executed, target sampled over the player's half by kind
pub fn resolve_ai_shot(
    state: &BadmintonState,
    shot: ShotKind,
    confidence: f32,
    rng: &mut dyn RandomSource,
) -> BadmintonPatch {
    let (near, far) = shot.depth_band();
    let depth = rng.range(near, far);
    let x = match shot {
        // Smashes go for the sidelines
        ShotKind::Smash => {
            let magnitude = rng.range(1.5, COURT_HALF_WIDTH - 0.15);
            if rng.chance(0.5) {
                -magnitude
            } else {
                magnitude
            }
        }
        ShotKind::Clear => rng.range(-2.8, 2.8),
        ShotKind::Drop => rng.range(-2.5, 2.5),
        ShotKind::Other => rng.range(-1.5, 1.5),
        ShotKind::Drive | ShotKind::Net => rng.range(-2.0, 2.0),
    };
    let speed = shot.speed() * (0.8 + 0.4 * clamp_f32(confidence, 0.0, 1.0));

    let mut patch = BadmintonPatch {
        rally_count: Some(i64::from(state.rally_count) + 1),
        ..Default::default()
    };
    launch(&mut patch, state.ai, Vec3::new(x, HIT_HEIGHT, depth), speed, Side::Ai);
    patch
}

fn launch(patch: &mut BadmintonPatch, from: Vec3, target: Vec3, speed: f32, hitter: Side) {
    patch.shuttle = Some(serve_position(from));
    patch.shuttle_target = Some(target);
    patch.shuttle_speed = Some(speed);
    patch.last_hitter = Some(hitter);
    patch.phase = Some(RallyPhase::InFlight);
    patch.return_timer = Some(0);
}

/// Move the AI toward a ground point by at most `step`
pub fn ai_move_toward(state: &BadmintonState, goal_x: f32, goal_z: f32, step: f32) -> BadmintonPatch {
    let next = approach(state.ai, goal_x, goal_z, step);
    BadmintonPatch {
        ai: Some(next),
        ..Default::default()
    }
}

fn approach(from: Vec3, goal_x: f32, goal_z: f32, step: f32) -> Vec3 {
    let dx = goal_x - from.x;
    let dz = goal_z - from.z;
    let dist = (dx * dx + dz * dz).sqrt();
    if dist <= step || dist < f32::EPSILON {
        Vec3::new(goal_x, from.y, goal_z)
    } else {
        Vec3::new(from.x + dx / dist * step, from.y, from.z + dz / dist * step)
    }
}

// ============================================================================
// Physics
// ============================================================================

/// Player court movement from held input (up moves toward the net)
pub fn player_step(state: &BadmintonState, input: &HeldInput) -> BadmintonPatch {
    let mut next = state.player;
    if input.left {
        next.x -= PLAYER_SPEED;
    }
    if input.right {
        next.x += PLAYER_SPEED;
    }
    if input.up {
        next.z -= PLAYER_SPEED;
    }
    if input.down {
        next.z += PLAYER_SPEED;
    }
    let next = clamp_to_court(next, NET_CLEARANCE, COURT_HALF_LENGTH, MAX_PLAYER_HEIGHT);

    let mut patch = BadmintonPatch::default();
    if next != state.player {
        patch.player = Some(next);
    }
    patch
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointScored {
    pub winner: Side,
    pub player_score: u32,
    pub ai_score: u32,
}

/// Shuttle flight, AI receiver drift, and rally-end rules
pub fn rally_step(state: &BadmintonState) -> (BadmintonPatch, Option<PointScored>) {
    let mut patch = BadmintonPatch::default();

    match state.phase {
        RallyPhase::Serve => (patch, None),
        RallyPhase::InFlight => {
            if state.last_hitter == Some(Side::Player) {
                let drift = ai_move_toward(
                    state,
                    state.shuttle_target.x,
                    state.shuttle_target.z,
                    AI_DRIFT_SPEED,
                );
                patch.ai = drift.ai;
            }

            let remaining = state.shuttle.ground_distance(&state.shuttle_target);
            if remaining > state.shuttle_speed && state.shuttle_speed > 0.0 {
                let mut next = approach(
                    state.shuttle,
                    state.shuttle_target.x,
                    state.shuttle_target.z,
                    state.shuttle_speed,
                );
                let left = next.ground_distance(&state.shuttle_target);
                next.y = (HIT_HEIGHT + 0.3 * left).min(MAX_SHUTTLE_HEIGHT);
                patch.shuttle = Some(next);
                return (patch, None);
            }

            // Arrival
            patch.shuttle = Some(state.shuttle_target);
            let hitter = state.last_hitter.unwrap_or(state.server);
            let receiver = hitter.opponent();
            let receiver_pos = match (receiver, patch.ai) {
                (Side::Ai, Some(ai)) => ai,
                _ => state.position_of(receiver),
            };

            if receiver_pos.ground_distance(&state.shuttle_target) > REACH {
                return award_point(state, patch, hitter);
            }
            patch.phase = Some(RallyPhase::Receiving);
            patch.return_timer = Some(i64::from(RETURN_WINDOW_TICKS));
            (patch, None)
        }
        RallyPhase::Receiving => {
            if state.return_timer > 1 {
                patch.return_timer = Some(i64::from(state.return_timer) - 1);
                return (patch, None);
            }
            let hitter = state.last_hitter.unwrap_or(state.server);
            award_point(state, patch, hitter)
        }
    }
}

fn award_point(
    state: &BadmintonState,
    mut patch: BadmintonPatch,
    winner: Side,
) -> (BadmintonPatch, Option<PointScored>) {
    let (mut player_score, mut ai_score) = (state.player_score, state.ai_score);
    match winner {
        Side::Player => player_score += 1,
        Side::Ai => ai_score += 1,
    }
    patch.player_score = Some(i64::from(player_score));
    patch.ai_score = Some(i64::from(ai_score));

    let serve_spot = serve_position(state.position_of(winner));
    patch.shuttle = Some(serve_spot);
    patch.shuttle_target = Some(serve_spot);
    patch.shuttle_speed = Some(0.0);
    patch.server = Some(winner);
    patch.phase = Some(RallyPhase::Serve);
    patch.return_timer = Some(0);

    (
        patch,
        Some(PointScored {
            winner,
            player_score,
            ai_score,
        }),
    )
}
