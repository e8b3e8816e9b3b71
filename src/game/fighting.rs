//! Fighting variant: arena movement, melee hit tests, damage and rounds

use serde::{Deserialize, Serialize};

use super::state::{clamp_count, clamp_counter, clamp_f32, in_range, Side, Vec2};
use super::HeldInput;

pub const ARENA_MIN_X: f32 = 50.0;
pub const ARENA_MAX_X: f32 = 750.0;
pub const ARENA_MAX_Y: f32 = 200.0;
pub const MAX_HEALTH: f32 = 100.0;

/// Horizontal distance under which an attack connects
pub const HIT_RANGE: f32 = 80.0;
/// Damage of any connecting AI attack
pub const AI_HIT_DAMAGE: f32 = 12.0;

pub const WALK_SPEED: f32 = 4.0;
pub const JUMP_VELOCITY: f32 = 9.0;
pub const GRAVITY: f32 = 0.6;
/// Ticks between a knockout and the next round
pub const KO_PAUSE_TICKS: u32 = 120;

pub const PLAYER_SPAWN: Vec2 = Vec2::new(200.0, 0.0);
pub const AI_SPAWN: Vec2 = Vec2::new(600.0, 0.0);

/// Player move vocabulary; anything unrecognized lands in `Other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FightMove {
    Punch,
    Kick,
    Combo,
    /// Movement only, never an attack
    Move,
    #[serde(other)]
    Other,
}

impl FightMove {
    pub fn is_attack(self) -> bool {
        !matches!(self, FightMove::Move)
    }
}

/// Damage dealt by a connecting player move
pub fn move_damage(kind: FightMove, combo_count: u32) -> f32 {
    match kind {
        FightMove::Punch => 8.0,
        FightMove::Kick => 12.0,
        FightMove::Combo => 15.0 + 3.0 * combo_count as f32,
        FightMove::Move => 0.0,
        FightMove::Other => 5.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FightPhase {
    Fighting,
    Ko,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FightingState {
    pub player: Vec2,
    pub ai: Vec2,
    pub player_vel_y: f32,
    pub player_health: f32,
    pub ai_health: f32,
    pub is_player_turn: bool,
    pub combo_count: u32,
    pub round: u32,
    pub player_wins: u32,
    pub ai_wins: u32,
    pub phase: FightPhase,
    pub ko_timer: u32,
}

impl Default for FightingState {
    fn default() -> Self {
        Self {
            player: PLAYER_SPAWN,
            ai: AI_SPAWN,
            player_vel_y: 0.0,
            player_health: MAX_HEALTH,
            ai_health: MAX_HEALTH,
            is_player_turn: true,
            combo_count: 0,
            round: 1,
            player_wins: 0,
            ai_wins: 0,
            phase: FightPhase::Fighting,
            ko_timer: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FightingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<Vec2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai: Option<Vec2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_vel_y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_health: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_health: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_player_turn: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combo_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_wins: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_wins: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<FightPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ko_timer: Option<i64>,
}

impl FightingPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl FightingState {
    /// Overwrite present fields, then re-establish bounds
    pub fn merge(&mut self, patch: &FightingPatch) {
        if let Some(v) = patch.player {
            self.player = v;
        }
        if let Some(v) = patch.ai {
            self.ai = v;
        }
        if let Some(v) = patch.player_vel_y {
            self.player_vel_y = v;
        }
        if let Some(v) = patch.player_health {
            self.player_health = v;
        }
        if let Some(v) = patch.ai_health {
            self.ai_health = v;
        }
        if let Some(v) = patch.is_player_turn {
            self.is_player_turn = v;
        }
        if let Some(v) = patch.combo_count {
            self.combo_count = clamp_count(v);
        }
        if let Some(v) = patch.round {
            self.round = clamp_counter(self.round, v);
        }
        if let Some(v) = patch.player_wins {
            self.player_wins = clamp_counter(self.player_wins, v);
        }
        if let Some(v) = patch.ai_wins {
            self.ai_wins = clamp_counter(self.ai_wins, v);
        }
        if let Some(v) = patch.phase {
            self.phase = v;
        }
        if let Some(v) = patch.ko_timer {
            self.ko_timer = clamp_count(v);
        }
        self.clamp_to_bounds();
    }

    pub fn clamp_to_bounds(&mut self) {
        self.player.x = clamp_f32(self.player.x, ARENA_MIN_X, ARENA_MAX_X);
        self.player.y = clamp_f32(self.player.y, 0.0, ARENA_MAX_Y);
        self.ai.x = clamp_f32(self.ai.x, ARENA_MIN_X, ARENA_MAX_X);
        self.ai.y = clamp_f32(self.ai.y, 0.0, ARENA_MAX_Y);
        self.player_vel_y = clamp_f32(self.player_vel_y, -ARENA_MAX_Y, ARENA_MAX_Y);
        self.player_health = clamp_f32(self.player_health, 0.0, MAX_HEALTH);
        self.ai_health = clamp_f32(self.ai_health, 0.0, MAX_HEALTH);
    }

    pub fn within_bounds(&self) -> bool {
        in_range(self.player.x, ARENA_MIN_X, ARENA_MAX_X)
            && in_range(self.player.y, 0.0, ARENA_MAX_Y)
            && in_range(self.ai.x, ARENA_MIN_X, ARENA_MAX_X)
            && in_range(self.ai.y, 0.0, ARENA_MAX_Y)
            && in_range(self.player_health, 0.0, MAX_HEALTH)
            && in_range(self.ai_health, 0.0, MAX_HEALTH)
    }

    pub fn horizontal_distance(&self) -> f32 {
        (self.player.x - self.ai.x).abs()
    }
}

// ============================================================================
// Physics
// ============================================================================

/// Advance the player's fighter by one tick of held input.
///
/// Only fields that change are present in the returned patch, so an idle
/// grounded fighter yields an empty patch.
pub fn player_step(state: &FightingState, input: &HeldInput) -> FightingPatch {
    let mut patch = FightingPatch::default();
    if state.phase == FightPhase::Ko {
        return patch;
    }

    let mut x = state.player.x;
    if input.left {
        x -= WALK_SPEED;
    }
    if input.right {
        x += WALK_SPEED;
    }
    x = clamp_f32(x, ARENA_MIN_X, ARENA_MAX_X);

    let grounded = state.player.y <= 0.0;
    let mut vel_y = state.player_vel_y;
    if input.up && grounded {
        vel_y = JUMP_VELOCITY;
    }

    let mut y = state.player.y + vel_y;
    if y <= 0.0 {
        y = 0.0;
        vel_y = 0.0;
    } else {
        vel_y -= GRAVITY;
    }
    y = clamp_f32(y, 0.0, ARENA_MAX_Y);

    let position = Vec2::new(x, y);
    if position != state.player {
        patch.player = Some(position);
    }
    if vel_y != state.player_vel_y {
        patch.player_vel_y = Some(vel_y);
    }
    patch
}

/// Result of resolving one player attack
#[derive(Debug, Clone, PartialEq)]
pub struct AttackOutcome {
    pub success: bool,
    pub damage: f32,
    pub patch: FightingPatch,
}

/// Resolve a player move against the current state.
///
/// A hit lands iff it is the player's turn and the horizontal distance is
/// under `HIT_RANGE`. The combo counter grows only on a landed combo; any
/// other move or a miss resets it. Out of turn the move changes nothing.
pub fn resolve_player_attack(state: &FightingState, kind: FightMove) -> AttackOutcome {
    let mut patch = FightingPatch::default();

    if state.phase == FightPhase::Ko || !kind.is_attack() || !state.is_player_turn {
        return AttackOutcome {
            success: false,
            damage: 0.0,
            patch,
        };
    }

    let success = state.horizontal_distance() < HIT_RANGE;
    let mut damage = 0.0;

    if success {
        damage = move_damage(kind, state.combo_count);
        patch.ai_health = Some((state.ai_health - damage).max(0.0));
        let next_combo = if kind == FightMove::Combo {
            i64::from(state.combo_count) + 1
        } else {
            0
        };
        patch.combo_count = Some(next_combo);
    } else {
        patch.combo_count = Some(0);
    }
    patch.is_player_turn = Some(false);

    AttackOutcome {
        success,
        damage,
        patch,
    }
}

/// AI attack: fixed damage when in range on the AI's turn, hands the turn
/// back to the player
pub fn resolve_ai_attack(state: &FightingState) -> FightingPatch {
    let mut patch = FightingPatch {
        is_player_turn: Some(true),
        ..Default::default()
    };
    if state.phase == FightPhase::Fighting
        && !state.is_player_turn
        && state.horizontal_distance() < HIT_RANGE
    {
        patch.player_health = Some((state.player_health - AI_HIT_DAMAGE).max(0.0));
    }
    patch
}

/// Move the AI fighter horizontally; positive `step` closes distance.
///
/// Moving on its own turn spends the AI's turn. During a knockout pause the
/// fighter holds its position.
pub fn ai_shift(state: &FightingState, step: f32) -> FightingPatch {
    if state.phase == FightPhase::Ko {
        return FightingPatch {
            ai: Some(state.ai),
            ..Default::default()
        };
    }
    let direction = if state.player.x >= state.ai.x { 1.0 } else { -1.0 };
    let x = clamp_f32(state.ai.x + direction * step, ARENA_MIN_X, ARENA_MAX_X);
    FightingPatch {
        ai: Some(Vec2::new(x, state.ai.y)),
        is_player_turn: (!state.is_player_turn).then_some(true),
        ..Default::default()
    }
}

/// Round-boundary rules: knockout detection and the next-round restart
pub fn round_step(state: &FightingState) -> (FightingPatch, Option<RoundEvent>) {
    let mut patch = FightingPatch::default();

    match state.phase {
        FightPhase::Fighting => {
            let winner = if state.ai_health <= 0.0 {
                Some(Side::Player)
            } else if state.player_health <= 0.0 {
                Some(Side::Ai)
            } else {
                None
            };

            if let Some(winner) = winner {
                patch.phase = Some(FightPhase::Ko);
                patch.ko_timer = Some(i64::from(KO_PAUSE_TICKS));
                patch.combo_count = Some(0);
                match winner {
                    Side::Player => patch.player_wins = Some(i64::from(state.player_wins) + 1),
                    Side::Ai => patch.ai_wins = Some(i64::from(state.ai_wins) + 1),
                }
                return (patch, Some(RoundEvent::Knockout { winner }));
            }
            (patch, None)
        }
        FightPhase::Ko => {
            if state.ko_timer > 1 {
                patch.ko_timer = Some(i64::from(state.ko_timer) - 1);
                return (patch, None);
            }

            let round = state.round + 1;
            patch.phase = Some(FightPhase::Fighting);
            patch.ko_timer = Some(0);
            patch.round = Some(i64::from(round));
            patch.player_health = Some(MAX_HEALTH);
            patch.ai_health = Some(MAX_HEALTH);
            patch.player = Some(PLAYER_SPAWN);
            patch.ai = Some(AI_SPAWN);
            patch.player_vel_y = Some(0.0);
            patch.is_player_turn = Some(true);
            (patch, Some(RoundEvent::RoundStarted { round }))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    Knockout { winner: Side },
    RoundStarted { round: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_distance(distance: f32) -> FightingState {
        FightingState {
            player: Vec2::new(300.0, 0.0),
            ai: Vec2::new(300.0 + distance, 0.0),
            ..Default::default()
        }
    }

    #[test]
    fn punch_inside_range_hits_for_eight() {
        let mut state = at_distance(79.0);
        let outcome = resolve_player_attack(&state, FightMove::Punch);
        assert!(outcome.success);
        assert_eq!(outcome.damage, 8.0);
        state.merge(&outcome.patch);
        assert_eq!(state.ai_health, 92.0);
        assert!(!state.is_player_turn);
    }

    #[test]
    fn punch_outside_range_misses() {
        let mut state = at_distance(81.0);
        let outcome = resolve_player_attack(&state, FightMove::Punch);
        assert!(!outcome.success);
        state.merge(&outcome.patch);
        assert_eq!(state.ai_health, MAX_HEALTH);
    }

    #[test]
    fn damage_never_drops_health_below_zero() {
        let mut state = FightingState {
            ai_health: 3.0,
            ..at_distance(10.0)
        };
        let outcome = resolve_player_attack(&state, FightMove::Kick);
        state.merge(&outcome.patch);
        assert_eq!(state.ai_health, 0.0);
    }

    #[test]
    fn consecutive_combos_escalate_then_reset_on_miss() {
        let mut state = at_distance(40.0);
        let mut damages = Vec::new();
        for _ in 0..3 {
            // AI replies between player moves
            state.is_player_turn = true;
            let outcome = resolve_player_attack(&state, FightMove::Combo);
            damages.push(outcome.damage);
            state.merge(&outcome.patch);
        }
        assert_eq!(damages, vec![15.0, 18.0, 21.0]);
        assert_eq!(state.combo_count, 3);

        state.ai.x = state.player.x + 200.0;
        state.is_player_turn = true;
        let miss = resolve_player_attack(&state, FightMove::Combo);
        assert!(!miss.success);
        state.merge(&miss.patch);
        assert_eq!(state.combo_count, 0);
    }

    #[test]
    fn non_combo_move_resets_combo() {
        let mut state = FightingState {
            combo_count: 2,
            ..at_distance(20.0)
        };
        let outcome = resolve_player_attack(&state, FightMove::Punch);
        state.merge(&outcome.patch);
        assert_eq!(state.combo_count, 0);
    }

    #[test]
    fn unrecognized_move_deals_five() {
        let kind: FightMove = serde_json::from_str("\"uppercut\"").unwrap();
        assert_eq!(kind, FightMove::Other);
        let outcome = resolve_player_attack(&at_distance(10.0), kind);
        assert_eq!(outcome.damage, 5.0);
    }

    fn ai_turn_at(distance: f32) -> FightingState {
        FightingState {
            is_player_turn: false,
            ..at_distance(distance)
        }
    }

    #[test]
    fn ai_attack_uses_same_distance_test() {
        let hit = resolve_ai_attack(&ai_turn_at(50.0));
        assert_eq!(hit.player_health, Some(88.0));
        assert_eq!(hit.is_player_turn, Some(true));

        let miss = resolve_ai_attack(&ai_turn_at(120.0));
        assert_eq!(miss.player_health, None);
        assert!(!miss.is_empty());
    }

    #[test]
    fn attacks_only_land_on_their_own_turn() {
        let player_out_of_turn = resolve_player_attack(&ai_turn_at(10.0), FightMove::Punch);
        assert!(!player_out_of_turn.success);
        assert_eq!(player_out_of_turn.damage, 0.0);
        assert!(player_out_of_turn.patch.is_empty());

        let ai_out_of_turn = resolve_ai_attack(&at_distance(10.0));
        assert_eq!(ai_out_of_turn.player_health, None);
        assert_eq!(ai_out_of_turn.is_player_turn, Some(true));
    }

    #[test]
    fn turn_passes_player_to_ai_and_back() {
        let mut state = at_distance(10.0);
        state.merge(&resolve_player_attack(&state, FightMove::Kick).patch);
        assert!(!state.is_player_turn);
        assert!(!resolve_player_attack(&state, FightMove::Kick).success);

        state.merge(&ai_shift(&state, 5.0));
        assert!(state.is_player_turn);
        assert!(resolve_player_attack(&state, FightMove::Kick).success);
    }

    #[test]
    fn ai_holds_position_during_knockout() {
        let state = FightingState {
            phase: FightPhase::Ko,
            ko_timer: 30,
            ..ai_turn_at(200.0)
        };
        let patch = ai_shift(&state, 20.0);
        assert_eq!(patch.ai, Some(state.ai));
        assert_eq!(patch.is_player_turn, None);
    }

    #[test]
    fn idle_grounded_fighter_produces_no_patch() {
        let state = FightingState::default();
        assert!(player_step(&state, &HeldInput::default()).is_empty());
    }

    #[test]
    fn walking_stops_at_arena_edge() {
        let mut state = FightingState {
            player: Vec2::new(ARENA_MIN_X + 1.0, 0.0),
            ..Default::default()
        };
        let input = HeldInput {
            left: true,
            ..Default::default()
        };
        for _ in 0..10 {
            let patch = player_step(&state, &input);
            state.merge(&patch);
        }
        assert_eq!(state.player.x, ARENA_MIN_X);
    }

    #[test]
    fn jump_rises_then_lands() {
        let mut state = FightingState::default();
        let jump = HeldInput {
            up: true,
            ..Default::default()
        };
        state.merge(&player_step(&state, &jump));
        assert!(state.player.y > 0.0);

        for _ in 0..100 {
            state.merge(&player_step(&state, &HeldInput::default()));
        }
        assert_eq!(state.player.y, 0.0);
        assert_eq!(state.player_vel_y, 0.0);
    }

    #[test]
    fn knockout_then_next_round() {
        let mut state = FightingState {
            ai_health: 0.0,
            ..Default::default()
        };
        let (patch, event) = round_step(&state);
        assert_eq!(event, Some(RoundEvent::Knockout { winner: Side::Player }));
        state.merge(&patch);
        assert_eq!(state.phase, FightPhase::Ko);
        assert_eq!(state.player_wins, 1);

        let mut started = None;
        for _ in 0..KO_PAUSE_TICKS {
            let (patch, event) = round_step(&state);
            state.merge(&patch);
            if event.is_some() {
                started = event;
            }
        }
        assert_eq!(started, Some(RoundEvent::RoundStarted { round: 2 }));
        assert_eq!(state.phase, FightPhase::Fighting);
        assert_eq!(state.ai_health, MAX_HEALTH);
        assert_eq!(state.player_wins, 1);
    }

    #[test]
    fn merge_clamps_out_of_range_fields() {
        let mut state = FightingState::default();
        state.merge(&FightingPatch {
            player: Some(Vec2::new(-500.0, 9000.0)),
            ai_health: Some(-40.0),
            player_health: Some(250.0),
            round: Some(-3),
            ..Default::default()
        });
        assert!(state.within_bounds());
        assert_eq!(state.ai_health, 0.0);
        assert_eq!(state.player_health, MAX_HEALTH);
        assert_eq!(state.round, 1);
    }
}
