//! Maps opaque AI action labels onto each variant's physics model

use serde::{Deserialize, Serialize};

use super::badminton::{self, BadmintonState, ShotKind, AI_HOME};
use super::fighting::{self, FightingState};
use super::racing::{self, RacingPatch, RacingState};
use super::state::{clamp_f32, GameState, StatePatch};
use crate::util::rng::RandomSource;

/// Action decided by the remote AI opponent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAction {
    pub current_game_action: String,
    #[serde(default)]
    pub strategy: String,
    pub confidence: f32,
}

impl AiAction {
    /// Lowercased label with spaces and dashes folded to underscores
    pub fn label(&self) -> String {
        self.current_game_action
            .trim()
            .to_ascii_lowercase()
            .replace(|c: char| c == ' ' || c == '-', "_")
    }

    /// Movement magnitude multiplier in `[0.5, 1.0]`
    fn intensity(&self) -> f32 {
        0.5 + 0.5 * clamp_f32(self.confidence, 0.0, 1.0)
    }
}

/// Fighting: how far one approach/retreat step moves the AI
pub const FIGHT_STEP: f32 = 20.0;
/// Fighting: drift toward the player for unrecognized labels
pub const FIGHT_DEFAULT_STEP: f32 = 10.0;
/// Racing: per-action speed deltas
pub const AI_ACCEL_STEP: f32 = 5.0;
pub const AI_OVERTAKE_STEP: f32 = 8.0;
pub const AI_BRAKE_STEP: f32 = 10.0;
pub const AI_DEFAULT_DECEL: f32 = 2.0;
pub const AI_DEFAULT_DRIFT: f32 = 2.0;
pub const AI_LATERAL_STEP: f32 = 15.0;

/// Resolve an AI action into a state delta for `state`'s variant.
///
/// Every label yields a non-empty patch; labels a variant does not know fall
/// back to that variant's default behaviour.
pub fn interpret(state: &GameState, action: &AiAction, rng: &mut dyn RandomSource) -> StatePatch {
    let label = action.label();
    match state {
        GameState::Fighting(s) => StatePatch::Fighting(interpret_fighting(s, &label, action)),
        GameState::Badminton(s) => StatePatch::Badminton(interpret_badminton(s, &label, action, rng)),
        GameState::Racing(s) => StatePatch::Racing(interpret_racing(s, &label, action)),
    }
}

fn interpret_fighting(
    state: &FightingState,
    label: &str,
    action: &AiAction,
) -> fighting::FightingPatch {
    match label {
        "attack" | "punch" | "kick" | "combo" | "aggressive" | "special" => {
            fighting::resolve_ai_attack(state)
        }
        "approach" | "advance" | "pressure" => fighting::ai_shift(state, FIGHT_STEP * action.intensity()),
        "retreat" | "defend" | "defensive" | "block" | "evade" => {
            fighting::ai_shift(state, -FIGHT_STEP * action.intensity())
        }
        // Unknown: keep pressure on by stepping in
        _ => fighting::ai_shift(state, FIGHT_DEFAULT_STEP),
    }
}

fn interpret_badminton(
    state: &BadmintonState,
    label: &str,
    action: &AiAction,
    rng: &mut dyn RandomSource,
) -> badminton::BadmintonPatch {
    let shot = match label {
        "clear" | "lob" | "high_clear" => Some(ShotKind::Clear),
        "drop" | "drop_shot" => Some(ShotKind::Drop),
        "smash" | "attack" | "aggressive" => Some(ShotKind::Smash),
        "drive" => Some(ShotKind::Drive),
        "net" | "net_shot" => Some(ShotKind::Net),
        _ => None,
    };
    if let Some(shot) = shot {
        return badminton::resolve_ai_shot(state, shot, action.confidence, rng);
    }

    match label {
        "defend" | "defensive" | "reset" => badminton::ai_move_toward(
            state,
            AI_HOME.x,
            AI_HOME.z,
            badminton::AI_DRIFT_SPEED * 10.0,
        ),
        "move" | "chase" | "position" => badminton::ai_move_toward(
            state,
            state.shuttle_target.x,
            state.shuttle_target.z.min(-badminton::NET_CLEARANCE),
            badminton::AI_DRIFT_SPEED * 10.0,
        ),
        // Unknown: a mid-court shot after stepping toward the centre line
        _ => {
            let mut patch = badminton::resolve_ai_shot(state, ShotKind::Other, action.confidence, rng);
            let recentre = badminton::ai_move_toward(state, 0.0, state.ai.z, badminton::AI_DRIFT_SPEED * 10.0);
            patch.ai = recentre.ai;
            patch
        }
    }
}

fn interpret_racing(state: &RacingState, label: &str, action: &AiAction) -> RacingPatch {
    let intensity = action.intensity();
    let mut patch = RacingPatch::default();

    // Finished cars stay parked whatever the label
    if state.phase == racing::RacePhase::Finished {
        patch.ai_speed = Some(0.0);
        return patch;
    }

    match label {
        "accelerate" | "speed_up" | "boost" => {
            // Cruise acceleration never eats into speed gained by overtaking
            let speed = if state.ai_speed >= racing::AI_CRUISE_MAX_SPEED {
                state.ai_speed
            } else {
                (state.ai_speed + AI_ACCEL_STEP * intensity).min(racing::AI_CRUISE_MAX_SPEED)
            };
            patch.ai_speed = Some(speed);
        }
        "overtake" | "aggressive" => {
            patch.ai_speed = Some((state.ai_speed + AI_OVERTAKE_STEP * intensity).min(racing::AI_OVERTAKE_MAX_SPEED));
            // Pull out toward whichever side of the player has more room
            let room_left = state.player.x - racing::TRACK_MIN_X;
            let room_right = racing::TRACK_MAX_X - state.player.x;
            let direction = if room_right >= room_left { 1.0 } else { -1.0 };
            patch.ai = Some(racing::shift_x(state.ai, direction * AI_LATERAL_STEP * intensity));
        }
        "block" | "defend" | "defensive" => {
            let dx = state.player.x - state.ai.x;
            let step = dx.clamp(-AI_LATERAL_STEP, AI_LATERAL_STEP) * intensity;
            patch.ai = Some(racing::shift_x(state.ai, step));
            patch.ai_speed = Some(state.ai_speed.min(racing::AI_CRUISE_MAX_SPEED));
        }
        "brake" | "slow_down" | "cautious" => {
            patch.ai_speed = Some((state.ai_speed - AI_BRAKE_STEP * intensity).max(racing::AI_MIN_SPEED));
        }
        "steer_left" | "left" => {
            patch.ai = Some(racing::shift_x(state.ai, -AI_LATERAL_STEP * intensity));
        }
        "steer_right" | "right" => {
            patch.ai = Some(racing::shift_x(state.ai, AI_LATERAL_STEP * intensity));
        }
        // Unknown: mild deceleration and forward drift
        _ => {
            patch.ai_speed = Some((state.ai_speed - AI_DEFAULT_DECEL).max(racing::AI_MIN_SPEED));
            let mut ai = state.ai;
            ai.y = racing::drift(ai.y, AI_DEFAULT_DRIFT);
            patch.ai = Some(ai);
        }
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{GameVariant, Vec2};
    use crate::game::store::GameStateStore;
    use crate::util::rng::{ScriptedRandom, SeededRandom};

    fn ai(label: &str, confidence: f32) -> AiAction {
        AiAction {
            current_game_action: label.to_string(),
            strategy: "test".to_string(),
            confidence,
        }
    }

    #[test]
    fn unknown_label_yields_non_empty_valid_delta_for_every_variant() {
        let mut rng = SeededRandom::new(3);
        for variant in GameVariant::ALL {
            let mut store = GameStateStore::new(variant);
            let state = store.get(variant);
            let patch = interpret(&state, &ai("moonwalk", 0.4), &mut rng);
            assert!(!patch.is_empty(), "{variant} produced an empty delta");
            store.merge_partial(variant, &patch).unwrap();
            assert!(store.get(variant).within_bounds());
        }
    }

    #[test]
    fn labels_are_normalized() {
        assert_eq!(ai("  Speed-Up ", 1.0).label(), "speed_up");
        assert_eq!(ai("Drop Shot", 1.0).label(), "drop_shot");
    }

    #[test]
    fn fighting_ai_attack_deals_twelve_in_range() {
        let state = GameState::Fighting(FightingState {
            player: Vec2::new(300.0, 0.0),
            ai: Vec2::new(350.0, 0.0),
            is_player_turn: false,
            ..Default::default()
        });
        let mut rng = ScriptedRandom::constant(0.5);
        match interpret(&state, &ai("attack", 0.9), &mut rng) {
            StatePatch::Fighting(p) => {
                assert_eq!(p.player_health, Some(88.0));
                assert_eq!(p.is_player_turn, Some(true));
            }
            other => panic!("unexpected patch {other:?}"),
        }
    }

    #[test]
    fn fighting_unknown_steps_toward_player() {
        let fighting = FightingState::default();
        let state = GameState::Fighting(fighting.clone());
        let mut rng = ScriptedRandom::constant(0.5);
        match interpret(&state, &ai("", 0.0), &mut rng) {
            StatePatch::Fighting(p) => {
                let moved = p.ai.unwrap();
                assert_eq!(moved.x, fighting.ai.x - FIGHT_DEFAULT_STEP);
            }
            other => panic!("unexpected patch {other:?}"),
        }
    }

    #[test]
    fn racing_accelerate_never_exceeds_cruise_cap() {
        let mut store = GameStateStore::new(GameVariant::Racing);
        let mut rng = ScriptedRandom::constant(0.5);
        for _ in 0..200 {
            let patch = interpret(&store.get(GameVariant::Racing), &ai("accelerate", 1.0), &mut rng);
            store.merge_partial(GameVariant::Racing, &patch).unwrap();
        }
        assert_eq!(store.racing().ai_speed, racing::AI_CRUISE_MAX_SPEED);

        for _ in 0..200 {
            let patch = interpret(&store.get(GameVariant::Racing), &ai("overtake", 1.0), &mut rng);
            store.merge_partial(GameVariant::Racing, &patch).unwrap();
        }
        assert_eq!(store.racing().ai_speed, racing::AI_OVERTAKE_MAX_SPEED);
        assert!(store.racing().within_bounds());
    }

    #[test]
    fn racing_unknown_decelerates_and_drifts() {
        let state = RacingState {
            ai_speed: 100.0,
            ..Default::default()
        };
        let mut rng = ScriptedRandom::constant(0.5);
        match interpret(&GameState::Racing(state.clone()), &ai("???", 0.5), &mut rng) {
            StatePatch::Racing(p) => {
                assert_eq!(p.ai_speed, Some(100.0 - AI_DEFAULT_DECEL));
                assert_eq!(p.ai.unwrap().y, state.ai.y + AI_DEFAULT_DRIFT);
            }
            other => panic!("unexpected patch {other:?}"),
        }
    }

    #[test]
    fn badminton_ai_shot_always_counts() {
        let state = BadmintonState::default();
        let mut rng = ScriptedRandom::constant(0.99);
        match interpret(&GameState::Badminton(state), &ai("smash", 0.2), &mut rng) {
            StatePatch::Badminton(p) => {
                assert_eq!(p.rally_count, Some(1));
                assert!(p.shuttle_target.unwrap().z > 0.0);
            }
            other => panic!("unexpected patch {other:?}"),
        }
    }

    #[test]
    fn finished_race_ignores_ai_labels() {
        let finished = RacingState {
            phase: racing::RacePhase::Finished,
            winner: Some(crate::game::state::Side::Player),
            ai_speed: 0.0,
            player_speed: 0.0,
            ..Default::default()
        };
        let mut rng = ScriptedRandom::constant(0.5);
        for label in ["accelerate", "overtake", "moonwalk", "steer_left"] {
            let mut store = GameStateStore::new(GameVariant::Racing);
            store
                .replace(GameVariant::Racing, GameState::Racing(finished.clone()))
                .unwrap();
            let patch = interpret(&store.get(GameVariant::Racing), &ai(label, 1.0), &mut rng);
            assert!(!patch.is_empty(), "{label} produced an empty delta");
            store.merge_partial(GameVariant::Racing, &patch).unwrap();
            assert_eq!(store.racing(), &finished, "{label} moved a finished car");
        }
    }
}
