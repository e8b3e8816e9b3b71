//! Fixed-tick local simulation for the active variant

use tracing::{trace, warn};

use super::action::PlayerAction;
use super::badminton::{self, PointScored};
use super::fighting::{self, RoundEvent};
use super::interpreter::{self, AiAction};
use super::racing::{self, RaceEvent};
use super::state::{GameVariant, StatePatch};
use super::store::GameStateStore;
use super::HeldInput;
use crate::util::rng::RandomSource;

/// Round-boundary events produced by a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Round(RoundEvent),
    Point(PointScored),
    Race(RaceEvent),
}

/// What one tick produced besides the state mutations
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    /// Fighting movement record to forward upstream
    pub movement: Option<PlayerAction>,
    pub ai_applied: bool,
    pub events: Vec<SimEvent>,
}

/// Advances exactly one variant; a new loop is created on every switch
pub struct SimulationLoop {
    variant: GameVariant,
    tick: u64,
}

impl SimulationLoop {
    pub fn new(variant: GameVariant) -> Self {
        Self { variant, tick: 0 }
    }

    pub fn variant(&self) -> GameVariant {
        self.variant
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Run a single simulation tick.
    ///
    /// Order: held input, player physics, buffered AI action, then
    /// terminal/round-boundary rules. Idle ticks emit no movement record.
    pub fn step(
        &mut self,
        store: &mut GameStateStore,
        input: &HeldInput,
        pending_ai: Option<AiAction>,
        rng: &mut dyn RandomSource,
    ) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..Default::default()
        };

        if store.active() != self.variant {
            warn!(
                game = %self.variant,
                active = %store.active(),
                "Simulation loop is not advancing the active variant"
            );
            return report;
        }

        let racing_before = store.racing().clone();

        // Player physics
        match self.variant {
            GameVariant::Fighting => {
                let patch = fighting::player_step(store.fighting(), input);
                let moved = patch.player.is_some();
                self.apply(store, StatePatch::Fighting(patch));
                if moved {
                    report.movement = Some(PlayerAction::movement(&store.get(self.variant)));
                }
            }
            GameVariant::Badminton => {
                let patch = badminton::player_step(store.badminton(), input);
                self.apply(store, StatePatch::Badminton(patch));
            }
            GameVariant::Racing => {
                let patch = racing::physics_step(store.racing(), input);
                self.apply(store, StatePatch::Racing(patch));
            }
        }

        // Buffered AI decision
        if let Some(action) = pending_ai {
            let patch = interpreter::interpret(&store.get(self.variant), &action, rng);
            self.apply(store, patch);
            report.ai_applied = true;
        }

        // Terminal and round-boundary rules
        match self.variant {
            GameVariant::Fighting => {
                let (patch, event) = fighting::round_step(store.fighting());
                self.apply(store, StatePatch::Fighting(patch));
                report.events.extend(event.map(SimEvent::Round));
            }
            GameVariant::Badminton => {
                let (patch, point) = badminton::rally_step(store.badminton());
                self.apply(store, StatePatch::Badminton(patch));
                report.events.extend(point.map(SimEvent::Point));
            }
            GameVariant::Racing => {
                let (patch, events) = racing::lap_step(&racing_before, store.racing());
                self.apply(store, StatePatch::Racing(patch));
                report.events.extend(events.into_iter().map(SimEvent::Race));
            }
        }

        trace!(game = %self.variant, tick = self.tick, "Simulation tick");
        report
    }

    fn apply(&self, store: &mut GameStateStore, patch: StatePatch) {
        if let Err(e) = store.merge_partial(self.variant, &patch) {
            warn!(game = %self.variant, error = %e, "Dropped simulation patch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::fighting::FightPhase;
    use crate::game::racing::PLAYER_MAX_SPEED;
    use crate::game::state::Vec2;
    use crate::util::rng::ScriptedRandom;

    fn ai(label: &str) -> AiAction {
        AiAction {
            current_game_action: label.to_string(),
            strategy: "balanced".to_string(),
            confidence: 0.8,
        }
    }

    #[test]
    fn idle_fighting_tick_emits_nothing() {
        let mut store = GameStateStore::new(GameVariant::Fighting);
        let mut sim = SimulationLoop::new(GameVariant::Fighting);
        let mut rng = ScriptedRandom::constant(0.5);
        let version = store.version();
        let report = sim.step(&mut store, &HeldInput::default(), None, &mut rng);
        assert!(report.movement.is_none());
        assert!(!report.ai_applied);
        assert_eq!(store.version(), version);
    }

    #[test]
    fn fighting_movement_emits_action() {
        let mut store = GameStateStore::new(GameVariant::Fighting);
        let mut sim = SimulationLoop::new(GameVariant::Fighting);
        let mut rng = ScriptedRandom::constant(0.5);
        let input = HeldInput {
            right: true,
            ..Default::default()
        };
        let report = sim.step(&mut store, &input, None, &mut rng);
        let action = report.movement.expect("movement action");
        assert!(action.is_movement());
        assert_eq!(action.position.x, store.fighting().player.x);
    }

    #[test]
    fn ai_action_is_applied_once() {
        let mut store = GameStateStore::new(GameVariant::Racing);
        let mut sim = SimulationLoop::new(GameVariant::Racing);
        let mut rng = ScriptedRandom::constant(0.5);

        let report = sim.step(&mut store, &HeldInput::default(), Some(ai("brake")), &mut rng);
        assert!(report.ai_applied);
        let report = sim.step(&mut store, &HeldInput::default(), None, &mut rng);
        assert!(!report.ai_applied);
    }

    #[test]
    fn knockout_is_detected_in_same_tick() {
        let mut store = GameStateStore::new(GameVariant::Fighting);
        store
            .merge_partial(
                GameVariant::Fighting,
                &StatePatch::Fighting(fighting::FightingPatch {
                    player: Some(Vec2::new(300.0, 0.0)),
                    ai: Some(Vec2::new(320.0, 0.0)),
                    player_health: Some(10.0),
                    is_player_turn: Some(false),
                    ..Default::default()
                }),
            )
            .unwrap();
        let mut sim = SimulationLoop::new(GameVariant::Fighting);
        let mut rng = ScriptedRandom::constant(0.5);

        let report = sim.step(&mut store, &HeldInput::default(), Some(ai("attack")), &mut rng);
        assert_eq!(store.fighting().player_health, 0.0);
        assert_eq!(store.fighting().phase, FightPhase::Ko);
        assert_eq!(store.fighting().ai_wins, 1);
        assert!(report
            .events
            .contains(&SimEvent::Round(RoundEvent::Knockout { winner: crate::game::state::Side::Ai })));
    }

    #[test]
    fn racing_speed_capped_over_many_ticks() {
        let mut store = GameStateStore::new(GameVariant::Racing);
        let mut sim = SimulationLoop::new(GameVariant::Racing);
        let mut rng = ScriptedRandom::constant(0.5);
        let input = HeldInput {
            up: true,
            right: true,
            ..Default::default()
        };
        let mut laps = 0;
        for _ in 0..2_000 {
            sim.step(&mut store, &input, None, &mut rng);
            let racing = store.racing();
            assert!(racing.player_speed <= PLAYER_MAX_SPEED);
            assert!(racing.player.x >= 70.0 && racing.player.x <= 530.0);
            assert!(racing.player_lap >= laps);
            laps = racing.player_lap;
        }
        assert!(laps >= 1);
    }

    #[test]
    fn inactive_loop_does_nothing() {
        let mut store = GameStateStore::new(GameVariant::Badminton);
        let mut sim = SimulationLoop::new(GameVariant::Racing);
        let mut rng = ScriptedRandom::constant(0.5);
        let before = store.get(GameVariant::Racing);
        sim.step(&mut store, &HeldInput { up: true, ..Default::default() }, None, &mut rng);
        assert_eq!(store.get(GameVariant::Racing), before);
    }
}
