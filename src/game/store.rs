//! Single mutable source of truth for all three variant states

use tracing::debug;

use super::badminton::BadmintonState;
use super::fighting::FightingState;
use super::racing::RacingState;
use super::state::{GameState, GameVariant, StatePatch};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Patch for {patch} cannot be applied to {target}")]
    VariantMismatch {
        target: GameVariant,
        patch: GameVariant,
    },
}

/// Holds every variant's state plus the active-variant pointer.
///
/// Switching the active variant never touches the stored states, so a player
/// can leave a game and resume it later. Every mutation bumps `version`.
#[derive(Debug, Clone)]
pub struct GameStateStore {
    active: GameVariant,
    fighting: FightingState,
    badminton: BadmintonState,
    racing: RacingState,
    version: u64,
}

impl GameStateStore {
    pub fn new(active: GameVariant) -> Self {
        Self {
            active,
            fighting: FightingState::default(),
            badminton: BadmintonState::default(),
            racing: RacingState::default(),
            version: 0,
        }
    }

    pub fn active(&self) -> GameVariant {
        self.active
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get_active(&self) -> (GameVariant, GameState) {
        (self.active, self.get(self.active))
    }

    /// Owned copy of one variant's state
    pub fn get(&self, variant: GameVariant) -> GameState {
        match variant {
            GameVariant::Fighting => GameState::Fighting(self.fighting.clone()),
            GameVariant::Badminton => GameState::Badminton(self.badminton.clone()),
            GameVariant::Racing => GameState::Racing(self.racing.clone()),
        }
    }

    pub fn fighting(&self) -> &FightingState {
        &self.fighting
    }

    pub fn badminton(&self) -> &BadmintonState {
        &self.badminton
    }

    pub fn racing(&self) -> &RacingState {
        &self.racing
    }

    /// Pointer switch only
    pub fn set_active(&mut self, variant: GameVariant) {
        if self.active != variant {
            self.active = variant;
            self.version += 1;
        }
    }

    /// Overwrite the fields present in `patch`, then clamp `variant`'s state
    pub fn merge_partial(&mut self, variant: GameVariant, patch: &StatePatch) -> Result<(), StoreError> {
        if patch.variant() != variant {
            return Err(StoreError::VariantMismatch {
                target: variant,
                patch: patch.variant(),
            });
        }
        if patch.is_empty() {
            return Ok(());
        }

        match patch {
            StatePatch::Fighting(p) => self.fighting.merge(p),
            StatePatch::Badminton(p) => self.badminton.merge(p),
            StatePatch::Racing(p) => self.racing.merge(p),
        }
        self.version += 1;
        debug!(game = %variant, version = self.version, "Merged state patch");
        Ok(())
    }

    /// Replace a whole variant state (session reset path)
    pub fn replace(&mut self, variant: GameVariant, state: GameState) -> Result<(), StoreError> {
        if state.variant() != variant {
            return Err(StoreError::VariantMismatch {
                target: variant,
                patch: state.variant(),
            });
        }

        match state {
            GameState::Fighting(mut s) => {
                s.clamp_to_bounds();
                self.fighting = s;
            }
            GameState::Badminton(mut s) => {
                s.clamp_to_bounds();
                self.badminton = s;
            }
            GameState::Racing(mut s) => {
                s.clamp_to_bounds();
                self.racing = s;
            }
        }
        self.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::badminton::BadmintonPatch;
    use crate::game::fighting::FightingPatch;
    use crate::game::racing::RacingPatch;
    use crate::game::state::{Vec2, Vec3};

    fn hostile_patches() -> Vec<StatePatch> {
        vec![
            StatePatch::Fighting(FightingPatch {
                player: Some(Vec2::new(f32::MAX, -1.0e9)),
                ai: Some(Vec2::new(-1.0e9, f32::NAN)),
                player_health: Some(-30.0),
                ai_health: Some(1.0e6),
                round: Some(-1),
                player_wins: Some(-5),
                ..Default::default()
            }),
            StatePatch::Badminton(BadmintonPatch {
                player: Some(Vec3::new(99.0, 99.0, -99.0)),
                ai: Some(Vec3::new(-99.0, -99.0, 99.0)),
                shuttle: Some(Vec3::new(f32::NAN, 1.0e9, -1.0e9)),
                shuttle_target: Some(Vec3::new(50.0, -50.0, 50.0)),
                shuttle_speed: Some(-4.0),
                rally_count: Some(-12),
                player_score: Some(-1),
                ..Default::default()
            }),
            StatePatch::Racing(RacingPatch {
                player: Some(Vec2::new(0.0, -250.0)),
                ai: Some(Vec2::new(10_000.0, 1.0e7)),
                player_speed: Some(900.0),
                ai_speed: Some(-900.0),
                player_lap: Some(-2),
                ..Default::default()
            }),
        ]
    }

    #[test]
    fn every_field_in_bounds_after_merge() {
        let mut store = GameStateStore::new(GameVariant::Fighting);
        for patch in hostile_patches() {
            let variant = patch.variant();
            store.merge_partial(variant, &patch).unwrap();
            assert!(store.get(variant).within_bounds(), "{variant} out of bounds");
        }
    }

    #[test]
    fn merge_touches_only_present_fields() {
        let mut store = GameStateStore::new(GameVariant::Fighting);
        let before = store.fighting().clone();
        let patch = StatePatch::Fighting(FightingPatch {
            ai_health: Some(40.0),
            ..Default::default()
        });
        store.merge_partial(GameVariant::Fighting, &patch).unwrap();

        let after = store.fighting();
        assert_eq!(after.ai_health, 40.0);
        assert_eq!(after.player, before.player);
        assert_eq!(after.player_health, before.player_health);
        assert_eq!(after.round, before.round);
    }

    #[test]
    fn mismatched_patch_is_rejected() {
        let mut store = GameStateStore::new(GameVariant::Racing);
        let patch = StatePatch::Fighting(FightingPatch {
            ai_health: Some(1.0),
            ..Default::default()
        });
        let version = store.version();
        assert!(store.merge_partial(GameVariant::Racing, &patch).is_err());
        assert_eq!(store.version(), version);
        assert_eq!(store.fighting().ai_health, 100.0);
    }

    #[test]
    fn switching_preserves_other_variants() {
        let mut store = GameStateStore::new(GameVariant::Fighting);
        store
            .merge_partial(
                GameVariant::Badminton,
                &StatePatch::Badminton(BadmintonPatch {
                    rally_count: Some(9),
                    ..Default::default()
                }),
            )
            .unwrap();
        let badminton = serde_json::to_vec(&store.get(GameVariant::Badminton)).unwrap();
        let racing = serde_json::to_vec(&store.get(GameVariant::Racing)).unwrap();

        store.set_active(GameVariant::Racing);
        store
            .merge_partial(
                GameVariant::Racing,
                &StatePatch::Racing(RacingPatch {
                    player_speed: Some(80.0),
                    ..Default::default()
                }),
            )
            .unwrap();
        store.set_active(GameVariant::Fighting);
        store.set_active(GameVariant::Badminton);

        assert_eq!(serde_json::to_vec(&store.get(GameVariant::Badminton)).unwrap(), badminton);
        assert_ne!(serde_json::to_vec(&store.get(GameVariant::Racing)).unwrap(), racing);
        assert_eq!(store.active(), GameVariant::Badminton);
    }

    #[test]
    fn set_active_does_not_change_contents() {
        let mut store = GameStateStore::new(GameVariant::Fighting);
        let snapshot: Vec<_> = GameVariant::ALL.iter().map(|v| store.get(*v)).collect();
        for variant in GameVariant::ALL {
            store.set_active(variant);
        }
        let after: Vec<_> = GameVariant::ALL.iter().map(|v| store.get(*v)).collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn replace_resets_counters() {
        let mut store = GameStateStore::new(GameVariant::Racing);
        store
            .merge_partial(
                GameVariant::Racing,
                &StatePatch::Racing(RacingPatch {
                    player_lap: Some(2),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(store.racing().player_lap, 2);

        store
            .replace(GameVariant::Racing, GameState::initial(GameVariant::Racing))
            .unwrap();
        assert_eq!(store.racing().player_lap, 0);
        assert!(store
            .replace(GameVariant::Racing, GameState::initial(GameVariant::Fighting))
            .is_err());
    }

    #[test]
    fn empty_patch_does_not_bump_version() {
        let mut store = GameStateStore::new(GameVariant::Fighting);
        store
            .merge_partial(GameVariant::Fighting, &StatePatch::Fighting(FightingPatch::default()))
            .unwrap();
        assert_eq!(store.version(), 0);
    }
}
