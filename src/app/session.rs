//! Session coordinator: owns the store, the simulation and the remote paths

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::personality::PersonalityProfile;
use crate::api::GameApi;
use crate::config::Config;
use crate::game::action::{self, ActionMismatch};
use crate::game::snapshot::{SnapshotKey, SyncStats};
use crate::game::{
    ActionInput, AiAction, GameState, GameStateStore, GameVariant, HeldInput, PlayerAction, SimulationLoop,
    Snapshot, SnapshotPublisher,
};
use crate::sync::{ActionBridge, DeltaOrigin, LastWriterWins, ReconcilePolicy};
use crate::util::rng::{RandomSource, SeededRandom};
use crate::util::time::tick_duration;
use crate::ws::{ChannelStatus, ClientMsg, ConnectionChannel, OutboundSender, ServerMsg};

use super::event::{Command, CoreEvent};

/// Capacity of the coordinator queue shared by commands and completions
const EVENT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session is no longer running")]
    Closed,

    #[error("{requested} action submitted while {active} is active")]
    InactiveVariant {
        requested: GameVariant,
        active: GameVariant,
    },

    #[error(transparent)]
    Action(#[from] ActionMismatch),
}

/// Single owner of all mutable session state.
///
/// Every mutation happens inside `tick` or `handle_event`, both called from
/// one task, so observers only ever see whole operations.
pub struct SessionCoordinator {
    session_id: Uuid,
    store: GameStateStore,
    sim: SimulationLoop,
    held: HeldInput,
    /// Buffered AI decision, consumed by the next tick
    pending_ai: Option<AiAction>,
    last_ai_action: Option<AiAction>,
    personality: Option<PersonalityProfile>,
    channel_status: ChannelStatus,
    stats: SyncStats,
    /// Bumped whenever snapshot content outside the store changes
    meta_version: u64,
    rng: Box<dyn RandomSource>,
    policy: Box<dyn ReconcilePolicy>,
    bridge: ActionBridge,
    outbound: OutboundSender,
    publisher: SnapshotPublisher,
}

impl SessionCoordinator {
    pub fn new(
        session_id: Uuid,
        initial: GameVariant,
        api: Arc<dyn GameApi>,
        outbound: OutboundSender,
        events: mpsc::Sender<CoreEvent>,
        rng: Box<dyn RandomSource>,
    ) -> (Self, watch::Receiver<Arc<Snapshot>>) {
        let store = GameStateStore::new(initial);
        let (publisher, snapshots) =
            SnapshotPublisher::new(Snapshot::new(session_id, store.version(), 0, store.get(initial)));

        outbound.send(ClientMsg::SwitchGame {
            session_id,
            game: initial,
        });

        let coordinator = Self {
            session_id,
            store,
            sim: SimulationLoop::new(initial),
            held: HeldInput::default(),
            pending_ai: None,
            last_ai_action: None,
            personality: None,
            channel_status: ChannelStatus::Connecting,
            stats: SyncStats::default(),
            meta_version: 0,
            rng,
            policy: Box::new(LastWriterWins),
            bridge: ActionBridge::new(session_id, outbound.clone(), api, events),
            outbound,
            publisher,
        };
        (coordinator, snapshots)
    }

    pub fn active(&self) -> GameVariant {
        self.store.active()
    }

    pub fn store(&self) -> &GameStateStore {
        &self.store
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Run the fixed-tick loop, draining the queue between ticks
    pub async fn run(mut self, mut events: mpsc::Receiver<CoreEvent>, mut shutdown: watch::Receiver<bool>) {
        info!(session_id = %self.session_id, game = %self.active(), "Session started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.publish();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = tick_interval.tick() => self.tick(),
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event);
                        self.publish();
                    }
                    None => break,
                },
            }
        }

        info!(
            session_id = %self.session_id,
            confirmations_applied = self.stats.confirmations_applied,
            confirmations_failed = self.stats.confirmations_failed,
            snapshots = self.publisher.published(),
            "Session stopped"
        );
    }

    /// Advance the active variant by one tick and publish if anything changed
    pub fn tick(&mut self) {
        let variant = self.sim.variant();
        let pending = self.pending_ai.take();
        let report = self.sim.step(&mut self.store, &self.held, pending, self.rng.as_mut());

        if report.ai_applied {
            self.stats.ai_actions_applied += 1;
            self.meta_version += 1;
        }
        if let Some(movement) = report.movement {
            self.bridge.submit(&movement, &self.store.get(variant));
        }
        for event in &report.events {
            info!(session_id = %self.session_id, game = %variant, tick = report.tick, event = ?event, "Game event");
        }

        self.publish();
    }

    /// Apply one queued event. Never called while a tick is in progress.
    pub fn handle_event(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::Command(command) => self.handle_command(command),
            CoreEvent::Inbound(msg) => self.handle_inbound(msg),
            CoreEvent::Malformed { source, error } => {
                warn!(session_id = %self.session_id, source, error = %error, "Discarded malformed payload");
                self.stats.malformed_discarded += 1;
                self.meta_version += 1;
            }
            CoreEvent::ChannelStatus(status) => {
                if self.channel_status != status {
                    debug!(session_id = %self.session_id, ?status, "Channel status changed");
                    self.channel_status = status;
                    self.meta_version += 1;
                }
            }
            CoreEvent::ActionConfirmed {
                variant,
                action_id,
                game_state,
            } => {
                // Merged even if the variant is no longer active
                let applied = match game_state {
                    Some(fragment) => self.apply_remote(variant, DeltaOrigin::Confirmation, &fragment),
                    None => true,
                };
                if applied {
                    debug!(session_id = %self.session_id, game = %variant, action_id = %action_id, "Action confirmed");
                    self.stats.confirmations_applied += 1;
                    self.meta_version += 1;
                }
            }
            CoreEvent::ActionFailed {
                variant,
                action_id,
                error,
            } => {
                // Optimistic state stands; no retry
                debug!(
                    session_id = %self.session_id,
                    game = %variant,
                    action_id = %action_id,
                    error = %error,
                    "Keeping optimistic state after failed confirmation"
                );
                self.stats.confirmations_failed += 1;
                self.meta_version += 1;
            }
            CoreEvent::Personality(profile) => self.set_personality(profile),
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SwitchVariant { variant, reply } => {
                self.switch_variant(variant);
                self.publish();
                let _ = reply.send(());
            }
            Command::SubmitAction { input, reply } => {
                let result = self.submit_player_action(input);
                self.publish();
                let _ = reply.send(result);
            }
            Command::SetInput(input) => self.held = input,
            Command::Reset { reply } => {
                self.reset();
                self.publish();
                let _ = reply.send(());
            }
        }
    }

    fn handle_inbound(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::VariantStateDelta { game, game_state } => {
                let variant = game.unwrap_or(self.store.active());
                if self.apply_remote(variant, DeltaOrigin::Stream, &game_state) {
                    self.stats.stream_deltas_applied += 1;
                    self.meta_version += 1;
                }
            }
            ServerMsg::AiAction(action) => {
                debug!(
                    session_id = %self.session_id,
                    label = %action.current_game_action,
                    confidence = action.confidence,
                    "Buffered AI action"
                );
                // A newer decision replaces one not yet applied
                self.pending_ai = Some(action.clone());
                self.last_ai_action = Some(action);
                self.meta_version += 1;
            }
            ServerMsg::PersonalityUpdate { personality } => self.set_personality(personality.into_profile()),
        }
    }

    /// Returns true if the fragment was applied
    fn apply_remote(&mut self, variant: GameVariant, origin: DeltaOrigin, fragment: &serde_json::Value) -> bool {
        match self.policy.apply(&mut self.store, variant, origin, fragment) {
            Ok(_) => true,
            Err(e) => {
                warn!(session_id = %self.session_id, game = %variant, ?origin, error = %e, "Discarded remote fragment");
                self.stats.malformed_discarded += 1;
                self.meta_version += 1;
                false
            }
        }
    }

    fn set_personality(&mut self, profile: PersonalityProfile) {
        self.personality = Some(profile);
        self.meta_version += 1;
    }

    /// Make `variant` active. Other variants' states are left untouched.
    pub fn switch_variant(&mut self, variant: GameVariant) {
        if variant == self.store.active() {
            return;
        }
        if let Some(dropped) = self.pending_ai.take() {
            debug!(
                session_id = %self.session_id,
                label = %dropped.current_game_action,
                "Dropped AI action decided for previous variant"
            );
        }
        let previous = self.store.active();
        self.store.set_active(variant);
        self.sim = SimulationLoop::new(variant);
        self.held = HeldInput::default();
        self.outbound.send(ClientMsg::SwitchGame {
            session_id: self.session_id,
            game: variant,
        });
        info!(session_id = %self.session_id, from = %previous, to = %variant, "Switched game");
    }

    /// Resolve locally, apply optimistically, then hand off to the bridge
    pub fn submit_player_action(&mut self, input: ActionInput) -> Result<PlayerAction, SessionError> {
        let active = self.store.active();
        if input.variant() != active {
            return Err(SessionError::InactiveVariant {
                requested: input.variant(),
                active,
            });
        }

        let state = self.store.get(active);
        let (patch, action) = action::resolve(&state, input, self.rng.as_mut())?;
        if let Err(e) = self.store.merge_partial(active, &patch) {
            warn!(session_id = %self.session_id, error = %e, "Optimistic update rejected");
        }
        debug!(
            session_id = %self.session_id,
            game = %active,
            action_id = %action.id,
            success = action.success,
            "Player action"
        );
        self.bridge.submit(&action, &self.store.get(active));
        Ok(action)
    }

    /// Restore every variant to its initial state; the only way counters go down
    pub fn reset(&mut self) {
        for variant in GameVariant::ALL {
            if let Err(e) = self.store.replace(variant, GameState::initial(variant)) {
                warn!(session_id = %self.session_id, error = %e, "Reset failed");
            }
        }
        self.pending_ai = None;
        self.held = HeldInput::default();
        self.sim = SimulationLoop::new(self.store.active());
        info!(session_id = %self.session_id, "Session reset");
    }

    fn snapshot_key(&self) -> SnapshotKey {
        (self.store.version(), self.meta_version)
    }

    fn build_snapshot(&self) -> Snapshot {
        let (_, state) = self.store.get_active();
        let mut snapshot = Snapshot::new(self.session_id, self.store.version(), self.sim.tick(), state);
        snapshot.last_ai_action = self.last_ai_action.clone();
        snapshot.personality = self.personality.clone();
        snapshot.channel = self.channel_status;
        snapshot.stats = self.stats;
        snapshot
    }

    /// Publish only when the store or snapshot metadata changed
    pub fn publish(&mut self) {
        let key = self.snapshot_key();
        if self.publisher.is_stale(key) {
            let snapshot = self.build_snapshot();
            self.publisher.publish(key, snapshot);
        }
    }
}

// ============================================================================
// Control surface
// ============================================================================

/// Cloneable handle used by the renderer bridge and embedding code
#[derive(Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    events: mpsc::Sender<CoreEvent>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    async fn command(&self, command: Command) -> Result<(), SessionError> {
        self.events
            .send(CoreEvent::Command(command))
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub async fn switch_variant(&self, variant: GameVariant) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::SwitchVariant { variant, reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn submit_player_action(&self, input: ActionInput) -> Result<PlayerAction, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::SubmitAction { input, reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn set_input(&self, input: HeldInput) -> Result<(), SessionError> {
        self.command(Command::SetInput(input)).await
    }

    pub async fn reset(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Reset { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }
}

/// Create a session and spawn its coordinator, channel and personality poller
pub fn start(
    config: Arc<Config>,
    api: Arc<dyn GameApi>,
    shutdown: watch::Receiver<bool>,
) -> (SessionHandle, Vec<JoinHandle<()>>) {
    let session_id = Uuid::new_v4();
    let seed = config.rng_seed.unwrap_or_else(rand::random);
    info!(session_id = %session_id, seed, "Creating session");

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let (outbound, channel_task) =
        ConnectionChannel::connect(config.clone(), session_id, events_tx.clone(), shutdown.clone());

    let (coordinator, snapshots) = SessionCoordinator::new(
        session_id,
        config.initial_game,
        api.clone(),
        outbound,
        events_tx.clone(),
        Box::new(SeededRandom::new(seed)),
    );

    let poller = tokio::spawn(poll_personality(
        api,
        session_id,
        config.personality_poll,
        events_tx.clone(),
        shutdown.clone(),
    ));
    let session_task = tokio::spawn(coordinator.run(events_rx, shutdown));

    let handle = SessionHandle {
        session_id,
        events: events_tx,
        snapshots,
    };
    (handle, vec![session_task, channel_task, poller])
}

/// Refresh the personality profile on a fixed interval, independent of ticks
async fn poll_personality(
    api: Arc<dyn GameApi>,
    session_id: Uuid,
    every: Duration,
    events: mpsc::Sender<CoreEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                match api.fetch_personality(session_id).await {
                    Ok(payload) => {
                        if events.send(CoreEvent::Personality(payload.into_profile())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Personality refresh failed");
                    }
                }
            }
        }
    }
    debug!(session_id = %session_id, "Personality poller stopped");
}
