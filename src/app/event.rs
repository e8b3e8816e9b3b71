//! Everything that can mutate session state, funnelled through one queue

use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::api::personality::PersonalityProfile;
use crate::game::{ActionInput, GameVariant, HeldInput, PlayerAction};
use crate::ws::channel::ChannelStatus;
use crate::ws::protocol::ServerMsg;

use super::session::SessionError;

/// Control-surface requests from the renderer bridge or embedding code
#[derive(Debug)]
pub enum Command {
    SwitchVariant {
        variant: GameVariant,
        reply: oneshot::Sender<()>,
    },
    SubmitAction {
        input: ActionInput,
        reply: oneshot::Sender<Result<PlayerAction, SessionError>>,
    },
    SetInput(HeldInput),
    Reset {
        reply: oneshot::Sender<()>,
    },
}

/// One entry of the coordinator's cooperative queue.
///
/// Applied between simulation ticks in arrival order.
#[derive(Debug)]
pub enum CoreEvent {
    Command(Command),
    /// Validated push from the streaming channel
    Inbound(ServerMsg),
    /// Inbound payload that failed to decode; discarded
    Malformed { source: &'static str, error: String },
    ChannelStatus(ChannelStatus),
    /// Discrete confirmation call completed
    ActionConfirmed {
        variant: GameVariant,
        action_id: Uuid,
        game_state: Option<Value>,
    },
    ActionFailed {
        variant: GameVariant,
        action_id: Uuid,
        error: String,
    },
    Personality(PersonalityProfile),
}
