//! Streaming channel message definitions
//! These are the wire types exchanged with the remote game service

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::api::personality::PersonalityPayload;
use crate::game::{AiAction, GameVariant, PlayerAction};

/// Messages sent from the session to the remote service
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// The active variant changed (also re-sent on every connect)
    SwitchGame { session_id: Uuid, game: GameVariant },

    /// A locally-originated player action, streamed without awaiting a reply
    PlayerAction {
        session_id: Uuid,
        game: GameVariant,
        action: PlayerAction,
    },
}

impl ClientMsg {
    pub fn is_switch(&self) -> bool {
        matches!(self, ClientMsg::SwitchGame { .. })
    }
}

/// Messages pushed by the remote service
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Authoritative partial state
    VariantStateDelta {
        /// Target variant; the active one when omitted
        #[serde(default)]
        game: Option<GameVariant>,
        game_state: Value,
    },

    /// Decision of the AI opponent
    AiAction(AiAction),

    /// Fresh personality profile, replaces the current one
    PersonalityUpdate { personality: PersonalityPayload },
}

/// Decode and validate one inbound text frame
pub fn decode_server_msg(text: &str) -> Result<ServerMsg, ProtocolError> {
    let msg: ServerMsg = serde_json::from_str(text)?;
    match &msg {
        ServerMsg::VariantStateDelta { game_state, .. } if !game_state.is_object() => {
            Err(ProtocolError::StateNotAnObject)
        }
        ServerMsg::AiAction(action)
            if !action.confidence.is_finite() || !(0.0..=1.0).contains(&action.confidence) =>
        {
            Err(ProtocolError::Confidence(action.confidence))
        }
        _ => Ok(msg),
    }
}

/// Inbound payload problems; the payload is discarded
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("game_state is not an object")]
    StateNotAnObject,

    #[error("AI confidence {0} outside [0, 1]")]
    Confidence(f32),
}
