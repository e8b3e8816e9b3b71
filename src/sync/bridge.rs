//! Forwards player actions over both remote paths

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::{ActionRequest, GameApi};
use crate::app::event::CoreEvent;
use crate::game::{GameState, PlayerAction};
use crate::util::rate_limit::{create_limiter, Limiter, MOVEMENT_CONFIRM_RATE_LIMIT};
use crate::ws::{ClientMsg, OutboundSender};

/// Streams each action and issues its discrete confirmation call.
///
/// Neither path waits for the other. Confirmation results come back as
/// `CoreEvent`s on the coordinator queue, so they are applied in completion
/// order between ticks. A failed call never rolls back the optimistic update.
pub struct ActionBridge {
    session_id: Uuid,
    outbound: OutboundSender,
    api: Arc<dyn GameApi>,
    events: mpsc::Sender<CoreEvent>,
    /// Movement streams every tick; only this many per second get confirmed
    movement_limiter: Arc<Limiter>,
}

impl ActionBridge {
    pub fn new(
        session_id: Uuid,
        outbound: OutboundSender,
        api: Arc<dyn GameApi>,
        events: mpsc::Sender<CoreEvent>,
    ) -> Self {
        Self {
            session_id,
            outbound,
            api,
            events,
            movement_limiter: create_limiter(MOVEMENT_CONFIRM_RATE_LIMIT),
        }
    }

    /// Dispatch `action`; `state` is the variant state after the optimistic update
    pub fn submit(&self, action: &PlayerAction, state: &GameState) {
        let variant = action.variant();

        self.outbound.send(ClientMsg::PlayerAction {
            session_id: self.session_id,
            game: variant,
            action: action.clone(),
        });

        if action.is_movement() && self.movement_limiter.check().is_err() {
            debug!(action_id = %action.id, "Movement confirmation throttled");
            return;
        }

        let request = ActionRequest {
            session_id: self.session_id,
            action_data: action_data(action, state),
        };
        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        let action_id = action.id;

        tokio::spawn(async move {
            let event = match api.post_action(variant, request).await {
                Ok(response) => CoreEvent::ActionConfirmed {
                    variant,
                    action_id,
                    game_state: response.game_state,
                },
                Err(e) => {
                    warn!(game = %variant, action_id = %action_id, error = %e, "Action confirmation failed");
                    CoreEvent::ActionFailed {
                        variant,
                        action_id,
                        error: e.to_string(),
                    }
                }
            };
            if events.send(event).await.is_err() {
                debug!(action_id = %action_id, "Session closed before confirmation arrived");
            }
        });
    }
}

/// Action fields layered over the full variant state
pub fn action_data(action: &PlayerAction, state: &GameState) -> Value {
    let mut data = match state.fields_json() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Ok(Value::Object(fields)) = serde_json::to_value(action) {
        data.extend(fields);
    }
    Value::Object(data)
}
