//! HTTP client for the per-variant action endpoint and the personality endpoint

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::Config;
use crate::game::GameVariant;

use super::personality::PersonalityPayload;

/// Body of `POST /api/v1/games/{variant}/action`
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequest {
    pub session_id: Uuid,
    /// PlayerAction fields merged over the full variant state
    pub action_data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default)]
    pub game_state: Option<Value>,
}

/// Remote service surface used by the session.
///
/// Returned futures are `'static` so callers can spawn them without holding
/// a borrow of the client.
pub trait GameApi: Send + Sync + 'static {
    fn post_action(
        &self,
        variant: GameVariant,
        request: ActionRequest,
    ) -> BoxFuture<'static, Result<ActionResponse, ApiError>>;

    fn fetch_personality(&self, session_id: Uuid) -> BoxFuture<'static, Result<PersonalityPayload, ApiError>>;
}

/// reqwest-backed client with the configured timeout
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(ApiError::Request)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    fn action_url(&self, variant: GameVariant) -> String {
        format!("{}/api/v1/games/{}/action", self.base_url, variant.as_str())
    }

    fn personality_url(&self, session_id: Uuid) -> String {
        format!("{}/api/v1/personality/{}", self.base_url, session_id)
    }
}

/// Map a response to `T`, turning non-2xx statuses into `ApiError::Api`
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Api {
            status: status.as_u16(),
            body,
        });
    }
    response.json().await.map_err(ApiError::Parse)
}

impl GameApi for ApiClient {
    fn post_action(
        &self,
        variant: GameVariant,
        request: ActionRequest,
    ) -> BoxFuture<'static, Result<ActionResponse, ApiError>> {
        let client = self.client.clone();
        let url = self.action_url(variant);
        async move {
            let response = client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await
                .map_err(ApiError::Request)?;

            let body: ActionResponse = read_json(response).await?;
            if !body.success {
                return Err(ApiError::Rejected);
            }
            Ok(body)
        }
        .boxed()
    }

    fn fetch_personality(&self, session_id: Uuid) -> BoxFuture<'static, Result<PersonalityPayload, ApiError>> {
        let client = self.client.clone();
        let url = self.personality_url(session_id);
        async move {
            let response = client.get(&url).send().await.map_err(ApiError::Request)?;
            read_json(response).await
        }
        .boxed()
    }
}

/// Remote service errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("Service reported success = false")]
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, routing::get, routing::post, Json, Router};
    use serde_json::json;
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> ApiClient {
        let config = Config {
            api_base_url: base_url,
            http_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        ApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn posts_action_to_variant_path() {
        let router = Router::new().route(
            "/api/v1/games/:game/action",
            post(|Path(game): Path<String>, Json(body): Json<Value>| async move {
                Json(json!({
                    "success": true,
                    "game_state": { "echo": game, "session": body["session_id"] }
                }))
            }),
        );
        let api = client(serve(router).await);

        let response = api
            .post_action(
                GameVariant::Badminton,
                ActionRequest {
                    session_id: Uuid::nil(),
                    action_data: json!({ "shot": "smash" }),
                },
            )
            .await
            .unwrap();
        let state = response.game_state.unwrap();
        assert_eq!(state["echo"], "badminton");
        assert_eq!(state["session"], Uuid::nil().to_string());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let router = Router::new().route(
            "/api/v1/games/:game/action",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let api = client(serve(router).await);
        let err = api
            .post_action(
                GameVariant::Racing,
                ActionRequest {
                    session_id: Uuid::nil(),
                    action_data: Value::Null,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn fetches_personality() {
        let router = Router::new().route(
            "/api/v1/personality/:id",
            get(|| async { Json(json!({ "aggression": 0.7, "confidence": 0.4 })) }),
        );
        let api = client(serve(router).await);
        let profile = api.fetch_personality(Uuid::nil()).await.unwrap().into_profile();
        assert_eq!(profile.traits.get("aggression"), Some(&0.7));
        assert_eq!(profile.confidence, 0.4);
    }
}
