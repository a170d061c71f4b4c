//! Completion gateway.
//!
//! Turns a new user message into a stored assistant reply: the user message
//! is persisted first, a transcript is assembled, the provider's chat
//! completion endpoint is called with a bearer token from the
//! [`CredentialManager`], and the first returned choice is persisted as an
//! assistant message.
//!
//! A failed upstream call leaves the already persisted user message in place.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_shared::types::{Message, NewMessage, Role, Settings};
use parley_store::DocumentStore;

use crate::config::ServerConfig;
use crate::credentials::CredentialManager;
use crate::error::ServerError;

/// Build the HTTP client used for every upstream call.
pub fn http_client(config: &ServerConfig) -> reqwest::Result<reqwest::Client> {
    let mut builder =
        reqwest::Client::builder().danger_accept_invalid_certs(config.accept_invalid_certs);
    if let Some(timeout) = config.upstream_timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

// ---------------------------------------------------------------------------
// Wire format of the completion endpoint
// ---------------------------------------------------------------------------

/// One role/content pair of the transcript sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for TranscriptEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [TranscriptEntry],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

// ---------------------------------------------------------------------------
// Generation parameters
// ---------------------------------------------------------------------------

/// Model and sampling parameters for one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl GenerationParams {
    /// Parameters taken from the process-wide settings only.
    pub fn from_defaults(defaults: &Settings) -> Self {
        Self {
            model: defaults.model.clone(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Sampling parameters from the chat's own settings, model from the
    /// process-wide settings. A chat value that is not positive counts as
    /// unset and falls back to the process-wide one, for both temperature
    /// and token budget.
    pub fn for_chat(chat: &Settings, defaults: &Settings) -> Self {
        Self {
            model: defaults.model.clone(),
            temperature: if chat.temperature > 0.0 {
                chat.temperature
            } else {
                defaults.temperature
            },
            max_tokens: if chat.max_tokens > 0 {
                chat.max_tokens
            } else {
                defaults.max_tokens
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CompletionGateway {
    http: reqwest::Client,
    api_url: String,
    credentials: CredentialManager,
}

impl CompletionGateway {
    pub fn new(http: reqwest::Client, config: &ServerConfig, credentials: CredentialManager) -> Self {
        Self {
            http,
            api_url: config.api_url.clone(),
            credentials,
        }
    }

    /// Single-turn flow: only the new message is sent upstream, with the
    /// process-wide settings. Returns the stored assistant message.
    pub async fn single_turn(
        &self,
        store: &Mutex<DocumentStore>,
        chat_id: Uuid,
        role: Role,
        content: String,
    ) -> Result<Message, ServerError> {
        let (user_message, params) = {
            let mut store = store.lock().await;
            let user_message = store.append_message(chat_id, NewMessage::new(role, content))?;
            (user_message, GenerationParams::from_defaults(store.settings()))
        };

        let transcript = [TranscriptEntry::from(&user_message)];
        let reply = self.complete(&transcript, &params).await?;

        let mut store = store.lock().await;
        Ok(store.append_message(chat_id, NewMessage::assistant(reply))?)
    }

    /// History-aware flow: the chat's prior messages followed by the new one
    /// are sent upstream, using the chat's own sampling settings. Returns the
    /// stored user and assistant messages.
    pub async fn prompt_to_chat(
        &self,
        store: &Mutex<DocumentStore>,
        chat_id: Uuid,
        content: String,
    ) -> Result<(Message, Message), ServerError> {
        let (transcript, user_message, params) = {
            let mut store = store.lock().await;
            let chat = store.get_chat(chat_id).ok_or(ServerError::ChatNotFound)?;
            let mut transcript: Vec<TranscriptEntry> =
                chat.messages.iter().map(TranscriptEntry::from).collect();
            let params = GenerationParams::for_chat(&chat.settings, store.settings());

            let user_message = store.append_message(chat_id, NewMessage::user(content))?;
            transcript.push(TranscriptEntry::from(&user_message));
            (transcript, user_message, params)
        };

        let reply = self.complete(&transcript, &params).await?;

        let mut store = store.lock().await;
        let ai_message = store.append_message(chat_id, NewMessage::assistant(reply))?;
        Ok((user_message, ai_message))
    }

    /// Call the completion endpoint and return the first choice's text.
    pub async fn complete(
        &self,
        transcript: &[TranscriptEntry],
        params: &GenerationParams,
    ) -> Result<String, ServerError> {
        let token = self.credentials.bearer_token().await?;

        let request = CompletionRequest {
            model: &params.model,
            messages: transcript,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        debug!(
            model = %params.model,
            messages = transcript.len(),
            "Calling completion endpoint"
        );

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServerError::Upstream(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "Completion endpoint returned an error");
            return Err(ServerError::Upstream(format!("provider responded {status}")));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ServerError::Upstream(format!("malformed response: {e}")))?;

        let reply = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ServerError::Upstream("response contained no choices".into()))?;

        info!(chars = reply.len(), "Completion received");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "expires_in": 1800
            })))
            .mount(server)
            .await;
    }

    fn completion_body(text: &str) -> serde_json::Value {
        json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        })
    }

    fn gateway_for(server: &MockServer) -> CompletionGateway {
        let config = ServerConfig {
            token_url: format!("{}/oauth", server.uri()),
            api_url: format!("{}/chat/completions", server.uri()),
            auth_key: Some("key".into()),
            ..Default::default()
        };
        let http = reqwest::Client::new();
        let credentials = CredentialManager::new(http.clone(), &config);
        CompletionGateway::new(http, &config, credentials)
    }

    fn test_store() -> (Mutex<DocumentStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::open_at(&dir.path().join("db.json")).unwrap();
        (Mutex::new(store), dir)
    }

    #[test]
    fn test_chat_params_fall_back_on_zero_budget() {
        let defaults = Settings::default();
        let chat = Settings {
            model: "ignored".into(),
            temperature: 0.3,
            max_tokens: 0,
        };
        let params = GenerationParams::for_chat(&chat, &defaults);
        assert_eq!(params.model, defaults.model);
        assert_eq!(params.temperature, 0.3);
        assert_eq!(params.max_tokens, defaults.max_tokens);
    }

    #[test]
    fn test_chat_params_fall_back_on_zero_temperature() {
        let defaults = Settings::default();
        let chat = Settings {
            temperature: 0.0,
            max_tokens: 250,
            ..Settings::default()
        };
        let params = GenerationParams::for_chat(&chat, &defaults);
        assert_eq!(params.temperature, defaults.temperature);
        assert_eq!(params.max_tokens, 250);
    }

    #[tokio::test]
    async fn test_single_turn_sends_only_new_message() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer tok"))
            .and(body_partial_json(json!({
                "model": "GigaChat",
                "messages": [{ "role": "user", "content": "second" }],
                "temperature": 0.7,
                "max_tokens": 1000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("reply")))
            .expect(1)
            .mount(&server)
            .await;

        let (store, _dir) = test_store();
        let chat_id = {
            let mut s = store.lock().await;
            let chat = s.create_chat("Test").unwrap();
            s.append_message(chat.id, NewMessage::user("first")).unwrap();
            chat.id
        };

        let gateway = gateway_for(&server);
        let reply = gateway
            .single_turn(&store, chat_id, Role::User, "second".into())
            .await
            .unwrap();

        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "reply");
        let s = store.lock().await;
        let chat = s.get_chat(chat_id).unwrap();
        assert_eq!(chat.messages.len(), 3);
        assert_eq!(chat.messages[1].content, "second");
    }

    #[tokio::test]
    async fn test_prompt_to_chat_sends_history_and_chat_settings() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [
                    { "role": "user", "content": "Hello" },
                    { "role": "assistant", "content": "Hi!" },
                    { "role": "user", "content": "Tell me more" }
                ],
                "temperature": 0.7,
                "max_tokens": 1000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("More.")))
            .expect(1)
            .mount(&server)
            .await;

        let (store, _dir) = test_store();
        let chat_id = {
            let mut s = store.lock().await;
            let chat = s.create_chat("Test").unwrap();
            s.append_message(chat.id, NewMessage::user("Hello")).unwrap();
            s.append_message(chat.id, NewMessage::assistant("Hi!")).unwrap();
            // Process-wide change after creation must not affect this chat.
            s.update_settings(parley_shared::types::SettingsPatch {
                temperature: Some(1.5),
                ..Default::default()
            })
            .unwrap();
            chat.id
        };

        let gateway = gateway_for(&server);
        let (user, ai) = gateway
            .prompt_to_chat(&store, chat_id, "Tell me more".into())
            .await
            .unwrap();

        assert_eq!(user.content, "Tell me more");
        assert_eq!(ai.content, "More.");
        assert_eq!(store.lock().await.get_chat(chat_id).unwrap().messages.len(), 4);
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_user_message() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (store, _dir) = test_store();
        let chat_id = store.lock().await.create_chat("Test").unwrap().id;

        let gateway = gateway_for(&server);
        let result = gateway
            .single_turn(&store, chat_id, Role::User, "Hello".into())
            .await;

        assert!(matches!(result, Err(ServerError::Upstream(_))));
        let s = store.lock().await;
        let chat = s.get_chat(chat_id).unwrap();
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].role, Role::User);
        assert_eq!(chat.title, "Hello");
    }

    #[tokio::test]
    async fn test_prompt_upstream_failure_keeps_user_message() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (store, _dir) = test_store();
        let chat_id = {
            let mut s = store.lock().await;
            let chat = s.create_chat("Test").unwrap();
            s.append_message(chat.id, NewMessage::user("Hello")).unwrap();
            s.append_message(chat.id, NewMessage::assistant("Hi!")).unwrap();
            chat.id
        };

        let gateway = gateway_for(&server);
        let result = gateway
            .prompt_to_chat(&store, chat_id, "Tell me more".into())
            .await;

        assert!(matches!(result, Err(ServerError::Upstream(_))));
        let s = store.lock().await;
        let chat = s.get_chat(chat_id).unwrap();
        assert_eq!(chat.messages.len(), 3);
        assert_eq!(chat.messages[2].role, Role::User);
        assert_eq!(chat.messages[2].content, "Tell me more");
        assert_eq!(chat.title, "Hello");
    }

    #[tokio::test]
    async fn test_missing_choices_is_upstream_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let transcript = [TranscriptEntry {
            role: Role::User,
            content: "hi".into(),
        }];
        let result = gateway
            .complete(&transcript, &GenerationParams::from_defaults(&Settings::default()))
            .await;
        assert!(matches!(result, Err(ServerError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_unknown_chat_skips_upstream() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (store, _dir) = test_store();
        let gateway = gateway_for(&server);

        let single = gateway
            .single_turn(&store, Uuid::new_v4(), Role::User, "hi".into())
            .await;
        let history = gateway
            .prompt_to_chat(&store, Uuid::new_v4(), "hi".into())
            .await;

        assert!(matches!(single, Err(ServerError::ChatNotFound)));
        assert!(matches!(history, Err(ServerError::ChatNotFound)));
    }
}
