//! Typed wrapper around the Parley REST API.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use parley_shared::constants::API_PREFIX;
use parley_shared::protocol::{
    CreateChatRequest, CreatePromptRequest, ErrorBody, PromptReply, RenameChatRequest,
    SendMessageRequest, SendPromptRequest,
};
use parley_shared::types::{Chat, Message, Prompt, Settings, SettingsPatch};

use crate::error::{ClientError, Result};

/// Default server location for local development.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

impl ApiClient {
    pub fn new(server_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), server_url)
    }

    pub fn with_client(http: reqwest::Client, server_url: &str) -> Self {
        Self {
            http,
            base_url: format!("{}{}", server_url.trim_end_matches('/'), API_PREFIX),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn fetch_chats(&self) -> Result<Vec<Chat>> {
        let resp = self.http.get(self.url("/chats")).send().await?;
        decode(resp).await
    }

    pub async fn fetch_chat(&self, id: Uuid) -> Result<Chat> {
        let resp = self.http.get(self.url(&format!("/chats/{id}"))).send().await?;
        decode(resp).await
    }

    pub async fn create_chat(&self, title: &str) -> Result<Chat> {
        let resp = self
            .http
            .post(self.url("/chats"))
            .json(&CreateChatRequest::new(title))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn rename_chat(&self, id: Uuid, title: &str) -> Result<Chat> {
        let resp = self
            .http
            .patch(self.url(&format!("/chats/{id}")))
            .json(&RenameChatRequest::new(title))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn delete_chat(&self, id: Uuid) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/chats/{id}")))
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }

    /// Single-turn send; returns the assistant's reply.
    pub async fn send_message(&self, chat_id: Uuid, content: &str) -> Result<Message> {
        let resp = self
            .http
            .post(self.url(&format!("/chats/{chat_id}/messages")))
            .json(&SendMessageRequest::user(content))
            .send()
            .await?;
        decode(resp).await
    }

    /// History-aware send.
    pub async fn send_prompt(&self, chat_id: Uuid, content: &str) -> Result<PromptReply> {
        let resp = self
            .http
            .post(self.url(&format!("/chats/{chat_id}/prompt")))
            .json(&SendPromptRequest::new(content))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn fetch_prompts(&self) -> Result<Vec<Prompt>> {
        let resp = self.http.get(self.url("/prompts")).send().await?;
        decode(resp).await
    }

    pub async fn create_prompt(&self, title: &str, content: &str) -> Result<Prompt> {
        let resp = self
            .http
            .post(self.url("/prompts"))
            .json(&CreatePromptRequest::new(title, content))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn fetch_settings(&self) -> Result<Settings> {
        let resp = self.http.get(self.url("/settings")).send().await?;
        decode(resp).await
    }

    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings> {
        let resp = self
            .http
            .put(self.url("/settings"))
            .json(patch)
            .send()
            .await?;
        decode(resp).await
    }
}

/// Turn a non-success response into [`ClientError::Api`], using the
/// server's `{"error"}` body when there is one.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| fallback_message(status, text));

    tracing::debug!(status = status.as_u16(), %message, "API request failed");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

fn fallback_message(status: StatusCode, text: String) -> String {
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        text
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    Ok(check(resp).await?.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_message_posts_user_role() {
        let server = MockServer::start().await;
        let reply = parley_shared::types::NewMessage::assistant("Hi").into_message();
        let chat_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path(format!("/api/chats/{chat_id}/messages")))
            .and(body_json(json!({ "role": "user", "content": "Hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&reply))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let got = client.send_message(chat_id, "Hello").await.unwrap();
        assert_eq!(got, reply);
    }

    #[tokio::test]
    async fn test_error_body_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/chats/00000000-0000-0000-0000-000000000000"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "error": "Chat not found" })),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri());
        let err = client.fetch_chat(Uuid::nil()).await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Chat not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_without_body_uses_reason() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ApiClient::new(&format!("{}/", server.uri()));
        let err = client.delete_chat(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("Internal Server Error"));
    }
}
