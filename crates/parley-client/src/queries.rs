//! Cached queries and the mutations that keep them in sync.
//!
//! Reads return the cached value when present and fetch it otherwise.
//! Mutations run against the server first; only on success do they
//! invalidate or patch the affected keys, so a failed mutation leaves the
//! cache untouched.

use tokio::sync::broadcast;
use uuid::Uuid;

use parley_shared::protocol::PromptReply;
use parley_shared::types::{Chat, Message, Prompt, Settings, SettingsPatch};

use crate::api::ApiClient;
use crate::cache::{CachedData, QueryCache, QueryKey};
use crate::error::Result;
use crate::events::{self, emit_event, QueryEvent};

#[derive(Clone)]
pub struct ChatQueries {
    api: ApiClient,
    cache: QueryCache,
    events: broadcast::Sender<QueryEvent>,
}

impl ChatQueries {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cache: QueryCache::new(),
            events: events::channel(),
        }
    }

    /// Receive a [`QueryEvent`] for every invalidation or in-place patch.
    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.events.subscribe()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    async fn invalidate(&self, key: QueryKey) {
        self.cache.invalidate(&key).await;
        tracing::debug!(?key, "Query invalidated");
        emit_event(&self.events, QueryEvent::Invalidated(key));
    }

    // ─── Queries ───

    pub async fn chats(&self) -> Result<Vec<Chat>> {
        if let Some(CachedData::Chats(chats)) = self.cache.get(&QueryKey::Chats).await {
            return Ok(chats);
        }
        let chats = self.api.fetch_chats().await?;
        self.cache.set(CachedData::Chats(chats.clone())).await;
        Ok(chats)
    }

    pub async fn chat(&self, id: Uuid) -> Result<Chat> {
        if let Some(CachedData::Chat(chat)) = self.cache.get(&QueryKey::Chat(id)).await {
            return Ok(chat);
        }
        let chat = self.api.fetch_chat(id).await?;
        self.cache.set(CachedData::Chat(chat.clone())).await;
        Ok(chat)
    }

    pub async fn prompts(&self) -> Result<Vec<Prompt>> {
        if let Some(CachedData::Prompts(prompts)) = self.cache.get(&QueryKey::Prompts).await {
            return Ok(prompts);
        }
        let prompts = self.api.fetch_prompts().await?;
        self.cache.set(CachedData::Prompts(prompts.clone())).await;
        Ok(prompts)
    }

    pub async fn settings(&self) -> Result<Settings> {
        if let Some(CachedData::Settings(settings)) = self.cache.get(&QueryKey::Settings).await {
            return Ok(settings);
        }
        let settings = self.api.fetch_settings().await?;
        self.cache.set(CachedData::Settings(settings.clone())).await;
        Ok(settings)
    }

    // ─── Mutations ───

    pub async fn create_chat(&self, title: &str) -> Result<Chat> {
        let chat = self.api.create_chat(title).await?;
        self.invalidate(QueryKey::Chats).await;
        Ok(chat)
    }

    pub async fn send_message(&self, chat_id: Uuid, content: &str) -> Result<Message> {
        let reply = self.api.send_message(chat_id, content).await?;
        self.invalidate(QueryKey::Chat(chat_id)).await;
        Ok(reply)
    }

    pub async fn send_prompt(&self, chat_id: Uuid, content: &str) -> Result<PromptReply> {
        let reply = self.api.send_prompt(chat_id, content).await?;
        self.invalidate(QueryKey::Chat(chat_id)).await;
        Ok(reply)
    }

    /// Rename on the server, then patch the cached chat list in place.
    pub async fn rename_chat(&self, chat_id: Uuid, title: &str) -> Result<Chat> {
        let renamed = self.api.rename_chat(chat_id, title).await?;

        let patched = self
            .cache
            .update(&QueryKey::Chats, |data| {
                if let CachedData::Chats(chats) = data {
                    if let Some(chat) = chats.iter_mut().find(|c| c.id == chat_id) {
                        chat.title = renamed.title.clone();
                    }
                }
            })
            .await;
        if patched {
            emit_event(&self.events, QueryEvent::Updated(QueryKey::Chats));
        }

        self.invalidate(QueryKey::Chat(chat_id)).await;
        Ok(renamed)
    }

    /// Delete on the server, then drop the chat from the cached list.
    pub async fn delete_chat(&self, chat_id: Uuid) -> Result<()> {
        self.api.delete_chat(chat_id).await?;

        let patched = self
            .cache
            .update(&QueryKey::Chats, |data| {
                if let CachedData::Chats(chats) = data {
                    chats.retain(|c| c.id != chat_id);
                }
            })
            .await;
        if patched {
            emit_event(&self.events, QueryEvent::Updated(QueryKey::Chats));
        }

        self.invalidate(QueryKey::Chat(chat_id)).await;
        Ok(())
    }

    pub async fn create_prompt(&self, title: &str, content: &str) -> Result<Prompt> {
        let prompt = self.api.create_prompt(title, content).await?;
        self.invalidate(QueryKey::Prompts).await;
        Ok(prompt)
    }

    /// Apply a partial update and cache the server's merged result.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings> {
        let settings = self.api.update_settings(patch).await?;
        self.cache.set(CachedData::Settings(settings.clone())).await;
        emit_event(&self.events, QueryEvent::Updated(QueryKey::Settings));
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_shared::types::NewMessage;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn queries_for(server: &MockServer) -> ChatQueries {
        ChatQueries::new(ApiClient::new(&server.uri()))
    }

    #[tokio::test]
    async fn test_chats_served_from_cache() {
        let server = MockServer::start().await;
        let chats = vec![Chat::new("Cached", Settings::default())];

        Mock::given(method("GET"))
            .and(path("/api/chats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&chats))
            .expect(1)
            .mount(&server)
            .await;

        let queries = queries_for(&server);
        assert_eq!(queries.chats().await.unwrap(), chats);
        assert_eq!(queries.chats().await.unwrap(), chats);
    }

    #[tokio::test]
    async fn test_create_chat_invalidates_list() {
        let server = MockServer::start().await;
        let created = Chat::new("New", Settings::default());

        Mock::given(method("GET"))
            .and(path("/api/chats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chats"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&created))
            .mount(&server)
            .await;

        let queries = queries_for(&server);
        let mut events = queries.subscribe();

        queries.chats().await.unwrap();
        queries.create_chat("New").await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            QueryEvent::Invalidated(QueryKey::Chats)
        );
        // Refetched after invalidation.
        queries.chats().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_message_invalidates_only_that_chat() {
        let server = MockServer::start().await;
        let chat = Chat::new("Talk", Settings::default());
        let other = Chat::new("Other", Settings::default());
        let reply = NewMessage::assistant("Hi").into_message();

        for c in [&chat, &other] {
            Mock::given(method("GET"))
                .and(path(format!("/api/chats/{}", c.id)))
                .respond_with(ResponseTemplate::new(200).set_body_json(c))
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path(format!("/api/chats/{}/messages", chat.id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(&reply))
            .mount(&server)
            .await;

        let queries = queries_for(&server);
        queries.chat(chat.id).await.unwrap();
        queries.chat(other.id).await.unwrap();

        queries.send_message(chat.id, "Hello").await.unwrap();

        assert!(queries.cache().get(&QueryKey::Chat(chat.id)).await.is_none());
        assert!(queries.cache().get(&QueryKey::Chat(other.id)).await.is_some());
    }

    #[tokio::test]
    async fn test_rename_patches_cached_list() {
        let server = MockServer::start().await;
        let chat = Chat::new("Old", Settings::default());
        let mut renamed = chat.clone();
        renamed.title = "New".into();

        Mock::given(method("GET"))
            .and(path("/api/chats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![&chat]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(format!("/api/chats/{}", chat.id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(&renamed))
            .mount(&server)
            .await;

        let queries = queries_for(&server);
        let mut events = queries.subscribe();
        queries.chats().await.unwrap();

        queries.rename_chat(chat.id, "New").await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            QueryEvent::Updated(QueryKey::Chats)
        );
        assert_eq!(
            events.recv().await.unwrap(),
            QueryEvent::Invalidated(QueryKey::Chat(chat.id))
        );
        // Still cached (no refetch), but with the new title.
        let chats = queries.chats().await.unwrap();
        assert_eq!(chats[0].title, "New");
    }

    #[tokio::test]
    async fn test_delete_removes_from_cached_list() {
        let server = MockServer::start().await;
        let keep = Chat::new("Keep", Settings::default());
        let gone = Chat::new("Gone", Settings::default());

        Mock::given(method("GET"))
            .and(path("/api/chats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![&keep, &gone]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("/api/chats/{}", gone.id)))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let queries = queries_for(&server);
        queries.chats().await.unwrap();
        queries.delete_chat(gone.id).await.unwrap();

        let chats = queries.chats().await.unwrap();
        assert_eq!(chats, vec![keep]);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cache() {
        let server = MockServer::start().await;
        let chat = Chat::new("Stay", Settings::default());

        Mock::given(method("GET"))
            .and(path("/api/chats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![&chat]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({ "error": "Failed to process request" })),
            )
            .mount(&server)
            .await;

        let queries = queries_for(&server);
        queries.chats().await.unwrap();

        let err = queries.delete_chat(chat.id).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(queries.chats().await.unwrap(), vec![chat]);
    }

    #[tokio::test]
    async fn test_update_settings_replaces_cached_value() {
        let server = MockServer::start().await;
        let updated = Settings {
            temperature: 0.2,
            ..Settings::default()
        };

        Mock::given(method("PUT"))
            .and(path("/api/settings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&updated))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/settings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Settings::default()))
            .expect(0)
            .mount(&server)
            .await;

        let queries = queries_for(&server);
        queries
            .update_settings(&SettingsPatch {
                temperature: Some(0.2),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(queries.settings().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_create_prompt_invalidates_prompts() {
        let server = MockServer::start().await;
        let prompt = Prompt::new("Greet", "Hi there");

        Mock::given(method("GET"))
            .and(path("/api/prompts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/prompts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&prompt))
            .mount(&server)
            .await;

        let queries = queries_for(&server);
        queries.prompts().await.unwrap();
        let created = queries.create_prompt("Greet", "Hi there").await.unwrap();
        assert_eq!(created, prompt);
        queries.prompts().await.unwrap();
    }
}
