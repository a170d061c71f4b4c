//! Keyed cache of server collections.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use parley_shared::types::{Chat, Prompt, Settings};

/// Stable identity of one cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Chats,
    Chat(Uuid),
    Prompts,
    Settings,
}

/// A cached server response.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedData {
    Chats(Vec<Chat>),
    Chat(Chat),
    Prompts(Vec<Prompt>),
    Settings(Settings),
}

impl CachedData {
    /// The key this data is naturally stored under.
    pub fn key(&self) -> QueryKey {
        match self {
            CachedData::Chats(_) => QueryKey::Chats,
            CachedData::Chat(chat) => QueryKey::Chat(chat.id),
            CachedData::Prompts(_) => QueryKey::Prompts,
            CachedData::Settings(_) => QueryKey::Settings,
        }
    }
}

#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<RwLock<HashMap<QueryKey, CachedData>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &QueryKey) -> Option<CachedData> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn set(&self, data: CachedData) {
        self.entries.write().await.insert(data.key(), data);
    }

    /// Drop the entry. Returns `true` if something was cached.
    pub async fn invalidate(&self, key: &QueryKey) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Patch a cached entry in place. Returns `false` (and does nothing)
    /// when the key is not cached.
    pub async fn update<F>(&self, key: &QueryKey, patch: F) -> bool
    where
        F: FnOnce(&mut CachedData),
    {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(data) => {
                patch(data);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
