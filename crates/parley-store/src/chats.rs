use uuid::Uuid;

use parley_shared::types::{Chat, Message, NewMessage};

use crate::document::{Document, DocumentStore};
use crate::error::{Result, StoreError};

fn find_chat_mut(doc: &mut Document, id: Uuid) -> Result<&mut Chat> {
    doc.chats
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or(StoreError::ChatNotFound(id))
}

impl DocumentStore {
    /// Create an empty chat carrying a copy of the current settings.
    pub fn create_chat(&mut self, title: &str) -> Result<Chat> {
        let chat = self.commit(|doc| {
            let chat = Chat::new(title, doc.settings.clone());
            doc.chats.push(chat.clone());
            Ok(chat)
        })?;
        tracing::debug!(chat = %chat.id, "chat created");
        Ok(chat)
    }

    pub fn list_chats(&self) -> &[Chat] {
        &self.document().chats
    }

    pub fn get_chat(&self, id: Uuid) -> Option<&Chat> {
        self.document().chats.iter().find(|c| c.id == id)
    }

    /// Append `message` to the chat, deriving the title when it is the
    /// chat's first message and the user wrote it.
    pub fn append_message(&mut self, chat_id: Uuid, message: NewMessage) -> Result<Message> {
        let stored = self.commit(|doc| {
            let chat = find_chat_mut(doc, chat_id)?;
            let stored = message.into_message();
            chat.push_message(stored.clone());
            Ok(stored)
        })?;
        tracing::debug!(
            chat = %chat_id,
            message = %stored.id,
            role = %stored.role,
            "message appended"
        );
        Ok(stored)
    }

    pub fn rename_chat(&mut self, id: Uuid, title: &str) -> Result<Chat> {
        self.commit(|doc| {
            let chat = find_chat_mut(doc, id)?;
            chat.title = title.to_string();
            Ok(chat.clone())
        })
    }

    pub fn delete_chat(&mut self, id: Uuid) -> Result<()> {
        self.commit(|doc| {
            let before = doc.chats.len();
            doc.chats.retain(|c| c.id != id);
            if doc.chats.len() == before {
                return Err(StoreError::ChatNotFound(id));
            }
            Ok(())
        })?;
        tracing::debug!(chat = %id, "chat deleted");
        Ok(())
    }
}
