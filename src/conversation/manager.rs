use super::Conversation;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// A conversation shared between the manager and a running loop.
///
/// The mutex is held for a whole loop run, so each id has a single writer.
pub type SharedConversation = Arc<Mutex<Conversation>>;

/// Conversations keyed by caller-supplied id.
#[derive(Debug, Default)]
pub struct ConversationManager {
    conversations: RwLock<HashMap<String, SharedConversation>>,
    default_system_prompt: Option<String>,
}

impl ConversationManager {
    pub fn new(default_system_prompt: Option<String>) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            default_system_prompt,
        }
    }

    /// Create a conversation. Fails with [`Error::ConversationExists`] if the id is taken.
    pub async fn create(
        &self,
        id: impl Into<String>,
        system_prompt: Option<String>,
    ) -> Result<SharedConversation> {
        let id = id.into();
        let mut map = self.conversations.write().await;
        if map.contains_key(&id) {
            return Err(Error::ConversationExists(id));
        }
        let prompt = system_prompt.or_else(|| self.default_system_prompt.clone());
        let conv = Arc::new(Mutex::new(Conversation::new(prompt)));
        map.insert(id.clone(), Arc::clone(&conv));
        debug!(conversation_id = %id, "created conversation");
        Ok(conv)
    }

    pub async fn get(&self, id: &str) -> Result<SharedConversation> {
        self.conversations
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ConversationNotFound(id.to_string()))
    }

    /// Fetch the conversation, creating it with the default prompt when missing.
    pub async fn get_or_create(&self, id: &str) -> SharedConversation {
        let mut map = self.conversations.write().await;
        map.entry(id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Conversation::new(
                    self.default_system_prompt.clone(),
                )))
            })
            .clone()
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.conversations
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::ConversationNotFound(id.to_string()))
    }

    /// Ids in lexical order.
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.conversations.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }

    /// Write every conversation to `path` as one JSON object keyed by id.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let handles: Vec<(String, SharedConversation)> = self
            .conversations
            .read()
            .await
            .iter()
            .map(|(id, conv)| (id.clone(), Arc::clone(conv)))
            .collect();

        let mut snapshot = BTreeMap::new();
        for (id, conv) in handles {
            let value = conv.lock().await.to_serialized()?;
            snapshot.insert(id, value);
        }
        let text = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(path, text).await?;
        info!(path = %path.display(), conversations = snapshot.len(), "saved conversations");
        Ok(())
    }

    /// Replace all conversations with the ones stored at `path`.
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let stored: HashMap<String, Conversation> = serde_json::from_str(&text)?;
        let count = stored.len();
        let loaded = stored
            .into_iter()
            .map(|(id, conv)| (id, Arc::new(Mutex::new(conv))))
            .collect();
        *self.conversations.write().await = loaded;
        info!(path = %path.display(), conversations = count, "loaded conversations");
        Ok(())
    }
}
