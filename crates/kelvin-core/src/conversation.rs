//! Conversation store: the ordered message list, written through to storage
//! on every mutation.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::state::ChatMessage;
use crate::storage::{KeyValueStore, HISTORY_KEY};

/// How `ConversationStore::load` arrived at its contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A saved conversation was read back
    Restored,
    /// Nothing was saved; started from the greeting
    Fresh,
    /// A saved value existed but could not be parsed; started from the greeting
    Recovered { reason: String },
}

pub struct ConversationStore<S> {
    storage: S,
    messages: Vec<ChatMessage>,
}

impl<S: KeyValueStore> ConversationStore<S> {
    /// Read the persisted conversation, falling back to the greeting.
    ///
    /// A value that fails to parse is logged and left untouched in storage
    /// until the next mutation replaces it.
    pub fn load(storage: S) -> (Self, LoadOutcome) {
        let (messages, outcome) = match storage.get(HISTORY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ChatMessage>>(&raw) {
                Ok(messages) => {
                    debug!(count = messages.len(), "restored conversation");
                    (messages, LoadOutcome::Restored)
                }
                Err(e) => {
                    warn!(error = %e, "saved conversation is unreadable, starting fresh");
                    (
                        default_conversation(),
                        LoadOutcome::Recovered {
                            reason: e.to_string(),
                        },
                    )
                }
            },
            Ok(None) => (default_conversation(), LoadOutcome::Fresh),
            Err(e) => {
                warn!(error = %e, "could not read saved conversation, starting fresh");
                (
                    default_conversation(),
                    LoadOutcome::Recovered {
                        reason: e.to_string(),
                    },
                )
            }
        };

        (Self { storage, messages }, outcome)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Append a message and persist. Returns the new message's index.
    pub fn append(&mut self, message: ChatMessage) -> Result<usize> {
        let mut next = self.messages.clone();
        next.push(message);
        self.persist(&next)?;
        self.messages = next;
        Ok(self.messages.len() - 1)
    }

    /// Replace everything with the greeting and persist.
    pub fn reset(&mut self) -> Result<()> {
        let next = default_conversation();
        self.persist(&next)?;
        self.messages = next;
        Ok(())
    }

    fn persist(&self, messages: &[ChatMessage]) -> Result<()> {
        let json = serde_json::to_string(messages).context("Failed to serialize conversation")?;
        self.storage
            .set(HISTORY_KEY, &json)
            .context("Failed to save conversation")
    }
}

pub fn default_conversation() -> Vec<ChatMessage> {
    vec![ChatMessage::greeting()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatRole;
    use crate::storage::MemoryStore;
    use anyhow::anyhow;
    use std::sync::Arc;

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    fn persisted(store: &MemoryStore) -> Vec<ChatMessage> {
        let raw = store.get(HISTORY_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_load_without_saved_value_seeds_greeting() {
        let (conversation, outcome) = ConversationStore::load(MemoryStore::new());
        assert_eq!(outcome, LoadOutcome::Fresh);
        assert_eq!(conversation.messages(), &[ChatMessage::greeting()]);
    }

    #[test]
    fn test_load_restores_saved_order() {
        let store = MemoryStore::new();
        store
            .set(
                HISTORY_KEY,
                r#"[{"role":"user","content":"a"},{"role":"assistant","content":"b"}]"#,
            )
            .unwrap();
        let (conversation, outcome) = ConversationStore::load(store);
        assert_eq!(outcome, LoadOutcome::Restored);
        assert_eq!(
            conversation.messages(),
            &[ChatMessage::user("a"), ChatMessage::assistant("b")]
        );
    }

    #[test]
    fn test_load_recovers_from_garbage() {
        let store = MemoryStore::new();
        store.set(HISTORY_KEY, "{not json").unwrap();
        let (conversation, outcome) = ConversationStore::load(store);
        assert!(matches!(outcome, LoadOutcome::Recovered { .. }));
        assert_eq!(conversation.messages(), &[ChatMessage::greeting()]);
        // Left alone until the next write
        assert_eq!(
            conversation.storage().get(HISTORY_KEY).unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn test_append_writes_through() {
        let store = Arc::new(MemoryStore::new());
        let (mut conversation, _) = ConversationStore::load(store.clone());
        let idx = conversation.append(ChatMessage::user("Hello")).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(persisted(&store), conversation.messages());
        assert_eq!(conversation.messages()[1].role, ChatRole::User);
    }

    #[test]
    fn test_reset_then_reload_equals_greeting() {
        let store = Arc::new(MemoryStore::new());
        let (mut conversation, _) = ConversationStore::load(store.clone());
        conversation.append(ChatMessage::user("one")).unwrap();
        conversation.append(ChatMessage::assistant("two")).unwrap();
        conversation.reset().unwrap();

        let (reloaded, outcome) = ConversationStore::load(store.clone());
        assert_eq!(outcome, LoadOutcome::Restored);
        assert_eq!(reloaded.messages(), default_conversation().as_slice());
        assert_eq!(conversation.messages(), reloaded.messages());
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let (mut conversation, _) = ConversationStore::load(ReadOnlyStore);
        assert!(conversation.append(ChatMessage::user("lost")).is_err());
        assert_eq!(conversation.messages(), &[ChatMessage::greeting()]);
    }

    #[test]
    fn test_serialization_roundtrip_preserves_pairs() {
        let messages = vec![
            ChatMessage::user("multi\nline `code`"),
            ChatMessage::assistant("ünïcödé **bold**"),
            ChatMessage::user(""),
        ];
        let json = serde_json::to_string(&messages).unwrap();
        let back: Vec<ChatMessage> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, messages);
    }
}
