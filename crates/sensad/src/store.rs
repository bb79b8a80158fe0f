//! Conversation store - append-only message history keyed by thread id.
//!
//! Threads are created lazily by their first append and live as long as the
//! store. An append commits all of its messages or none of them.

use async_trait::async_trait;
use sensa_common::Message;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Conversation store is full ({0} threads)")]
    Exhausted(usize),

    #[error("Conversation store unavailable: {0}")]
    Unavailable(String),
}

/// Storage seam used by the turn router
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Full history of a thread; empty for a thread never written
    async fn load(&self, thread_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Append messages atomically, returning the new history length
    async fn append(&self, thread_id: &str, messages: Vec<Message>) -> Result<usize, StoreError>;

    /// Number of threads held
    async fn thread_count(&self) -> usize;
}

/// In-process store bounded by a maximum thread count
pub struct InMemoryStore {
    threads: RwLock<HashMap<String, Vec<Message>>>,
    max_threads: usize,
}

impl InMemoryStore {
    pub fn new(max_threads: usize) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            max_threads,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn load(&self, thread_id: &str) -> Result<Vec<Message>, StoreError> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned().unwrap_or_default())
    }

    async fn append(&self, thread_id: &str, messages: Vec<Message>) -> Result<usize, StoreError> {
        let mut threads = self.threads.write().await;

        if !threads.contains_key(thread_id) && threads.len() >= self.max_threads {
            error!("[STORE] Refusing new thread {}: store full", thread_id);
            return Err(StoreError::Exhausted(self.max_threads));
        }

        let history = threads.entry(thread_id.to_string()).or_default();
        history.extend(messages);
        debug!("[STORE] Thread {} now has {} messages", thread_id, history.len());
        Ok(history.len())
    }

    async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lazy_thread_creation() {
        let store = InMemoryStore::default();
        assert!(store.load("t1").await.unwrap().is_empty());
        assert_eq!(store.thread_count().await, 0);

        let len = store
            .append("t1", vec![Message::user("hi"), Message::assistant("hello")])
            .await
            .unwrap();
        assert_eq!(len, 2);
        assert_eq!(store.thread_count().await, 1);
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemoryStore::default();
        store.append("t", vec![Message::user("one")]).await.unwrap();
        store.append("t", vec![Message::user("two")]).await.unwrap();

        let history = store.load("t").await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_full_store_rejects_new_threads_only() {
        let store = InMemoryStore::new(1);
        store.append("a", vec![Message::user("x")]).await.unwrap();

        let err = store.append("b", vec![Message::user("y")]).await.unwrap_err();
        assert_eq!(err, StoreError::Exhausted(1));
        assert!(store.load("b").await.unwrap().is_empty());

        // Existing threads keep growing
        assert_eq!(store.append("a", vec![Message::user("z")]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_threads_do_not_interfere() {
        let store = Arc::new(InMemoryStore::default());
        let mut handles = Vec::new();

        for t in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("thread-{}", t);
                for i in 0..25 {
                    store
                        .append(&id, vec![Message::user(format!("{}-{}", t, i))])
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.thread_count().await, 8);
        for t in 0..8 {
            let history = store.load(&format!("thread-{}", t)).await.unwrap();
            assert_eq!(history.len(), 25);
            assert!(history.iter().all(|m| m.content.starts_with(&format!("{}-", t))));
        }
    }
}
