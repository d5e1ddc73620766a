//! SessionMemory - per-session conversation windows shared across sessions

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::llm::{Message, Role};

/// Bounded message window of one session
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    messages: VecDeque<Message>,
    max_messages: usize,
    last_active: Instant,
}

impl ConversationMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages: max_messages.max(1),
            last_active: Instant::now(),
        }
    }

    /// Append a message, dropping the oldest beyond the window
    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
        self.last_active = Instant::now();
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    /// The last `count` messages as `role: text` lines
    pub fn transcript(&self, count: usize) -> Vec<String> {
        let skip = self.messages.len().saturating_sub(count);
        self.messages
            .iter()
            .skip(skip)
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }
}

/// Keyed cache of conversation windows
///
/// Many sessions read and create entries concurrently; the first caller for
/// an id creates its entry. Each entry has its own lock so one session never
/// waits on another's conversation. Entries idle longer than `ttl` are
/// dropped by [`SessionMemory::evict_inactive`].
#[derive(Clone)]
pub struct SessionMemory {
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<ConversationMemory>>>>>,
    max_messages: usize,
    ttl: Duration,
}

impl SessionMemory {
    pub fn new(max_messages: usize, ttl: Duration) -> Self {
        debug!(max_messages, ?ttl, "SessionMemory::new: called");
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_messages,
            ttl,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_messages, config.ttl())
    }

    /// Entry for `session_id`, created on first use
    pub async fn session(&self, session_id: &str) -> Arc<Mutex<ConversationMemory>> {
        debug!(%session_id, "SessionMemory::session: called");
        if let Some(entry) = self.sessions.read().await.get(session_id) {
            return Arc::clone(entry);
        }

        let mut sessions = self.sessions.write().await;
        // Another caller may have created it between the two locks
        let entry = sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!(%session_id, "SessionMemory::session: created branch");
            Arc::new(Mutex::new(ConversationMemory::new(self.max_messages)))
        });
        Arc::clone(entry)
    }

    pub async fn record(&self, session_id: &str, role: Role, content: impl Into<String>) {
        let entry = self.session(session_id).await;
        entry.lock().await.push(Message {
            role,
            content: content.into(),
        });
    }

    /// Recent conversation lines for prompt construction
    pub async fn transcript(&self, session_id: &str, count: usize) -> Vec<String> {
        let entry = match self.sessions.read().await.get(session_id) {
            Some(entry) => Arc::clone(entry),
            None => return Vec::new(),
        };
        entry.lock().await.transcript(count)
    }

    pub async fn messages(&self, session_id: &str) -> Vec<Message> {
        let entry = match self.sessions.read().await.get(session_id) {
            Some(entry) => Arc::clone(entry),
            None => return Vec::new(),
        };
        entry.lock().await.messages()
    }

    /// Drop one session; true when it existed
    pub async fn clear(&self, session_id: &str) -> bool {
        debug!(%session_id, "SessionMemory::clear: called");
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove sessions idle longer than the TTL, returning how many went
    pub async fn evict_inactive(&self) -> usize {
        debug!(ttl = ?self.ttl, "SessionMemory::evict_inactive: called");
        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();
        for (id, entry) in sessions.iter() {
            // A session busy right now is not idle
            if let Ok(memory) = entry.try_lock()
                && memory.idle_for() > self.ttl
            {
                expired.push(id.clone());
            }
        }
        for id in &expired {
            sessions.remove(id);
        }
        if !expired.is_empty() {
            info!("Evicted {} inactive sessions", expired.len());
        }
        expired.len()
    }

    /// Run [`SessionMemory::evict_inactive`] every `interval` until aborted
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        debug!(?interval, "SessionMemory::spawn_sweeper: called");
        let memory = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                memory.evict_inactive().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_drops_oldest() {
        let memory = SessionMemory::new(3, Duration::from_secs(60));
        for i in 0..5 {
            memory.record("s1", Role::User, format!("m{}", i)).await;
        }
        let messages = memory.messages("s1").await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "m2");
        assert_eq!(memory.transcript("s1", 2).await, vec!["user: m3", "user: m4"]);
    }

    #[tokio::test]
    async fn test_first_caller_creates_once() {
        let memory = SessionMemory::new(20, Duration::from_secs(60));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let memory = memory.clone();
                tokio::spawn(async move { memory.record("shared", Role::User, format!("hi {}", i)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(memory.active_sessions().await, 1);
        assert_eq!(memory.messages("shared").await.len(), 16);
    }

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let memory = SessionMemory::new(20, Duration::from_secs(60));
        assert!(memory.transcript("nobody", 5).await.is_empty());
        assert_eq!(memory.active_sessions().await, 0);
        assert!(!memory.clear("nobody").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_eviction() {
        let memory = SessionMemory::new(20, Duration::from_secs(60));
        memory.record("old", Role::User, "hello").await;
        tokio::time::advance(Duration::from_secs(45)).await;
        memory.record("fresh", Role::User, "hello").await;
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(memory.evict_inactive().await, 1);
        assert_eq!(memory.active_sessions().await, 1);
        assert!(memory.messages("old").await.is_empty());
        assert_eq!(memory.messages("fresh").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts() {
        let memory = SessionMemory::new(20, Duration::from_secs(10));
        memory.record("s1", Role::Assistant, "done").await;
        let sweeper = memory.spawn_sweeper(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(memory.active_sessions().await, 0);
        sweeper.abort();
    }
}
