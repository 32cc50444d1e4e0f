// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The in-process conversation store.
//!
//! Threads are keyed by UUID and live only as long as the process; a
//! restart surfaces as `ThreadError::Unknown` and the host starts a new
//! conversation.  Mutations are serialized per thread by an async lock, so
//! two concurrent submissions against the same thread observe each other's
//! writes but never a partially mutated thread.  The outer map lock is held
//! only for lookup, never across I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::thread::{ConversationThread, ConversationTurn, TurnRole};

#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("conversation {0} is unknown (it may predate a server restart)")]
    Unknown(Uuid),

    #[error("conversation {0} has expired")]
    Expired(Uuid),

    #[error("conversation {0} reached the turn cap; conclude it and start a new one")]
    CapReached(Uuid),
}

impl ThreadError {
    /// Stable machine-readable kind, used in the MCP error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ThreadError::Unknown(_) | ThreadError::Expired(_) => "continuation_not_available",
            ThreadError::CapReached(_) => "thread_cap_reached",
        }
    }
}

type ThreadHandle = Arc<tokio::sync::Mutex<ConversationThread>>;

pub struct ConversationStore {
    threads: Mutex<HashMap<Uuid, ThreadHandle>>,
    max_turns: usize,
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(max_turns: usize, timeout_hours: i64) -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            max_turns,
            ttl: Duration::hours(timeout_hours),
        }
    }

    /// Override the TTL at sub-hour resolution (tests).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Open a new thread and return its id.
    pub fn create(&self, tool_name: &str, model_name: Option<String>) -> Uuid {
        let thread = ConversationThread::new(tool_name, model_name);
        let id = thread.id;
        self.threads
            .lock()
            .expect("thread map lock poisoned")
            .insert(id, Arc::new(tokio::sync::Mutex::new(thread)));
        debug!(thread = %id, tool = tool_name, "created conversation thread");
        id
    }

    fn handle(&self, id: Uuid) -> Result<ThreadHandle, ThreadError> {
        self.threads
            .lock()
            .expect("thread map lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(ThreadError::Unknown(id))
    }

    /// Clone the current state of a thread, enforcing the TTL.
    ///
    /// Reading does not refresh `last_accessed`; only appends do.
    pub async fn snapshot(&self, id: Uuid) -> Result<ConversationThread, ThreadError> {
        let handle = self.handle(id)?;
        let thread = handle.lock().await;
        if Utc::now() - thread.last_accessed > self.ttl {
            return Err(ThreadError::Expired(id));
        }
        Ok(thread.clone())
    }

    /// Append one turn; refreshes `last_accessed` and the thread's model.
    ///
    /// Returns the 1-indexed turn count after the append.
    pub async fn append(&self, id: Uuid, turn: ConversationTurn) -> Result<usize, ThreadError> {
        let handle = self.handle(id)?;
        let mut thread = handle.lock().await;
        if Utc::now() - thread.last_accessed > self.ttl {
            return Err(ThreadError::Expired(id));
        }
        if thread.turns.len() >= self.max_turns {
            return Err(ThreadError::CapReached(id));
        }
        if turn.role == TurnRole::Assistant {
            if let Some(model) = &turn.model_name {
                thread.model_name = Some(model.clone());
            }
        }
        thread.turns.push(turn);
        thread.last_accessed = Utc::now();
        Ok(thread.turns.len())
    }

    /// Append a user turn and its assistant reply atomically.
    ///
    /// Both turns land under one lock acquisition so a concurrent reader
    /// never observes the user turn without its reply.  Fails without
    /// appending anything when the thread lacks room for both.
    pub async fn append_exchange(
        &self,
        id: Uuid,
        user: ConversationTurn,
        assistant: ConversationTurn,
    ) -> Result<usize, ThreadError> {
        let handle = self.handle(id)?;
        let mut thread = handle.lock().await;
        if Utc::now() - thread.last_accessed > self.ttl {
            return Err(ThreadError::Expired(id));
        }
        if thread.turns.len() + 2 > self.max_turns {
            return Err(ThreadError::CapReached(id));
        }
        if let Some(model) = &assistant.model_name {
            thread.model_name = Some(model.clone());
        }
        thread.turns.push(user);
        thread.turns.push(assistant);
        thread.last_accessed = Utc::now();
        Ok(thread.turns.len())
    }

    /// Drop every expired thread; safe to call from any scheduler tick.
    ///
    /// Returns the removed thread ids so callers can reclaim any state
    /// keyed on them.
    pub async fn sweep(&self) -> Vec<Uuid> {
        let handles: Vec<(Uuid, ThreadHandle)> = {
            let map = self.threads.lock().expect("thread map lock poisoned");
            map.iter().map(|(id, h)| (*id, h.clone())).collect()
        };

        let now = Utc::now();
        let mut expired = Vec::new();
        for (id, handle) in handles {
            let thread = handle.lock().await;
            if now - thread.last_accessed > self.ttl {
                expired.push(id);
            }
        }

        let mut map = self.threads.lock().expect("thread map lock poisoned");
        for id in &expired {
            map.remove(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "swept expired conversation threads");
        }
        expired
    }

    /// Number of live threads (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.threads.lock().expect("thread map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backdate a thread's last access (tests only).
    #[doc(hidden)]
    pub async fn backdate(&self, id: Uuid, by: Duration) {
        if let Ok(handle) = self.handle(id) {
            let mut thread = handle.lock().await;
            thread.last_accessed = thread.last_accessed - by;
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
