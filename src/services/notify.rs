//! Notification Hub
//!
//! Explicit store for user-facing toast notifications with a defined
//! lifecycle: created with the app state, bounded capacity, per-toast TTL,
//! explicit dismissal, and a broadcast feed for observers. Instances are
//! independent; nothing is shared at module level.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One user-facing notification.
#[derive(Debug, Clone, Serialize)]
pub struct Toast {
    pub id: String,
    pub level: ToastLevel,
    pub message: String,
    /// Created timestamp (ISO-8601)
    pub created_at: String,
    #[serde(skip_serializing)]
    created: Instant,
    #[serde(skip_serializing)]
    ttl: Option<Duration>,
}

impl Toast {
    fn new(level: ToastLevel, message: String, ttl: Option<Duration>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            level,
            message,
            created_at: chrono::Utc::now().to_rfc3339(),
            created: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.created) >= ttl,
            None => false,
        }
    }
}

/// Bounded notification store with a broadcast feed.
pub struct NotificationHub {
    toasts: Mutex<Vec<Toast>>,
    capacity: usize,
    feed: broadcast::Sender<Toast>,
}

impl NotificationHub {
    const DEFAULT_CAPACITY: usize = 50;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity.max(1));
        Self {
            toasts: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            feed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Toast>> {
        self.toasts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Push a toast with no TTL (dismissed explicitly).
    pub fn push(&self, level: ToastLevel, message: impl Into<String>) -> Toast {
        self.push_inner(level, message.into(), None)
    }

    /// Push a toast that expires after `ttl`.
    pub fn push_with_ttl(
        &self,
        level: ToastLevel,
        message: impl Into<String>,
        ttl: Duration,
    ) -> Toast {
        self.push_inner(level, message.into(), Some(ttl))
    }

    fn push_inner(&self, level: ToastLevel, message: String, ttl: Option<Duration>) -> Toast {
        let toast = Toast::new(level, message, ttl);
        {
            let mut toasts = self.lock();
            toasts.push(toast.clone());
            // Oldest entries give way once over capacity.
            let len = toasts.len();
            if len > self.capacity {
                toasts.drain(0..len - self.capacity);
            }
        }
        // Feed delivery is best-effort: no subscribers is fine.
        let _ = self.feed.send(toast.clone());
        toast
    }

    /// Remove expired toasts; returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut toasts = self.lock();
        let before = toasts.len();
        toasts.retain(|t| !t.is_expired(now));
        before - toasts.len()
    }

    /// Currently visible toasts (sweeps expired ones first).
    pub fn active(&self) -> Vec<Toast> {
        self.sweep();
        self.lock().clone()
    }

    /// Dismiss a toast by id. Returns whether it was present.
    pub fn dismiss(&self, id: &str) -> bool {
        let mut toasts = self.lock();
        let before = toasts.len();
        toasts.retain(|t| t.id != id);
        before != toasts.len()
    }

    /// Subscribe to new toasts as they are pushed.
    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.feed.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
