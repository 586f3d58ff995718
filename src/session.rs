//! # Session Store
//!
//! In-memory registry of browser sessions keyed by the `session` cookie.
//!
//! A session survives while it keeps being used: every request that attaches
//! to it bumps `last_active` and its reference count, and the request's
//! completion releases the reference again. The reactor sweeps the store once
//! per loop iteration and drops every session idle for more than an hour,
//! whether or not a request still references it.
//!
//! Requests never hold a session directly; they keep its [`SessionId`] and go
//! back through the store, so a sweep in the middle of a request leaves the
//! request with an id that simply no longer resolves.
//!
//! The store is owned by the reactor thread and is not synchronized.

use crate::ids::SessionId;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use tracing::debug;

/// Idle time after which a session is swept.
pub const SESSION_TTL_SECS: i64 = 60 * 60;

/// Server-side state tied to one browser.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    refcount: u32,
    last_active: DateTime<Utc>,
    message: Option<String>,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Number of requests currently attached.
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    /// Peek at the one-shot message without consuming it.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn set_message(&mut self, msg: impl Into<String>) {
        self.message = Some(msg.into());
    }

    /// Read and clear the one-shot message.
    pub fn take_message(&mut self) -> Option<String> {
        self.message.take()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_active = now;
    }
}

/// Registry of live sessions, most recently created first.
pub struct SessionStore {
    sessions: VecDeque<Session>,
    rng: Box<dyn rand::RngCore>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Store seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Store drawing session ids from the given generator.
    pub fn with_rng<R: rand::RngCore + 'static>(rng: R) -> Self {
        Self {
            sessions: VecDeque::new(),
            rng: Box::new(rng),
            ttl: Duration::seconds(SESSION_TTL_SECS),
        }
    }

    /// Attach to the session named by `cookie`, or create a fresh one.
    ///
    /// A match increments the reference count. Otherwise a new session with a
    /// previously unused id, refcount 1 and `last_active = now` is prepended.
    pub fn find_or_create(&mut self, cookie: Option<&str>, now: DateTime<Utc>) -> SessionId {
        if let Some(id) = cookie.and_then(|c| c.trim().parse::<SessionId>().ok()) {
            if let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) {
                session.refcount += 1;
                return id;
            }
        }

        let id = self.fresh_id();
        debug!(session = %id, "session created");
        self.sessions.push_front(Session {
            id: id.clone(),
            refcount: 1,
            last_active: now,
            message: None,
        });
        id
    }

    fn fresh_id(&mut self) -> SessionId {
        loop {
            let id = SessionId::generate(&mut self.rng);
            if !self.contains(&id) {
                return id;
            }
        }
    }

    /// Drop one reference. Never removes the session.
    ///
    /// Releasing an id that was swept in the meantime is a no-op.
    pub fn release(&mut self, id: &SessionId) {
        match self.get_mut(id) {
            Some(session) => session.refcount = session.refcount.saturating_sub(1),
            None => debug!(session = %id, "release of swept session"),
        }
    }

    /// Remove every session idle for strictly more than the TTL.
    ///
    /// Returns the number of sessions removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.sessions.len();
        self.sessions.retain(|s| now - s.last_active <= ttl);
        let removed = before - self.sessions.len();
        if removed > 0 {
            debug!(removed, remaining = self.sessions.len(), "sessions expired");
        }
        removed
    }

    /// Time until the next session becomes eligible for sweeping.
    pub fn next_expiry(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.sessions
            .iter()
            .map(|s| s.last_active + self.ttl - now)
            .min()
            .map(|d| d.to_std().unwrap_or(std::time::Duration::ZERO))
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions in store order (most recently created first).
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }
}
