//! Token-keyed session table.
//!
//! The table maps an 8-character hex token to a session payload. It is
//! bounded by `max_sessions`; inserting into a full table first evicts the
//! least recently active session (ties go to the earliest inserted one).
//!
//! # Locking
//!
//! The table lock guards the map itself, and every session has its own lock
//! guarding its payload, `last_activity` and `expired` flag. Whenever both are
//! held, the table lock is taken first. Removed sessions are marked expired and
//! dropped only after the table lock has been released.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use logtest_core::metrics as m;
use logtest_core::protocol::TOKEN_LENGTH;

/// State guarded by a session's lock.
#[derive(Debug)]
pub struct SessionState<S> {
    pub payload: S,
    last_activity: Instant,
    expired: bool,
}

impl<S> SessionState<S> {
    fn new(payload: S) -> Self {
        Self {
            payload,
            last_activity: Instant::now(),
            expired: false,
        }
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Expired sessions are never handed out again, even to holders of an old reference.
    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

type SharedState<S> = Arc<Mutex<SessionState<S>>>;

struct Entry<S> {
    /// Insertion order, used to break `last_activity` ties on eviction.
    seq: u64,
    state: SharedState<S>,
}

struct Slots<S> {
    entries: HashMap<String, Entry<S>>,
    next_seq: u64,
}

/// How the session handed out by [`SessionTable::get_or_create`] was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The requested token named a live session.
    Existing,
    /// No token was requested; a new session was created.
    Created,
    /// The requested token was unknown or expired; a new session replaced it.
    Replaced { stale: String },
}

/// A session locked for the duration of one request.
pub struct Acquired<S> {
    pub token: String,
    pub origin: Origin,
    pub guard: OwnedMutexGuard<SessionState<S>>,
}

impl<S> Acquired<S> {
    pub fn is_new(&self) -> bool {
        self.origin != Origin::Existing
    }
}

/// Concurrent, capacity-bounded session table.
pub struct SessionTable<S> {
    slots: Mutex<Slots<S>>,
    max_sessions: usize,
}

impl<S> SessionTable<S> {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, token: &str) -> bool {
        self.slots.lock().await.entries.contains_key(token)
    }

    /// Returns the live session named by `token`, or builds and registers a new one.
    ///
    /// The returned session is locked and its `last_activity` stamped. `build`
    /// runs without any lock held; if it fails nothing is inserted.
    pub async fn get_or_create<F, Fut, E>(
        &self,
        token: Option<&str>,
        build: F,
    ) -> Result<Acquired<S>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, E>>,
    {
        if let Some(token) = token {
            if let Some(guard) = self.lookup(token).await {
                return Ok(Acquired {
                    token: token.to_owned(),
                    origin: Origin::Existing,
                    guard,
                });
            }
        }

        let payload = build().await?;
        let (new_token, guard) = self.insert(payload).await;

        tracing::debug!(token = %new_token, stale = token.unwrap_or("-"), "session created");
        let origin = match token {
            Some(stale) => Origin::Replaced {
                stale: stale.to_owned(),
            },
            None => Origin::Created,
        };
        Ok(Acquired {
            token: new_token,
            origin,
            guard,
        })
    }

    /// Removes a session. Returns `false` when no session has that token.
    pub async fn remove(&self, token: &str) -> bool {
        let removed = {
            let mut slots = self.slots.lock().await;
            let removed = slots.entries.remove(token);
            metrics::gauge!(m::SESSIONS_ACTIVE).set(slots.entries.len() as f64);
            removed
        };

        match removed {
            Some(entry) => {
                entry.state.lock().await.expired = true;
                metrics::counter!(m::SESSIONS_REMOVED_TOTAL).increment(1);
                tracing::debug!(token, "session removed");
                true
            }
            None => false,
        }
    }

    /// Expires every session idle for at least `timeout` as of `now`.
    ///
    /// Returns the number of sessions reaped.
    pub async fn sweep(&self, now: Instant, timeout: Duration) -> usize {
        let reaped: Vec<(String, SharedState<S>)> = {
            let mut slots = self.slots.lock().await;
            let mut stale = Vec::new();
            for (token, entry) in &slots.entries {
                let mut state = entry.state.lock().await;
                if now.saturating_duration_since(state.last_activity) >= timeout {
                    state.expired = true;
                    stale.push(token.clone());
                }
            }
            let reaped = stale
                .into_iter()
                .filter_map(|token| {
                    let entry = slots.entries.remove(&token)?;
                    Some((token, entry.state))
                })
                .collect();
            metrics::gauge!(m::SESSIONS_ACTIVE).set(slots.entries.len() as f64);
            reaped
        };

        for (token, _) in &reaped {
            tracing::debug!(token = %token, "session expired");
        }
        let count = reaped.len();
        metrics::counter!(m::SESSIONS_EXPIRED_TOTAL).increment(count as u64);
        drop(reaped);
        count
    }

    async fn lookup(&self, token: &str) -> Option<OwnedMutexGuard<SessionState<S>>> {
        let state = {
            let slots = self.slots.lock().await;
            Arc::clone(&slots.entries.get(token)?.state)
        };

        let mut guard = state.lock_owned().await;
        if guard.expired {
            return None;
        }
        guard.last_activity = Instant::now();
        Some(guard)
    }

    async fn insert(&self, payload: S) -> (String, OwnedMutexGuard<SessionState<S>>) {
        let state = Arc::new(Mutex::new(SessionState::new(payload)));

        let (token, guard, evicted) = {
            let mut slots = self.slots.lock().await;
            let evicted = if slots.entries.len() >= self.max_sessions {
                slots.evict_oldest().await
            } else {
                None
            };

            let token = loop {
                let candidate = generate_token();
                if !slots.entries.contains_key(&candidate) {
                    break candidate;
                }
            };
            let seq = slots.next_seq;
            slots.next_seq += 1;
            slots.entries.insert(
                token.clone(),
                Entry {
                    seq,
                    state: Arc::clone(&state),
                },
            );
            metrics::gauge!(m::SESSIONS_ACTIVE).set(slots.entries.len() as f64);

            let guard = state.lock_owned().await;
            (token, guard, evicted)
        };

        metrics::counter!(m::SESSIONS_CREATED_TOTAL).increment(1);
        if let Some((old_token, old_state)) = evicted {
            old_state.lock().await.expired = true;
            metrics::counter!(m::SESSIONS_EVICTED_TOTAL).increment(1);
            tracing::info!(token = %old_token, "session table full, evicted least recently used session");
        }

        (token, guard)
    }
}

impl<S> Slots<S> {
    /// Removes the entry with the oldest `(last_activity, seq)` pair.
    async fn evict_oldest(&mut self) -> Option<(String, SharedState<S>)> {
        let mut oldest: Option<(Instant, u64, &String)> = None;
        for (token, entry) in &self.entries {
            let last = entry.state.lock().await.last_activity;
            let is_older = oldest
                .as_ref()
                .is_none_or(|(best_last, best_seq, _)| (last, entry.seq) < (*best_last, *best_seq));
            if is_older {
                oldest = Some((last, entry.seq, token));
            }
        }

        let token = oldest.map(|(_, _, token)| token.clone())?;
        let entry = self.entries.remove(&token)?;
        Some((token, entry.state))
    }
}

/// Random lowercase hex token of [`TOKEN_LENGTH`] characters.
fn generate_token() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(TOKEN_LENGTH)
        .collect()
}
