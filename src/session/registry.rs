//! # SessionRegistry
//!
//! The single process-global owner of every live [`SessionState`]. Per §5 of the spec, a
//! single mutex is sufficient: at most one stream ever attaches to a session, so there is no
//! contention to shard away. Every mutating operation performs a TTL sweep first, which keeps
//! the map bounded without a background reaper task.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::Config;
use crate::error::AppError;
use crate::session::{SessionId, SessionState};

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const RATE_LIMIT_MAX_PER_WINDOW: u32 = 10;

struct IpWindow {
    count: u32,
    window_start: Instant,
}

struct Inner {
    sessions: HashMap<SessionId, SessionState>,
    ip_windows: HashMap<String, IpWindow>,
}

/// Concurrent map of active sessions with TTL sweep and per-IP admission control.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                ip_windows: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates a new session for `client_ip`, subject to the per-IP rate limit.
    pub fn create(&self, client_ip: &str, cfg: &Config) -> Result<SessionState, AppError> {
        let mut inner = self.lock();
        let now = Instant::now();
        sweep(&mut inner.sessions, now);

        rate_limit(&mut inner.ip_windows, client_ip, now)?;

        let id = SessionId::new();
        let state = SessionState::new(id, cfg);
        inner.sessions.insert(id, state.clone());
        debug!(session_id = %id, %client_ip, "session created");
        Ok(state)
    }

    /// Returns a clone of the session, or `None` if unknown/expired. Performs a TTL sweep.
    pub fn get(&self, id: SessionId) -> Option<SessionState> {
        let mut inner = self.lock();
        sweep(&mut inner.sessions, Instant::now());
        inner.sessions.get(&id).cloned()
    }

    /// Removes the session if present. Idempotent.
    pub fn end(&self, id: SessionId) {
        let mut inner = self.lock();
        if let Some(mut s) = inner.sessions.remove(&id) {
            s.clear_buffer();
            debug!(session_id = %id, "session ended");
        }
    }

    /// Marks the session as having an attached stream, setting `started_at` on first attach.
    /// Fails if the session already finished, or if a stream is already attached — at most one
    /// active stream may ever attach to a session. Returns `Ok(false)` if the session is
    /// unknown/expired.
    pub fn attach(&self, id: SessionId) -> Result<bool, AppError> {
        let mut inner = self.lock();
        sweep(&mut inner.sessions, Instant::now());
        match inner.sessions.get_mut(&id) {
            Some(s) => {
                if s.finished {
                    return Err(AppError::SessionAlreadyFinished);
                }
                if s.stream_attached {
                    return Err(AppError::StreamAlreadyAttached);
                }
                s.stream_attached = true;
                if s.started_at.is_none() {
                    s.started_at = Some(Instant::now());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Sets `started_at` to `now` iff currently unset. Returns `false` if the session is
    /// unknown, `true` otherwise (whether or not this call actually set it). Unlike
    /// [`Self::attach`], this carries no stream-exclusivity guarantee: the REST adapter calls
    /// it on every chunk, not once per connection.
    pub fn touch_started(&self, id: SessionId) -> bool {
        let mut inner = self.lock();
        sweep(&mut inner.sessions, Instant::now());
        match inner.sessions.get_mut(&id) {
            Some(s) => {
                if s.started_at.is_none() {
                    s.started_at = Some(Instant::now());
                }
                true
            }
            None => false,
        }
    }

    /// Runs `f` against the live session under the registry lock, returning its result, or
    /// `None` if the session is unknown/expired. This is the only way guardrail evaluation,
    /// ingestion, and finalization are allowed to mutate a session: the closure always sees
    /// the authoritative state, never a stale clone.
    pub fn mutate<R>(&self, id: SessionId, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let mut inner = self.lock();
        sweep(&mut inner.sessions, Instant::now());
        inner.sessions.get_mut(&id).map(f)
    }

    /// Number of sessions currently live (test/diagnostic use).
    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn sweep(sessions: &mut HashMap<SessionId, SessionState>, now: Instant) {
    sessions.retain(|_, s| {
        let keep = !s.is_expired(now);
        if !keep {
            s.clear_buffer();
        }
        keep
    });
}

fn rate_limit(
    windows: &mut HashMap<String, IpWindow>,
    client_ip: &str,
    now: Instant,
) -> Result<(), AppError> {
    let entry = windows.entry(client_ip.to_string()).or_insert(IpWindow {
        count: 0,
        window_start: now,
    });

    if now.saturating_duration_since(entry.window_start) > RATE_LIMIT_WINDOW {
        entry.count = 0;
        entry.window_start = now;
    }

    entry.count += 1;
    if entry.count > RATE_LIMIT_MAX_PER_WINDOW {
        return Err(AppError::RateLimited);
    }
    Ok(())
}
