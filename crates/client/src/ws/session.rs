//! Tracking of the single meme-viewing interest session.
//!
//! The client is interested in detailed events (comments, live counters) for
//! at most one meme at a time. Joining a new session implies leaving the
//! previous one; the tracker remembers the last requested session so it can
//! be re-joined once after a reconnect.

use memeshare_shared::Envelope;

/// Pure state machine; the outbound facade sends whatever it plans.
#[derive(Debug, Default)]
pub struct SessionTracker {
    /// Session the server believes we are in (JOIN was written successfully).
    joined: Option<String>,
    /// Last requested session, kept so a reconnect can re-join it.
    wanted: Option<String>,
}

impl SessionTracker {
    /// Plan a join: leave the previous session if different, then join.
    /// Returns an empty plan when already in the requested session.
    pub fn join(&mut self, meme_id: &str) -> Vec<Envelope> {
        if self.wanted.as_deref() == Some(meme_id) && self.joined.as_deref() == Some(meme_id) {
            return Vec::new();
        }
        let mut plan = Vec::new();
        if let Some(previous) = self.joined.take() {
            if previous != meme_id {
                plan.push(Envelope::LeaveSession { meme_id: previous });
            }
        }
        self.wanted = Some(meme_id.to_string());
        plan.push(Envelope::JoinSession {
            meme_id: meme_id.to_string(),
        });
        plan
    }

    /// Record that a JOIN for `meme_id` was written to the socket.
    pub fn mark_joined(&mut self, meme_id: &str) {
        self.joined = Some(meme_id.to_string());
    }

    /// Plan a leave. `None` when we are not in that session (no-op).
    pub fn leave(&mut self, meme_id: &str) -> Option<Envelope> {
        if self.wanted.as_deref() != Some(meme_id) {
            return None;
        }
        self.wanted = None;
        self.joined = None;
        Some(Envelope::LeaveSession {
            meme_id: meme_id.to_string(),
        })
    }

    /// Called when a connection becomes ready. Session membership does not
    /// survive a reconnect, so the last wanted session is joined again.
    pub fn rejoin_on_ready(&mut self) -> Option<Envelope> {
        self.joined = None;
        self.wanted.clone().map(|meme_id| Envelope::JoinSession { meme_id })
    }

    pub fn current(&self) -> Option<&str> {
        self.wanted.as_deref()
    }
}
