//! Outbound request facade.
//!
//! Typed helpers for everything the client sends. Each helper takes the
//! caller's *pre-action* state and negates it, so call sites read naturally
//! after an optimistic local mutation: toggle locally first, then hand the
//! old state to the facade.
//!
//! `send` never queues: when the connection is not usable it reports `false`
//! and kicks a restore so a later attempt can succeed. The one exception is
//! the interest session, which the tracker re-joins once the connection
//! becomes ready.

use chrono::Utc;
use tracing::{debug, error, warn};

use memeshare_shared::{Envelope, LikeAction, ProtocolError, SaveAction};

use crate::ws::connection::{ConnectionState, WsClient};

impl WsClient {
    /// Write one envelope to the live transport.
    ///
    /// Returns `false` when the message was not written; as a side effect a
    /// connection restore is triggered so the next attempt has a socket.
    pub fn send(&self, envelope: &Envelope) -> bool {
        let transport = {
            let inner = self.inner.borrow();
            if inner.state == ConnectionState::Connected {
                inner.transport.clone()
            } else {
                None
            }
        };
        let Some(transport) = transport else {
            debug!(kind = ?envelope.kind(), "not connected, message dropped; restoring");
            self.restore_connection();
            return false;
        };
        let text = match serde_json::to_string(envelope).map_err(ProtocolError::Encode) {
            Ok(text) => text,
            Err(err) => {
                error!(%err, "failed to encode envelope");
                return false;
            }
        };
        if let Err(err) = transport.send(text) {
            warn!(%err, "write failed, reconnecting");
            {
                let mut inner = self.inner.borrow_mut();
                inner.transport = None;
                if let Some(reader) = inner.reader_task.take() {
                    reader.abort();
                }
            }
            self.set_state(ConnectionState::Disconnected);
            self.schedule_reconnect();
            return false;
        }
        true
    }

    /// Toggle following `target_user_id`. `currently_following` is the state
    /// *before* the action; the sent message carries the desired state.
    pub fn send_follow(
        &self,
        target_user_id: &str,
        target_username: &str,
        currently_following: bool,
    ) -> bool {
        let Some(user) = self.identity.current() else {
            warn!("cannot send follow: no identity");
            return false;
        };
        self.send(&Envelope::Follow {
            follower_id: user.user_id,
            follower_username: user.username,
            following_user_id: target_user_id.to_string(),
            following_username: target_username.to_string(),
            is_following: !currently_following,
            profile_picture_url: user.profile_picture_url,
            follower_count: None,
        })
    }

    /// Toggle the like on a meme. `currently_liked` is the pre-action state.
    pub fn send_like(&self, meme_id: &str, currently_liked: bool) -> bool {
        let Some(user) = self.identity.current() else {
            warn!("cannot send like: no identity");
            return false;
        };
        self.send(&Envelope::Like {
            meme_id: meme_id.to_string(),
            user_id: user.user_id,
            username: user.username,
            action: if currently_liked {
                LikeAction::Unlike
            } else {
                LikeAction::Like
            },
            like_count: None,
        })
    }

    /// Toggle the save on a meme. `currently_saved` is the pre-action state.
    pub fn send_save(&self, meme_id: &str, currently_saved: bool) -> bool {
        let Some(user) = self.identity.current() else {
            warn!("cannot send save: no identity");
            return false;
        };
        self.send(&Envelope::Save {
            meme_id: meme_id.to_string(),
            user_id: user.user_id,
            username: user.username,
            action: if currently_saved {
                SaveAction::Unsave
            } else {
                SaveAction::Save
            },
            save_count: None,
        })
    }

    /// Broadcast a comment over the stream. The durable path is the REST
    /// call; this is the live echo for other viewers of the same meme.
    pub fn send_comment(&self, meme_id: &str, text: &str) -> bool {
        let Some(user) = self.identity.current() else {
            warn!("cannot send comment: no identity");
            return false;
        };
        self.send(&Envelope::Comment {
            id: None,
            meme_id: meme_id.to_string(),
            user_id: user.user_id,
            username: user.username,
            text: text.to_string(),
            profile_picture_url: user.profile_picture_url,
            created_at: Utc::now(),
        })
    }

    /// Express interest in detailed events for one meme. Any previous
    /// session is left first. If the connection is down, the join is
    /// retried once when it comes back.
    pub fn join_session(&self, meme_id: &str) -> bool {
        let plan = self.inner.borrow_mut().session.join(meme_id);
        if plan.is_empty() {
            return true;
        }
        let mut all_sent = true;
        for envelope in plan {
            let sent = self.send(&envelope);
            if sent {
                if let Envelope::JoinSession { meme_id } = &envelope {
                    self.inner.borrow_mut().session.mark_joined(meme_id);
                }
            }
            all_sent &= sent;
        }
        all_sent
    }

    /// Leave the interest session for `meme_id`. No-op (and `true`) when not
    /// in it. A dead connection is left alone: server-side membership died
    /// with it, so there is nothing to say and no reason to reconnect.
    pub fn leave_session(&self, meme_id: &str) -> bool {
        let Some(envelope) = self.inner.borrow_mut().session.leave(meme_id) else {
            return true;
        };
        if !self.is_connected() {
            return false;
        }
        self.send(&envelope)
    }
}
