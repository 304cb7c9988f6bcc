//! Wire protocol for the memeshare real-time stream.
//!
//! Every frame on the WebSocket is a JSON [`Envelope`] carrying a mandatory
//! `type` discriminator from a closed set. The same envelope shapes are used
//! in both directions; fields that only the server fills in (authoritative
//! counts, server-assigned ids) are optional and omitted on the way out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Notification;

/// Close code for a graceful, user-initiated disconnect.
pub const CLOSE_NORMAL: u16 = 1000;
/// Abnormal closure (network drop, server restart).
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Server-side error closure.
pub const CLOSE_SERVER_ERROR: u16 = 1011;

/// The `type` discriminator of an [`Envelope`], as a standalone value.
///
/// Used as the key for dispatch subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Ping,
    Pong,
    Follow,
    Comment,
    Like,
    Save,
    Notification,
    JoinSession,
    LeaveSession,
}

impl MessageKind {
    /// PING/PONG never reach feature handlers.
    pub fn is_transport_internal(self) -> bool {
        matches!(self, MessageKind::Ping | MessageKind::Pong)
    }
}

/// Desired (outbound) or resulting (inbound) state of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LikeAction {
    Like,
    Unlike,
}

/// Desired (outbound) or resulting (inbound) state of a save toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaveAction {
    Save,
    Unsave,
}

/// A single typed message exchanged over the persistent connection.
///
/// Immutable once sent or received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all_fields = "camelCase")]
pub enum Envelope {
    Ping,
    Pong,
    Follow {
        follower_id: String,
        follower_username: String,
        following_user_id: String,
        following_username: String,
        /// Resulting follow state (outbound: desired state).
        is_following: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile_picture_url: Option<String>,
        /// Authoritative follower count; server-filled.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        follower_count: Option<u32>,
    },
    Comment {
        /// Server-assigned id; absent on the outbound leg.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        meme_id: String,
        user_id: String,
        username: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile_picture_url: Option<String>,
        created_at: DateTime<Utc>,
    },
    Like {
        meme_id: String,
        user_id: String,
        username: String,
        action: LikeAction,
        /// Authoritative like count; server-filled.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        like_count: Option<u32>,
    },
    Save {
        meme_id: String,
        user_id: String,
        username: String,
        action: SaveAction,
        /// Authoritative save count; server-filled.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        save_count: Option<u32>,
    },
    Notification {
        #[serde(flatten)]
        notification: Notification,
    },
    JoinSession {
        meme_id: String,
    },
    LeaveSession {
        meme_id: String,
    },
}

impl Envelope {
    pub fn kind(&self) -> MessageKind {
        match self {
            Envelope::Ping => MessageKind::Ping,
            Envelope::Pong => MessageKind::Pong,
            Envelope::Follow { .. } => MessageKind::Follow,
            Envelope::Comment { .. } => MessageKind::Comment,
            Envelope::Like { .. } => MessageKind::Like,
            Envelope::Save { .. } => MessageKind::Save,
            Envelope::Notification { .. } => MessageKind::Notification,
            Envelope::JoinSession { .. } => MessageKind::JoinSession,
            Envelope::LeaveSession { .. } => MessageKind::LeaveSession,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminators_match_the_wire_format() {
        let json = serde_json::to_value(&Envelope::Ping).unwrap();
        assert_eq!(json["type"], "PING");

        let join = Envelope::JoinSession {
            meme_id: "m1".into(),
        };
        let json = serde_json::to_value(&join).unwrap();
        assert_eq!(json["type"], "JOIN_SESSION");
        assert_eq!(json["memeId"], "m1");
    }

    #[test]
    fn outbound_like_omits_server_fields() {
        let like = Envelope::Like {
            meme_id: "m1".into(),
            user_id: "u1".into(),
            username: "alice".into(),
            action: LikeAction::Unlike,
            like_count: None,
        };
        let json = serde_json::to_value(&like).unwrap();
        assert_eq!(json["action"], "UNLIKE");
        assert!(json.get("likeCount").is_none());
    }

    #[test]
    fn inbound_like_carries_authoritative_count() {
        let raw = r#"{"type":"LIKE","memeId":"m1","userId":"u1","username":"alice","action":"LIKE","likeCount":11}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.kind(), MessageKind::Like);
        match env {
            Envelope::Like {
                like_count, action, ..
            } => {
                assert_eq!(like_count, Some(11));
                assert_eq!(action, LikeAction::Like);
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_a_decode_error() {
        let raw = r#"{"type":"PRESENCE","userId":"u1"}"#;
        assert!(serde_json::from_str::<Envelope>(raw).is_err());
    }

    #[test]
    fn ping_pong_are_transport_internal() {
        assert!(MessageKind::Ping.is_transport_internal());
        assert!(MessageKind::Pong.is_transport_internal());
        assert!(!MessageKind::Like.is_transport_internal());
    }
}
