//! Composition root: wires the connection manager, the REST client, and the
//! feature stores together.
//!
//! Nothing in here is global; an embedder builds a [`RealtimeManager`] with
//! whatever connector and identity source fit, and every handler closes over
//! exactly the pieces it needs.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use memeshare_shared::{Comment, CreateCommentRequest, Envelope, MessageKind};

use crate::api_client::ApiClient;
use crate::config::ClientConfig;
use crate::identity::{IdentitySource, PersistedIdentity};
use crate::stores::{ContentStore, NotificationStore, ProfileStore, Reconcile};
use crate::ws::{Connector, Subscription, TungsteniteConnector, WsClient};

pub struct RealtimeManager {
    pub ws: WsClient,
    pub api: ApiClient,
    pub content: Rc<RefCell<ContentStore>>,
    pub profile: Rc<RefCell<ProfileStore>>,
    pub notifications: Rc<RefCell<NotificationStore>>,
    identity: Rc<dyn IdentitySource>,
    _subscriptions: Vec<Subscription>,
}

impl RealtimeManager {
    /// Production wiring: real WebSocket dialing, persisted identity.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_parts(
            config,
            Rc::new(TungsteniteConnector),
            Rc::new(PersistedIdentity),
        )
    }

    /// Build with injected seams; what tests and custom embedders use.
    pub fn with_parts(
        config: ClientConfig,
        connector: Rc<dyn Connector>,
        identity: Rc<dyn IdentitySource>,
    ) -> Self {
        let api = ApiClient::new(config.api_url.clone());
        let ws = WsClient::new(Rc::new(config), connector, identity.clone());
        let content = Rc::new(RefCell::new(ContentStore::new()));
        let profile = Rc::new(RefCell::new(ProfileStore::new()));
        let notifications = Rc::new(RefCell::new(NotificationStore::new()));

        let mut subscriptions = Vec::new();

        {
            let content = content.clone();
            let ws_out = ws.clone();
            let identity = identity.clone();
            subscriptions.push(ws.subscribe(MessageKind::Like, move |envelope| {
                let Envelope::Like {
                    meme_id,
                    user_id,
                    action,
                    like_count,
                    ..
                } = envelope
                else {
                    return Ok(());
                };
                let from_local = identity
                    .current()
                    .is_some_and(|user| &user.user_id == user_id);
                let decision =
                    content
                        .borrow_mut()
                        .apply_like(meme_id, from_local, *action, *like_count);
                if let Reconcile::Resend {
                    authoritative_active,
                } = decision
                {
                    debug!(meme_id, "like confirmation raced a newer toggle, re-sending");
                    ws_out.send_like(meme_id, authoritative_active);
                }
                Ok(())
            }));
        }

        {
            let content = content.clone();
            let ws_out = ws.clone();
            let identity = identity.clone();
            subscriptions.push(ws.subscribe(MessageKind::Save, move |envelope| {
                let Envelope::Save {
                    meme_id,
                    user_id,
                    action,
                    save_count,
                    ..
                } = envelope
                else {
                    return Ok(());
                };
                let from_local = identity
                    .current()
                    .is_some_and(|user| &user.user_id == user_id);
                let decision =
                    content
                        .borrow_mut()
                        .apply_save(meme_id, from_local, *action, *save_count);
                if let Reconcile::Resend {
                    authoritative_active,
                } = decision
                {
                    debug!(meme_id, "save confirmation raced a newer toggle, re-sending");
                    ws_out.send_save(meme_id, authoritative_active);
                }
                Ok(())
            }));
        }

        {
            let content = content.clone();
            subscriptions.push(ws.subscribe(MessageKind::Comment, move |envelope| {
                let Envelope::Comment {
                    id,
                    meme_id,
                    user_id,
                    username,
                    text,
                    profile_picture_url,
                    created_at,
                } = envelope
                else {
                    return Ok(());
                };
                let comment = Comment {
                    // a live echo without a durable id still needs a key
                    id: id
                        .clone()
                        .unwrap_or_else(|| format!("live-{}", Uuid::new_v4())),
                    meme_id: meme_id.clone(),
                    user_id: user_id.clone(),
                    username: username.clone(),
                    text: text.clone(),
                    profile_picture_url: profile_picture_url.clone(),
                    created_at: *created_at,
                };
                content.borrow_mut().insert_comment(&comment);
                Ok(())
            }));
        }

        {
            let profile = profile.clone();
            let ws_out = ws.clone();
            let identity = identity.clone();
            subscriptions.push(ws.subscribe(MessageKind::Follow, move |envelope| {
                let Envelope::Follow {
                    follower_id,
                    follower_username,
                    following_user_id,
                    following_username,
                    is_following,
                    profile_picture_url,
                    follower_count,
                } = envelope
                else {
                    return Ok(());
                };
                let Some(local_user) = identity.current() else {
                    return Ok(());
                };
                let follower = memeshare_shared::StoredUser {
                    user_id: follower_id.clone(),
                    username: follower_username.clone(),
                    profile_picture_url: profile_picture_url.clone(),
                };
                let decision = profile.borrow_mut().apply_follow(
                    &follower,
                    following_user_id,
                    *is_following,
                    *follower_count,
                    &local_user.user_id,
                );
                if let Reconcile::Resend {
                    authoritative_active,
                } = decision
                {
                    debug!(
                        following_user_id,
                        "follow confirmation raced a newer toggle, re-sending"
                    );
                    ws_out.send_follow(
                        following_user_id,
                        following_username,
                        authoritative_active,
                    );
                }
                Ok(())
            }));
        }

        {
            let notifications = notifications.clone();
            let identity = identity.clone();
            subscriptions.push(ws.subscribe(MessageKind::Notification, move |envelope| {
                let Envelope::Notification { notification } = envelope else {
                    return Ok(());
                };
                let for_local_user = identity
                    .current()
                    .is_some_and(|user| user.user_id == notification.user_id);
                if for_local_user {
                    notifications.borrow_mut().apply(notification.clone());
                }
                Ok(())
            }));
        }

        Self {
            ws,
            api,
            content,
            profile,
            notifications,
            identity,
            _subscriptions: subscriptions,
        }
    }

    // --- lifecycle ---

    /// Connect as the current identity. `false` when nobody is logged in.
    pub fn connect(&self) -> bool {
        let Some(user) = self.identity.current() else {
            debug!("connect requested without an identity");
            return false;
        };
        info!(user = %user.username, "starting real-time session");
        self.ws.connect(&user.user_id);
        true
    }

    /// Tear down the session and forget all per-user state.
    pub fn logout(&self) {
        self.ws.disconnect();
        self.content.borrow_mut().clear();
        self.profile.borrow_mut().clear();
        self.notifications.borrow_mut().clear();
    }

    // --- initial fetches ---

    pub async fn load_feed(&self) -> anyhow::Result<()> {
        let user_id = self.identity.current().map(|user| user.user_id);
        let memes = self.api.fetch_memes(user_id.as_deref()).await?;
        self.content.borrow_mut().set_memes(memes);
        Ok(())
    }

    /// Populate the liked and saved collections for the logged-in user.
    pub async fn load_library(&self) -> anyhow::Result<()> {
        let user = self.identity.current().context("not logged in")?;
        let liked = self.api.fetch_liked(&user.username).await?;
        let saved = self.api.fetch_saved(&user.username).await?;
        let mut content = self.content.borrow_mut();
        content.set_liked(liked);
        content.set_saved(saved);
        Ok(())
    }

    pub async fn view_profile(&self, user_id: &str) -> anyhow::Result<()> {
        let local = self.identity.current().context("not logged in")?;
        let profile = self.api.fetch_profile(user_id).await?;
        self.profile.borrow_mut().set_viewed(profile, &local.user_id);
        Ok(())
    }

    // --- user actions ---

    /// Optimistically toggle the like on a meme, then tell the server.
    /// Returns whether the intent reached the socket.
    pub fn toggle_like(&self, meme_id: &str) -> bool {
        let toggle = self.content.borrow_mut().toggle_like(meme_id);
        match toggle {
            Some(toggle) => self.ws.send_like(meme_id, toggle.was_active),
            None => false,
        }
    }

    /// Optimistically toggle the save on a meme, then tell the server.
    pub fn toggle_save(&self, meme_id: &str) -> bool {
        let toggle = self.content.borrow_mut().toggle_save(meme_id);
        match toggle {
            Some(toggle) => self.ws.send_save(meme_id, toggle.was_active),
            None => false,
        }
    }

    /// Optimistically toggle following the viewed profile.
    pub fn toggle_follow(&self) -> bool {
        let Some(user) = self.identity.current() else {
            return false;
        };
        let result = self.profile.borrow_mut().toggle_follow(&user);
        match result {
            Some(result) => self.ws.send_follow(
                &result.target_user_id,
                &result.target_username,
                result.toggle.was_active,
            ),
            None => false,
        }
    }

    /// Add a comment: the REST call is the durable write and returns the
    /// server-assigned id, which also dedupes the broadcast echo.
    pub async fn add_comment(&self, meme_id: &str, text: &str) -> anyhow::Result<Comment> {
        let user = self.identity.current().context("not logged in")?;
        let request = CreateCommentRequest {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            text: text.to_string(),
            profile_picture_url: user.profile_picture_url.clone(),
        };
        let response = self.api.post_comment(meme_id, &request).await?;
        let comment = Comment {
            id: response.id,
            meme_id: meme_id.to_string(),
            user_id: user.user_id,
            username: user.username,
            text: text.to_string(),
            profile_picture_url: user.profile_picture_url,
            created_at: Utc::now(),
        };
        self.content.borrow_mut().insert_comment(&comment);
        Ok(comment)
    }

    /// Open a meme's detail view: select it locally and join its session so
    /// comments and counter updates stream in.
    pub fn view_meme(&self, meme_id: &str) {
        self.content.borrow_mut().select(meme_id);
        self.ws.join_session(meme_id);
    }

    /// Close the detail view.
    pub fn leave_meme(&self, meme_id: &str) {
        {
            let mut content = self.content.borrow_mut();
            if content
                .selected
                .as_ref()
                .is_some_and(|meme| meme.id == meme_id)
            {
                content.selected = None;
            }
        }
        self.ws.leave_session(meme_id);
    }
}
