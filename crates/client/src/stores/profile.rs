//! Follow state for the profile currently being viewed.

use memeshare_shared::{StoredUser, UserProfile};

use crate::stores::reconcile::{reconcile_toggle, Reconcile, Toggle};

/// Result of an optimistic follow toggle, with the fields the outbound
/// facade needs to address the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowToggle {
    pub toggle: Toggle,
    pub target_user_id: String,
    pub target_username: String,
}

#[derive(Debug, Default)]
pub struct ProfileStore {
    /// The profile open in the UI, if any.
    pub viewed: Option<UserProfile>,
    /// Whether the acting user follows the viewed profile.
    pub is_following: bool,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a freshly fetched profile; derives the follow flag from its
    /// follower list.
    pub fn set_viewed(&mut self, profile: UserProfile, local_user_id: &str) {
        self.is_following = profile
            .followers
            .iter()
            .any(|follower| follower.user_id == local_user_id);
        self.viewed = Some(profile);
    }

    pub fn clear(&mut self) {
        self.viewed = None;
        self.is_following = false;
    }

    /// Flip the follow relation toward the viewed profile: the local user
    /// enters or leaves the follower list and the counter moves with it.
    /// `None` when no profile is being viewed.
    pub fn toggle_follow(&mut self, local_user: &StoredUser) -> Option<FollowToggle> {
        let profile = self.viewed.as_mut()?;
        let was_active = self.is_following;
        let now_active = !was_active;
        if now_active {
            profile.followers.push(local_user.clone());
            profile.followers_count += 1;
        } else {
            profile
                .followers
                .retain(|follower| follower.user_id != local_user.user_id);
            profile.followers_count = profile.followers_count.saturating_sub(1);
        }
        self.is_following = now_active;
        Some(FollowToggle {
            toggle: Toggle {
                was_active,
                now_active,
            },
            target_user_id: profile.user_id.clone(),
            target_username: profile.username.clone(),
        })
    }

    /// Fold in an authoritative FOLLOW broadcast. Broadcasts about profiles
    /// other than the viewed one carry nothing to reconcile.
    pub fn apply_follow(
        &mut self,
        follower: &StoredUser,
        following_user_id: &str,
        is_following: bool,
        follower_count: Option<u32>,
        local_user_id: &str,
    ) -> Reconcile {
        let Some(profile) = self.viewed.as_mut() else {
            return Reconcile::Overwrite;
        };
        if profile.user_id != following_user_id {
            return Reconcile::Overwrite;
        }
        let from_local = follower.user_id == local_user_id;
        let decision = reconcile_toggle(from_local, self.is_following, is_following);
        if from_local && decision != Reconcile::Overwrite {
            return decision;
        }
        if let Some(count) = follower_count {
            profile.followers_count = count;
        }
        let present = profile
            .followers
            .iter()
            .any(|existing| existing.user_id == follower.user_id);
        if is_following && !present {
            profile.followers.push(follower.clone());
        } else if !is_following && present {
            profile
                .followers
                .retain(|existing| existing.user_id != follower.user_id);
        }
        if from_local {
            self.is_following = is_following;
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> StoredUser {
        StoredUser {
            user_id: id.into(),
            username: format!("user-{id}"),
            profile_picture_url: None,
        }
    }

    fn profile(id: &str, followers: Vec<StoredUser>) -> UserProfile {
        UserProfile {
            user_id: id.into(),
            username: format!("user-{id}"),
            profile_picture_url: None,
            followers_count: followers.len() as u32,
            followers,
        }
    }

    #[test]
    fn follow_flag_is_derived_from_the_follower_list() {
        let mut store = ProfileStore::new();
        store.set_viewed(profile("p1", vec![user("u1")]), "u1");
        assert!(store.is_following);
        store.set_viewed(profile("p2", vec![]), "u1");
        assert!(!store.is_following);
    }

    #[test]
    fn optimistic_follow_moves_list_and_counter() {
        let mut store = ProfileStore::new();
        store.set_viewed(profile("p1", vec![]), "u1");

        let result = store.toggle_follow(&user("u1")).unwrap();
        assert!(result.toggle.now_active);
        assert_eq!(result.target_user_id, "p1");
        assert!(store.is_following);
        let viewed = store.viewed.as_ref().unwrap();
        assert_eq!(viewed.followers_count, 1);
        assert_eq!(viewed.followers.len(), 1);
    }

    #[test]
    fn unfollow_at_zero_stays_at_zero() {
        let mut store = ProfileStore::new();
        let mut p = profile("p1", vec![user("u1")]);
        p.followers_count = 0; // inconsistent input from the server
        store.set_viewed(p, "u1");

        store.toggle_follow(&user("u1")).unwrap();
        assert_eq!(store.viewed.as_ref().unwrap().followers_count, 0);
    }

    #[test]
    fn authoritative_follow_from_another_user_overwrites() {
        let mut store = ProfileStore::new();
        store.set_viewed(profile("p1", vec![]), "u1");

        let decision = store.apply_follow(&user("u2"), "p1", true, Some(7), "u1");
        assert_eq!(decision, Reconcile::Overwrite);
        let viewed = store.viewed.as_ref().unwrap();
        assert_eq!(viewed.followers_count, 7);
        assert_eq!(viewed.followers.len(), 1);
        assert!(!store.is_following);
    }

    #[test]
    fn stale_follow_confirmation_is_resent_not_applied() {
        let mut store = ProfileStore::new();
        store.set_viewed(profile("p1", vec![]), "u1");

        store.toggle_follow(&user("u1")).unwrap(); // follow
        store.toggle_follow(&user("u1")).unwrap(); // unfollow again

        let decision = store.apply_follow(&user("u1"), "p1", true, Some(1), "u1");
        assert_eq!(
            decision,
            Reconcile::Resend {
                authoritative_active: true
            }
        );
        assert!(!store.is_following);
        assert_eq!(store.viewed.as_ref().unwrap().followers_count, 0);
    }

    #[test]
    fn broadcast_about_a_different_profile_is_ignored() {
        let mut store = ProfileStore::new();
        store.set_viewed(profile("p1", vec![]), "u1");

        let decision = store.apply_follow(&user("u2"), "p9", true, Some(3), "u1");
        assert_eq!(decision, Reconcile::Overwrite);
        assert_eq!(store.viewed.as_ref().unwrap().followers_count, 0);
    }
}
