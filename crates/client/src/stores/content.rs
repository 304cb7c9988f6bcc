//! Meme feed, liked/saved collections, and comment threads.
//!
//! A meme can appear in several collections at once (feed, liked, saved,
//! the selected detail view); every mutation is applied to all copies so
//! the views never disagree with each other.

use tracing::debug;

use memeshare_shared::{Comment, LikeAction, Meme, SaveAction};

use crate::stores::reconcile::{adjust_count, reconcile_toggle, Reconcile, Toggle};

#[derive(Debug, Default)]
pub struct ContentStore {
    /// The main feed.
    pub memes: Vec<Meme>,
    /// Memes the acting user has liked.
    pub liked: Vec<Meme>,
    /// Memes the acting user has saved.
    pub saved: Vec<Meme>,
    /// The meme open in the detail view, if any.
    pub selected: Option<Meme>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- initial population (REST fetches) ---

    pub fn set_memes(&mut self, memes: Vec<Meme>) {
        self.memes = memes;
    }

    pub fn set_liked(&mut self, memes: Vec<Meme>) {
        self.liked = memes;
    }

    pub fn set_saved(&mut self, memes: Vec<Meme>) {
        self.saved = memes;
    }

    pub fn select(&mut self, meme_id: &str) {
        self.selected = self.find_meme(meme_id).cloned();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // --- membership queries ---

    pub fn is_liked(&self, meme_id: &str) -> bool {
        self.liked.iter().any(|meme| meme.id == meme_id)
    }

    pub fn is_saved(&self, meme_id: &str) -> bool {
        self.saved.iter().any(|meme| meme.id == meme_id)
    }

    pub fn find_meme(&self, meme_id: &str) -> Option<&Meme> {
        self.selected
            .iter()
            .chain(&self.memes)
            .chain(&self.liked)
            .chain(&self.saved)
            .find(|meme| meme.id == meme_id)
    }

    // --- optimistic toggles ---

    /// Flip the like on a meme: membership and counter move together, before
    /// anything touches the network. Returns the pre/post state for the
    /// outbound facade, or `None` when the meme is unknown.
    pub fn toggle_like(&mut self, meme_id: &str) -> Option<Toggle> {
        let template = self.find_meme(meme_id)?.clone();
        let was_active = self.is_liked(meme_id);
        let now_active = !was_active;
        if now_active {
            self.liked.push(template.clone());
        } else {
            self.liked.retain(|meme| meme.id != meme_id);
        }
        let count = adjust_count(template.like_count, now_active);
        self.set_like_count(meme_id, count);
        Some(Toggle {
            was_active,
            now_active,
        })
    }

    /// Flip the save on a meme. See [`ContentStore::toggle_like`].
    pub fn toggle_save(&mut self, meme_id: &str) -> Option<Toggle> {
        let template = self.find_meme(meme_id)?.clone();
        let was_active = self.is_saved(meme_id);
        let now_active = !was_active;
        if now_active {
            self.saved.push(template.clone());
        } else {
            self.saved.retain(|meme| meme.id != meme_id);
        }
        let count = adjust_count(template.save_count, now_active);
        self.set_save_count(meme_id, count);
        Some(Toggle {
            was_active,
            now_active,
        })
    }

    // --- authoritative broadcasts ---

    /// Fold in an authoritative LIKE broadcast.
    pub fn apply_like(
        &mut self,
        meme_id: &str,
        from_local_user: bool,
        action: LikeAction,
        like_count: Option<u32>,
    ) -> Reconcile {
        let authoritative_active = action == LikeAction::Like;
        let decision =
            reconcile_toggle(from_local_user, self.is_liked(meme_id), authoritative_active);
        if decision == Reconcile::Overwrite {
            if let Some(count) = like_count {
                self.set_like_count(meme_id, count);
            }
        }
        decision
    }

    /// Fold in an authoritative SAVE broadcast.
    pub fn apply_save(
        &mut self,
        meme_id: &str,
        from_local_user: bool,
        action: SaveAction,
        save_count: Option<u32>,
    ) -> Reconcile {
        let authoritative_active = action == SaveAction::Save;
        let decision =
            reconcile_toggle(from_local_user, self.is_saved(meme_id), authoritative_active);
        if decision == Reconcile::Overwrite {
            if let Some(count) = save_count {
                self.set_save_count(meme_id, count);
            }
        }
        decision
    }

    // --- comments ---

    /// Insert a comment into every copy of its meme, newest first,
    /// deduplicating by id. Returns `false` when the id was already present
    /// everywhere (a broadcast echo of a comment added via REST).
    pub fn insert_comment(&mut self, comment: &Comment) -> bool {
        let mut inserted = false;
        let meme_id = comment.meme_id.clone();
        self.for_each_meme_mut(&meme_id, |meme| {
            if meme.comments.iter().any(|existing| existing.id == comment.id) {
                return;
            }
            meme.comments.push(comment.clone());
            meme.comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            meme.comment_count = meme.comments.len() as u32;
            inserted = true;
        });
        if !inserted {
            debug!(comment = %comment.id, "duplicate comment discarded");
        }
        inserted
    }

    // --- internals ---

    fn set_like_count(&mut self, meme_id: &str, count: u32) {
        self.for_each_meme_mut(meme_id, |meme| meme.like_count = count);
    }

    fn set_save_count(&mut self, meme_id: &str, count: u32) {
        self.for_each_meme_mut(meme_id, |meme| meme.save_count = count);
    }

    fn for_each_meme_mut(&mut self, meme_id: &str, mut apply: impl FnMut(&mut Meme)) {
        for meme in self
            .memes
            .iter_mut()
            .chain(self.liked.iter_mut())
            .chain(self.saved.iter_mut())
            .chain(self.selected.iter_mut())
        {
            if meme.id == meme_id {
                apply(meme);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meme(id: &str, like_count: u32) -> Meme {
        Meme {
            id: id.into(),
            title: format!("meme {id}"),
            image_url: format!("https://cdn.example/{id}.png"),
            uploader: "bob".into(),
            like_count,
            save_count: 0,
            comment_count: 0,
            comments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn comment(id: &str, meme_id: &str) -> Comment {
        Comment {
            id: id.into(),
            meme_id: meme_id.into(),
            user_id: "u1".into(),
            username: "alice".into(),
            text: "lol".into(),
            profile_picture_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn optimistic_like_moves_counter_and_membership_together() {
        let mut store = ContentStore::new();
        store.set_memes(vec![meme("m1", 10)]);

        let toggle = store.toggle_like("m1").unwrap();
        assert!(toggle.now_active);
        assert!(!toggle.was_active);
        assert!(store.is_liked("m1"));
        assert_eq!(store.memes[0].like_count, 11);
        assert_eq!(store.liked[0].like_count, 11);

        let toggle = store.toggle_like("m1").unwrap();
        assert!(!toggle.now_active);
        assert!(!store.is_liked("m1"));
        assert_eq!(store.memes[0].like_count, 10);
    }

    #[test]
    fn unlike_at_zero_stays_at_zero() {
        let mut store = ContentStore::new();
        store.set_memes(vec![meme("m1", 0)]);
        store.liked.push(meme("m1", 0));

        store.toggle_like("m1").unwrap();
        assert_eq!(store.memes[0].like_count, 0);
    }

    #[test]
    fn matching_confirmation_leaves_state_as_is() {
        let mut store = ContentStore::new();
        store.set_memes(vec![meme("m1", 10)]);
        store.toggle_like("m1").unwrap();

        let decision = store.apply_like("m1", true, LikeAction::Like, Some(11));
        assert_eq!(decision, Reconcile::Overwrite);
        assert!(store.is_liked("m1"));
        assert_eq!(store.memes[0].like_count, 11);

        // duplicate delivery of the same broadcast changes nothing
        let decision = store.apply_like("m1", true, LikeAction::Like, Some(11));
        assert_eq!(decision, Reconcile::Overwrite);
        assert_eq!(store.memes[0].like_count, 11);
    }

    #[test]
    fn stale_confirmation_does_not_undo_a_newer_toggle() {
        let mut store = ContentStore::new();
        store.set_memes(vec![meme("m1", 10)]);

        store.toggle_like("m1").unwrap(); // 11, liked
        store.toggle_like("m1").unwrap(); // 10, not liked

        // confirmation of the first toggle arrives late
        let decision = store.apply_like("m1", true, LikeAction::Like, Some(11));
        assert_eq!(
            decision,
            Reconcile::Resend {
                authoritative_active: true
            }
        );
        assert!(!store.is_liked("m1"));
        assert_eq!(store.memes[0].like_count, 10);
    }

    #[test]
    fn other_users_likes_only_move_the_counter() {
        let mut store = ContentStore::new();
        store.set_memes(vec![meme("m1", 10)]);

        let decision = store.apply_like("m1", false, LikeAction::Like, Some(11));
        assert_eq!(decision, Reconcile::Overwrite);
        assert!(!store.is_liked("m1"));
        assert_eq!(store.memes[0].like_count, 11);
    }

    #[test]
    fn comment_echo_is_deduplicated_by_id() {
        let mut store = ContentStore::new();
        store.set_memes(vec![meme("m1", 0)]);

        assert!(store.insert_comment(&comment("c1", "m1")));
        assert_eq!(store.memes[0].comment_count, 1);

        // the broadcast echo of the same comment
        assert!(!store.insert_comment(&comment("c1", "m1")));
        assert_eq!(store.memes[0].comments.len(), 1);
        assert_eq!(store.memes[0].comment_count, 1);
    }

    #[test]
    fn comments_are_ordered_newest_first() {
        let mut store = ContentStore::new();
        store.set_memes(vec![meme("m1", 0)]);

        let mut old = comment("c1", "m1");
        old.created_at = Utc::now() - chrono::Duration::minutes(5);
        store.insert_comment(&old);
        store.insert_comment(&comment("c2", "m1"));

        assert_eq!(store.memes[0].comments[0].id, "c2");
        assert_eq!(store.memes[0].comments[1].id, "c1");
    }

    #[test]
    fn mutations_reach_every_copy_of_a_meme() {
        let mut store = ContentStore::new();
        store.set_memes(vec![meme("m1", 10)]);
        store.set_saved(vec![meme("m1", 10)]);
        store.select("m1");

        store.toggle_like("m1").unwrap();
        assert_eq!(store.memes[0].like_count, 11);
        assert_eq!(store.saved[0].like_count, 11);
        assert_eq!(store.selected.as_ref().unwrap().like_count, 11);
    }
}
