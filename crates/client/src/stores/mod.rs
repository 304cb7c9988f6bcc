//! Feature stores: local state that real-time messages are folded into.

pub mod content;
pub mod notifications;
pub mod profile;
pub mod reconcile;

pub use content::ContentStore;
pub use notifications::NotificationStore;
pub use profile::{FollowToggle, ProfileStore};
pub use reconcile::{Reconcile, Toggle};
