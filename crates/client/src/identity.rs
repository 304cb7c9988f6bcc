//! Who the client is acting as.
//!
//! The connection manager never reaches for a global session; whoever builds
//! it injects an [`IdentitySource`]. Production code uses
//! [`PersistedIdentity`], which reads the user record the login flow saved;
//! tests and embedders that manage sessions themselves use
//! [`StaticIdentity`].

use std::cell::RefCell;

use memeshare_shared::StoredUser;

use crate::storage;

/// Storage key for the persisted user record.
const USER_KEY: &str = "user";

/// Supplies the authenticated user the client should act as, if any.
pub trait IdentitySource {
    fn current(&self) -> Option<StoredUser>;
}

/// Identity persisted by the login flow, read back from storage on demand.
#[derive(Debug, Default)]
pub struct PersistedIdentity;

impl IdentitySource for PersistedIdentity {
    fn current(&self) -> Option<StoredUser> {
        storage::load(USER_KEY)
    }
}

/// Persist the logged-in user for later sessions.
pub fn save_identity(user: &StoredUser) -> bool {
    storage::save(USER_KEY, user)
}

/// Forget the persisted user (logout).
pub fn clear_identity() {
    storage::remove(USER_KEY);
}

/// A fixed, in-memory identity.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user: RefCell<Option<StoredUser>>,
}

impl StaticIdentity {
    pub fn new(user: StoredUser) -> Self {
        Self {
            user: RefCell::new(Some(user)),
        }
    }

    pub fn set(&self, user: Option<StoredUser>) {
        *self.user.borrow_mut() = user;
    }
}

impl IdentitySource for StaticIdentity {
    fn current(&self) -> Option<StoredUser> {
        self.user.borrow().clone()
    }
}
