//! Reconciling optimistic local toggles with authoritative broadcasts.
//!
//! Every toggleable relation (likes, saves, follows) runs the same protocol:
//! mutate locally first for instant feedback, send the intent, and later
//! fold in the server broadcast. The broadcast is authoritative *unless* it
//! names the local user with a resulting state the local state has already
//! moved past, which means a newer local toggle raced ahead of this
//! confirmation; overwriting would undo the user's latest action, so the
//! local intent is re-sent instead.

/// Outcome of an optimistic toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    /// Membership before the mutation; this is what the outbound facade
    /// expects as the "current" state.
    pub was_active: bool,
    /// Membership after the mutation.
    pub now_active: bool,
}

/// What to do with an authoritative broadcast about a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Fold the authoritative fields into local state.
    Overwrite,
    /// The local user toggled again before this confirmation arrived. Keep
    /// local state and re-send the local intent, passing
    /// `authoritative_active` as the "current" state so the facade negates
    /// it back into the local one.
    Resend { authoritative_active: bool },
}

/// Decide how to apply an authoritative toggle confirmation.
pub fn reconcile_toggle(
    from_local_user: bool,
    local_active: bool,
    authoritative_active: bool,
) -> Reconcile {
    if from_local_user && local_active != authoritative_active {
        Reconcile::Resend {
            authoritative_active,
        }
    } else {
        Reconcile::Overwrite
    }
}

/// Counter adjustment for an optimistic toggle, clamped at zero.
pub fn adjust_count(count: u32, now_active: bool) -> u32 {
    if now_active {
        count + 1
    } else {
        count.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_never_goes_below_zero() {
        assert_eq!(adjust_count(0, false), 0);
        assert_eq!(adjust_count(1, false), 0);
        assert_eq!(adjust_count(0, true), 1);
    }

    #[test]
    fn matching_confirmation_is_an_overwrite() {
        assert_eq!(reconcile_toggle(true, true, true), Reconcile::Overwrite);
        assert_eq!(reconcile_toggle(true, false, false), Reconcile::Overwrite);
    }

    #[test]
    fn other_users_actions_always_overwrite() {
        assert_eq!(reconcile_toggle(false, true, false), Reconcile::Overwrite);
        assert_eq!(reconcile_toggle(false, false, true), Reconcile::Overwrite);
    }

    #[test]
    fn stale_confirmation_of_the_local_user_is_resent() {
        assert_eq!(
            reconcile_toggle(true, false, true),
            Reconcile::Resend {
                authoritative_active: true
            }
        );
        assert_eq!(
            reconcile_toggle(true, true, false),
            Reconcile::Resend {
                authoritative_active: false
            }
        );
    }
}
