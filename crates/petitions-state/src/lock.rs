//! # Moderator Lock
//!
//! A cooperative lock that tells moderators someone else is editing a
//! petition. It guards the admin UI only; no lifecycle operation checks it.

use petitions_core::{ModeratorId, Timestamp};

use crate::petition::Petition;

impl Petition {
    /// Take the lock if it is free or already ours.
    pub fn checkout(&mut self, moderator: ModeratorId, now: Timestamp) -> bool {
        match self.locked_by {
            Some(holder) if holder != moderator => false,
            _ => {
                self.locked_by = Some(moderator);
                self.locked_at = Some(now);
                self.touch(now);
                true
            }
        }
    }

    /// Take the lock regardless of who holds it.
    pub fn force_checkout(&mut self, moderator: ModeratorId, now: Timestamp) -> bool {
        self.locked_by = Some(moderator);
        self.locked_at = Some(now);
        self.touch(now);
        true
    }

    /// Release the lock if `moderator` holds it.
    pub fn release(&mut self, moderator: ModeratorId, now: Timestamp) -> bool {
        if self.locked_by != Some(moderator) {
            return false;
        }
        self.locked_by = None;
        self.locked_at = None;
        self.touch(now);
        true
    }
}
