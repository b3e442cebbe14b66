//! Backend placement policy.
//!
//! Works on probe results already ordered like the pool snapshot, so the
//! outcome does not depend on which probe finished first.

use crate::backend::Credential;

/// Where a user's credential lives or should be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The backend at this index already holds a credential for the user.
    Existing(usize),
    /// No backend holds one; this index has the fewest credentials.
    LeastLoaded(usize),
}

impl Placement {
    pub fn index(self) -> usize {
        match self {
            Placement::Existing(i) | Placement::LeastLoaded(i) => i,
        }
    }
}

/// Pick a backend for `label`.
///
/// `listings[i]` is `None` when backend `i` could not be probed; such
/// backends are never chosen. The first backend holding `label` wins;
/// otherwise the least loaded one, ties going to the earliest.
pub fn place<L: AsRef<[Credential]>>(label: &str, listings: &[Option<L>]) -> Option<Placement> {
    let existing = listings.iter().position(|listing| {
        listing
            .as_ref()
            .is_some_and(|creds| creds.as_ref().iter().any(|c| c.label == label))
    });
    if let Some(i) = existing {
        return Some(Placement::Existing(i));
    }

    // min_by_key keeps the first of equal minima
    listings
        .iter()
        .enumerate()
        .filter_map(|(i, listing)| listing.as_ref().map(|creds| (i, creds.as_ref().len())))
        .min_by_key(|&(_, count)| count)
        .map(|(i, _)| Placement::LeastLoaded(i))
}
