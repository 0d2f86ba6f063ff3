//! Free-tier ceilings. Premium users skip every check here.

use crate::error::ApiError;

/// Lists a free user may own.
pub const FREE_OWNED_LISTS: i64 = 10;

/// Contents a list may hold before free users can no longer add to it.
pub const FREE_CONTENTS_PER_LIST: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaExceeded {
    OwnedLists,
    ListContents,
}

impl From<QuotaExceeded> for ApiError {
    fn from(q: QuotaExceeded) -> Self {
        ApiError::QuotaExceeded(q)
    }
}

/// `owned` counts lists the actor owns; memberships elsewhere don't count.
pub fn check_list_creation(is_premium: bool, owned: i64) -> Result<(), QuotaExceeded> {
    if is_premium || owned < FREE_OWNED_LISTS {
        Ok(())
    } else {
        Err(QuotaExceeded::OwnedLists)
    }
}

/// `list_contents` is the target list's total, whoever added them. The
/// adder's plan decides, so a premium member can grow a shared list past the
/// ceiling while free co-members stay blocked.
pub fn check_content_creation(adder_is_premium: bool, list_contents: i64) -> Result<(), QuotaExceeded> {
    if adder_is_premium || list_contents < FREE_CONTENTS_PER_LIST {
        Ok(())
    } else {
        Err(QuotaExceeded::ListContents)
    }
}
