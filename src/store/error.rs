//! Error types for the account store.

use thiserror::Error;

use crate::model::{AccountId, AccountType, UserId};

/// Error returned by [`AccountStore`](super::AccountStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account {0} not found")]
    NotFound(AccountId),

    #[error("user {0} already has a {1:?} account")]
    Duplicate(UserId, AccountType),

    #[error("account {0} was modified concurrently")]
    Conflict(AccountId),
}
