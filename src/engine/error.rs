//! Error types for account opening and transfers.

use thiserror::Error;

use crate::Amount;
use crate::model::{AccountId, AccountType, UserId};
use crate::store::StoreError;

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("open account failed: {0}")]
    Open(#[from] OpenAccountError),

    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),
}

/// Error during account creation.
#[derive(Debug, Error)]
pub enum OpenAccountError {
    #[error("initial balance {0} is negative")]
    NegativeBalance(Amount),

    #[error("initial balance {balance} exceeds the {account_type:?} cap {cap}")]
    CapExceeded {
        account_type: AccountType,
        balance: Amount,
        cap: Amount,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which side of a transfer an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Sender,
    Receiver,
}

/// Error during transfer processing.
///
/// Every variant except [`Store`](TransferError::Store) with a commit-time
/// conflict is deterministic: repeating the same transfer fails the same way
/// with no storage mutation.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error("{0:?} account {1} not found")]
    AccountNotFound(Party, AccountId),

    #[error("accounts {sender} and {receiver} both belong to user {owner}")]
    SameOwner {
        sender: AccountId,
        receiver: AccountId,
        owner: UserId,
    },

    #[error("account {account} has insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Amount,
        requested: Amount,
    },

    #[error("crediting {amount} to account {account} would exceed its cap {cap}")]
    CapExceeded {
        account: AccountId,
        amount: Amount,
        cap: Amount,
    },

    #[error("balance arithmetic overflowed for account {0}")]
    BalanceOverflow(AccountId),

    #[error("transfer timed out before commit; no balances were changed")]
    Timeout,

    #[error(transparent)]
    Store(#[from] StoreError),
}
