//! Core domain types for the account ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Account identifier, assigned by the store at creation.
pub type AccountId = u64;

/// Identifier of the user owning an account.
pub type UserId = u64;

/// Balance ceiling for basic savings accounts (Rs. 50,000 in paise).
pub const BASIC_SAVINGS_CAP: Amount = Amount::from_minor(5_000_000);

/// The closed set of account types. A user may hold at most one account of
/// each type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountType {
    Savings,
    Current,
    BasicSavings,
}

impl AccountType {
    /// Balance ceiling for this account type, if any. Enforced both at
    /// creation and on every credit.
    pub fn cap(self) -> Option<Amount> {
        match self {
            AccountType::BasicSavings => Some(BASIC_SAVINGS_CAP),
            AccountType::Savings | AccountType::Current => None,
        }
    }
}

/// A balance-bearing account record, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub owner: UserId,
    pub account_type: AccountType,
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every balance mutation.
    pub updated_at: DateTime<Utc>,
}

/// A command representing the possible inputs of the engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// Open a new account for a user, seeded with an initial balance.
    Open {
        owner: UserId,
        account_type: AccountType,
        balance: Amount,
    },
    /// Move funds from one account to another, atomically.
    Transfer {
        sender: AccountId,
        receiver: AccountId,
        amount: Amount,
    },
}

/// Summary returned after a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Sender's balance immediately after commit.
    pub new_sender_balance: Amount,
    /// Sum of balances across all accounts owned by the receiving user,
    /// post-transfer.
    pub receiver_total_balance: Amount,
    /// Timestamp of the committing write.
    pub transferred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_basic_savings_is_capped() {
        assert_eq!(AccountType::BasicSavings.cap(), Some(BASIC_SAVINGS_CAP));
        assert_eq!(AccountType::Savings.cap(), None);
        assert_eq!(AccountType::Current.cap(), None);
    }

    #[test]
    fn cap_matches_source_ceiling() {
        assert_eq!(BASIC_SAVINGS_CAP, Amount::from_minor(5_000_000));
    }
}
