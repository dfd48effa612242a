//! Transfer engine.
//!
//! The engine owns the account store and executes account opening and
//! transfers. A transfer runs advisory pre-flight checks on snapshot reads,
//! then re-validates everything against live records inside an explicit unit
//! of work; only the in-transaction checks are trusted for the no-negative
//! balance and cap invariants. Also supports an async stream of commands.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::Amount;
use crate::model::{Account, AccountId, AccountType, Command, TransferReceipt, UserId};
use crate::store::{AccountStore, StoreError};

mod error;
pub use error::{EngineError, OpenAccountError, Party, TransferError};

const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// The transfer engine.
///
/// Methods take `&self`; the store provides all interior synchronization, so
/// one engine serves any number of concurrent callers.
pub struct Engine {
    store: AccountStore,
    /// Upper bound on the transactional core; an attempt that cannot commit
    /// in time is rolled back and reported as [`TransferError::Timeout`].
    commit_timeout: Duration,
}

/// Public API
impl Engine {
    pub fn new() -> Self {
        Self {
            store: AccountStore::new(),
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
        }
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    /// Run the engine with the given command stream.
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // a failed command should not stop the engine
            let _ = self.apply(command).await;
        }
    }

    /// Return the state of all accounts, ordered by id.
    pub async fn accounts(&self) -> Vec<Account> {
        self.store.accounts().await
    }

    /// Return the state of one account.
    pub async fn account(&self, id: AccountId) -> Option<Account> {
        self.store.get(id).await.ok()
    }

    /// Return all accounts owned by one user.
    pub async fn owned_by(&self, owner: UserId) -> Vec<Account> {
        self.store.owned_by(owner).await
    }

    /// Apply a single command on top of the current ledger state.
    pub async fn apply(&self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::Open {
                owner,
                account_type,
                balance,
            } => {
                let result = self.open_account(owner, account_type, balance).await;
                match &result {
                    Ok(account) => info!(
                        owner,
                        account_type = ?account_type,
                        balance = %balance,
                        id = account.id,
                        "open applied"
                    ),
                    Err(e) => info!(
                        owner,
                        account_type = ?account_type,
                        balance = %balance,
                        reason = %e,
                        "open skipped"
                    ),
                }
                result?;
            }
            Command::Transfer {
                sender,
                receiver,
                amount,
            } => {
                let result = self.transfer(sender, receiver, amount).await;
                match &result {
                    Ok(receipt) => info!(
                        sender,
                        receiver,
                        amount = %amount,
                        new_sender_balance = %receipt.new_sender_balance,
                        "transfer applied"
                    ),
                    Err(e) => info!(
                        sender,
                        receiver,
                        amount = %amount,
                        reason = %e,
                        "transfer skipped"
                    ),
                }
                result?;
            }
        }
        Ok(())
    }

    /// Open a new account:
    /// - Reject a negative initial balance
    /// - Enforce the type's balance cap, if any
    /// - Persist (the store re-checks the one-account-per-type invariant
    ///   under its write lock)
    pub async fn open_account(
        &self,
        owner: UserId,
        account_type: AccountType,
        balance: Amount,
    ) -> Result<Account, OpenAccountError> {
        if balance < Amount::ZERO {
            return Err(OpenAccountError::NegativeBalance(balance));
        }

        if let Some(cap) = account_type.cap() {
            if balance > cap {
                return Err(OpenAccountError::CapExceeded {
                    account_type,
                    balance,
                    cap,
                });
            }
        }

        Ok(self.store.create(owner, account_type, balance).await?)
    }

    /// Execute one transfer as an all-or-nothing operation.
    ///
    /// Pre-flight checks fail fast on snapshot reads without touching any
    /// balance; the authoritative funds and cap checks are repeated against
    /// live records inside the unit of work, because balances can change
    /// between the snapshot and the commit. A commit-time conflict surfaces
    /// as [`StoreError::Conflict`] and is never retried here.
    pub async fn transfer(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Amount,
    ) -> Result<TransferReceipt, TransferError> {
        if !amount.is_positive() {
            return Err(TransferError::NonPositiveAmount(amount));
        }

        // pre-flight, advisory only
        let sender_snap = self.snapshot(Party::Sender, sender).await?;
        let receiver_snap = self.snapshot(Party::Receiver, receiver).await?;

        if sender_snap.owner == receiver_snap.owner {
            return Err(TransferError::SameOwner {
                sender,
                receiver,
                owner: sender_snap.owner,
            });
        }
        if sender_snap.balance < amount {
            return Err(TransferError::InsufficientFunds {
                account: sender,
                balance: sender_snap.balance,
                requested: amount,
            });
        }
        let check_before_add = receiver_snap
            .balance
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow(receiver))?;
        Self::check_cap(&receiver_snap, check_before_add, amount)?;

        // transactional core, bounded; on timeout the Txn is dropped and
        // nothing was applied
        let core = self.debit_then_credit(sender, receiver, amount);
        let transferred_at = match tokio::time::timeout(self.commit_timeout, core).await {
            Ok(result) => result?,
            Err(_) => return Err(TransferError::Timeout),
        };

        // post-commit reporting reads, deliberately outside the unit of work
        let sender_after = self.store.get(sender).await?;
        let receiver_total_balance = self
            .store
            .owned_by(receiver_snap.owner)
            .await
            .into_iter()
            .fold(Amount::ZERO, |total, account| total + account.balance);

        Ok(TransferReceipt {
            new_sender_balance: sender_after.balance,
            receiver_total_balance,
            transferred_at,
        })
    }
}

/// Private API
impl Engine {
    /// Snapshot read for pre-flight validation.
    async fn snapshot(&self, party: Party, id: AccountId) -> Result<Account, TransferError> {
        match self.store.get(id).await {
            Ok(account) => Ok(account),
            Err(StoreError::NotFound(_)) => Err(TransferError::AccountNotFound(party, id)),
            Err(e) => Err(e.into()),
        }
    }

    fn check_cap(
        account: &Account,
        new_balance: Amount,
        amount: Amount,
    ) -> Result<(), TransferError> {
        if let Some(cap) = account.account_type.cap() {
            if new_balance > cap {
                return Err(TransferError::CapExceeded {
                    account: account.id,
                    amount,
                    cap,
                });
            }
        }
        Ok(())
    }

    /// The transactional core: debit the sender, then credit the receiver,
    /// inside one unit of work. Any early return drops the `Txn`, so a
    /// partial debit is never observable.
    async fn debit_then_credit(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Amount,
    ) -> Result<DateTime<Utc>, TransferError> {
        let mut txn = self.store.begin();

        let live_sender = txn.fetch(sender).await?;
        let new_sender_balance = live_sender
            .balance
            .checked_sub(amount)
            .ok_or(TransferError::BalanceOverflow(sender))?;
        // authoritative re-check; the balance may have dropped since pre-flight
        if new_sender_balance < Amount::ZERO {
            return Err(TransferError::InsufficientFunds {
                account: sender,
                balance: live_sender.balance,
                requested: amount,
            });
        }
        txn.stage(sender, new_sender_balance);

        let live_receiver = txn.fetch(receiver).await?;
        let new_receiver_balance = live_receiver
            .balance
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow(receiver))?;
        Self::check_cap(&live_receiver, new_receiver_balance, amount)?;
        txn.stage(receiver, new_receiver_balance);

        Ok(txn.commit().await?)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
