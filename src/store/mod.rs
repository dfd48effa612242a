//! Account store: durable account records and the unit of work used to
//! mutate them.
//!
//! Records carry a version counter. A [`Txn`] remembers the version of every
//! record it reads and re-validates those versions at commit, so two
//! concurrent units of work can never both commit against the same stale
//! balance. Writes are buffered until commit; dropping an uncommitted `Txn`
//! rolls everything back.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::Amount;
use crate::model::{Account, AccountId, AccountType, UserId};

mod error;
pub use error::StoreError;

struct Record {
    account: Account,
    version: u64,
}

#[derive(Default)]
struct Records {
    by_id: HashMap<AccountId, Record>,
    next_id: AccountId,
}

impl Records {
    fn find_by_owner(&self, owner: UserId, account_type: AccountType) -> Option<&Record> {
        self.by_id
            .values()
            .find(|r| r.account.owner == owner && r.account.account_type == account_type)
    }
}

/// In-memory account store with per-record optimistic concurrency.
pub struct AccountStore {
    records: RwLock<Records>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Records::default()),
        }
    }

    /// True iff an account with that owner/type pair is present.
    ///
    /// Advisory only: [`create`](Self::create) re-checks under the write
    /// lock before inserting.
    pub async fn exists(&self, owner: UserId, account_type: AccountType) -> bool {
        let records = self.records.read().await;
        records.find_by_owner(owner, account_type).is_some()
    }

    /// Persist a new account. Fails with [`StoreError::Duplicate`] if the
    /// owner already holds an account of this type; the check runs under the
    /// write lock, so concurrent creates cannot both slip through.
    pub async fn create(
        &self,
        owner: UserId,
        account_type: AccountType,
        balance: Amount,
    ) -> Result<Account, StoreError> {
        let mut records = self.records.write().await;

        if records.find_by_owner(owner, account_type).is_some() {
            return Err(StoreError::Duplicate(owner, account_type));
        }

        records.next_id += 1;
        let now = Utc::now();
        let account = Account {
            id: records.next_id,
            owner,
            account_type,
            balance,
            created_at: now,
            updated_at: now,
        };
        records.by_id.insert(
            account.id,
            Record {
                account: account.clone(),
                version: 0,
            },
        );

        Ok(account)
    }

    /// Fetch one account by id.
    pub async fn get(&self, id: AccountId) -> Result<Account, StoreError> {
        let records = self.records.read().await;
        records
            .by_id
            .get(&id)
            .map(|r| r.account.clone())
            .ok_or(StoreError::NotFound(id))
    }

    /// All accounts owned by a user, in no particular order.
    pub async fn owned_by(&self, owner: UserId) -> Vec<Account> {
        let records = self.records.read().await;
        records
            .by_id
            .values()
            .filter(|r| r.account.owner == owner)
            .map(|r| r.account.clone())
            .collect()
    }

    /// All accounts, ordered by id.
    pub async fn accounts(&self) -> Vec<Account> {
        let records = self.records.read().await;
        let mut accounts: Vec<Account> =
            records.by_id.values().map(|r| r.account.clone()).collect();
        accounts.sort_by_key(|a| a.id);
        accounts
    }

    /// Read-modify-write one record under the exclusive lock. The mutator
    /// computes the new balance from the live record; no concurrent update
    /// can interleave.
    pub async fn atomic_update(
        &self,
        id: AccountId,
        mutator: impl FnOnce(&Account) -> Amount,
    ) -> Result<Account, StoreError> {
        let mut records = self.records.write().await;
        let record = records.by_id.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        record.account.balance = mutator(&record.account);
        record.account.updated_at = Utc::now();
        record.version += 1;

        Ok(record.account.clone())
    }

    /// Open a new unit of work against this store.
    pub fn begin(&self) -> Txn<'_> {
        Txn {
            store: self,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}

/// An explicit unit of work: isolated reads, buffered writes, atomic commit.
///
/// Nothing reaches the store before [`commit`](Txn::commit); dropping the
/// `Txn` is a rollback.
pub struct Txn<'a> {
    store: &'a AccountStore,
    /// (id, version) of every record read inside this unit of work.
    reads: Vec<(AccountId, u64)>,
    /// Balances staged for commit, applied in staging order.
    writes: Vec<(AccountId, Amount)>,
}

impl Txn<'_> {
    /// Fetch the live record, recording its version for commit-time
    /// validation. A balance already staged in this `Txn` is visible to the
    /// returned snapshot.
    pub async fn fetch(&mut self, id: AccountId) -> Result<Account, StoreError> {
        let records = self.store.records.read().await;
        let record = records.by_id.get(&id).ok_or(StoreError::NotFound(id))?;

        self.reads.push((id, record.version));

        let mut account = record.account.clone();
        if let Some(&(_, balance)) = self.writes.iter().rev().find(|(wid, _)| *wid == id) {
            account.balance = balance;
        }
        Ok(account)
    }

    /// Stage a new balance for a record previously fetched in this `Txn`.
    pub fn stage(&mut self, id: AccountId, balance: Amount) {
        self.writes.push((id, balance));
    }

    /// Atomically apply all staged writes, provided no record read by this
    /// `Txn` has been modified since. On [`StoreError::Conflict`] nothing is
    /// applied. Returns the commit timestamp.
    pub async fn commit(self) -> Result<DateTime<Utc>, StoreError> {
        // every staged write must be covered by a version-validated read,
        // otherwise it would bypass conflict detection
        for (id, _) in &self.writes {
            debug_assert!(
                self.reads.iter().any(|(read_id, _)| read_id == id),
                "staged write for unfetched account {id}"
            );
        }

        let mut records = self.store.records.write().await;

        for (id, version) in &self.reads {
            let record = records.by_id.get(id).ok_or(StoreError::NotFound(*id))?;
            if record.version != *version {
                return Err(StoreError::Conflict(*id));
            }
        }

        let now = Utc::now();
        for (id, balance) in self.writes {
            let record = records.by_id.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            record.account.balance = balance;
            record.account.updated_at = now;
            record.version += 1;
        }

        Ok(now)
    }
}
