//! In-memory store implementation
//!
//! Used for testing and development without a database.
//!
//! `MemoryStore` holds the committed accounts; every `MemoryResource`
//! obtained from it is an independent logical connection with its own
//! private transaction. Writes are validated first-committer-wins: if an
//! account written by a transaction was committed by someone else after the
//! transaction first touched it, commit fails with a serialization failure.
//!
//! Resources also support scripted fault injection so tests can force
//! deadlocks, serialization conflicts or fatal errors at a given step.

use crate::error::{StoreError, SQLSTATE_NUMERIC_OUT_OF_RANGE};
use crate::resource::{sort_accounts, Operation, StoreResult, TransactionalResource};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use xfer_domain::{Account, AccountNo};

/// Committed balance with a version bumped on every committed write
#[derive(Debug, Clone, Copy)]
struct Versioned {
    balance: Decimal,
    version: u64,
}

/// Shared in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    accounts: Arc<RwLock<HashMap<AccountNo, Versioned>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the given accounts
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(seed_map(accounts))),
        }
    }

    /// Replace every account with the given seed (drop/create/seed)
    pub fn reset(&self, accounts: Vec<Account>) -> StoreResult<()> {
        *self.write_lock()? = seed_map(accounts);
        Ok(())
    }

    /// Committed view of all accounts, outside any transaction
    pub fn snapshot(&self) -> StoreResult<Vec<Account>> {
        let committed = self.read_lock()?;
        let mut accounts: Vec<Account> = committed
            .iter()
            .map(|(no, v)| Account::new(no.clone(), v.balance))
            .collect();
        sort_accounts(&mut accounts);
        Ok(accounts)
    }

    /// Committed balance of one account
    pub fn balance(&self, account: &AccountNo) -> StoreResult<Option<Decimal>> {
        Ok(self.read_lock()?.get(account).map(|v| v.balance))
    }

    /// Get the number of accounts
    pub fn account_count(&self) -> StoreResult<usize> {
        Ok(self.read_lock()?.len())
    }

    /// Open a new logical connection to this store
    pub fn connect(&self) -> MemoryResource {
        MemoryResource {
            store: self.clone(),
            txn: None,
            faults: VecDeque::new(),
            stats: ResourceStats::default(),
        }
    }

    fn read_lock(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<AccountNo, Versioned>>> {
        self.accounts
            .read()
            .map_err(|e| StoreError::invalid_state(format!("Failed to acquire store lock: {}", e)))
    }

    fn write_lock(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<AccountNo, Versioned>>> {
        self.accounts
            .write()
            .map_err(|e| StoreError::invalid_state(format!("Failed to acquire store lock: {}", e)))
    }
}

fn seed_map(accounts: Vec<Account>) -> HashMap<AccountNo, Versioned> {
    accounts
        .into_iter()
        .map(|account| {
            let slot = Versioned {
                balance: account.balance,
                version: 0,
            };
            (account.account_no, slot)
        })
        .collect()
}

/// Step of the transaction lifecycle a scripted fault fires at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Next `execute` call fails (the transaction is still opened)
    Execute,
    /// Next `commit` call fails (the transaction stays open)
    Commit,
    /// Next `rollback` call fails (the transaction is still discarded)
    Rollback,
}

/// Lifecycle counters for one resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStats {
    /// Transactions opened
    pub begins: u32,
    /// Successful commits
    pub commits: u32,
    /// Rollback calls, including failed ones
    pub rollbacks: u32,
    /// Operations executed, including failed ones
    pub executes: u32,
}

/// Private state of one open transaction
#[derive(Debug, Default)]
struct Txn {
    /// Committed version of each touched account when first touched
    seen: HashMap<AccountNo, u64>,
    /// Uncommitted balances
    writes: HashMap<AccountNo, Decimal>,
}

/// One logical connection to a `MemoryStore`
pub struct MemoryResource {
    store: MemoryStore,
    txn: Option<Txn>,
    faults: VecDeque<(FaultPoint, StoreError)>,
    stats: ResourceStats,
}

impl MemoryResource {
    /// Script a failure: the next call at `point` returns `error`.
    ///
    /// Faults fire in the order they were pushed.
    pub fn push_fault(&mut self, point: FaultPoint, error: StoreError) {
        self.faults.push_back((point, error));
    }

    /// Number of scripted faults not yet fired
    pub fn pending_faults(&self) -> usize {
        self.faults.len()
    }

    /// Lifecycle counters
    pub fn stats(&self) -> ResourceStats {
        self.stats
    }

    /// The store this resource is connected to
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn take_fault(&mut self, point: FaultPoint) -> Option<StoreError> {
        match self.faults.front() {
            Some((p, _)) if *p == point => self.faults.pop_front().map(|(_, e)| e),
            _ => None,
        }
    }

    fn begin_if_needed(&mut self) -> &mut Txn {
        if self.txn.is_none() {
            self.stats.begins += 1;
            debug!(begins = self.stats.begins, "Memory transaction opened");
        }
        self.txn.get_or_insert_with(Txn::default)
    }
}

#[async_trait]
impl TransactionalResource for MemoryResource {
    async fn execute(&mut self, operation: &Operation) -> StoreResult<u64> {
        self.stats.executes += 1;
        self.begin_if_needed();

        if let Some(err) = self.take_fault(FaultPoint::Execute) {
            return Err(err);
        }

        let account = operation.account();
        let committed = self.store.read_lock()?.get(account).copied();
        let Some(committed) = committed else {
            warn!(account = %account, op = operation.kind(), "No such account, 0 rows updated");
            return Ok(0);
        };

        let txn = self.txn.get_or_insert_with(Txn::default);
        txn.seen.entry(account.clone()).or_insert(committed.version);
        let current = txn.writes.get(account).copied().unwrap_or(committed.balance);
        let updated = current
            .checked_add(operation.delta())
            .ok_or_else(|| StoreError::database(SQLSTATE_NUMERIC_OUT_OF_RANGE, "numeric value out of range"))?;
        txn.writes.insert(account.clone(), updated);

        Ok(1)
    }

    async fn accounts(&mut self) -> StoreResult<Vec<Account>> {
        self.begin_if_needed();

        let mut accounts = self.store.snapshot()?;
        if let Some(txn) = &self.txn {
            for account in &mut accounts {
                if let Some(balance) = txn.writes.get(&account.account_no) {
                    account.balance = *balance;
                }
            }
        }
        Ok(accounts)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        if self.txn.is_none() {
            return Ok(());
        }

        if let Some(err) = self.take_fault(FaultPoint::Commit) {
            return Err(err);
        }

        let mut committed = self.store.write_lock()?;
        let Some(txn) = self.txn.as_ref() else {
            return Ok(());
        };

        for (account, seen_version) in &txn.seen {
            let current_version = committed.get(account).map(|v| v.version);
            if current_version != Some(*seen_version) {
                debug!(account = %account, "Concurrent commit detected");
                return Err(StoreError::serialization_failure());
            }
        }

        for (account, balance) in &txn.writes {
            if let Some(slot) = committed.get_mut(account) {
                slot.balance = *balance;
                slot.version += 1;
            }
        }
        drop(committed);

        self.txn = None;
        self.stats.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.stats.rollbacks += 1;
        self.txn = None;

        match self.take_fault(FaultPoint::Rollback) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
