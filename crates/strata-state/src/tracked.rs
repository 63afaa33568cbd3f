//! Copy-on-write snapshots over a parent repository

use crate::account::Account;
use crate::error::StateResult;
use crate::repository::Repository;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strata_primitives::{Address, H256};

/// Writes buffered by a [`Tracked`] layer.
///
/// Detached from its parent borrow so the executor can hold changes
/// across phases and apply them later.
#[derive(Clone, Debug, Default)]
pub struct StateChanges {
    /// Written accounts (`None` = deleted)
    accounts: BTreeMap<Address, Option<Account>>,
    /// Written storage slots
    storage: BTreeMap<(Address, H256), H256>,
    /// Code by hash
    code: HashMap<H256, Vec<u8>>,
    /// Accounts whose parent storage is hidden
    wiped: BTreeSet<Address>,
}

impl StateChanges {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if nothing was written
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.storage.is_empty()
            && self.code.is_empty()
            && self.wiped.is_empty()
    }

    /// Number of account records written
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Number of storage slots written
    pub fn storage_count(&self) -> usize {
        self.storage.len()
    }

    /// Every address with a pending account or storage change
    pub fn changed_addresses(&self) -> BTreeSet<Address> {
        self.accounts
            .keys()
            .copied()
            .chain(self.storage.keys().map(|(address, _)| *address))
            .chain(self.wiped.iter().copied())
            .collect()
    }

    /// Replay the changes onto `target`.
    ///
    /// Wipes go first so storage written after a delete survives.
    pub fn apply_to(self, target: &mut dyn Repository) -> StateResult<()> {
        for address in &self.wiped {
            target.delete_account(address)?;
        }
        for (address, account) in self.accounts {
            match account {
                Some(account) => target.put_account(address, account)?,
                None => target.delete_account(&address)?,
            }
        }
        for ((address, key), value) in self.storage {
            target.put_storage(address, key, value)?;
        }
        for (code_hash, code) in self.code {
            target.put_code(code_hash, code)?;
        }
        Ok(())
    }
}

/// A tracked child snapshot.
///
/// Reads fall through to the parent until a key is written. `commit`
/// flushes the buffered writes into the parent; dropping (or `rollback`)
/// discards them. Snapshots nest arbitrarily since `Tracked` is itself a
/// [`Repository`].
pub struct Tracked<'a> {
    parent: &'a mut dyn Repository,
    changes: StateChanges,
    tx_boundary: bool,
}

impl<'a> Tracked<'a> {
    /// Open a snapshot over `parent`
    pub fn new(parent: &'a mut dyn Repository) -> Self {
        Self {
            parent,
            changes: StateChanges::new(),
            tx_boundary: false,
        }
    }

    /// Open a transaction-level snapshot.
    ///
    /// Its committed storage is the parent's current storage, which is
    /// the "original value" for net gas metering.
    pub fn transaction(parent: &'a mut dyn Repository) -> Self {
        Self {
            tx_boundary: true,
            ..Self::new(parent)
        }
    }

    /// Pending changes
    pub fn changes(&self) -> &StateChanges {
        &self.changes
    }

    /// Read-only view of the parent
    pub fn parent(&self) -> &dyn Repository {
        &*self.parent
    }

    /// Flush all changes into the parent
    pub fn commit(self) -> StateResult<()> {
        let Tracked {
            parent, changes, ..
        } = self;
        changes.apply_to(parent)
    }

    /// Discard all changes
    pub fn rollback(self) {}

    /// Detach the changes without applying them
    pub fn into_changes(self) -> StateChanges {
        self.changes
    }

    /// Layer a detached change set on top of this snapshot
    pub fn apply(&mut self, changes: StateChanges) -> StateResult<()> {
        changes.apply_to(self)
    }
}

impl Repository for Tracked<'_> {
    fn account(&self, address: &Address) -> StateResult<Option<Account>> {
        if let Some(account) = self.changes.accounts.get(address) {
            return Ok(account.clone());
        }
        self.parent.account(address)
    }

    fn storage(&self, address: &Address, key: &H256) -> StateResult<H256> {
        if let Some(value) = self.changes.storage.get(&(*address, *key)) {
            return Ok(*value);
        }
        if self.changes.wiped.contains(address) {
            return Ok(H256::ZERO);
        }
        self.parent.storage(address, key)
    }

    fn committed_storage(&self, address: &Address, key: &H256) -> StateResult<H256> {
        if self.tx_boundary {
            self.parent.storage(address, key)
        } else {
            self.parent.committed_storage(address, key)
        }
    }

    fn code(&self, code_hash: &H256) -> StateResult<Option<Vec<u8>>> {
        if let Some(code) = self.changes.code.get(code_hash) {
            return Ok(Some(code.clone()));
        }
        self.parent.code(code_hash)
    }

    fn put_account(&mut self, address: Address, account: Account) -> StateResult<()> {
        self.changes.accounts.insert(address, Some(account));
        Ok(())
    }

    fn delete_account(&mut self, address: &Address) -> StateResult<()> {
        self.changes.accounts.insert(*address, None);
        self.changes.storage.retain(|(owner, _), _| owner != address);
        self.changes.wiped.insert(*address);
        Ok(())
    }

    fn put_storage(&mut self, address: Address, key: H256, value: H256) -> StateResult<()> {
        self.changes.storage.insert((address, key), value);
        Ok(())
    }

    fn put_code(&mut self, code_hash: H256, code: Vec<u8>) -> StateResult<()> {
        self.changes.code.insert(code_hash, code);
        Ok(())
    }
}
