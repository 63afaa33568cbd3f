//! The `Repository` trait: account state access shared by every state layer

use crate::account::{Account, EMPTY_CODE_HASH};
use crate::error::{StateError, StateResult};
use crate::tracked::Tracked;
use strata_crypto::keccak256;
use strata_primitives::{Address, H256, U256};

/// Versioned account state.
///
/// Implementors supply the eight primitive reads and writes; every other
/// operation is provided on top of them so all layers (root database and
/// tracked snapshots) behave identically.
pub trait Repository {
    /// Stored account record, `None` if the account does not exist
    fn account(&self, address: &Address) -> StateResult<Option<Account>>;

    /// Current storage value; absent slots read as zero
    fn storage(&self, address: &Address, key: &H256) -> StateResult<H256>;

    /// Storage value as of the start of the current transaction
    fn committed_storage(&self, address: &Address, key: &H256) -> StateResult<H256>;

    /// Contract code by hash
    fn code(&self, code_hash: &H256) -> StateResult<Option<Vec<u8>>>;

    /// Write an account record
    fn put_account(&mut self, address: Address, account: Account) -> StateResult<()>;

    /// Remove an account together with its storage
    fn delete_account(&mut self, address: &Address) -> StateResult<()>;

    /// Write a storage slot; zero is equivalent to absent
    fn put_storage(&mut self, address: Address, key: H256, value: H256) -> StateResult<()>;

    /// Store code under its hash
    fn put_code(&mut self, code_hash: H256, code: Vec<u8>) -> StateResult<()>;

    /// Account record, or an implicit empty one. Never writes.
    fn get_account(&self, address: &Address) -> StateResult<Account> {
        Ok(self.account(address)?.unwrap_or_default())
    }

    /// True if a record exists, even an empty one
    fn is_exist(&self, address: &Address) -> StateResult<bool> {
        Ok(self.account(address)?.is_some())
    }

    /// True if the account is absent or empty (EIP-161)
    fn is_empty(&self, address: &Address) -> StateResult<bool> {
        Ok(self.account(address)?.map_or(true, |account| account.is_empty()))
    }

    /// Create a fresh record at `address`.
    ///
    /// Any balance already held there is carried over; nonce, code and
    /// storage start empty.
    fn create_account(&mut self, address: Address) -> StateResult<Account> {
        let previous = self.account(&address)?;
        if previous.is_some() {
            self.delete_account(&address)?;
        }
        let account = Account::with_balance(previous.map(|a| a.balance).unwrap_or_default());
        self.put_account(address, account.clone())?;
        Ok(account)
    }

    /// Account balance
    fn get_balance(&self, address: &Address) -> StateResult<U256> {
        Ok(self.get_account(address)?.balance)
    }

    /// Credit `amount`, creating the account if needed
    fn add_balance(&mut self, address: &Address, amount: U256) -> StateResult<U256> {
        let mut account = self.get_account(address)?;
        account.balance = account.balance.saturating_add(amount);
        let balance = account.balance;
        self.put_account(*address, account)?;
        Ok(balance)
    }

    /// Debit `amount`; fails without writing if the balance is too low
    fn sub_balance(&mut self, address: &Address, amount: U256) -> StateResult<U256> {
        let mut account = self.get_account(address)?;
        if account.balance < amount {
            return Err(StateError::InsufficientBalance {
                address: *address,
                required: amount,
                available: account.balance,
            });
        }
        account.balance -= amount;
        let balance = account.balance;
        self.put_account(*address, account)?;
        Ok(balance)
    }

    /// Move `value` from one account to another
    fn transfer(&mut self, from: &Address, to: &Address, value: U256) -> StateResult<()> {
        self.sub_balance(from, value)?;
        self.add_balance(to, value)?;
        Ok(())
    }

    /// Account nonce
    fn get_nonce(&self, address: &Address) -> StateResult<u64> {
        Ok(self.get_account(address)?.nonce)
    }

    /// Overwrite the nonce
    fn set_nonce(&mut self, address: &Address, nonce: u64) -> StateResult<()> {
        let mut account = self.get_account(address)?;
        account.nonce = nonce;
        self.put_account(*address, account)
    }

    /// Increment the nonce, returning the new value
    fn increase_nonce(&mut self, address: &Address) -> StateResult<u64> {
        let mut account = self.get_account(address)?;
        account.nonce = account
            .nonce
            .checked_add(1)
            .ok_or(StateError::NonceOverflow(*address))?;
        let nonce = account.nonce;
        self.put_account(*address, account)?;
        Ok(nonce)
    }

    /// Storage value for `key`
    fn get_storage_value(&self, address: &Address, key: &H256) -> StateResult<H256> {
        self.storage(address, key)
    }

    /// Write a storage slot, creating the account if needed
    fn add_storage_row(&mut self, address: &Address, key: H256, value: H256) -> StateResult<()> {
        if !self.is_exist(address)? {
            self.put_account(*address, Account::new())?;
        }
        self.put_storage(*address, key, value)
    }

    /// Code hash, [`EMPTY_CODE_HASH`] for accounts without code
    fn get_code_hash(&self, address: &Address) -> StateResult<H256> {
        Ok(self.get_account(address)?.code_hash)
    }

    /// Contract code, empty for accounts without code
    fn get_code(&self, address: &Address) -> StateResult<Vec<u8>> {
        let code_hash = self.get_code_hash(address)?;
        if code_hash == EMPTY_CODE_HASH {
            return Ok(Vec::new());
        }
        self.code(&code_hash)?.ok_or(StateError::MissingCode(code_hash))
    }

    /// Attach code to an account
    fn save_code(&mut self, address: &Address, code: Vec<u8>) -> StateResult<()> {
        let code_hash = keccak256(&code);
        let mut account = self.get_account(address)?;
        account.code_hash = code_hash;
        if !code.is_empty() {
            self.put_code(code_hash, code)?;
        }
        self.put_account(*address, account)
    }

    /// Remove an account (self-destruct)
    fn delete(&mut self, address: &Address) -> StateResult<()> {
        self.delete_account(address)
    }
}

impl<'r> dyn Repository + 'r {
    /// Open a copy-on-write child snapshot over this repository
    pub fn start_tracking(&mut self) -> Tracked<'_> {
        Tracked::new(self)
    }
}
