//! Account record

use crate::error::{StateError, StateResult};
use rlp::{Rlp, RlpStream};
use strata_primitives::{H256, U256};

/// Empty code hash (keccak256 of empty bytes)
pub const EMPTY_CODE_HASH: H256 = strata_crypto::KECCAK_EMPTY;

/// Empty storage root (root of an empty trie)
pub const EMPTY_STORAGE_ROOT: H256 = strata_trie::EMPTY_ROOT;

/// Account data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    /// Account nonce
    pub nonce: u64,
    /// Account balance
    pub balance: U256,
    /// Code hash (keccak256 of code, or EMPTY_CODE_HASH if no code)
    pub code_hash: H256,
    /// Storage root (merkle root of storage trie)
    pub storage_root: H256,
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

impl Account {
    /// Create a new empty account
    pub fn new() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            code_hash: EMPTY_CODE_HASH,
            storage_root: EMPTY_STORAGE_ROOT,
        }
    }

    /// Account with only a balance
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Self::new()
        }
    }

    /// Check if account is empty (EIP-161)
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == EMPTY_CODE_HASH
    }

    /// Check if account has code
    pub fn has_code(&self) -> bool {
        self.code_hash != EMPTY_CODE_HASH
    }

    /// RLP encoding `[nonce, balance, storage_root, code_hash]`
    pub fn rlp_bytes(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(4);
        stream.append(&self.nonce);
        stream.append(&self.balance);
        stream.append(&self.storage_root);
        stream.append(&self.code_hash);
        stream.out().to_vec()
    }

    /// Decode the RLP produced by [`Account::rlp_bytes`]
    pub fn from_rlp(bytes: &[u8]) -> StateResult<Self> {
        let decode = || -> Result<Self, rlp::DecoderError> {
            let rlp = Rlp::new(bytes);
            if rlp.item_count()? != 4 {
                return Err(rlp::DecoderError::RlpIncorrectListLen);
            }
            Ok(Self {
                nonce: rlp.val_at(0)?,
                balance: rlp.val_at(1)?,
                storage_root: rlp.val_at(2)?,
                code_hash: rlp.val_at(3)?,
            })
        };
        decode().map_err(|e| StateError::Deserialization(e.to_string()))
    }
}
