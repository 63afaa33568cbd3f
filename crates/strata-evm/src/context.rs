//! Execution context: block, transaction and message

use strata_primitives::{Address, H256, U256};

/// How a frame was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// CALL or a transaction to an address
    Call,
    /// CALLCODE
    CallCode,
    /// DELEGATECALL
    DelegateCall,
    /// STATICCALL
    StaticCall,
    /// CREATE or a creation transaction
    Create,
    /// CREATE2
    Create2,
}

impl CallKind {
    /// Check if the frame runs init code
    pub fn is_create(self) -> bool {
        matches!(self, CallKind::Create | CallKind::Create2)
    }
}

/// Input of one frame
#[derive(Clone, Debug)]
pub struct Message {
    /// Entry kind
    pub kind: CallKind,
    /// Account whose storage and balance the frame uses
    pub address: Address,
    /// Account whose code runs
    pub code_address: Address,
    /// CALLER as seen by the frame
    pub caller: Address,
    /// CALLVALUE as seen by the frame
    pub value: U256,
    /// Whether `value` moves from `caller` to `address`
    pub transfers_value: bool,
    /// Call data, or init code for creates
    pub data: Vec<u8>,
    /// Gas available to the frame
    pub gas: u64,
    /// Writes are forbidden
    pub is_static: bool,
    /// Call depth (0 for the transaction's frame)
    pub depth: usize,
}

impl Message {
    /// Top-level call
    pub fn call(caller: Address, to: Address, value: U256, data: Vec<u8>, gas: u64) -> Self {
        Self {
            kind: CallKind::Call,
            address: to,
            code_address: to,
            caller,
            value,
            transfers_value: true,
            data,
            gas,
            is_static: false,
            depth: 0,
        }
    }

    /// Top-level create of `address`
    pub fn create(
        caller: Address,
        address: Address,
        value: U256,
        init_code: Vec<u8>,
        gas: u64,
    ) -> Self {
        Self {
            kind: CallKind::Create,
            address,
            code_address: address,
            caller,
            value,
            transfers_value: true,
            data: init_code,
            gas,
            is_static: false,
            depth: 0,
        }
    }
}

/// Block environment
#[derive(Clone, Debug)]
pub struct BlockContext {
    /// Block number
    pub number: u64,
    /// Block timestamp
    pub timestamp: u64,
    /// Block gas limit
    pub gas_limit: u64,
    /// Block beneficiary
    pub coinbase: Address,
    /// Block difficulty
    pub difficulty: U256,
    /// Chain id for CHAINID
    pub chain_id: u64,
    /// Hashes of preceding blocks, most recent (parent) first
    pub recent_hashes: Vec<H256>,
}

impl Default for BlockContext {
    fn default() -> Self {
        Self {
            number: 0,
            timestamp: 0,
            gas_limit: 30_000_000,
            coinbase: Address::ZERO,
            difficulty: U256::zero(),
            chain_id: 1,
            recent_hashes: Vec::new(),
        }
    }
}

impl BlockContext {
    /// Hash of block `number`, zero outside the 256 most recent blocks
    pub fn block_hash(&self, number: u64) -> H256 {
        if number >= self.number || self.number - number > 256 {
            return H256::ZERO;
        }
        let index = (self.number - 1 - number) as usize;
        self.recent_hashes.get(index).copied().unwrap_or(H256::ZERO)
    }
}

/// Transaction environment
#[derive(Clone, Debug, Default)]
pub struct TxContext {
    /// Transaction origin (original sender)
    pub origin: Address,
    /// Gas price
    pub gas_price: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_hash_window() {
        let block = BlockContext {
            number: 300,
            recent_hashes: (0..256u64).map(|i| H256::from_low_u64_be(299 - i)).collect(),
            ..Default::default()
        };
        assert_eq!(block.block_hash(299), H256::from_low_u64_be(299));
        assert_eq!(block.block_hash(44), H256::from_low_u64_be(44));
        assert_eq!(block.block_hash(43), H256::ZERO);
        assert_eq!(block.block_hash(300), H256::ZERO);
        assert_eq!(block.block_hash(1000), H256::ZERO);
    }

    #[test]
    fn test_block_hash_missing_history() {
        let block = BlockContext {
            number: 5,
            ..Default::default()
        };
        assert_eq!(block.block_hash(4), H256::ZERO);
    }

    #[test]
    fn test_message_constructors() {
        let from = Address::from_low_u64_be(1);
        let to = Address::from_low_u64_be(2);
        let call = Message::call(from, to, U256::from(5u64), vec![1], 1000);
        assert_eq!(call.kind, CallKind::Call);
        assert_eq!(call.code_address, to);
        assert!(!call.kind.is_create());

        let create = Message::create(from, to, U256::zero(), vec![0x00], 1000);
        assert!(create.kind.is_create());
        assert_eq!(create.depth, 0);
    }
}
