//! Block executor

use strata_evm::{BlockContext, ProtocolSchedule};
use strata_primitives::H256;
use strata_state::{StateDb, Tracked};
use strata_trie::Trie;
use strata_types::{Block, BlockHeader, Bloom, Receipt};

use crate::error::{ExecutionError, ExecutionResult};
use crate::executor::TransactionExecutor;

/// Block execution result
#[derive(Debug, Clone)]
pub struct BlockExecutionResult {
    /// Transaction receipts
    pub receipts: Vec<Receipt>,
    /// State root after execution
    pub state_root: H256,
    /// Receipts trie root
    pub receipts_root: H256,
    /// Total gas used in block
    pub gas_used: u64,
    /// Logs bloom filter
    pub logs_bloom: Bloom,
}

impl BlockExecutionResult {
    /// Copy the computed roots, gas and bloom into `header`
    pub fn seal(&self, header: &mut BlockHeader) {
        header.state_root = self.state_root;
        header.receipts_root = self.receipts_root;
        header.gas_used = self.gas_used;
        header.logs_bloom = self.logs_bloom.clone();
    }
}

/// Applies whole blocks under the protocol schedule
pub struct BlockExecutor<'c> {
    schedule: &'c ProtocolSchedule,
    chain_id: u64,
    recent_hashes: Vec<H256>,
}

impl<'c> BlockExecutor<'c> {
    /// Create new block executor
    pub fn new(schedule: &'c ProtocolSchedule, chain_id: u64) -> Self {
        Self {
            schedule,
            chain_id,
            recent_hashes: Vec::new(),
        }
    }

    /// Hashes of preceding blocks for BLOCKHASH, parent first
    pub fn with_recent_hashes(mut self, recent_hashes: Vec<H256>) -> Self {
        self.recent_hashes = recent_hashes;
        self
    }

    /// Chain ID
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn block_context(&self, header: &BlockHeader) -> BlockContext {
        BlockContext {
            number: header.number,
            timestamp: header.timestamp,
            gas_limit: header.gas_limit,
            coinbase: header.coinbase,
            difficulty: header.difficulty,
            chain_id: self.chain_id,
            recent_hashes: self.recent_hashes.clone(),
        }
    }

    /// Execute a block on top of `state`.
    ///
    /// Either every transaction applies and `state` advances, or the block
    /// is rejected and `state` is left as it was.
    pub fn execute_block(
        &self,
        state: &mut StateDb,
        block: &Block,
    ) -> ExecutionResult<BlockExecutionResult> {
        let number = block.number();
        let policy = self.schedule.policy_for(number);
        let block_ctx = self.block_context(&block.header);

        let mut receipts = Vec::with_capacity(block.tx_count());
        let mut cumulative_gas = 0u64;
        let mut pending = Tracked::new(state);

        for (index, tx) in block.transactions.iter().enumerate() {
            let result = TransactionExecutor::new(&mut pending, tx, &policy, &block_ctx)
                .with_block_gas_used(cumulative_gas)
                .run()
                .map_err(|error| {
                    tracing::warn!(number, index, %error, "transaction rejected");
                    ExecutionError::BlockRejected {
                        number,
                        index,
                        source: Box::new(error),
                    }
                })?;
            let receipt = result.receipt(cumulative_gas);
            cumulative_gas = receipt.cumulative_gas_used;
            receipts.push(receipt);
        }
        pending.commit()?;

        let state_root = state.root_hash();
        let receipts_root = receipts_root(&receipts);
        let logs_bloom = calculate_logs_bloom(&receipts);

        tracing::info!(
            number,
            txs = receipts.len(),
            gas_used = cumulative_gas,
            %state_root,
            "block executed"
        );

        Ok(BlockExecutionResult {
            receipts,
            state_root,
            receipts_root,
            gas_used: cumulative_gas,
            logs_bloom,
        })
    }
}

/// Root of the trie keyed by `rlp(index)` holding each receipt's encoding
pub fn receipts_root(receipts: &[Receipt]) -> H256 {
    let mut trie = Trie::new();
    for (index, receipt) in receipts.iter().enumerate() {
        trie.insert(&rlp::encode(&(index as u64)), receipt.rlp_bytes());
    }
    trie.root_hash()
}

fn calculate_logs_bloom(receipts: &[Receipt]) -> Bloom {
    let mut bloom = Bloom::default();
    for receipt in receipts {
        bloom.accrue_bloom(&receipt.logs_bloom);
    }
    bloom
}
