//! Chain head and block application

use std::collections::VecDeque;

use parking_lot::{Mutex, RwLock};
use strata_primitives::H256;
use strata_state::StateDb;
use strata_types::{Block, BlockHeader};

use crate::block::{BlockExecutionResult, BlockExecutor};
use crate::config::ChainConfig;
use crate::error::{ExecutionError, ExecutionResult};

/// Number of ancestors visible to BLOCKHASH
const RECENT_HASHES: usize = 256;

struct ChainHead {
    state: StateDb,
    header: BlockHeader,
    /// Hash of the head first
    recent_hashes: VecDeque<H256>,
}

/// Committed chain head shared between one writer and many readers.
///
/// Readers get clones of the committed state, which share trie nodes with
/// the head and never observe a half-applied block.
pub struct ChainState {
    config: ChainConfig,
    head: RwLock<ChainHead>,
    writer: Mutex<()>,
}

impl ChainState {
    /// Start a chain from the configured genesis
    pub fn from_genesis(config: ChainConfig) -> ExecutionResult<Self> {
        config.validate()?;
        let state = config.genesis.build_state()?;
        let header = config.genesis.header(state.root_hash());
        let genesis_hash = header.hash();
        tracing::info!(chain_id = config.chain_id, %genesis_hash, "chain initialized");

        Ok(Self {
            config,
            head: RwLock::new(ChainHead {
                state,
                header,
                recent_hashes: VecDeque::from([genesis_hash]),
            }),
            writer: Mutex::new(()),
        })
    }

    /// Chain configuration
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Snapshot of the committed head state
    pub fn head_state(&self) -> StateDb {
        self.head.read().state.clone()
    }

    /// Header of the head block
    pub fn head_header(&self) -> BlockHeader {
        self.head.read().header.clone()
    }

    /// Head block number
    pub fn head_number(&self) -> u64 {
        self.head.read().header.number
    }

    /// Execute `block` on top of the head and make it the new head.
    ///
    /// The block's roots, gas used and bloom are replaced by the computed
    /// values. Execution runs on a dedicated thread sized by
    /// `execution_stack_size`; readers keep seeing the previous head until
    /// the block is fully applied.
    pub fn apply_block(&self, block: &Block) -> ExecutionResult<BlockExecutionResult> {
        let _writer = self.writer.lock();

        let (mut state, parent, recent_hashes) = {
            let head = self.head.read();
            (
                head.state.clone(),
                head.header.clone(),
                head.recent_hashes.iter().copied().collect::<Vec<_>>(),
            )
        };
        let parent_hash = parent.hash();
        let number = block.number();
        if block.header.parent_hash != parent_hash || number != parent.number + 1 {
            return Err(ExecutionError::NotChild {
                number,
                head: parent.number,
                head_hash: parent_hash,
            });
        }

        let executor = BlockExecutor::new(&self.config.forks, self.config.chain_id)
            .with_recent_hashes(recent_hashes);
        let result = std::thread::scope(|scope| -> ExecutionResult<BlockExecutionResult> {
            let handle = std::thread::Builder::new()
                .name(format!("strata-block-{number}"))
                .stack_size(self.config.execution_stack_size)
                .spawn_scoped(scope, || executor.execute_block(&mut state, block))
                .map_err(|e| ExecutionError::Internal(format!("cannot spawn executor: {e}")))?;
            handle
                .join()
                .map_err(|_| ExecutionError::Internal("block execution panicked".into()))?
        })?;

        let mut header = block.header.clone();
        result.seal(&mut header);
        let hash = header.hash();

        let mut head = self.head.write();
        head.state = state;
        head.header = header;
        head.recent_hashes.push_front(hash);
        head.recent_hashes.truncate(RECENT_HASHES);
        tracing::info!(number, %hash, "head advanced");

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenesisAccount;
    use strata_evm::{ProtocolSchedule, Upgrade};
    use strata_primitives::{Address, U256};
    use strata_state::Repository;

    fn config() -> ChainConfig {
        let mut config = ChainConfig {
            forks: ProtocolSchedule::fixed(Upgrade::Istanbul),
            execution_stack_size: 16 * 1024 * 1024,
            ..Default::default()
        };
        config.genesis.alloc.insert(
            Address::from_low_u64_be(0xaa),
            GenesisAccount::with_balance(U256::from(1_000u64)),
        );
        config
    }

    fn child_of(chain: &ChainState) -> Block {
        let parent = chain.head_header();
        let header = BlockHeader {
            parent_hash: parent.hash(),
            number: parent.number + 1,
            gas_limit: parent.gas_limit,
            timestamp: parent.timestamp + 12,
            ..Default::default()
        };
        Block::new(header, vec![])
    }

    #[test]
    fn test_genesis_head() {
        let chain = ChainState::from_genesis(config()).unwrap();
        let header = chain.head_header();

        assert!(header.is_genesis());
        assert_eq!(header.state_root, chain.head_state().root_hash());
        assert_eq!(
            chain
                .head_state()
                .get_balance(&Address::from_low_u64_be(0xaa))
                .unwrap(),
            U256::from(1_000u64)
        );
    }

    #[test]
    fn test_apply_empty_block() {
        let chain = ChainState::from_genesis(config()).unwrap();
        let genesis_root = chain.head_header().state_root;

        let result = chain.apply_block(&child_of(&chain)).unwrap();

        assert_eq!(result.state_root, genesis_root);
        assert_eq!(chain.head_number(), 1);
        assert_eq!(chain.head_header().state_root, genesis_root);
    }

    #[test]
    fn test_rejects_non_child() {
        let chain = ChainState::from_genesis(config()).unwrap();
        let mut block = child_of(&chain);
        block.header.number = 5;

        let err = chain.apply_block(&block).unwrap_err();
        assert!(matches!(err, ExecutionError::NotChild { number: 5, head: 0, .. }));
        assert_eq!(chain.head_number(), 0);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let chain = ChainState::from_genesis(config()).unwrap();
        let mut before = chain.head_state();
        before
            .add_balance(&Address::from_low_u64_be(0xbb), U256::one())
            .unwrap();

        chain.apply_block(&child_of(&chain)).unwrap();
        assert_eq!(
            chain
                .head_state()
                .get_balance(&Address::from_low_u64_be(0xbb))
                .unwrap(),
            U256::zero()
        );
    }
}
