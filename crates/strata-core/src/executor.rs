//! Transaction executor

use std::collections::BTreeSet;

use strata_evm::{
    create_address, BlockContext, Evm, ExitStatus, FrameResult, Message, ResourcePolicy, Tracer,
    TxContext,
};
use strata_primitives::{Address, U256};
use strata_state::{Repository, Tracked};
use strata_types::{Log, Receipt, Transaction, TxStatus};

use crate::error::{ExecutionError, ExecutionResult, ValidationError};

/// Lifecycle of a [`TransactionExecutor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not validated yet
    Init,
    /// Validated, waiting for the up-front charge
    Validated,
    /// Charged and ready to run
    Executing,
    /// Top frame finished, waiting for settlement
    Completed,
    /// Settled and committed
    Finalized,
}

/// Outcome of one transaction
#[derive(Debug)]
pub struct TransactionResult {
    /// How the top frame ended
    pub status: ExitStatus,
    /// Gas charged to the sender after the refund
    pub gas_used: u64,
    /// Gas refunded from the refund counter
    pub gas_refunded: u64,
    /// Return data, or the revert reason
    pub output: Vec<u8>,
    /// Logs in emission order; empty unless successful
    pub logs: Vec<Log>,
    /// Contract created by a creation transaction
    pub created_address: Option<Address>,
    /// Accounts the transaction wrote, deleted or pruned
    pub changed_addresses: BTreeSet<Address>,
}

impl TransactionResult {
    /// Check if the top frame halted normally
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Receipt given the block's gas used before this transaction
    pub fn receipt(&self, cumulative_before: u64) -> Receipt {
        let receipt = Receipt::new(
            TxStatus::from(self.is_success()),
            cumulative_before + self.gas_used,
            self.gas_used,
            self.logs.clone(),
        );
        match self.created_address {
            Some(address) => receipt.with_contract_address(address),
            None => receipt,
        }
    }
}

/// Drives one transaction through `init`, `execute`, `go` and `finalization`.
///
/// All writes land in a transaction-boundary snapshot of the repository
/// passed to [`TransactionExecutor::new`]; nothing reaches it before
/// `finalization` commits.
pub struct TransactionExecutor<'a> {
    tx: &'a Transaction,
    policy: &'a ResourcePolicy,
    block: &'a BlockContext,
    repo: Tracked<'a>,
    tracer: Option<&'a mut dyn Tracer>,
    phase: Phase,
    explicit_sender: Option<Address>,
    sender: Address,
    block_gas_used: u64,
    intrinsic_gas: u64,
    message: Option<Message>,
    frame: Option<FrameResult>,
}

impl<'a> TransactionExecutor<'a> {
    /// Create an executor over `repo`
    pub fn new(
        repo: &'a mut dyn Repository,
        tx: &'a Transaction,
        policy: &'a ResourcePolicy,
        block: &'a BlockContext,
    ) -> Self {
        Self {
            tx,
            policy,
            block,
            repo: Tracked::transaction(repo),
            tracer: None,
            phase: Phase::Init,
            explicit_sender: None,
            sender: Address::ZERO,
            block_gas_used: 0,
            intrinsic_gas: 0,
            message: None,
            frame: None,
        }
    }

    /// Use `sender` instead of recovering it from the signature
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.explicit_sender = Some(sender);
        self
    }

    /// Gas already used by earlier transactions of the block
    pub fn with_block_gas_used(mut self, gas_used: u64) -> Self {
        self.block_gas_used = gas_used;
        self
    }

    /// Attach an execution tracer
    pub fn with_tracer(mut self, tracer: &'a mut dyn Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Sender, known once `init` succeeded
    pub fn sender(&self) -> Option<Address> {
        match self.phase {
            Phase::Init => None,
            _ => Some(self.sender),
        }
    }

    fn expect_phase(&self, expected: Phase) -> ExecutionResult<()> {
        if self.phase != expected {
            return Err(ExecutionError::Phase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn recover_sender(&self) -> Result<Address, ValidationError> {
        if let Some(sender) = self.explicit_sender {
            return Ok(sender);
        }
        let signature = self
            .tx
            .signature
            .as_ref()
            .ok_or(ValidationError::MissingSignature)?;
        if self.policy.rules.reject_high_s && !signature.to_signature()?.is_low_s() {
            return Err(ValidationError::HighS);
        }
        Ok(self.tx.recover_sender()?)
    }

    fn up_front_cost(&self) -> Result<(U256, U256), ValidationError> {
        let gas_cost = U256::from(self.tx.gas_limit)
            .checked_mul(self.tx.gas_price)
            .ok_or(ValidationError::CostOverflow)?;
        let total = gas_cost
            .checked_add(self.tx.value)
            .ok_or(ValidationError::CostOverflow)?;
        Ok((gas_cost, total))
    }

    /// Validate the transaction against the current state.
    ///
    /// Nothing is written; a failure leaves the repository untouched.
    pub fn init(&mut self) -> ExecutionResult<()> {
        self.expect_phase(Phase::Init)?;
        let tx = self.tx;

        if let Some(chain_id) = tx.chain_id {
            if !self.policy.rules.replay_protection {
                return Err(ValidationError::ReplayProtectionInactive.into());
            }
            if chain_id != self.block.chain_id {
                return Err(ValidationError::ChainIdMismatch {
                    expected: self.block.chain_id,
                    got: chain_id,
                }
                .into());
            }
        }
        let sender = self.recover_sender()?;

        let account = self.repo.get_account(&sender)?;
        if tx.nonce != account.nonce {
            return Err(ValidationError::NonceMismatch {
                expected: account.nonce,
                got: tx.nonce,
            }
            .into());
        }
        if account.nonce == u64::MAX {
            return Err(ValidationError::NonceOverflow.into());
        }

        let intrinsic = self
            .policy
            .intrinsic_gas(&tx.data, tx.is_contract_creation());
        if tx.gas_limit < intrinsic {
            return Err(ValidationError::IntrinsicGas {
                required: intrinsic,
                limit: tx.gas_limit,
            }
            .into());
        }

        let remaining = self.block.gas_limit.saturating_sub(self.block_gas_used);
        if tx.gas_limit > remaining {
            return Err(ValidationError::BlockGasExceeded {
                requested: tx.gas_limit,
                remaining,
            }
            .into());
        }

        let (_, total) = self.up_front_cost()?;
        if account.balance < total {
            return Err(ValidationError::InsufficientBalance {
                required: total,
                available: account.balance,
            }
            .into());
        }

        tracing::debug!(%sender, nonce = tx.nonce, gas_limit = tx.gas_limit, "transaction validated");
        self.sender = sender;
        self.intrinsic_gas = intrinsic;
        self.phase = Phase::Validated;
        Ok(())
    }

    /// Charge the up-front gas cost, bump the nonce and prepare the top frame
    pub fn execute(&mut self) -> ExecutionResult<()> {
        self.expect_phase(Phase::Validated)?;
        let tx = self.tx;
        let sender = self.sender;

        let (gas_cost, _) = self.up_front_cost()?;
        self.repo.sub_balance(&sender, gas_cost)?;
        let nonce = self.repo.get_nonce(&sender)?;
        self.repo.increase_nonce(&sender)?;

        let gas = tx.gas_limit - self.intrinsic_gas;
        let message = match tx.to {
            Some(to) => Message::call(sender, to, tx.value, tx.data.to_vec(), gas),
            None => Message::create(
                sender,
                create_address(&sender, nonce),
                tx.value,
                tx.data.to_vec(),
                gas,
            ),
        };
        tracing::debug!(kind = ?message.kind, to = %message.address, gas, "transaction charged");

        self.message = Some(message);
        self.phase = Phase::Executing;
        Ok(())
    }

    /// Run the top frame to completion.
    ///
    /// Reverts and exceptions are outcomes; only fatal errors return `Err`.
    pub fn go(&mut self) -> ExecutionResult<()> {
        self.expect_phase(Phase::Executing)?;
        let message = self
            .message
            .take()
            .ok_or_else(|| ExecutionError::Internal("top frame was not prepared".into()))?;

        let tx_context = TxContext {
            origin: self.sender,
            gas_price: self.tx.gas_price,
        };
        let mut evm = Evm::new(self.policy, self.block, &tx_context);
        if let Some(tracer) = self.tracer.as_deref_mut() {
            evm = evm.with_tracer(tracer);
        }
        let frame = evm.execute(&mut self.repo, message)?;

        tracing::debug!(status = ?frame.status, gas_left = frame.gas_left, "top frame finished");
        self.frame = Some(frame);
        self.phase = Phase::Completed;
        Ok(())
    }

    /// Settle gas, apply deletions, prune touched empty accounts and commit
    pub fn finalization(mut self) -> ExecutionResult<TransactionResult> {
        self.expect_phase(Phase::Completed)?;
        let frame = self
            .frame
            .take()
            .ok_or_else(|| ExecutionError::Internal("top frame result missing".into()))?;
        let gas = &self.policy.gas;
        let gas_limit = self.tx.gas_limit;
        let success = frame.is_success();

        let used = gas_limit - frame.gas_left;
        let refund_counter = if success {
            let selfdestructs = frame.substate.selfdestructs.len() as i64;
            frame.substate.refund + selfdestructs * gas.selfdestruct_refund as i64
        } else {
            0
        };
        let refund = (refund_counter.max(0) as u64).min(used / 2);
        let gas_used = used - refund;

        let price = self.tx.gas_price;
        let sender = self.sender;
        let coinbase = self.block.coinbase;
        self.repo
            .add_balance(&sender, U256::from(frame.gas_left + refund) * price)?;
        self.repo.add_balance(&coinbase, U256::from(gas_used) * price)?;

        let FrameResult {
            status,
            output,
            substate,
            created,
            ..
        } = frame;

        for address in &substate.selfdestructs {
            tracing::debug!(%address, "removing self-destructed account");
            self.repo.delete(address)?;
        }

        if self.policy.rules.state_clearing {
            let mut touched = substate.touched;
            touched.insert(coinbase);
            for address in &touched {
                if self.repo.is_exist(address)? && self.repo.is_empty(address)? {
                    tracing::debug!(%address, "pruning empty account");
                    self.repo.delete(address)?;
                }
            }
        }

        let changed_addresses = self.repo.changes().changed_addresses();
        self.repo.commit()?;

        tracing::debug!(%sender, gas_used, refund, success, "transaction finalized");
        Ok(TransactionResult {
            status,
            gas_used,
            gas_refunded: refund,
            output,
            logs: substate.logs,
            created_address: if success { created } else { None },
            changed_addresses,
        })
    }

    /// Run every phase.
    ///
    /// After a fatal error the up-front charge and nonce increment are
    /// committed and the error is returned.
    pub fn run(mut self) -> ExecutionResult<TransactionResult> {
        self.init()?;
        self.execute()?;
        if let Err(error) = self.go() {
            tracing::warn!(%error, sender = %self.sender, "fatal error during execution");
            self.repo.commit()?;
            return Err(error);
        }
        self.finalization()
    }
}
