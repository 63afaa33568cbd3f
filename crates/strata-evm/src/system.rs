//! Frame creation: calls, creates and self-destruct

use rlp::RlpStream;
use strata_crypto::keccak256;
use strata_primitives::{Address, H256, U256};
use strata_state::{Repository, Tracked};

use crate::context::{CallKind, Message};
use crate::error::{EvmError, EvmResult, ExitStatus, FrameResult};
use crate::gas::cost::MAX_CALL_DEPTH;
use crate::interpreter::{Evm, Frame};
use crate::opcode::Opcode;
use crate::precompiles::Precompile;
use crate::substate::Substate;
use crate::word::Word;

/// Native stack that must remain before entering a nested frame
#[cfg(debug_assertions)]
const STACK_RED_ZONE: usize = 1024 * 1024;
#[cfg(not(debug_assertions))]
const STACK_RED_ZONE: usize = 256 * 1024;

/// Size of each stack segment allocated once the red zone is reached
const STACK_SEGMENT_SIZE: usize = 16 * 1024 * 1024;

/// Address of a contract created by `sender` at `nonce`
pub fn create_address(sender: &Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(sender);
    stream.append(&nonce);
    Address::from_word(keccak256(&stream.out()).as_bytes())
}

/// Address of a contract created through CREATE2
pub fn create2_address(sender: &Address, salt: &H256, init_code: &[u8]) -> Address {
    let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
    preimage.push(0xff);
    preimage.extend_from_slice(sender.as_bytes());
    preimage.extend_from_slice(salt.as_bytes());
    preimage.extend_from_slice(keccak256(init_code).as_bytes());
    Address::from_word(keccak256(&preimage).as_bytes())
}

impl<'a> Evm<'a> {
    /// Execute a message as a call or create, depending on its kind
    pub fn execute(&mut self, repo: &mut dyn Repository, msg: Message) -> EvmResult<FrameResult> {
        if msg.kind.is_create() {
            self.create(repo, msg)
        } else {
            self.call(repo, msg)
        }
    }

    /// Run the code at `msg.code_address` in a fresh snapshot of `repo`.
    ///
    /// The snapshot is committed only when the frame halts normally. Nested
    /// frames move to a fresh stack segment when the native stack runs low,
    /// so the depth limit is reachable from any thread.
    pub fn call(&mut self, repo: &mut dyn Repository, msg: Message) -> EvmResult<FrameResult> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT_SIZE, || {
            self.call_frame(repo, msg)
        })
    }

    /// Run init code and deploy its output at `msg.address`
    pub fn create(&mut self, repo: &mut dyn Repository, msg: Message) -> EvmResult<FrameResult> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT_SIZE, || {
            self.create_frame(repo, msg)
        })
    }

    fn call_frame(&mut self, repo: &mut dyn Repository, msg: Message) -> EvmResult<FrameResult> {
        tracing::debug!(
            depth = msg.depth,
            kind = ?msg.kind,
            to = %msg.address,
            gas = msg.gas,
            "entering call frame"
        );

        let mut snapshot = Tracked::new(repo);
        let mut substate = Substate::new();
        if msg.transfers_value {
            snapshot.transfer(&msg.caller, &msg.address, msg.value)?;
            substate.touch(msg.address);
        }

        if let Some(precompile) = Precompile::from_address(&msg.code_address) {
            let cost = precompile.cost(&msg.data);
            if cost > msg.gas {
                tracing::debug!(depth = msg.depth, ?precompile, "precompile out of gas");
                return Ok(FrameResult::exception(EvmError::OutOfGas));
            }
            let output = precompile.execute(&msg.data);
            snapshot.commit()?;
            return Ok(FrameResult::halted(msg.gas - cost, output, substate));
        }

        let code = snapshot.get_code(&msg.code_address)?;
        if code.is_empty() {
            snapshot.commit()?;
            return Ok(FrameResult::halted(msg.gas, Vec::new(), substate));
        }

        let depth = msg.depth;
        let mut frame = Frame::for_call(msg, code, substate);
        let status = self.run(&mut snapshot, &mut frame)?;
        tracing::debug!(depth, ?status, gas_left = frame.gas, "leaving call frame");

        match status {
            ExitStatus::Halted => {
                snapshot.commit()?;
                Ok(FrameResult::halted(frame.gas, frame.output, frame.substate))
            }
            ExitStatus::Reverted => Ok(FrameResult::reverted(frame.gas, frame.output)),
            ExitStatus::Exception(error) => Ok(FrameResult::exception(error)),
        }
    }

    fn create_frame(&mut self, repo: &mut dyn Repository, msg: Message) -> EvmResult<FrameResult> {
        let address = msg.address;
        tracing::debug!(
            depth = msg.depth,
            %address,
            gas = msg.gas,
            init_len = msg.data.len(),
            "entering create frame"
        );

        let mut snapshot = Tracked::new(repo);
        let existing = snapshot.get_account(&address)?;
        if existing.nonce != 0 || existing.has_code() {
            return Ok(FrameResult::exception(EvmError::CreateCollision(address)));
        }

        snapshot.create_account(address)?;
        if self.policy.rules.state_clearing {
            snapshot.set_nonce(&address, 1)?;
        }
        snapshot.transfer(&msg.caller, &address, msg.value)?;
        let mut substate = Substate::new();
        substate.touch(address);

        let depth = msg.depth;
        let mut frame = Frame::for_create(msg, substate);
        let status = self.run(&mut snapshot, &mut frame)?;
        tracing::debug!(depth, ?status, gas_left = frame.gas, "leaving create frame");

        match status {
            ExitStatus::Halted => {}
            ExitStatus::Reverted => return Ok(FrameResult::reverted(frame.gas, frame.output)),
            ExitStatus::Exception(error) => return Ok(FrameResult::exception(error)),
        }

        let code = std::mem::take(&mut frame.output);
        if let Some(limit) = self.policy.rules.max_code_size {
            if code.len() > limit {
                return Ok(FrameResult::exception(EvmError::MaxCodeSizeExceeded(code.len())));
            }
        }

        let deposit = self.policy.gas.deposit_cost(code.len());
        if frame.gas >= deposit {
            frame.gas -= deposit;
            snapshot.save_code(&address, code)?;
        } else if self.policy.rules.create_deposit_oog_fails {
            return Ok(FrameResult::exception(EvmError::OutOfGas));
        }

        snapshot.commit()?;
        let mut result = FrameResult::halted(frame.gas, Vec::new(), frame.substate);
        result.created = Some(address);
        Ok(result)
    }

    /// CALL, CALLCODE, DELEGATECALL and STATICCALL
    pub(crate) fn op_call(
        &mut self,
        repo: &mut dyn Repository,
        frame: &mut Frame,
        opcode: Opcode,
    ) -> EvmResult<()> {
        let requested = self.pop(frame)?;
        let to = self.pop(frame)?.to_address();
        let value = match opcode {
            Opcode::CALL | Opcode::CALLCODE => self.pop(frame)?.as_u256(),
            _ => U256::zero(),
        };
        let in_offset = self.pop(frame)?;
        let in_size = self.pop(frame)?;
        let out_offset = self.pop(frame)?;
        let out_size = self.pop(frame)?;

        if opcode == Opcode::CALL && frame.msg.is_static && !value.is_zero() {
            return Err(EvmError::StaticCallViolation);
        }

        let (in_offset, in_size) = self.memory_region(frame, in_offset, in_size)?;
        let (out_offset, out_size) = self.memory_region(frame, out_offset, out_size)?;

        let gas = &self.policy.gas;
        let mut extra = 0;
        if !value.is_zero() {
            extra += gas.call_value;
        }
        if opcode == Opcode::CALL {
            let new_account = if self.policy.rules.state_clearing {
                !value.is_zero() && repo.is_empty(&to)?
            } else {
                !repo.is_exist(&to)?
            };
            if new_account {
                extra += gas.new_account;
            }
        }
        frame.use_gas(extra)?;

        let mut child_gas = self.policy.call_gas(requested, frame.gas)?;
        frame.use_gas(child_gas)?;
        if !value.is_zero() {
            child_gas += gas.call_stipend;
        }

        if frame.msg.depth >= MAX_CALL_DEPTH
            || (!value.is_zero() && repo.get_balance(&frame.msg.address)? < value)
        {
            frame.gas += child_gas;
            frame.return_data.clear();
            return self.push(frame, Word::ZERO);
        }

        let (kind, address, caller, msg_value, transfers_value, is_static) = match opcode {
            Opcode::CALL => (CallKind::Call, to, frame.msg.address, value, true, frame.msg.is_static),
            Opcode::CALLCODE => (
                CallKind::CallCode,
                frame.msg.address,
                frame.msg.address,
                value,
                true,
                frame.msg.is_static,
            ),
            Opcode::DELEGATECALL => (
                CallKind::DelegateCall,
                frame.msg.address,
                frame.msg.caller,
                frame.msg.value,
                false,
                frame.msg.is_static,
            ),
            _ => (CallKind::StaticCall, to, frame.msg.address, U256::zero(), true, true),
        };
        let msg = Message {
            kind,
            address,
            code_address: to,
            caller,
            value: msg_value,
            transfers_value,
            data: frame.memory.read(in_offset, in_size),
            gas: child_gas,
            is_static,
            depth: frame.msg.depth + 1,
        };

        let result = self.call(repo, msg)?;
        frame.gas += result.gas_left;
        let copied = out_size.min(result.output.len());
        self.memory_write(frame, out_offset, &result.output[..copied]);

        let success = result.is_success();
        if success {
            frame.substate.merge(result.substate);
        }
        frame.return_data = result.output;
        self.push(frame, Word::from(success))
    }

    /// CREATE and CREATE2
    pub(crate) fn op_create(
        &mut self,
        repo: &mut dyn Repository,
        frame: &mut Frame,
        opcode: Opcode,
    ) -> EvmResult<()> {
        if frame.msg.is_static {
            return Err(EvmError::StaticCallViolation);
        }
        let value = self.pop(frame)?.as_u256();
        let offset = self.pop(frame)?;
        let size = self.pop(frame)?;
        let salt = match opcode {
            Opcode::CREATE2 => Some(self.pop(frame)?.to_h256()),
            _ => None,
        };

        let (offset, size) = self.memory_region(frame, offset, size)?;
        if salt.is_some() {
            frame.use_gas(self.policy.gas.hash_word_cost(size as u64))?;
        }
        let init_code = frame.memory.read(offset, size);
        frame.return_data.clear();

        let sender = frame.msg.address;
        let nonce = repo.get_nonce(&sender)?;
        if frame.msg.depth >= MAX_CALL_DEPTH
            || repo.get_balance(&sender)? < value
            || nonce == u64::MAX
        {
            return self.push(frame, Word::ZERO);
        }

        let address = match salt {
            Some(salt) => create2_address(&sender, &salt, &init_code),
            None => create_address(&sender, nonce),
        };
        repo.increase_nonce(&sender)?;

        let gas = self.policy.create_gas(frame.gas);
        frame.use_gas(gas)?;
        let msg = Message {
            kind: if salt.is_some() {
                CallKind::Create2
            } else {
                CallKind::Create
            },
            address,
            code_address: address,
            caller: sender,
            value,
            transfers_value: true,
            data: init_code,
            gas,
            is_static: false,
            depth: frame.msg.depth + 1,
        };

        let result = self.create(repo, msg)?;
        frame.gas += result.gas_left;
        match result.status {
            ExitStatus::Halted => {
                frame.substate.merge(result.substate);
                self.push(frame, Word::from(address))
            }
            ExitStatus::Reverted => {
                frame.return_data = result.output;
                self.push(frame, Word::ZERO)
            }
            ExitStatus::Exception(_) => self.push(frame, Word::ZERO),
        }
    }

    /// SELFDESTRUCT: credit the beneficiary, zero the balance, schedule deletion
    pub(crate) fn op_selfdestruct(
        &mut self,
        repo: &mut dyn Repository,
        frame: &mut Frame,
    ) -> EvmResult<()> {
        if frame.msg.is_static {
            return Err(EvmError::StaticCallViolation);
        }
        let beneficiary = self.pop(frame)?.to_address();
        let address = frame.msg.address;
        let balance = repo.get_balance(&address)?;

        let new_account = if self.policy.rules.state_clearing {
            !balance.is_zero() && repo.is_empty(&beneficiary)?
        } else {
            !repo.is_exist(&beneficiary)?
        };
        if new_account {
            frame.use_gas(self.policy.gas.selfdestruct_new_account)?;
        }

        repo.add_balance(&beneficiary, balance)?;
        let mut account = repo.get_account(&address)?;
        account.balance = U256::zero();
        repo.put_account(address, account)?;

        frame.substate.selfdestructs.insert(address);
        frame.substate.touch(beneficiary);
        frame.stopped = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BlockContext, TxContext};
    use crate::policy::{ResourcePolicy, Upgrade};
    use strata_state::StateDb;

    fn istanbul() -> ResourcePolicy {
        ResourcePolicy::at(Upgrade::Istanbul)
    }

    fn caller() -> Address {
        Address::from_low_u64_be(0xca11)
    }

    fn call(db: &mut StateDb, policy: &ResourcePolicy, to: Address, value: u64, gas: u64) -> FrameResult {
        let block = BlockContext::default();
        let tx = TxContext::default();
        let msg = Message::call(caller(), to, U256::from(value), Vec::new(), gas);
        Evm::new(policy, &block, &tx).call(db, msg).unwrap()
    }

    #[test]
    fn test_create_address_vectors() {
        let sender = Address::from_hex("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap();
        assert_eq!(
            create_address(&sender, 0),
            Address::from_hex("0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d").unwrap()
        );
        assert_eq!(
            create_address(&sender, 1),
            Address::from_hex("0x343c43a37d37dff08ae8c4a11544c718abb4fcf8").unwrap()
        );
    }

    #[test]
    fn test_create2_address_vectors() {
        assert_eq!(
            create2_address(&Address::ZERO, &H256::ZERO, &[0x00]),
            Address::from_hex("0x4D1A2e2bB4F88F0250f26Ffff098B0b30B26BF38").unwrap()
        );
        let deployer = Address::from_hex("0xdeadbeef00000000000000000000000000000000").unwrap();
        assert_eq!(
            create2_address(&deployer, &H256::ZERO, &[0x00]),
            Address::from_hex("0xB928f69Bb1D91Cd65274e3c79d8986362984fDA3").unwrap()
        );
    }

    #[test]
    fn test_plain_transfer() {
        let mut db = StateDb::new();
        db.add_balance(&caller(), U256::from(100u64)).unwrap();
        let to = Address::from_low_u64_be(0xbeef);

        let result = call(&mut db, &istanbul(), to, 40, 1000);
        assert!(result.is_success());
        assert_eq!(result.gas_left, 1000);
        assert!(result.substate.touched.contains(&to));
        assert_eq!(db.get_balance(&caller()).unwrap(), U256::from(60u64));
        assert_eq!(db.get_balance(&to).unwrap(), U256::from(40u64));
    }

    #[test]
    fn test_precompile_call() {
        let mut db = StateDb::new();
        let block = BlockContext::default();
        let tx = TxContext::default();
        let identity = Precompile::Identity.address();
        let policy = istanbul();

        let msg = Message::call(caller(), identity, U256::zero(), vec![1, 2, 3], 100);
        let result = Evm::new(&policy, &block, &tx).call(&mut db, msg).unwrap();
        assert!(result.is_success());
        assert_eq!(result.output, vec![1, 2, 3]);
        assert_eq!(result.gas_left, 100 - 18);

        let msg = Message::call(caller(), identity, U256::zero(), vec![1, 2, 3], 10);
        let result = Evm::new(&policy, &block, &tx).call(&mut db, msg).unwrap();
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::OutOfGas)));
    }

    #[test]
    fn test_create_deploys_returned_code() {
        // Init code: PUSH1 0xAA, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, RETURN
        let init = vec![0x60, 0xAA, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xF3];
        let mut db = StateDb::new();
        let block = BlockContext::default();
        let tx = TxContext::default();
        let policy = istanbul();
        let address = create_address(&caller(), 0);

        let msg = Message::create(caller(), address, U256::zero(), init, 100_000);
        let result = Evm::new(&policy, &block, &tx).create(&mut db, msg).unwrap();
        assert!(result.is_success());
        assert_eq!(result.created, Some(address));
        assert_eq!(db.get_code(&address).unwrap(), vec![0xAA]);
        assert_eq!(db.get_nonce(&address).unwrap(), 1);
        // 4 pushes, MSTORE8, one word of memory, one byte of deposit
        assert_eq!(result.gas_left, 100_000 - (4 * 3 + 3 + 3 + 200));
    }

    #[test]
    fn test_create_collision() {
        let mut db = StateDb::new();
        let address = Address::from_low_u64_be(0xc0de);
        db.set_nonce(&address, 1).unwrap();
        let block = BlockContext::default();
        let tx = TxContext::default();
        let policy = istanbul();

        let msg = Message::create(caller(), address, U256::zero(), vec![0x00], 1000);
        let result = Evm::new(&policy, &block, &tx).create(&mut db, msg).unwrap();
        assert!(matches!(
            result.status,
            ExitStatus::Exception(EvmError::CreateCollision(a)) if a == address
        ));
        assert_eq!(result.gas_left, 0);
    }

    #[test]
    fn test_code_deposit_out_of_gas_by_fork() {
        // Init code returns 100 zero bytes: PUSH1 100, PUSH1 0, RETURN
        let init = vec![0x60, 0x64, 0x60, 0x00, 0xF3];
        let address = Address::from_low_u64_be(0xc0de);
        let block = BlockContext::default();
        let tx = TxContext::default();
        // enough for execution, not for the 20000 deposit
        let gas = 1_000;

        let frontier = ResourcePolicy::frontier();
        let mut db = StateDb::new();
        let msg = Message::create(caller(), address, U256::zero(), init.clone(), gas);
        let result = Evm::new(&frontier, &block, &tx).create(&mut db, msg).unwrap();
        assert!(result.is_success());
        assert!(db.get_code(&address).unwrap().is_empty());
        assert!(db.is_exist(&address).unwrap());

        let homestead = ResourcePolicy::at(Upgrade::Homestead);
        let mut db = StateDb::new();
        let msg = Message::create(caller(), address, U256::zero(), init, gas);
        let result = Evm::new(&homestead, &block, &tx).create(&mut db, msg).unwrap();
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::OutOfGas)));
        assert!(!db.is_exist(&address).unwrap());
    }

    #[test]
    fn test_max_code_size() {
        // PUSH2 0x6001, PUSH1 0, RETURN: 24577 bytes of code
        let init = vec![0x61, 0x60, 0x01, 0x60, 0x00, 0xF3];
        let address = Address::from_low_u64_be(0xc0de);
        let block = BlockContext::default();
        let tx = TxContext::default();
        let policy = istanbul();
        let mut db = StateDb::new();

        let msg = Message::create(caller(), address, U256::zero(), init, 10_000_000);
        let result = Evm::new(&policy, &block, &tx).create(&mut db, msg).unwrap();
        assert!(matches!(
            result.status,
            ExitStatus::Exception(EvmError::MaxCodeSizeExceeded(24577))
        ));
    }

    #[test]
    fn test_selfdestruct_to_other_account() {
        let contract = Address::from_low_u64_be(0xc0de);
        let heir = Address::from_low_u64_be(0x4e1);
        let mut db = StateDb::new();
        // PUSH2 0x04e1, SELFDESTRUCT
        db.save_code(&contract, vec![0x61, 0x04, 0xe1, 0xFF]).unwrap();
        db.add_balance(&contract, U256::from(500u64)).unwrap();

        let result = call(&mut db, &istanbul(), contract, 0, 100_000);
        assert!(result.is_success());
        assert!(result.substate.selfdestructs.contains(&contract));
        assert!(result.substate.touched.contains(&heir));
        assert_eq!(db.get_balance(&heir).unwrap(), U256::from(500u64));
        assert_eq!(db.get_balance(&contract).unwrap(), U256::zero());
        // 3 for PUSH2, 5000 for SELFDESTRUCT, 25000 for the new account
        assert_eq!(result.gas_left, 100_000 - 3 - 5000 - 25000);
    }

    #[test]
    fn test_selfdestruct_forbidden_in_static_context() {
        let contract = Address::from_low_u64_be(0xc0de);
        let mut db = StateDb::new();
        db.save_code(&contract, vec![0x60, 0x00, 0xFF]).unwrap();
        let block = BlockContext::default();
        let tx = TxContext::default();
        let policy = istanbul();

        let mut msg = Message::call(caller(), contract, U256::zero(), Vec::new(), 10_000);
        msg.is_static = true;
        let result = Evm::new(&policy, &block, &tx).call(&mut db, msg).unwrap();
        assert!(matches!(
            result.status,
            ExitStatus::Exception(EvmError::StaticCallViolation)
        ));
    }
}
