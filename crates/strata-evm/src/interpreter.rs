//! Bytecode interpreter

use bytes::Bytes;
use std::collections::HashSet;
use strata_crypto::keccak256;
use strata_state::Repository;
use strata_types::Log;

use crate::context::{BlockContext, Message, TxContext};
use crate::error::{EvmError, EvmResult, ExitStatus};
use crate::gas::cost::MAX_STACK_SIZE;
use crate::memory::{padded_slice, Memory};
use crate::opcode::Opcode;
use crate::policy::ResourcePolicy;
use crate::stack::Stack;
use crate::storage::ContractStorage;
use crate::substate::Substate;
use crate::tracer::Tracer;
use crate::word::Word;

/// Memory regions ending beyond this offset always run out of gas
const MEMORY_LIMIT: u64 = u32::MAX as u64;

/// Analyze bytecode for valid jump destinations
pub(crate) fn analyze_jump_dests(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut i = 0;

    while i < code.len() {
        let opcode = code[i];
        if opcode == Opcode::JUMPDEST as u8 {
            dests.insert(i);
        }
        // Skip PUSH operands
        if (0x60..=0x7F).contains(&opcode) {
            i += (opcode - 0x5F) as usize;
        }
        i += 1;
    }

    dests
}

/// One executing call or create frame
pub(crate) struct Frame {
    pub(crate) msg: Message,
    code: Vec<u8>,
    input: Vec<u8>,
    jump_dests: HashSet<usize>,
    pc: usize,
    pub(crate) gas: u64,
    stack: Stack,
    pub(crate) memory: Memory,
    pub(crate) return_data: Vec<u8>,
    pub(crate) output: Vec<u8>,
    pub(crate) stopped: bool,
    pub(crate) substate: Substate,
}

impl Frame {
    /// Frame running `code` with the message data as input
    pub(crate) fn for_call(mut msg: Message, code: Vec<u8>, substate: Substate) -> Self {
        let input = std::mem::take(&mut msg.data);
        Self::new(msg, code, input, substate)
    }

    /// Frame running the message data as init code with empty input
    pub(crate) fn for_create(mut msg: Message, substate: Substate) -> Self {
        let code = std::mem::take(&mut msg.data);
        Self::new(msg, code, Vec::new(), substate)
    }

    fn new(msg: Message, code: Vec<u8>, input: Vec<u8>, substate: Substate) -> Self {
        let jump_dests = analyze_jump_dests(&code);
        Self {
            gas: msg.gas,
            msg,
            code,
            input,
            jump_dests,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            return_data: Vec::new(),
            output: Vec::new(),
            stopped: false,
            substate,
        }
    }

    /// Use gas, returning error if insufficient
    pub(crate) fn use_gas(&mut self, amount: u64) -> EvmResult<()> {
        if self.gas < amount {
            return Err(EvmError::OutOfGas);
        }
        self.gas -= amount;
        Ok(())
    }
}

/// Interpreter bound to one policy, block and transaction.
///
/// Frames recurse through [`Evm::call`] and [`Evm::create`]; each frame
/// runs over its own tracked snapshot of the caller's repository.
pub struct Evm<'a> {
    pub(crate) policy: &'a ResourcePolicy,
    pub(crate) block: &'a BlockContext,
    pub(crate) tx: &'a TxContext,
    pub(crate) tracer: Option<&'a mut dyn Tracer>,
}

impl<'a> Evm<'a> {
    /// Create an interpreter without a tracer
    pub fn new(policy: &'a ResourcePolicy, block: &'a BlockContext, tx: &'a TxContext) -> Self {
        Self {
            policy,
            block,
            tx,
            tracer: None,
        }
    }

    /// Attach a tracer
    pub fn with_tracer(mut self, tracer: &'a mut dyn Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Active policy
    pub fn policy(&self) -> &ResourcePolicy {
        self.policy
    }

    /// Execute until completion, exception or a fatal error
    pub(crate) fn run(
        &mut self,
        repo: &mut dyn Repository,
        frame: &mut Frame,
    ) -> EvmResult<ExitStatus> {
        while !frame.stopped && frame.pc < frame.code.len() {
            match self.step(repo, frame) {
                Ok(()) => {}
                Err(EvmError::Revert(data)) => {
                    frame.output = data;
                    return Ok(ExitStatus::Reverted);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => return Ok(ExitStatus::Exception(e)),
            }
        }
        Ok(ExitStatus::Halted)
    }

    fn step(&mut self, repo: &mut dyn Repository, frame: &mut Frame) -> EvmResult<()> {
        let byte = frame.code[frame.pc];
        let opcode = Opcode::from_byte(byte)
            .filter(|opcode| self.policy.is_enabled(*opcode))
            .ok_or(EvmError::InvalidOpcode(byte))?;

        let (pc, gas, depth) = (frame.pc, frame.gas, frame.msg.depth);
        self.trace(|t| t.on_step(pc, opcode, gas, depth));

        let info = opcode.info();
        if frame.stack.len() < info.inputs {
            return Err(EvmError::StackUnderflow);
        }
        if frame.stack.len() - info.inputs + info.outputs > MAX_STACK_SIZE {
            return Err(EvmError::StackOverflow);
        }
        frame.use_gas(self.policy.static_cost(opcode))?;

        frame.pc += 1;
        self.execute_opcode(repo, frame, opcode)
    }

    fn execute_opcode(
        &mut self,
        repo: &mut dyn Repository,
        frame: &mut Frame,
        opcode: Opcode,
    ) -> EvmResult<()> {
        match opcode {
            Opcode::STOP => frame.stopped = true,

            // Arithmetic
            Opcode::ADD => self.binary(frame, |a, b| a + b)?,
            Opcode::MUL => self.binary(frame, |a, b| a * b)?,
            Opcode::SUB => self.binary(frame, |a, b| a - b)?,
            Opcode::DIV => self.binary(frame, Word::div)?,
            Opcode::SDIV => self.binary(frame, Word::sdiv)?,
            Opcode::MOD => self.binary(frame, Word::rem)?,
            Opcode::SMOD => self.binary(frame, Word::smod)?,
            Opcode::ADDMOD => self.ternary(frame, Word::addmod)?,
            Opcode::MULMOD => self.ternary(frame, Word::mulmod)?,
            Opcode::EXP => {
                let base = self.pop(frame)?;
                let exponent = self.pop(frame)?;
                frame.use_gas(self.policy.gas.exp_byte_cost(exponent))?;
                self.push(frame, base.exp(exponent))?;
            }
            Opcode::SIGNEXTEND => self.binary(frame, Word::signextend)?,

            // Comparison and bitwise logic
            Opcode::LT => self.binary(frame, |a, b| Word::from(a < b))?,
            Opcode::GT => self.binary(frame, |a, b| Word::from(a > b))?,
            Opcode::SLT => self.binary(frame, |a, b| Word::from(a.slt(&b)))?,
            Opcode::SGT => self.binary(frame, |a, b| Word::from(a.sgt(&b)))?,
            Opcode::EQ => self.binary(frame, |a, b| Word::from(a == b))?,
            Opcode::ISZERO => self.unary(frame, |a| Word::from(a.is_zero()))?,
            Opcode::AND => self.binary(frame, |a, b| a & b)?,
            Opcode::OR => self.binary(frame, |a, b| a | b)?,
            Opcode::XOR => self.binary(frame, |a, b| a ^ b)?,
            Opcode::NOT => self.unary(frame, |a| !a)?,
            Opcode::BYTE => self.binary(frame, Word::byte)?,
            Opcode::SHL => self.binary(frame, |shift, value| value.shl(shift))?,
            Opcode::SHR => self.binary(frame, |shift, value| value.shr(shift))?,
            Opcode::SAR => self.binary(frame, |shift, value| value.sar(shift))?,

            Opcode::KECCAK256 => {
                let offset = self.pop(frame)?;
                let size = self.pop(frame)?;
                let (offset, size) = self.memory_region(frame, offset, size)?;
                frame.use_gas(self.policy.gas.hash_word_cost(size as u64))?;
                let hash = keccak256(&frame.memory.read(offset, size));
                self.push(frame, Word::from(hash))?;
            }

            // Environment
            Opcode::ADDRESS => {
                let value = Word::from(frame.msg.address);
                self.push(frame, value)?;
            }
            Opcode::BALANCE => {
                let address = self.pop(frame)?.to_address();
                let balance = repo.get_balance(&address)?;
                self.push(frame, Word::from(balance))?;
            }
            Opcode::ORIGIN => self.push(frame, Word::from(self.tx.origin))?,
            Opcode::CALLER => {
                let value = Word::from(frame.msg.caller);
                self.push(frame, value)?;
            }
            Opcode::CALLVALUE => {
                let value = Word::from(frame.msg.value);
                self.push(frame, value)?;
            }
            Opcode::CALLDATALOAD => {
                let offset = self.pop(frame)?;
                let value = Word::from_be_slice(&padded_slice(&frame.input, offset.as_usize(), 32));
                self.push(frame, value)?;
            }
            Opcode::CALLDATASIZE => {
                let value = Word::from(frame.input.len());
                self.push(frame, value)?;
            }
            Opcode::CODESIZE => {
                let value = Word::from(frame.code.len());
                self.push(frame, value)?;
            }
            Opcode::CALLDATACOPY | Opcode::CODECOPY | Opcode::RETURNDATACOPY => {
                let dest = self.pop(frame)?;
                let offset = self.pop(frame)?;
                let size = self.pop(frame)?;
                let (dest, size) = self.memory_region(frame, dest, size)?;
                frame.use_gas(self.policy.gas.copy_cost(size as u64))?;
                let source = match opcode {
                    Opcode::CALLDATACOPY => &frame.input,
                    Opcode::CODECOPY => &frame.code,
                    _ => &frame.return_data,
                };
                if opcode == Opcode::RETURNDATACOPY {
                    let end = offset.as_usize().and_then(|start| start.checked_add(size));
                    if end.map_or(true, |end| end > source.len()) {
                        return Err(EvmError::ReturnDataOutOfBounds);
                    }
                }
                let chunk = padded_slice(source, offset.as_usize(), size);
                self.memory_write(frame, dest, &chunk);
            }
            Opcode::GASPRICE => self.push(frame, Word::from(self.tx.gas_price))?,
            Opcode::EXTCODESIZE => {
                let address = self.pop(frame)?.to_address();
                let size = repo.get_code(&address)?.len();
                self.push(frame, Word::from(size))?;
            }
            Opcode::EXTCODECOPY => {
                let address = self.pop(frame)?.to_address();
                let dest = self.pop(frame)?;
                let offset = self.pop(frame)?;
                let size = self.pop(frame)?;
                let (dest, size) = self.memory_region(frame, dest, size)?;
                frame.use_gas(self.policy.gas.copy_cost(size as u64))?;
                let code = repo.get_code(&address)?;
                let chunk = padded_slice(&code, offset.as_usize(), size);
                self.memory_write(frame, dest, &chunk);
            }
            Opcode::RETURNDATASIZE => {
                let value = Word::from(frame.return_data.len());
                self.push(frame, value)?;
            }
            Opcode::EXTCODEHASH => {
                let address = self.pop(frame)?.to_address();
                let hash = if repo.is_empty(&address)? {
                    Word::ZERO
                } else {
                    Word::from(repo.get_code_hash(&address)?)
                };
                self.push(frame, hash)?;
            }

            // Block information
            Opcode::BLOCKHASH => {
                let number = self.pop(frame)?;
                let hash = number
                    .as_u64()
                    .map_or(Word::ZERO, |n| Word::from(self.block.block_hash(n)));
                self.push(frame, hash)?;
            }
            Opcode::COINBASE => self.push(frame, Word::from(self.block.coinbase))?,
            Opcode::TIMESTAMP => self.push(frame, Word::from(self.block.timestamp))?,
            Opcode::NUMBER => self.push(frame, Word::from(self.block.number))?,
            Opcode::DIFFICULTY => self.push(frame, Word::from(self.block.difficulty))?,
            Opcode::GASLIMIT => self.push(frame, Word::from(self.block.gas_limit))?,
            Opcode::CHAINID => self.push(frame, Word::from(self.block.chain_id))?,
            Opcode::SELFBALANCE => {
                let balance = repo.get_balance(&frame.msg.address)?;
                self.push(frame, Word::from(balance))?;
            }

            // Stack, memory, storage and flow
            Opcode::POP => {
                self.pop(frame)?;
            }
            Opcode::MLOAD => {
                let offset = self.pop(frame)?;
                let (offset, _) = self.memory_region(frame, offset, Word::from(32u64))?;
                let value = frame.memory.read_word(offset);
                self.push(frame, value)?;
            }
            Opcode::MSTORE => {
                let offset = self.pop(frame)?;
                let value = self.pop(frame)?;
                let (offset, _) = self.memory_region(frame, offset, Word::from(32u64))?;
                self.memory_write(frame, offset, &value.to_be_bytes());
            }
            Opcode::MSTORE8 => {
                let offset = self.pop(frame)?;
                let value = self.pop(frame)?;
                let (offset, _) = self.memory_region(frame, offset, Word::ONE)?;
                self.memory_write(frame, offset, &[value.low_u64() as u8]);
            }
            Opcode::SLOAD => {
                let key = self.pop(frame)?.to_h256();
                let storage = ContractStorage::new(repo, frame.msg.address, None);
                let value = storage.get(&key)?;
                self.push(frame, Word::from(value))?;
            }
            Opcode::SSTORE => {
                if frame.msg.is_static {
                    return Err(EvmError::StaticCallViolation);
                }
                let key = self.pop(frame)?.to_h256();
                let value = self.pop(frame)?.to_h256();
                let policy = self.policy;
                let mut storage =
                    ContractStorage::new(repo, frame.msg.address, self.tracer.as_deref_mut());
                let current = storage.get(&key)?;
                let original = storage.original(&key)?;
                let cost = policy.sstore_cost(frame.gas, &original, &current, &value)?;
                frame.use_gas(cost.gas)?;
                frame.substate.refund += cost.refund;
                storage.put(key, value)?;
            }
            Opcode::JUMP => {
                let dest = self.pop(frame)?;
                self.jump(frame, dest)?;
            }
            Opcode::JUMPI => {
                let dest = self.pop(frame)?;
                let condition = self.pop(frame)?;
                if !condition.is_zero() {
                    self.jump(frame, dest)?;
                }
            }
            Opcode::PC => {
                let value = Word::from(frame.pc - 1);
                self.push(frame, value)?;
            }
            Opcode::MSIZE => {
                let value = Word::from(frame.memory.size());
                self.push(frame, value)?;
            }
            Opcode::GAS => {
                let value = Word::from(frame.gas);
                self.push(frame, value)?;
            }
            Opcode::JUMPDEST => {}

            Opcode::LOG0 | Opcode::LOG1 | Opcode::LOG2 | Opcode::LOG3 | Opcode::LOG4 => {
                if frame.msg.is_static {
                    return Err(EvmError::StaticCallViolation);
                }
                let offset = self.pop(frame)?;
                let size = self.pop(frame)?;
                let mut topics = Vec::with_capacity(opcode.log_topics());
                for _ in 0..opcode.log_topics() {
                    topics.push(self.pop(frame)?.to_h256());
                }
                let (offset, size) = self.memory_region(frame, offset, size)?;
                frame.use_gas(self.policy.gas.log_data_cost(size as u64))?;
                let data = frame.memory.read(offset, size);
                let log = Log::new(frame.msg.address, topics, Bytes::from(data));
                frame.substate.logs.push(log);
            }

            Opcode::RETURN => {
                let offset = self.pop(frame)?;
                let size = self.pop(frame)?;
                let (offset, size) = self.memory_region(frame, offset, size)?;
                frame.output = frame.memory.read(offset, size);
                frame.stopped = true;
            }
            Opcode::REVERT => {
                let offset = self.pop(frame)?;
                let size = self.pop(frame)?;
                let (offset, size) = self.memory_region(frame, offset, size)?;
                return Err(EvmError::Revert(frame.memory.read(offset, size)));
            }

            Opcode::CALL | Opcode::CALLCODE | Opcode::DELEGATECALL | Opcode::STATICCALL => {
                self.op_call(repo, frame, opcode)?
            }
            Opcode::CREATE | Opcode::CREATE2 => self.op_create(repo, frame, opcode)?,
            Opcode::SELFDESTRUCT => self.op_selfdestruct(repo, frame)?,
            Opcode::INVALID => return Err(EvmError::InvalidOpcode(opcode as u8)),

            _ if opcode.is_push() => {
                let size = opcode.push_size();
                let start = frame.pc;
                let end = (start + size).min(frame.code.len());
                let mut immediate = frame.code[start..end].to_vec();
                immediate.resize(size, 0);
                frame.pc = start + size;
                self.push(frame, Word::from_be_slice(&immediate))?;
            }
            _ if opcode.dup_depth() > 0 => {
                let value = frame.stack.dup(opcode.dup_depth())?;
                self.trace(|t| t.on_stack_push(&value));
            }
            _ if opcode.swap_depth() > 0 => {
                let depth = opcode.swap_depth();
                frame.stack.swap(depth)?;
                self.trace(|t| t.on_stack_swap(depth));
            }
            _ => return Err(EvmError::InvalidOpcode(opcode as u8)),
        }
        Ok(())
    }

    /// Run `f` against the tracer, if any
    pub(crate) fn trace(&mut self, f: impl FnOnce(&mut dyn Tracer)) {
        if let Some(tracer) = self.tracer.as_deref_mut() {
            f(tracer);
        }
    }

    pub(crate) fn pop(&mut self, frame: &mut Frame) -> EvmResult<Word> {
        let value = frame.stack.pop()?;
        self.trace(|t| t.on_stack_pop(&value));
        Ok(value)
    }

    pub(crate) fn push(&mut self, frame: &mut Frame, value: Word) -> EvmResult<()> {
        frame.stack.push(value)?;
        self.trace(|t| t.on_stack_push(&value));
        Ok(())
    }

    fn unary(&mut self, frame: &mut Frame, f: impl FnOnce(Word) -> Word) -> EvmResult<()> {
        let a = self.pop(frame)?;
        self.push(frame, f(a))
    }

    fn binary(&mut self, frame: &mut Frame, f: impl FnOnce(Word, Word) -> Word) -> EvmResult<()> {
        let a = self.pop(frame)?;
        let b = self.pop(frame)?;
        self.push(frame, f(a, b))
    }

    fn ternary(
        &mut self,
        frame: &mut Frame,
        f: impl FnOnce(Word, Word, Word) -> Word,
    ) -> EvmResult<()> {
        let a = self.pop(frame)?;
        let b = self.pop(frame)?;
        let c = self.pop(frame)?;
        self.push(frame, f(a, b, c))
    }

    fn jump(&mut self, frame: &mut Frame, dest: Word) -> EvmResult<()> {
        let target = dest.as_usize().unwrap_or(usize::MAX);
        if !frame.jump_dests.contains(&target) {
            return Err(EvmError::InvalidJump(target));
        }
        frame.pc = target;
        Ok(())
    }

    /// Charge for and grow memory over `offset..offset + size`.
    ///
    /// A zero size touches nothing and returns `(0, 0)`.
    pub(crate) fn memory_region(
        &mut self,
        frame: &mut Frame,
        offset: Word,
        size: Word,
    ) -> EvmResult<(usize, usize)> {
        if size.is_zero() {
            return Ok((0, 0));
        }
        let end = offset
            .as_u64()
            .zip(size.as_u64())
            .and_then(|(offset, size)| offset.checked_add(size))
            .filter(|end| *end <= MEMORY_LIMIT)
            .ok_or(EvmError::OutOfGas)?;
        let cost = self
            .policy
            .gas
            .memory_expansion(frame.memory.words(), end.div_ceil(32));
        frame.use_gas(cost)?;

        let offset = offset.low_u64() as usize;
        let size = size.low_u64() as usize;
        if let Some(new_size) = frame.memory.extend(offset, size) {
            self.trace(|t| t.on_memory_extend(new_size));
        }
        Ok((offset, size))
    }

    pub(crate) fn memory_write(&mut self, frame: &mut Frame, offset: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        frame.memory.write(offset, data);
        self.trace(|t| t.on_memory_write(offset, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Message;
    use crate::error::FrameResult;
    use crate::policy::Upgrade;
    use crate::tracer::{StructLogger, TraceEvent};
    use strata_primitives::{Address, H256, U256};
    use strata_state::StateDb;

    fn contract() -> Address {
        Address::from_low_u64_be(0xc0de)
    }

    fn caller() -> Address {
        Address::from_low_u64_be(0xca11)
    }

    fn run_with(policy: &ResourcePolicy, code: &[u8], data: &[u8], gas: u64) -> (FrameResult, StateDb) {
        let mut db = StateDb::new();
        db.save_code(&contract(), code.to_vec()).unwrap();
        db.add_balance(&caller(), U256::from(1_000_000u64)).unwrap();
        let block = BlockContext::default();
        let tx = TxContext::default();
        let msg = Message::call(caller(), contract(), U256::zero(), data.to_vec(), gas);
        let result = Evm::new(policy, &block, &tx).call(&mut db, msg).unwrap();
        (result, db)
    }

    fn run_code(code: &[u8], gas: u64) -> FrameResult {
        run_with(&ResourcePolicy::at(Upgrade::Istanbul), code, &[], gas).0
    }

    /// Appends `PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN` to return the top word
    fn returning_top(code: &[u8]) -> Vec<u8> {
        let mut code = code.to_vec();
        code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3]);
        code
    }

    fn returned_word(code: &[u8]) -> Word {
        let result = run_code(&returning_top(code), 100_000);
        assert!(result.is_success(), "status: {:?}", result.status);
        Word::from_be_slice(&result.output)
    }

    #[test]
    fn test_jump_dest_analysis_skips_push_data() {
        // PUSH1 0x5B, JUMPDEST
        let dests = analyze_jump_dests(&[0x60, 0x5B, 0x5B]);
        assert!(!dests.contains(&1));
        assert!(dests.contains(&2));
    }

    #[test]
    fn test_stop() {
        let result = run_code(&[0x00], 1000);
        assert!(result.is_success());
        assert_eq!(result.gas_left, 1000);
    }

    #[test]
    fn test_add_and_return() {
        // PUSH1 1, PUSH1 2, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = [0x60, 0x01, 0x60, 0x02, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];
        let result = run_code(&code, 1000);
        assert!(result.is_success());
        assert_eq!(result.output.len(), 32);
        assert_eq!(result.output[31], 3);
        // 5 pushes, ADD, MSTORE and one word of memory
        assert_eq!(result.gas_left, 1000 - (5 * 3 + 3 + 3 + 3));
    }

    #[test]
    fn test_operand_order() {
        // 10 - 3: PUSH1 3, PUSH1 10, SUB
        assert_eq!(returned_word(&[0x60, 0x03, 0x60, 0x0A, 0x03]), Word::from(7u64));
        // 10 / 3
        assert_eq!(returned_word(&[0x60, 0x03, 0x60, 0x0A, 0x04]), Word::from(3u64));
        // 1 << 4: PUSH1 1, PUSH1 4, SHL
        assert_eq!(returned_word(&[0x60, 0x01, 0x60, 0x04, 0x1B]), Word::from(16u64));
        // 2 ** 10: PUSH1 10, PUSH1 2, EXP
        assert_eq!(returned_word(&[0x60, 0x0A, 0x60, 0x02, 0x0A]), Word::from(1024u64));
        // 3 < 5: PUSH1 5, PUSH1 3, LT
        assert_eq!(returned_word(&[0x60, 0x05, 0x60, 0x03, 0x10]), Word::ONE);
    }

    #[test]
    fn test_push_past_end_pads_with_zeros() {
        let result = run_code(&[0x61, 0x01], 1000);
        assert!(result.is_success());
    }

    #[test]
    fn test_jump_and_jumpi() {
        // PUSH1 4, JUMP, INVALID, JUMPDEST, STOP
        assert!(run_code(&[0x60, 0x04, 0x56, 0xFE, 0x5B, 0x00], 1000).is_success());
        // PUSH1 1, PUSH1 6, JUMPI, INVALID, JUMPDEST
        assert!(run_code(&[0x60, 0x01, 0x60, 0x06, 0x57, 0xFE, 0x5B], 1000).is_success());
        // PUSH1 0, PUSH1 6, JUMPI, STOP, INVALID, INVALID, JUMPDEST
        assert!(run_code(&[0x60, 0x00, 0x60, 0x06, 0x57, 0x00, 0xFE, 0x5B], 1000).is_success());
    }

    #[test]
    fn test_invalid_jump_is_exception() {
        // PUSH1 3, JUMP, STOP
        let result = run_code(&[0x60, 0x03, 0x56, 0x00], 1000);
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::InvalidJump(3))));
        assert_eq!(result.gas_left, 0);
        // jump into push data
        let result = run_code(&[0x60, 0x04, 0x56, 0x60, 0x5B], 1000);
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::InvalidJump(4))));
    }

    #[test]
    fn test_stack_underflow_is_exception() {
        let result = run_code(&[0x01], 1000);
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::StackUnderflow)));
        assert_eq!(result.gas_left, 0);
    }

    #[test]
    fn test_stack_overflow_is_exception() {
        // JUMPDEST, PUSH1 0, PUSH1 0, JUMP: pushes forever
        let result = run_code(&[0x5B, 0x60, 0x00, 0x60, 0x00, 0x56], 1_000_000);
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::StackOverflow)));
    }

    #[test]
    fn test_out_of_gas() {
        // PUSH1 1, PUSH1 2, ADD with 8 gas
        let result = run_code(&[0x60, 0x01, 0x60, 0x02, 0x01], 8);
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::OutOfGas)));
        assert_eq!(result.gas_left, 0);
    }

    #[test]
    fn test_undefined_and_gated_opcodes() {
        let result = run_code(&[0x0C], 1000);
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::InvalidOpcode(0x0C))));
        let result = run_code(&[0xFE], 1000);
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::InvalidOpcode(0xFE))));

        // SHL before Constantinople
        let policy = ResourcePolicy::at(Upgrade::Byzantium);
        let (result, _) = run_with(&policy, &[0x60, 0x01, 0x60, 0x01, 0x1B], &[], 1000);
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::InvalidOpcode(0x1B))));
    }

    #[test]
    fn test_revert_keeps_gas_and_data() {
        // PUSH1 0xAA, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, REVERT
        let code = [0x60, 0xAA, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xFD];
        let result = run_code(&code, 1000);
        assert!(matches!(result.status, ExitStatus::Reverted));
        assert_eq!(result.output, vec![0xAA]);
        assert_eq!(result.gas_left, 1000 - (4 * 3 + 3 + 3));
    }

    #[test]
    fn test_calldata() {
        // PUSH1 0, CALLDATALOAD
        let code = returning_top(&[0x60, 0x00, 0x35]);
        let policy = ResourcePolicy::at(Upgrade::Istanbul);
        let (result, _) = run_with(&policy, &code, &[0x12, 0x34], 100_000);
        assert_eq!(Word::from_be_slice(&result.output), Word::from(0x1234u64).shl(Word::from(240u64)));
    }

    #[test]
    fn test_keccak256() {
        // PUSH1 0, PUSH1 0, KECCAK256
        let value = returned_word(&[0x60, 0x00, 0x60, 0x00, 0x20]);
        assert_eq!(value.to_h256(), strata_crypto::KECCAK_EMPTY);
    }

    #[test]
    fn test_returndatacopy_out_of_bounds() {
        // PUSH1 1, PUSH1 0, PUSH1 0, RETURNDATACOPY
        let result = run_code(&[0x60, 0x01, 0x60, 0x00, 0x60, 0x00, 0x3E], 1000);
        assert!(matches!(
            result.status,
            ExitStatus::Exception(EvmError::ReturnDataOutOfBounds)
        ));
    }

    #[test]
    fn test_huge_memory_offset_runs_out_of_gas() {
        // PUSH1 1, PUSH32 MAX, MSTORE
        let mut code = vec![0x60, 0x01, 0x7F];
        code.extend_from_slice(&[0xFF; 32]);
        code.push(0x52);
        let result = run_code(&code, 1_000_000);
        assert!(matches!(result.status, ExitStatus::Exception(EvmError::OutOfGas)));
    }

    #[test]
    fn test_zero_size_region_ignores_offset() {
        // PUSH1 0, PUSH32 MAX, RETURN
        let mut code = vec![0x60, 0x00, 0x7F];
        code.extend_from_slice(&[0xFF; 32]);
        code.push(0xF3);
        let result = run_code(&code, 1000);
        assert!(result.is_success());
        assert!(result.output.is_empty());
    }

    #[test]
    fn test_sstore_and_sload() {
        // PUSH1 42, PUSH1 1, SSTORE, PUSH1 1, SLOAD
        let code = returning_top(&[0x60, 0x2A, 0x60, 0x01, 0x55, 0x60, 0x01, 0x54]);
        let policy = ResourcePolicy::at(Upgrade::Istanbul);
        let (result, db) = run_with(&policy, &code, &[], 100_000);
        assert!(result.is_success());
        assert_eq!(Word::from_be_slice(&result.output), Word::from(42u64));
        assert_eq!(
            db.get_storage_value(&contract(), &H256::from_low_u64_be(1)).unwrap(),
            H256::from_low_u64_be(42)
        );
    }

    #[test]
    fn test_exception_discards_storage() {
        // PUSH1 42, PUSH1 1, SSTORE, INVALID
        let policy = ResourcePolicy::at(Upgrade::Istanbul);
        let (result, db) = run_with(&policy, &[0x60, 0x2A, 0x60, 0x01, 0x55, 0xFE], &[], 100_000);
        assert!(!result.is_success());
        assert_eq!(
            db.get_storage_value(&contract(), &H256::from_low_u64_be(1)).unwrap(),
            H256::ZERO
        );
    }

    #[test]
    fn test_log_collects_topics_and_data() {
        // PUSH1 0xAB, PUSH1 0, MSTORE8, PUSH1 7 (topic), PUSH1 1, PUSH1 0, LOG1
        let code = [0x60, 0xAB, 0x60, 0x00, 0x53, 0x60, 0x07, 0x60, 0x01, 0x60, 0x00, 0xA1];
        let result = run_code(&code, 10_000);
        assert!(result.is_success());
        let log = &result.substate.logs[0];
        assert_eq!(log.address, contract());
        assert_eq!(log.topics, vec![H256::from_low_u64_be(7)]);
        assert_eq!(&log.data[..], &[0xAB]);
    }

    #[test]
    fn test_environment_opcodes() {
        assert_eq!(returned_word(&[0x30]), Word::from(contract()));
        assert_eq!(returned_word(&[0x33]), Word::from(caller()));
        assert_eq!(returned_word(&[0x46]), Word::ONE);
        // PC after PUSH1 and POP
        assert_eq!(returned_word(&[0x60, 0x00, 0x50, 0x58]), Word::from(3u64));
    }

    #[test]
    fn test_deterministic_reruns() {
        let code = [0x60, 0x2A, 0x60, 0x01, 0x55, 0x60, 0x01, 0x54, 0x60, 0x00, 0xA0];
        let policy = ResourcePolicy::at(Upgrade::Istanbul);
        let (first, first_db) = run_with(&policy, &code, &[1, 2, 3], 50_000);
        let (second, second_db) = run_with(&policy, &code, &[1, 2, 3], 50_000);
        assert_eq!(first.gas_left, second.gas_left);
        assert_eq!(first.output, second.output);
        assert_eq!(first.substate, second.substate);
        assert_eq!(first_db.root_hash(), second_db.root_hash());
    }

    #[test]
    fn test_tracer_does_not_change_outcome() {
        let code = [0x60, 0x2A, 0x60, 0x01, 0x55, 0x60, 0x20, 0x60, 0x00, 0xF3];
        let policy = ResourcePolicy::at(Upgrade::Istanbul);
        let (plain, _) = run_with(&policy, &code, &[], 50_000);

        let mut db = StateDb::new();
        db.save_code(&contract(), code.to_vec()).unwrap();
        let block = BlockContext::default();
        let tx = TxContext::default();
        let mut logger = StructLogger::new();
        let msg = Message::call(caller(), contract(), U256::zero(), Vec::new(), 50_000);
        let traced = Evm::new(&policy, &block, &tx)
            .with_tracer(&mut logger)
            .call(&mut db, msg)
            .unwrap();

        assert_eq!(plain.gas_left, traced.gas_left);
        assert_eq!(plain.output, traced.output);
        assert_eq!(logger.step_count(), 6);
        assert!(logger
            .events()
            .iter()
            .any(|event| matches!(event, TraceEvent::StoragePut { .. })));
        assert!(logger
            .events()
            .iter()
            .any(|event| matches!(event, TraceEvent::MemoryExtend(32))));
    }
}
