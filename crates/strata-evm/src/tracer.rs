//! Execution tracing hooks

use strata_primitives::{Address, H256};

use crate::opcode::Opcode;
use crate::word::Word;

/// Observer of interpreter activity.
///
/// Every hook has an empty default. Tracers only observe; nothing they do
/// can change an execution outcome.
pub trait Tracer {
    /// Before an instruction executes
    fn on_step(&mut self, _pc: usize, _opcode: Opcode, _gas_left: u64, _depth: usize) {}

    /// A word was pushed
    fn on_stack_push(&mut self, _value: &Word) {}

    /// A word was popped
    fn on_stack_pop(&mut self, _value: &Word) {}

    /// The top was swapped with the item at `depth`
    fn on_stack_swap(&mut self, _depth: usize) {}

    /// Memory grew to `new_size` bytes
    fn on_memory_extend(&mut self, _new_size: usize) {}

    /// Bytes were written to memory
    fn on_memory_write(&mut self, _offset: usize, _data: &[u8]) {}

    /// A storage slot was set to a non-zero value
    fn on_storage_put(&mut self, _address: &Address, _key: &H256, _value: &H256) {}

    /// A storage slot was cleared
    fn on_storage_clear(&mut self, _address: &Address, _key: &H256) {}
}

/// Event recorded by [`StructLogger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// Instruction about to execute
    Step {
        /// Program counter
        pc: usize,
        /// Opcode
        opcode: Opcode,
        /// Gas before the instruction
        gas_left: u64,
        /// Call depth
        depth: usize,
    },
    /// Stack push
    Push(Word),
    /// Stack pop
    Pop(Word),
    /// Stack swap
    Swap(usize),
    /// Memory growth
    MemoryExtend(usize),
    /// Memory write
    MemoryWrite {
        /// Offset written
        offset: usize,
        /// Bytes written
        data: Vec<u8>,
    },
    /// Non-zero storage write
    StoragePut {
        /// Contract
        address: Address,
        /// Slot
        key: H256,
        /// Value
        value: H256,
    },
    /// Storage slot cleared
    StorageClear {
        /// Contract
        address: Address,
        /// Slot
        key: H256,
    },
}

/// Tracer recording every event in order
#[derive(Debug, Clone, Default)]
pub struct StructLogger {
    events: Vec<TraceEvent>,
}

impl StructLogger {
    /// Create an empty logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Executed opcodes in order
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Step { opcode, .. } => Some(*opcode),
                _ => None,
            })
            .collect()
    }

    /// Number of executed instructions
    pub fn step_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, TraceEvent::Step { .. }))
            .count()
    }
}

impl Tracer for StructLogger {
    fn on_step(&mut self, pc: usize, opcode: Opcode, gas_left: u64, depth: usize) {
        self.events.push(TraceEvent::Step {
            pc,
            opcode,
            gas_left,
            depth,
        });
    }

    fn on_stack_push(&mut self, value: &Word) {
        self.events.push(TraceEvent::Push(*value));
    }

    fn on_stack_pop(&mut self, value: &Word) {
        self.events.push(TraceEvent::Pop(*value));
    }

    fn on_stack_swap(&mut self, depth: usize) {
        self.events.push(TraceEvent::Swap(depth));
    }

    fn on_memory_extend(&mut self, new_size: usize) {
        self.events.push(TraceEvent::MemoryExtend(new_size));
    }

    fn on_memory_write(&mut self, offset: usize, data: &[u8]) {
        self.events.push(TraceEvent::MemoryWrite {
            offset,
            data: data.to_vec(),
        });
    }

    fn on_storage_put(&mut self, address: &Address, key: &H256, value: &H256) {
        self.events.push(TraceEvent::StoragePut {
            address: *address,
            key: *key,
            value: *value,
        });
    }

    fn on_storage_clear(&mut self, address: &Address, key: &H256) {
        self.events.push(TraceEvent::StorageClear {
            address: *address,
            key: *key,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_logger_records_in_order() {
        let mut logger = StructLogger::new();
        logger.on_step(0, Opcode::PUSH1, 100, 0);
        logger.on_stack_push(&Word::ONE);
        logger.on_step(2, Opcode::POP, 97, 0);
        logger.on_stack_pop(&Word::ONE);

        assert_eq!(logger.step_count(), 2);
        assert_eq!(logger.opcodes(), vec![Opcode::PUSH1, Opcode::POP]);
        assert_eq!(logger.events()[1], TraceEvent::Push(Word::ONE));
    }
}
