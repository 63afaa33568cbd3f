//! Operand stack

use crate::error::{EvmError, EvmResult};
use crate::gas::cost::MAX_STACK_SIZE;
use crate::word::Word;

/// Operand stack (max 1024 words)
#[derive(Clone, Debug)]
pub struct Stack {
    data: Vec<Word>,
}

impl Stack {
    /// Create a new empty stack
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(MAX_STACK_SIZE),
        }
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: Word) -> EvmResult<()> {
        if self.data.len() >= MAX_STACK_SIZE {
            return Err(EvmError::StackOverflow);
        }
        self.data.push(value);
        Ok(())
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> EvmResult<Word> {
        self.data.pop().ok_or(EvmError::StackUnderflow)
    }

    /// Peek at a specific depth (0 = top)
    pub fn peek(&self, depth: usize) -> EvmResult<Word> {
        if depth >= self.data.len() {
            return Err(EvmError::StackUnderflow);
        }
        Ok(self.data[self.data.len() - 1 - depth])
    }

    /// Swap top with item at depth (1 = swap with second item)
    pub fn swap(&mut self, depth: usize) -> EvmResult<()> {
        if depth == 0 || depth >= self.data.len() {
            return Err(EvmError::StackUnderflow);
        }
        let len = self.data.len();
        self.data.swap(len - 1, len - 1 - depth);
        Ok(())
    }

    /// Duplicate item at depth to top (1 = dup top), returning the copy
    pub fn dup(&mut self, depth: usize) -> EvmResult<Word> {
        if depth == 0 || depth > self.data.len() {
            return Err(EvmError::StackUnderflow);
        }
        if self.data.len() >= MAX_STACK_SIZE {
            return Err(EvmError::StackOverflow);
        }
        let value = self.data[self.data.len() - depth];
        self.data.push(value);
        Ok(value)
    }

    /// Get current stack size
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if stack is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bottom-to-top view
    pub fn as_slice(&self) -> &[Word] {
        &self.data
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(value: u64) -> Word {
        Word::from(value)
    }

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new();
        stack.push(w(1)).unwrap();
        stack.push(w(2)).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop().unwrap(), w(2));
        assert_eq!(stack.pop().unwrap(), w(1));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_overflow_at_1025() {
        let mut stack = Stack::new();
        for i in 0..MAX_STACK_SIZE {
            stack.push(w(i as u64)).unwrap();
        }
        assert!(matches!(stack.push(w(0)), Err(EvmError::StackOverflow)));
        assert!(matches!(stack.dup(1), Err(EvmError::StackOverflow)));
        assert_eq!(stack.len(), MAX_STACK_SIZE);
    }

    #[test]
    fn test_underflow() {
        let mut stack = Stack::new();
        assert!(matches!(stack.pop(), Err(EvmError::StackUnderflow)));
        assert!(matches!(stack.peek(0), Err(EvmError::StackUnderflow)));
        stack.push(w(1)).unwrap();
        assert!(matches!(stack.swap(1), Err(EvmError::StackUnderflow)));
        assert!(matches!(stack.dup(2), Err(EvmError::StackUnderflow)));
    }

    #[test]
    fn test_peek() {
        let mut stack = Stack::new();
        stack.push(w(1)).unwrap();
        stack.push(w(2)).unwrap();
        assert_eq!(stack.peek(0).unwrap(), w(2));
        assert_eq!(stack.peek(1).unwrap(), w(1));
    }

    #[test]
    fn test_swap() {
        let mut stack = Stack::new();
        stack.push(w(1)).unwrap();
        stack.push(w(2)).unwrap();
        stack.push(w(3)).unwrap();
        stack.swap(2).unwrap();
        assert_eq!(stack.as_slice(), &[w(3), w(2), w(1)]);
    }

    #[test]
    fn test_dup() {
        let mut stack = Stack::new();
        stack.push(w(1)).unwrap();
        stack.push(w(2)).unwrap();
        assert_eq!(stack.dup(2).unwrap(), w(1));
        assert_eq!(stack.as_slice(), &[w(1), w(2), w(1)]);
    }
}
