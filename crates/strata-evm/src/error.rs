//! Interpreter error and outcome types

use strata_primitives::Address;
use strata_state::StateError;
use thiserror::Error;

use crate::substate::Substate;

/// Interpreter errors.
///
/// Everything except [`EvmError::State`] and [`EvmError::Internal`] is an
/// exception of the current frame: the frame's gas is consumed and its
/// snapshot discarded, but execution of the caller continues.
#[derive(Debug, Error)]
pub enum EvmError {
    /// Out of gas
    #[error("out of gas")]
    OutOfGas,

    /// Stack underflow
    #[error("stack underflow")]
    StackUnderflow,

    /// Stack overflow
    #[error("stack overflow (max 1024)")]
    StackOverflow,

    /// Invalid jump destination
    #[error("invalid jump destination: {0}")]
    InvalidJump(usize),

    /// Undefined, disabled or designated-invalid opcode
    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),

    /// Write in static context
    #[error("state modification in static context")]
    StaticCallViolation,

    /// Return data out of bounds
    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,

    /// Contract creation collision
    #[error("contract address collision at {0}")]
    CreateCollision(Address),

    /// Deployed code above the size limit
    #[error("max code size exceeded: {0} bytes")]
    MaxCodeSizeExceeded(usize),

    /// REVERT with data; becomes [`ExitStatus::Reverted`]
    #[error("execution reverted")]
    Revert(Vec<u8>),

    /// State backend failure
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Broken interpreter invariant
    #[error("internal error: {0}")]
    Internal(String),
}

impl EvmError {
    /// Fatal errors abort the whole transaction instead of failing a frame
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvmError::State(_) | EvmError::Internal(_))
    }
}

/// Result type for interpreter operations
pub type EvmResult<T> = Result<T, EvmError>;

/// Final state of a frame
#[derive(Debug)]
pub enum ExitStatus {
    /// STOP, RETURN, SELFDESTRUCT or end of code
    Halted,
    /// REVERT: state discarded, unused gas returned
    Reverted,
    /// Exceptional halt: state discarded, all gas consumed
    Exception(EvmError),
}

impl ExitStatus {
    /// Check if the frame halted normally
    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Halted)
    }
}

/// Outcome of a call or create frame
#[derive(Debug)]
pub struct FrameResult {
    /// How the frame ended
    pub status: ExitStatus,
    /// Gas returned to the caller
    pub gas_left: u64,
    /// Return or revert data; empty after an exception
    pub output: Vec<u8>,
    /// Effects to merge into the caller; empty unless halted
    pub substate: Substate,
    /// Address of the created contract
    pub created: Option<Address>,
}

impl FrameResult {
    /// Normal halt
    pub fn halted(gas_left: u64, output: Vec<u8>, substate: Substate) -> Self {
        Self {
            status: ExitStatus::Halted,
            gas_left,
            output,
            substate,
            created: None,
        }
    }

    /// Revert keeping the unused gas and the revert data
    pub fn reverted(gas_left: u64, output: Vec<u8>) -> Self {
        Self {
            status: ExitStatus::Reverted,
            gas_left,
            output,
            substate: Substate::default(),
            created: None,
        }
    }

    /// Exceptional halt consuming all gas
    pub fn exception(error: EvmError) -> Self {
        Self {
            status: ExitStatus::Exception(error),
            gas_left: 0,
            output: Vec::new(),
            substate: Substate::default(),
            created: None,
        }
    }

    /// Check if the frame halted normally
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
