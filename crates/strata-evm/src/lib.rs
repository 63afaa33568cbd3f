//! # strata-evm
//!
//! Bytecode interpreter for Strata.
//!
//! This crate provides:
//! - [`Word`], the 256-bit machine word
//! - [`ResourcePolicy`] and [`ProtocolSchedule`]: per-upgrade gas prices and feature flags
//! - [`Evm`], the interpreter with the CALL/CREATE family and precompiles
//! - [`Tracer`] hooks for observing stack, memory and storage activity

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod gas;
pub mod interpreter;
pub mod memory;
pub mod opcode;
pub mod policy;
pub mod precompiles;
pub mod stack;
pub mod storage;
pub mod substate;
pub mod system;
pub mod tracer;
pub mod word;

pub use context::{BlockContext, CallKind, Message, TxContext};
pub use error::{EvmError, EvmResult, ExitStatus, FrameResult};
pub use gas::GasSchedule;
pub use interpreter::Evm;
pub use opcode::Opcode;
pub use policy::{ForkRules, ProtocolSchedule, ResourcePolicy, Upgrade};
pub use precompiles::Precompile;
pub use substate::Substate;
pub use system::{create2_address, create_address};
pub use tracer::{StructLogger, TraceEvent, Tracer};
pub use word::Word;
