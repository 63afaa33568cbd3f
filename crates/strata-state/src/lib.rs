//! # strata-state
//!
//! Versioned account state for Strata.
//!
//! This crate provides:
//! - The [`Repository`] trait with balance, nonce, code and storage operations
//! - [`Tracked`] copy-on-write snapshots with commit/rollback
//! - [`StateDb`], the trie-backed root state with a Merkle root hash
//! - An optional RocksDB node store (`rocksdb` feature)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod account;
#[cfg(feature = "rocksdb")]
pub mod db;
pub mod error;
pub mod repository;
pub mod state;
pub mod tracked;

pub use account::{Account, EMPTY_CODE_HASH, EMPTY_STORAGE_ROOT};
#[cfg(feature = "rocksdb")]
pub use db::{DbConfig, RocksNodeStore};
pub use error::{StateError, StateResult};
pub use repository::Repository;
pub use state::StateDb;
pub use tracked::{StateChanges, Tracked};
