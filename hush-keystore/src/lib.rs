//! # HUSH Keystore
//!
//! Durable storage of the client decryption keypair.
//!
//! This crate provides two storage backends and the store that guards them:
//!
//! - **Memory**: in-process storage for tests and short-lived sessions
//! - **File**: a JSON file of `key → { publicKey, privateKey }`, written
//!   atomically
//! - **KeypairStore**: `ensure_keypair` with a single check-generate-store
//!   critical section, so concurrent first callers share one keypair
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hush_keystore::{FileKeyStorage, KeypairStore};
//!
//! let storage = FileKeyStorage::open("~/.hush/keystore.json").await?;
//! let store = KeypairStore::new(Arc::new(storage));
//! let keypair = store.ensure_keypair(engine.as_ref()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod file;
mod memory;
mod store;

pub use file::FileKeyStorage;
pub use memory::MemoryKeyStorage;
pub use store::KeypairStore;

// Re-export the trait from core
pub use hush_core::traits::KeypairStorage;
