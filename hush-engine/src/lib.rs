//! # HUSH Engine
//!
//! Signing-side cryptography and a reference encryption engine for HUSH.
//!
//! This crate provides:
//!
//! - **EIP-712**: struct hashing of user decryption authorizations
//! - **Wallet**: a local secp256k1 signer implementing `TypedDataSigner`
//! - **Mock**: an in-process coprocessor standing in for the chain-side
//!   input verifier, ACL and KMS, plus an `EncryptionEngine` bound to it
//!
//! The mock engine is not confidential. It reproduces the protocol surface
//! (handle layout, input binding, authorization checks, sealed responses)
//! so the coordinator can be exercised end to end without a node.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hush_engine::{LocalWallet, MockCoprocessor, MockEngineFactory};
//!
//! let coprocessor = MockCoprocessor::shared(31337, params);
//! let factory = MockEngineFactory::new(coprocessor.clone());
//! let wallet = LocalWallet::random();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod eip712;
pub mod hash;
pub mod mock;
pub mod wallet;

pub use eip712::{recover_signer, signing_hash};
pub use mock::{MockCoprocessor, MockEngine, MockEngineFactory};
pub use wallet::LocalWallet;
