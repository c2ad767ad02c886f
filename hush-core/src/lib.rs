//! # HUSH Core
//!
//! Core types, errors, and capability traits for the HUSH encrypted-input and
//! decryption-authorization coordinator.
//!
//! This crate provides the foundational building blocks used by all other HUSH crates:
//!
//! - **Types**: account addresses, network parameters, keypairs, ciphertext handles,
//!   encrypted inputs, typed authorization messages and decryption requests
//! - **Errors**: one error enum classified into a small taxonomy
//! - **Constants**: network ids, wire method names, policy defaults
//! - **Traits**: the opaque encryption-engine capability and its collaborators
//!
//! ## Example
//!
//! ```rust
//! use hush_core::{AccountAddress, AuthorizationWindow};
//!
//! let contract = AccountAddress::from_hex("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap();
//! let window = AuthorizationWindow::with_default_duration(1_700_000_000);
//! assert_eq!(window.duration_seconds(), 31_536_000);
//! assert_eq!(contract.to_string(), "0x5FbDB2315678afecb367f032d93F642f64180aa3");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{ErrorCategory, HushError, Result};
pub use traits::*;
pub use types::*;
