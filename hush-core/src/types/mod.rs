//! Domain types for HUSH.
//!
//! This module provides the data structures exchanged between the coordinator,
//! the encryption engine, the wallet and the contract boundary:
//!
//! - [`AccountAddress`]: 20-byte contract / user identifier
//! - [`NetworkParameters`]: trust-anchor addresses of the connected network
//! - [`Keypair`]: client-held decryption keypair
//! - [`CiphertextHandle`], [`EncryptedInput`]: encrypted values and their binding proof
//! - [`TypedMessage`], [`AuthorizationArtifact`], [`DecryptionRequest`]: authorization flow

mod address;
mod authorization;
mod handle;
mod keys;
mod network;

pub use address::*;
pub use authorization::*;
pub use handle::*;
pub use keys::*;
pub use network::*;
