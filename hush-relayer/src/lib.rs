//! # HUSH Relayer
//!
//! Resolves the cryptographic public parameters of the connected network
//! through the relayer metadata JSON-RPC side channel.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hush_relayer::RelayerClient;
//!
//! let client = RelayerClient::new("http://localhost:8545")?;
//! let params = client.resolve().await?;
//! println!("ACL at {}", params.acl_address);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod relayer;

pub use relayer::{RelayerClient, RelayerConfig};
