//! # HUSH Session
//!
//! Client-side coordination of encrypted inputs and decryption
//! authorizations for confidential contracts.
//!
//! This crate provides:
//!
//! - **Lifecycle**: resolves network parameters and owns the engine handle,
//!   discarding results superseded by a later network switch
//! - **Encryptor**: builds contract- and user-bound encrypted inputs
//! - **Authorization**: builds unsigned, time-bounded, contract-scoped
//!   EIP-712 authorizations
//! - **Decryption**: exchanges a signed authorization for plaintexts
//! - **Session**: one façade wiring all of the above
//!
//! ## Example
//!
//! ```rust,ignore
//! use hush_session::{HushSession, SessionConfig};
//!
//! let session = HushSession::with_relayer(SessionConfig::from_env()?, factory, storage)?;
//! session.set_network(Some(31337)).await;
//!
//! let input = session.encrypt(contract, user, 7).await?;
//! // submit input.handles + input.input_proof to the contract
//!
//! let artifact = session.build_authorization(contract).await?;
//! let signature = wallet.sign_typed_message(&artifact.typed_message).await?;
//! let values = session.request_with_artifact(&artifact, user, signature, &handles).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod authorization;
pub mod config;
pub mod decryption;
pub mod encryptor;
pub mod lifecycle;
pub mod session;

pub use authorization::AuthorizationBuilder;
pub use config::SessionConfig;
pub use decryption::{AggregateResult, DecryptionRequester};
pub use encryptor::{field_value, InputEncryptor};
pub use lifecycle::{EngineHandle, LifecycleController, LifecycleState, Readiness};
pub use session::HushSession;

#[cfg(test)]
mod testing;
