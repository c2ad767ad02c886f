//! Session configuration.

use serde::{Deserialize, Serialize};

use hush_core::constants::{
    DEFAULT_AUTHORIZATION_DAYS, DEFAULT_RPC_URL, KEYPAIR_STORAGE_KEY, SUPPORTED_CHAIN_ID,
};
use hush_core::error::{HushError, Result};
use hush_relayer::RelayerConfig;

/// Settings shared by every component of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// JSON-RPC endpoint of the node
    pub rpc_url: String,
    /// The one chain id the coordinator activates on
    pub supported_chain_id: u64,
    /// Storage key of the client keypair
    pub keypair_storage_key: String,
    /// Validity of new authorizations, in days
    pub authorization_duration_days: u32,
    /// Timeout of the relayer metadata call
    pub request_timeout_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            supported_chain_id: SUPPORTED_CHAIN_ID,
            keypair_storage_key: KEYPAIR_STORAGE_KEY.into(),
            authorization_duration_days: DEFAULT_AUTHORIZATION_DAYS,
            request_timeout_seconds: 30,
        }
    }
}

impl SessionConfig {
    /// Reads settings from the environment, loading `.env` first.
    ///
    /// | Variable                  | Field                         |
    /// |---------------------------|-------------------------------|
    /// | `HUSH_RPC_URL`            | `rpc_url`                     |
    /// | `HUSH_CHAIN_ID`           | `supported_chain_id`          |
    /// | `HUSH_KEYPAIR_KEY`        | `keypair_storage_key`         |
    /// | `HUSH_AUTH_DURATION_DAYS` | `authorization_duration_days` |
    /// | `HUSH_RPC_TIMEOUT_SECS`   | `request_timeout_seconds`     |
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            rpc_url: lookup("HUSH_RPC_URL").unwrap_or(defaults.rpc_url),
            supported_chain_id: parse_var(&lookup, "HUSH_CHAIN_ID")?
                .unwrap_or(defaults.supported_chain_id),
            keypair_storage_key: lookup("HUSH_KEYPAIR_KEY").unwrap_or(defaults.keypair_storage_key),
            authorization_duration_days: parse_var(&lookup, "HUSH_AUTH_DURATION_DAYS")?
                .unwrap_or(defaults.authorization_duration_days),
            request_timeout_seconds: parse_var(&lookup, "HUSH_RPC_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout_seconds),
        })
    }

    /// Sets the RPC endpoint.
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    /// Sets the authorization validity in days.
    pub fn with_authorization_days(mut self, days: u32) -> Self {
        self.authorization_duration_days = days;
        self
    }

    /// Configuration for the relayer metadata client.
    pub fn relayer_config(&self) -> RelayerConfig {
        RelayerConfig::new(self.rpc_url.clone()).with_timeout(self.request_timeout_seconds)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| HushError::ConfigError(format!("{name} is not a valid number: {raw:?}")))
        })
        .transpose()
}
