//! Relayer metadata client.
//!
//! Issues the reserved `fhevm_relayer_metadata` JSON-RPC call against the
//! node endpoint and decodes the three trust-anchor addresses it returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use hush_core::constants::{DEFAULT_RPC_URL, RELAYER_METADATA_METHOD};
use hush_core::error::{HushError, Result};
use hush_core::traits::NetworkParameterSource;
use hush_core::types::{AccountAddress, NetworkParameters};

/// Relayer client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// JSON-RPC endpoint of the node
    pub rpc_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            timeout_seconds: 30,
        }
    }
}

impl RelayerConfig {
    /// Creates a new configuration with the given RPC URL.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ..Default::default()
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Client for the relayer metadata side channel.
///
/// Makes exactly one request per resolution and never retries.
pub struct RelayerClient {
    config: RelayerConfig,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl RelayerClient {
    /// Creates a client for the given RPC URL with default settings.
    pub fn new(rpc_url: impl Into<String>) -> Result<Self> {
        Self::with_config(RelayerConfig::new(rpc_url))
    }

    /// Creates a client with custom configuration.
    pub fn with_config(config: RelayerConfig) -> Result<Self> {
        url::Url::parse(&config.rpc_url)
            .map_err(|e| HushError::ConfigError(format!("invalid RPC URL {:?}: {e}", config.rpc_url)))?;

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| HushError::ConfigError(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RelayerConfig {
        &self.config
    }

    /// Resolves the parameters of the configured endpoint.
    pub async fn resolve(&self) -> Result<NetworkParameters> {
        self.resolve_at(&self.config.rpc_url).await
    }

    /// Resolves the parameters advertised by `rpc_url`.
    #[instrument(skip(self))]
    pub async fn resolve_at(&self, rpc_url: &str) -> Result<NetworkParameters> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": RELAYER_METADATA_METHOD,
            "params": []
        });

        let response = self
            .http_client
            .post(rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| HushError::UnreachableEndpoint {
                url: rpc_url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(rpc_url, %status, "Relayer metadata call failed");
            return Err(HushError::UnreachableEndpoint {
                url: rpc_url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| HushError::MalformedMetadata(format!("undecodable response: {e}")))?;

        if let Some(error) = body.error {
            warn!(rpc_url, error = %error, "Relayer metadata RPC error");
        }

        let result = match body.result {
            Some(value) if !value.is_null() => value,
            _ => return Err(HushError::MalformedMetadata("response has no result".into())),
        };

        let params = NetworkParameters::new(
            address_field(&result, "ACLAddress")?,
            address_field(&result, "InputVerifierAddress")?,
            address_field(&result, "KMSVerifierAddress")?,
        );

        debug!(
            acl = %params.acl_address,
            kms_verifier = %params.kms_verifier_address,
            "Resolved relayer metadata"
        );
        Ok(params)
    }
}

/// Extracts one required address from the metadata object.
fn address_field(result: &serde_json::Value, name: &str) -> Result<AccountAddress> {
    let raw = result
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HushError::MalformedMetadata(format!("missing {name}")))?;

    AccountAddress::from_hex(raw).map_err(|e| HushError::MalformedMetadata(format!("{name}: {e}")))
}

#[async_trait]
impl NetworkParameterSource for RelayerClient {
    async fn fetch_parameters(&self, rpc_url: &str) -> Result<NetworkParameters> {
        self.resolve_at(rpc_url).await
    }
}
