//! Network parameters resolved from the relayer metadata side channel.

use serde::{Deserialize, Serialize};

use super::AccountAddress;

/// Trust-anchor contract addresses of the connected network.
///
/// Immutable once fetched; re-fetched whenever the active network changes.
/// Field names on the wire follow the relayer metadata response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkParameters {
    /// Access control list contract
    #[serde(rename = "ACLAddress")]
    pub acl_address: AccountAddress,
    /// Input verifier contract (checks encrypted input proofs)
    #[serde(rename = "InputVerifierAddress")]
    pub input_verifier_address: AccountAddress,
    /// KMS verifier contract (anchors decryption authorizations)
    #[serde(rename = "KMSVerifierAddress")]
    pub kms_verifier_address: AccountAddress,
}

impl NetworkParameters {
    /// Creates a new parameter set.
    pub fn new(
        acl_address: AccountAddress,
        input_verifier_address: AccountAddress,
        kms_verifier_address: AccountAddress,
    ) -> Self {
        Self {
            acl_address,
            input_verifier_address,
            kms_verifier_address,
        }
    }
}
