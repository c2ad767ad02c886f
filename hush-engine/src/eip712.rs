//! EIP-712 hashing of user decryption authorizations.
//!
//! The struct definition must match the KMS verifier contract field for
//! field; any drift produces signatures that recover to the wrong address.

use std::borrow::Cow;

use alloy::primitives::{Address, Bytes, Signature, B256, U256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};

use hush_core::constants::EIP712_PRIMARY_TYPE;
use hush_core::error::{HushError, Result};
use hush_core::types::{AccountAddress, TypedMessage, WalletSignature};

sol! {
    /// Authorization for a public key to receive sealed plaintexts of the
    /// listed contracts during the stated window.
    #[derive(Debug, PartialEq)]
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 contractsChainId;
        uint256 startTimestamp;
        uint256 durationDays;
    }
}

pub(crate) fn to_alloy_address(address: &AccountAddress) -> Address {
    Address::from(*address.as_bytes())
}

pub(crate) fn from_alloy_address(address: Address) -> AccountAddress {
    AccountAddress::from_array(address.0 .0)
}

/// Computes the digest a wallet signs for `message`.
pub fn signing_hash(message: &TypedMessage) -> Result<B256> {
    if message.primary_type != EIP712_PRIMARY_TYPE {
        return Err(HushError::SigningError(format!(
            "unsupported primary type {:?}",
            message.primary_type
        )));
    }

    let domain = Eip712Domain::new(
        Some(Cow::Owned(message.domain.name.clone())),
        Some(Cow::Owned(message.domain.version.clone())),
        Some(U256::from(message.domain.chain_id)),
        Some(to_alloy_address(&message.domain.verifying_contract)),
        None,
    );

    let public_key = message.public_key()?;
    let body = &message.message;
    let value = UserDecryptRequestVerification {
        publicKey: Bytes::copy_from_slice(public_key.as_bytes()),
        contractAddresses: body.contract_addresses.iter().map(to_alloy_address).collect(),
        contractsChainId: U256::from(body.contracts_chain_id),
        startTimestamp: U256::from(body.start_timestamp),
        durationDays: U256::from(body.duration_days),
    };

    Ok(value.eip712_signing_hash(&domain))
}

/// Recovers the address that produced `signature` over `message`.
pub fn recover_signer(message: &TypedMessage, signature: &WalletSignature) -> Result<AccountAddress> {
    let hash = signing_hash(message)?;
    let signature = Signature::try_from(signature.as_bytes().as_slice())
        .map_err(|e| HushError::InvalidSignature(e.to_string()))?;
    let address = signature
        .recover_address_from_prehash(&hash)
        .map_err(|e| HushError::InvalidSignature(e.to_string()))?;
    Ok(from_alloy_address(address))
}
