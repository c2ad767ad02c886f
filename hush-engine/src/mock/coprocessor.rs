//! In-process stand-in for the chain-side FHE services.
//!
//! Plays three roles a real deployment splits across contracts and the KMS:
//!
//! - **Input verifier**: accepts an encrypted input only for the
//!   `(contract, user)` pair its proof binds
//! - **ACL**: records which accounts may use or decrypt each ciphertext
//! - **KMS**: releases plaintexts sealed to the requester's public key after
//!   checking the EIP-712 authorization

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use hush_core::constants::{FHE_TYPE_EUINT32, HANDLE_HASH_LEN, HANDLE_VERSION};
use hush_core::error::{HushError, Result};
use hush_core::types::{
    unix_now, AccountAddress, CiphertextHandle, DecryptionRequest, EncryptedInput,
    NetworkParameters, PublicKey, TypedMessage,
};

use crate::eip712::recover_signer;
use crate::hash::{keccak256_multi, DOMAIN_COMPUTED, DOMAIN_INPUT_BINDING, DOMAIN_SEAL};

/// Sealed plaintexts keyed by handle.
pub type SealedValues = HashMap<CiphertextHandle, [u8; 8]>;

/// Shared ciphertext store, ACL and KMS of one mock network.
///
/// Ciphertexts are stored when [`MockEngine`](crate::MockEngine) encrypts an
/// input, before any submission, and are never evicted. A handle only gains
/// ACL entries once its input passes [`MockCoprocessor::verify_input`], so an
/// encrypted but unsubmitted input stays undecryptable and unusable.
pub struct MockCoprocessor {
    chain_id: u64,
    parameters: NetworkParameters,
    ciphertexts: DashMap<CiphertextHandle, u32>,
    acl: DashSet<(CiphertextHandle, AccountAddress)>,
    computed: AtomicU64,
}

impl MockCoprocessor {
    /// Creates an empty coprocessor for one network.
    pub fn new(chain_id: u64, parameters: NetworkParameters) -> Self {
        Self {
            chain_id,
            parameters,
            ciphertexts: DashMap::new(),
            acl: DashSet::new(),
            computed: AtomicU64::new(0),
        }
    }

    /// Creates a coprocessor wrapped for sharing between engines and tests.
    pub fn shared(chain_id: u64, parameters: NetworkParameters) -> Arc<Self> {
        Arc::new(Self::new(chain_id, parameters))
    }

    /// Chain this coprocessor serves.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Parameters this network advertises.
    pub fn network_parameters(&self) -> &NetworkParameters {
        &self.parameters
    }

    /// Number of stored ciphertexts.
    pub fn ciphertext_count(&self) -> usize {
        self.ciphertexts.len()
    }

    pub(crate) fn register(&self, handle: CiphertextHandle, value: u32) {
        self.ciphertexts.insert(handle, value);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INPUT VERIFIER
    // ═══════════════════════════════════════════════════════════════════════════

    /// Verifies an encrypted input submitted by `user` to `contract`.
    ///
    /// On success the handles become usable by the contract and decryptable
    /// by the user, as a contract granting itself and the sender access would.
    pub fn verify_input(
        &self,
        input: &EncryptedInput,
        contract: AccountAddress,
        user: AccountAddress,
    ) -> Result<Vec<CiphertextHandle>> {
        let expected = input_binding(
            self.chain_id,
            &self.parameters.acl_address,
            &contract,
            &user,
            &input.handles,
        );
        if !bool::from(expected.as_slice().ct_eq(input.input_proof.as_slice())) {
            warn!(%contract, %user, "Input proof does not bind this contract and user");
            return Err(HushError::InputRejected(format!(
                "proof does not bind contract {contract} and user {user}"
            )));
        }

        for handle in &input.handles {
            if !self.ciphertexts.contains_key(handle) {
                return Err(HushError::InputRejected(format!("unknown ciphertext {handle}")));
            }
        }

        for handle in &input.handles {
            self.acl.insert((*handle, contract));
            self.acl.insert((*handle, user));
        }

        debug!(%contract, %user, count = input.handles.len(), "Accepted encrypted input");
        Ok(input.handles.clone())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Grants `account` access to `handle`.
    pub fn allow(&self, handle: CiphertextHandle, account: AccountAddress) -> Result<()> {
        if !self.ciphertexts.contains_key(&handle) {
            return Err(HushError::UnknownHandle(handle.to_hex()));
        }
        self.acl.insert((handle, account));
        Ok(())
    }

    /// Returns true if `account` may use `handle`.
    pub fn is_allowed(&self, handle: &CiphertextHandle, account: &AccountAddress) -> bool {
        self.acl.contains(&(*handle, *account))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMPUTATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Homomorphic 32-bit wrapping addition performed by `contract`.
    ///
    /// The result is accessible to the contract only; it must `allow` other
    /// accounts explicitly.
    pub fn add(
        &self,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
        contract: AccountAddress,
    ) -> Result<CiphertextHandle> {
        let a = self.readable_by(lhs, &contract)?;
        let b = self.readable_by(rhs, &contract)?;

        let nonce = self.computed.fetch_add(1, Ordering::Relaxed);
        let digest = keccak256_multi(
            DOMAIN_COMPUTED,
            &[lhs.as_bytes().as_slice(), rhs.as_bytes(), &nonce.to_be_bytes()],
        );
        let mut hash = [0u8; HANDLE_HASH_LEN];
        hash.copy_from_slice(&digest[..HANDLE_HASH_LEN]);
        let result = CiphertextHandle::from_parts(&hash, 0, self.chain_id, FHE_TYPE_EUINT32, HANDLE_VERSION);

        self.register(result, a.wrapping_add(b));
        self.acl.insert((result, contract));
        Ok(result)
    }

    fn readable_by(&self, handle: &CiphertextHandle, account: &AccountAddress) -> Result<u32> {
        if !self.is_allowed(handle, account) {
            return Err(HushError::UnknownHandle(handle.to_hex()));
        }
        self.ciphertexts
            .get(handle)
            .map(|v| *v)
            .ok_or_else(|| HushError::UnknownHandle(handle.to_hex()))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // KMS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Releases the requested plaintexts sealed to `public_key`.
    pub fn user_decrypt(&self, request: &DecryptionRequest, public_key: &PublicKey) -> Result<SealedValues> {
        self.user_decrypt_at(request, public_key, unix_now())
    }

    /// [`Self::user_decrypt`] evaluated at a given unix time.
    ///
    /// Checks, in order: the signature recovers to the requesting user over
    /// the exact `(public key, contracts, window)` it claims; `now` lies in
    /// the window; every handle belongs to a named contract, lives on this
    /// chain, and is accessible to both the user and its contract.
    pub fn user_decrypt_at(
        &self,
        request: &DecryptionRequest,
        public_key: &PublicKey,
        now: u64,
    ) -> Result<SealedValues> {
        let message = TypedMessage::user_decrypt(
            public_key,
            &request.contract_addresses,
            self.chain_id,
            self.parameters.kms_verifier_address,
            request.window,
        );

        let signer = recover_signer(&message, &request.signature)
            .map_err(|e| HushError::UnauthorizedSignature(e.to_string()))?;
        if signer != request.user_address {
            warn!(%signer, user = %request.user_address, "Authorization signed by another account");
            return Err(HushError::UnauthorizedSignature(format!(
                "signature recovers to {signer}, not {}",
                request.user_address
            )));
        }

        if !request.window.contains(now) {
            return Err(HushError::AuthorizationExpired {
                start: request.window.start_timestamp,
                end: request.window.end_timestamp(),
                now,
            });
        }

        let mut sealed = SealedValues::with_capacity(request.handles.len());
        for entry in &request.handles {
            let handle = entry.handle;
            let in_scope = request.contract_addresses.contains(&entry.contract_address)
                && handle.chain_id() == self.chain_id
                && self.is_allowed(&handle, &request.user_address);
            if !in_scope {
                return Err(HushError::UnknownHandle(handle.to_hex()));
            }

            let value = self.readable_by(&handle, &entry.contract_address)?;
            sealed.insert(handle, seal(u64::from(value), public_key, &handle));
        }

        debug!(user = %request.user_address, count = sealed.len(), "Released sealed plaintexts");
        Ok(sealed)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDING AND SEALING
// ═══════════════════════════════════════════════════════════════════════════════

/// Digest binding input handles to `(chain, acl, contract, user)`.
pub(crate) fn input_binding(
    chain_id: u64,
    acl: &AccountAddress,
    contract: &AccountAddress,
    user: &AccountAddress,
    handles: &[CiphertextHandle],
) -> [u8; 32] {
    let joined: Vec<u8> = handles.iter().flat_map(|h| h.as_bytes().iter().copied()).collect();
    keccak256_multi(
        DOMAIN_INPUT_BINDING,
        &[
            chain_id.to_be_bytes().as_slice(),
            acl.as_bytes(),
            contract.as_bytes(),
            user.as_bytes(),
            &joined,
        ],
    )
}

fn seal_pad(public_key: &PublicKey, handle: &CiphertextHandle) -> [u8; 8] {
    let digest = keccak256_multi(DOMAIN_SEAL, &[public_key.as_bytes(), handle.as_bytes()]);
    let mut pad = [0u8; 8];
    pad.copy_from_slice(&digest[..8]);
    pad
}

fn seal(value: u64, public_key: &PublicKey, handle: &CiphertextHandle) -> [u8; 8] {
    let pad = seal_pad(public_key, handle);
    let mut out = value.to_be_bytes();
    out.iter_mut().zip(pad).for_each(|(b, p)| *b ^= p);
    out
}

pub(crate) fn unseal(sealed: &[u8; 8], public_key: &PublicKey, handle: &CiphertextHandle) -> u64 {
    let pad = seal_pad(public_key, handle);
    let mut out = *sealed;
    out.iter_mut().zip(pad).for_each(|(b, p)| *b ^= p);
    u64::from_be_bytes(out)
}
