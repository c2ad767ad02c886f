//! `EncryptionEngine` backed by a [`MockCoprocessor`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::debug;

use hush_core::constants::{FHE_TYPE_EUINT32, HANDLE_HASH_LEN, HANDLE_VERSION};
use hush_core::error::{HushError, Result};
use hush_core::traits::{EncryptionEngine, EngineFactory};
use hush_core::types::{
    AccountAddress, AuthorizationWindow, CiphertextHandle, DecryptedValues, DecryptionRequest,
    EncryptedInput, Keypair, NetworkParameters, PrivateKey, PublicKey, TypedMessage,
};

use super::coprocessor::{input_binding, unseal, MockCoprocessor};
use crate::hash::{keccak256_multi, DOMAIN_HANDLE, DOMAIN_PUBLIC_KEY};

/// Private key length of mock keypairs.
const MOCK_PRIVATE_KEY_SIZE: usize = 32;

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Mock engine for the network served by one coprocessor.
pub struct MockEngine {
    coprocessor: Arc<MockCoprocessor>,
}

impl MockEngine {
    /// Creates an engine bound to `coprocessor`.
    pub fn new(coprocessor: Arc<MockCoprocessor>) -> Self {
        Self { coprocessor }
    }

    /// The coprocessor ciphertexts are registered with.
    pub fn coprocessor(&self) -> &Arc<MockCoprocessor> {
        &self.coprocessor
    }
}

fn derive_public_key(private_key: &[u8]) -> [u8; 32] {
    keccak256_multi(DOMAIN_PUBLIC_KEY, &[private_key])
}

#[async_trait]
impl EncryptionEngine for MockEngine {
    fn chain_id(&self) -> u64 {
        self.coprocessor.chain_id()
    }

    fn network_parameters(&self) -> &NetworkParameters {
        self.coprocessor.network_parameters()
    }

    async fn encrypt_input(
        &self,
        contract: AccountAddress,
        user: AccountAddress,
        values: &[u32],
    ) -> Result<EncryptedInput> {
        if values.is_empty() {
            return Err(HushError::InputRejected("no values to encrypt".into()));
        }
        let index_limit = usize::from(u8::MAX) + 1;
        if values.len() > index_limit {
            return Err(HushError::InputRejected(format!(
                "at most {index_limit} values per input, got {}",
                values.len()
            )));
        }

        let chain_id = self.chain_id();
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut handles = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            let index = index as u8;
            let digest = keccak256_multi(
                DOMAIN_HANDLE,
                &[nonce.as_slice(), contract.as_bytes(), user.as_bytes(), &[index]],
            );
            let mut hash = [0u8; HANDLE_HASH_LEN];
            hash.copy_from_slice(&digest[..HANDLE_HASH_LEN]);

            let handle = CiphertextHandle::from_parts(&hash, index, chain_id, FHE_TYPE_EUINT32, HANDLE_VERSION);
            self.coprocessor.register(handle, *value);
            handles.push(handle);
        }

        let acl = self.network_parameters().acl_address;
        let proof = input_binding(chain_id, &acl, &contract, &user, &handles);
        debug!(%contract, %user, count = handles.len(), "Encrypted input");
        Ok(EncryptedInput::new(handles, proof.to_vec()))
    }

    fn create_authorization_message(
        &self,
        public_key: &PublicKey,
        contracts: &[AccountAddress],
        window: AuthorizationWindow,
    ) -> Result<TypedMessage> {
        if contracts.is_empty() {
            return Err(HushError::InvalidAddress("authorization names no contract".into()));
        }
        Ok(TypedMessage::user_decrypt(
            public_key,
            contracts,
            self.chain_id(),
            self.network_parameters().kms_verifier_address,
            window,
        ))
    }

    fn generate_keypair(&self) -> Result<Keypair> {
        let mut secret = [0u8; MOCK_PRIVATE_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut secret);

        let public_key = PublicKey::from_bytes(&derive_public_key(&secret))?;
        let private_key = PrivateKey::from_bytes(&secret)?;
        Ok(Keypair::new(public_key, private_key))
    }

    async fn decrypt(&self, request: &DecryptionRequest, keypair: &Keypair) -> Result<DecryptedValues> {
        let expected = derive_public_key(keypair.private_key.as_bytes());
        if !bool::from(expected.as_slice().ct_eq(keypair.public_key.as_bytes())) {
            return Err(HushError::KeyStorageError("keypair halves do not match".into()));
        }

        let sealed = self.coprocessor.user_decrypt(request, &keypair.public_key)?;
        Ok(sealed
            .iter()
            .map(|(handle, value)| (*handle, unseal(value, &keypair.public_key, handle)))
            .collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FACTORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds [`MockEngine`]s for the network a coprocessor serves.
///
/// Construction fails if the requested chain or parameters differ from the
/// coprocessor's, the way a real engine fails to load foreign key material.
pub struct MockEngineFactory {
    coprocessor: Arc<MockCoprocessor>,
    created: AtomicUsize,
}

impl MockEngineFactory {
    /// Creates a factory for `coprocessor`.
    pub fn new(coprocessor: Arc<MockCoprocessor>) -> Self {
        Self {
            coprocessor,
            created: AtomicUsize::new(0),
        }
    }

    /// Number of engines built so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn create(
        &self,
        chain_id: u64,
        parameters: NetworkParameters,
    ) -> Result<Arc<dyn EncryptionEngine>> {
        if chain_id != self.coprocessor.chain_id() {
            return Err(HushError::ConfigError(format!(
                "no engine for chain {chain_id}"
            )));
        }
        if &parameters != self.coprocessor.network_parameters() {
            return Err(HushError::ConfigError(
                "network parameters do not match this network".into(),
            ));
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockEngine::new(self.coprocessor.clone())))
    }
}
