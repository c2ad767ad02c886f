//! Input encryptor.

use std::sync::Arc;

use tracing::{debug, instrument};

use hush_core::constants::{AUXILIARY_INCREMENT, ENCRYPTED_VALUE_BITS};
use hush_core::error::{HushError, Result};
use hush_core::types::{AccountAddress, EncryptedInput};

use crate::lifecycle::LifecycleController;

/// Checks that `value` fits an encrypted 32-bit field.
pub fn field_value(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| HushError::ValueOutOfRange {
        value,
        bits: ENCRYPTED_VALUE_BITS,
    })
}

/// Builds encrypted inputs bound to one contract and submitting user.
///
/// Purely local: no network call is made.
#[derive(Debug)]
pub struct InputEncryptor {
    lifecycle: Arc<LifecycleController>,
}

impl InputEncryptor {
    /// Creates an encryptor over the controller's engine.
    pub fn new(lifecycle: Arc<LifecycleController>) -> Self {
        Self { lifecycle }
    }

    /// Encrypts `value` followed by the auxiliary increment `1`.
    ///
    /// The returned handles are ordered `[value, increment]`, matching the
    /// contract's argument list.
    pub async fn encrypt(&self, contract: &str, user: &str, value: i64) -> Result<EncryptedInput> {
        self.encrypt_values(contract, user, &[value, i64::from(AUXILIARY_INCREMENT)])
            .await
    }

    /// Encrypts each value as a 32-bit field, in order.
    #[instrument(skip(self, values), fields(count = values.len()))]
    pub async fn encrypt_values(&self, contract: &str, user: &str, values: &[i64]) -> Result<EncryptedInput> {
        let handle = self.lifecycle.engine()?;

        let contract = AccountAddress::from_hex(contract)?;
        let user = AccountAddress::from_hex(user)?;
        let fields = values
            .iter()
            .map(|v| field_value(*v))
            .collect::<Result<Vec<u32>>>()?;

        let input = handle.engine().encrypt_input(contract, user, &fields).await?;
        self.lifecycle.ensure_current(&handle)?;

        debug!(chain_id = handle.chain_id(), handles = input.len(), "Built encrypted input");
        Ok(input)
    }
}
