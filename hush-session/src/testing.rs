//! Shared test fixtures.

use std::sync::Arc;

use async_trait::async_trait;
use hush_core::error::Result;
use hush_core::traits::{EngineFactory, NetworkParameterSource};
use hush_core::types::{AccountAddress, NetworkParameters};
use hush_engine::{MockCoprocessor, MockEngineFactory};

use crate::config::SessionConfig;
use crate::lifecycle::LifecycleController;

pub(crate) const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub(crate) const USER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

/// Serves one fixed parameter set.
pub(crate) struct StaticSource(pub(crate) NetworkParameters);

#[async_trait]
impl NetworkParameterSource for StaticSource {
    async fn fetch_parameters(&self, _rpc_url: &str) -> Result<NetworkParameters> {
        Ok(self.0)
    }
}

pub(crate) fn params() -> NetworkParameters {
    NetworkParameters::new(
        AccountAddress::from_array([0xA1; 20]),
        AccountAddress::from_array([0xA2; 20]),
        AccountAddress::from_array([0xA3; 20]),
    )
}

pub(crate) fn lifecycle_with(factory: Arc<dyn EngineFactory>) -> Arc<LifecycleController> {
    Arc::new(LifecycleController::new(
        &SessionConfig::default(),
        Arc::new(StaticSource(params())),
        factory,
    ))
}

/// A controller that has not been pointed at any network.
pub(crate) fn idle_lifecycle() -> (Arc<LifecycleController>, Arc<MockCoprocessor>) {
    let coprocessor = MockCoprocessor::shared(31337, params());
    let lifecycle = lifecycle_with(Arc::new(MockEngineFactory::new(coprocessor.clone())));
    (lifecycle, coprocessor)
}

/// A controller that is `Ready` on the development chain.
pub(crate) async fn ready_lifecycle() -> (Arc<LifecycleController>, Arc<MockCoprocessor>) {
    let (lifecycle, coprocessor) = idle_lifecycle();
    lifecycle.set_network(Some(31337)).await;
    (lifecycle, coprocessor)
}
