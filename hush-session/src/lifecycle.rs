//! Network lifecycle controller.
//!
//! Owns the engine handle of the active network. A network switch starts a
//! new generation; a resolution that completes after a newer one started is
//! dropped instead of applied.
//!
//! ```text
//! set_network(Some(31337))         set_network(None | Some(other))
//!        ↓                                  ↓
//!    Resolving ──ok──→ Ready              Idle
//!        └────err───→ Failed
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use hush_core::error::{HushError, Result};
use hush_core::traits::{EncryptionEngine, EngineFactory, NetworkParameterSource};
use hush_core::types::NetworkParameters;

use crate::config::SessionConfig;

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE HANDLE
// ═══════════════════════════════════════════════════════════════════════════════

/// An encryption engine scoped to one `(chain, parameters)` pair.
///
/// Cheap to clone. Operations holding a handle see its parameters as fixed
/// even if the controller moves on to another network.
#[derive(Clone)]
pub struct EngineHandle {
    chain_id: u64,
    parameters: NetworkParameters,
    engine: Arc<dyn EncryptionEngine>,
    generation: u64,
}

impl EngineHandle {
    /// Chain the engine serves.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Parameters the engine was built from.
    pub fn parameters(&self) -> &NetworkParameters {
        &self.parameters
    }

    /// The engine itself.
    pub fn engine(&self) -> &dyn EncryptionEngine {
        self.engine.as_ref()
    }

    /// Lifecycle generation that produced this handle.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("chain_id", &self.chain_id)
            .field("parameters", &self.parameters)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of the controller.
#[derive(Clone, Debug)]
pub enum LifecycleState {
    /// No supported network selected
    Idle,
    /// Fetching parameters and building the engine
    Resolving {
        /// Chain being resolved
        chain_id: u64,
    },
    /// Engine available
    Ready(EngineHandle),
    /// Resolution failed; no retry is attempted
    Failed {
        /// Chain whose resolution failed
        chain_id: u64,
        /// The triggering error
        error: Arc<HushError>,
    },
}

impl LifecycleState {
    /// Observable summary of this state.
    pub fn readiness(&self) -> Readiness {
        match self {
            Self::Idle => Readiness::default(),
            Self::Resolving { .. } => Readiness {
                loading: true,
                ..Readiness::default()
            },
            Self::Ready(_) => Readiness {
                ready: true,
                ..Readiness::default()
            },
            Self::Failed { error, .. } => Readiness {
                error: Some(error.clone()),
                ..Readiness::default()
            },
        }
    }

    /// Returns the engine handle if ready.
    pub fn handle(&self) -> Option<&EngineHandle> {
        match self {
            Self::Ready(handle) => Some(handle),
            _ => None,
        }
    }
}

/// `{ ready, loading, error }` view of the lifecycle.
#[derive(Clone, Debug, Default)]
pub struct Readiness {
    /// An engine handle exists
    pub ready: bool,
    /// A resolution is in flight
    pub loading: bool,
    /// Error of the last failed resolution
    pub error: Option<Arc<HushError>>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Drives `Idle → Resolving → Ready | Failed` as the active network changes.
pub struct LifecycleController {
    rpc_url: String,
    supported_chain_id: u64,
    source: Arc<dyn NetworkParameterSource>,
    factory: Arc<dyn EngineFactory>,
    generation: AtomicU64,
    state: watch::Sender<LifecycleState>,
}

impl LifecycleController {
    /// Creates an idle controller.
    pub fn new(
        config: &SessionConfig,
        source: Arc<dyn NetworkParameterSource>,
        factory: Arc<dyn EngineFactory>,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            rpc_url: config.rpc_url.clone(),
            supported_chain_id: config.supported_chain_id,
            source,
            factory,
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Switches to `chain_id` and resolves its engine.
    ///
    /// Unsupported or absent chains leave the controller `Idle` without an
    /// error. Returns the readiness observed once this call finishes, which
    /// reflects a newer call if one superseded this one.
    #[instrument(skip(self))]
    pub async fn set_network(&self, chain_id: Option<u64>) -> Readiness {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let chain_id = match chain_id {
            Some(id) if id == self.supported_chain_id => id,
            other => {
                info!(chain_id = ?other, generation, "Unsupported network, staying idle");
                self.publish(generation, LifecycleState::Idle);
                return self.readiness();
            }
        };

        self.publish(generation, LifecycleState::Resolving { chain_id });

        let next = match self.resolve(chain_id, generation).await {
            Ok(handle) => {
                info!(chain_id, generation, "Encryption engine ready");
                LifecycleState::Ready(handle)
            }
            Err(error) => {
                warn!(chain_id, generation, %error, "Engine resolution failed");
                LifecycleState::Failed {
                    chain_id,
                    error: Arc::new(error),
                }
            }
        };

        if !self.publish(generation, next) {
            debug!(chain_id, generation, "Discarded superseded resolution");
        }
        self.readiness()
    }

    async fn resolve(&self, chain_id: u64, generation: u64) -> Result<EngineHandle> {
        let parameters = self.source.fetch_parameters(&self.rpc_url).await?;
        self.check_generation(generation)?;

        let engine = self.factory.create(chain_id, parameters).await?;
        Ok(EngineHandle {
            chain_id,
            parameters,
            engine,
            generation,
        })
    }

    /// Replaces the state if `generation` is still current.
    fn publish(&self, generation: u64, next: LifecycleState) -> bool {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *state = next;
            true
        })
    }

    /// Drops the engine handle and returns to `Idle`.
    ///
    /// In-flight operations of the old generation fail with `StaleNetwork`.
    pub fn teardown(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.publish(generation, LifecycleState::Idle);
        debug!(generation, "Lifecycle torn down");
    }

    /// Current readiness.
    pub fn readiness(&self) -> Readiness {
        self.state.borrow().readiness()
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Current generation number.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The engine handle, or `EngineNotReady` unless `Ready`.
    pub fn engine(&self) -> Result<EngineHandle> {
        self.state
            .borrow()
            .handle()
            .cloned()
            .ok_or(HushError::EngineNotReady)
    }

    /// Returns true if `handle` belongs to the current generation.
    pub fn is_current(&self, handle: &EngineHandle) -> bool {
        handle.generation == self.generation()
    }

    /// Fails with `StaleNetwork` if `handle` was superseded.
    pub fn ensure_current(&self, handle: &EngineHandle) -> Result<()> {
        self.check_generation(handle.generation)
    }

    fn check_generation(&self, generation: u64) -> Result<()> {
        let current = self.generation();
        if current != generation {
            return Err(HushError::StaleNetwork {
                expected: generation,
                current,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("rpc_url", &self.rpc_url)
            .field("supported_chain_id", &self.supported_chain_id)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
