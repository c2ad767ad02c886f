//! Mock FHE network: coprocessor, engine, and engine factory.

mod coprocessor;
mod engine;

pub use coprocessor::{MockCoprocessor, SealedValues};
pub use engine::{MockEngine, MockEngineFactory};
