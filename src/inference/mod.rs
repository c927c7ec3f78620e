//! Staged (coldstart/warm) SPARQL Update inference over window results.

pub mod configurator;
pub mod staged;
pub mod store;

pub use configurator::Configurator;
pub use staged::{InferenceOutcome, Stage, StagedInferenceEngine, StreamState, UpdateProgram};
pub use store::PersistentStore;
