//! Replays recorded IoT sensor readings as an RDF stream, runs a continuous
//! query per inference stream over time windows of it, and applies staged
//! (coldstart, then warm) SPARQL Update programs to every window result.
//! Everything inferred accumulates in one [`PersistentStore`].

pub mod annotator;
pub mod engine;
pub mod error;
pub mod inference;
pub mod merger;
pub mod modeller;
pub mod pipeline;
pub mod quad_container;
pub mod reading;
pub mod simulator;
pub mod slicer;
pub mod sources;
pub mod time_range;
pub mod vocab;
pub mod windowing;

pub use annotator::{Annotate, FixedFoi, FoiAnnotator, NoAnnotation};
pub use engine::{RSPEngine, RSPQLParser, WindowResult};
pub use error::{IotStreamsError, Result};
pub use inference::{
    Configurator, InferenceOutcome, PersistentStore, Stage, StagedInferenceEngine, StreamState,
};
pub use merger::ReadingMerger;
pub use modeller::SsnModeller;
pub use pipeline::{Pipeline, RunOutput, SourceBinding};
pub use quad_container::QuadContainer;
pub use reading::{Reading, SensorKind};
pub use simulator::Simulator;
pub use time_range::{DEFAULT_TIME_ZONE, TimeRange};
pub use windowing::{CSPARQLWindow, WindowInstance};
