use crate::annotator::Annotate;
use crate::engine::RSPEngine;
use crate::error::{IotStreamsError, Result};
use crate::inference::{Configurator, PersistentStore, StagedInferenceEngine};
use crate::modeller::SsnModeller;
use crate::simulator::Simulator;
use crate::sources::ReadingSource;
use crate::time_range::TimeRange;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::info;

/// A source together with the annotation its readings get.
pub struct SourceBinding {
    pub source: Box<dyn ReadingSource>,
    pub annotator: Box<dyn Annotate>,
}

impl SourceBinding {
    pub fn new(source: impl ReadingSource + 'static, annotator: impl Annotate + 'static) -> Self {
        Self {
            source: Box::new(source),
            annotator: Box::new(annotator),
        }
    }
}

/// What a successful run leaves behind.
#[derive(Debug)]
pub struct RunOutput {
    /// Every fact inferred by any stream.
    pub store: Arc<PersistentStore>,
    pub streams: Vec<Arc<StagedInferenceEngine>>,
    /// Readings replayed on the stream.
    pub readings: usize,
}

/// One end-to-end run over a time range.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub range: TimeRange,
    pub config_dir: PathBuf,
    pub stream_iri: String,
}

impl Pipeline {
    pub fn new(
        range: TimeRange,
        config_dir: impl Into<PathBuf>,
        stream_iri: impl Into<String>,
    ) -> Self {
        Self {
            range,
            config_dir: config_dir.into(),
            stream_iri: stream_iri.into(),
        }
    }

    /// Configures the inference streams, fetches every source, replays the
    /// merged readings on the stream and flushes it.
    ///
    /// Returns the accumulated inferences, or the first failure of any
    /// stream once all of them have drained.
    pub fn run(&self, sources: &[SourceBinding]) -> Result<RunOutput> {
        let store = Arc::new(PersistentStore::new());
        let mut engine = RSPEngine::new(self.stream_iri.clone());
        let configured =
            Configurator::new(&self.config_dir).configure(&mut engine, Arc::clone(&store));
        let streams = match configured {
            Ok(streams) => streams,
            Err(e) => {
                engine.shutdown()?;
                return Err(e);
            }
        };

        let simulator = Simulator::new(self.range);
        if let Err(e) = fetch_all(&simulator, sources) {
            engine.shutdown()?;
            return Err(e);
        }

        let mut modeller = SsnModeller::new();
        let replayed = simulator.done(|reading| {
            let graph = modeller.model(&reading)?;
            engine.put(reading.timestamp_millis(), &graph)?;
            Ok(())
        });
        engine.log();
        let flushed = engine.close_stream();
        engine.shutdown()?;
        let readings = replayed?;
        flushed?;

        for stream in &streams {
            if let Some(failure) = stream.take_failure() {
                return Err(failure);
            }
        }
        info!(readings, facts = store.len(), "Run complete");
        Ok(RunOutput {
            store,
            streams,
            readings,
        })
    }
}

fn fetch_all(simulator: &Simulator, sources: &[SourceBinding]) -> Result<()> {
    thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|binding| {
                scope.spawn(move || {
                    simulator.add(binding.source.as_ref(), binding.annotator.as_ref())
                })
            })
            .collect();
        let mut first_error = None;
        for handle in handles {
            let result = handle
                .join()
                .map_err(|_| IotStreamsError::internal("source fetch thread panicked"))
                .and_then(|r| r);
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    })
}
