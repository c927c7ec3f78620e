use super::store::PersistentStore;
use crate::engine::WindowResult;
use crate::error::{IotStreamsError, Result};
use crate::modeller::rows_to_graph;
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{Graph, GraphNameRef, Triple};
use oxigraph::sparql::SparqlEvaluator;
use oxigraph::store::Store;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn};

/// When an update program runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// No provenance has been inferred yet.
    Coldstart,
    /// Provenance from an earlier window is available.
    Warm,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Coldstart => "coldstart",
            Stage::Warm => "warm",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "coldstart" => Some(Stage::Coldstart),
            "warm" => Some(Stage::Warm),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A SPARQL Update program, named after its file.
#[derive(Debug, Clone)]
pub struct UpdateProgram {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Still being configured.
    Uninitialized,
    /// Waiting for the first window.
    ColdstartPending,
    Warm,
    /// A fatal error stopped inference for this stream.
    Aborted,
}

/// What one window did to a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceOutcome {
    Coldstart { derived: usize },
    Warm { derived: usize },
    /// The warm programs found nothing new.
    NoChange,
    /// The stream was aborted earlier; the window was ignored.
    Skipped,
}

struct Inner {
    state: StreamState,
    provenance: Option<Graph>,
    failure: Option<IotStreamsError>,
}

/// One named inference stream: its base ontology, its coldstart and warm
/// update programs and the provenance it last inferred.
///
/// Windows are applied one at a time under a lock, so results delivered from
/// several threads never interleave.
pub struct StagedInferenceEngine {
    name: String,
    ontology: Graph,
    programs: BTreeMap<Stage, BTreeMap<String, UpdateProgram>>,
    store: Arc<PersistentStore>,
    inner: Mutex<Inner>,
}

impl fmt::Debug for StagedInferenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedInferenceEngine")
            .field("name", &self.name)
            .field("ontology", &self.ontology.len())
            .finish_non_exhaustive()
    }
}

impl StagedInferenceEngine {
    pub fn new(name: impl Into<String>, store: Arc<PersistentStore>) -> Self {
        Self {
            name: name.into(),
            ontology: Graph::new(),
            programs: BTreeMap::new(),
            store,
            inner: Mutex::new(Inner {
                state: StreamState::Uninitialized,
                provenance: None,
                failure: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ontology(&self) -> &Graph {
        &self.ontology
    }

    /// Loads the base ontology from Turtle, adding to any already loaded.
    pub fn set_ontology(&mut self, turtle: &str) -> Result<usize> {
        let context = format!("{}/init.ttl", self.name);
        for quad in RdfParser::from_format(RdfFormat::Turtle).for_reader(turtle.as_bytes()) {
            let quad = quad.map_err(|e| IotStreamsError::configuration(context.clone(), e))?;
            self.ontology
                .insert(&Triple::new(quad.subject, quad.predicate, quad.object));
        }
        Ok(self.ontology.len())
    }

    /// Adds an update program; it is parsed now so a typo fails at startup.
    pub fn add_program(&mut self, stage: Stage, name: &str, text: &str) -> Result<()> {
        SparqlEvaluator::new().parse_update(text).map_err(|e| {
            IotStreamsError::configuration(format!("{}/{stage}/{name}", self.name), e)
        })?;
        self.programs.entry(stage).or_default().insert(
            name.to_string(),
            UpdateProgram {
                name: name.to_string(),
                text: text.to_string(),
            },
        );
        Ok(())
    }

    pub fn program_names(&self, stage: Stage) -> Vec<String> {
        self.programs
            .get(&stage)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Ends configuration. A stream without coldstart programs could never
    /// infer anything, so it is refused.
    pub fn initialize(&mut self) -> Result<()> {
        if self.program_names(Stage::Coldstart).is_empty() {
            return Err(IotStreamsError::configuration(
                self.name.clone(),
                "no coldstart update programs",
            ));
        }
        let inner = self
            .inner
            .get_mut()
            .map_err(|_| IotStreamsError::internal("stream state lock poisoned"))?;
        inner.state = StreamState::ColdstartPending;
        Ok(())
    }

    pub fn state(&self) -> StreamState {
        self.inner
            .lock()
            .map(|i| i.state)
            .unwrap_or(StreamState::Aborted)
    }

    /// Facts inferred by the last successful stage, if any.
    pub fn provenance(&self) -> Option<Graph> {
        self.inner.lock().ok().and_then(|i| i.provenance.clone())
    }

    /// The error that aborted this stream, if any. Taking it clears it.
    pub fn take_failure(&self) -> Option<IotStreamsError> {
        self.inner.lock().ok().and_then(|mut i| i.failure.take())
    }

    /// Window callback: converts result rows to a graph and applies it,
    /// keeping the first failure for the end of the run.
    pub fn on_window(&self, result: Result<WindowResult>) {
        let outcome = result
            .and_then(|window| rows_to_graph(&window.rows))
            .and_then(|graph| self.update(&graph));
        if let Err(e) = outcome {
            error!(stream = %self.name, error = %e, "Inference stream aborted");
            if let Ok(mut inner) = self.inner.lock() {
                inner.state = StreamState::Aborted;
                if inner.failure.is_none() {
                    inner.failure = Some(e);
                }
            }
        }
    }

    /// Applies one window graph.
    ///
    /// Any error aborts the stream: later windows are skipped and the
    /// provenance stays as it was.
    pub fn update(&self, window: &Graph) -> Result<InferenceOutcome> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| IotStreamsError::internal("stream state lock poisoned"))?;
        let outcome = match inner.state {
            StreamState::Uninitialized => Err(IotStreamsError::internal(format!(
                "stream {} received a window before initialization",
                self.name
            ))),
            StreamState::Aborted => return Ok(InferenceOutcome::Skipped),
            StreamState::ColdstartPending => self.coldstart(&mut inner, window),
            StreamState::Warm => self.warm(&mut inner, window),
        };
        if outcome.is_err() {
            inner.state = StreamState::Aborted;
        }
        outcome
    }

    fn coldstart(&self, inner: &mut Inner, window: &Graph) -> Result<InferenceOutcome> {
        let base = self.working_graph(window);
        let derived = self.run_stage(Stage::Coldstart, &base, &[&base])?;
        if derived.is_empty() {
            warn!(stream = %self.name, "The coldstart update programs did not infer anything");
            return Err(IotStreamsError::configuration(
                self.name.clone(),
                "the coldstart update programs did not infer anything",
            ));
        }
        let count = derived.len();
        self.store.append(&derived)?;
        inner.provenance = Some(derived);
        inner.state = StreamState::Warm;
        info!(stream = %self.name, derived = count, "Coldstart complete");
        Ok(InferenceOutcome::Coldstart { derived: count })
    }

    fn warm(&self, inner: &mut Inner, window: &Graph) -> Result<InferenceOutcome> {
        let base = self.working_graph(window);
        let previous = inner.provenance.clone().unwrap_or_default();
        let mut start = base.clone();
        for triple in previous.iter() {
            start.insert(triple);
        }
        let derived = self.run_stage(Stage::Warm, &start, &[&base, &previous])?;
        if derived.is_empty() {
            return Ok(InferenceOutcome::NoChange);
        }
        let count = derived.len();
        self.store.append(&derived)?;
        inner.provenance = Some(derived);
        Ok(InferenceOutcome::Warm { derived: count })
    }

    /// Base ontology plus window facts. No RDFS or other entailment is
    /// applied, so programs only match asserted triples.
    fn working_graph(&self, window: &Graph) -> Graph {
        let mut graph = self.ontology.clone();
        for triple in window.iter() {
            graph.insert(triple);
        }
        graph
    }

    /// Runs every program of `stage` in name order against a scratch copy of
    /// `start`, then returns what the scratch copy holds beyond `exclude`.
    fn run_stage(&self, stage: Stage, start: &Graph, exclude: &[&Graph]) -> Result<Graph> {
        let scratch = Store::new()?;
        for triple in start.iter() {
            scratch.insert(triple.in_graph(GraphNameRef::DefaultGraph))?;
        }

        if let Some(programs) = self.programs.get(&stage) {
            for program in programs.values() {
                self.run_program(stage, program, &scratch)?;
            }
        }

        let mut derived = Graph::new();
        for quad in scratch.iter() {
            let quad = quad?;
            let triple = Triple::new(quad.subject, quad.predicate, quad.object);
            if !exclude.iter().any(|g| g.contains(&triple)) {
                derived.insert(&triple);
            }
        }
        Ok(derived)
    }

    fn run_program(&self, stage: Stage, program: &UpdateProgram, scratch: &Store) -> Result<()> {
        let context = format!("{}/{stage}/{}", self.name, program.name);
        let before = scratch.len()?;
        let started = Instant::now();
        SparqlEvaluator::new()
            .parse_update(&program.text)
            .map_err(|e| IotStreamsError::configuration(context.clone(), e))?
            .on_store(scratch)
            .execute()
            .map_err(|e| IotStreamsError::configuration(context.clone(), e))?;
        let ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let after = scratch.len()?;
        let generated = after as i64 - before as i64;
        info!(
            stream = %self.name,
            program = %format!("{stage}/{}", program.name),
            ms,
            triples = generated,
            "Query {} update {}/{}: {} ms ; {} triples generated",
            self.name,
            stage,
            program.name,
            ms,
            generated
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::{Literal, NamedNode};

    const ONTOLOGY: &str = r#"
        @prefix ex: <http://example.org/> .
        ex:Observation a <http://www.w3.org/2000/01/rdf-schema#Class> .
    "#;

    const FLAG_HIGH: &str = r#"
        PREFIX ex: <http://example.org/>
        INSERT { ?obs ex:flag ex:high }
        WHERE { ?obs ex:temperature ?t FILTER(?t > 19.5) }
    "#;

    const NOTHING: &str = r#"
        PREFIX ex: <http://example.org/>
        INSERT { ?obs ex:flag ex:never }
        WHERE { ?obs ex:temperature ?t FILTER(?t > 1000) }
    "#;

    const FLAG_AGAIN: &str = r#"
        PREFIX ex: <http://example.org/>
        INSERT { ?obs ex:seenAfter ?prev }
        WHERE { ?obs ex:temperature ?t . ?prev ex:flag ex:high FILTER(?obs != ?prev) }
    "#;

    fn window(readings: &[(&str, f64)]) -> Graph {
        let mut g = Graph::new();
        for (id, t) in readings {
            g.insert(&Triple::new(
                NamedNode::new(format!("http://example.org/{id}")).unwrap(),
                NamedNode::new("http://example.org/temperature").unwrap(),
                Literal::from(*t),
            ));
        }
        g
    }

    fn engine(coldstart: &str, warm: &str) -> (StagedInferenceEngine, Arc<PersistentStore>) {
        let store = Arc::new(PersistentStore::new());
        let mut engine = StagedInferenceEngine::new("fridge", Arc::clone(&store));
        engine.set_ontology(ONTOLOGY).unwrap();
        engine.add_program(Stage::Coldstart, "flag", coldstart).unwrap();
        engine.add_program(Stage::Warm, "follow", warm).unwrap();
        engine.initialize().unwrap();
        (engine, store)
    }

    #[test]
    fn test_update_before_initialize_is_internal_error() {
        let engine = StagedInferenceEngine::new("s", Arc::new(PersistentStore::new()));
        assert!(matches!(
            engine.update(&window(&[("a", 20.0)])),
            Err(IotStreamsError::Internal(_))
        ));
    }

    #[test]
    fn test_coldstart_flags_hot_reading() {
        let (engine, store) = engine(FLAG_HIGH, FLAG_AGAIN);
        assert_eq!(engine.state(), StreamState::ColdstartPending);
        let outcome = engine
            .update(&window(&[("r0900", 19.0), ("r0905", 21.0)]))
            .unwrap();
        assert_eq!(outcome, InferenceOutcome::Coldstart { derived: 1 });
        assert_eq!(engine.state(), StreamState::Warm);
        assert_eq!(engine.provenance().unwrap().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_coldstart_without_inference_is_fatal() {
        let (engine, store) = engine(NOTHING, FLAG_AGAIN);
        let err = engine.update(&window(&[("a", 20.0)])).unwrap_err();
        assert!(err.is_configuration());
        assert!(engine.provenance().is_none());
        assert_eq!(engine.state(), StreamState::Aborted);
        assert!(store.is_empty());
        assert_eq!(
            engine.update(&window(&[("b", 25.0)])).unwrap(),
            InferenceOutcome::Skipped
        );
    }

    #[test]
    fn test_warm_replaces_provenance_and_accumulates_store() {
        let (engine, store) = engine(FLAG_HIGH, FLAG_AGAIN);
        engine.update(&window(&[("a", 20.0)])).unwrap();
        let f1 = engine.provenance().unwrap();

        let outcome = engine.update(&window(&[("b", 10.0)])).unwrap();
        assert_eq!(outcome, InferenceOutcome::Warm { derived: 1 });
        let f2 = engine.provenance().unwrap();
        assert_eq!(f2.len(), 1);
        assert!(f1.iter().all(|t| !f2.contains(t)));

        let all = store.to_graph().unwrap();
        assert!(f1.iter().all(|t| all.contains(t)));
        assert!(f2.iter().all(|t| all.contains(t)));
    }

    #[test]
    fn test_warm_without_inference_changes_nothing() {
        let (engine, store) = engine(FLAG_HIGH, NOTHING);
        engine.update(&window(&[("a", 20.0)])).unwrap();
        let before = engine.provenance().unwrap();
        let stored = store.len();

        let outcome = engine.update(&window(&[("b", 22.0)])).unwrap();
        assert_eq!(outcome, InferenceOutcome::NoChange);
        let after = engine.provenance().unwrap();
        assert_eq!(after.len(), before.len());
        assert!(before.iter().all(|t| after.contains(t)));
        assert_eq!(store.len(), stored);
        assert_eq!(engine.state(), StreamState::Warm);
    }

    #[test]
    fn test_malformed_program_is_configuration_error() {
        let mut engine = StagedInferenceEngine::new("s", Arc::new(PersistentStore::new()));
        let err = engine
            .add_program(Stage::Warm, "broken", "INSERT nonsense")
            .unwrap_err();
        match err {
            IotStreamsError::Configuration { context, .. } => assert_eq!(context, "s/warm/broken"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_stream_without_coldstart_is_refused() {
        let mut engine = StagedInferenceEngine::new("s", Arc::new(PersistentStore::new()));
        engine.add_program(Stage::Warm, "w", FLAG_AGAIN).unwrap();
        assert!(engine.initialize().unwrap_err().is_configuration());
    }

    #[test]
    fn test_programs_run_in_name_order() {
        let store = Arc::new(PersistentStore::new());
        let mut engine = StagedInferenceEngine::new("s", store);
        engine
            .add_program(
                Stage::Coldstart,
                "b-derive",
                "PREFIX ex: <http://example.org/> INSERT { ?o ex:derived true } WHERE { ?o ex:flag ex:high }",
            )
            .unwrap();
        engine.add_program(Stage::Coldstart, "a-flag", FLAG_HIGH).unwrap();
        engine.initialize().unwrap();
        assert_eq!(engine.program_names(Stage::Coldstart), vec!["a-flag", "b-derive"]);
        let outcome = engine.update(&window(&[("a", 20.0)])).unwrap();
        assert_eq!(outcome, InferenceOutcome::Coldstart { derived: 2 });
    }

    #[test]
    fn test_concurrent_updates_run_coldstart_once() {
        let (engine, store) = engine(FLAG_HIGH, FLAG_AGAIN);
        let engine = Arc::new(engine);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    let id = format!("obs{i}");
                    engine.update(&window(&[(id.as_str(), 20.0 + f64::from(i))]))
                })
            })
            .collect();
        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        let coldstarts = outcomes
            .iter()
            .filter(|o| matches!(o, InferenceOutcome::Coldstart { .. }))
            .count();
        assert_eq!(coldstarts, 1);
        assert!(outcomes.iter().all(|o| matches!(
            o,
            InferenceOutcome::Coldstart { derived: 1 }
                | InferenceOutcome::Warm { .. }
                | InferenceOutcome::NoChange
        )));
        let derived: usize = outcomes
            .iter()
            .map(|o| match o {
                InferenceOutcome::Coldstart { derived } | InferenceOutcome::Warm { derived } => {
                    *derived
                }
                _ => 0,
            })
            .sum();
        assert_eq!(store.len(), derived);
        assert_eq!(engine.state(), StreamState::Warm);
    }
}
