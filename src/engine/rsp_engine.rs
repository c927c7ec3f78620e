use crate::engine::r2r::{R2ROperator, Rows};
use crate::engine::rspql_parser::RSPQLParser;
use crate::error::{IotStreamsError, Result};
use crate::modeller::graph_to_quads;
use crate::windowing::CSPARQLWindow;
use oxigraph::model::{Graph, GraphName, Literal, NamedNode, Quad};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Default IRI of the single stream readings are put on.
pub const DEFAULT_STREAM_IRI: &str = "http://iotstreams";

/// Rows one window produced, with the window bounds.
#[derive(Debug, Clone)]
pub struct WindowResult {
    pub query: String,
    pub rows: Rows,
    pub timestamp_from: i64,
    pub timestamp_to: i64,
}

/// Receives the outcome of every reported window of one query, on that
/// query's worker thread.
pub type ResultConsumer = Arc<dyn Fn(Result<WindowResult>) + Send + Sync>;

struct RegisteredQuery {
    name: String,
    width: i64,
    window_sender: mpsc::Sender<(Vec<Quad>, i64)>,
    worker: JoinHandle<()>,
}

/// The RSP (RDF Stream Processing) engine behind a run.
///
/// Owns one RDF stream. Every registered continuous query gets its own window
/// and worker thread, fed through a channel, so results for one query are
/// always delivered one window at a time and in window order.
pub struct RSPEngine {
    stream_iri: String,
    queries: Vec<RegisteredQuery>,
    num_quads: u64,
    last_timestamp: Option<i64>,
}

impl RSPEngine {
    pub fn new(stream_iri: impl Into<String>) -> Self {
        Self {
            stream_iri: stream_iri.into(),
            queries: Vec::new(),
            num_quads: 0,
            last_timestamp: None,
        }
    }

    pub fn stream_iri(&self) -> &str {
        &self.stream_iri
    }

    pub fn query_names(&self) -> Vec<String> {
        self.queries.iter().map(|q| q.name.clone()).collect()
    }

    /// Number of quadruples put on the stream so far.
    pub fn quad_count(&self) -> u64 {
        self.num_quads
    }

    /// Registers a continuous query reading from this engine's stream.
    pub fn register_query(
        &mut self,
        name: &str,
        query: &str,
        consumer: ResultConsumer,
    ) -> Result<()> {
        let parsed = RSPQLParser::new(query)
            .parse()
            .map_err(|e| with_context(e, name))?;
        if parsed.window.stream_name != self.stream_iri {
            return Err(IotStreamsError::configuration(
                name,
                format!(
                    "query reads stream <{}> but readings are put on <{}>",
                    parsed.window.stream_name, self.stream_iri
                ),
            ));
        }
        let r2r = R2ROperator::new(parsed.sparql_query).map_err(|e| with_context(e, name))?;

        let mut window =
            CSPARQLWindow::new(name.to_string(), parsed.window.width, parsed.window.slide);
        let query_name = name.to_string();
        window.subscribe(move |bounds, content| {
            let result = r2r
                .execute(content)
                .map_err(|e| with_context(e, &query_name));
            match result {
                Ok(rows) if rows.is_empty() => {
                    debug!(query = %query_name, open = bounds.open, "Window produced no rows");
                }
                Ok(rows) => consumer(Ok(WindowResult {
                    query: query_name.clone(),
                    rows,
                    timestamp_from: bounds.open,
                    timestamp_to: bounds.close,
                })),
                Err(e) => consumer(Err(e)),
            }
        });

        let (tx, rx) = mpsc::channel::<(Vec<Quad>, i64)>();
        let window = Arc::new(Mutex::new(window));
        let worker_window = Arc::clone(&window);
        let worker = thread::Builder::new()
            .name(format!("window-{name}"))
            .spawn(move || {
                while let Ok((quads, timestamp)) = rx.recv() {
                    match worker_window.lock() {
                        Ok(mut win) => win.add_all(quads, timestamp),
                        Err(_) => {
                            warn!("Window lock poisoned, dropping remaining events");
                            break;
                        }
                    }
                }
            })
            .map_err(|e| IotStreamsError::io(format!("spawning worker for {name}"), e))?;

        info!(
            query = name,
            width_ms = parsed.window.width,
            slide_ms = parsed.window.slide,
            "Registered continuous query"
        );
        self.queries.push(RegisteredQuery {
            name: name.to_string(),
            width: parsed.window.width,
            window_sender: tx,
            worker,
        });
        Ok(())
    }

    /// Puts every triple of `graph` on the stream at `timestamp` (epoch ms).
    /// Returns the number of quadruples added.
    pub fn put(&mut self, timestamp: i64, graph: &Graph) -> Result<usize> {
        let quads = graph_to_quads(graph)?;
        self.send(quads.clone(), timestamp)?;
        self.num_quads += quads.len() as u64;
        self.last_timestamp = Some(self.last_timestamp.map_or(timestamp, |t| t.max(timestamp)));
        Ok(quads.len())
    }

    fn send(&self, quads: Vec<Quad>, timestamp: i64) -> Result<()> {
        for query in &self.queries {
            query
                .window_sender
                .send((quads.clone(), timestamp))
                .map_err(|_| {
                    IotStreamsError::internal(format!("window worker for {} stopped", query.name))
                })?;
        }
        Ok(())
    }

    /// Pushes a sentinel event past the end of every open window so all of
    /// them report.
    pub fn close_stream(&mut self) -> Result<()> {
        let Some(last) = self.last_timestamp else {
            return Ok(());
        };
        let max_width = self.queries.iter().map(|q| q.width).max().unwrap_or(0);
        let sentinel = Quad::new(
            NamedNode::new_unchecked("urn:iotstreams:sentinel"),
            NamedNode::new_unchecked("urn:iotstreams:type"),
            Literal::new_simple_literal("end"),
            GraphName::DefaultGraph,
        );
        debug!(timestamp = last + max_width + 1, "Closing stream");
        self.send(vec![sentinel], last + max_width + 1)
    }

    /// Stops the workers once they have drained their queues.
    pub fn shutdown(self) -> Result<()> {
        let mut panicked = Vec::new();
        for query in self.queries {
            drop(query.window_sender);
            if query.worker.join().is_err() {
                panicked.push(query.name);
            }
        }
        if panicked.is_empty() {
            Ok(())
        } else {
            Err(IotStreamsError::internal(format!(
                "window workers panicked: {}",
                panicked.join(", ")
            )))
        }
    }

    pub fn log(&self) {
        info!(quads = self.num_quads, "{} quadruples put on stream", self.num_quads);
    }
}

fn with_context(e: IotStreamsError, query: &str) -> IotStreamsError {
    match e {
        IotStreamsError::Configuration { context, message } => IotStreamsError::Configuration {
            context: format!("{query}: {context}"),
            message,
        },
        other => other,
    }
}
