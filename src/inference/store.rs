use crate::error::{IotStreamsError, Result};
use crate::vocab;
use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::Graph;
use std::io::Write;
use std::sync::Mutex;

/// Accumulates every accepted inference of every stream for the whole run.
#[derive(Debug, Default)]
pub struct PersistentStore {
    graph: Mutex<Graph>,
}

impl PersistentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `facts`, returning how many were not already present.
    pub fn append(&self, facts: &Graph) -> Result<usize> {
        let mut graph = self.lock()?;
        let mut added = 0;
        for triple in facts.iter() {
            if graph.insert(triple) {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_graph(&self) -> Result<Graph> {
        Ok(self.lock()?.clone())
    }

    /// Serializes the accumulated facts as Turtle.
    pub fn write_turtle<W: Write>(&self, writer: W) -> Result<W> {
        let graph = self.lock()?;
        let mut serializer = RdfSerializer::from_format(RdfFormat::Turtle);
        for (prefix, iri) in [
            ("ssn", vocab::SSN),
            ("sk", vocab::SK),
            ("meteo", vocab::METEO),
            ("fs", vocab::FS),
            ("fsext", vocab::FS_EXT),
        ] {
            serializer = serializer
                .with_prefix(prefix, iri)
                .map_err(|e| IotStreamsError::internal(format!("prefix {prefix}: {e}")))?;
        }
        let mut writer = serializer.for_writer(writer);
        for triple in graph.iter() {
            writer
                .serialize_triple(triple)
                .map_err(|e| IotStreamsError::io("writing Turtle output", e))?;
        }
        writer
            .finish()
            .map_err(|e| IotStreamsError::io("writing Turtle output", e))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Graph>> {
        self.graph
            .lock()
            .map_err(|_| IotStreamsError::internal("persistent store lock poisoned"))
    }
}
