use super::staged::{Stage, StagedInferenceEngine};
use super::store::PersistentStore;
use crate::engine::{RSPEngine, ResultConsumer};
use crate::error::{IotStreamsError, Result};
use crate::sources::decode_latin1;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const QUERY_FILE: &str = "csparql-query.rq";
pub const ONTOLOGY_FILE: &str = "init.ttl";

#[derive(Default)]
struct PendingStream {
    query: Option<String>,
    ontology: bool,
}

/// Reads a configuration tree and wires one inference stream per top-level
/// directory into the engine:
///
/// ```text
/// <root>/<stream>/csparql-query.rq
/// <root>/<stream>/init.ttl
/// <root>/<stream>/coldstart/<program>.rq
/// <root>/<stream>/warm/<program>.rq
/// ```
///
/// Any other file is an error. Files are read as ISO-8859-1.
pub struct Configurator {
    root: PathBuf,
}

impl Configurator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn configure(
        &self,
        engine: &mut RSPEngine,
        store: Arc<PersistentStore>,
    ) -> Result<Vec<Arc<StagedInferenceEngine>>> {
        let mut files = Vec::new();
        walk(&self.root, &mut files)?;

        let mut streams: BTreeMap<String, (PendingStream, StagedInferenceEngine)> =
            BTreeMap::new();
        for file in files {
            info!(path = %file.display(), "Loading configuration file");
            let rel = file.strip_prefix(&self.root).map_err(|e| {
                IotStreamsError::internal(format!("{} outside root: {e}", file.display()))
            })?;
            let parts: Vec<String> = rel
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect();
            let content = read(&file)?;
            let unexpected = || {
                IotStreamsError::configuration(
                    file.display().to_string(),
                    format!(
                        "Unexpected file {} at depth {}",
                        rel.display(),
                        parts.len()
                    ),
                )
            };

            match parts.as_slice() {
                [stream, file_name] if file_name == QUERY_FILE => {
                    let (pending, _) = entry(&mut streams, stream, &store);
                    pending.query = Some(content);
                }
                [stream, file_name] if file_name == ONTOLOGY_FILE => {
                    let (pending, staged) = entry(&mut streams, stream, &store);
                    staged.set_ontology(&content)?;
                    pending.ontology = true;
                }
                [stream, stage, file_name] if file_name.ends_with(".rq") => {
                    let stage = Stage::from_dir_name(stage).ok_or_else(unexpected)?;
                    let program = file_name.trim_end_matches(".rq");
                    let (_, staged) = entry(&mut streams, stream, &store);
                    staged.add_program(stage, program, &content)?;
                }
                _ => return Err(unexpected()),
            }
        }

        if streams.is_empty() {
            return Err(IotStreamsError::configuration(
                self.root.display().to_string(),
                "no inference streams configured",
            ));
        }

        let mut configured = Vec::with_capacity(streams.len());
        for (name, (pending, mut staged)) in streams {
            let query = pending.query.ok_or_else(|| {
                IotStreamsError::configuration(name.clone(), format!("missing {QUERY_FILE}"))
            })?;
            if !pending.ontology {
                return Err(IotStreamsError::configuration(
                    name,
                    format!("missing {ONTOLOGY_FILE}"),
                ));
            }
            staged.initialize()?;
            let staged = Arc::new(staged);
            let target = Arc::clone(&staged);
            let consumer: ResultConsumer = Arc::new(move |result| target.on_window(result));
            engine.register_query(&name, &query, consumer)?;
            info!(
                stream = %name,
                coldstart = staged.program_names(Stage::Coldstart).len(),
                warm = staged.program_names(Stage::Warm).len(),
                "Configured inference stream"
            );
            configured.push(staged);
        }
        Ok(configured)
    }
}

fn entry<'a>(
    streams: &'a mut BTreeMap<String, (PendingStream, StagedInferenceEngine)>,
    name: &str,
    store: &Arc<PersistentStore>,
) -> &'a mut (PendingStream, StagedInferenceEngine) {
    streams.entry(name.to_string()).or_insert_with(|| {
        (
            PendingStream::default(),
            StagedInferenceEngine::new(name, Arc::clone(store)),
        )
    })
}

fn read(file: &Path) -> Result<String> {
    fs::read(file)
        .map(|bytes| decode_latin1(&bytes))
        .map_err(|e| IotStreamsError::configuration(file.display().to_string(), e))
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let listing = fs::read_dir(dir)
        .map_err(|e| IotStreamsError::configuration(dir.display().to_string(), e))?;
    let mut entries = Vec::new();
    for entry in listing {
        let entry =
            entry.map_err(|e| IotStreamsError::configuration(dir.display().to_string(), e))?;
        entries.push(entry.path());
    }
    entries.sort();
    for path in entries {
        if path.is_dir() {
            walk(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}
