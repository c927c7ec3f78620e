use crate::error::{IotStreamsError, Result};
use crate::reading::Reading;
use std::sync::Mutex;
use tracing::info;

/// Collects readings from every source, then replays them in one global
/// time order.
///
/// `extend` may be called from several threads at once. `done` consumes the
/// merger, so nothing can be added after the replay starts.
#[derive(Debug, Default)]
pub struct ReadingMerger {
    buffer: Mutex<Vec<Reading>>,
}

impl ReadingMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends readings, returning how many were added.
    pub fn extend<I>(&self, readings: I) -> Result<usize>
    where
        I: IntoIterator<Item = Reading>,
    {
        let batch: Vec<Reading> = readings.into_iter().collect();
        let added = batch.len();
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| IotStreamsError::internal("reading buffer lock poisoned"))?;
        buffer.extend(batch);
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorts by timestamp and hands every reading to `sink` on the calling
    /// thread. Equal timestamps keep their insertion order. Stops at the first
    /// sink error. Returns the number of readings merged.
    pub fn done<F>(self, mut sink: F) -> Result<usize>
    where
        F: FnMut(Reading) -> Result<()>,
    {
        let mut readings = self
            .buffer
            .into_inner()
            .map_err(|_| IotStreamsError::internal("reading buffer lock poisoned"))?;
        let merged = readings.len();
        info!(readings = merged, "{} readings merged", merged);
        readings.sort_by_key(|r| r.timestamp);
        for reading in readings {
            sink(reading)?;
        }
        Ok(merged)
    }
}
