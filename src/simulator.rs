use crate::annotator::Annotate;
use crate::error::Result;
use crate::merger::ReadingMerger;
use crate::reading::Reading;
use crate::slicer::slice;
use crate::sources::ReadingSource;
use crate::time_range::TimeRange;
use tracing::info;

/// Replays recorded readings of one time range.
///
/// Each source is fetched, sliced to the range and annotated, then handed to
/// the shared merger. `add` takes `&self` so sources can be fetched from
/// several threads.
#[derive(Debug)]
pub struct Simulator {
    range: TimeRange,
    merger: ReadingMerger,
}

impl Simulator {
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            merger: ReadingMerger::new(),
        }
    }

    pub fn range(&self) -> &TimeRange {
        &self.range
    }

    /// Fetches `source` and merges what falls inside the range. Returns the
    /// number of readings kept.
    pub fn add(&self, source: &dyn ReadingSource, annotator: &dyn Annotate) -> Result<usize> {
        let fetched = source.fetch(&self.range)?;
        let total = fetched.len();
        let kept = self.merger.extend(
            slice(fetched, &self.range).map(|reading| annotator.annotate(reading)),
        )?;
        info!(
            source = %source.name(),
            fetched = total,
            kept,
            "Source added to simulation"
        );
        Ok(kept)
    }

    /// Replays every kept reading in time order.
    pub fn done<F>(self, sink: F) -> Result<usize>
    where
        F: FnMut(Reading) -> Result<()>,
    {
        self.merger.done(sink)
    }
}
