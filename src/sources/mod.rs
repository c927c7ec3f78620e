//! Adapters producing raw readings for the simulator.

pub mod meatprobe;
pub mod wirelesstag;

use crate::error::Result;
use crate::reading::Reading;
use crate::time_range::TimeRange;

pub use meatprobe::MeatProbeFiles;
pub use wirelesstag::{Credentials, Session, WirelessTagClient, WirelessTagSource};

/// Anything that can hand over a batch of readings for a run.
///
/// The returned readings need not be ordered, and may fall outside `range`:
/// slicing happens afterwards.
pub trait ReadingSource: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> String;

    fn fetch(&self, range: &TimeRange) -> Result<Vec<Reading>>;
}

/// Decodes ISO-8859-1: every byte is the code point of the same value.
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Readings already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticReadings {
    pub name: String,
    pub readings: Vec<Reading>,
}

impl StaticReadings {
    pub fn new(name: impl Into<String>, readings: Vec<Reading>) -> Self {
        Self {
            name: name.into(),
            readings,
        }
    }
}

impl ReadingSource for StaticReadings {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn fetch(&self, _range: &TimeRange) -> Result<Vec<Reading>> {
        Ok(self.readings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_decoding() {
        assert_eq!(decode_latin1(&[0x54, 0xB0, 0x43]), "T°C");
    }
}
