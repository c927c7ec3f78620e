use crate::error::{IotStreamsError, Result};
use crate::reading::Reading;
use crate::time_range::localize;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Rewrites the feature of interest of a reading.
pub trait Annotate: Send + Sync {
    fn annotate(&self, reading: Reading) -> Reading;
}

/// Time-keyed feature-of-interest table.
///
/// Loaded from a JSON object mapping ISO date-times to FOI IRIs, e.g.
/// `{"2016-12-24T12:34:56+00:00": "http://example.org/meatItem345"}`. The
/// offset of each key is ignored: the local date-time is placed in the run's
/// zone, as the probe files record local wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct FoiAnnotator {
    time_to_foi: HashMap<DateTime<Utc>, String>,
}

impl FoiAnnotator {
    pub fn from_path(path: impl AsRef<Path>, tz: Tz) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            IotStreamsError::configuration(format!("annotations {}", path.display()), e)
        })?;
        let annotator = Self::from_json_str(&text, tz).map_err(|e| match e {
            IotStreamsError::Configuration { message, .. } => IotStreamsError::Configuration {
                context: format!("annotations {}", path.display()),
                message,
            },
            other => other,
        })?;
        info!(
            path = %path.display(),
            annotations = annotator.len(),
            "Loaded feature-of-interest annotations"
        );
        Ok(annotator)
    }

    pub fn from_json_str(json: &str, tz: Tz) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| IotStreamsError::configuration("annotations", e))?;
        let mut time_to_foi = HashMap::with_capacity(raw.len());
        for (key, foi) in raw {
            let local = parse_annotation_time(&key).ok_or_else(|| {
                IotStreamsError::configuration(
                    "annotations",
                    format!("'{key}' is not an ISO date-time"),
                )
            })?;
            time_to_foi.insert(localize(local, tz).with_timezone(&Utc), foi);
        }
        Ok(Self { time_to_foi })
    }

    pub fn len(&self) -> usize {
        self.time_to_foi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_to_foi.is_empty()
    }
}

fn parse_annotation_time(key: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(key)
        .map(|t| t.naive_local())
        .ok()
        .or_else(|| key.parse::<NaiveDateTime>().ok())
}

impl Annotate for FoiAnnotator {
    fn annotate(&self, mut reading: Reading) -> Reading {
        if let Some(foi) = self.time_to_foi.get(&reading.timestamp.with_timezone(&Utc)) {
            reading.foi.clone_from(foi);
        }
        reading
    }
}

/// Gives every reading the same feature of interest.
#[derive(Debug, Clone)]
pub struct FixedFoi(pub String);

impl Annotate for FixedFoi {
    fn annotate(&self, reading: Reading) -> Reading {
        reading.with_foi(self.0.clone())
    }
}

/// Leaves readings untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnnotation;

impl Annotate for NoAnnotation {
    fn annotate(&self, reading: Reading) -> Reading {
        reading
    }
}
