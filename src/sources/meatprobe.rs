use super::{ReadingSource, decode_latin1};
use crate::error::{IotStreamsError, Result};
use crate::reading::Reading;
use crate::time_range::{TimeRange, localize};
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PROBE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// A directory tree of CSV exports from the meat probe.
///
/// Every line of every file is a candidate reading
/// `id,dd/MM/yyyy HH:mm:ss,temperature`. Header lines (those mentioning
/// `Temperature`) and anything else that does not parse are skipped.
#[derive(Debug, Clone)]
pub struct MeatProbeFiles {
    root: PathBuf,
    tz: Tz,
}

impl MeatProbeFiles {
    pub fn new(root: impl Into<PathBuf>, tz: Tz) -> Self {
        Self {
            root: root.into(),
            tz,
        }
    }

    /// Parses every file below the root.
    pub fn parse(&self) -> Result<Vec<Reading>> {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        let mut readings = Vec::new();
        for file in files {
            let bytes = fs::read(&file)
                .map_err(|e| IotStreamsError::io(format!("reading {}", file.display()), e))?;
            let before = readings.len();
            readings.extend(
                decode_latin1(&bytes)
                    .lines()
                    .filter_map(|line| parse_line(line, self.tz)),
            );
            debug!(
                file = %file.display(),
                readings = readings.len() - before,
                "Parsed meat probe file"
            );
        }
        info!(root = %self.root.display(), readings = readings.len(), "Parsed meat probe files");
        Ok(readings)
    }
}

impl ReadingSource for MeatProbeFiles {
    fn name(&self) -> String {
        format!("meat probe files in {}", self.root.display())
    }

    fn fetch(&self, _range: &TimeRange) -> Result<Vec<Reading>> {
        self.parse()
    }
}

/// Depth-first, in file name order, so runs are reproducible.
fn collect_files(path: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let meta = fs::metadata(path)
        .map_err(|e| IotStreamsError::io(format!("reading {}", path.display()), e))?;
    if meta.is_file() {
        out.push(path.to_path_buf());
        return Ok(());
    }
    let mut entries = fs::read_dir(path)
        .map_err(|e| IotStreamsError::io(format!("listing {}", path.display()), e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| IotStreamsError::io(format!("listing {}", path.display()), e))?;
    entries.sort();
    for entry in entries {
        collect_files(&entry, out)?;
    }
    Ok(())
}

fn parse_line(line: &str, tz: Tz) -> Option<Reading> {
    if line.contains("Temperature") {
        return None;
    }
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != 3 {
        return None;
    }
    let id = parts[0].trim().parse::<u32>().ok()?;
    let local = NaiveDateTime::parse_from_str(parts[1].trim(), PROBE_TIME_FORMAT).ok()?;
    let temperature = parts[2].trim().parse::<f64>().ok()?;
    Some(Reading::meat_probe(id, localize(local, tz), temperature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{DEFAULT_MEAT_PROBE_FOI, SensorKind};
    use crate::time_range::DEFAULT_TIME_ZONE;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_line() {
        let r = parse_line("42,15/12/2015 02:16:14,37.0", DEFAULT_TIME_ZONE).unwrap();
        assert_eq!(r.kind, SensorKind::MeatProbe);
        assert_eq!(r.sensor_id, 42);
        assert_eq!(r.timestamp.day(), 15);
        assert_eq!(r.timestamp.month(), 12);
        assert_eq!(r.timestamp.hour(), 2);
        assert_eq!(r.temperature, 37.0);
        assert_eq!(r.foi, DEFAULT_MEAT_PROBE_FOI);
    }

    #[test]
    fn test_rejected_lines() {
        for line in [
            "No.,Time,Temperature(°C)",
            "42,15/12/2015 02:16:14",
            "42,15/12/2015 02:16:14,37.0,extra",
            "x,15/12/2015 02:16:14,37.0",
            "42,2015-12-15 02:16:14,37.0",
            "42,15/12/2015 02:16:14,hot",
            "",
        ] {
            assert!(parse_line(line, DEFAULT_TIME_ZONE).is_none(), "{line}");
        }
    }

    #[test]
    fn test_directory_walk() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("day2");
        fs::create_dir(&nested).unwrap();
        fs::write(
            dir.path().join("a.csv"),
            b"No.,Time,Temperature(\xB0C)\n1,15/12/2015 02:16:14,37.0\n",
        )
        .unwrap();
        fs::write(nested.join("b.csv"), "2,16/12/2015 10:00:00,4.5\nbroken\n").unwrap();

        let readings = MeatProbeFiles::new(dir.path(), DEFAULT_TIME_ZONE)
            .parse()
            .unwrap();
        let ids: Vec<_> = readings.iter().map(|r| r.sensor_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let err = MeatProbeFiles::new("/nonexistent/meatprobe", DEFAULT_TIME_ZONE)
            .parse()
            .unwrap_err();
        assert!(matches!(err, IotStreamsError::Io { .. }));
    }
}
