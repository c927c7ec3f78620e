use chrono::DateTime;
use chrono_tz::Tz;

/// Feature of interest given to wireless tag readings nobody annotated.
pub const DEFAULT_WIRELESS_TAG_FOI: &str = "http://example.org/wirelessTag";

/// Feature of interest given to meat probe readings nobody annotated.
pub const DEFAULT_MEAT_PROBE_FOI: &str = "http://example.org/meatCoreTemp";

/// The kind of device a reading came from. Each kind has its own
/// provenance lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorKind {
    WirelessTag,
    MeatProbe,
}

impl SensorKind {
    /// Path segment used when minting identifiers for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::WirelessTag => "wirelesstag",
            SensorKind::MeatProbe => "meatprobe",
        }
    }
}

/// One timed temperature reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub kind: SensorKind,
    pub timestamp: DateTime<Tz>,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity; only wireless tags measure it.
    pub humidity: Option<f64>,
    pub sensor_id: u32,
    pub foi: String,
}

impl Reading {
    pub fn wireless_tag(
        sensor_id: u32,
        timestamp: DateTime<Tz>,
        temperature: f64,
        humidity: f64,
    ) -> Self {
        Self {
            kind: SensorKind::WirelessTag,
            timestamp,
            temperature,
            humidity: Some(humidity),
            sensor_id,
            foi: DEFAULT_WIRELESS_TAG_FOI.to_string(),
        }
    }

    pub fn meat_probe(sensor_id: u32, timestamp: DateTime<Tz>, temperature: f64) -> Self {
        Self {
            kind: SensorKind::MeatProbe,
            timestamp,
            temperature,
            humidity: None,
            sensor_id,
            foi: DEFAULT_MEAT_PROBE_FOI.to_string(),
        }
    }

    pub fn with_foi(mut self, foi: impl Into<String>) -> Self {
        self.foi = foi.into();
        self
    }

    /// Epoch milliseconds, the timestamp unit of the RDF stream.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
