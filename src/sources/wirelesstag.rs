//! Client for the wireless tag cloud (mytaglist.com).
//!
//! Signing in yields a [`Session`] holding the login cookie. Every later call
//! goes through that session, so there is no hidden signed-in state.

use super::ReadingSource;
use crate::error::{IotStreamsError, Result};
use crate::reading::Reading;
use crate::time_range::{TimeRange, localize};
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_BASE_URL: &str = "https://www.mytaglist.com";

/// Environment variable holding `"email password"`.
pub const CREDENTIALS_ENV: &str = "WTCRED";

const SIGN_IN: &str = "/ethAccount.asmx/SignIn";
const GET_STATS_RAW: &str = "/ethLogs.asmx/GetStatsRaw";
const GET_TAG_LIST: &str = "/ethClient.asmx/GetTagList";

#[derive(Clone, Serialize)]
pub struct Credentials {
    email: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let value = std::env::var(CREDENTIALS_ENV).map_err(|_| {
            IotStreamsError::user_input(
                CREDENTIALS_ENV,
                format!("environment variable {CREDENTIALS_ENV} should be 'me@myemail.com mypasswd'"),
            )
        })?;
        Self::parse(&value)
    }

    /// Parses `"email password"`.
    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(email), Some(password), None) => Ok(Self {
                email: email.to_string(),
                password: password.to_string(),
            }),
            _ => Err(IotStreamsError::user_input(
                CREDENTIALS_ENV,
                "expected 'me@myemail.com mypasswd'",
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WirelessTagClient {
    base_url: String,
}

impl Default for WirelessTagClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl WirelessTagClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Signs in once; the returned session carries the login cookie.
    pub fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        info!(base_url = %self.base_url, "Signing in to wireless tag cloud");
        let http = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| IotStreamsError::io("building HTTP client", e))?;
        let session = Session {
            http,
            base_url: self.base_url.clone(),
        };
        session.post(SIGN_IN, credentials)?;
        Ok(session)
    }
}

/// A signed-in connection to the wireless tag cloud.
#[derive(Debug, Clone)]
pub struct Session {
    http: Client,
    base_url: String,
}

impl Session {
    fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .header("X-Requested-With", "iot-streams")
            .header("Accept", "application/json")
            .json(body)
            .send()
            .map_err(|e| IotStreamsError::io(format!("POST {url}"), e))?;
        if response.status() != StatusCode::OK {
            return Err(IotStreamsError::io(
                format!("POST {url}"),
                format!("wireless tag cloud answered {}", response.status()),
            ));
        }
        Ok(response)
    }

    fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        self.post(path, body)?
            .json::<T>()
            .map_err(|e| IotStreamsError::io(format!("decoding response of {url}"), e))
    }

    /// Raw temperature and humidity for whole calendar days.
    pub fn get_stats_raw(
        &self,
        sensor_id: u32,
        from: NaiveDate,
        to: NaiveDate,
        tz: Tz,
    ) -> Result<Vec<Reading>> {
        info!(sensor_id, "Retrieving data for wireless tag {}", sensor_id);
        let request = StatsRawRequest {
            id: sensor_id,
            from_date: from.format("%m/%d/%Y").to_string(),
            to_date: to.format("%m/%d/%Y").to_string(),
        };
        let response: StatsRawResponse = self.post_json(GET_STATS_RAW, &request)?;
        info!(sensor_id, readings = response.len(), "Retrieved {} readings", response.len());
        response.into_readings(sensor_id, tz)
    }

    pub fn tag_list(&self) -> Result<Vec<TagDescription>> {
        let response: TagListResponse = self.post_json(GET_TAG_LIST, &serde_json::json!({}))?;
        Ok(response.d)
    }

    /// Logs name, uuid and slave id of every tag on the account.
    pub fn log_tag_list(&self) -> Result<()> {
        for tag in self.tag_list()? {
            info!(name = %tag.name, uuid = %tag.uuid, slave_id = tag.slave_id, "Wireless tag");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsRawRequest {
    id: u32,
    from_date: String,
    to_date: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatsRawResponse {
    d: Vec<DayReadings>,
}

/// One day of samples. `date` is `M/D/YYYY`, `tods` are seconds since local
/// midnight; `temps` and `caps` (humidity) are parallel to `tods`.
#[derive(Debug, Deserialize)]
struct DayReadings {
    date: String,
    tods: Vec<u32>,
    temps: Vec<f64>,
    caps: Vec<f64>,
}

impl StatsRawResponse {
    fn len(&self) -> usize {
        self.d.iter().map(|day| day.temps.len()).sum()
    }

    pub(crate) fn into_readings(self, sensor_id: u32, tz: Tz) -> Result<Vec<Reading>> {
        let mut readings = Vec::with_capacity(self.len());
        for day in self.d {
            let date = NaiveDate::parse_from_str(&day.date, "%m/%d/%Y").map_err(|e| {
                IotStreamsError::io(
                    "decoding GetStatsRaw response",
                    format!("bad date '{}': {e}", day.date),
                )
            })?;
            if day.temps.len() != day.tods.len() || day.caps.len() != day.tods.len() {
                return Err(IotStreamsError::io(
                    "decoding GetStatsRaw response",
                    format!("ragged sample arrays for {}", day.date),
                ));
            }
            for ((tod, temperature), humidity) in day.tods.iter().zip(day.temps).zip(day.caps) {
                let time = NaiveTime::from_num_seconds_from_midnight_opt(*tod, 0).ok_or_else(|| {
                    IotStreamsError::io(
                        "decoding GetStatsRaw response",
                        format!("time of day {tod} out of range"),
                    )
                })?;
                readings.push(Reading::wireless_tag(
                    sensor_id,
                    localize(date.and_time(time), tz),
                    temperature,
                    humidity,
                ));
            }
        }
        Ok(readings)
    }
}

#[derive(Debug, Deserialize)]
struct TagListResponse {
    d: Vec<TagDescription>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDescription {
    pub name: String,
    pub uuid: String,
    pub slave_id: u32,
}

/// One tag, fetched through a shared session.
#[derive(Debug, Clone)]
pub struct WirelessTagSource {
    session: Arc<Session>,
    sensor_id: u32,
}

impl WirelessTagSource {
    pub fn new(session: Arc<Session>, sensor_id: u32) -> Self {
        Self { session, sensor_id }
    }
}

impl ReadingSource for WirelessTagSource {
    fn name(&self) -> String {
        format!("wireless tag {}", self.sensor_id)
    }

    /// The cloud only filters by date, so this asks for the whole days
    /// covering the range.
    fn fetch(&self, range: &TimeRange) -> Result<Vec<Reading>> {
        if range.from >= range.to {
            return Ok(Vec::new());
        }
        let (from, to) = range.date_span();
        self.session
            .get_stats_raw(self.sensor_id, from, to, range.time_zone())
    }
}
