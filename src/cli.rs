//! Command line of the `iot-streams` binary.

use chrono_tz::Tz;
use clap::Parser;
use iot_streams::annotator::{FixedFoi, FoiAnnotator, NoAnnotation};
use iot_streams::engine::DEFAULT_STREAM_IRI;
use iot_streams::error::{IotStreamsError, Result};
use iot_streams::pipeline::{Pipeline, SourceBinding};
use iot_streams::sources::wirelesstag::DEFAULT_BASE_URL;
use iot_streams::sources::{Credentials, MeatProbeFiles, WirelessTagClient, WirelessTagSource};
use iot_streams::time_range::TimeRange;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Replays recorded sensor readings through the configured inference
/// streams and prints everything inferred as Turtle.
#[derive(Parser, Debug)]
#[command(name = "iot-streams")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON run input: time range and wireless tags per feature of interest.
    /// May be absent when both --from and --to are given.
    #[arg(long, default_value = "config/simulator/input.json")]
    pub input: PathBuf,

    /// Root of the inference stream configuration tree
    #[arg(long, default_value = "config/iotstreams")]
    pub config_dir: PathBuf,

    /// Time-keyed feature-of-interest annotations for meat probe readings
    #[arg(long, default_value = "config/simulator/annotations.json")]
    pub annotations: PathBuf,

    /// Directory of meat probe CSV exports
    #[arg(long, default_value = "config/simulator/meatprobe")]
    pub meatprobe_dir: PathBuf,

    /// IANA zone of timestamps recorded without offset
    #[arg(long, default_value = "Europe/London")]
    pub timezone: String,

    /// Start of the time range, overriding the run input
    #[arg(long)]
    pub from: Option<String>,

    /// End of the time range, overriding the run input
    #[arg(long)]
    pub to: Option<String>,

    /// Write Turtle here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// IRI of the stream readings are put on
    #[arg(long, default_value = DEFAULT_STREAM_IRI)]
    pub stream: String,

    /// Wireless tag cloud endpoint
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub wireless_tag_url: String,
}

/// Contents of the run input file.
#[derive(Debug, Default, Deserialize)]
pub struct RunInput {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(rename = "foi2wirelessTagID", default)]
    pub foi_to_wireless_tag: BTreeMap<String, u32>,
}

impl RunInput {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| IotStreamsError::user_input(path.display().to_string(), e))?;
        serde_json::from_str(&text)
            .map_err(|e| IotStreamsError::user_input(path.display().to_string(), e))
    }
}

pub fn execute(cli: Cli) -> Result<()> {
    let tz: Tz = cli
        .timezone
        .parse()
        .map_err(|e| IotStreamsError::user_input(cli.timezone.clone(), e))?;
    let input = if cli.from.is_some() && cli.to.is_some() && !cli.input.exists() {
        info!(path = %cli.input.display(), "No run input, using the given time range only");
        RunInput::default()
    } else {
        RunInput::load(&cli.input)?
    };
    let from = cli.from.clone().or(input.from).ok_or_else(|| {
        IotStreamsError::user_input(cli.input.display().to_string(), "no 'from' time given")
    })?;
    let to = cli.to.clone().or(input.to).ok_or_else(|| {
        IotStreamsError::user_input(cli.input.display().to_string(), "no 'to' time given")
    })?;
    let range = TimeRange::parse(&from, &to, tz)?;
    info!(from = %range.from, to = %range.to, "Simulating time range");

    let sources = bind_sources(&cli, &input.foi_to_wireless_tag, tz)?;
    let store = Pipeline::new(range, &cli.config_dir, &cli.stream)
        .run(&sources)?
        .store;

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| IotStreamsError::io(format!("creating {}", path.display()), e))?;
            flush(store.write_turtle(BufWriter::new(file))?)?;
            info!(path = %path.display(), facts = store.len(), "Inferences written");
        }
        None => {
            flush(store.write_turtle(BufWriter::new(io::stdout().lock()))?)?;
        }
    }
    Ok(())
}

fn flush<W: Write>(mut writer: W) -> Result<()> {
    writer
        .flush()
        .map_err(|e| IotStreamsError::io("writing Turtle output", e))
}

fn bind_sources(cli: &Cli, tags: &BTreeMap<String, u32>, tz: Tz) -> Result<Vec<SourceBinding>> {
    let mut sources = Vec::new();

    if cli.meatprobe_dir.exists() {
        let probe = MeatProbeFiles::new(&cli.meatprobe_dir, tz);
        if cli.annotations.exists() {
            sources.push(SourceBinding::new(
                probe,
                FoiAnnotator::from_path(&cli.annotations, tz)?,
            ));
        } else {
            sources.push(SourceBinding::new(probe, NoAnnotation));
        }
    } else {
        info!(path = %cli.meatprobe_dir.display(), "No meat probe directory, skipping");
    }

    if !tags.is_empty() {
        let credentials = Credentials::from_env()?;
        let session =
            Arc::new(WirelessTagClient::new(&cli.wireless_tag_url).sign_in(&credentials)?);
        session.log_tag_list()?;
        for (foi, id) in tags {
            sources.push(SourceBinding::new(
                WirelessTagSource::new(Arc::clone(&session), *id),
                FixedFoi(foi.clone()),
            ));
        }
    }
    Ok(sources)
}
