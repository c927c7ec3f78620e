//! # iot-streams
//!
//! Replays recorded meat probe and wireless tag readings for a time range
//! through the configured inference streams and writes every inferred fact
//! to stdout as Turtle. Logs go to stderr.
//!
//! ```bash
//! WTCRED="me@myemail.com mypasswd" iot-streams --input config/simulator/input.json
//! RUST_LOG=iot_streams=debug iot-streams --from 2016-01-31 --to 2016-02-01 -o out.ttl
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    // IOT_STREAMS_LOG_FORMAT=json switches to machine-parseable logs.
    let log_format =
        std::env::var("IOT_STREAMS_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "iot_streams=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
