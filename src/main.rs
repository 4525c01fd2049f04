//! CLI entry point for the next_transit arrival board.
//!
//! `run` drives the display, `inspect` decodes a single subway feed, and
//! `list-ports` shows where the display might be plugged in.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use next_transit::board::{Board, Layout};
use next_transit::config::{
    BusConfig, Config, DEFAULT_BUS_API_URL, DEFAULT_TRAIN_FEED_URL, DisplayConfig, TrainConfig,
};
use next_transit::display::{SerialDisplay, StdoutDisplay, available_ports};
use next_transit::fetch::{BasicClient, fetch_bytes};
use next_transit::offset::Rounding;
use next_transit::parser::parse_feed;
use next_transit::ticker::{SystemClock, Ticker};
use next_transit::train::arrivals_at;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "next_transit")]
#[command(about = "Shows the next buses and trains on a serial display", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll both sources and push the board to the display on a fixed cadence
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Number of cycles to run (0 = until stopped)
        #[arg(short = 'n', long, default_value_t = 0)]
        cycles: usize,

        /// Where each report goes
        #[arg(long, value_enum, default_value_t = SinkKind::Serial)]
        sink: SinkKind,
    },
    /// Decode a GTFS-RT feed from a file or URL and show the next trains at one stop
    Inspect {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Stop id to match, including the direction suffix
        #[arg(long, default_value = "Q03S")]
        stop: String,

        /// Route label shown after "Next"
        #[arg(long, default_value = "Q")]
        route: String,

        /// Number of trains to show
        #[arg(short, long, default_value_t = 4)]
        limit: usize,
    },
    /// List serial ports the display could be attached to
    ListPorts,
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkKind {
    /// The serial display
    Serial,
    /// Standard output, for running without hardware
    Stdout,
}

#[derive(Args)]
struct ConfigArgs {
    /// GTFS-RT trip update feed for the subway line
    #[arg(long, env = "NEXT_TRANSIT_TRAIN_FEED_URL", default_value = DEFAULT_TRAIN_FEED_URL)]
    train_feed_url: String,

    /// Bus Time SIRI stop monitoring endpoint
    #[arg(long, env = "NEXT_TRANSIT_BUS_API_URL", default_value = DEFAULT_BUS_API_URL)]
    bus_api_url: String,

    /// Bus Time developer key
    #[arg(long, env = "MTA_BUS_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// Bus Time stop id (MonitoringRef)
    #[arg(long, env = "NEXT_TRANSIT_BUS_STOP", default_value = "MTA_401756")]
    bus_stop: String,

    /// Bus line refs, one request each (LineRef)
    #[arg(
        long = "line-ref",
        env = "NEXT_TRANSIT_LINE_REFS",
        value_delimiter = ',',
        default_values = ["MTA NYCT_M15", "MTA NYCT_M15+"]
    )]
    line_refs: Vec<String>,

    /// GTFS stop id of the subway platform
    #[arg(long, env = "NEXT_TRANSIT_SUBWAY_STOP", default_value = "Q03S")]
    subway_stop: String,

    /// Route shown on train lines ("Next Q")
    #[arg(long, env = "NEXT_TRANSIT_ROUTE_LABEL", default_value = "Q")]
    route_label: String,

    /// Serial device of the display
    #[arg(long, env = "NEXT_TRANSIT_SERIAL_PORT", default_value = "/dev/ttyACM0")]
    serial_port: String,

    /// Serial baud rate the display firmware listens at
    #[arg(long, env = "NEXT_TRANSIT_BAUD_RATE", default_value_t = 9600)]
    baud_rate: u32,

    /// Wait after opening the serial port before writing, in milliseconds
    #[arg(long, env = "NEXT_TRANSIT_SETTLE_MS", default_value_t = 2000)]
    settle_ms: u64,

    /// Seconds between the end of one cycle and the start of the next
    #[arg(short = 'r', long, env = "NEXT_TRANSIT_REFRESH_SECS", default_value_t = 10)]
    refresh_secs: u64,

    /// Buses shown per cycle
    #[arg(long, env = "NEXT_TRANSIT_BUS_LIMIT", default_value_t = 2)]
    bus_limit: usize,

    /// Trains shown per cycle
    #[arg(long, env = "NEXT_TRANSIT_TRAIN_LIMIT", default_value_t = 2)]
    train_limit: usize,

    /// Characters of the bus line name shown before ".."
    #[arg(long, default_value_t = 8)]
    label_width: usize,

    /// Minimum columns for the minutes of a countdown
    #[arg(long, default_value_t = 2)]
    minutes_width: usize,

    /// Minimum columns for the seconds of a countdown
    #[arg(long, default_value_t = 2)]
    seconds_width: usize,

    /// How bus countdowns are split into minutes and seconds
    #[arg(long, value_enum, default_value_t = Rounding::Nearest)]
    bus_rounding: Rounding,

    /// How train countdowns are split into minutes and seconds
    #[arg(long, value_enum, default_value_t = Rounding::Floor)]
    train_rounding: Rounding,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    http_timeout_secs: u64,
}

impl From<ConfigArgs> for Config {
    fn from(args: ConfigArgs) -> Self {
        let defaults = Config::default();
        Config {
            bus: BusConfig {
                api_url: args.bus_api_url,
                api_key: args.api_key,
                stop_id: args.bus_stop,
                line_refs: args
                    .line_refs
                    .into_iter()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect(),
                rounding: args.bus_rounding,
            },
            train: TrainConfig {
                feed_url: args.train_feed_url,
                stop_id: args.subway_stop,
                route_label: args.route_label,
                rounding: args.train_rounding,
            },
            display: DisplayConfig {
                port: args.serial_port,
                baud_rate: args.baud_rate,
                settle_delay: Duration::from_millis(args.settle_ms),
                ..defaults.display
            },
            board: Board {
                bus_limit: args.bus_limit,
                train_limit: args.train_limit,
                layout: Layout {
                    label_width: args.label_width,
                    minutes_width: args.minutes_width,
                    seconds_width: args.seconds_width,
                },
            },
            refresh_interval: Duration::from_secs(args.refresh_secs),
            http_timeout: Duration::from_secs(args.http_timeout_secs),
            connect_timeout: defaults.connect_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/next_transit.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("next_transit.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            cycles,
            sink,
        } => {
            let config = Config::from(config);
            config.validate()?;

            let client = BasicClient::with_timeouts(config.http_timeout, config.connect_timeout)
                .context("failed to build HTTP client")?;

            info!(
                bus_stop = %config.bus.stop_id,
                subway_stop = %config.train.stop_id,
                line_refs = ?config.bus.line_refs,
                "Arrival board configured"
            );

            match sink {
                SinkKind::Serial => {
                    info!(
                        port = %config.display.port,
                        baud_rate = config.display.baud_rate,
                        "Writing to serial display"
                    );
                    let display = SerialDisplay::new(config.display.clone());
                    Ticker::new(&config, client, display, SystemClock)
                        .run(cycles)
                        .await;
                }
                SinkKind::Stdout => {
                    Ticker::new(&config, client, StdoutDisplay::new(), SystemClock)
                        .run(cycles)
                        .await;
                }
            }
        }
        Commands::Inspect {
            source,
            stop,
            route,
            limit,
        } => {
            let bytes = fetcher(&source).await?;
            let feed = parse_feed(&bytes).context("feed is not a GTFS-RT FeedMessage")?;
            let arrivals = arrivals_at(&feed, &stop);

            info!(
                entities = feed.entity.len(),
                stop = %stop,
                matched = arrivals.len(),
                "Feed decoded"
            );

            let now = Local::now().fixed_offset();
            let trains = arrivals
                .iter()
                .filter_map(|a| a.to_record(&route, &now, Rounding::Floor))
                .collect();
            let board = Board {
                bus_limit: 0,
                train_limit: limit,
                layout: Layout::default(),
            };
            let report = board.render(Vec::new(), trains);

            if report.is_empty() {
                warn!(stop = %stop, "No upcoming trains at this stop");
            }
            for line in report.lines() {
                info!("{line}");
            }
        }
        Commands::ListPorts => {
            let ports = available_ports().context("failed to enumerate serial ports")?;
            if ports.is_empty() {
                warn!("No serial ports found");
            }
            for port in &ports {
                info!(port = %port, "Serial port");
            }
        }
    }

    Ok(())
}

/// Loads feed data from a local file path or fetches it over HTTP.
#[tracing::instrument(fields(source = %url))]
async fn fetcher(url: &str) -> Result<Vec<u8>> {
    let bytes = if url.starts_with("http") {
        let client = BasicClient::new();
        fetch_bytes(&client, url).await?
    } else {
        std::fs::read(url).with_context(|| format!("failed to read {url}"))?
    };
    Ok(bytes)
}
