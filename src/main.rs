//! CLI entry point for the route tracker.
//!
//! `track` polls a GTFS-RT vehicle positions feed and reports the vehicles
//! running on one route every cycle. `decode` pushes a saved feed file
//! through the same streaming decoder once.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use route_tracker::config::{Config, FeedArgs};
use route_tracker::cycle::{Tracker, decode_stream};
use route_tracker::decoder::{DEFAULT_MAX_MESSAGE_LEN, FeedDecoder};
use route_tracker::fetch::client_for;
use route_tracker::network::{HostNetwork, Network};
use route_tracker::output::{OutputFormat, Reporter, reporter_for};
use route_tracker::stream::{ByteStream, FileSource};
use std::ffi::OsStr;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "route_tracker")]
#[command(about = "Track the vehicles on one route of a GTFS-RT feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the feed and report vehicles on the route every cycle
    Track {
        #[command(flatten)]
        feed: FeedArgs,

        /// Number of cycles to run (0 = forever)
        #[arg(short = 'n', long, default_value_t = 0)]
        cycles: usize,

        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Decode a saved feed file once
    Decode {
        /// Protobuf-encoded FeedMessage
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Route to count
        #[arg(long, env = "ROUTE_ID")]
        route_id: String,

        /// Largest header or entity the decoder will buffer
        #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_LEN)]
        max_message_bytes: usize,

        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track {
            feed,
            cycles,
            format,
        } => {
            let config = Config::from_args(feed)?;

            let network = HostNetwork::new(config.probe_addr);
            match network.local_address().await {
                Some(addr) => info!(%addr, "Network ready"),
                None => warn!("No network route yet, cycles will report disconnected"),
            }

            let client = client_for(&config)?;

            info!(
                route_id = %config.route_id,
                feed_url = %config.feed_url,
                interval_ms = config.poll_interval.as_millis() as u64,
                "Starting tracker"
            );

            let mut tracker = Tracker::new(config, network, client, reporter_for(format));
            tracker.run(NonZeroUsize::new(cycles)).await;
        }
        Commands::Decode {
            path,
            route_id,
            max_message_bytes,
            format,
        } => {
            let source = FileSource::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let len = source.file_len();
            let mut stream = ByteStream::with_len(source, len);

            let mut reporter = reporter_for(format);
            let decoder = FeedDecoder::new(max_message_bytes);
            let report = decode_stream(&decoder, &mut stream, &route_id, &mut reporter).await;
            reporter.cycle(&report);

            if !report.is_success() {
                bail!("Failed to decode {}", path.display());
            }
        }
    }

    Ok(())
}

/// Colored stderr logs plus a JSON daily-rolling log file.
fn init_logging() -> WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/route_tracker.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("route_tracker.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    file_guard
}
