//! Shift Warden CLI - replay tracks and inspect configuration

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warden_core::{
    ChannelPositionSource, ComplianceListener, HttpCollector, Position, SensorError, ShiftMonitor,
    WardenConfig,
};
use warden_geofence::evaluate;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Shift Warden - shift-location compliance monitor")]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Replay a JSON-lines track through a live session
    Run {
        /// Configuration file path
        #[arg(short, long, default_value = "config/warden.toml")]
        config: PathBuf,

        /// Track file, one fix per line
        #[arg(short, long)]
        track: PathBuf,

        /// Seconds to keep the session alive after the last fix
        #[arg(long, default_value_t = 0)]
        linger: u64,
    },
    /// Check configuration validity
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "config/warden.toml")]
        config: PathBuf,
    },
    /// Evaluate one coordinate against the configured work area
    Distance {
        /// Configuration file path
        #[arg(short, long, default_value = "config/warden.toml")]
        config: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
}

/// One line of a track file.
///
/// ```text
/// {"latitude": 40.7128, "longitude": -74.0060, "accuracy_meters": 8.0, "wait_secs": 5}
/// {"sensor_error": "timeout"}
/// ```
#[derive(Debug, Deserialize)]
struct TrackLine {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default = "default_accuracy")]
    accuracy_meters: f64,
    #[serde(default)]
    wait_secs: f64,
    sensor_error: Option<String>,
}

fn default_accuracy() -> f64 {
    10.0
}

enum TrackItem {
    Fix(Position),
    Failure(SensorError),
}

impl TrackLine {
    fn into_item(self) -> anyhow::Result<TrackItem> {
        if let Some(kind) = self.sensor_error {
            let error = match kind.as_str() {
                "permission_denied" => SensorError::PermissionDenied,
                "timeout" => SensorError::Timeout,
                other => SensorError::Unavailable(other.to_string()),
            };
            return Ok(TrackItem::Failure(error));
        }
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Ok(TrackItem::Fix(Position::now(lat, lon, self.accuracy_meters))),
            _ => bail!("track line needs latitude and longitude, or sensor_error"),
        }
    }
}

/// Listener that reports through the log.
struct LogListener;

impl ComplianceListener for LogListener {
    fn on_violation_detected(&self, distance_meters: f64) {
        warn!(distance = distance_meters, "VIOLATION: outside work area");
    }

    fn on_returned_to_compliance(&self) {
        info!("back inside work area");
    }

    fn on_network_error(&self) {
        warn!("collector unreachable, heartbeats are being retried");
    }

    fn on_sensor_error(&self, error: &SensorError) {
        warn!(%error, "location unavailable");
    }

    fn on_session_ended(&self, reason: &str) {
        warn!(reason, "collector ended the session");
    }
}

fn load_config(path: &Path) -> anyhow::Result<WardenConfig> {
    let config = WardenConfig::load(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating {}", path.display()))?;
    Ok(config)
}

fn read_track(path: &Path) -> anyhow::Result<Vec<(Duration, TrackItem)>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut items = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed: TrackLine = serde_json::from_str(line)
            .with_context(|| format!("{}:{}", path.display(), index + 1))?;
        let wait = Duration::try_from_secs_f64(parsed.wait_secs.max(0.0))
            .with_context(|| format!("{}:{}: bad wait_secs", path.display(), index + 1))?;
        let item = parsed
            .into_item()
            .with_context(|| format!("{}:{}", path.display(), index + 1))?;
        items.push((wait, item));
    }
    Ok(items)
}

async fn run(config: &Path, track: &Path, linger: u64) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let work_area = config.require_work_area()?;
    let items = read_track(track)?;

    let collector = HttpCollector::new(&config.collector).context("building collector")?;
    let (source, platform) = ChannelPositionSource::new(64);
    let mut monitor =
        ShiftMonitor::with_config(Arc::new(source), Arc::new(collector), config.monitor.clone())?;
    monitor.start(work_area, Arc::new(LogListener))?;

    info!(fixes = items.len(), "replaying track");
    for (wait, item) in items {
        tokio::time::sleep(wait).await;
        if !monitor.is_running() {
            warn!("session ended before the track finished");
            break;
        }
        let accepted = match item {
            TrackItem::Fix(pos) => platform.push(Position {
                captured_at: chrono::Utc::now(),
                ..pos
            }),
            TrackItem::Failure(error) => platform.fail(error),
        };
        if !accepted {
            warn!("position watch is not accepting events");
        }
    }

    tokio::time::sleep(Duration::from_secs(linger)).await;
    let status = monitor.status();
    monitor.stop().await;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn check(config: &Path) -> anyhow::Result<()> {
    let config = load_config(config)?;
    println!("collector: {}", config.collector.heartbeat_url()?);
    println!(
        "cadence:   {}s compliant / {}s warning",
        config.monitor.compliant_interval_secs, config.monitor.warning_interval_secs
    );
    match &config.work_area {
        Some(area) => println!(
            "work area: ({:.6}, {:.6}) r={}m",
            area.center_latitude, area.center_longitude, area.radius_meters
        ),
        None => println!("work area: (supplied per shift)"),
    }
    if config.collector.token.is_empty() {
        println!("token:     MISSING (set {})", warden_core::TOKEN_ENV);
    }
    println!("Configuration OK");
    Ok(())
}

fn distance(config: &Path, lat: f64, lon: f64) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let area = config.require_work_area()?;
    let pos = Position::now(lat, lon, 0.0);
    pos.validate().context("invalid coordinate")?;

    let evaluation = evaluate(&area, &pos);
    println!(
        "{:.2} m from centre, {} (radius {} m)",
        evaluation.distance_meters,
        if evaluation.in_range { "INSIDE" } else { "OUTSIDE" },
        area.radius_meters
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Commands::Run {
            config,
            track,
            linger,
        }) => run(&config, &track, linger).await,
        Some(Commands::Check { config }) => check(&config),
        Some(Commands::Distance { config, lat, lon }) => distance(&config, lat, lon),
        None => {
            println!("Shift Warden v{} - Use --help for commands", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
