use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use simloc::{protocol::parse, Device, Gpx, MemoryDevice, TcpDevice};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Simulate the location reported by a device.
#[derive(Parser, Debug)]
#[command(version, about)]
#[command(group(ArgGroup::new("target").required(true).args(["device", "dry_run"])))]
struct Cli {
    /// TCP address forwarding the device's simulated-location service
    #[arg(short, long)]
    device: Option<SocketAddr>,

    /// Print the frames that would be sent instead of connecting
    #[arg(long)]
    dry_run: bool,

    // RUST_LOG overrides the level chosen here.
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set a fixed location
    Set {
        #[arg(long, allow_hyphen_values = true)]
        lat: String,
        #[arg(long, allow_hyphen_values = true)]
        lon: String,
    },
    /// Return to the real location
    Reset,
    /// Replay the tracks of a GPX file in real time
    Gpx { file: PathBuf },
}

fn log_filter(verbose: &Verbosity<InfoLevel>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(verbose.tracing_level_filter().into())
        .from_env_lossy()
}

fn execute<D: Device>(device: &D, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Set { lat, lon } => {
            simloc::set_location(device, lat, lon).context("setting location")?
        }
        Command::Reset => simloc::reset_location(device).context("resetting location")?,
        Command::Gpx { file } => {
            let gpx =
                Gpx::from_path(file).with_context(|| format!("loading {}", file.display()))?;
            info!(points = gpx.len(), "replaying {}", file.display());
            simloc::playback(device, &gpx).context("replaying track")?;
        }
    }
    Ok(())
}

fn dump_frames(device: &MemoryDevice) -> anyhow::Result<()> {
    for frame in device.frames() {
        let hex: String = frame.iter().map(|b| format!("{b:02x}")).collect();
        println!("{hex}  {:?}", parse(&frame)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&cli.verbose))
        .init();

    match cli.device {
        Some(addr) => execute(&TcpDevice::new(addr), &cli.command),
        None => {
            let device = MemoryDevice::new();
            let res = execute(&device, &cli.command);
            dump_frames(&device)?;
            res
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        use tracing::level_filters::LevelFilter;

        // (args, expected level)
        let test_cases = [
            (vec!["simloc", "--dry-run", "reset"], LevelFilter::INFO),
            (vec!["simloc", "--dry-run", "-v", "reset"], LevelFilter::DEBUG),
            (vec!["simloc", "-vv", "--dry-run", "reset"], LevelFilter::TRACE),
            (vec!["simloc", "--dry-run", "-q", "reset"], LevelFilter::WARN),
            (vec!["simloc", "--dry-run", "reset", "-v"], LevelFilter::DEBUG),
        ];
        for (args, level) in test_cases.iter() {
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(cli.verbose.tracing_level_filter(), *level, "{args:?}");
        }
    }

    #[test]
    fn test_parse_negative_coords() {
        let cli = Cli::try_parse_from([
            "simloc", "--dry-run", "-q", "set", "--lat", "-33.8688", "--lon", "-151.2093",
        ])
        .unwrap();
        assert!(cli.dry_run);
        assert_eq!(
            cli.verbose.tracing_level_filter(),
            tracing::level_filters::LevelFilter::WARN
        );
        match cli.command {
            Command::Set { lat, lon } => {
                assert_eq!(lat, "-33.8688");
                assert_eq!(lon, "-151.2093");
            }
            c => panic!("unexpected command {c:?}"),
        }
    }

    #[test]
    fn test_target_required_and_exclusive() {
        assert!(Cli::try_parse_from(["simloc", "reset"]).is_err());
        assert!(
            Cli::try_parse_from(["simloc", "-d", "127.0.0.1:9000", "--dry-run", "reset"]).is_err()
        );
        let cli =
            Cli::try_parse_from(["simloc", "-d", "127.0.0.1:9000", "gpx", "track.gpx"]).unwrap();
        assert_eq!(cli.device, Some("127.0.0.1:9000".parse().unwrap()));
    }

    #[test]
    fn test_execute_dry_run() {
        let device = MemoryDevice::new();
        execute(
            &device,
            &Command::Set {
                lat: "1.5".to_string(),
                lon: "2".to_string(),
            },
        )
        .unwrap();
        execute(&device, &Command::Reset).unwrap();
        assert_eq!(device.frames().len(), 2);
        let missing = Command::Gpx {
            file: "/nonexistent.gpx".into(),
        };
        assert!(execute(&device, &missing).is_err());
    }
}
