//! `bacreg-tui`: terminal editor for BACnet device point registries.
//!
//! Scans a platform's BACnet proxy for devices, streams a device's points
//! into an editable grid, and writes the result to a CSV file or back to the
//! platform driver. Without a configured profile it edits local files only.
//!
//! Logs go to a file (default under the user data directory) so they never
//! corrupt the terminal.

mod action;
mod app;
mod component;
mod event;
mod remote;
mod screen;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use bacreg_config::PlatformAuth;
use bacreg_core::{DeviceKey, DiscoverySession, Offline, PlatformConnection, ScanRequest};

use crate::app::{App, Startup};
use crate::remote::Remote;

/// Terminal editor for BACnet device point registries.
#[derive(Parser, Debug)]
#[command(name = "bacreg-tui", version, about)]
struct Cli {
    /// Registry CSV file to open
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// BACnet device instance to collect points from (or to file --file under)
    #[arg(short, long)]
    device_id: Option<u32>,

    /// Network address of --device-id
    #[arg(short, long, requires = "device_id")]
    address: Option<String>,

    /// Config profile to use
    #[arg(short, long, env = "BACREG_PROFILE")]
    profile: Option<String>,

    /// Log file path (defaults to bacreg-tui.log in the user data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn default_log_file() -> PathBuf {
    directories::ProjectDirs::from("com", "bacreg", "bacreg").map_or_else(
        || std::env::temp_dir().join("bacreg-tui.log"),
        |dirs| dirs.data_dir().join("bacreg-tui.log"),
    )
}

/// File-based tracing; the returned guard flushes on drop.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("bacreg_tui={level},bacreg_core={level},bacreg_api={level}"))
    });

    let log_file = cli.log_file.clone().unwrap_or_else(default_log_file);
    let dir = log_file.parent().unwrap_or(Path::new("."));
    let _ = std::fs::create_dir_all(dir);
    let name = log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("bacreg-tui.log"));

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    guard
}

/// The configured platform, or offline handles when there is no profile.
struct Connection {
    remote: Remote,
    sink: Remote,
    session: DiscoverySession,
    platform_uuid: String,
    scan_length: u32,
}

async fn connect(cli: &Cli) -> Result<Connection> {
    let cfg = bacreg_config::load_config()?;
    let offline = || Connection {
        remote: Remote::Offline(Offline),
        sink: Remote::Offline(Offline),
        session: DiscoverySession::new("local"),
        platform_uuid: "local".into(),
        scan_length: cfg.defaults.scan_length,
    };

    let (name, profile) = match cfg.profile(cli.profile.as_deref()) {
        Ok(found) => found,
        Err(_) if cli.profile.is_none() => return Ok(offline()),
        Err(e) => return Err(e.into()),
    };
    let (mut config, auth) = bacreg_config::profile_to_platform_config(profile, name, &cfg.defaults)?;
    if let PlatformAuth::Login { username, password } = auth {
        info!(%username, profile = name, "signing in");
        config.token = PlatformConnection::login(&config, &username, &password).await?;
    }

    let session = DiscoverySession::new(config.platform_uuid.clone())
        .with_timeout(config.scan_timeout)
        .with_key_props(config.key_props.clone());
    Ok(Connection {
        remote: Remote::Platform(PlatformConnection::new(&config)?),
        sink: Remote::Platform(PlatformConnection::new(&config)?),
        session,
        platform_uuid: config.platform_uuid.clone(),
        scan_length: cfg.defaults.scan_length,
    })
}

/// What to open first, from the command line.
fn startup(cli: &Cli, connected: bool) -> Result<Startup> {
    let address = cli.address.clone();
    match (&cli.file, cli.device_id) {
        (Some(path), device_id) => {
            let key = match device_id {
                Some(id) => DeviceKey::new(id.to_string(), address.unwrap_or_default()),
                None => {
                    let stem = path
                        .file_stem()
                        .map_or_else(|| "registry".into(), |s| s.to_string_lossy().into_owned());
                    DeviceKey::new(stem, "local")
                }
            };
            Ok(Startup::File {
                path: path.clone(),
                key,
            })
        }
        (None, Some(id)) if connected => Ok(Startup::Device {
            id: id.to_string(),
            address: address.unwrap_or_default(),
        }),
        (None, Some(_)) => Err(eyre!(
            "--device-id needs a platform profile; run `bacreg config init` first"
        )),
        (None, None) => Ok(Startup::Scan),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Hooks before the terminal is touched.
    tui::install_hooks()?;
    let _log_guard = setup_tracing(&cli);
    info!(version = env!("CARGO_PKG_VERSION"), "bacreg-tui starting");

    let connection = connect(&cli).await?;
    let startup = startup(&cli, connection.remote.is_connected())?;

    let request = ScanRequest {
        low_device_id: cli.device_id,
        high_device_id: cli.device_id,
        target_address: cli.address.clone(),
        scan_length: Some(connection.scan_length),
    };

    let mut app = App::new(
        connection.remote,
        connection.sink,
        connection.session,
        connection.platform_uuid,
        request,
        startup,
    );
    app.run().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bacreg-tui").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn file_alone_is_filed_under_its_stem() {
        let Startup::File { key, .. } = startup(&cli(&["--file", "/tmp/ahu-1.csv"]), false).unwrap()
        else {
            panic!("expected a file startup");
        };
        assert_eq!(key, DeviceKey::new("ahu-1", "local"));
    }

    #[test]
    fn file_with_device_uses_its_identity() {
        let args = cli(&["-f", "ahu.csv", "-d", "2001", "-a", "10.0.0.5"]);
        let Startup::File { key, .. } = startup(&args, false).unwrap() else {
            panic!("expected a file startup");
        };
        assert_eq!(key, DeviceKey::new("2001", "10.0.0.5"));
    }

    #[test]
    fn device_without_platform_is_an_error() {
        assert!(startup(&cli(&["-d", "2001"]), false).is_err());
        assert!(matches!(
            startup(&cli(&["-d", "2001"]), true).unwrap(),
            Startup::Device { id, .. } if id == "2001"
        ));
    }

    #[test]
    fn address_requires_device() {
        assert!(Cli::try_parse_from(["bacreg-tui", "--address", "10.0.0.5"]).is_err());
    }
}
