//! `bacreg scan`: discover devices on the network.

use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use bacreg_core::{
    Device, DiscoverySession, PlatformConfig, PlatformConnection, ScanRequest, ScanState,
    Workspace,
};

use crate::cli::{GlobalOpts, ScanArgs};
use crate::commands::util;
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Vendor")]
    vendor: String,
    #[tabled(rename = "Max APDU")]
    max_apdu: String,
    #[tabled(rename = "Segmentation")]
    segmentation: String,
}

/// JSON/YAML shape of a discovered device.
#[derive(Serialize)]
struct DeviceSummary<'a> {
    id: &'a str,
    address: &'a str,
    name: Option<&'a str>,
    vendor_id: Option<&'a str>,
    max_apdu_length: Option<&'a str>,
    segmentation: Option<&'a str>,
}

impl<'a> From<&'a Device> for DeviceSummary<'a> {
    fn from(d: &'a Device) -> Self {
        Self {
            id: &d.id,
            address: &d.address,
            name: d.name.as_deref(),
            vendor_id: d.vendor_id.as_deref(),
            max_apdu_length: d.max_apdu_length.as_deref(),
            segmentation: d.segmentation.as_deref(),
        }
    }
}

fn to_row(d: &DeviceSummary<'_>) -> DeviceRow {
    DeviceRow {
        id: d.id.to_owned(),
        address: d.address.to_owned(),
        name: d.name.unwrap_or("-").to_owned(),
        vendor: d.vendor_id.unwrap_or("-").to_owned(),
        max_apdu: d.max_apdu_length.unwrap_or("-").to_owned(),
        segmentation: d.segmentation.unwrap_or("-").to_owned(),
    }
}

// ── Shared discovery plumbing ───────────────────────────────────────

/// A connected workspace plus the token that closes its announcement streams.
pub struct Discovery {
    pub ws: Workspace<PlatformConnection>,
    pub streams: CancellationToken,
}

impl Drop for Discovery {
    fn drop(&mut self) {
        self.streams.cancel();
    }
}

/// Connect, open the device stream and ask the proxy to scan.
pub async fn start(
    global: &GlobalOpts,
    request: &ScanRequest,
    timeout_ms: Option<u64>,
) -> Result<Discovery, CliError> {
    let (connection, platform) = config::connect(global).await?;
    let session = session_for(&platform, timeout_ms);
    let streams = CancellationToken::new();

    let feed = connection.device_feed(streams.clone()).await?;
    let mut ws = Workspace::new(connection, session, platform.platform_uuid.clone());
    ws.start_scan(request, feed).await?;

    Ok(Discovery { ws, streams })
}

fn session_for(platform: &PlatformConfig, timeout_ms: Option<u64>) -> DiscoverySession {
    let timeout = timeout_ms.map_or(platform.scan_timeout, Duration::from_millis);
    DiscoverySession::new(platform.platform_uuid.clone())
        .with_timeout(timeout)
        .with_key_props(platform.key_props.clone())
}

/// Apply discovery events until `done` holds, the session runs dry, or
/// Ctrl-C cancels it. `tick` runs after every applied event.
pub async fn pump_until(
    ws: &mut Workspace<PlatformConnection>,
    done: impl Fn(&Workspace<PlatformConnection>) -> bool,
    tick: impl Fn(&Workspace<PlatformConnection>),
) -> ScanState {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !done(ws) {
        tokio::select! {
            event = ws.next_event() => match event {
                Some(event) => {
                    ws.apply(event);
                    tick(ws);
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                ws.cancel_scan();
                break;
            }
        }
    }
    ws.session().state()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ScanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let request = ScanRequest {
        low_device_id: args.low,
        high_device_id: args.high,
        target_address: args.address,
        scan_length: Some(args.scan_length.unwrap_or_else(config::default_scan_length)),
    };

    let mut discovery = start(global, &request, args.timeout_ms).await?;
    let bar = util::spinner("Scanning for devices", global);

    let state = pump_until(
        &mut discovery.ws,
        |_| false,
        |ws| bar.set_message(format!("Scanning for devices ({} found)", ws.inventory().len())),
    )
    .await;
    bar.finish_and_clear();
    tracing::debug!(%state, "scan finished");

    let inventory = discovery.ws.inventory();
    let devices: Vec<DeviceSummary<'_>> = inventory.devices().iter().map(Into::into).collect();

    let out = output::render_list(global.output, &devices, to_row, |d| {
        format!("{}\t{}", d.id, d.address)
    })?;
    output::print_output(&out, global.quiet);

    let warnings: Vec<String> = inventory
        .warnings()
        .iter()
        .map(|w| format!("{} ({})", w.message, w.items.join(", ")))
        .collect();
    output::print_warnings(&warnings, global);

    if devices.is_empty() && !global.quiet {
        eprintln!("No devices answered.");
    }
    Ok(())
}
