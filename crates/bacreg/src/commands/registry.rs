//! `bacreg registry`: fetch, show, edit and push point registries.

use std::path::Path;

use serde::Serialize;
use tabled::Tabled;

use bacreg_core::{
    Device, DeviceKey, DeviceRegistry, DiscoverySession, Offline, PlatformConnection,
    RemoteCalls, ScanRequest, Workspace, codec,
};

use crate::cli::{EditArgs, GlobalOpts, RegistryArgs, RegistryCommand};
use crate::commands::{scan, util};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Clone, Tabled, Serialize)]
struct ColumnRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Width")]
    width: u16,
}

pub async fn handle(args: RegistryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        RegistryCommand::Fetch {
            device_id,
            address,
            file,
            timeout_ms,
        } => fetch(device_id, &address, file.as_deref(), timeout_ms, global).await,
        RegistryCommand::Show {
            file,
            filter,
            column,
            columns,
        } => show(&file, filter.as_deref(), column, columns, global),
        RegistryCommand::Edit(edit_args) => edit(edit_args, global),
        RegistryCommand::Push {
            file,
            device_id,
            address,
            agent,
        } => push(&file, DeviceKey::new(device_id, address), agent, global).await,
    }
}

/// Local workspace for editing files with no platform attached.
fn offline_workspace() -> Workspace<Offline> {
    Workspace::new(Offline, DiscoverySession::new("local"), "local")
}

// ── Fetch ───────────────────────────────────────────────────────────

async fn fetch(
    device_id: u32,
    address: &str,
    file: Option<&Path>,
    timeout_ms: Option<u64>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let request = ScanRequest {
        low_device_id: Some(device_id),
        high_device_id: Some(device_id),
        target_address: Some(address.to_owned()),
        scan_length: Some(config::default_scan_length()),
    };
    let id = device_id.to_string();
    let mut discovery = scan::start(global, &request, timeout_ms).await?;
    let bar = util::spinner(&format!("Waiting for device {id}"), global);

    // 1. The device has to answer before its points can be requested.
    scan::pump_until(
        &mut discovery.ws,
        |ws| find_device(ws, &id, address).is_some(),
        |_| {},
    )
    .await;
    let Some(key) = find_device(&discovery.ws, &id, address) else {
        bar.finish_and_clear();
        return Err(CliError::Timeout {
            what: format!("Waiting for device {id} at {address}"),
        });
    };

    // 2. Stream its points until the proxy reports completion.
    bar.set_message(format!("Collecting points from {key}"));
    let feed = discovery
        .ws
        .remote()
        .point_feed(discovery.streams.clone())
        .await?;
    discovery.ws.configure_device(&key, feed).await?;
    scan::pump_until(
        &mut discovery.ws,
        |ws| ws.device(&key).is_none_or(|d| !d.configuring),
        |ws| {
            let points = ws.device(&key).map_or(0, |d| d.registry.len());
            bar.set_message(format!("Collecting points from {key} ({points} so far)"));
        },
    )
    .await;
    bar.finish_and_clear();

    let device = discovery.ws.device(&key).ok_or_else(|| CliError::NotFound {
        resource_type: "device".into(),
        identifier: key.to_string(),
        hint: "The scan was reset while collecting points.".into(),
    })?;
    if device.configuring {
        output::print_warnings(
            &["The point stream did not finish; the registry may be incomplete."],
            global,
        );
    }

    let registry = &device.registry;
    if let Some(path) = file {
        write_registry(registry, &key, path)?;
        output::print_status(
            &format!("Wrote {} points to {}", registry.len(), path.display()),
            global,
        );
    } else {
        let rows: Vec<_> = registry.rows().iter().collect();
        let out = output::render_registry(global.output, &rows)?;
        output::print_output(&out, global.quiet);
    }
    discovery.ws.cancel_scan();
    Ok(())
}

/// The discovered device with `id`, preferring the one at `address`.
fn find_device<R: RemoteCalls>(ws: &Workspace<R>, id: &str, address: &str) -> Option<DeviceKey> {
    let devices = ws.inventory().devices();
    devices
        .iter()
        .find(|d| d.id == id && d.address == address)
        .or_else(|| devices.iter().find(|d| d.id == id))
        .map(Device::key)
}

// ── Show ────────────────────────────────────────────────────────────

fn show(
    file: &Path,
    filter: Option<&str>,
    column: usize,
    list_columns: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut ws = offline_workspace();
    let key = util::file_device_key(file);
    let warnings = util::load_registry_file(&mut ws, &key, file)?;
    output::print_warnings(&warnings, global);

    let (editor, registry) = ws.editing()?;

    if list_columns {
        let columns: Vec<ColumnRow> = registry
            .columns()
            .iter()
            .enumerate()
            .map(|(index, c)| ColumnRow {
                index,
                label: c.label.clone(),
                key: c.key.clone(),
                width: c.width,
            })
            .collect();
        let out = output::render_list(global.output, &columns, ColumnRow::clone, |c| {
            c.label.clone()
        })?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    if let Some(term) = filter {
        util::check_column(registry, column)?;
        editor.filter(registry, term, column);
    }

    let rows: Vec<_> = registry.rows().iter().filter(|r| r.visible).collect();
    let out = output::render_registry(global.output, &rows)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Edit ────────────────────────────────────────────────────────────

fn edit(args: EditArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut ws = offline_workspace();
    let key = util::file_device_key(&args.file);
    let warnings = util::load_registry_file(&mut ws, &key, &args.file)?;
    output::print_warnings(&warnings, global);

    let mut changes = 0usize;

    // 1. Schema and new points.
    {
        let (_, registry) = ws.editing()?;
        for spec in &args.add_column {
            let (after, label) = util::parse_column_spec("add-column", spec)?;
            util::check_column(registry, after)?;
            registry.add_column(after, &label)?;
            changes += 1;
        }
        for spec in &args.clone_column {
            let (after, label) = util::parse_column_spec("clone-column", spec)?;
            util::check_column(registry, after)?;
            registry.clone_column(after, &label)?;
            changes += 1;
        }

        // Highest first so earlier removals don't shift later ones.
        let mut removals = args.remove_column.clone();
        removals.sort_unstable_by(|a, b| b.cmp(a));
        removals.dedup();
        for index in removals {
            util::check_column(registry, index)?;
            let column = registry.remove_column(index)?;
            tracing::debug!(label = %column.label, "column removed");
            changes += 1;
        }

        for name in &args.add_point {
            registry.add_point(name)?;
            changes += 1;
        }
    }

    // 2. Point removal.
    if !args.remove_point.is_empty() {
        util::confirm(
            &format!("Remove {} point(s) from the registry?", args.remove_point.len()),
            "remove-point",
            global.yes,
        )?;
        let removed = ws.remove_points(&args.remove_point)?;
        if removed < args.remove_point.len() {
            output::print_warnings(
                &[format!(
                    "{} of the named points were not in the registry.",
                    args.remove_point.len() - removed
                )],
                global,
            );
        }
        changes += removed;
    }

    // 3. Cell values.
    {
        let (editor, registry) = ws.editing()?;
        for spec in &args.set {
            let (row, column, value) = util::parse_cell_spec(spec)?;
            util::check_row(registry, row)?;
            util::check_column(registry, column)?;
            registry.update_cell(row, column, value);
            changes += 1;
        }

        for spec in &args.replace_all {
            let (column, find, replacement) = util::parse_replace_spec(spec)?;
            util::check_column(registry, column)?;
            editor.clear_find(registry, column);
            if editor.find_next(registry, &find, column).is_none() {
                continue;
            }
            changes += editor.selected_cells().len();
            editor.replace_all(registry, &find, &replacement, column);
            editor.clear_find(registry, column);
        }
    }

    let target = args.out.as_deref().unwrap_or(&args.file);
    let (_, registry) = ws.editing()?;
    write_registry(registry, &key, target)?;
    output::print_status(
        &format!("{changes} change(s) written to {}", target.display()),
        global,
    );
    Ok(())
}

// ── Push ────────────────────────────────────────────────────────────

async fn push(
    file: &Path,
    key: DeviceKey,
    agent: Option<String>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut ws = offline_workspace();
    let warnings = util::load_registry_file(&mut ws, &key, file)?;
    output::print_warnings(&warnings, global);

    let (connection, _) = config::connect(global).await?;
    let connection: PlatformConnection = match agent {
        Some(identity) => connection.with_agent(identity),
        None => connection,
    };

    let handoff = ws.save(&connection, &key).await?;
    output::print_status(
        &format!(
            "Saved {} points for device {} at {}",
            handoff.rows.len(),
            handoff.device_id,
            handoff.device_address
        ),
        global,
    );
    Ok(())
}

// ── Files ───────────────────────────────────────────────────────────

/// Write the saved form of `registry`, which keeps the header even when
/// every point was removed.
fn write_registry(registry: &DeviceRegistry, key: &DeviceKey, path: &Path) -> Result<(), CliError> {
    let text = codec::render_handoff(&registry.handoff(key))?;
    std::fs::write(path, text)?;
    Ok(())
}
