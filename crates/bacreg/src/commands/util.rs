//! Shared helpers for command handlers.

use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use bacreg_core::{DeviceKey, DeviceRegistry, RemoteCalls, Workspace};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<(), CliError> {
    if yes_flag {
        return Ok(());
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    if confirmed { Ok(()) } else { Err(CliError::Aborted) }
}

// ── Argument parsing ────────────────────────────────────────────────

fn invalid(field: &str, value: &str, expected: &str) -> CliError {
    CliError::Validation {
        field: field.into(),
        reason: format!("'{value}' is not {expected}"),
    }
}

fn parse_index(field: &str, value: &str) -> Result<usize, CliError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(field, value, "a column or row number"))
}

/// `AFTER:LABEL`
pub fn parse_column_spec(field: &str, spec: &str) -> Result<(usize, String), CliError> {
    let (after, label) = spec
        .split_once(':')
        .ok_or_else(|| invalid(field, spec, "in AFTER:LABEL form"))?;
    Ok((parse_index(field, after)?, label.to_owned()))
}

/// `ROW:COL=VALUE`
pub fn parse_cell_spec(spec: &str) -> Result<(usize, usize, String), CliError> {
    let (at, value) = spec
        .split_once('=')
        .ok_or_else(|| invalid("set", spec, "in ROW:COL=VALUE form"))?;
    let (row, col) = at
        .split_once(':')
        .ok_or_else(|| invalid("set", spec, "in ROW:COL=VALUE form"))?;
    Ok((parse_index("set", row)?, parse_index("set", col)?, value.to_owned()))
}

/// `COL:FIND=REPLACE`
pub fn parse_replace_spec(spec: &str) -> Result<(usize, String, String), CliError> {
    let (col, rest) = spec
        .split_once(':')
        .ok_or_else(|| invalid("replace-all", spec, "in COL:FIND=REPLACE form"))?;
    let (find, replacement) = rest
        .split_once('=')
        .ok_or_else(|| invalid("replace-all", spec, "in COL:FIND=REPLACE form"))?;
    if find.is_empty() {
        return Err(invalid("replace-all", spec, "a non-empty search"));
    }
    Ok((
        parse_index("replace-all", col)?,
        find.to_owned(),
        replacement.to_owned(),
    ))
}

/// Reject column numbers the registry doesn't have.
pub fn check_column(registry: &DeviceRegistry, index: usize) -> Result<(), CliError> {
    if index < registry.width() {
        Ok(())
    } else {
        Err(CliError::Validation {
            field: "column".into(),
            reason: format!(
                "column {index} does not exist (the registry has {} columns)",
                registry.width()
            ),
        })
    }
}

pub fn check_row(registry: &DeviceRegistry, index: usize) -> Result<(), CliError> {
    if index < registry.len() {
        Ok(())
    } else {
        Err(CliError::Validation {
            field: "row".into(),
            reason: format!(
                "row {index} does not exist (the registry has {} rows)",
                registry.len()
            ),
        })
    }
}

// ── Registry files ──────────────────────────────────────────────────

/// Key a local registry file is edited under.
pub fn file_device_key(path: &Path) -> DeviceKey {
    let stem = path
        .file_stem()
        .map_or_else(|| "registry".to_owned(), |s| s.to_string_lossy().into_owned());
    DeviceKey::new(stem, "local")
}

/// Import `path` into `ws` under `key` and open the editor on it.
///
/// Returns the import warnings.
pub fn load_registry_file<R: RemoteCalls>(
    ws: &mut Workspace<R>,
    key: &DeviceKey,
    path: &Path,
) -> Result<Vec<String>, CliError> {
    let text = std::fs::read_to_string(path)?;
    let warnings = ws.import_csv(key, &text)?;
    ws.open_editor(key)?;
    Ok(warnings)
}

// ── Progress ────────────────────────────────────────────────────────

/// Stderr spinner, hidden in quiet mode and when stderr is not a terminal.
pub fn spinner(message: &str, global: &GlobalOpts) -> ProgressBar {
    if global.quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn column_spec_splits_on_first_colon() {
        assert_eq!(
            parse_column_spec("add-column", "2:Notes: extra").unwrap(),
            (2, "Notes: extra".to_owned())
        );
        assert!(parse_column_spec("add-column", "Notes").is_err());
        assert!(parse_column_spec("add-column", "x:Notes").is_err());
    }

    #[test]
    fn cell_spec_keeps_equals_in_value() {
        assert_eq!(
            parse_cell_spec("1:3=a=b").unwrap(),
            (1, 3, "a=b".to_owned())
        );
        assert!(parse_cell_spec("1=3").is_err());
    }

    #[test]
    fn replace_spec_needs_a_search() {
        assert_eq!(
            parse_replace_spec("0:Zone=Room").unwrap(),
            (0, "Zone".to_owned(), "Room".to_owned())
        );
        assert_eq!(
            parse_replace_spec("0:Zone=").unwrap(),
            (0, "Zone".to_owned(), String::new())
        );
        assert!(parse_replace_spec("0:=Room").is_err());
    }

    #[test]
    fn file_key_uses_stem() {
        let key = file_device_key(Path::new("/tmp/ahu-1.csv"));
        assert_eq!(key, DeviceKey::new("ahu-1", "local"));
    }
}
