//! Output formatting: table, JSON, YAML, CSV, plain.
//!
//! Renders data in the format selected by `--output`. Fixed-shape lists use
//! the `Tabled` derive; registries have a runtime schema and go through the
//! table builder instead.

use std::io::{self, IsTerminal, Write};

use indexmap::IndexMap;
use owo_colors::OwoColorize;
use tabled::builder::Builder;
use tabled::{Table, Tabled, settings::Style};

use bacreg_core::{RegistryRow, codec};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled on stderr.
pub fn should_color(global: &GlobalOpts) -> bool {
    if global.no_color {
        return false;
    }
    match global.color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Print warnings to stderr, one per line.
pub fn print_warnings<S: AsRef<str>>(warnings: &[S], global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    let color = should_color(global);
    let mut stderr = io::stderr().lock();
    for warning in warnings {
        let warning = warning.as_ref();
        let _ = if color {
            writeln!(stderr, "{} {warning}", "warning:".yellow().bold())
        } else {
            writeln!(stderr, "warning: {warning}")
        };
    }
}

/// One-line status message to stderr, e.g. "✓ Saved".
pub fn print_status(message: &str, global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    if should_color(global) {
        eprintln!("{} {message}", "✓".green());
    } else {
        eprintln!("✓ {message}");
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact` / `yaml`: serializes the original data via serde
/// - `csv`: the `Tabled` headers and fields as CSV
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Csv => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            tabled_csv(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table, CSV and plain all use `detail_fn`; single items have no row shape.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table | OutputFormat::Csv | OutputFormat::Plain => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Render registry rows. Structured formats emit one object per row keyed
/// by column label; `plain` emits point names.
pub fn render_registry(format: OutputFormat, rows: &[&RegistryRow]) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let mut builder = Builder::default();
            if let Some(first) = rows.first() {
                builder.push_record(first.cells.iter().map(|c| c.label.clone()));
            }
            for row in rows {
                builder.push_record(row.values().map(str::to_owned));
            }
            Ok(builder.build().with(Style::rounded()).to_string())
        }
        OutputFormat::Csv => {
            let owned: Vec<RegistryRow> = rows.iter().map(|r| (*r).clone()).collect();
            let text = codec::render_delimited(&owned)?;
            Ok(text.strip_suffix('\n').unwrap_or(&text).to_owned())
        }
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            let objects: Vec<IndexMap<&str, &str>> = rows
                .iter()
                .map(|row| {
                    row.cells
                        .iter()
                        .map(|c| (c.label.as_str(), c.value.as_str()))
                        .collect()
                })
                .collect();
            match format {
                OutputFormat::Yaml => render_yaml(&objects),
                other => render_json(&objects, other == OutputFormat::JsonCompact),
            }
        }
        OutputFormat::Plain => Ok(rows
            .iter()
            .map(|r| r.point_name())
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn tabled_csv<R: Tabled>(rows: &[R]) -> Result<String, CliError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    let write_err = |e: csv::Error| CliError::Internal(format!("CSV output failed: {e}"));

    writer
        .write_record(R::headers().iter().map(|h| h.as_bytes()))
        .map_err(write_err)?;
    for row in rows {
        writer
            .write_record(row.fields().iter().map(|f| f.as_bytes()))
            .map_err(write_err)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CliError::Internal(format!("CSV output failed: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| CliError::Internal(format!("CSV output failed: {e}")))?;
    Ok(text.strip_suffix('\n').unwrap_or(&text).to_owned())
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let result = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    result.map_err(|e| CliError::Internal(format!("JSON output failed: {e}")))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data)
        .map(|s| s.trim_end().to_owned())
        .map_err(|e| CliError::Internal(format!("YAML output failed: {e}")))
}
