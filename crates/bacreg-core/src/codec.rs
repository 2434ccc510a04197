// ── CSV import / export ──
//
// Import tolerates rows of the wrong width (they become warnings) but
// rejects the whole file on any structural problem. Export renders the same
// row order as delimited text or as a header + body table.

use serde::Serialize;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::model::{ColumnTemplate, RegistryRow};
use crate::registry::RegistryHandoff;

pub const INVALID_CSV_MESSAGE: &str = "The file wasn't in a valid CSV format.";

#[derive(Debug, Error)]
pub enum CsvError {
    /// Unbalanced quoting or text after a closing quote.
    #[error("The file wasn't in a valid CSV format.")]
    Malformed { line: u64 },

    #[error("The file has no header row.")]
    Empty,

    #[error("The column \"{label}\" appears more than once in the header.")]
    DuplicateColumn { label: String },

    #[error("The file wasn't in a valid CSV format.")]
    Csv(#[from] csv::Error),

    #[error("Could not write CSV: {0}")]
    Write(String),
}

/// A successfully parsed file: the header schema, the accepted rows and the
/// shape warnings for rows that were left out.
#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub columns: Vec<ColumnTemplate>,
    pub rows: Vec<RegistryRow>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RenderMode {
    Delimited,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub header: Vec<String>,
    pub body: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Delimited(String),
    Table(TableView),
}

// ── Parse ────────────────────────────────────────────────────────────

pub fn parse(text: &str) -> Result<ParsedCsv, CsvError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    check_quoting(text)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let records = reader
        .records()
        .collect::<Result<Vec<csv::StringRecord>, csv::Error>>()?;

    let mut records = records.into_iter().skip_while(is_blank).peekable();
    let Some(header) = records.next() else {
        return Err(CsvError::Empty);
    };
    let header_line = header.position().map_or(1, csv::Position::line);

    let columns: Vec<ColumnTemplate> = header.iter().map(ColumnTemplate::from_label).collect();
    for (i, column) in columns.iter().enumerate() {
        if columns[..i].iter().any(|c| c.key == column.key) {
            return Err(CsvError::DuplicateColumn {
                label: column.label.clone(),
            });
        }
    }

    let mut parsed = ParsedCsv {
        columns,
        ..ParsedCsv::default()
    };

    let width = parsed.columns.len();
    let mut ordinal = 0;
    while let Some(record) = records.next() {
        let last = records.peek().is_none();
        if record.len() == width {
            parsed
                .rows
                .push(RegistryRow::from_template(&parsed.columns, record.iter()));
        } else if last && is_blank(&record) {
            tracing::trace!("ignoring trailing empty line");
        } else {
            let row_number = record
                .position()
                .map_or_else(
                    || u64::try_from(ordinal).unwrap_or_default(),
                    |p| p.line().saturating_sub(header_line + 1),
                );
            parsed.warnings.push(format!(
                "Row {row_number} was omitted for having the wrong number of columns."
            ));
        }
        ordinal += 1;
    }

    tracing::debug!(
        columns = parsed.columns.len(),
        rows = parsed.rows.len(),
        warnings = parsed.warnings.len(),
        "parsed registry CSV"
    );
    Ok(parsed)
}

/// A line with no content, or a lone empty field such as `""`.
fn is_blank(record: &csv::StringRecord) -> bool {
    record.is_empty() || (record.len() == 1 && record.get(0).is_some_and(str::is_empty))
}

/// Reject quoting the tokenizer would silently repair.
fn check_quoting(text: &str) -> Result<(), CsvError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum State {
        FieldStart,
        Unquoted,
        Quoted,
        QuoteInQuoted,
    }

    let mut state = State::FieldStart;
    let mut line: u64 = 1;
    let mut opened_at = line;

    for ch in text.chars() {
        state = match (state, ch) {
            (State::FieldStart, '"') => {
                opened_at = line;
                State::Quoted
            }
            (State::Quoted, '"') => State::QuoteInQuoted,
            (State::Quoted, _) | (State::QuoteInQuoted, '"') => State::Quoted,
            (_, ',' | '\n' | '\r') => State::FieldStart,
            (State::FieldStart | State::Unquoted, _) => State::Unquoted,
            (State::QuoteInQuoted, _) => return Err(CsvError::Malformed { line }),
        };
        if ch == '\n' {
            line += 1;
        }
    }

    if state == State::Quoted {
        return Err(CsvError::Malformed { line: opened_at });
    }
    Ok(())
}

// ── Render ───────────────────────────────────────────────────────────

pub fn render(rows: &[RegistryRow], mode: RenderMode) -> Result<Rendered, CsvError> {
    Ok(match mode {
        RenderMode::Delimited => Rendered::Delimited(render_delimited(rows)?),
        RenderMode::Table => Rendered::Table(render_table(rows)),
    })
}

/// Header line from the first row's labels, then one line per row.
pub fn render_delimited(rows: &[RegistryRow]) -> Result<String, CsvError> {
    let Some(first) = rows.first() else {
        return Ok(String::new());
    };

    let mut writer = delimited_writer();
    writer.write_record(first.cells.iter().map(|c| c.label.as_str()))?;
    for row in rows {
        writer.write_record(row.values())?;
    }
    finish(writer)
}

/// The saved form of a registry: column labels, then each row's values.
pub fn render_handoff(handoff: &RegistryHandoff) -> Result<String, CsvError> {
    let mut writer = delimited_writer();
    writer.write_record(handoff.columns.iter().map(|c| c.label.as_str()))?;
    for row in &handoff.rows {
        writer.write_record(row)?;
    }
    finish(writer)
}

fn delimited_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, CsvError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| CsvError::Write(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CsvError::Write(e.to_string()))
}

pub fn render_table(rows: &[RegistryRow]) -> TableView {
    TableView {
        header: rows
            .first()
            .map(|r| r.cells.iter().map(|c| c.label.clone()).collect())
            .unwrap_or_default(),
        body: rows
            .iter()
            .map(|r| r.values().map(str::to_owned).collect())
            .collect(),
    }
}
