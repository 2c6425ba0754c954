use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context};
use calamine::{Data, Range, Reader, Xls, Xlsx};
use serde::Serialize;

use crate::assign::SeatUpdate;

/// A source row that was not handed to bulk reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub line: usize,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedSeatTable {
    pub updates: Vec<SeatUpdate>,
    /// Source line of each entry in `updates`.
    pub update_lines: Vec<usize>,
    pub skipped: Vec<SkippedRow>,
    pub header_skipped: bool,
    /// Non-empty data rows seen, header excluded.
    pub total_rows: usize,
}

fn parse_record(line: &str, delim: char) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == delim && !in_quotes {
            out.push(buf);
            buf = String::new();
            i += 1;
            continue;
        }
        buf.push(ch);
        i += 1;
    }
    out.push(buf);
    out
}

fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_numeric(s: &str) -> bool {
    s.trim().parse::<f64>().is_ok_and(f64::is_finite)
}

/// 1-based coordinate; accepts `3` and `3.0`.
fn parse_coord(s: &str) -> Option<i64> {
    let t = s.trim();
    if let Ok(v) = t.parse::<i64>() {
        return Some(v);
    }
    let f = t.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parses `(row, col, rollNo, name?)` rows with 1-based coordinates into
/// 0-based seat updates. The first row is dropped as a header only when its
/// first cell is not numeric.
pub fn parse_seat_table(text: &str) -> ParsedSeatTable {
    let text = text.trim_start_matches('\u{feff}');

    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();
    let Some(&(_, first)) = lines.first() else {
        return ParsedSeatTable::default();
    };
    let delim = if first.contains('\t') { '\t' } else { ',' };

    let records = lines
        .into_iter()
        .map(|(line_no, raw)| (line_no, parse_record(raw, delim)))
        .collect();
    parse_records(records)
}

/// Shared row rules for text and workbook sources. `records` holds the
/// non-blank rows with their 1-based source line.
fn parse_records(records: Vec<(usize, Vec<String>)>) -> ParsedSeatTable {
    let mut parsed = ParsedSeatTable::default();

    for (pos, (line_no, fields)) in records.into_iter().enumerate() {
        let cell = |i: usize| fields.get(i).map(String::as_str).unwrap_or("");

        if pos == 0 && !is_numeric(cell(0)) {
            parsed.header_skipped = true;
            continue;
        }
        parsed.total_rows += 1;

        let (Some(row), Some(col)) = (parse_coord(cell(0)), parse_coord(cell(1))) else {
            parsed.skipped.push(SkippedRow {
                line: line_no,
                code: "bad_coordinates",
                message: format!(
                    "row/col must be integers, got `{}`/`{}`",
                    cell(0).trim(),
                    cell(1).trim()
                ),
            });
            continue;
        };
        if row < 1 || col < 1 {
            parsed.skipped.push(SkippedRow {
                line: line_no,
                code: "bad_coordinates",
                message: format!("row/col are 1-based, got {}/{}", row, col),
            });
            continue;
        }

        let roll_no = normalize_text(cell(2));
        if roll_no.is_empty() {
            parsed.skipped.push(SkippedRow {
                line: line_no,
                code: "missing_roll",
                message: "roll number is empty".to_string(),
            });
            continue;
        }
        let name = Some(normalize_text(cell(3))).filter(|n| !n.is_empty());

        parsed.updates.push(SeatUpdate {
            row: row - 1,
            col: col - 1,
            roll_no,
            name,
        });
        parsed.update_lines.push(line_no);
    }

    parsed
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkbookKind {
    Xlsx,
    Xls,
}

fn workbook_kind(path: &Path, bytes: &[u8]) -> Option<WorkbookKind> {
    if bytes.starts_with(ZIP_MAGIC) {
        return Some(WorkbookKind::Xlsx);
    }
    if bytes.starts_with(OLE_MAGIC) {
        return Some(WorkbookKind::Xls);
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("xlsx") | Some("xlsm") => Some(WorkbookKind::Xlsx),
        Some("xls") => Some(WorkbookKind::Xls),
        _ => None,
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn sheet_records(range: &Range<Data>) -> Vec<(usize, Vec<String>)> {
    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut records = Vec::new();
    for (i, row) in range.rows().enumerate() {
        let mut fields = vec![String::new(); start_col];
        fields.extend(row.iter().map(cell_text));
        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        records.push((start_row + i + 1, fields));
    }
    records
}

/// Reads the first sheet of an `.xlsx` or `.xls` workbook. Line numbers are
/// the sheet's 1-based row numbers.
fn parse_workbook(kind: WorkbookKind, bytes: Vec<u8>) -> anyhow::Result<ParsedSeatTable> {
    let cursor = Cursor::new(bytes);
    let range = match kind {
        WorkbookKind::Xlsx => {
            let mut wb: Xlsx<_> = Xlsx::new(cursor).context("invalid xlsx workbook")?;
            wb.worksheet_range_at(0)
                .ok_or_else(|| anyhow!("workbook has no sheets"))?
                .context("read first sheet")?
        }
        WorkbookKind::Xls => {
            let mut wb: Xls<_> = Xls::new(cursor).context("invalid xls workbook")?;
            wb.worksheet_range_at(0)
                .ok_or_else(|| anyhow!("workbook has no sheets"))?
                .context("read first sheet")?
        }
    };
    Ok(parse_records(sheet_records(&range)))
}

/// Reads a seat table from disk. Workbooks are detected by content or
/// extension; anything else is read as CSV/TSV text.
pub fn read_seat_table(path: &Path) -> anyhow::Result<ParsedSeatTable> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    if let Some(kind) = workbook_kind(path, &bytes) {
        return parse_workbook(kind, bytes).with_context(|| format!("import {}", path.display()));
    }
    let text = String::from_utf8_lossy(&bytes);
    Ok(parse_seat_table(&text))
}
