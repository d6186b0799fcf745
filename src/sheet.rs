//! Workbook access: loads the first worksheet of a spreadsheet into a grid of
//! typed cells addressed from A1, whatever the sheet's used range is.

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Days, NaiveDate, NaiveDateTime};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Spreadsheet date stored as an Excel serial day number.
    DateTime(f64),
}

const TEXT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d"];
const TEXT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

// Largest serial Excel can represent (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;
// Plain numeric cells below 1990-01-01 are stray numbers, not dates.
const MIN_NUMERIC_DATE_SERIAL: f64 = 32_874.0;

impl Cell {
    #[cfg(test)]
    pub fn text(s: &str) -> Self {
        Cell::Text(s.to_string())
    }

    /// Trimmed textual form. Integral numbers drop the fractional part so that
    /// `12345.0` read from a numeric column joins against `"12345"`.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    format!("{}", *f as i64)
                } else {
                    f.to_string()
                }
            }
            Cell::Bool(b) => b.to_string(),
            Cell::DateTime(serial) => excel_serial_to_date(*serial)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.as_text().is_empty()
    }

    /// Best-effort date interpretation; anything unrecognised is `None`.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::DateTime(serial) => excel_serial_to_date(*serial),
            Cell::Number(serial) if *serial >= MIN_NUMERIC_DATE_SERIAL => excel_serial_to_date(*serial),
            Cell::Number(_) => None,
            Cell::Text(s) => parse_text_date(s),
            Cell::Empty | Cell::Bool(_) => None,
        }
    }
}

impl From<&Data> for Cell {
    fn from(d: &Data) -> Self {
        match d {
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
            Data::DateTimeIso(s) => Cell::Text(s.clone()),
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Empty | Data::Error(_) => Cell::Empty,
        }
    }
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    // 1899-12-30 absorbs the Lotus 1900 leap-year bug for serials after Feb 1900.
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

fn parse_text_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_end_matches('.');
    if s.is_empty() {
        return None;
    }
    TEXT_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            TEXT_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Header-less grid, `rows[r][c]` being the cell at row `r`, column `c` (0-based).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    rows: Vec<Vec<Cell>>,
}

static EMPTY: Cell = Cell::Empty;

impl RawSheet {
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at an absolute position; out-of-range positions read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(|r| r.as_slice())
    }
}

/// Reads the first worksheet of the workbook at `path`.
pub fn read_first_sheet<P: AsRef<Path>>(path: P) -> Result<RawSheet> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .with_context(|| format!("Workbook has no sheets: {}", path.display()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet '{}' in {}", sheet_name, path.display()))?;

    // calamine ranges start at the first used cell, not at A1.
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row as usize];
    for r in range.rows() {
        let mut row_vec = vec![Cell::Empty; start_col as usize];
        row_vec.extend(r.iter().map(Cell::from));
        rows.push(row_vec);
    }

    log::debug!(
        "read {} rows from sheet '{}' of {}",
        rows.len(),
        sheet_name,
        path.display()
    );
    Ok(RawSheet::from_rows(rows))
}
