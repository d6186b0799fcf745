use crate::errors::IngestError;
use crate::models::{LoanRecord, MappingEntry, MergedRecord};
use crate::sheet::RawSheet;
use std::collections::HashMap;

pub const REGISTRATION_COLUMN: &str = "등록번호";
pub const REGISTRATION_COLUMN_ALT: &str = "등록 번호";
pub const ISBN_COLUMN: &str = "ISBN";

/// Loads registration-number → ISBN pairs from a sheet whose first row is a header.
pub fn load_mapping(sheet: &RawSheet) -> Result<Vec<MappingEntry>, IngestError> {
    let header: Vec<String> = sheet
        .rows()
        .next()
        .map(|row| row.iter().map(|c| c.as_text()).collect())
        .unwrap_or_default();

    let registration_idx = header
        .iter()
        .position(|h| h == REGISTRATION_COLUMN)
        .or_else(|| header.iter().position(|h| h == REGISTRATION_COLUMN_ALT));
    let isbn_idx = header.iter().position(|h| h == ISBN_COLUMN);

    let (registration_idx, isbn_idx) = match (registration_idx, isbn_idx) {
        (Some(r), Some(i)) => (r, i),
        (r, i) => {
            let mut missing = Vec::new();
            if r.is_none() {
                missing.push(REGISTRATION_COLUMN.to_string());
            }
            if i.is_none() {
                missing.push(ISBN_COLUMN.to_string());
            }
            return Err(IngestError::Schema { missing });
        }
    };

    let mut entries = Vec::new();
    for row in 1..sheet.row_count() {
        let registration_cell = sheet.cell(row, registration_idx);
        if registration_cell.is_blank() {
            continue;
        }
        entries.push(MappingEntry {
            registration_number: registration_cell.as_text(),
            isbn: sheet.cell(row, isbn_idx).as_text(),
        });
    }

    log::info!("loaded {} registration-number/ISBN pairs", entries.len());
    Ok(entries)
}

/// Left join of loans onto the mapping. A loan with several matching entries
/// is emitted once per match, in mapping order.
pub fn merge(loans: &[LoanRecord], mapping: &[MappingEntry]) -> Vec<MergedRecord> {
    let mut by_registration: HashMap<&str, Vec<&MappingEntry>> = HashMap::new();
    for entry in mapping {
        by_registration
            .entry(entry.registration_number.as_str())
            .or_default()
            .push(entry);
    }

    let duplicated_keys = by_registration.values().filter(|v| v.len() > 1).count();
    if duplicated_keys > 0 {
        log::warn!(
            "{} registration number(s) appear more than once in the mapping; matching loans will repeat",
            duplicated_keys
        );
    }

    let mut merged = Vec::with_capacity(loans.len());
    let mut unmatched = 0usize;
    for loan in loans {
        match by_registration.get(loan.registration_number.as_str()) {
            Some(entries) => {
                for entry in entries {
                    let isbn = (!entry.isbn.is_empty()).then(|| entry.isbn.clone());
                    merged.push(MergedRecord::from_loan(loan, isbn));
                }
            }
            None => {
                unmatched += 1;
                merged.push(MergedRecord::from_loan(loan, None));
            }
        }
    }

    if unmatched > 0 {
        log::warn!("{} loan(s) have no ISBN mapping", unmatched);
    }
    merged
}
