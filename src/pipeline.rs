//! One batch: loan history + mapping in, assembled report out.

use crate::classifier::classify;
use crate::errors::IngestError;
use crate::mapping::{load_mapping, merge};
use crate::parser::LoanHistoryParser;
use crate::percentile::ReferenceDistribution;
use crate::report::{assemble, Report};
use crate::sheet::RawSheet;
use crate::thumbnail::{BookLookup, ThumbnailCache, ThumbnailResolver};

pub struct BatchOptions {
    pub max_concurrent_lookups: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: 4,
        }
    }
}

pub async fn run_batch(
    loan_sheet: &RawSheet,
    mapping_sheet: &RawSheet,
    lookup: &dyn BookLookup,
    options: &BatchOptions,
) -> Result<Report, IngestError> {
    let history = LoanHistoryParser::new().parse(loan_sheet)?;
    let mapping = load_mapping(mapping_sheet)?;

    let merged = merge(&history.loans, &mapping);
    let categories = classify(&merged);

    let total_loans = history.loans.len();
    let percentile = history.student.grade.map(|grade| {
        ReferenceDistribution::standard().percentile(total_loans as u32, grade)
    });

    let mut cache = ThumbnailCache::new();
    let resolved = ThumbnailResolver::new(lookup, options.max_concurrent_lookups)
        .resolve(merged, &mut cache)
        .await;

    log::info!(
        "batch complete: {} loans, {} records with thumbnails, {} lookup failures",
        total_loans,
        resolved.resolved_count,
        resolved.failures.len()
    );

    Ok(assemble(
        history.student,
        total_loans,
        percentile,
        categories,
        resolved,
    ))
}
