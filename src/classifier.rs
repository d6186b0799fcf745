use crate::models::{CategoryCount, MergedRecord};
use regex::Regex;
use std::sync::LazyLock;

pub const NO_CLASSIFICATION: &str = "분류 정보 없음";

/// KDC main classes, indexed by the leading digit of the call number.
pub const KDC_CATEGORIES: [&str; 10] = [
    "총류",
    "철학",
    "종교",
    "사회과학",
    "자연과학",
    "기술과학",
    "예술",
    "언어",
    "문학",
    "역사",
];

static LEADING_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9])").expect("leading digit pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub most_read: String,
    /// Sorted by count descending, ties in first-encountered order.
    pub counts: Vec<CategoryCount>,
}

pub fn kdc_digit(call_number: &str) -> Option<u8> {
    LEADING_DIGIT
        .captures(call_number)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().bytes().next())
        .map(|b| b - b'0')
}

pub fn kdc_category(call_number: &str) -> Option<&'static str> {
    kdc_digit(call_number).map(|d| KDC_CATEGORIES[d as usize])
}

pub fn classify(records: &[MergedRecord]) -> CategoryStats {
    let mut counts: Vec<CategoryCount> = Vec::new();

    for label in records
        .iter()
        .filter_map(|r| r.call_number.as_deref())
        .filter_map(kdc_category)
    {
        match counts.iter_mut().find(|c| c.label == label) {
            Some(existing) => existing.count += 1,
            None => counts.push(CategoryCount {
                label: label.to_string(),
                count: 1,
            }),
        }
    }

    // Stable sort keeps first-encountered order among equal counts.
    counts.sort_by(|a, b| b.count.cmp(&a.count));

    let most_read = counts
        .first()
        .map(|c| c.label.clone())
        .unwrap_or_else(|| NO_CLASSIFICATION.to_string());

    log::debug!("classified {} categories, most read: {}", counts.len(), most_read);
    CategoryStats { most_read, counts }
}
