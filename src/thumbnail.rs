//! Cover thumbnail resolution for a batch of merged records.
//!
//! Lookups are memoised in a [`ThumbnailCache`] keyed by the raw ISBN value as
//! it appears on the record (absent ISBNs included), so each distinct value
//! costs at most one external call per batch. Distinct uncached values are
//! collected before any call is issued and then fanned out with a bounded
//! concurrency limit; no two in-flight calls ever share a key.

use crate::errors::LookupFailure;
use crate::models::MergedRecord;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

pub const PLACEHOLDER_THUMBNAIL: &str = "https://via.placeholder.com/100x150.png?text=No+Image";

static ISBN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}([0-9]{3})?$").expect("isbn pattern"));

/// First search hit for an ISBN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDocument {
    pub thumbnail: String,
}

#[async_trait]
pub trait BookLookup: Send + Sync {
    /// `isbn` is already normalised (digits only, 10 or 13 long).
    async fn lookup(&self, isbn: &str) -> Result<BookDocument, LookupFailure>;
}

/// Strips commas and spaces and lowercases; `None` when the result is not a
/// 10- or 13-digit ISBN.
pub fn normalize_isbn(raw: &str) -> Option<String> {
    let isbn: String = raw
        .chars()
        .filter(|c| *c != ',' && *c != ' ')
        .collect::<String>()
        .to_lowercase();
    ISBN_PATTERN.is_match(&isbn).then_some(isbn)
}

type Outcome = Result<String, LookupFailure>;

/// Per-batch memo of lookup outcomes. Owned by a single pipeline run.
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    entries: HashMap<Option<String>, Outcome>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, isbn: Option<&str>) -> Option<&Outcome> {
        self.entries.get(&isbn.map(str::to_string))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: Option<String>, outcome: Outcome) {
        self.entries.insert(key, outcome);
    }

    fn contains(&self, key: &Option<String>) -> bool {
        self.entries.contains_key(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsbnFailure {
    pub isbn: Option<String>,
    pub reason: LookupFailure,
}

#[derive(Debug, Clone)]
pub struct ResolvedBatch {
    pub records: Vec<MergedRecord>,
    /// Records that ended up with a thumbnail URL.
    pub resolved_count: usize,
    /// One entry per distinct ISBN value that failed, in first-seen order.
    pub failures: Vec<IsbnFailure>,
}

pub struct ThumbnailResolver<'a> {
    lookup: &'a dyn BookLookup,
    max_concurrent: usize,
}

impl<'a> ThumbnailResolver<'a> {
    pub fn new(lookup: &'a dyn BookLookup, max_concurrent: usize) -> Self {
        Self {
            lookup,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn resolve(
        &self,
        mut records: Vec<MergedRecord>,
        cache: &mut ThumbnailCache,
    ) -> ResolvedBatch {
        let mut seen: HashSet<Option<String>> = HashSet::new();
        let pending: Vec<Option<String>> = records
            .iter()
            .map(|r| r.isbn.clone())
            .filter(|key| !cache.contains(key) && seen.insert(key.clone()))
            .collect();

        let mut remote: Vec<(Option<String>, String)> = Vec::new();
        for key in pending {
            match key.as_deref().map(normalize_isbn) {
                None => cache.insert(key, Err(LookupFailure::MissingIsbn)),
                Some(None) => {
                    let raw = key.clone().unwrap_or_default();
                    cache.insert(key, Err(LookupFailure::InvalidFormat(raw)));
                }
                Some(Some(isbn)) => remote.push((key, isbn)),
            }
        }

        if !remote.is_empty() {
            log::info!(
                "looking up {} distinct ISBN(s) ({} at a time)",
                remote.len(),
                self.max_concurrent
            );
        }

        let outcomes: Vec<(Option<String>, Outcome)> = stream::iter(remote)
            .map(|(key, isbn)| async move {
                let outcome = self
                    .lookup
                    .lookup(&isbn)
                    .await
                    .map(|doc| thumbnail_or_placeholder(doc.thumbnail));
                (key, outcome)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        for (key, outcome) in outcomes {
            if let Err(reason) = &outcome {
                log::warn!("thumbnail lookup failed: {}", reason);
            }
            cache.insert(key, outcome);
        }

        let mut failures = Vec::new();
        let mut reported: HashSet<Option<String>> = HashSet::new();
        let mut resolved_count = 0;
        for record in records.iter_mut() {
            match cache.get(record.isbn.as_deref()) {
                Some(Ok(url)) => {
                    record.thumbnail_url = Some(url.clone());
                    resolved_count += 1;
                }
                Some(Err(reason)) => {
                    if reported.insert(record.isbn.clone()) {
                        failures.push(IsbnFailure {
                            isbn: record.isbn.clone(),
                            reason: reason.clone(),
                        });
                    }
                }
                None => {}
            }
        }

        ResolvedBatch {
            records,
            resolved_count,
            failures,
        }
    }
}

fn thumbnail_or_placeholder(thumbnail: String) -> String {
    if thumbnail.starts_with("http") {
        thumbnail
    } else {
        PLACEHOLDER_THUMBNAIL.to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Lookup double that records every ISBN it is asked for.
    pub(crate) struct StubLookup {
        pub calls: Mutex<Vec<String>>,
        responses: HashMap<String, Result<BookDocument, LookupFailure>>,
    }

    impl StubLookup {
        pub(crate) fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                responses: HashMap::new(),
            }
        }

        pub(crate) fn with(mut self, isbn: &str, response: Result<&str, LookupFailure>) -> Self {
            self.responses.insert(
                isbn.to_string(),
                response.map(|t| BookDocument {
                    thumbnail: t.to_string(),
                }),
            );
            self
        }

        pub(crate) fn call_count(&self, isbn: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == isbn).count()
        }

        pub(crate) fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl BookLookup for StubLookup {
        async fn lookup(&self, isbn: &str) -> Result<BookDocument, LookupFailure> {
            self.calls.lock().unwrap().push(isbn.to_string());
            self.responses
                .get(isbn)
                .cloned()
                .unwrap_or_else(|| Err(LookupFailure::NotFound(isbn.to_string())))
        }
    }

    fn record(reg: &str, isbn: Option<&str>) -> MergedRecord {
        MergedRecord {
            registration_number: reg.to_string(),
            title: format!("책 {}", reg),
            call_number: None,
            loan_date: None,
            isbn: isbn.map(str::to_string),
            thumbnail_url: None,
        }
    }

    #[test]
    fn isbn_normalisation() {
        assert_eq!(normalize_isbn("978-89"), None);
        assert_eq!(normalize_isbn("9788936434120").as_deref(), Some("9788936434120"));
        assert_eq!(normalize_isbn("978 8936 434120").as_deref(), Some("9788936434120"));
        assert_eq!(normalize_isbn("89,36434128").as_deref(), Some("8936434128"));
        assert_eq!(normalize_isbn("12345"), None);
        assert_eq!(normalize_isbn("893643412X"), None);
        assert_eq!(normalize_isbn("97889364341201"), None);
    }

    #[tokio::test]
    async fn shared_isbn_is_looked_up_once() {
        let stub = StubLookup::new().with("9788936434120", Ok("https://img/1.jpg"));
        let records = vec![
            record("A", Some("9788936434120")),
            record("B", Some("9788936434120")),
            record("C", Some("9788936434120")),
        ];
        let mut cache = ThumbnailCache::new();
        let batch = ThumbnailResolver::new(&stub, 4).resolve(records, &mut cache).await;

        assert_eq!(stub.call_count("9788936434120"), 1);
        assert_eq!(batch.resolved_count, 3);
        assert!(batch
            .records
            .iter()
            .all(|r| r.thumbnail_url.as_deref() == Some("https://img/1.jpg")));
        assert!(batch.failures.is_empty());
    }

    #[tokio::test]
    async fn invalid_isbn_never_reaches_the_lookup() {
        let stub = StubLookup::new();
        let mut cache = ThumbnailCache::new();
        let batch = ThumbnailResolver::new(&stub, 2)
            .resolve(vec![record("A", Some("12345"))], &mut cache)
            .await;

        assert_eq!(stub.total_calls(), 0);
        assert_eq!(batch.records[0].thumbnail_url, None);
        assert_eq!(batch.resolved_count, 0);
        assert_eq!(
            batch.failures,
            vec![IsbnFailure {
                isbn: Some("12345".to_string()),
                reason: LookupFailure::InvalidFormat("12345".to_string()),
            }]
        );
        assert!(batch.failures[0].reason.to_string().contains("12345"));
    }

    #[tokio::test]
    async fn missing_isbn_is_cached_without_a_call() {
        let stub = StubLookup::new();
        let mut cache = ThumbnailCache::new();
        let batch = ThumbnailResolver::new(&stub, 2)
            .resolve(vec![record("A", None), record("B", None)], &mut cache)
            .await;

        assert_eq!(stub.total_calls(), 0);
        assert!(!cache.is_empty());
        assert_eq!(cache.get(None), Some(&Err(LookupFailure::MissingIsbn)));
        assert_eq!(batch.failures.len(), 1);
        assert!(batch.records.iter().all(|r| r.thumbnail_url.is_none()));
    }

    #[tokio::test]
    async fn empty_or_relative_thumbnails_become_placeholder() {
        let stub = StubLookup::new()
            .with("9788936434120", Ok(""))
            .with("8936434128", Ok("//cdn/no-scheme.jpg"));
        let mut cache = ThumbnailCache::new();
        let batch = ThumbnailResolver::new(&stub, 2)
            .resolve(
                vec![record("A", Some("9788936434120")), record("B", Some("8936434128"))],
                &mut cache,
            )
            .await;

        assert_eq!(batch.resolved_count, 2);
        assert!(batch
            .records
            .iter()
            .all(|r| r.thumbnail_url.as_deref() == Some(PLACEHOLDER_THUMBNAIL)));
    }

    #[tokio::test]
    async fn failures_do_not_abort_the_batch() {
        let stub = StubLookup::new()
            .with("9788936434120", Ok("https://img/ok.jpg"))
            .with(
                "9788983711892",
                Err(LookupFailure::Status {
                    isbn: "9788983711892".to_string(),
                    status: 500,
                }),
            );
        let records = vec![
            record("A", Some("9788983711892")),
            record("B", Some("9788936434120")),
            record("C", Some("9791190090018")),
            record("D", Some("9788983711892")),
        ];
        let mut cache = ThumbnailCache::new();
        let batch = ThumbnailResolver::new(&stub, 3).resolve(records, &mut cache).await;

        assert_eq!(stub.total_calls(), 3);
        assert_eq!(batch.resolved_count, 1);
        assert_eq!(batch.records[1].thumbnail_url.as_deref(), Some("https://img/ok.jpg"));
        let failed: Vec<_> = batch.failures.iter().map(|f| f.isbn.as_deref()).collect();
        assert_eq!(failed, vec![Some("9788983711892"), Some("9791190090018")]);
        assert!(matches!(batch.failures[1].reason, LookupFailure::NotFound(_)));
    }

    #[tokio::test]
    async fn cache_is_keyed_by_raw_value() {
        let stub = StubLookup::new().with("9788936434120", Ok("https://img/1.jpg"));
        let records = vec![
            record("A", Some("9788936434120")),
            record("B", Some("978 8936434120")),
        ];
        let mut cache = ThumbnailCache::new();
        let batch = ThumbnailResolver::new(&stub, 1).resolve(records, &mut cache).await;

        assert_eq!(stub.call_count("9788936434120"), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(batch.resolved_count, 2);
    }

    #[tokio::test]
    async fn warm_cache_skips_repeat_lookups() {
        let stub = StubLookup::new().with("9788936434120", Ok("https://img/1.jpg"));
        let mut cache = ThumbnailCache::new();
        let resolver = ThumbnailResolver::new(&stub, 2);
        resolver
            .resolve(vec![record("A", Some("9788936434120"))], &mut cache)
            .await;
        let second = resolver
            .resolve(vec![record("B", Some("9788936434120"))], &mut cache)
            .await;

        assert_eq!(stub.total_calls(), 1);
        assert_eq!(second.resolved_count, 1);
    }
}
