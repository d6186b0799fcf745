use crate::errors::LookupFailure;
use crate::models::KakaoConfig;
use crate::thumbnail::{BookDocument, BookLookup};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    documents: Vec<SearchDocument>,
}

#[derive(Debug, Deserialize)]
struct SearchDocument {
    #[serde(default)]
    thumbnail: String,
}

/// Kakao book search, queried by ISBN.
pub struct KakaoBookSearch {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl KakaoBookSearch {
    pub fn new(config: &KakaoConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[async_trait]
impl BookLookup for KakaoBookSearch {
    async fn lookup(&self, isbn: &str) -> Result<BookDocument, LookupFailure> {
        log::debug!("searching Kakao for ISBN {}", isbn);

        let response = self
            .client
            .get(&self.api_url)
            .header(AUTHORIZATION, format!("KakaoAK {}", self.api_key))
            .query(&[("target", "isbn"), ("query", isbn), ("size", "1")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| LookupFailure::Transport {
                isbn: isbn.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(LookupFailure::Status {
                isbn: isbn.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| LookupFailure::Malformed {
            isbn: isbn.to_string(),
            message: e.to_string(),
        })?;

        let document = body
            .documents
            .into_iter()
            .next()
            .ok_or_else(|| LookupFailure::NotFound(isbn.to_string()))?;

        Ok(BookDocument {
            thumbnail: decode_thumbnail(&document.thumbnail),
        })
    }
}

/// Thumbnail URLs come back percent-encoded; undecodable input is kept as is.
fn decode_thumbnail(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
