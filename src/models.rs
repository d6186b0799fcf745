use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://dapi.kakao.com/v3/search/book";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub loan_history_path: String,
    pub mapping_path: String,
    pub output_directory: Option<String>,
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,
    pub kakao: KakaoConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KakaoConfig {
    pub api_key: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub school_name: String,
}

fn default_max_concurrent_lookups() -> usize {
    4
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            school_name: "덕이고".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loan_history_path: "data-source/loans.xlsx".to_string(),
            mapping_path: "data-source/mapping.xlsx".to_string(),
            output_directory: Some("output".to_string()),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            kakao: KakaoConfig {
                api_key: "".to_string(),
                api_url: default_api_url(),
                request_timeout_secs: default_request_timeout_secs(),
            },
            report: ReportConfig::default(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// Identity of the student the loan history belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    pub grade: Option<u32>,
    pub class_info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub registration_number: String,
    pub title: String,
    pub call_number: Option<String>,
    pub loan_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub registration_number: String,
    pub isbn: String,
}

/// A loan row after the join, carrying the enrichment fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub registration_number: String,
    pub title: String,
    pub call_number: Option<String>,
    pub loan_date: Option<NaiveDate>,
    pub isbn: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl MergedRecord {
    pub fn from_loan(loan: &LoanRecord, isbn: Option<String>) -> Self {
        Self {
            registration_number: loan.registration_number.clone(),
            title: loan.title.clone(),
            call_number: loan.call_number.clone(),
            loan_date: loan.loan_date,
            isbn,
            thumbnail_url: None,
        }
    }

    /// Loan date as printed on the report, e.g. `2024.03.15`.
    pub fn formatted_loan_date(&self) -> Option<String> {
        self.loan_date.map(|d| d.format("%Y.%m.%d").to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
}
