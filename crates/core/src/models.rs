use crate::backend::BackendId;
use crate::error::SearchError;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_REQUEST_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Html,
    Pdf,
}

impl ContentFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "html" => Some(Self::Html),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Maps an HTTP `content-type` header onto a converter pipeline.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("application/pdf") {
            Some(Self::Pdf)
        } else if mime.contains("text/html") || mime.contains("application/xhtml") {
            Some(Self::Html)
        } else {
            None
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

impl DateRange {
    /// Parses RFC 3339 bounds; either side may be absent.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, SearchError> {
        Ok(Self {
            start: start.map(parse_bound).transpose()?,
            end: end.map(parse_bound).transpose()?,
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

fn parse_bound(value: &str) -> Result<DateTime<FixedOffset>, SearchError> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|error| {
        SearchError::InvalidRange(format!("{value:?} is not an ISO-8601 timestamp with offset: {error}"))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub phrase: String,
    /// Empty means every default backend.
    #[serde(default)]
    pub backends: Vec<BackendId>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub date_range: DateRange,
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub sort: Option<SortOrder>,
}

impl SearchRequest {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            backends: Vec::new(),
            unit: None,
            date_range: DateRange::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: None,
        }
    }

    pub fn with_backends(mut self, backends: impl IntoIterator<Item = BackendId>) -> Self {
        self.backends = backends.into_iter().collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactResult {
    pub id: String,
    pub title: String,
    pub court_or_unit: String,
    pub date: Option<NaiveDate>,
    pub summary: String,
    pub backend: BackendId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFailure {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub results: Vec<CompactResult>,
    pub backend_errors: BTreeMap<BackendId, BackendFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub decision_number: Option<String>,
    pub case_number: Option<String>,
    pub decision_date: Option<String>,
    pub subject: Option<String>,
}

impl DocumentMetadata {
    /// Keeps every field already set and fills the rest from `other`.
    pub fn or(self, other: DocumentMetadata) -> DocumentMetadata {
        DocumentMetadata {
            decision_number: self.decision_number.or(other.decision_number),
            case_number: self.case_number.or(other.case_number),
            decision_date: self.decision_date.or(other.decision_date),
            subject: self.subject.or(other.subject),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.decision_number.is_none()
            && self.case_number.is_none()
            && self.decision_date.is_none()
            && self.subject.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct RawDocument {
    pub backend: BackendId,
    pub format: ContentFormat,
    pub bytes: Vec<u8>,
    pub metadata: DocumentMetadata,
    /// Set when only this page of a paged PDF should be extracted.
    pub source_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertedDocument {
    pub backend: BackendId,
    pub format: ContentFormat,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub total_chars: usize,
    pub source_page: Option<u32>,
    pub source_page_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginatedPage {
    pub page_number: u32,
    pub total_pages: u32,
    pub is_paginated: bool,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub total_chars: usize,
    pub backend: BackendId,
    pub source_page: Option<u32>,
    pub source_page_count: Option<u32>,
    /// Id of the next source page for backends that deliver PDFs page by page.
    pub next_source_page_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_ended_ranges_parse() {
        let range = DateRange::parse(Some("2023-01-01T00:00:00+03:00"), None)
            .expect("start bound should parse");
        assert!(range.start.is_some());
        assert!(range.end.is_none());
        assert!(DateRange::default().is_unbounded());
    }

    #[test]
    fn offsetless_timestamps_are_rejected() {
        let error = DateRange::parse(Some("2023-01-01"), None).expect_err("offset is required");
        assert!(matches!(error, SearchError::InvalidRange(_)));
    }

    #[test]
    fn metadata_or_prefers_existing_fields() {
        let backend = DocumentMetadata {
            decision_number: Some("2021/5".to_string()),
            ..Default::default()
        };
        let extracted = DocumentMetadata {
            decision_number: Some("1999/1".to_string()),
            decision_date: Some("2021-03-04".to_string()),
            ..Default::default()
        };

        let merged = backend.or(extracted);
        assert_eq!(merged.decision_number.as_deref(), Some("2021/5"));
        assert_eq!(merged.decision_date.as_deref(), Some("2021-03-04"));
    }

    #[test]
    fn mime_types_select_pipelines() {
        assert_eq!(ContentFormat::from_mime("application/pdf"), Some(ContentFormat::Pdf));
        assert_eq!(
            ContentFormat::from_mime("text/html; charset=utf-8"),
            Some(ContentFormat::Html)
        );
        assert_eq!(ContentFormat::from_mime("image/png"), None);
    }
}
