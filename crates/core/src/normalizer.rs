use crate::backend::BackendId;
use crate::error::SearchError;
use crate::models::{DateRange, SearchRequest, SortOrder, MAX_REQUEST_PAGE_SIZE};
use crate::units::is_unrestricted;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "text", rename_all = "snake_case")]
pub enum Phrase {
    Exact(String),
    Free(String),
    Any,
}

impl Phrase {
    /// Text as most portals expect it in a single keyword field.
    pub fn as_query_text(&self) -> String {
        match self {
            Self::Exact(text) => format!("\"{text}\""),
            Self::Free(text) => text.clone(),
            Self::Any => String::new(),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Splits the phrase into boolean keyword groups for portals that take
    /// terms as separate lists.
    ///
    /// `-word` and `NOT word` exclude, `+word` and `AND` require, and words
    /// on either side of `OR` form an alternative group.
    pub fn terms(&self) -> Terms {
        let text = match self {
            Self::Any => return Terms::default(),
            Self::Exact(text) => {
                return Terms {
                    required: vec![text.clone()],
                    ..Terms::default()
                }
            }
            Self::Free(text) => text,
        };

        let mut words: Vec<(String, bool, bool)> = Vec::new();
        let mut negate_next = false;
        let mut link_next = false;
        for token in text.split_whitespace() {
            match token {
                "AND" => continue,
                "NOT" => {
                    negate_next = true;
                    continue;
                }
                "OR" => {
                    link_next = !words.is_empty();
                    continue;
                }
                _ => {}
            }

            let (word, negated) = match token.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (token.trim_start_matches('+'), negate_next),
            };
            let word = word.trim_matches('"');
            negate_next = false;
            if word.is_empty() {
                link_next = false;
                continue;
            }

            if link_next {
                if let Some(previous) = words.last_mut() {
                    previous.2 = true;
                }
            }
            words.push((word.to_string(), negated, link_next));
            link_next = false;
        }

        let mut terms = Terms::default();
        for (word, negated, either) in words {
            match (negated, either) {
                (false, false) => terms.required.push(word),
                (false, true) => terms.either.push(word),
                (true, false) => terms.excluded.push(word),
                (true, true) => terms.excluded_either.push(word),
            }
        }
        terms
    }
}

/// Keyword groups of a free-text phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Terms {
    pub required: Vec<String>,
    /// At least one must match.
    pub either: Vec<String>,
    pub excluded: Vec<String>,
    /// Excluded when any of them matches.
    pub excluded_either: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendQuery {
    pub backend: BackendId,
    pub phrase: Phrase,
    /// Unit value in the backend's own vocabulary.
    pub unit: Option<String>,
    pub date_range: Option<DateRange>,
    pub page: u32,
    pub page_size: u32,
    pub sort: Option<SortOrder>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedPhrase {
    text: String,
    quoted: bool,
}

fn parse_phrase(raw: &str) -> ParsedPhrase {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|inner| !inner.contains('"'));

    match inner {
        Some(inner) => ParsedPhrase {
            text: inner.trim().to_string(),
            quoted: true,
        },
        None => ParsedPhrase {
            text: trimmed.to_string(),
            quoted: false,
        },
    }
}

/// Validates a request and expands it into one query per target backend.
///
/// Nothing here touches the network. Targets come from the request, or from
/// `defaults` when the request names none; with defaults, a unit filter narrows
/// the targets to backends that know the unit instead of failing.
pub fn plan(request: &SearchRequest, defaults: &[BackendId]) -> Result<Vec<BackendQuery>, SearchError> {
    if request.page < 1 {
        return Err(SearchError::InvalidPage(format!(
            "page number must be at least 1, got {}",
            request.page
        )));
    }
    if request.page_size < 1 || request.page_size > MAX_REQUEST_PAGE_SIZE {
        return Err(SearchError::InvalidPage(format!(
            "page size must be within 1..={MAX_REQUEST_PAGE_SIZE}, got {}",
            request.page_size
        )));
    }
    if let (Some(start), Some(end)) = (request.date_range.start, request.date_range.end) {
        if start > end {
            return Err(SearchError::InvalidRange(format!(
                "start {start} is after end {end}"
            )));
        }
    }

    let explicit = !request.backends.is_empty();
    let mut targets: Vec<BackendId> = Vec::new();
    let candidates = if explicit { &request.backends[..] } else { defaults };
    for backend in candidates {
        if !targets.contains(backend) {
            targets.push(*backend);
        }
    }

    let unit = request
        .unit
        .as_deref()
        .filter(|unit| !is_unrestricted(Some(*unit)));

    if let Some(unit) = unit {
        if explicit {
            if let Some(backend) = targets
                .iter()
                .find(|backend| !backend.capabilities().units.accepts(unit))
            {
                return Err(SearchError::InvalidFilter {
                    backend: *backend,
                    value: unit.to_string(),
                });
            }
        } else {
            let all = targets.clone();
            targets.retain(|backend| backend.capabilities().units.accepts(unit));
            if targets.is_empty() {
                return Err(SearchError::InvalidFilter {
                    backend: all.first().copied().ok_or(SearchError::NoBackends)?,
                    value: unit.to_string(),
                });
            }
        }
    }

    if targets.is_empty() {
        return Err(SearchError::NoBackends);
    }

    let phrase = parse_phrase(&request.phrase);
    Ok(targets
        .into_iter()
        .map(|backend| normalize_for(backend, request, &phrase, unit))
        .collect())
}

fn normalize_for(
    backend: BackendId,
    request: &SearchRequest,
    phrase: &ParsedPhrase,
    unit: Option<&str>,
) -> BackendQuery {
    let capabilities = backend.capabilities();

    let phrase = if phrase.text.is_empty() {
        Phrase::Any
    } else if phrase.quoted && capabilities.exact_phrase {
        Phrase::Exact(phrase.text.clone())
    } else {
        if phrase.quoted {
            debug!(backend = %backend, "exact phrase degraded to free text");
        }
        Phrase::Free(phrase.text.clone())
    };

    let date_range = if request.date_range.is_unbounded() {
        None
    } else if capabilities.date_filter {
        Some(request.date_range.clone())
    } else {
        debug!(backend = %backend, "date range ignored, backend has no date filter");
        None
    };

    BackendQuery {
        backend,
        phrase,
        unit: unit.and_then(|unit| capabilities.units.resolve(unit)),
        date_range,
        page: request.page,
        page_size: request.page_size.min(capabilities.max_page_size),
        sort: request.sort,
    }
}
