use crate::compactor::parse_decision_date;
use crate::models::DocumentMetadata;
use regex::Regex;
use std::sync::OnceLock;

const SEPARATOR: &str = r"[\s:.*]*";
const NUMBER: &str = r"([0-9]{4}\s*/\s*[0-9]+)";

/// Compiled once per process on first conversion.
static PATTERNS: OnceLock<Result<MetadataPatterns, regex::Error>> = OnceLock::new();

pub struct MetadataPatterns {
    decision_number: Vec<Regex>,
    case_number: Vec<Regex>,
    decision_date: Regex,
    subject: Regex,
}

impl MetadataPatterns {
    pub fn shared() -> Result<&'static Self, regex::Error> {
        PATTERNS.get_or_init(Self::compile).as_ref().map_err(Clone::clone)
    }

    pub fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            decision_number: vec![
                Regex::new(&format!(
                    r"(?i)karar\s+(?:no|numarası|sayısı){SEPARATOR}{NUMBER}"
                ))?,
                Regex::new(&format!(r"\bK\.\s*(?:No)?{SEPARATOR}{NUMBER}"))?,
            ],
            case_number: vec![
                Regex::new(&format!(r"(?i)esas\s+(?:no|numarası){SEPARATOR}{NUMBER}"))?,
                Regex::new(&format!(r"\b(?:E|B)\.\s*(?:No)?{SEPARATOR}{NUMBER}"))?,
            ],
            decision_date: Regex::new(&format!(
                r"(?i)karar\s+tarihi{SEPARATOR}([0-9]{{1,2}}[./][0-9]{{1,2}}[./][0-9]{{4}})"
            ))?,
            subject: Regex::new(r"(?im)^[\s*#]*(?:başvuru\s+konusu|konu|konusu)\s*\**\s*:\s*\**\s*(.+)$")?,
        })
    }

    /// Best-effort extraction; fields that do not match stay empty.
    pub fn extract(&self, text: &str) -> DocumentMetadata {
        DocumentMetadata {
            decision_number: first_capture(&self.decision_number, text).map(compact_number),
            case_number: first_capture(&self.case_number, text).map(compact_number),
            decision_date: self.decision_date.captures(text).map(|captures| {
                let raw = &captures[1];
                parse_decision_date(&raw.replace('/', "."))
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| raw.to_string())
            }),
            subject: self
                .subject
                .captures(text)
                .map(|captures| captures[1].trim().trim_matches('*').trim().to_string())
                .filter(|subject| !subject.is_empty()),
        }
    }
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|pattern| pattern.captures(text).map(|captures| captures[1].to_string()))
}

fn compact_number(raw: String) -> String {
    raw.split_whitespace().collect()
}
