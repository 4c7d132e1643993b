use crate::error::DocumentError;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::html::{html_to_markdown, repair_escaped_markup};
use crate::metadata::MetadataPatterns;
use crate::models::{ContentFormat, ConvertedDocument, RawDocument};
use std::time::Duration;
use tracing::debug;

/// Converts on the blocking pool and gives up after `timeout`.
pub async fn convert(raw: RawDocument, timeout: Duration) -> Result<ConvertedDocument, DocumentError> {
    let backend = raw.backend;
    let task = tokio::task::spawn_blocking(move || convert_blocking(raw));

    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(DocumentError::ConversionTimeout {
            backend,
            timeout_ms: timeout.as_millis() as u64,
        }),
        Ok(Err(join_error)) => Err(DocumentError::Conversion(join_error.to_string())),
        Ok(Ok(converted)) => converted,
    }
}

pub fn convert_blocking(raw: RawDocument) -> Result<ConvertedDocument, DocumentError> {
    let capabilities = raw.backend.capabilities();

    let (text, source_page_count) = match raw.format {
        ContentFormat::Html => {
            let markup = repair_escaped_markup(&String::from_utf8_lossy(&raw.bytes));
            (html_to_markdown(&markup, capabilities.content_selectors), None)
        }
        ContentFormat::Pdf => {
            let pdf = LopdfExtractor.extract_pages(&raw.bytes, raw.source_page)?;
            (pdf.joined(), Some(pdf.page_count))
        }
    };

    if text.trim().is_empty() {
        return Err(DocumentError::EmptyDocument {
            backend: raw.backend,
        });
    }

    let extracted = MetadataPatterns::shared()?.extract(&text);
    let total_chars = text.chars().count();
    debug!(
        backend = %raw.backend,
        rendition = %raw.format,
        total_chars,
        "document converted"
    );

    Ok(ConvertedDocument {
        backend: raw.backend,
        format: raw.format,
        metadata: raw.metadata.or(extracted),
        total_chars,
        text,
        source_page: raw.source_page,
        source_page_count,
    })
}
