use crate::error::DocumentError;
use crate::text::normalize_lines;
use lopdf::Document;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct PdfText {
    pub pages: Vec<PageText>,
    pub page_count: u32,
}

impl PdfText {
    pub fn joined(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.as_str())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub trait PdfExtractor {
    /// Extracts every page in page order, or only `source_page` when given.
    fn extract_pages(&self, bytes: &[u8], source_page: Option<u32>) -> Result<PdfText, DocumentError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8], source_page: Option<u32>) -> Result<PdfText, DocumentError> {
        let document =
            Document::load_mem(bytes).map_err(|error| DocumentError::Pdf(error.to_string()))?;

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        let page_count = page_numbers.len() as u32;

        let selected = match source_page {
            None => page_numbers,
            Some(requested) if page_numbers.contains(&requested) => vec![requested],
            Some(requested) => {
                return Err(DocumentError::PageOutOfRange {
                    requested,
                    total: page_count,
                })
            }
        };

        let mut pages = Vec::with_capacity(selected.len());
        for page_no in selected {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| DocumentError::Pdf(error.to_string()))?;
            pages.push(PageText {
                number: page_no,
                text: normalize_lines(&text),
            });
        }

        Ok(PdfText { pages, page_count })
    }
}
