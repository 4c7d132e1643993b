use crate::error::DocumentError;
use crate::models::{ConvertedDocument, PaginatedPage};

/// Characters per page, system wide.
pub const CHUNK_SIZE: usize = 5000;

pub fn total_pages(total_chars: usize, chunk_size: usize) -> u32 {
    total_chars.div_ceil(chunk_size).max(1) as u32
}

/// Character offsets `[start, end)` covered by `page_number`.
pub fn page_bounds(page_number: u32, total_chars: usize, chunk_size: usize) -> (usize, usize) {
    let start = (page_number.saturating_sub(1) as usize).saturating_mul(chunk_size);
    let end = start.saturating_add(chunk_size).min(total_chars);
    (start.min(total_chars), end)
}

pub fn paginate(document: &ConvertedDocument, page_number: u32) -> Result<PaginatedPage, DocumentError> {
    paginate_with(document, page_number, CHUNK_SIZE)
}

/// Slices several pages out of one conversion.
pub fn paginate_many(
    document: &ConvertedDocument,
    page_numbers: &[u32],
) -> Result<Vec<PaginatedPage>, DocumentError> {
    page_numbers
        .iter()
        .map(|page_number| paginate(document, *page_number))
        .collect()
}

fn paginate_with(
    document: &ConvertedDocument,
    page_number: u32,
    chunk_size: usize,
) -> Result<PaginatedPage, DocumentError> {
    let total = total_pages(document.total_chars, chunk_size);
    if page_number < 1 || page_number > total {
        return Err(DocumentError::PageOutOfRange {
            requested: page_number,
            total,
        });
    }

    let (start, end) = page_bounds(page_number, document.total_chars, chunk_size);
    let content = slice_chars(&document.text, start, end).to_string();

    Ok(PaginatedPage {
        page_number,
        total_pages: total,
        is_paginated: total > 1,
        content,
        metadata: document.metadata.clone(),
        total_chars: document.total_chars,
        backend: document.backend,
        source_page: document.source_page,
        source_page_count: document.source_page_count,
        next_source_page_id: None,
    })
}

fn slice_chars(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |offset: usize| {
        text.char_indices()
            .nth(offset)
            .map(|(byte, _)| byte)
            .unwrap_or(text.len())
    };
    &text[byte_at(start)..byte_at(end)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendId;
    use crate::models::{ContentFormat, DocumentMetadata};

    fn document(text: String) -> ConvertedDocument {
        ConvertedDocument {
            backend: BackendId::Yargitay,
            format: ContentFormat::Html,
            total_chars: text.chars().count(),
            text,
            metadata: DocumentMetadata::default(),
            source_page: None,
            source_page_count: None,
        }
    }

    fn numbered_text(length: usize) -> String {
        (0..length)
            .map(|index| char::from(b'a' + (index % 26) as u8))
            .collect()
    }

    #[test]
    fn twelve_thousand_chars_make_three_pages() {
        let text = numbered_text(12_000);
        let document = document(text.clone());
        let chars: Vec<char> = text.chars().collect();

        let pages = paginate_many(&document, &[1, 2, 3]).expect("pages should exist");
        assert_eq!(pages[0].total_pages, 3);
        assert!(pages.iter().all(|page| page.is_paginated));
        assert_eq!(pages[0].content, chars[0..5000].iter().collect::<String>());
        assert_eq!(pages[1].content, chars[5000..10000].iter().collect::<String>());
        assert_eq!(pages[2].content, chars[10000..12000].iter().collect::<String>());
    }

    #[test]
    fn total_pages_is_ceiling_with_floor_of_one() {
        assert_eq!(total_pages(0, CHUNK_SIZE), 1);
        assert_eq!(total_pages(1, CHUNK_SIZE), 1);
        assert_eq!(total_pages(5000, CHUNK_SIZE), 1);
        assert_eq!(total_pages(5001, CHUNK_SIZE), 2);
        for length in [1usize, 4999, 10_000, 10_001, 123_456] {
            assert_eq!(total_pages(length, CHUNK_SIZE) as usize, length.div_ceil(CHUNK_SIZE));
        }
    }

    #[test]
    fn direct_page_fetch_matches_sequential_fetch() {
        let document = document(numbered_text(17_321));
        let direct = paginate(&document, 3).expect("page 3 exists");
        let sequential = paginate_many(&document, &[1, 2, 3]).expect("pages exist");
        assert_eq!(direct, sequential[2]);
    }

    #[test]
    fn multibyte_text_is_sliced_on_characters() {
        let text = "ğ".repeat(5000) + "şç";
        let document = document(text);

        let last = paginate(&document, 2).expect("page 2 exists");
        assert_eq!(last.content, "şç");
        assert_eq!(paginate(&document, 1).expect("page 1").content.chars().count(), 5000);
    }

    #[test]
    fn pages_outside_the_document_fail() {
        let document = document(numbered_text(12_000));
        assert!(paginate(&document, 3).is_ok_and(|page| !page.content.is_empty()));
        assert!(matches!(
            paginate(&document, 4),
            Err(DocumentError::PageOutOfRange {
                requested: 4,
                total: 3
            })
        ));
        assert!(matches!(
            paginate(&document, 0),
            Err(DocumentError::PageOutOfRange { requested: 0, .. })
        ));
    }

    #[test]
    fn empty_document_has_one_unpaginated_page() {
        let page = paginate(&document(String::new()), 1).expect("page 1 always exists");
        assert_eq!(page.total_pages, 1);
        assert!(!page.is_paginated);
        assert!(page.content.is_empty());
    }
}
