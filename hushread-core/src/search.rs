use tracing::debug;

use crate::document::{fold_char, Document};
use crate::pager::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

/// Case-insensitive substring search over the whole document.
///
/// Forward search starts at the end of the current page and wraps once to the
/// start of the document. Backward search looks for the last match starting
/// before the current page and does not wrap.
#[derive(Debug, Clone, Default)]
pub struct SearchCursor {
    last_query: Option<String>,
    last_match: Option<usize>,
}

impl SearchCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    pub fn last_match(&self) -> Option<usize> {
        self.last_match
    }

    pub fn reset(&mut self) {
        self.last_query = None;
        self.last_match = None;
    }

    /// Returns the offset of the match to jump to. Blank queries never match
    /// and are not remembered.
    pub fn search(
        &mut self,
        doc: &Document,
        query: &str,
        page: Page,
        direction: SearchDirection,
    ) -> Option<usize> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        self.last_query = Some(query.to_string());

        let needle: Vec<char> = query.chars().map(fold_char).collect();
        let haystack = doc.folded();
        let found = match direction {
            SearchDirection::Forward => find_forward(haystack, &needle, page.end)
                .or_else(|| find_forward(haystack, &needle, 0)),
            SearchDirection::Backward => {
                find_backward(haystack, &needle, page.start.saturating_sub(1))
            }
        };
        debug!(query, ?direction, from = page.start, ?found, "search");
        if found.is_some() {
            self.last_match = found;
        }
        found
    }

    /// Repeats the last query in `direction`.
    pub fn repeat(&mut self, doc: &Document, page: Page, direction: SearchDirection) -> Option<usize> {
        let query = self.last_query.clone()?;
        self.search(doc, &query, page, direction)
    }
}

/// First occurrence starting at or after `from`.
pub fn find_forward(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let last_start = haystack.len() - needle.len();
    (from..=last_start).find(|&idx| haystack[idx..idx + needle.len()] == *needle)
}

/// Last occurrence starting at or before `from`.
pub fn find_backward(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let last_start = (haystack.len() - needle.len()).min(from);
    (0..=last_start)
        .rev()
        .find(|&idx| haystack[idx..idx + needle.len()] == *needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::from_text("abc middle xyz tail ABC end")
    }

    #[test]
    fn forward_finds_next_after_page() {
        let doc = doc();
        let mut cursor = SearchCursor::new();
        let hit = cursor.search(&doc, "xyz", Page::new(0, 5), SearchDirection::Forward);
        assert_eq!(hit, Some(11));
        assert_eq!(cursor.last_match(), Some(11));
    }

    #[test]
    fn forward_is_case_insensitive_and_wraps() {
        let doc = doc();
        let mut cursor = SearchCursor::new();
        let hit = cursor.search(&doc, "abc", Page::new(0, 10), SearchDirection::Forward);
        assert_eq!(hit, Some(20));

        let wrapped = cursor.search(&doc, "Abc", Page::new(20, 24), SearchDirection::Forward);
        assert_eq!(wrapped, Some(0));
    }

    #[test]
    fn backward_searches_before_page_without_wrapping() {
        let doc = doc();
        let mut cursor = SearchCursor::new();
        let hit = cursor.search(&doc, "abc", Page::new(24, 27), SearchDirection::Backward);
        assert_eq!(hit, Some(20));
        let hit = cursor.search(&doc, "abc", Page::new(20, 24), SearchDirection::Backward);
        assert_eq!(hit, Some(0));
        let miss = cursor.search(&doc, "end", Page::new(5, 10), SearchDirection::Backward);
        assert_eq!(miss, None);
        assert_eq!(cursor.last_match(), Some(0));
    }

    #[test]
    fn miss_and_blank_query() {
        let doc = doc();
        let mut cursor = SearchCursor::new();
        assert_eq!(cursor.search(&doc, "   ", Page::new(0, 5), SearchDirection::Forward), None);
        assert_eq!(cursor.last_query(), None);
        assert_eq!(cursor.search(&doc, "nope", Page::new(0, 5), SearchDirection::Forward), None);
        assert_eq!(cursor.last_query(), Some("nope"));
    }

    #[test]
    fn repeat_uses_last_query() {
        let doc = doc();
        let mut cursor = SearchCursor::new();
        assert_eq!(cursor.repeat(&doc, Page::new(0, 1), SearchDirection::Forward), None);
        cursor.search(&doc, " tail ", Page::new(0, 1), SearchDirection::Forward);
        assert_eq!(cursor.repeat(&doc, Page::new(0, 1), SearchDirection::Forward), Some(15));
    }

    #[test]
    fn needle_longer_than_text() {
        let chars: Vec<char> = "ab".chars().collect();
        let needle: Vec<char> = "abc".chars().collect();
        assert_eq!(find_forward(&chars, &needle, 0), None);
        assert_eq!(find_backward(&chars, &needle, 1), None);
        assert_eq!(find_forward(&chars, &chars, 1), None);
    }
}
