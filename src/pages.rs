//! Page-indexed Markdown: split one OCR response into per-page documents and
//! join the edited pages back into one file.
//!
//! The OCR service returns a whole document as a single string with pages
//! separated by [`PAGE_SEPARATOR`]. The editor works one page at a time, so
//! [`PageMarkdown`] keeps a 1-based `page → markdown` map bounded by the
//! document's page count.
//!
//! ## Round-trip
//!
//! `initialize_from_ocr` followed by `all_markdown` reproduces the input up to
//! whitespace around each fragment, but only when every page is non-empty.
//! Blank pages are dropped on the way out, so a page the user clears
//! disappears from the saved file and the page count shrinks on the next
//! load.

use std::collections::BTreeMap;

/// Delimiter between pages in OCR output and in saved Markdown.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Per-page Markdown for one open document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMarkdown {
    total_pages: usize,
    pages: BTreeMap<usize, String>,
}

impl PageMarkdown {
    /// An empty mapping for a document with `total_pages` pages.
    pub fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            pages: BTreeMap::new(),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Replace every page from a flat OCR string.
    ///
    /// Page `i` gets the trimmed `i`-th fragment, or `""` when the service
    /// returned fewer fragments than `page_count`. Extra fragments beyond
    /// `page_count` are dropped.
    pub fn initialize_from_ocr(&mut self, flat_markdown: &str, page_count: usize) {
        let mut fragments = flat_markdown.split(PAGE_SEPARATOR);
        self.total_pages = page_count;
        self.pages = (1..=page_count)
            .map(|page| {
                let content = fragments.next().map(str::trim).unwrap_or_default();
                (page, content.to_string())
            })
            .collect();
    }

    /// Markdown for `page`, `""` if unset.
    pub fn page(&self, page: usize) -> &str {
        self.pages.get(&page).map(String::as_str).unwrap_or("")
    }

    /// Overwrite one page. Bounds are the caller's concern.
    pub fn set_page(&mut self, page: usize, content: impl Into<String>) {
        self.pages.insert(page, content.into());
    }

    /// Join pages `1..=total_pages`, skipping blank ones.
    pub fn all_markdown(&self) -> String {
        (1..=self.total_pages)
            .map(|page| self.page(page))
            .filter(|content| !content.trim().is_empty())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR)
    }

    /// Drop every page's content. The page count is kept.
    pub fn clear_all(&mut self) {
        self.pages.clear();
    }

    /// True when at least one page has non-blank content.
    pub fn has_content(&self) -> bool {
        self.pages.values().any(|c| !c.trim().is_empty())
    }

    /// `(page, markdown)` for pages `1..=total_pages` in order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        (1..=self.total_pages).map(move |page| (page, self.page(page)))
    }
}

/// Number of fragments `flat_markdown` splits into.
pub fn fragment_count(flat_markdown: &str) -> usize {
    flat_markdown.split(PAGE_SEPARATOR).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_until_set() {
        let pages = PageMarkdown::new(3);
        assert_eq!(pages.page(1), "");
        assert_eq!(pages.page(99), "");
        assert!(!pages.has_content());
    }

    #[test]
    fn set_and_overwrite() {
        let mut pages = PageMarkdown::new(2);
        pages.set_page(1, "# One");
        pages.set_page(2, "# Two");
        pages.set_page(1, "# One, again");
        assert_eq!(pages.page(1), "# One, again");
        assert_eq!(pages.page(2), "# Two");
    }

    #[test]
    fn initialize_splits_and_trims() {
        let mut pages = PageMarkdown::new(0);
        pages.initialize_from_ocr("  # A\n\n---\n\n# B  \n\n---\n\n\n# C\n", 3);
        assert_eq!(pages.total_pages(), 3);
        assert_eq!(pages.page(1), "# A");
        assert_eq!(pages.page(2), "# B");
        assert_eq!(pages.page(3), "# C");
    }

    #[test]
    fn fewer_fragments_than_pages_leaves_blanks() {
        let mut pages = PageMarkdown::new(0);
        pages.initialize_from_ocr("only one", 3);
        assert_eq!(pages.page(1), "only one");
        assert_eq!(pages.page(2), "");
        assert_eq!(pages.page(3), "");
        assert_eq!(pages.iter().count(), 3);
    }

    #[test]
    fn more_fragments_than_pages_are_dropped() {
        let mut pages = PageMarkdown::new(0);
        pages.initialize_from_ocr("a\n\n---\n\nb\n\n---\n\nc", 2);
        assert_eq!(pages.all_markdown(), "a\n\n---\n\nb");
    }

    #[test]
    fn initialize_replaces_stale_entries() {
        let mut pages = PageMarkdown::new(5);
        pages.set_page(5, "old document page 5");
        pages.initialize_from_ocr("new", 1);
        assert_eq!(pages.page(5), "");
        assert_eq!(pages.total_pages(), 1);
    }

    #[test]
    fn all_markdown_round_trips_non_empty_pages() {
        let flat = "# P1\ntext\n\n---\n\n# P2\n\n---\n\n# P3";
        let mut pages = PageMarkdown::new(0);
        pages.initialize_from_ocr(flat, 3);
        assert_eq!(pages.all_markdown(), flat);
    }

    #[test]
    fn all_markdown_skips_blank_pages() {
        let mut pages = PageMarkdown::new(3);
        pages.set_page(1, "first");
        pages.set_page(2, "   \n");
        pages.set_page(3, "third");
        assert_eq!(pages.all_markdown(), "first\n\n---\n\nthird");
    }

    #[test]
    fn all_markdown_ignores_pages_beyond_total() {
        let mut pages = PageMarkdown::new(1);
        pages.set_page(1, "in");
        pages.set_page(2, "out of range");
        assert_eq!(pages.all_markdown(), "in");
        assert_eq!(pages.page(2), "out of range");
    }

    #[test]
    fn clear_all_resets_content() {
        let mut pages = PageMarkdown::new(0);
        pages.initialize_from_ocr("a\n\n---\n\nb", 2);
        pages.clear_all();
        assert_eq!(pages.page(1), "");
        assert!(!pages.has_content());
        assert_eq!(pages.all_markdown(), "");
    }

    #[test]
    fn edits_survive_page_switches() {
        let mut pages = PageMarkdown::new(0);
        pages.initialize_from_ocr("P1\n\n---\n\nP2", 2);
        pages.set_page(1, "P1-edited");
        let _ = pages.page(2);
        assert_eq!(pages.page(1), "P1-edited");
        assert_eq!(pages.all_markdown(), "P1-edited\n\n---\n\nP2");
    }

    #[test]
    fn counts_fragments() {
        assert_eq!(fragment_count("a"), 1);
        assert_eq!(fragment_count("a\n\n---\n\nb"), 2);
        assert_eq!(fragment_count(""), 1);
    }
}
