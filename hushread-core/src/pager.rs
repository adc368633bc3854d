use std::ops::Range;

use tracing::debug;

use crate::breaks::{find_break, BREAK_WINDOW};
use crate::document::Document;
use crate::fit::TextFitter;

/// The `[start, end)` slice of the document shown on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub start: usize,
    pub end: usize,
}

impl Page {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn empty_at(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerOptions {
    /// First length probed by the growth phase.
    pub probe_len: usize,
    /// Page length used while the viewport has no area.
    pub fallback_len: usize,
    /// Substituted when fitting or snapping leaves nothing to show.
    pub min_page_len: usize,
    pub break_window: usize,
    pub smart_break: bool,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            probe_len: 128,
            fallback_len: 1000,
            min_page_len: 64,
            break_window: BREAK_WINDOW,
            smart_break: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pager {
    options: PagerOptions,
}

impl Pager {
    pub fn new(options: PagerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PagerOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: PagerOptions) {
        self.options = options;
    }

    /// Lays out the page starting at `start`.
    pub fn paginate<F: TextFitter + ?Sized>(&self, doc: &Document, start: usize, fitter: &F) -> Page {
        let len = doc.len();
        let start = start.min(len);
        let remaining = len - start;

        if !fitter.viewport().is_valid() {
            let end = start + self.options.fallback_len.min(remaining);
            debug!(start, end, "viewport not laid out, using fixed-length page");
            return Page::new(start, end);
        }
        if remaining == 0 {
            return Page::empty_at(start);
        }

        let fitted = self.measure_fit(doc, start, fitter);
        let mut page_len = fitted;
        if self.options.smart_break && page_len > 0 {
            let cut = find_break(doc.chars(start..start + page_len), self.options.break_window);
            if cut > 0 && cut < page_len {
                page_len = cut;
            }
        }
        if page_len == 0 {
            page_len = self.options.min_page_len.max(1).min(remaining);
        }

        let page = correct_fit(doc, Page::new(start, start + page_len), fitter);
        debug!(start, fitted, end = page.end, "paginated");
        page
    }

    /// Largest `len` such that `start..start + len` fits, assuming the fitter
    /// is monotonic in slice length. Returns 0 when not even one char fits.
    pub fn measure_fit<F: TextFitter + ?Sized>(&self, doc: &Document, start: usize, fitter: &F) -> usize {
        let remaining = doc.len().saturating_sub(start);
        if remaining == 0 {
            return 0;
        }

        // `low` always fits, `high` is the next length to try.
        let mut low = 0;
        let mut high = self.options.probe_len.max(1).min(remaining);
        loop {
            if !fitter.fits(doc, start, start + high) {
                break;
            }
            low = high;
            if high == remaining {
                return remaining;
            }
            high = high.saturating_mul(2).min(remaining);
        }

        // `high` was rejected: search the boundary in (low, high].
        let (mut left, mut right) = (low, high);
        while left + 1 < right {
            let mid = (left + right) / 2;
            if fitter.fits(doc, start, start + mid) {
                left = mid;
            } else {
                right = mid;
            }
        }
        left
    }
}

/// Shrinks the page one char at a time while the live surface reports an
/// overflow. Never goes below a single char.
pub fn correct_fit<F: TextFitter + ?Sized>(doc: &Document, page: Page, fitter: &F) -> Page {
    let mut end = page.end;
    while end > page.start + 1 && !fitter.rendered_fits(doc, page.start, end) {
        end -= 1;
    }
    if end <= page.start {
        end = (page.start + 1).min(doc.len());
    }
    if end < page.end {
        debug!(start = page.start, from = page.end, to = end, "corrected overflowing page");
    }
    Page::new(page.start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::Viewport;
    use std::cell::Cell;

    /// Fits any slice of at most `capacity` chars.
    struct CapacityFitter {
        capacity: usize,
        viewport: Viewport,
        probes: Cell<usize>,
    }

    impl CapacityFitter {
        fn new(capacity: usize) -> Self {
            Self {
                capacity,
                viewport: Viewport::new(80, 24),
                probes: Cell::new(0),
            }
        }
    }

    impl TextFitter for CapacityFitter {
        fn viewport(&self) -> Viewport {
            self.viewport
        }

        fn fits(&self, _doc: &Document, start: usize, end: usize) -> bool {
            self.probes.set(self.probes.get() + 1);
            end - start <= self.capacity
        }
    }

    /// Probe measurement says `capacity`, the live surface only holds `live`.
    struct SkewedFitter {
        capacity: usize,
        live: usize,
    }

    impl TextFitter for SkewedFitter {
        fn viewport(&self) -> Viewport {
            Viewport::new(10, 10)
        }

        fn fits(&self, _doc: &Document, start: usize, end: usize) -> bool {
            end - start <= self.capacity
        }

        fn rendered_fits(&self, _doc: &Document, start: usize, end: usize) -> bool {
            end - start <= self.live
        }
    }

    fn unbroken(len: usize) -> Document {
        Document::from_text(&"x".repeat(len))
    }

    #[test]
    fn finds_maximal_fit_with_logarithmic_probes() {
        let doc = unbroken(100_000);
        let fitter = CapacityFitter::new(3_217);
        let pager = Pager::default();
        assert_eq!(pager.measure_fit(&doc, 0, &fitter), 3_217);
        assert!(fitter.probes.get() < 30, "probes: {}", fitter.probes.get());
    }

    #[test]
    fn whole_remainder_fits() {
        let doc = unbroken(300);
        let fitter = CapacityFitter::new(10_000);
        let page = Pager::default().paginate(&doc, 100, &fitter);
        assert_eq!(page, Page::new(100, 300));
    }

    #[test]
    fn snaps_to_break_point() {
        let doc = Document::from_text("hello world. Goodbye cruel world");
        let fitter = CapacityFitter::new(17);
        let page = Pager::default().paginate(&doc, 0, &fitter);
        assert_eq!(doc.slice(page.start, page.end), "hello world. ");
    }

    #[test]
    fn smart_break_can_be_disabled() {
        let doc = Document::from_text("hello world. Goodbye cruel world");
        let fitter = CapacityFitter::new(17);
        let pager = Pager::new(PagerOptions {
            smart_break: false,
            ..PagerOptions::default()
        });
        assert_eq!(pager.paginate(&doc, 0, &fitter), Page::new(0, 17));
    }

    #[test]
    fn invalid_viewport_uses_fixed_length() {
        let doc = unbroken(50_000);
        let mut fitter = CapacityFitter::new(10);
        fitter.viewport = Viewport::new(0, 24);
        let pager = Pager::default();
        assert_eq!(pager.paginate(&doc, 0, &fitter), Page::new(0, 1000));
        assert_eq!(pager.paginate(&doc, 49_500, &fitter), Page::new(49_500, 50_000));
        assert_eq!(fitter.probes.get(), 0);
    }

    #[test]
    fn end_of_document_is_empty_page() {
        let doc = unbroken(10);
        let fitter = CapacityFitter::new(5);
        let page = Pager::default().paginate(&doc, 10, &fitter);
        assert_eq!(page, Page::empty_at(10));
        assert!(page.is_empty());

        let empty = Document::from_text("");
        assert_eq!(Pager::default().paginate(&empty, 0, &fitter), Page::empty_at(0));
    }

    #[test]
    fn nothing_fits_still_makes_progress() {
        let doc = unbroken(500);
        let fitter = CapacityFitter::new(0);
        let page = Pager::default().paginate(&doc, 0, &fitter);
        assert_eq!(page, Page::new(0, 1));
    }

    #[test]
    fn corrector_shrinks_to_live_measurement() {
        let doc = unbroken(1_000);
        let fitter = SkewedFitter {
            capacity: 120,
            live: 115,
        };
        let page = Pager::default().paginate(&doc, 0, &fitter);
        assert_eq!(page, Page::new(0, 115));
    }

    #[test]
    fn corrector_bottoms_out_at_one_char() {
        let doc = unbroken(100);
        let fitter = SkewedFitter {
            capacity: 50,
            live: 0,
        };
        assert_eq!(correct_fit(&doc, Page::new(10, 60), &fitter), Page::new(10, 11));
    }

    #[test]
    fn repeated_pagination_is_stable() {
        let doc = Document::from_text(&"The quick brown fox. ".repeat(400));
        let fitter = CapacityFitter::new(777);
        let pager = Pager::default();
        let first = pager.paginate(&doc, 42, &fitter);
        let second = pager.paginate(&doc, 42, &fitter);
        assert_eq!(first, second);
        assert!(first.end > first.start);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn measure_fit_is_maximal(len in 0usize..5_000, start_frac in 0.0f64..1.0, capacity in 0usize..3_000) {
                let doc = unbroken(len);
                let start = ((len as f64) * start_frac) as usize;
                let fitter = CapacityFitter::new(capacity);
                let fit = Pager::default().measure_fit(&doc, start, &fitter);
                prop_assert_eq!(fit, capacity.min(len - start));
            }

            #[test]
            fn pages_stay_in_bounds(text in "[a-z .\n]{0,2000}", start in 0usize..2_100, capacity in 0usize..600) {
                let doc = Document::from_text(&text);
                let fitter = CapacityFitter::new(capacity);
                let page = Pager::default().paginate(&doc, start, &fitter);
                prop_assert!(page.start <= page.end);
                prop_assert!(page.end <= doc.len());
                prop_assert_eq!(page.is_empty(), page.start == doc.len());
            }
        }
    }
}
