use crate::document::Document;

/// Size of the text area the fitter measures against, in the fitter's own
/// units (terminal cells for the tty front end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub columns: u32,
    pub rows: u32,
}

impl Viewport {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    /// A viewport with no area has not been laid out yet.
    pub fn is_valid(&self) -> bool {
        self.columns > 0 && self.rows > 0
    }
}

/// Answers whether a slice of the document renders inside the viewport.
///
/// Implementations must be side-effect free: the pager probes the same range
/// more than once and expects the same answer while the viewport is unchanged.
pub trait TextFitter {
    /// Current viewport. Read on every pagination since it may change between
    /// calls.
    fn viewport(&self) -> Viewport;

    fn fits(&self, doc: &Document, start: usize, end: usize) -> bool;

    /// Measurement of the live surface, consulted after placement. Surfaces
    /// whose probe measurement can disagree with what is finally drawn
    /// override this.
    fn rendered_fits(&self, doc: &Document, start: usize, end: usize) -> bool {
        self.fits(doc, start, end)
    }
}

impl<T: TextFitter + ?Sized> TextFitter for &T {
    fn viewport(&self) -> Viewport {
        (**self).viewport()
    }

    fn fits(&self, doc: &Document, start: usize, end: usize) -> bool {
        (**self).fits(doc, start, end)
    }

    fn rendered_fits(&self, doc: &Document, start: usize, end: usize) -> bool {
        (**self).rendered_fits(doc, start, end)
    }
}
