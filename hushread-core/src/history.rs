/// Start offsets of previously shown pages, with a cursor at the page on
/// screen. Pushing after going back discards the old forward branch.
#[derive(Debug, Clone, Default)]
pub struct NavigationHistory {
    entries: Vec<usize>,
    cursor: Option<usize>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, offset: usize) {
        let keep = self.cursor.map_or(0, |cursor| cursor + 1);
        self.entries.truncate(keep);
        if self.entries.last() != Some(&offset) {
            self.entries.push(offset);
        }
        self.cursor = self.entries.len().checked_sub(1);
    }

    /// Moves the cursor back one entry and returns the offset there, or `None`
    /// when already at the oldest entry.
    pub fn go_back(&mut self) -> Option<usize> {
        let cursor = self.cursor.filter(|&cursor| cursor > 0)? - 1;
        self.cursor = Some(cursor);
        Some(self.entries[cursor])
    }

    pub fn current(&self) -> Option<usize> {
        self.cursor.map(|cursor| self.entries[cursor])
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor > 0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}
