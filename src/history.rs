//! Board history: linear undo/redo log of snapshots with a cursor.
//!
//! DESIGN
//! ======
//! `entries[cursor]` is the snapshot currently materialized for the board.
//! Entries after the cursor are the redo buffer; a new capture truncates them
//! (no redo tree). The log never becomes empty once created, so the cursor
//! always addresses a real entry.
//!
//! An optional capacity bounds memory for long sessions. When a capture would
//! exceed it, the oldest entry is evicted and the cursor shifts down with it.

use crate::snapshot::Snapshot;

#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: Vec<Snapshot>,
    cursor: usize,
    /// Maximum retained entries; `None` keeps everything.
    limit: Option<usize>,
}

impl HistoryLog {
    /// Fresh log holding only the empty document.
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        Self::seeded(Snapshot::empty(), limit)
    }

    /// Log whose only entry is a snapshot loaded from storage.
    #[must_use]
    pub fn seeded(initial: Snapshot, limit: Option<usize>) -> Self {
        Self { entries: vec![initial], cursor: 0, limit: limit.filter(|n| *n > 0) }
    }

    /// Truncate the redo buffer, append, and advance the cursor.
    pub fn capture(&mut self, snapshot: Snapshot) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(snapshot);
        self.cursor = self.entries.len() - 1;

        if let Some(limit) = self.limit {
            let excess = self.entries.len().saturating_sub(limit);
            if excess > 0 {
                self.entries.drain(..excess);
                self.cursor -= excess;
            }
        }
    }

    /// Step back one entry. Returns the snapshot to materialize, or `None`
    /// when already at the oldest entry.
    pub fn undo(&mut self) -> Option<Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].clone())
    }

    /// Step forward one entry. Returns `None` at the tail.
    pub fn redo(&mut self) -> Option<Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].clone())
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// The materialized entry.
    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.cursor)
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
