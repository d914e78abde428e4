//! Board set: ordered boards plus the active selection.
//!
//! DESIGN
//! ======
//! A board is addressed by its position. Positions are dense and 0-based, so
//! deleting a board shifts every later board down by one; the remote rows
//! follow the same renumbering (see `gateway::PersistenceGateway::delete_and_shift`).
//!
//! Invariants held by every operation here:
//! - at least one board exists
//! - `active < len`

use crate::history::HistoryLog;
use crate::snapshot::Snapshot;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoardSetError {
    #[error("cannot delete the last remaining board")]
    LastBoard,
    #[error("board {0} does not exist")]
    OutOfRange(usize),
}

impl crate::frame::ErrorCode for BoardSetError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::LastBoard => "E_LAST_BOARD",
            Self::OutOfRange(_) => "E_BOARD_NOT_FOUND",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Board {
    pub history: HistoryLog,
}

#[derive(Debug, Clone)]
pub struct BoardSet {
    boards: Vec<Board>,
    active: usize,
    history_limit: Option<usize>,
}

impl BoardSet {
    /// A set holding a single empty board.
    #[must_use]
    pub fn new(history_limit: Option<usize>) -> Self {
        Self { boards: vec![Board { history: HistoryLog::new(history_limit) }], active: 0, history_limit }
    }

    /// Build from loaded snapshots in board order. An empty list seeds one
    /// empty board.
    #[must_use]
    pub fn from_snapshots(snapshots: Vec<Snapshot>, history_limit: Option<usize>) -> Self {
        if snapshots.is_empty() {
            return Self::new(history_limit);
        }
        let boards = snapshots
            .into_iter()
            .map(|snap| Board { history: HistoryLog::seeded(snap, history_limit) })
            .collect();
        Self { boards, active: 0, history_limit }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    #[must_use]
    pub fn active(&self) -> usize {
        self.active
    }

    #[must_use]
    pub fn active_board(&self) -> &Board {
        &self.boards[self.active]
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Board> {
        self.boards.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Board> {
        self.boards.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Board> {
        self.boards.iter()
    }

    /// Append a board whose first entry is `initial` and make it active.
    pub fn push_with(&mut self, initial: Snapshot) -> usize {
        self.boards.push(Board { history: HistoryLog::seeded(initial, self.history_limit) });
        self.active = self.boards.len() - 1;
        self.active
    }

    /// Change the active board. Returns `false` for out-of-range targets and
    /// for the already-active board.
    pub fn set_active(&mut self, target: usize) -> bool {
        if target >= self.boards.len() || target == self.active {
            return false;
        }
        self.active = target;
        true
    }

    /// Remove a board and recompute the active index.
    ///
    /// # Errors
    ///
    /// `LastBoard` when only one board exists, `OutOfRange` for a missing
    /// target. The set is unchanged in both cases.
    pub fn remove(&mut self, target: usize) -> Result<usize, BoardSetError> {
        if self.boards.len() <= 1 {
            return Err(BoardSetError::LastBoard);
        }
        if target >= self.boards.len() {
            return Err(BoardSetError::OutOfRange(target));
        }
        self.boards.remove(target);
        self.active = active_after_delete(self.active, target);
        Ok(self.active)
    }
}

/// Active index after deleting `deleted`: the board before a deleted active
/// board becomes active, boards after the deleted one shift down.
#[must_use]
pub fn active_after_delete(active: usize, deleted: usize) -> usize {
    if deleted == active {
        deleted.saturating_sub(1)
    } else if deleted < active {
        active - 1
    } else {
        active
    }
}

#[cfg(test)]
#[path = "boards_test.rs"]
mod tests;
