//! Whiteboard controller: history, board set, and surface orchestration.
//!
//! ARCHITECTURE
//! ============
//! One `Whiteboard` serves one connected canvas. It owns:
//! - the board set (one history log per board)
//! - the single shared surface, which only ever shows the active board
//! - the persistence queue for its ownership key
//! - tool selection state
//!
//! All methods run on the connection task, so there is never concurrent
//! mutation. Remote writes are queued and applied in order by the writer
//! task; nothing here waits on storage except the initial `load`.
//!
//! LIFECYCLE
//! =========
//! `Loading` until `load` fetched the stored boards, then `Restoring` while
//! the surface materializes the active board, then `Idle`. Undo, redo,
//! switch and delete pass through `Restoring` again.
//!
//! Captures are only recorded while `Idle`, so the change notifications a
//! surface emits while being restored never become history. User actions
//! that arrive while a restore is pending are dropped, not queued.

pub mod tools;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::boards::{BoardSet, BoardSetError};
use crate::gateway::{PersistenceGateway, is_contiguous};
use crate::owner::OwnerKey;
use crate::services::persistence::{PersistOp, PersistQueue};
use crate::snapshot::Snapshot;
use crate::surface::{RestoreTicket, Surface};

use tools::{Tool, ToolError, ToolState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Stored boards not fetched yet.
    Loading,
    Idle,
    /// Waiting for the surface to acknowledge `ticket`.
    Restoring { ticket: RestoreTicket },
}

impl Phase {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Idle => "idle",
            Self::Restoring { .. } => "restoring",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Undo,
    Redo,
}

/// Client-facing view of the controller.
#[derive(Debug, Clone, Serialize)]
pub struct WhiteboardState {
    pub board_count: usize,
    pub active: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub boards: Vec<BoardSummary>,
    pub tools: ToolState,
    pub phase: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSummary {
    pub index: usize,
    pub cursor: usize,
    pub len: usize,
}

pub struct Whiteboard {
    owner: OwnerKey,
    boards: BoardSet,
    phase: Phase,
    last_ticket: RestoreTicket,
    tools: ToolState,
    surface: Box<dyn Surface>,
    persist: PersistQueue,
    history_limit: Option<usize>,
}

impl Whiteboard {
    #[must_use]
    pub fn new(
        owner: OwnerKey,
        surface: Box<dyn Surface>,
        persist: PersistQueue,
        history_limit: Option<usize>,
    ) -> Self {
        Self {
            owner,
            boards: BoardSet::new(history_limit),
            phase: Phase::Loading,
            last_ticket: 0,
            tools: ToolState::default(),
            surface,
            persist,
            history_limit,
        }
    }

    // =========================================================================
    // LOAD
    // =========================================================================

    /// Fetch stored boards and materialize the first one.
    ///
    /// No stored rows seeds a single empty board and creates its row. A
    /// failed fetch also starts from an empty board, but writes nothing, so
    /// a transient outage cannot overwrite boards that do exist remotely.
    pub async fn load(&mut self, gateway: &dyn PersistenceGateway) {
        if self.phase != Phase::Loading {
            return;
        }

        let loaded = gateway.select_all(&self.owner).await;
        match loaded {
            Ok(rows) if rows.is_empty() => {
                info!(owner = %self.owner, "no stored boards; seeding an empty board");
                self.boards = BoardSet::new(self.history_limit);
                let blank = self.current_snapshot();
                self.persist.enqueue(PersistOp::Upsert { index: 0, snapshot: blank });
            }
            Ok(rows) => {
                if !is_contiguous(&rows) {
                    warn!(owner = %self.owner, count = rows.len(), "stored board indices have gaps; compacting");
                    self.persist.enqueue(PersistOp::Compact);
                }
                info!(owner = %self.owner, count = rows.len(), "loaded stored boards");
                let snapshots = rows.into_iter().map(|row| row.snapshot).collect();
                self.boards = BoardSet::from_snapshots(snapshots, self.history_limit);
            }
            Err(e) => {
                warn!(error = %e, owner = %self.owner, "initial load failed; starting with an empty board");
                self.boards = BoardSet::new(self.history_limit);
            }
        }

        self.begin_restore(self.current_snapshot());
    }

    /// Surface acknowledged a restore. Stale tickets are ignored.
    pub fn restore_complete(&mut self, ticket: RestoreTicket) -> bool {
        match self.phase {
            Phase::Restoring { ticket: pending } if pending == ticket => {
                self.phase = Phase::Idle;
                true
            }
            _ => {
                debug!(ticket, phase = self.phase.name(), "ignoring stale restore completion");
                false
            }
        }
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// Capture hook: the user changed the surface.
    pub fn on_surface_changed(&mut self, snapshot: Snapshot) -> bool {
        if !self.accepting("surface change") {
            return false;
        }
        self.surface.observe(snapshot);
        let captured = self.surface.capture();
        self.capture(self.boards.active(), captured)
    }

    /// Record `snapshot` as the newest entry of a board, discarding its redo
    /// buffer, and persist it.
    pub fn capture(&mut self, board_index: usize, snapshot: Snapshot) -> bool {
        if !self.accepting("capture") {
            return false;
        }
        let Some(board) = self.boards.get_mut(board_index) else {
            return false;
        };
        board.history.capture(snapshot.clone());
        self.persist.enqueue(PersistOp::Upsert { index: board_index, snapshot });
        true
    }

    pub fn undo(&mut self, board_index: usize) -> bool {
        self.step(board_index, Step::Undo)
    }

    pub fn redo(&mut self, board_index: usize) -> bool {
        self.step(board_index, Step::Redo)
    }

    #[must_use]
    pub fn can_undo(&self, board_index: usize) -> bool {
        self.boards.get(board_index).is_some_and(|b| b.history.can_undo())
    }

    #[must_use]
    pub fn can_redo(&self, board_index: usize) -> bool {
        self.boards.get(board_index).is_some_and(|b| b.history.can_redo())
    }

    /// Move a board's cursor. Only the active board touches the surface;
    /// other boards just move their cursor and persist.
    fn step(&mut self, board_index: usize, step: Step) -> bool {
        if !self.accepting("history step") {
            return false;
        }
        let Some(board) = self.boards.get_mut(board_index) else {
            return false;
        };
        let moved = match step {
            Step::Undo => board.history.undo(),
            Step::Redo => board.history.redo(),
        };
        let Some(snapshot) = moved else {
            return false;
        };

        if board_index == self.boards.active() {
            self.begin_restore(snapshot.clone());
        }
        self.persist.enqueue(PersistOp::Upsert { index: board_index, snapshot });
        true
    }

    // =========================================================================
    // BOARD SET
    // =========================================================================

    /// Append an empty board and make it active. Returns its index.
    pub fn add_board(&mut self) -> Option<usize> {
        if !self.accepting("add board") {
            return None;
        }
        self.flush_active();
        let blank = self.surface.clear();
        let index = self.boards.push_with(blank.clone());
        self.persist.enqueue(PersistOp::Upsert { index, snapshot: blank });
        info!(owner = %self.owner, index, "board added");
        Some(index)
    }

    pub fn switch_board(&mut self, target: usize) -> bool {
        if !self.accepting("switch board") {
            return false;
        }
        if target == self.boards.active() || target >= self.boards.len() {
            return false;
        }
        self.flush_active();
        self.boards.set_active(target);
        self.begin_restore(self.current_snapshot());
        true
    }

    /// Remove a board, renumber the remote rows above it, and show the new
    /// active board. Out-of-range targets are a no-op.
    ///
    /// # Errors
    ///
    /// `LastBoard` when only one board exists; nothing is changed.
    pub fn delete_board(&mut self, target: usize) -> Result<bool, BoardSetError> {
        if !self.accepting("delete board") {
            return Ok(false);
        }
        if self.boards.len() <= 1 {
            return Err(BoardSetError::LastBoard);
        }
        if target >= self.boards.len() {
            return Ok(false);
        }

        self.persist.enqueue(PersistOp::DeleteAndShift { index: target });
        let active = self.boards.remove(target)?;
        info!(owner = %self.owner, index = target, active, "board deleted");
        self.begin_restore(self.current_snapshot());
        Ok(true)
    }

    /// Blank the active board as an ordinary, undoable history entry.
    pub fn clear_active_board(&mut self) -> bool {
        if !self.accepting("clear board") {
            return false;
        }
        let blank = self.surface.clear();
        self.capture(self.boards.active(), blank)
    }

    // =========================================================================
    // TOOLS
    // =========================================================================

    /// # Errors
    ///
    /// Returns `InvalidColor` for anything but `#rgb` / `#rrggbb`.
    pub fn select_color(&mut self, color: &str) -> Result<(), ToolError> {
        self.tools.select_color(color)
    }

    pub fn select_size(&mut self, size: u32) {
        self.tools.select_size(size);
    }

    pub fn select_tool(&mut self, tool: Tool) {
        self.tools.select_tool(tool);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn owner(&self) -> &OwnerKey {
        &self.owner
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn active(&self) -> usize {
        self.boards.active()
    }

    #[must_use]
    pub fn boards(&self) -> &BoardSet {
        &self.boards
    }

    #[cfg(test)]
    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    #[must_use]
    pub fn state(&self) -> WhiteboardState {
        let active = self.boards.active();
        WhiteboardState {
            board_count: self.boards.len(),
            active,
            can_undo: self.can_undo(active),
            can_redo: self.can_redo(active),
            boards: self
                .boards
                .iter()
                .enumerate()
                .map(|(index, b)| BoardSummary { index, cursor: b.history.cursor(), len: b.history.len() })
                .collect(),
            tools: self.tools.clone(),
            phase: self.phase.name(),
        }
    }

    /// Wait until every write issued so far has reached the gateway.
    pub async fn flush(&self) {
        self.persist.flush().await;
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn accepting(&self, action: &'static str) -> bool {
        if self.phase == Phase::Idle {
            return true;
        }
        debug!(action, phase = self.phase.name(), "dropping action while surface is busy");
        false
    }

    fn current_snapshot(&self) -> Snapshot {
        self.boards.active_board().history.current().cloned().unwrap_or_default()
    }

    /// Ask the surface to show `snapshot` and wait for its ticket. A request
    /// the surface could not accept leaves the controller `Idle` with the
    /// surface on its old contents; the client recovers by re-requesting
    /// state or switching boards.
    fn begin_restore(&mut self, snapshot: Snapshot) {
        self.last_ticket += 1;
        let ticket = self.last_ticket;
        if self.surface.restore(&snapshot, ticket) {
            self.phase = Phase::Restoring { ticket };
        } else {
            warn!(owner = %self.owner, ticket, "surface refused restore; staying idle");
            self.phase = Phase::Idle;
        }
    }

    /// Capture the surface into the active board unless it already shows the
    /// board's current entry.
    fn flush_active(&mut self) {
        let shown = self.surface.capture();
        let unchanged = self
            .boards
            .active_board()
            .history
            .current()
            .is_some_and(|current| current.same(&shown));
        if !unchanged {
            self.capture(self.boards.active(), shown);
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
