//! Drawing surface seam.
//!
//! SYSTEM CONTEXT
//! ==============
//! The canvas itself lives in the browser. The controller only needs three
//! things from it: the document it currently shows, a way to replace that
//! document, and a way to blank it. Replacing is asynchronous: the surface
//! is handed a ticket and the controller learns about completion through
//! `Whiteboard::restore_complete(ticket)`.

use tokio::sync::mpsc;
use tracing::warn;

use crate::frame::{Data, Frame};
use crate::snapshot::Snapshot;

/// Correlates a restore request with its completion.
pub type RestoreTicket = u64;

pub trait Surface: Send + Sync {
    /// The document currently shown.
    fn capture(&self) -> Snapshot;

    /// Record that the user changed the surface to `snapshot`.
    fn observe(&mut self, snapshot: Snapshot);

    /// Start replacing the surface contents with `snapshot`. Returns `false`
    /// when the request could not be handed to the surface; no completion
    /// for `ticket` will ever arrive and the surface keeps its old contents.
    fn restore(&mut self, snapshot: &Snapshot, ticket: RestoreTicket) -> bool;

    /// Blank the surface and return the empty document it now shows.
    fn clear(&mut self) -> Snapshot;
}

/// A browser canvas reached over the connection's outbound frame channel.
/// Keeps a mirror of the last document the client reported or was sent.
pub struct RemoteSurface {
    latest: Snapshot,
    outbound: mpsc::Sender<Frame>,
}

impl RemoteSurface {
    #[must_use]
    pub fn new(outbound: mpsc::Sender<Frame>) -> Self {
        Self { latest: Snapshot::empty(), outbound }
    }

    fn send(&self, frame: Frame) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "surface frame not delivered");
                false
            }
        }
    }
}

impl Surface for RemoteSurface {
    fn capture(&self) -> Snapshot {
        self.latest.clone()
    }

    fn observe(&mut self, snapshot: Snapshot) {
        self.latest = snapshot;
    }

    fn restore(&mut self, snapshot: &Snapshot, ticket: RestoreTicket) -> bool {
        let mut data = Data::new();
        data.insert("snapshot".into(), snapshot.doc().clone());
        data.insert("ticket".into(), ticket.into());
        if !self.send(Frame::request("surface:restore", data)) {
            return false;
        }
        self.latest = snapshot.clone();
        true
    }

    fn clear(&mut self) -> Snapshot {
        self.latest = Snapshot::empty();
        self.send(Frame::request("surface:clear", Data::new()));
        self.latest.clone()
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    pub struct SurfaceLog {
        pub restores: Vec<(Snapshot, RestoreTicket)>,
        pub clears: usize,
        /// Refuse restores, as a disconnected or saturated client would.
        pub reject_restores: bool,
    }

    /// In-process surface that records every restore and clear.
    pub struct RecordingSurface {
        latest: Snapshot,
        log: Arc<Mutex<SurfaceLog>>,
    }

    impl RecordingSurface {
        #[must_use]
        pub fn new() -> (Self, Arc<Mutex<SurfaceLog>>) {
            let log = Arc::new(Mutex::new(SurfaceLog::default()));
            (Self { latest: Snapshot::empty(), log: log.clone() }, log)
        }
    }

    impl Surface for RecordingSurface {
        fn capture(&self) -> Snapshot {
            self.latest.clone()
        }

        fn observe(&mut self, snapshot: Snapshot) {
            self.latest = snapshot;
        }

        fn restore(&mut self, snapshot: &Snapshot, ticket: RestoreTicket) -> bool {
            let mut log = self.log.lock().unwrap();
            if log.reject_restores {
                return false;
            }
            log.restores.push((snapshot.clone(), ticket));
            self.latest = snapshot.clone();
            true
        }

        fn clear(&mut self) -> Snapshot {
            self.latest = Snapshot::empty();
            self.log.lock().unwrap().clears += 1;
            self.latest.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn restore_sends_frame_and_updates_mirror() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut surface = RemoteSurface::new(tx);
        let snap = Snapshot::new(json!({"objects": ["rect"]}));

        assert!(surface.restore(&snap, 7));

        assert!(surface.capture().same(&snap));
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.syscall, "surface:restore");
        assert_eq!(frame.data_u64("ticket"), Some(7));
        assert_eq!(frame.data.get("snapshot"), Some(snap.doc()));
    }

    #[test]
    fn undeliverable_restore_keeps_mirror() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut surface = RemoteSurface::new(tx);
        let shown = Snapshot::new(json!({"objects": ["circle"]}));
        assert!(surface.restore(&shown, 1));

        assert!(!surface.restore(&Snapshot::new(json!({"objects": []})), 2));

        assert!(surface.capture().same(&shown));
        assert_eq!(rx.try_recv().unwrap().data_u64("ticket"), Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clear_sends_frame_and_returns_empty() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut surface = RemoteSurface::new(tx);
        surface.observe(Snapshot::new(json!({"objects": [1]})));

        let blank = surface.clear();

        assert!(blank.is_empty_doc());
        assert!(surface.capture().same(&blank));
        assert_eq!(rx.try_recv().unwrap().syscall, "surface:clear");
    }

    #[test]
    fn observe_replaces_mirror_without_sending() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut surface = RemoteSurface::new(tx);
        let snap = Snapshot::new(json!({"objects": [2]}));
        surface.observe(snap.clone());
        assert!(surface.capture().same(&snap));
        assert!(rx.try_recv().is_err());
    }
}
