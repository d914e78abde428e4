//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds only process-wide collaborators: the persistence gateway and the
//! parsed config. Per-connection state (board set, history, tool selection)
//! lives in the `Whiteboard` owned by each websocket task.

use std::sync::Arc;

use crate::config::Config;
use crate::gateway::PersistenceGateway;

/// Clone is required by Axum; all fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn PersistenceGateway>,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(gateway: Arc<dyn PersistenceGateway>, config: Config) -> Self {
        Self { gateway, config: Arc::new(config) }
    }
}
