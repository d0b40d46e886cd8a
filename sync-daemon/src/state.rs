use std::sync::Arc;

use sync_core::prelude::*;
use tokio::sync::watch;

/// Shared application state, generic over the configured backend client —
/// the engine is constructed once in `main` and threaded through here,
/// never resolved behind a global.
#[derive(Clone)]
pub struct AppState<B: BackendClient + 'static> {
    pub config: Arc<Config>,
    pub engine: Arc<Engine<StoreGateway, B>>,
    pub last_cycle: Arc<tokio::sync::RwLock<Option<CycleReport>>>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl<B: BackendClient + 'static> AppState<B> {
    pub fn new(config: Arc<Config>, engine: Arc<Engine<StoreGateway, B>>, shutdown_tx: watch::Sender<bool>) -> Self {
        Self {
            config,
            engine,
            last_cycle: Arc::new(tokio::sync::RwLock::new(None)),
            shutdown_tx,
        }
    }
}
