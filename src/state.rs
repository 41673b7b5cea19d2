//! # Shared Application State
//!
//! One instance lives for the life of the process and is cloned (cheaply, via `Arc`) into
//! every request handler. Holds the only pieces of mutable shared state (the registry) plus
//! the immutable collaborators every route needs.

use std::sync::Arc;

use crate::config::Config;
use crate::processor::SignalProcessor;
use crate::session::registry::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub processor: Arc<dyn SignalProcessor>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, processor: Arc<dyn SignalProcessor>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
            processor,
            http_client: reqwest::Client::new(),
        }
    }
}
