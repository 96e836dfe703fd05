use std::sync::Arc;

use crate::config::Config;
use crate::queue::QueueService;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub queue: QueueService,
    pub config: Arc<Config>,
}
