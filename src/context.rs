use std::sync::Arc;

use crate::config::AppConfig;
use crate::transport::Transport;

/// Shared handles constructed once in `main` and passed to every
/// operation. There is no process-wide singleton; tests build their own
/// context around a simulated transport.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub transport: Arc<dyn Transport>,
}

impl AppContext {
    pub fn new(config: AppConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }
}
