pub mod key;
pub mod ranked;
pub mod store;

use std::sync::Arc;

use tracing::info;

pub use key::{QueueKey, QueueKind};
pub use ranked::RankedSet;
pub use store::{MemoryQueueStore, QueueStore};

use crate::config::QueueStoreConfig;
use crate::error::ConfigError;

/// Opens the queue store named by the configured address.
pub fn open_queue_store(config: &QueueStoreConfig) -> Result<Arc<dyn QueueStore>, ConfigError> {
    let scheme = config.url.split("://").next().unwrap_or_default();
    match scheme {
        "memory" => {
            info!(url = %config.url, "opening in-memory queue store");
            Ok(Arc::new(MemoryQueueStore::new()))
        }
        _ => Err(ConfigError::UnsupportedQueueStore(config.url.clone())),
    }
}
