//! Process-scoped cache handle
//!
//! For callers that cannot thread a manager through explicitly. The handle
//! has one initialization point, [`init`], and one teardown trigger,
//! [`teardown`], to be called at process or request end.

use cache_system::CacheManager;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::LmsCacheError;

static HANDLE: RwLock<Option<Arc<CacheManager>>> = RwLock::const_new(None);

/// Install the process-wide manager; fails if one is already installed
pub async fn init(manager: CacheManager) -> Result<Arc<CacheManager>, LmsCacheError> {
    let mut slot = HANDLE.write().await;
    if slot.is_some() {
        return Err(LmsCacheError::AlreadyInitialized);
    }

    let manager = Arc::new(manager);
    *slot = Some(manager.clone());
    tracing::debug!(driver = manager.get_driver_name(), "Global cache handle installed");
    Ok(manager)
}

/// The installed manager
pub async fn handle() -> Result<Arc<CacheManager>, LmsCacheError> {
    HANDLE
        .read()
        .await
        .clone()
        .ok_or(LmsCacheError::NotInitialized)
}

/// Remove the manager and release its driver. Returns false if nothing was installed.
pub async fn teardown() -> bool {
    let manager = HANDLE.write().await.take();
    match manager {
        Some(manager) => {
            manager.shutdown().await;
            true
        }
        None => false,
    }
}
