//! Source of published works for internal linking.

use async_trait::async_trait;

use articlesmith_shared::{PublishedWork, Result};
use articlesmith_storage::Storage;

/// Number of recent works considered as link targets.
pub const RECENT_WORKS_LIMIT: usize = 50;

/// Published works, newest first.
#[async_trait]
pub trait WorkCatalog: Send + Sync {
    async fn recent_works(&self, limit: usize) -> Result<Vec<PublishedWork>>;
}

#[async_trait]
impl WorkCatalog for Storage {
    async fn recent_works(&self, limit: usize) -> Result<Vec<PublishedWork>> {
        let limit = u32::try_from(limit).unwrap_or(u32::MAX);
        self.recent_published_works(limit).await
    }
}

/// Fixed list, for callers without a store.
#[async_trait]
impl WorkCatalog for Vec<PublishedWork> {
    async fn recent_works(&self, limit: usize) -> Result<Vec<PublishedWork>> {
        let mut works = self.clone();
        works.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        works.truncate(limit);
        Ok(works)
    }
}
