use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::feed::FeedPage;
use crate::{PostId, UserId};

struct Entry {
    inserted_at: Instant,
    user_id: Option<UserId>,
    page: FeedPage,
}

/// Advisory page cache. Entries expire after a short TTL and are dropped
/// eagerly whenever a contained post's engagement changes, so staleness is
/// bounded by the TTL and never outlives an interaction.
pub struct FeedCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl FeedCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<FeedPage> {
        let guard = self.entries.lock().await;
        let entry = guard.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.page.clone())
    }

    pub async fn put(&self, key: String, user_id: Option<UserId>, page: FeedPage) {
        let mut guard = self.entries.lock().await;
        guard.retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        guard.insert(
            key,
            Entry {
                inserted_at: Instant::now(),
                user_id,
                page,
            },
        );
    }

    pub async fn invalidate_post(&self, post_id: PostId) {
        let mut guard = self.entries.lock().await;
        guard.retain(|_, entry| !entry.page.posts.iter().any(|row| row.post_id == post_id));
    }

    pub async fn invalidate_user(&self, user_id: UserId) {
        let mut guard = self.entries.lock().await;
        guard.retain(|_, entry| entry.user_id != Some(user_id));
    }

    pub async fn len(&self) -> usize {
        let guard = self.entries.lock().await;
        guard.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
