use serde::Serialize;
use std::sync::Arc;

use crate::config::MarketThresholds;
use crate::error::FeedError;
use crate::store::FeedStore;
use crate::{MarketBucket, UniversityId};

#[derive(Debug, Clone, Serialize)]
pub struct MarketSizeInfo {
    pub university_id: UniversityId,
    pub bucket: MarketBucket,
    pub active_user_count: u64,
}

/// Buckets universities by active-user population. Cutoffs are configuration,
/// not derived; a campus with zero active users is simply a small market.
pub struct MarketSizeClassifier {
    store: Arc<FeedStore>,
    thresholds: MarketThresholds,
}

impl MarketSizeClassifier {
    pub fn new(store: Arc<FeedStore>, thresholds: MarketThresholds) -> Self {
        Self { store, thresholds }
    }

    pub fn classify(&self, active_user_count: u64) -> MarketBucket {
        if active_user_count < self.thresholds.medium {
            MarketBucket::Small
        } else if active_user_count < self.thresholds.large {
            MarketBucket::Medium
        } else if active_user_count < self.thresholds.massive {
            MarketBucket::Large
        } else {
            MarketBucket::Massive
        }
    }

    pub async fn get_university_market_size(
        &self,
        university_id: UniversityId,
    ) -> Result<MarketSizeInfo, FeedError> {
        let university = self
            .store
            .university(university_id)
            .await
            .ok_or_else(|| FeedError::not_found("university", university_id))?;

        // Prefer the persisted bucket; fall back to a live classification
        // when no batch has run yet.
        let bucket = university
            .market_bucket
            .unwrap_or_else(|| self.classify(university.active_user_count));

        Ok(MarketSizeInfo {
            university_id,
            bucket,
            active_user_count: university.active_user_count,
        })
    }

    /// Classify every university and persist the bucket.
    pub async fn update_all_market_sizes(&self) -> Result<usize, FeedError> {
        let universities = self.store.universities_snapshot().await;
        let mut updated = 0;

        for university in universities {
            let bucket = self.classify(university.active_user_count);
            self.store
                .update_university(university.id, |u| u.market_bucket = Some(bucket))
                .await?;
            tracing::info!(
                university = %university.name,
                bucket = bucket.label(),
                users = university.active_user_count,
                "classified market"
            );
            updated += 1;
        }

        Ok(updated)
    }

    /// Denormalize each post's university bucket onto the post record so
    /// grading never joins at read time. Bucket changes only reach posts on
    /// the next run of this propagation.
    pub async fn update_post_market_sizes(&self) -> Result<usize, FeedError> {
        let universities = self.store.universities_snapshot().await;
        let posts = self.store.posts_snapshot().await;
        let mut updated = 0;

        for post in posts.iter().filter(|p| p.is_active) {
            let bucket = universities
                .iter()
                .find(|u| u.id == post.university_id)
                .and_then(|u| u.market_bucket);
            let Some(bucket) = bucket else {
                continue;
            };
            if post.market_bucket != Some(bucket) {
                self.store
                    .update_post(post.id, |p| p.market_bucket = Some(bucket))
                    .await?;
                updated += 1;
            }
        }

        tracing::info!(updated, "propagated market buckets to posts");
        Ok(updated)
    }
}
