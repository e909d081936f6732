use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::FeedCache;
use crate::error::FeedError;
use crate::feed::filter::FeedFilter;
use crate::store::FeedStore;
use crate::{MainTab, PostId, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct ReshuffleEligibility {
    pub eligible: bool,
    pub total_posts: usize,
    pub seen_posts: usize,
    pub remaining_posts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabExposure {
    pub tab: MainTab,
    pub total_posts: usize,
    pub seen_posts: usize,
    pub remaining_posts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationKind {
    Reshuffle,
    LowRemaining,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReshuffleRecommendation {
    pub kind: RecommendationKind,
    pub tab: MainTab,
    pub remaining_posts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReshuffleStatistics {
    pub user_id: UserId,
    pub tabs: Vec<TabExposure>,
    pub recommendations: Vec<ReshuffleRecommendation>,
}

/// Tracks which posts each user has already been served per tab, decides
/// when a tab is exhausted, and resets exposure on demand so content can be
/// rediscovered.
pub struct ReshuffleTracker {
    store: Arc<FeedStore>,
    cache: Arc<FeedCache>,
}

impl ReshuffleTracker {
    pub fn new(store: Arc<FeedStore>, cache: Arc<FeedCache>) -> Self {
        Self { store, cache }
    }

    /// Eligibility is recomputed from live counts on every check, never
    /// cached as a flag: a post created after exhaustion makes the tab
    /// non-exhausted again.
    pub async fn check_reshuffle_eligibility(
        &self,
        user_id: UserId,
        tab: MainTab,
        now: DateTime<Utc>,
    ) -> ReshuffleEligibility {
        let exposure = self.exposure_for_tab(user_id, tab, now).await;
        ReshuffleEligibility {
            eligible: exposure.remaining_posts == 0 && exposure.total_posts > 0,
            total_posts: exposure.total_posts,
            seen_posts: exposure.seen_posts,
            remaining_posts: exposure.remaining_posts,
        }
    }

    pub async fn unseen_posts(
        &self,
        user_id: UserId,
        tab: MainTab,
        candidates: &[PostId],
    ) -> Vec<PostId> {
        let seen = self.store.exposure(user_id, tab).await;
        candidates
            .iter()
            .copied()
            .filter(|id| !seen.contains(id))
            .collect()
    }

    pub async fn record_served(&self, user_id: UserId, tab: MainTab, post_ids: &[PostId]) -> usize {
        self.store.record_exposure(user_id, tab, post_ids).await
    }

    pub async fn reshuffle_all_posts(&self, user_id: UserId) -> usize {
        let cleared = self.store.clear_exposure_all(user_id).await;
        self.cache.invalidate_user(user_id).await;
        tracing::info!(user_id, cleared, "reshuffled all tabs");
        cleared
    }

    /// Clears exposure for just the posts inside one tab/sub-tab scope.
    pub async fn reshuffle_tag_posts(
        &self,
        user_id: UserId,
        tab: MainTab,
        sub_tab: &str,
    ) -> Result<usize, FeedError> {
        let filter = FeedFilter::for_tab(tab).with_sub_tab(sub_tab)?;
        let posts = self.store.posts_snapshot().await;
        let scope: HashSet<PostId> = posts
            .iter()
            .filter(|p| p.is_active && filter.matches(p))
            .map(|p| p.id)
            .collect();

        let cleared = self.store.clear_exposure_posts(user_id, tab, &scope).await;
        self.cache.invalidate_user(user_id).await;
        tracing::info!(user_id, tab = tab.label(), sub_tab, cleared, "reshuffled tab scope");
        Ok(cleared)
    }

    pub async fn get_reshuffle_statistics(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> ReshuffleStatistics {
        let mut tabs = Vec::new();
        let mut recommendations = Vec::new();

        for tab in MainTab::ALL {
            let exposure = self.exposure_for_tab(user_id, tab, now).await;
            if exposure.total_posts > 0 {
                if exposure.remaining_posts == 0 {
                    recommendations.push(ReshuffleRecommendation {
                        kind: RecommendationKind::Reshuffle,
                        tab,
                        remaining_posts: 0,
                    });
                } else if exposure.remaining_posts < 10 {
                    recommendations.push(ReshuffleRecommendation {
                        kind: RecommendationKind::LowRemaining,
                        tab,
                        remaining_posts: exposure.remaining_posts,
                    });
                }
            }
            tabs.push(exposure);
        }

        ReshuffleStatistics {
            user_id,
            tabs,
            recommendations,
        }
    }

    async fn exposure_for_tab(&self, user_id: UserId, tab: MainTab, now: DateTime<Utc>) -> TabExposure {
        let posts = self.store.posts_snapshot().await;
        let scope: Vec<PostId> = posts
            .iter()
            .filter(|p| p.is_servable(now) && tab.includes(p.category))
            .map(|p| p.id)
            .collect();
        let seen = self.store.exposure(user_id, tab).await;
        let seen_posts = scope.iter().filter(|id| seen.contains(id)).count();

        TabExposure {
            tab,
            total_posts: scope.len(),
            seen_posts,
            remaining_posts: scope.len() - seen_posts,
        }
    }
}
