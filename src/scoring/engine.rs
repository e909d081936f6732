use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::scoring::{BaseScorer, ReviewScorer, UrgencyScorer};
use crate::store::FeedStore;
use crate::{round2, Post, PostId, PostScores};

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    base: BaseScorer,
    urgency: UrgencyScorer,
    review: ReviewScorer,
}

impl ScoringEngine {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            base: BaseScorer::new(config.engagement.clone()),
            urgency: UrgencyScorer::new(config.urgency.clone()),
            review: ReviewScorer::new(config.review.clone()),
        }
    }

    /// Pure given the post's current counters, expiry, and review aggregates:
    /// two calls with no intervening state change produce identical scores.
    pub fn compute(&self, post: &Post, now: DateTime<Utc>) -> PostScores {
        let base_score = self.base.score(&post.counters);
        let time_urgency_bonus = self.urgency.bonus(post.expires_at, now);
        let review_score_bonus = self.review.bonus(&post.reviews);

        PostScores {
            base_score,
            time_urgency_bonus,
            review_score_bonus,
            final_score: round2(base_score + time_urgency_bonus + review_score_bonus),
        }
    }

    /// Recompute and persist one post's score fields. Concurrent calls for
    /// the same post are last-write-wins; each write is internally consistent
    /// because the whole compute runs against one read of the post.
    pub async fn update_post_scores(
        &self,
        store: &FeedStore,
        post_id: PostId,
        now: DateTime<Utc>,
    ) -> Result<PostScores, FeedError> {
        let post = store
            .post(post_id)
            .await
            .ok_or_else(|| FeedError::not_found("post", post_id))?;
        let scores = self.compute(&post, now);
        store.update_post(post_id, |post| post.scores = scores).await?;
        Ok(scores)
    }

    /// Batch pass over every active post; also how urgency decays as the
    /// clock advances between interactions.
    pub async fn recalculate_all_scores(
        &self,
        store: &FeedStore,
        now: DateTime<Utc>,
    ) -> Result<usize, FeedError> {
        let posts = store.posts_snapshot().await;
        let mut updated = 0;
        for post in posts.iter().filter(|p| p.is_active) {
            self.update_post_scores(store, post.id, now).await?;
            updated += 1;
        }
        tracing::info!(updated, "score recalculation complete");
        Ok(updated)
    }

    pub fn stats(&self, posts: &[Post]) -> ScoringStats {
        let active: Vec<&Post> = posts.iter().filter(|p| p.is_active).collect();
        if active.is_empty() {
            return ScoringStats::default();
        }

        let count = active.len() as f64;
        let mut stats = ScoringStats {
            total_posts: active.len(),
            min_score: f64::MAX,
            max_score: f64::MIN,
            ..ScoringStats::default()
        };

        for post in &active {
            stats.avg_base_score += post.scores.base_score;
            stats.avg_urgency_bonus += post.scores.time_urgency_bonus;
            stats.avg_review_bonus += post.scores.review_score_bonus;
            stats.avg_final_score += post.scores.final_score;
            stats.min_score = stats.min_score.min(post.scores.final_score);
            stats.max_score = stats.max_score.max(post.scores.final_score);
        }

        stats.avg_base_score = round2(stats.avg_base_score / count);
        stats.avg_urgency_bonus = round2(stats.avg_urgency_bonus / count);
        stats.avg_review_bonus = round2(stats.avg_review_bonus / count);
        stats.avg_final_score = round2(stats.avg_final_score / count);
        stats
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoringStats {
    pub total_posts: usize,
    pub avg_base_score: f64,
    pub avg_urgency_bonus: f64,
    pub avg_review_bonus: f64,
    pub avg_final_score: f64,
    pub min_score: f64,
    pub max_score: f64,
}
