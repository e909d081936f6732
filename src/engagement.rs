use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::FeedCache;
use crate::error::FeedError;
use crate::scoring::ScoringEngine;
use crate::store::FeedStore;
use crate::{EngagementCounters, Interaction, InteractionKind, PostId, UserId};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RecordOutcome {
    pub success: bool,
    pub already_exists: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RemoveOutcome {
    pub success: bool,
    pub not_found: bool,
}

/// Interaction bookkeeping on top of the store: keeps per-post counters in
/// step with the interaction rows, rescoring the post and dropping stale
/// cached pages after every change.
pub struct EngagementStore {
    store: Arc<FeedStore>,
    cache: Arc<FeedCache>,
    engine: ScoringEngine,
}

impl EngagementStore {
    pub fn new(store: Arc<FeedStore>, cache: Arc<FeedCache>, engine: ScoringEngine) -> Self {
        Self {
            store,
            cache,
            engine,
        }
    }

    pub async fn record_interaction(
        &self,
        post_id: PostId,
        user_id: UserId,
        kind: InteractionKind,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, FeedError> {
        if self.store.post(post_id).await.is_none() {
            return Err(FeedError::not_found("post", post_id));
        }

        // Toggles are unique per (user, post, kind); a repeat is a no-op.
        if kind.is_toggle() && self.store.has_interaction(post_id, user_id, kind).await {
            return Ok(RecordOutcome {
                success: false,
                already_exists: true,
            });
        }

        self.store
            .insert_interaction(Interaction {
                post_id,
                user_id,
                kind,
                created_at: now,
            })
            .await;
        self.store
            .update_post(post_id, |post| bump_counter(&mut post.counters, kind, 1))
            .await?;
        self.engine.update_post_scores(&self.store, post_id, now).await?;
        self.cache.invalidate_post(post_id).await;

        Ok(RecordOutcome {
            success: true,
            already_exists: false,
        })
    }

    pub async fn remove_interaction(
        &self,
        post_id: PostId,
        user_id: UserId,
        kind: InteractionKind,
        now: DateTime<Utc>,
    ) -> Result<RemoveOutcome, FeedError> {
        if self.store.post(post_id).await.is_none() {
            return Err(FeedError::not_found("post", post_id));
        }

        // Cumulative kinds have no un-toggle; removing one that was never
        // toggled is an idempotent miss, not an error.
        if !kind.is_toggle() || !self.store.remove_interaction(post_id, user_id, kind).await {
            return Ok(RemoveOutcome {
                success: false,
                not_found: true,
            });
        }

        self.store
            .update_post(post_id, |post| bump_counter(&mut post.counters, kind, -1))
            .await?;
        self.engine.update_post_scores(&self.store, post_id, now).await?;
        self.cache.invalidate_post(post_id).await;

        Ok(RemoveOutcome {
            success: true,
            not_found: false,
        })
    }

    pub async fn get_engagement(&self, post_id: PostId) -> Result<EngagementCounters, FeedError> {
        self.store
            .post(post_id)
            .await
            .map(|post| post.counters)
            .ok_or_else(|| FeedError::not_found("post", post_id))
    }

    pub async fn get_user_interactions(
        &self,
        post_id: PostId,
        user_id: UserId,
    ) -> Result<HashSet<InteractionKind>, FeedError> {
        if self.store.post(post_id).await.is_none() {
            return Err(FeedError::not_found("post", post_id));
        }
        Ok(self.store.user_interactions(post_id, user_id).await)
    }
}

fn bump_counter(counters: &mut EngagementCounters, kind: InteractionKind, delta: i32) {
    let slot = match kind {
        InteractionKind::Message => &mut counters.message_count,
        InteractionKind::Share => &mut counters.share_count,
        InteractionKind::Bookmark => &mut counters.bookmark_count,
        InteractionKind::Repost => &mut counters.repost_count,
        InteractionKind::View => &mut counters.view_count,
    };
    *slot = slot.saturating_add_signed(delta);
}
