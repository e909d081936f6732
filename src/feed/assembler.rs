use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::FeedCache;
use crate::config::FeedPolicy;
use crate::error::FeedError;
use crate::feed::filter::FeedFilter;
use crate::feed::reshuffle::ReshuffleTracker;
use crate::store::FeedStore;
use crate::{round2, DurationType, Grade, Interaction, Post, PostId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Organized,
    Tabbed,
    Personalized,
    Smart,
}

impl FeedMode {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "organized" => Some(FeedMode::Organized),
            "tabbed" => Some(FeedMode::Tabbed),
            "personalized" => Some(FeedMode::Personalized),
            "smart" => Some(FeedMode::Smart),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FeedMode::Organized => "organized",
            FeedMode::Tabbed => "tabbed",
            FeedMode::Personalized => "personalized",
            FeedMode::Smart => "smart",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub mode: FeedMode,
    pub page: usize,
    pub limit: usize,
    pub filter: FeedFilter,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Personalization {
    pub fresh_content_boost: bool,
    pub new_post_boost: bool,
    pub interaction_recency_bonus: f64,
    pub personalized_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedPost {
    pub post_id: PostId,
    pub final_score: f64,
    pub base_score: f64,
    pub time_urgency_bonus: f64,
    pub review_score_bonus: f64,
    pub grade: Grade,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalization: Option<Personalization>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub posts: Vec<RankedPost>,
    pub pagination: Pagination,
}

/// Assembles ranked pages for every feed mode. Filtering happens before
/// ranking, so excluded posts never count toward pagination totals; an empty
/// match is an empty page, not an error.
pub struct FeedAssembler {
    store: Arc<FeedStore>,
    cache: Arc<FeedCache>,
    tracker: Arc<ReshuffleTracker>,
    policy: FeedPolicy,
}

impl FeedAssembler {
    pub fn new(
        store: Arc<FeedStore>,
        cache: Arc<FeedCache>,
        tracker: Arc<ReshuffleTracker>,
        policy: FeedPolicy,
    ) -> Self {
        Self {
            store,
            cache,
            tracker,
            policy,
        }
    }

    pub async fn assemble(&self, query: &FeedQuery, now: DateTime<Utc>) -> Result<FeedPage, FeedError> {
        let page = query.page.max(1);
        let limit = query.limit.clamp(1, self.policy.max_limit);

        // Personalized pages mutate exposure state as they are served, so
        // only the stateless modes are cacheable.
        let cache_key = if query.mode == FeedMode::Personalized {
            None
        } else {
            Some(cache_key(query, page, limit))
        };
        if let Some(key) = cache_key.as_ref() {
            if let Some(cached) = self.cache.get(key).await {
                return Ok(cached);
            }
        }

        let posts = self.store.posts_snapshot().await;
        let mut candidates: Vec<Post> = posts
            .into_iter()
            .filter(|p| p.is_servable(now) && query.filter.matches(p))
            .collect();

        let result = match query.mode {
            FeedMode::Organized => {
                rank_organized(&mut candidates, &self.policy);
                self.paginate(&candidates, page, limit)
            }
            FeedMode::Tabbed => {
                rank_tabbed(&mut candidates, &self.policy, now);
                self.paginate(&candidates, page, limit)
            }
            FeedMode::Smart => {
                rank_smart(&mut candidates);
                self.paginate(&candidates, page, limit)
            }
            FeedMode::Personalized => {
                let user_id = query
                    .user_id
                    .ok_or_else(|| FeedError::invalid_scope("user", "missing for personalized feed"))?;
                self.assemble_personalized(candidates, user_id, query, page, limit, now)
                    .await?
            }
        };

        if let Some(key) = cache_key {
            self.cache.put(key, query.user_id, result.clone()).await;
        }
        Ok(result)
    }

    async fn assemble_personalized(
        &self,
        candidates: Vec<Post>,
        user_id: UserId,
        query: &FeedQuery,
        page: usize,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<FeedPage, FeedError> {
        let candidate_ids: Vec<PostId> = candidates.iter().map(|p| p.id).collect();
        let unseen = self
            .tracker
            .unseen_posts(user_id, query.filter.main_tab, &candidate_ids)
            .await;

        // Once the scope is exhausted the full set comes back into play;
        // otherwise only posts the user has not been served yet.
        let exhausted = unseen.is_empty();
        let mut pool: Vec<Post> = if exhausted {
            candidates
        } else {
            candidates
                .into_iter()
                .filter(|p| unseen.contains(&p.id))
                .collect()
        };

        rank_tabbed(&mut pool, &self.policy, now);

        let history = self.store.user_interaction_history(user_id).await;
        let last_interaction = last_interaction_by_post(&history);

        // The exposure set is the cursor while unseen posts remain: each
        // request serves the head of the shrinking pool, so walking page
        // numbers never skips over unseen posts. Offsets only apply once the
        // scope is exhausted and the pool is stable again.
        let effective_page = if exhausted { page } else { 1 };
        let mut result = self.paginate(&pool, effective_page, limit);
        result.pagination.page = page;
        for row in result.posts.iter_mut() {
            let post = pool.iter().find(|p| p.id == row.post_id);
            if let Some(post) = post {
                row.personalization = Some(personalize(
                    post,
                    last_interaction.get(&post.id).copied(),
                    &self.policy,
                    now,
                ));
            }
        }

        let served: Vec<PostId> = result.posts.iter().map(|row| row.post_id).collect();
        self.tracker
            .record_served(user_id, query.filter.main_tab, &served)
            .await;

        Ok(result)
    }

    fn paginate(&self, ranked: &[Post], page: usize, limit: usize) -> FeedPage {
        let total = ranked.len();
        let offset = (page - 1) * limit;
        let posts = ranked
            .iter()
            .skip(offset)
            .take(limit)
            .map(|post| RankedPost {
                post_id: post.id,
                final_score: post.scores.final_score,
                base_score: post.scores.base_score,
                time_urgency_bonus: post.scores.time_urgency_bonus,
                review_score_bonus: post.scores.review_score_bonus,
                grade: post.grade,
                personalization: None,
            })
            .collect();

        FeedPage {
            posts,
            pagination: Pagination {
                page,
                limit,
                total,
                has_more: offset + limit < total,
            },
        }
    }
}

fn cache_key(query: &FeedQuery, page: usize, limit: usize) -> String {
    let filter = &query.filter;
    format!(
        "feed:{}:{}:{}:{}:{}:{}:{}",
        query.mode.label(),
        filter.main_tab.label(),
        filter
            .categories
            .iter()
            .map(|c| c.label())
            .collect::<Vec<_>>()
            .join("+"),
        filter.tags.join("+"),
        filter.university_id.map(|id| id.to_string()).unwrap_or_default(),
        page,
        limit,
    )
}

/// Four-tier ladder: high-engagement recurring posts lead, then events, then
/// the remaining recurring posts, then everything else; score-ordered inside
/// each tier.
pub fn rank_organized(posts: &mut [Post], policy: &FeedPolicy) {
    let threshold = policy.high_engagement_threshold;
    posts.sort_by(|a, b| {
        organized_tier(a, threshold)
            .cmp(&organized_tier(b, threshold))
            .then_with(|| by_score_then_recency(a, b))
    });
}

fn organized_tier(post: &Post, threshold: f64) -> u8 {
    match post.duration {
        DurationType::Recurring if post.scores.base_score >= threshold => 0,
        DurationType::Event => 1,
        DurationType::Recurring => 2,
        _ => 3,
    }
}

/// Posts inside the new-post window sort first regardless of score; the rest
/// follow by final score, ties to the newer post.
pub fn rank_tabbed(posts: &mut [Post], policy: &FeedPolicy, now: DateTime<Utc>) {
    let window = Duration::hours(policy.new_post_boost_hours);
    posts.sort_by(|a, b| {
        let a_new = now - a.created_at <= window;
        let b_new = now - b.created_at <= window;
        b_new
            .cmp(&a_new)
            .then_with(|| by_score_then_recency(a, b))
    });
}

/// Score first, urgency breaking score ties, then recency.
pub fn rank_smart(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        compare_f64(b.scores.final_score, a.scores.final_score)
            .then_with(|| compare_f64(b.scores.time_urgency_bonus, a.scores.time_urgency_bonus))
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

fn by_score_then_recency(a: &Post, b: &Post) -> Ordering {
    compare_f64(b.scores.final_score, a.scores.final_score)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn last_interaction_by_post(history: &[Interaction]) -> HashMap<PostId, DateTime<Utc>> {
    let mut latest = HashMap::new();
    for interaction in history {
        latest
            .entry(interaction.post_id)
            .and_modify(|at: &mut DateTime<Utc>| {
                if interaction.created_at > *at {
                    *at = interaction.created_at;
                }
            })
            .or_insert(interaction.created_at);
    }
    latest
}

fn personalize(
    post: &Post,
    last_interaction: Option<DateTime<Utc>>,
    policy: &FeedPolicy,
    now: DateTime<Utc>,
) -> Personalization {
    let fresh_content_boost = last_interaction.is_none();
    let interaction_recency_bonus = match last_interaction {
        Some(at) => {
            let days = (now - at).num_seconds() as f64 / 86_400.0;
            if days <= 1.0 {
                0.1
            } else if days <= 7.0 {
                0.05
            } else if days <= 30.0 {
                0.02
            } else {
                0.0
            }
        }
        None => 0.0,
    };
    let new_post_boost = now - post.created_at <= Duration::hours(policy.new_post_boost_hours);

    let mut score = post.scores.final_score;
    if fresh_content_boost {
        score *= policy.fresh_boost_multiplier;
    }
    score += interaction_recency_bonus;
    if new_post_boost {
        score *= policy.new_post_multiplier;
    }

    Personalization {
        fresh_content_boost,
        new_post_boost,
        interaction_recency_bonus,
        personalized_score: round2(score),
    }
}
