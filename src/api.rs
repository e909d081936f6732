use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use campus_feed::feed::{FeedFilter, FeedMode, FeedQuery};
use campus_feed::{
    Category, DurationType, FeedError, InteractionKind, MainTab, Post, PostId, University,
    UniversityId, UserId,
};

#[derive(Debug, Deserialize)]
pub struct IngestPostRequest {
    pub id: PostId,
    pub user_id: UserId,
    pub university_id: UniversityId,
    pub category: String,
    pub duration_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl IngestPostRequest {
    pub fn into_post(self, now: DateTime<Utc>) -> Result<Post, FeedError> {
        let category = Category::from_str(&self.category)
            .ok_or_else(|| FeedError::invalid_scope("category", &self.category))?;
        let duration = DurationType::from_str(&self.duration_type)
            .ok_or_else(|| FeedError::invalid_scope("duration type", &self.duration_type))?;

        Ok(Post {
            id: self.id,
            user_id: self.user_id,
            university_id: self.university_id,
            category,
            duration,
            tags: self.tags,
            created_at: self.created_at.unwrap_or(now),
            expires_at: self.expires_at,
            is_active: self.is_active.unwrap_or(true),
            counters: Default::default(),
            scores: Default::default(),
            reviews: Default::default(),
            market_bucket: None,
            grade: campus_feed::Grade::Ungraded,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct IngestUniversityRequest {
    pub id: UniversityId,
    pub name: String,
    #[serde(default)]
    pub active_user_count: u64,
}

impl IngestUniversityRequest {
    pub fn into_university(self) -> University {
        University {
            id: self.id,
            name: self.name,
            active_user_count: self.active_user_count,
            market_bucket: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewAggregateRequest {
    pub post_id: PostId,
    pub review_count: u32,
    pub average_rating: f64,
}

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub post_id: PostId,
    pub user_id: UserId,
    pub kind: String,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionAction {
    Add,
    Remove,
}

impl InteractionRequest {
    pub fn parsed(&self) -> Result<(InteractionKind, InteractionAction), FeedError> {
        let kind = InteractionKind::from_str(&self.kind)
            .ok_or_else(|| FeedError::invalid_scope("interaction kind", &self.kind))?;
        let action = match self.action.to_lowercase().as_str() {
            "add" => InteractionAction::Add,
            "remove" => InteractionAction::Remove,
            _ => return Err(FeedError::invalid_scope("action", &self.action)),
        };
        Ok((kind, action))
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedQueryParams {
    pub mode: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub main_tab: Option<String>,
    pub sub_tab: Option<String>,
    /// Comma-separated category names.
    pub categories: Option<String>,
    /// Comma-separated tag names.
    pub tags: Option<String>,
    pub university_id: Option<UniversityId>,
    pub user_id: Option<UserId>,
}

impl FeedQueryParams {
    pub fn into_query(self, default_limit: usize) -> Result<FeedQuery, FeedError> {
        let mode = match self.mode.as_deref() {
            Some(value) => {
                FeedMode::from_str(value).ok_or_else(|| FeedError::invalid_scope("feed mode", value))?
            }
            None => FeedMode::Tabbed,
        };

        let main_tab = match self.main_tab.as_deref() {
            Some(value) => {
                MainTab::from_str(value).ok_or_else(|| FeedError::invalid_scope("main tab", value))?
            }
            None => MainTab::Combined,
        };

        let mut filter = FeedFilter::for_tab(main_tab);
        if let Some(sub_tab) = self.sub_tab.as_deref() {
            filter = filter.with_sub_tab(sub_tab)?;
        }
        if let Some(categories) = self.categories.as_deref() {
            let mut parsed = Vec::new();
            for name in categories.split(',').filter(|s| !s.trim().is_empty()) {
                let category = Category::from_str(name.trim())
                    .ok_or_else(|| FeedError::invalid_scope("category", name.trim()))?;
                parsed.push(category);
            }
            filter = filter.with_categories(parsed);
        }
        if let Some(tags) = self.tags.as_deref() {
            let parsed: Vec<String> = tags
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            filter = filter.with_tags(parsed);
        }
        if let Some(university_id) = self.university_id {
            filter = filter.with_university(university_id);
        }

        Ok(FeedQuery {
            mode,
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(default_limit),
            filter,
            user_id: self.user_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReshuffleAllRequest {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct ReshuffleTagRequest {
    pub user_id: UserId,
    pub main_tab: String,
    pub sub_tab: String,
}

#[derive(Debug, Deserialize)]
pub struct UserTabParams {
    pub user_id: UserId,
    pub main_tab: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub retryable: bool,
}
