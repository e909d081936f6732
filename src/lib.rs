pub mod cache;
pub mod config;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod grading;
pub mod market;
pub mod scoring;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::FeedError;

pub type PostId = u64;
pub type UserId = u64;
pub type UniversityId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Goods,
    Services,
    Housing,
    Events,
}

impl Category {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "goods" => Some(Category::Goods),
            "services" => Some(Category::Services),
            "housing" => Some(Category::Housing),
            "events" => Some(Category::Events),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Goods => "goods",
            Category::Services => "services",
            Category::Housing => "housing",
            Category::Events => "events",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DurationType {
    OneTime,
    Recurring,
    Event,
}

impl DurationType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "one-time" | "onetime" => Some(DurationType::OneTime),
            "recurring" => Some(DurationType::Recurring),
            "event" => Some(DurationType::Event),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DurationType::OneTime => "one-time",
            DurationType::Recurring => "recurring",
            DurationType::Event => "event",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Message,
    Share,
    Bookmark,
    Repost,
    View,
}

impl InteractionKind {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "message" => Some(InteractionKind::Message),
            "share" => Some(InteractionKind::Share),
            "bookmark" => Some(InteractionKind::Bookmark),
            "repost" => Some(InteractionKind::Repost),
            "view" => Some(InteractionKind::View),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InteractionKind::Message => "message",
            InteractionKind::Share => "share",
            InteractionKind::Bookmark => "bookmark",
            InteractionKind::Repost => "repost",
            InteractionKind::View => "view",
        }
    }

    /// Bookmarks and reposts toggle on and off; the rest only accumulate.
    pub fn is_toggle(self) -> bool {
        matches!(self, InteractionKind::Bookmark | InteractionKind::Repost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketBucket {
    Small,
    Medium,
    Large,
    Massive,
}

impl MarketBucket {
    pub const ALL: [MarketBucket; 4] = [
        MarketBucket::Small,
        MarketBucket::Medium,
        MarketBucket::Large,
        MarketBucket::Massive,
    ];

    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "small" => Some(MarketBucket::Small),
            "medium" => Some(MarketBucket::Medium),
            "large" => Some(MarketBucket::Large),
            "massive" => Some(MarketBucket::Massive),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MarketBucket::Small => "small",
            MarketBucket::Medium => "medium",
            MarketBucket::Large => "large",
            MarketBucket::Massive => "massive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    Ungraded,
}

impl Grade {
    pub fn label(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::Ungraded => "ungraded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MainTab {
    Combined,
    GoodsServices,
    Events,
}

impl MainTab {
    pub const ALL: [MainTab; 3] = [MainTab::Combined, MainTab::GoodsServices, MainTab::Events];

    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "combined" | "all" => Some(MainTab::Combined),
            "goods-services" => Some(MainTab::GoodsServices),
            "events" => Some(MainTab::Events),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MainTab::Combined => "combined",
            MainTab::GoodsServices => "goods-services",
            MainTab::Events => "events",
        }
    }

    pub fn includes(self, category: Category) -> bool {
        match self {
            MainTab::Combined => true,
            MainTab::GoodsServices => category != Category::Events,
            MainTab::Events => category == Category::Events,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub message_count: u32,
    pub share_count: u32,
    pub bookmark_count: u32,
    pub repost_count: u32,
    pub view_count: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PostScores {
    pub base_score: f64,
    pub time_urgency_bonus: f64,
    pub review_score_bonus: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReviewAggregate {
    pub review_count: u32,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub university_id: UniversityId,
    pub category: Category,
    pub duration: DurationType,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub counters: EngagementCounters,
    #[serde(default)]
    pub scores: PostScores,
    #[serde(default)]
    pub reviews: ReviewAggregate,
    #[serde(default)]
    pub market_bucket: Option<MarketBucket>,
    #[serde(default = "default_grade")]
    pub grade: Grade,
}

impl Post {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Active and not past expiry; the only posts feeds ever serve.
    pub fn is_servable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct University {
    pub id: UniversityId,
    pub name: String,
    #[serde(default)]
    pub active_user_count: u64,
    #[serde(default)]
    pub market_bucket: Option<MarketBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub post_id: PostId,
    pub user_id: UserId,
    pub kind: InteractionKind,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_grade() -> Grade {
    Grade::Ungraded
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
