use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Per-interaction weights for the engagement base score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementWeights {
    pub message: f64,
    pub share: f64,
    pub bookmark: f64,
    pub repost: f64,
    pub view: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            message: 4.0,
            repost: 3.0,
            share: 2.0,
            bookmark: 1.0,
            view: 0.0,
        }
    }
}

/// Stepped urgency ladder keyed on hours until expiry. Each window's bonus
/// must be >= the next wider window's so the curve stays monotone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrgencyConfig {
    pub today_window_hours: i64,
    pub soon_window_hours: i64,
    pub week_window_hours: i64,
    pub today_bonus: f64,
    pub soon_bonus: f64,
    pub week_bonus: f64,
}

impl Default for UrgencyConfig {
    fn default() -> Self {
        Self {
            today_window_hours: 6,
            soon_window_hours: 24,
            week_window_hours: 168,
            today_bonus: 20.0,
            soon_bonus: 15.0,
            week_bonus: 13.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewBonusConfig {
    pub prior_rating: f64,
    pub prior_weight: f64,
    pub scale: f64,
}

impl Default for ReviewBonusConfig {
    fn default() -> Self {
        Self {
            prior_rating: 3.0,
            prior_weight: 10.0,
            scale: 2.0,
        }
    }
}

/// Active-user cutoffs for market buckets: below `medium` is small, below
/// `large` is medium, below `massive` is large, everything above is massive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketThresholds {
    pub medium: u64,
    pub large: u64,
    pub massive: u64,
}

impl Default for MarketThresholds {
    fn default() -> Self {
        Self {
            medium: 10_000,
            large: 50_000,
            massive: 500_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Fraction of the bucket (from the top) that earns each grade cutoff.
    pub a_percentile: f64,
    pub b_percentile: f64,
    pub c_percentile: f64,
    pub min_posts_for_curve: usize,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            a_percentile: 0.2,
            b_percentile: 0.5,
            c_percentile: 0.8,
            min_posts_for_curve: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPolicy {
    pub new_post_boost_hours: i64,
    pub fresh_boost_multiplier: f64,
    pub new_post_multiplier: f64,
    pub high_engagement_threshold: f64,
    pub cache_ttl_secs: u64,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            new_post_boost_hours: 24,
            fresh_boost_multiplier: 1.3,
            new_post_multiplier: 1.2,
            high_engagement_threshold: 5.0,
            cache_ttl_secs: 300,
            default_limit: 20,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    pub engagement: EngagementWeights,
    pub urgency: UrgencyConfig,
    pub review: ReviewBonusConfig,
    pub market: MarketThresholds,
    pub grading: GradingConfig,
    pub feed: FeedPolicy,
}

impl FeedConfig {
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>), String> {
        let config_path = path.or_else(default_config_path);
        let mut config = if let Some(path) = config_path.as_ref() {
            if path.exists() {
                let contents = std::fs::read_to_string(path)
                    .map_err(|err| format!("failed to read config: {}", err))?;
                toml::from_str(&contents)
                    .map_err(|err| format!("failed to parse config: {}", err))?
            } else {
                FeedConfig::default()
            }
        } else {
            FeedConfig::default()
        };

        config.apply_env_overrides();
        Ok((config, config_path))
    }

    pub fn write(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create config dir: {}", err))?;
        }
        let payload = toml::to_string_pretty(self)
            .map_err(|err| format!("failed to serialize config: {}", err))?;
        std::fs::write(path, payload).map_err(|err| format!("failed to write config: {}", err))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(ttl) = env::var("FEED_CACHE_TTL_SECS") {
            if let Ok(value) = ttl.parse::<u64>() {
                self.feed.cache_ttl_secs = value;
            }
        }
        if let Ok(hours) = env::var("FEED_NEW_POST_BOOST_HOURS") {
            if let Ok(value) = hours.parse::<i64>() {
                self.feed.new_post_boost_hours = value;
            }
        }
        if let Ok(limit) = env::var("FEED_MAX_LIMIT") {
            if let Ok(value) = limit.parse::<usize>() {
                self.feed.max_limit = value;
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    env::var("FEED_CONFIG_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/feed.toml")))
}
