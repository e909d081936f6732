use chrono::{DateTime, Utc};

use crate::config::UrgencyConfig;
use crate::round2;

/// Stepped bonus over remaining time to expiry. Tighter windows pay more, so
/// the bonus never decreases as expiry approaches; posts without an expiry,
/// or expiring beyond the widest window, get nothing. Already-expired posts
/// get nothing either (feeds drop them outright).
#[derive(Debug, Clone)]
pub struct UrgencyScorer {
    config: UrgencyConfig,
}

impl UrgencyScorer {
    pub fn new(config: UrgencyConfig) -> Self {
        Self { config }
    }

    pub fn bonus(&self, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let Some(expires_at) = expires_at else {
            return 0.0;
        };

        let remaining = expires_at - now;
        let hours_left = remaining.num_seconds() as f64 / 3600.0;

        if hours_left <= 0.0 {
            return 0.0;
        }

        let bonus = if hours_left <= self.config.today_window_hours as f64 {
            self.config.today_bonus
        } else if hours_left <= self.config.soon_window_hours as f64 {
            self.config.soon_bonus
        } else if hours_left <= self.config.week_window_hours as f64 {
            self.config.week_bonus
        } else {
            0.0
        };

        round2(bonus)
    }
}
