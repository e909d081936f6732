use crate::config::EngagementWeights;
use crate::{round2, EngagementCounters};

/// Weighted sum over the engagement counters. Messages signal direct intent
/// and carry the most weight; bookmarks are personal interest and carry the
/// least.
#[derive(Debug, Clone)]
pub struct BaseScorer {
    weights: EngagementWeights,
}

impl BaseScorer {
    pub fn new(weights: EngagementWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, counters: &EngagementCounters) -> f64 {
        let mut score = 0.0;

        score += counters.message_count as f64 * self.weights.message;
        score += counters.repost_count as f64 * self.weights.repost;
        score += counters.share_count as f64 * self.weights.share;
        score += counters.bookmark_count as f64 * self.weights.bookmark;
        score += counters.view_count as f64 * self.weights.view;

        round2(score)
    }
}
