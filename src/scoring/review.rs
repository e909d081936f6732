use crate::config::ReviewBonusConfig;
use crate::{round2, ReviewAggregate};

/// Rating bonus with Bayesian shrinkage toward a neutral prior: the average
/// rating is blended with `prior_rating` at `prior_weight` pseudo-reviews, so
/// a single five-star review moves the score far less than fifty of them.
/// Ratings below the prior produce a negative bonus.
#[derive(Debug, Clone)]
pub struct ReviewScorer {
    config: ReviewBonusConfig,
}

impl ReviewScorer {
    pub fn new(config: ReviewBonusConfig) -> Self {
        Self { config }
    }

    pub fn bonus(&self, reviews: &ReviewAggregate) -> f64 {
        if reviews.review_count == 0 {
            return 0.0;
        }

        let count = reviews.review_count as f64;
        let shrunk = (self.config.prior_weight * self.config.prior_rating
            + count * reviews.average_rating)
            / (self.config.prior_weight + count);

        round2((shrunk - self.config.prior_rating) * self.config.scale)
    }
}
