pub mod base;
pub mod engine;
pub mod review;
pub mod urgency;

pub use base::BaseScorer;
pub use engine::{ScoringEngine, ScoringStats};
pub use review::ReviewScorer;
pub use urgency::UrgencyScorer;
