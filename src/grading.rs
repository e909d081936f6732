use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::GradingConfig;
use crate::error::FeedError;
use crate::store::FeedStore;
use crate::{round2, Grade, MarketBucket, Post, PostId};

/// Score cutoffs from the last curve computed for a bucket. `coarse` marks a
/// bucket too small for percentiles, graded as an above/below-median split.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GradeThresholds {
    pub a_cutoff: f64,
    pub b_cutoff: f64,
    pub c_cutoff: f64,
    pub sample_size: usize,
    pub coarse: bool,
}

impl GradeThresholds {
    pub fn grade_for(&self, final_score: f64) -> Grade {
        if self.coarse {
            if final_score >= self.b_cutoff {
                Grade::B
            } else {
                Grade::C
            }
        } else if final_score >= self.a_cutoff {
            Grade::A
        } else if final_score >= self.b_cutoff {
            Grade::B
        } else if final_score >= self.c_cutoff {
            Grade::C
        } else {
            Grade::D
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GradeBand {
    pub count: usize,
    pub avg_score: f64,
    pub min_score: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeDistribution {
    pub bucket: MarketBucket,
    pub total_posts: usize,
    pub grades: BTreeMap<Grade, GradeBand>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostGradeInfo {
    pub post_id: PostId,
    pub final_score: f64,
    pub grade: Grade,
    pub bucket: Option<MarketBucket>,
    pub market_rank: usize,
    pub market_total: usize,
    pub market_percentile: u32,
}

/// Grades posts on a curve against peers in the same market bucket, so a
/// small campus's best post and a large campus's best post land in the same
/// tier despite raw scores orders of magnitude apart.
pub struct RelativeGradingService {
    store: Arc<FeedStore>,
    config: GradingConfig,
    thresholds: Mutex<HashMap<MarketBucket, GradeThresholds>>,
}

impl RelativeGradingService {
    pub fn new(store: Arc<FeedStore>, config: GradingConfig) -> Self {
        Self {
            store,
            config,
            thresholds: Mutex::new(HashMap::new()),
        }
    }

    /// Builds the curve for a bucket from a snapshot of its final scores,
    /// then re-grades every post in the bucket. Top `a_percentile` of the
    /// field earns an A, and so on down.
    pub fn curve(&self, posts: &[&Post]) -> Option<GradeThresholds> {
        if posts.is_empty() {
            return None;
        }

        let mut scores: Vec<f64> = posts.iter().map(|p| p.scores.final_score).collect();
        scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let n = scores.len();

        if n < self.config.min_posts_for_curve {
            let median = scores[n / 2];
            return Some(GradeThresholds {
                a_cutoff: f64::INFINITY,
                b_cutoff: median,
                c_cutoff: f64::NEG_INFINITY,
                sample_size: n,
                coarse: true,
            });
        }

        let cut = |fraction: f64| scores[((n as f64 * fraction) as usize).min(n - 1)];
        Some(GradeThresholds {
            a_cutoff: cut(self.config.a_percentile),
            b_cutoff: cut(self.config.b_percentile),
            c_cutoff: cut(self.config.c_percentile),
            sample_size: n,
            coarse: false,
        })
    }

    pub async fn calculate_market_grades(&self, bucket: MarketBucket) -> Result<usize, FeedError> {
        let posts = self.store.posts_snapshot().await;
        let in_bucket: Vec<&Post> = posts
            .iter()
            .filter(|p| p.is_active && p.market_bucket == Some(bucket))
            .collect();

        let Some(thresholds) = self.curve(&in_bucket) else {
            tracing::info!(bucket = bucket.label(), "no posts to grade");
            return Ok(0);
        };

        let mut graded = 0;
        for post in &in_bucket {
            let grade = thresholds.grade_for(post.scores.final_score);
            self.store.update_post(post.id, |p| p.grade = grade).await?;
            graded += 1;
        }

        if thresholds.coarse {
            tracing::warn!(
                bucket = bucket.label(),
                posts = thresholds.sample_size,
                "bucket below curve minimum, used median split"
            );
        } else {
            tracing::info!(
                bucket = bucket.label(),
                graded,
                a_cutoff = thresholds.a_cutoff,
                b_cutoff = thresholds.b_cutoff,
                c_cutoff = thresholds.c_cutoff,
                "market grades updated"
            );
        }

        let mut cache = self.thresholds.lock().await;
        cache.insert(bucket, thresholds);
        Ok(graded)
    }

    pub async fn recalculate_all_market_grades(
        &self,
    ) -> Result<HashMap<MarketBucket, usize>, FeedError> {
        let mut results = HashMap::new();
        for bucket in MarketBucket::ALL {
            let graded = self.calculate_market_grades(bucket).await?;
            results.insert(bucket, graded);
        }
        Ok(results)
    }

    /// Re-grade one post against its bucket's cached curve, rebuilding the
    /// curve when no batch has run yet. A post whose bucket cannot produce a
    /// curve stays ungraded rather than failing.
    pub async fn update_post_grade(&self, post_id: PostId) -> Result<Grade, FeedError> {
        let post = self
            .store
            .post(post_id)
            .await
            .ok_or_else(|| FeedError::not_found("post", post_id))?;

        let Some(bucket) = post.market_bucket else {
            return Ok(Grade::Ungraded);
        };

        let cached = {
            let cache = self.thresholds.lock().await;
            cache.get(&bucket).copied()
        };
        let thresholds = match cached {
            Some(thresholds) => thresholds,
            None => {
                self.calculate_market_grades(bucket).await?;
                let cache = self.thresholds.lock().await;
                match cache.get(&bucket).copied() {
                    Some(thresholds) => thresholds,
                    None => {
                        return Err(FeedError::InsufficientData { bucket, count: 0 });
                    }
                }
            }
        };

        let grade = thresholds.grade_for(post.scores.final_score);
        self.store.update_post(post_id, |p| p.grade = grade).await?;
        Ok(grade)
    }

    pub async fn get_market_grade_distribution(
        &self,
        bucket: MarketBucket,
    ) -> Result<GradeDistribution, FeedError> {
        let posts = self.store.posts_snapshot().await;
        let mut grades: BTreeMap<Grade, GradeBand> = BTreeMap::new();
        let mut total = 0;

        for post in posts
            .iter()
            .filter(|p| p.is_active && p.market_bucket == Some(bucket))
        {
            let band = grades.entry(post.grade).or_insert(GradeBand {
                count: 0,
                avg_score: 0.0,
                min_score: f64::MAX,
                max_score: f64::MIN,
            });
            band.count += 1;
            band.avg_score += post.scores.final_score;
            band.min_score = band.min_score.min(post.scores.final_score);
            band.max_score = band.max_score.max(post.scores.final_score);
            total += 1;
        }

        for band in grades.values_mut() {
            band.avg_score = round2(band.avg_score / band.count as f64);
        }

        Ok(GradeDistribution {
            bucket,
            total_posts: total,
            grades,
        })
    }

    pub async fn get_post_grade_info(&self, post_id: PostId) -> Result<PostGradeInfo, FeedError> {
        let post = self
            .store
            .post(post_id)
            .await
            .ok_or_else(|| FeedError::not_found("post", post_id))?;
        let posts = self.store.posts_snapshot().await;

        let peers: Vec<&Post> = posts
            .iter()
            .filter(|p| p.is_active && p.market_bucket.is_some() && p.market_bucket == post.market_bucket)
            .collect();
        let market_total = peers.len();
        // A post outside any bucket has no peers and no rank.
        let market_rank = if post.market_bucket.is_none() {
            0
        } else {
            peers
                .iter()
                .filter(|p| p.scores.final_score > post.scores.final_score)
                .count()
                + 1
        };
        let market_percentile = if market_total == 0 {
            0
        } else {
            ((market_rank as f64 / market_total as f64) * 100.0).round() as u32
        };

        Ok(PostGradeInfo {
            post_id,
            final_score: post.scores.final_score,
            grade: post.grade,
            bucket: post.market_bucket,
            market_rank,
            market_total,
            market_percentile,
        })
    }
}
