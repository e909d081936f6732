use chrono::{TimeZone, Utc};
use std::sync::Arc;

use campus_feed::config::MarketThresholds;
use campus_feed::market::MarketSizeClassifier;
use campus_feed::store::FeedStore;
use campus_feed::{
    Category, DurationType, FeedError, Grade, MarketBucket, Post, University, UniversityId,
};

fn university(id: UniversityId, active_user_count: u64) -> University {
    University {
        id,
        name: format!("Campus {}", id),
        active_user_count,
        market_bucket: None,
    }
}

fn post_at(id: u64, university_id: UniversityId) -> Post {
    Post {
        id,
        user_id: 1,
        university_id,
        category: Category::Goods,
        duration: DurationType::OneTime,
        tags: Vec::new(),
        created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        expires_at: None,
        is_active: true,
        counters: Default::default(),
        scores: Default::default(),
        reviews: Default::default(),
        market_bucket: None,
        grade: Grade::Ungraded,
    }
}

fn classifier(store: Arc<FeedStore>) -> MarketSizeClassifier {
    MarketSizeClassifier::new(store, MarketThresholds::default())
}

#[test]
fn classification_uses_fixed_cutoffs() {
    let classifier = classifier(Arc::new(FeedStore::new()));

    assert_eq!(classifier.classify(0), MarketBucket::Small);
    assert_eq!(classifier.classify(9_999), MarketBucket::Small);
    assert_eq!(classifier.classify(10_000), MarketBucket::Medium);
    assert_eq!(classifier.classify(49_999), MarketBucket::Medium);
    assert_eq!(classifier.classify(50_000), MarketBucket::Large);
    assert_eq!(classifier.classify(499_999), MarketBucket::Large);
    assert_eq!(classifier.classify(500_000), MarketBucket::Massive);
}

#[tokio::test]
async fn lookup_classifies_live_before_any_batch() {
    let store = Arc::new(FeedStore::new());
    store.upsert_university(university(1, 60_000)).await;

    let classifier = classifier(Arc::clone(&store));
    let info = classifier.get_university_market_size(1).await.unwrap();
    assert_eq!(info.bucket, MarketBucket::Large);
    assert_eq!(info.active_user_count, 60_000);
}

#[tokio::test]
async fn unknown_university_is_not_found() {
    let classifier = classifier(Arc::new(FeedStore::new()));
    let result = classifier.get_university_market_size(9).await;
    assert!(matches!(result, Err(FeedError::NotFound { .. })));
}

#[tokio::test]
async fn batch_update_persists_buckets_and_propagates_to_posts() {
    let store = Arc::new(FeedStore::new());
    store.upsert_university(university(1, 5_000)).await;
    store.upsert_university(university(2, 700_000)).await;
    store.upsert_post(post_at(10, 1)).await;
    store.upsert_post(post_at(11, 2)).await;

    let classifier = classifier(Arc::clone(&store));
    let universities = classifier.update_all_market_sizes().await.unwrap();
    assert_eq!(universities, 2);

    let posts = classifier.update_post_market_sizes().await.unwrap();
    assert_eq!(posts, 2);

    let small = store.post(10).await.unwrap();
    assert_eq!(small.market_bucket, Some(MarketBucket::Small));
    let massive = store.post(11).await.unwrap();
    assert_eq!(massive.market_bucket, Some(MarketBucket::Massive));

    // unchanged buckets are not rewritten on the next pass
    let second_pass = classifier.update_post_market_sizes().await.unwrap();
    assert_eq!(second_pass, 0);
}
