use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

use campus_feed::cache::FeedCache;
use campus_feed::feed::reshuffle::RecommendationKind;
use campus_feed::feed::ReshuffleTracker;
use campus_feed::store::FeedStore;
use campus_feed::{Category, DurationType, Grade, MainTab, Post, PostId};

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn sample_post(id: PostId, category: Category) -> Post {
    Post {
        id,
        user_id: 1,
        university_id: 1,
        category,
        duration: DurationType::OneTime,
        tags: Vec::new(),
        created_at: fixed_now() - Duration::days(2),
        expires_at: None,
        is_active: true,
        counters: Default::default(),
        scores: Default::default(),
        reviews: Default::default(),
        market_bucket: None,
        grade: Grade::Ungraded,
    }
}

fn fixture() -> (Arc<FeedStore>, ReshuffleTracker) {
    let store = Arc::new(FeedStore::new());
    let cache = Arc::new(FeedCache::new(300));
    let tracker = ReshuffleTracker::new(Arc::clone(&store), cache);
    (store, tracker)
}

#[tokio::test]
async fn exposure_moves_a_tab_from_fresh_to_exhausted() {
    let (store, tracker) = fixture();
    let now = fixed_now();
    let user = 42;

    for id in 1..=3 {
        store.upsert_post(sample_post(id, Category::Goods)).await;
    }

    let fresh = tracker
        .check_reshuffle_eligibility(user, MainTab::Combined, now)
        .await;
    assert!(!fresh.eligible);
    assert_eq!(fresh.remaining_posts, 3);

    tracker.record_served(user, MainTab::Combined, &[1, 2]).await;
    let partial = tracker
        .check_reshuffle_eligibility(user, MainTab::Combined, now)
        .await;
    assert!(!partial.eligible);
    assert_eq!(partial.seen_posts, 2);
    assert_eq!(partial.remaining_posts, 1);

    tracker.record_served(user, MainTab::Combined, &[3]).await;
    let exhausted = tracker
        .check_reshuffle_eligibility(user, MainTab::Combined, now)
        .await;
    assert!(exhausted.eligible);
    assert_eq!(exhausted.remaining_posts, 0);
}

#[tokio::test]
async fn empty_tab_is_never_eligible() {
    let (_store, tracker) = fixture();
    let eligibility = tracker
        .check_reshuffle_eligibility(1, MainTab::Events, fixed_now())
        .await;
    assert!(!eligibility.eligible);
    assert_eq!(eligibility.total_posts, 0);
}

#[tokio::test]
async fn recording_the_same_post_twice_adds_nothing() {
    let (store, tracker) = fixture();
    let user = 42;
    store.upsert_post(sample_post(1, Category::Goods)).await;

    let first = tracker.record_served(user, MainTab::Combined, &[1]).await;
    let second = tracker.record_served(user, MainTab::Combined, &[1]).await;

    assert_eq!(first, 1);
    assert_eq!(second, 0);
}

#[tokio::test]
async fn a_new_post_reopens_an_exhausted_tab() {
    let (store, tracker) = fixture();
    let now = fixed_now();
    let user = 42;

    store.upsert_post(sample_post(1, Category::Goods)).await;
    tracker.record_served(user, MainTab::Combined, &[1]).await;
    assert!(
        tracker
            .check_reshuffle_eligibility(user, MainTab::Combined, now)
            .await
            .eligible
    );

    store.upsert_post(sample_post(2, Category::Goods)).await;
    let reopened = tracker
        .check_reshuffle_eligibility(user, MainTab::Combined, now)
        .await;
    assert!(!reopened.eligible);
    assert_eq!(reopened.remaining_posts, 1);
}

#[tokio::test]
async fn reshuffle_clears_exposure_for_every_tab() {
    let (store, tracker) = fixture();
    let now = fixed_now();
    let user = 42;

    store.upsert_post(sample_post(1, Category::Goods)).await;
    store.upsert_post(sample_post(2, Category::Events)).await;
    tracker.record_served(user, MainTab::Combined, &[1, 2]).await;
    tracker.record_served(user, MainTab::Events, &[2]).await;

    let cleared = tracker.reshuffle_all_posts(user).await;
    assert_eq!(cleared, 3);

    let combined = tracker
        .check_reshuffle_eligibility(user, MainTab::Combined, now)
        .await;
    assert_eq!(combined.seen_posts, 0);
    let events = tracker
        .check_reshuffle_eligibility(user, MainTab::Events, now)
        .await;
    assert_eq!(events.seen_posts, 0);
}

#[tokio::test]
async fn tag_reshuffle_only_clears_the_scoped_posts() {
    let (store, tracker) = fixture();
    let now = fixed_now();
    let user = 42;

    let mut housing = sample_post(1, Category::Housing);
    housing.tags = vec!["sublet".to_string()];
    store.upsert_post(housing).await;
    let mut books = sample_post(2, Category::Goods);
    books.tags = vec!["textbook".to_string()];
    store.upsert_post(books).await;

    tracker.record_served(user, MainTab::Combined, &[1, 2]).await;

    let cleared = tracker
        .reshuffle_tag_posts(user, MainTab::Combined, "leasing")
        .await
        .unwrap();
    assert_eq!(cleared, 1);

    let eligibility = tracker
        .check_reshuffle_eligibility(user, MainTab::Combined, now)
        .await;
    assert_eq!(eligibility.seen_posts, 1);
    assert_eq!(eligibility.remaining_posts, 1);
}

#[tokio::test]
async fn statistics_recommend_reshuffle_for_exhausted_tabs() {
    let (store, tracker) = fixture();
    let now = fixed_now();
    let user = 42;

    store.upsert_post(sample_post(1, Category::Events)).await;
    tracker.record_served(user, MainTab::Events, &[1]).await;

    let statistics = tracker.get_reshuffle_statistics(user, now).await;
    assert_eq!(statistics.user_id, user);
    assert_eq!(statistics.tabs.len(), 3);

    let events_rec = statistics
        .recommendations
        .iter()
        .find(|rec| rec.tab == MainTab::Events)
        .expect("exhausted events tab should be flagged");
    assert_eq!(events_rec.kind, RecommendationKind::Reshuffle);
}
