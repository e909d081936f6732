use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

use campus_feed::cache::FeedCache;
use campus_feed::config::{FeedConfig, FeedPolicy};
use campus_feed::feed::{
    rank_organized, rank_smart, rank_tabbed, sub_tab_tags, FeedAssembler, FeedFilter, FeedMode,
    FeedQuery, ReshuffleTracker,
};
use campus_feed::store::FeedStore;
use campus_feed::{Category, DurationType, FeedError, Grade, MainTab, Post, PostId};

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn sample_post(id: PostId, category: Category, duration: DurationType) -> Post {
    Post {
        id,
        user_id: 1,
        university_id: 1,
        category,
        duration,
        tags: Vec::new(),
        created_at: fixed_now() - Duration::days(10),
        expires_at: None,
        is_active: true,
        counters: Default::default(),
        scores: Default::default(),
        reviews: Default::default(),
        market_bucket: None,
        grade: Grade::Ungraded,
    }
}

fn scored(mut post: Post, base: f64, final_score: f64) -> Post {
    post.scores.base_score = base;
    post.scores.final_score = final_score;
    post
}

#[test]
fn organized_feed_orders_by_tier_then_score() {
    let policy = FeedPolicy::default();
    let mut posts = vec![
        scored(sample_post(1, Category::Goods, DurationType::OneTime), 2.0, 2.0),
        scored(sample_post(2, Category::Services, DurationType::Recurring), 1.0, 1.0),
        scored(sample_post(3, Category::Events, DurationType::Event), 3.0, 3.0),
        scored(sample_post(4, Category::Services, DurationType::Recurring), 8.0, 8.0),
    ];

    rank_organized(&mut posts, &policy);

    let order: Vec<PostId> = posts.iter().map(|p| p.id).collect();
    // high-engagement recurring, event, low recurring, one-time
    assert_eq!(order, vec![4, 3, 2, 1]);
}

#[test]
fn tabbed_feed_boosts_posts_inside_new_window() {
    let policy = FeedPolicy::default();
    let now = fixed_now();

    let old_high = scored(sample_post(1, Category::Goods, DurationType::OneTime), 50.0, 50.0);
    let mut fresh_low = scored(sample_post(2, Category::Goods, DurationType::OneTime), 1.0, 1.0);
    fresh_low.created_at = now - Duration::hours(2);

    let mut posts = vec![old_high, fresh_low];
    rank_tabbed(&mut posts, &policy, now);

    assert_eq!(posts[0].id, 2, "fresh post leads regardless of score");
    assert_eq!(posts[1].id, 1);
}

#[test]
fn tabbed_feed_breaks_score_ties_toward_newer_post() {
    let policy = FeedPolicy::default();
    let now = fixed_now();

    let mut older = scored(sample_post(1, Category::Goods, DurationType::OneTime), 5.0, 5.0);
    older.created_at = now - Duration::days(8);
    let mut newer = scored(sample_post(2, Category::Goods, DurationType::OneTime), 5.0, 5.0);
    newer.created_at = now - Duration::days(6);

    let mut posts = vec![older, newer];
    rank_tabbed(&mut posts, &policy, now);

    assert_eq!(posts[0].id, 2);
}

#[test]
fn smart_feed_uses_urgency_to_break_score_ties() {
    let mut urgent = scored(sample_post(1, Category::Goods, DurationType::OneTime), 5.0, 5.0);
    urgent.scores.time_urgency_bonus = 15.0;
    let calm = scored(sample_post(2, Category::Goods, DurationType::OneTime), 5.0, 5.0);

    let mut posts = vec![calm, urgent];
    rank_smart(&mut posts);

    assert_eq!(posts[0].id, 1);
}

#[test]
fn sub_tab_expands_to_its_tag_group() {
    let tags = sub_tab_tags("leasing").unwrap();
    assert!(tags.contains(&"sublet"));

    let filter = FeedFilter::for_tab(MainTab::Combined)
        .with_sub_tab("leasing")
        .unwrap();

    let mut post = sample_post(1, Category::Housing, DurationType::OneTime);
    post.tags = vec!["roommate".to_string()];
    assert!(filter.matches(&post));

    let mut other = sample_post(2, Category::Goods, DurationType::OneTime);
    other.tags = vec!["textbook".to_string()];
    assert!(!filter.matches(&other));
}

#[test]
fn all_sub_tab_leaves_filter_unchanged() {
    let filter = FeedFilter::for_tab(MainTab::Combined).with_sub_tab("all").unwrap();
    assert!(filter.tags.is_empty());
}

#[test]
fn unknown_sub_tab_is_a_scope_error() {
    let result = FeedFilter::for_tab(MainTab::Combined).with_sub_tab("crypto");
    assert!(matches!(result, Err(FeedError::InvalidScope { .. })));
}

#[test]
fn filter_applies_every_scope_as_conjunction() {
    let filter = FeedFilter::for_tab(MainTab::GoodsServices)
        .with_categories(vec![Category::Goods])
        .with_university(7);

    let mut matching = sample_post(1, Category::Goods, DurationType::OneTime);
    matching.university_id = 7;
    assert!(filter.matches(&matching));

    let mut wrong_campus = matching.clone();
    wrong_campus.university_id = 8;
    assert!(!filter.matches(&wrong_campus));

    let event = sample_post(2, Category::Events, DurationType::Event);
    assert!(!filter.matches(&event));
}

#[test]
fn events_tab_excludes_marketplace_posts() {
    let filter = FeedFilter::for_tab(MainTab::Events);
    assert!(!filter.matches(&sample_post(1, Category::Goods, DurationType::OneTime)));
    assert!(filter.matches(&sample_post(2, Category::Events, DurationType::Event)));
}

fn assembler_fixture() -> (Arc<FeedStore>, Arc<FeedCache>, FeedAssembler) {
    assembler_fixture_with_ttl(FeedPolicy::default().cache_ttl_secs)
}

fn assembler_fixture_with_ttl(ttl_secs: u64) -> (Arc<FeedStore>, Arc<FeedCache>, FeedAssembler) {
    let config = FeedConfig::default();
    let store = Arc::new(FeedStore::new());
    let cache = Arc::new(FeedCache::new(ttl_secs));
    let tracker = Arc::new(ReshuffleTracker::new(Arc::clone(&store), Arc::clone(&cache)));
    let assembler = FeedAssembler::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        tracker,
        config.feed,
    );
    (store, cache, assembler)
}

fn smart_query(page: usize, limit: usize) -> FeedQuery {
    FeedQuery {
        mode: FeedMode::Smart,
        page,
        limit,
        filter: FeedFilter::for_tab(MainTab::Combined),
        user_id: None,
    }
}

#[tokio::test]
async fn pagination_counts_only_filtered_candidates() {
    let (store, _cache, assembler) = assembler_fixture();
    let now = fixed_now();

    for id in 1..=5 {
        let post = scored(
            sample_post(id, Category::Goods, DurationType::OneTime),
            id as f64,
            id as f64,
        );
        store.upsert_post(post).await;
    }
    // inactive and expired posts never count toward totals
    let mut inactive = sample_post(6, Category::Goods, DurationType::OneTime);
    inactive.is_active = false;
    store.upsert_post(inactive).await;
    let mut expired = sample_post(7, Category::Goods, DurationType::OneTime);
    expired.expires_at = Some(now - Duration::hours(1));
    store.upsert_post(expired).await;

    let page = assembler.assemble(&smart_query(2, 2), now).await.unwrap();
    assert_eq!(page.pagination.total, 5);
    assert_eq!(page.posts.len(), 2);
    assert!(page.pagination.has_more);
    // smart mode is score-descending: page 2 of limit 2 is scores 3 and 2
    assert_eq!(page.posts[0].post_id, 3);
    assert_eq!(page.posts[1].post_id, 2);

    let last = assembler.assemble(&smart_query(3, 2), now).await.unwrap();
    assert_eq!(last.posts.len(), 1);
    assert!(!last.pagination.has_more);
}

#[tokio::test]
async fn empty_match_is_an_empty_page_not_an_error() {
    let (store, _cache, assembler) = assembler_fixture();
    store
        .upsert_post(sample_post(1, Category::Goods, DurationType::OneTime))
        .await;

    let mut query = smart_query(1, 10);
    query.filter = query.filter.with_tags(vec!["nonexistent".to_string()]);

    let page = assembler.assemble(&query, fixed_now()).await.unwrap();
    assert!(page.posts.is_empty());
    assert_eq!(page.pagination.total, 0);
    assert!(!page.pagination.has_more);
}

#[tokio::test]
async fn personalized_mode_requires_a_user() {
    let (_store, _cache, assembler) = assembler_fixture();

    let mut query = smart_query(1, 10);
    query.mode = FeedMode::Personalized;

    let result = assembler.assemble(&query, fixed_now()).await;
    assert!(matches!(result, Err(FeedError::InvalidScope { .. })));
}

#[tokio::test]
async fn limit_is_clamped_to_policy_maximum() {
    let (store, _cache, assembler) = assembler_fixture();
    for id in 1..=3 {
        store
            .upsert_post(sample_post(id, Category::Goods, DurationType::OneTime))
            .await;
    }

    let page = assembler.assemble(&smart_query(1, 10_000), fixed_now()).await.unwrap();
    assert_eq!(page.pagination.limit, FeedPolicy::default().max_limit);
}

#[tokio::test]
async fn cached_pages_are_served_until_the_post_is_invalidated() {
    let (store, cache, assembler) = assembler_fixture();
    let now = fixed_now();

    store
        .upsert_post(scored(sample_post(1, Category::Goods, DurationType::OneTime), 1.0, 1.0))
        .await;
    store
        .upsert_post(scored(sample_post(2, Category::Goods, DurationType::OneTime), 2.0, 2.0))
        .await;

    assert!(cache.is_empty().await);
    let first = assembler.assemble(&smart_query(1, 10), now).await.unwrap();
    assert_eq!(first.posts[0].post_id, 2);
    assert_eq!(cache.len().await, 1);

    // a write that bypasses invalidation is invisible while the entry lives
    store
        .upsert_post(scored(sample_post(1, Category::Goods, DurationType::OneTime), 50.0, 50.0))
        .await;
    let stale = assembler.assemble(&smart_query(1, 10), now).await.unwrap();
    assert_eq!(stale.posts[0].post_id, 2);

    cache.invalidate_post(1).await;
    let fresh = assembler.assemble(&smart_query(1, 10), now).await.unwrap();
    assert_eq!(fresh.posts[0].post_id, 1);
    assert_eq!(fresh.posts[0].final_score, 50.0);
}

#[tokio::test]
async fn expired_cache_entries_are_recomputed() {
    let (store, _cache, assembler) = assembler_fixture_with_ttl(0);
    let now = fixed_now();

    store
        .upsert_post(scored(sample_post(1, Category::Goods, DurationType::OneTime), 1.0, 1.0))
        .await;
    let first = assembler.assemble(&smart_query(1, 10), now).await.unwrap();
    assert_eq!(first.posts[0].final_score, 1.0);

    store
        .upsert_post(scored(sample_post(1, Category::Goods, DurationType::OneTime), 9.0, 9.0))
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let second = assembler.assemble(&smart_query(1, 10), now).await.unwrap();
    assert_eq!(second.posts[0].final_score, 9.0);
}

#[tokio::test]
async fn personalized_pages_walk_the_unseen_pool_without_skipping() {
    let (store, _cache, assembler) = assembler_fixture();
    let now = fixed_now();
    let user = 7;

    for id in 1..=3 {
        let score = 4.0 - id as f64;
        store
            .upsert_post(scored(
                sample_post(id, Category::Goods, DurationType::OneTime),
                score,
                score,
            ))
            .await;
    }

    let mut served = Vec::new();
    for page in 1..=3 {
        let query = FeedQuery {
            mode: FeedMode::Personalized,
            page,
            limit: 1,
            filter: FeedFilter::for_tab(MainTab::Combined),
            user_id: Some(user),
        };
        let result = assembler.assemble(&query, now).await.unwrap();
        assert_eq!(result.pagination.page, page);
        assert_eq!(result.posts.len(), 1);
        served.push(result.posts[0].post_id);
    }

    // the exposure set advances the feed, so no unseen post is ever skipped
    assert_eq!(served, vec![1, 2, 3]);
}
