use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::{net::SocketAddr, sync::Arc};

use crate::api::{
    ClearedResponse, ErrorBody, FeedQueryParams, IngestPostRequest, IngestUniversityRequest,
    InteractionAction, InteractionRequest, ReshuffleAllRequest, ReshuffleTagRequest,
    ReviewAggregateRequest, UpdatedResponse, UserTabParams,
};
use campus_feed::cache::FeedCache;
use campus_feed::config::FeedConfig;
use campus_feed::engagement::EngagementStore;
use campus_feed::feed::{FeedAssembler, ReshuffleTracker};
use campus_feed::grading::RelativeGradingService;
use campus_feed::market::MarketSizeClassifier;
use campus_feed::scoring::ScoringEngine;
use campus_feed::store::FeedStore;
use campus_feed::{FeedError, MainTab, MarketBucket, PostId, UniversityId};

#[derive(Clone)]
struct AppState {
    store: Arc<FeedStore>,
    config: FeedConfig,
    engine: ScoringEngine,
    engagement: Arc<EngagementStore>,
    classifier: Arc<MarketSizeClassifier>,
    grading: Arc<RelativeGradingService>,
    tracker: Arc<ReshuffleTracker>,
    assembler: Arc<FeedAssembler>,
}

pub async fn serve(args: crate::ServeArgs, config: FeedConfig) -> Result<(), String> {
    let store = match &args.seed {
        Some(path) => Arc::new(FeedStore::load_seed(path).await?),
        None => Arc::new(FeedStore::new()),
    };

    let cache = Arc::new(FeedCache::new(config.feed.cache_ttl_secs));
    let engine = ScoringEngine::new(&config);
    let engagement = Arc::new(EngagementStore::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        engine.clone(),
    ));
    let classifier = Arc::new(MarketSizeClassifier::new(
        Arc::clone(&store),
        config.market.clone(),
    ));
    let grading = Arc::new(RelativeGradingService::new(
        Arc::clone(&store),
        config.grading.clone(),
    ));
    let tracker = Arc::new(ReshuffleTracker::new(
        Arc::clone(&store),
        Arc::clone(&cache),
    ));
    let assembler = Arc::new(FeedAssembler::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        Arc::clone(&tracker),
        config.feed.clone(),
    ));

    if args.seed.is_some() {
        bootstrap(&store, &engine, &classifier, &grading)
            .await
            .map_err(|err| format!("seed bootstrap failed: {}", err))?;
    }

    let state = AppState {
        store,
        config,
        engine,
        engagement,
        classifier,
        grading,
        tracker,
        assembler,
    };

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/posts", post(ingest_post))
        .route("/api/posts/:id/engagement", get(get_engagement))
        .route("/api/posts/:id/interactions/:user_id", get(get_user_interactions))
        .route("/api/universities", post(ingest_university))
        .route("/api/reviews", post(ingest_review))
        .route("/api/interactions", post(handle_interaction))
        .route("/api/feed", get(get_feed))
        .route("/api/grading/distribution/:bucket", get(grade_distribution))
        .route("/api/grading/posts/:id", get(post_grade_info))
        .route("/api/grading/recalculate", post(recalculate_grades))
        .route("/api/grading/recalculate/:bucket", post(recalculate_bucket_grades))
        .route("/api/market-size/update", post(update_market_sizes))
        .route("/api/market-size/propagate", post(propagate_market_sizes))
        .route("/api/market-size/:university_id", get(get_market_size))
        .route("/api/reshuffle/eligibility", get(reshuffle_eligibility))
        .route("/api/reshuffle/statistics", get(reshuffle_statistics))
        .route("/api/reshuffle/all", post(reshuffle_all))
        .route("/api/reshuffle/tag", post(reshuffle_tag))
        .route("/api/scoring/stats", get(scoring_stats))
        .route("/api/scoring/recalculate", post(recalculate_scores))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|err| format!("invalid bind address: {}", err))?;

    tracing::info!(%addr, "feed service listening");

    axum::serve(
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| format!("failed to bind server: {}", err))?,
        app,
    )
    .await
    .map_err(|err| format!("server error: {}", err))?;

    Ok(())
}

/// Full batch pipeline over a freshly seeded store: market sizes first (grades
/// depend on buckets), then scores, then curves.
async fn bootstrap(
    store: &FeedStore,
    engine: &ScoringEngine,
    classifier: &MarketSizeClassifier,
    grading: &RelativeGradingService,
) -> Result<(), FeedError> {
    classifier.update_all_market_sizes().await?;
    classifier.update_post_market_sizes().await?;
    engine.recalculate_all_scores(store, Utc::now()).await?;
    grading.recalculate_all_market_grades().await?;
    Ok(())
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error_response(err: FeedError) -> ApiError {
    let status = match &err {
        FeedError::NotFound { .. } => StatusCode::NOT_FOUND,
        FeedError::InvalidScope { .. } => StatusCode::BAD_REQUEST,
        FeedError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FeedError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let body = ErrorBody {
        error: err.to_string(),
        retryable: err.is_retryable(),
    };
    (status, Json(body))
}

fn parse_bucket(value: &str) -> Result<MarketBucket, ApiError> {
    MarketBucket::from_str(value)
        .ok_or_else(|| error_response(FeedError::invalid_scope("market bucket", value)))
}

fn parse_tab(value: &str) -> Result<MainTab, ApiError> {
    MainTab::from_str(value)
        .ok_or_else(|| error_response(FeedError::invalid_scope("main tab", value)))
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn ingest_post(
    State(state): State<AppState>,
    Json(request): Json<IngestPostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let mut post = request.into_post(now).map_err(error_response)?;

    // Denormalize the campus bucket at ingest so grading never needs a join.
    post.market_bucket = state
        .classifier
        .get_university_market_size(post.university_id)
        .await
        .ok()
        .map(|info| info.bucket);

    let id = post.id;
    state.store.upsert_post(post).await;
    let scores = state
        .engine
        .update_post_scores(&state.store, id, now)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(scores)))
}

async fn ingest_university(
    State(state): State<AppState>,
    Json(request): Json<IngestUniversityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut university = request.into_university();
    university.market_bucket = Some(state.classifier.classify(university.active_user_count));
    let bucket = university.market_bucket;
    state.store.upsert_university(university).await;
    Ok((StatusCode::CREATED, Json(bucket)))
}

async fn ingest_review(
    State(state): State<AppState>,
    Json(request): Json<ReviewAggregateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .update_post(request.post_id, |post| {
            post.reviews.review_count = request.review_count;
            post.reviews.average_rating = request.average_rating;
        })
        .await
        .map_err(error_response)?;

    let scores = state
        .engine
        .update_post_scores(&state.store, request.post_id, Utc::now())
        .await
        .map_err(error_response)?;

    Ok(Json(scores))
}

async fn handle_interaction(
    State(state): State<AppState>,
    Json(request): Json<InteractionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (kind, action) = request.parsed().map_err(error_response)?;
    let now = Utc::now();

    match action {
        InteractionAction::Add => {
            let outcome = state
                .engagement
                .record_interaction(request.post_id, request.user_id, kind, now)
                .await
                .map_err(error_response)?;
            Ok(Json(serde_json::to_value(outcome).unwrap_or_default()))
        }
        InteractionAction::Remove => {
            let outcome = state
                .engagement
                .remove_interaction(request.post_id, request.user_id, kind, now)
                .await
                .map_err(error_response)?;
            Ok(Json(serde_json::to_value(outcome).unwrap_or_default()))
        }
    }
}

async fn get_engagement(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse, ApiError> {
    let counters = state
        .engagement
        .get_engagement(id)
        .await
        .map_err(error_response)?;
    Ok(Json(counters))
}

async fn get_user_interactions(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(PostId, u64)>,
) -> Result<impl IntoResponse, ApiError> {
    let kinds = state
        .engagement
        .get_user_interactions(id, user_id)
        .await
        .map_err(error_response)?;
    let labels: Vec<&'static str> = kinds.into_iter().map(|k| k.label()).collect();
    Ok(Json(labels))
}

async fn get_feed(
    State(state): State<AppState>,
    Query(params): Query<FeedQueryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params
        .into_query(state.config.feed.default_limit)
        .map_err(error_response)?;
    let page = state
        .assembler
        .assemble(&query, Utc::now())
        .await
        .map_err(error_response)?;
    Ok(Json(page))
}

async fn grade_distribution(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bucket = parse_bucket(&bucket)?;
    let distribution = state
        .grading
        .get_market_grade_distribution(bucket)
        .await
        .map_err(error_response)?;
    Ok(Json(distribution))
}

async fn post_grade_info(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<impl IntoResponse, ApiError> {
    let info = state
        .grading
        .get_post_grade_info(id)
        .await
        .map_err(error_response)?;
    Ok(Json(info))
}

async fn recalculate_grades(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let results = state
        .grading
        .recalculate_all_market_grades()
        .await
        .map_err(error_response)?;
    let by_bucket: std::collections::BTreeMap<&'static str, usize> = results
        .into_iter()
        .map(|(bucket, graded)| (bucket.label(), graded))
        .collect();
    Ok(Json(by_bucket))
}

async fn recalculate_bucket_grades(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bucket = parse_bucket(&bucket)?;
    let graded = state
        .grading
        .calculate_market_grades(bucket)
        .await
        .map_err(error_response)?;
    Ok(Json(UpdatedResponse { updated: graded }))
}

async fn get_market_size(
    State(state): State<AppState>,
    Path(university_id): Path<UniversityId>,
) -> Result<impl IntoResponse, ApiError> {
    let info = state
        .classifier
        .get_university_market_size(university_id)
        .await
        .map_err(error_response)?;
    Ok(Json(info))
}

async fn update_market_sizes(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .classifier
        .update_all_market_sizes()
        .await
        .map_err(error_response)?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn propagate_market_sizes(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .classifier
        .update_post_market_sizes()
        .await
        .map_err(error_response)?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn reshuffle_eligibility(
    State(state): State<AppState>,
    Query(params): Query<UserTabParams>,
) -> Result<impl IntoResponse, ApiError> {
    let tab = match params.main_tab.as_deref() {
        Some(value) => parse_tab(value)?,
        None => MainTab::Combined,
    };
    let eligibility = state
        .tracker
        .check_reshuffle_eligibility(params.user_id, tab, Utc::now())
        .await;
    Ok(Json(eligibility))
}

async fn reshuffle_statistics(
    State(state): State<AppState>,
    Query(params): Query<UserTabParams>,
) -> Result<impl IntoResponse, ApiError> {
    let statistics = state
        .tracker
        .get_reshuffle_statistics(params.user_id, Utc::now())
        .await;
    Ok(Json(statistics))
}

async fn reshuffle_all(
    State(state): State<AppState>,
    Json(request): Json<ReshuffleAllRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cleared = state.tracker.reshuffle_all_posts(request.user_id).await;
    Ok(Json(ClearedResponse { cleared }))
}

async fn reshuffle_tag(
    State(state): State<AppState>,
    Json(request): Json<ReshuffleTagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tab = parse_tab(&request.main_tab)?;
    let cleared = state
        .tracker
        .reshuffle_tag_posts(request.user_id, tab, &request.sub_tab)
        .await
        .map_err(error_response)?;
    Ok(Json(ClearedResponse { cleared }))
}

async fn scoring_stats(State(state): State<AppState>) -> impl IntoResponse {
    let posts = state.store.posts_snapshot().await;
    Json(state.engine.stats(&posts))
}

async fn recalculate_scores(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .engine
        .recalculate_all_scores(&state.store, Utc::now())
        .await
        .map_err(error_response)?;
    Ok(Json(UpdatedResponse { updated }))
}
