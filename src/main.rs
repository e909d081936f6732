mod api;
mod server;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use campus_feed::config::FeedConfig;
use campus_feed::grading::RelativeGradingService;
use campus_feed::market::MarketSizeClassifier;
use campus_feed::scoring::ScoringEngine;
use campus_feed::store::FeedStore;
use campus_feed::{MarketBucket, round2};

#[derive(Parser)]
#[command(name = "campus-feed", about = "Campus marketplace feed scoring service")]
struct Cli {
    /// Path to a feed.toml; falls back to FEED_CONFIG_PATH, then config/feed.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Recompute base, urgency, and review scores for every active post.
    Rescore(BatchArgs),
    /// Rebuild the grading curves and regrade posts.
    Regrade(RegradeArgs),
    /// Classify universities into market buckets and propagate onto posts.
    MarketSizes(BatchArgs),
    /// Print scoring and grading statistics for a seed.
    Stats(BatchArgs),
    /// Write the active configuration out as a TOML file.
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct InitConfigArgs {
    #[arg(long, default_value = "config/feed.toml")]
    path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, default_value_t = 8788)]
    pub port: u16,
    /// Optional JSON seed loaded and fully scored before serving.
    #[arg(long)]
    pub seed: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct BatchArgs {
    /// JSON seed file with universities, posts, and interactions.
    #[arg(long)]
    seed: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct RegradeArgs {
    #[arg(long)]
    seed: PathBuf,
    /// Limit the regrade to one bucket (small | medium | large | massive).
    #[arg(long)]
    bucket: Option<String>,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let (config, _path) = FeedConfig::load(cli.config)?;

    match cli.command {
        Command::Serve(args) => server::serve(args, config).await,
        Command::Rescore(args) => run_rescore(&args.seed, config).await,
        Command::Regrade(args) => run_regrade(args, config).await,
        Command::MarketSizes(args) => run_market_sizes(&args.seed, config).await,
        Command::Stats(args) => run_stats(&args.seed, config).await,
        Command::InitConfig(args) => run_init_config(&args.path, &config),
    }
}

fn run_init_config(path: &Path, config: &FeedConfig) -> Result<(), String> {
    config.write(path)?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

async fn run_rescore(seed: &Path, config: FeedConfig) -> Result<(), String> {
    let store = FeedStore::load_seed(seed).await?;
    let engine = ScoringEngine::new(&config);
    let updated = engine
        .recalculate_all_scores(&store, Utc::now())
        .await
        .map_err(|err| err.to_string())?;
    println!("Rescored {} posts", updated);

    let stats = engine.stats(&store.posts_snapshot().await);
    println!(
        "Average scores: base {} | urgency {} | review {} | final {}",
        stats.avg_base_score, stats.avg_urgency_bonus, stats.avg_review_bonus, stats.avg_final_score
    );
    Ok(())
}

async fn run_regrade(args: RegradeArgs, config: FeedConfig) -> Result<(), String> {
    let store = Arc::new(FeedStore::load_seed(&args.seed).await?);
    let engine = ScoringEngine::new(&config);
    let classifier = MarketSizeClassifier::new(Arc::clone(&store), config.market.clone());
    let grading = RelativeGradingService::new(Arc::clone(&store), config.grading.clone());

    // Grades need buckets and fresh final scores before the curve is cut.
    classifier
        .update_all_market_sizes()
        .await
        .map_err(|err| err.to_string())?;
    classifier
        .update_post_market_sizes()
        .await
        .map_err(|err| err.to_string())?;
    engine
        .recalculate_all_scores(&store, Utc::now())
        .await
        .map_err(|err| err.to_string())?;

    match args.bucket {
        Some(name) => {
            let bucket = MarketBucket::from_str(&name)
                .ok_or_else(|| format!("invalid market bucket: {}", name))?;
            let graded = grading
                .calculate_market_grades(bucket)
                .await
                .map_err(|err| err.to_string())?;
            println!("Graded {} posts in {} markets", graded, bucket.label());
        }
        None => {
            let results = grading
                .recalculate_all_market_grades()
                .await
                .map_err(|err| err.to_string())?;
            for bucket in MarketBucket::ALL {
                let graded = results.get(&bucket).copied().unwrap_or(0);
                println!("{}: {} posts graded", bucket.label(), graded);
            }
        }
    }
    Ok(())
}

async fn run_market_sizes(seed: &Path, config: FeedConfig) -> Result<(), String> {
    let store = Arc::new(FeedStore::load_seed(seed).await?);
    let classifier = MarketSizeClassifier::new(Arc::clone(&store), config.market.clone());

    let universities = classifier
        .update_all_market_sizes()
        .await
        .map_err(|err| err.to_string())?;
    let posts = classifier
        .update_post_market_sizes()
        .await
        .map_err(|err| err.to_string())?;
    println!(
        "Classified {} universities, updated {} post buckets",
        universities, posts
    );

    for university in store.universities_snapshot().await {
        let bucket = university
            .market_bucket
            .map(|b| b.label())
            .unwrap_or("unclassified");
        println!(
            "{} ({} active users): {}",
            university.name, university.active_user_count, bucket
        );
    }
    Ok(())
}

async fn run_stats(seed: &Path, config: FeedConfig) -> Result<(), String> {
    let store = Arc::new(FeedStore::load_seed(seed).await?);
    let engine = ScoringEngine::new(&config);
    let classifier = MarketSizeClassifier::new(Arc::clone(&store), config.market.clone());
    let grading = RelativeGradingService::new(Arc::clone(&store), config.grading.clone());

    classifier
        .update_all_market_sizes()
        .await
        .map_err(|err| err.to_string())?;
    classifier
        .update_post_market_sizes()
        .await
        .map_err(|err| err.to_string())?;
    engine
        .recalculate_all_scores(&store, Utc::now())
        .await
        .map_err(|err| err.to_string())?;
    grading
        .recalculate_all_market_grades()
        .await
        .map_err(|err| err.to_string())?;

    let posts = store.posts_snapshot().await;
    let stats = engine.stats(&posts);
    println!("Posts: {}", stats.total_posts);
    println!(
        "Scores: min {} | max {} | avg final {}",
        stats.min_score, stats.max_score, stats.avg_final_score
    );
    println!(
        "Average components: base {} | urgency {} | review {}",
        stats.avg_base_score, stats.avg_urgency_bonus, stats.avg_review_bonus
    );

    for bucket in MarketBucket::ALL {
        let distribution = grading
            .get_market_grade_distribution(bucket)
            .await
            .map_err(|err| err.to_string())?;
        if distribution.total_posts == 0 {
            continue;
        }
        println!("{} markets: {} posts", bucket.label(), distribution.total_posts);
        for (grade, band) in &distribution.grades {
            let share = band.count as f64 / distribution.total_posts as f64;
            println!(
                "  {}: {} posts ({}%)",
                grade.label(),
                band.count,
                round2(share * 100.0)
            );
        }
    }
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
