use std::path::PathBuf;

use campus_feed::config::FeedConfig;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("campus-feed-{}-{}.toml", name, std::process::id()))
}

#[test]
fn written_config_reloads_identically() {
    let mut config = FeedConfig::default();
    config.feed.default_limit = 35;
    config.urgency.today_bonus = 25.0;

    let path = temp_path("roundtrip");
    config.write(&path).unwrap();

    let (reloaded, source) = FeedConfig::load(Some(path.clone())).unwrap();
    assert_eq!(source, Some(path.clone()));
    assert_eq!(reloaded.feed.default_limit, 35);
    assert_eq!(reloaded.urgency.today_bonus, 25.0);
    // untouched sections keep their defaults
    assert_eq!(reloaded.engagement.message, 4.0);
    assert_eq!(reloaded.market.medium, 10_000);

    let _ = std::fs::remove_file(path);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let (config, _) = FeedConfig::load(Some(temp_path("missing"))).unwrap();
    assert_eq!(config.feed.default_limit, 20);
    assert_eq!(config.grading.min_posts_for_curve, 5);
}
