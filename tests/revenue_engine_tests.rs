use anyhow::Result;

use seo_pipeline::config::RevenueConfig;
use seo_pipeline::revenue::RevenueScoringEngine;

mod test_utils;
use test_utils::{insert_revenue_stats, setup_test_db};

/// Global EPC works out to 230 / 400 = 0.575, so the hide line sits at 0.2875.
async fn seeded_engine() -> Result<RevenueScoringEngine> {
    let db = setup_test_db().await?;
    insert_revenue_stats(&db, "hotel-strong", 200, 200.0, false).await?;
    insert_revenue_stats(&db, "hotel-weak", 150, 30.0, false).await?;
    insert_revenue_stats(&db, "hotel-new", 50, 0.0, false).await?;
    insert_revenue_stats(&db, "hotel-banned", 0, 0.0, true).await?;
    Ok(RevenueScoringEngine::new(db, RevenueConfig::default()))
}

#[tokio::test]
async fn test_global_epc_spans_all_listings() -> Result<()> {
    let engine = seeded_engine().await?;
    assert!((engine.global_epc().await - 0.575).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn test_hide_decisions() -> Result<()> {
    let engine = seeded_engine().await?;

    assert!(!engine.should_hide("hotel-strong").await);
    assert!(engine.should_hide("hotel-weak").await);
    // Too few clicks to judge
    assert!(!engine.should_hide("hotel-new").await);
    assert!(engine.should_hide("hotel-banned").await);
    assert!(!engine.should_hide("hotel-unknown").await);
    Ok(())
}

#[tokio::test]
async fn test_unknown_listing_scores_zero() -> Result<()> {
    let engine = seeded_engine().await?;
    let score = engine.score("tour-404").await;

    assert_eq!(score.stats.entity_id, "tour-404");
    assert_eq!(score.stats.clicks, 0);
    assert_eq!(score.stats.revenue, 0.0);
    assert!(!score.should_hide);
    Ok(())
}

#[tokio::test]
async fn test_empty_store_has_zero_baseline() -> Result<()> {
    let db = setup_test_db().await?;
    let engine = RevenueScoringEngine::new(db, RevenueConfig::default());
    assert_eq!(engine.global_epc().await, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_global_epc_is_cached() -> Result<()> {
    let db = setup_test_db().await?;
    insert_revenue_stats(&db, "hotel-a", 100, 100.0, false).await?;
    let engine = RevenueScoringEngine::new(db.clone(), RevenueConfig::default());

    assert_eq!(engine.global_epc().await, 1.0);
    insert_revenue_stats(&db, "hotel-b", 100, 0.0, false).await?;
    assert_eq!(engine.global_epc().await, 1.0, "served from cache within the TTL");

    let fresh = RevenueScoringEngine::new(db, RevenueConfig::default());
    assert_eq!(fresh.global_epc().await, 0.5);
    Ok(())
}

#[tokio::test]
async fn test_sort_by_revenue_is_stable() -> Result<()> {
    let engine = seeded_engine().await?;

    let listings = vec![
        "hotel-new",
        "hotel-weak",
        "mystery-1",
        "hotel-strong",
        "mystery-2",
    ];
    let sorted = engine.sort_by_revenue(listings, |id| *id).await;

    assert_eq!(
        sorted,
        vec![
            "hotel-strong",
            "hotel-weak",
            "hotel-new",
            "mystery-1",
            "mystery-2"
        ]
    );
    Ok(())
}
