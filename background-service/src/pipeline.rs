//! One collection pass, one enrichment pass, or both.

use enrichment::{BatchDriver, EnrichmentEngine, RunSummary};
use reddit_client::{Collector, CompanyCollection, RedditClient};
use sentiment_engine::SentimentClassifier;
use std::fmt;
use std::sync::Arc;
use stocksent_core::{AppConfig, CoreError, PathsConfig};
use tracing::info;

pub type SharedClassifier = Arc<dyn SentimentClassifier + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub new_posts: usize,
    pub enrichment: RunSummary,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} new posts collected; {}", self.new_posts, self.enrichment)
    }
}

pub async fn collect_once(config: &AppConfig) -> Result<Vec<CompanyCollection>, CoreError> {
    let client = RedditClient::from_config(&config.reddit)?;
    let collector = Collector::from_config(&client, &config.paths, &config.reddit);
    let collected = collector.collect(&config.reddit.companies).await;

    let new_posts: usize = collected.iter().map(|c| c.new_posts).sum();
    info!(
        companies = collected.len(),
        new_posts, "Collection finished"
    );
    Ok(collected)
}

/// Run the enrichment driver on a blocking thread.
pub async fn enrich_once(
    classifier: SharedClassifier,
    paths: PathsConfig,
) -> Result<RunSummary, CoreError> {
    tokio::task::spawn_blocking(move || {
        let engine = EnrichmentEngine::new(classifier.as_ref());
        BatchDriver::from_config(engine, &paths).run()
    })
    .await
    .map_err(|e| CoreError::Internal {
        message: format!("enrichment task failed: {}", e),
    })?
}

pub async fn collect_and_enrich(
    config: &AppConfig,
    classifier: SharedClassifier,
) -> Result<CycleReport, CoreError> {
    let collected = collect_once(config).await?;
    let enrichment = enrich_once(classifier, config.paths.clone()).await?;
    Ok(CycleReport {
        new_posts: collected.iter().map(|c| c.new_posts).sum(),
        enrichment,
    })
}
