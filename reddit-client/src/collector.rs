//! Gathers posts about each company and appends the unseen ones to its raw file.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stocksent_core::naming::{normalize_entity, raw_filename};
use stocksent_core::{CoreError, PathsConfig, RedditConfig, RedditPost, Table, TableError};
use tokio::time::sleep;
use tracing::{error, info};

/// Anything that can search a subreddit for posts about a company.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn search(
        &self,
        subreddit: &str,
        company: &str,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyCollection {
    pub company: String,
    pub raw_path: PathBuf,
    pub fetched: usize,
    pub new_posts: usize,
    pub total_posts: usize,
}

pub struct Collector<'a> {
    source: &'a dyn PostSource,
    raw_dir: PathBuf,
    subreddits: Vec<String>,
    posts_per_subreddit: u32,
    pause: Duration,
}

impl<'a> Collector<'a> {
    pub fn new(source: &'a dyn PostSource, raw_dir: PathBuf, subreddits: Vec<String>) -> Self {
        Self {
            source,
            raw_dir,
            subreddits,
            posts_per_subreddit: 20,
            pause: Duration::from_secs(5),
        }
    }

    pub fn from_config(source: &'a dyn PostSource, paths: &PathsConfig, reddit: &RedditConfig) -> Self {
        Self::new(source, paths.raw_dir.clone(), reddit.subreddits.clone())
            .with_posts_per_subreddit(reddit.posts_per_subreddit)
            .with_pause(Duration::from_secs(reddit.sleep_seconds))
    }

    pub fn with_posts_per_subreddit(mut self, posts: u32) -> Self {
        self.posts_per_subreddit = posts;
        self
    }

    /// Pause between subreddit queries.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Collect every company in turn. A company whose raw file cannot be
    /// updated is logged and skipped.
    pub async fn collect(&self, companies: &[String]) -> Vec<CompanyCollection> {
        let mut collected = Vec::with_capacity(companies.len());
        let mut first_query = true;

        for company in companies {
            let mut posts = Vec::new();
            for subreddit in &self.subreddits {
                if !first_query {
                    sleep(self.pause).await;
                }
                first_query = false;

                match self
                    .source
                    .search(subreddit, company, self.posts_per_subreddit)
                    .await
                {
                    Ok(found) => {
                        info!(
                            "{} | r/{}: {} posts fetched from API.",
                            company,
                            subreddit,
                            found.len()
                        );
                        posts.extend(found);
                    }
                    Err(e) => {
                        error!(company = %company, subreddit = %subreddit, error = %e,
                            "Error fetching posts");
                    }
                }
            }

            let raw_path = self.raw_dir.join(raw_filename(&normalize_entity(company)));
            match append_new_posts(&raw_path, &posts) {
                Ok((new_posts, total_posts)) => {
                    info!(
                        "{}: {} truly new posts added, {} total posts saved.",
                        company, new_posts, total_posts
                    );
                    collected.push(CompanyCollection {
                        company: company.clone(),
                        raw_path,
                        fetched: posts.len(),
                        new_posts,
                        total_posts,
                    });
                }
                Err(e) => {
                    error!(company = %company, error = %e, "Failed to update raw file");
                }
            }
        }

        collected
    }
}

/// Append posts whose id is not yet in `raw_path`, returning `(new, total)`.
///
/// The file is only rewritten when something new arrived.
pub fn append_new_posts(raw_path: &Path, posts: &[RedditPost]) -> Result<(usize, usize), TableError> {
    let existing = Table::read_optional(raw_path)?;

    let mut known: HashSet<String> = match &existing {
        Some(table) => table
            .column("id")
            .unwrap_or_default()
            .into_iter()
            .map(str::to_string)
            .collect(),
        None => HashSet::new(),
    };

    let mut fresh = Table::new(RedditPost::COLUMNS.iter().map(|c| c.to_string()).collect());
    for post in posts {
        if known.insert(post.id.clone()) {
            fresh.push_row(post.to_row());
        }
    }

    let new_posts = fresh.len();
    let total = existing.as_ref().map(Table::len).unwrap_or(0) + new_posts;
    if new_posts == 0 {
        return Ok((0, total));
    }

    let merged = match existing {
        Some(mut table) if !table.headers().is_empty() => {
            table.append(&fresh);
            table
        }
        _ => fresh,
    };
    merged.write_atomic(raw_path)?;
    Ok((new_posts, total))
}
