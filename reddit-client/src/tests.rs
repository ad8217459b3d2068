use crate::{append_new_posts, Collector, PostSource, RedditClient};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use stocksent_core::{
    ConfigError, CoreError, RedditApiError, RedditConfig, RedditCredentials, RedditPost, Table,
};

fn post(id: &str, company: &str, subreddit: &str) -> RedditPost {
    RedditPost {
        id: id.to_string(),
        title: format!("{} post {}", company, id),
        text: String::new(),
        created_utc: 1704067200.0,
        author: "trader".to_string(),
        score: 1,
        num_comments: 0,
        upvote_ratio: Some(1.0),
        flair: None,
        permalink: format!("/r/{}/comments/{}/", subreddit, id),
        url: format!("https://www.reddit.com/r/{}/comments/{}/", subreddit, id),
        subreddit: subreddit.to_string(),
        company: company.to_string(),
    }
}

/// Serves canned results keyed by (subreddit, company).
#[derive(Default)]
struct FakeSource {
    results: HashMap<(String, String), Vec<RedditPost>>,
    failing_subreddits: Vec<String>,
    queries: Mutex<Vec<(String, String, u32)>>,
}

impl FakeSource {
    fn with(mut self, subreddit: &str, company: &str, ids: &[&str]) -> Self {
        let posts = ids.iter().map(|id| post(id, company, subreddit)).collect();
        self.results
            .insert((subreddit.to_string(), company.to_string()), posts);
        self
    }

    fn failing(mut self, subreddit: &str) -> Self {
        self.failing_subreddits.push(subreddit.to_string());
        self
    }
}

#[async_trait]
impl PostSource for FakeSource {
    async fn search(
        &self,
        subreddit: &str,
        company: &str,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError> {
        self.queries
            .lock()
            .unwrap()
            .push((subreddit.to_string(), company.to_string(), limit));
        if self.failing_subreddits.iter().any(|s| s == subreddit) {
            return Err(CoreError::RedditApi(RedditApiError::Forbidden {
                resource: format!("/r/{}/search", subreddit),
            }));
        }
        Ok(self
            .results
            .get(&(subreddit.to_string(), company.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

fn collector<'a>(source: &'a FakeSource, raw_dir: &std::path::Path) -> Collector<'a> {
    Collector::new(
        source,
        raw_dir.to_path_buf(),
        vec!["stocks".to_string(), "wallstreetbets".to_string()],
    )
    .with_posts_per_subreddit(50)
    .with_pause(Duration::ZERO)
}

#[tokio::test]
async fn test_collect_writes_raw_file_per_company() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeSource::default()
        .with("stocks", "Apple", &["a1", "a2"])
        .with("wallstreetbets", "Apple", &["a3"])
        .with("stocks", "Meta Platforms", &["m1"]);

    let companies = vec!["Apple".to_string(), "Meta Platforms".to_string()];
    let collected = collector(&source, dir.path()).collect(&companies).await;

    assert_eq!(collected.len(), 2);
    assert_eq!(collected[0].new_posts, 3);
    assert_eq!(collected[1].raw_path, dir.path().join("meta_platforms_reddit.csv"));

    let apple = Table::read(&dir.path().join("apple_reddit.csv")).unwrap();
    assert_eq!(apple.headers(), &RedditPost::COLUMNS);
    assert_eq!(apple.column("id").unwrap(), vec!["a1", "a2", "a3"]);
    assert_eq!(
        apple.column("created_datetime").unwrap()[0],
        "2024-01-01 00:00:00"
    );

    let queries = source.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 4);
    assert_eq!(queries[0], ("stocks".to_string(), "Apple".to_string(), 50));
}

#[tokio::test]
async fn test_collect_only_appends_unseen_ids() {
    let dir = tempfile::tempdir().unwrap();
    let companies = vec!["Apple".to_string()];

    let first = FakeSource::default().with("stocks", "Apple", &["a1", "a2"]);
    collector(&first, dir.path()).collect(&companies).await;

    let second = FakeSource::default().with("stocks", "Apple", &["a2", "a3"]);
    let collected = collector(&second, dir.path()).collect(&companies).await;

    assert_eq!(collected[0].fetched, 2);
    assert_eq!(collected[0].new_posts, 1);
    assert_eq!(collected[0].total_posts, 3);
    let apple = Table::read(&dir.path().join("apple_reddit.csv")).unwrap();
    assert_eq!(apple.column("id").unwrap(), vec!["a1", "a2", "a3"]);
}

#[tokio::test]
async fn test_failing_subreddit_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeSource::default()
        .failing("stocks")
        .with("wallstreetbets", "Tesla", &["t1"]);

    let collected = collector(&source, dir.path())
        .collect(&["Tesla".to_string()])
        .await;

    assert_eq!(collected[0].new_posts, 1);
    assert!(dir.path().join("tesla_reddit.csv").exists());
}

#[test]
fn test_nothing_fetched_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("apple_reddit.csv");

    assert_eq!(append_new_posts(&path, &[]).unwrap(), (0, 0));
    assert!(!path.exists());
}

#[test]
fn test_existing_columns_are_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("apple_reddit.csv");
    std::fs::write(&path, "id,title,note\nold,Old post,keep me\n").unwrap();

    let posts = [post("old", "Apple", "stocks"), post("n1", "Apple", "stocks")];
    let (new, total) = append_new_posts(&path, &posts).unwrap();
    assert_eq!((new, total), (1, 2));

    let table = Table::read(&path).unwrap();
    assert_eq!(&table.headers()[..3], &["id", "title", "note"]);
    assert_eq!(table.column("note").unwrap(), vec!["keep me", ""]);
    assert_eq!(table.column("title").unwrap(), vec!["Old post", "Apple post n1"]);
}

#[test]
fn test_client_requires_credentials() {
    let err = RedditClient::from_config(&RedditConfig::default()).err().unwrap();
    assert!(matches!(
        err,
        CoreError::Config(ConfigError::MissingField { .. })
    ));

    let client = RedditClient::new(&RedditCredentials {
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
        user_agent: "stocksent-test/1.0".to_string(),
    });
    assert!(client.is_ok());
}
