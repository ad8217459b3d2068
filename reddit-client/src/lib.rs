pub mod api;
pub mod auth;
pub mod collector;
pub mod rate_limiter;
pub mod retry;

#[cfg(test)]
mod tests;

pub use collector::{append_new_posts, Collector, CompanyCollection, PostSource};

use api::{RedditApiClient, RedditListing, RedditPostData, MAX_PAGE_SIZE};
use async_trait::async_trait;
use auth::AppOnlyAuth;
use retry::{RetryConfig, RetryExecutor};
use stocksent_core::{CoreError, RedditApiError, RedditConfig, RedditCredentials, RedditPost};
use tracing::{debug, warn};

/// Read-only Reddit client: app-only auth, rate limiting and retries.
pub struct RedditClient {
    auth: AppOnlyAuth,
    api: RedditApiClient,
    retry: RetryExecutor,
}

impl RedditClient {
    pub fn new(credentials: &RedditCredentials) -> Result<Self, CoreError> {
        Ok(Self {
            auth: AppOnlyAuth::new(credentials)?,
            api: RedditApiClient::new(credentials.user_agent.clone())?,
            retry: RetryExecutor::new(RetryConfig::reddit()),
        })
    }

    pub fn from_config(config: &RedditConfig) -> Result<Self, CoreError> {
        let credentials = config.credentials()?;
        Self::new(&credentials)
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }

    /// Up to `limit` of the newest posts in `subreddit` matching `query`.
    pub async fn search_posts(
        &self,
        subreddit: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let limit = limit as usize;
        let mut posts = Vec::with_capacity(limit);
        let mut after: Option<String> = None;

        while posts.len() < limit {
            let page_size = (limit - posts.len()).min(MAX_PAGE_SIZE as usize) as u32;
            let listing = self
                .search_page(subreddit, query, page_size, after.as_deref())
                .await?;

            let received = listing.data.children.len();
            posts.extend(
                listing
                    .data
                    .children
                    .into_iter()
                    .map(|child| child.data.into_post(query)),
            );

            match listing.data.after {
                Some(next) if received > 0 => after = Some(next),
                _ => break,
            }
        }

        posts.truncate(limit);
        debug!("Collected {} posts from r/{} for '{}'", posts.len(), subreddit, query);
        Ok(posts)
    }

    async fn search_page(
        &self,
        subreddit: &str,
        query: &str,
        page_size: u32,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let fetch = || async move {
            let token = self.auth.access_token().await?;
            self.api
                .search(&token, subreddit, query, page_size, after)
                .await
        };

        let operation = format!("search r/{}", subreddit);
        match self.retry.execute(&operation, fetch).await {
            Err(CoreError::RedditApi(RedditApiError::InvalidToken)) => {
                warn!("Access token rejected, re-authenticating");
                self.auth.invalidate().await;
                self.retry.execute(&operation, fetch).await
            }
            result => result,
        }
    }
}

#[async_trait]
impl PostSource for RedditClient {
    async fn search(
        &self,
        subreddit: &str,
        company: &str,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError> {
        self.search_posts(subreddit, company, limit).await
    }
}
