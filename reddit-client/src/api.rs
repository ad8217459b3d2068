use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter, ServerQuota};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use stocksent_core::{CoreError, RedditApiError, RedditPost};
use tracing::{debug, error, info, warn};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Largest page Reddit serves for listing endpoints.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

/// The subset of a submission the collector keeps.
#[derive(Debug, Clone, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: Option<String>,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    #[serde(default)]
    pub link_flair_text: Option<String>,
}

impl RedditPostData {
    /// Attach the company the post was found for.
    pub fn into_post(self, company: &str) -> RedditPost {
        RedditPost {
            id: self.id,
            title: self.title,
            text: self.selftext,
            created_utc: self.created_utc,
            // The account of a deleted post comes back as null
            author: self.author.unwrap_or_else(|| "None".to_string()),
            score: self.score,
            num_comments: self.num_comments,
            upvote_ratio: self.upvote_ratio,
            flair: self.link_flair_text,
            permalink: self.permalink,
            url: self.url,
            subreddit: self.subreddit,
            company: company.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: RateLimiter,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(RateLimitConfig::reddit_oauth()),
            user_agent,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", REDDIT_API_BASE, endpoint);

        let permit = self.rate_limiter.acquire().await?;
        debug!(
            "Acquired rate limit permit for {} {} after {:?}",
            method, endpoint, permit.waited
        );

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                return Err(if e.is_timeout() {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                });
            }
        };

        drop(permit);
        if let Some(quota) = ServerQuota::from_headers(response.headers()) {
            self.rate_limiter.observe(quota).await;
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        Err(status_error(status, endpoint, retry_after))
    }

    /// One page of `/r/{subreddit}/search`, newest first, restricted to the subreddit.
    pub async fn search(
        &self,
        access_token: &str,
        subreddit: &str,
        query: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/search", subreddit);
        let limit = limit.clamp(1, MAX_PAGE_SIZE).to_string();

        let mut params = vec![
            ("q", query),
            ("restrict_sr", "1"),
            ("sort", "new"),
            ("t", "all"),
            ("raw_json", "1"),
            ("limit", limit.as_str()),
        ];
        if let Some(after) = after {
            params.push(("after", after));
        }

        let response = self
            .make_request(Method::GET, &endpoint, access_token, Some(params.as_slice()))
            .await?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse search results: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse search results for r/{}", subreddit),
            })
        })?;

        info!(
            "Retrieved {} posts from r/{} for '{}'",
            listing.data.children.len(),
            subreddit,
            query
        );
        Ok(listing)
    }

    pub async fn rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.status().await
    }
}

fn status_error(status: StatusCode, endpoint: &str, retry_after: Option<u64>) -> CoreError {
    let api_error = match status.as_u16() {
        429 => {
            let retry_after = retry_after.unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        401 => RedditApiError::InvalidToken,
        403 => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        404 => {
            return CoreError::NotFound {
                resource: endpoint.to_string(),
            }
        }
        code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
        code => {
            return CoreError::RequestFailed {
                message: format!("{} returned {}", endpoint, status),
                status_code: code,
            }
        }
    };
    CoreError::RedditApi(api_error)
}
