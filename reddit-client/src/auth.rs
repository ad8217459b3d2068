//! Application-only OAuth2 for Reddit.
//!
//! Uses the client-credentials grant, which is all a read-only collector
//! needs. The access token is cached and refreshed shortly before it expires.

use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{AuthType, AuthUrl, ClientId, ClientSecret, TokenResponse, TokenUrl};
use std::time::{Duration, Instant};
use stocksent_core::{CoreError, RedditApiError, RedditCredentials};
use tokio::sync::Mutex;
use tracing::{debug, info};

const AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Refresh this long before the server-side expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Reddit issues hour-long tokens; used when the response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn new(secret: String, lifetime: Duration) -> Self {
        Self {
            secret,
            expires_at: Instant::now() + lifetime,
        }
    }

    pub fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

pub struct AppOnlyAuth {
    oauth_client: BasicClient,
    token: Mutex<Option<AccessToken>>,
}

impl AppOnlyAuth {
    pub fn new(credentials: &RedditCredentials) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(AUTHORIZE_URL.to_string()).map_err(invalid_url)?;
        let token_url = TokenUrl::new(TOKEN_URL.to_string()).map_err(invalid_url)?;

        let oauth_client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::BasicAuth);

        Ok(Self {
            oauth_client,
            token: Mutex::new(None),
        })
    }

    /// A valid access token, fetching a new one if the cached token is stale.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.secret.clone());
        }

        debug!("Requesting app-only access token");
        let response = self
            .oauth_client
            .exchange_client_credentials()
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: e.to_string(),
                })
            })?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let token = AccessToken::new(response.access_token().secret().clone(), lifetime);
        info!("Authenticated with Reddit, token valid for {:?}", lifetime);

        let secret = token.secret.clone();
        *cached = Some(token);
        Ok(secret)
    }

    /// Drop the cached token, e.g. after the API rejected it.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    pub async fn set_token(&self, token: AccessToken) {
        *self.token.lock().await = Some(token);
    }
}

fn invalid_url(e: oauth2::url::ParseError) -> CoreError {
    CoreError::Internal {
        message: format!("invalid OAuth endpoint: {}", e),
    }
}
