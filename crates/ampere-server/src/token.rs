//! Short-lived database credentials
//!
//! When `ampere.db.token_url` is set the password in the connection URL is
//! replaced by a token fetched from that endpoint. Tokens live in a
//! [`RefreshingCache`] keyed by the endpoint URL and are re-fetched in the
//! background on `ampere.db.token_refresh_secs`. [`CredentialRotation`]
//! watches the cached token and reopens the connection pool whenever it
//! changes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ampere_common::{RefreshingCache, ValueFetcher};
use ampere_persistence::ExternalDbPersistService;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Configuration;

pub type TokenCache = RefreshingCache<String, String>;

/// Fetches a token with a plain GET; the trimmed response body is the token
pub struct HttpTokenFetcher {
    client: reqwest::Client,
}

impl HttpTokenFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ValueFetcher<String, String> for HttpTokenFetcher {
    async fn fetch(&self, token_url: &String) -> anyhow::Result<String> {
        let response = self
            .client
            .get(token_url.as_str())
            .send()
            .await?
            .error_for_status()?;
        let token = response.text().await?.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("token endpoint {} returned an empty token", token_url);
        }
        debug!(token_url = %token_url, "Fetched database token");
        Ok(token)
    }
}

pub fn token_cache(timeout: Duration) -> anyhow::Result<Arc<TokenCache>> {
    let fetcher = Arc::new(HttpTokenFetcher::new(timeout)?);
    Ok(Arc::new(RefreshingCache::new(fetcher, 1)))
}

/// Keeps the persistence pool on the latest cached token
pub struct CredentialRotation {
    cache: Arc<TokenCache>,
    token_url: String,
    current: Mutex<String>,
}

impl CredentialRotation {
    /// Fetch the initial token; the pool is expected to be opened with it
    pub async fn start(cache: Arc<TokenCache>, token_url: String) -> anyhow::Result<Self> {
        let token = cache.get(&token_url).await?;
        Ok(Self {
            cache,
            token_url,
            current: Mutex::new(token),
        })
    }

    /// Token the live pool was opened with
    pub fn current(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Cached token, when it differs from [`Self::current`]
    pub async fn pending(&self) -> anyhow::Result<Option<String>> {
        let cached = self.cache.get(&self.token_url).await?;
        Ok((cached != self.current()).then_some(cached))
    }

    /// Reopen the pool with the pending token, if any.
    ///
    /// The current token only advances once the new pool is in place, so a
    /// failed reconnect is retried on the next call.
    pub async fn rotate(
        &self,
        configuration: &Configuration,
        persistence: &ExternalDbPersistService,
    ) -> anyhow::Result<bool> {
        let Some(token) = self.pending().await? else {
            return Ok(false);
        };

        let db = configuration.database_connection(Some(&token)).await?;
        persistence.replace_connection(db);
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = token;
        info!(token_url = %self.token_url, "Database connection pool reopened with rotated token");
        Ok(true)
    }

    /// Check for a rotated token every `interval` until aborted
    pub fn spawn(
        self: Arc<Self>,
        configuration: Configuration,
        persistence: Arc<ExternalDbPersistService>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.rotate(&configuration, &persistence).await {
                    warn!(
                        token_url = %self.token_url,
                        error = %e,
                        "Credential rotation failed, keeping current pool"
                    );
                }
            }
        })
    }
}
