//! IAM bearer-token cache
//!
//! Exchanges the long-lived IBM API key for a short-lived bearer token and
//! keeps it in memory. A cached token is only handed out while
//! `now < expires_at`, where `expires_at` is set `refresh_margin` before the
//! real expiry. The refresh runs under the cache lock, so concurrent callers
//! that miss wait for one exchange instead of each starting their own.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::GraniteConfig;
use crate::error::{clip, PlannerError, Result};
use crate::metrics::METRICS;

const SERVICE: &str = "IBM IAM";
const GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// IAM's default token lifetime, used when the response omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A bearer token and the instant after which it must not be used
pub struct BearerToken {
    value: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl BearerToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// In-memory cache of the IAM bearer token
pub struct BearerTokenCache {
    http: Client,
    iam_url: String,
    api_key: SecretString,
    refresh_margin: ChronoDuration,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<BearerToken>>,
}

impl BearerTokenCache {
    /// Create a cache bound to one API key, using wall-clock time
    pub fn new(config: &GraniteConfig, api_key: SecretString) -> Result<Self> {
        Self::with_clock(config, api_key, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &GraniteConfig,
        api_key: SecretString,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PlannerError::Internal(format!("failed to build IAM client: {}", e)))?;

        let refresh_margin = ChronoDuration::from_std(config.refresh_margin())
            .map_err(|e| PlannerError::Internal(format!("invalid refresh margin: {}", e)))?;

        Ok(Self {
            http,
            iam_url: config.iam_url.clone(),
            api_key,
            refresh_margin,
            clock,
            cached: Mutex::new(None),
        })
    }

    /// Return a fresh bearer token, exchanging the API key only when needed.
    ///
    /// On failure the cache is left exactly as it was.
    pub async fn get_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        let now = self.clock.now();
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now) {
                debug!("Using cached IAM token (expires at {})", token.expires_at);
                return Ok(token.secret().to_string());
            }
            debug!("Cached IAM token expired at {}", token.expires_at);
        }

        let token = self.exchange().await?;
        let value = token.secret().to_string();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token so the next call exchanges again
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        if cached.take().is_some() {
            info!("IAM token invalidated");
        }
    }

    /// Expiry of the cached token, if one is held
    pub async fn cached_expiry(&self) -> Option<DateTime<Utc>> {
        self.cached.lock().await.as_ref().map(|t| t.expires_at)
    }

    async fn exchange(&self) -> Result<BearerToken> {
        let start = Instant::now();
        let issued_at = self.clock.now();

        let form = [
            ("grant_type", GRANT_TYPE),
            ("apikey", self.api_key.expose_secret().as_str()),
        ];

        let response = self
            .http
            .post(&self.iam_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                METRICS.record_upstream("iam", false, start.elapsed());
                if e.is_timeout() {
                    PlannerError::Timeout("IBM IAM token request timed out".to_string())
                } else {
                    PlannerError::Authentication {
                        service: SERVICE,
                        status: None,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            METRICS.record_upstream("iam", false, start.elapsed());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("IAM token exchange failed with status {}", status);
            return Err(PlannerError::Authentication {
                service: SERVICE,
                status: Some(status.as_u16()),
                message: clip(&body),
            });
        }

        let parsed: IamTokenResponse = response.json().await.map_err(|e| {
            METRICS.record_upstream("iam", false, start.elapsed());
            PlannerError::InvalidResponse {
                service: SERVICE,
                message: e.to_string(),
            }
        })?;

        if parsed.access_token.is_empty() {
            METRICS.record_upstream("iam", false, start.elapsed());
            return Err(PlannerError::InvalidResponse {
                service: SERVICE,
                message: "empty access_token".to_string(),
            });
        }

        METRICS.record_upstream("iam", true, start.elapsed());
        METRICS.record_token_refresh();

        let expires_in = parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = issued_at + ChronoDuration::seconds(expires_in) - self.refresh_margin;
        info!("Obtained IAM token, usable until {}", expires_at);

        Ok(BearerToken {
            value: SecretString::new(parsed.access_token),
            expires_at,
        })
    }
}
