//! Listing API client with shared rate admission and a direct→proxy ladder
//!
//! This module provides the HTTP client for the marketplace listing endpoint:
//! - Admission against the shared rate budget before every direct attempt
//! - User-Agent rotation and a fresh `device_id` per attempt
//! - Escalation of blocked (403/429) responses through an authenticated proxy
//! - Bounded direct retries with exponential backoff while blocks persist
//! - Classification of every result into a [`FetchOutcome`]

use reqwest::{header::HeaderMap, Client, Response};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::headers::{build_listing_headers, random_user_agent};
use super::outcome::{classify_status, FetchOutcome, StatusClass};
use crate::config::{ApiConfig, Config, ProxyConfig, RateLimitConfig};
use crate::metrics;
use crate::models::{RateWindow, WorkItem};
use crate::ratelimit::{acquire_with_wait, SharedAccountant};
use crate::utils::error::FetchError;
use crate::utils::retry::RetryConfig;

/// One page request for one (store, category) pair
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub l1_id: String,
    pub l2_id: String,
    pub page: u32,
    pub lat: f64,
    pub lon: f64,
}

impl ListingQuery {
    pub fn for_item(item: &WorkItem, page: u32) -> Self {
        Self {
            l1_id: item.category.l1_id.clone(),
            l2_id: item.category.l2_id.clone(),
            page,
            lat: item.store.lat,
            lon: item.store.lon,
        }
    }

    /// Query string pairs: `l0_cat`, `l1_cat`, `page`
    pub fn params(&self) -> [(&'static str, String); 3] {
        [
            ("l0_cat", self.l1_id.clone()),
            ("l1_cat", self.l2_id.clone()),
            ("page", self.page.to_string()),
        ]
    }
}

enum Attempt {
    Done(FetchOutcome),
    Blocked(u16),
}

/// Marketplace listing client
pub struct ListingFetcher {
    /// Client that never goes through a proxy
    direct: Client,

    /// Client routed through the rotating proxy, when configured
    proxy: Option<Client>,

    accountant: SharedAccountant,
    window: RateWindow,
    admission_delay: Duration,

    /// Backoff between direct attempts while responses stay blocked
    retry: RetryConfig,

    api: ApiConfig,
    endpoint: String,
}

impl ListingFetcher {
    /// Create a fetcher from the full configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the endpoint, the proxy or an HTTP client is unusable
    pub fn new(config: &Config, accountant: SharedAccountant) -> Result<Self, FetchError> {
        Self::with_parts(&config.api, &config.proxy, &config.rate_limit, accountant)
    }

    /// Create a fetcher from individual configuration sections
    pub fn with_parts(
        api: &ApiConfig,
        proxy: &ProxyConfig,
        rate_limit: &RateLimitConfig,
        accountant: SharedAccountant,
    ) -> Result<Self, FetchError> {
        let endpoint = format!(
            "{}{}",
            api.base_url.trim_end_matches('/'),
            api.listing_path
        );
        url::Url::parse(&endpoint).map_err(|e| FetchError::InvalidUrl(format!("{endpoint}: {e}")))?;

        let timeout = Duration::from_secs(api.request_timeout_secs);

        let direct = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .no_proxy()
            .build()?;

        let proxy = match proxy.endpoint() {
            Some(proxy_url) => {
                let mut upstream = reqwest::Proxy::all(&proxy_url)
                    .map_err(|e| FetchError::InvalidProxy(format!("{proxy_url}: {e}")))?;
                if let (Some(username), Some(password)) = (&proxy.username, &proxy.password) {
                    upstream = upstream.basic_auth(username, password);
                }
                let client = Client::builder()
                    .timeout(timeout)
                    .gzip(true)
                    .proxy(upstream)
                    .build()?;
                info!(proxy = %proxy_url, "Proxy fallback enabled");
                Some(client)
            }
            None => None,
        };

        Ok(Self {
            direct,
            proxy,
            accountant,
            window: rate_limit.window(),
            admission_delay: rate_limit.admission_delay(),
            retry: RetryConfig::with_delays(
                api.max_blocked_retries,
                api.blocked_backoff_ms,
                api.blocked_backoff_max_ms,
            ),
            api: api.clone(),
            endpoint,
        })
    }

    pub fn has_proxy(&self) -> bool {
        self.proxy.is_some()
    }

    /// Full listing URL without the query string
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn rate_window(&self) -> &RateWindow {
        &self.window
    }

    /// Fetch one listing page
    ///
    /// Waits for rate admission, then walks the retry ladder: direct attempt,
    /// proxy attempt on a block, backoff and a new direct attempt while both
    /// stay blocked. Only blocked responses are retried; every other result
    /// is returned as classified.
    pub async fn fetch(&self, query: &ListingQuery) -> FetchOutcome {
        let mut last_blocked = 0u16;

        for attempt in 0..self.retry.total_attempts() {
            if attempt > 0 {
                let delay = self.retry.calculate_delay(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before new direct attempt"
                );
                tokio::time::sleep(delay).await;
            }

            acquire_with_wait(self.accountant.as_ref(), &self.window, self.admission_delay).await;

            let headers = self.request_headers(query);

            let status = match self.attempt(&self.direct, query, &headers, false).await {
                Attempt::Done(outcome) => return outcome,
                Attempt::Blocked(status) => status,
            };
            last_blocked = status;

            let Some(proxy) = &self.proxy else {
                warn!(
                    status,
                    l1 = %query.l1_id,
                    l2 = %query.l2_id,
                    page = query.page,
                    "Direct request blocked and no proxy configured"
                );
                continue;
            };

            info!(
                status,
                l1 = %query.l1_id,
                l2 = %query.l2_id,
                page = query.page,
                "Direct request blocked, retrying through proxy"
            );

            match self.attempt(proxy, query, &headers, true).await {
                Attempt::Done(outcome) => return outcome,
                Attempt::Blocked(status) => {
                    warn!(status, page = query.page, "Proxy request blocked as well");
                    last_blocked = status;
                }
            }
        }

        warn!(
            status = last_blocked,
            attempts = self.retry.total_attempts(),
            l1 = %query.l1_id,
            l2 = %query.l2_id,
            page = query.page,
            "Giving up on blocked request"
        );
        FetchOutcome::Blocked {
            status: last_blocked,
        }
    }

    fn request_headers(&self, query: &ListingQuery) -> HeaderMap {
        let device_id = Uuid::new_v4().to_string();
        build_listing_headers(
            random_user_agent(),
            &self.api,
            &device_id,
            query.lat,
            query.lon,
        )
    }

    async fn attempt(
        &self,
        client: &Client,
        query: &ListingQuery,
        headers: &HeaderMap,
        via_proxy: bool,
    ) -> Attempt {
        let started = Instant::now();

        let result = client
            .get(&self.endpoint)
            .query(&query.params())
            .headers(headers.clone())
            .send()
            .await;

        let (attempt, status_label) = match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let attempt = match classify_status(status) {
                    StatusClass::Blocked => Attempt::Blocked(status),
                    StatusClass::NotFound => Attempt::Done(FetchOutcome::NotFound),
                    StatusClass::ServerError => Attempt::Done(FetchOutcome::ServerError {
                        status: Some(status),
                    }),
                    StatusClass::Failed => Attempt::Done(FetchOutcome::Failed { status }),
                    StatusClass::Ok => {
                        Attempt::Done(read_payload(response, status, via_proxy).await)
                    }
                };
                (attempt, status.to_string())
            }
            Err(e) if e.is_timeout() => (
                Attempt::Done(FetchOutcome::ServerError { status: None }),
                String::from("timeout"),
            ),
            Err(e) => (
                Attempt::Done(FetchOutcome::Transport {
                    message: e.to_string(),
                }),
                String::from("transport"),
            ),
        };

        let elapsed = started.elapsed();
        metrics::record_api_call(via_proxy, &status_label, elapsed.as_secs_f64());
        debug!(
            status = %status_label,
            proxy_used = via_proxy,
            page = query.page,
            elapsed_ms = elapsed.as_millis() as u64,
            "Listing request finished"
        );

        attempt
    }
}

async fn read_payload(response: Response, status: u16, via_proxy: bool) -> FetchOutcome {
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) if e.is_timeout() => return FetchOutcome::ServerError { status: None },
        Err(e) => {
            return FetchOutcome::Transport {
                message: e.to_string(),
            }
        }
    };

    if body.iter().all(u8::is_ascii_whitespace) {
        return FetchOutcome::EmptyBody { status };
    }

    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => FetchOutcome::Success { payload, via_proxy },
        Err(e) => FetchOutcome::Malformed {
            reason: e.to_string(),
        },
    }
}
