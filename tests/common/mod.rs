//! Common test utilities

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use shelfwatch::config::{Config, RateBackend};
use shelfwatch::crawler::ListingFetcher;
use shelfwatch::models::RateWindow;
use shelfwatch::ratelimit::{InMemoryRateAccountant, RateAccountant, SharedAccountant};

/// Config pointing at a mock listing API, with short timeouts and backoff
pub fn test_config(api_uri: &str, proxy_uri: Option<&str>) -> Config {
    let mut config = Config::default();
    config.api.base_url = api_uri.to_string();
    config.api.request_timeout_secs = 2;
    config.api.max_blocked_retries = 1;
    config.api.blocked_backoff_ms = 5;
    config.api.blocked_backoff_max_ms = 20;
    config.proxy.url = proxy_uri.map(str::to_string);
    config.rate_limit.backend = RateBackend::Memory;
    config.rate_limit.admission_delay_ms = 5;
    config
}

/// Fetcher using a fresh in-memory accountant
pub fn test_fetcher(config: &Config) -> ListingFetcher {
    ListingFetcher::new(config, Arc::new(InMemoryRateAccountant::new()))
        .expect("fetcher should build")
}

/// One listing page with `products` single-variant product widgets
pub fn listing_page(products: usize) -> Value {
    let objects: Vec<Value> = (0..products)
        .map(|i| {
            json!({
                "data": {
                    "product": {
                        "id": 1000 + i,
                        "name": format!("Product {i}"),
                        "variant_info": [{
                            "product_id": 5000 + i,
                            "name": format!("Product {i} 100 g"),
                            "price": 10 + i,
                            "mrp": 20 + i,
                            "inventory": i,
                            "brand": {"name": "Acme"},
                            "images": [format!("https://cdn.example/{i}.png")]
                        }]
                    }
                }
            })
        })
        .collect();

    json!({ "objects": objects })
}

/// Page without listings; ends a pair harvest
#[allow(dead_code)]
pub fn empty_page() -> Value {
    json!({ "objects": [] })
}

/// Accountant that denies the first `denials` calls, then admits everything
#[allow(dead_code)]
pub struct ScriptedAccountant {
    denials_left: AtomicU32,
    pub attempts: AtomicU32,
}

#[allow(dead_code)]
impl ScriptedAccountant {
    pub fn denying(denials: u32) -> Arc<Self> {
        Arc::new(Self {
            denials_left: AtomicU32::new(denials),
            attempts: AtomicU32::new(0),
        })
    }

    pub fn shared(self: &Arc<Self>) -> SharedAccountant {
        Arc::clone(self) as SharedAccountant
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateAccountant for ScriptedAccountant {
    async fn try_acquire(&self, _window: &RateWindow) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.denials_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_err()
    }

    async fn remaining_capacity(&self, window: &RateWindow) -> u64 {
        u64::from(window.limit)
    }

    async fn reset(&self, _key: &str) -> bool {
        false
    }

    fn backend(&self) -> &'static str {
        "scripted"
    }
}
