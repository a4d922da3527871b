use rand::seq::SliceRandom;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, CONNECTION, CONTENT_TYPE, REFERER, USER_AGENT,
};

use crate::config::ApiConfig;

/// Pool of browser User-Agent strings rotated per request
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.107 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:90.0) Gecko/20100101 Firefox/90.0",
];

/// Pick a random User-Agent from [`USER_AGENTS`]
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "Skipping header with invalid value"),
    }
}

/// Build the identifying headers the listing API expects from its web client
///
/// Location travels in the `lat`/`lon` headers rather than the query string,
/// and every request carries a fresh `device_id`.
///
/// # Examples
///
/// ```
/// use shelfwatch::config::ApiConfig;
/// use shelfwatch::crawler::headers::build_listing_headers;
///
/// let headers = build_listing_headers(
///     "Mozilla/5.0 (X11; Linux x86_64)",
///     &ApiConfig::default(),
///     "0b8a7c52-3d1e-4f7a-9a65-2c1d0e9f4b11",
///     12.9716,
///     77.5946,
/// );
/// assert_eq!(headers.get("app_client").unwrap(), "consumer_web");
/// assert_eq!(headers.get("lat").unwrap(), "12.9716");
/// ```
pub fn build_listing_headers(
    user_agent: &str,
    api: &ApiConfig,
    device_id: &str,
    lat: f64,
    lon: f64,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    insert_str(&mut headers, USER_AGENT, user_agent);
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    insert_str(&mut headers, REFERER, &api.referer);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    insert_str(&mut headers, HeaderName::from_static("app_client"), &api.app_client);
    insert_str(&mut headers, HeaderName::from_static("device_id"), device_id);
    insert_str(&mut headers, HeaderName::from_static("app_version"), &api.app_version);
    insert_str(
        &mut headers,
        HeaderName::from_static("web_app_version"),
        &api.web_app_version,
    );
    insert_str(&mut headers, HeaderName::from_static("lat"), &lat.to_string());
    insert_str(&mut headers, HeaderName::from_static("lon"), &lon.to_string());
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static("priority"),
        HeaderValue::from_static("u=4"),
    );

    headers
}
