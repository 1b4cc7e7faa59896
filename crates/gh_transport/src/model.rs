use std::time::Duration;

use chrono::{DateTime, Utc};
use http::{header, HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// A request as the pipeline describes it; credentials and standard headers
/// are attached by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            body: None,
        }
    }

    pub fn post_json(url: Url, body: Value) -> Self {
        Self {
            method: Method::POST,
            url,
            body: Some(body),
        }
    }

    /// Path plus query, used as the endpoint label in errors and logs.
    pub fn endpoint(&self) -> String {
        let path = self.url.path().trim_start_matches('/');
        match self.url.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        }
    }

    pub fn is_graphql(&self) -> bool {
        self.method == Method::POST && self.url.path().ends_with("/graphql")
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitUpdate {
    pub remaining: i64,
    pub reset: DateTime<Utc>,
}

pub fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitUpdate> {
    let remaining = header_i64(headers, "x-ratelimit-remaining")?;
    let reset_ts = header_i64(headers, "x-ratelimit-reset")?;
    let reset = DateTime::from_timestamp(reset_ts, 0)?;
    Some(RateLimitUpdate {
        remaining,
        reset,
    })
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
}

pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(header::RETRY_AFTER)?.to_str().ok()?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = httpdate::parse_http_date(value).ok()?;
    date.duration_since(std::time::SystemTime::now()).ok()
}

/// Server wait advice: `Retry-After` first, then the primary-limit reset time
/// when the remaining budget is exhausted.
pub fn retry_advice(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(wait) = parse_retry_after(headers) {
        return Some(wait);
    }
    let update = parse_rate_limit(headers)?;
    if update.remaining > 0 {
        return None;
    }
    (update.reset - now).to_std().ok()
}

/// GraphQL reports throttling inside a 200 response.
pub fn graphql_rate_limited(body: &[u8]) -> bool {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return false;
    };
    value
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors.iter().any(|err| {
                err.get("type")
                    .or_else(|| err.get("extensions").and_then(|ext| ext.get("code")))
                    .and_then(Value::as_str)
                    == Some("RATE_LIMITED")
            })
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    #[test]
    fn endpoint_includes_query() {
        let url = Url::parse("https://api.github.com/repos/o/r/issues?page=2").unwrap();
        assert_eq!(ApiRequest::get(url).endpoint(), "repos/o/r/issues?page=2");
    }

    #[test]
    fn graphql_detection_requires_post() {
        let url = Url::parse("https://api.github.com/graphql").unwrap();
        assert!(ApiRequest::post_json(url.clone(), json!({})).is_graphql());
        assert!(!ApiRequest::get(url).is_graphql());
    }

    #[test]
    fn retry_after_seconds_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("17"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(17)));
    }

    #[test]
    fn exhausted_budget_advises_wait_until_reset() {
        let now = Utc::now();
        let reset = now.timestamp() + 30;
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_str(&reset.to_string()).unwrap(),
        );
        let wait = retry_advice(&headers, now).expect("advice");
        assert!(wait <= Duration::from_secs(30));
        assert!(wait >= Duration::from_secs(28));
    }

    #[test]
    fn remaining_budget_gives_no_advice() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("12"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));
        assert!(retry_advice(&headers, Utc::now()).is_none());
    }

    #[test]
    fn graphql_rate_limit_payload_detected() {
        let body = json!({"errors": [{"type": "RATE_LIMITED", "message": "slow down"}]});
        assert!(graphql_rate_limited(body.to_string().as_bytes()));
        let other = json!({"errors": [{"type": "NOT_FOUND"}]});
        assert!(!graphql_rate_limited(other.to_string().as_bytes()));
        assert!(!graphql_rate_limited(b"not json"));
    }
}
