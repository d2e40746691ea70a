use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

const USER_AGENT: &str = concat!("adaptive-tuner/", env!("CARGO_PKG_VERSION"));

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates an HTTP client that retries transient failures.
    ///
    /// Exponential backoff, at most 3 retries. `timeout` bounds each attempt.
    pub fn create_client(timeout: Duration) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}

/// Appends URL-encoded query parameters to `base_url`.
///
/// reqwest-middleware's request builder has no `.query()`, so the query string is built here.
pub fn build_url_with_query<K, V>(base_url: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if params.is_empty() {
        return base_url.to_string();
    }

    let query_string: String = params
        .iter()
        .map(|(k, v)| format!("{}={}", url_encode(k.as_ref()), url_encode(v.as_ref())))
        .collect::<Vec<_>>()
        .join("&");

    if base_url.contains('?') {
        format!("{}&{}", base_url, query_string)
    } else {
        format!("{}?{}", base_url, query_string)
    }
}

/// Percent-encodes a path segment or query component.
pub fn url_encode(s: &str) -> String {
    let mut encoded = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_with_query() {
        assert_eq!(
            build_url_with_query("https://h/p", &[("range", "6mo"), ("interval", "1d")]),
            "https://h/p?range=6mo&interval=1d"
        );
        assert_eq!(
            build_url_with_query("https://h/p?a=1", &[("b", "x y")]),
            "https://h/p?a=1&b=x%20y"
        );
        assert_eq!(build_url_with_query::<&str, &str>("https://h/p", &[]), "https://h/p");
    }

    #[test]
    fn test_url_encode_index_symbol() {
        assert_eq!(url_encode("^VIX"), "%5EVIX");
        assert_eq!(url_encode("BRK-B"), "BRK-B");
    }
}
