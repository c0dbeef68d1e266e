use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use stock_common::ProviderError;

/// Per-request timeout of the shared HTTP client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking client shared by every provider.
pub fn build_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Build `base` + `path` with query parameters.
pub fn url(provider: &str, base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, ProviderError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse_with_params(&raw, params)
        .map_err(|e| ProviderError::new(provider, format!("Failed to build URL: {}", e)))
}

/// GET `url` and decode the JSON body.
///
/// Transport errors are stripped of their URL, which carries the API key.
pub fn get_json<T: DeserializeOwned>(client: &Client, provider: &str, url: Url) -> Result<T, ProviderError> {
    let response = client
        .get(url)
        .send()
        .map_err(|e| ProviderError::new(provider, e.without_url()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ProviderError::new(
            provider,
            format!("HTTP {}: {}", status, body.trim()),
        ));
    }

    response
        .json::<T>()
        .map_err(|e| ProviderError::new(provider, format!("Malformed response: {}", e.without_url())))
}

/// Parse a numeric field that a provider sends as a string.
pub fn parse_number(provider: &str, field: &str, raw: Option<&str>) -> Result<f64, ProviderError> {
    let raw = raw.ok_or_else(|| ProviderError::new(provider, format!("Missing field {}", field)))?;
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|e| ProviderError::new(provider, format!("Bad {} {:?}: {}", field, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let url = url("P", "https://example.com/api/", "/quote", &[("symbol", "AAPL"), ("token", "k")]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/quote?symbol=AAPL&token=k");
    }

    #[test]
    fn parse_number_handles_percent_and_missing() {
        assert_eq!(parse_number("P", "x", Some(" 1.25% ")).unwrap(), 1.25);
        assert!(parse_number("P", "x", None).is_err());
        let err = parse_number("P", "price", Some("n/a")).unwrap_err();
        assert!(err.cause.contains("price"));
    }
}
