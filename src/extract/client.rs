//! HTTP client creation and the portal API detail source.

use async_trait::async_trait;
use reqwest::{cookie::Jar, header};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::extractor::DetailSource;
use super::parser::{parse_api_detail, parse_search_result};
use super::types::{RawDetail, Source};
use crate::error::FetchError;
use crate::TARGET_WEB_REQUEST;

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)";
const DETAIL_PATH: &str = "sectoresProductivos/getDescEstandar";
const SEARCH_PATH: &str = "sectoresProductivos/search";

/// Create a client with its own cookie jar, so no session state leaks between work items.
pub fn create_http_client(request_timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let cookie_store = Jar::default();
    reqwest::Client::builder()
        .cookie_store(true)
        .cookie_provider(Arc::new(cookie_store))
        .gzip(true)
        .timeout(request_timeout)
        .redirect(reqwest::redirect::Policy::default())
        .build()
        .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {}", e)))
}

/// Outcome of a single POST: status and body, or an error distinguishing the status class.
pub async fn post(
    client: &reqwest::Client,
    url: &str,
    body: Option<&str>,
    request_timeout: Duration,
) -> Result<String, FetchError> {
    let mut request = client
        .post(url)
        .header(header::USER_AGENT, USER_AGENT)
        .header(header::ACCEPT, "application/json, text/plain, */*")
        .header(header::ACCEPT_LANGUAGE, "es-MX,es;q=0.9,en;q=0.8")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(body) = body {
        request = request.body(body.to_string());
    }

    let response = match timeout(request_timeout, request.send()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(FetchError::Timeout(format!(
                "POST {} exceeded {}s",
                url,
                request_timeout.as_secs()
            )))
        }
    };

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(FetchError::http(status.as_u16(), message));
    }
    Ok(response.text().await?)
}

/// Detail source backed by the portal's JSON endpoint.
pub struct PortalApiSource {
    api_base: String,
    request_timeout: Duration,
}

impl PortalApiSource {
    pub fn new(api_base: &str, request_timeout: Duration) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    fn detail_url(&self, work_item: &str) -> String {
        format!("{}/{}/{}", self.api_base, DETAIL_PATH, work_item)
    }

    fn search_url(&self) -> String {
        format!("{}/{}", self.api_base, SEARCH_PATH)
    }

    fn search_body(work_item: &str) -> String {
        serde_json::json!({ "query": work_item }).to_string()
    }

    /// Request bodies the endpoint has accepted, tried in order.
    fn body_variants(work_item: &str) -> Vec<Option<String>> {
        vec![
            None,
            Some(String::new()),
            Some("{}".to_string()),
            Some(serde_json::json!({ "codigo": work_item }).to_string()),
        ]
    }
}

#[async_trait]
impl DetailSource for PortalApiSource {
    fn source(&self) -> Source {
        Source::Api
    }

    async fn fetch_detail(&self, work_item: &str) -> Result<RawDetail, FetchError> {
        let client = create_http_client(self.request_timeout)?;
        let url = self.detail_url(work_item);
        let mut last_error = FetchError::Malformed("no request body variant accepted".into());

        for body in Self::body_variants(work_item) {
            debug!(target: TARGET_WEB_REQUEST, "POST {} with body {:?}", url, body);
            match post(&client, &url, body.as_deref(), self.request_timeout).await {
                Ok(text) => match parse_api_detail(&text) {
                    Ok(detail) => return Ok(detail),
                    Err(err) => {
                        debug!(target: TARGET_WEB_REQUEST, "Unusable response from {}: {}", url, err);
                        last_error = err;
                    }
                },
                // The endpoint answers 500 to body shapes it does not expect.
                Err(FetchError::Http { status: 500, .. }) => {
                    debug!(target: TARGET_WEB_REQUEST, "{} rejected body {:?} with 500", url, body);
                    last_error = FetchError::http(500, "all body variants rejected");
                }
                Err(err) => return Err(err),
            }
        }

        // Last resort: look the code up through the search endpoint.
        let search_url = self.search_url();
        debug!(target: TARGET_WEB_REQUEST, "Falling back to {} for {}", search_url, work_item);
        let body = Self::search_body(work_item);
        match post(&client, &search_url, Some(&body), self.request_timeout).await {
            Ok(text) => parse_search_result(&text, work_item),
            Err(FetchError::Http { status: 500, .. }) => Err(last_error),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_url() {
        let source = PortalApiSource::new(
            "https://conocer.gob.mx/CONOCERBACKCITAS/",
            Duration::from_secs(30),
        );
        assert_eq!(
            source.detail_url("EC0217.01"),
            "https://conocer.gob.mx/CONOCERBACKCITAS/sectoresProductivos/getDescEstandar/EC0217.01"
        );
    }

    #[test]
    fn test_body_variants_end_with_code() {
        let variants = PortalApiSource::body_variants("EC0001");
        assert_eq!(variants.len(), 4);
        assert_eq!(variants[0], None);
        assert_eq!(variants[3].as_deref(), Some(r#"{"codigo":"EC0001"}"#));
    }

    #[test]
    fn test_search_fallback_request() {
        let source = PortalApiSource::new(
            "https://conocer.gob.mx/CONOCERBACKCITAS",
            Duration::from_secs(30),
        );
        assert_eq!(
            source.search_url(),
            "https://conocer.gob.mx/CONOCERBACKCITAS/sectoresProductivos/search"
        );
        assert_eq!(
            PortalApiSource::search_body("EC0217.01"),
            r#"{"query":"EC0217.01"}"#
        );
    }
}
