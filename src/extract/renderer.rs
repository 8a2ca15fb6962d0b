//! Rendered-page detail source driven through a Browserless `/function` endpoint.
//!
//! Every call runs a fresh browser page, so navigation state and cookies of one
//! work item never reach the next.

use async_trait::async_trait;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::client::create_http_client;
use super::extractor::DetailSource;
use super::types::{RawDetail, Source, SETTLE_DELAY};
use crate::error::FetchError;
use crate::TARGET_WEB_REQUEST;

/// Script executed by Browserless: search the code, open its detail view and
/// return the title plus each grid's header and first-column rows.
const DETAIL_SCRIPT: &str = r#"
export default async function ({ page, context }) {
  const { portalUrl, code, navigationTimeout, settleMs } = context;
  const settle = () => new Promise((resolve) => setTimeout(resolve, settleMs));

  await page.goto(portalUrl, { waitUntil: 'networkidle2', timeout: navigationTimeout });
  await settle();

  const search = await page.waitForSelector('input', { timeout: navigationTimeout });
  await search.type(code);
  await page.keyboard.press('Enter');
  await settle();

  const link = await page.waitForSelector(`::-p-text(${code})`, { timeout: 10000 });
  await link.click();
  await settle();

  const data = await page.evaluate(() => {
    const titleEl = document.querySelector('p');
    const tables = [];
    document.querySelectorAll('mat-table, table, [role="grid"]').forEach((table) => {
      const headerEl = table.querySelector('mat-header-cell, th, [role="columnheader"]');
      const header = headerEl?.textContent?.trim() || '';
      const rows = [];
      table.querySelectorAll('mat-row, [role="row"]').forEach((row) => {
        const cell = row.querySelector('mat-cell, [role="gridcell"]');
        const text = cell?.textContent?.trim();
        if (text) rows.push(text);
      });
      tables.push({ header, rows });
    });
    return { title: titleEl?.textContent?.trim() || '', tables };
  });

  return { data, type: 'application/json' };
}
"#;

pub struct BrowserlessSource {
    base_url: String,
    token: Option<String>,
    portal_url: String,
    navigation_timeout: Duration,
}

impl BrowserlessSource {
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        portal_url: &str,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            portal_url: portal_url.to_string(),
            navigation_timeout,
        }
    }

    fn endpoint(&self) -> String {
        let mut endpoint = format!("{}/function", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    // Whole-session ceiling: navigation, search, click and three settle waits.
    fn session_timeout(&self) -> Duration {
        self.navigation_timeout * 2 + SETTLE_DELAY * 3 + Duration::from_secs(10)
    }
}

/// Map a failed Browserless response to the extractor's error taxonomy.
fn classify_script_failure(status: u16, message: String) -> FetchError {
    let lowered = message.to_lowercase();
    if lowered.contains("waiting for selector") || lowered.contains("no element") {
        FetchError::ElementNotFound(message)
    } else if lowered.contains("timeout") {
        FetchError::Timeout(message)
    } else {
        FetchError::http(status, message)
    }
}

#[async_trait]
impl DetailSource for BrowserlessSource {
    fn source(&self) -> Source {
        Source::RenderedPage
    }

    async fn fetch_detail(&self, work_item: &str) -> Result<RawDetail, FetchError> {
        let session_timeout = self.session_timeout();
        let client = create_http_client(session_timeout)?;
        let body = serde_json::json!({
            "code": DETAIL_SCRIPT,
            "context": {
                "portalUrl": self.portal_url,
                "code": work_item,
                "navigationTimeout": self.navigation_timeout.as_millis() as u64,
                "settleMs": SETTLE_DELAY.as_millis() as u64,
            }
        });

        debug!(target: TARGET_WEB_REQUEST, "Rendering detail view for {}", work_item);

        let response = match timeout(session_timeout, client.post(self.endpoint()).json(&body).send()).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::Timeout(format!(
                    "rendering {} exceeded {}s",
                    work_item,
                    session_timeout.as_secs()
                )))
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_script_failure(status.as_u16(), message));
        }

        let text = response.text().await?;
        serde_json::from_str::<RawDetail>(&text)
            .map_err(|e| FetchError::Malformed(format!("unexpected script result: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_with_token() {
        let source = BrowserlessSource::new(
            "http://localhost:3000/",
            Some("secret"),
            "https://conocer.gob.mx/conocer/#/renec",
            Duration::from_secs(60),
        );
        assert_eq!(source.endpoint(), "http://localhost:3000/function?token=secret");
    }

    #[test]
    fn test_classify_script_failure() {
        assert!(matches!(
            classify_script_failure(500, "Waiting for selector `input` failed".into()),
            FetchError::ElementNotFound(_)
        ));
        assert!(matches!(
            classify_script_failure(408, "Navigation timeout of 60000 ms exceeded".into()),
            FetchError::Timeout(_)
        ));
        assert!(matches!(
            classify_script_failure(401, "Unauthorized".into()),
            FetchError::Http { status: 401, .. }
        ));
    }

    #[test]
    fn test_script_result_deserializes() {
        let detail: RawDetail = serde_json::from_str(
            r#"{"title": "EC0001", "tables": [{"header": "Certificador", "rows": ["Instituto ABC"]}]}"#,
        )
        .unwrap();
        assert_eq!(detail.tables.len(), 1);
        assert_eq!(detail.tables[0].rows, vec!["Instituto ABC"]);
    }
}
