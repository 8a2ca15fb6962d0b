//! Per-work-item extraction with bounded retries.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use super::types::{ExtractionRecord, RawDetail, Source, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use crate::error::{ExtractionFailure, FetchError};
use crate::TARGET_WEB_REQUEST;

/// A collaborator able to reach one work item's detail view.
///
/// Implementations must give every call its own isolated session.
#[async_trait]
pub trait DetailSource: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch_detail(&self, work_item: &str) -> Result<RawDetail, FetchError>;
}

/// Anything that turns a work-item code into an extraction record.
#[async_trait]
pub trait ItemExtractor: Send + Sync {
    async fn extract(&self, work_item: &str) -> Result<ExtractionRecord, ExtractionFailure>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }
}

/// Tries each configured source in order on every attempt; the first usable payload wins.
pub struct Extractor {
    sources: Vec<Arc<dyn DetailSource>>,
    policy: RetryPolicy,
}

impl Extractor {
    pub fn new(sources: Vec<Arc<dyn DetailSource>>, policy: RetryPolicy) -> Self {
        Self { sources, policy }
    }

    /// One pass over all sources. Returns the record, or the most relevant error
    /// and whether any source failed in a way worth retrying.
    async fn attempt(&self, work_item: &str) -> Result<ExtractionRecord, (FetchError, bool)> {
        let mut last_error = FetchError::Network("no detail sources configured".into());
        let mut retryable = false;

        for source in &self.sources {
            let kind = source.source();
            let outcome = source
                .fetch_detail(work_item)
                .await
                .and_then(|detail| {
                    let payload = detail.into_payload();
                    if payload.is_uninformative() {
                        Err(FetchError::Empty)
                    } else {
                        Ok(payload)
                    }
                });

            match outcome {
                Ok(payload) => {
                    return Ok(ExtractionRecord {
                        work_item: work_item.to_string(),
                        payload,
                        extracted_at: Utc::now(),
                        source: kind,
                    });
                }
                Err(err) => {
                    debug!(target: TARGET_WEB_REQUEST, "{} via {} failed: {}", work_item, kind, err);
                    retryable |= err.is_transient();
                    last_error = err;
                }
            }
        }

        Err((last_error, retryable))
    }
}

#[async_trait]
impl ItemExtractor for Extractor {
    async fn extract(&self, work_item: &str) -> Result<ExtractionRecord, ExtractionFailure> {
        let max_attempts = self.policy.max_attempts();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.attempt(work_item).await {
                Ok(record) => {
                    info!(
                        target: TARGET_WEB_REQUEST,
                        "{}: {} certifiers, {} courses via {}",
                        work_item,
                        record.payload.certifiers.len(),
                        record.payload.courses.len(),
                        record.source
                    );
                    return Ok(record);
                }
                Err((err, retryable)) => {
                    if !retryable || attempts >= max_attempts {
                        warn!(target: TARGET_WEB_REQUEST, "{}: giving up after {} attempt(s): {}", work_item, attempts, err);
                        return Err(ExtractionFailure {
                            work_item: work_item.to_string(),
                            attempts,
                            last_error: err,
                        });
                    }
                    info!(target: TARGET_WEB_REQUEST, "Retrying {} ({}/{}) after: {}", work_item, attempts, self.policy.max_retries, err);
                    sleep(self.policy.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::types::LabeledTable;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with `error` for the first `failures` calls, then returns `detail`.
    struct FlakySource {
        kind: Source,
        failures: usize,
        error: FetchError,
        detail: RawDetail,
        calls: AtomicUsize,
    }

    impl FlakySource {
        fn new(kind: Source, failures: usize, error: FetchError, detail: RawDetail) -> Self {
            Self {
                kind,
                failures,
                error,
                detail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DetailSource for FlakySource {
        fn source(&self) -> Source {
            self.kind
        }

        async fn fetch_detail(&self, _work_item: &str) -> Result<RawDetail, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(self.detail.clone())
            }
        }
    }

    fn certifier_detail() -> RawDetail {
        RawDetail {
            title: "Impartición de cursos".to_string(),
            tables: vec![LabeledTable {
                header: "Certificador".to_string(),
                rows: vec!["Instituto ABC S.A. de C.V.".to_string()],
            }],
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let source = Arc::new(FlakySource::new(
            Source::RenderedPage,
            2,
            FetchError::Timeout("goto".into()),
            certifier_detail(),
        ));
        let extractor = Extractor::new(vec![source.clone() as Arc<dyn DetailSource>], fast_policy());

        let record = extractor.extract("EC0001").await.unwrap();
        assert_eq!(record.work_item, "EC0001");
        assert_eq!(record.source, Source::RenderedPage);
        assert_eq!(record.payload.certifiers, vec!["Instituto ABC S.A. de C.V."]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_ceiling() {
        let source = Arc::new(FlakySource::new(
            Source::RenderedPage,
            usize::MAX,
            FetchError::ElementNotFound("input".into()),
            certifier_detail(),
        ));
        let extractor = Extractor::new(vec![source.clone() as Arc<dyn DetailSource>], fast_policy());

        let failure = extractor.extract("EC0002").await.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert!(matches!(failure.last_error, FetchError::ElementNotFound(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_extraction_is_a_failure_without_retry() {
        let source = Arc::new(FlakySource::new(
            Source::Api,
            0,
            FetchError::Empty,
            RawDetail::default(),
        ));
        let extractor = Extractor::new(vec![source.clone() as Arc<dyn DetailSource>], fast_policy());

        let failure = extractor.extract("EC0003").await.unwrap_err();
        assert!(matches!(failure.last_error, FetchError::Empty));
        assert_eq!(failure.attempts, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_second_source() {
        let api = Arc::new(FlakySource::new(
            Source::Api,
            usize::MAX,
            FetchError::http(403, "forbidden"),
            certifier_detail(),
        ));
        let rendered = Arc::new(FlakySource::new(
            Source::RenderedPage,
            0,
            FetchError::Empty,
            certifier_detail(),
        ));
        let extractor = Extractor::new(
            vec![
                api.clone() as Arc<dyn DetailSource>,
                rendered as Arc<dyn DetailSource>,
            ],
            fast_policy(),
        );

        let record = extractor.extract("EC0004").await.unwrap();
        assert_eq!(record.source, Source::RenderedPage);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_title_only_record_is_accepted() {
        let detail = RawDetail {
            title: "Atención al cliente".to_string(),
            tables: Vec::new(),
        };
        let source = Arc::new(FlakySource::new(Source::Api, 0, FetchError::Empty, detail));
        let extractor = Extractor::new(vec![source as Arc<dyn DetailSource>], fast_policy());

        let record = extractor.extract("EC0005").await.unwrap();
        assert!(record.payload.certifiers.is_empty());
        assert_eq!(record.payload.title, "Atención al cliente");
    }
}
