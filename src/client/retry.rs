use crate::client::MeasurementClient;
use crate::model::{DateRange, FetchError, KeywordGroup, Measurement, Segment};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Wraps a client and repeats calls that failed for transient reasons:
/// transport errors, HTTP 429 and 5xx responses. Other upstream errors return immediately.
pub struct RetryingClient<C> {
    inner: C,
    retries: u32,
    backoff: Duration,
}

impl<C> RetryingClient<C> {
    pub fn new(inner: C, retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            retries,
            backoff,
        }
    }

    fn is_transient(err: &FetchError) -> bool {
        match err {
            FetchError::Transport { .. } => true,
            FetchError::Upstream { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

#[async_trait::async_trait]
impl<C: MeasurementClient> MeasurementClient for RetryingClient<C> {
    async fn fetch(
        &self,
        batch: &[KeywordGroup],
        segment: Segment,
        range: DateRange,
    ) -> Result<Vec<Measurement>, FetchError> {
        let mut attempt = 0;
        loop {
            match self.inner.fetch(batch, segment, range).await {
                Err(e) if attempt < self.retries && Self::is_transient(&e) => {
                    attempt += 1;
                    warn!(
                        "Fetch failed for segment {} ({}), retry {}/{}",
                        segment, e, attempt, self.retries
                    );
                    sleep(self.backoff * attempt).await;
                }
                other => return other,
            }
        }
    }
}
