use crate::model::{DateRange, FetchError, KeywordGroup, Measurement, Segment};

/// One upstream call: the normalized series of every group in `batch` for a single segment.
///
/// An empty vector is a valid answer and means the upstream had no data for the batch.
#[async_trait::async_trait]
pub trait MeasurementClient: Send + Sync {
    async fn fetch(
        &self,
        batch: &[KeywordGroup],
        segment: Segment,
        range: DateRange,
    ) -> Result<Vec<Measurement>, FetchError>;
}

#[async_trait::async_trait]
impl<C: MeasurementClient + ?Sized> MeasurementClient for std::sync::Arc<C> {
    async fn fetch(
        &self,
        batch: &[KeywordGroup],
        segment: Segment,
        range: DateRange,
    ) -> Result<Vec<Measurement>, FetchError> {
        (**self).fetch(batch, segment, range).await
    }
}
