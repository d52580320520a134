use crate::analyzer::planner::{Batch, BatchPlanner};
use crate::analyzer::progress::{NoProgress, Progress, ProgressSink};
use crate::analyzer::rescaler::{RescaleOutcome, Rescaler, SkipReason};
use crate::client::MeasurementClient;
use crate::config::AppConfig;
use crate::model::{
    AnalysisError, ConfigError, DateRange, FetchError, KeywordGroup, Measurement, ReferenceSeries, Segment,
    UnifiedResult,
};
use futures::future::join_all;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Per-run query parameters.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub segments: Vec<Segment>,
    pub range: DateRange,
    pub max_groups_per_batch: usize,
}

impl RunSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            segments: config.segments.clone(),
            range: config.date_range()?,
            max_groups_per_batch: config.max_groups_per_batch,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatus {
    /// Established the reference series; all rows were kept as fetched.
    Reference { rows: usize },
    /// Rescaled onto the reference and merged.
    Merged { rows: usize, dropped: usize },
    /// Every segment came back empty or failed.
    Empty,
    /// Data arrived but could not be made comparable.
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
pub struct SegmentFailure {
    pub segment: Segment,
    pub error: FetchError,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub index: usize,
    pub groups: Vec<String>,
    pub status: BatchStatus,
    pub failures: Vec<SegmentFailure>,
}

/// Outcome of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub anchor: String,
    pub result: UnifiedResult,
    pub reports: Vec<BatchReport>,
}

/// The reference is written once, on leaving `AwaitingReference`, and only read afterwards.
enum Phase {
    AwaitingReference,
    Referenced(ReferenceSeries),
}

/// Drives planner, client and rescaler over all batches in order.
pub struct AnalysisOrchestrator<C> {
    client: C,
    settings: RunSettings,
    progress: Box<dyn ProgressSink>,
}

impl<C: MeasurementClient> AnalysisOrchestrator<C> {
    /// Repeated segments are queried once.
    pub fn new(client: C, mut settings: RunSettings) -> Self {
        let mut seen = HashSet::new();
        settings.segments.retain(|s| seen.insert(*s));
        Self {
            client,
            settings,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Runs the whole pipeline. The first group is the anchor. Every run starts
    /// from an empty reference and result.
    pub async fn run(&self, groups: Vec<KeywordGroup>) -> Result<AnalysisRun, AnalysisError> {
        let planner = BatchPlanner::from_groups(groups, self.settings.max_groups_per_batch)
            .ok_or(AnalysisError::NoValidGroups)?;
        let anchor = planner.anchor().name().to_string();
        let rescaler = Rescaler::new(anchor.clone());
        let total = planner.total_batches();
        let started = Instant::now();
        info!(
            "Analysis started - anchor={}, batches={}, segments={:?}",
            anchor, total, self.settings.segments
        );

        let mut phase = Phase::AwaitingReference;
        let mut result = UnifiedResult::new();
        let mut reports = Vec::with_capacity(total);
        let mut last_failure = None;

        for batch in planner.batches() {
            info!("Batch {}/{}: {}", batch.index() + 1, total, batch.label());
            let (frame, failures) = self.fetch_batch(&batch).await;
            if let Some(f) = failures.last() {
                last_failure = Some(format!("batch {} segment {}: {}", batch.index() + 1, f.segment, f.error));
            }

            let (status, established) = match &phase {
                Phase::AwaitingReference => Self::establish_reference(&anchor, frame, &mut result),
                Phase::Referenced(reference) => {
                    (Self::merge_batch(&rescaler, reference, &frame, &mut result), None)
                }
            };
            if let Some(reference) = established {
                debug!("Reference fixed with {} anchor points", reference.len());
                phase = Phase::Referenced(reference);
            }

            match &status {
                BatchStatus::Empty => warn!("Batch {} returned no data, skipping", batch.index() + 1),
                BatchStatus::Skipped(reason) => warn!("Batch {} skipped: {}", batch.index() + 1, reason),
                other => debug!("Batch {} status: {:?}", batch.index() + 1, other),
            }

            reports.push(BatchReport {
                index: batch.index(),
                groups: batch.groups().iter().map(|g| g.name().to_string()).collect(),
                status,
                failures,
            });
            self.progress.on_progress(&Progress {
                completed: batch.index() + 1,
                total,
                label: batch.label(),
            });
        }

        if result.is_empty() {
            error!("No data retrieved for any of {} batch(es)", total);
            return Err(AnalysisError::NoDataRetrieved {
                batches_attempted: total,
                last_failure,
            });
        }

        info!(
            "Analysis completed - duration={:.2}s, rows={}, groups={}",
            started.elapsed().as_secs_f32(),
            result.len(),
            result.group_names().len()
        );
        Ok(AnalysisRun {
            anchor,
            result,
            reports,
        })
    }

    /// Fetches every segment of a batch concurrently and concatenates the rows in
    /// segment order. Failed segments contribute nothing.
    async fn fetch_batch(&self, batch: &Batch) -> (Vec<Measurement>, Vec<SegmentFailure>) {
        let calls = self
            .settings
            .segments
            .iter()
            .map(|&segment| async move {
                (segment, self.client.fetch(batch.groups(), segment, self.settings.range).await)
            });

        let mut frame = Vec::new();
        let mut failures = Vec::new();
        for (segment, outcome) in join_all(calls).await {
            match outcome {
                Ok(rows) => frame.extend(rows),
                Err(error) => {
                    warn!("Batch {} segment {} failed: {}", batch.index() + 1, segment, error);
                    failures.push(SegmentFailure { segment, error });
                }
            }
        }
        (frame, failures)
    }

    fn establish_reference(
        anchor: &str,
        frame: Vec<Measurement>,
        result: &mut UnifiedResult,
    ) -> (BatchStatus, Option<ReferenceSeries>) {
        if frame.is_empty() {
            return (BatchStatus::Empty, None);
        }
        let reference = ReferenceSeries::from_batch(anchor, &frame);
        if reference.is_empty() {
            // Without anchor rows this batch can never be compared with later ones.
            return (BatchStatus::Skipped(SkipReason::EmptyBatchAnchor), None);
        }
        let rows = frame.len();
        result.extend(frame);
        (BatchStatus::Reference { rows }, Some(reference))
    }

    fn merge_batch(
        rescaler: &Rescaler,
        reference: &ReferenceSeries,
        frame: &[Measurement],
        result: &mut UnifiedResult,
    ) -> BatchStatus {
        if frame.is_empty() {
            return BatchStatus::Empty;
        }
        match rescaler.rescale(frame, reference) {
            RescaleOutcome::Skip(reason) => BatchStatus::Skipped(reason),
            RescaleOutcome::Rescaled { rows, dropped, .. } => {
                if dropped > 0 {
                    warn!("{} row(s) had no scale factor and were dropped", dropped);
                }
                let count = rows.len();
                result.extend(rows);
                BatchStatus::Merged { rows: count, dropped }
            }
        }
    }
}
