// Analyzer module: batching, cross-batch rescaling and the run pipeline.

pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod rescaler;

pub use orchestrator::{AnalysisOrchestrator, AnalysisRun, BatchReport, BatchStatus, RunSettings, SegmentFailure};
pub use planner::{Batch, BatchPlanner};
pub use progress::{LogProgress, NoProgress, Progress, ProgressSink};
pub use rescaler::{RescaleOutcome, Rescaler, SkipReason};
