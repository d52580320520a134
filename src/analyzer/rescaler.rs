use crate::model::{Measurement, ReferenceSeries, ScaleFactor, SeriesKey};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Why a batch's non-anchor rows could not be placed on the reference scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The batch carried no rows for the anchor group.
    EmptyBatchAnchor,
    /// No reference series has been established.
    EmptyReference,
    /// Batch anchor and reference share no (date, segment).
    NoOverlap,
    /// Every shared (date, segment) had a zero anchor value in the batch or the reference.
    ZeroAnchor,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::EmptyBatchAnchor => "batch has no anchor rows",
            SkipReason::EmptyReference => "reference series is empty",
            SkipReason::NoOverlap => "anchor and reference share no date/segment",
            SkipReason::ZeroAnchor => "anchor is zero at every shared date/segment",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RescaleOutcome {
    Rescaled {
        rows: Vec<Measurement>,
        factors: Vec<ScaleFactor>,
        /// Non-anchor rows with no usable factor.
        dropped: usize,
    },
    Skip(SkipReason),
}

/// Multiplies each batch's values by `reference / batch_anchor` per (date, segment),
/// which undoes the upstream's per-request normalization against its own maximum.
#[derive(Debug, Clone)]
pub struct Rescaler {
    anchor_name: String,
}

impl Rescaler {
    pub fn new(anchor_name: impl Into<String>) -> Self {
        Self {
            anchor_name: anchor_name.into(),
        }
    }

    /// Positive factors for every (date, segment) where both sides exist and neither
    /// anchor value is zero.
    pub fn scale_factors(
        &self,
        batch: &[Measurement],
        reference: &ReferenceSeries,
    ) -> Result<HashMap<SeriesKey, f64>, SkipReason> {
        if reference.is_empty() {
            return Err(SkipReason::EmptyReference);
        }

        let mut current = batch.iter().filter(|m| m.group_name == self.anchor_name).peekable();
        if current.peek().is_none() {
            return Err(SkipReason::EmptyBatchAnchor);
        }

        let mut factors = HashMap::new();
        let mut joined = 0;
        for anchor in current {
            let Some(ref_value) = reference.get(anchor.date, anchor.segment) else {
                continue;
            };
            joined += 1;
            if anchor.value <= 0.0 || ref_value <= 0.0 {
                debug!(
                    "Zero anchor value at {} / {} (batch {}, reference {}), leaving it unscaled",
                    anchor.date, anchor.segment, anchor.value, ref_value
                );
                continue;
            }
            let factor = ref_value / anchor.value;
            if factor.is_finite() && factor > 0.0 {
                factors.insert((anchor.date, anchor.segment), factor);
            }
        }

        match (joined, factors.is_empty()) {
            (0, _) => Err(SkipReason::NoOverlap),
            (_, true) => Err(SkipReason::ZeroAnchor),
            _ => Ok(factors),
        }
    }

    /// Rescales the non-anchor rows of `batch`. Anchor rows are never returned: the
    /// reference batch is the only record of the anchor series.
    pub fn rescale(&self, batch: &[Measurement], reference: &ReferenceSeries) -> RescaleOutcome {
        let factors = match self.scale_factors(batch, reference) {
            Ok(f) => f,
            Err(reason) => return RescaleOutcome::Skip(reason),
        };

        let mut rows = Vec::new();
        let mut dropped = 0;
        for m in batch.iter().filter(|m| m.group_name != self.anchor_name) {
            match factors.get(&(m.date, m.segment)) {
                Some(factor) => rows.push(Measurement {
                    value: m.value * factor,
                    ..m.clone()
                }),
                None => dropped += 1,
            }
        }

        let mut factors: Vec<ScaleFactor> = factors
            .into_iter()
            .map(|((date, segment), factor)| ScaleFactor {
                date,
                segment,
                factor,
            })
            .collect();
        factors.sort_by_key(|f| (f.date, f.segment));

        RescaleOutcome::Rescaled {
            rows,
            factors,
            dropped,
        }
    }
}
