// Core structs: KeywordGroup, Measurement, ReferenceSeries, UnifiedResult
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A named set of search terms queried together as one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordGroup {
    name: String,
    terms: Vec<String>,
}

impl KeywordGroup {
    /// Builds a group, trimming and deduplicating terms while keeping their order.
    pub fn new<I, S>(name: impl Into<String>, terms: I) -> Result<Self, InputError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(InputError::InvalidGroup {
                name,
                reason: "empty name".into(),
            });
        }

        let mut seen = HashSet::new();
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.into().trim().to_string())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.clone()))
            .collect();

        if terms.is_empty() {
            return Err(InputError::InvalidGroup {
                name,
                reason: "no search terms".into(),
            });
        }

        Ok(Self { name, terms })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

/// Demographic partition the upstream API is queried for separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Male,
    Female,
    All,
}

impl Segment {
    /// Value of the `gender` request field.
    pub fn api_code(&self) -> &'static str {
        match self {
            Segment::Male => "m",
            Segment::Female => "f",
            Segment::All => "",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Segment::Male => "Male",
            Segment::Female => "Female",
            Segment::All => "All",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::Invalid {
                reason: format!("start date {} is after end date {}", start, end),
            });
        }
        Ok(Self { start, end })
    }
}

/// One normalized search-interest value. Only comparable with values from the
/// same batch and segment until it has been rescaled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub date: NaiveDate,
    pub group_name: String,
    pub value: f64,
    pub segment: Segment,
}

/// Join key shared by the reference series and per-batch scale factors.
pub type SeriesKey = (NaiveDate, Segment);

/// Anchor values from the first batch that returned data for it.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSeries {
    values: HashMap<SeriesKey, f64>,
}

impl ReferenceSeries {
    /// Collects the anchor rows of a fetched batch.
    pub fn from_batch(anchor_name: &str, batch: &[Measurement]) -> Self {
        let values = batch
            .iter()
            .filter(|m| m.group_name == anchor_name)
            .map(|m| ((m.date, m.segment), m.value))
            .collect();
        Self { values }
    }

    pub fn get(&self, date: NaiveDate, segment: Segment) -> Option<f64> {
        self.values.get(&(date, segment)).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor {
    pub date: NaiveDate,
    pub segment: Segment,
    pub factor: f64,
}

/// Append-only collection of measurements on the reference scale.
#[derive(Debug, Clone, Default)]
pub struct UnifiedResult {
    rows: Vec<Measurement>,
}

impl UnifiedResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = Measurement>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[Measurement] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct group names in order of first appearance.
    pub fn group_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .map(|m| m.group_name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Rows belonging to a single group.
    pub fn series<'a>(&'a self, group_name: &'a str) -> impl Iterator<Item = &'a Measurement> + 'a {
        self.rows.iter().filter(move |m| m.group_name == group_name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing credential: {which}")]
    MissingCredentials { which: &'static str },
    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse input table: {0}")]
    Csv(#[from] csv::Error),
    #[error("no group name column found (headers: {headers:?})")]
    MissingNameColumn { headers: Vec<String> },
    #[error("invalid group {name:?}: {reason}")]
    InvalidGroup { name: String, reason: String },
    #[error("input contains no valid keyword groups")]
    NoValidGroups,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("upstream responded with HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("transport failure: {cause}")]
    Transport { cause: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("no valid keyword groups to analyze")]
    NoValidGroups,
    #[error("no data retrieved after {batches_attempted} batch(es){}", failure_suffix(.last_failure))]
    NoDataRetrieved {
        batches_attempted: usize,
        last_failure: Option<String>,
    },
}

fn failure_suffix(last_failure: &Option<String>) -> String {
    match last_failure {
        Some(failure) => format!("; last failure: {}", failure),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode table: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn keyword_group_dedupes_terms_in_order() {
        let group = KeywordGroup::new(" Shoes ", ["Shoes", "sneakers", " Shoes", "", "boots", "sneakers"]).unwrap();
        assert_eq!(group.name(), "Shoes");
        assert_eq!(group.terms(), ["Shoes", "sneakers", "boots"]);
    }

    #[test]
    fn keyword_group_rejects_empty_name_and_terms() {
        assert!(matches!(
            KeywordGroup::new("  ", ["a"]),
            Err(InputError::InvalidGroup { .. })
        ));
        assert!(matches!(
            KeywordGroup::new("a", Vec::<String>::new()),
            Err(InputError::InvalidGroup { .. })
        ));
    }

    #[test]
    fn reference_series_keeps_only_anchor_rows() {
        let batch = vec![
            Measurement { date: ym(2024, 1), group_name: "A".into(), value: 100.0, segment: Segment::Male },
            Measurement { date: ym(2024, 1), group_name: "B".into(), value: 30.0, segment: Segment::Male },
            Measurement { date: ym(2024, 1), group_name: "A".into(), value: 80.0, segment: Segment::Female },
        ];
        let reference = ReferenceSeries::from_batch("A", &batch);
        assert_eq!(reference.len(), 2);
        assert_eq!(reference.get(ym(2024, 1), Segment::Female), Some(80.0));
        assert_eq!(reference.get(ym(2024, 2), Segment::Male), None);
    }

    #[test]
    fn unified_result_lists_groups_by_first_appearance() {
        let mut result = UnifiedResult::new();
        for name in ["A", "C", "A", "B"] {
            result.extend([Measurement { date: ym(2024, 1), group_name: name.into(), value: 1.0, segment: Segment::All }]);
        }
        assert_eq!(result.group_names(), vec!["A", "C", "B"]);
        assert_eq!(result.series("A").count(), 2);
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        assert!(DateRange::new(ym(2024, 2), ym(2024, 1)).is_err());
        assert!(DateRange::new(ym(2024, 1), ym(2024, 1)).is_ok());
    }
}
