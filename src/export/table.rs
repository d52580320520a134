use crate::model::{ExportError, Measurement, UnifiedResult};
use crate::utils::format_date;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct LongRow<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Keyword_Group")]
    group: &'a str,
    #[serde(rename = "Ratio")]
    ratio: f64,
    #[serde(rename = "Gender")]
    segment: &'static str,
}

/// Keeps only the named groups. An empty selection keeps everything.
pub fn select_groups(result: &UnifiedResult, names: &[String]) -> UnifiedResult {
    let mut selected = UnifiedResult::new();
    if names.is_empty() {
        selected.extend(result.rows().iter().cloned());
    } else {
        selected.extend(
            result
                .rows()
                .iter()
                .filter(|m| names.iter().any(|n| n == &m.group_name))
                .cloned(),
        );
    }
    selected
}

/// One row per measurement with columns `Date, Keyword_Group, Ratio, Gender`.
pub fn write_long_csv<W: Write>(rows: &[Measurement], writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for m in rows {
        csv.serialize(LongRow {
            date: format_date(m.date),
            group: &m.group_name,
            ratio: m.value,
            segment: m.segment.label(),
        })?;
    }
    csv.flush()?;
    Ok(())
}

/// Dates by groups, each cell the mean value across segments.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub groups: Vec<String>,
    pub dates: Vec<NaiveDate>,
    /// `cells[date][group]`
    pub cells: Vec<Vec<Option<f64>>>,
}

pub fn pivot(result: &UnifiedResult) -> PivotTable {
    let groups: Vec<String> = result.group_names().into_iter().map(str::to_string).collect();
    let column: HashMap<&str, usize> = groups.iter().enumerate().map(|(i, g)| (g.as_str(), i)).collect();

    let mut sums: BTreeMap<NaiveDate, Vec<(f64, u32)>> = BTreeMap::new();
    for m in result.rows() {
        let row = sums.entry(m.date).or_insert_with(|| vec![(0.0, 0); groups.len()]);
        let cell = &mut row[column[m.group_name.as_str()]];
        cell.0 += m.value;
        cell.1 += 1;
    }

    let dates = sums.keys().copied().collect();
    let cells = sums
        .into_values()
        .map(|row| {
            row.into_iter()
                .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
                .collect()
        })
        .collect();

    PivotTable { groups, dates, cells }
}

pub fn write_pivot_csv<W: Write>(table: &PivotTable, writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    let mut header = vec!["Date".to_string()];
    header.extend(table.groups.iter().cloned());
    csv.write_record(&header)?;

    for (date, row) in table.dates.iter().zip(&table.cells) {
        let mut record = vec![format_date(*date)];
        record.extend(row.iter().map(|cell| cell.map(|v| v.to_string()).unwrap_or_default()));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes `<stem>.csv` and `<stem>_pivot.csv` into `dir`, creating it if needed.
pub fn export_result(result: &UnifiedResult, dir: &Path, stem: &str) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir)?;

    let long_path = dir.join(format!("{}.csv", stem));
    write_long_csv(result.rows(), File::create(&long_path)?)?;

    let pivot_path = dir.join(format!("{}_pivot.csv", stem));
    write_pivot_csv(&pivot(result), File::create(&pivot_path)?)?;

    info!("Saved results: {}, {}", long_path.display(), pivot_path.display());
    Ok(vec![long_path, pivot_path])
}
