// Result export: long-form and pivoted CSV tables

pub mod table;

pub use table::{export_result, pivot, select_groups, write_long_csv, write_pivot_csv, PivotTable};
