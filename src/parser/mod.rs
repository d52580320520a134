// Input-table parsing into raw keyword-group rows

pub mod table_parser;

pub use table_parser::{template_csv, CsvGroupParser, Parser, RawGroupRow};
