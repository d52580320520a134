// Keyword table parsing: locates the name and keyword columns by header
use crate::model::InputError;
use csv::ReaderBuilder;
use std::fs;
use std::path::Path;
use tracing::debug;

const NAME_HEADERS: &[&str] = &["groupname", "그룹명", "항목"];
const KEYWORD_HEADERS: &[&str] = &["keywords", "키워드", "연관검색어"];

/// One input row before validation. `keywords` is the unsplit cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGroupRow {
    pub name: String,
    pub keywords: Option<String>,
}

pub trait Parser {
    fn parse(&self, input: &str) -> Result<Vec<RawGroupRow>, InputError>;

    fn parse_file(&self, path: &Path) -> Result<Vec<RawGroupRow>, InputError> {
        let content = fs::read_to_string(path)?;
        self.parse(&content)
    }
}

pub struct CsvGroupParser;

impl CsvGroupParser {
    pub fn new() -> Self {
        Self
    }

    fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
        headers
            .iter()
            .position(|h| candidates.contains(&h.trim().to_lowercase().as_str()))
    }
}

impl Default for CsvGroupParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for CsvGroupParser {
    fn parse(&self, input: &str) -> Result<Vec<RawGroupRow>, InputError> {
        // Spreadsheet exports often start with a byte order mark.
        let input = input.trim_start_matches('\u{feff}');
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_reader(input.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let name_col = Self::find_column(&headers, NAME_HEADERS)
            .ok_or_else(|| InputError::MissingNameColumn { headers: headers.clone() })?;
        let keyword_col = Self::find_column(&headers, KEYWORD_HEADERS);
        debug!("Input columns: name={}, keywords={:?}", name_col, keyword_col);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let name = record.get(name_col).unwrap_or("").to_string();
            let keywords = keyword_col
                .and_then(|col| record.get(col))
                .map(|cell| cell.to_string())
                .filter(|cell| !cell.trim().is_empty());
            rows.push(RawGroupRow { name, keywords });
        }

        Ok(rows)
    }
}

/// Starter table written by the `template` command.
pub fn template_csv() -> String {
    [
        "GroupName,Keywords",
        "*Rows starting with an asterisk are ignored. The first group is the anchor.,",
        "running shoes,\"running shoe,jogging shoes\"",
        "trail shoes,\"trail running shoes\"",
        "walking shoes,",
    ]
    .join("\n")
        + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_headers_case_insensitively() {
        let input = "Index,GROUPNAME,Keywords\n1,Alpha,\"a1, a2\"\n2,Beta,\n";
        let rows = CsvGroupParser::new().parse(input).unwrap();
        assert_eq!(
            rows,
            vec![
                RawGroupRow { name: "Alpha".into(), keywords: Some("a1, a2".into()) },
                RawGroupRow { name: "Beta".into(), keywords: None },
            ]
        );
    }

    #[test]
    fn accepts_korean_headers_and_bom() {
        let input = "\u{feff}그룹명,연관검색어\n러닝화,\"러닝,조깅\"\n";
        let rows = CsvGroupParser::new().parse(input).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "러닝화");
        assert_eq!(rows[0].keywords.as_deref(), Some("러닝,조깅"));
    }

    #[test]
    fn keyword_column_is_optional() {
        let rows = CsvGroupParser::new().parse("항목\nA\nB\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.keywords.is_none()));
    }

    #[test]
    fn missing_name_column_is_an_error() {
        let err = CsvGroupParser::new().parse("title,keywords\nA,a\n").unwrap_err();
        match err {
            InputError::MissingNameColumn { headers } => assert_eq!(headers, vec!["title", "keywords"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn template_parses_back() {
        let rows = CsvGroupParser::new().parse(&template_csv()).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].name.starts_with('*'));
    }
}
