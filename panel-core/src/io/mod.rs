//! File format I/O for PanelCreator
//!
//! Readers for the two inputs of a panel run: the record table (CSV, TSV or
//! JSON) and the image cube (NPY).

pub mod npy;
pub mod table;

pub use npy::{read_npy, write_npy, NpyHeader};
pub use table::TableParser;

use crate::error::PanelResult;
use crate::types::{ColumnNames, Table};
use std::path::Path;

/// Detect the table format from the extension and parse accordingly
pub fn load_table<P: AsRef<Path>>(path: P, columns: &ColumnNames) -> PanelResult<Table> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().to_lowercase();

    if path_str.ends_with(".json") {
        return TableParser::parse_json_file(path, columns);
    }
    if path_str.ends_with(".tsv") || path_str.ends_with(".tab") {
        return TableParser::parse_delimited_file(path, '\t', columns);
    }
    if path_str.ends_with(".csv") {
        return TableParser::parse_delimited_file(path, ',', columns);
    }
    auto_detect_and_parse(path, columns)
}

/// Detect the table format by examining the first non-blank line
fn auto_detect_and_parse(path: &Path, columns: &ColumnNames) -> PanelResult<Table> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut first_line = String::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            first_line = line;
            break;
        }
    }

    let trimmed = first_line.trim_start();
    if trimmed.starts_with('[') {
        log::debug!("Detected JSON table in {}", path.display());
        return TableParser::parse_json_file(path, columns);
    }
    let delimiter = if trimmed.contains('\t') { '\t' } else { ',' };
    log::debug!("Detected {:?}-delimited table in {}", delimiter, path.display());
    TableParser::parse_delimited_file(path, delimiter, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_auto_detect_tsv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "index_FG\tz").unwrap();
        writeln!(file, "4\t0.31").unwrap();

        let table = load_table(file.path(), &ColumnNames::default()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].image_key, 4);
    }

    #[test]
    fn test_auto_detect_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"[{{"index_FG": 2, "name": "a"}}]"#).unwrap();

        let table = load_table(file.path(), &ColumnNames::default()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].image_key, 2);
    }
}
