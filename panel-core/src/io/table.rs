//! Record table parsers
//!
//! Delimited text (CSV/TSV) with a header line, or a JSON array of flat
//! objects. Every column becomes a template field; the key and coordinate
//! columns named by [`ColumnNames`] are additionally decoded into typed
//! record fields. Empty cells, JSON `null`s and keys a JSON row leaves out
//! are kept as missing values, which templates render as `nan`.

use crate::error::{PanelError, PanelResult};
use crate::types::{ColumnNames, FieldValue, Record, Table};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parser for record tables
pub struct TableParser;

impl TableParser {
    pub fn parse_delimited_file<P: AsRef<Path>>(
        path: P,
        delimiter: char,
        columns: &ColumnNames,
    ) -> PanelResult<Table> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PanelError::missing_resource(path));
        }
        let reader = BufReader::new(File::open(path)?);
        let table = Self::parse_delimited(reader, delimiter, columns, &path.display().to_string())?;
        log::info!("Loaded {} records from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse delimited text; the first non-comment line is the header
    pub fn parse_delimited<R: BufRead>(
        reader: R,
        delimiter: char,
        columns: &ColumnNames,
        source: &str,
    ) -> PanelResult<Table> {
        let mut header: Option<Vec<String>> = None;
        let mut records = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim_end_matches('\r');
            if trimmed.trim().is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let cells = Self::split_line(trimmed, delimiter)
                .map_err(|msg| PanelError::parse(source, format!("line {}: {}", line_no + 1, msg)))?;

            let names = match &header {
                None => {
                    header = Some(cells.into_iter().map(|c| c.trim().to_string()).collect());
                    continue;
                }
                Some(names) => names,
            };

            if cells.len() != names.len() {
                return Err(PanelError::parse(
                    source,
                    format!(
                        "line {}: expected {} fields, got {}",
                        line_no + 1,
                        names.len(),
                        cells.len()
                    ),
                ));
            }

            let fields: BTreeMap<String, FieldValue> = names
                .iter()
                .zip(cells.iter())
                .map(|(name, cell)| {
                    let value = if cell.trim().is_empty() {
                        FieldValue::missing()
                    } else {
                        FieldValue::parse(cell)
                    };
                    (name.clone(), value)
                })
                .collect();

            records.push(Record::from_fields(records.len(), fields, columns)?);
        }

        Ok(Table::new(header.unwrap_or_default(), records))
    }

    /// Split one line on `delimiter`, honouring double-quoted cells with `""` escapes
    pub fn split_line(line: &str, delimiter: char) -> Result<Vec<String>, String> {
        let mut cells = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    current.push(c);
                }
            } else if c == '"' && current.trim().is_empty() {
                current.clear();
                in_quotes = true;
            } else if c == delimiter {
                cells.push(std::mem::take(&mut current));
            } else {
                current.push(c);
            }
        }

        if in_quotes {
            return Err("unterminated quoted field".to_string());
        }
        cells.push(current);
        Ok(cells)
    }

    pub fn parse_json_file<P: AsRef<Path>>(path: P, columns: &ColumnNames) -> PanelResult<Table> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PanelError::missing_resource(path));
        }
        let text = std::fs::read_to_string(path)?;
        let table = Self::parse_json(&text, columns, &path.display().to_string())?;
        log::info!("Loaded {} records from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse a JSON array of flat objects. The column set is the union of
    /// every object's keys; rows lacking a column get a missing value.
    pub fn parse_json(text: &str, columns: &ColumnNames, source: &str) -> PanelResult<Table> {
        let value: Value = serde_json::from_str(text)?;
        let rows = value
            .as_array()
            .ok_or_else(|| PanelError::parse(source, "expected a JSON array of objects"))?;

        let mut names: Vec<String> = Vec::new();
        let mut parsed = Vec::with_capacity(rows.len());

        for (row, item) in rows.iter().enumerate() {
            let object = item
                .as_object()
                .ok_or_else(|| PanelError::parse(source, format!("row {} is not an object", row)))?;

            let mut fields = BTreeMap::new();
            for (name, value) in object {
                if !names.contains(name) {
                    names.push(name.clone());
                }
                let field = match value {
                    Value::Null => FieldValue::missing(),
                    Value::Bool(b) => FieldValue::Text(if *b { "True" } else { "False" }.to_string()),
                    Value::Number(n) => match n.as_i64() {
                        Some(i) => FieldValue::Int(i),
                        None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
                    },
                    Value::String(s) => FieldValue::Text(s.clone()),
                    Value::Array(_) | Value::Object(_) => {
                        return Err(PanelError::parse(
                            source,
                            format!("row {} field '{}' is not a scalar", row, name),
                        ))
                    }
                };
                fields.insert(name.clone(), field);
            }
            parsed.push(fields);
        }

        let records = parsed
            .into_iter()
            .enumerate()
            .map(|(row, mut fields)| {
                for name in &names {
                    fields.entry(name.clone()).or_insert_with(FieldValue::missing);
                }
                Record::from_fields(row, fields, columns)
            })
            .collect::<PanelResult<Vec<_>>>()?;

        Ok(Table::new(names, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SkyCoord;
    use std::io::Cursor;

    const CSV: &str = "\
# cutout catalogue
index_FG,Ra_FG,Dec_FG,Ra_BG,Dec_BG,name,z
0,10.0,0.0,10.001,0.0,\"lens, A\",0.5
1,20.0,-5.0,20.0,-5.0002,B,

2,30.0,1.0,30.0,1.0,C,0.7
";

    #[test]
    fn test_parse_csv() {
        let table =
            TableParser::parse_delimited(Cursor::new(CSV), ',', &ColumnNames::default(), "mem").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.columns().len(), 7);

        let first = &table.records()[0];
        assert_eq!(first.image_key, 0);
        assert_eq!(first.foreground, Some(SkyCoord::new(10.0, 0.0)));
        assert_eq!(first.background, Some(SkyCoord::new(10.001, 0.0)));
        assert_eq!(first.get("name"), Some(&FieldValue::Text("lens, A".into())));

        // Empty trailing cell is kept as a missing value
        assert!(table.records()[1].get("z").is_some_and(FieldValue::is_missing));
        assert_eq!(table.records()[2].row, 2);
    }

    #[test]
    fn test_empty_key_cell_is_missing_field() {
        let text = "index_FG,name\n0,a\n,b\n";
        let err =
            TableParser::parse_delimited(Cursor::new(text), ',', &ColumnNames::default(), "mem").unwrap_err();
        assert!(matches!(err, PanelError::MissingField { row: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_ragged_rows() {
        let text = "index_FG,z\n0,1,2\n";
        let err =
            TableParser::parse_delimited(Cursor::new(text), ',', &ColumnNames::default(), "mem").unwrap_err();
        assert!(err.to_string().contains("expected 2 fields"));
    }

    #[test]
    fn test_parse_header_only_is_empty_table() {
        let table = TableParser::parse_delimited(
            Cursor::new("index_FG\tz\n"),
            '\t',
            &ColumnNames::default(),
            "mem",
        )
        .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns(), &["index_FG".to_string(), "z".to_string()]);
    }

    #[test]
    fn test_split_line_quotes() {
        assert_eq!(
            TableParser::split_line(r#"a,"b ""q"", c",d"#, ',').unwrap(),
            vec!["a", r#"b "q", c"#, "d"]
        );
        assert!(TableParser::split_line(r#"a,"open"#, ',').is_err());
    }

    #[test]
    fn test_parse_json() {
        let text = r#"[
            {"index_FG": 5, "Ra_FG": 1.5, "Dec_FG": 2, "flag": true, "note": null},
            {"index_FG": 6.0, "name": "x"}
        ]"#;
        let table = TableParser::parse_json(text, &ColumnNames::default(), "mem").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].image_key, 5);
        assert_eq!(table.records()[0].get("flag"), Some(&FieldValue::Text("True".into())));
        assert!(table.records()[0].get("note").is_some_and(FieldValue::is_missing));
        assert_eq!(table.records()[1].image_key, 6);
        // Keys only some rows carry are filled in for the rest
        assert!(table.records()[1].get("flag").is_some_and(FieldValue::is_missing));
        assert_eq!(table.records()[0].get("name").map(|v| v.to_string()), Some("nan".to_string()));
    }

    #[test]
    fn test_parse_json_rejects_nested_values() {
        let text = r#"[{"index_FG": 1, "tags": [1, 2]}]"#;
        let err = TableParser::parse_json(text, &ColumnNames::default(), "mem").unwrap_err();
        assert!(matches!(err, PanelError::Parse { .. }));
    }
}
