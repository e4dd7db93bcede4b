use crate::error::{PanelError, PanelResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single typed cell of the record table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Parse a raw table cell: integer first, then float, then text
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<i64>() {
            FieldValue::Int(v)
        } else if let Ok(v) = raw.parse::<f64>() {
            FieldValue::Float(v)
        } else {
            FieldValue::Text(raw.to_string())
        }
    }

    /// Placeholder for an empty cell; renders as `nan`
    pub fn missing() -> Self {
        FieldValue::Float(f64::NAN)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Float(v) if v.is_nan())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            // Integral floats show up when a key column passes through a float-typed export
            FieldValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => f.write_str(&float_repr(*v)),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Shortest round-trip form, switching to exponent notation below 1e-4 and
/// from 1e16 up
fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return format!("{:.1}", v);
    }

    let shortest = format!("{:e}", v);
    let (mantissa, exp) = match shortest.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (shortest.as_str(), 0),
    };
    if !(-4..16).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else if v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Equatorial sky position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    pub ra: f64,
    pub dec: f64,
}

impl SkyCoord {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }
}

/// Names of the columns the layout engine reads directly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub image_key: String,
    pub ra_fg: String,
    pub dec_fg: String,
    pub ra_bg: String,
    pub dec_bg: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            image_key: "index_FG".to_string(),
            ra_fg: "Ra_FG".to_string(),
            dec_fg: "Dec_FG".to_string(),
            ra_bg: "Ra_BG".to_string(),
            dec_bg: "Dec_BG".to_string(),
        }
    }
}

/// One row of object metadata.
///
/// `fields` holds every column of the row, including the key and coordinate
/// columns, so templates can reference any of them by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub row: usize,
    pub image_key: i64,
    pub foreground: Option<SkyCoord>,
    pub background: Option<SkyCoord>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Build a record from a flat row. The image key column is mandatory;
    /// coordinates are optional and only required once markers are drawn.
    pub fn from_fields(
        row: usize,
        fields: BTreeMap<String, FieldValue>,
        columns: &ColumnNames,
    ) -> PanelResult<Self> {
        let image_key = fields
            .get(&columns.image_key)
            .and_then(FieldValue::as_i64)
            .ok_or_else(|| PanelError::MissingField {
                row,
                field: columns.image_key.clone(),
            })?;

        // Empty coordinate cells count as absent
        let coord = |ra: &str, dec: &str| -> Option<SkyCoord> {
            let ra = fields.get(ra)?.as_f64().filter(|v| !v.is_nan())?;
            let dec = fields.get(dec)?.as_f64().filter(|v| !v.is_nan())?;
            Some(SkyCoord::new(ra, dec))
        };
        let foreground = coord(&columns.ra_fg, &columns.dec_fg);
        let background = coord(&columns.ra_bg, &columns.dec_bg);

        Ok(Self {
            row,
            image_key,
            foreground,
            background,
            fields,
        })
    }

    /// Foreground and background positions, both required for the offset marker
    pub fn sky_pair(&self, columns: &ColumnNames) -> PanelResult<(SkyCoord, SkyCoord)> {
        let fg = self.foreground.ok_or_else(|| PanelError::MissingField {
            row: self.row,
            field: format!("{}/{}", columns.ra_fg, columns.dec_fg),
        })?;
        let bg = self.background.ok_or_else(|| PanelError::MissingField {
            row: self.row,
            field: format!("{}/{}", columns.ra_bg, columns.dec_bg),
        })?;
        Ok((fg, bg))
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Ordered record table; order defines the default pagination order
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}

/// Records shown on one panel: a contiguous window of the table or a random sample
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a> {
    records: Vec<&'a Record>,
}

impl<'a> Page<'a> {
    pub fn new(records: Vec<&'a Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[&'a Record] {
        &self.records
    }

    /// Table rows of the records on this page, in page order
    pub fn rows(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, FieldValue)]) -> BTreeMap<String, FieldValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_field_value_parse() {
        assert_eq!(FieldValue::parse("42"), FieldValue::Int(42));
        assert_eq!(FieldValue::parse(" 1.5 "), FieldValue::Float(1.5));
        assert_eq!(FieldValue::parse("NGC 1"), FieldValue::Text("NGC 1".into()));
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Float(10.0).to_string(), "10.0");
        assert_eq!(FieldValue::Float(0.25).to_string(), "0.25");
        assert_eq!(FieldValue::Int(-3).to_string(), "-3");
        assert_eq!(FieldValue::Float(-2.0).to_string(), "-2.0");
    }

    #[test]
    fn test_field_value_display_extremes() {
        assert_eq!(FieldValue::Float(0.00001).to_string(), "1e-05");
        assert_eq!(FieldValue::Float(0.0001).to_string(), "0.0001");
        assert_eq!(FieldValue::Float(1.5e-7).to_string(), "1.5e-07");
        assert_eq!(FieldValue::Float(1e17).to_string(), "1e+17");
        assert_eq!(FieldValue::Float(1e15).to_string(), "1000000000000000.0");
        assert_eq!(FieldValue::Float(-2.5e20).to_string(), "-2.5e+20");
        assert_eq!(FieldValue::missing().to_string(), "nan");
        assert_eq!(FieldValue::Float(f64::INFINITY).to_string(), "inf");
        assert_eq!(FieldValue::Float(f64::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(FieldValue::Float(0.0).to_string(), "0.0");
    }

    #[test]
    fn test_record_requires_image_key() {
        let columns = ColumnNames::default();
        let err = Record::from_fields(7, row(&[("z", 0.1.into())]), &columns).unwrap_err();
        match err {
            PanelError::MissingField { row, field } => {
                assert_eq!(row, 7);
                assert_eq!(field, "index_FG");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_record_coordinates_optional() {
        let columns = ColumnNames::default();
        let record = Record::from_fields(
            0,
            row(&[("index_FG", FieldValue::Int(3)), ("Ra_FG", 10.0.into()), ("Dec_FG", 0.0.into())]),
            &columns,
        )
        .unwrap();
        assert_eq!(record.image_key, 3);
        assert_eq!(record.foreground, Some(SkyCoord::new(10.0, 0.0)));
        assert!(record.background.is_none());
        assert!(record.sky_pair(&columns).is_err());
    }

    #[test]
    fn test_empty_coordinate_cells_are_absent() {
        let columns = ColumnNames::default();
        let record = Record::from_fields(
            0,
            row(&[
                ("index_FG", FieldValue::Int(1)),
                ("Ra_FG", 10.0.into()),
                ("Dec_FG", FieldValue::missing()),
            ]),
            &columns,
        )
        .unwrap();
        assert!(record.foreground.is_none());
        assert!(record.get("Dec_FG").is_some_and(FieldValue::is_missing));
    }
}
