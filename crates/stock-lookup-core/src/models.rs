//! Core data models: tabular rows as they arrive from a source and the typed
//! product records the catalog is built from.

use serde::{Deserialize, Serialize};

/// A single cell value from a tabular source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Empty,
}

impl RawValue {
    /// Renders the cell as an identifier.
    ///
    /// Whole numbers lose their fractional part, so a numeric `100234.0`
    /// cell reads as `"100234"`.
    pub fn to_code(&self) -> String {
        match self {
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            RawValue::Number(n) => n.to_string(),
            RawValue::Empty => String::new(),
        }
    }

    /// Renders the cell as display text.
    pub fn to_text(&self) -> String {
        match self {
            RawValue::Text(s) => s.trim().to_string(),
            other => other.to_code(),
        }
    }

    /// Interprets the cell as a quantity. Empty cells count as zero.
    ///
    /// Text cells are accepted when they parse as a number, with either a
    /// dot or a comma as decimal separator and optional spaces between
    /// digit groups.
    pub fn to_quantity(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) if n.is_finite() => Some(*n),
            RawValue::Number(_) => None,
            RawValue::Empty => Some(0.0),
            RawValue::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .map(|c| if c == ',' { '.' } else { c })
                    .collect();
                if cleaned.is_empty() {
                    return Some(0.0);
                }
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
    }
}

/// One row from a tabular source: column header → cell, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    cells: Vec<(String, RawValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: RawValue) {
        self.cells.push((column.into(), value));
    }

    /// Convenience constructor used by tests and in-memory sources.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, RawValue)>,
        K: Into<String>,
    {
        Self {
            cells: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Looks up a cell by header, ignoring case and surrounding whitespace.
    pub fn get(&self, column: &str) -> Option<&RawValue> {
        let wanted = normalize_column(column);
        self.cells
            .iter()
            .find(|(name, _)| normalize_column(name) == wanted)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| match v {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(_) => false,
        })
    }
}

/// Header canonicalization: trimmed and lowercased.
pub fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Which source columns hold the four required product fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default = "default_code_column")]
    pub code: String,
    #[serde(default = "default_name_column")]
    pub name: String,
    #[serde(default = "default_on_hand_column")]
    pub on_hand: String,
    #[serde(default = "default_reserved_column")]
    pub reserved: String,
}

fn default_code_column() -> String {
    "материал".to_string()
}
fn default_name_column() -> String {
    "наименование".to_string()
}
fn default_on_hand_column() -> String {
    "в наличии".to_string()
}
fn default_reserved_column() -> String {
    "в резерве".to_string()
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            code: default_code_column(),
            name: default_name_column(),
            on_hand: default_on_hand_column(),
            reserved: default_reserved_column(),
        }
    }
}

/// An immutable catalog entry.
///
/// `normalized_tokens` and `normalized_name` are derived from `name` once,
/// when the catalog is built, and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub code: String,
    pub name: String,
    pub normalized_tokens: Vec<String>,
    pub normalized_name: String,
    pub quantity_on_hand: f64,
    pub quantity_reserved: f64,
}

impl ProductRecord {
    pub fn in_stock(&self) -> bool {
        self.quantity_on_hand > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_code_drops_fraction() {
        assert_eq!(RawValue::Number(100234.0).to_code(), "100234");
        assert_eq!(RawValue::Number(12.5).to_code(), "12.5");
        assert_eq!(RawValue::Text("  A100 ".into()).to_code(), "A100");
    }

    #[test]
    fn test_quantity_parsing() {
        assert_eq!(RawValue::Number(4.6).to_quantity(), Some(4.6));
        assert_eq!(RawValue::Empty.to_quantity(), Some(0.0));
        assert_eq!(RawValue::Text("1 250,5".into()).to_quantity(), Some(1250.5));
        assert_eq!(RawValue::Text("".into()).to_quantity(), Some(0.0));
        assert_eq!(RawValue::Text("много".into()).to_quantity(), None);
        assert_eq!(RawValue::Number(f64::NAN).to_quantity(), None);
    }

    #[test]
    fn test_column_lookup_ignores_case_and_whitespace() {
        let row = RawRecord::from_pairs([
            ("  Материал ", RawValue::Text("A100".into())),
            ("В НАЛИЧИИ", RawValue::Number(5.0)),
        ]);
        assert_eq!(row.get("материал"), Some(&RawValue::Text("A100".into())));
        assert_eq!(row.get(" в наличии"), Some(&RawValue::Number(5.0)));
        assert_eq!(row.get("в резерве"), None);
    }

    #[test]
    fn test_blank_row_detection() {
        let blank = RawRecord::from_pairs([("a", RawValue::Empty), ("b", RawValue::Text(" ".into()))]);
        assert!(blank.is_blank());
        let filled = RawRecord::from_pairs([("a", RawValue::Number(0.0))]);
        assert!(!filled.is_blank());
    }

}
