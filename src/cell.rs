use serde::{Deserialize, Serialize};
use std::fmt;

/// A single parsed cell of an uploaded table
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
}

impl CellValue {
    /// Infer the type of a raw text field
    ///
    /// Empty or whitespace-only fields are missing values. Anything `f64`
    /// accepts is a number, `true`/`false` in any case is a boolean, and
    /// everything else stays text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            // "inf"/"nan" parse as floats but are labels in practice
            if n.is_finite() {
                return CellValue::Number(n);
            }
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => CellValue::Bool(true),
            "false" => CellValue::Bool(false),
            _ => CellValue::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(true) => write!(f, "True"),
            CellValue::Bool(false) => write!(f, "False"),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}
