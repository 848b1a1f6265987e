use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Result, anyhow};

/// A single scalar as it comes out of (or goes into) the queryable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view of the cell. Text is parsed after trimming; booleans map to 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Null => None,
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            Cell::Str(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Integer view of the cell. Floats only qualify when they carry no fraction.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Null => None,
            Cell::Bool(b) => Some(*b as i64),
            Cell::Int(i) => Some(*i),
            Cell::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64
                {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            Cell::Str(s) => {
                let t = s.trim();
                t.parse::<i64>()
                    .ok()
                    .or_else(|| Cell::Float(t.parse::<f64>().ok()?).as_i64())
            }
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::Int(_) => "integer",
            Cell::Float(_) => "float",
            Cell::Str(_) => "text",
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(fl) => write!(f, "{}", fl),
            Cell::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Str(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Str(v)
    }
}

/// Row-oriented table with named columns.
///
/// Every row has exactly `headers.len()` cells; constructors that accept
/// foreign data check this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(anyhow!(
                    "Row {idx}: expected {} cells, got {}",
                    headers.len(),
                    row.len()
                ));
            }
        }
        Ok(Self { headers, rows })
    }

    /// Build a table from named columns of equal length.
    pub fn from_columns(columns: Vec<(String, Vec<Cell>)>) -> Result<Self> {
        let nrows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        if let Some((name, col)) = columns.iter().find(|(_, c)| c.len() != nrows) {
            return Err(anyhow!(
                "Column `{name}` has {} values, expected {nrows}",
                col.len()
            ));
        }

        let headers = columns.iter().map(|(name, _)| name.clone()).collect();
        let mut rows: Vec<Vec<Cell>> = (0..nrows)
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        for (_, col) in columns {
            for (row, cell) in rows.iter_mut().zip(col) {
                row.push(cell);
            }
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate the cells of the named column in row order.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Cell> + use<'a>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_numeric_views() {
        assert_eq!(Cell::Int(3).as_f64(), Some(3.0));
        assert_eq!(Cell::Str(" 2.5 ".into()).as_f64(), Some(2.5));
        assert_eq!(Cell::Float(4.0).as_i64(), Some(4));
        assert_eq!(Cell::Float(4.5).as_i64(), None);
        assert_eq!(Cell::Str("7".into()).as_i64(), Some(7));
        assert_eq!(Cell::Str("7.0".into()).as_i64(), Some(7));
        assert_eq!(Cell::Str("abc".into()).as_i64(), None);
        assert_eq!(Cell::Null.as_f64(), None);
        assert_eq!(Cell::Bool(true).as_i64(), Some(1));
    }

    #[test]
    fn cell_serializes_untagged() {
        let cells = vec![Cell::Null, Cell::Int(1), Cell::Float(0.5), Cell::from("x")];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"[null,1,0.5,"x"]"#);
    }

    #[test]
    fn table_rejects_ragged_rows() {
        let result = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![Cell::Int(1), Cell::Int(2)], vec![Cell::Int(3)]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn table_from_columns_transposes() {
        let table = Table::from_columns(vec![
            ("id".into(), vec![Cell::Int(1), Cell::Int(2)]),
            ("name".into(), vec![Cell::from("a"), Cell::from("b")]),
        ])
        .unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.rows()[1], vec![Cell::Int(2), Cell::from("b")]);
        let names: Vec<&Cell> = table.column("name").unwrap().collect();
        assert_eq!(names, vec![&Cell::from("a"), &Cell::from("b")]);
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn table_from_columns_rejects_uneven_lengths() {
        let result = Table::from_columns(vec![
            ("id".into(), vec![Cell::Int(1), Cell::Int(2)]),
            ("name".into(), vec![Cell::from("a")]),
        ]);
        assert!(result.is_err());
    }
}
