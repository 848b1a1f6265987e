//! Feature typing.
//!
//! Raw dataset columns come out of the store as loosely typed cells. The model
//! expects each feature in one of two numeric representations, fixed per
//! column by a [`FeatureSchema`]. The typer validates the requested columns
//! against the dataset and the schema before converting anything, then
//! converts row by row and stops at the first value that does not fit.

use ndarray::Array2;
use schemars::JsonSchema;
use scorecard_types::{Cell, Table};
use serde::{Deserialize, Serialize};

use crate::context::DatasetInfo;

/// Column that identifies a record across input and output.
pub const RECORD_ID_COLUMN: &str = "txn_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int8,
    Float32,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Int8 => write!(f, "int8"),
            ColumnType::Float32 => write!(f, "float32"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Column `{column}` is not present in the dataset")]
    MissingColumn { column: String },
    #[error("Feature `{column}` has no declared type")]
    UntypedFeature { column: String },
    #[error("Target `{column}` must be declared as int8, found {declared}")]
    TargetNotInteger { column: String, declared: ColumnType },
    #[error("No target column was named")]
    NoTarget,
    #[error("Dataset has no rows")]
    EmptyDataset,
    #[error("Column `{column}` row {row}: null is not allowed for {ty}")]
    NullValue {
        column: String,
        row: usize,
        ty: ColumnType,
    },
    #[error("Column `{column}` row {row}: `{value}` is not numeric")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Column `{column}` row {row}: `{value}` is not an integer")]
    NotIntegral {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Column `{column}` row {row}: `{value}` does not fit in {ty}")]
    OutOfRange {
        column: String,
        row: usize,
        value: String,
        ty: ColumnType,
    },
    #[error("Target `{column}` row {row}: expected 0 or 1, found {value}")]
    NonBinaryTarget {
        column: String,
        row: usize,
        value: i8,
    },
}

/// Ordered column name to type mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureSchema {
    columns: Vec<(String, ColumnType)>,
}

impl FeatureSchema {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = (S, ColumnType)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        }
    }

    /// Typing used by the transaction fraud models.
    pub fn transactions() -> Self {
        use ColumnType::*;
        Self::new([
            ("step", Int8),
            ("CASH_OUT", Int8),
            ("TRANSFER", Int8),
            ("errorbalanceOrig", Float32),
            ("errorBalanceDest", Float32),
            ("amount", Float32),
            ("oldbalanceOrig", Float32),
            ("newbalanceOrig", Float32),
            ("oldbalanceDest", Float32),
            ("newbalanceDest", Float32),
            ("isFraud", Int8),
        ])
    }

    pub fn type_of(&self, column: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, ty)| *ty)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnType)> + '_ {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    /// Check the request against the dataset and the schema without
    /// converting any value.
    pub fn validate(&self, table: &Table, info: &DatasetInfo) -> Result<(), SchemaError> {
        let target = info.target_name()?;

        for column in info
            .feature_names
            .iter()
            .map(String::as_str)
            .chain([target, RECORD_ID_COLUMN])
        {
            if !table.has_column(column) {
                return Err(SchemaError::MissingColumn {
                    column: column.to_string(),
                });
            }
        }

        for feature in &info.feature_names {
            if self.type_of(feature).is_none() {
                return Err(SchemaError::UntypedFeature {
                    column: feature.clone(),
                });
            }
        }

        match self.type_of(target) {
            None => {
                return Err(SchemaError::UntypedFeature {
                    column: target.to_string(),
                });
            }
            Some(ColumnType::Float32) => {
                return Err(SchemaError::TargetNotInteger {
                    column: target.to_string(),
                    declared: ColumnType::Float32,
                });
            }
            Some(ColumnType::Int8) => {}
        }

        if table.row_count() == 0 {
            return Err(SchemaError::EmptyDataset);
        }
        Ok(())
    }

    pub fn type_dataset(&self, table: &Table, info: &DatasetInfo) -> Result<TypedDataset, SchemaError> {
        self.validate(table, info)?;
        let target_name = info.target_name()?;

        let mut columns = Vec::with_capacity(info.feature_names.len());
        for name in &info.feature_names {
            let ty = self
                .type_of(name)
                .ok_or_else(|| SchemaError::UntypedFeature { column: name.clone() })?;
            columns.push(coerce_column(table, name, ty)?);
        }

        let target = int8_column(table, target_name)?;
        if let Some((row, value)) = target.iter().enumerate().find(|(_, v)| !matches!(**v, 0 | 1)) {
            return Err(SchemaError::NonBinaryTarget {
                column: target_name.to_string(),
                row,
                value: *value,
            });
        }

        let record_ids = column_cells(table, RECORD_ID_COLUMN)?.cloned().collect();

        Ok(TypedDataset {
            features: FeatureMatrix {
                names: info.feature_names.clone(),
                columns,
                nrows: table.row_count(),
            },
            target: TargetVector(target),
            record_ids,
            target_name: target_name.to_string(),
        })
    }
}

/// Column converted to its declared representation.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedColumn {
    Int8(Vec<i8>),
    Float32(Vec<f32>),
}

impl TypedColumn {
    pub fn column_type(&self) -> ColumnType {
        match self {
            TypedColumn::Int8(_) => ColumnType::Int8,
            TypedColumn::Float32(_) => ColumnType::Float32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedColumn::Int8(v) => v.len(),
            TypedColumn::Float32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row` widened to `f32`, the representation trees split on.
    #[inline]
    pub fn value_f32(&self, row: usize) -> f32 {
        match self {
            TypedColumn::Int8(v) => v[row] as f32,
            TypedColumn::Float32(v) => v[row],
        }
    }
}

/// Records by named, typed feature columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    columns: Vec<TypedColumn>,
    nrows: usize,
}

impl FeatureMatrix {
    /// Columns must all have the same length.
    pub fn new(names: Vec<String>, columns: Vec<TypedColumn>) -> scorecard_types::Result<Self> {
        if names.len() != columns.len() {
            scorecard_types::bail!(
                "{} feature names for {} columns",
                names.len(),
                columns.len()
            );
        }
        let nrows = columns.first().map(TypedColumn::len).unwrap_or(0);
        if let Some(idx) = columns.iter().position(|c| c.len() != nrows) {
            scorecard_types::bail!(
                "Feature `{}` has {} rows, expected {}",
                names[idx],
                columns[idx].len(),
                nrows
            );
        }
        Ok(Self {
            names,
            columns,
            nrows,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&TypedColumn> {
        let idx = self.names.iter().position(|n| n == name)?;
        self.columns.get(idx)
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols())
    }

    /// Dense row-major copy for scoring.
    pub fn to_array(&self) -> Array2<f32> {
        Array2::from_shape_fn(self.shape(), |(row, col)| self.columns[col].value_f32(row))
    }
}

/// Ground-truth labels, each 0 or 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetVector(Vec<i8>);

impl TargetVector {
    pub fn new(values: Vec<i8>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[i8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Output of [`FeatureSchema::type_dataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct TypedDataset {
    pub features: FeatureMatrix,
    pub target: TargetVector,
    /// Record identifiers, unchanged from the dataset, in row order.
    pub record_ids: Vec<Cell>,
    pub target_name: String,
}

impl TypedDataset {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn column_cells<'a>(
    table: &'a Table,
    column: &str,
) -> Result<impl Iterator<Item = &'a Cell> + use<'a>, SchemaError> {
    table.column(column).ok_or_else(|| SchemaError::MissingColumn {
        column: column.to_string(),
    })
}

fn coerce_column(table: &Table, column: &str, ty: ColumnType) -> Result<TypedColumn, SchemaError> {
    match ty {
        ColumnType::Int8 => int8_column(table, column).map(TypedColumn::Int8),
        ColumnType::Float32 => column_cells(table, column)?
            .enumerate()
            .map(|(row, cell)| to_float32(cell, column, row))
            .collect::<Result<Vec<_>, _>>()
            .map(TypedColumn::Float32),
    }
}

fn int8_column(table: &Table, column: &str) -> Result<Vec<i8>, SchemaError> {
    column_cells(table, column)?
        .enumerate()
        .map(|(row, cell)| to_int8(cell, column, row))
        .collect()
}

fn to_int8(cell: &Cell, column: &str, row: usize) -> Result<i8, SchemaError> {
    let out_of_range = || SchemaError::OutOfRange {
        column: column.to_string(),
        row,
        value: cell.to_string(),
        ty: ColumnType::Int8,
    };

    if cell.is_null() {
        return Err(SchemaError::NullValue {
            column: column.to_string(),
            row,
            ty: ColumnType::Int8,
        });
    }
    match cell.as_i64() {
        Some(value) => i8::try_from(value).map_err(|_| out_of_range()),
        None => match cell.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => Err(out_of_range()),
            Some(_) => Err(SchemaError::NotIntegral {
                column: column.to_string(),
                row,
                value: cell.to_string(),
            }),
            None => Err(SchemaError::NotNumeric {
                column: column.to_string(),
                row,
                value: cell.to_string(),
            }),
        },
    }
}

fn to_float32(cell: &Cell, column: &str, row: usize) -> Result<f32, SchemaError> {
    if cell.is_null() {
        return Ok(f32::NAN);
    }
    let value = cell.as_f64().ok_or_else(|| SchemaError::NotNumeric {
        column: column.to_string(),
        row,
        value: cell.to_string(),
    })?;
    if value.is_finite() && value.abs() > f32::MAX as f64 {
        return Err(SchemaError::OutOfRange {
            column: column.to_string(),
            row,
            value: cell.to_string(),
            ty: ColumnType::Float32,
        });
    }
    Ok(value as f32)
}
