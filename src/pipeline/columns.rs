//! Typed access to DataFrame columns
//!
//! Polars columns are read once into plain vectors; downstream stages index
//! rows positionally.

use anyhow::Result;
use polars::prelude::*;

/// Values of a column cast to Float64, or `None` if the column is absent
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    let Ok(col) = df.column(name) else {
        return Ok(None);
    };
    let cast = col.cast(&DataType::Float64)?;
    Ok(Some(cast.f64()?.into_iter().collect()))
}

/// Values of a column cast to Int64, or `None` if the column is absent
pub fn i64_values(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<i64>>>> {
    let Ok(col) = df.column(name) else {
        return Ok(None);
    };
    let cast = col.cast(&DataType::Int64)?;
    Ok(Some(cast.i64()?.into_iter().collect()))
}

/// Values of a column cast to String, or `None` if the column is absent
pub fn str_values(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>> {
    let Ok(col) = df.column(name) else {
        return Ok(None);
    };
    let cast = col.cast(&DataType::String)?;
    Ok(Some(
        cast.str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
    ))
}

/// Storage class a reconciled column is materialized as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Integer,
    Float,
    Text,
}

impl CellKind {
    /// Kind implied by a single polars dtype
    pub fn of(dtype: &DataType) -> Self {
        if dtype.is_integer() {
            CellKind::Integer
        } else if dtype.is_primitive_numeric() {
            CellKind::Float
        } else {
            CellKind::Text
        }
    }

    /// Polars dtype the kind is materialized as
    pub fn dtype(self) -> DataType {
        match self {
            CellKind::Integer => DataType::Int64,
            CellKind::Float => DataType::Float64,
            CellKind::Text => DataType::String,
        }
    }

    /// Narrowest kind that can hold values of both kinds
    pub fn unify(self, other: CellKind) -> CellKind {
        match (self, other) {
            (CellKind::Integer, CellKind::Integer) => CellKind::Integer,
            (CellKind::Text, _) | (_, CellKind::Text) => CellKind::Text,
            _ => CellKind::Float,
        }
    }
}

/// Rows of `df` whose mask entry is true, in their original order
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    Ok(df.filter(&mask)?)
}
