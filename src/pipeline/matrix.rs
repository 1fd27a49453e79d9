//! Dense row-major feature matrix shared by the encoder and the projector

use serde::{Deserialize, Serialize};

/// Row-major `n_rows x n_cols` matrix of encoded features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    /// Build a matrix from row-major values.
    ///
    /// # Panics
    /// If `data.len() != n_rows * n_cols`.
    pub fn new(n_rows: usize, n_cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            n_rows * n_cols,
            "matrix data length does not match {}x{}",
            n_rows,
            n_cols
        );
        Self { n_rows, n_cols, data }
    }

    /// Build a matrix from equally sized rows.
    ///
    /// # Panics
    /// If the rows do not all have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let n_cols = rows.first().map_or(0, Vec::len);
        let data: Vec<f64> = rows
            .iter()
            .flat_map(|row| {
                assert_eq!(row.len(), n_cols, "ragged rows in feature matrix");
                row.iter().copied()
            })
            .collect();
        Self::new(rows.len(), n_cols, data)
    }

    pub fn nrows(&self) -> usize {
        self.n_rows
    }

    pub fn ncols(&self) -> usize {
        self.n_cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n_cols + j]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// New matrix containing the selected rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let data = indices
            .iter()
            .flat_map(|&i| self.row(i).iter().copied())
            .collect();
        Self::new(indices.len(), self.n_cols, data)
    }
}

/// Squared Euclidean distance between two equally sized vectors
#[inline]
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_access() {
        let m = FeatureMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 2);
        assert_eq!(m.row(1), &[3.0, 4.0]);
        assert_eq!(m.get(2, 0), 5.0);
    }

    #[test]
    fn test_select_rows_keeps_requested_order() {
        let m = FeatureMatrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]);
        let picked = m.select_rows(&[2, 0]);
        assert_eq!(picked.as_slice(), &[3.0, 1.0]);
    }

    #[test]
    fn test_squared_distance() {
        assert_eq!(squared_distance(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }
}
