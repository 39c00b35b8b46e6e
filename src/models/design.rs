//! Regression design: named indicator columns plus the dependent vector.

use nalgebra::{DMatrix, DVector};

use crate::domain::BinLayout;
use crate::error::AppError;
use crate::math::basis::indicator_matrix;

/// A design matrix without the intercept column (estimators add it).
#[derive(Debug, Clone)]
pub struct Design {
    pub names: Vec<String>,
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
}

impl Design {
    /// Build from row-major indicator rows.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>], y: Vec<f64>) -> Result<Self, AppError> {
        if rows.len() != y.len() {
            return Err(AppError::runtime(format!(
                "Design has {} rows but {} observations.",
                rows.len(),
                y.len()
            )));
        }
        let p = names.len();
        if let Some((i, _)) = rows.iter().enumerate().find(|(_, r)| r.len() != p) {
            return Err(AppError::runtime(format!("Design row {i} does not have {p} columns.")));
        }
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Ok(Self {
            names,
            x: DMatrix::from_row_slice(y.len(), p, &flat),
            y: DVector::from_vec(y),
        })
    }

    /// One-hot bin design for the given day offsets (`None` = never enacted).
    pub fn from_offsets(layout: &BinLayout, days: &[Option<i64>], y: Vec<f64>) -> Result<Self, AppError> {
        if days.len() != y.len() {
            return Err(AppError::runtime(format!(
                "Design has {} offsets but {} observations.",
                days.len(),
                y.len()
            )));
        }
        Ok(Self {
            names: layout.column_names(),
            x: indicator_matrix(layout, days),
            y: DVector::from_vec(y),
        })
    }

    pub fn n_obs(&self) -> usize {
        self.y.len()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// Remove columns with zero variance and return their names.
    ///
    /// A bin that no row falls into (or that every row falls into) is
    /// indistinguishable from the intercept and would make the system singular.
    pub fn drop_constant_columns(&mut self) -> Vec<String> {
        let keep: Vec<usize> = (0..self.n_features())
            .filter(|&j| {
                let col = self.x.column(j);
                let first = col.get(0).copied().unwrap_or(0.0);
                col.iter().any(|v| (v - first).abs() > 0.0)
            })
            .collect();

        if keep.len() == self.n_features() {
            return Vec::new();
        }

        let dropped = (0..self.n_features())
            .filter(|j| !keep.contains(j))
            .map(|j| self.names[j].clone())
            .collect();

        self.x = self.x.select_columns(keep.iter());
        self.names = keep.iter().map(|&j| self.names[j].clone()).collect();
        dropped
    }

    /// Subset of rows (used for holdout splits and cross-validation folds).
    pub fn select_rows(&self, rows: &[usize]) -> Design {
        Design {
            names: self.names.clone(),
            x: self.x.select_rows(rows.iter()),
            y: self.y.select_rows(rows.iter()),
        }
    }
}
