//! Indicator basis for the day-bin design.
//!
//! Each observation contributes one design row: a `1` in the column of the bin
//! that contains its "days since enactment" offset, `0` elsewhere. Rows before
//! enactment (or in counties that never enacted the policy) are all zeros.

use nalgebra::DMatrix;

use crate::domain::BinLayout;

/// Fill a one-hot row for the given offset.
///
/// # Panics
/// Panics if `out.len() != layout.len()`. Callers size the row from the layout.
pub fn fill_indicator_row(layout: &BinLayout, days: Option<i64>, out: &mut [f64]) {
    assert_eq!(out.len(), layout.len(), "indicator row must have one slot per bin");
    out.fill(0.0);
    if let Some(idx) = days.and_then(|d| layout.locate(d)) {
        out[idx] = 1.0;
    }
}

/// Indicator matrix with one row per offset and one column per bin.
pub fn indicator_matrix(layout: &BinLayout, days: &[Option<i64>]) -> DMatrix<f64> {
    let mut x = DMatrix::zeros(days.len(), layout.len());
    for (i, d) in days.iter().enumerate() {
        if let Some(j) = d.and_then(|d| layout.locate(d)) {
            x[(i, j)] = 1.0;
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicator_row(layout: &BinLayout, days: Option<i64>) -> Vec<f64> {
        let mut row = vec![0.0; layout.len()];
        fill_indicator_row(layout, days, &mut row);
        row
    }

    #[test]
    fn exactly_one_hot_after_enactment() {
        let layout = BinLayout::parse("l", &["0-0", "1-29", "30-inf"]).unwrap();
        assert_eq!(indicator_row(&layout, Some(0)), vec![1.0, 0.0, 0.0]);
        assert_eq!(indicator_row(&layout, Some(12)), vec![0.0, 1.0, 0.0]);
        assert_eq!(indicator_row(&layout, Some(400)), vec![0.0, 0.0, 1.0]);
        for d in 0..120 {
            let s: f64 = indicator_row(&layout, Some(d)).iter().sum();
            assert_eq!(s, 1.0);
        }
    }

    #[test]
    fn baseline_rows_are_all_zero() {
        let layout = BinLayout::parse("l", &["0-6", "7-inf"]).unwrap();
        assert_eq!(indicator_row(&layout, Some(-3)), vec![0.0, 0.0]);
        assert_eq!(indicator_row(&layout, None), vec![0.0, 0.0]);

        let mut row = vec![9.0, 9.0];
        fill_indicator_row(&layout, None, &mut row);
        assert_eq!(row, vec![0.0, 0.0]);
    }

    #[test]
    fn matrix_matches_rows() {
        let layout = BinLayout::parse("l", &["0-1", "2-inf"]).unwrap();
        let days = [None, Some(-2), Some(0), Some(5)];
        let x = indicator_matrix(&layout, &days);
        assert_eq!(x.nrows(), 4);
        for (i, d) in days.iter().enumerate() {
            let row: Vec<f64> = x.row(i).iter().copied().collect();
            assert_eq!(row, indicator_row(&layout, *d));
        }
    }
}
