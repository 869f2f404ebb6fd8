use ndarray::prelude::*;
use serde::Serialize;
use std::fs;
use std::io::BufWriter;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

// Starting with NaN works because f64::max ignores the NaN and picks the other value
pub(crate) fn max(v: &[f64]) -> f64 {
    v.iter().copied().fold(std::f64::NAN, f64::max)
}

pub(crate) fn min(v: &[f64]) -> f64 {
    v.iter().copied().fold(std::f64::NAN, f64::min)
}

/// Largest absolute difference between two equally long vectors, ignoring NaNs
pub fn max_abs_difference(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let diffs: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).collect();
    max(&diffs)
}

pub fn dump_default_to_json_file<T>(filename: &str) -> Result<()>
    where T: Default + Serialize
{
    let file = fs::File::create(filename)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &T::default())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_test() {
        let v = vec![0.0, 0.1, 100.4, -100.4];
        assert_eq!(max(&v), 100.4);

        let v = vec![std::f64::NAN, 0.0, 0.1, 100.4, -100.4];
        assert_eq!(max(&v), 100.4);
    }

    #[test]
    fn min_test() {
        let v = vec![0.0, 0.1, 100.4, -100.4];
        assert_eq!(min(&v), -100.4);

        let v = vec![std::f64::NAN, 0.0, 0.1, 100.4, -100.4];
        assert_eq!(min(&v), -100.4);
    }

    #[test]
    fn max_abs_difference_test() {
        let a = array![1.0, 2.0, 3.0];
        let b = array![1.5, 2.0, 1.0];
        assert_eq!(max_abs_difference(a.view(), b.view()), 2.0);

        let empty = Array1::<f64>::zeros(0);
        assert!(max_abs_difference(empty.view(), empty.view()).is_nan());
    }
}
