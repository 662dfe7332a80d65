//! Summary statistics shared by batch evaluation and batch trait analysis.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl Summary {
    /// `None` for an empty slice. The mean is accumulated as offsets from the minimum, so N
    /// copies of one value reduce to exactly that value with zero deviation.
    pub fn of(values: &[f64]) -> Option<Summary> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let n = values.len() as f64;
        let offset: f64 = values.iter().map(|v| v - min).sum::<f64>() / n;
        let mean = min + offset;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Summary {
            mean,
            std: variance.sqrt(),
            min,
            max,
            count: values.len(),
        })
    }
}
