// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! Summary statistics over trial values.

use serde::{Deserialize, Serialize};

/// Mean and population standard deviation of a set of trial values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// Summarize `values`. `None` when there is no data.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            count: values.len(),
            mean,
            stddev: variance.sqrt(),
            min,
            max,
        })
    }

    pub fn summarize(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let values: Vec<f64> = values.into_iter().collect();
        Self::from_values(&values)
    }

    /// Coefficient of variation (stddev / mean).
    pub fn cv(&self) -> Option<f64> {
        if self.mean != 0.0 {
            Some(self.stddev / self.mean.abs())
        } else {
            None
        }
    }
}
