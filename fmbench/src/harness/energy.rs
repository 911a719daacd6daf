// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! Energy correlation of a power series against the kernel-active window.
//!
//! The power sampler and the profiler run on independent clocks with the
//! sampler being much coarser, so the window boundaries are snapped to the
//! nearest sample (even when they fall outside the sampled range) and the
//! enclosed sub-series is integrated with composite Simpson's rule.

use super::power::PowerSample;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Kernel-active window, in the power sampler's milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelWindow {
    pub start: f64,
    pub end: f64,
}

/// Index of the sample closest to `t`. Ties resolve to the lowest index.
pub fn nearest_index(samples: &[PowerSample], t: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, s) in samples.iter().enumerate() {
        let d = (s.timestamp - t).abs();
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Energy in joules spent over `window`, or `None` for an empty series.
pub fn correlate_energy(samples: &[PowerSample], window: KernelWindow) -> Option<f64> {
    let start = nearest_index(samples, window.start)?;
    let end = nearest_index(samples, window.end)?;

    if end < start {
        warn!(
            start = window.start,
            end = window.end,
            "kernel window ends before it starts"
        );
        return Some(0.0);
    }

    let slice = &samples[start..=end];
    let xs: Vec<f64> = slice.iter().map(|s| s.timestamp / 1000.0).collect();
    let ys: Vec<f64> = slice.iter().map(|s| s.power).collect();
    Some(simpson(&ys, &xs))
}

/// Composite Simpson integration of `y` over (possibly irregular) `x`.
///
/// With an even number of points the last interval cannot be paired; the
/// result is the average of (Simpson on the first N-1 points + trapezoid on
/// the last interval) and (trapezoid on the first interval + Simpson on the
/// last N-1 points). Two points reduce to the trapezoid rule, fewer to zero.
pub fn simpson(y: &[f64], x: &[f64]) -> f64 {
    let n = y.len().min(x.len());
    match n {
        0 | 1 => 0.0,
        2 => trapezoid(y[0], y[1], x[1] - x[0]),
        _ if n % 2 == 1 => basic_simpson(&y[..n], &x[..n]),
        _ => {
            let first = basic_simpson(&y[..n - 1], &x[..n - 1])
                + trapezoid(y[n - 2], y[n - 1], x[n - 1] - x[n - 2]);
            let last = trapezoid(y[0], y[1], x[1] - x[0]) + basic_simpson(&y[1..n], &x[1..n]);
            (first + last) / 2.0
        }
    }
}

fn trapezoid(y0: f64, y1: f64, h: f64) -> f64 {
    0.5 * h * (y0 + y1)
}

/// Simpson over an odd number of points, one parabola per interval pair.
fn basic_simpson(y: &[f64], x: &[f64]) -> f64 {
    let mut total = 0.0;
    for i in (0..y.len().saturating_sub(2)).step_by(2) {
        let h0 = x[i + 1] - x[i];
        let h1 = x[i + 2] - x[i + 1];
        if h0 <= 0.0 || h1 <= 0.0 {
            // Repeated or regressing timestamps; the parabola is undefined.
            total += trapezoid(y[i], y[i + 1], h0) + trapezoid(y[i + 1], y[i + 2], h1);
            continue;
        }
        let hsum = h0 + h1;
        let ratio = h0 / h1;
        total += hsum / 6.0
            * (y[i] * (2.0 - 1.0 / ratio)
                + y[i + 1] * hsum * hsum / (h0 * h1)
                + y[i + 2] * (2.0 - ratio));
    }
    total
}
