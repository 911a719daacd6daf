// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! Power-rail profile extraction.
//!
//! The board profiler writes `power_profile_*.csv` into the working directory
//! of the benchmark. The first two lines are headers; every further line is
//! `timestamp,mV,mA,mV,mA[,...]` for two rails.

use crate::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name pattern of the power artifact inside a trial directory.
pub const POWER_PROFILE_GLOB: &str = "power_profile_*.csv";

const HEADER_LINES: usize = 2;

/// One reading of the power sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    /// Milliseconds on the sampler's clock.
    pub timestamp: f64,
    /// Watts over both rails.
    pub power: f64,
}

/// Watts from two millivolt/milliamp pairs.
pub fn rail_wattage(mv1: f64, ma1: f64, mv2: f64, ma2: f64) -> f64 {
    (mv1 / 1000.0) * (ma1 / 1000.0) + (mv2 / 1000.0) * (ma2 / 1000.0)
}

/// Every power artifact in `dir`, sorted by path.
pub fn power_profiles(dir: &Path) -> BenchResult<Vec<PathBuf>> {
    let pattern = dir.join(POWER_PROFILE_GLOB);
    let pattern = pattern.to_string_lossy();
    let paths = glob::glob(&pattern)
        .map_err(|e| BenchError::Config(format!("bad glob pattern {}: {}", pattern, e)))?;

    let mut found: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
    found.sort();
    Ok(found)
}

/// Locate the power artifact in `dir`, if any.
pub fn find_power_profile(dir: &Path) -> BenchResult<Option<PathBuf>> {
    let found = power_profiles(dir)?;
    if found.len() > 1 {
        warn!(
            dir = %dir.display(),
            count = found.len(),
            "multiple power profiles, using the first"
        );
    }
    Ok(found.into_iter().next())
}

/// Read the power profile in `dir`. Absence yields an empty sequence.
pub fn read_power_samples(dir: &Path) -> BenchResult<Vec<PowerSample>> {
    match find_power_profile(dir)? {
        Some(path) => parse_power_profile(&path),
        None => {
            debug!(dir = %dir.display(), "no power profile");
            Ok(Vec::new())
        }
    }
}

/// Parse one power profile file.
pub fn parse_power_profile(path: &Path) -> BenchResult<Vec<PowerSample>> {
    let file = File::open(path).map_err(|e| BenchError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut samples = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| BenchError::io(path, e))?;
        if i < HEADER_LINES || line.trim().is_empty() {
            continue;
        }
        let sample = parse_power_line(&line)
            .ok_or_else(|| BenchError::format(path, Some(i + 1), format!("bad power sample {:?}", line)))?;
        samples.push(sample);
    }

    if let Some(i) = first_regression(&samples) {
        warn!(
            file = %path.display(),
            index = i,
            "power timestamps are not monotonic"
        );
    }
    debug!(file = %path.display(), samples = samples.len(), "parsed power profile");
    Ok(samples)
}

fn parse_power_line(line: &str) -> Option<PowerSample> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 5 {
        return None;
    }
    let num = |i: usize| fields[i].parse::<f64>().ok();
    Some(PowerSample {
        timestamp: num(0)?,
        power: rail_wattage(num(1)?, num(2)?, num(3)?, num(4)?),
    })
}

/// Index of the first sample whose timestamp goes backwards.
pub fn first_regression(samples: &[PowerSample]) -> Option<usize> {
    samples
        .windows(2)
        .position(|w| w[1].timestamp < w[0].timestamp)
        .map(|i| i + 1)
}
