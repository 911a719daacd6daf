// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! CPU result file parsing.
//!
//! One result file per condition, one trial per line:
//! `<hex-float> <hex-float> <decimal-int>`. The file is append-only across
//! repetitions, so line position is the trial ordinal.

use super::hexfloat::{format_hex_f64, parse_hex_f64};
use crate::{BenchError, BenchResult, EnergyConfig, Measurement};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One trial of the CPU reference application.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuTrial {
    /// Seconds spent computing match ranges (first field).
    pub range_build_time: f64,
    /// Second field. Seconds spent resolving match indices, or the raw RAPL
    /// energy counter when the binary is built with energy instrumentation.
    pub index_query_time: f64,
    /// Total number of matches over all patterns.
    pub match_count: u64,
}

impl CpuTrial {
    /// Parse one result line. `None` unless it has exactly three valid fields
    /// and both timings are finite and non-negative.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let range = fields.next()?;
        let index = fields.next()?;
        let matches = fields.next()?;
        if fields.next().is_some() {
            return None;
        }

        let range_build_time = parse_hex_f64(range)?;
        let index_query_time = parse_hex_f64(index)?;
        let match_count = matches.parse::<u64>().ok()?;
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(range_build_time) || !valid(index_query_time) {
            return None;
        }

        Some(Self {
            range_build_time,
            index_query_time,
            match_count,
        })
    }

    /// Serialize back into the on-disk line format.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {}",
            format_hex_f64(self.range_build_time),
            format_hex_f64(self.index_query_time),
            self.match_count
        )
    }

    /// Range and index phases together.
    pub fn total_time(&self) -> f64 {
        self.range_build_time + self.index_query_time
    }
}

impl Measurement for CpuTrial {
    fn execution_time(&self) -> Option<f64> {
        Some(self.total_time())
    }

    fn energy_joules(&self, energy: &EnergyConfig) -> Option<f64> {
        Some(self.index_query_time / energy.cpu_counter_divisor)
    }
}

/// Parse a whole result file. Any malformed line rejects the file.
pub fn parse_result_file(path: &Path) -> BenchResult<Vec<CpuTrial>> {
    let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
    parse_result_str(path, &content)
}

pub(crate) fn parse_result_str(path: &Path, content: &str) -> BenchResult<Vec<CpuTrial>> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| {
            CpuTrial::parse_line(line).ok_or_else(|| {
                BenchError::format(
                    path,
                    Some(i + 1),
                    format!(
                        "expected `<hex-float> <hex-float> <count>`, got {:?}",
                        line
                    ),
                )
            })
        })
        .collect()
}
