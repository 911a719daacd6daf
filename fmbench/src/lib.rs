// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! FM-index benchmark runner and telemetry analysis.
//!
//! This crate provides:
//! - A sequential trial runner for the CPU reference binary and FPGA kernels
//! - Parsers for CPU result files and FPGA profiling/power artifacts
//! - Energy correlation of power samples against the kernel timeline
//! - Aggregation into per-condition statistics and cross-target ratios

pub mod aggregate;
pub mod config;
pub mod harness;
pub mod report;
pub mod runner;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

pub use aggregate::{Comparison, ConditionSummary, ResultSet};
pub use config::{EnergyConfig, ExperimentConfig};
pub use harness::cpu::CpuTrial;
pub use harness::profile::{FpgaTrial, TrialArtifact};
pub use harness::stats::Summary;

// ────────────────────────────────────────────────────────────────────────────────
// Error type
// ────────────────────────────────────────────────────────────────────────────────

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {diagnostics}")]
    Subprocess {
        program: String,
        status: ExitStatus,
        diagnostics: String,
    },

    #[error("format error in {}{}: {message}", .path.display(), .line.map(|l| format!(":{}", l)).unwrap_or_default())]
    Format {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    #[error("JSON error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config error: {0}")]
    Config(String),
}

impl BenchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BenchError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(
        path: impl Into<PathBuf>,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        BenchError::Format {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Conditions and targets
// ────────────────────────────────────────────────────────────────────────────────

/// One comparable measurement group: corpus, corpus size and pattern length.
///
/// The execution target is kept outside the key; a [`ResultSet`] carries it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub corpus: String,
    pub size_mb: u32,
    pub length: u32,
}

impl Condition {
    pub fn new(corpus: impl Into<String>, size_mb: u32, length: u32) -> Self {
        Self {
            corpus: corpus.into(),
            size_mb,
            length,
        }
    }

    /// Corpus file stem: `<corpus>.<size>MB`.
    pub fn stem(&self) -> String {
        format!("{}.{}MB", self.corpus, self.size_mb)
    }

    /// `<corpus>.<size>MB.cpu<length>.result`
    pub fn cpu_result_file_name(&self) -> String {
        format!("{}.cpu{}.result", self.stem(), self.length)
    }

    /// `<corpus>.<size>MB.cpu<length>.test`
    pub fn cpu_test_file_name(&self) -> String {
        format!("{}.cpu{}.test", self.stem(), self.length)
    }

    /// `<corpus>.<size>MB.len<length>`
    pub fn fpga_result_dir_name(&self) -> String {
        format!("{}.len{}", self.stem(), self.length)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}MB, {})", self.corpus, self.size_mb, self.length)
    }
}

/// Execution backend a result set was measured on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Cpu,
    Fpga(String),
}

impl Target {
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("cpu") {
            Target::Cpu
        } else {
            Target::Fpga(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Target::Cpu => "cpu",
            Target::Fpga(kernel) => kernel,
        }
    }

    /// Human readable name used in report titles.
    pub fn display_name(&self) -> String {
        match self.name() {
            "cpu" => "reference CPU application".to_string(),
            "unopt" => "reference FPGA kernel".to_string(),
            "memory" => "memory optimized kernel".to_string(),
            "ndrange" => "NDRange optimized kernel".to_string(),
            "final" => "fully optimized kernel".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Measurement trait: every trial record implements this
// ────────────────────────────────────────────────────────────────────────────────

/// Per-trial quantities the aggregator reduces over.
pub trait Measurement {
    /// Seconds spent on the measured search work, if recorded.
    fn execution_time(&self) -> Option<f64>;

    /// Energy consumed in joules, if recorded.
    fn energy_joules(&self, energy: &EnergyConfig) -> Option<f64>;

    /// Seconds spent moving data between host and device, if recorded.
    fn transfer_time(&self) -> Option<f64> {
        None
    }
}
