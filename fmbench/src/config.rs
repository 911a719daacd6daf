// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! Experiment configuration parsing.

use crate::{BenchError, BenchResult, Condition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Which conditions to run and how many patterns each trial searches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSpec {
    /// Number of patterns per generated test file.
    pub pattern_count: u64,
    /// Maximum number of matches per generated pattern.
    pub max_matches: u64,
    /// Repetitions per condition.
    #[serde(default = "default_repeats")]
    pub repeats: u32,
    /// Corpus names without size suffix.
    pub corpora: Vec<String>,
    /// Corpus sizes in MB.
    pub sizes: Vec<u32>,
    /// Pattern lengths.
    pub lengths: Vec<u32>,
}

fn default_repeats() -> u32 {
    10
}

impl ExperimentSpec {
    /// Every (corpus, size, length) in corpus-major order.
    pub fn conditions(&self) -> Vec<Condition> {
        let mut out = Vec::with_capacity(self.corpora.len() * self.sizes.len() * self.lengths.len());
        for corpus in &self.corpora {
            for &size in &self.sizes {
                for &length in &self.lengths {
                    out.push(Condition::new(corpus.clone(), size, length));
                }
            }
        }
        out
    }
}

/// Locations of binaries, inputs and result artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the corpora and their `.fm` index files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory receiving `<corpus>.<size>MB.cpu<length>.result` files.
    #[serde(default = "default_cpu_results")]
    pub cpu_results: PathBuf,
    /// FPGA project directory containing one sub-directory per target.
    #[serde(default = "default_fpga_workspace")]
    pub fpga_workspace: PathBuf,
    #[serde(default = "default_generator")]
    pub generator: PathBuf,
    #[serde(default = "default_benchmark")]
    pub cpu_benchmark: PathBuf,
    /// Relative paths resolve against `fpga_workspace`.
    #[serde(default = "default_benchmark")]
    pub fpga_benchmark: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_cpu_results() -> PathBuf {
    PathBuf::from("results/cpu")
}

fn default_fpga_workspace() -> PathBuf {
    PathBuf::from("fpga")
}

fn default_generator() -> PathBuf {
    PathBuf::from("./generate_test_data")
}

fn default_benchmark() -> PathBuf {
    PathBuf::from("./benchmark")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cpu_results: default_cpu_results(),
            fpga_workspace: default_fpga_workspace(),
            generator: default_generator(),
            cpu_benchmark: default_benchmark(),
            fpga_benchmark: default_benchmark(),
        }
    }
}

/// Clock frequencies used for cycle-equivalent comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    #[serde(default = "default_cpu_ghz")]
    pub cpu_ghz: f64,
    #[serde(default = "default_fpga_ghz")]
    pub fpga_ghz: f64,
}

fn default_cpu_ghz() -> f64 {
    3.4
}

fn default_fpga_ghz() -> f64 {
    0.3
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            cpu_ghz: default_cpu_ghz(),
            fpga_ghz: default_fpga_ghz(),
        }
    }
}

/// Unit reconciliation between CPU energy counters and FPGA joules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// CPU counter units per joule.
    #[serde(default = "default_cpu_counter_divisor")]
    pub cpu_counter_divisor: f64,
}

fn default_cpu_counter_divisor() -> f64 {
    1_000_000.0
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            cpu_counter_divisor: default_cpu_counter_divisor(),
        }
    }
}

/// Complete experiment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub experiment: ExperimentSpec,
    #[serde(default)]
    pub paths: PathsConfig,
    /// Result directory per FPGA kernel; missing kernels default to
    /// `<fpga_workspace>/<kernel>_results`.
    #[serde(default)]
    pub sources: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub clocks: ClockConfig,
    #[serde(default)]
    pub energy: EnergyConfig,
}

impl ExperimentConfig {
    /// Load from YAML, or TOML when the file ends in `.toml`.
    pub fn load(path: &Path) -> BenchResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let config: Self = if is_toml {
            toml::from_str(&content)
                .map_err(|e| BenchError::Config(format!("Failed to parse {}: {}", path.display(), e)))?
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| BenchError::Config(format!("Failed to parse {}: {}", path.display(), e)))?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BenchResult<()> {
        let e = &self.experiment;
        if e.corpora.is_empty() || e.sizes.is_empty() || e.lengths.is_empty() {
            return Err(BenchError::Config(
                "corpora, sizes and lengths must all be non-empty".into(),
            ));
        }
        if e.repeats == 0 {
            return Err(BenchError::Config("repeats must be at least 1".into()));
        }
        if e.pattern_count == 0 {
            return Err(BenchError::Config("pattern_count must be at least 1".into()));
        }
        if !(self.clocks.cpu_ghz > 0.0 && self.clocks.fpga_ghz > 0.0) {
            return Err(BenchError::Config("clock frequencies must be positive".into()));
        }
        if !(self.energy.cpu_counter_divisor > 0.0) {
            return Err(BenchError::Config("cpu_counter_divisor must be positive".into()));
        }
        Ok(())
    }

    /// Result directory of an FPGA kernel.
    pub fn source_dir(&self, kernel: &str) -> PathBuf {
        self.sources
            .get(kernel)
            .cloned()
            .unwrap_or_else(|| self.paths.fpga_workspace.join(format!("{}_results", kernel)))
    }

    /// Every (corpus, size, length) of the experiment.
    pub fn conditions(&self) -> Vec<Condition> {
        self.experiment.conditions()
    }
}
