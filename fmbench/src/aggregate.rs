// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! Aggregation of trial records into per-condition statistics.
//!
//! A [`ResultSet`] maps each [`Condition`] to the trials of one target, in
//! discovery order. Statistics are recomputed on demand. Comparisons between
//! two targets pair trials by ordinal (zip) and truncate to the shorter list;
//! the pairing carries no wall-clock meaning.

use crate::config::{ClockConfig, EnergyConfig, ExperimentConfig};
use crate::harness::cpu::{self, CpuTrial};
use crate::harness::profile::FpgaTrial;
use crate::harness::stats::Summary;
use crate::{BenchError, BenchResult, Condition, Measurement, Target};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ────────────────────────────────────────────────────────────────────────────────
// Result sets
// ────────────────────────────────────────────────────────────────────────────────

/// All trials of one target, keyed by condition.
#[derive(Debug, Clone)]
pub struct ResultSet<T> {
    pub target: Target,
    trials: BTreeMap<Condition, Vec<T>>,
}

impl<T> ResultSet<T> {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            trials: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, condition: Condition, trials: Vec<T>) {
        self.trials.insert(condition, trials);
    }

    /// Trials of `condition`; empty when nothing was recorded.
    pub fn trials(&self, condition: &Condition) -> &[T] {
        self.trials.get(condition).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

impl ResultSet<CpuTrial> {
    /// Load `<dir>/<corpus>.<size>MB.cpu<length>.result` for every condition.
    pub fn load_cpu(dir: &Path, conditions: &[Condition]) -> BenchResult<Self> {
        let mut set = Self::new(Target::Cpu);
        for condition in conditions {
            let path = dir.join(condition.cpu_result_file_name());
            let trials = cpu::parse_result_file(&path)?;
            debug!(condition = %condition, trials = trials.len(), "loaded cpu results");
            set.insert(condition.clone(), trials);
        }
        Ok(set)
    }
}

impl ResultSet<FpgaTrial> {
    /// Load every `run*.json` in `<dir>/<corpus>.<size>MB.len<length>/`.
    ///
    /// A missing condition directory yields an empty trial list.
    pub fn load_fpga(kernel: &str, dir: &Path, conditions: &[Condition]) -> BenchResult<Self> {
        let mut set = Self::new(Target::Fpga(kernel.to_string()));
        for condition in conditions {
            let condition_dir = dir.join(condition.fpga_result_dir_name());
            let trials = trial_artifacts(&condition_dir)?
                .iter()
                .map(|path| FpgaTrial::load(path))
                .collect::<BenchResult<Vec<_>>>()?;
            debug!(
                kernel,
                condition = %condition,
                trials = trials.len(),
                "loaded fpga results"
            );
            set.insert(condition.clone(), trials);
        }
        Ok(set)
    }
}

/// File name pattern of one trial's artifact inside a condition directory.
pub const TRIAL_ARTIFACT_GLOB: &str = "run*.json";

/// Trial artifacts inside a condition directory. Order is not run order.
fn trial_artifacts(dir: &Path) -> BenchResult<Vec<PathBuf>> {
    let pattern = dir.join(TRIAL_ARTIFACT_GLOB);
    let pattern = pattern.to_string_lossy();
    let paths = glob::glob(&pattern)
        .map_err(|e| BenchError::Config(format!("bad glob pattern {}: {}", pattern, e)))?;
    Ok(paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect())
}

// ────────────────────────────────────────────────────────────────────────────────
// Per-condition statistics
// ────────────────────────────────────────────────────────────────────────────────

/// Patterns matched per second, over the trials with a recorded time.
pub fn throughput<T: Measurement>(trials: &[T], pattern_count: u64) -> Option<Summary> {
    Summary::summarize(
        trials
            .iter()
            .filter_map(Measurement::execution_time)
            .map(|t| pattern_count as f64 / t),
    )
}

pub fn execution_time<T: Measurement>(trials: &[T]) -> Option<Summary> {
    Summary::summarize(trials.iter().filter_map(Measurement::execution_time))
}

/// Joules per trial; trials with undefined energy contribute nothing.
pub fn energy<T: Measurement>(trials: &[T], units: &EnergyConfig) -> Option<Summary> {
    Summary::summarize(trials.iter().filter_map(|t| t.energy_joules(units)))
}

pub fn transfer_time<T: Measurement>(trials: &[T]) -> Option<Summary> {
    Summary::summarize(trials.iter().filter_map(Measurement::transfer_time))
}

/// Mean matches per pattern.
pub fn matches_per_pattern(trials: &[CpuTrial], pattern_count: u64) -> Option<Summary> {
    Summary::summarize(
        trials
            .iter()
            .map(|t| t.match_count as f64 / pattern_count as f64),
    )
}

// ────────────────────────────────────────────────────────────────────────────────
// Cross-target ratios
// ────────────────────────────────────────────────────────────────────────────────

/// Number of trial pairs compared for `condition`; warns when counts differ.
pub fn check_pairing(condition: &Condition, a: usize, b: usize) -> usize {
    if a != b {
        warn!(
            condition = %condition,
            a,
            b,
            "unequal trial counts, comparing the first {}",
            a.min(b)
        );
    }
    a.min(b)
}

/// Pair trials by ordinal, truncating to the shorter list.
pub fn paired<'a, A, B>(a: &'a [A], b: &'a [B]) -> impl Iterator<Item = (&'a A, &'a B)> {
    a.iter().zip(b.iter())
}

/// throughput(A) / throughput(B) per paired trial, which is time(B) / time(A).
pub fn speedup<A: Measurement, B: Measurement>(a: &[A], b: &[B]) -> Option<Summary> {
    Summary::summarize(paired(a, b).filter_map(|(x, y)| {
        let (ta, tb) = (x.execution_time()?, y.execution_time()?);
        Some(tb / ta)
    }))
}

/// Speedup rescaled to equal clocks: cycles(B) / cycles(A).
pub fn cycle_speedup<A: Measurement, B: Measurement>(
    a: &[A],
    b: &[B],
    clock_a_ghz: f64,
    clock_b_ghz: f64,
) -> Option<Summary> {
    Summary::summarize(paired(a, b).filter_map(|(x, y)| {
        let (ta, tb) = (x.execution_time()?, y.execution_time()?);
        Some((tb * clock_b_ghz) / (ta * clock_a_ghz))
    }))
}

/// time(A) / time(B) per paired trial.
pub fn time_ratio<A: Measurement, B: Measurement>(a: &[A], b: &[B]) -> Option<Summary> {
    Summary::summarize(paired(a, b).filter_map(|(x, y)| {
        Some(x.execution_time()? / y.execution_time()?)
    }))
}

/// energy(A) / energy(B) per paired trial, both in joules.
///
/// Pairs where either side has no energy value are skipped.
pub fn energy_ratio<A: Measurement, B: Measurement>(
    a: &[A],
    b: &[B],
    units: &EnergyConfig,
) -> Option<Summary> {
    Summary::summarize(paired(a, b).filter_map(|(x, y)| {
        Some(x.energy_joules(units)? / y.energy_joules(units)?)
    }))
}

/// mean energy(A) / mean energy(B), without pairing.
pub fn mean_energy_ratio<A: Measurement, B: Measurement>(
    a: &[A],
    b: &[B],
    units: &EnergyConfig,
) -> Option<f64> {
    let ea = energy(a, units)?;
    let eb = energy(b, units)?;
    Some(ea.mean / eb.mean)
}

impl ClockConfig {
    pub fn for_target(&self, target: &Target) -> f64 {
        match target {
            Target::Cpu => self.cpu_ghz,
            Target::Fpga(_) => self.fpga_ghz,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Report rows
// ────────────────────────────────────────────────────────────────────────────────

/// Statistics of one target under one condition.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionSummary {
    pub condition: Condition,
    pub target: Target,
    pub trials: usize,
    pub throughput: Option<Summary>,
    pub execution_time: Option<Summary>,
    pub energy: Option<Summary>,
    pub transfer_time: Option<Summary>,
}

/// Ratios of target A against target B under one condition.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub condition: Condition,
    pub a: Target,
    pub b: Target,
    pub paired_trials: usize,
    pub speedup: Option<Summary>,
    pub cycle_speedup: Option<Summary>,
    pub time_ratio: Option<Summary>,
    pub energy_ratio: Option<Summary>,
    pub mean_energy_ratio: Option<f64>,
}

/// Computes report rows from result sets under one experiment configuration.
pub struct Aggregator<'a> {
    config: &'a ExperimentConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(config: &'a ExperimentConfig) -> Self {
        Self { config }
    }

    pub fn summarize<T: Measurement>(&self, set: &ResultSet<T>) -> Vec<ConditionSummary> {
        let count = self.config.experiment.pattern_count;
        self.config
            .conditions()
            .into_iter()
            .map(|condition| {
                let trials = set.trials(&condition);
                ConditionSummary {
                    trials: trials.len(),
                    throughput: throughput(trials, count),
                    execution_time: execution_time(trials),
                    energy: energy(trials, &self.config.energy),
                    transfer_time: transfer_time(trials),
                    target: set.target.clone(),
                    condition,
                }
            })
            .collect()
    }

    pub fn compare<A: Measurement, B: Measurement>(
        &self,
        a: &ResultSet<A>,
        b: &ResultSet<B>,
    ) -> Vec<Comparison> {
        let clocks = &self.config.clocks;
        let units = &self.config.energy;
        let (clock_a, clock_b) = (clocks.for_target(&a.target), clocks.for_target(&b.target));

        self.config
            .conditions()
            .into_iter()
            .map(|condition| {
                let (ta, tb) = (a.trials(&condition), b.trials(&condition));
                Comparison {
                    paired_trials: check_pairing(&condition, ta.len(), tb.len()),
                    speedup: speedup(ta, tb),
                    cycle_speedup: cycle_speedup(ta, tb, clock_a, clock_b),
                    time_ratio: time_ratio(ta, tb),
                    energy_ratio: energy_ratio(ta, tb, units),
                    mean_energy_ratio: mean_energy_ratio(ta, tb, units),
                    a: a.target.clone(),
                    b: b.target.clone(),
                    condition,
                }
            })
            .collect()
    }
}
