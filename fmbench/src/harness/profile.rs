// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! FPGA profiling-summary extraction and per-trial artifacts.
//!
//! The vendor runtime writes `profile_summary.csv` next to the benchmark: a
//! sequence of sections, each introduced by a fixed title line, followed by
//! one column-label line and then comma separated rows until a blank line.
//! Sections we do not know are ignored.
//!
//! A trial's extracted telemetry is persisted as one JSON document
//! (`run<n>.json`) whose top-level keys are the section titles plus the
//! optional `power` series and `timeline` window.

use super::energy::{self, KernelWindow};
use super::power::{self, PowerSample};
use crate::{BenchError, BenchResult, EnergyConfig, Measurement};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// File name of the profiling summary inside a trial directory.
pub const PROFILE_SUMMARY_FILE: &str = "profile_summary.csv";

// ────────────────────────────────────────────────────────────────────────────────
// Sections
// ────────────────────────────────────────────────────────────────────────────────

/// The profiling-summary sections we extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    ApiCalls,
    KernelExecution,
    ComputeUnitUtilization,
    HostToGlobalMemory,
    KernelsToGlobalMemory,
}

impl SectionKind {
    pub const ALL: [SectionKind; 5] = [
        SectionKind::ApiCalls,
        SectionKind::KernelExecution,
        SectionKind::ComputeUnitUtilization,
        SectionKind::HostToGlobalMemory,
        SectionKind::KernelsToGlobalMemory,
    ];

    /// Section title as written by the profiler (also the JSON key).
    pub fn title(self) -> &'static str {
        match self {
            SectionKind::ApiCalls => "OpenCL API Calls",
            SectionKind::KernelExecution => "Kernel Execution",
            SectionKind::ComputeUnitUtilization => "Compute Unit Utilization",
            SectionKind::HostToGlobalMemory => "Data Transfer: Host to Global Memory",
            SectionKind::KernelsToGlobalMemory => "Data Transfer: Kernels to Global Memory",
        }
    }

    pub fn from_title(line: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.title() == line)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCall {
    pub name: String,
    pub calls: u64,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelExecution {
    pub kernel: String,
    pub enqueues: u64,
    /// Milliseconds.
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeUnitUtilization {
    pub cu: String,
    pub kernel: String,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostTransfer {
    #[serde(rename = "type")]
    pub kind: String,
    pub transfers: u64,
    pub speed: f64,
    pub utilization: f64,
    pub size: f64,
    /// Milliseconds.
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelTransfer {
    pub interface: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub transfers: u64,
    pub speed: f64,
    pub utilization: f64,
    pub size: f64,
}

/// Parsed profiling summary. `None` means the section was not in the report;
/// `Some(vec![])` means it was present with no rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    #[serde(rename = "OpenCL API Calls", default, skip_serializing_if = "Option::is_none")]
    pub api_calls: Option<Vec<ApiCall>>,

    #[serde(rename = "Kernel Execution", default, skip_serializing_if = "Option::is_none")]
    pub kernel_execution: Option<Vec<KernelExecution>>,

    #[serde(rename = "Compute Unit Utilization", default, skip_serializing_if = "Option::is_none")]
    pub compute_units: Option<Vec<ComputeUnitUtilization>>,

    #[serde(
        rename = "Data Transfer: Host to Global Memory",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub host_transfers: Option<Vec<HostTransfer>>,

    #[serde(
        rename = "Data Transfer: Kernels to Global Memory",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kernel_transfers: Option<Vec<KernelTransfer>>,
}

impl ProfileSummary {
    /// Whether a section of this kind was present in the report.
    pub fn has_section(&self, kind: SectionKind) -> bool {
        match kind {
            SectionKind::ApiCalls => self.api_calls.is_some(),
            SectionKind::KernelExecution => self.kernel_execution.is_some(),
            SectionKind::ComputeUnitUtilization => self.compute_units.is_some(),
            SectionKind::HostToGlobalMemory => self.host_transfers.is_some(),
            SectionKind::KernelsToGlobalMemory => self.kernel_transfers.is_some(),
        }
    }

    /// Start a fresh (empty) list for `kind`, discarding an earlier one.
    fn open_section(&mut self, kind: SectionKind) {
        match kind {
            SectionKind::ApiCalls => self.api_calls = Some(Vec::new()),
            SectionKind::KernelExecution => self.kernel_execution = Some(Vec::new()),
            SectionKind::ComputeUnitUtilization => self.compute_units = Some(Vec::new()),
            SectionKind::HostToGlobalMemory => self.host_transfers = Some(Vec::new()),
            SectionKind::KernelsToGlobalMemory => self.kernel_transfers = Some(Vec::new()),
        }
    }

    fn push_row(&mut self, kind: SectionKind, cols: &[&str]) -> Result<(), String> {
        match kind {
            SectionKind::ApiCalls => push(
                &mut self.api_calls,
                ApiCall {
                    name: text(cols, 0)?,
                    calls: int(cols, 1)?,
                    time: float(cols, 2)?,
                },
            ),
            SectionKind::KernelExecution => push(
                &mut self.kernel_execution,
                KernelExecution {
                    kernel: text(cols, 0)?,
                    enqueues: int(cols, 1)?,
                    time: float(cols, 2)?,
                },
            ),
            SectionKind::ComputeUnitUtilization => push(
                &mut self.compute_units,
                ComputeUnitUtilization {
                    cu: text(cols, 1)?,
                    kernel: text(cols, 2)?,
                    time: float(cols, 9)?,
                },
            ),
            SectionKind::HostToGlobalMemory => push(
                &mut self.host_transfers,
                HostTransfer {
                    kind: text(cols, 1)?,
                    transfers: int(cols, 2)?,
                    speed: float(cols, 3)?,
                    utilization: float(cols, 4)?,
                    size: float(cols, 5)?,
                    time: float(cols, 6)?,
                },
            ),
            SectionKind::KernelsToGlobalMemory => push(
                &mut self.kernel_transfers,
                KernelTransfer {
                    interface: text(cols, 3)?,
                    kind: text(cols, 4)?,
                    transfers: int(cols, 5)?,
                    speed: float(cols, 6)?,
                    utilization: float(cols, 7)?,
                    size: float(cols, 8)?,
                },
            ),
        }
        Ok(())
    }
}

fn push<T>(section: &mut Option<Vec<T>>, row: T) {
    section.get_or_insert_with(Vec::new).push(row);
}

fn column<'a>(cols: &[&'a str], i: usize) -> Result<&'a str, String> {
    cols.get(i)
        .copied()
        .ok_or_else(|| format!("expected at least {} columns, got {}", i + 1, cols.len()))
}

fn text(cols: &[&str], i: usize) -> Result<String, String> {
    column(cols, i).map(str::to_string)
}

fn int(cols: &[&str], i: usize) -> Result<u64, String> {
    let raw = column(cols, i)?;
    raw.trim()
        .parse::<u64>()
        .map_err(|_| format!("column {}: expected integer, got {:?}", i, raw))
}

fn float(cols: &[&str], i: usize) -> Result<f64, String> {
    let raw = column(cols, i)?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("column {}: expected number, got {:?}", i, raw))
}

/// Parse a `profile_summary.csv` file.
pub fn parse_profile_summary(path: &Path) -> BenchResult<ProfileSummary> {
    let file = File::open(path).map_err(|e| BenchError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut summary = ProfileSummary::default();
    let mut mode: Option<SectionKind> = None;
    let mut skip_line = false;

    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| BenchError::io(path, e))?;
        let line = line.trim();

        // Column labels directly after a section title.
        if skip_line {
            skip_line = false;
            continue;
        }

        if let Some(kind) = SectionKind::from_title(line) {
            if summary.has_section(kind) {
                warn!(
                    file = %path.display(),
                    section = kind.title(),
                    "repeated section, keeping the last one"
                );
            }
            summary.open_section(kind);
            mode = Some(kind);
            skip_line = true;
            continue;
        }

        if line.is_empty() {
            mode = None;
        }

        let Some(kind) = mode else {
            continue;
        };

        let cols: Vec<&str> = line.split(',').collect();
        summary
            .push_row(kind, &cols)
            .map_err(|msg| BenchError::format(path, Some(i + 1), format!("{}: {}", kind.title(), msg)))?;
    }

    debug!(
        file = %path.display(),
        sections = SectionKind::ALL.iter().filter(|k| summary.has_section(**k)).count(),
        "parsed profile summary"
    );
    Ok(summary)
}

// ────────────────────────────────────────────────────────────────────────────────
// Trial artifact (run<n>.json)
// ────────────────────────────────────────────────────────────────────────────────

/// Everything recorded for one FPGA trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialArtifact {
    /// Power samples; empty when the trial ran without power sampling.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub power: Vec<PowerSample>,

    /// Kernel-active window on the power sampler's clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,

    #[serde(flatten)]
    pub profile: ProfileSummary,
}

/// `{"START": .., "END": ..}`; values may be numbers or numeric strings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(rename = "START", deserialize_with = "number_or_string")]
    pub start: f64,
    #[serde(rename = "END", deserialize_with = "number_or_string")]
    pub end: f64,
}

impl From<Timeline> for KernelWindow {
    fn from(t: Timeline) -> Self {
        KernelWindow {
            start: t.start,
            end: t.end,
        }
    }
}

fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

impl TrialArtifact {
    /// Extract telemetry from a directory the benchmark ran in.
    ///
    /// A missing power profile or profiling summary is not an error.
    pub fn extract(dir: &Path) -> BenchResult<Self> {
        let power = power::read_power_samples(dir)?;
        let summary_path = dir.join(PROFILE_SUMMARY_FILE);
        let profile = if summary_path.exists() {
            parse_profile_summary(&summary_path)?
        } else {
            debug!(dir = %dir.display(), "no profile summary");
            ProfileSummary::default()
        };
        Ok(Self {
            power,
            timeline: None,
            profile,
        })
    }

    pub fn load(path: &Path) -> BenchResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        serde_json::from_str(&content).map_err(|source| BenchError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> BenchResult<()> {
        let json = serde_json::to_string(self).map_err(|source| BenchError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|e| BenchError::io(path, e))
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// FPGA trial record
// ────────────────────────────────────────────────────────────────────────────────

/// Per-trial FPGA quantities derived from a [`TrialArtifact`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FpgaTrial {
    /// Seconds, from the first kernel-execution record.
    pub kernel_execution_time: Option<f64>,
    /// Joules over the kernel window; `None` without power or timeline.
    pub energy: Option<f64>,
    /// Seconds spent in host-to-global-memory transfers.
    pub transfer_time: Option<f64>,
    /// Raw power series, kept for callers that want it without kernel timing.
    #[serde(skip)]
    pub power: Vec<PowerSample>,
}

impl FpgaTrial {
    pub fn from_artifact(artifact: &TrialArtifact) -> Self {
        let kernel_execution_time = artifact
            .profile
            .kernel_execution
            .as_ref()
            .and_then(|rows| rows.first())
            .map(|k| k.time / 1000.0);

        let transfer_time = artifact
            .profile
            .host_transfers
            .as_ref()
            .map(|rows| rows.iter().map(|t| t.time).sum::<f64>() / 1000.0);

        let energy = artifact
            .timeline
            .and_then(|t| energy::correlate_energy(&artifact.power, t.into()));

        Self {
            kernel_execution_time,
            energy,
            transfer_time,
            power: artifact.power.clone(),
        }
    }

    /// Load a `run<n>.json` that must carry a kernel-execution time.
    pub fn load(path: &Path) -> BenchResult<Self> {
        let trial = Self::from_artifact(&TrialArtifact::load(path)?);
        if trial.kernel_execution_time.is_none() {
            return Err(BenchError::format(
                path,
                None,
                "missing `Kernel Execution` time",
            ));
        }
        Ok(trial)
    }
}

impl Measurement for FpgaTrial {
    fn execution_time(&self) -> Option<f64> {
        self.kernel_execution_time
    }

    fn energy_joules(&self, _energy: &EnergyConfig) -> Option<f64> {
        self.energy
    }

    fn transfer_time(&self) -> Option<f64> {
        self.transfer_time
    }
}
