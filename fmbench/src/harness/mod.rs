// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! Telemetry extraction and correlation.
//!
//! This module provides:
//! - CPU result file parsing (hexadecimal float timings)
//! - FPGA power profile and profiling-summary extraction
//! - Energy correlation over the kernel-active window
//! - Summary statistics

pub mod cpu;
pub mod energy;
pub mod hexfloat;
pub mod power;
pub mod profile;
pub mod stats;

pub use cpu::CpuTrial;
pub use energy::{correlate_energy, simpson, KernelWindow};
pub use power::PowerSample;
pub use profile::{FpgaTrial, ProfileSummary, SectionKind, Timeline, TrialArtifact};
pub use stats::Summary;
