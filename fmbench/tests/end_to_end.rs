// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! End-to-end analysis over result directories laid out on disk.

use fmbench::aggregate::Aggregator;
use fmbench::harness::profile::PROFILE_SUMMARY_FILE;
use fmbench::{
    BenchError, Condition, CpuTrial, ExperimentConfig, FpgaTrial, Measurement, ResultSet, Target,
    TrialArtifact,
};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(root: &Path) -> ExperimentConfig {
    let yaml = format!(
        r#"
experiment:
  pattern_count: 1000
  max_matches: 10
  repeats: 2
  corpora: [dna]
  sizes: [20]
  lengths: [8, 16]
paths:
  cpu_results: {root}/cpu
sources:
  final: {root}/final_results
"#,
        root = root.display()
    );
    let path = root.join("experiment.yaml");
    fs::write(&path, yaml).unwrap();
    ExperimentConfig::load(&path).unwrap()
}

fn write_cpu_results(root: &Path) {
    let dir = root.join("cpu");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("dna.20MB.cpu8.result"),
        "0x1.0p+0 0x1.0p+1 100\n0x1.0p+1 0x1.0p+1 150\n",
    )
    .unwrap();
    fs::write(dir.join("dna.20MB.cpu16.result"), "").unwrap();
}

/// Constant 10 W sampled every 100 ms from 0 to 1000 ms.
fn constant_power() -> serde_json::Value {
    json!((0..=10)
        .map(|i| json!({"timestamp": i as f64 * 100.0, "power": 10.0}))
        .collect::<Vec<_>>())
}

fn write_fpga_run(dir: &Path, n: usize, kernel_ms: f64) {
    fs::create_dir_all(dir).unwrap();
    let doc = json!({
        "power": constant_power(),
        "timeline": {"START": "200", "END": 700},
        "Kernel Execution": [{"kernel": "fmindex", "enqueues": 1, "time": kernel_ms}],
        "Data Transfer: Host to Global Memory": [
            {"type": "WRITE", "transfers": 2, "speed": 1600.0, "utilization": 16.6, "size": 20000.0, "time": 40.0},
            {"type": "READ", "transfers": 1, "speed": 800.5, "utilization": 8.3, "size": 4.0, "time": 2.5}
        ]
    });
    fs::write(dir.join(format!("run{}.json", n)), doc.to_string()).unwrap();
}

#[test]
fn cpu_results_to_throughput() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    write_cpu_results(tmp.path());

    let cpu = ResultSet::<CpuTrial>::load_cpu(&config.paths.cpu_results, &config.conditions()).unwrap();
    let trials = cpu.trials(&Condition::new("dna", 20, 8));
    assert_eq!(trials[0].range_build_time, 1.0);
    assert_eq!(trials[1].match_count, 150);

    let rows = Aggregator::new(&config).summarize(&cpu);
    assert_eq!(rows.len(), 2);

    let tp = rows[0].throughput.unwrap();
    assert!((tp.mean - 291.6666666666667).abs() < 1e-9);
    assert!((tp.max - 333.3333333333333).abs() < 1e-9);
    assert!((tp.min - 250.0).abs() < 1e-9);

    // An empty result file is "no data", not zero.
    assert_eq!(rows[1].trials, 0);
    assert!(rows[1].throughput.is_none());
}

#[test]
fn fpga_runs_to_energy_and_speedup() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    write_cpu_results(tmp.path());

    let condition_dir = config.source_dir("final").join("dna.20MB.len8");
    write_fpga_run(&condition_dir, 0, 500.0);
    write_fpga_run(&condition_dir, 1, 500.0);

    let fpga = ResultSet::<FpgaTrial>::load_fpga("final", &config.source_dir("final"), &config.conditions())
        .unwrap();
    assert_eq!(fpga.target, Target::Fpga("final".into()));

    let trials = fpga.trials(&Condition::new("dna", 20, 8));
    assert_eq!(trials.len(), 2);
    for t in trials {
        assert_eq!(t.kernel_execution_time, Some(0.5));
        assert!((t.energy.unwrap() - 5.0).abs() < 1e-9);
        assert!((t.transfer_time.unwrap() - 0.0425).abs() < 1e-12);
        assert_eq!(t.power.len(), 11);
    }
    // No directory for length 16.
    assert!(fpga.trials(&Condition::new("dna", 20, 16)).is_empty());

    let cpu = ResultSet::<CpuTrial>::load_cpu(&config.paths.cpu_results, &config.conditions()).unwrap();
    let rows = Aggregator::new(&config).compare(&fpga, &cpu);
    let row = &rows[0];
    assert_eq!(row.paired_trials, 2);

    // CPU times 3 s and 4 s against 0.5 s on the kernel.
    let speedup = row.speedup.unwrap();
    assert!((speedup.mean - 7.0).abs() < 1e-9);
    let cycles = row.cycle_speedup.unwrap();
    assert!((cycles.mean - 7.0 * 3.4 / 0.3).abs() < 1e-9);

    // CPU energy: 2.0 counter units / 1e6.
    let energy = row.energy_ratio.unwrap();
    assert!((energy.mean - 5.0 / 2.0e-6).abs() < 1e-3);

    assert!(rows[1].speedup.is_none());
    assert_eq!(rows[1].paired_trials, 0);
}

#[test]
fn missing_summary_keeps_power() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("power_profile_fmindex.csv"),
        "timestamp,12v_aux_curr,12v_aux_vol,12v_pex_curr,12v_pex_vol\nunits\n0,12000,1500,3300,1000\n50,12000,1500,3300,1000\n",
    )
    .unwrap();

    let artifact = TrialArtifact::extract(tmp.path()).unwrap();
    assert!(!tmp.path().join(PROFILE_SUMMARY_FILE).exists());
    assert_eq!(artifact.power.len(), 2);
    assert!((artifact.power[0].power - 21.3).abs() < 1e-9);

    let trial = FpgaTrial::from_artifact(&artifact);
    assert_eq!(trial.kernel_execution_time, None);
    assert_eq!(trial.execution_time(), None);
    assert_eq!(trial.transfer_time, None);
    assert_eq!(trial.power.len(), 2);

    // Stored without a kernel time, the run is rejected by the loader.
    let run = tmp.path().join("run0.json");
    artifact.write(&run).unwrap();
    let err = FpgaTrial::load(&run).unwrap_err();
    assert!(matches!(err, BenchError::Format { .. }));
}

#[test]
fn unequal_trial_counts_truncate() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    let dir = tmp.path().join("cpu");
    fs::create_dir_all(&dir).unwrap();
    let five: String = (0..5).map(|_| "0x1p+0 0x1p+0 1\n").collect();
    fs::write(dir.join("dna.20MB.cpu8.result"), five).unwrap();
    fs::write(dir.join("dna.20MB.cpu16.result"), "").unwrap();

    let condition_dir = config.source_dir("final").join("dna.20MB.len8");
    for n in 0..3 {
        write_fpga_run(&condition_dir, n, 1000.0);
    }

    let cpu = ResultSet::<CpuTrial>::load_cpu(&dir, &config.conditions()).unwrap();
    let fpga = ResultSet::<FpgaTrial>::load_fpga("final", &config.source_dir("final"), &config.conditions())
        .unwrap();
    let rows = Aggregator::new(&config).compare(&cpu, &fpga);

    assert_eq!(rows[0].paired_trials, 3);
    let speedup = rows[0].speedup.unwrap();
    assert_eq!(speedup.count, 3);
    assert!((speedup.mean - 0.5).abs() < 1e-12);
}

#[test]
fn malformed_cpu_line_rejects_condition() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    let dir = tmp.path().join("cpu");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("dna.20MB.cpu8.result"), "0x1p+0 0x1p+0 1\n0x1p+0 0x1p+0\n").unwrap();

    let err = ResultSet::<CpuTrial>::load_cpu(&dir, &config.conditions()).unwrap_err();
    match err {
        BenchError::Format { path, line, .. } => {
            assert!(path.ends_with("dna.20MB.cpu8.result"));
            assert_eq!(line, Some(2));
        }
        other => panic!("unexpected error: {other}"),
    }
}
