// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! Criterion microbenchmarks for telemetry parsing and energy correlation.
//!
//! Run with: `cargo bench --bench telemetry`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fmbench::harness::energy::{correlate_energy, simpson, KernelWindow};
use fmbench::harness::power::PowerSample;
use fmbench::harness::profile::{parse_profile_summary, PROFILE_SUMMARY_FILE};
use fmbench::CpuTrial;
use tempfile::TempDir;

fn samples(n: usize) -> Vec<PowerSample> {
    (0..n)
        .map(|i| PowerSample {
            timestamp: i as f64 * 10.0,
            power: 12.0 + (i % 7) as f64 * 0.25,
        })
        .collect()
}

fn bench_simpson(c: &mut Criterion) {
    let mut group = c.benchmark_group("simpson");
    for n in [101usize, 1_000, 10_000] {
        let series = samples(n);
        let x: Vec<f64> = series.iter().map(|s| s.timestamp / 1000.0).collect();
        let y: Vec<f64> = series.iter().map(|s| s.power).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| simpson(black_box(&y), black_box(&x)));
        });
    }
    group.finish();
}

fn bench_correlate(c: &mut Criterion) {
    let series = samples(10_000);
    let window = KernelWindow {
        start: 12_345.0,
        end: 87_654.0,
    };
    c.bench_function("correlate_energy/10000", |b| {
        b.iter(|| correlate_energy(black_box(&series), window));
    });
}

fn bench_profile_summary(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(PROFILE_SUMMARY_FILE);

    let mut content = String::from("Profile Summary\n\nOpenCL API Calls\nAPI Name,Number Of Calls,Total Time (ms)\n");
    for i in 0..500 {
        content.push_str(&format!("clCall{},{},{}.5\n", i, i + 1, i));
    }
    content.push_str("\nKernel Execution\nKernel,Number Of Enqueues,Total Time (ms)\nfmindex,1,125.5\n\n");
    std::fs::write(&path, content).unwrap();

    c.bench_function("parse_profile_summary/500", |b| {
        b.iter(|| parse_profile_summary(black_box(&path)).unwrap());
    });
}

fn bench_cpu_line(c: &mut Criterion) {
    c.bench_function("cpu_parse_line", |b| {
        b.iter(|| CpuTrial::parse_line(black_box("0x1.47ae147ae147bp-7 0x1.0624dd2f1a9fcp-10 123456")));
    });
}

criterion_group!(
    benches,
    bench_simpson,
    bench_correlate,
    bench_profile_summary,
    bench_cpu_line
);
criterion_main!(benches);
