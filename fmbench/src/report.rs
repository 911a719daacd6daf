// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! Pretty-print aggregated results with terminal tables, LaTeX rows, CSV and
//! JSON export.

use crate::aggregate::{self, Comparison, ConditionSummary, ResultSet};
use crate::harness::cpu::CpuTrial;
use crate::harness::stats::Summary;
use crate::{BenchError, BenchResult, Condition, EnergyConfig, Measurement};
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

// ────────────────────────────────────────────────────────────────────────────────
// Terminal output
// ────────────────────────────────────────────────────────────────────────────────

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn print_title(title: &str) {
    println!("\n{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Per-condition statistics of one target.
pub fn print_summaries(title: &str, rows: &[ConditionSummary]) {
    if rows.is_empty() {
        return;
    }
    print_title(title);

    let mut table = new_table();
    table.set_header(vec![
        "Condition",
        "Trials",
        "Throughput (pat/s)",
        "CV",
        "Time (s)",
        "Energy (J)",
        "Transfer (s)",
    ]);

    let best = rows
        .iter()
        .filter_map(|r| r.throughput.map(|s| s.mean))
        .fold(0.0f64, f64::max);

    for r in rows {
        let is_best = r
            .throughput
            .is_some_and(|s| best > 0.0 && (s.mean - best).abs() < f64::EPSILON * best);
        let tp = Cell::new(format_summary(r.throughput, format_throughput));
        let tp = if is_best { tp.fg(Color::Green) } else { tp };
        let trials = if r.trials == 0 {
            Cell::new("0").fg(Color::Yellow)
        } else {
            Cell::new(r.trials)
        };

        table.add_row(vec![
            Cell::new(r.condition.to_string()),
            trials,
            tp,
            Cell::new(format_cv(r.throughput)),
            Cell::new(format_summary(r.execution_time, |v| format!("{:.4}", v))),
            Cell::new(format_summary(r.energy, |v| format!("{:.3}", v))),
            Cell::new(format_summary(r.transfer_time, |v| format!("{:.4}", v))),
        ]);
    }

    println!("{table}");
}

/// Ratios of target A over target B.
pub fn print_comparisons(title: &str, rows: &[Comparison]) {
    if rows.is_empty() {
        return;
    }
    print_title(title);

    let mut table = new_table();
    table.set_header(vec![
        "Condition",
        "Pairs",
        "Speedup",
        "Cycle speedup",
        "Time ratio",
        "Energy ratio",
    ]);

    for r in rows {
        let speedup = Cell::new(format_summary(r.speedup, format_ratio));
        let speedup = match r.speedup {
            Some(s) if s.mean >= 1.0 => speedup.fg(Color::Green),
            Some(_) => speedup.fg(Color::Red),
            None => speedup,
        };

        table.add_row(vec![
            Cell::new(r.condition.to_string()),
            Cell::new(r.paired_trials),
            speedup,
            Cell::new(format_summary(r.cycle_speedup, format_ratio)),
            Cell::new(format_summary(r.time_ratio, format_ratio)),
            Cell::new(format_summary(r.energy_ratio, format_ratio)),
        ]);
    }

    println!("{table}");

    let skipped = rows.iter().filter(|r| r.speedup.is_none()).count();
    if skipped > 0 {
        println!(
            "  {}",
            format!("{} condition(s) without paired trials", skipped).dimmed()
        );
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// LaTeX rows
// ────────────────────────────────────────────────────────────────────────────────

/// One row per pattern length: mean matches per pattern for every
/// (corpus, size), rounded. `len & v & v ... \\`
pub fn match_count_rows(
    cpu: &ResultSet<CpuTrial>,
    conditions: &[Condition],
    pattern_count: u64,
) -> Vec<String> {
    let lengths: BTreeSet<u32> = conditions.iter().map(|c| c.length).collect();
    lengths
        .into_iter()
        .map(|length| {
            let cells: Vec<String> = conditions
                .iter()
                .filter(|c| c.length == length)
                .map(|c| {
                    aggregate::matches_per_pattern(cpu.trials(c), pattern_count)
                        .map(|s| format!("{:.0}", s.mean))
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect();
            latex_row(&length.to_string(), &cells)
        })
        .collect()
}

/// Mean energy of A over mean energy of B for each condition pair, as
/// `label & $x.x\times$ ... \\`.
pub fn energy_row<A: Measurement, B: Measurement>(
    label: &str,
    pairs: &[(&[A], &[B])],
    units: &EnergyConfig,
) -> String {
    let cells: Vec<String> = pairs
        .iter()
        .map(|(a, b)| {
            aggregate::mean_energy_ratio(a, b, units)
                .map(format_times)
                .unwrap_or_else(|| "-".to_string())
        })
        .collect();
    latex_row(label, &cells)
}

pub fn format_times(ratio: f64) -> String {
    format!("${:.1}\\times$", ratio)
}

fn latex_row(label: &str, cells: &[String]) -> String {
    let mut row = label.to_string();
    for cell in cells {
        row.push_str(" & ");
        row.push_str(cell);
    }
    row.push_str(" \\\\");
    row
}

pub fn print_latex(title: &str, rows: &[String]) {
    if rows.is_empty() {
        return;
    }
    println!("\n{}", format!("── {} ──", title).bold().yellow());
    for row in rows {
        println!("{}", row);
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// CSV export
// ────────────────────────────────────────────────────────────────────────────────

pub fn export_summaries_csv(rows: &[ConditionSummary], path: &Path) -> BenchResult<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;

    wtr.write_record([
        "target",
        "corpus",
        "size_mb",
        "length",
        "trials",
        "throughput_mean",
        "throughput_stddev",
        "time_mean",
        "time_stddev",
        "energy_mean",
        "energy_stddev",
        "transfer_mean",
        "transfer_stddev",
    ])
    .map_err(|e| csv_error(path, e))?;

    for r in rows {
        let mut record = vec![
            r.target.to_string(),
            r.condition.corpus.clone(),
            r.condition.size_mb.to_string(),
            r.condition.length.to_string(),
            r.trials.to_string(),
        ];
        for s in [r.throughput, r.execution_time, r.energy, r.transfer_time] {
            record.extend(csv_cells(s));
        }
        wtr.write_record(&record).map_err(|e| csv_error(path, e))?;
    }

    wtr.flush().map_err(|e| BenchError::io(path, e))?;
    println!("  CSV exported to {}", path.display());
    Ok(())
}

pub fn export_comparisons_csv(rows: &[Comparison], path: &Path) -> BenchResult<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;

    wtr.write_record([
        "a",
        "b",
        "corpus",
        "size_mb",
        "length",
        "pairs",
        "speedup_mean",
        "speedup_stddev",
        "cycle_speedup_mean",
        "cycle_speedup_stddev",
        "time_ratio_mean",
        "time_ratio_stddev",
        "energy_ratio_mean",
        "energy_ratio_stddev",
    ])
    .map_err(|e| csv_error(path, e))?;

    for r in rows {
        let mut record = vec![
            r.a.to_string(),
            r.b.to_string(),
            r.condition.corpus.clone(),
            r.condition.size_mb.to_string(),
            r.condition.length.to_string(),
            r.paired_trials.to_string(),
        ];
        for s in [r.speedup, r.cycle_speedup, r.time_ratio, r.energy_ratio] {
            record.extend(csv_cells(s));
        }
        wtr.write_record(&record).map_err(|e| csv_error(path, e))?;
    }

    wtr.flush().map_err(|e| BenchError::io(path, e))?;
    println!("  CSV exported to {}", path.display());
    Ok(())
}

/// Mean and stddev columns; empty when there is no data.
fn csv_cells(summary: Option<Summary>) -> [String; 2] {
    match summary {
        Some(s) => [format!("{:.6}", s.mean), format!("{:.6}", s.stddev)],
        None => [String::new(), String::new()],
    }
}

fn csv_error(path: &Path, e: csv::Error) -> BenchError {
    BenchError::io(path, std::io::Error::new(std::io::ErrorKind::Other, e))
}

// ────────────────────────────────────────────────────────────────────────────────
// JSON export
// ────────────────────────────────────────────────────────────────────────────────

pub fn export_json<T: Serialize + ?Sized>(rows: &T, path: &Path) -> BenchResult<()> {
    let json = serde_json::to_string_pretty(rows).map_err(|source| BenchError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|e| BenchError::io(path, e))?;
    println!("  JSON exported to {}", path.display());
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────────
// Formatting helpers
// ────────────────────────────────────────────────────────────────────────────────

/// `mean ± stddev`, or `-` for no data.
fn format_summary(summary: Option<Summary>, fmt: impl Fn(f64) -> String) -> String {
    match summary {
        Some(s) => format!("{} ± {}", fmt(s.mean), fmt(s.stddev)),
        None => "-".to_string(),
    }
}

/// Relative spread of a summary as a percentage.
fn format_cv(summary: Option<Summary>) -> String {
    match summary.and_then(|s| s.cv()) {
        Some(cv) => format!("{:.1}%", cv * 100.0),
        None => "-".to_string(),
    }
}

fn format_throughput(t: f64) -> String {
    if t >= 1_000_000.0 {
        format!("{:.2}M", t / 1_000_000.0)
    } else if t >= 1_000.0 {
        format!("{:.1}K", t / 1_000.0)
    } else {
        format!("{:.1}", t)
    }
}

fn format_ratio(r: f64) -> String {
    format!("{:.2}x", r)
}
