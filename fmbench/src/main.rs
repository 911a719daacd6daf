// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! FM-index benchmark runner and report generator
//!
//! Usage:
//!   fmbench run-cpu --config experiment.yaml
//!   fmbench run-fpga --config experiment.yaml --kernel final --target hw
//!   fmbench extract fpga/sw_emu --output run0.json
//!   fmbench report compare --config experiment.yaml --kernel final --export out

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use fmbench::aggregate::Aggregator;
use fmbench::report;
use fmbench::runner::{EmulationMode, TrialRunner};
use fmbench::{
    BenchError, BenchResult, CpuTrial, ExperimentConfig, FpgaTrial, ResultSet, Target,
    TrialArtifact,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "fmbench", about = "FM-index CPU/FPGA benchmark suite")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the CPU reference benchmark for every condition.
    RunCpu {
        #[arg(long)]
        config: PathBuf,
    },

    /// Run an FPGA kernel for every condition.
    RunFpga {
        #[arg(long)]
        config: PathBuf,

        /// Kernel name; `<kernel>.xclbin` must exist in the target directory.
        #[arg(long)]
        kernel: String,

        /// sw_emu, hw_emu or hw.
        #[arg(long, default_value = "sw_emu")]
        target: EmulationMode,
    },

    /// Extract the telemetry of one FPGA run directory as JSON.
    Extract {
        dir: PathBuf,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Aggregate stored results and print tables.
    Report {
        kind: ReportKind,

        #[arg(long)]
        config: PathBuf,

        /// FPGA kernel for `fpga` and `compare`.
        #[arg(long, default_value = "final")]
        kernel: String,

        /// Export directory for CSV + JSON results.
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReportKind {
    /// CPU statistics and the match-count table.
    Cpu,
    /// Statistics of one kernel.
    Fpga,
    /// One kernel against the CPU.
    Compare,
    /// Every configured kernel against the CPU.
    Opts,
}

fn main() -> BenchResult<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::RunCpu { config } => {
            let config = ExperimentConfig::load(&config)?;
            banner("CPU reference benchmark");
            TrialRunner::new(&config).run_cpu()
        }
        Command::RunFpga {
            config,
            kernel,
            target,
        } => {
            let config = ExperimentConfig::load(&config)?;
            banner(&format!("FPGA benchmark: {} ({})", kernel, target));
            TrialRunner::new(&config).run_fpga(&kernel, target)
        }
        Command::Extract { dir, output } => extract(&dir, output.as_deref()),
        Command::Report {
            kind,
            config,
            kernel,
            export,
        } => {
            let config = ExperimentConfig::load(&config)?;
            if let Some(dir) = &export {
                fs::create_dir_all(dir).map_err(|e| BenchError::Io {
                    path: dir.clone(),
                    source: e,
                })?;
            }
            match kind {
                ReportKind::Cpu => report_cpu(&config, export.as_deref()),
                ReportKind::Fpga => report_fpga(&config, &kernel, export.as_deref()),
                ReportKind::Compare => report_compare(&config, &kernel, export.as_deref()),
                ReportKind::Opts => report_opts(&config, export.as_deref()),
            }
        }
    }
}

fn banner(title: &str) {
    println!(
        "\n{}",
        "╔══════════════════════════════════════════════════════╗"
            .bold()
            .blue()
    );
    println!("{}", format!("║  {:<52}║", title).bold().blue());
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════╝"
            .bold()
            .blue()
    );
}

fn extract(dir: &Path, output: Option<&Path>) -> BenchResult<()> {
    let artifact = TrialArtifact::extract(dir)?;
    match output {
        Some(path) => artifact.write(path),
        None => {
            let json = serde_json::to_string_pretty(&artifact).map_err(|source| BenchError::Json {
                path: dir.to_path_buf(),
                source,
            })?;
            println!("{}", json);
            Ok(())
        }
    }
}

fn load_cpu(config: &ExperimentConfig) -> BenchResult<ResultSet<CpuTrial>> {
    ResultSet::load_cpu(&config.paths.cpu_results, &config.conditions())
}

fn load_fpga(config: &ExperimentConfig, kernel: &str) -> BenchResult<ResultSet<FpgaTrial>> {
    ResultSet::load_fpga(kernel, &config.source_dir(kernel), &config.conditions())
}

fn report_cpu(config: &ExperimentConfig, export: Option<&Path>) -> BenchResult<()> {
    let cpu = load_cpu(config)?;
    let rows = Aggregator::new(config).summarize(&cpu);
    report::print_summaries(&Target::Cpu.display_name(), &rows);

    let matches = report::match_count_rows(&cpu, &config.conditions(), config.experiment.pattern_count);
    report::print_latex("Matches per pattern", &matches);

    if let Some(dir) = export {
        report::export_summaries_csv(&rows, &dir.join("cpu_summary.csv"))?;
        report::export_json(&rows, &dir.join("cpu_summary.json"))?;
    }
    Ok(())
}

fn report_fpga(config: &ExperimentConfig, kernel: &str, export: Option<&Path>) -> BenchResult<()> {
    let fpga = load_fpga(config, kernel)?;
    let rows = Aggregator::new(config).summarize(&fpga);
    report::print_summaries(&fpga.target.display_name(), &rows);

    if let Some(dir) = export {
        report::export_summaries_csv(&rows, &dir.join(format!("{}_summary.csv", kernel)))?;
        report::export_json(&rows, &dir.join(format!("{}_summary.json", kernel)))?;
    }
    Ok(())
}

fn report_compare(config: &ExperimentConfig, kernel: &str, export: Option<&Path>) -> BenchResult<()> {
    let cpu = load_cpu(config)?;
    let fpga = load_fpga(config, kernel)?;
    let aggregator = Aggregator::new(config);

    let rows = aggregator.compare(&fpga, &cpu);
    report::print_comparisons(
        &format!("{} vs {}", fpga.target.display_name(), cpu.target.display_name()),
        &rows,
    );
    print_energy_rows(config, &cpu, std::slice::from_ref(&fpga));

    if let Some(dir) = export {
        report::export_comparisons_csv(&rows, &dir.join(format!("{}_vs_cpu.csv", kernel)))?;
        report::export_json(&rows, &dir.join(format!("{}_vs_cpu.json", kernel)))?;
    }
    Ok(())
}

fn report_opts(config: &ExperimentConfig, export: Option<&Path>) -> BenchResult<()> {
    if config.sources.is_empty() {
        return Err(BenchError::Config("no kernels listed under `sources`".into()));
    }
    let cpu = load_cpu(config)?;
    let aggregator = Aggregator::new(config);

    let mut kernels = Vec::with_capacity(config.sources.len());
    let mut summaries = aggregator.summarize(&cpu);
    let mut comparisons = Vec::new();
    for kernel in config.sources.keys() {
        let fpga = load_fpga(config, kernel)?;
        summaries.extend(aggregator.summarize(&fpga));
        comparisons.extend(aggregator.compare(&fpga, &cpu));
        kernels.push(fpga);
    }

    report::print_summaries("Throughput per target", &summaries);
    report::print_comparisons("Kernels vs reference CPU application", &comparisons);
    print_energy_rows(config, &cpu, &kernels);

    if let Some(dir) = export {
        report::export_summaries_csv(&summaries, &dir.join("opts_summary.csv"))?;
        report::export_comparisons_csv(&comparisons, &dir.join("opts_vs_cpu.csv"))?;
        report::export_json(&comparisons, &dir.join("opts_vs_cpu.json"))?;
    }
    Ok(())
}

/// One LaTeX row per kernel, one cell per condition.
fn print_energy_rows(config: &ExperimentConfig, cpu: &ResultSet<CpuTrial>, kernels: &[ResultSet<FpgaTrial>]) {
    let conditions = config.conditions();
    let rows: Vec<String> = kernels
        .iter()
        .map(|fpga| {
            let pairs: Vec<(&[FpgaTrial], &[CpuTrial])> = conditions
                .iter()
                .map(|c| (fpga.trials(c), cpu.trials(c)))
                .collect();
            report::energy_row(
                &format!("\\textit{{{}}}", fpga.target.name()),
                &pairs,
                &config.energy,
            )
        })
        .collect();
    report::print_latex("Energy FPGA / CPU", &rows);
}
