// Copyright 2025 ToonDB Authors
//
// Licensed under the Apache License, Version 2.0

//! Sequential trial runner.
//!
//! Every repetition invokes the test-data generator and then the benchmark
//! binary. Any nonzero exit aborts the whole run. Result artifacts of a
//! condition are reset before its first repetition.

use crate::config::ExperimentConfig;
use crate::harness::power;
use crate::harness::profile::{TrialArtifact, PROFILE_SUMMARY_FILE};
use crate::{BenchError, BenchResult, Condition};
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Environment variable selecting the emulation flavour of the FPGA runtime.
pub const EMULATION_ENV: &str = "XCL_EMULATION_MODE";

// ────────────────────────────────────────────────────────────────────────────────
// Execution target
// ────────────────────────────────────────────────────────────────────────────────

/// Build target of an FPGA kernel, which is also its working directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmulationMode {
    #[default]
    SwEmu,
    HwEmu,
    Hw,
}

impl EmulationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EmulationMode::SwEmu => "sw_emu",
            EmulationMode::HwEmu => "hw_emu",
            EmulationMode::Hw => "hw",
        }
    }

    /// Value for [`EMULATION_ENV`]; real hardware runs without it.
    pub fn env_override(self) -> Option<&'static str> {
        match self {
            EmulationMode::Hw => None,
            other => Some(other.as_str()),
        }
    }
}

impl FromStr for EmulationMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sw_emu" => Ok(EmulationMode::SwEmu),
            "hw_emu" => Ok(EmulationMode::HwEmu),
            "hw" => Ok(EmulationMode::Hw),
            other => Err(BenchError::Config(format!(
                "unknown target '{}', expected sw_emu, hw_emu or hw",
                other
            ))),
        }
    }
}

impl fmt::Display for EmulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Working directory guard
// ────────────────────────────────────────────────────────────────────────────────

/// Changes the process working directory and restores it on drop.
pub struct WorkingDirGuard {
    previous: PathBuf,
}

impl WorkingDirGuard {
    pub fn enter(path: &Path) -> BenchResult<Self> {
        let previous = env::current_dir().map_err(|e| BenchError::io(".", e))?;
        env::set_current_dir(path).map_err(|e| BenchError::io(path, e))?;
        debug!(dir = %path.display(), "entered working directory");
        Ok(Self { previous })
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.previous) {
            warn!(dir = %self.previous.display(), error = %e, "failed to restore working directory");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Runner
// ────────────────────────────────────────────────────────────────────────────────

/// Runs every repetition of every condition, one subprocess at a time.
pub struct TrialRunner<'a> {
    config: &'a ExperimentConfig,
}

impl<'a> TrialRunner<'a> {
    pub fn new(config: &'a ExperimentConfig) -> Self {
        Self { config }
    }

    pub fn run_cpu(&self) -> BenchResult<()> {
        for condition in self.config.conditions() {
            self.run_cpu_condition(&condition)?;
        }
        Ok(())
    }

    pub fn run_fpga(&self, kernel: &str, mode: EmulationMode) -> BenchResult<()> {
        for condition in self.config.conditions() {
            self.run_fpga_condition(&condition, kernel, mode)?;
        }
        Ok(())
    }

    /// Append one result line per repetition to the condition's result file.
    pub fn run_cpu_condition(&self, condition: &Condition) -> BenchResult<PathBuf> {
        let paths = &self.config.paths;
        let data_dir = absolute(&paths.data_dir)?;
        let result_dir = absolute(&paths.cpu_results)?;
        fs::create_dir_all(&result_dir).map_err(|e| BenchError::io(&result_dir, e))?;

        let text = data_dir.join(condition.stem());
        let index = index_path(&text);
        let test = result_dir.join(condition.cpu_test_file_name());
        let result = result_dir.join(condition.cpu_result_file_name());

        let mut generator =
            self.generator_command(&absolute(&paths.generator)?, &text, &index, &test, condition);
        let mut benchmark = Command::new(absolute(&paths.cpu_benchmark)?);
        benchmark.arg(&index).arg(&test);
        info!("{}", command_line(&generator));
        info!("{}", command_line(&benchmark));

        remove_if_exists(&result)?;

        let repeats = self.config.experiment.repeats;
        for n in 0..repeats {
            info!(condition = %condition, "{}/{}", n + 1, repeats);
            run_command(&mut generator)?;

            let sink = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&result)
                .map_err(|e| BenchError::io(&result, e))?;
            benchmark.stdout(Stdio::from(sink));
            run_command(&mut benchmark)?;
        }
        Ok(result)
    }

    /// Write one `run<n>.json` per repetition into the condition directory.
    ///
    /// The test-pattern file lives in the target working directory so the
    /// condition directory only ever holds trial artifacts.
    pub fn run_fpga_condition(
        &self,
        condition: &Condition,
        kernel: &str,
        mode: EmulationMode,
    ) -> BenchResult<PathBuf> {
        let paths = &self.config.paths;
        let workspace = absolute(&paths.fpga_workspace)?;
        let target_dir = workspace.join(mode.as_str());
        let result_dir = absolute(&self.config.source_dir(kernel))?.join(condition.fpga_result_dir_name());

        let text = absolute(&paths.data_dir)?.join(condition.stem());
        let index = index_path(&text);
        let test = target_dir.join(format!("{}.test", condition.fpga_result_dir_name()));
        let mut generator =
            self.generator_command(&absolute(&paths.generator)?, &text, &index, &test, condition);

        let mut benchmark = Command::new(workspace.join(&paths.fpga_benchmark));
        benchmark
            .arg(&index)
            .arg(format!("{}.xclbin", kernel))
            .arg(&test);
        if let Some(value) = mode.env_override() {
            benchmark.env(EMULATION_ENV, value);
        }
        info!("{}", command_line(&generator));
        info!("{}", command_line(&benchmark));

        if result_dir.exists() {
            fs::remove_dir_all(&result_dir).map_err(|e| BenchError::io(&result_dir, e))?;
        }
        fs::create_dir_all(&result_dir).map_err(|e| BenchError::io(&result_dir, e))?;

        let _cwd = WorkingDirGuard::enter(&target_dir)?;
        let repeats = self.config.experiment.repeats;
        for n in 0..repeats {
            info!(condition = %condition, kernel, target = %mode, "{}/{}", n + 1, repeats);
            run_command(&mut generator)?;
            clear_telemetry(Path::new("."))?;
            run_command(&mut benchmark)?;

            let artifact = TrialArtifact::extract(Path::new("."))?;
            let run_file = result_dir.join(format!("run{}.json", n));
            artifact.write(&run_file)?;
            debug!(
                file = %run_file.display(),
                power_samples = artifact.power.len(),
                "wrote trial artifact"
            );
        }
        Ok(result_dir)
    }

    /// `generator <text> <index> <test> <count> <length> <max-matches>`
    fn generator_command(
        &self,
        generator: &Path,
        text: &Path,
        index: &Path,
        test: &Path,
        condition: &Condition,
    ) -> Command {
        let experiment = &self.config.experiment;
        let mut command = Command::new(generator);
        command
            .arg(text)
            .arg(index)
            .arg(test)
            .arg(experiment.pattern_count.to_string())
            .arg(condition.length.to_string())
            .arg(experiment.max_matches.to_string());
        command
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────────

/// Run to completion. Diagnostics are logged; a nonzero exit is an error.
fn run_command(command: &mut Command) -> BenchResult<Output> {
    let program = command.get_program().to_string_lossy().into_owned();
    let output = command
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| BenchError::io(&program, e))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        warn!(program = %program, ">{}", stderr);
    }

    if !output.status.success() {
        let diagnostics = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr.to_string()
        };
        return Err(BenchError::Subprocess {
            program,
            status: output.status,
            diagnostics,
        });
    }
    Ok(output)
}

fn command_line(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `<text>.fm`
fn index_path(text: &Path) -> PathBuf {
    let mut name = OsString::from(text.as_os_str());
    name.push(".fm");
    PathBuf::from(name)
}

/// Resolve against the current directory, before any directory change.
fn absolute(path: &Path) -> BenchResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().map_err(|e| BenchError::io(".", e))?;
    Ok(cwd.join(path))
}

/// Remove profiler output left behind by an earlier run in `dir`.
fn clear_telemetry(dir: &Path) -> BenchResult<()> {
    remove_if_exists(&dir.join(PROFILE_SUMMARY_FILE))?;
    for path in power::power_profiles(dir)? {
        debug!(file = %path.display(), "removing stale power profile");
        remove_if_exists(&path)?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> BenchResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BenchError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_emulation_mode() {
        assert_eq!("hw_emu".parse::<EmulationMode>().unwrap(), EmulationMode::HwEmu);
        assert_eq!(EmulationMode::default(), EmulationMode::SwEmu);
        assert_eq!(EmulationMode::SwEmu.env_override(), Some("sw_emu"));
        assert_eq!(EmulationMode::Hw.env_override(), None);
        assert!(matches!("fpga".parse::<EmulationMode>(), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_index_path_appends_suffix() {
        assert_eq!(index_path(Path::new("/data/dna.20MB")), PathBuf::from("/data/dna.20MB.fm"));
    }

    #[test]
    #[serial]
    fn test_working_dir_restored_on_error() {
        let original = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let result = (|| -> BenchResult<()> {
            let _cwd = WorkingDirGuard::enter(dir.path())?;
            assert_eq!(
                env::current_dir().unwrap().canonicalize().unwrap(),
                dir.path().canonicalize().unwrap()
            );
            Err(BenchError::Config("boom".into()))
        })();

        assert!(result.is_err());
        assert_eq!(env::current_dir().unwrap(), original);
    }

    #[test]
    #[serial]
    fn test_enter_missing_dir_is_io_error() {
        let original = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = WorkingDirGuard::enter(&dir.path().join("absent")).err().unwrap();
        assert!(matches!(err, BenchError::Io { .. }));
        assert_eq!(env::current_dir().unwrap(), original);
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use crate::aggregate::ResultSet;
        use crate::config::{ExperimentSpec, PathsConfig};
        use crate::harness::cpu;
        use crate::harness::profile::FpgaTrial;
        use std::os::unix::fs::PermissionsExt;

        fn script(path: &Path, body: &str) {
            fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        fn config(root: &Path, repeats: u32) -> ExperimentConfig {
            ExperimentConfig {
                experiment: ExperimentSpec {
                    pattern_count: 1000,
                    max_matches: 10,
                    repeats,
                    corpora: vec!["dna".into()],
                    sizes: vec![20],
                    lengths: vec![8],
                },
                paths: PathsConfig {
                    data_dir: root.join("data"),
                    cpu_results: root.join("results"),
                    fpga_workspace: root.join("fpga"),
                    generator: root.join("generate_test_data"),
                    cpu_benchmark: root.join("benchmark"),
                    fpga_benchmark: PathBuf::from("benchmark"),
                },
                sources: Default::default(),
                clocks: Default::default(),
                energy: Default::default(),
            }
        }

        fn generator(root: &Path) {
            // Fails unless called with six arguments; writes the test file.
            script(
                &root.join("generate_test_data"),
                "[ $# -eq 6 ] || exit 9\necho \"$4 $5 $6\" > \"$3\"",
            );
        }

        #[test]
        #[serial]
        fn test_cpu_run_resets_result_file() {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            generator(root);
            script(&root.join("benchmark"), "echo '0x1p+0 0x1p+1 7'");

            let config = config(root, 3);
            let runner = TrialRunner::new(&config);
            let condition = Condition::new("dna", 20, 8);

            let result = runner.run_cpu_condition(&condition).unwrap();
            assert_eq!(result, root.join("results/dna.20MB.cpu8.result"));
            assert_eq!(cpu::parse_result_file(&result).unwrap().len(), 3);

            // A second run replaces rather than extends.
            runner.run_cpu().unwrap();
            let trials = cpu::parse_result_file(&result).unwrap();
            assert_eq!(trials.len(), 3);
            assert_eq!(trials[2].match_count, 7);

            let test = fs::read_to_string(root.join("results/dna.20MB.cpu8.test")).unwrap();
            assert_eq!(test.trim(), "1000 8 10");
        }

        #[test]
        #[serial]
        fn test_nonzero_exit_aborts_run() {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            generator(root);
            script(
                &root.join("benchmark"),
                "echo '0x1p+0 0x1p+1 7'\necho 'index missing' >&2\nexit 3",
            );

            let config = config(root, 5);
            let err = TrialRunner::new(&config).run_cpu().unwrap_err();
            match err {
                BenchError::Subprocess { status, diagnostics, .. } => {
                    assert_eq!(status.code(), Some(3));
                    assert_eq!(diagnostics, "index missing");
                }
                other => panic!("unexpected error: {other}"),
            }
            // Stopped after the first repetition.
            let lines = fs::read_to_string(root.join("results/dna.20MB.cpu8.result")).unwrap();
            assert_eq!(lines.lines().count(), 1);
        }

        #[test]
        #[serial]
        fn test_fpga_run_writes_artifacts() {
            let original = env::current_dir().unwrap();
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            generator(root);
            fs::create_dir_all(root.join("fpga/sw_emu")).unwrap();
            script(
                &root.join("fpga/benchmark"),
                "[ \"$XCL_EMULATION_MODE\" = sw_emu ] || exit 4\n\
                 [ \"$2\" = final.xclbin ] || exit 5\n\
                 printf 'Profile Summary\\n\\nKernel Execution\\nKernel,Enqueues,Time\\nfmindex,1,250.0\\n\\n' > profile_summary.csv\n\
                 printf 'ts,a,b,c,d\\nunits\\n0,12000,1000,0,0\\n1000,12000,1000,0,0\\n' > power_profile_0.csv",
            );

            // A stale trial from an earlier run must disappear.
            let stale = root.join("fpga/final_results/dna.20MB.len8");
            fs::create_dir_all(&stale).unwrap();
            fs::write(stale.join("run7.json"), "{}").unwrap();

            let config = config(root, 2);
            let result_dir = TrialRunner::new(&config)
                .run_fpga_condition(&Condition::new("dna", 20, 8), "final", EmulationMode::SwEmu)
                .unwrap();

            assert_eq!(env::current_dir().unwrap(), original);
            assert_eq!(result_dir, stale);
            assert!(!stale.join("run7.json").exists());
            assert!(env::var_os(EMULATION_ENV).is_none());

            for n in 0..2 {
                let trial = FpgaTrial::load(&result_dir.join(format!("run{}.json", n))).unwrap();
                assert_eq!(trial.kernel_execution_time, Some(0.25));
                assert_eq!(trial.power.len(), 2);
                assert_eq!(trial.power[0].power, 12.0);
            }
        }

        #[test]
        #[serial]
        fn test_diagnostics_with_zero_exit_complete() {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            script(
                &root.join("generate_test_data"),
                "echo 'reusing cached index' >&2\necho \"$4 $5 $6\" > \"$3\"",
            );
            script(
                &root.join("benchmark"),
                "echo 'warning: pattern longer than text' >&2\necho '0x1p+0 0x1p+1 7'",
            );

            let config = config(root, 3);
            let result = TrialRunner::new(&config)
                .run_cpu_condition(&Condition::new("dna", 20, 8))
                .unwrap();

            let trials = cpu::parse_result_file(&result).unwrap();
            assert_eq!(trials.len(), 3);
            assert!(trials.iter().all(|t| t.match_count == 7));
        }

        fn fpga_benchmark(root: &Path, power: &str) {
            script(
                &root.join("fpga/benchmark"),
                &format!(
                    "[ -f \"$3\" ] || exit 6\n\
                     printf 'Profile Summary\\n\\nKernel Execution\\nKernel,Enqueues,Time\\nfmindex,1,250.0\\n\\n' > profile_summary.csv\n\
                     {}",
                    power
                ),
            );
        }

        #[test]
        #[serial]
        fn test_fpga_output_loads_for_aggregation() {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            generator(root);
            fs::create_dir_all(root.join("fpga/sw_emu")).unwrap();
            fpga_benchmark(
                root,
                "printf 'ts,a,b,c,d\\nunits\\n0,12000,1000,0,0\\n1000,12000,1000,0,0\\n' > power_profile_0.csv",
            );

            let config = config(root, 2);
            let condition = Condition::new("dna", 20, 8);
            let result_dir = TrialRunner::new(&config)
                .run_fpga_condition(&condition, "final", EmulationMode::SwEmu)
                .unwrap();

            // Test patterns stay beside the binary, outside the result directory.
            let test = fs::read_to_string(root.join("fpga/sw_emu/dna.20MB.len8.test")).unwrap();
            assert_eq!(test.trim(), "1000 8 10");
            assert!(!result_dir.join("dna.20MB.len8.test").exists());

            let set =
                ResultSet::<FpgaTrial>::load_fpga("final", &config.source_dir("final"), &config.conditions())
                    .unwrap();
            let trials = set.trials(&condition);
            assert_eq!(trials.len(), 2);
            assert!(trials.iter().all(|t| t.kernel_execution_time == Some(0.25)));
        }

        #[test]
        #[serial]
        fn test_power_profile_not_carried_into_next_trial() {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            generator(root);
            let target = root.join("fpga/sw_emu");
            fs::create_dir_all(&target).unwrap();
            // Left over from a run before this one.
            fs::write(
                target.join("power_profile_9.csv"),
                "ts,a,b,c,d\nunits\n0,1000,1000,0,0\n",
            )
            .unwrap();
            // Power is sampled on the first invocation only.
            fpga_benchmark(
                root,
                "[ -f sampled ] || { printf 'ts,a,b,c,d\\nunits\\n0,12000,1000,0,0\\n1000,12000,1000,0,0\\n' > power_profile_0.csv; touch sampled; }",
            );

            let config = config(root, 2);
            let result_dir = TrialRunner::new(&config)
                .run_fpga_condition(&Condition::new("dna", 20, 8), "final", EmulationMode::SwEmu)
                .unwrap();

            assert!(!target.join("power_profile_9.csv").exists());

            let first = FpgaTrial::load(&result_dir.join("run0.json")).unwrap();
            assert_eq!(first.power.len(), 2);
            assert_eq!(first.power[0].power, 12.0);

            let second = FpgaTrial::load(&result_dir.join("run1.json")).unwrap();
            assert_eq!(second.kernel_execution_time, Some(0.25));
            assert!(second.power.is_empty());
            assert_eq!(second.energy, None);
        }

        #[test]
        #[serial]
        fn test_fpga_failure_restores_working_dir() {
            let original = env::current_dir().unwrap();
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            generator(root);
            fs::create_dir_all(root.join("fpga/hw")).unwrap();
            // Real hardware runs must not see the emulation variable.
            script(
                &root.join("fpga/benchmark"),
                "[ -z \"$XCL_EMULATION_MODE\" ] || exit 0\nexit 2",
            );

            let config = config(root, 1);
            let err = TrialRunner::new(&config)
                .run_fpga("final", EmulationMode::Hw)
                .unwrap_err();
            assert!(matches!(err, BenchError::Subprocess { .. }));
            assert_eq!(env::current_dir().unwrap(), original);
        }
    }
}
