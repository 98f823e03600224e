// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod stimulus;
mod vcd_trace;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

use sequent_config::{
    parse_register, StopReason, SystemManifest, TestAssertion, TestLimits, TestScript,
};
use sequent_core::memory::ProgramImage;
use sequent_core::metrics::PerformanceMetrics;
use sequent_core::snapshot::MachineSnapshot;
use sequent_core::{CoreConfig, DebugControl, Machine, SimulationError};
use stimulus::StimulusDriver;

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

fn parse_u16_addr(s: &str) -> Result<u16, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u16::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex address '{}': {}", s, e))
    } else {
        u16::from_str(trimmed).map_err(|e| format!("Invalid address '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Sequent 16-bit control engine simulator",
    long_about = None,
    subcommand_negates_reqs = true
)]
struct Cli {
    /// Path to the flat binary program image
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Path to the system manifest (YAML)
    #[arg(short, long)]
    system: Option<PathBuf>,

    /// Write a state snapshot (JSON) when the run stops.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Breakpoint PC address (repeatable). Stops at the instruction boundary.
    #[arg(long, value_parser = parse_u16_addr)]
    breakpoint: Vec<u16>,

    /// Enable per-instruction execution tracing
    #[arg(short, long, global = true)]
    trace: bool,

    /// Maximum number of clock cycles to run
    #[arg(long, default_value = "20000")]
    max_cycles: u64,

    /// Dump a per-cycle waveform (VCD)
    #[arg(long, global = true)]
    vcd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deterministic, CI-friendly runner mode driven by a test script (YAML).
    Test(TestArgs),
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the program image (overrides the script)
    #[arg(long)]
    image: Option<PathBuf>,

    /// Path to the system manifest (overrides the script)
    #[arg(long)]
    system: Option<PathBuf>,

    /// Path to the test script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Override max cycles limit
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Cycles without a new fetch address before stopping
    #[arg(long)]
    no_progress: Option<u64>,

    /// Breakpoint PC address (repeatable).
    #[arg(long, value_parser = parse_u16_addr)]
    breakpoint: Vec<u16>,

    /// Directory to write test artifacts (result.json, snapshot.json)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TestResult {
    result_schema_version: String,
    status: String,
    cycles: u64,
    instructions: u64,
    interrupts: u64,
    stop_reason: StopReason,
    stop_reason_details: StopReasonDetails,
    limits: TestLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    assertions: Vec<AssertionResult>,
    image_hash: String,
    config: TestConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct StopReasonDetails {
    triggered_stop_condition: StopReason,
    triggered_limit: Option<NamedU64>,
    observed: Option<NamedU64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct NamedU64 {
    name: String,
    value: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct AssertionResult {
    assertion: TestAssertion,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual: Option<u16>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct TestConfig {
    image: PathBuf,
    system: Option<PathBuf>,
    script: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct InteractiveSnapshotConfig {
    image: PathBuf,
    system: Option<PathBuf>,
    max_cycles: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct InteractiveSnapshot {
    snapshot_schema_version: String,
    status: String,
    cycles: u64,
    instructions: u64,
    stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    image_hash: String,
    machine: MachineSnapshot,
    config: InteractiveSnapshotConfig,
}

/// A machine configured from a manifest with its image loaded.
struct LoadedSystem {
    machine: Machine,
    stimuli: StimulusDriver,
    image_bytes: Vec<u8>,
}

fn core_config(manifest: &SystemManifest) -> anyhow::Result<CoreConfig> {
    let size = manifest.memory_size()?;
    Ok(CoreConfig {
        boot_address: manifest.boot_address,
        vector_base: manifest.vector_base,
        memory_base: manifest.memory.base,
        memory_size: usize::try_from(size).context("Memory size does not fit in usize")?,
    })
}

fn build_system(image_path: &Path, system_path: Option<&PathBuf>) -> anyhow::Result<LoadedSystem> {
    let manifest = match system_path {
        Some(path) => {
            info!("Loading system manifest: {:?}", path);
            SystemManifest::from_file(path)?
        }
        None => {
            info!("Using default system configuration");
            SystemManifest::default()
        }
    };

    let image_bytes = std::fs::read(image_path)
        .with_context(|| format!("Failed to read image {:?}", image_path))?;
    if image_bytes.is_empty() {
        anyhow::bail!("Image {:?} is empty", image_path);
    }

    let mut machine = Machine::new(core_config(&manifest)?);
    let image = ProgramImage::from_binary(manifest.load_address, image_bytes.clone());
    machine.load_image(&image)?;
    info!(
        "Loaded {} bytes at {:#06x}, boot {:#06x}",
        image_bytes.len(),
        manifest.load_address,
        manifest.boot_address
    );

    Ok(LoadedSystem {
        machine,
        stimuli: StimulusDriver::new(manifest.irq_stimuli),
        image_bytes,
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level based on --trace flag
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Some(Commands::Test(ref args)) => run_test(args, cli.vcd.as_deref()),
        None => run_interactive(&cli),
    }
}

fn attach_vcd(machine: &mut Machine, path: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = path {
        info!("Writing waveform to {:?}", path);
        let observer = vcd_trace::VcdObserver::new(path.to_path_buf())
            .with_context(|| format!("Failed to create VCD file {:?}", path))?;
        machine.add_observer(Arc::new(observer));
    }
    Ok(())
}

fn run_interactive(cli: &Cli) -> ExitCode {
    info!("Starting Sequent Simulator");

    let Some(image_path) = &cli.image else {
        error!("Missing required --image argument");
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    let LoadedSystem {
        mut machine,
        stimuli,
        image_bytes,
    } = match build_system(image_path, cli.system.as_ref()) {
        Ok(system) => system,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let metrics = Arc::new(PerformanceMetrics::new());
    machine.add_observer(metrics.clone());
    if let Err(e) = attach_vcd(&mut machine, cli.vcd.as_deref()) {
        error!("{:#}", e);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }
    for bp in &cli.breakpoint {
        machine.add_breakpoint(*bp);
    }

    let limits = RunLimits {
        max_cycles: cli.max_cycles,
        max_instructions: None,
        no_progress_cycles: None,
    };
    info!("Running for {} cycles...", cli.max_cycles);
    let result = run_simulation_loop(&mut machine, &stimuli, &limits);
    machine.finish();

    if let Some(path) = &cli.snapshot {
        write_interactive_snapshot(path, cli, image_path, &image_bytes, &machine, &result);
    }

    report_metrics(&machine, &metrics, &result);
    if result.error.is_some() {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    } else {
        ExitCode::from(EXIT_PASS)
    }
}

struct RunLimits {
    max_cycles: u64,
    max_instructions: Option<u64>,
    no_progress_cycles: Option<u64>,
}

struct LoopResult {
    stop_reason: StopReason,
    stuck_cycles: u64,
    error: Option<SimulationError>,
}

/// Clocks the machine until a limit, a breakpoint or an error stops it.
fn run_simulation_loop(
    machine: &mut Machine,
    stimuli: &StimulusDriver,
    limits: &RunLimits,
) -> LoopResult {
    let mut stop_reason = StopReason::MaxCycles;
    let mut error = None;
    let mut last_fetch = machine.fetch_address();
    let mut stuck_cycles: u64 = 0;

    for cycle in 0..limits.max_cycles {
        stimuli.apply(machine);
        if let Err(e) = machine.step() {
            error!("Simulation error at cycle {}: {}", cycle, e);
            stop_reason = match e {
                SimulationError::MemoryViolation(_) => StopReason::MemoryViolation,
                _ => StopReason::ConfigError,
            };
            error = Some(e);
            break;
        }

        if machine.at_instruction_boundary() {
            let pc = machine.get_pc();
            if machine.breakpoints.contains(&pc) {
                info!("Breakpoint hit at PC={:#06x} (cycle={})", pc, cycle + 1);
                stop_reason = StopReason::Breakpoint;
                break;
            }
        }

        if let Some(limit) = limits.max_instructions {
            if machine.instructions >= limit {
                stop_reason = StopReason::MaxInstructions;
                break;
            }
        }

        if let Some(limit) = limits.no_progress_cycles {
            let fetch = machine.fetch_address();
            if fetch == last_fetch {
                stuck_cycles += 1;
                if stuck_cycles >= limit {
                    info!(
                        "No progress (fetch address stuck at {:#06x}) for {} cycles",
                        fetch, limit
                    );
                    stop_reason = StopReason::NoProgress;
                    break;
                }
            } else {
                stuck_cycles = 0;
                last_fetch = fetch;
            }
        }

        if !tracing::enabled!(tracing::Level::DEBUG) && cycle > 0 && cycle % 100_000 == 0 {
            info!("Progress: {} cycles", cycle);
        }
    }

    LoopResult {
        stop_reason,
        stuck_cycles,
        error,
    }
}

fn report_metrics(machine: &Machine, metrics: &PerformanceMetrics, result: &LoopResult) {
    info!("Simulation loop finished: {:?}", result.stop_reason);
    info!("Final PC: {:#06x}, state {}", machine.get_pc(), machine.state());
    info!("Total Cycles: {}", metrics.get_cycles());
    info!("Total Instructions: {}", metrics.get_instructions());
    info!("Interrupts: {}", metrics.get_interrupts());
    info!("Sleep Cycles: {}", metrics.get_sleep_cycles());
    info!("CPI: {:.2}", metrics.get_cpi());
    info!("Cycle rate: {:.0} cycles/s", metrics.get_cycle_rate());
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("Failed to create parent dir {:?}: {}", parent, e);
            return;
        }
    }
    match std::fs::File::create(path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, value) {
                error!("Failed to write {:?}: {}", path, e);
            }
        }
        Err(e) => error!("Failed to create {:?}: {}", path, e),
    }
}

fn write_interactive_snapshot(
    path: &Path,
    cli: &Cli,
    image_path: &Path,
    image_bytes: &[u8],
    machine: &Machine,
    result: &LoopResult,
) {
    let snapshot = InteractiveSnapshot {
        snapshot_schema_version: "1.0".to_string(),
        status: if result.error.is_some() {
            "error".to_string()
        } else {
            "ok".to_string()
        },
        cycles: machine.total_cycles,
        instructions: machine.instructions,
        stop_reason: result.stop_reason,
        message: result.error.as_ref().map(|e| e.to_string()),
        image_hash: sha256_hex(image_bytes),
        machine: machine.snapshot(),
        config: InteractiveSnapshotConfig {
            image: image_path.to_path_buf(),
            system: cli.system.clone(),
            max_cycles: cli.max_cycles,
        },
    };
    write_json(path, &snapshot);
}

fn build_stop_reason_details(
    stop_reason: StopReason,
    limits: &TestLimits,
    machine: &Machine,
    stuck_cycles: u64,
) -> StopReasonDetails {
    let named = |name: &str, value: u64| {
        Some(NamedU64 {
            name: name.to_string(),
            value,
        })
    };
    let (triggered_limit, observed) = match stop_reason {
        StopReason::MaxCycles => (
            named("max_cycles", limits.max_cycles),
            named("cycles", machine.total_cycles),
        ),
        StopReason::MaxInstructions => (
            limits.max_instructions.and_then(|v| named("max_instructions", v)),
            named("instructions", machine.instructions),
        ),
        StopReason::NoProgress => (
            limits
                .no_progress_cycles
                .and_then(|v| named("no_progress_cycles", v)),
            named("stuck_cycles", stuck_cycles),
        ),
        StopReason::Breakpoint => (None, named("pc", machine.get_pc() as u64)),
        StopReason::MemoryViolation | StopReason::ConfigError => (None, None),
    };

    StopReasonDetails {
        triggered_stop_condition: stop_reason,
        triggered_limit,
        observed,
    }
}

fn resolve_script_path(script_path: &Path, value: &str) -> PathBuf {
    let p = PathBuf::from(value);
    if p.is_absolute() {
        return p;
    }
    script_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(p)
}

/// Checks one assertion against the stopped machine; returns pass flag and
/// the observed value where there is one.
fn evaluate_assertion(
    assertion: &TestAssertion,
    machine: &Machine,
    stop_reason: StopReason,
) -> (bool, Option<u16>) {
    match assertion {
        TestAssertion::ExpectedStopReason(a) => (a.expected_stop_reason == stop_reason, None),
        TestAssertion::RegisterValue(a) => match parse_register(&a.register_value.register) {
            Some(id) => {
                let actual = machine.read_core_reg(id);
                (actual == a.register_value.expected_value, Some(actual))
            }
            None => (false, None),
        },
        TestAssertion::MemoryValue(a) => {
            let details = &a.memory_value;
            match machine.peek_word(details.address) {
                Ok(actual) => {
                    let mask = details.mask.unwrap_or(0xFFFF);
                    (
                        actual & mask == details.expected_value & mask,
                        Some(actual),
                    )
                }
                Err(_) => (false, None),
            }
        }
    }
}

fn run_test(args: &TestArgs, vcd: Option<&Path>) -> ExitCode {
    let script = match TestScript::from_file(&args.script) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(args, None, args.system.as_ref(), None, None, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let resolved_limits = TestLimits {
        max_cycles: args.max_cycles.unwrap_or(script.limits.max_cycles),
        max_instructions: script.limits.max_instructions,
        no_progress_cycles: args.no_progress.or(script.limits.no_progress_cycles),
    };

    // Guard against accidentally huge runs from CI misconfiguration.
    const MAX_ALLOWED_CYCLES: u64 = 500_000_000;
    if resolved_limits.max_cycles == 0 || resolved_limits.max_cycles > MAX_ALLOWED_CYCLES {
        let msg = format!(
            "max_cycles {} must be in 1..={}",
            resolved_limits.max_cycles, MAX_ALLOWED_CYCLES
        );
        error!("{}", msg);
        write_config_error_outputs(
            args,
            None,
            args.system.as_ref(),
            None,
            Some(&resolved_limits),
            msg,
        );
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let image_path = args
        .image
        .clone()
        .unwrap_or_else(|| resolve_script_path(&args.script, &script.inputs.image));
    let system_path = args.system.clone().or_else(|| {
        script
            .inputs
            .system
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| resolve_script_path(&args.script, s))
    });

    let LoadedSystem {
        mut machine,
        stimuli,
        image_bytes,
    } = match build_system(&image_path, system_path.as_ref()) {
        Ok(system) => system,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            let bytes = std::fs::read(&image_path).ok();
            write_config_error_outputs(
                args,
                Some(&image_path),
                system_path.as_ref(),
                bytes.as_deref(),
                Some(&resolved_limits),
                msg,
            );
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let metrics = Arc::new(PerformanceMetrics::new());
    machine.add_observer(metrics.clone());
    if let Err(e) = attach_vcd(&mut machine, vcd) {
        error!("{:#}", e);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }
    for bp in &args.breakpoint {
        machine.add_breakpoint(*bp);
    }

    let result = run_simulation_loop(
        &mut machine,
        &stimuli,
        &RunLimits {
            max_cycles: resolved_limits.max_cycles,
            max_instructions: resolved_limits.max_instructions,
            no_progress_cycles: resolved_limits.no_progress_cycles,
        },
    );
    machine.finish();

    let mut assertion_results = Vec::new();
    let mut all_passed = true;
    let mut expected_stop_reason_matched = false;

    for assertion in &script.assertions {
        let (passed, actual) = evaluate_assertion(assertion, &machine, result.stop_reason);

        if matches!(assertion, TestAssertion::ExpectedStopReason(_)) && passed {
            expected_stop_reason_matched = true;
        }
        if !passed {
            all_passed = false;
            error!("Assertion failed: {:?} (actual={:?})", assertion, actual);
        }

        assertion_results.push(AssertionResult {
            assertion: assertion.clone(),
            passed,
            actual,
        });
    }

    // A stalled program only passes when the script expects the stall.
    let stop_requires_assertion = result.stop_reason == StopReason::NoProgress;
    let sim_error_happened = result.error.is_some();

    let (status, code) = if !all_passed || (stop_requires_assertion && !expected_stop_reason_matched)
    {
        ("fail", EXIT_ASSERT_FAIL)
    } else if sim_error_happened && !expected_stop_reason_matched {
        ("error", EXIT_RUNTIME_ERROR)
    } else {
        ("pass", EXIT_PASS)
    };
    info!(
        "Test {}: {:?} after {} cycles",
        status, result.stop_reason, machine.total_cycles
    );

    let stop_reason_details = build_stop_reason_details(
        result.stop_reason,
        &resolved_limits,
        &machine,
        result.stuck_cycles,
    );
    let test_result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        cycles: machine.total_cycles,
        instructions: metrics.get_instructions(),
        interrupts: metrics.get_interrupts(),
        stop_reason: result.stop_reason,
        stop_reason_details,
        limits: resolved_limits,
        message: result.error.as_ref().map(|e| e.to_string()),
        assertions: assertion_results,
        image_hash: sha256_hex(&image_bytes),
        config: TestConfig {
            image: image_path,
            system: system_path,
            script: args.script.clone(),
        },
    };
    write_outputs(args, &test_result, Some(&machine.snapshot()));

    ExitCode::from(code)
}

fn write_outputs(args: &TestArgs, result: &TestResult, snapshot: Option<&MachineSnapshot>) {
    let Some(output_dir) = &args.output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }

    write_json(&output_dir.join("result.json"), result);
    if let Some(snapshot) = snapshot {
        write_json(&output_dir.join("snapshot.json"), snapshot);
    }
}

fn write_config_error_outputs(
    args: &TestArgs,
    image_path: Option<&PathBuf>,
    system_path: Option<&PathBuf>,
    image_bytes: Option<&[u8]>,
    limits: Option<&TestLimits>,
    message: String,
) {
    let resolved_limits = limits.cloned().unwrap_or(TestLimits {
        max_cycles: 0,
        max_instructions: None,
        no_progress_cycles: None,
    });

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        cycles: 0,
        instructions: 0,
        interrupts: 0,
        stop_reason: StopReason::ConfigError,
        stop_reason_details: StopReasonDetails {
            triggered_stop_condition: StopReason::ConfigError,
            triggered_limit: None,
            observed: None,
        },
        limits: resolved_limits,
        message: Some(message),
        assertions: vec![],
        image_hash: image_bytes.map(sha256_hex).unwrap_or_default(),
        config: TestConfig {
            image: image_path.cloned().unwrap_or_default(),
            system: system_path.cloned(),
            script: args.script.clone(),
        },
    };
    write_outputs(args, &result, None);
}
