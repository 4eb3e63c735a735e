//! `gatenav` – runs the gate navigation core against a simulated field.
//!
//! ```text
//! gatenav [approach|wrong-side|search|empty] [--config <path>]
//! gatenav init-config [--config <path>]
//! ```
//!
//! 1. Loads `~/.rover/config.toml` (or `--config <path>`), applies the
//!    `ROVER_*` overrides and validates it; defaults are used when the file
//!    is absent.
//! 2. Intercepts **Ctrl-C** to abort the search between control cycles.
//! 3. Drives the named scenario to a terminal state, printing each state
//!    transition, then a summary.  `ROVER_REPORT_FORMAT=json` prints the
//!    summary as JSON instead.
//!
//! Exit status: `0` traversed, `1` gate not found, `2` bad usage or
//! configuration, `130` aborted.

mod config;

use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use rover_runtime::{NavLoop, init_tracing};
use rover_sim::Scenario;
use rover_types::{NavError, NavState};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "gatenav", version)]
#[command(about = "Run the gate navigation core against a simulated field")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Scenario to run: approach, wrong-side, search or empty
    #[arg(default_value = "approach")]
    scenario: Scenario,

    /// Config file (default: ~/.rover/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Write a config file holding every default value
    InitConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing("gatenav");

    match cli.command {
        Some(Command::InitConfig) => init_config(cli.config),
        None => run(cli.scenario, cli.config),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn init_config(path: Option<PathBuf>) -> ExitCode {
    let path = path.unwrap_or_else(config::config_path);
    if path.exists() {
        eprintln!("{} {} already exists", "error:".red().bold(), path.display());
        return ExitCode::from(2);
    }
    match config::save_to(&config::Config::default(), &path) {
        Ok(()) => {
            println!("  {} Config written to {}", "✓".green().bold(), path.display().to_string().bold());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error saving config".red(), e);
            ExitCode::from(2)
        }
    }
}

fn run(scenario: Scenario, path: Option<PathBuf>) -> ExitCode {
    let path = path.unwrap_or_else(config::config_path);
    let cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            println!("  {}", "No config file found; using defaults.".dimmed());
            config::Config::default()
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::from(2);
        }
    };

    let abort = Arc::new(AtomicBool::new(false));
    let abort_flag = abort.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – aborting gate search …".yellow().bold());
        abort_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the search cannot be aborted early");
    }

    println!();
    println!("  {} scenario {}", "gatenav".bold(), scenario.name().bold().cyan());
    println!();

    let report = match simulate(scenario, &cfg, &abort) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(2);
        }
    };

    if std::env::var("ROVER_REPORT_FORMAT").as_deref() == Ok("json") {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{}: {}", "Error encoding report".red(), e),
        }
    } else {
        report.print();
    }
    report.exit_code()
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct Transition {
    cycle: u64,
    state: NavState,
}

/// Summary of one simulated search.
#[derive(Debug, Clone, Serialize)]
struct Report {
    scenario: Scenario,
    variant: String,
    cycles: u64,
    final_state: NavState,
    /// Where the rover ended up, metres east/north of the field origin.
    final_position: (f64, f64),
    transitions: Vec<Transition>,
    outcome: Result<(), NavError>,
}

impl Report {
    fn exit_code(&self) -> ExitCode {
        match self.outcome {
            Ok(()) => ExitCode::SUCCESS,
            Err(NavError::GateNotFound { .. }) => ExitCode::from(1),
            Err(NavError::Aborted { .. }) => ExitCode::from(130),
            Err(NavError::Config(_)) => ExitCode::from(2),
        }
    }

    fn print(&self) {
        println!();
        let verdict = match &self.outcome {
            Ok(()) => "gate traversed".green().bold(),
            Err(e) => e.to_string().red().bold(),
        };
        println!("  Result:   {verdict}");
        println!("  Variant:  {}", self.variant);
        println!("  Cycles:   {}", self.cycles);
        println!(
            "  Position: {:.2} m E, {:.2} m N",
            self.final_position.0, self.final_position.1
        );
    }
}

/// Run `scenario` until a terminal state, Ctrl-C, or the cycle limit.
fn simulate(
    scenario: Scenario,
    cfg: &config::Config,
    abort: &AtomicBool,
) -> Result<Report, NavError> {
    let mut world = scenario.world();
    let mut nav = NavLoop::new(cfg.rover_config())?;
    nav.begin_gate_search(scenario.waypoint())?;

    let mut transitions = vec![Transition {
        cycle: 0,
        state: nav.state(),
    }];
    print_transition(&transitions[0]);

    while nav.cycles() < cfg.run.max_cycles {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        let out = nav.tick(&world.observe());
        world.apply(&out.target);

        if transitions.last().map(|t| t.state) != Some(out.state) {
            let t = Transition {
                cycle: out.cycle,
                state: out.state,
            };
            print_transition(&t);
            transitions.push(t);
        }
        if out.state.is_terminal() {
            break;
        }
    }

    let outcome = match nav.outcome() {
        Some(outcome) => outcome,
        None => {
            if !abort.load(Ordering::SeqCst) {
                info!(max_cycles = cfg.run.max_cycles, "cycle limit reached");
            }
            nav.abort();
            nav.outcome().unwrap_or(Err(NavError::Aborted { state: nav.state() }))
        }
    };

    let position = world.rover_position();
    Ok(Report {
        scenario,
        variant: cfg.gate.variant.to_string(),
        cycles: nav.cycles(),
        final_state: nav.state(),
        final_position: (position.x, position.y),
        transitions,
        outcome,
    })
}

fn print_transition(t: &Transition) {
    println!("  {:>6}  {}", t.cycle.to_string().dimmed(), paint(t.state));
}

fn paint(state: NavState) -> ColoredString {
    let label = state.to_string();
    match state {
        NavState::GateTraversed => label.green().bold(),
        NavState::GateNotFound => label.red().bold(),
        NavState::GateTurnToFarPost | NavState::GateDriveToFarPost => label.yellow(),
        NavState::GateSpin | NavState::GateSpinWait => label.dimmed(),
        _ => label.cyan(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> config::Config {
        let mut cfg = config::Config::default();
        cfg.environment.filter_window = 3;
        cfg.environment.filter_proportion = 1.0;
        cfg
    }

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("gatenav").chain(args.iter().copied()))
    }

    #[test]
    fn no_arguments_runs_the_approach_scenario() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.scenario, Scenario::Approach);
        assert_eq!(cli.config, None);
    }

    #[test]
    fn scenario_and_config_are_parsed() {
        let cli = parse(&["wrong-side", "--config", "/tmp/r.toml"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.scenario, Scenario::WrongSide);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/r.toml")));

        let cli = parse(&["init-config", "-c", "x.toml"]).unwrap();
        assert_eq!(cli.command, Some(Command::InitConfig));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse(&["lunar"]).is_err());
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--fast"]).is_err());
        assert!(parse(&["search", "empty"]).is_err());
        let help = parse(&["search", "-h"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn approach_simulation_succeeds() {
        let report = simulate(Scenario::Approach, &quiet(), &AtomicBool::new(false)).unwrap();
        assert_eq!(report.outcome, Ok(()));
        assert_eq!(report.final_state, NavState::GateTraversed);
        assert_eq!(report.transitions[0].state, NavState::GateSpin);
        assert_eq!(
            report.transitions.last().map(|t| t.state),
            Some(NavState::GateTraversed)
        );
    }

    #[test]
    fn preset_abort_flag_stops_before_the_first_cycle() {
        let report = simulate(Scenario::Approach, &quiet(), &AtomicBool::new(true)).unwrap();
        assert_eq!(report.cycles, 0);
        assert!(matches!(report.outcome, Err(NavError::Aborted { state: NavState::GateSpin })));
        assert_eq!(report.final_state, NavState::Off);
    }

    #[test]
    fn cycle_limit_aborts_the_search() {
        let mut cfg = quiet();
        cfg.run.max_cycles = 5;
        let report = simulate(Scenario::Empty, &cfg, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.cycles, 5);
        assert!(matches!(report.outcome, Err(NavError::Aborted { .. })));
    }

    #[test]
    fn report_serializes_outcome() {
        let mut cfg = quiet();
        cfg.run.max_cycles = 1;
        let report = simulate(Scenario::Empty, &cfg, &AtomicBool::new(false)).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"scenario\":\"empty\""));
        assert!(json.contains("Aborted"));
    }
}
