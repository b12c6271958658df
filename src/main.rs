// src/main.rs
//
// CLI entrypoint for the Passiva simulator.
//
// Runs one simulation (or replay) to completion: the simulator produces
// events, the market maker consumes them, and the run is digested into
// an FNV-1a checksum over canonical event fingerprints so two runs with
// the same config can be compared byte-for-byte.
//
// Exit codes: 0 on success with at least one event processed, 1 on
// argument or runtime errors.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use tracing::info;

use passiva::binary_log::BinaryLogger;
use passiva::config::{ReservationQuoterConfig, RiskConfig, SimulationConfig, SimulationMode};
use passiva::fingerprint::RunDigest;
use passiva::metrics::PerfStats;
use passiva::mm::MarketMaker;
use passiva::sim::{MarketSimulator, SimError};
use passiva::strategy::{HeuristicStrategy, ReservationQuoter, Strategy};
use passiva::FeeSchedule;

const INITIAL_CAPITAL: f64 = 100_000.0;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    Simulate,
    Replay,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StrategyArg {
    Heuristic,
    Reservation,
}

#[derive(Debug, Parser)]
#[command(
    name = "passiva",
    about = "Deterministic single-instrument market-making simulator",
    version
)]
struct Args {
    /// Run mode.
    #[arg(long, value_enum, default_value = "simulate")]
    mode: ModeArg,

    /// Quoting strategy.
    #[arg(long, value_enum, default_value = "heuristic")]
    strategy: StrategyArg,

    /// RNG seed for the synthetic market.
    #[arg(long, default_value_t = 42)]
    seed: u32,

    /// Number of events to process.
    #[arg(long, default_value_t = 1000)]
    iterations: u64,

    /// Per-event wall latency in ms.
    #[arg(long, default_value_t = 10)]
    latency_ms: u64,

    /// Write generated events to this text log.
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Replay this event log (implies --mode replay).
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Write events in the compact binary format.
    #[arg(long)]
    binary_log: Option<PathBuf>,

    /// Suppress per-event output.
    #[arg(long)]
    quiet: bool,
}

fn build_config(args: &Args) -> Result<SimulationConfig, String> {
    if args.iterations == 0 {
        return Err("--iterations must be > 0".to_string());
    }

    let mode = if args.replay.is_some() {
        SimulationMode::Replay
    } else {
        match args.mode {
            ModeArg::Simulate => SimulationMode::Simulate,
            ModeArg::Replay => SimulationMode::Replay,
        }
    };

    if mode == SimulationMode::Replay && args.replay.is_none() {
        return Err("--mode replay requires --replay <path>".to_string());
    }
    if mode == SimulationMode::Replay && args.event_log.is_some() {
        return Err("--event-log cannot be used with --mode replay".to_string());
    }

    Ok(SimulationConfig {
        seed: args.seed,
        iterations: args.iterations,
        latency_ms: args.latency_ms,
        event_log_path: args.event_log.clone(),
        replay_log_path: args.replay.clone(),
        mode,
        quiet: args.quiet,
        ..SimulationConfig::default()
    })
}

fn build_strategy(arg: StrategyArg) -> Box<dyn Strategy> {
    match arg {
        StrategyArg::Heuristic => Box::new(HeuristicStrategy::new()),
        StrategyArg::Reservation => Box::new(ReservationQuoter::new(
            ReservationQuoterConfig::default(),
        )),
    }
}

fn run(args: &Args) -> Result<u64, String> {
    let config = build_config(args)?;
    let quiet = config.quiet;
    let mode = config.mode;
    let seed = config.seed;
    let iterations = config.iterations;

    let mut simulator = MarketSimulator::new(config).map_err(|e| e.to_string())?;
    let mut mm = MarketMaker::new(
        INITIAL_CAPITAL,
        FeeSchedule::default(),
        RiskConfig::default(),
        build_strategy(args.strategy),
    );

    let mut binary_logger = match &args.binary_log {
        Some(path) => Some(BinaryLogger::create(path).map_err(|e| e.to_string())?),
        None => None,
    };

    info!(
        mode = mode.as_str(),
        strategy = mm.strategy_name(),
        seed,
        iterations,
        "starting run"
    );

    let mut digest = RunDigest::new();
    let mut perf = PerfStats::new();
    let mut last_sequence = 0i64;
    let wall_start = Instant::now();

    while digest.processed < iterations {
        let iter_start = Instant::now();
        let md = match simulator.generate_event() {
            Ok(md) => md,
            Err(SimError::ReplayExhausted) => break,
            Err(e) => return Err(e.to_string()),
        };

        mm.on_market_data(&md, &mut simulator);

        if let Some(logger) = &mut binary_logger {
            logger.log_event(&md).map_err(|e| e.to_string())?;
        }

        digest.observe(&md);
        perf.record_latency_ns(iter_start.elapsed().as_nanos() as f64);
        last_sequence = md.sequence_number;

        if !quiet && (digest.processed <= 5 || digest.processed % 100 == 0) {
            println!(
                "Event {} bid={:.4} ask={:.4} trades={} mm_fills={}",
                md.sequence_number,
                md.best_bid_price,
                md.best_ask_price,
                md.trades.len(),
                md.mm_fills.len()
            );
        }
    }

    if let Some(logger) = &mut binary_logger {
        logger.flush().map_err(|e| e.to_string())?;
    }

    perf.set_wall_time_ms(wall_start.elapsed().as_secs_f64() * 1000.0);

    println!(
        "SUMMARY mode={} seed={} iterations={} processed={} last_sequence={} avg_bid={:.6} avg_ask={:.6} throughput_eps={:.1} checksum={}",
        mode.as_str(),
        seed,
        iterations,
        digest.processed,
        last_sequence,
        digest.avg_bid(),
        digest.avg_ask(),
        perf.throughput_eps(),
        digest.checksum
    );

    print_report(&mut mm);
    Ok(digest.processed)
}

fn print_report(mm: &mut MarketMaker) {
    let Some(report) = mm.report() else {
        println!("No market data events processed. Report cannot be generated.");
        return;
    };

    println!("=== MARKET MAKER REPORT ===");
    println!("Position: {} shares", report.position);
    println!("Cash: ${:.2}", report.cash);
    println!("Mark Price: ${:.2}", report.mark_price);
    println!("Avg Entry Price: ${:.2}", report.avg_entry_price);
    println!("Realized PnL: ${:.2}", report.realized_pnl);
    println!("Unrealized PnL: ${:.2}", report.unrealized_pnl);
    println!("Total PnL: ${:.2}", report.total_pnl);
    println!("Fees: ${:.2}", report.fees);
    println!("Rebates: ${:.2}", report.rebates);
    println!("Net PnL: ${:.2}", report.net_pnl);
    println!("Gross Exposure: ${:.2}", report.gross_exposure);
    println!("Net Exposure: ${:.2}", report.net_exposure);
    println!("Risk State: {}", report.risk_state.as_str());
    println!("Drawdown: ${:.2}", report.drawdown);
    println!("High Water Mark: ${:.2}", report.high_water_mark);
    println!("Total Fills: {}", report.total_fills);
    println!("Active Orders: {}", report.active_orders);
    println!("Strategy: {}", report.strategy);
    println!("Inventory Skew: {:.4}", report.inventory_skew);
    println!("============================");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Arguments errors map to exit 1; --help/--version exit 0.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }
                _ => ExitCode::FAILURE,
            };
        }
    };

    match run(&args) {
        Ok(processed) if processed > 0 => ExitCode::SUCCESS,
        Ok(_) => {
            eprintln!("No events processed.");
            ExitCode::FAILURE
        }
        Err(message) => {
            eprintln!("Simulation failed: {message}");
            ExitCode::FAILURE
        }
    }
}
