// src/bin/ws_server.rs
//
// WebSocket transport server streaming simulation updates to clients.
//
// Each connection is an independent session: it owns a pending
// SimulationConfig mutable via set_<param>:<value> commands, an overlap
// guard, and zero or more running simulations. Every simulation runs on
// a blocking task with its own instance graph (simulator, market maker,
// perf stats); cancellation is a monotone stop flag polled between
// events. The protocol itself (command parsing, session state machine,
// JSON payloads) lives in passiva::wsproto and is unit-tested there.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{info, warn};

use passiva::config::{RiskConfig, SimulationConfig};
use passiva::metrics::PerfStats;
use passiva::mm::MarketMaker;
use passiva::sim::{MarketSimulator, SimError};
use passiva::strategy::HeuristicStrategy;
use passiva::wsproto::{
    self, apply_command, apply_setter, make_error_json, make_status_json, make_update_json,
    parse_command, ClientCommand, CommandAction, SessionProtocolState, UpdateMetrics,
};
use passiva::FeeSchedule;

const INITIAL_CAPITAL: f64 = 100_000.0;

#[derive(Debug, Parser)]
#[command(name = "ws_server", about = "Passiva WebSocket transport server", version)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "127.0.0.1:8765")]
    addr: SocketAddr,
}

#[derive(Debug)]
struct RunHandle {
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

struct Session {
    config: SimulationConfig,
    allow_overlap: bool,
    run_counter: i64,
    runs: Vec<RunHandle>,
    outbound: mpsc::UnboundedSender<String>,
}

impl Session {
    fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        let config = SimulationConfig {
            quiet: true,
            latency_ms: 0,
            ..SimulationConfig::default()
        };
        Self {
            config,
            allow_overlap: false,
            run_counter: 0,
            runs: Vec::new(),
            outbound,
        }
    }

    fn send(&self, message: String) {
        let _ = self.outbound.send(message);
    }

    fn has_active_run(&mut self) -> bool {
        self.runs.retain(|run| !run.done.load(Ordering::Acquire));
        !self.runs.is_empty()
    }

    fn stop_all_runs(&mut self) {
        for run in &self.runs {
            run.stop.store(true, Ordering::Release);
        }
        self.runs.clear();
    }

    fn handle_command(&mut self, message: &str) {
        let command = parse_command(message);

        if let ClientCommand::SetParam { param, value } = &command {
            match apply_setter(&mut self.config, *param, value) {
                Ok(name) => self.send(make_status_json("ok", &format!("{name}_updated"), None)),
                Err(reason) => self.send(make_error_json(&reason)),
            }
            return;
        }

        if command == ClientCommand::Unknown {
            self.send(make_error_json("unknown_command"));
            return;
        }

        let mut state = SessionProtocolState {
            simulation_active: self.has_active_run(),
            allow_overlap: self.allow_overlap,
        };
        let action = apply_command(&mut state, &command);
        self.allow_overlap = state.allow_overlap;

        match command {
            ClientCommand::EnableOverlap => {
                self.send(make_status_json("ok", "overlap_enabled", None));
            }
            ClientCommand::DisableOverlap => {
                self.send(make_status_json("ok", "overlap_disabled", None));
            }
            _ => match action {
                CommandAction::RejectOverlap => {
                    self.send(make_error_json("simulation_already_running"));
                }
                CommandAction::StopSimulation => {
                    self.stop_all_runs();
                    self.send(make_status_json("stopped", "simulation_stopped", None));
                }
                CommandAction::StartSimulation => {
                    let run_id = self.start_run();
                    self.send(make_status_json("started", "simulation_started", Some(run_id)));
                }
                CommandAction::Noop => {}
            },
        }
    }

    fn start_run(&mut self) -> i64 {
        self.run_counter += 1;
        let run_id = self.run_counter;

        let stop = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        self.runs.push(RunHandle {
            stop: stop.clone(),
            done: done.clone(),
        });

        // Each run gets its own config snapshot with a per-run seed so
        // overlapping runs diverge deterministically.
        let mut config = self.config.clone();
        config.seed = config.seed.wrapping_add(run_id as u32);

        let outbound = self.outbound.clone();
        tokio::task::spawn_blocking(move || {
            run_simulation(config, run_id, outbound, stop);
            done.store(true, Ordering::Release);
        });

        run_id
    }
}

/// Drive one simulation to completion on a blocking task, streaming an
/// update per event and a terminal metrics payload.
fn run_simulation(
    config: SimulationConfig,
    run_id: i64,
    outbound: mpsc::UnboundedSender<String>,
    stop: Arc<AtomicBool>,
) {
    let iterations = config.iterations;

    let mut simulator = match MarketSimulator::new(config) {
        Ok(sim) => sim,
        Err(e) => {
            let _ = outbound.send(make_error_json(&format!("simulation_error:{e}")));
            let _ = outbound.send(make_status_json("stopped", "simulation_stopped", Some(run_id)));
            return;
        }
    };
    let mut mm = MarketMaker::new(
        INITIAL_CAPITAL,
        FeeSchedule::default(),
        RiskConfig::default(),
        Box::new(HeuristicStrategy::new()),
    );

    let mut perf = PerfStats::new();
    let wall_start = std::time::Instant::now();
    let mut processed = 0u64;
    let mut last_event = None;

    for iteration in 0..iterations {
        if stop.load(Ordering::Acquire) {
            break;
        }

        let iter_start = std::time::Instant::now();
        let md = match simulator.generate_event() {
            Ok(md) => md,
            Err(SimError::ReplayExhausted) => break,
            Err(e) => {
                let _ = outbound.send(make_error_json(&format!("simulation_error:{e}")));
                break;
            }
        };

        mm.on_market_data(&md, &mut simulator);
        perf.record_latency_ns(iter_start.elapsed().as_nanos() as f64);
        processed += 1;

        let _ = outbound.send(make_update_json(&md, iteration, run_id, None));
        last_event = Some(md);
    }

    perf.set_wall_time_ms(wall_start.elapsed().as_secs_f64() * 1000.0);

    // Terminal update with the full metrics block, then the stop status.
    if let (Some(md), Some(report)) = (last_event, mm.report()) {
        let metrics = UpdateMetrics::from_report(
            &report,
            processed,
            perf.wall_time_ms(),
            perf.avg_iteration_ms(),
            perf.throughput_eps(),
        );
        let _ = outbound.send(make_update_json(
            &md,
            processed.saturating_sub(1),
            run_id,
            Some(&metrics),
        ));
    }
    let _ = outbound.send(make_status_json("stopped", "simulation_stopped", Some(run_id)));
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "websocket accept failed");
            return;
        }
    };
    info!(%peer, "session connected");

    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut session = Session::new(tx);

    session.send(make_status_json("connected", "session_ready", None));

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => {
                        if sink.send(Message::Text(message)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = source.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => session.handle_command(&text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%peer, error = %e, "websocket read failed");
                        break;
                    }
                }
            }
        }
    }

    session.stop_all_runs();
    info!(%peer, "session closed");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let listener = TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, schema_version = wsproto::SCHEMA_VERSION, "listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(stream, peer));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }
    Ok(())
}
