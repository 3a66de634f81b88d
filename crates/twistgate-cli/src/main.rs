//! `twistgate-cli` – TwistGate Command Line Interface
//!
//! Runs a gate against newline-delimited JSON on stdin:
//!
//! 1. Initialises logging (stderr) and loads `~/.twistgate/config.toml`,
//!    falling back to the reference timing when it is absent.
//! 2. Spawns the watchdog task and pumps stdin fragments into the arbiter.
//! 3. Prints every output (merged commands, emergency flags, mode names) to
//!    stdout as one JSON object per line.
//! 4. Stops on stdin EOF or **Ctrl-C**, then prints the final gate state.

mod config;
mod output;

use std::time::Duration;

use colored::Colorize;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{error, info, warn};

use twistgate_middleware::JsonLinesSource;
use twistgate_runtime::{GateConfig, GateSnapshot, TwistGate};

fn main() {
    let _telemetry = twistgate_runtime::init_tracing("twistgate");

    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            eprintln!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => defaults_with_env(),
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            defaults_with_env()
        }
    };

    if let Err(e) = cfg.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(2);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            std::process::exit(1);
        }
    };

    let snapshot = runtime.block_on(run(cfg));
    // A blocked stdin read would otherwise hold the runtime open.
    runtime.shutdown_timeout(Duration::from_millis(100));

    print_summary(&snapshot);
}

fn defaults_with_env() -> GateConfig {
    let mut cfg = GateConfig::default();
    config::apply_env_overrides(&mut cfg);
    cfg
}

async fn run(cfg: GateConfig) -> GateSnapshot {
    // ── Ctrl-C ────────────────────────────────────────────────────────────
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop with EOF instead");
    }

    // ── Gate ──────────────────────────────────────────────────────────────
    let gate = TwistGate::new(cfg);
    let printers = output::spawn_printers(gate.bus());
    let watchdog = gate.spawn_watchdog();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut source = gate.spawn_source(Box::new(JsonLinesSource::new("stdin", stdin)));

    eprintln!(
        "  Gate running. Feed JSON fragments on stdin; {} to stop.\n",
        "Ctrl-C".bold().cyan()
    );

    tokio::select! {
        joined = &mut source => match joined {
            Ok(stats) => info!(received = stats.received, accepted = stats.accepted, "stdin closed"),
            Err(e) => warn!(error = %e, "stdin pump task failed"),
        },
        _ = shutdown_requested(&mut shutdown_rx) => {
            eprintln!();
            eprintln!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
            source.abort();
            let _ = source.await;
        }
    }

    watchdog.shutdown().await;
    let snapshot = gate.arbiter().snapshot();

    // Dropping the gate closes the bus; printers drain and exit.
    drop(gate);
    for printer in printers {
        let _ = printer.await;
    }
    snapshot
}

/// Resolves once Ctrl-C is pressed.
///
/// If the handler could not be installed its sender is already gone; this
/// then never resolves and only stdin EOF ends the run.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|&stop| stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Console
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    eprintln!();
    eprintln!(
        "  {} {}",
        "TwistGate".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  Autonomous / remote command arbiter with fail-safe watchdog");
    eprintln!();
}

fn print_summary(snapshot: &GateSnapshot) {
    let latch = if snapshot.emergency_latched {
        "ENGAGED".red().bold()
    } else {
        "clear".green()
    };
    eprintln!();
    eprintln!("  Final mode:      {}", snapshot.mode.to_string().bold());
    eprintln!("  Last sequence:   {}", snapshot.command.sequence);
    eprintln!("  Emergency latch: {latch}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_waits_for_ctrl_c() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { shutdown_requested(&mut rx).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tx.send(true).expect("receiver alive");
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("shutdown observed")
            .expect("task ok");
    }

    #[tokio::test]
    async fn missing_ctrl_c_handler_does_not_stop_the_run() {
        let (tx, mut rx) = watch::channel(false);
        // A failed `ctrlc::set_handler` drops the closure owning the sender.
        drop(tx);

        let outcome =
            tokio::time::timeout(Duration::from_millis(50), shutdown_requested(&mut rx)).await;
        assert!(outcome.is_err(), "shutdown must not fire without Ctrl-C");
    }
}
