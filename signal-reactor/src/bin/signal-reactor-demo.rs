//! Runs a reactor against a simulated remote service.
//!
//! The kickoff action starts a "service" thread that reports progress a
//! few times and then announces it is done. The reactor counts progress
//! signals and quits on the final one, unless the watchdog fires first.

use std::cell::Cell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use serde_json::json;
use signal_reactor::{BoxError, LocalBus, MainLoop, MatchRule, Reactor, ReactorConfig, Signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const INTERFACE: &str = "org.example.Jobs";
const JOB_PATH: &str = "/org/example/jobs/1";

#[derive(Parser)]
#[command(name = "signal-reactor-demo")]
#[command(about = "Wait for a simulated remote job under an inactivity watchdog", long_about = None)]
struct Cli {
    /// Watchdog interval in seconds (overrides the config file)
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Time the remote job takes between two signals
    #[arg(short, long, default_value_t = 200)]
    delay_ms: u64,

    /// Number of progress signals sent before the job finishes
    #[arg(short, long, default_value_t = 3)]
    steps: u32,

    /// Reactor configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signal_reactor=info,signal_reactor_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            tracing::error!(error = %err, "demo failed");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the job finished before the watchdog fired.
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => ReactorConfig::load(path)?,
        None => ReactorConfig::default(),
    };
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    for signal in ["Progress", "Finished"] {
        config
            .subscriptions
            .push(MatchRule::new(signal).with_interface(INTERFACE));
    }

    let main_loop = Rc::new(MainLoop::new());
    let bus = LocalBus::new(&main_loop);
    let remote = bus.remote();
    let reactor = Reactor::with_config(bus, main_loop, &config)?;

    let progress = Rc::new(Cell::new(0u32));
    {
        let progress = progress.clone();
        reactor.on("Progress", move |_, signal| {
            progress.set(progress.get() + 1);
            tracing::info!(step = ?signal.arg(0), "job progressing");
            Ok(())
        });
    }
    reactor.on("Finished", |reactor, signal| {
        tracing::info!(result = ?signal.arg(0), path = %signal.path, "job finished");
        reactor.quit()?;
        Ok(())
    });
    reactor.on_default(|_, signal| {
        tracing::info!(signal = %signal.name, "ignoring signal");
        Ok(())
    });

    let (steps, delay) = (cli.steps, Duration::from_millis(cli.delay_ms));
    let kickoff = move || -> Result<(), BoxError> {
        tracing::info!(steps, "starting remote job");
        thread::spawn(move || {
            for step in 1..=steps {
                thread::sleep(delay);
                let signal = Signal::new("Progress", JOB_PATH)
                    .with_interface(INTERFACE)
                    .with_payload([json!(step)]);
                if let Err(err) = remote.emit(signal) {
                    tracing::debug!(error = %err, step, "reactor gone, job abandoned");
                    return;
                }
            }
            thread::sleep(delay);
            let finished = Signal::new("Finished", JOB_PATH)
                .with_interface(INTERFACE)
                .with_payload([json!("ok")]);
            if let Err(err) = remote.emit(finished) {
                tracing::debug!(error = %err, "reactor gone before the job finished");
            }
        });
        Ok(())
    };

    let start = Instant::now();
    reactor.run(Some(Box::new(kickoff)), None)?;

    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        progress = progress.get(),
        timed_out = reactor.timed_out(),
        "done"
    );

    Ok(!reactor.timed_out())
}
