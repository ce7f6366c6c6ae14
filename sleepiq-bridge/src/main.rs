use anyhow::{Context, Result};
use clap::Parser;
use sleepiq_client::SessionClient;
use sleepiq_sync::logging::{init_logging, init_logging_from_env, LoggingMode};
use sleepiq_sync::{FoundationApi, FoundationSynchronizer, MovementOutcome, PollOutcome};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

pub mod config;

use config::{Args, BridgeConfig};

/// A line typed on stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Raise,
    Flatten,
    Status,
    Poll,
    Wait,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "on" | "raise" | "up" | "1" | "true" => Some(Command::Raise),
            "off" | "flat" | "down" | "0" | "false" => Some(Command::Flatten),
            "status" | "s" => Some(Command::Status),
            "poll" | "refresh" => Some(Command::Poll),
            "wait" => Some(Command::Wait),
            "help" | "?" => Some(Command::Help),
            "quit" | "exit" | "q" => Some(Command::Quit),
            _ => None,
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  on | raise       Raise the foundation");
    println!("  off | flat       Flatten the foundation");
    println!("  status           Show the current foundation state");
    println!("  poll             Fetch the foundation status now");
    println!("  wait             Wait until the foundation stops moving");
    println!("  quit             Stop the bridge");
    println!();
}

fn print_env_help() {
    println!("Environment Variables:");
    println!("  SLEEPIQ_EMAIL            Account email");
    println!("  SLEEPIQ_PASSWORD         Account password");
    println!("  SLEEPIQ_SEND_DELAY       Debounce window in seconds (default: 5)");
    println!("  SLEEPIQ_POLL_INTERVAL    Status poll interval in seconds (default: 10)");
    println!("  SLEEPIQ_SIDE             Side of the bed, L or R (default: L)");
    println!("  SLEEPIQ_BASE_URL         API root URL");
    println!("  SLEEPIQ_TRAILING_ONLY    Only send at the end of each window (set to enable)");
    println!("  SLEEPIQ_AWAIT_MOVEMENT   Wait for movement to stop before presets (set to enable)");
    println!("  SLEEPIQ_LOG_MODE         silent, development, debug or json");
    println!("  SLEEPIQ_LOG_LEVEL        Log filter (default: info)");
    println!();
}

fn init_tracing(args: &Args) -> Result<()> {
    match args.log_mode.as_deref() {
        Some(name) => {
            let mode = LoggingMode::from_name(name)
                .with_context(|| format!("Invalid log mode '{}'", name))?;
            init_logging(mode)?;
        }
        None => init_logging_from_env(LoggingMode::Development)?,
    }
    Ok(())
}

/// Wait for the foundation to stop moving, giving up early if `interrupt`
/// completes first. Returns `None` when interrupted.
async fn wait_interruptible<A, I>(
    sync: &FoundationSynchronizer<A>,
    interrupt: I,
) -> Option<MovementOutcome>
where
    A: FoundationApi + 'static,
    I: Future<Output = ()>,
{
    tokio::select! {
        outcome = sync.wait_for_stop() => Some(outcome),
        _ = interrupt => None,
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

async fn run(config: BridgeConfig) -> Result<()> {
    let sync_config = config.sync_config()?;
    let client = Arc::new(
        SessionClient::new(config.credentials.clone(), config.client_config())
            .context("Failed to create SleepIQ client")?,
    );

    match client.login().await {
        Ok(session) => {
            info!(
                user_id = session.user_id.as_deref().unwrap_or("-"),
                bed_id = session.bed_id.as_deref().unwrap_or("-"),
                "Authenticated with SleepIQ"
            );
        }
        Err(e) => {
            error!(error = %e, "Failed to authenticate with SleepIQ, bridge disabled");
            return Ok(());
        }
    }

    let observer = Arc::new(|raised: bool| info!(raised, "Foundation state"));
    let mut sync = FoundationSynchronizer::new(client, sync_config, observer)
        .context("Failed to create foundation synchronizer")?;

    if sync.poll_once().await == PollOutcome::NoFoundation {
        warn!("This bed has no adjustable foundation; commands will be ignored");
    }
    sync.start_polling();

    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("stdin closed, shutting down");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                match Command::parse(&line) {
                    Some(Command::Raise) => sync.request_state(true),
                    Some(Command::Flatten) => sync.request_state(false),
                    Some(Command::Status) => {
                        let state = sync.state();
                        println!(
                            "raised={} head={} foot={} moving={} capability={:?} source={:?}",
                            state.raised,
                            state.head_position,
                            state.foot_position,
                            state.moving,
                            state.capability,
                            state.source
                        );
                    }
                    Some(Command::Poll) => {
                        let outcome = sync.poll_once().await;
                        println!("{:?}", outcome);
                    }
                    Some(Command::Wait) => match wait_interruptible(&sync, ctrl_c()).await {
                        Some(MovementOutcome::Stopped { fetches }) => {
                            println!("Foundation stopped ({} status fetches)", fetches)
                        }
                        Some(MovementOutcome::TimedOut { fetches }) => {
                            println!("Still moving after {} status fetches", fetches)
                        }
                        Some(MovementOutcome::NoFoundation) => println!("No foundation detected"),
                        None => {
                            info!("Received Ctrl+C, shutting down");
                            break;
                        }
                    },
                    Some(Command::Help) => print_help(),
                    Some(Command::Quit) => break,
                    None => println!("Unknown command '{}'; type 'help'", line.trim()),
                }
            }
            _ = ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    sync.shutdown()
        .await
        .context("Failed to stop foundation synchronizer")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let config = match BridgeConfig::load(&args) {
        Ok(config) => config,
        Err(e) => {
            print_env_help();
            return Err(e);
        }
    };
    config.print_summary();

    run(config).await
}
