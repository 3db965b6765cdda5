//! mysql-pg-verify CLI - post-migration reconciliation of MySQL and PostgreSQL.

mod log_sink;

use clap::{Parser, Subcommand};
use mysql_pg_verify::{health_check, Config, VerifyEngine, VerifyError, VerifyResult};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use log_sink::LogSink;

/// Exit code when the run completed and found differences.
const EXIT_MISMATCH: u8 = 2;

/// Exit code when a health check fails.
const EXIT_UNHEALTHY: u8 = 3;

/// Capacity of the event channel between the engine and the log sink.
const EVENT_BUFFER: usize = 256;

#[derive(Parser)]
#[command(name = "mysql-pg-verify")]
#[command(about = "Verify that a PostgreSQL database matches its MySQL source after migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every table: counts, ids, sampled rows, foreign keys
    Run {
        /// Also compare foreign keys and referencing values
        #[arg(long)]
        check_foreign_keys: bool,

        /// Number of leading ids whose rows are compared
        #[arg(long)]
        sample_size: Option<usize>,

        /// Pause between tables in milliseconds
        #[arg(long)]
        pacing_ms: Option<u64>,

        /// Append a timestamped event log to this file
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Compare the source and target table lists
    Tables,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, VerifyError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    let fingerprint = config.hash();
    info!(
        "Loaded configuration from {:?} (fingerprint {})",
        cli.config,
        &fingerprint[..12.min(fingerprint.len())]
    );

    match cli.command {
        Commands::Run {
            check_foreign_keys,
            sample_size,
            pacing_ms,
            log_file,
        } => {
            // Apply overrides
            if check_foreign_keys {
                config.verify.check_foreign_keys = true;
            }
            if let Some(n) = sample_size {
                config.verify.sample_size = n;
            }
            if let Some(ms) = pacing_ms {
                config.verify.pacing_ms = ms;
            }
            if log_file.is_some() {
                config.verify.log_file = log_file;
            }
            config.validate()?;

            let (tx, rx) = mpsc::channel(EVENT_BUFFER);
            let sink = match &config.verify.log_file {
                Some(path) => {
                    let mut sink = LogSink::open(path).await?;
                    sink.write(&format!("Configuration fingerprint: {}", fingerprint))
                        .await?;
                    sink.spawn(rx)
                }
                None => log_sink::discard(rx),
            };

            let cancel_token = setup_signal_handler();
            let engine = VerifyEngine::connect(config)
                .await?
                .with_events(tx)
                .with_cancellation(cancel_token);

            let result = engine.reconcile_all().await;
            engine.close().await;
            // Dropping the engine closes the event channel.
            drop(engine);

            match sink.await {
                Ok(Ok(lines)) => info!("Wrote {} event line(s)", lines),
                Ok(Err(e)) => warn!("Event log incomplete: {}", e),
                Err(e) => warn!("Event log task failed: {}", e),
            }

            let result = result?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }

            if result.is_clean() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_MISMATCH))
            }
        }

        Commands::Tables => {
            let engine = VerifyEngine::connect(config).await?;
            let lists = engine.table_lists().await;
            engine.close().await;
            let lists = lists?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&lists)?);
            } else {
                println!("Table Lists:");
                println!("  MySQL: {} table(s)", lists.source.len());
                println!("  PostgreSQL: {} table(s)", lists.target.len());
                if lists.diff.is_empty() {
                    println!("\n  ✓ Table lists match");
                } else {
                    for table in &lists.diff.missing_in_target {
                        println!("  ✗ {} missing in PostgreSQL", table);
                    }
                    for table in &lists.diff.extra_in_target {
                        println!("  ✗ {} missing in MySQL", table);
                    }
                }
            }

            if lists.diff.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_MISMATCH))
            }
        }

        Commands::HealthCheck => {
            let result = health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MySQL): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if result.healthy {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_UNHEALTHY))
            }
        }
    }
}

fn print_result(result: &VerifyResult) {
    println!();
    for report in &result.reports {
        if report.is_match {
            println!("  ✓ {} ({}ms)", report.table, report.duration_ms);
        } else {
            println!("  ✗ {}: {}", report.table, report.reason);
        }
    }

    println!("\nVerification Summary:");
    println!("  Tables checked: {}", result.reports.len());
    println!("  Tables matched: {}", result.tables_matched);
    println!("  Tables mismatched: {}", result.tables_mismatched);
    if !result.table_list.missing_in_target.is_empty() {
        println!(
            "  Missing in PostgreSQL: {}",
            result.table_list.missing_in_target.join(", ")
        );
    }
    if !result.table_list.extra_in_target.is_empty() {
        println!(
            "  Missing in MySQL: {}",
            result.table_list.extra_in_target.join(", ")
        );
    }
    if result.check_foreign_keys {
        println!("  Foreign keys: checked");
    }
    println!("  Duration: {:.2}s", result.duration_ms as f64 / 1000.0);
    println!(
        "\n  Overall: {}",
        if result.is_clean() { "MATCH" } else { "MISMATCH" }
    );
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT (Ctrl-C) or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        let (Ok(mut sigint), Ok(mut sigterm)) = (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) else {
            warn!("Cannot install signal handlers; interrupts will not stop the run cleanly");
            return;
        };
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!("\nReceived {}. Stopping after the current table...", name);
        token.cancel();
    });

    cancel_token
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current table...");
            token.cancel();
        }
    });

    cancel_token
}
