//! netinv - Parallel Network Device Inventory Collector
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use netinv::collector::{AbortReason, Dispatcher, JobSpec, RunState};
use netinv::config::{load_hosts, CliArgs, CollectConfig};
use netinv::credentials::Credentials;
use netinv::parse::parser_for;
use netinv::progress::{print_header, print_summary, ProgressReporter};
use netinv::session::SessionConnector;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit status when a device rejected the credentials
const EXIT_AUTH_ABORT: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(state) => match state {
            RunState::Complete => ExitCode::SUCCESS,
            RunState::AbortedOnAuthFailure => ExitCode::from(EXIT_AUTH_ABORT),
            _ => ExitCode::FAILURE,
        },
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<RunState> {
    let args = CliArgs::parse();

    let config = CollectConfig::from_args(args).context("Invalid configuration")?;

    setup_logging(config.verbose)?;

    let hosts = load_hosts(&config.hosts_path).context("Failed to load host list")?;
    info!(hosts = hosts.len(), path = %config.hosts_path.display(), "Host list loaded");

    let credentials =
        Credentials::acquire(config.username.clone()).context("Failed to obtain credentials")?;

    if config.show_progress {
        print_header(
            &config.hosts_path.display().to_string(),
            hosts.len(),
            config.worker_count,
            &config.command,
            &config.output_path.display().to_string(),
        );
    }

    let connector = build_connector()?;
    let parser = parser_for(config.device_type);

    let dispatcher = Dispatcher::new(
        JobSpec::from(&config),
        config.worker_count,
        &config.output_path,
        credentials,
        connector,
        parser,
    )
    .context("Failed to initialize collector")?;

    // Setup signal handler for graceful shutdown
    let cancel = dispatcher.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        cancel.abort(AbortReason::Interrupted);
    })
    .context("Failed to set signal handler")?;

    let progress = if config.show_progress {
        Some(ProgressReporter::new())
    } else {
        None
    };

    if let Some(ref p) = progress {
        p.set_status("Starting workers...");
    }

    let result = dispatcher
        .run(hosts, |update| {
            if let Some(ref p) = progress {
                p.update(update);
            }
        })
        .context("Collection failed")?;

    if let Some(ref p) = progress {
        match result.state {
            RunState::Complete => p.finish("Collection completed"),
            RunState::AbortedOnAuthFailure => p.finish("Stopped on authentication failure"),
            _ => p.finish("Collection interrupted"),
        }
    }

    let output_size = std::fs::metadata(&config.output_path).ok().map(|m| m.len());
    print_summary(
        &result,
        &config.output_path.display().to_string(),
        output_size,
    );

    if !result.completed() {
        info!(unprocessed = result.unprocessed, "Run stopped before every host was processed");
    }

    Ok(result.state)
}

#[cfg(feature = "ssh")]
fn build_connector() -> Result<Arc<dyn SessionConnector>> {
    let connector = netinv::session::SshConnector::new().context("Failed to start SSH runtime")?;
    Ok(Arc::new(connector))
}

#[cfg(not(feature = "ssh"))]
fn build_connector() -> Result<Arc<dyn SessionConnector>> {
    anyhow::bail!("netinv was built without SSH support; rebuild with the 'ssh' feature")
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("netinv=debug,warn")
    } else {
        EnvFilter::new("netinv=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
