//! Progress reporting for the collector
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::collector::{CollectProgress, CollectResult, RunState};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays run status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        if let Ok(spinner) = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &CollectProgress) {
        let msg = format!(
            "Hosts: {}/{} | OK: {} | Failed: {} | Rate: {:.1}/s | Workers: {}",
            format_number(progress.done),
            format_number(progress.total),
            format_number(progress.succeeded),
            format_number(progress.failed),
            progress.hosts_per_second(),
            progress.workers,
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header at the start of the run
pub fn print_header(hosts_file: &str, host_count: usize, workers: usize, command: &str, output: &str) {
    println!();
    println!(
        "{} {}",
        style("netinv").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {} ({} hosts)",
        style("Hosts:").bold(),
        hosts_file,
        format_number(host_count as u64)
    );
    println!("  {} {}", style("Command:").bold(), command);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}

/// Print a summary of the run
pub fn print_summary(result: &CollectResult, output_path: &str, output_size: Option<u64>) {
    let duration_secs = result.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        result.outcomes.processed() as f64 / duration_secs
    } else {
        0.0
    };

    let title = match result.state {
        RunState::Complete => style("Collection Complete").green().bold(),
        RunState::AbortedOnAuthFailure => style("Aborted: Authentication Failure").red().bold(),
        _ => style("Collection Aborted").yellow().bold(),
    };

    let o = &result.outcomes;

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Hosts:").bold(),
        format_number(result.total_hosts)
    );
    println!(
        "  {} {}",
        style("Recorded:").bold(),
        format_number(result.records_written)
    );
    if o.timed_out > 0 {
        println!(
            "  {} {}",
            style("Timed out:").yellow().bold(),
            format_number(o.timed_out)
        );
    }
    if o.execution_failed > 0 {
        println!(
            "  {} {}",
            style("Command failed:").yellow().bold(),
            format_number(o.execution_failed)
        );
    }
    if o.extraction_failed > 0 {
        println!(
            "  {} {}",
            style("No value:").yellow().bold(),
            format_number(o.extraction_failed)
        );
    }
    if o.auth_failed > 0 {
        println!(
            "  {} {}",
            style("Auth failed:").red().bold(),
            format_number(o.auth_failed)
        );
    }
    if result.unprocessed > 0 {
        println!(
            "  {} {}",
            style("Not processed:").yellow().bold(),
            format_number(result.unprocessed)
        );
    }
    if let Some(reason) = &result.abort_reason {
        println!("  {} {}", style("Stopped:").red().bold(), reason);
    }
    if result.detached_workers > 0 {
        println!(
            "  {} {} still blocked at exit",
            style("Workers:").yellow().bold(),
            result.detached_workers
        );
    }
    for failure in &result.worker_failures {
        println!("  {} {}", style("Worker:").red().bold(), failure);
    }
    println!(
        "  {} {:.1}s ({:.1} hosts/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    match output_size {
        Some(size) => println!(
            "  {} {} ({})",
            style("Output:").bold(),
            output_path,
            format_size(size, BINARY)
        ),
        None => println!("  {} {}", style("Output:").bold(), output_path),
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_progress_rate() {
        let progress = CollectProgress {
            total: 100,
            done: 50,
            succeeded: 45,
            failed: 5,
            workers: 8,
            elapsed: Duration::from_secs(10),
        };
        assert!((progress.hosts_per_second() - 5.0).abs() < 0.01);
    }
}
