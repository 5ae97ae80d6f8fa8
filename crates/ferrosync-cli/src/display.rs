//! Terminal output for the ferrosync CLI

use console::style;
use ferrosync_sync::SyncResult;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner showing the latest sync event, `None` in quiet mode
pub fn create_spinner(quiet: bool, message: &str) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Print the statistics of one sync pass
pub fn print_sync_result(result: &SyncResult) {
    println!();
    println!(
        "{} {}",
        style("Sync Statistics:").bold().underlined(),
        style(&result.host).cyan()
    );
    println!("  Files uploaded: {}", style(result.uploaded).green());
    println!("  Files deleted: {}", style(result.deleted).green());
    println!(
        "  Bytes uploaded: {}",
        style(format_bytes(result.bytes_uploaded)).green()
    );
    println!(
        "  Errors: {}",
        if result.errors.is_empty() {
            style(result.errors.len()).green()
        } else {
            style(result.errors.len()).red()
        }
    );
    println!(
        "  Started: {}",
        style(result.started_at.format("%Y-%m-%d %H:%M:%S UTC")).blue()
    );
    println!(
        "  Duration: {}",
        style(format_duration(result.duration)).blue()
    );

    for error in &result.errors {
        println!("    {} {}", style("✗").red(), style(error).dim());
    }
}

/// Print a server that could not be synced
pub fn print_server_failure(host: &str, error: &dyn std::fmt::Display) {
    eprintln!(
        "{} Sync to {} failed: {}",
        style("✗").red().bold(),
        style(host).cyan(),
        error
    );
}

/// Human readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Human readable duration
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
