//! Result printing shared by all commands.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable result. Text mode prints nothing; commands format
/// their own text output.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    if let OutputFormat::Json = format {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{}: failed to serialize result: {e}", "Error".red().bold()),
        }
    }
}

pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if !quiet && matches!(format, OutputFormat::Text) {
        println!("{} {}", "✓".green().bold(), message);
    }
}

pub fn warning(kind: &str, details: &str, suggestion: &str) {
    println!("  {} {}: {}", "!".yellow().bold(), kind.yellow(), details);
    println!("    {}", suggestion.dimmed());
}
