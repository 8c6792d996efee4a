//! Rendering of queue reports and job rows for the terminal.

use serde::Serialize;
use tabled::{Table, Tabled};

/// `--format` flag values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Render rows as a table, or as a JSON array. `empty` replaces an empty table.
pub fn render_list<T: Serialize + Tabled>(rows: &[T], format: OutputFormat, empty: &str) -> String {
    match format {
        OutputFormat::Table if rows.is_empty() => empty.to_string(),
        OutputFormat::Table => Table::new(rows).to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string()),
    }
}

pub fn print_list<T: Serialize + Tabled>(rows: &[T], format: OutputFormat, empty: &str) {
    println!("{}", render_list(rows, format, empty));
}

/// Print one record; table mode falls back to its debug form.
pub fn print_item<T: Serialize + std::fmt::Debug>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{:#?}", item),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string())
        ),
    }
}

pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Aligned `label: value` line used by the status and drain summaries.
pub fn print_kv(key: &str, value: impl std::fmt::Display) {
    println!("  {:<16} {}", format!("{}:", key), value);
}
