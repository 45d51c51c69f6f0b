//! Terminal rendering for command results.
//!
//! Table mode prints human readable tables and status lines; JSON and YAML
//! modes print the raw API data so output can be piped into other tools.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::*;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Render as a formatted table
    #[default]
    Table,
    /// Render as JSON
    Json,
    /// Render as YAML
    Yaml,
}

impl OutputFormat {
    pub fn is_table(self) -> bool {
        self == Self::Table
    }

    /// Serialize `value` for printing. Values without a table form render as
    /// JSON in table mode.
    pub fn render<T: Serialize + ?Sized>(self, value: &T) -> Result<String> {
        match self {
            Self::Yaml => serde_yaml::to_string(value).context("Failed to serialize to YAML"),
            Self::Table | Self::Json => serde_json::to_string_pretty(value)
                .map(|json| json + "\n")
                .context("Failed to serialize to JSON"),
        }
    }
}

fn status_line(tag: ColoredString, msg: &str) -> String {
    format!("{} {}", tag, msg)
}

pub fn print_success(msg: &str) {
    println!("{}", status_line("ok".green().bold(), msg));
}

pub fn print_error(msg: &str) {
    eprintln!("{}", status_line("error:".red().bold(), msg));
}

pub fn print_info(msg: &str) {
    println!("{}", status_line("note:".blue().bold(), msg));
}

/// Rows as a table, or as a serialized array in the structured formats.
pub fn print_list<T: Tabled + Serialize>(rows: &[T], format: OutputFormat) -> Result<()> {
    if !format.is_table() {
        return print_item(rows, format);
    }
    if rows.is_empty() {
        println!("{}", "(none)".dimmed());
        return Ok(());
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

pub fn print_item<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    print!("{}", format.render(value)?);
    Ok(())
}

/// Titled key/value block for table mode.
pub fn print_fields(title: &str, fields: &[(&str, &str)]) {
    let mut builder = Builder::default();
    for (key, value) in fields {
        builder.push_record([key.to_string(), value.to_string()]);
    }
    println!("{}", title.bold().underline());
    println!("{}", builder.build().with(Style::blank()));
}
