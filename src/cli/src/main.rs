//! Servicekit CLI - administer groups and policies of a servicekit server.
//!
//! Provides group, membership, policy, health, and configuration commands.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use client::Credentials;
use commands::{config, groups, health, members, policies};
use output::OutputFormat;

/// Servicekit - group and policy administration
#[derive(Parser)]
#[command(
    name = "servicekit",
    version,
    about = "Servicekit - group and policy administration",
    long_about = "CLI tool for managing user groups, resource groups and access policies of a servicekit server.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "SERVICEKIT_API_URL")]
    api_url: Option<String>,

    /// Path the admin router is mounted at
    #[arg(long, global = true, env = "SERVICEKIT_ADMIN_PATH")]
    admin_path: Option<String>,

    /// Basic auth user
    #[arg(long, global = true, env = "SERVICEKIT_USER")]
    user: Option<String>,

    /// Basic auth password
    #[arg(long, global = true, env = "SERVICEKIT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User group and resource group management
    #[command(subcommand)]
    Groups(groups::GroupCommands),

    /// Group membership management
    #[command(subcommand)]
    Members(members::MemberCommands),

    /// Access policy management
    #[command(subcommand)]
    Policies(policies::PolicyCommands),

    /// Check server health
    Health(health::HealthArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let stored = config::CliConfig::load().unwrap_or_else(|e| {
        output::print_error(&format!("Ignoring settings file: {:#}", e));
        config::CliConfig::default()
    });

    let api_url = cli
        .api_url
        .clone()
        .or(stored.api_url)
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let admin_path = cli
        .admin_path
        .clone()
        .or(stored.admin_path)
        .unwrap_or_else(|| "/admin".to_string());

    let credentials = cli.user.clone().or(stored.user).map(|user| Credentials {
        user,
        password: cli.password.clone().unwrap_or_default(),
    });

    let client = client::ApiClient::new(&api_url, &admin_path, credentials)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Groups(cmd) => groups::execute(cmd, &client, format).await,
        Commands::Members(cmd) => members::execute(cmd, &client, format).await,
        Commands::Policies(cmd) => policies::execute(cmd, &client, format).await,
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
