//! Health check command.
//!
//! Queries the unauthenticated `/health` endpoint.

use anyhow::Result;
use clap::Args;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {
    /// Exit with an error when the server is not healthy
    #[arg(short, long)]
    strict: bool,
}

pub async fn execute(args: HealthArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: serde_json::Value = client.get_raw("/health").await?;

    match format {
        OutputFormat::Table => {
            let status = health
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");

            let version = health.get("version").and_then(|v| v.as_str()).unwrap_or("-");
            let timestamp = health.get("timestamp").and_then(|v| v.as_str()).unwrap_or("-");
            output::print_fields(
                "System Health",
                &[
                    ("Status", status),
                    ("API URL", client.base_url()),
                    ("Version", version),
                    ("Timestamp", timestamp),
                ],
            );

            if status == "healthy" {
                output::print_success("Service operational");
            } else {
                output::print_error(&format!("Service status: {}", status));
            }
        }
        _ => output::print_item(&health, format)?,
    }

    let healthy = health.get("status").and_then(|v| v.as_str()) == Some("healthy");
    if args.strict && !healthy {
        anyhow::bail!("Service is not healthy");
    }

    Ok(())
}
