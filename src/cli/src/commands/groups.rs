//! Group management commands.
//!
//! Provides list, create, delete, and members operations for user groups
//! and resource groups.

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use super::Kind;
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum GroupCommands {
    /// List groups with their member counts
    List {
        /// User or resource groups
        #[arg(short, long, value_enum, default_value_t)]
        kind: Kind,
    },

    /// Create a group (no-op if it exists)
    Create {
        /// Group name
        name: String,

        #[arg(short, long, value_enum, default_value_t)]
        kind: Kind,
    },

    /// Delete a group, its memberships and every policy naming it
    Delete {
        /// Group name
        name: String,

        #[arg(short, long, value_enum, default_value_t)]
        kind: Kind,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show the members of a group
    Members {
        /// Group name
        name: String,

        #[arg(short, long, value_enum, default_value_t)]
        kind: Kind,
    },
}

// ── API response types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Tabled)]
struct GroupRow {
    #[tabled(rename = "Group")]
    name: String,
    #[tabled(rename = "Members")]
    members: usize,
}

#[derive(Debug, Deserialize, Serialize)]
struct GroupMembers {
    name: String,
    members: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Tabled)]
struct MemberRow {
    #[tabled(rename = "Member")]
    name: String,
}

// ── Execution ───────────────────────────────────────────────────────────────

pub async fn execute(cmd: GroupCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        GroupCommands::List { kind } => {
            let groups: Vec<GroupRow> = client.get(&kind.path("/groups"), &[]).await?;
            output::print_list(&groups, format)?;
        }

        GroupCommands::Create { name, kind } => {
            let created: serde_json::Value = client
                .post(&kind.path("/groups"), &serde_json::json!({ "name": name }))
                .await?;

            match format {
                OutputFormat::Table => {
                    output::print_success(&format!("{} group '{}' created", kind.entity_label(), name))
                }
                _ => output::print_item(&created, format)?,
            }
        }

        GroupCommands::Delete { name, kind, force } => {
            if !force {
                output::print_info(&format!(
                    "This removes '{}' and every policy naming it. Use --force to confirm.",
                    name
                ));
                return Ok(());
            }

            client
                .delete(&kind.group_path(&name)?, &[])
                .await?;
            output::print_success(&format!("{} group '{}' deleted", kind.entity_label(), name));
        }

        GroupCommands::Members { name, kind } => {
            let group: GroupMembers = client
                .get(&kind.group_path(&name)?, &[])
                .await?;

            match format {
                OutputFormat::Table => {
                    output::print_info(&format!("Members of {}", group.name));
                    let rows: Vec<MemberRow> = group
                        .members
                        .into_iter()
                        .map(|name| MemberRow { name })
                        .collect();
                    output::print_list(&rows, format)?;
                }
                _ => output::print_item(&group, format)?,
            }
        }
    }

    Ok(())
}
