//! Policy commands.

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// List policies
    List {
        /// Only policies granted to this user group
        #[arg(short, long)]
        user_group: Option<String>,
    },

    /// Grant an action on a resource group to a user group
    Add {
        /// User group, or `*`
        user_group: String,
        /// Resource group, or `*`
        resource_group: String,
        /// HTTP method or capability, or `*`
        action: String,
    },

    /// Revoke a policy
    Remove {
        user_group: String,
        resource_group: String,
        action: String,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, Tabled)]
struct PolicyRow {
    #[tabled(rename = "User Group")]
    user_group: String,
    #[tabled(rename = "Resource Group")]
    resource_group: String,
    #[tabled(rename = "Action")]
    action: String,
}

pub async fn execute(cmd: PolicyCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        PolicyCommands::List { user_group } => {
            let query: Vec<(&str, &str)> = user_group
                .as_deref()
                .map(|group| vec![("user_group", group)])
                .unwrap_or_default();
            let policies: Vec<PolicyRow> = client.get("/policies", &query).await?;
            output::print_list(&policies, format)?;
        }

        PolicyCommands::Add {
            user_group,
            resource_group,
            action,
        } => {
            let policy = PolicyRow {
                user_group,
                resource_group,
                action,
            };
            let added: PolicyRow = client.post("/policies", &policy).await?;

            match format {
                OutputFormat::Table => output::print_success(&format!(
                    "{} may {} on {}",
                    added.user_group, added.action, added.resource_group
                )),
                _ => output::print_item(&added, format)?,
            }
        }

        PolicyCommands::Remove {
            user_group,
            resource_group,
            action,
        } => {
            let policy = PolicyRow {
                user_group,
                resource_group,
                action,
            };
            client.delete_with("/policies", &policy).await?;
            output::print_success("Policy removed");
        }
    }

    Ok(())
}
