//! Membership commands.

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use super::Kind;
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum MemberCommands {
    /// List every membership
    List {
        #[arg(short, long, value_enum, default_value_t)]
        kind: Kind,
    },

    /// Add an entity to one or more groups
    Add {
        /// User name or resource path
        entity: String,

        /// Target groups; all must exist
        #[arg(required = true)]
        groups: Vec<String>,

        #[arg(short, long, value_enum, default_value_t)]
        kind: Kind,
    },

    /// Remove an entity from one or more groups
    Remove {
        entity: String,

        #[arg(required = true)]
        groups: Vec<String>,

        #[arg(short, long, value_enum, default_value_t)]
        kind: Kind,
    },

    /// Show the groups of an entity
    Show {
        entity: String,

        #[arg(short, long, value_enum, default_value_t)]
        kind: Kind,
    },

    /// Remove an entity from every group
    Delete {
        entity: String,

        #[arg(short, long, value_enum, default_value_t)]
        kind: Kind,
    },
}

#[derive(Debug, Deserialize, Serialize, Tabled)]
struct MembershipRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Group")]
    group: String,
}

#[derive(Debug, Serialize)]
struct MembershipRequest<'a> {
    entity: &'a str,
    groups: &'a [String],
}

fn rows(entity: &str, groups: Vec<String>) -> Vec<MembershipRow> {
    groups
        .into_iter()
        .map(|group| MembershipRow {
            entity: entity.to_string(),
            group,
        })
        .collect()
}

pub async fn execute(cmd: MemberCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        MemberCommands::List { kind } => {
            let memberships: Vec<MembershipRow> =
                client.get(&kind.path("/memberships"), &[]).await?;
            output::print_list(&memberships, format)?;
        }

        MemberCommands::Add {
            entity,
            groups,
            kind,
        } => {
            let now: Vec<String> = client
                .post(
                    &kind.path("/memberships"),
                    &MembershipRequest {
                        entity: &entity,
                        groups: &groups,
                    },
                )
                .await?;

            if let OutputFormat::Table = format {
                output::print_success(&format!(
                    "{} '{}' added to {}",
                    kind.entity_label(),
                    entity,
                    groups.join(", ")
                ));
            }
            output::print_list(&rows(&entity, now), format)?;
        }

        MemberCommands::Remove {
            entity,
            groups,
            kind,
        } => {
            let now: Vec<String> = client
                .delete_returning(
                    &kind.path("/memberships"),
                    &MembershipRequest {
                        entity: &entity,
                        groups: &groups,
                    },
                )
                .await?;

            if let OutputFormat::Table = format {
                output::print_success(&format!(
                    "{} '{}' removed from {}",
                    kind.entity_label(),
                    entity,
                    groups.join(", ")
                ));
            }
            output::print_list(&rows(&entity, now), format)?;
        }

        MemberCommands::Show { entity, kind } => {
            let groups: Vec<String> = client
                .get(&kind.path("/entity"), &[("name", entity.as_str())])
                .await?;
            output::print_list(&rows(&entity, groups), format)?;
        }

        MemberCommands::Delete { entity, kind } => {
            client
                .delete(&kind.path("/entity"), &[("name", entity.as_str())])
                .await?;
            output::print_success(&format!(
                "{} '{}' removed from all groups",
                kind.entity_label(),
                entity
            ));
        }
    }

    Ok(())
}
