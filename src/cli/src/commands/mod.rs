//! CLI subcommands.

pub mod config;
pub mod groups;
pub mod health;
pub mod members;
pub mod policies;

use anyhow::Result;
use clap::ValueEnum;

use crate::client::path_segment;

/// Which grouping a command works on.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum Kind {
    /// Users and user groups
    #[default]
    User,
    /// Resources and resource groups
    Resource,
}

impl Kind {
    /// Admin route segment for this kind.
    pub fn segment(&self) -> &'static str {
        match self {
            Kind::User => "/users",
            Kind::Resource => "/resources",
        }
    }

    pub fn entity_label(&self) -> &'static str {
        match self {
            Kind::User => "user",
            Kind::Resource => "resource",
        }
    }

    pub fn path(&self, rest: &str) -> String {
        format!("{}{}", self.segment(), rest)
    }

    /// Route of one group; the name is encoded as a single segment.
    pub fn group_path(&self, group: &str) -> Result<String> {
        Ok(self.path(&format!("/groups/{}", path_segment(group)?)))
    }
}
