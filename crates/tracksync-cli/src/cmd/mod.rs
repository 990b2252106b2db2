pub mod config;
pub mod report;
pub mod sync;
pub mod windows;

use anyhow::Context;
use tracksync_core::config::Config;
use tracksync_core::source::{JiraClient, MembershipFilter};
use tracksync_core::store::NotionClient;

pub(crate) fn source_client(config: &Config) -> anyhow::Result<JiraClient> {
    JiraClient::new(&config.source).context("failed to build source client")
}

pub(crate) fn store_client(config: &Config) -> anyhow::Result<NotionClient> {
    NotionClient::new(&config.store).context("failed to build store client")
}

pub(crate) fn membership_filter(config: &Config) -> MembershipFilter {
    MembershipFilter::new(config.assignees(), &config.source)
}
