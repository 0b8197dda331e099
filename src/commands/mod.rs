pub mod action;
pub mod config;
pub mod info;
pub mod list;
pub mod search;
pub mod watch;

use crate::Context;
use crate::progress;
use anyhow::{Result, bail};
use launchkit::{Client, Service};

/// Discover services behind a spinner.
pub async fn load_services(ctx: &Context, client: &Client) -> Result<Vec<Service>> {
    let pb = progress::spinner("Discovering services...", ctx.quiet);
    let result = client.discover().await;
    pb.finish_and_clear();
    Ok(result?)
}

/// Find a service by exact label, suggesting close matches otherwise.
pub fn find_service<'a>(client: &Client, services: &'a [Service], label: &str) -> Result<&'a Service> {
    if let Some(service) = services.iter().find(|s| s.label == label) {
        return Ok(service);
    }

    let suggestions: Vec<&str> = client
        .search(services, label)
        .iter()
        .take(3)
        .map(|hit| hit.item.label.as_str())
        .collect();
    if suggestions.is_empty() {
        bail!("No service with label '{label}'");
    }
    bail!(
        "No service with label '{label}'. Did you mean: {}?",
        suggestions.join(", ")
    );
}
