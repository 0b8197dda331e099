use crate::Context;
use crate::commands::{find_service, load_services};
use crate::ui;
use anyhow::{Result, bail};
use launchkit::{Client, Inferred, Service, ServiceDetail};
use snapshot::{FetchOutcome, MetadataCache};

pub async fn run(ctx: &Context, label: &str) -> Result<()> {
    let client = ctx.client()?;
    let services = load_services(ctx, &client).await?;
    let service = find_service(&client, &services, label)?;

    let cache = MetadataCache::new(ctx.config.cache.capacity);
    let detail = fetch_cached(&client, &cache, service).await?;
    print_detail(&client, service, &detail);
    Ok(())
}

/// Fetch detail through the cache.
pub async fn fetch_cached(
    client: &Client,
    cache: &MetadataCache<ServiceDetail>,
    service: &Service,
) -> Result<ServiceDetail> {
    match cache
        .get_or_fetch(&service.id, || client.fetch_detail(service))
        .await
    {
        FetchOutcome::Cached(detail) | FetchOutcome::Fetched(detail) => Ok(detail),
        FetchOutcome::InFlight => bail!("Detail for {} is already being fetched", service.label),
        FetchOutcome::Failed(e) => Err(e.into()),
    }
}

pub fn print_detail(client: &Client, service: &Service, detail: &ServiceDetail) {
    let refined = client.refine(service, detail);

    ui::header(&refined.label);
    ui::kv("Name", &refined.display_name);
    ui::kv("Type", &inferred(refined.kind));
    ui::kv("Domain", &inferred(refined.domain));
    ui::kv("Status", &ui::status(refined.status).to_string());
    if let Some(pid) = detail.pid.or(refined.pid) {
        ui::kv("PID", &pid.to_string());
    }
    if let Some(code) = detail.exit_status.or(refined.exit_status) {
        ui::kv("Last exit", &code.to_string());
    }
    if let Some(state) = &detail.state {
        ui::kv("State", state);
    }
    ui::kv("Protection", refined.protection.as_str());
    ui::kv("Requires root", if refined.requires_root { "yes" } else { "no" });
    if let Some(path) = &refined.file_path {
        ui::kv("Plist", &path.display().to_string());
    }
    if let Some(program) = &detail.program {
        ui::kv("Program", program);
    }
    if !detail.arguments.is_empty() {
        ui::kv("Arguments", &detail.arguments.join(" "));
    }
    if let Some(run_at_load) = detail.run_at_load {
        ui::kv("Run at load", &run_at_load.to_string());
    }
    if let Some(keep_alive) = detail.keep_alive {
        ui::kv("Keep alive", &keep_alive.to_string());
    }
    if let Some(description) = &refined.description {
        ui::kv("Description", description);
    }
    if let Some(team) = &refined.team_id {
        ui::kv("Team ID", team);
    }
    if let Some(version) = &refined.version {
        ui::kv("Version", version);
    }
    if let Some(categories) = &refined.categories {
        ui::kv("Categories", &categories.join(", "));
    }
    if let Some(error) = &refined.last_error {
        ui::warn(error);
    }
}

/// `value` for confirmed values, `value (guessed)` otherwise.
fn inferred<T: std::fmt::Display>(value: Inferred<T>) -> String {
    if value.is_confirmed() {
        value.value.to_string()
    } else {
        format!("{} (guessed)", value.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchkit::{Domain, ServiceType};

    #[test]
    fn test_inferred_label() {
        assert_eq!(inferred(Inferred::confirmed(ServiceType::Daemon)), "daemon");
        assert_eq!(inferred(Inferred::provisional(Domain::Gui)), "gui (guessed)");
    }
}
