use crate::Context;
use crate::cli::ListArgs;
use crate::commands::load_services;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use launchkit::{Domain, Service, ServiceStatus, ServiceType};

const LABEL_WIDTH: usize = 48;

pub async fn run(ctx: &Context, args: ListArgs) -> Result<()> {
    let client = ctx.client()?;
    let services = load_services(ctx, &client).await?;
    let filtered = filter_services(
        &services,
        args.kind.map(Into::into),
        args.domain.map(Into::into),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&filtered)?);
        return Ok(());
    }

    ui::header(&format!("Services ({})", filtered.len()));
    print_table(filtered.iter().copied(), ctx.verbose > 0);
    print_summary(&filtered);
    Ok(())
}

/// Services matching the optional type and domain filters, in discovery order.
pub fn filter_services(
    services: &[Service],
    kind: Option<ServiceType>,
    domain: Option<Domain>,
) -> Vec<&Service> {
    services
        .iter()
        .filter(|s| kind.is_none_or(|k| s.kind.value == k))
        .filter(|s| domain.is_none_or(|d| s.domain.value == d))
        .collect()
}

pub fn print_table<'a>(services: impl IntoIterator<Item = &'a Service>, show_paths: bool) {
    for service in services {
        let pid = service
            .pid
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "  {:<width$} {:<9} {:<6} {:<8} {:>6} {}",
            ui::truncate(&service.label, LABEL_WIDTH),
            service.kind.value.as_str(),
            service.domain.value.as_str(),
            ui::status(service.status),
            pid,
            ui::protection_marker(service.protection),
            width = LABEL_WIDTH,
        );
        if let Some(error) = &service.last_error {
            ui::dim(&format!("  {error}"));
        }
        if show_paths && let Some(path) = &service.file_path {
            ui::dim(&format!("  {}", path.display()));
        }
    }
}

fn print_summary(services: &[&Service]) {
    let count = |status: ServiceStatus| services.iter().filter(|s| s.status == status).count();
    println!();
    println!(
        "  {} running, {} stopped, {} disabled, {} {}",
        count(ServiceStatus::Running).to_string().green(),
        count(ServiceStatus::Stopped),
        count(ServiceStatus::Disabled).to_string().dimmed(),
        count(ServiceStatus::Error).to_string().red(),
        "error".red(),
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use launchkit::{Inferred, Protection};

    pub(crate) fn service(label: &str, kind: ServiceType, domain: Domain) -> Service {
        Service {
            id: Service::make_id(domain, label),
            label: label.to_string(),
            display_name: label.to_string(),
            kind: Inferred::confirmed(kind),
            domain: Inferred::confirmed(domain),
            status: ServiceStatus::Stopped,
            protection: Protection::Normal,
            pid: None,
            exit_status: None,
            enabled: true,
            is_vendor_owned: false,
            requires_root: false,
            file_path: None,
            description: None,
            last_error: None,
            team_id: None,
            version: None,
            extension_state: None,
            categories: None,
        }
    }

    #[test]
    fn test_filter_services() {
        let services = vec![
            service("com.example.daemon", ServiceType::Daemon, Domain::System),
            service("com.example.agent", ServiceType::Agent, Domain::Gui),
            service("com.example.ext", ServiceType::Extension, Domain::System),
        ];

        assert_eq!(filter_services(&services, None, None).len(), 3);

        let daemons = filter_services(&services, Some(ServiceType::Daemon), None);
        assert_eq!(daemons.len(), 1);
        assert_eq!(daemons[0].label, "com.example.daemon");

        let system = filter_services(&services, None, Some(Domain::System));
        assert_eq!(
            system.iter().map(|s| s.label.as_str()).collect::<Vec<_>>(),
            vec!["com.example.daemon", "com.example.ext"]
        );

        assert!(filter_services(&services, Some(ServiceType::Agent), Some(Domain::System)).is_empty());
    }
}
