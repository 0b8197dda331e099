//! Service discovery.
//!
//! One pass runs the primary listing, indexes plist directories, reads
//! disabled overrides and lists system extensions. Only the primary listing
//! is critical; everything else degrades to an empty contribution.

use crate::action::LAUNCHCTL;
use crate::classify::ServiceClassifier;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::parser::{parse_disabled, parse_extensions, parse_list};
use crate::types::{
    Domain, ExtensionRecord, Inferred, ListEntry, Service, ServiceStatus, ServiceType,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extension manager binary.
pub const SYSTEMEXTENSIONSCTL: &str = "systemextensionsctl";

/// Label segments too generic to stand alone as a display name.
const GENERIC_SEGMENTS: &[&str] = &["agent", "helper", "daemon", "service", "launcher", "xpc"];

/// Where a plist was found, and what its directory says about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlistLocation {
    pub path: PathBuf,
    pub kind: Option<ServiceType>,
    pub domain: Option<Domain>,
}

impl PlistLocation {
    fn from_path(path: PathBuf) -> Self {
        let dir = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let (kind, domain) = match dir {
            "LaunchDaemons" => (Some(ServiceType::Daemon), Some(Domain::System)),
            "LaunchAgents" => (Some(ServiceType::Agent), Some(Domain::Gui)),
            _ => (None, None),
        };
        Self { path, kind, domain }
    }
}

/// Index `*.plist` files directly inside each root by file stem.
///
/// Earlier roots win on duplicate stems. Missing roots are skipped.
pub fn index_plists(roots: &[PathBuf]) -> HashMap<String, PlistLocation> {
    let mut index = HashMap::new();
    for root in roots {
        if !root.is_dir() {
            log::debug!("Skipping missing plist root {}", root.display());
            continue;
        }
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("plist")
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                index
                    .entry(stem.to_string())
                    .or_insert_with(|| PlistLocation::from_path(path.to_path_buf()));
            }
        }
    }
    log::debug!("Indexed {} plists", index.len());
    index
}

/// Human-readable name derived from a reverse-DNS label.
pub fn display_name(label: &str) -> String {
    let segments: Vec<&str> = label
        .split('.')
        .filter(|s| !s.is_empty() && !s.chars().all(|c| c.is_ascii_digit()))
        .collect();
    match segments.as_slice() {
        [] => label.to_string(),
        [.., prev, last] if GENERIC_SEGMENTS.contains(&last.to_lowercase().as_str()) => {
            format!("{prev} {last}")
        }
        [.., last] => (*last).to_string(),
    }
}

/// Label-only guess of a service's kind.
fn guess_kind(label: &str, domain: Domain) -> ServiceType {
    let lower = label.to_lowercase();
    if lower.contains("agent") {
        ServiceType::Agent
    } else if lower.contains("daemon") || domain == Domain::System {
        ServiceType::Daemon
    } else {
        ServiceType::Agent
    }
}

/// Discovers services through the service manager.
pub struct Discovery<'a> {
    ctx: &'a Context,
    exec: &'a Executor,
    classifier: ServiceClassifier,
}

impl<'a> Discovery<'a> {
    pub fn new(ctx: &'a Context, exec: &'a Executor) -> Self {
        Self {
            ctx,
            exec,
            classifier: ctx.classifier(),
        }
    }

    /// Run a full discovery pass.
    ///
    /// Fails only when the primary listing fails.
    pub async fn discover(&self) -> Result<Vec<Service>> {
        let roots = self.ctx.plist_roots();
        let gui = self.ctx.gui_domain();
        let (entries, index, gui_disabled, system_disabled, extensions) = tokio::join!(
            self.list(),
            async move {
                tokio::task::spawn_blocking(move || index_plists(&roots))
                    .await
                    .unwrap_or_else(|e| {
                        log::warn!("Plist index task failed: {}", e);
                        HashMap::new()
                    })
            },
            self.disabled(&gui),
            self.disabled("system"),
            self.extensions(),
        );
        let entries = entries?;

        let mut seen = HashSet::new();
        let mut services = Vec::with_capacity(entries.len() + extensions.len());
        let listed_domain = if self.ctx.is_root {
            Domain::System
        } else {
            Domain::Gui
        };

        for entry in &entries {
            let location = index.get(&entry.label);
            let disabled = match location.and_then(|l| l.domain).unwrap_or(listed_domain) {
                Domain::System => &system_disabled,
                Domain::User | Domain::Gui => &gui_disabled,
            };
            let service = self.build(entry, location, listed_domain, !disabled.contains(&entry.label));
            if seen.insert(service.id.clone()) {
                services.push(service);
            }
        }

        // Installed but not loaded
        let mut unloaded: Vec<_> = index.iter().collect();
        unloaded.sort_by(|a, b| a.0.cmp(b.0));
        for (label, location) in unloaded {
            if !crate::parser::is_safe_label(label) {
                continue;
            }
            let domain = location.domain.unwrap_or(listed_domain);
            if seen.contains(&Service::make_id(domain, label)) {
                continue;
            }
            let disabled = match domain {
                Domain::System => &system_disabled,
                Domain::User | Domain::Gui => &gui_disabled,
            };
            let entry = ListEntry {
                pid: None,
                exit_status: None,
                label: label.clone(),
            };
            let service = self.build(&entry, Some(location), listed_domain, !disabled.contains(label));
            seen.insert(service.id.clone());
            services.push(service);
        }

        for record in &extensions {
            let service = self.build_extension(record);
            if seen.insert(service.id.clone()) {
                services.push(service);
            }
        }

        log::info!(
            "Discovered {} services ({} listed, {} extensions)",
            services.len(),
            entries.len(),
            extensions.len()
        );
        Ok(services)
    }

    async fn list(&self) -> Result<Vec<ListEntry>> {
        let spec = self.exec.spec(LAUNCHCTL, ["list"]);
        let output = self
            .exec
            .exec_with_retry(&spec)
            .await
            .map_err(|e| Error::DiscoveryFailed {
                message: e.to_string(),
            })?;
        if !output.success() {
            return Err(Error::DiscoveryFailed {
                message: format!(
                    "launchctl list exited {}: {}",
                    output.exit_code,
                    output.error_text()
                ),
            });
        }
        Ok(parse_list(&output.stdout))
    }

    async fn disabled(&self, domain: &str) -> HashSet<String> {
        let spec = self.exec.spec(LAUNCHCTL, ["print-disabled", domain]);
        match self.exec.exec_once(&spec).await {
            Ok(output) if output.success() => parse_disabled(&output.stdout),
            Ok(output) => {
                log::debug!("print-disabled {} exited {}", domain, output.exit_code);
                HashSet::new()
            }
            Err(e) => {
                log::debug!("print-disabled {} failed: {}", domain, e);
                HashSet::new()
            }
        }
    }

    async fn extensions(&self) -> Vec<ExtensionRecord> {
        let spec = self.exec.spec(SYSTEMEXTENSIONSCTL, ["list"]);
        match self.exec.exec_once(&spec).await {
            Ok(output) if output.success() => parse_extensions(&output.stdout),
            Ok(output) => {
                log::warn!("Extension listing failed: {}", output.error_text());
                Vec::new()
            }
            Err(e) => {
                log::warn!("Extension listing unavailable: {}", e);
                Vec::new()
            }
        }
    }

    fn build(
        &self,
        entry: &ListEntry,
        location: Option<&PlistLocation>,
        listed_domain: Domain,
        enabled: bool,
    ) -> Service {
        let domain = match location.and_then(|l| l.domain) {
            Some(d) => Inferred::confirmed(d),
            None => Inferred::provisional(listed_domain),
        };
        let kind = match location.and_then(|l| l.kind) {
            Some(k) => Inferred::confirmed(k),
            None => Inferred::provisional(guess_kind(&entry.label, domain.value)),
        };
        let file_path = location.map(|l| l.path.clone());
        let path = file_path.as_deref();
        let last_error = match entry.exit_status {
            Some(code) if ServiceStatus::derive(None, Some(code), true) == ServiceStatus::Error => {
                Some(format!("Last exit status {code}"))
            }
            _ => None,
        };

        Service {
            id: Service::make_id(domain.value, &entry.label),
            label: entry.label.clone(),
            display_name: display_name(&entry.label),
            kind,
            domain,
            status: ServiceStatus::derive(entry.pid, entry.exit_status, enabled),
            protection: self.classifier.protection(&entry.label, path),
            pid: entry.pid,
            exit_status: entry.exit_status,
            enabled,
            is_vendor_owned: self.classifier.is_vendor_owned(&entry.label, path),
            requires_root: self.classifier.requires_root(domain.value, path),
            file_path,
            description: None,
            last_error,
            team_id: None,
            version: None,
            extension_state: None,
            categories: None,
        }
    }

    fn build_extension(&self, record: &ExtensionRecord) -> Service {
        let label = &record.bundle_id;
        Service {
            id: Service::make_id(Domain::System, label),
            label: label.clone(),
            display_name: record.name.clone().unwrap_or_else(|| display_name(label)),
            kind: Inferred::confirmed(ServiceType::Extension),
            domain: Inferred::confirmed(Domain::System),
            status: record.status,
            protection: self.classifier.protection(label, None),
            pid: None,
            exit_status: None,
            enabled: record.enabled,
            is_vendor_owned: self.classifier.is_vendor_owned(label, None),
            requires_root: true,
            file_path: None,
            description: None,
            last_error: (record.status == ServiceStatus::Error)
                .then(|| record.state.clone())
                .flatten(),
            team_id: record.team_id.clone(),
            version: record.version.clone(),
            extension_state: record.state.clone(),
            categories: Some(record.categories.clone()),
        }
    }
}
