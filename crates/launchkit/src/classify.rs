//! Protection and privilege classification.
//!
//! Protection and root-requirement are separate predicates: a service can
//! be system-owned without needing root (a vendor agent in the user's
//! session), and a third-party daemon needs root without being protected.

use crate::types::{Domain, Protection, Service, ServiceType};
use std::path::{Path, PathBuf};

/// Label namespace reserved for the OS vendor.
pub const VENDOR_PREFIX: &str = "com.apple.";

/// Vendor-owned file tree.
pub const VENDOR_SYSTEM_ROOT: &str = "/System/Library/";

/// Roots covered by System Integrity Protection.
pub const SIP_ROOTS: &[&str] = &[
    "/System/",
    "/usr/bin/",
    "/usr/sbin/",
    "/usr/libexec/",
    "/bin/",
    "/sbin/",
];

/// System-wide plist roots; anything installed here is managed as root.
pub const SYSTEM_WIDE_ROOTS: &[&str] = &["/Library/", "/System/Library/"];

/// Core processes that must never be touched even outside the vendor namespace.
///
/// Entries ending in `*` match by prefix.
pub const IMMUTABLE_LABELS: &[&str] = &[
    "launchd",
    "kernel_task",
    "WindowServer",
    "loginwindow",
    "com.openssh.sshd",
    "org.cups.cupsd",
];

/// Classifies services from their label and plist path.
#[derive(Debug, Clone)]
pub struct ServiceClassifier {
    user_agents_dir: PathBuf,
    immutable: Vec<String>,
}

impl ServiceClassifier {
    /// Create a classifier for the given home directory.
    pub fn new(home: &Path) -> Self {
        Self {
            user_agents_dir: home.join("Library").join("LaunchAgents"),
            immutable: IMMUTABLE_LABELS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Extend the immutable allowlist.
    pub fn with_immutable<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.immutable.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Protection level, in priority order: SIP path, vendor label, immutable allowlist.
    pub fn protection(&self, label: &str, file_path: Option<&Path>) -> Protection {
        if file_path.is_some_and(is_sip_path) {
            Protection::SipProtected
        } else if label.starts_with(VENDOR_PREFIX) {
            Protection::SystemOwned
        } else if self.is_immutable(label) {
            Protection::Immutable
        } else {
            Protection::Normal
        }
    }

    /// Vendor label prefix or vendor system path.
    pub fn is_vendor_owned(&self, label: &str, file_path: Option<&Path>) -> bool {
        label.starts_with(VENDOR_PREFIX)
            || file_path.is_some_and(|p| p.starts_with(VENDOR_SYSTEM_ROOT))
    }

    /// Whether managing the service needs root.
    pub fn requires_root(&self, domain: Domain, file_path: Option<&Path>) -> bool {
        if file_path.is_some_and(|p| p.starts_with(&self.user_agents_dir)) {
            return false;
        }
        if domain == Domain::System {
            return true;
        }
        file_path.is_some_and(|p| SYSTEM_WIDE_ROOTS.iter().any(|root| p.starts_with(root)))
    }

    /// Recompute the classifier-derived fields after a service was refined.
    ///
    /// Extensions keep their listing classification.
    pub fn reclassify(&self, mut service: Service) -> Service {
        if service.kind.value == ServiceType::Extension {
            return service;
        }
        let path = service.file_path.as_deref();
        service.protection = self.protection(&service.label, path);
        service.is_vendor_owned = self.is_vendor_owned(&service.label, path);
        service.requires_root = self.requires_root(service.domain.value, path);
        service
    }

    fn is_immutable(&self, label: &str) -> bool {
        self.immutable.iter().any(|entry| match entry.strip_suffix('*') {
            Some(prefix) => label.starts_with(prefix),
            None => entry == label,
        })
    }
}

fn is_sip_path(path: &Path) -> bool {
    SIP_ROOTS.iter().any(|root| path.starts_with(root))
}
