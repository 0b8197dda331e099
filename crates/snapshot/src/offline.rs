//! Offline detection and stale-snapshot fallback.
//!
//! Online until `threshold` consecutive discovery failures, then offline.
//! While offline the last good snapshot is served and the error is
//! swallowed. With no previous snapshot the error always surfaces. Any
//! success goes back online and resets the counter.

use chrono::{DateTime, Utc};
use launchkit::{Error, Result, Service};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// Consecutive failures before going offline.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Observable reconciler state.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineState {
    pub is_offline: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    /// `None` until the first successful discovery
    #[serde(skip)]
    pub last_successful_snapshot: Option<Vec<Arc<Service>>>,
}

/// State change produced by one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    WentOffline,
    CameOnline,
}

/// Services to show after a refresh.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub services: Vec<Arc<Service>>,
    /// Served from the cache while offline
    pub stale: bool,
    pub transition: Transition,
}

/// Wraps discovery with offline bookkeeping.
#[derive(Debug)]
pub struct OfflineReconciler {
    threshold: u32,
    state: OfflineState,
}

impl Default for OfflineReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl OfflineReconciler {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            state: OfflineState::default(),
        }
    }

    pub fn state(&self) -> &OfflineState {
        &self.state
    }

    pub fn is_offline(&self) -> bool {
        self.state.is_offline
    }

    /// The cached snapshot, empty before the first success.
    pub fn services(&self) -> &[Arc<Service>] {
        self.state.last_successful_snapshot.as_deref().unwrap_or(&[])
    }

    /// Run `discover` and reconcile its outcome.
    pub async fn refresh<F, Fut>(&mut self, discover: F) -> Result<RefreshOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Service>>>,
    {
        match discover().await {
            Ok(services) => Ok(self.record_success(services.into_iter().map(Arc::new).collect())),
            Err(e) => self.record_failure(e),
        }
    }

    /// Record a successful discovery.
    pub fn record_success(&mut self, services: Vec<Arc<Service>>) -> RefreshOutcome {
        let transition = if self.state.is_offline {
            log::info!("Service manager reachable again");
            Transition::CameOnline
        } else {
            Transition::None
        };
        self.state.is_offline = false;
        self.state.consecutive_failures = 0;
        self.state.last_error = None;
        self.state.last_success_at = Some(Utc::now());
        self.state.last_successful_snapshot = Some(services.clone());
        RefreshOutcome {
            services,
            stale: false,
            transition,
        }
    }

    /// Record a failed discovery; returns the stale snapshot when masking
    /// the error is allowed.
    pub fn record_failure(&mut self, error: Error) -> Result<RefreshOutcome> {
        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        self.state.last_error = Some(error.to_string());
        log::debug!(
            "Discovery failure {}/{}: {}",
            self.state.consecutive_failures,
            self.threshold,
            error
        );

        if self.state.consecutive_failures < self.threshold {
            return Err(error);
        }

        let transition = if self.state.is_offline {
            Transition::None
        } else {
            log::warn!(
                "Going offline after {} consecutive failures",
                self.state.consecutive_failures
            );
            Transition::WentOffline
        };
        self.state.is_offline = true;

        match &self.state.last_successful_snapshot {
            Some(snapshot) => Ok(RefreshOutcome {
                services: snapshot.clone(),
                stale: true,
                transition,
            }),
            None => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchkit::{Domain, Inferred, Protection, ServiceStatus, ServiceType};

    fn service(label: &str) -> Service {
        Service {
            id: Service::make_id(Domain::Gui, label),
            label: label.to_string(),
            display_name: label.to_string(),
            kind: Inferred::provisional(ServiceType::Agent),
            domain: Inferred::provisional(Domain::Gui),
            status: ServiceStatus::Stopped,
            protection: Protection::Normal,
            pid: None,
            exit_status: Some(0),
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

    fn failure() -> Error {
        Error::DiscoveryFailed {
            message: "Could not contact launchd".to_string(),
        }
    }

    #[tokio::test]
    async fn test_threshold_and_recovery() {
        let mut reconciler = OfflineReconciler::new(3);
        let good = reconciler
            .refresh(|| async { Ok(vec![service("com.example.a"), service("com.example.b")]) })
            .await
            .unwrap();
        assert!(!good.stale);

        for _ in 0..2 {
            assert!(reconciler.refresh(|| async { Err(failure()) }).await.is_err());
            assert!(!reconciler.is_offline());
        }

        let stale = reconciler.refresh(|| async { Err(failure()) }).await.unwrap();
        assert!(reconciler.is_offline());
        assert!(stale.stale);
        assert_eq!(stale.transition, Transition::WentOffline);
        assert_eq!(stale.services.len(), 2);
        assert!(
            stale
                .services
                .iter()
                .zip(reconciler.services())
                .all(|(a, b)| Arc::ptr_eq(a, b))
        );
        assert_eq!(reconciler.state().consecutive_failures, 3);

        // Still offline, still served stale
        let again = reconciler.refresh(|| async { Err(failure()) }).await.unwrap();
        assert_eq!(again.transition, Transition::None);

        let back = reconciler
            .refresh(|| async { Ok(vec![service("com.example.c")]) })
            .await
            .unwrap();
        assert_eq!(back.transition, Transition::CameOnline);
        assert!(!reconciler.is_offline());
        assert_eq!(reconciler.state().consecutive_failures, 0);
        assert!(reconciler.state().last_error.is_none());
        assert_eq!(reconciler.services().len(), 1);
    }

    #[test]
    fn test_no_snapshot_surfaces_error() {
        let mut reconciler = OfflineReconciler::default();
        for _ in 0..5 {
            assert!(reconciler.record_failure(failure()).is_err());
        }
        // Offline, but nothing cached to show
        assert!(reconciler.is_offline());
        assert!(reconciler.services().is_empty());
    }

    #[test]
    fn test_empty_snapshot_still_counts_as_snapshot() {
        let mut reconciler = OfflineReconciler::new(1);
        reconciler.record_success(Vec::new());
        let outcome = reconciler.record_failure(failure()).unwrap();
        assert!(outcome.stale);
        assert!(outcome.services.is_empty());
    }

    #[test]
    fn test_success_resets_counter_before_threshold() {
        let mut reconciler = OfflineReconciler::new(3);
        let _ = reconciler.record_failure(failure());
        let _ = reconciler.record_failure(failure());
        reconciler.record_success(Vec::new());
        let _ = reconciler.record_failure(failure());
        let _ = reconciler.record_failure(failure());
        assert!(!reconciler.is_offline());
        assert_eq!(reconciler.state().consecutive_failures, 2);
    }
}
