//! Service search.

use crate::types::Service;
use searchkit::{Ranked, Searchable, WeightedField, rank};

pub const LABEL_WEIGHT: f64 = 1.5;
pub const DISPLAY_NAME_WEIGHT: f64 = 1.2;
pub const DESCRIPTION_WEIGHT: f64 = 0.8;

impl Searchable for Service {
    fn search_fields(&self) -> Vec<WeightedField<'_>> {
        let mut fields = vec![
            WeightedField::new("label", &self.label, LABEL_WEIGHT),
            WeightedField::new("displayName", &self.display_name, DISPLAY_NAME_WEIGHT),
        ];
        if let Some(description) = self.description.as_deref() {
            fields.push(WeightedField::new(
                "description",
                description,
                DESCRIPTION_WEIGHT,
            ));
        }
        fields
    }
}

/// Rank services against `pattern`, best first, each with the indices of
/// its best field.
pub fn search<'a, T: Searchable>(services: &'a [T], pattern: &str) -> Vec<Ranked<'a, T>> {
    rank(services, pattern.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Domain, Inferred, Protection, ServiceStatus, ServiceType};
    use std::sync::Arc;

    fn service(label: &str, display_name: &str, description: Option<&str>) -> Arc<Service> {
        Arc::new(Service {
            id: Service::make_id(Domain::Gui, label),
            label: label.to_string(),
            display_name: display_name.to_string(),
            kind: Inferred::provisional(ServiceType::Agent),
            domain: Inferred::provisional(Domain::Gui),
            status: ServiceStatus::Stopped,
            protection: Protection::Normal,
            pid: None,
            exit_status: None,
            enabled: true,
            is_vendor_owned: false,
            requires_root: false,
            file_path: None,
            description: description.map(str::to_string),
            last_error: None,
            team_id: None,
            version: None,
            extension_state: None,
            categories: None,
        })
    }

    #[test]
    fn test_search_services() {
        let services = vec![
            service("flashship", "flashship", None),
            service("com.openssh.agent", "ssh agent", None),
            service("com.example.tunnel", "Tunnel", Some("Routes ssh traffic")),
        ];
        let results = search(&services, "ssh");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].item.label, "com.openssh.agent");
        assert_eq!(results.last().map(|r| r.item.label.as_str()), Some("flashship"));
    }

    #[test]
    fn test_description_field_indices() {
        let services = vec![service("com.example.x", "X", Some("Backup runner"))];
        let results = search(&services, "backup");
        assert_eq!(results[0].matched.field, "description");
        assert_eq!(results[0].matched.indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_blank_pattern_matches_everything() {
        let services = vec![service("a.b", "a", None), service("c.d", "c", None)];
        assert_eq!(search(&services, "  ").len(), 2);
    }
}
