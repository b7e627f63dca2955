//! Outbound discovery records.
//!
//! A sweep result is flattened into one record per (application, endpoint) pair followed by
//! a single terminator whose `endpoint` is `null`. `index` orders the whole batch, so a
//! consumer can spot the end of a batch without any framing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::application::{ApplicationInfo, ApplicationModel, EndpointModel};

pub const DISCOVERY_EVENT_CONTENT_TYPE: &str = "application/x-discovery-v1-json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEventModel {
    pub application: Option<ApplicationInfo>,
    pub endpoint: Option<EndpointModel>,
    pub timestamp: DateTime<Utc>,
    pub index: usize,
}

impl DiscoveryEventModel {
    pub fn is_terminator(&self) -> bool {
        self.endpoint.is_none()
    }

    pub fn flatten(apps: &[ApplicationModel], timestamp: DateTime<Utc>) -> Vec<DiscoveryEventModel> {
        let mut events: Vec<DiscoveryEventModel> = apps
            .iter()
            .flat_map(|app| {
                app.endpoints.iter().map(move |endpoint| (&app.application, endpoint))
            })
            .enumerate()
            .map(|(index, (application, endpoint))| DiscoveryEventModel {
                application: Some(application.clone()),
                endpoint: Some(endpoint.clone()),
                timestamp,
                index,
            })
            .collect();

        events.push(DiscoveryEventModel {
            application: None,
            endpoint: None,
            timestamp,
            index: events.len(),
        });
        events
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::application::SecurityMode;

    fn app(uri: &str, endpoints: usize) -> ApplicationModel {
        ApplicationModel {
            application: ApplicationInfo {
                application_uri: uri.to_string(),
                ..ApplicationInfo::default()
            },
            endpoints: (0..endpoints)
                .map(|i| EndpointModel {
                    url: format!("opc.tcp://10.0.0.1:{}", 4840 + i),
                    security_mode: SecurityMode::None,
                    security_policy: None,
                })
                .collect(),
        }
    }

    #[test]
    fn flatten_appends_a_terminator() {
        let now = Utc::now();
        let apps = vec![app("urn:a", 2), app("urn:empty", 0), app("urn:b", 1)];
        let events = DiscoveryEventModel::flatten(&apps, now);

        assert_eq!(events.len(), 4);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.index, i);
            assert_eq!(event.timestamp, now);
        }
        assert!(events[..3].iter().all(|e| !e.is_terminator()));
        assert!(events[3].is_terminator());
    }

    #[test]
    fn empty_sweep_is_only_a_terminator() {
        let events = DiscoveryEventModel::flatten(&[], Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 0);
        assert!(events[0].is_terminator());
    }

    #[test]
    fn wire_form_is_camel_case_with_null_endpoint() {
        let events = DiscoveryEventModel::flatten(&[app("urn:a", 1)], Utc::now());
        let first: serde_json::Value = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(first["application"]["applicationUri"], "urn:a");
        assert_eq!(first["endpoint"]["securityMode"], "None");

        let last: serde_json::Value = serde_json::to_value(&events[1]).unwrap();
        assert!(last["endpoint"].is_null());
        assert_eq!(last["index"], 1);
    }
}
