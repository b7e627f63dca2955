//! Applications and endpoints found by a sweep.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationType {
    #[default]
    Server,
    Client,
    ClientAndServer,
    DiscoveryServer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SecurityMode {
    #[default]
    None,
    Sign,
    SignAndEncrypt,
}

/// Identity of an application, keyed by `application_uri`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationInfo {
    pub application_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_uri: Option<String>,
    #[serde(default)]
    pub application_type: ApplicationType,
    #[serde(default)]
    pub discovery_urls: BTreeSet<String>,
    #[serde(default)]
    pub host_addresses: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointModel {
    pub url: String,
    #[serde(default)]
    pub security_mode: SecurityMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_policy: Option<String>,
}

/// One endpoint description returned by the application-layer client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredEndpoint {
    pub application: ApplicationInfo,
    pub endpoint: EndpointModel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationModel {
    pub application: ApplicationInfo,
    pub endpoints: Vec<EndpointModel>,
}

impl ApplicationInfo {
    fn absorb(&mut self, other: ApplicationInfo) {
        if self.application_name.is_none() {
            self.application_name = other.application_name;
        }
        if self.product_uri.is_none() {
            self.product_uri = other.product_uri;
        }
        self.discovery_urls.extend(other.discovery_urls);
        self.host_addresses.extend(other.host_addresses);
    }
}

impl ApplicationModel {
    /// Groups endpoint descriptions by application URI.
    ///
    /// Discovery URLs and host addresses are unioned, duplicate endpoints are folded.
    /// The output is ordered by application URI, endpoints by URL.
    pub fn merge(found: impl IntoIterator<Item = DiscoveredEndpoint>) -> Vec<ApplicationModel> {
        let mut by_uri: BTreeMap<String, (ApplicationInfo, BTreeSet<EndpointModel>)> =
            BTreeMap::new();

        for DiscoveredEndpoint {
            application,
            endpoint,
        } in found
        {
            match by_uri.get_mut(&application.application_uri) {
                Some((info, endpoints)) => {
                    info.absorb(application);
                    endpoints.insert(endpoint);
                }
                None => {
                    by_uri.insert(
                        application.application_uri.clone(),
                        (application, BTreeSet::from([endpoint])),
                    );
                }
            }
        }

        by_uri
            .into_values()
            .map(|(application, endpoints)| ApplicationModel {
                application,
                endpoints: endpoints.into_iter().collect(),
            })
            .collect()
    }

    /// Number of (application, endpoint) pairs across `apps`.
    pub fn endpoint_count(apps: &[ApplicationModel]) -> usize {
        apps.iter().map(|app| app.endpoints.len()).sum()
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
