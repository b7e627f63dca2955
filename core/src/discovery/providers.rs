//! Collaborators used when nothing more specific is wired in.

use std::collections::BTreeSet;

use anyhow::anyhow;
use async_trait::async_trait;
use uascout_common::models::application::{
    ApplicationInfo, ApplicationType, DiscoveredEndpoint, EndpointModel, SecurityMode,
};
use uascout_common::models::options::NetworkClass;
use uascout_common::network::interface::{NetInterface, get_net_interfaces};
use uascout_common::utils::cancel::CancelToken;

use super::{DiscoveryClient, InterfaceSource};

/// Interfaces of this machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self, class: NetworkClass) -> Vec<NetInterface> {
        get_net_interfaces(class)
    }
}

/// Reports each verified endpoint as its own application, named after its url.
///
/// Stands in for a full OPC UA client: the hello handshake already confirmed the server,
/// but nothing about its identity is known.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProbeOnlyClient;

#[async_trait]
impl DiscoveryClient for ProbeOnlyClient {
    async fn discover(&self, url: &str, _cancel: CancelToken) -> anyhow::Result<Vec<DiscoveredEndpoint>> {
        let (host, _port) = url
            .strip_prefix("opc.tcp://")
            .and_then(|authority| authority.rsplit_once(':'))
            .ok_or_else(|| anyhow!("not an opc.tcp url: {url}"))?;

        Ok(vec![DiscoveredEndpoint {
            application: ApplicationInfo {
                application_uri: url.to_string(),
                application_name: Some(url.to_string()),
                product_uri: None,
                application_type: ApplicationType::Server,
                discovery_urls: BTreeSet::from([url.to_string()]),
                host_addresses: BTreeSet::from([host.to_string()]),
            },
            endpoint: EndpointModel {
                url: url.to_string(),
                security_mode: SecurityMode::None,
                security_policy: None,
            },
        }])
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
