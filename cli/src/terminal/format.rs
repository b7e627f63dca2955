use colored::*;
use uascout_common::models::application::{ApplicationModel, ApplicationType, EndpointModel, SecurityMode};

use crate::terminal::colors;

pub type Detail = (String, ColoredString);

pub fn application_type_str(kind: ApplicationType) -> &'static str {
    match kind {
        ApplicationType::Server => "Server",
        ApplicationType::Client => "Client",
        ApplicationType::ClientAndServer => "Client and server",
        ApplicationType::DiscoveryServer => "Discovery server",
    }
}

pub fn security_to_colored(mode: SecurityMode) -> ColoredString {
    match mode {
        SecurityMode::None => "None".color(colors::INSECURE),
        SecurityMode::Sign => "Sign".color(colors::SECURE),
        SecurityMode::SignAndEncrypt => "SignAndEncrypt".color(colors::SECURE).bold(),
    }
}

pub fn endpoint_to_detail(endpoint: &EndpointModel) -> Detail {
    let policy: &str = endpoint
        .security_policy
        .as_deref()
        .and_then(|uri| uri.rsplit('#').next())
        .unwrap_or("-");
    let value: ColoredString = format!(
        "{} {} {}",
        endpoint.url.color(colors::URL),
        security_to_colored(endpoint.security_mode),
        policy.color(colors::SEPARATOR)
    )
    .normal();
    (String::from("Endpnt"), value)
}

pub fn application_to_details(app: &ApplicationModel) -> Vec<Detail> {
    let info = &app.application;
    let mut details: Vec<Detail> = vec![(
        String::from("Type"),
        application_type_str(info.application_type).normal(),
    )];

    if let Some(product) = &info.product_uri {
        details.push((String::from("Product"), product.normal()));
    }

    if !info.host_addresses.is_empty() {
        let hosts: String = info
            .host_addresses
            .iter()
            .map(String::as_str)
            .collect::<Vec<&str>>()
            .join(", ");
        details.push((String::from("Hosts"), hosts.color(colors::IPV4_ADDR)));
    }

    details.extend(app.endpoints.iter().map(endpoint_to_detail));
    details
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
