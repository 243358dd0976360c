use colored::*;
use netinv_common::network::host::{HostFact, OpenService};

use crate::terminal::colors;

pub type Detail = (String, ColoredString);

pub fn host_to_details(host: &HostFact) -> Vec<Detail> {
    let mut details: Vec<Detail> = vec![(
        String::from("IPv4"),
        host.address.to_string().color(colors::IPV4_ADDR),
    )];

    if let Some(mac) = host.mac_identifier() {
        details.push((String::from("MAC"), mac.color(colors::MAC_ADDR)));
    }

    if let Some(vendor) = &host.vendor {
        details.push((String::from("Vendor"), vendor.as_str().normal()));
    }

    if !host.open_services.is_empty() {
        details.push((String::from("Services"), services_value(&host.open_services)));
    }

    details
}

pub fn services_value(services: &[OpenService]) -> ColoredString {
    services
        .iter()
        .map(|svc| format!("{}/{}", svc.service_name, svc.port))
        .collect::<Vec<String>>()
        .join(", ")
        .color(colors::SERVICE)
}

pub fn edges_value(edges: &[(String, u16)]) -> ColoredString {
    edges
        .iter()
        .map(|(name, port)| format!("{name}/{port}"))
        .collect::<Vec<String>>()
        .join(", ")
        .color(colors::SERVICE)
}
