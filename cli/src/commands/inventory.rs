use colored::*;
use netinv_core::inventory::SqliteInventory;

use crate::mprint;
use crate::terminal::format::{self, Detail};
use crate::terminal::{colors, print};

pub fn inventory(store: &SqliteInventory) -> anyhow::Result<()> {
    let devices = store.devices()?;
    if devices.is_empty() {
        print::print_status("The inventory is empty, run `netinv discover` first");
        return Ok(());
    }

    for (idx, device) in devices.iter().enumerate() {
        let mut details: Vec<Detail> = vec![(
            String::from("ID"),
            device.identifier.as_str().color(colors::MAC_ADDR),
        )];
        if let Some(model) = &device.model {
            details.push((String::from("Model"), model.as_str().normal()));
        }
        if let Some(location) = store.location(device.location_id)? {
            details.push((String::from("Location"), location.name.normal()));
        }
        for address in store.addresses_for_device(device.id)? {
            let services = store.services_for_address(&address)?;
            details.push((String::from("IPv4"), address.color(colors::IPV4_ADDR)));
            if !services.is_empty() {
                details.push((String::from("Services"), format::edges_value(&services)));
            }
        }
        print::tree(idx, &device.name, &details);

        if idx + 1 != devices.len() {
            mprint!();
        }
    }

    let counts = store.counts()?;
    print::fat_separator();
    print::centerln(&format!(
        "{} devices, {} addresses, {} services, {} audit entries",
        counts.devices, counts.ip_addresses, counts.services, counts.audit_entries
    ));
    Ok(())
}
