use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::*;
use netinv_common::network::host::HostFact;
use netinv_common::success;
use netinv_core::discovery::{DiscoveryService, RunReport, ScanRequest};
use netinv_core::inventory::InventoryStore;
use tracing::{Instrument, info_span};

use crate::mprint;
use crate::terminal::spinner::SpinnerObserver;
use crate::terminal::{colors, format, print};

pub async fn discover<S: InventoryStore + 'static>(
    service: &DiscoveryService<S>,
    request: ScanRequest,
) -> anyhow::Result<()> {
    let span = info_span!("discovery", indicatif.pb_show = true);
    let observer = Arc::new(SpinnerObserver::new(span.clone()));

    let start_time: Instant = Instant::now();
    let mut report: RunReport = service
        .perform_discovery(&request, observer)
        .instrument(span)
        .await?;

    discovery_ends(&mut report, start_time.elapsed());
    Ok(())
}

fn discovery_ends(report: &mut RunReport, total_time: Duration) {
    if report.hosts.is_empty() {
        print::header("zero hosts detected");
        print::no_results();
    } else {
        print::header("network discovery");
        report.hosts.sort_by_key(|host| host.address);
        print_hosts(&report.hosts);
    }
    print_summary(report, total_time);
}

fn print_hosts(hosts: &[HostFact]) {
    for (idx, host) in hosts.iter().enumerate() {
        let hostname = host.hostname.as_deref().unwrap_or("No hostname");
        print::tree(idx, hostname, &format::host_to_details(host));
        if idx + 1 != hosts.len() {
            mprint!();
        }
    }
}

fn print_summary(report: &RunReport, total_time: Duration) {
    let stats = report.stats;
    let mode = if report.dry_run { "dry run" } else { "live" };

    print::header("reconciliation");
    let rows: [(&str, String); 8] = [
        ("Subnet", report.subnet.clone()),
        ("Mode", mode.to_string()),
        ("Hosts", stats.total_hosts.to_string()),
        ("New devices", stats.new_devices.to_string()),
        ("Updated devices", stats.updated_devices.to_string()),
        ("New services", stats.new_services.to_string()),
        ("Failed hosts", stats.failed_hosts.to_string()),
        ("Elapsed", format!("{:.2}s", total_time.as_secs_f64())),
    ];
    print::key_value_rows(&rows);

    let active_hosts: ColoredString = format!("{} active hosts", report.hosts.len()).bold().green();
    let elapsed: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: ColoredString =
        format!("Discovery Complete: {active_hosts} identified in {elapsed}").color(colors::TEXT_DEFAULT);

    print::fat_separator();
    print::centerln(&output.to_string());
    if report.dry_run {
        success!("dry run finished, inventory left untouched");
    }
}
