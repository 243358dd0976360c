use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};

use colored::*;
use indicatif::ProgressStyle;
use netinv_common::network::host::HostFact;
use netinv_common::success;
use netinv_core::probe::ProbeError;
use netinv_core::scanner::ScanObserver;
use tracing::Span;
use tracing_indicatif::IndicatifLayer;
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::terminal::colors;
use crate::terminal::logging::{InventoryFormatter, LogMode};

const TICK_STRINGS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
];

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_logging(mode: LogMode) -> anyhow::Result<()> {
    match mode {
        LogMode::Interactive => {
            let indicatif_layer = IndicatifLayer::new().with_progress_style(spinner_style());
            tracing_subscriber::registry()
                .with(env_filter())
                .with(
                    fmt::layer()
                        .event_format(InventoryFormatter)
                        .with_writer(indicatif_layer.get_stderr_writer()),
                )
                .with(indicatif_layer)
                .try_init()?;
        }
        LogMode::Json => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer().json().flatten_event(true).with_current_span(false))
                .try_init()?;
        }
    }
    Ok(())
}

pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICK_STRINGS)
}

/// Mirrors scan progress onto the span's spinner and prints a line per host
/// that answered.
pub struct SpinnerObserver {
    span: Span,
    total: AtomicUsize,
    probed: AtomicUsize,
    found: AtomicUsize,
}

impl SpinnerObserver {
    pub fn new(span: Span) -> Self {
        Self {
            span,
            total: AtomicUsize::new(0),
            probed: AtomicUsize::new(0),
            found: AtomicUsize::new(0),
        }
    }

    fn refresh(&self) {
        let probed = self.probed.load(Ordering::Relaxed);
        let total = self.total.load(Ordering::Relaxed);
        let found = self.found.load(Ordering::Relaxed);
        let msg = format!(
            "Probed {probed}/{total} addresses, identified {} so far...",
            format!("{found} hosts").green().bold()
        )
        .color(colors::TEXT_DEFAULT)
        .to_string();
        self.span.pb_set_message(&msg);
    }
}

impl ScanObserver for SpinnerObserver {
    fn scan_started(&self, _subnet: &str, addresses: usize) {
        self.total.store(addresses, Ordering::Relaxed);
        self.refresh();
    }

    fn probe_finished(&self, address: Ipv4Addr, fact: Option<&HostFact>) {
        self.probed.fetch_add(1, Ordering::Relaxed);
        if let Some(fact) = fact {
            self.found.fetch_add(1, Ordering::Relaxed);
            let name = fact.hostname.as_deref().unwrap_or("no hostname");
            success!("{} is up ({})", address.to_string().color(colors::IPV4_ADDR), name);
        }
        self.refresh();
    }

    fn probe_dropped(&self, _address: Ipv4Addr, _error: &ProbeError) {
        self.probed.fetch_add(1, Ordering::Relaxed);
        self.refresh();
    }
}
