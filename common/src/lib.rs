//! # netinv common
//!
//! Types shared by every netinv crate: the discovery configuration, the
//! error taxonomy of a scan, the host facts produced by probing and the
//! subnet arithmetic used to build a scan.

pub mod config;
pub mod error;
pub mod log;
pub mod network;

#[doc(hidden)]
pub use tracing;
