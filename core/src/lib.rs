//! Discovery and reconciliation engine behind the `netinv` CLI.
//!
//! - [`scanner`] fans probes from [`probe`] over a subnet.
//! - [`reconcile`] merges the resulting host facts into an [`inventory`] store.
//! - [`discovery`] ties both together for the interactive command, and
//!   [`job`] runs the same service in the background.

pub mod discovery;
pub mod inventory;
pub mod job;
pub mod probe;
pub mod reconcile;
pub mod scanner;
pub mod vendors;
