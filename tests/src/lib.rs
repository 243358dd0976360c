//! End-to-end scenarios for the discovery and reconciliation engine.

#[cfg(test)]
mod discovery;
#[cfg(test)]
mod support;
