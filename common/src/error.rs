use thiserror::Error;

/// Failures that abort a discovery run before any probe is sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The subnet (or the configuration around it) is malformed or not allowed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The subnet holds more addresses than one run may probe.
    #[error("range too large: {cidr} holds {requested} addresses, the limit is {limit}")]
    RangeTooLarge {
        cidr: String,
        requested: u64,
        limit: usize,
    },
}

impl DiscoveryError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
