//! # Network Models
//!
//! * [`host`]: the facts a probe learns about one address.
//! * [`mac`]: hardware address helpers.
//! * [`range`]: contiguous IPv4 ranges.
//! * [`subnet`]: CIDR expansion with the scan safety limits applied.

pub mod host;
pub mod mac;
pub mod range;
pub mod subnet;
