pub mod accelerator;
pub mod config;
pub mod errors;
pub mod network;
pub mod usage;
pub(crate) mod validate;
pub mod version;

// Re-export key types
pub use accelerator::AcceleratorRecord;
pub use config::CollectorConfig;
pub use errors::RecordError;
pub use network::{IpVersion, NetworkIdentityRecord};
pub use usage::UsageRecord;
pub use version::VersionedRecord;

/// Client identifier stamped into the CloudType field of outgoing records
/// unless the collector configuration overrides it.
pub fn client_id() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
