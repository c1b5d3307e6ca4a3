use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::usage::UsageRecord;

/// Static identity stamps the collector applies to every record it emits.
///
/// Kept as plain data handed to record constructors so the records stay
/// free of ambient process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Site name reported as SiteName
    pub site_name: String,

    /// Reporting-client tag for CloudType; this crate's client id unless
    /// overridden
    #[serde(default = "crate::client_id")]
    pub cloud_type: String,

    /// Compute service reported as CloudComputeService
    #[serde(default)]
    pub compute_service: Option<String>,

    /// Benchmark type stamped into usage records when the site publishes
    /// one
    #[serde(default)]
    pub benchmark_type: Option<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            site_name: String::new(),
            cloud_type: crate::client_id(),
            compute_service: None,
            benchmark_type: None,
        }
    }
}

impl CollectorConfig {
    /// Reads the collector configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        log::debug!("reading collector config from {}", path.as_ref().display());
        let config = serde_json::from_slice(&std::fs::read(path)?)?;
        Ok(config)
    }

    /// Starts a usage record carrying this collector's identity stamps.
    pub fn usage_record(
        &self,
        uuid: impl Into<String>,
        name: &str,
        user_id: impl Into<String>,
        group_id: impl Into<String>,
        fqan: impl Into<String>,
    ) -> UsageRecord {
        let mut record =
            UsageRecord::new(uuid, self.site_name.as_str(), name, user_id, group_id, fqan);
        record.cloud_type = self.cloud_type.clone();
        record.compute_service = self.compute_service.clone();
        record.benchmark_type = self.benchmark_type.clone();
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionedRecord;

    #[test]
    fn test_cloud_type_defaults_to_client_id() {
        let config: CollectorConfig = serde_json::from_str(r#"{"site_name": "SiteA"}"#).unwrap();
        assert_eq!(config.site_name, "SiteA");
        assert_eq!(config.cloud_type, crate::client_id());
        assert_eq!(config.compute_service, None);
    }

    #[test]
    fn test_records_carry_config_stamps() {
        let config = CollectorConfig {
            site_name: "SiteA".to_string(),
            cloud_type: "acme-collector/9.9".to_string(),
            compute_service: Some("cloud.acme.example".to_string()),
            benchmark_type: None,
        };
        let d = config
            .usage_record("vm-1", "name-foo", "u1", "g1", "/VO/foo")
            .as_dict(None)
            .unwrap();
        assert_eq!(d["SiteName"], "SiteA");
        assert_eq!(d["CloudType"], "acme-collector/9.9");
        assert_eq!(d["CloudComputeService"], "cloud.acme.example");
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join("usage-records-config-test.json");
        std::fs::write(&path, r#"{"site_name": "SiteB", "cloud_type": "x/1"}"#).unwrap();
        let config = CollectorConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.site_name, "SiteB");
        assert_eq!(config.cloud_type, "x/1");
    }
}
