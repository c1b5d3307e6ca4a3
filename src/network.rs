use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::version::{epoch_seconds, VersionedRecord};

const V02_FIELDS: &[&str] = &[
    "MeasurementTime",
    "SiteName",
    "CloudComputeService",
    "CloudType",
    "LocalUser",
    "LocalGroup",
    "GlobalUserName",
    "FQAN",
    "IPVersion",
    "IPCount",
];

/// IP protocol version of the addresses being counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    fn wire_value(self) -> u64 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }
}

/// Point-in-time snapshot of public IP address usage for a user and
/// project. Built fully at construction and serialized as-is; there are
/// no derived fields.
#[derive(Debug, Clone)]
pub struct NetworkIdentityRecord {
    measure_time: Option<DateTime<Utc>>,
    pub site: String,
    pub cloud_type: String,
    pub user_id: String,
    pub group_id: String,
    pub user_dn: Option<String>,
    pub fqan: String,
    pub ip_version: IpVersion,
    pub public_ip_count: u32,
    pub compute_service: Option<String>,
}

impl NetworkIdentityRecord {
    pub fn new(
        measure_time: Option<DateTime<Utc>>,
        site: impl Into<String>,
        user_id: impl Into<String>,
        group_id: impl Into<String>,
        fqan: impl Into<String>,
        ip_version: IpVersion,
        public_ip_count: u32,
    ) -> Self {
        Self {
            measure_time,
            site: site.into(),
            cloud_type: crate::client_id(),
            user_id: user_id.into(),
            group_id: group_id.into(),
            user_dn: None,
            fqan: fqan.into(),
            ip_version,
            public_ip_count,
            compute_service: None,
        }
    }

    pub fn with_user_dn(mut self, user_dn: impl Into<String>) -> Self {
        self.user_dn = Some(user_dn.into());
        self
    }

    pub fn with_cloud_type(mut self, cloud_type: impl Into<String>) -> Self {
        self.cloud_type = cloud_type.into();
        self
    }

    pub fn with_compute_service(mut self, service: impl Into<String>) -> Self {
        self.compute_service = Some(service.into());
        self
    }

    pub fn measure_time(&self) -> Option<DateTime<Utc>> {
        self.measure_time
    }
}

impl VersionedRecord for NetworkIdentityRecord {
    const DEFAULT_VERSION: &'static str = "0.2";

    fn field_names(version: &str) -> Option<&'static [&'static str]> {
        match version {
            "0.2" => Some(V02_FIELDS),
            _ => None,
        }
    }

    fn full_map(&self) -> Map<String, Value> {
        let map = json!({
            "MeasurementTime": epoch_seconds(self.measure_time),
            "SiteName": &self.site,
            "CloudComputeService": &self.compute_service,
            "CloudType": &self.cloud_type,
            "LocalUser": &self.user_id,
            "LocalGroup": &self.group_id,
            "GlobalUserName": &self.user_dn,
            "FQAN": &self.fqan,
            "IPVersion": self.ip_version.wire_value(),
            "IPCount": self.public_ip_count,
        });
        match map {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }
}
