use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::errors::RecordError;
use crate::validate::{duration_from_value, timestamp_from_value};
use crate::version::{epoch_seconds, VersionedRecord};

// Version 0.2: initial schema
const V02_FIELDS: &[&str] = &[
    "VMUUID",
    "SiteName",
    "MachineName",
    "LocalUserId",
    "LocalGroupId",
    "GlobalUserName",
    "FQAN",
    "Status",
    "StartTime",
    "EndTime",
    "SuspendDuration",
    "WallDuration",
    "CpuDuration",
    "CpuCount",
    "NetworkType",
    "NetworkInbound",
    "NetworkOutbound",
    "Memory",
    "Disk",
    "StorageRecordId",
    "ImageId",
    "CloudType",
];

// Version 0.4: adds the compute service, benchmark and public IP fields
const V04_FIELDS: &[&str] = &[
    "VMUUID",
    "SiteName",
    "MachineName",
    "LocalUserId",
    "LocalGroupId",
    "GlobalUserName",
    "FQAN",
    "Status",
    "StartTime",
    "EndTime",
    "SuspendDuration",
    "WallDuration",
    "CpuDuration",
    "CpuCount",
    "NetworkType",
    "NetworkInbound",
    "NetworkOutbound",
    "Memory",
    "Disk",
    "StorageRecordId",
    "ImageId",
    "CloudType",
    "CloudComputeService",
    "BenchmarkType",
    "Benchmark",
    "PublicIPCount",
];

/// Accounting record for a single virtual machine's usage window.
///
/// Versioned following the cloud accounting record schema. Identifying
/// fields are set at construction; measurements arrive afterwards, either
/// typed through the `with_*` chainers or raw through the `set_*` setters,
/// which validate at the point of assignment.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    /// Identifier of the VM this record accounts for
    pub uuid: String,

    /// Site reporting the usage
    pub site: String,

    // Stored 7-bit clean; mutate through set_name.
    name: String,

    pub user_id: String,

    pub group_id: String,

    /// Global identity (certificate DN) of the owner, when known
    pub user_dn: Option<String>,

    pub fqan: String,

    /// Lifecycle status, e.g. "started", "completed" or "error"
    pub status: Option<String>,

    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    suspend_duration: Option<u64>,
    wall_duration: Option<u64>,
    cpu_duration: Option<u64>,

    pub cpu_count: Option<u32>,

    pub network_type: Option<String>,

    /// Inbound/outbound network volume over the usage window
    pub network_in: Option<f64>,
    pub network_out: Option<f64>,

    pub memory: Option<u64>,
    pub disk: Option<u64>,

    pub image_id: Option<String>,
    pub storage_record_id: Option<String>,

    /// Tag identifying the reporting client software
    pub cloud_type: String,

    pub compute_service: Option<String>,
    pub benchmark_value: Option<f64>,
    pub benchmark_type: Option<String>,
    pub public_ip_count: Option<u32>,
}

impl UsageRecord {
    /// Creates a record with the mandatory identifying fields. The machine
    /// name is normalized to its ASCII subset; everything else starts
    /// unset.
    pub fn new(
        uuid: impl Into<String>,
        site: impl Into<String>,
        name: &str,
        user_id: impl Into<String>,
        group_id: impl Into<String>,
        fqan: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            site: site.into(),
            name: normalize_name(name),
            user_id: user_id.into(),
            group_id: group_id.into(),
            user_dn: None,
            fqan: fqan.into(),
            status: None,
            start_time: None,
            end_time: None,
            suspend_duration: None,
            wall_duration: None,
            cpu_duration: None,
            cpu_count: None,
            network_type: None,
            network_in: None,
            network_out: None,
            memory: None,
            disk: None,
            image_id: None,
            storage_record_id: None,
            cloud_type: crate::client_id(),
            compute_service: None,
            benchmark_value: None,
            benchmark_type: None,
            public_ip_count: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_user_dn(mut self, user_dn: impl Into<String>) -> Self {
        self.user_dn = Some(user_dn.into());
        self
    }

    pub fn with_start_time(mut self, time: DateTime<Utc>) -> Self {
        self.start_time = Some(time);
        self
    }

    pub fn with_end_time(mut self, time: DateTime<Utc>) -> Self {
        self.end_time = Some(time);
        self
    }

    pub fn with_wall_duration(mut self, seconds: u64) -> Self {
        self.wall_duration = Some(seconds);
        self
    }

    pub fn with_cpu_duration(mut self, seconds: u64) -> Self {
        self.cpu_duration = Some(seconds);
        self
    }

    pub fn with_suspend_duration(mut self, seconds: u64) -> Self {
        self.suspend_duration = Some(seconds);
        self
    }

    pub fn with_cpu_count(mut self, count: u32) -> Self {
        self.cpu_count = Some(count);
        self
    }

    pub fn with_cloud_type(mut self, cloud_type: impl Into<String>) -> Self {
        self.cloud_type = cloud_type.into();
        self
    }

    pub fn with_image_id(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn with_compute_service(mut self, service: impl Into<String>) -> Self {
        self.compute_service = Some(service.into());
        self
    }

    /// Machine name, always 7-bit clean.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the machine name, dropping characters the accounting wire
    /// format cannot represent.
    pub fn set_name(&mut self, name: &str) {
        self.name = normalize_name(name);
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Assigns the start time from a raw API value: null or an RFC 3339
    /// string. Anything else fails and leaves the field untouched.
    pub fn set_start_time(&mut self, value: &Value) -> Result<(), RecordError> {
        self.start_time = timestamp_from_value("StartTime", value)?;
        Ok(())
    }

    /// Assigns the end time from a raw API value, same rules as
    /// [`set_start_time`](Self::set_start_time).
    pub fn set_end_time(&mut self, value: &Value) -> Result<(), RecordError> {
        self.end_time = timestamp_from_value("EndTime", value)?;
        Ok(())
    }

    /// Assigns an explicit wall-clock duration from a raw API value.
    /// An explicit value, zero included, takes precedence over the
    /// derived start/end difference.
    pub fn set_wall_duration(&mut self, value: &Value) -> Result<(), RecordError> {
        self.wall_duration = duration_from_value("WallDuration", value)?;
        Ok(())
    }

    /// Assigns an explicit CPU-time duration from a raw API value.
    /// An explicit value, zero included, takes precedence over the
    /// derived wall x cpu_count product.
    pub fn set_cpu_duration(&mut self, value: &Value) -> Result<(), RecordError> {
        self.cpu_duration = duration_from_value("CpuDuration", value)?;
        Ok(())
    }

    pub fn set_suspend_duration(&mut self, value: &Value) -> Result<(), RecordError> {
        self.suspend_duration = duration_from_value("SuspendDuration", value)?;
        Ok(())
    }

    pub fn suspend_duration(&self) -> Option<u64> {
        self.suspend_duration
    }

    /// Wall-clock seconds for the usage window: the explicit value when
    /// one was assigned, otherwise end minus start when both timestamps
    /// are known.
    pub fn wall_duration(&self) -> Option<i64> {
        match self.wall_duration {
            Some(explicit) => Some(explicit as i64),
            None => match (self.start_time, self.end_time) {
                (Some(start), Some(end)) => Some((end - start).num_seconds()),
                _ => None,
            },
        }
    }

    /// CPU seconds for the usage window: the explicit value when one was
    /// assigned, otherwise wall duration times the CPU count when the
    /// count is known and nonzero.
    pub fn cpu_duration(&self) -> Option<i64> {
        if let Some(explicit) = self.cpu_duration {
            return Some(explicit as i64);
        }
        match (self.wall_duration(), self.cpu_count) {
            (Some(wall), Some(count)) if count > 0 => Some(wall * count as i64),
            _ => None,
        }
    }
}

impl VersionedRecord for UsageRecord {
    const DEFAULT_VERSION: &'static str = "0.4";

    fn field_names(version: &str) -> Option<&'static [&'static str]> {
        match version {
            "0.2" => Some(V02_FIELDS),
            "0.4" => Some(V04_FIELDS),
            _ => None,
        }
    }

    fn full_map(&self) -> Map<String, Value> {
        let map = json!({
            "VMUUID": &self.uuid,
            "SiteName": &self.site,
            "MachineName": &self.name,
            "LocalUserId": &self.user_id,
            "LocalGroupId": &self.group_id,
            "GlobalUserName": &self.user_dn,
            "FQAN": &self.fqan,
            "Status": &self.status,
            "StartTime": epoch_seconds(self.start_time),
            "EndTime": epoch_seconds(self.end_time),
            "SuspendDuration": self.suspend_duration,
            "WallDuration": self.wall_duration(),
            "CpuDuration": self.cpu_duration(),
            "CpuCount": self.cpu_count,
            "NetworkType": &self.network_type,
            "NetworkInbound": self.network_in,
            "NetworkOutbound": self.network_out,
            "Memory": self.memory,
            "Disk": self.disk,
            "StorageRecordId": &self.storage_record_id,
            "ImageId": &self.image_id,
            "CloudType": &self.cloud_type,
            "CloudComputeService": &self.compute_service,
            "BenchmarkType": &self.benchmark_type,
            "Benchmark": self.benchmark_value,
            "PublicIPCount": self.public_ip_count,
        });
        match map {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }
}

/// Drops everything outside the 7-bit range; the accounting wire format
/// only carries ASCII machine names, and a lossy name is preferred over a
/// rejected record.
fn normalize_name(name: &str) -> String {
    let clean: String = name.chars().filter(|c| c.is_ascii()).collect();
    if clean.len() != name.len() {
        log::debug!(
            "dropped {} non-ascii bytes from machine name {:?}",
            name.len() - clean.len(),
            name
        );
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> UsageRecord {
        UsageRecord::new("vm-1", "SiteA", "name-foo", "u1", "g1", "/VO/foo")
    }

    #[test]
    fn test_default_version_field_set() {
        let d = sample().as_dict(None).unwrap();
        assert_eq!(d.len(), V04_FIELDS.len());
        for field in V04_FIELDS {
            assert!(d.contains_key(*field), "missing {field}");
        }
    }

    #[test]
    fn test_v02_is_strict_subset_of_v04() {
        let r = sample();
        let d_02 = r.as_dict(Some("0.2")).unwrap();
        let d_04 = r.as_dict(Some("0.4")).unwrap();
        assert!(d_02.len() < d_04.len());
        for key in d_02.keys() {
            assert!(d_04.contains_key(key));
        }
        for dropped in ["CloudComputeService", "BenchmarkType", "Benchmark", "PublicIPCount"] {
            assert!(!d_02.contains_key(dropped));
            assert!(d_04.contains_key(dropped));
        }
    }

    #[test]
    fn test_unknown_version() {
        let r = sample();
        assert!(matches!(
            r.as_dict(Some("0.0")),
            Err(RecordError::UnknownSchemaVersion(_))
        ));
        assert!(matches!(
            r.as_json(Some("0.0")),
            Err(RecordError::UnknownSchemaVersion(_))
        ));
    }

    #[test]
    fn test_wall_duration_derived_from_timestamps() {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2021, 1, 1, 1, 0, 0).unwrap();
        let r = sample().with_start_time(start).with_end_time(end);
        assert_eq!(r.wall_duration(), Some(3600));

        // Explicit value wins over the timestamps.
        let r = r.with_wall_duration(60);
        assert_eq!(r.wall_duration(), Some(60));
    }

    #[test]
    fn test_wall_duration_undefined_without_both_timestamps() {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(sample().wall_duration(), None);
        assert_eq!(sample().with_start_time(start).wall_duration(), None);
    }

    #[test]
    fn test_cpu_duration_derived_from_wall_and_count() {
        let r = sample().with_wall_duration(3600).with_cpu_count(2);
        assert_eq!(r.cpu_duration(), Some(7200));

        let r = r.with_cpu_duration(100);
        assert_eq!(r.cpu_duration(), Some(100));
    }

    #[test]
    fn test_cpu_duration_undefined_for_zero_count() {
        let r = sample().with_wall_duration(3600).with_cpu_count(0);
        assert_eq!(r.cpu_duration(), None);
        assert_eq!(sample().with_wall_duration(3600).cpu_duration(), None);
    }

    #[test]
    fn test_explicit_zero_durations_are_preserved() {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2021, 1, 1, 1, 0, 0).unwrap();
        let mut r = sample()
            .with_start_time(start)
            .with_end_time(end)
            .with_cpu_count(2);
        r.set_wall_duration(&serde_json::json!(0)).unwrap();

        // Zero is a set value: it suppresses derivation from the
        // timestamps and flows into the CPU derivation.
        assert_eq!(r.wall_duration(), Some(0));
        assert_eq!(r.cpu_duration(), Some(0));
        let d = r.as_dict(None).unwrap();
        assert_eq!(d["WallDuration"], 0);
    }

    #[test]
    fn test_invalid_duration_values_are_rejected() {
        let mut r = sample().with_wall_duration(10);
        assert!(matches!(
            r.set_wall_duration(&serde_json::json!("ten")),
            Err(RecordError::InvalidValue { field: "WallDuration", .. })
        ));
        assert!(r.set_cpu_duration(&serde_json::json!([1])).is_err());
        assert!(r.set_suspend_duration(&serde_json::json!(-1)).is_err());
        // The previous value stays in place after a failed assignment.
        assert_eq!(r.wall_duration(), Some(10));
    }

    #[test]
    fn test_invalid_timestamp_values_are_rejected() {
        let mut r = sample();
        assert!(matches!(
            r.set_start_time(&serde_json::json!(1609459200)),
            Err(RecordError::InvalidValue { field: "StartTime", .. })
        ));
        assert!(r.set_end_time(&serde_json::json!("not-a-date")).is_err());
        assert_eq!(r.start_time(), None);

        r.set_start_time(&serde_json::json!("2021-01-01T00:00:00Z")).unwrap();
        assert_eq!(r.start_time().unwrap().timestamp(), 1609459200);
    }

    #[test]
    fn test_name_is_stripped_to_ascii() {
        let r = UsageRecord::new("vm-1", "SiteA", "BujamyWObłokach", "u1", "g1", "/VO/foo");
        assert_eq!(r.name(), "BujamyWObokach");

        let mut r = r;
        r.set_name("café-42");
        assert_eq!(r.name(), "caf-42");
    }

    #[test]
    fn test_timestamps_emitted_as_epoch_seconds() {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let r = sample().with_start_time(start);
        let d = r.as_dict(None).unwrap();
        assert_eq!(d["StartTime"], 1609459200);
        assert_eq!(d["EndTime"], Value::Null);
    }

    #[test]
    fn test_mutation_is_reflected_on_next_read() {
        let mut r = sample().with_cpu_count(2);
        r.set_wall_duration(&serde_json::json!(100)).unwrap();
        assert_eq!(r.as_dict(None).unwrap()["CpuDuration"], 200);
        r.set_wall_duration(&serde_json::json!(200)).unwrap();
        assert_eq!(r.as_dict(None).unwrap()["CpuDuration"], 400);
    }
}
