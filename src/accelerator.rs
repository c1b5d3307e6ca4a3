use serde_json::{json, Map, Value};

use crate::errors::RecordError;
use crate::version::VersionedRecord;

const V01_FIELDS: &[&str] = &[
    "MeasurementMonth",
    "MeasurementYear",
    "AssociatedRecordType",
    "AssociatedRecord",
    "GlobalUserName",
    "FQAN",
    "SiteName",
    "Count",
    "Cores",
    "ActiveDuration",
    "AvailableDuration",
    "BenchmarkType",
    "Benchmark",
    "Type",
    "Model",
];

/// Aggregated accelerator (GPU) usage for one billing month, tied to
/// another record by its plain identifier.
#[derive(Debug, Clone)]
pub struct AcceleratorRecord {
    pub measurement_month: u32,
    pub measurement_year: i32,

    /// Kind of record the identifier below points at, "cloud" by default
    pub associated_record_type: String,

    /// Foreign identifier of the associated record, e.g. a VM uuid
    pub uuid: String,

    pub user_dn: Option<String>,
    pub fqan: String,
    pub site: String,

    /// Number of accelerator devices attached
    pub count: u32,

    pub cores: Option<u32>,

    // Seconds the devices were actively used; falls back to
    // available_duration when never set.
    active_duration: Option<u64>,

    /// Seconds the devices were provisioned for the month
    pub available_duration: u64,

    pub benchmark_type: Option<String>,
    pub benchmark: Option<f64>,

    /// Accelerator category, e.g. "GPU"
    pub accelerator_type: String,

    pub model: Option<String>,
}

impl AcceleratorRecord {
    /// Creates a record for one billing month. Months outside 1..=12 are
    /// rejected eagerly.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uuid: impl Into<String>,
        fqan: impl Into<String>,
        site: impl Into<String>,
        count: u32,
        available_duration: u64,
        accelerator_type: impl Into<String>,
        measurement_month: u32,
        measurement_year: i32,
    ) -> Result<Self, RecordError> {
        if !(1..=12).contains(&measurement_month) {
            return Err(RecordError::InvalidValue {
                field: "MeasurementMonth",
                reason: format!("month must be within 1..=12, got {measurement_month}"),
            });
        }
        Ok(Self {
            measurement_month,
            measurement_year,
            associated_record_type: "cloud".to_string(),
            uuid: uuid.into(),
            user_dn: None,
            fqan: fqan.into(),
            site: site.into(),
            count,
            cores: None,
            active_duration: None,
            available_duration,
            benchmark_type: None,
            benchmark: None,
            accelerator_type: accelerator_type.into(),
            model: None,
        })
    }

    pub fn with_associated_record_type(mut self, kind: impl Into<String>) -> Self {
        self.associated_record_type = kind.into();
        self
    }

    pub fn with_user_dn(mut self, user_dn: impl Into<String>) -> Self {
        self.user_dn = Some(user_dn.into());
        self
    }

    pub fn with_cores(mut self, cores: u32) -> Self {
        self.cores = Some(cores);
        self
    }

    pub fn with_active_duration(mut self, seconds: u64) -> Self {
        self.active_duration = Some(seconds);
        self
    }

    pub fn with_benchmark(mut self, benchmark_type: impl Into<String>, value: f64) -> Self {
        self.benchmark_type = Some(benchmark_type.into());
        self.benchmark = Some(value);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Seconds the devices were actively used. When no explicit value was
    /// ever assigned the devices are assumed fully utilized, so this
    /// reads as the available duration.
    pub fn active_duration(&self) -> u64 {
        self.active_duration.unwrap_or(self.available_duration)
    }

    /// Overrides the active duration; None clears the override so reads
    /// fall back to the available duration again.
    pub fn set_active_duration(&mut self, seconds: Option<u64>) {
        self.active_duration = seconds;
    }
}

impl VersionedRecord for AcceleratorRecord {
    const DEFAULT_VERSION: &'static str = "0.1";

    fn field_names(version: &str) -> Option<&'static [&'static str]> {
        match version {
            "0.1" => Some(V01_FIELDS),
            _ => None,
        }
    }

    fn full_map(&self) -> Map<String, Value> {
        let map = json!({
            "MeasurementMonth": self.measurement_month,
            "MeasurementYear": self.measurement_year,
            "AssociatedRecordType": &self.associated_record_type,
            "AssociatedRecord": &self.uuid,
            "GlobalUserName": &self.user_dn,
            "FQAN": &self.fqan,
            "SiteName": &self.site,
            "Count": self.count,
            "Cores": self.cores,
            "ActiveDuration": self.active_duration(),
            "AvailableDuration": self.available_duration,
            "BenchmarkType": &self.benchmark_type,
            "Benchmark": self.benchmark,
            "Type": &self.accelerator_type,
            "Model": &self.model,
        });
        match map {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AcceleratorRecord {
        AcceleratorRecord::new("vm-2", "/VO/foo", "SiteA", 2, 1000, "GPU", 6, 2021).unwrap()
    }

    #[test]
    fn test_exact_field_set() {
        let d = sample().as_dict(None).unwrap();
        assert_eq!(d.len(), V01_FIELDS.len());
        for field in V01_FIELDS {
            assert!(d.contains_key(*field), "missing {field}");
        }
        assert_eq!(d["AssociatedRecord"], "vm-2");
        assert_eq!(d["AssociatedRecordType"], "cloud");
        assert_eq!(d["Type"], "GPU");
    }

    #[test]
    fn test_active_duration_defaults_to_available() {
        let r = sample();
        assert_eq!(r.active_duration(), 1000);
        assert_eq!(r.as_dict(None).unwrap()["ActiveDuration"], 1000);
    }

    #[test]
    fn test_active_duration_override_and_clear() {
        let mut r = sample();
        r.set_active_duration(Some(250));
        assert_eq!(r.active_duration(), 250);
        assert_eq!(r.as_dict(None).unwrap()["ActiveDuration"], 250);

        r.set_active_duration(None);
        assert_eq!(r.active_duration(), 1000);
    }

    #[test]
    fn test_month_range_is_validated() {
        for month in [0, 13] {
            let r = AcceleratorRecord::new("vm-2", "/VO/foo", "SiteA", 2, 1000, "GPU", month, 2021);
            assert!(matches!(
                r,
                Err(RecordError::InvalidValue { field: "MeasurementMonth", .. })
            ));
        }
    }

    #[test]
    fn test_unknown_version() {
        assert!(matches!(
            sample().as_json(Some("1.0")),
            Err(RecordError::UnknownSchemaVersion(_))
        ));
    }
}
