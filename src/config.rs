use crate::error::{ReconciliationError, Result};
use crate::overrides::{renamed_branch_overrides, ManualOverride};
use crate::period::{CategoryPolicy, PeriodCalendar};
use crate::proximity::DEFAULT_PROXIMITY_THRESHOLD_DEGREES;
use crate::taxonomy::DEFAULT_PRINCIPAL_AREAS;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Everything a reconciliation run needs besides the registry and the records.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReconciliationConfig {
    #[schemars(description = "Manual label → branch overrides, consulted before every automatic rule.")]
    pub overrides: Vec<ManualOverride>,

    #[schemars(description = "Period windows for the local (quarterly) and foreign (semiannual) cadences.")]
    pub calendar: PeriodCalendar,

    #[schemars(description = "Rules deciding which cadence a branch follows.")]
    pub category_policy: CategoryPolicy,

    #[schemars(description = "Catalogued inspection areas. Area rows outside this list are secondary and never count toward coverage.")]
    pub principal_areas: Vec<String>,

    #[schemars(description = "Maximum distance, in degrees of latitude/longitude, for suggesting a nearby branch for an unmapped label.")]
    pub proximity_threshold_degrees: f64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            overrides: Vec::new(),
            calendar: PeriodCalendar::default(),
            category_policy: CategoryPolicy::default(),
            principal_areas: DEFAULT_PRINCIPAL_AREAS
                .iter()
                .map(|a| a.to_string())
                .collect(),
            proximity_threshold_degrees: DEFAULT_PROXIMITY_THRESHOLD_DEGREES,
        }
    }
}

impl ReconciliationConfig {
    /// Defaults plus the overrides for the branches renamed in the supervision source.
    pub fn curated() -> Self {
        Self {
            overrides: renamed_branch_overrides(),
            ..Self::default()
        }
    }

    pub fn with_overrides(mut self, overrides: Vec<ManualOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Checks everything that can be checked without a registry. Override targets are
    /// validated later against the registry.
    pub fn validate(&self) -> Result<()> {
        self.calendar.validate()?;

        if !self.proximity_threshold_degrees.is_finite() || self.proximity_threshold_degrees < 0.0
        {
            return Err(ReconciliationError::InvalidConfig(format!(
                "Proximity threshold must be a non-negative number, got {}",
                self.proximity_threshold_degrees
            )));
        }

        if self.principal_areas.iter().all(|a| a.trim().is_empty()) {
            return Err(ReconciliationError::InvalidConfig(
                "At least one principal area is required".to_string(),
            ));
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReconciliationConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
