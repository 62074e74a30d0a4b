use metroblock_common::{ConvertError, RegionPos};
use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RegionOutcome {
    Converted,
    /// Some chunks were replaced by flat default terrain
    ConvertedWithDefaults(String),
    Failed(String),
}

impl RegionOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RegionOutcome::Failed(_))
    }
}

impl fmt::Display for RegionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionOutcome::Converted => write!(f, "converted"),
            RegionOutcome::ConvertedWithDefaults(reason) => {
                write!(f, "converted with defaults ({})", reason)
            }
            RegionOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionReport {
    pub region: RegionPos,
    pub outcome: RegionOutcome,
    pub chunks: usize,
    pub defaulted_chunks: usize,
}

impl RegionReport {
    pub fn failed(region: RegionPos, reason: impl Into<String>) -> Self {
        RegionReport {
            region,
            outcome: RegionOutcome::Failed(reason.into()),
            chunks: 0,
            defaulted_chunks: 0,
        }
    }
}

fn error_text<S: Serializer>(
    error: &Option<ConvertError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Outcome of a run. Lists every planned region in region order.
#[derive(Debug, Serialize)]
pub struct ConversionReport {
    pub run_id: Uuid,
    pub regions: Vec<RegionReport>,
    #[serde(serialize_with = "error_text")]
    pub fatal: Option<ConvertError>,
}

impl ConversionReport {
    pub fn new(run_id: Uuid) -> Self {
        ConversionReport {
            run_id,
            regions: Vec::new(),
            fatal: None,
        }
    }

    pub fn outcome(&self, region: RegionPos) -> Option<&RegionOutcome> {
        self.regions
            .iter()
            .find(|r| r.region == region)
            .map(|r| &r.outcome)
    }

    pub fn failed_count(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| !r.outcome.is_success())
            .count()
    }

    /// No fatal error and no failed region.
    pub fn is_success(&self) -> bool {
        self.fatal.is_none() && self.failed_count() == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
