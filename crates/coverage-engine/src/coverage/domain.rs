use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    pub const fn ordered() -> [Self; 3] {
        [Self::Male, Self::Female, Self::Unknown]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Unknown => "Unknown",
        }
    }

    /// Blank input means the field is absent; any other unrecognized value is `Unknown`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "male" | "m" | "boy" => Some(Self::Male),
            "female" | "f" | "girl" => Some(Self::Female),
            _ => Some(Self::Unknown),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageTier {
    Green,
    Orange,
    Red,
}

impl CoverageTier {
    pub const fn ordered() -> [Self; 3] {
        [Self::Green, Self::Orange, Self::Red]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Green => "Green",
            Self::Orange => "Orange",
            Self::Red => "Red",
        }
    }
}

/// Recommendation severity; the derived ordering puts the most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Informational,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::Warning => "Warning",
            Self::Informational => "Informational",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    Day,
    Week,
    #[default]
    Month,
}

impl TimeGranularity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown time granularity '{0}' (expected day, week or month)")]
pub struct UnknownGranularity(pub String);

impl FromStr for TimeGranularity {
    type Err = UnknownGranularity;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Self::Day),
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            _ => Err(UnknownGranularity(value.to_string())),
        }
    }
}

/// One validated row of the canonical record set.
///
/// `district_key` and `vaccine_key` are the grouping forms; `district` and
/// `vaccine_type` are what reports display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaccinationRecord {
    pub district: String,
    #[serde(skip)]
    pub district_key: String,
    pub village: Option<String>,
    pub vaccine_type: String,
    #[serde(skip)]
    pub vaccine_key: String,
    pub coverage_percentage: f64,
    pub date: Option<NaiveDate>,
    pub age_group: Option<String>,
    pub gender: Option<Gender>,
    pub child_id: Option<String>,
    /// 1 for an individual row; the cohort size for a pre-aggregated row.
    pub population_weight: f64,
}

/// Bucket label used when a demographic field is absent.
pub const UNSPECIFIED_LABEL: &str = "Unspecified";

impl VaccinationRecord {
    pub fn gender_label(&self) -> &'static str {
        self.gender.map(Gender::label).unwrap_or(UNSPECIFIED_LABEL)
    }

    pub fn age_group_label(&self) -> &str {
        self.age_group.as_deref().unwrap_or(UNSPECIFIED_LABEL)
    }
}
