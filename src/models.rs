// src/models.rs
use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A U.S. government fiscal quarter. Fiscal year N runs Oct 1 (N-1) – Sep 30 (N).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimePeriod {
    #[serde(deserialize_with = "lenient_int")]
    pub fiscal_year: i32,
    #[serde(deserialize_with = "lenient_int")]
    pub quarter: u8,
}

impl TimePeriod {
    pub fn new(fiscal_year: i32, quarter: u8) -> Self {
        TimePeriod { fiscal_year, quarter }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FY{} Q{}", self.fiscal_year, self.quarter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineDataPoint {
    pub time_period: TimePeriod,
    #[serde(default, deserialize_with = "null_as_default")]
    pub aggregated_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    #[serde(default, deserialize_with = "null_as_default")]
    pub amount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
}

impl Agency {
    /// Stable map key: the agency code, or the name when upstream omits the code.
    pub fn key(&self) -> &str {
        if self.code.is_empty() {
            &self.name
        } else {
            &self.code
        }
    }
}

/// One row of the award search, using the upstream column names on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    #[serde(rename = "Award ID", default, deserialize_with = "null_as_default")]
    pub award_id: String,
    #[serde(rename = "Recipient Name", default, deserialize_with = "null_as_default")]
    pub recipient_name: String,
    #[serde(rename = "Award Amount", default, deserialize_with = "null_as_default")]
    pub amount: f64,
    #[serde(rename = "Description", default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "Start Date", default, deserialize_with = "null_as_default")]
    pub start_date: String,
    #[serde(rename = "End Date", default, deserialize_with = "null_as_default")]
    pub end_date: String,
    #[serde(rename = "Awarding Agency", default, deserialize_with = "null_as_default")]
    pub awarding_agency: String,
    #[serde(rename = "Funding Agency", default, deserialize_with = "null_as_default")]
    pub funding_agency: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub generated_internal_id: String,
}

impl Award {
    /// Start date as a calendar date. Accepts `YYYY-MM-DD` with an optional time suffix.
    pub fn parsed_start_date(&self) -> Option<NaiveDate> {
        self.start_date
            .get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeAward {
    /// Display id (PIID); not unique across awards.
    pub id: String,
    /// Upstream `generated_internal_id`, the stable join key.
    #[serde(default)]
    pub internal_id: String,
    pub amount: f64,
    pub description: String,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingOffice {
    /// Composite `{agency_code}_{name}`; office names alone are not unique.
    pub key: String,
    pub name: String,
    pub agency: String,
    pub agency_code: String,
    pub toptier_agency: String,
    pub toptier_agency_code: String,
    pub total_awards: usize,
    pub total_obligation: f64,
    pub awards: Vec<OfficeAward>,
}

impl FundingOffice {
    pub fn composite_key(agency_code: &str, name: &str) -> String {
        format!("{}_{}", agency_code, name)
    }

    /// Key of the top-tier agency this office rolls up to.
    pub fn parent_agency_key(&self) -> &str {
        if self.toptier_agency_code.is_empty() {
            &self.toptier_agency
        } else {
            &self.toptier_agency_code
        }
    }
}

/// Derived timeline and award list for a single agency or funding office.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub name: String,
    pub timeline: Vec<TimelineDataPoint>,
    pub awards: Vec<Award>,
}

impl EntityView {
    pub fn empty(name: impl Into<String>) -> Self {
        EntityView {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Snap the requested range to whole fiscal years.
    #[default]
    Quick,
    /// Use the literal requested bounds.
    Custom,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Quick => "quick",
            SelectionMode::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        DateRange { start_date, end_date }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub market_name: String,
    pub date_range: DateRange,
    pub mode: SelectionMode,
    pub total_market_size: f64,
    pub yoy_growth: f64,
    pub timeline_data: Vec<TimelineDataPoint>,
    pub agency_breakdown: Vec<Agency>,
    pub awards: Vec<Award>,
    /// Keyed by agency code.
    pub agency_views: BTreeMap<String, EntityView>,
    pub funding_offices: Vec<FundingOffice>,
    /// Keyed by composite office key.
    pub office_views: BTreeMap<String, EntityView>,
    pub data_source: DataSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyOffices {
    pub name: String,
    pub toptier_agency: String,
    pub total_obligation: f64,
    pub offices: Vec<FundingOffice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingOfficeAnalysis {
    pub market_name: String,
    pub funding_offices: Vec<FundingOffice>,
    pub offices_by_agency: Vec<AgencyOffices>,
    pub data_source: DataSource,
}

/// Upstream sends JSON `null` for missing strings and amounts.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

/// Fiscal years and quarters arrive as either `"2020"` or `2020`.
fn lenient_int<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let raw = match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(v) => v,
        IntOrString::Str(s) => s.trim().parse::<i64>().map_err(de::Error::custom)?,
    };
    T::try_from(raw).map_err(|_| de::Error::custom(format!("value {} out of range", raw)))
}
