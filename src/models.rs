use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::errors::AppError;

// ============ Database Models ============

/// A normalized address with geocoded coordinates.
///
/// `latitude`/`longitude` are derived from the address components and are
/// recomputed whenever any of them changes.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub house_building_number: Option<String>,
    pub street_name: String,
    pub purok_block_lot: Option<String>,
    pub barangay: String,
    pub municipality_city: String,
    pub province: String,
    pub region: Option<String>,
    pub zip_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Location {
    /// Free-text address handed to the geocoder.
    pub fn full_address(&self) -> String {
        [
            self.house_building_number.as_deref(),
            Some(self.street_name.as_str()),
            self.purok_block_lot.as_deref(),
            Some(self.barangay.as_str()),
            Some(self.municipality_city.as_str()),
            Some(self.province.as_str()),
            self.region.as_deref(),
            self.zip_code.as_deref(),
            Some("Philippines"),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// True when both records describe the same address (coordinates ignored).
    pub fn same_address(&self, other: &Location) -> bool {
        self.house_building_number == other.house_building_number
            && self.street_name == other.street_name
            && self.purok_block_lot == other.purok_block_lot
            && self.barangay == other.barangay
            && self.municipality_city == other.municipality_city
            && self.province == other.province
            && self.region == other.region
            && self.zip_code == other.zip_code
    }
}

/// Reference table entry mapping a crime type name to its category.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CrimeType {
    pub id: Uuid,
    pub crime_type: String,
    pub crime_type_category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrimeType {
    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        names_match(&self.crime_type, name)
    }
}

/// Case-insensitive, whitespace-trimmed crime type name equality.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "case_status")]
pub enum CaseStatus {
    Ongoing,
    #[serde(rename = "Under Investigation")]
    #[sqlx(rename = "Under Investigation")]
    UnderInvestigation,
    Solved,
    Closed,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 4] = [
        CaseStatus::Ongoing,
        CaseStatus::UnderInvestigation,
        CaseStatus::Solved,
        CaseStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Ongoing => "Ongoing",
            CaseStatus::UnderInvestigation => "Under Investigation",
            CaseStatus::Solved => "Solved",
            CaseStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaseStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "case_status must be one of: {}",
                    CaseStatus::ALL.map(|s| s.as_str()).join(", ")
                )
            })
    }
}

/// Whether the incident happened indoors or outdoors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_setting")]
pub enum Setting {
    Indoor,
    Outdoor,
}

impl FromStr for Setting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indoor" => Ok(Setting::Indoor),
            "outdoor" => Ok(Setting::Outdoor),
            _ => Err("indoor_or_outdoor must be one of: Indoor, Outdoor".to_string()),
        }
    }
}

/// A recorded incident. Always references exactly one location and one crime type.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CrimeReport {
    pub id: Uuid,
    pub crime_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub day_of_week: String,
    pub case_status: CaseStatus,
    pub indoor_or_outdoor: Setting,
    pub event_proximity: Option<String>,
    pub location_id: Uuid,
    pub crime_type_id: Uuid,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============ API Models ============

/// A report with its location and crime type references resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedReport {
    pub id: Uuid,
    pub crime_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub day_of_week: String,
    pub case_status: CaseStatus,
    pub indoor_or_outdoor: Setting,
    pub event_proximity: Option<String>,
    pub location: Location,
    pub crime_type: CrimeType,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResolvedReport {
    pub fn new(report: CrimeReport, location: Location, crime_type: CrimeType) -> Self {
        Self {
            id: report.id,
            crime_id: report.crime_id,
            date: report.date,
            time: report.time,
            day_of_week: report.day_of_week,
            case_status: report.case_status,
            indoor_or_outdoor: report.indoor_or_outdoor,
            event_proximity: report.event_proximity,
            location,
            crime_type,
            version: report.version,
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }
}

/// How the caller refers to a crime type in an update payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CrimeTypeRef {
    /// A plain type name, resolved (or created) case-insensitively.
    Name(String),
    /// An object carrying the id of an existing crime type.
    Existing {
        #[serde(alias = "_id")]
        id: String,
    },
    /// Any other shape; leaves the current crime type in place.
    Other(serde_json::Value),
}

/// Body of `PUT /crime-reports/{id}`.
///
/// The field set is closed: anything not listed here (ids, timestamps,
/// version, nested location objects) is dropped during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportUpdate {
    pub crime_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub day_of_week: Option<String>,
    pub case_status: Option<String>,
    pub indoor_or_outdoor: Option<String>,
    pub event_proximity: Option<String>,

    pub house_building_number: Option<String>,
    pub street_name: Option<String>,
    pub purok_block_lot: Option<String>,
    pub barangay: Option<String>,
    pub municipality_city: Option<String>,
    pub province: Option<String>,
    pub region: Option<String>,
    pub zip_code: Option<String>,

    pub crime_type: Option<CrimeTypeRef>,
    pub crime_type_category: Option<String>,
    /// Short form of `crime_type_category`, used only when that key is absent.
    pub category: Option<String>,
}

/// Changes to fields owned by the report record itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportChanges {
    pub crime_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub day_of_week: Option<String>,
    pub case_status: Option<CaseStatus>,
    pub indoor_or_outdoor: Option<Setting>,
    /// `Some(None)` clears the field.
    pub event_proximity: Option<Option<String>>,
}

impl ReportChanges {
    /// Returns `report` with the changes and the resolved crime type applied.
    pub fn apply_to(&self, report: &CrimeReport, crime_type_id: Uuid) -> CrimeReport {
        let mut next = report.clone();
        if let Some(crime_id) = &self.crime_id {
            next.crime_id = crime_id.clone();
        }
        if let Some(date) = self.date {
            next.date = date;
        }
        if let Some(time) = self.time {
            next.time = time;
        }
        if let Some(day) = &self.day_of_week {
            next.day_of_week = day.clone();
        }
        if let Some(status) = self.case_status {
            next.case_status = status;
        }
        if let Some(setting) = self.indoor_or_outdoor {
            next.indoor_or_outdoor = setting;
        }
        if let Some(proximity) = &self.event_proximity {
            next.event_proximity = proximity.clone();
        }
        next.crime_type_id = crime_type_id;
        next
    }
}

/// Changes to the address components of a report's location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressPatch {
    pub house_building_number: Option<Option<String>>,
    pub street_name: Option<String>,
    pub purok_block_lot: Option<Option<String>>,
    pub barangay: Option<String>,
    pub municipality_city: Option<String>,
    pub province: Option<String>,
    pub region: Option<Option<String>>,
    pub zip_code: Option<Option<String>>,
}

impl AddressPatch {
    /// Returns `location` with the patch applied. Coordinates are left as-is.
    pub fn apply_to(&self, location: &Location) -> Location {
        let mut next = location.clone();
        if let Some(v) = &self.house_building_number {
            next.house_building_number = v.clone();
        }
        if let Some(v) = &self.street_name {
            next.street_name = v.clone();
        }
        if let Some(v) = &self.purok_block_lot {
            next.purok_block_lot = v.clone();
        }
        if let Some(v) = &self.barangay {
            next.barangay = v.clone();
        }
        if let Some(v) = &self.municipality_city {
            next.municipality_city = v.clone();
        }
        if let Some(v) = &self.province {
            next.province = v.clone();
        }
        if let Some(v) = &self.region {
            next.region = v.clone();
        }
        if let Some(v) = &self.zip_code {
            next.zip_code = v.clone();
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrimeTypeChange {
    Named {
        name: String,
        category: Option<String>,
    },
    ById(Uuid),
}

/// An update payload that passed field validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedUpdate {
    pub report: ReportChanges,
    pub address: AddressPatch,
    pub crime_type: Option<CrimeTypeChange>,
}

impl ReportUpdate {
    /// Deserializes a loosely-typed JSON body into the closed field set.
    pub fn from_json(payload: serde_json::Value) -> Result<Self, AppError> {
        if !payload.is_object() {
            return Err(AppError::Validation(
                "Request body must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(payload)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
    }

    /// Checks every supplied field, collecting all failures into one error.
    pub fn validate(self) -> Result<ValidatedUpdate, AppError> {
        let mut errors: Vec<String> = Vec::new();
        let mut report = ReportChanges::default();

        if let Some(crime_id) = self.crime_id {
            let crime_id = crime_id.trim().to_string();
            if crime_id_pattern().is_match(&crime_id) {
                report.crime_id = Some(crime_id);
            } else {
                errors.push(
                    "crime_id must be 1-64 characters of letters, digits, '-' or '_'".to_string(),
                );
            }
        }
        if let Some(date) = self.date {
            match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
                Ok(d) => report.date = Some(d),
                Err(_) => errors.push(format!("date '{}' must be formatted YYYY-MM-DD", date)),
            }
        }
        if let Some(time) = self.time {
            match parse_time(&time) {
                Some(t) => report.time = Some(t),
                None => errors.push(format!("time '{}' must be formatted HH:MM or HH:MM:SS", time)),
            }
        }
        if let Some(day) = self.day_of_week {
            match normalize_day_of_week(&day) {
                Some(d) => report.day_of_week = Some(d.to_string()),
                None => errors.push(format!("day_of_week '{}' is not a weekday name", day)),
            }
        }
        if let Some(status) = self.case_status {
            match status.parse::<CaseStatus>() {
                Ok(s) => report.case_status = Some(s),
                Err(e) => errors.push(e),
            }
        }
        if let Some(setting) = self.indoor_or_outdoor {
            match setting.parse::<Setting>() {
                Ok(s) => report.indoor_or_outdoor = Some(s),
                Err(e) => errors.push(e),
            }
        }
        if let Some(proximity) = self.event_proximity {
            report.event_proximity = Some(optional_text(proximity));
        }

        let mut address = AddressPatch {
            house_building_number: self.house_building_number.map(optional_text),
            purok_block_lot: self.purok_block_lot.map(optional_text),
            region: self.region.map(optional_text),
            ..AddressPatch::default()
        };
        address.street_name = required_text("street_name", self.street_name, &mut errors);
        address.barangay = required_text("barangay", self.barangay, &mut errors);
        address.municipality_city =
            required_text("municipality_city", self.municipality_city, &mut errors);
        address.province = required_text("province", self.province, &mut errors);
        if let Some(zip) = self.zip_code.map(optional_text) {
            match zip {
                Some(z) if !zip_code_pattern().is_match(&z) => {
                    errors.push(format!("zip_code '{}' must be 4 digits", z))
                }
                other => address.zip_code = Some(other),
            }
        }

        let category = match self
            .crime_type_category
            .or(self.category)
            .map(|c| c.trim().to_string())
        {
            Some(c) if c.is_empty() => {
                errors.push("crime_type_category cannot be empty".to_string());
                None
            }
            other => other,
        };
        let crime_type = match self.crime_type {
            None => None,
            Some(CrimeTypeRef::Name(name)) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    errors.push("crime_type cannot be empty".to_string());
                    None
                } else {
                    Some(CrimeTypeChange::Named { name, category })
                }
            }
            Some(CrimeTypeRef::Other(value)) => {
                tracing::debug!("Ignoring unrecognized crime_type value: {}", value);
                None
            }
            Some(CrimeTypeRef::Existing { id }) => match Uuid::parse_str(id.trim()) {
                Ok(id) => Some(CrimeTypeChange::ById(id)),
                Err(_) => {
                    // Malformed ids fail on their own, not alongside field errors
                    return Err(AppError::Validation(format!("Invalid crime type id: {}", id)));
                }
            },
        };

        if !errors.is_empty() {
            return Err(AppError::Validation(format!(
                "Validation failed: {}",
                errors.join(", ")
            )));
        }

        Ok(ValidatedUpdate {
            report,
            address,
            crime_type,
        })
    }
}

/// Query parameters of `GET /crime-reports`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub case_status: Option<String>,
    pub crime_type: Option<String>,
    pub barangay: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Storage-level filter for listing reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    pub case_status: Option<CaseStatus>,
    pub crime_type: Option<String>,
    pub barangay: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl ListParams {
    pub fn into_filter(self) -> Result<(ReportFilter, u32, u32), AppError> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::Validation("page starts at 1".to_string()));
        }
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let case_status = self
            .case_status
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<CaseStatus>())
            .transpose()
            .map_err(AppError::Validation)?;

        let filter = ReportFilter {
            case_status,
            crime_type: self.crime_type.and_then(optional_text),
            barangay: self.barangay.and_then(optional_text),
            limit: i64::from(limit),
            offset: i64::from(page - 1) * i64::from(limit),
        };
        Ok((filter, page, limit))
    }
}

/// One page of resolved reports.
#[derive(Debug, Clone, Serialize)]
pub struct ReportPage {
    pub data: Vec<ResolvedReport>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

// ============ Field helpers ============

fn crime_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("crime id pattern"))
}

fn zip_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}$").expect("zip code pattern"))
}

fn optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn required_text(field: &str, value: Option<String>, errors: &mut Vec<String>) -> Option<String> {
    let value = value?;
    match optional_text(value) {
        Some(v) => Some(v),
        None => {
            errors.push(format!("{} cannot be empty", field));
            None
        }
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Maps a weekday name (any case, full or three-letter) to its capitalized full name.
pub fn normalize_day_of_week(value: &str) -> Option<&'static str> {
    const DAYS: [&str; 7] = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];
    let value = value.trim();
    DAYS.into_iter().find(|day| {
        day.eq_ignore_ascii_case(value) || (value.len() == 3 && day[..3].eq_ignore_ascii_case(value))
    })
}
