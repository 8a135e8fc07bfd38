//! Fixtures shared by the workflow and HTTP tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crime_report_api::errors::AppError;
use crime_report_api::geocoder::{Coordinates, Geocoder};
use crime_report_api::memory_store::MemoryReportStore;
use crime_report_api::models::{CaseStatus, CrimeReport, CrimeType, Location, Setting};
use crime_report_api::workflow::ReportWorkflow;

/// Geocoder returning coordinates derived from the address text.
///
/// Latitudes always fall in 4.0..14.0, so they never equal a seeded 14.65.
#[derive(Default)]
pub struct FakeGeocoder {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn failing() -> Self {
        let geocoder = Self::default();
        geocoder.fail.store(true, Ordering::SeqCst);
        geocoder
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn coordinates_for(address: &str) -> Coordinates {
    let h = address
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    Coordinates {
        latitude: 4.0 + (h % 1000) as f64 / 100.0,
        longitude: 116.0 + ((h / 1000) % 1000) as f64 / 100.0,
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Geocode(format!(
                "No coordinates found for address '{}'",
                address
            )));
        }
        Ok(coordinates_for(address))
    }
}

pub fn location(street: &str, barangay: &str) -> Location {
    let now = Utc::now();
    Location {
        id: Uuid::new_v4(),
        house_building_number: Some("12".to_string()),
        street_name: street.to_string(),
        purok_block_lot: None,
        barangay: barangay.to_string(),
        municipality_city: "Marikina".to_string(),
        province: "Metro Manila".to_string(),
        region: Some("NCR".to_string()),
        zip_code: Some("1807".to_string()),
        latitude: 14.65,
        longitude: 121.10,
        created_at: now,
        updated_at: now,
    }
}

pub fn crime_type(name: &str, category: &str) -> CrimeType {
    let now = Utc::now();
    CrimeType {
        id: Uuid::new_v4(),
        crime_type: name.to_string(),
        crime_type_category: category.to_string(),
        created_at: now,
        updated_at: now,
    }
}

pub fn report(crime_id: &str, location: &Location, crime_type: &CrimeType) -> CrimeReport {
    let now = Utc::now();
    CrimeReport {
        id: Uuid::new_v4(),
        crime_id: crime_id.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        time: NaiveTime::from_hms_opt(21, 30, 0).unwrap(),
        day_of_week: "Friday".to_string(),
        case_status: CaseStatus::Ongoing,
        indoor_or_outdoor: Setting::Outdoor,
        event_proximity: Some("Near public market".to_string()),
        location_id: location.id,
        crime_type_id: crime_type.id,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

/// One report R1 at "123 Main St" with type `theft/property`.
pub struct Seeded {
    pub store: MemoryReportStore,
    pub report: CrimeReport,
    pub location: Location,
    pub crime_type: CrimeType,
}

pub async fn seed() -> Seeded {
    let store = MemoryReportStore::new();
    let location = location("123 Main St", "Concepcion Uno");
    let crime_type = crime_type("theft", "property");
    let report = report("CR-0001", &location, &crime_type);

    store.insert_location(location.clone()).await;
    store.insert_crime_type(crime_type.clone()).await;
    store.insert_report(report.clone()).await;

    Seeded {
        store,
        report,
        location,
        crime_type,
    }
}

pub fn workflow(
    store: &MemoryReportStore,
    geocoder: Arc<FakeGeocoder>,
    strict_cleanup: bool,
) -> ReportWorkflow<MemoryReportStore> {
    ReportWorkflow::new(store.clone(), geocoder, strict_cleanup)
}
