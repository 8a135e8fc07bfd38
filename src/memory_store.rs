//! In-process report storage.
//!
//! A transaction holds the store lock from `begin` until it is committed or
//! dropped, and works on a private copy of the tables, so transactions are
//! serialized and uncommitted writes are never observed.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{names_match, CrimeReport, CrimeType, Location, ReportFilter};
use crate::store::{crime_id_conflict, ReportStore, ReportTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    locations: HashMap<Uuid, Location>,
    crime_types: HashMap<Uuid, CrimeType>,
    reports: HashMap<Uuid, CrimeReport>,
}

#[derive(Clone, Default)]
pub struct MemoryReportStore {
    tables: Arc<Mutex<Tables>>,
    reject_orphan_deletes: Arc<AtomicBool>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes location and crime type deletes fail, simulating a storage fault
    /// during orphan cleanup.
    pub fn reject_orphan_deletes(&self, reject: bool) {
        self.reject_orphan_deletes.store(reject, Ordering::SeqCst);
    }

    pub async fn insert_location(&self, location: Location) {
        self.tables
            .lock()
            .await
            .locations
            .insert(location.id, location);
    }

    pub async fn insert_crime_type(&self, crime_type: CrimeType) {
        self.tables
            .lock()
            .await
            .crime_types
            .insert(crime_type.id, crime_type);
    }

    pub async fn insert_report(&self, report: CrimeReport) {
        self.tables.lock().await.reports.insert(report.id, report);
    }

    pub async fn location(&self, id: Uuid) -> Option<Location> {
        self.tables.lock().await.locations.get(&id).cloned()
    }

    pub async fn report(&self, id: Uuid) -> Option<CrimeReport> {
        self.tables.lock().await.reports.get(&id).cloned()
    }

    pub async fn crime_types(&self) -> Vec<CrimeType> {
        let mut types: Vec<_> = self
            .tables
            .lock()
            .await
            .crime_types
            .values()
            .cloned()
            .collect();
        types.sort_by(|a, b| a.crime_type.cmp(&b.crime_type));
        types
    }

    pub async fn location_count(&self) -> usize {
        self.tables.lock().await.locations.len()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    type Tx = MemoryReportTx;

    async fn begin(&self) -> Result<MemoryReportTx, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryReportTx {
            guard,
            working,
            reject_orphan_deletes: self.reject_orphan_deletes.load(Ordering::SeqCst),
        })
    }
}

pub struct MemoryReportTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    reject_orphan_deletes: bool,
}

impl MemoryReportTx {
    fn check_orphan_delete(&self, what: &str, id: Uuid) -> Result<(), AppError> {
        if self.reject_orphan_deletes {
            return Err(AppError::InternalError(format!(
                "Simulated storage failure deleting {} {}",
                what, id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportTx for MemoryReportTx {
    async fn find_report(&mut self, id: Uuid) -> Result<Option<CrimeReport>, AppError> {
        Ok(self.working.reports.get(&id).cloned())
    }

    async fn lock_report(&mut self, id: Uuid) -> Result<Option<CrimeReport>, AppError> {
        // The whole store is already locked for this transaction
        self.find_report(id).await
    }

    async fn list_reports(
        &mut self,
        filter: &ReportFilter,
    ) -> Result<(Vec<CrimeReport>, i64), AppError> {
        let tables = &self.working;
        let mut matching: Vec<CrimeReport> = tables
            .reports
            .values()
            .filter(|r| filter.case_status.map_or(true, |s| r.case_status == s))
            .filter(|r| {
                filter.crime_type.as_deref().map_or(true, |name| {
                    tables
                        .crime_types
                        .get(&r.crime_type_id)
                        .is_some_and(|t| t.is_named(name))
                })
            })
            .filter(|r| {
                filter.barangay.as_deref().map_or(true, |barangay| {
                    tables
                        .locations
                        .get(&r.location_id)
                        .is_some_and(|l| l.barangay.eq_ignore_ascii_case(barangay))
                })
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.time.cmp(&a.time))
                .then(a.id.cmp(&b.id))
        });
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_report(&mut self, report: &CrimeReport) -> Result<CrimeReport, AppError> {
        // Mirrors the UNIQUE constraint on crime_reports.crime_id
        if self
            .working
            .reports
            .values()
            .any(|r| r.crime_id == report.crime_id && r.id != report.id)
        {
            return Err(crime_id_conflict(&report.crime_id));
        }
        let stored = self
            .working
            .reports
            .get_mut(&report.id)
            .ok_or_else(|| AppError::NotFound(format!("Crime report {} not found", report.id)))?;
        let mut next = report.clone();
        next.version = stored.version + 1;
        next.created_at = stored.created_at;
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(next)
    }

    async fn delete_report(&mut self, id: Uuid) -> Result<Option<CrimeReport>, AppError> {
        Ok(self.working.reports.remove(&id))
    }

    async fn crime_id_taken(&mut self, crime_id: &str, except: Uuid) -> Result<bool, AppError> {
        Ok(self
            .working
            .reports
            .values()
            .any(|r| r.crime_id == crime_id && r.id != except))
    }

    async fn find_location(&mut self, id: Uuid) -> Result<Option<Location>, AppError> {
        Ok(self.working.locations.get(&id).cloned())
    }

    async fn update_location(&mut self, location: &Location) -> Result<Location, AppError> {
        let stored = self
            .working
            .locations
            .get_mut(&location.id)
            .ok_or_else(|| AppError::NotFound(format!("Location {} not found", location.id)))?;
        let mut next = location.clone();
        next.created_at = stored.created_at;
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(next)
    }

    async fn location_in_use(&mut self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.working.reports.values().any(|r| r.location_id == id))
    }

    async fn delete_location(&mut self, id: Uuid) -> Result<bool, AppError> {
        self.check_orphan_delete("location", id)?;
        Ok(self.working.locations.remove(&id).is_some())
    }

    async fn find_crime_type(&mut self, id: Uuid) -> Result<Option<CrimeType>, AppError> {
        Ok(self.working.crime_types.get(&id).cloned())
    }

    async fn find_crime_type_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<CrimeType>, AppError> {
        Ok(self
            .working
            .crime_types
            .values()
            .find(|t| t.is_named(name))
            .cloned())
    }

    async fn create_crime_type(
        &mut self,
        name: &str,
        category: &str,
    ) -> Result<CrimeType, AppError> {
        if let Some(existing) = self
            .working
            .crime_types
            .values()
            .find(|t| names_match(&t.crime_type, name))
        {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let crime_type = CrimeType {
            id: Uuid::new_v4(),
            crime_type: name.trim().to_string(),
            crime_type_category: category.trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.working
            .crime_types
            .insert(crime_type.id, crime_type.clone());
        Ok(crime_type)
    }

    async fn crime_type_in_use(&mut self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.working.reports.values().any(|r| r.crime_type_id == id))
    }

    async fn delete_crime_type(&mut self, id: Uuid) -> Result<bool, AppError> {
        self.check_orphan_delete("crime type", id)?;
        Ok(self.working.crime_types.remove(&id).is_some())
    }

    async fn commit(mut self) -> Result<(), AppError> {
        *self.guard = self.working;
        Ok(())
    }
}
