//! Storage seam for the three linked collections.
//!
//! Every workflow step runs through a [`ReportTx`]; nothing is visible to
//! other requests until [`ReportTx::commit`] succeeds. Dropping a transaction
//! without committing discards its writes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CrimeReport, CrimeType, Location, ReportFilter};

#[async_trait]
pub trait ReportStore: Send + Sync + 'static {
    type Tx: ReportTx;

    async fn begin(&self) -> Result<Self::Tx, AppError>;
}

#[async_trait]
pub trait ReportTx: Send {
    // ---- crime reports ----
    async fn find_report(&mut self, id: Uuid) -> Result<Option<CrimeReport>, AppError>;

    /// Like `find_report`, but holds the row until the transaction ends.
    async fn lock_report(&mut self, id: Uuid) -> Result<Option<CrimeReport>, AppError>;

    /// Returns the matching page plus the total count ignoring pagination.
    async fn list_reports(
        &mut self,
        filter: &ReportFilter,
    ) -> Result<(Vec<CrimeReport>, i64), AppError>;

    /// Persists the report, bumping `version` and `updated_at`.
    ///
    /// Fails with [`crime_id_conflict`] if another report holds the same `crime_id`.
    async fn update_report(&mut self, report: &CrimeReport) -> Result<CrimeReport, AppError>;

    /// Removes the report, returning it if it existed.
    async fn delete_report(&mut self, id: Uuid) -> Result<Option<CrimeReport>, AppError>;

    /// True if another report already uses `crime_id`.
    async fn crime_id_taken(&mut self, crime_id: &str, except: Uuid) -> Result<bool, AppError>;

    // ---- locations ----
    async fn find_location(&mut self, id: Uuid) -> Result<Option<Location>, AppError>;

    async fn update_location(&mut self, location: &Location) -> Result<Location, AppError>;

    async fn location_in_use(&mut self, id: Uuid) -> Result<bool, AppError>;

    async fn delete_location(&mut self, id: Uuid) -> Result<bool, AppError>;

    // ---- crime types ----
    async fn find_crime_type(&mut self, id: Uuid) -> Result<Option<CrimeType>, AppError>;

    /// Case-insensitive exact match on the type name.
    async fn find_crime_type_by_name(&mut self, name: &str)
        -> Result<Option<CrimeType>, AppError>;

    /// Inserts a new type. If a type with the same name (ignoring case) exists
    /// by the time the insert runs, that row is returned instead.
    async fn create_crime_type(
        &mut self,
        name: &str,
        category: &str,
    ) -> Result<CrimeType, AppError>;

    async fn crime_type_in_use(&mut self, id: Uuid) -> Result<bool, AppError>;

    async fn delete_crime_type(&mut self, id: Uuid) -> Result<bool, AppError>;

    async fn commit(self) -> Result<(), AppError>;
}

/// Rejection for a `crime_id` another report already uses.
pub fn crime_id_conflict(crime_id: &str) -> AppError {
    AppError::Validation(format!(
        "Validation failed: crime_id '{}' is already in use",
        crime_id
    ))
}
