//! Read, update, delete and list operations over crime reports.
//!
//! Updates run in a single transaction covering the location, any new crime
//! type and the report itself. Deletes commit the report removal first, then
//! reclaim the report's location and crime type in a second transaction if no
//! other report references them.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::geocoder::Geocoder;
use crate::models::{
    CrimeReport, CrimeType, CrimeTypeChange, ListParams, Location, ReportPage, ReportUpdate,
    ResolvedReport,
};
use crate::store::{crime_id_conflict, ReportStore, ReportTx};

/// Result of a delete.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub report: CrimeReport,
    pub reclaimed: Reclaimed,
    /// Cleanup failures, only populated in strict mode.
    pub warnings: Vec<String>,
}

/// Which linked records a delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reclaimed {
    pub crime_type: bool,
    pub location: bool,
}

pub struct ReportWorkflow<S> {
    store: S,
    geocoder: Arc<dyn Geocoder>,
    strict_cleanup: bool,
}

/// Parses a path segment into a report key.
pub fn parse_report_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id.trim())
        .map_err(|_| AppError::Validation(format!("Invalid crime report id: {}", id)))
}

impl<S: ReportStore> ReportWorkflow<S> {
    pub fn new(store: S, geocoder: Arc<dyn Geocoder>, strict_cleanup: bool) -> Self {
        Self {
            store,
            geocoder,
            strict_cleanup,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads a report with its location and crime type resolved.
    pub async fn get(&self, id: &str) -> Result<ResolvedReport, AppError> {
        let report_id = parse_report_id(id)?;
        let mut tx = self.store.begin().await?;

        let report = tx
            .find_report(report_id)
            .await?
            .ok_or_else(|| not_found(report_id))?;
        let location = load_location(&mut tx, &report).await?;
        let crime_type = load_crime_type(&mut tx, &report).await?;

        Ok(ResolvedReport::new(report, location, crime_type))
    }

    /// Lists reports matching the query, newest first.
    pub async fn list(&self, params: ListParams) -> Result<ReportPage, AppError> {
        let (filter, page, limit) = params.into_filter()?;
        let mut tx = self.store.begin().await?;

        let (reports, total) = tx.list_reports(&filter).await?;

        let mut locations: HashMap<Uuid, Location> = HashMap::new();
        let mut crime_types: HashMap<Uuid, CrimeType> = HashMap::new();
        let mut data = Vec::with_capacity(reports.len());
        for report in reports {
            let location = match locations.get(&report.location_id) {
                Some(l) => l.clone(),
                None => {
                    let l = load_location(&mut tx, &report).await?;
                    locations.insert(l.id, l.clone());
                    l
                }
            };
            let crime_type = match crime_types.get(&report.crime_type_id) {
                Some(t) => t.clone(),
                None => {
                    let t = load_crime_type(&mut tx, &report).await?;
                    crime_types.insert(t.id, t.clone());
                    t
                }
            };
            data.push(ResolvedReport::new(report, location, crime_type));
        }

        Ok(ReportPage {
            data,
            page,
            limit,
            total,
        })
    }

    /// Applies a partial update and returns the resolved result.
    ///
    /// Nothing is persisted unless every step succeeds: a geocoding failure or
    /// a validation error after the location was rewritten rolls it back.
    pub async fn update(
        &self,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<ResolvedReport, AppError> {
        let report_id = parse_report_id(id)?;
        let mut tx = self.store.begin().await?;

        let report = tx
            .lock_report(report_id)
            .await?
            .ok_or_else(|| not_found(report_id))?;
        let location = load_location(&mut tx, &report).await?;

        let changes = ReportUpdate::from_json(payload)?.validate()?;

        let patched = changes.address.apply_to(&location);
        let location = if patched.same_address(&location) {
            location
        } else {
            let coordinates = self.geocoder.geocode(&patched.full_address()).await?;
            let relocated = Location {
                latitude: coordinates.latitude,
                longitude: coordinates.longitude,
                ..patched
            };
            let saved = tx.update_location(&relocated).await?;
            tracing::info!(
                "Location {} of crime report {} moved to ({}, {})",
                saved.id,
                report_id,
                saved.latitude,
                saved.longitude
            );
            saved
        };

        let current_type = load_crime_type(&mut tx, &report).await?;
        let crime_type = resolve_crime_type(&mut tx, current_type, changes.crime_type).await?;

        let next = changes.report.apply_to(&report, crime_type.id);
        if next.crime_id != report.crime_id && tx.crime_id_taken(&next.crime_id, report.id).await?
        {
            return Err(crime_id_conflict(&next.crime_id));
        }

        let report = if next == report {
            report
        } else {
            tx.update_report(&next).await?
        };

        tx.commit().await?;
        tracing::info!("Crime report {} updated (version {})", report.id, report.version);

        Ok(ResolvedReport::new(report, location, crime_type))
    }

    /// Deletes a report, then reclaims its location and crime type if orphaned.
    ///
    /// Cleanup is best-effort: once the report is gone the delete succeeds even
    /// if reclaiming fails. In strict mode the failure is reported as a warning.
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome, AppError> {
        let report_id = parse_report_id(id)?;

        let mut tx = self.store.begin().await?;
        let report = tx
            .delete_report(report_id)
            .await?
            .ok_or_else(|| not_found(report_id))?;
        tx.commit().await?;
        tracing::info!("Crime report {} ({}) deleted", report.id, report.crime_id);

        let mut warnings = Vec::new();
        let reclaimed = match self.reclaim_orphans(&report).await {
            Ok(reclaimed) => reclaimed,
            Err(e) => {
                tracing::warn!(
                    "Orphan cleanup after deleting crime report {} failed: {}",
                    report.id,
                    e
                );
                if self.strict_cleanup {
                    warnings.push(format!(
                        "Linked records of crime report {} could not be cleaned up",
                        report.id
                    ));
                }
                Reclaimed::default()
            }
        };

        Ok(DeleteOutcome {
            report,
            reclaimed,
            warnings,
        })
    }

    async fn reclaim_orphans(&self, report: &CrimeReport) -> Result<Reclaimed, AppError> {
        let mut tx = self.store.begin().await?;
        let mut reclaimed = Reclaimed::default();

        if !tx.crime_type_in_use(report.crime_type_id).await? {
            reclaimed.crime_type = tx.delete_crime_type(report.crime_type_id).await?;
        }
        if !tx.location_in_use(report.location_id).await? {
            reclaimed.location = tx.delete_location(report.location_id).await?;
        }

        tx.commit().await?;
        if reclaimed.crime_type {
            tracing::info!("Removed orphaned crime type {}", report.crime_type_id);
        }
        if reclaimed.location {
            tracing::info!("Removed orphaned location {}", report.location_id);
        }
        Ok(reclaimed)
    }
}

/// Picks the crime type a report should reference after an update.
async fn resolve_crime_type<T: ReportTx>(
    tx: &mut T,
    current: CrimeType,
    change: Option<CrimeTypeChange>,
) -> Result<CrimeType, AppError> {
    match change {
        None => Ok(current),
        Some(CrimeTypeChange::ById(id)) => tx
            .find_crime_type(id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Crime type {} does not exist", id))),
        Some(CrimeTypeChange::Named { name, .. }) if current.is_named(&name) => Ok(current),
        Some(CrimeTypeChange::Named { name, category }) => {
            if let Some(existing) = tx.find_crime_type_by_name(&name).await? {
                return Ok(existing);
            }
            let category = category.ok_or_else(|| {
                AppError::Validation(format!(
                    "crime_type_category is required to create new crime type '{}'",
                    name
                ))
            })?;
            let created = tx.create_crime_type(&name, &category).await?;
            tracing::info!(
                "Created crime type '{}' ({}) as {}",
                created.crime_type,
                created.crime_type_category,
                created.id
            );
            Ok(created)
        }
    }
}

async fn load_location<T: ReportTx>(tx: &mut T, report: &CrimeReport) -> Result<Location, AppError> {
    tx.find_location(report.location_id).await?.ok_or_else(|| {
        AppError::Integrity(format!(
            "Location {} referenced by crime report {} is missing",
            report.location_id, report.id
        ))
    })
}

async fn load_crime_type<T: ReportTx>(
    tx: &mut T,
    report: &CrimeReport,
) -> Result<CrimeType, AppError> {
    tx.find_crime_type(report.crime_type_id)
        .await?
        .ok_or_else(|| {
            AppError::Integrity(format!(
                "Crime type {} referenced by crime report {} is missing",
                report.crime_type_id, report.id
            ))
        })
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Crime report {} not found", id))
}
