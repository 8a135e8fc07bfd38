use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::{CrimeReport, CrimeType, Location, ReportFilter};
use crate::store::{crime_id_conflict, ReportStore, ReportTx};

/// PostgreSQL-backed report storage.
#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    type Tx = PgReportTx;

    async fn begin(&self) -> Result<PgReportTx, AppError> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        Ok(PgReportTx { tx })
    }
}

/// One database transaction spanning location, crime type and report writes.
pub struct PgReportTx {
    tx: Transaction<'static, Postgres>,
}

/// Unique constraint Postgres generates for `crime_reports.crime_id`.
const CRIME_ID_CONSTRAINT: &str = "crime_reports_crime_id_key";

/// True for a unique violation (SQLSTATE 23505) on `constraint`.
fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation() && db.constraint() == Some(constraint))
}

const REPORT_FILTER: &str = r#"
    FROM crime_reports r
    JOIN crime_types t ON t.id = r.crime_type_id
    JOIN locations l ON l.id = r.location_id
    WHERE ($1::case_status IS NULL OR r.case_status = $1)
      AND ($2::text IS NULL OR lower(t.crime_type) = lower($2))
      AND ($3::text IS NULL OR lower(l.barangay) = lower($3))
"#;

#[async_trait]
impl ReportTx for PgReportTx {
    async fn find_report(&mut self, id: Uuid) -> Result<Option<CrimeReport>, AppError> {
        sqlx::query_as::<_, CrimeReport>("SELECT * FROM crime_reports WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to load crime report {}", id))
    }

    async fn lock_report(&mut self, id: Uuid) -> Result<Option<CrimeReport>, AppError> {
        sqlx::query_as::<_, CrimeReport>("SELECT * FROM crime_reports WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to lock crime report {}", id))
    }

    async fn list_reports(
        &mut self,
        filter: &ReportFilter,
    ) -> Result<(Vec<CrimeReport>, i64), AppError> {
        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) {}", REPORT_FILTER))
            .bind(filter.case_status)
            .bind(filter.crime_type.as_deref())
            .bind(filter.barangay.as_deref())
            .fetch_one(&mut *self.tx)
            .await
            .context("Failed to count crime reports")?;

        let reports = sqlx::query_as::<_, CrimeReport>(&format!(
            "SELECT r.* {} ORDER BY r.date DESC, r.time DESC, r.id LIMIT $4 OFFSET $5",
            REPORT_FILTER
        ))
        .bind(filter.case_status)
        .bind(filter.crime_type.as_deref())
        .bind(filter.barangay.as_deref())
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&mut *self.tx)
        .await
        .context("Failed to list crime reports")?;

        Ok((reports, total))
    }

    async fn update_report(&mut self, report: &CrimeReport) -> Result<CrimeReport, AppError> {
        let updated = sqlx::query_as::<_, CrimeReport>(
            r#"
            UPDATE crime_reports
            SET crime_id = $2,
                date = $3,
                time = $4,
                day_of_week = $5,
                case_status = $6,
                indoor_or_outdoor = $7,
                event_proximity = $8,
                crime_type_id = $9,
                version = version + 1,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(report.id)
        .bind(&report.crime_id)
        .bind(report.date)
        .bind(report.time)
        .bind(&report.day_of_week)
        .bind(report.case_status)
        .bind(report.indoor_or_outdoor)
        .bind(report.event_proximity.as_deref())
        .bind(report.crime_type_id)
        .fetch_one(&mut *self.tx)
        .await;

        match updated {
            Err(e) if is_unique_violation(&e, CRIME_ID_CONSTRAINT) => {
                Err(crime_id_conflict(&report.crime_id))
            }
            other => other.with_context(|| format!("Failed to update crime report {}", report.id)),
        }
    }

    async fn delete_report(&mut self, id: Uuid) -> Result<Option<CrimeReport>, AppError> {
        sqlx::query_as::<_, CrimeReport>("DELETE FROM crime_reports WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to delete crime report {}", id))
    }

    async fn crime_id_taken(&mut self, crime_id: &str, except: Uuid) -> Result<bool, AppError> {
        let (taken,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM crime_reports WHERE crime_id = $1 AND id <> $2)",
        )
        .bind(crime_id)
        .bind(except)
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to check crime_id uniqueness")?;
        Ok(taken)
    }

    async fn find_location(&mut self, id: Uuid) -> Result<Option<Location>, AppError> {
        sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to load location {}", id))
    }

    async fn update_location(&mut self, location: &Location) -> Result<Location, AppError> {
        sqlx::query_as::<_, Location>(
            r#"
            UPDATE locations
            SET house_building_number = $2,
                street_name = $3,
                purok_block_lot = $4,
                barangay = $5,
                municipality_city = $6,
                province = $7,
                region = $8,
                zip_code = $9,
                latitude = $10,
                longitude = $11,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(location.id)
        .bind(location.house_building_number.as_deref())
        .bind(&location.street_name)
        .bind(location.purok_block_lot.as_deref())
        .bind(&location.barangay)
        .bind(&location.municipality_city)
        .bind(&location.province)
        .bind(location.region.as_deref())
        .bind(location.zip_code.as_deref())
        .bind(location.latitude)
        .bind(location.longitude)
        .fetch_one(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to update location {}", location.id))
    }

    async fn location_in_use(&mut self, id: Uuid) -> Result<bool, AppError> {
        let (in_use,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM crime_reports WHERE location_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to check location references")?;
        Ok(in_use)
    }

    async fn delete_location(&mut self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to delete location {}", id))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_crime_type(&mut self, id: Uuid) -> Result<Option<CrimeType>, AppError> {
        sqlx::query_as::<_, CrimeType>("SELECT * FROM crime_types WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to load crime type {}", id))
    }

    async fn find_crime_type_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<CrimeType>, AppError> {
        sqlx::query_as::<_, CrimeType>(
            "SELECT * FROM crime_types WHERE lower(crime_type) = lower($1) LIMIT 1",
        )
        .bind(name.trim())
        .fetch_optional(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to look up crime type '{}'", name))
    }

    async fn create_crime_type(
        &mut self,
        name: &str,
        category: &str,
    ) -> Result<CrimeType, AppError> {
        // The unique index on lower(crime_type) makes a concurrent insert of the
        // same name wait, then fall through to the re-read below.
        let inserted = sqlx::query_as::<_, CrimeType>(
            r#"
            INSERT INTO crime_types (id, crime_type, crime_type_category)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name.trim())
        .bind(category.trim())
        .fetch_optional(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to create crime type '{}'", name))?;

        match inserted {
            Some(crime_type) => Ok(crime_type),
            None => self.find_crime_type_by_name(name).await?.ok_or_else(|| {
                AppError::Integrity(format!(
                    "Crime type '{}' conflicted on insert but could not be read back",
                    name
                ))
            }),
        }
    }

    async fn crime_type_in_use(&mut self, id: Uuid) -> Result<bool, AppError> {
        let (in_use,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM crime_reports WHERE crime_type_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to check crime type references")?;
        Ok(in_use)
    }

    async fn delete_crime_type(&mut self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM crime_types WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to delete crime type {}", id))?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx
            .commit()
            .await
            .context("Failed to commit transaction")
    }
}
