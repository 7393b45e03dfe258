//! # Contact Ledger Repository
//!
//! Reads and writes ledger rows. Every method is a single statement or a
//! single short transaction, so a crash mid-batch loses at most one row's
//! update.
//!
//! ## Status Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Method               sync_status          Other columns               │
//! │  ───────────────────  ───────────────────  ─────────────────────────── │
//! │  upsert_from_erp      new → pending        ERP copies, derived phone   │
//! │                       sent → sent                                      │
//! │                       else → pending                                   │
//! │  mark_sent            → sent               response, synced_at,        │
//! │                                            last_error = NULL           │
//! │  mark_error           → error              last_error                  │
//! │  insert_imported      → sent               synced_at, origin payload   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use ledger_core::{ContactRecord, ErpContactFields, ImportedContact, StatusCounts, SyncStatus};

/// Column list matching [`ContactRecord`]'s `FromRow` layout.
const COLUMNS: &str = "id, erp_contact_id, name, email, phone, mobile, preferred_whatsapp, \
     vat, is_company, erp_write_date, sync_status, last_sync_response, last_error, \
     erp_error, synced_at, created_at, updated_at";

/// What an ERP upsert did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was inserted as pending.
    Created { id: i64 },
    /// An existing row was refreshed.
    Updated { id: i64, status: SyncStatus },
}

/// Repository for contact ledger rows.
#[derive(Debug, Clone)]
pub struct ContactLedgerRepository {
    pool: SqlitePool,
}

impl ContactLedgerRepository {
    /// Creates a new ContactLedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ContactLedgerRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a row by local id.
    pub async fn get(&self, id: i64) -> DbResult<ContactRecord> {
        let sql = format!("SELECT {COLUMNS} FROM contact_ledger WHERE id = ?1");

        sqlx::query_as::<_, ContactRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("ContactRecord", id))
    }

    /// Gets the row linked to an ERP contact, if any.
    pub async fn find_by_erp_id(&self, erp_contact_id: i64) -> DbResult<Option<ContactRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM contact_ledger WHERE erp_contact_id = ?1");

        let row = sqlx::query_as::<_, ContactRecord>(&sql)
            .bind(erp_contact_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Selects rows to deliver, oldest local id first.
    ///
    /// ## Arguments
    /// * `limit` - Maximum rows to return
    /// * `include_errors` - Also select rows whose last attempt failed
    pub async fn select_for_push(
        &self,
        limit: u32,
        include_errors: bool,
    ) -> DbResult<Vec<ContactRecord>> {
        let filter = if include_errors {
            "sync_status IN ('pending', 'error')"
        } else {
            "sync_status = 'pending'"
        };
        let sql = format!(
            "SELECT {COLUMNS} FROM contact_ledger WHERE {filter} ORDER BY id ASC LIMIT ?1"
        );

        let rows = sqlx::query_as::<_, ContactRecord>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Returns true when any row carries this phone in
    /// `preferred_whatsapp`, `phone` or `mobile`.
    pub async fn exists_by_phone(&self, phone: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM contact_ledger
            WHERE preferred_whatsapp = ?1 OR phone = ?1 OR mobile = ?1
            LIMIT 1
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    /// Pages through the ledger by local id.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<ContactRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM contact_ledger ORDER BY id ASC LIMIT ?1 OFFSET ?2");

        let rows = sqlx::query_as::<_, ContactRecord>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Counts rows per status.
    pub async fn count_by_status(&self) -> DbResult<StatusCounts> {
        let rows: Vec<(SyncStatus, i64)> = sqlx::query_as(
            "SELECT sync_status, COUNT(*) FROM contact_ledger GROUP BY sync_status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            counts.add(status, count);
        }
        Ok(counts)
    }

    // =========================================================================
    // ERP Pull
    // =========================================================================

    /// Inserts or refreshes the row for one ERP contact.
    ///
    /// ## Rules
    /// - Unknown ERP id: insert as `pending`
    /// - Known ERP id: overwrite the ERP copies and the derived phone;
    ///   status becomes `pending` unless the row is already `sent`
    ///
    /// Runs in its own transaction so the lookup and the write agree.
    pub async fn upsert_from_erp(&self, fields: &ErpContactFields) -> DbResult<UpsertOutcome> {
        let now = Utc::now();
        let preferred = fields.preferred_whatsapp();

        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64, SyncStatus)> = sqlx::query_as(
            "SELECT id, sync_status FROM contact_ledger WHERE erp_contact_id = ?1",
        )
        .bind(fields.erp_contact_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            None => {
                let id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO contact_ledger (
                        erp_contact_id, name, email, phone, mobile, preferred_whatsapp,
                        vat, is_company, erp_write_date, sync_status, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                    RETURNING id
                    "#,
                )
                .bind(fields.erp_contact_id)
                .bind(&fields.name)
                .bind(&fields.email)
                .bind(&fields.phone)
                .bind(&fields.mobile)
                .bind(&preferred)
                .bind(&fields.vat)
                .bind(fields.is_company)
                .bind(fields.erp_write_date)
                .bind(SyncStatus::Pending)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;

                UpsertOutcome::Created { id }
            }
            Some((id, current)) => {
                let status = current.after_erp_refresh();

                sqlx::query(
                    r#"
                    UPDATE contact_ledger SET
                        name = ?2,
                        email = ?3,
                        phone = ?4,
                        mobile = ?5,
                        preferred_whatsapp = ?6,
                        vat = ?7,
                        is_company = ?8,
                        erp_write_date = ?9,
                        sync_status = ?10,
                        updated_at = ?11
                    WHERE id = ?1
                    "#,
                )
                .bind(id)
                .bind(&fields.name)
                .bind(&fields.email)
                .bind(&fields.phone)
                .bind(&fields.mobile)
                .bind(&preferred)
                .bind(&fields.vat)
                .bind(fields.is_company)
                .bind(fields.erp_write_date)
                .bind(status)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                UpsertOutcome::Updated { id, status }
            }
        };

        tx.commit().await?;

        debug!(erp_contact_id = fields.erp_contact_id, ?outcome, "Upserted ERP contact");
        Ok(outcome)
    }

    // =========================================================================
    // Messaging Push
    // =========================================================================

    /// Records a successful delivery.
    ///
    /// ## Arguments
    /// * `id` - Local row id
    /// * `response` - JSON text of the messaging platform's reply
    pub async fn mark_sent(&self, id: i64, response: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE contact_ledger SET
                sync_status = ?2,
                last_sync_response = ?3,
                last_error = NULL,
                synced_at = ?4,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(SyncStatus::Sent)
        .bind(response)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ContactRecord", id));
        }
        Ok(())
    }

    /// Records a failed or impossible delivery.
    pub async fn mark_error(&self, id: i64, message: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE contact_ledger SET
                sync_status = ?2,
                last_error = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(SyncStatus::Error)
        .bind(message)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ContactRecord", id));
        }
        Ok(())
    }

    // =========================================================================
    // Messaging Import
    // =========================================================================

    /// Stores a contact first seen on the messaging platform.
    ///
    /// The row is already delivered, so it is written as `sent` with
    /// `synced_at` stamped.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - the ERP id is owned by another row
    pub async fn insert_imported(&self, contact: &ImportedContact) -> DbResult<ContactRecord> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO contact_ledger (
                erp_contact_id, name, email, phone, mobile, preferred_whatsapp,
                is_company, sync_status, last_sync_response, erp_error,
                synced_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?4, ?4, 0, ?5, ?6, ?7, ?8, ?8, ?8)
            RETURNING {COLUMNS}
            "#
        );

        let record = sqlx::query_as::<_, ContactRecord>(&sql)
            .bind(contact.erp_contact_id)
            .bind(&contact.name)
            .bind(&contact.email)
            .bind(&contact.phone)
            .bind(SyncStatus::Sent)
            .bind(&contact.origin)
            .bind(&contact.erp_error)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                    field,
                    value: contact
                        .erp_contact_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                },
                other => other,
            })?;

        debug!(id = record.id, phone = %contact.phone, "Inserted imported contact");
        Ok(record)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
