//! # Ledger → Messaging Push
//!
//! Delivers pending ledger rows to the messaging platform.
//!
//! ```text
//! select_for_push(limit, retry_errors)        oldest id first
//!   for row:
//!     no preferred_whatsapp  → mark_error   (no remote call)
//!     add_contact(phone, name, [email, vat, odoo_contact_id])
//!       ok                   → mark_sent(receipt)
//!       err                  → mark_error(err)
//! ```
//!
//! Every row gets at most one attempt per run.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use ledger_core::{ContactRecord, DEFAULT_FALLBACK_NAME, ERP_ID_ATTRIBUTE};
use ledger_db::Database;

use crate::error::SyncResult;
use crate::gateway::MessagingDirectory;
use crate::messaging::CustomAttribute;

/// Stored on rows that can never be delivered.
pub const MISSING_PHONE_ERROR: &str = "Contact has no phone or mobile to send to the messaging platform.";

/// Options for one push run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOptions {
    /// Rows to attempt, at least 1.
    pub limit: u32,
    /// Also attempt rows in `error`.
    pub retry_errors: bool,
    /// Name sent for rows without one.
    pub fallback_name: String,
}

impl Default for PushOptions {
    fn default() -> Self {
        PushOptions {
            limit: 150,
            retry_errors: false,
            fallback_name: DEFAULT_FALLBACK_NAME.to_string(),
        }
    }
}

/// Outcome of a push run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReport {
    pub sent: u32,
    pub failed: u32,
}

/// Custom attributes carried with every delivered contact.
pub fn contact_attributes(record: &ContactRecord) -> Vec<CustomAttribute> {
    vec![
        CustomAttribute::new("email", record.email.clone().unwrap_or_default()),
        CustomAttribute::new("vat", record.vat.clone().unwrap_or_default()),
        CustomAttribute::new(
            ERP_ID_ATTRIBUTE,
            record
                .erp_contact_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        ),
    ]
}

/// Runs one ledger → messaging push.
///
/// ## Errors
/// Only the initial selection can fail the run; row failures are recorded
/// on the rows.
pub async fn run_messaging_push(
    db: &Database,
    messaging: &dyn MessagingDirectory,
    options: &PushOptions,
) -> SyncResult<PushReport> {
    let contacts = db.contacts();
    let rows = contacts
        .select_for_push(options.limit.max(1), options.retry_errors)
        .await?;

    let mut report = PushReport::default();
    if rows.is_empty() {
        info!("No pending contacts to push");
        return Ok(report);
    }

    debug!(rows = rows.len(), retry_errors = options.retry_errors, "Pushing contacts");

    for record in &rows {
        let Some(phone) = record.delivery_phone() else {
            warn!(id = record.id, "Contact has no phone, marking error");
            if let Err(e) = contacts.mark_error(record.id, MISSING_PHONE_ERROR).await {
                error!(id = record.id, error = %e, "Failed to record push error");
            }
            report.failed += 1;
            continue;
        };

        let name = record.display_name(&options.fallback_name);
        let attributes = contact_attributes(record);

        match messaging.add_contact(phone, name, &attributes).await {
            Ok(receipt) => {
                match contacts.mark_sent(record.id, &receipt.to_json_text()).await {
                    Ok(()) => report.sent += 1,
                    Err(e) => {
                        error!(id = record.id, error = %e, "Delivered but failed to mark sent");
                        report.failed += 1;
                    }
                }
            }
            Err(e) => {
                warn!(id = record.id, %phone, error = %e, "Push failed");
                if let Err(db_err) = contacts.mark_error(record.id, &e.to_string()).await {
                    error!(id = record.id, error = %db_err, "Failed to record push error");
                }
                report.failed += 1;
            }
        }
    }

    info!(sent = report.sent, failed = report.failed, "Messaging push finished");
    Ok(report)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::erp_pull::{run_erp_pull, PullOptions};
    use crate::test_support::{erp_contact, memory_db, FakeErp, FakeMessaging};
    use ledger_core::{ErpContactFields, SyncStatus};

    async fn seed(db: &Database, erp_id: i64, mobile: Option<&str>) -> i64 {
        let fields = ErpContactFields {
            erp_contact_id: erp_id,
            name: Some(format!("Contact {erp_id}")),
            mobile: mobile.map(str::to_string),
            ..Default::default()
        };
        match db.contacts().upsert_from_erp(&fields).await.unwrap() {
            ledger_db::UpsertOutcome::Created { id } => id,
            other => panic!("expected a new row, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_row_without_phone_is_isolated() {
        let db = memory_db().await;
        let a = seed(&db, 1, Some("04141111111")).await;
        let b = seed(&db, 2, None).await;
        let c = seed(&db, 3, Some("04143333333")).await;
        let messaging = FakeMessaging::default();

        let report = run_messaging_push(&db, &messaging, &PushOptions::default())
            .await
            .unwrap();

        assert_eq!(report, PushReport { sent: 2, failed: 1 });
        assert_eq!(messaging.delivered().len(), 2);

        let repo = db.contacts();
        assert_eq!(repo.get(a).await.unwrap().sync_status, SyncStatus::Sent);
        assert_eq!(repo.get(c).await.unwrap().sync_status, SyncStatus::Sent);
        let failed = repo.get(b).await.unwrap();
        assert_eq!(failed.sync_status, SyncStatus::Error);
        assert_eq!(failed.last_error.as_deref(), Some(MISSING_PHONE_ERROR));
    }

    #[tokio::test]
    async fn test_remote_failure_marks_error_and_continues() {
        let db = memory_db().await;
        let a = seed(&db, 1, Some("000")).await;
        let b = seed(&db, 2, Some("04142222222")).await;
        let mut messaging = FakeMessaging::default();
        messaging.rejected_phones.insert("000".into());

        let report = run_messaging_push(&db, &messaging, &PushOptions::default())
            .await
            .unwrap();

        assert_eq!(report, PushReport { sent: 1, failed: 1 });
        let failed = db.contacts().get(a).await.unwrap();
        assert_eq!(failed.sync_status, SyncStatus::Error);
        assert!(failed.last_error.unwrap().contains("HTTP 400"));
        assert_eq!(db.contacts().get(b).await.unwrap().sync_status, SyncStatus::Sent);
    }

    #[tokio::test]
    async fn test_error_rows_only_retried_on_request() {
        let db = memory_db().await;
        let a = seed(&db, 1, Some("04141111111")).await;
        db.contacts().mark_error(a, "earlier failure").await.unwrap();
        let messaging = FakeMessaging::default();

        let report = run_messaging_push(&db, &messaging, &PushOptions::default())
            .await
            .unwrap();
        assert_eq!(report, PushReport::default());

        let retry = PushOptions {
            retry_errors: true,
            ..Default::default()
        };
        let report = run_messaging_push(&db, &messaging, &retry).await.unwrap();
        assert_eq!(report.sent, 1);

        let row = db.contacts().get(a).await.unwrap();
        assert_eq!(row.sync_status, SyncStatus::Sent);
        assert_eq!(row.last_error, None);
    }

    #[tokio::test]
    async fn test_limit_and_order() {
        let db = memory_db().await;
        for erp_id in 1..=4 {
            seed(&db, erp_id, Some(&format!("0414000000{erp_id}"))).await;
        }
        let messaging = FakeMessaging::default();
        let options = PushOptions {
            limit: 2,
            ..Default::default()
        };

        run_messaging_push(&db, &messaging, &options).await.unwrap();

        let phones: Vec<String> = messaging.delivered().into_iter().map(|d| d.0).collect();
        assert_eq!(phones, vec!["04140000001", "04140000002"]);
    }

    #[tokio::test]
    async fn test_pull_then_push_end_to_end() {
        let db = memory_db().await;
        let erp = FakeErp::new(vec![erp_contact(41, "Ana", None, Some("+58 424-229 0660"))]);
        let messaging = FakeMessaging::default();

        run_erp_pull(&db, &erp, PullOptions::default()).await.unwrap();
        let row = db.contacts().find_by_erp_id(41).await.unwrap().unwrap();
        assert_eq!(row.preferred_whatsapp.as_deref(), Some("+584242290660"));
        assert_eq!(row.sync_status, SyncStatus::Pending);

        let report = run_messaging_push(&db, &messaging, &PushOptions::default())
            .await
            .unwrap();
        assert_eq!(report.sent, 1);

        let row = db.contacts().get(row.id).await.unwrap();
        assert_eq!(row.sync_status, SyncStatus::Sent);
        assert!(row.synced_at.is_some());
        assert_eq!(row.last_error, None);

        let (phone, name, attributes) = messaging.delivered().remove(0);
        assert_eq!(phone, "+584242290660");
        assert_eq!(name, "Ana");
        assert_eq!(attributes[2], CustomAttribute::new(ERP_ID_ATTRIBUTE, "41"));
    }
}
