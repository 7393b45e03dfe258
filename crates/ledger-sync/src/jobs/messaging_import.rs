//! # Messaging → Ledger/ERP Import
//!
//! Brings contacts that only exist on the messaging platform into the
//! ledger, and links or creates them in the ERP.
//!
//! ```text
//! page = 1
//! loop:
//!   max_pages reached                   → stop
//!   list_contacts(page_size, page)      ── error: abort run
//!   page empty                          → stop
//!   for contact:
//!     no usable phone                   → skipped
//!     phone already in ledger           → already_existing
//!     find_contact_by_phone_or_email
//!       └─ none → create_contact        → erp_created
//!       └─ error / id owned elsewhere   → erp_failed (row kept, unlinked)
//!     insert_imported (status = sent)   → inserted
//!   !has_more or short page             → stop
//!   page += 1
//! ```

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use ledger_core::validation::{clamp_limit, normalize_phone};
use ledger_core::{ImportedContact, DEFAULT_FALLBACK_NAME};
use ledger_db::{ContactLedgerRepository, Database};

use crate::erp::NewErpContact;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{ErpDirectory, MessagingDirectory};
use crate::messaging::{MessagingContact, MAX_PAGE_SIZE};

/// Prefix of every ERP-link failure stored on an imported row.
pub const ERP_FAILURE_PREFIX: &str = "Could not sync to ERP: ";

/// `source` tag in the origin payload of imported rows.
pub const IMPORT_SOURCE: &str = "messaging_list_contacts";

/// Options for one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Listing page size, clamped to `[1, 500]`.
    pub page_size: u32,
    /// Pages to read. 0 means until the listing ends.
    pub max_pages: u32,
    /// Name used for contacts without one.
    pub fallback_name: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            page_size: 100,
            max_pages: 2,
            fallback_name: DEFAULT_FALLBACK_NAME.to_string(),
        }
    }
}

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Listing pages fetched.
    pub pages: u32,
    pub inserted: u32,
    /// Phone already present in the ledger.
    pub already_existing: u32,
    pub erp_created: u32,
    /// Rows stored without an ERP link.
    pub erp_failed: u32,
    /// Rows without a usable phone, or whose write failed.
    pub skipped: u32,
}

/// Where an ERP link attempt ended.
enum ErpLink {
    Linked { erp_contact_id: i64 },
    Failed { message: String },
}

/// Runs one messaging → ledger/ERP import.
///
/// ## Errors
/// A listing failure aborts the run; rows already stored stay stored.
pub async fn run_messaging_import(
    db: &Database,
    messaging: &dyn MessagingDirectory,
    erp: &dyn ErpDirectory,
    options: &ImportOptions,
) -> SyncResult<ImportReport> {
    let page_size = clamp_limit(options.page_size, 1, MAX_PAGE_SIZE);
    let contacts = db.contacts();
    let mut report = ImportReport::default();
    let mut page_number: u32 = 1;

    loop {
        if options.max_pages > 0 && page_number > options.max_pages {
            break;
        }

        let page = messaging.list_contacts(page_size, page_number).await?;
        report.pages += 1;
        if page.is_empty() {
            break;
        }

        debug!(page = page_number, rows = page.len(), "Processing messaging contacts page");

        for contact in &page.contacts {
            import_one(&contacts, erp, contact, &options.fallback_name, &mut report).await;
        }

        if !page.has_more || page.len() < page_size as usize {
            break;
        }
        page_number += 1;
    }

    info!(
        pages = report.pages,
        inserted = report.inserted,
        already_existing = report.already_existing,
        erp_created = report.erp_created,
        erp_failed = report.erp_failed,
        skipped = report.skipped,
        "Messaging import finished"
    );
    Ok(report)
}

async fn import_one(
    contacts: &ContactLedgerRepository,
    erp: &dyn ErpDirectory,
    contact: &MessagingContact,
    fallback_name: &str,
    report: &mut ImportReport,
) {
    let Some(phone) = contact.phone().and_then(normalize_phone) else {
        report.skipped += 1;
        return;
    };
    let name = contact.display_name().unwrap_or(fallback_name).to_string();
    let email = contact.email().map(str::to_string);

    match contacts.exists_by_phone(&phone).await {
        Ok(true) => {
            debug!(%phone, "Contact already in ledger");
            report.already_existing += 1;
            return;
        }
        Ok(false) => {}
        Err(e) => {
            error!(%phone, error = %e, "Ledger lookup failed, skipping contact");
            report.skipped += 1;
            return;
        }
    }

    let new_contact = NewErpContact {
        name: name.clone(),
        email: email.clone(),
        phone: Some(phone.clone()),
        mobile: Some(phone.clone()),
    };

    let link = match link_in_erp(erp, &new_contact, report).await {
        Ok(erp_contact_id) => match contacts.find_by_erp_id(erp_contact_id).await {
            Ok(None) => ErpLink::Linked { erp_contact_id },
            Ok(Some(owner)) => ErpLink::Failed {
                message: format!(
                    "{ERP_FAILURE_PREFIX}ERP contact {erp_contact_id} is already linked to ledger row {}",
                    owner.id
                ),
            },
            Err(e) => ErpLink::Failed {
                message: format!("{ERP_FAILURE_PREFIX}{e}"),
            },
        },
        Err(e) => ErpLink::Failed {
            message: format!("{ERP_FAILURE_PREFIX}{e}"),
        },
    };

    let (erp_contact_id, erp_error) = match link {
        ErpLink::Linked { erp_contact_id } => (Some(erp_contact_id), None),
        ErpLink::Failed { message } => {
            warn!(%phone, error = %message, "Imported contact left unlinked");
            report.erp_failed += 1;
            (None, Some(message))
        }
    };

    let imported = ImportedContact {
        name,
        email,
        phone: phone.clone(),
        erp_contact_id,
        erp_error,
        origin: json!({ "source": IMPORT_SOURCE, "row": contact.raw() }).to_string(),
    };

    match contacts.insert_imported(&imported).await {
        Ok(record) => {
            debug!(id = record.id, %phone, erp_id = ?record.erp_contact_id, "Imported contact");
            report.inserted += 1;
        }
        Err(e) => {
            error!(%phone, error = %e, "Failed to store imported contact");
            report.skipped += 1;
        }
    }
}

/// Finds the contact in the ERP by phone or email, creating it when absent.
async fn link_in_erp(
    erp: &dyn ErpDirectory,
    contact: &NewErpContact,
    report: &mut ImportReport,
) -> SyncResult<i64> {
    let found = erp
        .find_contact_by_phone_or_email(contact.phone.as_deref(), contact.email.as_deref())
        .await?;

    if let Some(id) = found {
        return Ok(id);
    }

    let id = erp.create_contact(contact).await?;
    if id <= 0 {
        return Err(SyncError::remote(None, &format!("invalid ERP id {id}")));
    }
    report.erp_created += 1;
    Ok(id)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, FakeErp, FakeMessaging};
    use ledger_core::{ErpContactFields, SyncStatus};
    use serde_json::Value;

    fn row(name: &str, phone: &str) -> Value {
        json!({ "fullName": name, "whatsappNumber": phone })
    }

    fn options(page_size: u32, max_pages: u32) -> ImportOptions {
        ImportOptions {
            page_size,
            max_pages,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_new_contact_is_stored_sent_and_created_in_erp() {
        let db = memory_db().await;
        let messaging = FakeMessaging::with_pages(vec![(
            vec![row("Luis", "+58 412 000 1111")],
            false,
        )]);
        let erp = FakeErp::new(vec![]);

        let report = run_messaging_import(&db, &messaging, &erp, &options(100, 0))
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.erp_created, 1);
        assert_eq!(report.erp_failed, 0);

        let created = erp.created();
        assert_eq!(created[0].phone.as_deref(), Some("+584120001111"));
        assert_eq!(created[0].name, "Luis");

        let row = db.contacts().find_by_erp_id(1000).await.unwrap().unwrap();
        assert_eq!(row.sync_status, SyncStatus::Sent);
        assert!(row.synced_at.is_some());
        assert_eq!(row.last_error, None);
        assert_eq!(row.preferred_whatsapp.as_deref(), Some("+584120001111"));

        let origin: Value = serde_json::from_str(row.last_sync_response.as_deref().unwrap()).unwrap();
        assert_eq!(origin["source"], IMPORT_SOURCE);
        assert_eq!(origin["row"]["fullName"], "Luis");
    }

    #[tokio::test]
    async fn test_existing_mobile_is_not_duplicated() {
        let db = memory_db().await;
        db.contacts()
            .upsert_from_erp(&ErpContactFields {
                erp_contact_id: 5,
                mobile: Some("+584242290660".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let messaging =
            FakeMessaging::with_pages(vec![(vec![row("Ana", "+58 424-229 0660")], false)]);
        let erp = FakeErp::new(vec![]);

        let report = run_messaging_import(&db, &messaging, &erp, &options(100, 0))
            .await
            .unwrap();

        assert_eq!(report.already_existing, 1);
        assert_eq!(report.inserted, 0);
        assert_eq!(db.contacts().count_by_status().await.unwrap().total(), 1);
        assert!(erp.created().is_empty());
    }

    #[tokio::test]
    async fn test_known_erp_contact_is_linked_without_create() {
        let db = memory_db().await;
        let messaging = FakeMessaging::with_pages(vec![(
            vec![json!({ "name": "Eva", "phone": "0414 777 8888", "email": "eva@test" })],
            false,
        )]);
        let erp = FakeErp::new(vec![]).with_partner("eva@test", 64);

        let report = run_messaging_import(&db, &messaging, &erp, &options(100, 0))
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.erp_created, 0);
        let row = db.contacts().find_by_erp_id(64).await.unwrap().unwrap();
        assert_eq!(row.email.as_deref(), Some("eva@test"));
    }

    #[tokio::test]
    async fn test_erp_failure_keeps_row_unlinked() {
        let db = memory_db().await;
        let messaging = FakeMessaging::with_pages(vec![(vec![row("", "0414 123")], false)]);
        let mut erp = FakeErp::new(vec![]);
        erp.fail_lookups = true;

        let report = run_messaging_import(&db, &messaging, &erp, &options(100, 0))
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.erp_failed, 1);

        let row = db.contacts().list(10, 0).await.unwrap().remove(0);
        assert_eq!(row.erp_contact_id, None);
        assert_eq!(row.name.as_deref(), Some(DEFAULT_FALLBACK_NAME));
        assert_eq!(row.sync_status, SyncStatus::Sent);
        assert_eq!(row.last_error, None);
        assert!(row.erp_error.unwrap().starts_with(ERP_FAILURE_PREFIX));
    }

    #[tokio::test]
    async fn test_erp_id_owned_by_another_row_is_not_reused() {
        let db = memory_db().await;
        db.contacts()
            .upsert_from_erp(&ErpContactFields {
                erp_contact_id: 64,
                phone: Some("02125550000".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let messaging = FakeMessaging::with_pages(vec![(
            vec![json!({ "name": "Eva", "phone": "0414 777 8888", "email": "eva@test" })],
            false,
        )]);
        let erp = FakeErp::new(vec![]).with_partner("eva@test", 64);

        let report = run_messaging_import(&db, &messaging, &erp, &options(100, 0))
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.erp_failed, 1);
        let counts = db.contacts().count_by_status().await.unwrap();
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn test_rows_without_phone_are_skipped() {
        let db = memory_db().await;
        let messaging = FakeMessaging::with_pages(vec![(
            vec![json!({ "name": "No phone" }), json!({ "name": "Dashes", "phone": "--" })],
            false,
        )]);
        let erp = FakeErp::new(vec![]);

        let report = run_messaging_import(&db, &messaging, &erp, &options(100, 0))
            .await
            .unwrap();

        assert_eq!(report.skipped, 2);
        assert_eq!(report.inserted, 0);
    }

    #[tokio::test]
    async fn test_paging_stops_on_has_more_short_page_and_max_pages() {
        let full = |start: u32| -> Vec<Value> {
            (start..start + 2)
                .map(|n| row(&format!("C{n}"), &format!("0414000{n:04}")))
                .collect()
        };

        // has_more false ends the run after page 1.
        let db = memory_db().await;
        let messaging = FakeMessaging::with_pages(vec![(full(0), false), (full(2), true)]);
        run_messaging_import(&db, &messaging, &FakeErp::new(vec![]), &options(2, 0))
            .await
            .unwrap();
        assert_eq!(messaging.list_calls(), vec![(2, 1)]);

        // A short page ends the run.
        let db = memory_db().await;
        let messaging = FakeMessaging::with_pages(vec![
            (full(0), true),
            (vec![row("Last", "04149999999")], true),
            (full(10), true),
        ]);
        let report = run_messaging_import(&db, &messaging, &FakeErp::new(vec![]), &options(2, 0))
            .await
            .unwrap();
        assert_eq!(report.inserted, 3);
        assert_eq!(messaging.list_calls(), vec![(2, 1), (2, 2)]);

        // max_pages is checked before fetching.
        let db = memory_db().await;
        let messaging =
            FakeMessaging::with_pages(vec![(full(0), true), (full(2), true), (full(4), true)]);
        let report = run_messaging_import(&db, &messaging, &FakeErp::new(vec![]), &options(2, 2))
            .await
            .unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(messaging.list_calls(), vec![(2, 1), (2, 2)]);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_run() {
        let db = memory_db().await;
        let mut messaging = FakeMessaging::with_pages(vec![(vec![row("A", "0414")], true)]);
        messaging.failing_pages.insert(1);

        let result = run_messaging_import(&db, &messaging, &FakeErp::new(vec![]), &options(1, 0)).await;

        assert!(matches!(result, Err(SyncError::Transport(_))));
    }
}
