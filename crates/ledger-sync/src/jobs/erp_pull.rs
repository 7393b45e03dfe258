//! # ERP → Ledger Pull
//!
//! Pages through the ERP's contacts and upserts them into the ledger.
//!
//! ```text
//! offset = 0
//! loop:
//!   page = fetch_contacts_page(batch, offset)      ── error: abort run
//!   page empty                      → stop
//!   for row in page:
//!     processed == max_total        → stop (mid-page)
//!     no integer id                 → skipped
//!     upsert_from_erp(row)          → created | updated
//!   page shorter than batch         → stop
//!   processed == max_total          → stop (no extra fetch)
//!   offset += batch
//! ```
//!
//! Offset paging over ascending ids can skip or repeat a row when the ERP
//! changes during the run. The next run picks it up.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use ledger_core::validation::clamp_limit;
use ledger_db::{Database, UpsertOutcome};

use crate::erp::CONTACT_PAGE_MAX;
use crate::error::SyncResult;
use crate::gateway::ErpDirectory;

/// Options for one pull run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullOptions {
    /// ERP page size, clamped to `[1, 1000]`.
    pub batch_size: u32,
    /// Stop after this many upserted rows. 0 means no limit.
    pub max_total: u32,
}

impl Default for PullOptions {
    fn default() -> Self {
        PullOptions {
            batch_size: 500,
            max_total: 0,
        }
    }
}

/// Outcome of a pull run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullReport {
    /// Rows written to the ledger.
    pub processed: u32,
    pub created: u32,
    pub updated: u32,
    /// Rows without a usable id, or whose write failed.
    pub skipped: u32,
}

impl PullReport {
    fn limit_reached(&self, max_total: u32) -> bool {
        max_total > 0 && self.processed >= max_total
    }
}

/// Runs one ERP → ledger pull.
///
/// ## Errors
/// A page fetch failure aborts the run; rows already written stay written.
pub async fn run_erp_pull(
    db: &Database,
    erp: &dyn ErpDirectory,
    options: PullOptions,
) -> SyncResult<PullReport> {
    let batch = clamp_limit(options.batch_size, 1, CONTACT_PAGE_MAX);
    let contacts = db.contacts();
    let mut report = PullReport::default();
    let mut offset: u32 = 0;

    'pages: loop {
        let page = erp.fetch_contacts_page(batch, offset).await?;
        if page.is_empty() {
            break;
        }

        debug!(offset, rows = page.len(), "Processing ERP contacts page");

        for contact in &page {
            if report.limit_reached(options.max_total) {
                break 'pages;
            }

            let Some(fields) = contact.to_ledger_fields() else {
                warn!(name = ?contact.name, "ERP contact without a usable id, skipping");
                report.skipped += 1;
                continue;
            };

            match contacts.upsert_from_erp(&fields).await {
                Ok(UpsertOutcome::Created { id }) => {
                    debug!(erp_id = fields.erp_contact_id, id, "Ledger row created");
                    report.created += 1;
                    report.processed += 1;
                }
                Ok(UpsertOutcome::Updated { id, status }) => {
                    debug!(erp_id = fields.erp_contact_id, id, %status, "Ledger row refreshed");
                    report.updated += 1;
                    report.processed += 1;
                }
                Err(e) => {
                    error!(erp_id = fields.erp_contact_id, error = %e, "Failed to store ERP contact");
                    report.skipped += 1;
                }
            }
        }

        if page.len() < batch as usize || report.limit_reached(options.max_total) {
            break;
        }
        offset += batch;
    }

    info!(
        processed = report.processed,
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        "ERP pull finished"
    );
    Ok(report)
}

// =============================================================================
// Unit Tests
// =============================================================================
