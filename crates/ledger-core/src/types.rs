//! # Domain Types
//!
//! The contact ledger record and the rows returned by the search operations.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌─────────────────┐                        │
//! │  │    ContactRecord     │   │   SyncStatus    │                        │
//! │  │  ──────────────────  │   │  ─────────────  │                        │
//! │  │  id (local, i64)     │   │  Pending        │                        │
//! │  │  erp_contact_id      │──►│  Sent           │                        │
//! │  │  preferred_whatsapp  │   │  Error          │                        │
//! │  │  sync_status         │   └─────────────────┘                        │
//! │  └──────────────────────┘                                              │
//! │                                                                         │
//! │  ┌──────────────────────┐   ┌──────────────────────┐                   │
//! │  │   ContactSummary     │   │      ProductHit      │                   │
//! │  │  (contact search)    │   │   (smart search)     │                   │
//! │  └──────────────────────┘   └──────────────────────┘                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! - `id`: local identity, assigned by the ledger, never reused
//! - `erp_contact_id`: the ERP's identity, unique when present, null until linked

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::validation::{non_blank, preferred_whatsapp};

// =============================================================================
// Sync Status
// =============================================================================

/// Delivery state of a ledger row towards the messaging platform.
///
/// ## State Machine
/// ```text
///                 push ok
///   ┌─────────┐ ──────────► ┌─────────┐
///   │ PENDING │             │  SENT   │ ◄── rows imported from messaging
///   └─────────┘ ◄─┐         └─────────┘
///      │          │ ERP pull (only when not SENT)
///      │ push     │
///      │ failed   │
///      ▼          │
///   ┌─────────┐ ──┘
///   │  ERROR  │ ◄── push failed again / no phone
///   └─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
pub enum SyncStatus {
    /// Needs to be pushed.
    #[default]
    Pending,
    /// Confirmed present on the messaging platform.
    Sent,
    /// Last attempt failed, or can never succeed as stored.
    Error,
}

impl SyncStatus {
    /// All states, in display order.
    pub const ALL: [SyncStatus; 3] = [SyncStatus::Pending, SyncStatus::Sent, SyncStatus::Error];

    /// Returns the stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Sent => "sent",
            SyncStatus::Error => "error",
        }
    }

    /// Status a row takes after an ERP refresh.
    ///
    /// A row already delivered stays delivered; anything else is queued again.
    pub fn after_erp_refresh(self) -> SyncStatus {
        match self {
            SyncStatus::Sent => SyncStatus::Sent,
            SyncStatus::Pending | SyncStatus::Error => SyncStatus::Pending,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "sent" => Ok(SyncStatus::Sent),
            "error" => Ok(SyncStatus::Error),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Contact Record
// =============================================================================

/// One row of the contact ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ContactRecord {
    /// Local identity (autoincrement, never reused).
    #[ts(type = "number")]
    pub id: i64,

    /// ERP identity once linked.
    #[ts(type = "number | null")]
    pub erp_contact_id: Option<i64>,

    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,

    /// Normalized mobile, else normalized phone.
    pub preferred_whatsapp: Option<String>,

    pub vat: Option<String>,
    pub is_company: bool,

    /// Last modification time reported by the ERP.
    #[ts(as = "Option<String>")]
    pub erp_write_date: Option<DateTime<Utc>>,

    pub sync_status: SyncStatus,

    /// JSON text captured from the last delivery (or import origin).
    pub last_sync_response: Option<String>,

    /// Last delivery failure.
    pub last_error: Option<String>,

    /// Last failure while linking the row to the ERP.
    pub erp_error: Option<String>,

    #[ts(as = "Option<String>")]
    pub synced_at: Option<DateTime<Utc>>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ContactRecord {
    /// Number to deliver to the messaging platform, if any.
    pub fn delivery_phone(&self) -> Option<&str> {
        self.preferred_whatsapp.as_deref().and_then(non_blank)
    }

    /// Label sent as the contact name.
    pub fn display_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.name.as_deref().and_then(non_blank).unwrap_or(fallback)
    }
}

// =============================================================================
// ERP Contact Fields
// =============================================================================

/// Denormalized copy of an ERP contact, as written into the ledger by a pull.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErpContactFields {
    pub erp_contact_id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub vat: Option<String>,
    pub is_company: bool,
    pub erp_write_date: Option<DateTime<Utc>>,
}

impl ErpContactFields {
    /// Derived WhatsApp number from the freshest mobile/phone.
    pub fn preferred_whatsapp(&self) -> Option<String> {
        preferred_whatsapp(self.mobile.as_deref(), self.phone.as_deref())
    }
}

// =============================================================================
// Imported Contact
// =============================================================================

/// A row first seen on the messaging platform, ready to be stored.
///
/// These rows are already delivered, so they enter the ledger as `Sent`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedContact {
    pub name: String,
    pub email: Option<String>,
    /// Normalized phone, used for phone, mobile and preferred_whatsapp.
    pub phone: String,
    pub erp_contact_id: Option<i64>,
    pub erp_error: Option<String>,
    /// JSON text recording where the row came from.
    pub origin: String,
}

// =============================================================================
// Search Results
// =============================================================================

/// A contact returned by contact search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContactSummary {
    #[ts(type = "number | null")]
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub vat: Option<String>,
    pub is_company: bool,
    /// Raw mobile, else raw phone.
    pub preferred_whatsapp: Option<String>,
}

/// A product returned by smart search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductHit {
    #[ts(type = "number")]
    pub id: i64,
    pub name: Option<String>,
    pub default_code: Option<String>,
    pub barcode: Option<String>,
    /// Sum over the configured locations, else the ERP's own figure.
    pub qty_available: f64,
    pub price: f64,
}

impl ProductHit {
    pub fn is_available(&self) -> bool {
        self.qty_available > 0.0
    }
}

// =============================================================================
// Status Counts
// =============================================================================

/// Ledger size broken down by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusCounts {
    #[ts(type = "number")]
    pub pending: i64,
    #[ts(type = "number")]
    pub sent: i64,
    #[ts(type = "number")]
    pub error: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.sent + self.error
    }

    pub fn add(&mut self, status: SyncStatus, count: i64) {
        match status {
            SyncStatus::Pending => self.pending += count,
            SyncStatus::Sent => self.sent += count,
            SyncStatus::Error => self.error += count,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
