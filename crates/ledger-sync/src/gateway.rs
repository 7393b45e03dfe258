//! # Remote Directories
//!
//! The jobs see each remote through one of these traits, so they can run
//! against the real clients or against in-memory fakes.
//!
//! ```text
//!   erp_pull ─────────┐
//!   messaging_import ─┼──► dyn ErpDirectory ──────► ErpClient (XML-RPC)
//!                     │
//!   messaging_push ───┼──► dyn MessagingDirectory ► MessagingClient (REST)
//!   messaging_import ─┘
//!
//!   HTTP search API ─────► dyn ErpCatalog ────────► ErpClient (XML-RPC)
//! ```

use async_trait::async_trait;

use ledger_core::{ContactSummary, ProductHit};

use crate::erp::{ErpContact, NewErpContact};
use crate::error::SyncResult;
use crate::messaging::{ContactPage, CustomAttribute, DeliveryReceipt};

/// ERP operations the jobs rely on.
#[async_trait]
pub trait ErpDirectory: Send + Sync {
    /// One page of contacts with a phone or mobile, ascending id order.
    async fn fetch_contacts_page(&self, page_size: u32, offset: u32) -> SyncResult<Vec<ErpContact>>;

    /// Lowest-id active contact matching the phone or the email.
    async fn find_contact_by_phone_or_email(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> SyncResult<Option<i64>>;

    /// Creates a customer contact and returns its id.
    async fn create_contact(&self, contact: &NewErpContact) -> SyncResult<i64>;
}

/// Messaging platform operations the jobs rely on.
#[async_trait]
pub trait MessagingDirectory: Send + Sync {
    async fn add_contact(
        &self,
        phone: &str,
        name: &str,
        attributes: &[CustomAttribute],
    ) -> SyncResult<DeliveryReceipt>;

    async fn list_contacts(&self, page_size: u32, page_number: u32) -> SyncResult<ContactPage>;

    /// Overwrites custom attributes on the contact with this phone.
    async fn update_contact_attributes(
        &self,
        phone: &str,
        attributes: &[CustomAttribute],
    ) -> SyncResult<DeliveryReceipt>;
}

/// Read-only ERP lookups served by the HTTP API.
#[async_trait]
pub trait ErpCatalog: Send + Sync {
    async fn search_contacts(&self, query: &str, limit: u32) -> SyncResult<Vec<ContactSummary>>;

    async fn search_products_smart(&self, query: &str, limit: u32) -> SyncResult<Vec<ProductHit>>;
}
