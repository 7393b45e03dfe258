//! In-memory fakes of the remote directories for job tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use ledger_db::{Database, DbConfig};

use crate::erp::{ErpContact, NewErpContact};
use crate::error::{SyncError, SyncResult};
use crate::gateway::{ErpDirectory, MessagingDirectory};
use crate::messaging::{ContactPage, CustomAttribute, DeliveryReceipt};

pub async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub fn erp_contact(id: i64, name: &str, phone: Option<&str>, mobile: Option<&str>) -> ErpContact {
    ErpContact {
        id: Some(id),
        name: Some(name.to_string()),
        phone: phone.map(str::to_string),
        mobile: mobile.map(str::to_string),
        ..Default::default()
    }
}

// =============================================================================
// ERP
// =============================================================================

/// Serves `contacts` by offset and keeps an in-memory partner directory.
pub struct FakeErp {
    pub contacts: Vec<ErpContact>,
    /// `(page_size, offset)` of every page request.
    pub page_calls: Mutex<Vec<(u32, u32)>>,
    /// Offsets whose page fetch fails.
    pub failing_offsets: HashSet<u32>,
    /// Phone or email → partner id, answered by lookups.
    pub directory: Mutex<HashMap<String, i64>>,
    pub created: Mutex<Vec<NewErpContact>>,
    pub fail_lookups: bool,
    pub fail_creates: bool,
    next_id: AtomicI64,
}

impl FakeErp {
    pub fn new(contacts: Vec<ErpContact>) -> Self {
        FakeErp {
            contacts,
            page_calls: Mutex::new(Vec::new()),
            failing_offsets: HashSet::new(),
            directory: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            fail_lookups: false,
            fail_creates: false,
            next_id: AtomicI64::new(1000),
        }
    }

    pub fn with_partner(self, key: &str, id: i64) -> Self {
        self.directory.lock().unwrap().insert(key.to_string(), id);
        self
    }

    pub fn page_calls(&self) -> Vec<(u32, u32)> {
        self.page_calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<NewErpContact> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErpDirectory for FakeErp {
    async fn fetch_contacts_page(&self, page_size: u32, offset: u32) -> SyncResult<Vec<ErpContact>> {
        self.page_calls.lock().unwrap().push((page_size, offset));
        if self.failing_offsets.contains(&offset) {
            return Err(SyncError::Transport("ERP unreachable".into()));
        }
        Ok(self
            .contacts
            .iter()
            .skip(offset as usize)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn find_contact_by_phone_or_email(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> SyncResult<Option<i64>> {
        if self.fail_lookups {
            return Err(SyncError::RemoteFault("Access Denied".into()));
        }
        let directory = self.directory.lock().unwrap();
        Ok(phone
            .and_then(|p| directory.get(p))
            .or_else(|| email.and_then(|e| directory.get(e)))
            .copied())
    }

    async fn create_contact(&self, contact: &NewErpContact) -> SyncResult<i64> {
        if self.fail_creates {
            return Err(SyncError::remote(Some(500), "create failed"));
        }
        self.created.lock().unwrap().push(contact.clone());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

// =============================================================================
// Messaging
// =============================================================================

/// Serves listing pages from memory and records deliveries.
#[derive(Default)]
pub struct FakeMessaging {
    /// Page `n` (1-based) is `pages[n - 1]`: rows and the has-more flag.
    pub pages: Vec<(Vec<Value>, bool)>,
    pub list_calls: Mutex<Vec<(u32, u32)>>,
    pub delivered: Mutex<Vec<(String, String, Vec<CustomAttribute>)>>,
    /// Phones whose delivery fails.
    pub rejected_phones: HashSet<String>,
    /// Page numbers whose fetch fails.
    pub failing_pages: HashSet<u32>,
}

impl FakeMessaging {
    pub fn with_pages(pages: Vec<(Vec<Value>, bool)>) -> Self {
        FakeMessaging {
            pages,
            ..Default::default()
        }
    }

    pub fn list_calls(&self) -> Vec<(u32, u32)> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn delivered(&self) -> Vec<(String, String, Vec<CustomAttribute>)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingDirectory for FakeMessaging {
    async fn add_contact(
        &self,
        phone: &str,
        name: &str,
        attributes: &[CustomAttribute],
    ) -> SyncResult<DeliveryReceipt> {
        if self.rejected_phones.contains(phone) {
            return Err(SyncError::remote(Some(400), "invalid whatsapp number"));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((phone.to_string(), name.to_string(), attributes.to_vec()));
        Ok(DeliveryReceipt {
            status: 200,
            body: json!({ "result": true }),
        })
    }

    async fn list_contacts(&self, page_size: u32, page_number: u32) -> SyncResult<ContactPage> {
        self.list_calls.lock().unwrap().push((page_size, page_number));
        if self.failing_pages.contains(&page_number) {
            return Err(SyncError::Transport("messaging unreachable".into()));
        }
        let (rows, has_more) = self
            .pages
            .get(page_number as usize - 1)
            .cloned()
            .unwrap_or_default();
        Ok(ContactPage::from_payload(json!({ "contacts": rows, "hasMore": has_more })))
    }

    async fn update_contact_attributes(
        &self,
        phone: &str,
        attributes: &[CustomAttribute],
    ) -> SyncResult<DeliveryReceipt> {
        self.delivered
            .lock()
            .unwrap()
            .push((phone.to_string(), String::new(), attributes.to_vec()));
        Ok(DeliveryReceipt {
            status: 200,
            body: json!({ "result": true }),
        })
    }
}
