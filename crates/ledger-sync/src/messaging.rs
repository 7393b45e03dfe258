//! # Messaging Client
//!
//! REST client for the messaging platform's contact API.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST {base}/{tenant}/api/v1/addContact/{phone}?sourceType=…           │
//! │       { "name": …, "customParams": [{ "name": …, "value": … }] }        │
//! │                                                                         │
//! │  POST {base}/{tenant}/api/v1/updateContactAttributes/{phone}?sourceType│
//! │       { "customParams": [...] }                                        │
//! │                                                                         │
//! │  GET  {base}/{tenant}/api/v1/getContacts?pageSize=…&pageNumber=…       │
//! │       { "contacts" | "result" | "data": [...], "hasMore": … }           │
//! │                                                                         │
//! │  All calls: Bearer token, 20s timeout, 2 retries 300ms apart on        │
//! │  transport failure. Non-2xx is a Remote error with a body excerpt.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The listing envelope is not stable across API versions, so the page
//! is read through fixed key priority orders instead of a derived struct.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use url::Url;

use ledger_core::validation::{clamp_limit, non_blank};

use crate::config::MessagingSettings;
use crate::error::{SyncError, SyncResult};
use crate::gateway::MessagingDirectory;
use crate::retry::{with_retry, RetryPolicy};

// =============================================================================
// Constants
// =============================================================================

/// Request timeout for messaging calls.
pub const MESSAGING_TIMEOUT: Duration = Duration::from_secs(20);

/// Retry policy for messaging calls.
pub const MESSAGING_RETRY: RetryPolicy = RetryPolicy::new(2, Duration::from_millis(300));

/// Largest page the listing endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 500;

const NAME_KEYS: [&str; 3] = ["name", "fullName", "contactName"];
const PHONE_KEYS: [&str; 4] = ["whatsappNumber", "phone", "phone_number", "mobile"];
const EMAIL_KEYS: [&str; 1] = ["email"];
const LIST_KEYS: [&str; 3] = ["contacts", "result", "data"];
const HAS_MORE_KEYS: [&str; 2] = ["hasMore", "has_more"];

// =============================================================================
// Wire Types
// =============================================================================

/// A name/value pair stored on the messaging contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAttribute {
    pub name: String,
    pub value: String,
}

impl CustomAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        CustomAttribute {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// What the platform answered to a write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub status: u16,
    /// Parsed JSON, or the raw text when the body is not JSON.
    pub body: Value,
}

impl DeliveryReceipt {
    /// JSON text for the ledger's `last_sync_response`.
    pub fn to_json_text(&self) -> String {
        json!({ "status": self.status, "body": self.body }).to_string()
    }
}

/// A contact row from the listing endpoint.
///
/// The raw object is kept; fields are read through priority orders.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagingContact {
    raw: Map<String, Value>,
}

impl MessagingContact {
    /// Wraps a JSON object; other values are not contacts.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(raw) => Some(MessagingContact { raw }),
            _ => None,
        }
    }

    /// First non-blank of `name`, `fullName`, `contactName`.
    pub fn display_name(&self) -> Option<&str> {
        self.pick(&NAME_KEYS)
    }

    /// First non-blank of `whatsappNumber`, `phone`, `phone_number`, `mobile`.
    pub fn phone(&self) -> Option<&str> {
        self.pick(&PHONE_KEYS)
    }

    pub fn email(&self) -> Option<&str> {
        self.pick(&EMAIL_KEYS)
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// First key holding a non-blank string, trimmed.
    fn pick(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.raw.get(*key).and_then(Value::as_str))
            .find_map(non_blank)
    }
}

/// One page of the contact listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactPage {
    pub contacts: Vec<MessagingContact>,
    pub has_more: bool,
    /// The full payload, for diagnostics.
    pub raw: Value,
}

impl ContactPage {
    /// Reads a listing payload. A non-object payload is an empty page.
    pub fn from_payload(payload: Value) -> Self {
        let Some(object) = payload.as_object() else {
            return ContactPage {
                contacts: Vec::new(),
                has_more: false,
                raw: payload,
            };
        };

        let contacts = first_present(object, &LIST_KEYS)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .cloned()
                    .filter_map(MessagingContact::from_value)
                    .collect()
            })
            .unwrap_or_default();

        let has_more = first_present(object, &HAS_MORE_KEYS)
            .map(truthy)
            .unwrap_or(false);

        ContactPage {
            contacts,
            has_more,
            raw: payload,
        }
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

/// Value of the first key present with a non-null value.
fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|v| !v.is_null())
}

/// Loose truthiness: `false`, `0`, `""`, `"0"`, empty collections and
/// null are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

// =============================================================================
// Client
// =============================================================================

/// Messaging platform REST client.
#[derive(Clone)]
pub struct MessagingClient {
    client: reqwest::Client,
    base_url: Url,
    tenant_id: String,
    token: String,
    source_type: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for MessagingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingClient")
            .field("base_url", &self.base_url.as_str())
            .field("tenant_id", &self.tenant_id)
            .field("token", &"<redacted>")
            .field("source_type", &self.source_type)
            .finish()
    }
}

impl MessagingClient {
    /// Creates a client.
    ///
    /// ## Errors
    /// `SyncError::Config` when a field is blank or the base URL is invalid.
    pub fn new(settings: &MessagingSettings) -> SyncResult<Self> {
        settings.validate()?;

        let client = reqwest::Client::builder()
            .timeout(MESSAGING_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(MessagingClient {
            client,
            base_url: Url::parse(settings.base_url.trim())?,
            tenant_id: settings.tenant_id.trim().to_string(),
            token: settings.token.trim().to_string(),
            source_type: settings.source_type.trim().to_string(),
            retry: MESSAGING_RETRY,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `{base}/{tenant}/api/v1/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SyncError::Config("messaging base URL cannot hold a path".into()))?;
            path.pop_if_empty()
                .extend([self.tenant_id.as_str(), "api", "v1"])
                .extend(segments);
        }
        Ok(url)
    }

    fn write_endpoint(&self, action: &str, phone: &str) -> SyncResult<Url> {
        let mut url = self.endpoint(&[action, phone])?;
        url.query_pairs_mut().append_pair("sourceType", &self.source_type);
        Ok(url)
    }

    async fn post_json(&self, label: &str, url: Url, payload: &Value) -> SyncResult<DeliveryReceipt> {
        let url = &url;
        with_retry(label, self.retry, move || async move {
            let response = self
                .client
                .post(url.clone())
                .bearer_auth(&self.token)
                .header(ACCEPT, "*/*")
                .header(CONTENT_TYPE, "application/json-patch+json")
                .body(payload.to_string())
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(SyncError::remote(Some(status.as_u16()), &text));
            }

            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            Ok(DeliveryReceipt {
                status: status.as_u16(),
                body,
            })
        })
        .await
    }

    /// Creates or attaches a contact by phone.
    pub async fn add_contact(
        &self,
        phone: &str,
        name: &str,
        attributes: &[CustomAttribute],
    ) -> SyncResult<DeliveryReceipt> {
        let url = self.write_endpoint("addContact", phone)?;
        let payload = json!({ "name": name, "customParams": attributes });

        debug!(%phone, "Adding messaging contact");
        let receipt = self.post_json("messaging.add_contact", url, &payload).await?;
        info!(%phone, status = receipt.status, "Messaging contact added");
        Ok(receipt)
    }

    /// Overwrites custom attributes on an existing contact.
    pub async fn update_contact_attributes(
        &self,
        phone: &str,
        attributes: &[CustomAttribute],
    ) -> SyncResult<DeliveryReceipt> {
        let url = self.write_endpoint("updateContactAttributes", phone)?;
        let payload = json!({ "customParams": attributes });

        debug!(%phone, count = attributes.len(), "Updating messaging contact attributes");
        self.post_json("messaging.update_attributes", url, &payload)
            .await
    }

    /// Fetches one page of contacts.
    ///
    /// `page_size` is clamped to `[1, 500]` and `page_number` to `>= 1`.
    pub async fn list_contacts(&self, page_size: u32, page_number: u32) -> SyncResult<ContactPage> {
        let page_size = clamp_limit(page_size, 1, MAX_PAGE_SIZE);
        let page_number = page_number.max(1);

        let mut url = self.endpoint(&["getContacts"])?;
        url.query_pairs_mut()
            .append_pair("pageSize", &page_size.to_string())
            .append_pair("pageNumber", &page_number.to_string());

        let url = &url;
        let text = with_retry("messaging.list_contacts", self.retry, move || async move {
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&self.token)
                .header(ACCEPT, "application/json")
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(SyncError::remote(Some(status.as_u16()), &text));
            }
            Ok(text)
        })
        .await?;

        let payload = serde_json::from_str(&text).unwrap_or(Value::String(text));
        let page = ContactPage::from_payload(payload);

        debug!(
            page_number,
            page_size,
            contacts = page.len(),
            has_more = page.has_more,
            "Fetched messaging contacts page"
        );
        Ok(page)
    }
}

#[async_trait]
impl MessagingDirectory for MessagingClient {
    async fn add_contact(
        &self,
        phone: &str,
        name: &str,
        attributes: &[CustomAttribute],
    ) -> SyncResult<DeliveryReceipt> {
        MessagingClient::add_contact(self, phone, name, attributes).await
    }

    async fn list_contacts(&self, page_size: u32, page_number: u32) -> SyncResult<ContactPage> {
        MessagingClient::list_contacts(self, page_size, page_number).await
    }

    async fn update_contact_attributes(
        &self,
        phone: &str,
        attributes: &[CustomAttribute],
    ) -> SyncResult<DeliveryReceipt> {
        MessagingClient::update_contact_attributes(self, phone, attributes).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
