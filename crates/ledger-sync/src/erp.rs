//! # ERP Client
//!
//! Contacts and products over the ERP's XML-RPC API.
//!
//! ## Call Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ErpClient                                       │
//! │                                                                         │
//! │  session_uid()                                                         │
//! │    └─► SessionCache ──miss──► POST /xmlrpc/2/common                    │
//! │                                authenticate(db, user, pw, {})          │
//! │                                                                         │
//! │  execute_kw(model, method, args, kwargs)                               │
//! │    └─► POST /xmlrpc/2/object                                           │
//! │        execute_kw(db, uid, pw, model, method, [args], {kwargs})        │
//! │                                                                         │
//! │  search_contacts        res.partner   search_read                      │
//! │  fetch_contacts_page    res.partner   search_read  (id asc, offset)    │
//! │  find_contact_by_...    res.partner   search       (limit 1)           │
//! │  create_contact         res.partner   create                           │
//! │  search_products_smart  product.product name_search × tokens, read     │
//! │                         stock.quant   search_read  (per location)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Domains
//! The ERP's search domains are prefix-notation lists: `"|"` joins the next
//! two conditions with OR, and consecutive conditions are ANDed.
//!
//! ```text
//! [("active","=",true), "|", ("phone","!=",false), ("mobile","!=",false)]
//!   active AND (phone set OR mobile set)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info};

use ledger_core::search::{intersect_id_sets, tokenize_query};
use ledger_core::validation::{clamp_limit, non_blank, non_blank_owned};
use ledger_core::{ContactSummary, ErpContactFields, ProductHit, DEFAULT_FALLBACK_NAME};

use crate::config::ErpSettings;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{ErpCatalog, ErpDirectory};
use crate::session::{SessionCache, SessionKey};
use crate::xmlrpc::{build_call, decode_response, HttpRpcTransport, RpcStruct, RpcTransport, RpcValue};

// =============================================================================
// Constants
// =============================================================================

const COMMON_PATH: &str = "/xmlrpc/2/common";
const OBJECT_PATH: &str = "/xmlrpc/2/object";

const PARTNER_MODEL: &str = "res.partner";
const PRODUCT_MODEL: &str = "product.product";
const QUANT_MODEL: &str = "stock.quant";

const CONTACT_FIELDS: [&str; 7] = ["id", "name", "email", "phone", "mobile", "vat", "is_company"];
const PRODUCT_FIELDS: [&str; 6] = ["id", "name", "default_code", "qty_available", "barcode", "lst_price"];

/// Format of the ERP's `write_date` / `create_date` fields (UTC).
pub const ERP_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Row cap on the stock aggregation query.
const QUANT_ROW_LIMIT: i64 = 5000;

/// Contact search limit bounds.
pub const CONTACT_SEARCH_MAX: u32 = 200;

/// Contacts page size bounds.
pub const CONTACT_PAGE_MAX: u32 = 1000;

// =============================================================================
// Remote Shapes
// =============================================================================

/// A contact as read from `res.partner`.
///
/// The ERP sends `false` for unset fields; those and blank strings are
/// `None` here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErpContact {
    /// Present only when the row carried an integer id.
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub vat: Option<String>,
    pub is_company: bool,
    pub write_date: Option<DateTime<Utc>>,
    pub create_date: Option<DateTime<Utc>>,
}

impl ErpContact {
    /// Parses one search_read row. Non-struct values yield `None`.
    pub fn from_rpc(value: &RpcValue) -> Option<Self> {
        let row = value.as_struct()?;
        Some(ErpContact {
            id: row.get("id").and_then(RpcValue::as_i64),
            name: text_field(row, "name"),
            email: text_field(row, "email"),
            phone: text_field(row, "phone"),
            mobile: text_field(row, "mobile"),
            vat: text_field(row, "vat"),
            is_company: row
                .get("is_company")
                .and_then(RpcValue::as_bool)
                .unwrap_or(false),
            write_date: date_field(row, "write_date"),
            create_date: date_field(row, "create_date"),
        })
    }

    /// Ledger fields for this contact; `None` when it has no usable id.
    pub fn to_ledger_fields(&self) -> Option<ErpContactFields> {
        let id = self.id.filter(|id| *id > 0)?;
        Some(ErpContactFields {
            erp_contact_id: id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            mobile: self.mobile.clone(),
            vat: self.vat.clone(),
            is_company: self.is_company,
            erp_write_date: self.write_date,
        })
    }

    /// Search result row. `preferred_whatsapp` is the raw mobile, else the
    /// raw phone.
    pub fn to_summary(&self) -> ContactSummary {
        ContactSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            mobile: self.mobile.clone(),
            vat: self.vat.clone(),
            is_company: self.is_company,
            preferred_whatsapp: self.mobile.clone().or_else(|| self.phone.clone()),
        }
    }
}

fn text_field(row: &RpcStruct, key: &str) -> Option<String> {
    non_blank_owned(row.get(key).and_then(RpcValue::as_str))
}

fn date_field(row: &RpcStruct, key: &str) -> Option<DateTime<Utc>> {
    let raw = row.get(key).and_then(RpcValue::as_str)?;
    NaiveDateTime::parse_from_str(raw.trim(), ERP_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Values for a new `res.partner`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewErpContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
}

impl NewErpContact {
    fn to_rpc(&self) -> RpcStruct {
        let name = non_blank(&self.name).unwrap_or(DEFAULT_FALLBACK_NAME);
        RpcStruct::new()
            .with("name", name)
            .with("email", self.email.clone())
            .with("phone", self.phone.clone())
            .with("mobile", self.mobile.clone())
            .with("customer_rank", 1)
    }
}

// =============================================================================
// Domain Helpers
// =============================================================================

fn cond(field: &str, op: &str, value: impl Into<RpcValue>) -> RpcValue {
    RpcValue::Array(vec![field.into(), op.into(), value.into()])
}

fn or() -> RpcValue {
    RpcValue::from("|")
}

fn active() -> RpcValue {
    cond("active", "=", true)
}

fn fields(names: &[&str]) -> RpcValue {
    RpcValue::Array(names.iter().map(|n| RpcValue::from(*n)).collect())
}

fn rows(value: RpcValue) -> Vec<RpcValue> {
    match value {
        RpcValue::Array(items) => items,
        _ => Vec::new(),
    }
}

// =============================================================================
// Client
// =============================================================================

/// ERP client over XML-RPC.
///
/// ## Example
/// ```rust,ignore
/// let sessions = Arc::new(SessionCache::default());
/// let erp = ErpClient::new(config.erp.clone(), sessions)?;
/// let hits = erp.search_products_smart("acetaminofen 500mg", 7).await?;
/// ```
#[derive(Clone)]
pub struct ErpClient {
    settings: ErpSettings,
    transport: Arc<dyn RpcTransport>,
    sessions: Arc<SessionCache>,
}

impl std::fmt::Debug for ErpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErpClient")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ErpClient {
    /// Creates a client over HTTP.
    ///
    /// ## Errors
    /// `SyncError::Config` when a credential is blank or the URL is invalid.
    pub fn new(settings: ErpSettings, sessions: Arc<SessionCache>) -> SyncResult<Self> {
        let transport = HttpRpcTransport::new()?;
        Self::with_transport(settings, Arc::new(transport), sessions)
    }

    /// Creates a client over any transport.
    pub fn with_transport(
        settings: ErpSettings,
        transport: Arc<dyn RpcTransport>,
        sessions: Arc<SessionCache>,
    ) -> SyncResult<Self> {
        settings.validate()?;
        Ok(ErpClient {
            settings,
            transport,
            sessions,
        })
    }

    fn session_key(&self) -> SessionKey {
        SessionKey {
            base_url: self.settings.base_url().to_string(),
            database: self.settings.database.clone(),
            username: self.settings.username.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url(), path)
    }

    async fn call(&self, path: &str, method: &str, params: &[RpcValue]) -> SyncResult<RpcValue> {
        let body = build_call(method, params);
        let raw = self.transport.post(&self.endpoint(path), body).await?;
        decode_response(&raw)
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Returns the session uid, authenticating when the cache has none.
    ///
    /// ## Errors
    /// `SyncError::Auth` when the ERP answers anything but a positive integer.
    pub async fn session_uid(&self) -> SyncResult<i64> {
        let key = self.session_key();
        self.sessions
            .get_or_authenticate(&key, || self.authenticate())
            .await
    }

    async fn authenticate(&self) -> SyncResult<i64> {
        let params = [
            RpcValue::from(&self.settings.database),
            RpcValue::from(&self.settings.username),
            RpcValue::from(&self.settings.password),
            RpcValue::Struct(RpcStruct::new()),
        ];

        match self.call(COMMON_PATH, "authenticate", &params).await? {
            RpcValue::Int(uid) if uid > 0 => {
                info!(uid, database = %self.settings.database, "ERP session established");
                Ok(uid)
            }
            other => Err(SyncError::Auth(format!(
                "ERP rejected credentials for '{}' (answer: {})",
                self.settings.username,
                other.to_json()
            ))),
        }
    }

    /// Runs `execute_kw` on the object endpoint.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<RpcValue>,
        kwargs: Option<RpcStruct>,
    ) -> SyncResult<RpcValue> {
        let uid = self.session_uid().await?;

        let mut params = vec![
            RpcValue::from(&self.settings.database),
            RpcValue::Int(uid),
            RpcValue::from(&self.settings.password),
            RpcValue::from(model),
            RpcValue::from(method),
            RpcValue::Array(args),
        ];
        if let Some(kwargs) = kwargs {
            params.push(RpcValue::Struct(kwargs));
        }

        debug!(model, method, "execute_kw");
        self.call(OBJECT_PATH, "execute_kw", &params).await
    }

    async fn search_read(
        &self,
        model: &str,
        domain: Vec<RpcValue>,
        kwargs: RpcStruct,
    ) -> SyncResult<Vec<RpcValue>> {
        let result = self
            .execute_kw(model, "search_read", vec![RpcValue::Array(domain)], Some(kwargs))
            .await?;
        Ok(rows(result))
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    /// Searches active contacts by name, email or phone.
    ///
    /// A blank query lists the most recently modified contacts.
    pub async fn search_contacts(&self, query: &str, limit: u32) -> SyncResult<Vec<ContactSummary>> {
        let limit = clamp_limit(limit, 1, CONTACT_SEARCH_MAX);

        let mut domain = vec![active()];
        if let Some(q) = non_blank(query) {
            domain.extend([
                or(),
                or(),
                cond("name", "ilike", q),
                cond("email", "ilike", q),
                cond("phone", "ilike", q),
            ]);
        }

        let kwargs = RpcStruct::new()
            .with("fields", fields(&CONTACT_FIELDS))
            .with("limit", limit)
            .with("order", "write_date desc");

        let rows = self.search_read(PARTNER_MODEL, domain, kwargs).await?;
        Ok(rows
            .iter()
            .filter_map(ErpContact::from_rpc)
            .map(|c| c.to_summary())
            .collect())
    }

    /// One page of active contacts that have a phone or a mobile, in
    /// ascending id order.
    pub async fn fetch_contacts_page(&self, page_size: u32, offset: u32) -> SyncResult<Vec<ErpContact>> {
        let page_size = clamp_limit(page_size, 1, CONTACT_PAGE_MAX);

        let domain = vec![
            active(),
            or(),
            cond("phone", "!=", false),
            cond("mobile", "!=", false),
        ];

        let mut names = CONTACT_FIELDS.to_vec();
        names.extend(["write_date", "create_date"]);

        let kwargs = RpcStruct::new()
            .with("fields", fields(&names))
            .with("limit", page_size)
            .with("offset", offset)
            .with("order", "id asc");

        let rows = self.search_read(PARTNER_MODEL, domain, kwargs).await?;
        Ok(rows.iter().filter_map(ErpContact::from_rpc).collect())
    }

    /// First active contact (lowest id) matching the phone, or the email.
    ///
    /// Returns `None` without a remote call when both are blank.
    pub async fn find_contact_by_phone_or_email(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> SyncResult<Option<i64>> {
        let phone = phone.and_then(non_blank);
        let email = email.and_then(non_blank);

        let domain = match (phone, email) {
            (None, None) => return Ok(None),
            (Some(p), Some(e)) => vec![
                active(),
                or(),
                or(),
                cond("phone", "=", p),
                cond("mobile", "=", p),
                cond("email", "=", e),
            ],
            (Some(p), None) => vec![active(), or(), cond("phone", "=", p), cond("mobile", "=", p)],
            (None, Some(e)) => vec![active(), cond("email", "=", e)],
        };

        let kwargs = RpcStruct::new().with("limit", 1).with("order", "id asc");
        let result = self
            .execute_kw(PARTNER_MODEL, "search", vec![RpcValue::Array(domain)], Some(kwargs))
            .await?;

        Ok(result
            .as_array()
            .and_then(|ids| ids.first())
            .and_then(RpcValue::as_i64))
    }

    /// Creates a customer contact and returns its id.
    ///
    /// ## Errors
    /// `SyncError::Remote` when the ERP does not answer with a positive id.
    pub async fn create_contact(&self, contact: &NewErpContact) -> SyncResult<i64> {
        let result = self
            .execute_kw(
                PARTNER_MODEL,
                "create",
                vec![RpcValue::Struct(contact.to_rpc())],
                None,
            )
            .await?;

        match result {
            RpcValue::Int(id) if id > 0 => {
                info!(erp_contact_id = id, "Created ERP contact");
                Ok(id)
            }
            other => Err(SyncError::remote(
                None,
                &format!("ERP returned no valid id for the new contact: {}", other.to_json()),
            )),
        }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Token-intersection product search with per-location stock.
    ///
    /// ## Steps
    /// 1. Tokenize; no tokens means no calls
    /// 2. `name_search` each token with `3 × limit`
    /// 3. Intersect the id sets (first token's set if they share nothing)
    /// 4. Keep `limit` ids and `read` them
    /// 5. With store locations configured, sum `stock.quant` per product
    pub async fn search_products_smart(&self, query: &str, limit: u32) -> SyncResult<Vec<ProductHit>> {
        let tokens = tokenize_query(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let limit = limit.max(1);
        let mut id_sets = Vec::with_capacity(tokens.len());
        for token in &tokens {
            id_sets.push(self.name_search(PRODUCT_MODEL, token, i64::from(limit) * 3).await?);
        }

        let mut ids = intersect_id_sets(&id_sets);
        ids.truncate(limit as usize);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(?tokens, ids = ids.len(), "Smart search candidates");

        let products = self.read(PRODUCT_MODEL, &ids, &PRODUCT_FIELDS).await?;

        let locations = &self.settings.store_location_ids;
        let stock = if locations.is_empty() {
            HashMap::new()
        } else {
            self.stock_by_location(&ids, locations).await?
        };

        Ok(products
            .iter()
            .filter_map(RpcValue::as_struct)
            .filter_map(|row| {
                let id = row.get("id").and_then(RpcValue::as_i64)?;
                let own_qty = row
                    .get("qty_available")
                    .and_then(RpcValue::as_f64)
                    .unwrap_or(0.0);
                Some(ProductHit {
                    id,
                    name: text_field(row, "name"),
                    default_code: text_field(row, "default_code"),
                    barcode: text_field(row, "barcode"),
                    qty_available: stock.get(&id).copied().unwrap_or(own_qty),
                    price: row.get("lst_price").and_then(RpcValue::as_f64).unwrap_or(0.0),
                })
            })
            .collect())
    }

    /// `name_search` returning the ids of the `[id, display_name]` pairs.
    async fn name_search(&self, model: &str, term: &str, limit: i64) -> SyncResult<Vec<i64>> {
        let kwargs = RpcStruct::new().with("operator", "ilike").with("limit", limit);
        let result = self
            .execute_kw(model, "name_search", vec![term.into()], Some(kwargs))
            .await?;

        Ok(rows(result)
            .iter()
            .filter_map(|pair| pair.as_array()?.first()?.as_i64())
            .collect())
    }

    async fn read(&self, model: &str, ids: &[i64], names: &[&str]) -> SyncResult<Vec<RpcValue>> {
        let kwargs = RpcStruct::new().with("fields", fields(names));
        let result = self
            .execute_kw(model, "read", vec![ids.to_vec().into()], Some(kwargs))
            .await?;
        Ok(rows(result))
    }

    /// Available quantity per product, summed over `locations` and their
    /// children.
    async fn stock_by_location(
        &self,
        product_ids: &[i64],
        locations: &[i64],
    ) -> SyncResult<HashMap<i64, f64>> {
        let domain = vec![
            cond("product_id", "in", product_ids.to_vec()),
            cond("location_id", "child_of", locations.to_vec()),
        ];
        let kwargs = RpcStruct::new()
            .with("fields", fields(&["product_id", "available_quantity"]))
            .with("limit", QUANT_ROW_LIMIT);

        let quants = self.search_read(QUANT_MODEL, domain, kwargs).await?;

        let mut totals: HashMap<i64, f64> = HashMap::new();
        for quant in &quants {
            let Some(product_id) = quant
                .get("product_id")
                .and_then(RpcValue::as_array)
                .and_then(|pair| pair.first())
                .and_then(RpcValue::as_i64)
            else {
                continue;
            };
            let qty = quant
                .get("available_quantity")
                .and_then(RpcValue::as_f64)
                .unwrap_or(0.0);
            *totals.entry(product_id).or_insert(0.0) += qty;
        }

        Ok(totals)
    }
}

#[async_trait]
impl ErpDirectory for ErpClient {
    async fn fetch_contacts_page(&self, page_size: u32, offset: u32) -> SyncResult<Vec<ErpContact>> {
        ErpClient::fetch_contacts_page(self, page_size, offset).await
    }

    async fn find_contact_by_phone_or_email(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> SyncResult<Option<i64>> {
        ErpClient::find_contact_by_phone_or_email(self, phone, email).await
    }

    async fn create_contact(&self, contact: &NewErpContact) -> SyncResult<i64> {
        ErpClient::create_contact(self, contact).await
    }
}

#[async_trait]
impl ErpCatalog for ErpClient {
    async fn search_contacts(&self, query: &str, limit: u32) -> SyncResult<Vec<ContactSummary>> {
        ErpClient::search_contacts(self, query, limit).await
    }

    async fn search_products_smart(&self, query: &str, limit: u32) -> SyncResult<Vec<ProductHit>> {
        ErpClient::search_products_smart(self, query, limit).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmlrpc::encode_value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers posts from a queue and records what was sent.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<SyncResult<String>>>,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedTransport {
        fn reply(&self, value: impl Into<RpcValue>) {
            let body = format!(
                "<?xml version=\"1.0\"?><methodResponse><params><param>{}</param></params></methodResponse>",
                encode_value(&value.into())
            );
            self.replies.lock().unwrap().push_back(Ok(body));
        }

        fn fail(&self, err: SyncError) {
            self.replies.lock().unwrap().push_back(Err(err));
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn post(&self, url: &str, body: String) -> SyncResult<String> {
            self.sent.lock().unwrap().push((url.to_string(), body));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SyncError::Transport("no scripted reply".into())))
        }
    }

    fn settings() -> ErpSettings {
        ErpSettings {
            url: "https://erp.test/".into(),
            database: "prod".into(),
            username: "bot@test".into(),
            password: "secret".into(),
            store_location_ids: vec![],
        }
    }

    fn client_with(settings: ErpSettings) -> (ErpClient, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::default());
        let client = ErpClient::with_transport(
            settings,
            transport.clone(),
            Arc::new(SessionCache::default()),
        )
        .unwrap();
        (client, transport)
    }

    fn partner(id: i64, name: &str, phone: RpcValue, mobile: RpcValue) -> RpcValue {
        RpcStruct::new()
            .with("id", id)
            .with("name", name)
            .with("email", false)
            .with("phone", phone)
            .with("mobile", mobile)
            .with("vat", false)
            .with("is_company", false)
            .with("write_date", "2026-02-11 14:05:09")
            .into()
    }

    fn pair(id: i64, label: &str) -> RpcValue {
        RpcValue::Array(vec![id.into(), label.into()])
    }

    #[test]
    fn test_blank_credentials_are_rejected() {
        let mut s = settings();
        s.password = "  ".into();
        let result = ErpClient::with_transport(
            s,
            Arc::new(ScriptedTransport::default()),
            Arc::new(SessionCache::default()),
        );
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[tokio::test]
    async fn test_session_is_authenticated_once() {
        let (client, transport) = client_with(settings());
        transport.reply(7);
        transport.reply(RpcValue::Array(vec![]));
        transport.reply(RpcValue::Array(vec![]));

        client.search_contacts("", 10).await.unwrap();
        client.search_contacts("ana", 10).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].0, "https://erp.test/xmlrpc/2/common");
        assert!(sent[0].1.contains("<methodName>authenticate</methodName>"));
        assert_eq!(sent[1].0, "https://erp.test/xmlrpc/2/object");
        assert!(sent[1].1.contains("<int>7</int>"));
    }

    #[tokio::test]
    async fn test_rejected_login_is_auth_error() {
        let (client, transport) = client_with(settings());
        transport.reply(false);

        let result = client.session_uid().await;
        assert!(matches!(result, Err(SyncError::Auth(_))));
    }

    #[tokio::test]
    async fn test_search_contacts_domains() {
        let (client, transport) = client_with(settings());
        transport.reply(1);
        transport.reply(RpcValue::Array(vec![partner(
            5,
            "Ana",
            false.into(),
            "+58 424-229 0660".into(),
        )]));
        transport.reply(RpcValue::Array(vec![]));

        let hits = client.search_contacts("   ", 999).await.unwrap();
        client.search_contacts("ana", 10).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, Some(5));
        assert_eq!(hits[0].phone, None);
        assert_eq!(hits[0].preferred_whatsapp.as_deref(), Some("+58 424-229 0660"));

        let sent = transport.sent();
        assert!(!sent[1].1.contains("ilike"));
        assert!(sent[1].1.contains("<int>200</int>"));
        assert!(sent[1].1.contains("write_date desc"));
        assert_eq!(sent[2].1.matches("ilike").count(), 3);
    }

    #[tokio::test]
    async fn test_contacts_page_is_parsed_and_clamped() {
        let (client, transport) = client_with(settings());
        transport.reply(1);
        transport.reply(RpcValue::Array(vec![
            partner(3, "Ana", "0212 555 0101".into(), false.into()),
            RpcValue::from("junk"),
        ]));

        let page = client.fetch_contacts_page(5000, 0).await.unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, Some(3));
        assert_eq!(page[0].mobile, None);
        assert_eq!(
            page[0].write_date.map(|d| d.to_rfc3339()),
            Some("2026-02-11T14:05:09+00:00".to_string())
        );

        let body = &transport.sent()[1].1;
        assert!(body.contains("<int>1000</int>"));
        assert!(body.contains("id asc"));
        assert!(body.contains("create_date"));
    }

    #[tokio::test]
    async fn test_find_contact_without_inputs_makes_no_call() {
        let (client, transport) = client_with(settings());

        let found = client.find_contact_by_phone_or_email(Some(" "), None).await.unwrap();

        assert_eq!(found, None);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_find_contact_by_phone() {
        let (client, transport) = client_with(settings());
        transport.reply(1);
        transport.reply(vec![42]);

        let found = client
            .find_contact_by_phone_or_email(Some(" +584242290660 "), None)
            .await
            .unwrap();

        assert_eq!(found, Some(42));
        let body = &transport.sent()[1].1;
        assert!(body.contains("<string>+584242290660</string>"));
        assert!(!body.contains("<string>email</string>"));
    }

    #[tokio::test]
    async fn test_create_contact_requires_positive_id() {
        let (client, transport) = client_with(settings());
        transport.reply(1);
        transport.reply(false);

        let result = client
            .create_contact(&NewErpContact {
                name: "".into(),
                phone: Some("+58424".into()),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(SyncError::Remote { .. })));
        let body = &transport.sent()[1].1;
        assert!(body.contains(DEFAULT_FALLBACK_NAME));
        assert!(body.contains("customer_rank"));
    }

    #[tokio::test]
    async fn test_smart_search_intersects_and_sums_stock() {
        let mut s = settings();
        s.store_location_ids = vec![8];
        let (client, transport) = client_with(s);

        transport.reply(1);
        transport.reply(RpcValue::Array(vec![pair(1, "A"), pair(2, "B"), pair(3, "C")]));
        transport.reply(RpcValue::Array(vec![pair(2, "B"), pair(3, "C"), pair(4, "D")]));
        transport.reply(RpcValue::Array(vec![
            RpcStruct::new()
                .with("id", 2)
                .with("name", "Acetaminofen 500mg")
                .with("default_code", "AC500")
                .with("qty_available", 99.0)
                .with("barcode", false)
                .with("lst_price", 3.5)
                .into(),
            RpcStruct::new()
                .with("id", 3)
                .with("name", "Acetaminofen jarabe")
                .with("default_code", false)
                .with("qty_available", 4.0)
                .with("barcode", "7591")
                .with("lst_price", 2)
                .into(),
        ]));
        transport.reply(RpcValue::Array(vec![
            RpcStruct::new()
                .with("product_id", pair(2, "B"))
                .with("available_quantity", 3.0)
                .into(),
            RpcStruct::new()
                .with("product_id", pair(2, "B"))
                .with("available_quantity", 2.0)
                .into(),
        ]));

        let hits = client.search_products_smart("acetaminofen de 500", 7).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 2);
        assert_eq!(hits[0].qty_available, 5.0);
        assert_eq!(hits[0].price, 3.5);
        assert_eq!(hits[0].barcode, None);
        assert_eq!(hits[1].qty_available, 4.0);
        assert_eq!(hits[1].price, 2.0);

        let sent = transport.sent();
        assert_eq!(sent.len(), 5);
        assert!(sent[1].1.contains("<int>21</int>"));
        assert!(sent[4].1.contains("child_of"));
    }

    #[tokio::test]
    async fn test_smart_search_without_tokens_makes_no_call() {
        let (client, transport) = client_with(settings());

        let hits = client.search_products_smart("de la x", 7).await.unwrap();

        assert!(hits.is_empty());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_smart_search_stops_when_nothing_matches() {
        let (client, transport) = client_with(settings());
        transport.reply(1);
        transport.reply(RpcValue::Array(vec![]));

        let hits = client.search_products_smart("inexistente", 7).await.unwrap();

        assert!(hits.is_empty());
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let (client, transport) = client_with(settings());
        transport.fail(SyncError::remote(Some(502), "bad gateway"));

        let result = client.fetch_contacts_page(10, 0).await;
        assert!(matches!(result, Err(SyncError::Remote { status: Some(502), .. })));
    }
}
