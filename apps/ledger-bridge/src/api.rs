//! # HTTP Search API
//!
//! Read-only ERP lookups for the chat bot.
//!
//! ```text
//! GET /api/buscar-producto?nombre=..[&limit=..][&whatsapp_number=..]
//!       └─► ErpCatalog::search_products_smart
//!       └─► (phone given) MessagingDirectory::update_contact_attributes
//!             "productos" = unique product names, best effort
//! GET /api/buscar-contacto?nombre=..[&limit=..]
//!       └─► ErpCatalog::search_contacts
//! GET /health
//! ```
//!
//! Failures answer `{ "error": .., "message": .. }` with 400 or 500.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use ledger_core::validation::non_blank;
use ledger_core::{ContactSummary, ProductHit};
use ledger_sync::{CustomAttribute, ErpCatalog, MessagingDirectory};

/// Custom attribute that records the products a contact asked about.
pub const PRODUCTS_ATTRIBUTE: &str = "productos";

const PRODUCT_LIMIT_DEFAULT: u32 = 7;
const PRODUCT_LIMIT_MAX: u32 = 50;
const CONTACT_LIMIT_DEFAULT: u32 = 50;
const CONTACT_LIMIT_MAX: u32 = 200;

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub erp: Arc<dyn ErpCatalog>,
    /// Absent when no messaging credentials are configured.
    pub messaging: Option<Arc<dyn MessagingDirectory>>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/buscar-producto", get(search_products))
        .route("/api/buscar-contacto", get(search_contacts))
        .route("/health", get(health))
        .with_state(state)
}

/// Serves the API until ctrl-c or SIGTERM.
pub async fn serve(state: ApiState, bind_addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind to {bind_addr}: {e}"))?;

    info!(addr = %bind_addr, "HTTP API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

// =============================================================================
// Errors
// =============================================================================

/// JSON error answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    status: u16,
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn bad_request(error: &str, message: impl Into<String>) -> Self {
        ApiError {
            status: 400,
            error: error.to_string(),
            message: message.into(),
        }
    }

    fn internal(error: &str, message: impl Into<String>) -> Self {
        ApiError {
            status: 500,
            error: error.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

// =============================================================================
// Query Parameters
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    nombre: Option<String>,
    limit: Option<String>,
    whatsapp_number: Option<String>,
    #[serde(rename = "whatsappNumber")]
    whatsapp_number_camel: Option<String>,
    telefono: Option<String>,
    phone: Option<String>,
}

impl ProductQuery {
    /// First non-blank phone parameter, in priority order.
    fn phone(&self) -> Option<&str> {
        [
            &self.whatsapp_number,
            &self.whatsapp_number_camel,
            &self.telefono,
            &self.phone,
        ]
        .into_iter()
        .find_map(|value| value.as_deref().and_then(non_blank))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    nombre: Option<String>,
    limit: Option<String>,
}

/// Parses a `limit` parameter. Absent or unparseable means `default`;
/// anything else is clamped into `[1, max]`.
fn parse_limit(raw: Option<&str>, default: u32, max: u32) -> u32 {
    match raw.map(str::trim).and_then(|v| v.parse::<i64>().ok()) {
        Some(value) => value.clamp(1, i64::from(max)) as u32,
        None => default,
    }
}

// =============================================================================
// Products
// =============================================================================

/// One product in the search answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: i64,
    pub name: Option<String>,
    pub default_code: Option<String>,
    pub barcode: Option<String>,
    pub qty_available: f64,
    pub price: f64,
    pub availability_text: String,
}

impl From<ProductHit> for ProductView {
    fn from(hit: ProductHit) -> Self {
        let label = hit.name.as_deref().and_then(non_blank).unwrap_or("Producto sin nombre");
        let availability = if hit.is_available() {
            "Si hay disponible"
        } else {
            "no hay disponible"
        };
        let availability_text = format!("{label} - {availability}");

        ProductView {
            id: hit.id,
            name: hit.name,
            default_code: hit.default_code,
            barcode: hit.barcode,
            qty_available: hit.qty_available,
            price: hit.price,
            availability_text,
        }
    }
}

async fn search_products(
    State(state): State<ApiState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let Some(name) = query.nombre.as_deref().and_then(non_blank) else {
        return Err(ApiError::bad_request(
            "Missing \"nombre\" parameter",
            "Pass the product to look for as ?nombre=...",
        ));
    };
    let limit = parse_limit(query.limit.as_deref(), PRODUCT_LIMIT_DEFAULT, PRODUCT_LIMIT_MAX);

    let hits = state
        .erp
        .search_products_smart(name, limit)
        .await
        .map_err(|e| {
            warn!(query = %name, error = %e, "Product search failed");
            ApiError::internal("ERP product search failed", e.to_string())
        })?;

    let products: Vec<ProductView> = hits.into_iter().take(limit as usize).map(ProductView::from).collect();
    debug!(query = %name, hits = products.len(), "Product search answered");

    if let (Some(phone), Some(messaging)) = (query.phone(), state.messaging.as_deref()) {
        record_products(messaging, phone, &products).await;
    }

    Ok(Json(products))
}

/// Stores the product names on the contact. Failures are only logged.
async fn record_products(messaging: &dyn MessagingDirectory, phone: &str, products: &[ProductView]) {
    let mut names: Vec<&str> = Vec::new();
    for name in products.iter().filter_map(|p| p.name.as_deref().and_then(non_blank)) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        return;
    }

    let attributes = [CustomAttribute::new(PRODUCTS_ATTRIBUTE, names.join(", "))];
    match messaging.update_contact_attributes(phone, &attributes).await {
        Ok(receipt) => debug!(%phone, status = receipt.status, "Recorded searched products"),
        Err(e) => warn!(%phone, error = %e, "Could not record searched products"),
    }
}

// =============================================================================
// Contacts
// =============================================================================

async fn search_contacts(
    State(state): State<ApiState>,
    Query(query): Query<ContactQuery>,
) -> Result<Json<Vec<ContactSummary>>, ApiError> {
    let name = query.nombre.as_deref().map(str::trim).unwrap_or_default();
    let limit = parse_limit(query.limit.as_deref(), CONTACT_LIMIT_DEFAULT, CONTACT_LIMIT_MAX);

    state
        .erp
        .search_contacts(name, limit)
        .await
        .map(Json)
        .map_err(|e| {
            warn!(query = %name, error = %e, "Contact search failed");
            ApiError::internal("ERP contact search failed", e.to_string())
        })
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledger_sync::{ContactPage, DeliveryReceipt, SyncError, SyncResult};
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCatalog {
        products: Vec<ProductHit>,
        contacts: Vec<ContactSummary>,
        fail: bool,
        calls: Mutex<Vec<(String, u32)>>,
    }

    impl FakeCatalog {
        fn calls(&self) -> Vec<(String, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ErpCatalog for FakeCatalog {
        async fn search_contacts(&self, query: &str, limit: u32) -> SyncResult<Vec<ContactSummary>> {
            self.calls.lock().unwrap().push((query.to_string(), limit));
            if self.fail {
                return Err(SyncError::Transport("ERP unreachable".into()));
            }
            Ok(self.contacts.clone())
        }

        async fn search_products_smart(&self, query: &str, limit: u32) -> SyncResult<Vec<ProductHit>> {
            self.calls.lock().unwrap().push((query.to_string(), limit));
            if self.fail {
                return Err(SyncError::RemoteFault("Access Denied".into()));
            }
            Ok(self.products.clone())
        }
    }

    #[derive(Default)]
    struct FakeMessaging {
        fail: bool,
        updates: Mutex<Vec<(String, Vec<CustomAttribute>)>>,
    }

    #[async_trait]
    impl MessagingDirectory for FakeMessaging {
        async fn add_contact(
            &self,
            _phone: &str,
            _name: &str,
            _attributes: &[CustomAttribute],
        ) -> SyncResult<DeliveryReceipt> {
            unreachable!("the API never adds contacts")
        }

        async fn list_contacts(&self, _page_size: u32, _page_number: u32) -> SyncResult<ContactPage> {
            unreachable!("the API never lists contacts")
        }

        async fn update_contact_attributes(
            &self,
            phone: &str,
            attributes: &[CustomAttribute],
        ) -> SyncResult<DeliveryReceipt> {
            self.updates
                .lock()
                .unwrap()
                .push((phone.to_string(), attributes.to_vec()));
            if self.fail {
                return Err(SyncError::remote(Some(404), "contact not found"));
            }
            Ok(DeliveryReceipt {
                status: 200,
                body: json!({ "ok": true }),
            })
        }
    }

    fn product(id: i64, name: &str, qty: f64, price: f64) -> ProductHit {
        ProductHit {
            id,
            name: Some(name.to_string()),
            default_code: None,
            barcode: None,
            qty_available: qty,
            price,
        }
    }

    async fn spawn(erp: Arc<FakeCatalog>, messaging: Option<Arc<FakeMessaging>>) -> String {
        let state = ApiState {
            erp,
            messaging: messaging.map(|m| m as Arc<dyn MessagingDirectory>),
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn get_json(url: &str) -> (u16, Value) {
        let response = reqwest::get(url).await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None, 7, 50), 7);
        assert_eq!(parse_limit(Some("abc"), 7, 50), 7);
        assert_eq!(parse_limit(Some(" 12 "), 7, 50), 12);
        assert_eq!(parse_limit(Some("0"), 7, 50), 1);
        assert_eq!(parse_limit(Some("-4"), 7, 50), 1);
        assert_eq!(parse_limit(Some("900"), 7, 50), 50);
    }

    #[test]
    fn test_availability_text() {
        let view = ProductView::from(product(1, "Acetaminofen 500mg", 3.0, 19.9));
        assert_eq!(view.availability_text, "Acetaminofen 500mg - Si hay disponible");

        let view = ProductView::from(ProductHit {
            name: None,
            ..product(2, "", 0.0, 1.0)
        });
        assert_eq!(view.availability_text, "Producto sin nombre - no hay disponible");
    }

    #[tokio::test]
    async fn test_blank_nombre_is_rejected() {
        let erp = Arc::new(FakeCatalog::default());
        let base = spawn(erp.clone(), None).await;

        let (status, body) = get_json(&format!("{base}/api/buscar-producto?nombre=%20%20")).await;

        assert_eq!(status, 400);
        assert_eq!(body["error"], "Missing \"nombre\" parameter");
        assert!(body["message"].is_string());
        assert!(erp.calls().is_empty());
    }

    #[tokio::test]
    async fn test_product_search_records_unique_names() {
        let erp = Arc::new(FakeCatalog {
            products: vec![
                product(1, "Acetaminofen 500mg", 10.0, 19.9),
                product(2, "Acetaminofen Infantil", 0.0, 12.4),
                product(3, "Acetaminofen 500mg", 1.0, 21.0),
            ],
            ..Default::default()
        });
        let messaging = Arc::new(FakeMessaging::default());
        let base = spawn(erp.clone(), Some(messaging.clone())).await;

        let (status, body) = get_json(&format!(
            "{base}/api/buscar-producto?nombre=acetaminofen&whatsappNumber=584001112233"
        ))
        .await;

        assert_eq!(status, 200);
        assert_eq!(body.as_array().unwrap().len(), 3);
        assert_eq!(body[0]["price"], 19.9);
        assert_eq!(body[1]["availability_text"], "Acetaminofen Infantil - no hay disponible");
        assert_eq!(erp.calls(), vec![("acetaminofen".to_string(), 7)]);

        let updates = messaging.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "584001112233");
        assert_eq!(
            updates[0].1,
            vec![CustomAttribute::new(
                PRODUCTS_ATTRIBUTE,
                "Acetaminofen 500mg, Acetaminofen Infantil"
            )]
        );
    }

    #[tokio::test]
    async fn test_no_phone_means_no_attribute_update() {
        let erp = Arc::new(FakeCatalog {
            products: vec![product(1, "Gasa", 1.0, 2.0)],
            ..Default::default()
        });
        let messaging = Arc::new(FakeMessaging::default());
        let base = spawn(erp, Some(messaging.clone())).await;

        let (status, _) = get_json(&format!("{base}/api/buscar-producto?nombre=gasa&limit=900")).await;

        assert_eq!(status, 200);
        assert!(messaging.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attribute_failure_does_not_fail_search() {
        let erp = Arc::new(FakeCatalog {
            products: vec![product(1, "Gasa", 1.0, 2.0)],
            ..Default::default()
        });
        let messaging = Arc::new(FakeMessaging {
            fail: true,
            ..Default::default()
        });
        let base = spawn(erp.clone(), Some(messaging.clone())).await;

        let (status, body) =
            get_json(&format!("{base}/api/buscar-producto?nombre=gasa&telefono=0414&limit=0")).await;

        assert_eq!(status, 200);
        assert_eq!(body[0]["name"], "Gasa");
        assert_eq!(erp.calls(), vec![("gasa".to_string(), 1)]);
        assert_eq!(messaging.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_erp_failure_is_500() {
        let erp = Arc::new(FakeCatalog {
            fail: true,
            ..Default::default()
        });
        let base = spawn(erp, None).await;

        let (status, body) = get_json(&format!("{base}/api/buscar-producto?nombre=gasa")).await;
        assert_eq!(status, 500);
        assert_eq!(body["error"], "ERP product search failed");
        assert!(body["message"].as_str().unwrap().contains("Access Denied"));

        let (status, body) = get_json(&format!("{base}/api/buscar-contacto?nombre=ana")).await;
        assert_eq!(status, 500);
        assert_eq!(body["error"], "ERP contact search failed");
    }

    #[tokio::test]
    async fn test_contact_search_limits() {
        let erp = Arc::new(FakeCatalog {
            contacts: vec![ContactSummary {
                id: Some(7),
                name: Some("Ana".into()),
                email: None,
                phone: None,
                mobile: Some("+58 424-229 0660".into()),
                vat: None,
                is_company: false,
                preferred_whatsapp: Some("+58 424-229 0660".into()),
            }],
            ..Default::default()
        });
        let base = spawn(erp.clone(), None).await;

        let (status, body) = get_json(&format!("{base}/api/buscar-contacto?nombre=%20ana%20")).await;
        assert_eq!(status, 200);
        assert_eq!(body[0]["id"], 7);
        assert_eq!(body[0]["preferred_whatsapp"], "+58 424-229 0660");

        get_json(&format!("{base}/api/buscar-contacto?limit=5000")).await;

        assert_eq!(
            erp.calls(),
            vec![("ana".to_string(), 50), (String::new(), 200)]
        );
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn(Arc::new(FakeCatalog::default()), None).await;

        let (status, body) = get_json(&format!("{base}/health")).await;

        assert_eq!(status, 200);
        assert_eq!(body, json!({ "status": "ok" }));
    }
}
