//! # ledger-core: Pure Domain Logic for the Contact Ledger
//!
//! Everything in here is deterministic and free of I/O. The storage crate,
//! the remote clients and the binary all lean on these types and rules.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Bridge Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              apps/ledger-bridge (CLI + HTTP API)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        ledger-sync (ERP client, messaging client, jobs)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ ledger-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌─────────────┐  ┌───────────────────────┐    │   │
//! │  │   │   types   │  │ validation  │  │        search         │    │   │
//! │  │   │ Contact-  │  │ phone rules │  │ tokenize_query        │    │   │
//! │  │   │ Record    │  │ clamps      │  │ intersect_id_sets     │    │   │
//! │  │   └───────────┘  └─────────────┘  └───────────────────────┘    │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Ledger record, sync status, search result rows
//! - [`error`] - Domain error types
//! - [`validation`] - Phone normalization and input clamps
//! - [`search`] - Smart-search tokenizer and id-set intersection
//!
//! ## Example Usage
//!
//! ```rust
//! use ledger_core::validation::normalize_phone;
//! use ledger_core::search::tokenize_query;
//!
//! assert_eq!(normalize_phone("+58 424-229 0660").as_deref(), Some("+584242290660"));
//! assert_eq!(tokenize_query("Acetaminofen de 500mg"), vec!["acetaminofen", "500", "mg"]);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod search;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Name used when neither remote system supplies one.
pub const DEFAULT_FALLBACK_NAME: &str = "Sin nombre";

/// Custom attribute name under which the ERP id travels to the messaging platform.
pub const ERP_ID_ATTRIBUTE: &str = "odoo_contact_id";
