//! # ledger-sync: Remote Clients and Sync Jobs
//!
//! This crate owns every outbound call of the ledger bridge: the ERP over
//! hand-built XML-RPC, the messaging platform over REST, and the three batch
//! jobs that reconcile both through the contact ledger.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Ledger Bridge Sync                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    jobs (run_exclusive + leases)                 │  │
//! │  │   erp_pull          messaging_push          messaging_import     │  │
//! │  └───────┬──────────────────────┬─────────────────────┬─────────────┘  │
//! │          │ ErpDirectory         │ MessagingDirectory  │ both           │
//! │          ▼                      ▼                     ▼                │
//! │  ┌────────────────┐     ┌────────────────┐                             │
//! │  │   ErpClient    │     │MessagingClient │                             │
//! │  │                │     │                │                             │
//! │  │ SessionCache   │     │ bearer token   │                             │
//! │  │ execute_kw     │     │ JSON bodies    │                             │
//! │  │ smart search   │     │ page envelopes │                             │
//! │  └───────┬────────┘     └───────┬────────┘                             │
//! │          ▼                      │                                       │
//! │  ┌────────────────┐             │                                       │
//! │  │    xmlrpc      │             │                                       │
//! │  │ codec + HTTP   │             │                                       │
//! │  └───────┬────────┘             │                                       │
//! │          └───────────┬──────────┘                                       │
//! │                      ▼                                                  │
//! │              retry (transport errors only)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Bridge configuration (file, environment, defaults)
//! - [`error`] - Sync error types
//! - [`xmlrpc`] - XML-RPC value model, codec and HTTP transport
//! - [`session`] - ERP login cache with TTL
//! - [`erp`] - ERP contact and product operations
//! - [`messaging`] - Messaging platform REST client
//! - [`gateway`] - Traits the jobs use to reach both remotes
//! - [`retry`] - Fixed-interval retry of transport failures
//! - [`jobs`] - Pull, push and import runs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ledger_sync::{run_erp_pull, BridgeConfig, ErpClient, PullOptions, SessionCache};
//!
//! let config = BridgeConfig::load(None)?;
//! let erp = ErpClient::new(config.erp.clone(), Arc::new(SessionCache::default()))?;
//!
//! let report = run_erp_pull(&database, &erp, PullOptions::default()).await?;
//! println!("created {}, updated {}", report.created, report.updated);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod erp;
pub mod error;
pub mod gateway;
pub mod jobs;
pub mod messaging;
pub mod retry;
pub mod session;
pub mod xmlrpc;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{BridgeConfig, DatabaseSettings, ErpSettings, JobSettings, MessagingSettings, ServerSettings};
pub use erp::{ErpClient, ErpContact, NewErpContact};
pub use error::{SyncError, SyncResult};
pub use gateway::{ErpCatalog, ErpDirectory, MessagingDirectory};
pub use jobs::{
    run_erp_pull, run_exclusive, run_messaging_import, run_messaging_push, ImportOptions,
    ImportReport, JobName, PullOptions, PullReport, PushOptions, PushReport,
};
pub use messaging::{ContactPage, CustomAttribute, DeliveryReceipt, MessagingClient, MessagingContact};
pub use retry::RetryPolicy;
pub use session::SessionCache;
