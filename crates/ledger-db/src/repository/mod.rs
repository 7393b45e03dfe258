//! # Repository Module
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sync job                                                              │
//! │       │                                                                 │
//! │       │  db.contacts().upsert_from_erp(&fields)                        │
//! │       ▼                                                                 │
//! │  ContactLedgerRepository                                               │
//! │  ├── upsert_from_erp / insert_imported                                 │
//! │  ├── select_for_push / mark_sent / mark_error                          │
//! │  └── exists_by_phone / count_by_status / list                          │
//! │                                                                         │
//! │  JobLockRepository                                                     │
//! │  ├── try_acquire(name, ttl)                                            │
//! │  └── release(lease)                                                    │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ContactLedgerRepository`](contact::ContactLedgerRepository) - Ledger rows and their status
//! - [`JobLockRepository`](job_lock::JobLockRepository) - Per-job leases

pub mod contact;
pub mod job_lock;
