//! Core types and shared functionality for the offline engine.
//!
//! This crate provides:
//! - The persistent offline store with SQLite backend
//! - The error taxonomy, classifier, and persistent error logger
//! - Sync operation and queue record types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod operation;
pub mod store;
pub mod taxonomy;

pub use config::{CacheStrategy, EngineConfig};
pub use error::Error;
pub use operation::{ConflictStrategy, OperationKind, Priority, QueueRecord, SyncOperation};
pub use store::{
    AssetKind, AssetRecord, ContentKind, ContentRecord, MemoryStore, OfflineStore, StoreDb, UserDataRecord,
};
pub use taxonomy::{ClassifiedError, ErrorCategory, ErrorCode, ErrorLogger, RecoveryAction, Severity};
