//! Ficore Records - MongoDB schema bootstrap and record access
//!
//! On startup the process connects to MongoDB with bounded retry, brings the live
//! database into agreement with the declared collections, validators and indexes,
//! seeds empty reference collections, and hands out a shared handle for record
//! access.
//!
//! - [`database`]: configuration, the [`DocumentStore`](database::DocumentStore) seam
//!   and the long-lived [`DatabaseManager`](database::DatabaseManager)
//! - [`schema`]: the declared collections and seed sets, checked at load time
//! - [`reconcile`]: inspect, plan, execute, seed
//! - [`repository`]: filtered reads and checked inserts used by request handlers

pub mod database;
pub mod error;
pub mod reconcile;
pub mod repository;
pub mod schema;

pub use database::{DatabaseConfig, DatabaseManager, DocumentStore, MemoryStore, RetryPolicy};
pub use error::{
    BootstrapError, ConnectivityError, RepositoryError, SchemaApplyError, StoreError,
    ValidationDefinitionError,
};
pub use reconcile::{initialize_database, plan_only, BootstrapReport};
pub use repository::RecordsRepository;
pub use schema::SchemaRegistry;

pub use record_types::{
    IndexKey, IndexOptions, IndexSpec, ReconciliationAction, ReconciliationPlan,
};
