//! MongoDB-backed document store

use super::store::{
    keys_from_document, keys_to_document, DocumentStore, LiveIndex, ProbeOutcome, SortKey,
};
use super::DatabaseConfig;
use crate::error::{ConnectivityError, StoreError};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions as DriverIndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use record_types::{IndexOptions, IndexSpec};
use tracing::debug;

const DUPLICATE_KEY: i32 = 11000;
const NAMESPACE_EXISTS: i32 = 48;

/// [`DocumentStore`] over a live MongoDB database
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Build a client for the configured URI.
    ///
    /// The driver connects lazily, so this never touches the network; reachability is
    /// established by the connection supervisor through [`DocumentStore::ping`].
    pub async fn open(config: &DatabaseConfig) -> Result<Self, ConnectivityError> {
        let mut options = ClientOptions::parse(&config.mongo_uri)
            .await
            .map_err(|e| ConnectivityError::Configuration {
                message: e.to_string(),
            })?;
        options.server_selection_timeout = Some(config.server_selection_timeout);
        options.app_name = Some(config.app_name.clone());

        let client =
            Client::with_options(options).map_err(|e| ConnectivityError::Configuration {
                message: e.to_string(),
            })?;
        let database = client.database(&config.database_name);
        Ok(Self { client, database })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

fn is_transient(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. }
    )
}

fn error_code(err: &MongoError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        ErrorKind::Write(WriteFailure::WriteError(write)) => Some(write.code),
        ErrorKind::InsertMany(insert) => insert
            .write_errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|write| write.code),
        _ => None,
    }
}

fn store_error(err: MongoError) -> StoreError {
    let message = err.to_string();
    if is_transient(&err) {
        return StoreError::Unavailable { message };
    }
    match error_code(&err) {
        Some(NAMESPACE_EXISTS) => StoreError::AlreadyExists { message },
        Some(DUPLICATE_KEY) => StoreError::DuplicateKey { message },
        _ => StoreError::Rejected { message },
    }
}

fn live_index(model: IndexModel) -> LiveIndex {
    let driver_options = model.options.as_ref();
    LiveIndex::new(
        keys_from_document(&model.keys),
        IndexOptions {
            unique: driver_options.and_then(|o| o.unique).unwrap_or(false),
            sparse: driver_options.and_then(|o| o.sparse).unwrap_or(false),
        },
    )
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn database_name(&self) -> &str {
        self.database.name()
    }

    async fn ping(&self) -> ProbeOutcome {
        match self.database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => ProbeOutcome::Ready,
            Err(e) if is_transient(&e) => ProbeOutcome::Transient(e.to_string()),
            Err(e) => ProbeOutcome::Fatal(e.to_string()),
        }
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        self.database
            .list_collection_names()
            .await
            .map_err(store_error)
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<LiveIndex>, StoreError> {
        let cursor = self
            .collection(collection)
            .list_indexes()
            .await
            .map_err(store_error)?;
        let models: Vec<IndexModel> = cursor.try_collect().await.map_err(store_error)?;
        Ok(models.into_iter().map(live_index).collect())
    }

    async fn create_collection(
        &self,
        collection: &str,
        validator: &Document,
    ) -> Result<(), StoreError> {
        self.database
            .create_collection(collection)
            .validator(validator.clone())
            .await
            .map_err(store_error)
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), StoreError> {
        let options = DriverIndexOptions::builder()
            .unique(index.options.unique.then_some(true))
            .sparse(index.options.sparse.then_some(true))
            .build();
        let model = IndexModel::builder()
            .keys(keys_to_document(&index.keys))
            .options(options)
            .build();
        let created = self
            .collection(collection)
            .create_index(model)
            .await
            .map_err(store_error)?;
        debug!("Index {} ready on {}", created.index_name, collection);
        Ok(())
    }

    async fn count_documents(&self, collection: &str) -> Result<u64, StoreError> {
        self.collection(collection)
            .count_documents(doc! {})
            .await
            .map_err(store_error)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, StoreError> {
        self.collection(collection)
            .insert_one(document)
            .await
            .map(|result| result.inserted_id)
            .map_err(store_error)
    }

    /// Ordered and outside any transaction: a failure partway through leaves the
    /// documents before it in place.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, StoreError> {
        self.collection(collection)
            .insert_many(documents)
            .await
            .map(|result| result.inserted_ids.len())
            .map_err(store_error)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<SortKey>,
    ) -> Result<Vec<Document>, StoreError> {
        let target = self.collection(collection);
        let mut find = target.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort.to_document());
        }
        let cursor = find.await.map_err(store_error)?;
        cursor.try_collect().await.map_err(store_error)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.collection(collection)
            .find_one(filter)
            .await
            .map_err(store_error)
    }
}
