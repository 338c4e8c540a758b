//! Clients for the three external systems behind the student service.
//!
//! Each system sits behind one async trait so the service can hold them as
//! `Arc<dyn ...>` and tests can swap in the in-memory versions:
//! - [`StudentRepository`] — relational rows (MySQL)
//! - [`SnapshotCache`] — serialized student snapshots (Redis)
//! - [`PhotoStore`] — photo payloads (S3)

use crate::models::student::{NewStudent, Student};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

pub mod in_memory;
pub mod mysql;
pub mod redis_cache;
pub mod s3;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
    #[error("object store error: {0}")]
    ObjectStore(String),
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait StudentRepository: Send + Sync + 'static {
    /// Create the `students` table if it does not exist.
    async fn ensure_schema(&self) -> StoreResult<()>;

    /// Insert a row and return it with its generated ID.
    async fn insert(&self, student: NewStudent) -> StoreResult<Student>;

    /// Returns `StoreError::NotFound` when no row has this ID.
    async fn find_by_id(&self, id: u64) -> StoreResult<Student>;

    /// Every row, unfiltered, in store order.
    async fn list(&self) -> StoreResult<Vec<Student>>;

    /// Full-row upsert keyed by `student.id`.
    async fn save(&self, student: &Student) -> StoreResult<()>;

    /// Deleting an absent ID is not an error.
    async fn delete_by_id(&self, id: u64) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait SnapshotCache: Send + Sync + 'static {
    /// Store `value` under `key` with no expiry.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Returns `StoreError::NotFound` on a miss.
    async fn get(&self, key: &str) -> StoreResult<String>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait PhotoStore: Send + Sync + 'static {
    /// Write a publicly readable object named `name` and return its URL.
    ///
    /// An existing object with the same name is overwritten.
    async fn store(
        &self,
        name: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> StoreResult<String>;
}

/// Public URL of an object in a virtual-hosted-style bucket.
pub fn public_object_url(bucket: &str, domain: &str, name: &str) -> String {
    format!("https://{}.{}/{}", bucket, domain, name)
}
