//! In-memory implementations of the three store traits.
//!
//! Used by the test suite and for running the service without infrastructure.
//! Each store can be switched into a failing mode to exercise error paths.

use super::{
    PhotoStore, SnapshotCache, StoreError, StoreResult, StudentRepository, public_object_url,
};
use crate::models::student::{NewStudent, Student};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::RwLock;

/// Shared failure switch.
#[derive(Debug, Clone, Default)]
struct FailSwitch(Arc<AtomicBool>);

impl FailSwitch {
    fn set(&self, failing: bool) {
        self.0.store(failing, Ordering::SeqCst);
    }

    fn check(&self, what: &str) -> StoreResult<()> {
        if self.0.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("{} is failing", what)))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct Rows {
    next_id: u64,
    rows: BTreeMap<u64, Student>,
}

/// Student rows keyed by ID; IDs start at 1 and are never reused.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStudentRepository {
    inner: Arc<RwLock<Rows>>,
    fail: FailSwitch,
}

impl InMemoryStudentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.set(failing);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StudentRepository for InMemoryStudentRepository {
    async fn ensure_schema(&self) -> StoreResult<()> {
        self.fail.check("repository")
    }

    async fn insert(&self, student: NewStudent) -> StoreResult<Student> {
        self.fail.check("repository")?;
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let row = Student {
            id: inner.next_id,
            name: student.name,
            school: student.school,
            photo: student.photo,
        };
        inner.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Student> {
        self.fail.check("repository")?;
        self.inner
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self) -> StoreResult<Vec<Student>> {
        self.fail.check("repository")?;
        Ok(self.inner.read().await.rows.values().cloned().collect())
    }

    async fn save(&self, student: &Student) -> StoreResult<()> {
        self.fail.check("repository")?;
        let mut inner = self.inner.write().await;
        inner.next_id = inner.next_id.max(student.id);
        inner.rows.insert(student.id, student.clone());
        Ok(())
    }

    async fn delete_by_id(&self, id: u64) -> StoreResult<()> {
        self.fail.check("repository")?;
        self.inner.write().await.rows.remove(&id);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.fail.check("repository")
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
    fail: FailSwitch,
}

impl InMemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.set(failing);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SnapshotCache for InMemorySnapshotCache {
    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.fail.check("cache")?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        self.fail.check("cache")?;
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.fail.check("cache")?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.fail.check("cache")
    }
}

/// Photo objects held in memory, addressed like a public bucket.
#[derive(Debug, Clone)]
pub struct InMemoryPhotoStore {
    bucket: String,
    domain: String,
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    fail: FailSwitch,
}

impl InMemoryPhotoStore {
    pub fn new(bucket: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            domain: domain.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            fail: FailSwitch::default(),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.set(failing);
    }

    pub async fn object(&self, name: &str) -> Option<Bytes> {
        self.objects.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PhotoStore for InMemoryPhotoStore {
    async fn store(
        &self,
        name: &str,
        _content_type: Option<&str>,
        bytes: Bytes,
    ) -> StoreResult<String> {
        self.fail.check("photo store")?;
        self.objects.write().await.insert(name.to_string(), bytes);
        Ok(public_object_url(&self.bucket, &self.domain, name))
    }
}
