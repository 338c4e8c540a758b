//! src/services/student_service.rs
//!
//! StudentService — orchestrates the relational store, snapshot cache and
//! photo store for the student workflows. Writes to the three stores are
//! independent: there is no transaction spanning them, and a failed cache
//! write after a successful row write is logged rather than returned.

use crate::{
    models::student::{CreateStudent, NewStudent, Student, UpdateStudent},
    stores::{PhotoStore, SnapshotCache, StoreError, StoreResult, StudentRepository},
};
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("photo is required")]
    MissingPhoto,
    #[error("student {0} not found")]
    StudentNotFound(u64),
    #[error("student {0} not found in cache")]
    NotCached(u64),
    #[error("photo upload failed: {0}")]
    Upload(StoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Cache key holding the snapshot of student `id`.
pub fn cache_key(id: u64) -> String {
    format!("student:{}", id)
}

/// Shared by every request handler; cloning is cheap.
#[derive(Clone)]
pub struct StudentService {
    pub repo: Arc<dyn StudentRepository>,
    pub cache: Arc<dyn SnapshotCache>,
    pub photos: Arc<dyn PhotoStore>,
    /// Upper bound on each individual store call.
    pub call_timeout: Duration,
}

impl StudentService {
    pub fn new(
        repo: Arc<dyn StudentRepository>,
        cache: Arc<dyn SnapshotCache>,
        photos: Arc<dyn PhotoStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            photos,
            call_timeout,
        }
    }

    /// Run one store call under `call_timeout`.
    async fn bounded<T, F>(&self, what: &'static str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(what, self.call_timeout)),
        }
    }

    async fn find(&self, id: u64) -> ServiceResult<Student> {
        self.bounded("student lookup", self.repo.find_by_id(id))
            .await
            .map_err(|err| match err {
                StoreError::NotFound => ServiceError::StudentNotFound(id),
                other => ServiceError::Store(other),
            })
    }

    /// Serialize `student` into its cache slot.
    ///
    /// Callers log the error and carry on; the row is already written, so the
    /// snapshot may lag behind it until the next successful write.
    async fn write_snapshot(&self, student: &Student) -> StoreResult<()> {
        let snapshot = serde_json::to_string(student)?;
        self.bounded(
            "snapshot write",
            self.cache.set(&cache_key(student.id), &snapshot),
        )
        .await
    }

    /// Upload the photo, insert the row, then cache the new snapshot.
    pub async fn create_student(&self, input: CreateStudent) -> ServiceResult<Student> {
        let photo = input.photo.ok_or(ServiceError::MissingPhoto)?;

        let photo_url = self
            .bounded(
                "photo upload",
                self.photos.store(
                    &photo.file_name,
                    photo.content_type.as_deref(),
                    photo.bytes,
                ),
            )
            .await
            .map_err(ServiceError::Upload)?;

        let student = self
            .bounded(
                "student insert",
                self.repo.insert(NewStudent {
                    name: input.name,
                    school: input.school,
                    photo: photo_url,
                }),
            )
            .await?;

        if let Err(err) = self.write_snapshot(&student).await {
            warn!(student_id = student.id, error = %err, "failed to cache created student");
        }

        info!(student_id = student.id, photo = %student.photo, "created student");
        Ok(student)
    }

    pub async fn list_students(&self) -> ServiceResult<Vec<Student>> {
        Ok(self.bounded("student list", self.repo.list()).await?)
    }

    pub async fn get_student(&self, id: u64) -> ServiceResult<Student> {
        self.find(id).await
    }

    /// Raw snapshot text exactly as it was last written.
    pub async fn get_cached_student(&self, id: u64) -> ServiceResult<String> {
        match self
            .bounded("snapshot read", self.cache.get(&cache_key(id)))
            .await
        {
            Ok(snapshot) => {
                debug!(student_id = id, "cache hit");
                Ok(snapshot)
            }
            Err(StoreError::NotFound) => {
                debug!(student_id = id, "cache miss");
                Err(ServiceError::NotCached(id))
            }
            Err(err) => Err(ServiceError::Store(err)),
        }
    }

    /// Apply non-empty fields, save the full row, then refresh the snapshot.
    pub async fn update_student(&self, id: u64, changes: UpdateStudent) -> ServiceResult<Student> {
        let mut student = self.find(id).await?;
        changes.apply_to(&mut student);

        self.bounded("student save", self.repo.save(&student))
            .await?;

        if let Err(err) = self.write_snapshot(&student).await {
            warn!(student_id = id, error = %err, "failed to cache updated student");
        }

        info!(student_id = id, "updated student");
        Ok(student)
    }

    /// Remove the row and evict the snapshot. Succeeds for absent IDs.
    ///
    /// The photo object is left in place.
    pub async fn delete_student(&self, id: u64) -> ServiceResult<()> {
        self.bounded("student delete", self.repo.delete_by_id(id))
            .await?;
        self.bounded("snapshot eviction", self.cache.delete(&cache_key(id)))
            .await?;

        info!(student_id = id, "deleted student");
        Ok(())
    }

    /// Connectivity check of the relational store, for readiness probes.
    pub async fn check_repository(&self) -> StoreResult<()> {
        self.bounded("repository ping", self.repo.ping()).await
    }

    /// Connectivity check of the cache, for readiness probes.
    pub async fn check_cache(&self) -> StoreResult<()> {
        self.bounded("cache ping", self.cache.ping()).await
    }
}
