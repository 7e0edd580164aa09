//! Persistence collaborator contract plus a JSON file-backed implementation.
//!
//! DESIGN
//! ======
//! The engine mutates its collections first and then awaits the store; a
//! failed call is reported back unchanged and nothing is rolled back. The
//! store only sees wire records (`AnnotationData`), never live annotations.
//!
//! `FileStore` keeps one JSON array of records per task under its root
//! directory and one JSON document per saved user solution. Reads and
//! read-modify-write cycles share one async mutex, and every file is written
//! to a `.tmp` sibling first and renamed into place, so a reader never sees a
//! half-written file.

#[cfg(test)]
#[path = "persist_test.rs"]
mod persist_test;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::data::AnnotationData;
use crate::doc::{AnnotationId, AnnotationKind};

/// Identifier of the task an annotation set belongs to.
pub type TaskId = Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("annotation not found: {0}")]
    NotFound(AnnotationId),
    #[error("rejected by store: {0}")]
    Rejected(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Request to create a user solution for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSolutionCreate {
    pub task_id: TaskId,
    pub user_id: Uuid,
}

/// A stored user solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSolution {
    pub id: Uuid,
    pub task_id: TaskId,
    pub user_id: Uuid,
    pub annotations: Vec<AnnotationData>,
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Async persistence backend. Enables mocking in tests.
#[async_trait::async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Persist a new annotation under `task`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if the backend refuses or fails.
    async fn create(&self, task: TaskId, annotation: &AnnotationData) -> Result<(), PersistError>;

    /// Replace a stored annotation.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::NotFound`] if the annotation was never stored.
    async fn update(&self, task: TaskId, annotation: &AnnotationData) -> Result<(), PersistError>;

    /// Remove a stored annotation.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::NotFound`] if the annotation was never stored.
    async fn delete(&self, task: TaskId, id: AnnotationId) -> Result<(), PersistError>;

    /// Replace every stored annotation of `kind` under `task` with `annotations`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if the backend refuses or fails.
    async fn save_all(
        &self,
        task: TaskId,
        kind: AnnotationKind,
        annotations: &[AnnotationData],
    ) -> Result<(), PersistError>;

    /// Store a new user solution made of `annotations`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if the backend refuses or fails.
    async fn save_user_solution(
        &self,
        create: &UserSolutionCreate,
        annotations: &[AnnotationData],
    ) -> Result<UserSolution, PersistError>;
}

// =============================================================================
// FILE STORE
// =============================================================================

/// Stores annotation records as JSON files under a root directory.
pub struct FileStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn task_path(&self, task: TaskId) -> PathBuf {
        self.root.join(format!("{task}.json"))
    }

    fn solution_path(&self, id: Uuid) -> PathBuf {
        self.root.join("solutions").join(format!("{id}.json"))
    }

    /// Every record stored under `task`; a task never written is empty.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if the file exists but cannot be read or parsed.
    pub async fn load_task(&self, task: TaskId) -> Result<Vec<AnnotationData>, PersistError> {
        let _guard = self.lock.lock().await;
        self.read_task(task).await
    }

    /// Caller holds `lock`.
    async fn read_task(&self, task: TaskId) -> Result<Vec<AnnotationData>, PersistError> {
        match tokio::fs::read(self.task_path(task)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), PersistError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(value)?;
        let staged = path.with_extension("json.tmp");
        tokio::fs::write(&staged, bytes).await?;
        tokio::fs::rename(&staged, path).await?;
        Ok(())
    }

    async fn modify_task<F>(&self, task: TaskId, apply: F) -> Result<(), PersistError>
    where
        F: FnOnce(&mut Vec<AnnotationData>) -> Result<(), PersistError> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut records = self.read_task(task).await?;
        apply(&mut records)?;
        Self::write_json(&self.task_path(task), &records).await?;
        debug!(%task, records = records.len(), "task file written");
        Ok(())
    }
}

#[async_trait::async_trait]
impl AnnotationStore for FileStore {
    async fn create(&self, task: TaskId, annotation: &AnnotationData) -> Result<(), PersistError> {
        let annotation = annotation.clone();
        self.modify_task(task, move |records| {
            if records.iter().any(|r| r.id == annotation.id) {
                let reason = format!("duplicate annotation id {}", annotation.id);
                return Err(PersistError::Rejected(reason));
            }
            records.push(annotation);
            Ok(())
        })
        .await
    }

    async fn update(&self, task: TaskId, annotation: &AnnotationData) -> Result<(), PersistError> {
        let annotation = annotation.clone();
        self.modify_task(task, move |records| {
            let slot = records
                .iter_mut()
                .find(|r| r.id == annotation.id)
                .ok_or(PersistError::NotFound(annotation.id))?;
            *slot = annotation;
            Ok(())
        })
        .await
    }

    async fn delete(&self, task: TaskId, id: AnnotationId) -> Result<(), PersistError> {
        self.modify_task(task, move |records| {
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Err(PersistError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn save_all(
        &self,
        task: TaskId,
        kind: AnnotationKind,
        annotations: &[AnnotationData],
    ) -> Result<(), PersistError> {
        let replacement = annotations.to_vec();
        self.modify_task(task, move |records| {
            records.retain(|r| r.kind != kind);
            records.extend(replacement);
            Ok(())
        })
        .await
    }

    async fn save_user_solution(
        &self,
        create: &UserSolutionCreate,
        annotations: &[AnnotationData],
    ) -> Result<UserSolution, PersistError> {
        let solution = UserSolution {
            id: Uuid::new_v4(),
            task_id: create.task_id,
            user_id: create.user_id,
            annotations: annotations.to_vec(),
        };
        let _guard = self.lock.lock().await;
        Self::write_json(&self.solution_path(solution.id), &solution).await?;
        info!(
            id = %solution.id,
            task = %solution.task_id,
            count = solution.annotations.len(),
            "user solution saved"
        );
        Ok(solution)
    }
}
