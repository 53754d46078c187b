use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::jobs::models::CvJob;

/// A mutation applied to a stored job under the store's lock.
pub type JobUpdate = Box<dyn FnOnce(&mut CvJob) + Send>;

/// Job persistence seam. Carried in `AppState` as `Arc<dyn JobStore>`.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: CvJob);
    async fn get(&self, id: Uuid) -> Option<CvJob>;
    /// Applies `f` to the stored job and returns the updated copy.
    async fn update(
        &self,
        id: Uuid,
        f: JobUpdate,
    ) -> Option<CvJob>;
    /// Jobs for one user, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Vec<CvJob>;
    async fn delete(&self, id: Uuid) -> Option<CvJob>;
}

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, CvJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: CvJob) {
        self.jobs.write().await.insert(job.id, job);
    }

    async fn get(&self, id: Uuid) -> Option<CvJob> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn update(
        &self,
        id: Uuid,
        f: JobUpdate,
    ) -> Option<CvJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id)?;
        f(job);
        Some(job.clone())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Vec<CvJob> {
        let mut jobs: Vec<CvJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        jobs
    }

    async fn delete(&self, id: Uuid) -> Option<CvJob> {
        self.jobs.write().await.remove(&id)
    }
}
