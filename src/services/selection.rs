//! The selected job.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::sync::SyncService;
use crate::error::{AppError, AppResult};
use crate::models::{Job, JobId, Severity, StoreEvent};

impl SyncService {
    /// Select a job and refresh it from the backend.
    ///
    /// A later selection cancels this one's in-flight request. Returns
    /// `Ok(None)` when the job is not part of the loaded pushes.
    pub async fn select_job(&self, job_id: JobId) -> AppResult<Option<Job>> {
        let token = self.supersede_selection().await;

        let repo = {
            let mut store = self.store.write().await;
            if store.job(job_id).is_none() {
                warn!(job_id, "Selected job is not loaded");
                store.set_selected_job(None);
                store.emit(StoreEvent::notification(
                    format!("Selected job id: {} not within current push range.", job_id),
                    Severity::Danger,
                    true,
                ));
                return Ok(None);
            }
            store.set_selected_job(Some(job_id));
            store.repo().to_string()
        };

        let ids = [job_id];
        let jobs = tokio::select! {
            _ = token.cancelled() => {
                debug!(job_id, "Selection superseded");
                return Err(AppError::Cancelled(format!("selection of job {} superseded", job_id)));
            }
            result = self.backend.get_jobs_by_ids(&repo, &ids) => result?,
        };

        self.apply_jobs(&repo, jobs).await?;
        Ok(self.store.read().await.job(job_id).cloned())
    }

    /// Clear the selection and cancel its pending request.
    pub async fn clear_selection(&self) {
        if let Some(token) = self.selection.lock().await.take() {
            token.cancel();
        }
        self.store.write().await.set_selected_job(None);
    }

    async fn supersede_selection(&self) -> CancellationToken {
        let mut current = self.selection.lock().await;
        if let Some(previous) = current.take() {
            previous.cancel();
        }
        let token = self.shutdown.child_token();
        *current = Some(token.clone());
        token
    }
}
