use std::{collections::HashMap, future::Future, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    types::OptimizationOutcome,
};

/// How long a finished task stays available for polling.
const FINISHED_TASK_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed { result: OptimizationOutcome },
    Failed { message: String },
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Completed { .. } | TaskStatus::Failed { .. })
    }
}

#[derive(Debug, Clone)]
struct TaskEntry {
    owner: String,
    status: TaskStatus,
    updated_at: DateTime<Utc>,
}

/// Background optimizations, polled by the session that started them.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<String, TaskEntry>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `job` on the runtime and returns the id to poll it with.
    pub async fn submit<F>(&self, owner: &str, job: F) -> String
    where
        F: Future<Output = Result<OptimizationOutcome>> + Send + 'static,
    {
        let id = Uuid::new_v4().to_string();
        {
            let mut tasks = self.tasks.lock().await;
            let cutoff = Utc::now() - Duration::minutes(FINISHED_TASK_TTL_MINUTES);
            tasks.retain(|_, t| !(t.status.is_finished() && t.updated_at < cutoff));
            tasks.insert(
                id.clone(),
                TaskEntry {
                    owner: owner.to_string(),
                    status: TaskStatus::Pending,
                    updated_at: Utc::now(),
                },
            );
        }

        let registry = self.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            registry.set_status(&task_id, TaskStatus::Running).await;
            // A panicking job still ends up as a failed task
            let outcome = tokio::spawn(job)
                .await
                .unwrap_or_else(|e| Err(AppError::Task(e.to_string())));
            let status = match outcome {
                Ok(result) => {
                    info!(task = %task_id, "optimization task completed");
                    TaskStatus::Completed { result }
                }
                Err(e) => {
                    warn!(task = %task_id, error = %e, "optimization task failed");
                    TaskStatus::Failed {
                        message: e.to_string(),
                    }
                }
            };
            registry.set_status(&task_id, status).await;
        });

        id
    }

    /// Status of a task, or `None` if it is unknown or belongs to someone else.
    pub async fn status(&self, owner: &str, id: &str) -> Option<TaskStatus> {
        self.tasks
            .lock()
            .await
            .get(id)
            .filter(|t| t.owner == owner)
            .map(|t| t.status.clone())
    }

    async fn set_status(&self, id: &str, status: TaskStatus) {
        if let Some(task) = self.tasks.lock().await.get_mut(id) {
            task.status = status;
            task.updated_at = Utc::now();
        }
    }
}
