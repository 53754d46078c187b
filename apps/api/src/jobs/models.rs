use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cv::options::CvOptions;

/// Typical end-to-end generation time, used for `estimated_completion`.
pub const ESTIMATED_DURATION_SECS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Pipeline step. Each step carries a fixed progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStep {
    Queued,
    FetchingGithubData,
    AnalyzingRepositories,
    GeneratingSummaries,
    RenderingPdf,
    Uploading,
    Done,
}

impl JobStep {
    pub fn progress(self) -> u8 {
        match self {
            JobStep::Queued => 0,
            JobStep::FetchingGithubData => 10,
            JobStep::AnalyzingRepositories => 35,
            JobStep::GeneratingSummaries => 60,
            JobStep::RenderingPdf => 80,
            JobStep::Uploading => 95,
            JobStep::Done => 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub github_username: String,
    pub options: CvOptions,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: JobStep,
    /// Storage key of the rendered PDF; set only on completion.
    pub result_key: Option<String>,
    pub file_size: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl CvJob {
    pub fn new(user_id: Uuid, github_username: String, options: CvOptions) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            github_username,
            options,
            status: JobStatus::Queued,
            progress: 0,
            current_step: JobStep::Queued,
            result_key: None,
            file_size: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            failed_at: None,
        }
    }

    pub fn estimated_completion(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(ESTIMATED_DURATION_SECS)
    }

    /// Moves to `step`. Progress only ever increases; terminal jobs are left alone.
    pub fn advance(&mut self, step: JobStep) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Processing;
        self.current_step = step;
        self.progress = self.progress.max(step.progress());
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, result_key: String, file_size: u64) {
        if self.status.is_terminal() {
            return;
        }
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.current_step = JobStep::Done;
        self.progress = JobStep::Done.progress();
        self.result_key = Some(result_key);
        self.file_size = Some(file_size);
        self.updated_at = now;
        self.completed_at = Some(now);
    }

    /// Marks the job failed, keeping the progress it reached.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        self.updated_at = now;
        self.failed_at = Some(now);
    }
}

/// What clients see when polling a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: JobStep,
    pub github_username: String,
    pub theme: String,
    pub download_url: Option<String>,
    pub file_size: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl From<&CvJob> for JobView {
    fn from(job: &CvJob) -> Self {
        let download_url = (job.status == JobStatus::Completed)
            .then(|| format!("/api/v1/cv/{}/download", job.id));
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            current_step: job.current_step,
            github_username: job.github_username.clone(),
            theme: job.options.theme.as_str().to_string(),
            download_url,
            file_size: job.file_size,
            error_message: job.error_message.clone(),
            created_at: job.created_at,
            estimated_completion: (!job.status.is_terminal()).then(|| job.estimated_completion()),
            completed_at: job.completed_at,
            failed_at: job.failed_at,
        }
    }
}
