use std::fmt::{Display, Formatter, Result};

use crate::database::models::job_result::JobResult as ExecutionResult;
use crate::jobs::JobError;

/// Outcome of running a job once.
pub enum JobResult {
    Completed,
    Failed(JobError),
    TimedOut,
}

impl JobResult {
    /// Reason recorded on the execution row, `None` for a success.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Completed => None,
            Self::Failed(e) => Some(e.to_string()),
            Self::TimedOut => Some("Job execution timed out".to_string()),
        }
    }

    /// The error handed to the job's failure hook when this was its last attempt.
    pub fn into_error(self) -> Option<JobError> {
        match self {
            Self::Completed => None,
            Self::Failed(e) => Some(e),
            Self::TimedOut => Some(JobError::TryAgainLater(
                "Job execution timed out".to_string(),
            )),
        }
    }
}

impl Display for JobResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(e) => write!(f, "error: {e}"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

impl From<&JobResult> for ExecutionResult {
    fn from(result: &JobResult) -> Self {
        match result {
            JobResult::Completed => Self::Completed,
            JobResult::Failed(_) => Self::Failed,
            JobResult::TimedOut => Self::TimedOut,
        }
    }
}
