use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Finished,
    Failed,
    Cancelled,
}

/// Bookkeeping for one external-process invocation.
#[derive(Debug, Clone)]
pub struct Job {
    pub status: JobStatus,
    pub started_at: Option<Instant>,
    pub ended_at: Option<Instant>,
    pub exit_code: Option<i32>,
}

impl Job {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            started_at: None,
            ended_at: None,
            exit_code: None,
        }
    }

    pub fn elapsed_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let ended = self.ended_at.unwrap_or_else(Instant::now);
        Some(ended.duration_since(started).as_secs_f64())
    }
}
