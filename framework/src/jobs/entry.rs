use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle of a queued job: `Pending` → `Running` → one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Expired,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// Terminal states, eligible for retention purges.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Pending,
            Self::Running,
            Self::Completed,
            Self::Failed,
            Self::Expired,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
        .ok_or_else(|| format!("unknown job status: {s}"))
    }
}

/// Options controlling retry, expiry, and scheduling for a job.
#[derive(Debug, Clone)]
pub struct JobOpts {
    /// Maximum number of attempts (including the first).
    pub max_attempts: i32,
    /// If set, the job is skipped when claimed after this duration from creation.
    pub expires_in: Option<Duration>,
    /// Delay before the job becomes eligible for processing.
    pub delay: Option<Duration>,
}

impl Default for JobOpts {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            expires_in: None,
            delay: None,
        }
    }
}

/// Stored representation of a queued job.
///
/// Fields map one-to-one onto the columns of the `jobs` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    pub id: Uuid,
    pub queue: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub locked_at: Option<OffsetDateTime>,
    pub locked_by: Option<String>,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}

/// What happened to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Back in the queue, eligible again after the delay.
    After(Duration),
    /// Out of attempts.
    Exhausted,
}

impl JobEntry {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }

    pub fn attempts_left(&self) -> i32 {
        (self.max_attempts - self.attempts).max(0)
    }

    pub fn complete(&mut self, result: Option<serde_json::Value>, now: OffsetDateTime) {
        self.status = JobStatus::Completed;
        self.result = result;
        self.last_error = None;
        self.completed_at = Some(now);
    }

    /// Close the entry without running it again.
    pub fn finish(&mut self, status: JobStatus, error: Option<String>, now: OffsetDateTime) {
        self.status = status;
        if error.is_some() {
            self.last_error = error;
        }
        self.completed_at = Some(now);
    }

    /// Record a failed attempt. The entry goes back to `Pending` with a
    /// backoff while attempts remain, otherwise it is `Failed`.
    pub fn fail_attempt(&mut self, error: String, backoff: Duration, now: OffsetDateTime) -> Retry {
        self.locked_at = None;
        self.locked_by = None;

        if self.attempts_left() > 0 {
            self.status = JobStatus::Pending;
            self.last_error = Some(error);
            self.run_at = now + backoff;
            Retry::After(backoff)
        } else {
            self.finish(JobStatus::Failed, Some(error), now);
            Retry::Exhausted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(attempts: i32) -> JobEntry {
        let now = OffsetDateTime::now_utc();
        JobEntry {
            id: Uuid::new_v4(),
            queue: "q".into(),
            payload: serde_json::Value::Null,
            status: JobStatus::Running,
            attempts,
            max_attempts: 3,
            run_at: now,
            expires_at: None,
            locked_at: Some(now),
            locked_by: Some("worker-1".into()),
            last_error: None,
            result: None,
            created_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!("expired".parse::<JobStatus>(), Ok(JobStatus::Expired));
        assert!("paused".parse::<JobStatus>().is_err());
    }

    #[test]
    fn failed_attempt_is_rescheduled_while_attempts_remain() {
        let now = OffsetDateTime::now_utc();
        let mut e = entry(1);

        let retry = e.fail_attempt("boom".into(), Duration::from_secs(2), now);
        assert_eq!(retry, Retry::After(Duration::from_secs(2)));
        assert_eq!(e.status, JobStatus::Pending);
        assert_eq!(e.run_at, now + Duration::from_secs(2));
        assert!(e.locked_by.is_none());
        assert!(e.completed_at.is_none());
    }

    #[test]
    fn last_attempt_fails_the_job() {
        let now = OffsetDateTime::now_utc();
        let mut e = entry(3);

        assert_eq!(e.fail_attempt("boom".into(), Duration::from_secs(8), now), Retry::Exhausted);
        assert_eq!(e.status, JobStatus::Failed);
        assert_eq!(e.last_error.as_deref(), Some("boom"));
        assert_eq!(e.completed_at, Some(now));
    }
}
