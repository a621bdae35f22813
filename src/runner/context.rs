use super::aggregate::AggregateStats;
use super::task::{TaskResult, UserRecord};
use crate::client::RawResponse;
use crate::error::{HarnessError, HarnessResult};

/// Per-scenario state shared between steps.
///
/// Created empty at the start of every scenario and dropped at its end, so
/// nothing leaks from one scenario into the next.
#[derive(Debug, Default)]
pub struct ScenarioContext {
    /// The identity the scenario is acting as
    pub user: Option<UserRecord>,

    /// Identities created by `registerUsers`
    pub users: Vec<UserRecord>,

    /// Last single response, with the identity it was sent for
    pub response: Option<RawResponse>,

    /// Results of the last concurrent batch, in completion order
    pub batch: Vec<TaskResult>,

    /// Statistics of the last concurrent batch
    pub stats: Option<AggregateStats>,
}

impl ScenarioContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> HarnessResult<&UserRecord> {
        self.user
            .as_ref()
            .ok_or(HarnessError::MissingContext("no user generated or registered"))
    }

    pub fn response(&self) -> HarnessResult<&RawResponse> {
        self.response
            .as_ref()
            .ok_or(HarnessError::MissingContext("no response recorded"))
    }

    pub fn users(&self) -> HarnessResult<&[UserRecord]> {
        if self.users.is_empty() {
            return Err(HarnessError::MissingContext("no registered users"));
        }
        Ok(&self.users)
    }

    pub fn stats(&self) -> HarnessResult<&AggregateStats> {
        self.stats
            .as_ref()
            .ok_or(HarnessError::MissingContext("no concurrent batch has run"))
    }

    /// Store a finished batch together with its aggregate
    pub fn record_batch(&mut self, batch: Vec<TaskResult>) {
        self.stats = Some(AggregateStats::from_results(&batch));
        self.batch = batch;
    }
}
