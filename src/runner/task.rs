use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Synthetic identity used for one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub full_name: String,
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

impl UserRecord {
    /// Copy of this record with a different password, for negative login cases
    pub fn with_password(&self, password: &str) -> Self {
        Self {
            password: password.to_string(),
            ..self.clone()
        }
    }

    /// Record that only carries login credentials
    pub fn credentials(email: &str, password: &str) -> Self {
        Self {
            full_name: String::new(),
            user_name: String::new(),
            email: email.to_string(),
            password: password.to_string(),
            phone: String::new(),
        }
    }

    /// Short label for logs and failure listings
    pub fn label(&self) -> &str {
        if self.email.is_empty() {
            &self.user_name
        } else {
            &self.email
        }
    }
}

/// Which identifier a login request carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMode {
    Email,
    Username,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Register,
    Login(LoginMode),
}

impl TaskKind {
    pub fn operation(&self) -> Operation {
        match self {
            TaskKind::Register => Operation::Registration,
            TaskKind::Login(_) => Operation::Login,
        }
    }
}

/// Operation family used when grouping results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Registration,
    Login,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Registration => "registration",
            Operation::Login => "login",
        }
    }
}

/// What a task's response is supposed to look like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expectation {
    /// Body carries the "registered" marker
    Registered,
    /// Body carries the "already exists" marker
    Duplicate,
    /// Either of the two above
    RegisteredOrDuplicate,
    /// Invalid payload is refused with the "invalid data" marker
    RegistrationRejected,
    /// A token is returned whose claims match the submitted identity
    LoginAccepted,
    /// No token, and one of the known rejection messages
    LoginRejected,
    /// Either a valid token or a known rejection
    LoginAcceptedOrRejected,
    /// Only the HTTP status is checked (2xx)
    StatusOk,
}

/// One request attempt
#[derive(Debug, Clone)]
pub struct TaskUnit {
    pub id: usize,
    /// Request label, used to group load statistics
    pub name: String,
    pub kind: TaskKind,
    pub input: UserRecord,
    pub expectation: Expectation,
}

impl TaskUnit {
    pub fn register(id: usize, input: UserRecord, expectation: Expectation) -> Self {
        Self {
            id,
            name: "registration".to_string(),
            kind: TaskKind::Register,
            input,
            expectation,
        }
    }

    pub fn login(id: usize, input: UserRecord, mode: LoginMode, expectation: Expectation) -> Self {
        Self {
            id,
            name: "login".to_string(),
            kind: TaskKind::Login(mode),
            input,
            expectation,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Classified outcome of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "lowercase")]
pub enum TaskOutcome {
    /// Expected response; carries the decoded body (or token claims)
    Success(serde_json::Value),
    /// Response received but semantically wrong
    Failure(String),
    /// No usable response (transport, malformed body, panic, timeout)
    Exception(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    /// Failure reason or exception text
    pub fn reason(&self) -> Option<&str> {
        match self {
            TaskOutcome::Success(_) => None,
            TaskOutcome::Failure(reason) | TaskOutcome::Exception(reason) => Some(reason),
        }
    }

    /// The `msg` field of a successful payload, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            TaskOutcome::Success(payload) => payload.get("msg").and_then(|m| m.as_str()),
            _ => None,
        }
    }
}

/// Outcome of one dispatched task, immutable once produced
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: usize,
    pub name: String,
    pub operation: Operation,
    pub input: UserRecord,
    pub outcome: TaskOutcome,
    pub duration: Duration,
}
