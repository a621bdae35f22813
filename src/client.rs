//! HTTP access to the service under test

use crate::error::{HarnessError, HarnessResult};
use crate::runner::task::{LoginMode, TaskKind, UserRecord};
use crate::utils::config::Config;
use async_trait::async_trait;

/// Status and body of one response, before classification
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Option<String>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(body.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON, if there is one and it is valid
    pub fn json(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
    }
}

/// Registration and login endpoints
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn register(&self, user: &UserRecord) -> HarnessResult<RawResponse>;

    async fn login(&self, user: &UserRecord, mode: LoginMode) -> HarnessResult<RawResponse>;

    /// Issue the request a task describes
    async fn execute(&self, kind: TaskKind, user: &UserRecord) -> HarnessResult<RawResponse> {
        match kind {
            TaskKind::Register => self.register(user).await,
            TaskKind::Login(mode) => self.login(user, mode).await,
        }
    }
}

/// Form-encoded client built on `reqwest`
#[derive(Clone)]
pub struct HttpAuthClient {
    client: reqwest::Client,
    registration_url: String,
    login_url: String,
}

impl HttpAuthClient {
    pub fn new(config: &Config) -> HarnessResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| HarnessError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            registration_url: config.url(&config.registration_endpoint),
            login_url: config.url(&config.login_endpoint),
        })
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> HarnessResult<RawResponse> {
        let res = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| HarnessError::Transport(e.to_string()))?;

        let status = res.status().as_u16();
        let body = res.text().await.ok().filter(|b| !b.is_empty());
        log::debug!("POST {} -> {} {:?}", url, status, body);

        Ok(RawResponse { status, body })
    }
}

#[async_trait]
impl AuthApi for HttpAuthClient {
    async fn register(&self, user: &UserRecord) -> HarnessResult<RawResponse> {
        let form = [
            ("fullName", user.full_name.as_str()),
            ("userName", user.user_name.as_str()),
            ("email", user.email.as_str()),
            ("password", user.password.as_str()),
            ("phone", user.phone.as_str()),
        ];
        self.post_form(&self.registration_url, &form).await
    }

    async fn login(&self, user: &UserRecord, mode: LoginMode) -> HarnessResult<RawResponse> {
        let (user_name, email) = match mode {
            LoginMode::Email => ("", user.email.as_str()),
            LoginMode::Username => (user.user_name.as_str(), ""),
        };
        let form = [
            ("userName", user_name),
            ("email", email),
            ("password", user.password.as_str()),
        ];
        self.post_form(&self.login_url, &form).await
    }
}
