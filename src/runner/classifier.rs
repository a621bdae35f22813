use super::task::{Expectation, TaskOutcome, UserRecord};
use crate::client::RawResponse;
use crate::token::TokenVerifier;
use crate::utils::config::ClassificationRules;
use serde_json::Value;

/// Turns raw responses into outcomes.
///
/// Classification depends only on the response, the expectation and the
/// submitted identity; the classifier holds no mutable state.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: ClassificationRules,
    verifier: TokenVerifier,
}

impl Classifier {
    pub fn new(rules: ClassificationRules, verifier: TokenVerifier) -> Self {
        Self { rules, verifier }
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    pub fn classify(
        &self,
        response: &RawResponse,
        expectation: Expectation,
        input: &UserRecord,
    ) -> TaskOutcome {
        if expectation == Expectation::StatusOk {
            return if response.is_success() {
                TaskOutcome::Success(response.json().unwrap_or(Value::Null))
            } else {
                TaskOutcome::Failure(format!("HTTP {}", response.status))
            };
        }

        if response.status >= 500 {
            return TaskOutcome::Failure(format!(
                "HTTP {}: {}",
                response.status,
                response.body.as_deref().unwrap_or("")
            ));
        }

        let body = match response.body.as_deref() {
            Some(body) => body,
            None => {
                return TaskOutcome::Exception(format!("HTTP {} with empty body", response.status))
            }
        };
        let json: Value = match serde_json::from_str(body) {
            Ok(json) => json,
            Err(e) => {
                return TaskOutcome::Exception(format!("Failed to parse response: {}", e));
            }
        };
        let msg = json.get("msg").and_then(Value::as_str);

        match expectation {
            Expectation::Registered => self.expect_registered(response, &json, msg),
            Expectation::Duplicate => self.expect_duplicate(&json, msg),
            Expectation::RegisteredOrDuplicate => {
                if msg == Some(self.rules.duplicate_marker.as_str()) {
                    self.expect_duplicate(&json, msg)
                } else {
                    self.expect_registered(response, &json, msg)
                }
            }
            Expectation::RegistrationRejected => {
                if msg == Some(self.rules.invalid_marker.as_str()) || json.get("error").is_some() {
                    TaskOutcome::Success(json)
                } else {
                    TaskOutcome::Failure(format!("Unexpected response for invalid data: {}", json))
                }
            }
            Expectation::LoginAccepted => self.expect_token(response, &json, input),
            Expectation::LoginRejected => self.expect_rejection(&json, msg),
            Expectation::LoginAcceptedOrRejected => {
                if json.get("token").is_some() {
                    self.expect_token(response, &json, input)
                } else {
                    self.expect_rejection(&json, msg)
                }
            }
            Expectation::StatusOk => TaskOutcome::Success(json),
        }
    }

    fn expect_registered(
        &self,
        response: &RawResponse,
        json: &Value,
        msg: Option<&str>,
    ) -> TaskOutcome {
        if !response.is_success() {
            return TaskOutcome::Failure(format!("HTTP {}: {}", response.status, json));
        }
        if msg == Some(self.rules.registered_marker.as_str()) {
            TaskOutcome::Success(json.clone())
        } else {
            TaskOutcome::Failure(format!(
                "Registration failed: {}",
                msg.unwrap_or("no msg field")
            ))
        }
    }

    fn expect_duplicate(&self, json: &Value, msg: Option<&str>) -> TaskOutcome {
        if msg != Some(self.rules.duplicate_marker.as_str()) {
            return TaskOutcome::Failure(format!(
                "Unexpected response for duplicate email: {}",
                json
            ));
        }
        if self.rules.duplicate_is_success {
            TaskOutcome::Success(json.clone())
        } else {
            TaskOutcome::Failure(format!(
                "Duplicate email rejected: {}",
                self.rules.duplicate_marker
            ))
        }
    }

    fn expect_token(
        &self,
        response: &RawResponse,
        json: &Value,
        input: &UserRecord,
    ) -> TaskOutcome {
        let token = match json.get("token").and_then(Value::as_str) {
            Some(token) => token,
            None => {
                return match json.get("msg").and_then(Value::as_str) {
                    Some(msg) => TaskOutcome::Failure(format!("Login failed: {}", msg)),
                    None => TaskOutcome::Failure(format!("No token in response: {}", json)),
                };
            }
        };
        if !response.is_success() {
            return TaskOutcome::Failure(format!("HTTP {} with token", response.status));
        }

        let claims = match self.verifier.verify(token) {
            Ok(claims) => claims,
            Err(e) => return TaskOutcome::Failure(format!("Token verification failed: {}", e)),
        };
        if claims.email != input.email {
            return TaskOutcome::Failure(format!(
                "Email mismatch in token: expected '{}', got '{}'",
                input.email, claims.email
            ));
        }
        if claims.user_name != input.user_name {
            return TaskOutcome::Failure(format!(
                "Username mismatch in token: expected '{}', got '{}'",
                input.user_name, claims.user_name
            ));
        }

        TaskOutcome::Success(serde_json::to_value(&claims).unwrap_or(Value::Null))
    }

    fn expect_rejection(&self, json: &Value, msg: Option<&str>) -> TaskOutcome {
        if json.get("token").is_some() {
            return TaskOutcome::Failure("Unexpected token in error response".to_string());
        }
        match msg {
            Some(m) if self.rules.rejection_messages.iter().any(|r| r == m) => {
                TaskOutcome::Success(json.clone())
            }
            Some(m) => TaskOutcome::Failure(format!("Unexpected error message: {}", m)),
            None => TaskOutcome::Failure(format!(
                "Unexpected response for invalid login: {}",
                json
            )),
        }
    }
}
