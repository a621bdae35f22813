use crate::runner::task::LoginMode;
use serde::{Deserialize, Serialize};

/// One feature file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFile {
    pub feature: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub scenarios: Vec<ScenarioDef>,
}

impl FeatureFile {
    /// Scenarios selected by `tags`. A scenario matches when it, or its
    /// feature, carries any of the tags. An empty filter selects everything.
    pub fn selected<'a>(&'a self, tags: &'a [String]) -> impl Iterator<Item = &'a ScenarioDef> {
        self.scenarios.iter().filter(move |scenario| {
            tags.is_empty()
                || tags
                    .iter()
                    .any(|t| self.tags.contains(t) || scenario.tags.contains(t))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDef {
    pub name: String,

    #[serde(default)]
    pub tags: Vec<String>,

    pub steps: Vec<StepDef>,
}

/// A step: human-readable text plus the action it performs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    /// e.g. "Given I am a registered user"
    pub step: String,

    #[serde(flatten)]
    pub action: StepAction,
}

impl StepDef {
    /// Leading Given/When/Then/And/But, or "*" when the text has none
    pub fn keyword(&self) -> &str {
        match self.step.split_whitespace().next() {
            Some(word @ ("Given" | "When" | "Then" | "And" | "But")) => word,
            _ => "*",
        }
    }

    /// Step text without its keyword
    pub fn text(&self) -> &str {
        let keyword = self.keyword();
        if keyword == "*" {
            self.step.trim()
        } else {
            self.step.trim_start()[keyword.len()..].trim_start()
        }
    }
}

/// Expected shape of a registration response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistrationExpect {
    Registered,
    Duplicate,
    Rejected,
}

/// Expected shape of a login response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoginExpect {
    Accepted,
    Rejected,
}

/// What a step does
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum StepAction {
    /// Create a fresh valid user, not yet registered
    GenerateUser,

    /// Create a user whose email is malformed
    GenerateInvalidUser,

    /// Create and register a user; fails unless registration succeeds
    RegisterUser,

    /// Submit the current user for registration and keep the response
    Register,

    /// Check the HTTP status of the last response
    ExpectStatus { status: u16 },

    /// Classify the last registration response
    ExpectRegistration { expect: RegistrationExpect },

    /// Register `count` fresh users concurrently
    #[serde(rename_all = "camelCase")]
    RegisterUsers { count: usize },

    /// Log in as the current user
    Login {
        #[serde(default = "default_mode")]
        by: LoginMode,
        /// Override the password sent
        #[serde(default)]
        password: Option<String>,
    },

    /// Classify the last login response
    ExpectLogin { expect: LoginExpect },

    /// Log in as every registered user at once
    ConcurrentLogins {
        #[serde(default = "default_mode")]
        by: LoginMode,
    },

    /// Every request of the last batch succeeded
    ExpectAllSucceeded,

    /// Submit the current user's payload `count` times at once
    ConcurrentRegistrations {
        #[serde(default = "default_copies")]
        count: usize,
    },

    /// Exactly one request of the last batch registered, the rest were duplicates
    ExpectSingleRegistration,

    /// Slowest request of the last batch stayed under the limit
    #[serde(rename_all = "camelCase")]
    ExpectMaxResponseTime {
        /// Falls back to the configured threshold
        #[serde(default)]
        max_ms: Option<u64>,
    },
}

fn default_mode() -> LoginMode {
    LoginMode::Email
}

fn default_copies() -> usize {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_keyword_split() {
        let step: StepDef = serde_yaml::from_str(
            "step: '  When I login with valid email'\naction: login\nby: email\n",
        )
        .unwrap();
        assert_eq!(step.keyword(), "When");
        assert_eq!(step.text(), "I login with valid email");
        assert!(matches!(
            step.action,
            StepAction::Login {
                by: LoginMode::Email,
                password: None
            }
        ));

        let bare: StepDef = serde_yaml::from_str("step: register it\naction: register\n").unwrap();
        assert_eq!(bare.keyword(), "*");
        assert_eq!(bare.text(), "register it");
    }

    #[test]
    fn test_action_parameters() {
        let yaml = r#"
- step: Given 10 registered users
  action: registerUsers
  count: 10
- step: When they all login
  action: concurrentLogins
- step: Then it was quick
  action: expectMaxResponseTime
  maxMs: 500
- step: When the same payload is sent
  action: concurrentRegistrations
"#;
        let steps: Vec<StepDef> = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(steps[0].action, StepAction::RegisterUsers { count: 10 }));
        assert!(matches!(
            steps[1].action,
            StepAction::ConcurrentLogins {
                by: LoginMode::Email
            }
        ));
        assert!(matches!(
            steps[2].action,
            StepAction::ExpectMaxResponseTime { max_ms: Some(500) }
        ));
        assert!(matches!(
            steps[3].action,
            StepAction::ConcurrentRegistrations { count: 3 }
        ));
    }

    #[test]
    fn test_tag_selection() {
        let yaml = r#"
feature: Client Login
tags: [login]
scenarios:
  - name: a
    tags: [smoke]
    steps: []
  - name: b
    steps: []
"#;
        let feature: FeatureFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(feature.selected(&[]).count(), 2);
        assert_eq!(feature.selected(&["smoke".to_string()]).count(), 1);
        assert_eq!(feature.selected(&["login".to_string()]).count(), 2);
        assert_eq!(feature.selected(&["other".to_string()]).count(), 0);
    }
}
