//! In-process stand-in for the registration/login service.
#![allow(dead_code)]

use authprobe::utils::config::Config;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Json, Router};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "123456";

#[derive(Debug, Clone)]
struct Account {
    user_name: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct MockState {
    accounts: Mutex<HashMap<String, Account>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationForm {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginForm {
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

pub struct MockService {
    pub addr: SocketAddr,
}

impl MockService {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/client_registeration", post(register))
            .route("/client_login", post(login))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock service");
        let addr = listener.local_addr().expect("mock service address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock service");
        });

        Self { addr }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Default config pointed at this service, with no think time
    pub fn config(&self) -> Config {
        Config {
            base_url: self.base_url(),
            wait_time_min: 0.0,
            wait_time_max: 0.05,
            ..Config::default()
        }
    }
}

async fn register(
    State(state): State<Arc<MockState>>,
    Form(form): Form<RegistrationForm>,
) -> (StatusCode, Json<Value>) {
    let complete = !form.full_name.is_empty()
        && !form.user_name.is_empty()
        && !form.password.is_empty()
        && !form.phone.is_empty();
    if !complete || !valid_email(&form.email) {
        return (StatusCode::BAD_REQUEST, Json(json!({"msg": "Invalid Data"})));
    }

    let mut accounts = state.accounts.lock().expect("accounts lock");
    if accounts.contains_key(&form.email) {
        return (StatusCode::OK, Json(json!({"msg": "Email already Exist"})));
    }
    accounts.insert(
        form.email.clone(),
        Account {
            user_name: form.user_name,
            email: form.email,
            password: form.password,
        },
    );
    (StatusCode::OK, Json(json!({"msg": "User Registered"})))
}

async fn login(
    State(state): State<Arc<MockState>>,
    Form(form): Form<LoginForm>,
) -> (StatusCode, Json<Value>) {
    let account = {
        let accounts = state.accounts.lock().expect("accounts lock");
        if form.email.is_empty() {
            accounts
                .values()
                .find(|a| !form.user_name.is_empty() && a.user_name == form.user_name)
                .cloned()
        } else {
            accounts.get(&form.email).cloned()
        }
    };

    let account = match account {
        Some(account) => account,
        None if form.email.is_empty() => {
            return (
                StatusCode::OK,
                Json(json!({"msg": "In correct username or password"})),
            )
        }
        None => {
            return (
                StatusCode::OK,
                Json(json!({"msg": "In correct email or password"})),
            )
        }
    };
    if account.password != form.password {
        return (StatusCode::OK, Json(json!({"msg": "Invalid Password"})));
    }

    let claims = json!({
        "email": account.email,
        "userName": account.user_name,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    match encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    ) {
        Ok(token) => (StatusCode::OK, Json(json!({"token": token}))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        ),
    }
}

fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && !local.starts_with('.')
        && !local.ends_with('.')
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-_".contains(c));
    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|l| {
            !l.is_empty() && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    local_ok && domain_ok
}
