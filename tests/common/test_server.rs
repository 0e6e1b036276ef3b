use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use storerate::auth::SecretHasher;
use storerate::config::ServerConfig;
use storerate::server::{AppState, create_router};
use storerate::store::{SqliteStore, Store};
use storerate::types::{NewUser, Role};

pub const PASSWORD: &str = "Secret#123";

/// The router served on an ephemeral port inside the test process.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub store: Arc<SqliteStore>,
    pub client: reqwest::Client,
    server_task: JoinHandle<()>,
}

/// A logged-in account.
pub struct Account {
    pub id: i64,
    pub token: String,
}

impl TestServer {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..ServerConfig::default()
        };

        let store = Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
        store.initialize().expect("initialize store");

        let state = Arc::new(AppState::new(store.clone(), config));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let server_task = tokio::spawn(async move {
            axum::serve(listener, create_router(state))
                .await
                .expect("serve");
        });

        Self {
            temp_dir,
            base_url: format!("http://{addr}"),
            store,
            client: reqwest::Client::new(),
            server_task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Inserts an account directly, bypassing registration rules.
    pub fn seed_user(&self, email: &str, role: Role) -> i64 {
        let password_hash = SecretHasher::new().hash(PASSWORD).expect("hash password");
        self.store
            .create_user(&NewUser {
                name: "Integration Test Account".to_string(),
                email: email.to_string(),
                password_hash,
                address: "1 Test Street".to_string(),
                role,
            })
            .expect("seed user")
            .id
    }

    pub async fn login(&self, email: &str) -> String {
        let resp: Value = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .expect("login")
            .json()
            .await
            .expect("parse login response");
        resp["data"]["token"]
            .as_str()
            .expect("session token")
            .to_string()
    }

    /// Seeds an account with the given role and logs it in.
    pub async fn account(&self, email: &str, role: Role) -> Account {
        let id = self.seed_user(email, role);
        let token = self.login(email).await;
        Account { id, token }
    }

    pub async fn create_store(&self, token: &str, name: &str, owner_id: Option<i64>) -> i64 {
        let resp = self
            .client
            .post(self.url("/api/stores"))
            .bearer_auth(token)
            .json(&json!({
                "name": name,
                "email": "store@example.com",
                "address": "10 High Street",
                "owner_id": owner_id,
            }))
            .send()
            .await
            .expect("create store");
        assert_eq!(resp.status(), 201, "store creation failed");
        let body: Value = resp.json().await.expect("parse store response");
        body["data"]["id"].as_i64().expect("store id")
    }

    pub async fn rate(&self, token: &str, store_id: i64, rating: i64) -> reqwest::Response {
        self.client
            .post(self.url("/api/ratings"))
            .bearer_auth(token)
            .json(&json!({ "store_id": store_id, "rating": rating }))
            .send()
            .await
            .expect("submit rating")
    }

    pub async fn get_json(&self, token: Option<&str>, path: &str) -> (u16, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.expect("send request");
        let status = resp.status().as_u16();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server_task.abort();
    }
}
