//! Shared server harness for E2E tests
#![allow(dead_code)]

use std::sync::Arc;

use api::{router, AppState};
use common::config::StorageBackend;
use common::Config;
use db::MemoryStore;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

/// Operator key the test server is configured with
pub const OPERATOR_KEY: &str = "test-operator-key";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: Arc<AppState>,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Server on an ephemeral port with the default badges seeded
    pub async fn new() -> Self {
        let config = Config {
            storage: StorageBackend::Memory,
            host: "127.0.0.1".to_string(),
            port: 0,
            reconcile_interval_secs: 0,
            operator_api_key: Some(OPERATOR_KEY.to_string()),
            ..Config::default()
        };
        let state = Arc::new(AppState::new(config, Arc::new(MemoryStore::new())));
        state.catalog.seed_defaults().await.unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST to an internal or operator endpoint with the operator key
    pub fn operator_post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("x-api-key", OPERATOR_KEY)
    }

    /// Create a user through the API
    pub async fn create_user(&self, username: &str) -> Uuid {
        let user: Value = self
            .operator_post("/social/users")
            .json(&json!({ "username": username }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        user["id"].as_str().unwrap().parse().unwrap()
    }

    /// Record an engagement and return the response body
    pub async fn engage(&self, user_id: Uuid, engagement: Value) -> reqwest::Response {
        self.operator_post("/social/karma/engagements")
            .json(&json!({ "userId": user_id, "engagement": engagement }))
            .send()
            .await
            .unwrap()
    }

    /// GET as the given user
    pub async fn get_as(&self, user_id: Uuid, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("x-user-id", user_id.to_string())
            .send()
            .await
            .unwrap()
    }
}
