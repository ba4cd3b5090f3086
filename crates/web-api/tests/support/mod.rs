#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use config::{JoinPolicy, JwtConfig};
use domain::RoomId;
use infrastructure::{Infrastructure, InfrastructureConfig};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use web_api::{router, AppState, JwtService};

pub struct TestServer {
    pub addr: SocketAddr,
    pub infra: Infrastructure,
    pub client: Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_policy(JoinPolicy::ParticipantsOnly).await
    }

    pub async fn start_with_policy(join_policy: JoinPolicy) -> Self {
        let infra = Infrastructure::build(InfrastructureConfig {
            bcrypt_cost: 4,
            join_policy,
        });
        let jwt_service = Arc::new(JwtService::new(JwtConfig {
            secret: "integration-test-secret-with-32-plus-chars".to_string(),
            expiration_hours: 1,
        }));
        let state = AppState::new(
            Arc::new(infra.user_service()),
            Arc::new(infra.chat_service()),
            infra.hub.clone(),
            jwt_service,
        );
        let app = router(state, &["*".to_string()]);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            infra,
            client: Client::new(),
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    /// 注册并返回 token
    pub async fn register(&self, username: &str) -> String {
        let response = self
            .client
            .post(self.http("/api/register"))
            .json(&json!({ "username": username, "password": "secret" }))
            .send()
            .await
            .expect("register");
        assert!(response.status().is_success(), "register {username} failed");
        let body: Value = response.json().await.expect("register json");
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn create_room(&self, token: &str, name: &str, participants: &[&str]) -> RoomId {
        let body: Value = self
            .client
            .post(self.http("/api/rooms"))
            .bearer_auth(token)
            .json(&json!({ "name": name, "participants": participants }))
            .send()
            .await
            .expect("create room")
            .json()
            .await
            .expect("room json");
        serde_json::from_value(body["room"]["id"].clone()).expect("room id")
    }

    /// 等待在线成员数达到预期，WebSocket 上的 join 没有回执
    pub async fn wait_for_members(&self, room_id: RoomId, expected: usize) {
        for _ in 0..100 {
            if self.infra.hub.live_members(room_id).await == expected {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
        panic!("room {room_id} never reached {expected} live members");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
