//! 통합 테스트 공용 헬퍼.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use warden_api::{create_router, AppState, Stores};
use warden_core::{AppConfig, JwtConfig, ManualClock, PasswordConfig};

pub const API: &str = "/api/v1";

/// 테스트 시작 시각 (2023-11-14T22:13:20Z)
pub const START: i64 = 1_700_000_000;

/// 메모리 저장소와 수동 시계로 구성한 테스트 앱.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig {
            jwt: JwtConfig::default().with_secret("integration-test-secret"),
            password: PasswordConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            ..Default::default()
        };
        let clock = Arc::new(ManualClock::at_timestamp(START));
        let state = Arc::new(
            AppState::new(&config, Stores::memory(&config.roles), clock.clone()).unwrap(),
        );

        Self {
            router: create_router(state.clone()),
            state,
            clock,
        }
    }

    /// 요청 하나를 보내고 상태 코드와 JSON 본문을 돌려줍니다.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_raw(request).await
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn register(&self, username: &str, password: &str) -> StatusCode {
        let (status, _) = self
            .send(
                Method::POST,
                &format!("{}/user/register", API),
                None,
                Some(json!({
                    "username": username,
                    "password": password,
                    "email": format!("{}@example.com", username),
                })),
            )
            .await;
        status
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            &format!("{}/user/login", API),
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    /// 로그인 후 (액세스 토큰, 리프레시 토큰).
    pub async fn tokens(&self, username: &str, password: &str) -> (String, String) {
        let (status, body) = self.login(username, password).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        (
            body["access_token"].as_str().unwrap().to_string(),
            body["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn refresh(&self, refresh_token: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            &format!("{}/token/refresh", API),
            None,
            Some(json!({ "refreshToken": refresh_token })),
        )
        .await
    }
}

/// 에러 본문의 코드.
pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
