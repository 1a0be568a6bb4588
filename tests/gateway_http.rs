//! HTTP surface: auth, envelope, and error-code mapping against a live router

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::*;
use medtrace::core_types::OrgType;
use medtrace::gateway::{auth::issue_token, create_router, state::AppState};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const SECRET: &str = "test-secret";

struct Server {
    base: String,
    client: reqwest::Client,
}

impl Server {
    async fn start(fx: &Fixture) -> Self {
        let state = Arc::new(AppState::new(fx.ctx.clone(), SECRET.to_string()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        Self {
            base: format!("http://{}/api/v1", addr),
            client: reqwest::Client::new(),
        }
    }

    fn token(org: &str, role: OrgType) -> String {
        issue_token(SECRET, org, role, Duration::hours(1)).unwrap()
    }

    async fn post(&self, org: &str, role: OrgType, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .bearer_auth(Self::token(org, role))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn get(&self, org: &str, role: OrgType, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .bearer_auth(Self::token(org, role))
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_health_and_auth() {
    let fx = Fixture::new();
    let server = Server::start(&fx).await;

    let resp = server
        .client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 0);

    let resp = server
        .client
        .get(format!("{}/history", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = server
        .client
        .get(format!("{}/history", server.base))
        .bearer_auth(issue_token("wrong", M1, OrgType::Manufacturer, Duration::hours(1)).unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn test_lot_shipment_history_over_http() {
    let fx = Fixture::new();
    let server = Server::start(&fx).await;

    let (status, body) = server
        .post(
            M1,
            OrgType::Manufacturer,
            "/lots",
            json!({"productId": P1, "lotNumber": "HTTP-1", "quantity": 6, "manufactureDate": "2026-01-15"}),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["quantity"], 6);

    let (status, body) = server
        .post(
            M1,
            OrgType::Manufacturer,
            "/shipments",
            json!({"toOrgId": D1, "toOrgType": "DISTRIBUTOR", "items": [{"productId": P1, "quantity": 4}]}),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["totalQuantity"], 4);
    let batch_id = body["data"]["shipmentBatchId"].as_str().unwrap().to_string();

    let (status, body) = server
        .post(
            M1,
            OrgType::Manufacturer,
            "/shipments",
            json!({"toOrgId": D1, "toOrgType": "DISTRIBUTOR", "items": [{"productId": P1, "quantity": 3}]}),
        )
        .await;
    assert_eq!(status, 422);
    assert_eq!(body["msg"], "INSUFFICIENT_STOCK");

    let (status, body) = server.get(D1, OrgType::Distributor, "/inventory/p1").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["inStock"], 4);

    let (status, body) = server
        .get(D1, OrgType::Distributor, "/history?actionTypes=RECEIVED&limit=10")
        .await;
    assert_eq!(status, 200);
    let rows = body["data"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["totalQuantity"], 4);
    assert_eq!(body["data"]["hasMore"], false);

    // Malformed quantities fall back to returning everything
    let (status, body) = server
        .post(
            D1,
            OrgType::Distributor,
            &format!("/shipments/{}/return", batch_id),
            json!({"reason": "wrong item", "productQuantities": "garbage"}),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["returnedCount"], 4);

    let (status, body) = server
        .post(
            D1,
            OrgType::Distributor,
            &format!("/shipments/{}/return", batch_id),
            json!({"reason": "again"}),
        )
        .await;
    assert_eq!(status, 422, "{}", body);
    assert_eq!(body["msg"], "CODES_NOT_OWNED");

    let (status, body) = server
        .post(
            D1,
            OrgType::Distributor,
            &format!("/shipments/{}/recall", batch_id),
            json!({"reason": "not mine"}),
        )
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["msg"], "FORBIDDEN");
}
