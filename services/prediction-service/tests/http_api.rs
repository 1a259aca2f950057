//! End-to-end checks of the login / predict flow over a real socket.

use std::net::SocketAddr;

use admission_core::{AuthConfig, LinearModel, UserCredential};
use chrono::{Duration, Utc};
use prediction_service::{AppState, LoginResponse, PredictResponse, TokenIssuer};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const SECRET: &str = "integration-secret";

fn model() -> LinearModel {
    LinearModel {
        feature_names: ["GRE Score", "TOEFL Score", "University Rating", "SOP", "LOR ", "CGPA", "Research"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        coefficients: vec![0.0019, 0.0028, 0.0059, 0.0016, 0.0169, 0.1184, 0.0243],
        intercept: -1.4214,
    }
}

fn auth() -> AuthConfig {
    AuthConfig {
        secret: SECRET.into(),
        token_ttl_minutes: 30,
        users: vec![UserCredential { username: "admin".into(), password: "password".into() }],
    }
}

fn sample() -> Value {
    json!({
        "GRE_Score": 320, "TOEFL_Score": 110, "University_Rating": 3,
        "SOP": 4.0, "LOR": 3.5, "CGPA": 8.5, "Research": 1
    })
}

async fn spawn() -> SocketAddr {
    let state = AppState::new(model(), &auth()).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(prediction_service::serve(listener, state, std::future::pending()));
    addr
}

async fn login(client: &Client, addr: SocketAddr, username: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("http://{addr}/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap()
}

async fn token(client: &Client, addr: SocketAddr) -> String {
    let resp = login(client, addr, "admin", "password").await;
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json::<LoginResponse>().await.unwrap().access_token
}

async fn detail(resp: reqwest::Response) -> String {
    resp.json::<Value>().await.unwrap()["detail"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn login_issues_verifiable_bearer_token() {
    let addr = spawn().await;
    let client = Client::new();
    let resp = login(&client, addr, "admin", "password").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: LoginResponse = resp.json().await.unwrap();
    assert_eq!(body.token_type, "bearer");

    let claims = TokenIssuer::new(SECRET.as_bytes(), Duration::minutes(30)).verify(&body.access_token).unwrap();
    assert_eq!(claims.sub, "admin");
    assert!(claims.exp > Utc::now().timestamp());
    assert!(TokenIssuer::new(b"wrong-key", Duration::minutes(30)).verify(&body.access_token).is_err());
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let addr = spawn().await;
    let client = Client::new();
    for (user, pass) in [("admin", "wrong"), ("root", "password"), ("", "")] {
        let resp = login(&client, addr, user, pass).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{user}/{pass}");
        assert_eq!(detail(resp).await, "Invalid username or password");
    }
    let resp = client.post(format!("http://{addr}/login")).json(&json!({ "username": "admin" })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let resp = client
        .post(format!("http://{addr}/login"))
        .json(&json!({ "username": "admin", "password": 12345 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn predict_requires_bearer_then_succeeds() {
    let addr = spawn().await;
    let client = Client::new();
    let url = format!("http://{addr}/predict");

    let resp = client.post(&url).json(&sample()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()["www-authenticate"], "Bearer");
    assert_eq!(detail(resp).await, "Missing or invalid Authorization header");

    let resp = client.post(&url).header("Authorization", "Token abc").json(&sample()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let token = token(&client, addr).await;
    let resp = client.post(&url).bearer_auth(&token).json(&sample()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: PredictResponse = resp.json().await.unwrap();
    assert_eq!(body.username, "admin");
    let expected = model().predict_one(&[320.0, 110.0, 3.0, 4.0, 3.5, 8.5, 1.0]).unwrap();
    assert!((body.chance_of_admit - expected).abs() < 1e-12);
}

#[tokio::test]
async fn expired_or_foreign_tokens_are_rejected() {
    let addr = spawn().await;
    let client = Client::new();
    let url = format!("http://{addr}/predict");

    let issuer = TokenIssuer::new(SECRET.as_bytes(), Duration::minutes(30));
    let expired = issuer.issue_with_expiry("admin", Utc::now() - Duration::seconds(1)).unwrap();
    let resp = client.post(&url).bearer_auth(expired).json(&sample()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(detail(resp).await, "Invalid token");

    let foreign = TokenIssuer::new(b"someone-else", Duration::minutes(30)).issue("admin").unwrap();
    let resp = client.post(&url).bearer_auth(foreign).json(&sample()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client.post(&url).bearer_auth("garbage").json(&sample()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let fresh = issuer.issue("admin").unwrap();
    let resp = client.post(&url).header("Authorization", format!("Bearer  {fresh}")).json(&sample()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(detail(resp).await, "Invalid token");
}

#[tokio::test]
async fn repeated_predictions_are_identical() {
    let addr = spawn().await;
    let client = Client::new();
    let token = token(&client, addr).await;
    let mut seen = Vec::new();
    for _ in 0..5 {
        let resp = client.post(format!("http://{addr}/predict")).bearer_auth(&token).json(&sample()).send().await.unwrap();
        let body: PredictResponse = resp.json().await.unwrap();
        seen.push(body.chance_of_admit.to_bits());
    }
    assert!(seen.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn malformed_payload_rejected_after_auth() {
    let addr = spawn().await;
    let client = Client::new();
    let token = token(&client, addr).await;
    let url = format!("http://{addr}/predict");

    let mut wrong_type = sample();
    wrong_type["GRE_Score"] = json!("high");
    let resp = client.post(&url).bearer_auth(&token).json(&wrong_type).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!detail(resp).await.is_empty());

    let resp = client.post(&url).bearer_auth(&token).json(&json!({ "GRE_Score": 320 })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let mut fractional = sample();
    fractional["GRE_Score"] = json!(320.0);
    let resp = client.post(&url).bearer_auth(&token).json(&fractional).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let mut out_of_range = sample();
    out_of_range["GRE_Score"] = json!(-5);
    let resp = client.post(&url).bearer_auth(&token).json(&out_of_range).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_routes_report_liveness() {
    let addr = spawn().await;
    let client = Client::new();
    let live: Value = client.get(format!("http://{addr}/live")).send().await.unwrap().json().await.unwrap();
    assert_eq!(live["live"], json!(true));
    let status: Value = client.get(format!("http://{addr}/status")).send().await.unwrap().json().await.unwrap();
    assert!(status.get("ready").is_some());
}

#[tokio::test]
async fn metrics_count_logins_and_predictions() {
    let addr = spawn().await;
    let client = Client::new();
    let token = token(&client, addr).await;
    let resp = client.post(format!("http://{addr}/predict")).bearer_auth(&token).json(&sample()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = client.post(format!("http://{addr}/predict")).json(&sample()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client.get(format!("http://{addr}/metrics")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = resp.text().await.unwrap();
    assert!(text.contains("admission_login_total{outcome=\"accepted\"}"), "{text}");
    assert!(text.contains("admission_predict_total{outcome=\"served\"}"), "{text}");
    assert!(text.contains("admission_predict_total{outcome=\"unauthenticated\"}"), "{text}");
    assert!(text.contains("admission_inference_latency_seconds_count"), "{text}");
}
