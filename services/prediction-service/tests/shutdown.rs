//! Readiness and liveness around the serving window. Kept in its own test
//! binary since it flips process-wide health flags.

use admission_core::{is_live, is_ready, AuthConfig, LinearModel, UserCredential};
use prediction_service::{router, AppState};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::oneshot;

fn state() -> AppState {
    let model = LinearModel { feature_names: (0..7).map(|i| format!("f{i}")).collect(), coefficients: vec![0.01; 7], intercept: 0.1 };
    let auth = AuthConfig {
        secret: "shutdown-secret".into(),
        token_ttl_minutes: 30,
        users: vec![UserCredential { username: "admin".into(), password: "password".into() }],
    };
    AppState::new(model, &auth).unwrap()
}

async fn get(client: &Client, url: String) -> (StatusCode, Value) {
    let resp = client.get(url).send().await.unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn ready_only_while_serving_and_not_live_after() {
    let client = Client::new();

    // Router mounted without `serve`: readiness never marked.
    let bare = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bare_addr = bare.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(bare, router(state())).await });
    let (code, body) = get(&client, format!("http://{bare_addr}/ready")).await;
    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], Value::Bool(false));
    let resp = client.get(format!("http://{bare_addr}/metrics")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(prediction_service::serve(listener, state(), async move {
        let _ = stopped.await;
    }));
    let poller = Client::new();
    let mut ready = false;
    for _ in 0..50 {
        if let Ok(resp) = poller.get(format!("http://{addr}/ready")).send().await {
            if resp.status() == StatusCode::OK {
                ready = true;
                break;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(ready);
    assert!(is_live());
    drop(poller);

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
    assert!(!is_ready());
    assert!(!is_live());
    let (code, body) = get(&client, format!("http://{bare_addr}/live")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["live"], Value::Bool(false));
}
