//! Drives `prepare` against a local HTTP server standing in for the dataset host.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use admission_core::DataConfig;
use axum::{http::StatusCode, routing::get, Router};
use data_preparer::{prepare, PrepareError};

fn admission_csv(rows: usize) -> String {
    let mut out = String::from("Serial No.,GRE Score,TOEFL Score,University Rating,SOP,LOR ,CGPA,Research,Chance of Admit \n");
    for i in 0..rows {
        let gre = 300 + (i * 7) % 40;
        let toefl = 95 + (i * 3) % 25;
        let rating = 1 + i % 5;
        let sop = 1.0 + (i % 9) as f64 * 0.5;
        let lor = 1.5 + (i % 7) as f64 * 0.5;
        let cgpa = 7.0 + (i % 30) as f64 / 10.0;
        let research = i % 2;
        let chance = 0.4 + (i % 50) as f64 / 100.0;
        out.push_str(&format!("{},{gre},{toefl},{rating},{sop},{lor},{cgpa},{research},{chance}\n", i + 1));
    }
    out
}

async fn serve(body: String) -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new()
        .route("/admission.csv", get(move || {
            let counter = counter.clone();
            let body = body.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                body
            }
        }))
        .route("/missing.csv", get(|| async { StatusCode::NOT_FOUND }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (addr, hits)
}

fn config(dir: &std::path::Path, url: String) -> DataConfig {
    DataConfig {
        url,
        raw_path: dir.join("raw").join("admission.csv"),
        processed_dir: dir.join("processed"),
        ..DataConfig::default()
    }
}

fn read_outputs(cfg: &DataConfig) -> Vec<String> {
    ["X_train.csv", "X_test.csv", "y_train.csv", "y_test.csv"]
        .iter()
        .map(|f| std::fs::read_to_string(cfg.processed_dir.join(f)).unwrap())
        .collect()
}

#[tokio::test]
async fn downloads_once_and_rewrites_identical_splits() {
    let (addr, hits) = serve(admission_csv(50)).await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), format!("http://{addr}/admission.csv"));

    let first = prepare(&cfg).await.unwrap();
    assert!(first.downloaded);
    assert_eq!(first.raw_rows, 50);
    assert_eq!((first.train_rows, first.test_rows), (40, 10));
    assert_eq!(first.feature_columns.len(), 7);
    assert!(!first.feature_columns.iter().any(|c| c == "Serial No."));
    let before = read_outputs(&cfg);

    // Clobber one output to prove the second run rewrites it.
    std::fs::write(cfg.processed_dir.join("X_test.csv"), "stale").unwrap();
    let second = prepare(&cfg).await.unwrap();
    assert!(!second.downloaded);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(read_outputs(&cfg), before);

    assert!(before[2].starts_with("Chance of Admit \n"));
    assert_eq!(before[0].lines().count(), 41);
}

#[tokio::test]
async fn non_success_status_is_a_transfer_error() {
    let (addr, _) = serve(String::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), format!("http://{addr}/missing.csv"));

    match prepare(&cfg).await {
        Err(PrepareError::Transfer { status, .. }) => assert_eq!(status.as_u16(), 404),
        other => panic!("expected transfer error, got {other:?}"),
    }
    assert!(!cfg.raw_path.exists());
}

#[tokio::test]
async fn cached_file_without_identifier_column_is_used() {
    let dir = tempfile::tempdir().unwrap();
    // Unroutable URL: the cached file must be used without touching the network.
    let cfg = config(dir.path(), "http://127.0.0.1:9/never".into());
    std::fs::create_dir_all(cfg.raw_path.parent().unwrap()).unwrap();
    let csv: String = admission_csv(10)
        .lines()
        .map(|l| l.split_once(',').unwrap().1.to_string() + "\n")
        .collect();
    std::fs::write(&cfg.raw_path, csv).unwrap();

    let report = prepare(&cfg).await.unwrap();
    assert!(!report.downloaded);
    assert_eq!((report.train_rows, report.test_rows), (8, 2));
    assert_eq!(report.feature_columns[0], "GRE Score");
}
