use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use timeclock::errors::StoreError;
use timeclock::rest::RestClient;
use timeclock::store::{DataStore, Filter, SelectOptions};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    path: String,
    query: String,
    apikey: Option<String>,
    authorization: Option<String>,
    prefer: Option<String>,
    body: String,
}

#[derive(Clone)]
struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
    reply: Arc<Mutex<(StatusCode, String)>>,
}

async fn record(
    State(recorder): State<Recorder>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    recorder.seen.lock().await.push(Seen {
        method,
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        apikey: header("apikey"),
        authorization: header("authorization"),
        prefer: header("prefer"),
        body: String::from_utf8_lossy(&body).to_string(),
    });
    let (status, body) = recorder.reply.lock().await.clone();
    (status, [("content-type", "application/json")], body)
}

async fn start() -> (RestClient, Recorder) {
    let recorder = Recorder {
        seen: Arc::new(Mutex::new(Vec::new())),
        reply: Arc::new(Mutex::new((StatusCode::OK, "[]".to_string()))),
    };
    let app = Router::new().fallback(record).with_state(recorder.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = RestClient::new(&format!("http://{addr}/"), "secret", Duration::from_secs(5)).unwrap();
    (client, recorder)
}

fn decoded(query: &str) -> String {
    query.replace("%2C", ",").replace("%2A", "*")
}

#[tokio::test]
async fn select_sends_filters_and_auth_headers() {
    let (client, recorder) = start().await;
    *recorder.reply.lock().await = (StatusCode::OK, r#"[{"id":1,"emp_code":"001"}]"#.to_string());

    let options = SelectOptions::new()
        .columns("id,emp_code")
        .eq("status", "active")
        .order("emp_code.asc")
        .limit(5);
    let rows = client.select("employees", &options).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["emp_code"], "001");

    let seen = recorder.seen.lock().await;
    let request = &seen[0];
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.path, "/rest/v1/employees");
    assert_eq!(
        decoded(&request.query),
        "select=id,emp_code&status=eq.active&order=emp_code.asc&limit=5"
    );
    assert_eq!(request.apikey.as_deref(), Some("secret"));
    assert_eq!(request.authorization.as_deref(), Some("Bearer secret"));
    assert_eq!(request.prefer.as_deref(), Some("return=representation"));
}

#[tokio::test]
async fn insert_posts_json_row() {
    let (client, recorder) = start().await;
    *recorder.reply.lock().await = (StatusCode::CREATED, r#"[{"id":9,"setting_name":"x"}]"#.to_string());

    let row = json!({ "setting_name": "x", "setting_value": "1" });
    let Value::Object(row) = row else { unreachable!() };
    let created = client.insert("settings", row).await.unwrap();
    assert_eq!(created[0]["id"], 9);

    let seen = recorder.seen.lock().await;
    assert_eq!(seen[0].method, Method::POST);
    assert_eq!(seen[0].path, "/rest/v1/settings");
    let body: Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["setting_value"], "1");
}

#[tokio::test]
async fn scalar_filter_is_id_equality() {
    let (client, recorder) = start().await;

    let Value::Object(row) = json!({ "note": "late" }) else { unreachable!() };
    client.update("time_logs", &Filter::from(7), row.clone()).await.unwrap();
    client.update("time_logs", &Filter::eq("id", 7), row).await.unwrap();
    client.delete("time_logs", &Filter::from(7)).await.unwrap();

    let seen = recorder.seen.lock().await;
    assert_eq!(seen[0].method, Method::PATCH);
    assert_eq!(seen[0].query, "id=eq.7");
    assert_eq!(seen[0].query, seen[1].query);
    assert_eq!(seen[2].method, Method::DELETE);
    assert_eq!(seen[2].query, "id=eq.7");
}

#[tokio::test]
async fn error_status_keeps_store_message() {
    let (client, recorder) = start().await;
    *recorder.reply.lock().await = (
        StatusCode::CONFLICT,
        r#"{"code":"23505","message":"duplicate key value"}"#.to_string(),
    );

    let err = client
        .select("employees", &SelectOptions::new())
        .await
        .unwrap_err();
    match err {
        StoreError::Status { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "duplicate key value");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn empty_body_is_no_rows() {
    let (client, recorder) = start().await;
    *recorder.reply.lock().await = (StatusCode::NO_CONTENT, String::new());

    let rows = client.delete("employees", &Filter::from(3)).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn unreachable_store_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RestClient::new(&format!("http://{addr}"), "secret", Duration::from_secs(2)).unwrap();
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)));
}
