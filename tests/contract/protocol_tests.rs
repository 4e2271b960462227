//! Wire contract of the NDJSON request server.

use std::sync::Arc;

use agent_chronicle::config::GlobalConfig;
use agent_chronicle::persistence::db;
use agent_chronicle::persistence::sqlite_store::SqliteGraphStore;
use agent_chronicle::server::codec::MAX_LINE_BYTES;
use agent_chronicle::server::serve;
use agent_chronicle::state::{AppState, Collaborators};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

async fn app() -> (TempDir, AppState) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = GlobalConfig::for_workspace(dir.path()).expect("config");
    config.harvest.enabled = false;
    let config = Arc::new(config);

    let pool = db::connect_memory().await.expect("db connect");
    let store = Arc::new(SqliteGraphStore::new(Arc::new(pool)));
    let collaborators = Collaborators::from_config(&config, store).expect("collaborators");
    let state = AppState::build(config, collaborators).expect("state");
    (dir, state)
}

/// Feed `input` to the server until EOF and collect every response.
async fn exchange(state: &AppState, input: String) -> Vec<Value> {
    let (mut client_in, server_in) = tokio::io::duplex(64 * 1024);
    let (server_out, mut client_out) = tokio::io::duplex(64 * 1024);

    let writer = async move {
        client_in.write_all(input.as_bytes()).await.expect("write");
        client_in.shutdown().await.expect("shutdown");
    };
    let server = serve(state, server_in, server_out, CancellationToken::new());
    let reader = async move {
        let mut out = String::new();
        client_out.read_to_string(&mut out).await.expect("read");
        out
    };

    let ((), served, output) = tokio::join!(writer, server, reader);
    served.expect("serve");
    output
        .lines()
        .map(|line| serde_json::from_str(line).expect("response is json"))
        .collect()
}

fn request(id: Value, method: &str, params: Value) -> String {
    format!(
        "{}\n",
        json!({ "id": id, "method": method, "params": params })
    )
}

fn error_kind(response: &Value) -> &str {
    response["error"]["kind"].as_str().expect("error kind")
}

#[tokio::test]
async fn lifecycle_round_trips_over_the_wire() {
    let (_dir, state) = app().await;

    let started = exchange(&state, request(json!(1), "session/start", json!({}))).await;
    assert_eq!(started.len(), 1);
    assert_eq!(started[0]["id"], 1);
    let result = &started[0]["result"];
    assert_eq!(result["resumed"], false);
    assert_eq!(result["resolution"], "new");
    assert_eq!(result["project_state"], Value::Null);
    let session_id = result["session_id"].as_str().expect("session id").to_owned();

    let mut input = request(
        json!(2),
        "session/quicksave",
        json!({ "summary": "Refactored lexer", "bullets": ["split tokens"] }),
    );
    input.push_str(&request(
        json!(3),
        "activity/record",
        json!({ "kind": "file_modification", "detail": "src/lexer.rs" }),
    ));
    input.push_str(&request(
        json!(4),
        "session/end",
        json!({
            "session_id": session_id,
            "summary": "Lexer done",
            "decisions": ["Keep tokens borrowed"],
            "next_steps": ["Fuzz the lexer"],
        }),
    ));
    let responses = exchange(&state, input).await;
    assert_eq!(responses.len(), 3);

    let saved = &responses[0];
    assert_eq!(saved["id"], 2);
    assert_eq!(saved["result"]["status"], "saved");
    assert_eq!(saved["result"]["session_id"], session_id.as_str());
    assert_eq!(
        saved["result"]["warnings"].as_array().expect("warnings").len(),
        2
    );

    assert_eq!(responses[1]["result"]["session_id"], session_id.as_str());

    let ended = &responses[2]["result"];
    assert_eq!(ended["status"], "completed");
    assert_eq!(ended["decisions"][0]["content"], "Keep tokens borrowed");
    assert_eq!(ended["tasks"][0]["content"], "Fuzz the lexer");
    assert_eq!(ended["harvest"], Value::Null);
}

#[tokio::test]
async fn malformed_json_answers_with_null_id() {
    let (_dir, state) = app().await;
    let responses = exchange(&state, "{not json\n".into()).await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(error_kind(&responses[0]), "protocol");
    assert!(responses[0]["error"]["message"]
        .as_str()
        .expect("message")
        .starts_with("protocol: malformed request"));
}

#[tokio::test]
async fn unknown_method_echoes_id() {
    let (_dir, state) = app().await;
    let responses = exchange(&state, request(json!("abc"), "session/pause", json!({}))).await;
    assert_eq!(responses[0]["id"], "abc");
    assert_eq!(error_kind(&responses[0]), "protocol");
    assert_eq!(
        responses[0]["error"]["message"],
        "protocol: unknown method: session/pause"
    );
}

#[tokio::test]
async fn domain_errors_carry_their_kind() {
    let (_dir, state) = app().await;
    let mut input = request(json!(7), "session/quicksave", json!({ "summary": "x" }));
    input.push_str(&request(json!(8), "session/end", json!({ "session_id": "s" })));
    input.push_str(&request(
        json!(9),
        "session/end",
        json!({ "session_id": "s", "summary": " " }),
    ));
    input.push_str(&request(
        json!(10),
        "session/end",
        json!({ "session_id": "s", "summary": "done" }),
    ));
    input.push_str(&request(json!(11), "activity/record", json!({ "kind": "dancing" })));

    let responses = exchange(&state, input).await;
    let kinds: Vec<(&Value, &str)> = responses
        .iter()
        .map(|r| (&r["id"], error_kind(r)))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (&json!(7), "no_active_session"),
            (&json!(8), "invalid_input"),
            (&json!(9), "invalid_input"),
            (&json!(10), "session_not_found"),
            (&json!(11), "invalid_input"),
        ]
    );
}

#[tokio::test]
async fn blank_lines_are_ignored() {
    let (_dir, state) = app().await;
    let mut input = String::from("\n   \n");
    input.push_str(&request(json!(1), "memory/read", json!({ "path": "absent.md" })));
    input.push('\n');

    let responses = exchange(&state, input).await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["result"]["path"], "absent.md");
    assert_eq!(responses[0]["result"]["content"], Value::Null);
}

#[tokio::test]
async fn oversized_line_is_rejected_and_serving_continues() {
    let (_dir, state) = app().await;
    let mut input = "x".repeat(MAX_LINE_BYTES + 16);
    input.push('\n');
    input.push_str(&request(json!(2), "node/read", json!({ "id": "missing" })));

    let responses = exchange(&state, input).await;
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(error_kind(&responses[0]), "protocol");
    assert!(responses[0]["error"]["message"]
        .as_str()
        .expect("message")
        .contains("line too long"));
    assert_eq!(responses[1]["id"], 2);
    assert_eq!(responses[1]["result"]["node"], Value::Null);
}

#[tokio::test]
async fn search_methods_return_wrapped_collections() {
    let (_dir, state) = app().await;
    let started = exchange(&state, request(json!(1), "session/start", json!({}))).await;
    let session_id = started[0]["result"]["session_id"]
        .as_str()
        .expect("session id")
        .to_owned();

    let mut input = request(
        json!(2),
        "session/end",
        json!({ "session_id": session_id, "summary": "done", "decisions": ["Adopt sqlite"] }),
    );
    input.push_str(&request(
        json!(3),
        "node/search",
        json!({ "query": "type=Decision" }),
    ));
    input.push_str(&request(json!(4), "search", json!({ "query": "sqlite", "limit": 5 })));
    input.push_str(&request(json!(5), "node/read", json!({ "id": session_id })));

    let responses = exchange(&state, input).await;
    assert_eq!(responses.len(), 4);

    let nodes = responses[1]["result"]["nodes"].as_array().expect("nodes");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0]["properties"]["content"], "Adopt sqlite");

    let hits = responses[2]["result"]["hits"].as_array().expect("hits");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["score"], Value::Null);
    assert_eq!(hits[0]["node"]["node_type"], "Decision");

    let node = &responses[3]["result"]["node"];
    assert_eq!(node["id"], session_id.as_str());
    assert_eq!(node["properties"]["status"], "completed");
}

#[tokio::test]
async fn cancelled_server_stops_without_reading() {
    let (_dir, state) = app().await;
    let (_client, server_in) = tokio::io::duplex(1024);
    let (server_out, _reader) = tokio::io::duplex(1024);
    let cancel = CancellationToken::new();
    cancel.cancel();

    serve(&state, server_in, server_out, cancel)
        .await
        .expect("clean shutdown");
}
