use std::sync::Arc;

use agent_chronicle::models::node::{node_type, GraphEdge, GraphNode, NodeFilter, Upsert};
use agent_chronicle::persistence::db;
use agent_chronicle::persistence::graph_store::GraphStore;
use agent_chronicle::persistence::sqlite_store::SqliteGraphStore;
use chrono::{Duration, Utc};
use serde_json::json;

async fn store() -> SqliteGraphStore {
    let pool = db::connect_memory().await.expect("db connect");
    SqliteGraphStore::new(Arc::new(pool))
}

fn task(id: &str, content: &str) -> GraphNode {
    GraphNode::from_properties(
        id,
        node_type::TASK,
        &[node_type::TASK],
        &json!({ "content": content, "session_id": "s-1" }),
    )
    .expect("node")
}

#[tokio::test]
async fn in_memory_connect_creates_node_and_edge_tables() {
    let pool = db::connect_memory().await.expect("db connect");
    for table in ["node", "edge"] {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("table '{table}' should be queryable: {e}"));
        assert_eq!(row.0, 0, "table '{table}' should start empty");
    }
}

#[tokio::test]
async fn upsert_reports_created_then_updated() {
    let store = store().await;
    assert_eq!(
        store.upsert_node(task("t-1", "first")).await.expect("create"),
        Upsert::Created
    );
    assert_eq!(
        store.upsert_node(task("t-1", "second")).await.expect("update"),
        Upsert::Updated
    );

    let node = store.get_node("t-1").await.expect("get").expect("present");
    assert_eq!(node.properties["content"], "second");
    assert!(store.get_node("missing").await.expect("get").is_none());
}

#[tokio::test]
async fn update_keeps_created_at_and_embedding() {
    let store = store().await;
    let mut original = task("t-1", "first");
    original.created_at = Utc::now() - Duration::hours(1);
    original.embedding = Some(vec![1.0, 0.0]);
    let created_at = original.created_at;
    store.upsert_node(original).await.expect("create");

    store.upsert_node(task("t-1", "second")).await.expect("update");

    let node = store.get_node("t-1").await.expect("get").expect("present");
    assert_eq!(node.created_at.timestamp_micros(), created_at.timestamp_micros());
    assert_eq!(node.embedding, Some(vec![1.0, 0.0]));
}

#[tokio::test]
async fn search_is_newest_first_and_limited() {
    let store = store().await;
    let base = Utc::now();
    for (offset, id) in ["t-old", "t-mid", "t-new"].iter().enumerate() {
        let mut node = task(id, id);
        node.created_at = base + Duration::seconds(i64::try_from(offset).expect("offset"));
        store.upsert_node(node).await.expect("create");
    }

    let found = store
        .search_nodes(NodeFilter::any().of_type(node_type::TASK), 2)
        .await
        .expect("search");
    let ids: Vec<&str> = found.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["t-new", "t-mid"]);

    let none = store
        .search_nodes(NodeFilter::any(), 0)
        .await
        .expect("search");
    assert!(none.is_empty());
}

#[tokio::test]
async fn search_applies_property_and_text_clauses() {
    let store = store().await;
    store.upsert_node(task("t-1", "Write parser")).await.expect("create");
    store.upsert_node(task("t-2", "Ship release")).await.expect("create");

    let by_text = store
        .search_nodes(NodeFilter::any().containing("PARSER"), 10)
        .await
        .expect("search");
    assert_eq!(by_text.len(), 1);
    assert_eq!(by_text[0].id, "t-1");

    let by_expr = store
        .search_nodes(NodeFilter::parse("Label=Task&content=Ship release").expect("parse"), 10)
        .await
        .expect("search");
    assert_eq!(by_expr.len(), 1);
    assert_eq!(by_expr[0].id, "t-2");
}

#[tokio::test]
async fn edges_listed_from_source_in_insertion_order() {
    let store = store().await;
    let first = GraphEdge::link("MADE_DECISION", "s-1", "d-1");
    let second = GraphEdge::link("IDENTIFIED_TASK", "s-1", "t-1");
    assert_eq!(store.upsert_edge(first.clone()).await.expect("edge"), Upsert::Created);
    store.upsert_edge(second).await.expect("edge");
    store
        .upsert_edge(GraphEdge::link("PERFORMED", "s-2", "a-1"))
        .await
        .expect("edge");
    assert_eq!(store.upsert_edge(first).await.expect("edge"), Upsert::Updated);

    let edges = store.edges_from("s-1").await.expect("edges");
    let types: Vec<&str> = edges.iter().map(|e| e.edge_type.as_str()).collect();
    assert_eq!(types, vec!["MADE_DECISION", "IDENTIFIED_TASK"]);
}

#[tokio::test]
async fn similarity_search_ranks_by_cosine() {
    let store = store().await;
    for (id, vector) in [("near", vec![1.0, 0.1]), ("far", vec![0.0, 1.0])] {
        let mut node = task(id, id);
        node.embedding = Some(vector);
        store.upsert_node(node).await.expect("create");
    }
    store.upsert_node(task("plain", "no vector")).await.expect("create");

    let scored = store.search_similar(vec![1.0, 0.0], 5).await.expect("similar");
    assert_eq!(scored.len(), 2);
    assert_eq!(scored[0].node.id, "near");
    assert!(scored[0].score > scored[1].score);
}

#[tokio::test]
async fn property_clauses_compare_like_parsed_expressions() {
    let store = store().await;
    let node = |id: &str, props: serde_json::Value| {
        GraphNode::from_properties(id, node_type::ACTIVITY, &[node_type::ACTIVITY, "search"], &props)
            .expect("node")
    };
    store
        .upsert_node(node("a-1", json!({ "session_id": "s-1", "attempts": 3, "done": true })))
        .await
        .expect("create");
    store
        .upsert_node(node("a-2", json!({ "session_id": "s-2", "attempts": "3", "done": false })))
        .await
        .expect("create");

    let ids = |found: Vec<GraphNode>| found.into_iter().map(|n| n.id).collect::<Vec<_>>();

    let numeric = store
        .search_nodes(NodeFilter::parse("attempts=3").expect("parse"), 10)
        .await
        .expect("search");
    assert_eq!(ids(numeric), vec!["a-2", "a-1"]);

    let boolean = store
        .search_nodes(NodeFilter::parse("done=true").expect("parse"), 10)
        .await
        .expect("search");
    assert_eq!(ids(boolean), vec!["a-1"]);

    let typed = store
        .search_nodes(NodeFilter::any().with_property("attempts", 3), 10)
        .await
        .expect("search");
    assert_eq!(ids(typed), vec!["a-1"]);

    let scoped = store
        .search_nodes(
            NodeFilter::any()
                .of_type(node_type::ACTIVITY)
                .with_label("search")
                .with_property("session_id", "s-2"),
            10,
        )
        .await
        .expect("search");
    assert_eq!(ids(scoped), vec!["a-2"]);

    let wrong_label = store
        .search_nodes(NodeFilter::any().with_label("research"), 10)
        .await
        .expect("search");
    assert!(wrong_label.is_empty());
}

#[tokio::test]
async fn text_search_still_honours_the_limit() {
    let store = store().await;
    for id in ["t-1", "t-2", "t-3"] {
        store.upsert_node(task(id, "Parser work")).await.expect("create");
    }
    store.upsert_node(task("t-4", "Release")).await.expect("create");

    let found = store
        .search_nodes(NodeFilter::any().of_type(node_type::TASK).containing("parser"), 2)
        .await
        .expect("search");
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|n| n.properties["content"] == "Parser work"));
}
