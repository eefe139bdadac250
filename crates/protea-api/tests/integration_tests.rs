//! Integration tests for the Protea API.
//!
//! Drives the full router with in-memory storage and scripted agents. Each
//! test builds its own state.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use protea_api::create_router;
use protea_api::handlers::HealthResponse;
use protea_api::state::AppState;
use protea_chat::{
    AgentError, CallPolicy, Classification, ConversationResponder, ConversationTurn,
    DatabaseQueryAgent, InputClassifier, QueryDispatcher, UnconfiguredAgent,
};
use protea_core::config::ProteaConfig;
use protea_storage::{Database, ProteinRepository};

// =============================================================================
// Helpers
// =============================================================================

/// Classifies by a fixed keyword so one state serves both branches.
struct KeywordClassifier;

#[async_trait]
impl InputClassifier for KeywordClassifier {
    async fn classify(&self, utterance: &str) -> Result<Classification, AgentError> {
        if utterance.contains("length") {
            Ok(Classification::Query)
        } else {
            Ok(Classification::Conversation)
        }
    }
}

#[derive(Default)]
struct EchoResponder {
    seen: Mutex<Vec<Vec<ConversationTurn>>>,
}

#[async_trait]
impl ConversationResponder for EchoResponder {
    async fn respond(&self, context: &[ConversationTurn]) -> Result<String, AgentError> {
        self.seen.lock().unwrap().push(context.to_vec());
        Ok(format!("You said: {}", context.last().unwrap().content))
    }
}

#[derive(Default)]
struct CannedQueryAgent {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl DatabaseQueryAgent for CannedQueryAgent {
    async fn answer(&self, question: &str) -> Result<String, AgentError> {
        self.seen.lock().unwrap().push(question.to_string());
        Ok("| length |\n| --- |\n| 430 |\n\nQuery: SELECT length FROM protein_data".to_string())
    }
}

struct TestApp {
    router: axum::Router,
    state: AppState,
    responder: Arc<EchoResponder>,
    query_agent: Arc<CannedQueryAgent>,
}

fn make_app_with(config: ProteaConfig) -> TestApp {
    let db = Arc::new(Database::in_memory().unwrap());
    let proteins = Arc::new(ProteinRepository::new(db));
    let responder = Arc::new(EchoResponder::default());
    let query_agent = Arc::new(CannedQueryAgent::default());
    let dispatcher = QueryDispatcher::new(
        Arc::new(KeywordClassifier),
        responder.clone(),
        query_agent.clone(),
    );
    let state = AppState::new(config, proteins, dispatcher, true);
    TestApp {
        router: create_router(state.clone()),
        state,
        responder,
        query_agent,
    }
}

fn make_app() -> TestApp {
    make_app_with(ProteaConfig::default())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, json: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn protein(entry: &str, length: i64) -> Value {
    json!({
        "entry": entry,
        "length": length,
        "first_seen": "2020-01-01",
        "last_seen": "2020-01-31",
        "organism_id": 9606,
        "protein_names": "Example protein",
        "sequence": "MKTAYIAK",
        "pfam": "PF00001;PF00002;",
        "smart": null,
        "amino_acid_composition": {"A": 2.0, "K": 2.0, "M": 1.0, "T": 1.0, "Y": 1.0, "I": 1.0},
        "avg_hydrophobicity": -0.4,
        "secondary_structure": {"helix": 0.5, "sheet": 0.25, "coil": 0.25}
    })
}

async fn create(app: &TestApp, entry: &str, length: i64) {
    let resp = app
        .router
        .clone()
        .oneshot(send_json("POST", "/proteins/", &protein(entry, length)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// =============================================================================
// Service endpoints
// =============================================================================

#[tokio::test]
async fn test_root_greeting() {
    let app = make_app();
    let resp = app.router.oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"message": "Hello World"}));
}

#[tokio::test]
async fn test_health_reports_count() {
    let app = make_app();
    create(&app, "P12345", 430).await;

    let resp = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_value(body_json(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.protein_count, 1);
    assert!(health.llm_configured);
}

#[tokio::test]
async fn test_unknown_path_is_404_json() {
    let app = make_app();
    let resp = app.router.oneshot(get("/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "not_found");
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_options_any_path_returns_cors_headers() {
    let app = make_app();
    for uri in ["/proteins/P12345", "/query/", "/anything/at/all"] {
        let req = Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "uri: {}", uri);
        let headers = resp.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(
            headers["access-control-allow-methods"],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
        assert_eq!(
            headers["access-control-allow-headers"],
            "Content-Type, Authorization"
        );
    }
}

#[tokio::test]
async fn test_cross_origin_get_allowed() {
    let app = make_app();
    let req = Request::get("/")
        .header("origin", "http://dashboard.example")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}

// =============================================================================
// Protein CRUD
// =============================================================================

#[tokio::test]
async fn test_create_and_read_protein() {
    let app = make_app();
    let resp = app
        .router
        .clone()
        .oneshot(send_json("POST", "/proteins/", &protein("P12345", 430)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created = body_json(resp).await;
    assert_eq!(created["entry"], "P12345");
    assert_eq!(created["length"], 430);

    let resp = app
        .router
        .oneshot(get("/proteins/P12345"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let read = body_json(resp).await;
    assert_eq!(read["first_seen"], "2020-01-01");
    assert_eq!(read["amino_acid_composition"]["A"], 2.0);
    assert_eq!(read["secondary_structure"]["helix"], 0.5);
}

#[tokio::test]
async fn test_create_duplicate_is_400() {
    let app = make_app();
    create(&app, "P12345", 430).await;

    let resp = app
        .router
        .oneshot(send_json("POST", "/proteins", &protein("P12345", 1)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["detail"], "Error creating protein");
}

#[tokio::test]
async fn test_create_malformed_body_is_422() {
    let app = make_app();
    let resp = app
        .router
        .oneshot(send_json("POST", "/proteins/", &json!({"entry": "P1"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_read_missing_protein_is_404() {
    let app = make_app();
    let resp = app.router.oneshot(get("/proteins/NOPE")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["detail"], "Protein not found");
}

#[tokio::test]
async fn test_list_pagination_and_clamp() {
    let mut config = ProteaConfig::default();
    config.storage.default_page_limit = 2;
    config.storage.max_page_limit = 3;
    let app = make_app_with(config);
    for i in 0..5 {
        create(&app, &format!("P0000{}", i), 100 + i).await;
    }

    let resp = app.router.clone().oneshot(get("/proteins/")).await.unwrap();
    let page = body_json(resp).await;
    assert_eq!(page.as_array().unwrap().len(), 2);
    assert_eq!(page[0]["entry"], "P00000");

    let resp = app
        .router
        .clone()
        .oneshot(get("/proteins/?skip=1&limit=50"))
        .await
        .unwrap();
    let page = body_json(resp).await;
    let entries: Vec<&str> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["entry"].as_str().unwrap())
        .collect();
    assert_eq!(entries, vec!["P00001", "P00002", "P00003"]);
    assert!(page[0].get("organism_id").is_none());
}

#[tokio::test]
async fn test_update_keeps_identity_columns() {
    let app = make_app();
    create(&app, "P12345", 430).await;

    let mut changed = protein("OTHER", 999);
    changed["organism_id"] = json!(10090);
    changed["protein_names"] = json!("Renamed");
    changed["sequence"] = json!("MMM");

    let resp = app
        .router
        .clone()
        .oneshot(send_json("PUT", "/proteins/P12345", &changed))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = body_json(resp).await;
    assert_eq!(updated["entry"], "P12345");
    assert_eq!(updated["length"], 999);
    assert_eq!(updated["sequence"], "MMM");
    assert_eq!(updated["organism_id"], 9606);
    assert_eq!(updated["protein_names"], "Example protein");
}

#[tokio::test]
async fn test_update_missing_is_404() {
    let app = make_app();
    let resp = app
        .router
        .oneshot(send_json("PUT", "/proteins/NOPE", &protein("NOPE", 1)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_then_missing() {
    let app = make_app();
    create(&app, "P12345", 430).await;

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/proteins/P12345")
            .body(Body::empty())
            .unwrap()
    };

    let resp = app.router.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({"message": "Protein deleted successfully"})
    );

    let resp = app.router.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.state.proteins.count().unwrap(), 0);
}

#[tokio::test]
async fn test_protein_profile() {
    let app = make_app();
    create(&app, "P12345", 430).await;

    let resp = app
        .router
        .clone()
        .oneshot(get("/get_protein_data/P12345"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let profile = body_json(resp).await;
    assert_eq!(profile["pfam_domains"], json!(["PF00001", "PF00002"]));
    assert_eq!(profile["smart_domains"], json!([]));
    assert_eq!(profile["observed_days"], 30);
    assert_eq!(profile["composition"][0]["residue"], "A");
    assert_eq!(profile["composition"][0]["percent"], 25.0);

    let resp = app
        .router
        .oneshot(get("/get_protein_data/NOPE"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Chat endpoints
// =============================================================================

#[tokio::test]
async fn test_query_routes_data_question_to_query_agent() {
    let app = make_app();
    let body = json!({
        "context": [{"role": "user", "content": "What is the length of protein P12345?"}],
        "query": "What is the length of protein P12345?"
    });
    let resp = app
        .router
        .clone()
        .oneshot(send_json("POST", "/query/", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let answer = body_json(resp).await;
    assert!(answer["response"].as_str().unwrap().contains("| 430 |"));
    assert_eq!(
        *app.query_agent.seen.lock().unwrap(),
        vec!["What is the length of protein P12345?".to_string()]
    );
    assert!(app.responder.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_query_routes_small_talk_to_responder() {
    let app = make_app();
    let body = json!({"context": [{"role": "user", "content": "Hi there"}], "query": "Hi there"});
    let resp = app
        .router
        .clone()
        .oneshot(send_json("POST", "/query", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["response"], "You said: Hi there");

    let seen = app.responder.seen.lock().unwrap();
    assert_eq!(seen[0].len(), 2);
    assert!(app.query_agent.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_query_empty_context_is_400() {
    let app = make_app();
    let resp = app
        .router
        .oneshot(send_json("POST", "/query/", &json!({"context": [], "query": ""})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_query_without_credentials_returns_fallback() {
    let db = Arc::new(Database::in_memory().unwrap());
    let proteins = Arc::new(ProteinRepository::new(db));
    let agent = Arc::new(UnconfiguredAgent::new("OPENAI_API_KEY is not set"));
    let dispatcher = QueryDispatcher::new(agent.clone(), agent.clone(), agent)
        .with_policy(CallPolicy {
            retries: 0,
            ..CallPolicy::default()
        });
    let state = AppState::new(ProteaConfig::default(), proteins, dispatcher, false);
    let router = create_router(state);

    let body = json!({"context": [{"role": "user", "content": "Hi there"}]});
    let resp = router
        .oneshot(send_json("POST", "/query/", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({"response": "Error in forming output"})
    );
}

#[tokio::test]
async fn test_query_followup_is_empty() {
    let app = make_app();
    let body = json!({"context": [{"role": "user", "content": "Hi there"}], "query": "Hi there"});
    let resp = app
        .router
        .oneshot(send_json("POST", "/query_followup/", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"follow_up_questions": []}));
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let mut config = ProteaConfig::default();
    config.server.rate_limit_per_sec = 1;
    let app = make_app_with(config);

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let resp = app.router.clone().oneshot(get("/proteins/")).await.unwrap();
        statuses.push(resp.status());
    }
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));

    // Public routes are exempt.
    let resp = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
