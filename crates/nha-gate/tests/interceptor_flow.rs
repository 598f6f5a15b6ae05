// interceptor_flow.rs — Drive a guarded axum router end to end.
//
// Each test builds a real Enforcer over a registry written to a temp dir,
// wraps a tiny router with the gate, and sends requests with
// `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};
use nha_audit::AuditSink;
use nha_gate::{
    guard, GateState, ResolverChain, HEADER_ACTION, HEADER_AGENT, HEADER_DECISION,
    HEADER_POLICY_VERSION, HEADER_REQUIRE_SECRET, HEADER_SCOPE, HEADER_TRACE_ID,
};
use nha_policy::{EnforcementMode, EnforcementResult, Enforcer, PolicyCache};
use tower::ServiceExt;

const REGISTRY: &str = r#"
version: "2026.10.1"
nhas:
  - id: nha:rag-worker
    name: RAG Worker
    category: ml-ops
    owner: platform
    status: active
    channels: [{kind: http, endpoint: "https://rag", auth: oidc}]
    capabilities:
      - name: vectors
        scopes: [write:vectors, read:rag]
    permissions: [run.invoker, read:rag.search]
    secrets: [RAG_DB_URL]
    tags: [env:prod, service:rag]
"#;

struct Harness {
    _dir: tempfile::TempDir,
    enforcer: Arc<Enforcer>,
}

fn harness(mode: EnforcementMode) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(PolicyCache::new());
    cache
        .hydrate(nha_registry::parse_str(REGISTRY, "test").unwrap())
        .unwrap();
    let audit = Arc::new(AuditSink::in_dir(dir.path().join("audit")));
    Harness {
        enforcer: Arc::new(Enforcer::new(cache, audit, mode, "p-7")),
        _dir: dir,
    }
}

fn app(state: GateState) -> Router {
    let routes = Router::new()
        .route(
            "/v1/run",
            post(|Extension(result): Extension<EnforcementResult>| async move {
                result.trace_id().to_string()
            }),
        )
        .route("/rag/search", get(|| async { "results" }))
        .route("/", get(|| async { "root" }));
    guard(routes, state)
}

async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn header<'a>(resp: &'a Response, name: &str) -> &'a str {
    resp.headers().get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn declared_allowed_request_reaches_handler() {
    let h = harness(EnforcementMode::Deny);
    let resp = app(GateState::new(Arc::clone(&h.enforcer)))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/run")
                .header(HEADER_AGENT, "nha:rag-worker")
                .header(HEADER_ACTION, "run.invoker")
                .header(HEADER_SCOPE, "write:vectors")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, HEADER_DECISION), "ALLOW");
    assert_eq!(header(&resp, HEADER_POLICY_VERSION), "p-7");
    let trace_id = header(&resp, HEADER_TRACE_ID).to_string();
    // The handler sees the same decision the response is annotated with.
    assert_eq!(body_text(resp).await, trace_id);
}

#[tokio::test]
async fn denied_request_gets_structured_403() {
    let h = harness(EnforcementMode::Deny);
    let resp = app(GateState::new(Arc::clone(&h.enforcer)))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/run")
                .header(HEADER_AGENT, "nha:rag-worker")
                .header(HEADER_ACTION, "run.invoker")
                .header(HEADER_SCOPE, "write:forbidden")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(header(&resp, HEADER_DECISION), "DENY");
    let trace_id = header(&resp, HEADER_TRACE_ID).to_string();

    let body = body_json(resp).await;
    assert_eq!(body["reason"], "scope_not_allowed");
    assert_eq!(body["trace_id"], trace_id.as_str());
    assert_eq!(body["agent_id"], "nha:rag-worker");
    assert_eq!(body["action"], "run.invoker");
    assert_eq!(body["policy_version"], "p-7");
    // Nothing else leaks.
    assert_eq!(body.as_object().unwrap().len(), 5);
}

#[tokio::test]
async fn route_fallback_uses_method_and_path() {
    let h = harness(EnforcementMode::Deny);
    let resp = app(GateState::new(Arc::clone(&h.enforcer)))
        .oneshot(
            Request::builder()
                .uri("/rag/search")
                .header(HEADER_AGENT, "nha:rag-worker")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "results");

    let records = AuditSink::read_all(h.enforcer.audit().path()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, "read:rag.search");
    assert_eq!(records[0].scope.as_deref(), Some("read:rag"));
    assert_eq!(records[0].extra["resolver"], "route");
    assert_eq!(records[0].extra["method"], "GET");
}

#[tokio::test]
async fn anonymous_request_is_denied() {
    let h = harness(EnforcementMode::Deny);
    let resp = app(GateState::new(Arc::clone(&h.enforcer)))
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await;
    assert_eq!(body["reason"], "unknown_agent");
    assert_eq!(body["agent_id"], "nha:anonymous");
    assert_eq!(body["action"], "read:root");
}

#[tokio::test]
async fn warn_mode_forwards_with_warn_annotation() {
    let h = harness(EnforcementMode::Warn);
    let resp = app(GateState::new(Arc::clone(&h.enforcer)))
        .oneshot(
            Request::builder()
                .uri("/rag/search")
                .header(HEADER_AGENT, "nha:ghost")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, HEADER_DECISION), "WARN");

    let records = AuditSink::read_all(h.enforcer.audit().path()).unwrap();
    assert_eq!(records[0].result, "WARN");
    assert_eq!(records[0].reason, "unknown_agent");
}

#[tokio::test]
async fn secret_is_denied_even_in_warn_mode() {
    let h = harness(EnforcementMode::Warn);
    let resp = app(GateState::new(Arc::clone(&h.enforcer)))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/run")
                .header(HEADER_AGENT, "nha:rag-worker")
                .header(HEADER_ACTION, "run.invoker")
                .header(HEADER_REQUIRE_SECRET, "STRIPE_KEY")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(resp).await["reason"], "secret_not_allowed");
}

#[tokio::test]
async fn unclaimed_request_is_denied_and_audited() {
    let h = harness(EnforcementMode::Deny);
    let state = GateState::new(Arc::clone(&h.enforcer)).with_resolver(ResolverChain::new());
    let resp = app(state)
        .oneshot(Request::builder().uri("/rag/search").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let records = AuditSink::read_all(h.enforcer.audit().path()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, "unresolved");
    assert_eq!(records[0].extra["resolver"], "none");
}

#[tokio::test]
async fn every_request_is_audited_once() {
    let h = harness(EnforcementMode::Deny);
    let router = app(GateState::new(Arc::clone(&h.enforcer)));
    for uri in ["/", "/rag/search", "/"] {
        let _ = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
    }
    let records = AuditSink::read_all(h.enforcer.audit().path()).unwrap();
    assert_eq!(records.len(), 3);
}
