// interceptor.rs — axum middleware that gates every request through the enforcer.
//
// Flow per request:
//   1. Resolve agent/action/scope/secret via the configured ContextResolver.
//   2. Call Enforcer::enforce (which writes the audit record).
//   3. DENY          → 403 with a structured JSON body; the handler never runs.
//      ALLOW / WARN  → forward to the handler; the EnforcementResult is
//                      available to it as an `Extension`.
//   4. Annotate the response with trace id, decision and policy version.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use nha_policy::{EnforcementRequest, EnforcementResult, Enforcer};
use serde::Serialize;

use crate::context::{ContextResolver, ResolverChain, ANONYMOUS_AGENT, UNRESOLVED_ACTION};

pub const HEADER_TRACE_ID: &str = "x-nha-trace-id";
pub const HEADER_DECISION: &str = "x-nha-decision";
pub const HEADER_POLICY_VERSION: &str = "x-nha-policy-version";

/// Shared state for the interceptor layer.
#[derive(Clone)]
pub struct GateState {
    pub enforcer: Arc<Enforcer>,
    pub resolver: Arc<dyn ContextResolver>,
}

impl GateState {
    /// Gate with the standard header-then-route resolution.
    pub fn new(enforcer: Arc<Enforcer>) -> Self {
        Self {
            enforcer,
            resolver: Arc::new(ResolverChain::standard()),
        }
    }

    pub fn with_resolver(mut self, resolver: impl ContextResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }
}

impl std::fmt::Debug for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateState")
            .field("mode", &self.enforcer.mode())
            .field("resolver", &self.resolver.name())
            .finish()
    }
}

/// Body of a 403 response. Enough for the caller to self-diagnose; no
/// registry contents.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub reason: String,
    pub trace_id: String,
    pub agent_id: String,
    pub action: String,
    pub policy_version: String,
}

impl From<&EnforcementResult> for Rejection {
    fn from(result: &EnforcementResult) -> Self {
        Self {
            reason: result.reason().to_string(),
            trace_id: result.trace_id().to_string(),
            agent_id: result.agent_id().to_string(),
            action: result.action().to_string(),
            policy_version: result.policy_version().to_string(),
        }
    }
}

/// The middleware function. Install with `guard()` or
/// `axum::middleware::from_fn_with_state(state, enforce_request)`.
pub async fn enforce_request(
    State(state): State<GateState>,
    mut request: Request,
    next: Next,
) -> Response {
    let enforcement = state
        .resolver
        .resolve(request.method(), request.uri(), request.headers())
        .map(|ctx| ctx.into_request())
        .unwrap_or_else(|| {
            tracing::debug!(path = %request.uri().path(), "no resolver claimed request");
            EnforcementRequest::new(ANONYMOUS_AGENT, UNRESOLVED_ACTION).with_extra(
                serde_json::json!({
                    "method": request.method().as_str(),
                    "path": request.uri().path(),
                    "resolver": "none",
                }),
            )
        });

    let result = state.enforcer.enforce(enforcement);

    let mut response = if result.allowed() {
        request.extensions_mut().insert(result.clone());
        next.run(request).await
    } else {
        (StatusCode::FORBIDDEN, Json(Rejection::from(&result))).into_response()
    };
    annotate(response.headers_mut(), &result);
    response
}

/// Wrap every route of `router` with the enforcement layer.
pub fn guard<S>(router: Router<S>, state: GateState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(state, enforce_request))
}

fn annotate(headers: &mut HeaderMap, result: &EnforcementResult) {
    let pairs = [
        (HEADER_TRACE_ID, result.trace_id().to_string()),
        (HEADER_DECISION, result.decision().as_str().to_string()),
        (HEADER_POLICY_VERSION, result.policy_version().to_string()),
    ];
    for (name, value) in pairs {
        match HeaderValue::from_str(&value) {
            Ok(v) => {
                headers.insert(HeaderName::from_static(name), v);
            }
            Err(_) => tracing::warn!(header = name, "annotation value is not a valid header"),
        }
    }
}
