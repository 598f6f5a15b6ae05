//! # nha-gate
//!
//! Request interceptor for axum applications that serve Non-Human Agents.
//!
//! Every inbound request is resolved to an `{agent, action, scope, secret}`
//! context, passed through [`nha_policy::Enforcer`], and either rejected with
//! `403 Forbidden` or forwarded. Every response carries the decision as
//! `x-nha-trace-id`, `x-nha-decision` and `x-nha-policy-version` headers.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{routing::get, Router};
//! use nha_gate::{guard, GateState};
//! use nha_policy::{Enforcer, GateConfig};
//!
//! let config = GateConfig::load(".").unwrap();
//! let enforcer = Arc::new(Enforcer::bootstrap(&config).unwrap());
//! let app: Router = guard(
//!     Router::new().route("/docs", get(|| async { "ok" })),
//!     GateState::new(enforcer),
//! );
//! ```

pub mod context;
pub mod interceptor;

pub use context::{
    ContextResolver, HeaderResolver, RequestContext, ResolverChain, RouteResolver,
    ANONYMOUS_AGENT, HEADER_ACTION, HEADER_AGENT, HEADER_REQUIRE_SECRET, HEADER_SCOPE,
};
pub use interceptor::{
    enforce_request, guard, GateState, Rejection, HEADER_DECISION, HEADER_POLICY_VERSION,
    HEADER_TRACE_ID,
};
