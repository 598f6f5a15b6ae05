// context.rs — Resolve who is asking for what from an inbound request.
//
// Two strategies, tried in order by ResolverChain:
//
//   HeaderResolver — explicit declaration. Claims the request only when both
//                    x-nha-agent and x-nha-action are present.
//   RouteResolver  — fallback. Derives the action and scope from the method
//                    and path. Always resolves.
//
// A partial declaration (agent without action, or the reverse) is not an
// error: the header strategy declines and the route strategy takes over.
// The agent identity is still read from x-nha-agent in that case; it is
// never derived from the route.

use axum::http::{HeaderMap, Method, Uri};
use nha_policy::EnforcementRequest;
use serde_json::json;

pub const HEADER_AGENT: &str = "x-nha-agent";
pub const HEADER_ACTION: &str = "x-nha-action";
pub const HEADER_SCOPE: &str = "x-nha-scope";
pub const HEADER_REQUIRE_SECRET: &str = "x-nha-require-secret";

/// Agent id used when a request carries no identity at all.
pub const ANONYMOUS_AGENT: &str = "nha:anonymous";

/// Action recorded when no resolver claims a request.
pub const UNRESOLVED_ACTION: &str = "unresolved";

/// Enforcement context extracted from one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub agent_id: String,
    pub action: String,
    pub scope: Option<String>,
    pub require_secret: Option<String>,
    pub method: String,
    pub path: String,
    /// Which strategy produced this context (`header` or `route`).
    pub resolver: &'static str,
}

impl RequestContext {
    /// Convert into an enforcement request, carrying method/path/resolver as extras.
    pub fn into_request(self) -> EnforcementRequest {
        EnforcementRequest {
            agent_id: self.agent_id,
            action: self.action,
            scope: self.scope,
            require_secret: self.require_secret,
            extra: Some(json!({
                "method": self.method,
                "path": self.path,
                "resolver": self.resolver,
            })),
        }
    }
}

/// A strategy for extracting enforcement context from a request.
pub trait ContextResolver: Send + Sync {
    /// Short name recorded in the audit trail.
    fn name(&self) -> &'static str;

    /// `None` means "not mine"; the next resolver in the chain is tried.
    fn resolve(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Option<RequestContext>;
}

/// Explicit header declaration.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderResolver;

impl ContextResolver for HeaderResolver {
    fn name(&self) -> &'static str {
        "header"
    }

    fn resolve(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Option<RequestContext> {
        let agent_id = header(headers, HEADER_AGENT)?;
        let action = header(headers, HEADER_ACTION)?;
        Some(RequestContext {
            agent_id,
            action,
            scope: header(headers, HEADER_SCOPE),
            require_secret: header(headers, HEADER_REQUIRE_SECRET),
            method: method.to_string(),
            path: uri.path().to_string(),
            resolver: self.name(),
        })
    }
}

/// Deterministic route/method fallback.
///
/// `GET /docs/search` resolves to action `read:docs.search`, scope `read:docs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteResolver;

impl RouteResolver {
    /// Verb for a method: retrieval reads, removal deletes, everything else writes.
    pub fn verb(method: &Method) -> &'static str {
        if *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS {
            "read"
        } else if *method == Method::DELETE {
            "delete"
        } else {
            "write"
        }
    }
}

impl ContextResolver for RouteResolver {
    fn name(&self) -> &'static str {
        "route"
    }

    fn resolve(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Option<RequestContext> {
        let verb = Self::verb(method);
        let segments: Vec<&str> = uri.path().split('/').filter(|s| !s.is_empty()).collect();
        let (target, first) = match segments.first() {
            Some(first) => (segments.join("."), *first),
            None => ("root".to_string(), "root"),
        };

        Some(RequestContext {
            agent_id: header(headers, HEADER_AGENT).unwrap_or_else(|| ANONYMOUS_AGENT.to_string()),
            action: format!("{verb}:{target}"),
            scope: Some(format!("{verb}:{first}")),
            require_secret: header(headers, HEADER_REQUIRE_SECRET),
            method: method.to_string(),
            path: uri.path().to_string(),
            resolver: self.name(),
        })
    }
}

/// Ordered list of resolvers; the first that claims the request wins.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn ContextResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Header declaration first, route fallback second.
    pub fn standard() -> Self {
        Self::new().with(HeaderResolver).with(RouteResolver)
    }

    pub fn with(mut self, resolver: impl ContextResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverChain")
            .field("resolvers", &self.names())
            .finish()
    }
}

impl ContextResolver for ResolverChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn resolve(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Option<RequestContext> {
        self.resolvers
            .iter()
            .find_map(|r| r.resolve(method, uri, headers))
    }
}

/// A trimmed, non-empty UTF-8 header value.
fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
