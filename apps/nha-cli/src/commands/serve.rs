// serve.rs — Run the HTTP decision API.
//
// Routes:
//   POST /v1/enforce   JSON EnforcementRequest → EnforcementResult
//   GET  /v1/health    enforcer health (mode, cache generation, audit stats)
//   POST /v1/reload    reload the trust source; gated, resolved by route
//                      (the caller needs `write:v1.reload` and scope `write:v1`)
//
// Optional background tasks: trust-source file watch (hot reload) and
// periodic health checks with self-heal.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Args;
use nha_gate::{GateState, RouteResolver};
use nha_health::{HealthChecker, HealthConfig};
use nha_policy::{EnforcementRequest, EnforcementResult, Enforcer, EnforcerHealth, GateConfig, PolicyCache};
use notify::{RecursiveMode, Watcher};
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8707")]
    addr: SocketAddr,
    /// Reload the trust source when it changes on disk.
    #[arg(long)]
    watch: bool,
    /// Run health checks (with self-heal) every N seconds.
    #[arg(long, value_name = "SECS")]
    heal_interval: Option<u64>,
}

#[derive(Clone)]
struct AppState {
    enforcer: Arc<Enforcer>,
    registry_path: PathBuf,
}

pub fn execute(args: &ServeArgs, config: &GateConfig) -> anyhow::Result<()> {
    let enforcer = Arc::new(Enforcer::bootstrap(config)?);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if args.watch {
            spawn_watcher(
                Arc::clone(enforcer.cache()),
                config.registry_path.clone(),
            )?;
        }
        if let Some(secs) = args.heal_interval {
            let checker = HealthChecker::for_enforcer(HealthConfig::from_gate(config), &enforcer);
            nha_health::spawn_periodic(Arc::new(checker), Duration::from_secs(secs.max(1)));
        }

        let state = AppState {
            enforcer: Arc::clone(&enforcer),
            registry_path: config.registry_path.clone(),
        };
        let app = router(state);

        let listener = tokio::net::TcpListener::bind(args.addr)
            .await
            .with_context(|| format!("failed to bind {}", args.addr))?;
        tracing::info!(addr = %args.addr, mode = %enforcer.mode(), "NHA gate listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutting down");
            })
            .await
            .context("HTTP server exited unexpectedly")?;
        Ok::<(), anyhow::Error>(())
    })
}

fn router(state: AppState) -> Router {
    let gate = GateState::new(Arc::clone(&state.enforcer)).with_resolver(RouteResolver);
    let admin = nha_gate::guard(
        Router::new().route("/v1/reload", post(reload)),
        gate,
    );

    Router::new()
        .route("/v1/enforce", post(enforce))
        .route("/v1/health", get(health))
        .merge(admin)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn enforce(
    State(state): State<AppState>,
    Json(request): Json<EnforcementRequest>,
) -> Json<EnforcementResult> {
    Json(state.enforcer.enforce(request))
}

async fn health(State(state): State<AppState>) -> Json<EnforcerHealth> {
    Json(state.enforcer.health())
}

async fn reload(State(state): State<AppState>) -> impl IntoResponse {
    let cache = Arc::clone(state.enforcer.cache());
    let path = state.registry_path.clone();
    match tokio::task::spawn_blocking(move || cache.reload(&path)).await {
        Ok(Ok(snapshot)) => (
            StatusCode::OK,
            Json(json!({
                "registry_version": snapshot.registry_version(),
                "generation": snapshot.generation(),
                "agents": snapshot.len(),
            })),
        ),
        Ok(Err(e)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// Watch the trust source's directory and reload the cache on change.
///
/// Editors and `write_atomic` replace the file rather than write in place, so
/// the parent directory is watched and events are filtered by file name.
/// Bursts are coalesced over a short window.
fn spawn_watcher(cache: Arc<PolicyCache>, registry_path: PathBuf) -> anyhow::Result<()> {
    let dir = registry_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file_name = registry_path.file_name().map(|n| n.to_os_string());

    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let touches_registry = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if touches_registry && (event.kind.is_modify() || event.kind.is_create()) {
                    let _ = tx.send(());
                }
            }
            Err(e) => tracing::warn!(error = %e, "trust source watch error"),
        }
    })
    .context("failed to create file watcher")?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", dir.display()))?;
    tracing::info!(path = %registry_path.display(), "watching trust source for changes");

    tokio::spawn(async move {
        // The watcher stops when dropped; keep it alive with the task.
        let _watcher = watcher;
        while rx.recv().await.is_some() {
            tokio::time::sleep(Duration::from_millis(250)).await;
            while rx.try_recv().is_ok() {}

            let cache = Arc::clone(&cache);
            let path = registry_path.clone();
            // Failures are logged by the cache and keep the previous snapshot.
            let _ = tokio::task::spawn_blocking(move || cache.reload(&path)).await;
        }
    });
    Ok(())
}
