// cache.rs — Swappable in-memory policy snapshot.
//
// The cache holds one immutable PolicySnapshot behind an RwLock<Arc<_>>.
// Readers take the read lock only long enough to clone the Arc, then work
// on their own reference, so a decision never sees a half-built map even if
// a reload lands mid-request.
//
// Reload builds a complete new snapshot first and then swaps the Arc under
// the write lock. There are no partial updates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use nha_registry::{registry_digest, AgentRecord, Registry, RegistryError};

/// Registry version reported before anything has been loaded.
pub const EMPTY_REGISTRY_VERSION: &str = "none";

/// An immutable view of the registry at one point in time.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    agents: HashMap<String, AgentRecord>,
    registry_version: String,
    digest: String,
    generation: u64,
    loaded_at: DateTime<Utc>,
    source: Option<PathBuf>,
}

impl PolicySnapshot {
    fn empty() -> Self {
        Self {
            agents: HashMap::new(),
            registry_version: EMPTY_REGISTRY_VERSION.to_string(),
            digest: String::new(),
            generation: 0,
            loaded_at: Utc::now(),
            source: None,
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentRecord> {
        self.agents.get(agent_id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn registry_version(&self) -> &str {
        &self.registry_version
    }

    /// SHA-256 of the registry content this snapshot was built from.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Monotonic counter, bumped on every hydrate. 0 means never loaded.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentRecord> {
        self.agents.values()
    }

    /// True when both snapshots hold the same registry content, regardless
    /// of when or how many times they were loaded.
    pub fn same_content(&self, other: &PolicySnapshot) -> bool {
        self.registry_version == other.registry_version
            && self.digest == other.digest
            && self.agents == other.agents
    }
}

/// Concurrency-safe holder of the current PolicySnapshot.
#[derive(Debug)]
pub struct PolicyCache {
    current: RwLock<Arc<PolicySnapshot>>,
}

impl PolicyCache {
    /// An empty cache: every agent is unknown until the first hydrate.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(PolicySnapshot::empty())),
        }
    }

    /// Replace the whole snapshot with one built from `registry`.
    ///
    /// The registry is validated first; an invalid one is refused and the
    /// current snapshot stays in place.
    pub fn hydrate(&self, registry: Registry) -> Result<Arc<PolicySnapshot>, RegistryError> {
        let issues = nha_registry::validate(&registry);
        if !issues.is_empty() {
            tracing::warn!(
                issues = issues.len(),
                registry_version = %registry.version,
                "refusing to hydrate from an invalid registry"
            );
            return Err(RegistryError::Invalid {
                origin: format!("registry {}", registry.version),
                issues,
            });
        }
        Ok(self.install(registry, None))
    }

    /// Load the trust source at `path` and hydrate from it.
    ///
    /// On failure the previous snapshot stays in place and the error is
    /// returned; whether that is fatal is the caller's decision.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<Arc<PolicySnapshot>, RegistryError> {
        let path = path.as_ref();
        match nha_registry::load(path) {
            Ok(registry) => Ok(self.install(registry, Some(path.to_path_buf()))),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    registry_version = %self.registry_version(),
                    "registry reload failed; keeping previous snapshot"
                );
                Err(e)
            }
        }
    }

    /// The current snapshot. Cheap: one Arc clone under a read lock.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get(&self, agent_id: &str) -> Option<AgentRecord> {
        self.snapshot().get(agent_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn registry_version(&self) -> String {
        self.snapshot().registry_version.clone()
    }

    fn install(&self, registry: Registry, source: Option<PathBuf>) -> Arc<PolicySnapshot> {
        let digest = registry_digest(&registry);
        let version = registry.version;
        let agents: HashMap<String, AgentRecord> = registry
            .nhas
            .into_iter()
            .map(|nha| (nha.id.clone(), nha))
            .collect();

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let snapshot = Arc::new(PolicySnapshot {
            agents,
            registry_version: version,
            digest,
            generation: guard.generation + 1,
            loaded_at: Utc::now(),
            source,
        });
        *guard = Arc::clone(&snapshot);
        drop(guard);

        tracing::info!(
            registry_version = %snapshot.registry_version,
            agents = snapshot.len(),
            generation = snapshot.generation,
            "policy cache hydrated"
        );
        snapshot
    }
}

impl Default for PolicyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DOC: &str = r#"
version: "3"
nhas:
  - id: nha:rag-worker
    name: RAG Worker
    category: ml-ops
    owner: platform
    status: active
    channels: [{kind: http, endpoint: "https://rag", auth: oidc}]
    capabilities: [{name: vectors, scopes: [write:vectors]}]
    permissions: [run.invoker]
    tags: [env:prod, service:rag]
"#;

    fn write(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("registry.yaml");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn starts_empty() {
        let cache = PolicyCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.registry_version(), EMPTY_REGISTRY_VERSION);
        assert_eq!(cache.snapshot().generation(), 0);
        assert!(cache.get("nha:rag-worker").is_none());
    }

    #[test]
    fn reload_hydrates_and_bumps_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), DOC);
        let cache = PolicyCache::new();

        let first = cache.reload(&path).unwrap();
        assert_eq!(first.generation(), 1);
        assert_eq!(first.registry_version(), "3");
        assert_eq!(first.source(), Some(path.as_path()));
        assert!(cache.get("nha:rag-worker").is_some());

        let second = cache.reload(&path).unwrap();
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn reloading_unchanged_source_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), DOC);
        let cache = PolicyCache::new();

        let first = cache.reload(&path).unwrap();
        let second = cache.reload(&path).unwrap();
        assert!(first.same_content(&second));
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), DOC);
        let cache = PolicyCache::new();
        let good = cache.reload(&path).unwrap();

        fs::write(&path, "version: \"4\"\nnhas: [ {id: broken").unwrap();
        assert!(cache.reload(&path).is_err());

        let current = cache.snapshot();
        assert!(Arc::ptr_eq(&good, &current));
        assert_eq!(cache.registry_version(), "3");
    }

    #[test]
    fn readers_keep_their_snapshot_across_a_swap() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), DOC);
        let cache = PolicyCache::new();
        cache.reload(&path).unwrap();

        let held = cache.snapshot();
        cache
            .hydrate(Registry {
                version: "5".to_string(),
                nhas: vec![],
            })
            .unwrap();

        // The old reference is untouched; new readers see the new snapshot.
        assert_eq!(held.len(), 1);
        assert_eq!(held.registry_version(), "3");
        assert!(cache.is_empty());
        assert_eq!(cache.registry_version(), "5");
    }

    #[test]
    fn hydrate_refuses_invalid_registry() {
        let cache = PolicyCache::new();
        let mut registry = nha_registry::parse_str(DOC, "t").unwrap();
        let good = cache.hydrate(registry.clone()).unwrap();

        registry.nhas.push(registry.nhas[0].clone());
        let err = cache.hydrate(registry).unwrap_err();
        assert!(matches!(err, RegistryError::Invalid { .. }));
        assert!(err.issues()[0].message.contains("duplicate id"));

        // Only the valid registry was installed.
        assert!(Arc::ptr_eq(&good, &cache.snapshot()));
        assert_eq!(cache.snapshot().generation(), 1);
    }

    #[test]
    fn concurrent_readers_during_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), DOC);
        let cache = Arc::new(PolicyCache::new());
        cache.reload(&path).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let snap = cache.snapshot();
                        // Every observed snapshot is complete.
                        assert_eq!(snap.len(), 1);
                        assert!(snap.get("nha:rag-worker").is_some());
                    }
                })
            })
            .collect();
        for _ in 0..20 {
            cache.reload(&path).unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(cache.snapshot().generation(), 21);
    }
}
