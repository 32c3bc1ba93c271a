//! Startup verification of the artifacts the stack needs
//!
//! All four checks run concurrently and every decision is made before any
//! download is issued. The worker executable checksum doubles as the
//! network probe: if it cannot be fetched at all the pass is reported as
//! offline and nothing is marked stale for network reasons.

use std::sync::Arc;

use crate::config::{ArtifactSpec, StackConfig, USER_AGENT};
use crate::core::checksum::{matches_remote, normalize_remote};
use crate::core::{Artifact, ArtifactState, ReadinessState};
use crate::traits::{ArtifactStore, HttpClient, HttpRequest};
use shared::{component_debug, component_info, component_warn, Component};

/// Real entries a populated resources directory holds at minimum
pub const MIN_RESOURCE_ENTRIES: usize = 1;

/// Result of fetching a published checksum
#[derive(Debug, Clone, PartialEq, Eq)]
enum RemoteChecksum {
    Value(String),
    /// The host answered, but not with a checksum
    Invalid,
    /// Transport failure or an empty answer
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Every artifact has a decision; anything not fresh is stale
    Verified(ReadinessState),
    /// The checksum host could not be reached; undecided artifacts stay unknown
    Offline(ReadinessState),
}

impl VerificationOutcome {
    pub fn readiness(&self) -> ReadinessState {
        match self {
            Self::Verified(state) | Self::Offline(state) => *state,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }
}

pub struct ArtifactVerifier<H: HttpClient, F: ArtifactStore> {
    http: Arc<H>,
    store: Arc<F>,
    config: StackConfig,
}

impl<H: HttpClient, F: ArtifactStore> ArtifactVerifier<H, F> {
    pub fn new(http: Arc<H>, store: Arc<F>, config: StackConfig) -> Self {
        Self { http, store, config }
    }

    /// Decide the state of every artifact
    pub async fn verify(&self) -> VerificationOutcome {
        let (runtime_bundle, worker_executable, coordinator_executable, coordinator_resources) = tokio::join!(
            self.check_runtime_bundle(),
            self.check_executable(Artifact::WorkerExecutable),
            self.check_executable(Artifact::CoordinatorExecutable),
            self.check_resources(),
        );

        let mut state = ReadinessState {
            runtime_bundle,
            worker_executable,
            coordinator_executable,
            coordinator_resources,
        };

        let offline = !self.config.is_build_override() && worker_executable == ArtifactState::Unknown;
        if offline {
            component_warn!(Component::Artifacts, "📡 Checksum host unreachable, verification deferred");
            return VerificationOutcome::Offline(state);
        }

        for artifact in Artifact::ALL {
            if state.get(artifact) == ArtifactState::Unknown {
                state.mark_stale(artifact);
            }
        }
        component_info!(
            Component::Artifacts,
            "🔍 Verification complete, {} of {} artifacts need an install",
            state.pending().len(),
            Artifact::ALL.len()
        );
        VerificationOutcome::Verified(state)
    }

    async fn check_executable(&self, artifact: Artifact) -> ArtifactState {
        if self.config.is_build_override() {
            component_debug!(Component::Artifacts, "{} comes from the local build", artifact);
            return ArtifactState::Fresh;
        }
        self.compare(&self.config.artifact(artifact)).await
    }

    async fn check_runtime_bundle(&self) -> ArtifactState {
        let probe = self.config.runtime_probe_path();
        if !self.store.exists(&probe).await {
            component_debug!(Component::Artifacts, "Runtime probe {} missing", probe.display());
            return ArtifactState::Stale;
        }
        self.compare(&self.config.artifact(Artifact::RuntimeBundle)).await
    }

    async fn check_resources(&self) -> ArtifactState {
        let entries = self.store.entry_count(&self.config.resources_dir()).await;
        if entries < MIN_RESOURCE_ENTRIES {
            component_debug!(Component::Artifacts, "Resources directory is empty");
            return ArtifactState::Stale;
        }
        self.compare(&self.config.artifact(Artifact::CoordinatorResources)).await
    }

    async fn compare(&self, spec: &ArtifactSpec) -> ArtifactState {
        let local = self.store.read_bytes(&spec.local_path).await;
        match self.fetch_remote(spec).await {
            RemoteChecksum::Value(remote) if matches_remote(&local, &remote) => {
                component_debug!(Component::Artifacts, "{} is current", spec.artifact);
                ArtifactState::Fresh
            }
            RemoteChecksum::Value(_) | RemoteChecksum::Invalid => {
                component_debug!(Component::Artifacts, "{} is out of date", spec.artifact);
                ArtifactState::Stale
            }
            RemoteChecksum::Unreachable => ArtifactState::Unknown,
        }
    }

    async fn fetch_remote(&self, spec: &ArtifactSpec) -> RemoteChecksum {
        let request = HttpRequest::get(&spec.checksum_url).header("User-Agent", USER_AGENT);
        match self.http.send(request).await {
            Err(e) => {
                component_debug!(Component::Artifacts, "Checksum fetch failed: {}", e);
                RemoteChecksum::Unreachable
            }
            Ok(response) if !response.is_ok() => {
                component_debug!(
                    Component::Artifacts,
                    "Checksum host returned {} for {}",
                    response.status,
                    spec.checksum_url
                );
                RemoteChecksum::Invalid
            }
            Ok(response) => match normalize_remote(&response.body) {
                Some(value) => RemoteChecksum::Value(value),
                None => RemoteChecksum::Unreachable,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checksum::md5_hex;
    use crate::core::Platform;
    use crate::error::StackError;
    use crate::traits::{HttpResponse, MockArtifactStore, MockHttpClient};
    use std::path::PathBuf;

    const PAYLOAD: &[u8] = b"artifact payload";

    fn config() -> StackConfig {
        StackConfig::new("/data").with_platform(Platform::Linux)
    }

    fn populated_store() -> MockArtifactStore {
        let mut store = MockArtifactStore::new();
        store.expect_read_bytes().returning(|_| PAYLOAD.to_vec());
        store.expect_exists().returning(|_| true);
        store.expect_entry_count().returning(|_| 12);
        store
    }

    fn serving(checksum: String) -> MockHttpClient {
        let mut http = MockHttpClient::new();
        http.expect_send()
            .withf(|req| req.url.ends_with(".md5"))
            .returning(move |_| Ok(HttpResponse::new(200, checksum.clone())));
        http
    }

    fn verifier(http: MockHttpClient, store: MockArtifactStore, config: StackConfig) -> ArtifactVerifier<MockHttpClient, MockArtifactStore> {
        ArtifactVerifier::new(Arc::new(http), Arc::new(store), config)
    }

    #[tokio::test]
    async fn test_matching_checksums_are_fresh() {
        let verifier = verifier(serving(md5_hex(PAYLOAD)), populated_store(), config());

        let outcome = verifier.verify().await;

        assert!(!outcome.is_offline());
        assert!(outcome.readiness().all_ready());
    }

    #[tokio::test]
    async fn test_remote_checksum_formatting_is_tolerated() {
        let wrapped = format!("{}  assignment-client\r\n", md5_hex(PAYLOAD).to_uppercase());
        let verifier = verifier(serving(wrapped), populated_store(), config());

        assert!(verifier.verify().await.readiness().all_ready());
    }

    #[tokio::test]
    async fn test_mismatch_is_stale() {
        let verifier = verifier(serving(md5_hex(b"something else")), populated_store(), config());

        let outcome = verifier.verify().await;

        assert_eq!(outcome, VerificationOutcome::Verified(stale_everywhere()));
    }

    fn stale_everywhere() -> ReadinessState {
        let mut state = ReadinessState::new();
        for artifact in Artifact::ALL {
            state.mark_stale(artifact);
        }
        state
    }

    #[tokio::test]
    async fn test_missing_local_file_is_stale() {
        let mut store = MockArtifactStore::new();
        store.expect_read_bytes().returning(|_| Vec::new());
        store.expect_exists().returning(|_| true);
        store.expect_entry_count().returning(|_| 3);
        let verifier = verifier(serving(md5_hex(b"")), store, config());

        assert_eq!(verifier.verify().await.readiness().pending(), Artifact::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_unreachable_worker_checksum_is_offline() {
        let good = md5_hex(PAYLOAD);
        let mut http = MockHttpClient::new();
        http.expect_send()
            .withf(|req| req.url.contains("assignment-client"))
            .returning(|req| Err(StackError::network(req.url, "dns failure")));
        http.expect_send()
            .returning(move |_| Ok(HttpResponse::new(200, good.clone())));
        let verifier = verifier(http, populated_store(), config());

        let outcome = verifier.verify().await;

        assert!(outcome.is_offline());
        let state = outcome.readiness();
        assert_eq!(state.worker_executable, ArtifactState::Unknown);
        assert_eq!(state.coordinator_executable, ArtifactState::Fresh);
        assert!(!state.all_ready());
        assert!(Artifact::ALL.iter().all(|a| state.get(*a) != ArtifactState::Stale));
    }

    #[tokio::test]
    async fn test_empty_worker_checksum_counts_as_offline() {
        let verifier = verifier(serving(String::new()), populated_store(), config());

        let outcome = verifier.verify().await;

        assert!(outcome.is_offline());
        assert_eq!(outcome.readiness(), ReadinessState::new());
    }

    #[tokio::test]
    async fn test_http_error_status_is_stale_not_offline() {
        let mut http = MockHttpClient::new();
        http.expect_send().returning(|_| Ok(HttpResponse::new(404, "Not Found")));
        let verifier = verifier(http, populated_store(), config());

        assert_eq!(verifier.verify().await, VerificationOutcome::Verified(stale_everywhere()));
    }

    #[tokio::test]
    async fn test_build_override_skips_executable_checks() {
        let good = md5_hex(PAYLOAD);
        let mut http = MockHttpClient::new();
        http.expect_send()
            .withf(|req| req.url.ends_with(".zip.md5"))
            .times(2)
            .returning(move |_| Ok(HttpResponse::new(200, good.clone())));
        let config = config().with_build_directory(Some(PathBuf::from("/src/build")));
        let verifier = verifier(http, populated_store(), config);

        assert!(verifier.verify().await.readiness().all_ready());
    }

    #[tokio::test]
    async fn test_presence_heuristics_skip_fetches() {
        let good = md5_hex(PAYLOAD);
        let mut http = MockHttpClient::new();
        http.expect_send()
            .withf(|req| !req.url.contains(".zip"))
            .times(2)
            .returning(move |_| Ok(HttpResponse::new(200, good.clone())));
        let mut store = MockArtifactStore::new();
        store.expect_read_bytes().returning(|_| PAYLOAD.to_vec());
        store.expect_exists().returning(|_| false);
        store.expect_entry_count().returning(|_| 0);
        let verifier = verifier(http, store, config());

        let outcome = verifier.verify().await;

        assert_eq!(
            outcome.readiness().pending(),
            vec![Artifact::RuntimeBundle, Artifact::CoordinatorResources]
        );
    }
}
