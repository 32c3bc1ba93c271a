//! Resolves the running coordinator's public address
//!
//! Two chained requests: the coordinator's `/id` endpoint, then the
//! directory service lookup for that id. Only one chain runs at a time.

use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::config::{RetryPolicy, StackConfig, USER_AGENT};
use crate::core::identity::{extract_domain_name, parse_coordinator_id};
use crate::core::{CoordinatorIdentity, IdentityPhase};
use crate::error::{StackError, StackResult};
use crate::events::StackEvent;
use crate::traits::{HttpClient, HttpRequest};
use shared::{component_debug, component_info, component_warn, Component};

pub struct IdentityResolver<H: HttpClient> {
    http: Arc<H>,
    id_url: String,
    config: StackConfig,
    identity: Mutex<CoordinatorIdentity>,
    events: broadcast::Sender<StackEvent>,
}

impl<H: HttpClient> IdentityResolver<H> {
    pub fn new(http: Arc<H>, config: &StackConfig, events: broadcast::Sender<StackEvent>) -> Self {
        Self {
            http,
            id_url: config.coordinator_id_url(),
            config: config.clone(),
            identity: Mutex::new(CoordinatorIdentity::default()),
            events,
        }
    }

    pub async fn identity(&self) -> CoordinatorIdentity {
        self.identity.lock().await.clone()
    }

    pub async fn address(&self) -> String {
        self.identity.lock().await.address()
    }

    /// No id has been obtained and no chain is running
    pub async fn needs_resolution(&self) -> bool {
        self.identity.lock().await.phase == IdentityPhase::NoId
    }

    /// Run one resolution chain
    ///
    /// Returns the phase the chain ended in. A call made while another chain
    /// is in flight issues no requests and returns the in-flight phase.
    pub async fn resolve_now(&self) -> StackResult<IdentityPhase> {
        {
            let mut identity = self.identity.lock().await;
            if identity.phase.in_flight() {
                component_debug!(Component::Identity, "Resolution already in flight ({:?})", identity.phase);
                return Ok(identity.phase);
            }
            identity.phase = IdentityPhase::IdRequested;
        }

        let body = match self.fetch_id().await {
            Ok(body) => body,
            Err(e) => {
                self.set_phase(IdentityPhase::NoId).await;
                return Err(e);
            }
        };

        let Some(id) = parse_coordinator_id(&body) else {
            let body = String::from_utf8_lossy(&body).trim().to_string();
            component_warn!(Component::Identity, "⚠️ Coordinator returned no usable id: {:?}", body);
            self.set_phase(IdentityPhase::IdKnown(None)).await;
            self.emit(StackEvent::IdentityMissing);
            return Err(StackError::MissingIdentity { body });
        };

        component_info!(Component::Identity, "🆔 Coordinator id is {}", id);
        self.set_phase(IdentityPhase::NameRequested(id)).await;

        let phase = match self.lookup_name(&id).await {
            Some(name) => {
                self.apply_name(id, name).await;
                IdentityPhase::NameKnown(id)
            }
            None => {
                self.set_phase(IdentityPhase::IdKnown(Some(id))).await;
                IdentityPhase::IdKnown(Some(id))
            }
        };
        Ok(phase)
    }

    /// Resolve, retrying while the coordinator is not answering yet
    ///
    /// Waits `policy.delay_for(attempt)` before each attempt. Only an
    /// unreachable coordinator is retried; exhaustion emits
    /// `CoordinatorUnreachable` and leaves the phase at `NoId`.
    pub async fn resolve_with_retry(&self, policy: RetryPolicy) -> StackResult<IdentityPhase> {
        let mut last_error = None;

        for attempt in 0..policy.max_attempts {
            tokio::time::sleep(policy.delay_for(attempt)).await;
            match self.resolve_now().await {
                Err(e @ StackError::CoordinatorUnreachable { .. }) => {
                    component_debug!(
                        Component::Identity,
                        "Attempt {}/{} failed: {}",
                        attempt + 1,
                        policy.max_attempts,
                        e
                    );
                    last_error = Some(e);
                }
                other => return other,
            }
        }

        component_warn!(
            Component::Identity,
            "⚠️ Coordinator did not answer after {} attempts",
            policy.max_attempts
        );
        self.emit(StackEvent::CoordinatorUnreachable);
        Err(last_error.unwrap_or_else(|| StackError::unreachable("no attempts allowed")))
    }

    async fn fetch_id(&self) -> StackResult<Vec<u8>> {
        let request = HttpRequest::get(&self.id_url).header("User-Agent", USER_AGENT);
        let response = self.http.send(request).await.map_err(StackError::unreachable)?;
        if !response.is_ok() {
            return Err(StackError::unreachable(format!(
                "{} answered with status {}",
                self.id_url, response.status
            )));
        }
        Ok(response.body)
    }

    /// Best effort: any failure keeps the current name
    async fn lookup_name(&self, id: &Uuid) -> Option<String> {
        let url = self.config.directory_lookup_url(id);
        let request = HttpRequest::get(&url).header("User-Agent", USER_AGENT);

        match self.http.send(request).await {
            Ok(response) if response.is_ok() => {
                let name = extract_domain_name(&response.body);
                if name.is_none() {
                    component_debug!(Component::Identity, "Directory entry for {} carries no name", id);
                }
                name
            }
            Ok(response) => {
                component_debug!(Component::Identity, "Directory lookup returned {}", response.status);
                None
            }
            Err(e) => {
                component_debug!(Component::Identity, "Directory lookup failed: {}", e);
                None
            }
        }
    }

    async fn apply_name(&self, id: Uuid, name: String) {
        let changed = {
            let mut identity = self.identity.lock().await;
            identity.phase = IdentityPhase::NameKnown(id);
            if identity.name == name {
                None
            } else {
                identity.name = name;
                Some(identity.address())
            }
        };

        if let Some(address) = changed {
            component_info!(Component::Identity, "🌐 Coordinator address is now {}", address);
            self.emit(StackEvent::AddressChanged { address });
        }
    }

    async fn set_phase(&self, phase: IdentityPhase) {
        self.identity.lock().await.phase = phase;
    }

    fn emit(&self, event: StackEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{HttpResponse, MockHttpClient};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const ID: &str = "8a6f3b4e-2f4c-4f0e-9d43-6c1f7a1e2b3c";

    fn resolver(http: MockHttpClient) -> (IdentityResolver<MockHttpClient>, broadcast::Receiver<StackEvent>) {
        let (events, rx) = broadcast::channel(16);
        let config = StackConfig::new("data");
        (IdentityResolver::new(Arc::new(http), &config, events), rx)
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_malformed_id_halts_without_lookup() {
        let mut http = MockHttpClient::new();
        http.expect_send()
            .withf(|req| req.url.ends_with("/id"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "abc-123")));
        let (resolver, mut rx) = resolver(http);

        let result = resolver.resolve_now().await;

        assert!(matches!(result, Err(StackError::MissingIdentity { ref body }) if body == "abc-123"));
        assert_eq!(resolver.identity().await.phase, IdentityPhase::IdKnown(None));
        assert_eq!(rx.try_recv().unwrap(), StackEvent::IdentityMissing);
        assert!(!resolver.needs_resolution().await);
    }

    #[tokio::test]
    async fn test_resolves_directory_name() {
        let mut http = MockHttpClient::new();
        http.expect_send()
            .withf(|req| req.url.ends_with("/id"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, format!("{ID}\n"))));
        http.expect_send()
            .withf(|req| req.url.ends_with(&format!("/domains/{ID}")))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"domain":{"name":"bobtown"}}"#)));
        let (resolver, mut rx) = resolver(http);

        let phase = resolver.resolve_now().await.unwrap();

        let id = Uuid::parse_str(ID).unwrap();
        assert_eq!(phase, IdentityPhase::NameKnown(id));
        assert_eq!(resolver.address().await, "hifi://bobtown");
        assert_eq!(
            rx.try_recv().unwrap(),
            StackEvent::AddressChanged {
                address: "hifi://bobtown".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_placeholder() {
        let mut http = MockHttpClient::new();
        http.expect_send()
            .withf(|req| req.url.ends_with("/id"))
            .returning(|_| Ok(HttpResponse::new(200, ID)));
        http.expect_send()
            .withf(|req| req.url.contains("/domains/"))
            .returning(|_| Ok(HttpResponse::new(404, "")));
        let (resolver, mut rx) = resolver(http);

        let phase = resolver.resolve_now().await.unwrap();

        assert_eq!(phase, IdentityPhase::IdKnown(Some(Uuid::parse_str(ID).unwrap())));
        assert_eq!(resolver.address().await, "hifi://localhost");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_coordinator_resets_phase() {
        let mut http = MockHttpClient::new();
        http.expect_send()
            .returning(|req| Err(StackError::network(req.url, "connection refused")));
        let (resolver, _rx) = resolver(http);

        let result = resolver.resolve_now().await;

        assert!(matches!(result, Err(StackError::CoordinatorUnreachable { .. })));
        assert!(resolver.needs_resolution().await);
    }

    #[tokio::test]
    async fn test_retry_until_coordinator_answers() {
        let mut http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_send()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|req| Err(StackError::network(req.url, "connection refused")));
        http.expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, ID)));
        http.expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"domain":{"owner_places":[{"name":"plaza"}]}}"#)));
        let (resolver, _rx) = resolver(http);

        let phase = resolver.resolve_with_retry(fast_retry(6)).await.unwrap();

        assert!(matches!(phase, IdentityPhase::NameKnown(_)));
        assert_eq!(resolver.address().await, "hifi://plaza");
    }

    #[tokio::test]
    async fn test_retry_exhaustion_emits_unreachable() {
        let mut http = MockHttpClient::new();
        http.expect_send()
            .times(3)
            .returning(|_| Ok(HttpResponse::new(503, "")));
        let (resolver, mut rx) = resolver(http);

        let result = resolver.resolve_with_retry(fast_retry(3)).await;

        assert!(matches!(result, Err(StackError::CoordinatorUnreachable { .. })));
        assert_eq!(rx.try_recv().unwrap(), StackEvent::CoordinatorUnreachable);
        assert!(resolver.needs_resolution().await);
    }

    /// Answers like a healthy coordinator, but only after a pause
    struct SlowCoordinator {
        delay: Duration,
        id_requests: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl HttpClient for SlowCoordinator {
        async fn send(&self, request: HttpRequest) -> StackResult<HttpResponse> {
            tokio::time::sleep(self.delay).await;
            if request.url.ends_with("/id") {
                self.id_requests.fetch_add(1, Ordering::SeqCst);
                return Ok(HttpResponse::new(200, ID));
            }
            Ok(HttpResponse::new(200, r#"{"domain":{"name":"bobtown"}}"#))
        }
    }

    #[tokio::test]
    async fn test_overlapping_resolutions_share_one_chain() {
        let http = Arc::new(SlowCoordinator {
            delay: Duration::from_millis(50),
            id_requests: AtomicUsize::new(0),
        });
        let (events, _rx) = broadcast::channel(16);
        let resolver = IdentityResolver::new(http.clone(), &StackConfig::new("data"), events);

        let (first, second, third) = tokio::join!(resolver.resolve_now(), resolver.resolve_now(), resolver.resolve_now());

        assert_eq!(http.id_requests.load(Ordering::SeqCst), 1);
        let phases = [first.unwrap(), second.unwrap(), third.unwrap()];
        let id = Uuid::parse_str(ID).unwrap();
        assert_eq!(phases.iter().filter(|phase| **phase == IdentityPhase::NameKnown(id)).count(), 1);
        assert_eq!(phases.iter().filter(|phase| **phase == IdentityPhase::IdRequested).count(), 2);
        assert_eq!(resolver.address().await, "hifi://bobtown");
    }

    #[tokio::test]
    async fn test_missing_identity_is_not_retried() {
        let mut http = MockHttpClient::new();
        http.expect_send()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "")));
        let (resolver, _rx) = resolver(http);

        let result = resolver.resolve_with_retry(fast_retry(6)).await;

        assert!(matches!(result, Err(StackError::MissingIdentity { .. })));
    }
}
