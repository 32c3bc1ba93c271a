//! Test helpers and builder patterns for stack manager tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use stackmanager::traits::{
    HttpMethod, HttpRequest, HttpResponse, MockArtifactStore, MockDownloader, MockHttpClient, MockProcessControl,
};
use stackmanager::{
    Artifact, StackConfig, StackError, StackEvent, StackManager, StackProcesses, StackResult, WorkerFactory,
};

use super::fixtures::TestFixtures;

pub type TestManager = StackManager<MockHttpClient, MockArtifactStore, MockDownloader, MockProcessControl>;

/// The remote side of the launcher: checksum host, coordinator, directory
/// service, release manifest and content host, routed by URL
#[derive(Clone)]
pub struct FakeRemote {
    pub online: Arc<AtomicBool>,
    pub checksum: String,
    pub coordinator_id: Option<String>,
    pub directory_entry: Option<String>,
    pub manifest: Option<String>,
    pub content: Vec<u8>,
    pub settings_status: u16,
    pub posted_settings: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            online: Arc::new(AtomicBool::new(true)),
            checksum: TestFixtures::matching_checksum(),
            coordinator_id: None,
            directory_entry: None,
            manifest: None,
            content: b"voxel data".to_vec(),
            settings_status: 200,
            posted_settings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = checksum.into();
        self
    }

    pub fn offline(self) -> Self {
        self.online.store(false, Ordering::SeqCst);
        self
    }

    /// Coordinator answers `/id` and the directory knows its name
    pub fn with_coordinator(mut self) -> Self {
        self.coordinator_id = Some(TestFixtures::COORDINATOR_ID.to_string());
        self.directory_entry = Some(TestFixtures::directory_entry());
        self
    }

    pub fn with_manifest(mut self, manifest: String) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn respond(&self, request: &HttpRequest) -> StackResult<HttpResponse> {
        let url = request.url.as_str();

        if url.ends_with(".md5") {
            if !self.online.load(Ordering::SeqCst) {
                return Err(StackError::network(url, "host unreachable"));
            }
            return Ok(HttpResponse::new(200, self.checksum.clone()));
        }
        if url.ends_with("/id") {
            return Ok(match &self.coordinator_id {
                Some(id) => HttpResponse::new(200, id.clone()),
                None => HttpResponse::new(503, ""),
            });
        }
        if url.contains("/domains/") {
            return Ok(match &self.directory_entry {
                Some(entry) => HttpResponse::new(200, entry.clone()),
                None => HttpResponse::new(404, ""),
            });
        }
        if url.ends_with("/settings.json") && request.method == HttpMethod::Post {
            let body = request.body.clone().unwrap_or_default();
            if let Ok(value) = serde_json::from_slice(&body) {
                self.posted_settings.lock().unwrap().push(value);
            }
            return Ok(HttpResponse::new(self.settings_status, "{}"));
        }
        if url.ends_with("builds.xml") {
            return Ok(match &self.manifest {
                Some(manifest) => HttpResponse::new(200, manifest.clone()),
                None => HttpResponse::new(404, ""),
            });
        }
        if url.contains(".svo") {
            return Ok(HttpResponse::new(200, self.content.clone()));
        }
        Ok(HttpResponse::new(404, ""))
    }

    pub fn into_mock(self) -> MockHttpClient {
        let mut http = MockHttpClient::new();
        http.expect_send().returning(move |request| self.respond(&request));
        http
    }
}

/// Counts what happened to a mocked process
#[derive(Clone, Default)]
pub struct ProcessProbe {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub last_args: Arc<Mutex<Vec<String>>>,
}

impl ProcessProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn last_args(&self) -> Vec<String> {
        self.last_args.lock().unwrap().clone()
    }

    pub fn mock(&self, pid: u32) -> MockProcessControl {
        let mut process = MockProcessControl::new();

        let starts = self.starts.clone();
        let last_args = self.last_args.clone();
        process.expect_start().returning(move |args| {
            starts.fetch_add(1, Ordering::SeqCst);
            *last_args.lock().unwrap() = args;
            Ok(Some(pid))
        });

        let starts = self.starts.clone();
        process.expect_restart().returning(move || {
            starts.fetch_add(1, Ordering::SeqCst);
            Ok(Some(pid))
        });

        let stops = self.stops.clone();
        process.expect_stop().returning(move |_| {
            stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        process.expect_terminate().returning(|| Ok(()));
        process.expect_is_running().returning(|| false);
        process.expect_process_id().returning(move || Some(pid));
        process
    }
}

/// Builder for test stack managers with sensible defaults
pub struct StackManagerBuilder {
    config: StackConfig,
    remote: FakeRemote,
    store: Option<MockArtifactStore>,
    downloader: Option<MockDownloader>,
    coordinator: ProcessProbe,
    monitor: ProcessProbe,
    workers: ProcessProbe,
    autostart: bool,
    update_check: bool,
}

impl StackManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: TestFixtures::config(),
            remote: FakeRemote::new(),
            store: None,
            downloader: None,
            coordinator: ProcessProbe::new(),
            monitor: ProcessProbe::new(),
            workers: ProcessProbe::new(),
            autostart: true,
            update_check: false,
        }
    }

    pub fn with_remote(mut self, remote: FakeRemote) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_store(mut self, store: MockArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_downloader(mut self, downloader: MockDownloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn with_coordinator_probe(mut self, probe: ProcessProbe) -> Self {
        self.coordinator = probe;
        self
    }

    pub fn with_monitor_probe(mut self, probe: ProcessProbe) -> Self {
        self.monitor = probe;
        self
    }

    pub fn with_worker_probe(mut self, probe: ProcessProbe) -> Self {
        self.workers = probe;
        self
    }

    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    pub fn with_update_check(mut self, update_check: bool) -> Self {
        self.update_check = update_check;
        self
    }

    pub fn with_config<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut StackConfig),
    {
        setup(&mut self.config);
        self
    }

    pub fn build(self) -> TestManager {
        let store = self.store.unwrap_or_else(TestHelpers::populated_store);
        let downloader = self.downloader.unwrap_or_else(TestHelpers::unused_downloader);
        let workers = self.workers.clone();
        let worker_factory: WorkerFactory<MockProcessControl> =
            Box::new(move |_| workers.mock(TestFixtures::WORKER_PID));

        let processes = StackProcesses {
            coordinator: self.coordinator.mock(TestFixtures::COORDINATOR_PID),
            monitor: self.monitor.mock(TestFixtures::MONITOR_PID),
            worker_factory,
        };

        StackManager::new(
            self.config,
            Arc::new(self.remote.into_mock()),
            Arc::new(store),
            Arc::new(downloader),
            processes,
        )
        .with_autostart(self.autostart)
        .with_update_check(self.update_check)
    }
}

/// Common helper functions for tests
pub struct TestHelpers;

impl TestHelpers {
    pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Every local artifact exists and holds `TestFixtures::PAYLOAD`
    pub fn populated_store() -> MockArtifactStore {
        let mut store = MockArtifactStore::new();
        store.expect_read_bytes().returning(|_| TestFixtures::PAYLOAD.to_vec());
        store.expect_exists().returning(|_| true);
        store.expect_entry_count().returning(|_| 4);
        store.expect_write_file().returning(|_, _| Ok(()));
        store
    }

    pub fn unused_downloader() -> MockDownloader {
        let mut downloader = MockDownloader::new();
        downloader.expect_install().never();
        downloader
    }

    /// Installs succeed except for `failing`
    pub fn downloader_failing_on(failing: Option<Artifact>) -> MockDownloader {
        let mut downloader = MockDownloader::new();
        downloader.expect_install().returning(move |spec| {
            if Some(spec.artifact) == failing {
                Err(StackError::HttpStatus {
                    url: spec.url.clone(),
                    status: 500,
                })
            } else {
                Ok(())
            }
        });
        downloader
    }

    /// Wait for the first event matching `predicate`, skipping others
    pub async fn wait_for<P>(events: &mut broadcast::Receiver<StackEvent>, predicate: P) -> StackEvent
    where
        P: Fn(&StackEvent) -> bool,
    {
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(event) if predicate(&event) => return event,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
                }
            }
        };
        tokio::time::timeout(Self::EVENT_TIMEOUT, wait)
            .await
            .expect("timed out waiting for stack event")
    }

    /// Everything already published, without waiting
    pub fn drain(events: &mut broadcast::Receiver<StackEvent>) -> Vec<StackEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }
}
