use std::sync::atomic::AtomicUsize;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::*;
use crate::net::testing::FakeClient;
use crate::sink::testing::{RecordingRenderer, RecordingView};

type Source = Arc<dyn ReleaseSource>;

fn release(version: &str, url: &str, kind: SourceKind) -> ReleaseInfo {
    ReleaseInfo {
        version: version.to_string(),
        download_url: url.to_string(),
        published_at: SystemTime::UNIX_EPOCH,
        size_bytes: 20 * 1024 * 1024,
        build_variant: BuildVariant::Release,
        source_kind: kind,
        asset_name: "app.apk".to_string(),
        commit: "unknown".to_string(),
        notes: String::new(),
    }
}

/// Returns whatever release is currently loaded, or fails when empty.
struct FixedSource {
    kind: SourceKind,
    release: Mutex<Option<ReleaseInfo>>,
    calls: AtomicUsize,
}

impl FixedSource {
    fn ok(kind: SourceKind, release: ReleaseInfo) -> Arc<Self> {
        Arc::new(Self {
            kind,
            release: Mutex::new(Some(release)),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(kind: SourceKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            release: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    fn set(&self, release: Option<ReleaseInfo>) {
        *self.release.lock().unwrap() = release;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseSource for FixedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_release(&self) -> Result<ReleaseInfo, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SourceError::Decode("scripted failure".to_string()))
    }
}

/// Blocks inside `fetch_release` until released.
struct GatedSource {
    release: ReleaseInfo,
    entered: Notify,
    gate: Notify,
}

#[async_trait]
impl ReleaseSource for GatedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::RemoteApi
    }

    async fn fetch_release(&self) -> Result<ReleaseInfo, SourceError> {
        self.entered.notify_one();
        self.gate.notified().await;
        Ok(self.release.clone())
    }
}

struct Harness {
    resolver: ReleaseResolver,
    renderer: Arc<RecordingRenderer>,
    view: Arc<RecordingView>,
}

fn harness(sources: Vec<Source>, fallback: Source) -> Harness {
    let renderer = Arc::new(RecordingRenderer::default());
    let view = Arc::new(RecordingView::default());
    let validator = Arc::new(ArtifactValidator::new(
        Arc::new(FakeClient::new()),
        Duration::from_secs(1),
    ));
    let resolver =
        ReleaseResolver::new(sources, fallback, validator, renderer.clone(), view.clone())
            .with_backoff(BackoffPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(100),
            });
    Harness {
        resolver,
        renderer,
        view,
    }
}

fn remote_ok(version: &str, url: &str) -> Arc<FixedSource> {
    FixedSource::ok(SourceKind::RemoteApi, release(version, url, SourceKind::RemoteApi))
}

fn static_fallback() -> Source {
    Arc::new(StaticFallbackSource::new(FallbackRelease::default()))
}

#[tokio::test]
async fn first_usable_source_wins() {
    let remote = remote_ok("v2", "https://x/v2.apk");
    let manifest = FixedSource::ok(
        SourceKind::LocalManifest,
        release("v1", "https://x/v1.apk", SourceKind::LocalManifest),
    );
    let h = harness(
        vec![remote.clone() as Source, manifest.clone() as Source],
        static_fallback(),
    );

    let info = h.resolver.resolve().await.unwrap();
    assert_eq!(info.version, "v2");
    assert_eq!(remote.calls(), 1);
    assert_eq!(manifest.calls(), 0);
}

#[tokio::test]
async fn falls_through_to_manifest() {
    let remote = FixedSource::failing(SourceKind::RemoteApi);
    let manifest = FixedSource::ok(
        SourceKind::LocalManifest,
        release("v1", "./app.apk", SourceKind::LocalManifest),
    );
    let h = harness(vec![remote as Source, manifest as Source], static_fallback());

    let info = h.resolver.resolve().await.unwrap();
    assert_eq!(info.source_kind, SourceKind::LocalManifest);
}

#[tokio::test]
async fn resolution_falls_back_to_static_release() {
    let h = harness(
        vec![
            FixedSource::failing(SourceKind::RemoteApi) as Source,
            FixedSource::failing(SourceKind::LocalManifest) as Source,
        ],
        static_fallback(),
    );

    let info = h.resolver.resolve().await.unwrap();
    assert_eq!(info.source_kind, SourceKind::StaticFallback);
    assert_eq!(info.build_variant, BuildVariant::Fallback);
}

#[tokio::test]
async fn unchanged_release_is_pushed_once() {
    let remote = remote_ok("v2", "https://x/v2.apk");
    let h = harness(vec![remote.clone() as Source], static_fallback());

    assert_eq!(h.resolver.refresh().await, RefreshOutcome::Updated);
    // Size changes alone do not count as a new release.
    let mut same = release("v2", "https://x/v2.apk", SourceKind::RemoteApi);
    same.size_bytes = 1;
    remote.set(Some(same));
    assert_eq!(h.resolver.refresh().await, RefreshOutcome::Unchanged);

    assert_eq!(h.renderer.count(), 1);
    assert_eq!(h.view.release_count(), 1);
    let (status, _) = h.view.last_status().unwrap();
    assert_eq!(status, ViewStatus::Success);
    let snapshot = h.resolver.status();
    assert!(snapshot.last_refresh_at.is_some());
    assert_eq!(snapshot.phase, RefreshPhase::Idle);
    assert!(!snapshot.is_refreshing);
}

#[tokio::test]
async fn new_version_is_pushed_again() {
    let remote = remote_ok("v2", "https://x/v2.apk");
    let h = harness(vec![remote.clone() as Source], static_fallback());

    h.resolver.refresh().await;
    remote.set(Some(release("v3", "https://x/v3.apk", SourceKind::RemoteApi)));
    assert_eq!(h.resolver.refresh().await, RefreshOutcome::Updated);

    assert_eq!(h.renderer.count(), 2);
    assert_eq!(h.renderer.rendered.lock().unwrap()[1], "https://x/v3.apk");
    assert_eq!(h.resolver.current_release().unwrap().version, "v3");
}

#[tokio::test]
async fn validation_failure_does_not_override_source() {
    let remote = remote_ok("v2", "https://x/v2.apk");
    let h = harness(vec![remote as Source], static_fallback());

    assert_eq!(h.resolver.refresh().await, RefreshOutcome::Updated);
    let snapshot = h.resolver.status();
    let validation = snapshot.last_validation.unwrap();
    assert!(!validation.is_reachable);
    assert_eq!(snapshot.current_release.unwrap().download_url, "https://x/v2.apk");
}

#[tokio::test]
async fn backoff_grows_then_gives_up_with_fallback() {
    let h = harness(
        vec![FixedSource::failing(SourceKind::RemoteApi) as Source],
        FixedSource::failing(SourceKind::StaticFallback),
    );

    let first = h.resolver.refresh().await;
    let second = h.resolver.refresh().await;
    let (
        RefreshOutcome::RetryScheduled {
            attempt: 1,
            delay: d1,
        },
        RefreshOutcome::RetryScheduled {
            attempt: 2,
            delay: d2,
        },
    ) = (first.clone(), second.clone())
    else {
        panic!("unexpected outcomes {first:?} {second:?}");
    };
    assert_eq!(d1, Duration::from_millis(100));
    assert!(d2 >= 2 * Duration::from_millis(100));
    assert_eq!(h.resolver.status().phase, RefreshPhase::Backoff(2));
    assert_eq!(h.renderer.count(), 0);

    assert!(matches!(
        h.resolver.refresh().await,
        RefreshOutcome::RetryScheduled { attempt: 3, .. }
    ));
    assert_eq!(h.resolver.refresh().await, RefreshOutcome::Failed);

    let snapshot = h.resolver.status();
    assert_eq!(snapshot.phase, RefreshPhase::Failed);
    assert_eq!(
        snapshot.current_release.unwrap().source_kind,
        SourceKind::StaticFallback
    );
    assert_eq!(h.renderer.count(), 1);
    assert_eq!(h.view.release_count(), 1);
    let (status, message) = h.view.last_status().unwrap();
    assert_eq!(status, ViewStatus::Error);
    assert!(message.contains("local fallback"));
}

#[tokio::test]
async fn success_resets_retry_count() {
    let remote = FixedSource::failing(SourceKind::RemoteApi);
    let h = harness(
        vec![remote.clone() as Source],
        FixedSource::failing(SourceKind::StaticFallback),
    );

    h.resolver.refresh().await;
    assert_eq!(h.resolver.status().retry_count, 1);
    remote.set(Some(release("v2", "https://x/v2.apk", SourceKind::RemoteApi)));
    assert_eq!(h.resolver.refresh().await, RefreshOutcome::Updated);
    assert_eq!(h.resolver.status().retry_count, 0);
}

#[tokio::test]
async fn force_refresh_resets_retry_count() {
    let h = harness(
        vec![FixedSource::failing(SourceKind::RemoteApi) as Source],
        FixedSource::failing(SourceKind::StaticFallback),
    );
    h.resolver.refresh().await;
    h.resolver.refresh().await;
    assert_eq!(
        h.resolver.force_refresh().await,
        RefreshOutcome::RetryScheduled {
            attempt: 1,
            delay: Duration::from_millis(100)
        }
    );
}

#[tokio::test]
async fn concurrent_refresh_is_skipped() {
    let gated = Arc::new(GatedSource {
        release: release("v2", "https://x/v2.apk", SourceKind::RemoteApi),
        entered: Notify::new(),
        gate: Notify::new(),
    });
    let h = harness(vec![gated.clone() as Source], static_fallback());
    let resolver = Arc::new(h.resolver);

    let first = tokio::spawn({
        let resolver = resolver.clone();
        async move { resolver.refresh().await }
    });
    gated.entered.notified().await;
    assert!(resolver.status().is_refreshing);
    assert_eq!(resolver.refresh().await, RefreshOutcome::Skipped);

    gated.gate.notify_one();
    assert_eq!(first.await.unwrap(), RefreshOutcome::Updated);
    assert_eq!(h.renderer.count(), 1);
    assert!(!resolver.status().is_refreshing);
}

#[tokio::test]
async fn render_failure_is_surfaced_and_retried_next_time() {
    let remote = remote_ok("v2", "https://x/v2.apk");
    let h = harness(vec![remote as Source], static_fallback());

    h.renderer.set_failing(true);
    assert_eq!(h.resolver.refresh().await, RefreshOutcome::RenderFailed);
    let (status, message) = h.view.last_status().unwrap();
    assert_eq!(status, ViewStatus::Error);
    assert!(message.contains("cannot render code"));
    assert!(h.resolver.current_release().is_none());

    h.renderer.set_failing(false);
    assert_eq!(h.resolver.refresh().await, RefreshOutcome::Updated);
    assert_eq!(h.renderer.count(), 1);
}

#[tokio::test]
async fn fallback_render_failure_is_shown_after_giving_up() {
    let h = harness(
        vec![FixedSource::failing(SourceKind::RemoteApi) as Source],
        FixedSource::failing(SourceKind::StaticFallback),
    );
    h.renderer.set_failing(true);

    for _ in 0..3 {
        h.resolver.refresh().await;
    }
    assert_eq!(h.resolver.refresh().await, RefreshOutcome::Failed);

    assert_eq!(h.renderer.count(), 0);
    assert_eq!(h.view.release_count(), 1);
    let statuses = h.view.statuses.lock().unwrap().clone();
    let (status, message) = statuses.last().unwrap();
    assert_eq!(*status, ViewStatus::Error);
    assert!(message.contains("cannot render code"), "{message}");
    assert!(statuses.iter().any(|(_, m)| m.contains("Showing local fallback")));
    assert_eq!(h.resolver.phase(), RefreshPhase::Failed);
}

#[tokio::test]
async fn from_config_builds_standard_chain() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("latest-build.txt");
    std::fs::write(&manifest, "VERSION=v9\nDOWNLOAD_URL=./app-v9.apk\n").unwrap();
    let cfg = BeaconConfig {
        manifest_location: manifest.display().to_string(),
        ..BeaconConfig::default()
    };
    let renderer = Arc::new(RecordingRenderer::default());
    let view = Arc::new(RecordingView::default());
    // The fake client has no routes, so the release API fails.
    let resolver =
        ReleaseResolver::from_config(&cfg, Arc::new(FakeClient::new()), renderer.clone(), view);

    let info = resolver.resolve().await.unwrap();
    assert_eq!(info.source_kind, SourceKind::LocalManifest);
    assert_eq!(info.version, "v9");
}
