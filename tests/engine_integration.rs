use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use sweep::config::Config;
use sweep::engine::{
    run_elevated_batch, BatchDescriptor, ElevatedHandle, ElevationError, Elevator, Engine,
    InProcessElevator, PrivilegeBatcher, ScanOptions, SessionState,
};
use sweep::plugin::builtins::TrashPlugin;
use sweep::plugin::{
    CancellationToken, Category, CleanContext, CleanOutcome, FailureKind, Finding, Plugin, PluginDescriptor,
    PluginFailure, PluginRegistry, RiskLevel, ScanContext,
};
use sweep::SweepError;
use tempfile::TempDir;

/// Plugin returning fixed findings and recording how it was asked to clean.
struct FakePlugin {
    descriptor: PluginDescriptor,
    findings: Vec<Finding>,
    delay: Duration,
    panic_on_scan: bool,
    cleaned: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakePlugin {
    fn new(id: &str, category: Category) -> Self {
        Self {
            descriptor: PluginDescriptor::new(id, id, category, RiskLevel::Safe),
            findings: Vec::new(),
            delay: Duration::ZERO,
            panic_on_scan: false,
            cleaned: Mutex::new(Vec::new()),
        }
    }

    fn finding(mut self, path: &str, size: u64, privileged: bool) -> Self {
        let id = self.descriptor.id.clone();
        self.findings
            .push(Finding::new(&id, path, size, "fake").privileged(privileged));
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn panicking(mut self) -> Self {
        self.panic_on_scan = true;
        self
    }

    fn cleaned(&self) -> Vec<(PathBuf, bool)> {
        self.cleaned.lock().unwrap().clone()
    }
}

impl Plugin for FakePlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn scan(&self, ctx: &ScanContext) -> Result<Vec<Finding>, PluginFailure> {
        if self.panic_on_scan {
            panic!("scan blew up");
        }
        let start = Instant::now();
        while start.elapsed() < self.delay {
            ctx.checkpoint()?;
            thread::sleep(Duration::from_millis(10));
        }
        Ok(self.findings.clone())
    }

    fn clean(&self, findings: &[Finding], ctx: &CleanContext) -> Vec<CleanOutcome> {
        let mut cleaned = self.cleaned.lock().unwrap();
        findings
            .iter()
            .map(|f| {
                cleaned.push((f.path.clone(), ctx.is_elevated()));
                CleanOutcome::success(f)
            })
            .collect()
    }
}

/// Elevator that counts requests and runs granted batches in-process.
struct FakeElevator {
    registry: Mutex<Option<Arc<PluginRegistry>>>,
    requests: AtomicUsize,
    batches: Mutex<Vec<BatchDescriptor>>,
    decline: bool,
}

impl FakeElevator {
    fn new(decline: bool) -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(None),
            requests: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
            decline,
        })
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

struct FakeHandle(Arc<PluginRegistry>);

impl ElevatedHandle for FakeHandle {
    fn execute(
        self: Box<Self>,
        batch: &BatchDescriptor,
    ) -> Result<Vec<CleanOutcome>, ElevationError> {
        Ok(run_elevated_batch(&self.0, batch, 1))
    }
}

impl Elevator for FakeElevator {
    fn request_elevation(
        &self,
        batch: &BatchDescriptor,
    ) -> Result<Box<dyn ElevatedHandle>, ElevationError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(batch.clone());
        if self.decline {
            return Err(ElevationError::Declined);
        }
        let registry = self.registry.lock().unwrap().clone().unwrap();
        Ok(Box::new(FakeHandle(registry)))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.engine.plugin_timeout = 5;
    config.engine.cancel_grace_ms = 200;
    config
}

fn engine_with(plugins: Vec<Arc<dyn Plugin>>, elevator: Arc<FakeElevator>, config: &Config) -> Engine {
    let registry = Arc::new(PluginRegistry::from_plugins(plugins));
    *elevator.registry.lock().unwrap() = Some(Arc::clone(&registry));
    Engine::new(registry, config, elevator)
}

fn trash_fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("files")).unwrap();
    fs::write(tmp.path().join("files/a"), vec![0u8; 1024]).unwrap();
    fs::write(tmp.path().join("files/b"), vec![0u8; 2048]).unwrap();
    tmp
}

fn paths(findings: &[Finding]) -> Vec<&Path> {
    findings.iter().map(|f| f.path.as_path()).collect()
}

#[test]
fn trash_clean_frees_both_items() {
    let tmp = trash_fixture();
    let elevator = FakeElevator::new(false);
    let engine = engine_with(
        vec![Arc::new(TrashPlugin::with_dir(tmp.path().to_path_buf()))],
        elevator.clone(),
        &test_config(),
    );

    let mut session = engine.scan(["trash"], &ScanOptions::default());
    let selection: Vec<Finding> = session.findings().cloned().collect();
    assert_eq!(selection.len(), 2);

    let result = engine.clean(&mut session, &selection).unwrap();

    assert_eq!(result.total_freed, 3072);
    assert!(result.outcomes.iter().all(CleanOutcome::is_success));
    assert_eq!(session.state(), SessionState::Cleaned);
    assert_eq!(elevator.requests(), 0);
    assert!(!tmp.path().join("files/a").exists());
    assert!(!tmp.path().join("files/b").exists());
}

#[test]
fn mixed_privilege_plugin_uses_one_elevation() {
    let plugin = Arc::new(
        FakePlugin::new("pkg_cache", Category::PackageManager)
            .finding("/var/cache/pkg/big.pkg", 500_000, true)
            .finding("/home/u/.cache/pkg/small", 100, false),
    );
    let elevator = FakeElevator::new(false);
    let engine = engine_with(vec![plugin.clone()], elevator.clone(), &test_config());

    let mut session = engine.scan(["pkg_cache"], &ScanOptions::default());
    let selection: Vec<Finding> = session.findings().cloned().collect();
    let result = engine.clean(&mut session, &selection).unwrap();

    assert_eq!(result.total_freed, 500_100);
    assert_eq!(elevator.requests(), 1);

    let batches = elevator.batches.lock().unwrap();
    assert_eq!(batches[0].items.len(), 1);
    assert_eq!(batches[0].items[0].size, 500_000);

    // privileged items only ever run in the elevated pass
    for (path, elevated) in plugin.cleaned() {
        assert_eq!(elevated, path.starts_with("/var"), "{}", path.display());
    }
}

#[test]
fn many_privileged_items_still_one_elevation() {
    let plugin = Arc::new(
        FakePlugin::new("logs", Category::System)
            .finding("/var/log/a", 1, true)
            .finding("/var/log/b", 2, true)
            .finding("/var/log/c", 3, true),
    );
    let other = Arc::new(FakePlugin::new("cores", Category::System).finding("/var/crash/x", 4, true));
    let elevator = FakeElevator::new(false);
    let engine = engine_with(vec![plugin, other], elevator.clone(), &test_config());

    let mut session = engine.scan(["logs", "cores"], &ScanOptions::default());
    let selection: Vec<Finding> = session.findings().cloned().collect();
    let result = engine.clean(&mut session, &selection).unwrap();

    assert_eq!(elevator.requests(), 1);
    assert_eq!(elevator.batches.lock().unwrap()[0].plugin_ids, vec!["cores", "logs"]);
    assert_eq!(result.total_freed, 10);
}

#[test]
fn no_privileged_items_means_no_elevation() {
    let plugin = Arc::new(FakePlugin::new("user", Category::Other).finding("/home/u/x", 9, false));
    let elevator = FakeElevator::new(false);
    let engine = engine_with(vec![plugin], elevator.clone(), &test_config());

    let mut session = engine.scan(["user"], &ScanOptions::default());
    let selection: Vec<Finding> = session.findings().cloned().collect();
    engine.clean(&mut session, &selection).unwrap();

    assert_eq!(elevator.requests(), 0);
}

#[test]
fn declined_elevation_only_fails_privileged_items() {
    let plugin = Arc::new(
        FakePlugin::new("pkg_cache", Category::PackageManager)
            .finding("/var/cache/pkg/big.pkg", 500_000, true)
            .finding("/home/u/.cache/pkg/small", 100, false),
    );
    let elevator = FakeElevator::new(true);
    let engine = engine_with(vec![plugin.clone()], elevator.clone(), &test_config());

    let mut session = engine.scan(["pkg_cache"], &ScanOptions::default());
    let selection: Vec<Finding> = session.findings().cloned().collect();
    let result = engine.clean(&mut session, &selection).unwrap();

    assert_eq!(elevator.requests(), 1);
    assert_eq!(result.total_freed, 100);
    assert_eq!(session.state(), SessionState::PartiallyCleaned);
    for outcome in &result.outcomes {
        if outcome.finding().requires_privilege {
            assert_eq!(outcome.failure_kind(), Some(FailureKind::PermissionDenied));
        } else {
            assert!(outcome.is_success());
        }
    }
    assert_eq!(plugin.cleaned().len(), 1);
}

#[test]
fn cancelled_session_skips_elevation() {
    let plugin = Arc::new(
        FakePlugin::new("pkg_cache", Category::PackageManager)
            .finding("/var/cache/pkg/root", 500_000, true)
            .finding("/home/u/.cache/pkg/plain", 100, false),
    );
    let elevator = FakeElevator::new(false);
    let engine = engine_with(vec![plugin.clone()], elevator.clone(), &test_config());

    let mut session = engine.scan(["pkg_cache"], &ScanOptions::default());
    let selection: Vec<Finding> = session.findings().cloned().collect();
    engine.cancel(&session);
    let result = engine.clean(&mut session, &selection).unwrap();

    assert_eq!(elevator.requests(), 0);
    assert_eq!(result.outcomes.len(), 2);
    assert!(result
        .outcomes
        .iter()
        .all(|o| o.failure_kind() == Some(FailureKind::Cancelled)));
    assert!(plugin.cleaned().is_empty());
    assert_eq!(result.total_freed, 0);
}

#[test]
fn elevated_pass_isolates_items_and_is_retry_safe() {
    let tmp = trash_fixture();
    fs::write(tmp.path().join("files/c"), vec![0u8; 512]).unwrap();
    let registry = Arc::new(PluginRegistry::from_plugins(vec![Arc::new(
        TrashPlugin::with_dir(tmp.path().to_path_buf()),
    )]));
    let batcher = PrivilegeBatcher::new(Arc::new(InProcessElevator::new(registry, 2)));

    let items: Vec<Finding> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            let path = tmp.path().join("files").join(name);
            let size = fs::metadata(&path).unwrap().len();
            Finding::new("trash", path, size, "Trash").privileged(true)
        })
        .collect();
    fs::remove_file(tmp.path().join("files/b")).unwrap();
    let ctx = CleanContext::new(CancellationToken::new());

    let first = batcher.execute_privileged(&items, &ctx);
    assert_eq!(first.len(), 3);
    assert!(first[0].is_success());
    assert_eq!(first[1].failure_kind(), Some(FailureKind::NotFound));
    assert!(first[2].is_success());
    assert!(!tmp.path().join("files/a").exists());
    assert!(!tmp.path().join("files/c").exists());

    let second = batcher.execute_privileged(&items, &ctx);
    assert_eq!(second.len(), 3);
    assert!(second
        .iter()
        .all(|o| o.failure_kind() == Some(FailureKind::NotFound)));
}

/// Elevator whose handles record how many batches run at the same time.
#[derive(Default)]
struct OverlapElevator {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

struct OverlapHandle {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ElevatedHandle for OverlapHandle {
    fn execute(
        self: Box<Self>,
        batch: &BatchDescriptor,
    ) -> Result<Vec<CleanOutcome>, ElevationError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(batch.items.iter().map(CleanOutcome::success).collect())
    }
}

impl Elevator for OverlapElevator {
    fn request_elevation(
        &self,
        _batch: &BatchDescriptor,
    ) -> Result<Box<dyn ElevatedHandle>, ElevationError> {
        Ok(Box::new(OverlapHandle {
            active: Arc::clone(&self.active),
            peak: Arc::clone(&self.peak),
        }))
    }
}

#[test]
fn concurrent_privileged_batches_never_overlap() {
    let elevator = Arc::new(OverlapElevator::default());

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let batcher = PrivilegeBatcher::new(elevator.clone());
            thread::spawn(move || {
                let items = vec![Finding::new("logs", format!("/var/log/{}", i), 1, "").privileged(true)];
                batcher.execute_privileged(&items, &CleanContext::new(CancellationToken::new()))
            })
        })
        .collect();

    for worker in workers {
        let outcomes = worker.join().unwrap();
        assert!(outcomes[0].is_success());
    }
    assert_eq!(elevator.peak.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_selection_is_rejected_before_anything_runs() {
    let plugin = Arc::new(FakePlugin::new("user", Category::Other).finding("/home/u/x", 9, false));
    let elevator = FakeElevator::new(false);
    let engine = engine_with(vec![plugin.clone()], elevator, &test_config());

    let mut session = engine.scan(["user"], &ScanOptions::default());
    let mut selection: Vec<Finding> = session.findings().cloned().collect();
    selection.push(Finding::new("user", "/home/u/not-scanned", 1, "fake"));

    let err = engine.clean(&mut session, &selection).unwrap_err();

    assert!(matches!(err, SweepError::StaleSelection { .. }));
    assert!(plugin.cleaned().is_empty());
    assert_eq!(session.state(), SessionState::Scanned);
}

#[test]
fn modified_finding_counts_as_stale() {
    let plugin = Arc::new(FakePlugin::new("user", Category::Other).finding("/home/u/x", 9, false));
    let engine = engine_with(vec![plugin], FakeElevator::new(false), &test_config());

    let mut session = engine.scan(["user"], &ScanOptions::default());
    let tampered = session.findings().next().unwrap().clone().privileged(true);

    assert!(matches!(
        engine.clean(&mut session, &[tampered]),
        Err(SweepError::StaleSelection { .. })
    ));
}

#[test]
fn second_clean_on_same_session_is_refused() {
    let plugin = Arc::new(FakePlugin::new("user", Category::Other).finding("/home/u/x", 9, false));
    let engine = engine_with(vec![plugin], FakeElevator::new(false), &test_config());

    let mut session = engine.scan(["user"], &ScanOptions::default());
    let selection: Vec<Finding> = session.findings().cloned().collect();
    engine.clean(&mut session, &selection).unwrap();

    assert!(matches!(
        engine.clean(&mut session, &selection),
        Err(SweepError::InvalidState { .. })
    ));
}

#[test]
fn empty_selection_frees_nothing() {
    let plugin = Arc::new(FakePlugin::new("user", Category::Other).finding("/home/u/x", 9, false));
    let engine = engine_with(vec![plugin], FakeElevator::new(false), &test_config());

    let mut session = engine.scan(["user"], &ScanOptions::default());
    let result = engine.clean(&mut session, &[]).unwrap();

    assert_eq!(result.total_freed, 0);
    assert!(result.outcomes.is_empty());
    assert_eq!(session.state(), SessionState::Cleaned);
}

#[test]
fn timed_out_plugin_does_not_affect_others() {
    let slow = Arc::new(
        FakePlugin::new("slow", Category::Other)
            .finding("/x/slow", 1, false)
            .slow(Duration::from_secs(30)),
    );
    let fast = Arc::new(FakePlugin::new("fast", Category::Other).finding("/x/fast", 5, false));
    let engine = engine_with(vec![slow, fast], FakeElevator::new(false), &test_config());

    let options = ScanOptions {
        timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let started = Instant::now();
    let session = engine.scan(["slow", "fast"], &options);

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(session.state(), SessionState::Scanned);
    let slow_result = session.result("slow").unwrap();
    assert_eq!(slow_result.error().unwrap().message, "timeout");
    assert!(slow_result.findings().is_empty());
    assert_eq!(session.result("fast").unwrap().findings().len(), 1);
}

#[test]
fn panicking_plugin_is_isolated() {
    let bad = Arc::new(FakePlugin::new("bad", Category::Other).panicking());
    let good = Arc::new(FakePlugin::new("good", Category::Other).finding("/x/good", 5, false));
    let engine = engine_with(vec![bad, good], FakeElevator::new(false), &test_config());

    let session = engine.scan(["bad", "good"], &ScanOptions::default());

    assert!(session.result("bad").unwrap().error().is_some());
    assert_eq!(session.result("good").unwrap().findings().len(), 1);
}

#[test]
fn every_requested_id_gets_exactly_one_result() {
    let a = Arc::new(FakePlugin::new("a", Category::Browser).finding("/x/a", 1, false));
    let b = Arc::new(FakePlugin::new("b", Category::Trash));
    let engine = engine_with(vec![a, b], FakeElevator::new(false), &test_config());

    let session = engine.scan(["b", "ghost", "a", "b"], &ScanOptions::default());
    let ids: Vec<&str> = session
        .results()
        .iter()
        .map(|r| r.plugin_id.as_str())
        .collect();

    assert_eq!(ids, vec!["a", "b", "ghost"]);
    assert_eq!(
        session.result("ghost").unwrap().error().unwrap().message,
        "unknown plugin"
    );
}

#[test]
fn repeated_scans_produce_identical_order() {
    let tmp = TempDir::new().unwrap();
    let files = tmp.path().join("files");
    fs::create_dir_all(&files).unwrap();
    for (name, size) in [("c", 10), ("a", 30), ("b", 10), ("d", 20)] {
        fs::write(files.join(name), vec![0u8; size]).unwrap();
    }
    let engine = engine_with(
        vec![Arc::new(TrashPlugin::with_dir(tmp.path().to_path_buf()))],
        FakeElevator::new(false),
        &test_config(),
    );

    let first: Vec<Finding> = engine
        .scan(["trash"], &ScanOptions::default())
        .findings()
        .cloned()
        .collect();
    let second: Vec<Finding> = engine
        .scan(["trash"], &ScanOptions::default())
        .findings()
        .cloned()
        .collect();

    assert_eq!(first, second);
    assert_eq!(
        paths(&first),
        vec![files.join("a"), files.join("d"), files.join("b"), files.join("c")]
    );
}

#[test]
fn cancel_from_another_thread_stops_scan() {
    let slow = Arc::new(FakePlugin::new("slow", Category::Other).slow(Duration::from_secs(30)));
    let engine = engine_with(vec![slow], FakeElevator::new(false), &test_config());

    let options = ScanOptions::default();
    let token = options.cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        token.cancel();
    });

    let mut session = engine.scan(["slow"], &options);
    canceller.join().unwrap();

    assert_eq!(session.state(), SessionState::Cancelled);
    assert_eq!(
        session.result("slow").unwrap().error().unwrap().message,
        "cancelled"
    );
    assert!(matches!(
        engine.clean(&mut session, &[]),
        Err(SweepError::InvalidState { .. })
    ));
}

#[test]
fn describe_risk_and_listing() {
    let engine = engine_with(
        vec![
            Arc::new(FakePlugin::new("b", Category::Trash)),
            Arc::new(FakePlugin::new("a", Category::Browser)),
        ],
        FakeElevator::new(false),
        &test_config(),
    );

    assert_eq!(engine.describe_risk("a").unwrap(), RiskLevel::Safe);
    assert!(matches!(
        engine.describe_risk("zzz"),
        Err(SweepError::PluginNotFound(_))
    ));

    let ids: Vec<String> = engine
        .list_plugins(&Default::default())
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
}
