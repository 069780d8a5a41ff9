//! Concurrent scan coordinator.
//!
//! Every plugin scan runs on its own thread, at most `max_workers` at a
//! time. A plugin that outlives its timeout is abandoned: its thread may
//! keep running, but whatever it eventually sends back is ignored.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::engine::progress::Progress;
use crate::engine::session::{PluginScan, Session, SessionState};
use crate::plugin::{
    CancellationToken, Finding, Plugin, PluginError, PluginFailure, PluginRegistry, ScanContext,
    ScanResult,
};

/// How often the control loop wakes up to look at the cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub const TIMEOUT_MESSAGE: &str = "timeout";
pub const CANCELLED_MESSAGE: &str = "cancelled";
pub const UNKNOWN_MESSAGE: &str = "unknown plugin";

/// Per-request scan options.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Overrides the configured per-plugin timeout.
    pub timeout: Option<Duration>,
    /// Cancels the scan when signalled from another thread.
    pub cancel: CancellationToken,
    /// Receives per-plugin progress.
    pub progress: Option<Arc<Progress>>,
}

/// Runs plugin scans concurrently and aggregates them into a [`Session`].
pub struct ScanCoordinator {
    registry: Arc<PluginRegistry>,
    max_workers: usize,
    timeout: Duration,
    cancel_grace: Duration,
}

impl ScanCoordinator {
    pub fn new(registry: Arc<PluginRegistry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            max_workers: config.max_workers.max(1),
            timeout: config.plugin_timeout(),
            cancel_grace: config.cancel_grace(),
        }
    }

    /// Scan the given plugin ids.
    ///
    /// The returned session holds exactly one result per distinct requested
    /// id; unknown ids, failures, timeouts and cancellations are recorded as
    /// [`PluginError`]s.
    pub fn scan<I, S>(&self, plugin_ids: I, options: &ScanOptions) -> Session
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let ids: Vec<String> = plugin_ids
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let mut session = Session::new(options.cancel.clone());
        let _ = session.transition(SessionState::Scanning);

        let timeout = options.timeout.unwrap_or(self.timeout);
        let mut results: HashMap<String, ScanResult> = HashMap::new();
        let mut queue: VecDeque<Arc<dyn Plugin>> = VecDeque::new();

        for id in &ids {
            match self.registry.get(id) {
                Ok(plugin) => queue.push_back(plugin),
                Err(_) => {
                    tracing::warn!("Plugin '{}' not found", id);
                    results.insert(id.clone(), failed(id, UNKNOWN_MESSAGE));
                }
            }
        }

        if let Some(progress) = &options.progress {
            progress.reset(queue.len());
        }

        let workers = self.max_workers.min(queue.len()).max(1);
        tracing::info!(
            "Scanning {} plugins with {} workers, timeout {:?}",
            queue.len(),
            workers,
            timeout
        );

        let (tx, rx) = mpsc::channel::<(String, ScanResult)>();
        let mut in_flight: HashMap<String, Instant> = HashMap::new();
        let cancel = &options.cancel;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            while in_flight.len() < workers {
                let Some(plugin) = queue.pop_front() else {
                    break;
                };
                let id = plugin.id().to_string();
                if let Some(progress) = &options.progress {
                    progress.set_current(Some(id.clone()));
                }
                match spawn_worker(plugin, ScanContext::new(cancel.clone()), tx.clone()) {
                    Ok(()) => {
                        in_flight.insert(id, Instant::now() + timeout);
                    }
                    Err(e) => {
                        tracing::error!("Cannot start scan worker for '{}': {}", id, e);
                        record(&mut results, &options.progress, &id, failed(&id, e.to_string()));
                    }
                }
            }

            if in_flight.is_empty() {
                break;
            }

            let now = Instant::now();
            let next_deadline = in_flight.values().min().copied().unwrap_or(now);
            let wait = next_deadline.saturating_duration_since(now).min(POLL_INTERVAL);

            match rx.recv_timeout(wait) {
                Ok((id, result)) => {
                    // results of abandoned workers are no longer in flight
                    if in_flight.remove(&id).is_some() {
                        record(&mut results, &options.progress, &id, result);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let now = Instant::now();
            let expired: Vec<String> = in_flight
                .iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(id, _)| id.clone())
                .collect();
            for id in expired {
                in_flight.remove(&id);
                tracing::warn!("Plugin '{}' timed out after {:?}", id, timeout);
                record(&mut results, &options.progress, &id, failed(&id, TIMEOUT_MESSAGE));
            }
        }

        let cancelled = cancel.is_cancelled();
        if cancelled {
            tracing::info!("Scan cancelled, waiting for {} in-flight plugins", in_flight.len());
            for plugin in queue.drain(..) {
                let id = plugin.id().to_string();
                record(&mut results, &options.progress, &id, failed(&id, CANCELLED_MESSAGE));
            }

            let grace_deadline = Instant::now() + self.cancel_grace;
            while !in_flight.is_empty() {
                let remaining = grace_deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match rx.recv_timeout(remaining) {
                    Ok((id, result)) => {
                        if in_flight.remove(&id).is_some() {
                            record(&mut results, &options.progress, &id, result);
                        }
                    }
                    Err(_) => break,
                }
            }

            for (id, _) in in_flight.drain() {
                tracing::warn!("Plugin '{}' did not acknowledge cancellation", id);
                record(&mut results, &options.progress, &id, failed(&id, CANCELLED_MESSAGE));
            }
        }

        if let Some(progress) = &options.progress {
            progress.set_current(None);
        }

        let ordered = self.order(ids, results);
        let _ = session.finish_scan(ordered, cancelled);
        session
    }

    /// Order results by category then id; unknown ids go last.
    fn order(&self, ids: Vec<String>, mut results: HashMap<String, ScanResult>) -> Vec<PluginScan> {
        let mut scans: Vec<PluginScan> = ids
            .into_iter()
            .map(|id| {
                let result = results
                    .remove(&id)
                    .unwrap_or_else(|| failed(&id, CANCELLED_MESSAGE));
                PluginScan {
                    descriptor: self.registry.descriptor(&id).cloned(),
                    plugin_id: id,
                    result,
                }
            })
            .collect();

        scans.sort_by(|a, b| {
            let key_a = (a.descriptor.is_none(), a.descriptor.as_ref().map(|d| d.category));
            let key_b = (b.descriptor.is_none(), b.descriptor.as_ref().map(|d| d.category));
            key_a.cmp(&key_b).then_with(|| a.plugin_id.cmp(&b.plugin_id))
        });
        scans
    }
}

fn failed(id: &str, message: impl Into<String>) -> ScanResult {
    ScanResult::Failed {
        error: PluginError::new(id, message),
    }
}

fn record(
    results: &mut HashMap<String, ScanResult>,
    progress: &Option<Arc<Progress>>,
    id: &str,
    result: ScanResult,
) {
    if let Some(progress) = progress {
        progress.increment();
    }
    results.insert(id.to_string(), result);
}

fn spawn_worker(
    plugin: Arc<dyn Plugin>,
    ctx: ScanContext,
    tx: Sender<(String, ScanResult)>,
) -> std::io::Result<()> {
    let id = plugin.id().to_string();
    thread::Builder::new()
        .name(format!("scan-{}", id))
        .spawn(move || {
            let result = run_plugin(plugin.as_ref(), &ctx);
            // the receiver is gone if the coordinator already returned
            let _ = tx.send((id, result));
        })
        .map(|_| ())
}

/// Run one plugin's scan, converting every failure mode into a result.
pub fn run_plugin(plugin: &dyn Plugin, ctx: &ScanContext) -> ScanResult {
    let id = plugin.id().to_string();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(reason) = plugin.unavailable_reason() {
            tracing::info!("Plugin '{}' not available on this system: {}", id, reason);
            return Ok(Vec::new());
        }
        plugin.scan(ctx)
    }));

    match outcome {
        Ok(Ok(mut findings)) => {
            for finding in &mut findings {
                finding.plugin_id.clone_from(&id);
            }
            sort_findings(&mut findings);
            tracing::debug!("Plugin '{}' reported {} findings", id, findings.len());
            ScanResult::Findings { findings }
        }
        Ok(Err(PluginFailure::Cancelled)) => failed(&id, CANCELLED_MESSAGE),
        Ok(Err(e)) => {
            tracing::warn!("Plugin '{}' failed during scan: {}", id, e);
            failed(&id, e.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("Plugin '{}' panicked during scan: {}", id, message);
            failed(&id, format!("panicked: {}", message))
        }
    }
}

/// Largest first, then by path; equal keys keep their reported order.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Category, PluginDescriptor, RiskLevel};
    use std::path::PathBuf;

    struct Fixed {
        descriptor: PluginDescriptor,
        findings: Vec<Finding>,
        delay: Duration,
    }

    impl Plugin for Fixed {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        fn scan(&self, ctx: &ScanContext) -> Result<Vec<Finding>, PluginFailure> {
            let start = Instant::now();
            while start.elapsed() < self.delay {
                ctx.checkpoint()?;
                thread::sleep(Duration::from_millis(5));
            }
            Ok(self.findings.clone())
        }
    }

    fn fixed(id: &str, category: Category, sizes: &[u64], delay: Duration) -> Arc<dyn Plugin> {
        Arc::new(Fixed {
            descriptor: PluginDescriptor::new(id, id, category, RiskLevel::Safe),
            findings: sizes
                .iter()
                .enumerate()
                .map(|(i, s)| Finding::new(id, format!("/data/{}/{}", id, i), *s, "test"))
                .collect(),
            delay,
        })
    }

    fn coordinator(plugins: Vec<Arc<dyn Plugin>>) -> ScanCoordinator {
        let config = EngineConfig {
            max_workers: 2,
            plugin_timeout: 5,
            cancel_grace_ms: 500,
        };
        ScanCoordinator::new(Arc::new(PluginRegistry::from_plugins(plugins)), &config)
    }

    #[test]
    fn test_sort_findings_by_size_then_path() {
        let mut findings = vec![
            Finding::new("p", "/b", 10, "first"),
            Finding::new("p", "/a", 10, ""),
            Finding::new("p", "/c", 99, ""),
            Finding::new("p", "/b", 10, "second"),
        ];
        sort_findings(&mut findings);

        let paths: Vec<PathBuf> = findings.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/c"),
                PathBuf::from("/a"),
                PathBuf::from("/b"),
                PathBuf::from("/b")
            ]
        );
        assert_eq!(findings[2].reason, "first");
    }

    #[test]
    fn test_results_ordered_by_category_then_id() {
        let scanner = coordinator(vec![
            fixed("zz", Category::Browser, &[1], Duration::ZERO),
            fixed("aa", Category::Trash, &[1], Duration::ZERO),
            fixed("mm", Category::Browser, &[1], Duration::ZERO),
        ]);

        let session = scanner.scan(["aa", "nope", "zz", "mm"], &ScanOptions::default());
        let ids: Vec<&str> = session.results().iter().map(|r| r.plugin_id.as_str()).collect();

        assert_eq!(ids, vec!["mm", "zz", "aa", "nope"]);
        assert_eq!(session.result("nope").unwrap().error().unwrap().message, UNKNOWN_MESSAGE);
    }

    #[test]
    fn test_duplicate_ids_scanned_once() {
        let scanner = coordinator(vec![fixed("a", Category::Other, &[3], Duration::ZERO)]);
        let session = scanner.scan(["a", "a"], &ScanOptions::default());
        assert_eq!(session.results().len(), 1);
        assert_eq!(session.findings().count(), 1);
    }

    #[test]
    fn test_progress_counts_every_plugin() {
        let scanner = coordinator(vec![
            fixed("a", Category::Other, &[1], Duration::ZERO),
            fixed("b", Category::Other, &[1], Duration::ZERO),
            fixed("c", Category::Other, &[1], Duration::ZERO),
        ]);
        let progress = Arc::new(Progress::default());
        let options = ScanOptions {
            progress: Some(Arc::clone(&progress)),
            ..Default::default()
        };

        scanner.scan(["a", "b", "c"], &options);

        assert_eq!(progress.total(), 3);
        assert_eq!(progress.completed(), 3);
    }

    #[test]
    fn test_cancel_before_scan_marks_everything_cancelled() {
        let scanner = coordinator(vec![
            fixed("a", Category::Other, &[1], Duration::from_secs(2)),
            fixed("b", Category::Other, &[1], Duration::from_secs(2)),
        ]);
        let options = ScanOptions::default();
        options.cancel.cancel();

        let session = scanner.scan(["a", "b"], &options);

        assert_eq!(session.state(), SessionState::Cancelled);
        assert_eq!(session.errors().count(), 2);
        assert!(session.errors().all(|e| e.message == CANCELLED_MESSAGE));
    }

    #[test]
    fn test_cancel_during_scan_returns_partial_session() {
        let scanner = coordinator(vec![
            fixed("fast", Category::Other, &[7], Duration::ZERO),
            fixed("slow", Category::Other, &[1], Duration::from_secs(10)),
        ]);
        let options = ScanOptions::default();
        let cancel = options.cancel.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            cancel.cancel();
        });
        let started = Instant::now();
        let session = scanner.scan(["fast", "slow"], &options);
        handle.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(session.state(), SessionState::Cancelled);
        assert_eq!(session.result("fast").unwrap().findings().len(), 1);
        assert_eq!(
            session.result("slow").unwrap().error().unwrap().message,
            CANCELLED_MESSAGE
        );
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
