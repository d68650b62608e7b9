//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `FakeWeb`, `FakeRetirement`, `FakeBugTracker` and
//! `RecordingViewer`. Each fake counts its in-flight calls through a
//! [`ConcurrencyGauge`] so tests can assert on peak parallelism and on
//! calls left dangling after a cancellation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{ClientError, ClientResult, RetirementError};
use crate::traits::{Bug, BugTracker, BugViewer, RetirementChecker, WebFetch};

// ---------------------------------------------------------------------------
// ConcurrencyGauge
// ---------------------------------------------------------------------------

/// Tracks current and peak number of concurrent calls.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: Arc<AtomicUsize>,
    peak: AtomicUsize,
}

/// Decrements the gauge when the call finishes or is dropped mid-flight.
pub struct GaugeGuard {
    current: Arc<AtomicUsize>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyGauge {
    pub fn enter(&self) -> GaugeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard {
            current: Arc::clone(&self.current),
        }
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// FakeWeb
// ---------------------------------------------------------------------------

/// URL-keyed fake HTTP server. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct FakeWeb {
    pages: Mutex<HashMap<String, String>>,
    lengths: Mutex<HashMap<String, u64>>,
    requests: Mutex<Vec<String>>,
    delay: Duration,
    gauge: ConcurrencyGauge,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Serve `body` for GET requests of `url`.
    pub fn page(&self, url: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    /// Answer HEAD requests of `url` with a Content-Length of `length`.
    pub fn length(&self, url: &str, length: u64) {
        self.lengths.lock().unwrap().insert(url.to_string(), length);
    }

    /// Every URL requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Whether any request URL contains `needle`.
    pub fn requested(&self, needle: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|u| u.contains(needle))
    }

    pub fn gauge(&self) -> &ConcurrencyGauge {
        &self.gauge
    }

    async fn enter(&self, url: &str) -> GaugeGuard {
        let guard = self.gauge.enter();
        self.requests.lock().unwrap().push(url.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        guard
    }
}

#[async_trait]
impl WebFetch for FakeWeb {
    async fn get_text(&self, url: &str) -> ClientResult<String> {
        let _guard = self.enter(url).await;
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(url.to_string()))
    }

    async fn get_json(&self, url: &str) -> ClientResult<serde_json::Value> {
        let text = self.get_text(url).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn content_length(&self, url: &str) -> ClientResult<u64> {
        let _guard = self.enter(url).await;
        self.lengths
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .ok_or_else(|| ClientError::NotFound(url.to_string()))
    }
}

// ---------------------------------------------------------------------------
// FakeRetirement
// ---------------------------------------------------------------------------

/// Scripted retirement checker.
///
/// Packages are active unless marked `retired`; `unavailable` packages fail
/// as if the command could not be run; `stalled` packages never answer.
#[derive(Debug, Default)]
pub struct FakeRetirement {
    retired: HashSet<String>,
    unavailable: HashSet<String>,
    stalled: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    gauge: ConcurrencyGauge,
}

impl FakeRetirement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retired(mut self, package: &str) -> Self {
        self.retired.insert(package.to_string());
        self
    }

    pub fn unavailable(mut self, package: &str) -> Self {
        self.unavailable.insert(package.to_string());
        self
    }

    pub fn stalled(mut self, package: &str) -> Self {
        self.stalled.insert(package.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn gauge(&self) -> &ConcurrencyGauge {
        &self.gauge
    }
}

#[async_trait]
impl RetirementChecker for FakeRetirement {
    async fn is_retired(&self, package: &str) -> Result<bool, RetirementError> {
        let _guard = self.gauge.enter();
        self.calls.lock().unwrap().push(package.to_string());

        if self.unavailable.contains(package) {
            return Err(RetirementError::Unavailable {
                program: "koji".to_string(),
                reason: "No such file or directory (os error 2)".to_string(),
            });
        }
        if self.stalled.contains(package) {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.retired.contains(package))
    }
}

// ---------------------------------------------------------------------------
// FakeBugTracker
// ---------------------------------------------------------------------------

/// Fixed bug list, returned for any tracker.
#[derive(Debug, Default)]
pub struct FakeBugTracker {
    bugs: Vec<Bug>,
    queries: AtomicUsize,
}

impl FakeBugTracker {
    pub fn new(bugs: Vec<Bug>) -> Self {
        FakeBugTracker {
            bugs,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn with_bug(mut self, id: u64, component: &str, status: &str) -> Self {
        self.bugs.push(Bug {
            id,
            component: component.to_string(),
            status: status.to_string(),
            resolution: String::new(),
        });
        self
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BugTracker for FakeBugTracker {
    async fn blocking_bugs(&self, _tracker: u64) -> ClientResult<Vec<Bug>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut bugs = self.bugs.clone();
        bugs.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(bugs)
    }
}

// ---------------------------------------------------------------------------
// RecordingViewer
// ---------------------------------------------------------------------------

/// Remembers every URL it was asked to open, with the time of the call.
#[derive(Debug, Default)]
pub struct RecordingViewer {
    opened: Mutex<Vec<(String, Instant)>>,
    gauge: ConcurrencyGauge,
}

impl RecordingViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(u, _)| u.clone())
            .collect()
    }

    pub fn times(&self) -> Vec<Instant> {
        self.opened.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn gauge(&self) -> &ConcurrencyGauge {
        &self.gauge
    }
}

#[async_trait]
impl BugViewer for RecordingViewer {
    async fn open(&self, url: &str) -> ClientResult<()> {
        let _guard = self.gauge.enter();
        self.opened
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
        Ok(())
    }
}
