//! Shared harness pieces for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock, mpsc, watch};
use tokio::task::JoinHandle;

use redscan_client::api::{ScanApi, ScanVerdict};
use redscan_client::channel::{
    ChannelConnector, ChannelMessage, ChannelSignal,
};
use redscan_client::error::{Result, ScanError};
use redscan_client::session::ScanSession;
use redscan_model::finding::Finding;
use redscan_model::ids::{ChannelToken, ScanId};
use redscan_model::progress::ProgressEvent;
use redscan_model::scan::{ScanListEntry, ScanRequest, ScanResponse};

/// Scriptable [`ScanApi`] for coordinator tests.
///
/// Outcomes are queued per target id, so interleaved attempts against
/// different targets resolve to their own scripts regardless of task
/// scheduling. With the gate raised, every verdict waits until the test
/// releases it, which makes in-flight interleavings deterministic.
#[derive(Clone, Default)]
pub struct StubScanApi {
    inner: Arc<RwLock<StubState>>,
    release: Arc<Notify>,
}

#[derive(Default)]
struct StubState {
    outcomes: HashMap<String, VecDeque<Result<ScanVerdict>>>,
    gated: bool,
    requests: Vec<ScanRequest>,
}

impl StubScanApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful verdict for scans against `target_id`.
    pub async fn script_success(&self, target_id: &str, verdict: ScanVerdict) {
        self.inner
            .write()
            .await
            .outcomes
            .entry(target_id.to_string())
            .or_default()
            .push_back(Ok(verdict));
    }

    /// Queue a failure for scans against `target_id`.
    pub async fn script_failure(&self, target_id: &str, error: ScanError) {
        self.inner
            .write()
            .await
            .outcomes
            .entry(target_id.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Hold every subsequent verdict until [`StubScanApi::release_one`].
    pub async fn gate(&self) {
        self.inner.write().await.gated = true;
    }

    /// Let one held verdict resolve.
    pub fn release_one(&self) {
        self.release.notify_one();
    }

    /// Requests received so far, in arrival order.
    pub async fn requests(&self) -> Vec<ScanRequest> {
        self.inner.read().await.requests.clone()
    }
}

#[async_trait]
impl ScanApi for StubScanApi {
    async fn start_scan(&self, request: ScanRequest) -> Result<ScanVerdict> {
        let gated = {
            let mut state = self.inner.write().await;
            state.requests.push(request.clone());
            state.gated
        };
        if gated {
            self.release.notified().await;
        }

        let mut state = self.inner.write().await;
        state
            .outcomes
            .get_mut(&request.target_id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| {
                Err(ScanError::RequestFailed {
                    detail: format!(
                        "no scripted outcome for {}",
                        request.target_id
                    ),
                })
            })
    }

    async fn fetch_scan(&self, id: ScanId) -> Result<ScanResponse> {
        Err(ScanError::RequestFailed {
            detail: format!("no stored scan {id}"),
        })
    }

    async fn list_scans(&self) -> Result<Vec<ScanListEntry>> {
        Ok(Vec::new())
    }

    async fn download_report(&self, id: ScanId) -> Result<Vec<u8>> {
        Err(ScanError::RequestFailed {
            detail: format!("no report for {id}"),
        })
    }
}

/// [`ChannelConnector`] stub whose readers park until aborted.
///
/// Records which tokens were connected and which readers have been torn
/// down, and lets tests inject signals as if a reader had produced them.
#[derive(Clone, Default)]
pub struct TestConnector {
    state: Arc<StdMutex<ConnectorState>>,
}

#[derive(Default)]
struct ConnectorState {
    connected: Vec<ChannelToken>,
    torn_down: Vec<ChannelToken>,
    tx: Option<mpsc::UnboundedSender<ChannelMessage>>,
}

impl TestConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens passed to `spawn_reader`, in connection order.
    pub fn connected_tokens(&self) -> Vec<ChannelToken> {
        self.state.lock().unwrap().connected.clone()
    }

    /// Tokens whose readers have been aborted, in teardown order.
    pub fn torn_down_tokens(&self) -> Vec<ChannelToken> {
        self.state.lock().unwrap().torn_down.clone()
    }

    /// Inject a progress event tagged with `token`.
    pub fn emit(&self, token: ChannelToken, event: ProgressEvent) {
        self.emit_signal(token, ChannelSignal::Event(event));
    }

    /// Inject an arbitrary signal tagged with `token`.
    pub fn emit_signal(&self, token: ChannelToken, signal: ChannelSignal) {
        let state = self.state.lock().unwrap();
        if let Some(tx) = &state.tx {
            let _ = tx.send(ChannelMessage { token, signal });
        }
    }
}

impl ChannelConnector for TestConnector {
    fn spawn_reader(
        &self,
        token: ChannelToken,
        tx: mpsc::UnboundedSender<ChannelMessage>,
    ) -> JoinHandle<()> {
        let _ = tx.send(ChannelMessage {
            token,
            signal: ChannelSignal::Opened,
        });

        let mut state = self.state.lock().unwrap();
        state.connected.push(token);
        state.tx = Some(tx);
        drop(state);

        let guard = TeardownGuard {
            token,
            state: Arc::clone(&self.state),
        };
        tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await
        })
    }
}

/// Records reader teardown when the parked task is aborted and dropped.
struct TeardownGuard {
    token: ChannelToken,
    state: Arc<StdMutex<ConnectorState>>,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.torn_down.push(self.token);
        }
    }
}

/// Wait until the published session satisfies `predicate`, or panic after a
/// generous timeout.
pub async fn wait_for(
    rx: &mut watch::Receiver<ScanSession>,
    predicate: impl Fn(&ScanSession) -> bool,
) -> ScanSession {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let current = rx.borrow_and_update();
                if predicate(&current) {
                    return current.clone();
                }
            }
            if rx.changed().await.is_err() {
                panic!("coordinator update stream closed while waiting");
            }
        }
    })
    .await
    .expect("timed out waiting for a matching session snapshot")
}

/// Let the coordinator drain everything already in flight.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Successful verdict with the usual service fields filled in.
pub fn verdict(scan_id: ScanId, results: Vec<Finding>) -> ScanVerdict {
    ScanVerdict {
        scan_id,
        results,
        report_url: Some(format!("/scan/{scan_id}/report")),
        timestamp: Some("2026-08-23T17:06:12.123456".to_string()),
        target_url: Some("http://localhost:9000/chat".to_string()),
    }
}

pub fn finding(json: &str) -> Finding {
    serde_json::from_str(json).expect("test finding json")
}

pub fn progress(json: &str) -> ProgressEvent {
    serde_json::from_str(json).expect("test progress json")
}
