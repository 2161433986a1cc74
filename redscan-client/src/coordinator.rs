//! Scan session coordinator.
//!
//! One actor task owns the session state, the progress channel, and the
//! in-flight request. Shells talk to it through a cloneable
//! [`CoordinatorHandle`] and observe it through a `watch` channel of
//! [`ScanSession`] snapshots, so every observer sees the same atomic state.
//!
//! Concurrency is resolved by generation counting: each attempt gets a fresh
//! generation, and verdicts or timers produced on behalf of an older
//! generation are discarded when they finally arrive.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use redscan_model::{
    ids::ChannelToken, scan::ScanRequest, session::SessionStatus,
    stage::StageCatalog,
};

use crate::api::{ScanApi, ScanClient, ScanVerdict};
use crate::channel::{
    ChannelConnector, ChannelMessage, ChannelSignal, ProgressChannel,
    WsConnector,
};
use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;
use crate::error::{Result, ScanError};
use crate::session::ScanSession;

/// Commands a handle can send to the coordinator task.
#[derive(Debug)]
enum Command {
    /// Begin a new scan, superseding any attempt in flight.
    Start { request: ScanRequest },
    /// Cancel the attempt in flight, if any.
    Cancel,
}

/// Messages the coordinator sends itself from spawned work.
#[derive(Debug)]
enum InternalMsg {
    /// The scan request resolved for the tagged generation.
    Verdict {
        generation: u64,
        outcome: Result<ScanVerdict>,
    },
    /// The post-success grace window for the tagged generation elapsed.
    GraceElapsed { generation: u64 },
}

/// Tuning for a spawned coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maps progress agent labels onto timeline stages.
    pub catalog: StageCatalog,
    /// How long the progress channel stays open after a successful verdict,
    /// letting the re-keyed connection drain trailing frames.
    pub channel_grace: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            catalog: StageCatalog::new(),
            channel_grace: Duration::from_millis(1_000),
        }
    }
}

impl From<&ClientConfig> for CoordinatorConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            catalog: config.catalog(),
            channel_grace: config.channel_grace(),
        }
    }
}

/// The coordinator actor. Constructed through [`Coordinator::spawn`]; all
/// interaction goes through the returned handle.
pub struct Coordinator {
    api: Arc<dyn ScanApi>,
    session: ScanSession,
    channel: ProgressChannel,
    catalog: StageCatalog,
    channel_grace: Duration,
    updates_tx: watch::Sender<ScanSession>,
    internal_tx: mpsc::UnboundedSender<InternalMsg>,
}

impl Coordinator {
    /// Spawn a coordinator over the given service and channel connector.
    pub fn spawn(
        api: Arc<dyn ScanApi>,
        connector: Arc<dyn ChannelConnector>,
        config: CoordinatorConfig,
    ) -> CoordinatorHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = watch::channel(ScanSession::idle());
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (channel, signals_rx) = ProgressChannel::new(connector);

        let actor = Coordinator {
            api,
            session: ScanSession::idle(),
            channel,
            catalog: config.catalog,
            channel_grace: config.channel_grace,
            updates_tx,
            internal_tx,
        };
        tokio::spawn(actor.run(command_rx, signals_rx, internal_rx));

        CoordinatorHandle {
            command_tx,
            updates_rx,
        }
    }

    /// Wire a coordinator to the real service described by `config`.
    pub fn connect(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> anyhow::Result<CoordinatorHandle> {
        let api = Arc::new(ScanClient::new(config, credentials)?);
        let connector = Arc::new(WsConnector::new(config.ws_base()?));
        Ok(Self::spawn(api, connector, CoordinatorConfig::from(config)))
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut signals: mpsc::UnboundedReceiver<ChannelMessage>,
        mut internal: mpsc::UnboundedReceiver<InternalMsg>,
    ) {
        loop {
            tokio::select! {
                maybe_command = commands.recv() => {
                    match maybe_command {
                        Some(Command::Start { request }) => self.handle_start(request),
                        Some(Command::Cancel) => self.handle_cancel(),
                        // Every handle dropped; shut down.
                        None => break,
                    }
                }
                Some(message) = signals.recv() => {
                    self.handle_signal(message);
                }
                Some(message) = internal.recv() => {
                    match message {
                        InternalMsg::Verdict { generation, outcome } => {
                            self.handle_verdict(generation, outcome);
                        }
                        InternalMsg::GraceElapsed { generation } => {
                            self.handle_grace(generation);
                        }
                    }
                }
            }
        }

        self.channel.disconnect();
    }

    fn handle_start(&mut self, request: ScanRequest) {
        if self.session.status.is_active() {
            info!(
                generation = self.session.generation,
                "superseding scan in flight"
            );
        }

        let token = self.session.begin(request.target_id.clone());
        self.publish();
        self.channel.connect(token);

        let api = Arc::clone(&self.api);
        let internal_tx = self.internal_tx.clone();
        let generation = self.session.generation;
        tokio::spawn(async move {
            let outcome = api.start_scan(request).await;
            if internal_tx
                .send(InternalMsg::Verdict {
                    generation,
                    outcome,
                })
                .is_err()
            {
                debug!("coordinator gone before the verdict arrived");
            }
        });
    }

    fn handle_cancel(&mut self) {
        if self.session.cancel() {
            info!(generation = self.session.generation, "scan cancelled");
            self.channel.disconnect();
            self.publish();
        } else {
            debug!("cancel with no scan in flight");
        }
    }

    fn handle_signal(&mut self, message: ChannelMessage) {
        match message.signal {
            ChannelSignal::Event(event) => {
                if self
                    .session
                    .apply_progress(message.token, &event, &self.catalog)
                {
                    self.publish();
                }
            }
            ChannelSignal::Error(error) => {
                // Progress is best-effort; only the request outcome can end
                // the session.
                warn!(token = %message.token, %error, "progress channel degraded");
            }
            ChannelSignal::Opened => {
                debug!(token = %message.token, "progress channel open");
            }
            ChannelSignal::Closed => {
                debug!(token = %message.token, "progress channel closed");
            }
        }
    }

    fn handle_verdict(&mut self, generation: u64, outcome: Result<ScanVerdict>) {
        if generation != self.session.generation
            || self.session.status.is_terminal()
        {
            // Superseded or cancelled while the request was in flight.
            debug!(generation, "discarding verdict for a stale attempt");
            return;
        }

        match outcome {
            Ok(verdict) => {
                self.session.assign_scan_id(verdict.scan_id);
                // Re-key the channel to the assigned id so final frames
                // addressed to it are still received during the grace window.
                self.channel.connect(ChannelToken::from(verdict.scan_id));
                self.session.succeed(verdict.results);
                self.publish();

                let internal_tx = self.internal_tx.clone();
                let grace = self.channel_grace;
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    let _ = internal_tx
                        .send(InternalMsg::GraceElapsed { generation });
                });
            }
            Err(err) => {
                warn!(error = %err, "scan request failed");
                self.channel.disconnect();
                self.session.fail(err.into());
                self.publish();
            }
        }
    }

    fn handle_grace(&mut self, generation: u64) {
        if generation == self.session.generation
            && self.session.status == SessionStatus::Succeeded
        {
            self.channel.disconnect();
        }
    }

    fn publish(&self) {
        let _ = self.updates_tx.send(self.session.clone());
    }
}

/// Cloneable handle to a spawned [`Coordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    command_tx: mpsc::UnboundedSender<Command>,
    updates_rx: watch::Receiver<ScanSession>,
}

impl CoordinatorHandle {
    /// Start a scan against `target_id` as an LLM target.
    pub fn start(&self, target_id: impl Into<String>) -> Result<()> {
        self.start_request(ScanRequest::llm(target_id))
    }

    /// Start a scan with a fully specified request, superseding any attempt
    /// in flight.
    pub fn start_request(&self, request: ScanRequest) -> Result<()> {
        self.command_tx
            .send(Command::Start { request })
            .map_err(|_| ScanError::CoordinatorStopped)
    }

    /// Cancel the attempt in flight. Cancelling an idle or finished session
    /// changes nothing.
    pub fn cancel(&self) -> Result<()> {
        self.command_tx
            .send(Command::Cancel)
            .map_err(|_| ScanError::CoordinatorStopped)
    }

    /// Latest published session snapshot.
    pub fn current(&self) -> ScanSession {
        self.updates_rx.borrow().clone()
    }

    /// Watch receiver over session snapshots.
    pub fn subscribe(&self) -> watch::Receiver<ScanSession> {
        self.updates_rx.clone()
    }

    /// Session snapshots as an async stream.
    pub fn updates(&self) -> WatchStream<ScanSession> {
        WatchStream::new(self.updates_rx.clone())
    }
}
