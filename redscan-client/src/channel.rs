//! WebSocket progress channel.
//!
//! At most one live connection at a time. Connecting with a new token tears
//! down the previous reader first; disconnecting twice is a no-op. The
//! channel never reconnects on its own: a dropped connection degrades
//! progress reporting and decides nothing about the scan outcome.
//!
//! Every signal is tagged with the token it was opened under, so a late
//! signal from a torn-down reader identifies itself and can be ignored.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use redscan_model::ids::ChannelToken;
use redscan_model::progress::ProgressEvent;

/// Lifecycle and payload signals emitted by a channel reader.
#[derive(Debug, Clone)]
pub enum ChannelSignal {
    Opened,
    Event(ProgressEvent),
    Error(String),
    Closed,
}

/// A signal tagged with the token its reader was opened under.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub token: ChannelToken,
    pub signal: ChannelSignal,
}

impl ChannelMessage {
    fn new(token: ChannelToken, signal: ChannelSignal) -> Self {
        Self { token, signal }
    }
}

/// Spawns reader tasks for progress endpoints.
///
/// Connection failures are reported through the signal stream, not returned;
/// a connector call itself never fails.
pub trait ChannelConnector: Send + Sync {
    /// Spawn a reader streaming progress for `token` into `tx`. The returned
    /// handle must stop the reader when aborted.
    fn spawn_reader(
        &self,
        token: ChannelToken,
        tx: mpsc::UnboundedSender<ChannelMessage>,
    ) -> JoinHandle<()>;
}

/// Real connector speaking the scan service's `/ws/scan/{token}` endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    ws_base: Url,
}

impl WsConnector {
    pub fn new(ws_base: Url) -> Self {
        Self { ws_base }
    }

    fn endpoint(&self, token: &ChannelToken) -> String {
        format!(
            "{}/ws/scan/{token}",
            self.ws_base.as_str().trim_end_matches('/')
        )
    }
}

impl ChannelConnector for WsConnector {
    fn spawn_reader(
        &self,
        token: ChannelToken,
        tx: mpsc::UnboundedSender<ChannelMessage>,
    ) -> JoinHandle<()> {
        let url = self.endpoint(&token);
        tokio::spawn(run_reader(url, token, tx))
    }
}

async fn run_reader(
    url: String,
    token: ChannelToken,
    tx: mpsc::UnboundedSender<ChannelMessage>,
) {
    debug!(%token, %url, "opening progress channel");

    let mut ws = match connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(err) => {
            warn!(%token, error = %err, "progress channel connect failed");
            let _ = tx.send(ChannelMessage::new(
                token,
                ChannelSignal::Error(err.to_string()),
            ));
            let _ = tx.send(ChannelMessage::new(token, ChannelSignal::Closed));
            return;
        }
    };

    if tx
        .send(ChannelMessage::new(token, ChannelSignal::Opened))
        .is_err()
    {
        // Receiver dropped before we even opened.
        let _ = ws.close(None).await;
        return;
    }

    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<ProgressEvent>(text.as_str()) {
                    Ok(event) => {
                        if tx
                            .send(ChannelMessage::new(
                                token,
                                ChannelSignal::Event(event),
                            ))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(err) => {
                        // Keep listening for valid frames.
                        debug!(%token, error = %err, "skipping unparseable progress frame");
                    }
                }
            }
            Some(Ok(Message::Close(_))) => break,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                let _ = tx.send(ChannelMessage::new(
                    token,
                    ChannelSignal::Error(err.to_string()),
                ));
                break;
            }
            None => break,
        }
    }

    let _ = tx.send(ChannelMessage::new(token, ChannelSignal::Closed));
    let _ = ws.close(None).await;
}

struct ActiveReader {
    token: ChannelToken,
    handle: JoinHandle<()>,
}

/// Owner of the single live progress connection.
pub struct ProgressChannel {
    connector: Arc<dyn ChannelConnector>,
    signals_tx: mpsc::UnboundedSender<ChannelMessage>,
    active: Option<ActiveReader>,
}

impl fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressChannel")
            .field("token", &self.current_token())
            .finish()
    }
}

impl ProgressChannel {
    /// Build a channel and the receiver its readers will feed.
    pub fn new(
        connector: Arc<dyn ChannelConnector>,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelMessage>) {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        (
            Self {
                connector,
                signals_tx,
                active: None,
            },
            signals_rx,
        )
    }

    /// Open the channel for `token`, closing whatever was open before.
    pub fn connect(&mut self, token: ChannelToken) {
        self.disconnect();
        let handle = self
            .connector
            .spawn_reader(token, self.signals_tx.clone());
        self.active = Some(ActiveReader { token, handle });
    }

    /// Tear down the live reader, if any. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(token = %active.token, "closing progress channel");
            active.handle.abort();
        }
    }

    pub fn current_token(&self) -> Option<&ChannelToken> {
        self.active.as_ref().map(|active| &active.token)
    }

    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for ProgressChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}
