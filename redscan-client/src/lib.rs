//! Headless client core for the Redscan dashboard.
//!
//! This crate drives one AI vulnerability scan at a time against the Redscan
//! service: it submits the scan over HTTP, follows pipeline progress over a
//! WebSocket, folds both into a single [`session::ScanSession`] snapshot
//! stream, and projects snapshots into display form. It renders nothing
//! itself; shells (desktop, TUI, web) subscribe to the coordinator and draw
//! whatever [`render::render`] tells them.
//!
//! The usual wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//! use redscan_client::{ClientConfig, Coordinator, TokenCell};
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let (config, _source) = ClientConfig::load_from_env()?;
//! let credentials = TokenCell::new();
//! credentials.set(Some("bearer-token".to_string())).await;
//!
//! let handle = Coordinator::connect(&config, Arc::new(credentials))?;
//! handle.start("llm_001")?;
//!
//! let mut updates = handle.subscribe();
//! while updates.changed().await.is_ok() {
//!     let view = redscan_client::render::render(&updates.borrow_and_update());
//!     // hand `view` to the shell
//!     # drop(view);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod channel;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod render;
pub mod session;

// Intentionally curated re-exports for downstream consumers.
pub use api::{ScanApi, ScanClient, ScanVerdict};
pub use channel::{
    ChannelConnector, ChannelMessage, ChannelSignal, ProgressChannel,
    WsConnector,
};
pub use config::{ClientConfig, ClientConfigSource};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorHandle};
pub use credentials::{CredentialProvider, StaticCredentials, TokenCell};
pub use error::{Result, ScanError, SessionFailure};
pub use render::{
    FindingView, ReportRef, ScanSummary, ScanView, render, report_reference,
};
pub use session::ScanSession;

pub use redscan_model as model;
