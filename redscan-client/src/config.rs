//! Client configuration: service endpoints, timeouts, and agent label
//! overrides for the progress channel.

use std::collections::HashMap;
use std::time::Duration;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use redscan_model::stage::{Stage, StageCatalog};
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

const DEFAULT_CONFIG_LOCATIONS: &[&str] = &[
    "redscan.toml",
    "redscan.json",
    "config/redscan.toml",
    "config/redscan.json",
];

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base url parses")
}

/// Source that produced the client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClientConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Top-level client settings. Use these to point the client at a scan
/// service, tune the request timeout, and teach the progress channel about
/// renamed pipeline agents.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// HTTP base of the scan service, e.g. `http://127.0.0.1:8000`.
    pub base_url: Url,
    /// WebSocket base for progress streaming. Leave unset to derive it from
    /// `base_url` by swapping the scheme (`http` -> `ws`, `https` -> `wss`).
    pub ws_url: Option<Url>,
    /// Per-request timeout (seconds) for the scan service HTTP calls. Scans
    /// run long server-side; this only bounds each individual round trip.
    pub request_timeout_secs: u64,
    /// Delay (ms) before the progress channel is torn down after a scan
    /// completes, so trailing stage updates still land in the timeline.
    pub channel_grace_ms: u64,
    /// Extra agent-label-to-stage mappings layered over the built-in catalog.
    /// Keys are the labels as they appear on the wire.
    pub agent_labels: HashMap<String, Stage>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: None,
            request_timeout_secs: 30,
            channel_grace_ms: 1_000,
            agent_labels: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Load client configuration using environment variables.
    /// Evaluation order:
    /// 1) `$REDSCAN_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$REDSCAN_CONFIG_JSON` (inline JSON),
    /// 3) the first default config file that exists,
    /// 4) defaults if none is set.
    ///
    /// Individual `REDSCAN_*` variables then override whatever the file
    /// provided. A `.env` file is honoured when present.
    pub fn load_from_env() -> anyhow::Result<(Self, ClientConfigSource)> {
        dotenvy::dotenv().map(|_| true).or_else(|err| match err {
            dotenvy::Error::Io(_) => Ok(false),
            _ => Err(err),
        })?;

        let (mut config, source) = Self::load_base()?;
        config.apply_env_overrides()?;
        Ok((config, source))
    }

    fn load_base() -> anyhow::Result<(Self, ClientConfigSource)> {
        if let Ok(path_str) = env::var("REDSCAN_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, ClientConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var("REDSCAN_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .context("failed to parse REDSCAN_CONFIG_JSON")?;
            return Ok((parsed, ClientConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let config = Self::load_from_file(&path)?;
            return Ok((config, ClientConfigSource::File(path)));
        }

        Ok((Self::default(), ClientConfigSource::Default))
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(raw) = env::var("REDSCAN_BASE_URL")
            && !raw.trim().is_empty()
        {
            self.base_url = Url::parse(raw.trim())
                .with_context(|| format!("invalid REDSCAN_BASE_URL {raw:?}"))?;
        }

        if let Ok(raw) = env::var("REDSCAN_WS_URL")
            && !raw.trim().is_empty()
        {
            let url = Url::parse(raw.trim())
                .with_context(|| format!("invalid REDSCAN_WS_URL {raw:?}"))?;
            self.ws_url = Some(url);
        }

        if let Ok(raw) = env::var("REDSCAN_REQUEST_TIMEOUT")
            && !raw.trim().is_empty()
        {
            let parsed = humantime::parse_duration(raw.trim()).with_context(
                || format!("invalid REDSCAN_REQUEST_TIMEOUT {raw:?}"),
            )?;
            self.request_timeout_secs = parsed.as_secs().max(1);
        }

        if let Ok(raw) = env::var("REDSCAN_CHANNEL_GRACE")
            && !raw.trim().is_empty()
        {
            let parsed = humantime::parse_duration(raw.trim()).with_context(
                || format!("invalid REDSCAN_CHANNEL_GRACE {raw:?}"),
            )?;
            self.channel_grace_ms = parsed.as_millis() as u64;
        }

        Ok(())
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read client config from {}", path.display())
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid client config {}", path.display())
            }),
            Some("toml") | Some("tml") => {
                toml::from_str(&contents).map_err(|err| {
                    anyhow!("invalid client config {}: {}", path.display(), err)
                })
            }
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    pub fn parse_from_str(
        contents: &str,
        origin: &str,
    ) -> anyhow::Result<Self> {
        // Try TOML first, then JSON for convenience.
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse client config {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| anyhow!("invalid client config json: {err}"))
    }

    fn find_default_file() -> Option<PathBuf> {
        DEFAULT_CONFIG_LOCATIONS
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(|path| path.to_path_buf())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn channel_grace(&self) -> Duration {
        Duration::from_millis(self.channel_grace_ms)
    }

    /// WebSocket base to build progress endpoints from.
    pub fn ws_base(&self) -> anyhow::Result<Url> {
        if let Some(url) = &self.ws_url {
            return Ok(url.clone());
        }

        let mut derived = self.base_url.clone();
        let scheme = match derived.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(anyhow!(
                    "cannot derive websocket url from scheme {other:?}"
                ));
            }
        };
        derived
            .set_scheme(scheme)
            .map_err(|()| anyhow!("cannot derive websocket url from {}", self.base_url))?;
        Ok(derived)
    }

    /// Stage catalog with configured label overrides applied.
    pub fn catalog(&self) -> StageCatalog {
        let mut catalog = StageCatalog::new();
        for (label, stage) in &self.agent_labels {
            catalog = catalog.with_label(label.clone(), *stage);
        }
        catalog
    }
}
