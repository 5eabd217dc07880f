//! Access to qBittorrent's application preferences over its Web UI API.
//!
//! Updates are read-modify-write of the whole preferences object: the
//! current document is fetched, one key is changed and everything is
//! posted back, so keys this daemon knows nothing about survive intact.

use async_trait::async_trait;
use log::info;
use serde_json::Value;

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::types::{PreferencesDocument, PreferencesSnapshot};

const PREFERENCES_PATH: &str = "/api/v2/app/preferences";
const SET_PREFERENCES_PATH: &str = "/api/v2/app/setPreferences";

#[async_trait]
pub trait PreferencesApi: Send + Sync {
    /// Fetch the complete preferences document.
    async fn get_all_preferences(&self) -> Result<PreferencesDocument>;

    /// Replace the client's preferences with `prefs`.
    async fn set_preferences(&self, prefs: &PreferencesDocument) -> Result<()>;

    async fn get_current_preferences(&self) -> Result<PreferencesSnapshot> {
        let prefs = self.get_all_preferences().await?;
        let snapshot = snapshot_from_document(&prefs)?;
        info!(
            "qBittorrent current preferences: listen_port={} announce_ip={} announce_port={}",
            snapshot.listen_port, snapshot.announce_ip, snapshot.announce_port
        );
        Ok(snapshot)
    }

    async fn update_announce_port(&self, port: u16) -> Result<()> {
        let mut prefs = self.get_all_preferences().await?;
        prefs.insert("announce_port".to_string(), Value::from(port));
        self.set_preferences(&prefs).await
    }

    async fn update_announce_ip(&self, ip: &str) -> Result<()> {
        let mut prefs = self.get_all_preferences().await?;
        prefs.insert("announce_ip".to_string(), Value::from(ip));
        self.set_preferences(&prefs).await
    }
}

/// Pull the three fields the reconciler needs out of a full document.
pub fn snapshot_from_document(prefs: &PreferencesDocument) -> Result<PreferencesSnapshot> {
    let announce_ip = prefs
        .get("announce_ip")
        .and_then(Value::as_str)
        .ok_or(SyncError::Schema {
            field: "announce_ip",
        })?
        .to_string();
    Ok(PreferencesSnapshot {
        announce_ip,
        announce_port: port_field(prefs, "announce_port")?,
        listen_port: port_field(prefs, "listen_port")?,
    })
}

fn port_field(prefs: &PreferencesDocument, field: &'static str) -> Result<u16> {
    prefs
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or(SyncError::Schema { field })
}

/// [`PreferencesApi`] backed by a real qBittorrent Web UI.
pub struct QbittorrentClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

async fn check_response(url: &str, r: reqwest::Response) -> Result<reqwest::Response> {
    let status = r.status();
    if status.is_success() {
        return Ok(r);
    }
    Err(SyncError::HttpStatus {
        url: url.to_string(),
        status,
    })
}

impl QbittorrentClient {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Ok(Self {
            client: reqwest::ClientBuilder::new().build()?,
            base_url: config.webui_base_url.clone(),
            credentials: config
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, pass)) => request.basic_auth(user, Some(pass)),
            None => request,
        }
    }
}

#[async_trait]
impl PreferencesApi for QbittorrentClient {
    async fn get_all_preferences(&self) -> Result<PreferencesDocument> {
        let url = self.url(PREFERENCES_PATH);
        info!("Getting current preferences from qBittorrent at endpoint {}", url);

        let transport = |source| SyncError::Transport {
            url: url.clone(),
            source,
        };
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(transport)?;
        let body = check_response(&url, response)
            .await?
            .bytes()
            .await
            .map_err(transport)?;
        serde_json::from_slice(&body).map_err(|source| SyncError::Json {
            url: url.clone(),
            source,
        })
    }

    async fn set_preferences(&self, prefs: &PreferencesDocument) -> Result<()> {
        let url = self.url(SET_PREFERENCES_PATH);
        let json = serde_json::to_string(prefs).map_err(|source| SyncError::Json {
            url: url.clone(),
            source,
        })?;

        // The body is not inspected; callers verify by reading preferences back.
        let response = self
            .authorize(self.client.post(&url))
            .form(&[("json", json)])
            .send()
            .await
            .map_err(|source| SyncError::Transport {
                url: url.clone(),
                source,
            })?;
        check_response(&url, response).await?;
        Ok(())
    }
}
