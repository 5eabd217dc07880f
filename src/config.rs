use clap::Parser;
use figment::{
    error::Kind,
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "qbit-natpmp.toml";
const DEFAULT_JSON_FILE: &str = "qbit-natpmp.json";
const ENV_PREFIX: &str = "QBIT_NATPMP_";
const PASSWORD_FILE_ENV: &str = "QBIT_NATPMP_PASSWORD_FILE";
const CREDENTIAL_KEYS: [&str; 2] = ["username", "password"];

pub const DEFAULT_SLEEP_TIME: u64 = 30;
pub const DEFAULT_NATPMPC_PATH: &str = "natpmpc";

/// Command-line flags. Anything left unset falls through to the
/// environment, the config files and finally the built-in defaults.
#[derive(Debug, Default, Parser, Serialize)]
#[command(version, about)]
pub struct CliArgs {
    /// qBittorrent Web UI base URL
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webui_base_url: Option<String>,

    /// Wireguard far gateway IP address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wg_gateway_ip: Option<Ipv4Addr>,

    /// qBittorrent Web UI username
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// qBittorrent Web UI password
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Interval (integer in seconds) to run NAT-PMP
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_time: Option<u64>,

    /// Path to the natpmpc binary
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natpmpc_path: Option<String>,

    /// TOML config file to load instead of ./qbit-natpmp.toml
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("failed to load configuration: {0}")]
    Invalid(#[from] figment::Error),
    #[error("sleep_time must be a positive number of seconds")]
    ZeroInterval,
    #[error("invalid webui_base_url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to read password file {path:?}: {source}")]
    PasswordFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Deserialize)]
pub struct Config {
    pub webui_base_url: String,
    pub wg_gateway_ip: Ipv4Addr,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub password: Option<String>,
    pub sleep_time: u64,
    pub natpmpc_path: String,
}

// Config files may hold bare numbers or booleans, e.g. `password = 123456`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    UInt(u64),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|v| match v {
        Scalar::Str(s) => s,
        Scalar::UInt(n) => n.to_string(),
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("webui_base_url", &self.webui_base_url)
            .field("wg_gateway_ip", &self.wg_gateway_ip)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("sleep_time", &self.sleep_time)
            .field("natpmpc_path", &self.natpmpc_path)
            .finish()
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let toml_file = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut figment = Figment::new()
            .merge(Serialized::default("sleep_time", DEFAULT_SLEEP_TIME))
            .merge(Serialized::default("natpmpc_path", DEFAULT_NATPMPC_PATH))
            .merge(Toml::file(toml_file))
            .merge(Json::file(DEFAULT_JSON_FILE))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&CREDENTIAL_KEYS));

        // Credentials are taken verbatim, typed parsing would turn "007" into 7.
        for key in CREDENTIAL_KEYS {
            let var = format!("{}{}", ENV_PREFIX, key.to_uppercase());
            if let Ok(value) = std::env::var(var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        let extracted = figment
            .merge(Serialized::defaults(cli))
            .extract::<Config>();

        let mut config = match extracted {
            Ok(config) => config,
            Err(e) => {
                if let Kind::MissingField(field) = &e.kind {
                    match field.as_ref() {
                        "webui_base_url" => return Err(ConfigError::Missing("Web UI base URL")),
                        "wg_gateway_ip" => {
                            return Err(ConfigError::Missing("Wireguard gateway IP address"))
                        }
                        _ => {}
                    }
                }
                return Err(e.into());
            }
        };

        // Support Docker-style secrets
        if let Some(path) = std::env::var_os(PASSWORD_FILE_ENV) {
            let path = PathBuf::from(path);
            let secret = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::PasswordFile { path, source })?;
            config.password = Some(secret.trim().to_string());
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.webui_base_url.is_empty() {
            return Err(ConfigError::Missing("Web UI base URL"));
        }
        if self.sleep_time == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        let url = reqwest::Url::parse(&self.webui_base_url).map_err(|e| {
            ConfigError::InvalidUrl {
                url: self.webui_base_url.clone(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.webui_base_url.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }

        // Endpoints are appended as "/api/v2/...".
        let trimmed = self.webui_base_url.trim_end_matches('/').len();
        self.webui_base_url.truncate(trimmed);
        Ok(())
    }

    /// Basic auth is only sent when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}
