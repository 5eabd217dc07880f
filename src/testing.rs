//! In-memory stand-ins for the Web UI and natpmpc used by unit tests.

use std::io;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::mapper::PortMapper;
use crate::preferences::{snapshot_from_document, PreferencesApi};
use crate::types::{PreferencesDocument, PreferencesSnapshot, Protocol};

pub fn test_config() -> Config {
    Config {
        webui_base_url: "http://127.0.0.1:8080".to_string(),
        wg_gateway_ip: Ipv4Addr::new(10, 2, 0, 1),
        username: None,
        password: None,
        sleep_time: 30,
        natpmpc_path: "natpmpc".to_string(),
    }
}

/// Output shaped like a successful `natpmpc -a` run.
pub fn natpmpc_output(public_ip: &str, public_port: u16, protocol: Protocol) -> String {
    format!(
        "initnatpmp() returned 0 (SUCCESS)
using gateway : 10.2.0.1
sendpublicaddressrequest returned 2 (SUCCESS)
readnatpmpresponseorretry returned 0 (OK)
Public IP address : {public_ip}
epoch = 58211
sendnewportmappingrequest returned 12 (SUCCESS)
readnatpmpresponseorretry returned 0 (OK)
Mapped public port {public_port} protocol {protocol} to local port 0 lifetime 60
epoch = 58211
closenatpmp() returned 0 (SUCCESS)
"
    )
}

#[derive(Default)]
struct PreferencesState {
    prefs: PreferencesDocument,
    reads: usize,
    writes: Vec<PreferencesDocument>,
    /// Reads beyond this many fail.
    fail_reads_after: Option<usize>,
    fail_writes: bool,
    ignore_writes: bool,
}

#[derive(Clone, Default)]
pub struct FakePreferences {
    state: Arc<Mutex<PreferencesState>>,
}

impl FakePreferences {
    pub fn new(announce_ip: &str, announce_port: u16, listen_port: u16) -> Self {
        let prefs = match json!({
            "announce_ip": announce_ip,
            "announce_port": announce_port,
            "dht": true,
            "listen_port": listen_port,
            "save_path": "/downloads",
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let state = PreferencesState {
            prefs,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Let the first `n` reads through and fail every one after that.
    pub fn fail_reads_after(&self, n: usize) {
        self.state.lock().unwrap().fail_reads_after = Some(n);
    }

    /// Reject writes with an error, leaving preferences untouched.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// Accept writes without applying them, like a client that rejects a value.
    pub fn ignore_writes(&self, ignore: bool) {
        self.state.lock().unwrap().ignore_writes = ignore;
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn writes(&self) -> Vec<PreferencesDocument> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn snapshot(&self) -> PreferencesSnapshot {
        snapshot_from_document(&self.state.lock().unwrap().prefs).unwrap()
    }
}

#[async_trait]
impl PreferencesApi for FakePreferences {
    async fn get_all_preferences(&self) -> Result<PreferencesDocument> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        if state.fail_reads_after.is_some_and(|n| state.reads > n) {
            return Err(SyncError::Schema {
                field: "announce_ip",
            });
        }
        Ok(state.prefs.clone())
    }

    async fn set_preferences(&self, prefs: &PreferencesDocument) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(SyncError::HttpStatus {
                url: "http://127.0.0.1:8080/api/v2/app/setPreferences".to_string(),
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        state.writes.push(prefs.clone());
        if !state.ignore_writes {
            state.prefs = prefs.clone();
        }
        Ok(())
    }
}

/// Returns canned output per protocol; `None` behaves like natpmpc failing to run.
#[derive(Clone, Default)]
pub struct FakeMapper {
    tcp: Option<String>,
    udp: Option<String>,
    calls: Arc<Mutex<Vec<(Ipv4Addr, u16, Protocol)>>>,
}

impl FakeMapper {
    pub fn new(tcp: Option<String>, udp: Option<String>) -> Self {
        Self {
            tcp,
            udp,
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> Vec<(Ipv4Addr, u16, Protocol)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PortMapper for FakeMapper {
    async fn request_mapping(
        &self,
        gateway: Ipv4Addr,
        internal_port: u16,
        protocol: Protocol,
    ) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((gateway, internal_port, protocol));
        let output = match protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        };
        output.clone().ok_or_else(|| SyncError::Spawn {
            program: "natpmpc".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "natpmpc not found"),
        })
    }
}
