//! One mapping cycle: read qBittorrent's preferences, renew the NAT-PMP
//! mappings for its listen port and push the public address/port back
//! into the announce settings when they drifted.
//!
//! Every failure is logged and ends the cycle early. Nothing is retried
//! here; the scheduler simply runs the next cycle on the next tick.

use std::net::Ipv4Addr;

use log::{error, info, warn};

use crate::config::Config;
use crate::error::SyncError;
use crate::mapper::PortMapper;
use crate::parser::{parse_public_ip, parse_public_port};
use crate::preferences::PreferencesApi;
use crate::types::{MappingResult, PreferencesSnapshot, Protocol};

/// What happened to one announce setting during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    Unchanged,
    Updated,
    UpdateFailed,
    /// The update was sent but preferences could not be read back.
    VerifyFailed,
    /// The read-back value differs from what was written.
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Aborted,
    Completed {
        port: FieldOutcome,
        ip: FieldOutcome,
        /// TCP and UDP came back with different public ports.
        ports_disagree: bool,
    },
}

pub struct Reconciler<P, M> {
    prefs: P,
    mapper: M,
    gateway: Ipv4Addr,
}

/// When TCP and UDP disagree the UDP port wins, it is the last mapping
/// the gateway handed out. The flag reports whether they disagreed.
pub fn resolve_public_port(tcp: u16, udp: u16) -> (u16, bool) {
    if tcp != udp {
        warn!(
            "Warning: public ports for TCP and UDP do not match: TCP={}, UDP={}",
            tcp, udp
        );
        return (udp, true);
    }
    (tcp, false)
}

impl<P, M> Reconciler<P, M>
where
    P: PreferencesApi,
    M: PortMapper,
{
    pub fn new(config: &Config, prefs: P, mapper: M) -> Self {
        Self {
            prefs,
            mapper,
            gateway: config.wg_gateway_ip,
        }
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        let current = match self.prefs.get_current_preferences().await {
            Ok(current) => current,
            Err(e) => {
                error!("Error getting current preferences: {}", e);
                return CycleOutcome::Aborted;
            }
        };

        // Both mappings are requested before either output is parsed.
        let Some(tcp_output) = self.request(current.listen_port, Protocol::Tcp).await else {
            return CycleOutcome::Aborted;
        };
        let Some(udp_output) = self.request(current.listen_port, Protocol::Udp).await else {
            return CycleOutcome::Aborted;
        };

        let Some(tcp) = parse_mapping(Protocol::Tcp, &tcp_output) else {
            return CycleOutcome::Aborted;
        };
        let udp_port = match parse_public_port(&udp_output) {
            Ok(port) => port,
            Err(e) => {
                error!("Error parsing public port from UDP output: {}", e);
                return CycleOutcome::Aborted;
            }
        };

        info!(
            "{} mapping: public address {}:{}",
            tcp.protocol, tcp.public_ip, tcp.mapped_port
        );
        let (public_port, ports_disagree) = resolve_public_port(tcp.mapped_port, udp_port);
        let port = self.sync_port(&current, public_port).await;
        let ip = self.sync_ip(&current, &tcp.public_ip).await;
        CycleOutcome::Completed {
            port,
            ip,
            ports_disagree,
        }
    }

    async fn request(&self, listen_port: u16, protocol: Protocol) -> Option<String> {
        match self
            .mapper
            .request_mapping(self.gateway, listen_port, protocol)
            .await
        {
            Ok(output) => Some(output),
            Err(e) => {
                error!("Error running natpmpc for {}: {}", protocol, e);
                None
            }
        }
    }

    async fn sync_port(&self, current: &PreferencesSnapshot, public_port: u16) -> FieldOutcome {
        if public_port == current.announce_port {
            info!("There was no change needed to the announce_port. Leaving announce_port the same.");
            return FieldOutcome::Unchanged;
        }

        info!(
            "Updating announce port from {} to {}",
            current.announce_port, public_port
        );
        if let Err(e) = self.prefs.update_announce_port(public_port).await {
            error!("Error updating announce port: {}", e);
            return FieldOutcome::UpdateFailed;
        }

        match self.prefs.get_current_preferences().await {
            Err(e) => {
                error!("Error getting current preferences after update: {}", e);
                FieldOutcome::VerifyFailed
            }
            Ok(after) if after.announce_port == public_port => {
                info!("Announce port updated successfully to {}", public_port);
                FieldOutcome::Updated
            }
            Ok(after) => {
                error!(
                    "{}",
                    SyncError::Verification {
                        field: "announce_port",
                        expected: public_port.to_string(),
                        actual: after.announce_port.to_string(),
                    }
                );
                FieldOutcome::Mismatch
            }
        }
    }

    async fn sync_ip(&self, current: &PreferencesSnapshot, public_ip: &str) -> FieldOutcome {
        if public_ip == current.announce_ip {
            info!("There was no change needed to the announce_ip. Leaving announce_ip the same.");
            return FieldOutcome::Unchanged;
        }

        info!(
            "Updating announce IP from {} to {}",
            current.announce_ip, public_ip
        );
        if let Err(e) = self.prefs.update_announce_ip(public_ip).await {
            error!("Error updating announce IP: {}", e);
            return FieldOutcome::UpdateFailed;
        }

        match self.prefs.get_current_preferences().await {
            Err(e) => {
                error!("Error getting current preferences after update: {}", e);
                FieldOutcome::VerifyFailed
            }
            Ok(after) if after.announce_ip == public_ip => {
                info!("Announce IP updated successfully to {}", public_ip);
                FieldOutcome::Updated
            }
            Ok(after) => {
                error!(
                    "{}",
                    SyncError::Verification {
                        field: "announce_ip",
                        expected: public_ip.to_string(),
                        actual: after.announce_ip,
                    }
                );
                FieldOutcome::Mismatch
            }
        }
    }
}

fn parse_mapping(protocol: Protocol, output: &str) -> Option<MappingResult> {
    let mapped_port = match parse_public_port(output) {
        Ok(port) => port,
        Err(e) => {
            error!("Error parsing public port from {} output: {}", protocol, e);
            return None;
        }
    };
    let public_ip = match parse_public_ip(output) {
        Ok(ip) => ip,
        Err(e) => {
            error!(
                "Error parsing public IP address from {} output: {}",
                protocol, e
            );
            return None;
        }
    };
    Some(MappingResult {
        protocol,
        mapped_port,
        public_ip,
    })
}
