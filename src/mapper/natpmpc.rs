use super::{PortMapper, LEASE_SECONDS};
use crate::error::{Result, SyncError};
use crate::types::Protocol;
use async_trait::async_trait;
use log::{debug, info};
use std::net::Ipv4Addr;
use tokio::process::Command;

/// Requests mappings by running the `natpmpc` command-line client.
pub struct NatpmpcMapper {
    program: String,
}

impl NatpmpcMapper {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(gateway: Ipv4Addr, internal_port: u16, protocol: Protocol) -> Vec<String> {
        // `-a 1` asks for any available public port.
        vec![
            "-g".to_string(),
            gateway.to_string(),
            "-a".to_string(),
            "1".to_string(),
            internal_port.to_string(),
            protocol.to_string(),
            LEASE_SECONDS.to_string(),
        ]
    }
}

#[async_trait]
impl PortMapper for NatpmpcMapper {
    async fn request_mapping(
        &self,
        gateway: Ipv4Addr,
        internal_port: u16,
        protocol: Protocol,
    ) -> Result<String> {
        let args = Self::args(gateway, internal_port, protocol);
        info!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SyncError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        debug!("{} output for {}:\n{}", self.program, protocol, combined);

        if !output.status.success() {
            return Err(SyncError::MappingFailed {
                protocol,
                status: output.status,
                output: combined,
            });
        }
        Ok(combined)
    }
}
