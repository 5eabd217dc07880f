use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Protocol;

pub mod natpmpc;
pub use natpmpc::NatpmpcMapper;

/// Lease requested for every mapping, in seconds.
pub const LEASE_SECONDS: u32 = 60;

#[async_trait]
pub trait PortMapper: Send + Sync {
    /// Ask `gateway` to map `internal_port` for `protocol`.
    /// Returns the combined stdout and stderr of the request on success.
    async fn request_mapping(
        &self,
        gateway: Ipv4Addr,
        internal_port: u16,
        protocol: Protocol,
    ) -> Result<String>;
}
