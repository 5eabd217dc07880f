//! Data passed between the subsystems during a single mapping cycle.
//!
//! Nothing here outlives the cycle that created it: preferences are
//! fetched fresh every tick and mapping results are dropped once the
//! reconciler has compared them against the client's state.

use std::fmt;

use serde_json::{Map, Value};

/// Transport protocol of a NAT-PMP mapping, spelled the way `natpmpc`
/// expects it on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three preference fields the reconciler cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferencesSnapshot {
    pub announce_ip: String,
    pub announce_port: u16,
    pub listen_port: u16,
}

/// What the gateway handed back for one protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingResult {
    pub protocol: Protocol,
    pub mapped_port: u16,
    pub public_ip: String,
}

/// The client's complete preferences object.
///
/// Keys keep their original order and unknown keys are carried through
/// untouched, so writing the document back only changes what was mutated.
pub type PreferencesDocument = Map<String, Value>;
