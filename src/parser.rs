//! Extraction of the mapped port and public address from `natpmpc` output.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SyncError};

static PUBLIC_PORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Mapped public port ([0-9]+)").unwrap());

// Octets are not range-checked, natpmpc only ever prints real addresses.
static PUBLIC_IP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Public IP address : ([0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3})").unwrap()
});

pub fn parse_public_port(output: &str) -> Result<u16> {
    let digits = PUBLIC_PORT_RE
        .captures(output)
        .and_then(|c| c.get(1))
        .ok_or(SyncError::Parse {
            what: "public port",
        })?;
    digits.as_str().parse().map_err(|_| SyncError::Parse {
        what: "public port",
    })
}

pub fn parse_public_ip(output: &str) -> Result<String> {
    PUBLIC_IP_RE
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
        .ok_or(SyncError::Parse {
            what: "public IP address",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP_OUTPUT: &str = "initnatpmp() returned 0 (SUCCESS)
using gateway : 10.2.0.1
sendpublicaddressrequest returned 2 (SUCCESS)
readnatpmpresponseorretry returned 0 (OK)
Public IP address : 203.0.113.7
epoch = 1729111
sendnewportmappingrequest returned 12 (SUCCESS)
readnatpmpresponseorretry returned 0 (OK)
Mapped public port 54321 protocol TCP to local port 0 lifetime 60
epoch = 1729111
closenatpmp() returned 0 (SUCCESS)
";

    #[test]
    fn test_parse_public_port() {
        assert_eq!(parse_public_port(TCP_OUTPUT).unwrap(), 54321);
        assert_eq!(parse_public_port("Mapped public port 1").unwrap(), 1);
    }

    #[test]
    fn test_parse_public_port_missing() {
        let err = parse_public_port("readnatpmpresponseorretry returned -7 (FAILED)").unwrap_err();
        assert!(matches!(err, SyncError::Parse { .. }));
        assert!(parse_public_port("Mapped public port  ").is_err());
        assert!(parse_public_port("").is_err());
    }

    #[test]
    fn test_parse_public_port_out_of_range() {
        assert!(parse_public_port("Mapped public port 65535").is_ok());
        assert!(parse_public_port("Mapped public port 65536").is_err());
        assert!(parse_public_port("Mapped public port 99999999999999999999999").is_err());
    }

    #[test]
    fn test_parse_public_ip() {
        assert_eq!(parse_public_ip(TCP_OUTPUT).unwrap(), "203.0.113.7");
    }

    #[test]
    fn test_parse_public_ip_malformed() {
        assert!(parse_public_ip("Public IP address : 203.0.113").is_err());
        assert!(parse_public_ip("Public IP address: 203.0.113.7").is_err());
        assert!(parse_public_ip("Mapped public port 54321").is_err());
    }

    #[test]
    fn test_parse_public_ip_does_not_range_check_octets() {
        assert_eq!(
            parse_public_ip("Public IP address : 999.1.2.3").unwrap(),
            "999.1.2.3"
        );
    }
}
