use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Identity of a region server. Ordering is by host, then port, then start code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerName {
    pub host: String,
    pub port: u16,
    pub start_code: u64,
}

impl ServerName {
    pub fn new(host: impl Into<String>, port: u16, start_code: u64) -> Self {
        Self {
            host: host.into(),
            port,
            start_code,
        }
    }

    /// Host without its domain suffix. Capacity rules are matched against this.
    pub fn short_name(&self) -> &str {
        if self.host.parse::<IpAddr>().is_ok() {
            return &self.host;
        }
        self.host.split('.').next().unwrap_or(&self.host)
    }
}

impl std::fmt::Display for ServerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.host, self.port, self.start_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_strips_domain() {
        let sn = ServerName::new("rs3.dc1.example.com", 16020, 1);
        assert_eq!(sn.short_name(), "rs3");
    }

    #[test]
    fn test_short_name_keeps_ip_literal() {
        let sn = ServerName::new("10.0.0.7", 16020, 1);
        assert_eq!(sn.short_name(), "10.0.0.7");
    }

    #[test]
    fn test_ordering_is_host_then_port_then_start_code() {
        let a = ServerName::new("rs0", 2, 9);
        let b = ServerName::new("rs0", 3, 1);
        let c = ServerName::new("rs1", 1, 1);
        assert!(a < b);
        assert!(b < c);
    }
}
