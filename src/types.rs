//! Type definitions and aliases

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Sentinel used wherever a server or target could not be resolved
pub const UNKNOWN: &str = "unknown";

/// Reported in place of the latency target when its liveness check failed
pub const UNREACHABLE: &str = "Unreachable";

/// IP protocol version preference for outbound connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpPreference {
    /// Let the resolver and OS pick
    #[default]
    Auto,
    /// Force IPv4
    V4,
    /// Force IPv6
    V6,
}

impl IpPreference {
    /// Unspecified local address to bind to, forcing the address family
    pub fn local_address(&self) -> Option<IpAddr> {
        match self {
            IpPreference::Auto => None,
            IpPreference::V4 => Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            IpPreference::V6 => Some(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
        }
    }

    /// Whether a resolved address is acceptable under this preference
    pub fn accepts(&self, addr: &IpAddr) -> bool {
        match self {
            IpPreference::Auto => true,
            IpPreference::V4 => addr.is_ipv4(),
            IpPreference::V6 => addr.is_ipv6(),
        }
    }
}

impl FromStr for IpPreference {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(IpPreference::Auto),
            "4" | "v4" | "ipv4" => Ok(IpPreference::V4),
            "6" | "v6" | "ipv6" => Ok(IpPreference::V6),
            other => Err(AppError::config(format!("Invalid IP version '{}': expected 4, 6 or auto", other))),
        }
    }
}

impl fmt::Display for IpPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpPreference::Auto => write!(f, "auto"),
            IpPreference::V4 => write!(f, "4"),
            IpPreference::V6 => write!(f, "6"),
        }
    }
}

/// Terminal classification of a transfer measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Every requested byte was moved
    Success,
    /// Some bytes were measured before the cap or an abort
    PartialFailure,
    /// Nothing usable was measured
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::PartialFailure => "partial",
            Outcome::Failed => "failed",
        }
    }
}

/// How a transfer attempt moved its bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStrategy {
    /// Sequential byte-range requests over the original scheme
    RangedChunked,
    /// Sequential byte-range requests after downgrading https to http
    RangedChunkedPlain,
    /// One unranged request for the whole payload
    FullFetch,
    /// Fixed-size upload chunks, one request each
    UploadChunked,
    /// One upload request with a streamed body
    UploadSingle,
    /// No strategy produced a measurement
    None,
}

impl TransferStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStrategy::RangedChunked => "ranged",
            TransferStrategy::RangedChunkedPlain => "ranged-http",
            TransferStrategy::FullFetch => "full",
            TransferStrategy::UploadChunked => "chunked",
            TransferStrategy::UploadSingle => "single",
            TransferStrategy::None => "none",
        }
    }
}

/// Upload payload delivery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Fixed-size chunks, one POST each
    #[default]
    Chunked,
    /// One POST carrying the whole streamed payload
    Single,
}

impl FromStr for UploadMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "chunked" => Ok(UploadMode::Chunked),
            "single" => Ok(UploadMode::Single),
            other => Err(AppError::config(format!("Invalid upload mode '{}': expected chunked or single", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_preference_parsing() {
        assert_eq!("4".parse::<IpPreference>().unwrap(), IpPreference::V4);
        assert_eq!("ipv6".parse::<IpPreference>().unwrap(), IpPreference::V6);
        assert_eq!("AUTO".parse::<IpPreference>().unwrap(), IpPreference::Auto);
        assert!("5".parse::<IpPreference>().is_err());
    }

    #[test]
    fn test_ip_preference_filters_families() {
        let v4: IpAddr = "1.1.1.1".parse().unwrap();
        let v6: IpAddr = "2606:4700::1111".parse().unwrap();
        assert!(IpPreference::V4.accepts(&v4));
        assert!(!IpPreference::V4.accepts(&v6));
        assert!(IpPreference::V6.accepts(&v6));
        assert!(IpPreference::Auto.accepts(&v4));
        assert_eq!(IpPreference::Auto.local_address(), None);
        assert!(IpPreference::V6.local_address().unwrap().is_ipv6());
    }

    #[test]
    fn test_upload_mode_parsing() {
        assert_eq!("single".parse::<UploadMode>().unwrap(), UploadMode::Single);
        assert!("burst".parse::<UploadMode>().is_err());
    }
}
