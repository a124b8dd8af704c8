//! CIDR network type yielded by trie traversal

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::MmdbError;

/// An IP network in CIDR notation: address plus prefix length.
///
/// The address is always the network address (host bits zero). The range
/// covered by the network runs from [`IpNetwork::network_address`] to
/// [`IpNetwork::broadcast_address`] inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix_len: u8,
}

impl IpNetwork {
    /// Create a network from an address and prefix length.
    ///
    /// Host bits in `addr` are masked off. Fails if the prefix length
    /// exceeds the address width (32 for IPv4, 128 for IPv6).
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, MmdbError> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(MmdbError::InvalidNetwork(format!(
                "prefix length {} exceeds {} for {}",
                prefix_len, max, addr
            )));
        }
        let addr = match addr {
            IpAddr::V4(v4) => {
                let bits = u32::from(v4) & mask_v4(prefix_len);
                IpAddr::V4(Ipv4Addr::from(bits))
            }
            IpAddr::V6(v6) => {
                let bits = u128::from(v6) & mask_v6(prefix_len);
                IpAddr::V6(Ipv6Addr::from(bits))
            }
        };
        Ok(Self { addr, prefix_len })
    }

    /// First address in the range.
    pub fn network_address(&self) -> IpAddr {
        self.addr
    }

    /// Last address in the range.
    pub fn broadcast_address(&self) -> IpAddr {
        match self.addr {
            IpAddr::V4(v4) => {
                let bits = u32::from(v4) | !mask_v4(self.prefix_len);
                IpAddr::V4(Ipv4Addr::from(bits))
            }
            IpAddr::V6(v6) => {
                let bits = u128::from(v6) | !mask_v6(self.prefix_len);
                IpAddr::V6(Ipv6Addr::from(bits))
            }
        }
    }

    /// Prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

fn mask_v4(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len as u32)
    }
}

fn mask_v6(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - prefix_len as u32)
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl FromStr for IpNetwork {
    type Err = MmdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_part, prefix_part) = match s.split_once('/') {
            Some(parts) => parts,
            None => {
                // Bare address: host network
                let addr: IpAddr = s
                    .parse()
                    .map_err(|_| MmdbError::InvalidNetwork(format!("bad address: {}", s)))?;
                let prefix = if addr.is_ipv4() { 32 } else { 128 };
                return IpNetwork::new(addr, prefix);
            }
        };
        let addr: IpAddr = addr_part
            .parse()
            .map_err(|_| MmdbError::InvalidNetwork(format!("bad address: {}", addr_part)))?;
        let prefix_len: u8 = prefix_part
            .parse()
            .map_err(|_| MmdbError::InvalidNetwork(format!("bad prefix: {}", prefix_part)))?;
        IpNetwork::new(addr, prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let net: IpNetwork = "10.0.0.0/24".parse().unwrap();
        assert_eq!(net.to_string(), "10.0.0.0/24");
        assert_eq!(net.prefix_len(), 24);
    }

    #[test]
    fn test_host_bits_masked() {
        let net: IpNetwork = "10.0.0.77/24".parse().unwrap();
        assert_eq!(net.to_string(), "10.0.0.0/24");
    }

    #[test]
    fn test_range_endpoints() {
        let net: IpNetwork = "192.168.4.0/22".parse().unwrap();
        assert_eq!(net.network_address().to_string(), "192.168.4.0");
        assert_eq!(net.broadcast_address().to_string(), "192.168.7.255");
    }

    #[test]
    fn test_bare_address_is_host_network() {
        let net: IpNetwork = "1.2.3.4".parse().unwrap();
        assert_eq!(net.to_string(), "1.2.3.4/32");
        assert_eq!(net.broadcast_address().to_string(), "1.2.3.4");
    }

    #[test]
    fn test_ipv6() {
        let net: IpNetwork = "2001:db8::/32".parse().unwrap();
        assert_eq!(net.network_address().to_string(), "2001:db8::");
        assert_eq!(
            net.broadcast_address().to_string(),
            "2001:db8:ffff:ffff:ffff:ffff:ffff:ffff"
        );
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        assert!("10.0.0.0/33".parse::<IpNetwork>().is_err());
        assert!("10.0.0.0/abc".parse::<IpNetwork>().is_err());
        assert!("not-an-ip/24".parse::<IpNetwork>().is_err());
    }

    #[test]
    fn test_zero_prefix() {
        let net: IpNetwork = "0.0.0.0/0".parse().unwrap();
        assert_eq!(net.broadcast_address().to_string(), "255.255.255.255");
    }
}
