use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::warn;

/// An address block. Host bits in the configured address are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Network {
    addr: IpAddr,
    prefix: u8,
}

impl Network {
    fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr.parse::<IpAddr>().ok()?, Some(prefix.parse().ok()?)),
            None => (s.parse::<IpAddr>().ok()?, None),
        };
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = prefix.unwrap_or(max);
        (prefix <= max).then_some(Self { addr, prefix })
    }

    fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - self.prefix as u32).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - self.prefix as u32).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

/// Addresses whose traffic is never limited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    v4: Vec<Network>,
    v6: Vec<Network>,
    v4_configured: bool,
    v6_configured: bool,
}

impl AllowList {
    /// Build from comma-separated v4 and v6 lists of CIDR blocks or plain addresses.
    pub fn parse(ipv4: &str, ipv6: &str) -> Self {
        Self {
            v4: parse_networks(ipv4),
            v6: parse_networks(ipv6),
            v4_configured: !ipv4.trim().is_empty(),
            v6_configured: !ipv6.trim().is_empty(),
        }
    }

    /// Whether either list was configured at all.
    pub fn is_configured(&self) -> bool {
        self.v4_configured || self.v6_configured
    }

    /// A family left unconfigured allows everything of that family; a
    /// configured family whose entries were all invalid allows nothing.
    /// IPv4-mapped IPv6 addresses are checked against the v4 list.
    /// Unparsable addresses are never allowed.
    pub fn allows(&self, address: &str) -> bool {
        let Some(ip) = parse_address(address) else {
            return false;
        };
        let (ip, list, configured) = match ip {
            IpAddr::V4(_) => (ip, &self.v4, self.v4_configured),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => (IpAddr::V4(v4), &self.v4, self.v4_configured),
                None => (ip, &self.v6, self.v6_configured),
            },
        };
        !configured || list.iter().any(|n| n.contains(ip))
    }
}

fn parse_networks(list: &str) -> Vec<Network> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let net = Network::parse(s);
            if net.is_none() {
                warn!(entry = %s, "Ignoring invalid unlimited address");
            }
            net
        })
        .collect()
}

/// Parse a remote endpoint, tolerating `ip:port` and `[v6]:port` forms.
fn parse_address(address: &str) -> Option<IpAddr> {
    let address = address.trim();
    address
        .parse::<IpAddr>()
        .ok()
        .or_else(|| address.parse::<SocketAddr>().ok().map(|s| s.ip()))
        .or_else(|| {
            address
                .strip_prefix('[')
                .and_then(|a| a.strip_suffix(']'))
                .and_then(|a| a.parse().ok())
        })
}

/// Whether the address belongs to a private, loopback, link-local or
/// otherwise non-routable range. Unparsable addresses are not private.
pub fn is_private(address: &str) -> bool {
    match parse_address(address) {
        Some(IpAddr::V4(v4)) => is_private_v4(v4),
        Some(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_v4(v4),
            None => is_private_v6(v6),
        },
        None => false,
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified()
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}
