//! Local device identity used when announcing the client to a relay.
//!
//! The relay addresses endpoints by IPv4 address in two forms: the usual
//! dotted quad and a packed form of eight lowercase hex digits, two per
//! octet. [`DeviceContext`] carries both together with the port the device
//! listens on and the tag it registers under.

use std::net::Ipv4Addr;

/// Tag announced by this client in its registration envelope.
pub const DEFAULT_DEVICE_TAG: &str = "android_client";

/// Port announced as the local listen port when none is configured.
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Format an IPv4 address as eight zero-padded lowercase hex digits.
///
/// # Examples
///
/// ```
/// use std::net::Ipv4Addr;
///
/// use relaylink::device::packed_hex;
///
/// assert_eq!(packed_hex(Ipv4Addr::new(192, 168, 1, 2)), "c0a80102");
/// assert_eq!(packed_hex(Ipv4Addr::UNSPECIFIED), "00000000");
/// ```
#[must_use]
pub fn packed_hex(addr: Ipv4Addr) -> String {
    let [a, b, c, d] = addr.octets();
    format!("{a:02x}{b:02x}{c:02x}{d:02x}")
}

/// Identity of the local device as seen by the relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceContext {
    local_ip: Option<Ipv4Addr>,
    listen_port: u16,
    device_tag: String,
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self {
            local_ip: None,
            listen_port: DEFAULT_LISTEN_PORT,
            device_tag: DEFAULT_DEVICE_TAG.to_owned(),
        }
    }
}

impl DeviceContext {
    /// Pin the local IPv4 address announced to the relay.
    ///
    /// Without a pinned address the client announces the local address of
    /// the connected socket.
    #[must_use]
    pub fn local_ip(mut self, addr: Ipv4Addr) -> Self {
        self.local_ip = Some(addr);
        self
    }

    /// Set the port announced as the local listen port.
    #[must_use]
    pub fn listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    /// Set the device tag announced in the origin label.
    #[must_use]
    pub fn device_tag(mut self, tag: impl Into<String>) -> Self {
        self.device_tag = tag.into();
        self
    }

    /// Configured local address, if any.
    #[must_use]
    pub const fn configured_ip(&self) -> Option<Ipv4Addr> { self.local_ip }

    /// Announced listen port.
    #[must_use]
    pub const fn port(&self) -> u16 { self.listen_port }

    /// Announced device tag.
    #[must_use]
    pub fn tag(&self) -> &str { &self.device_tag }

    /// Resolve the address to announce, preferring the configured one.
    ///
    /// `observed` is the local address of the connected socket. IPv6 or
    /// missing addresses fall back to `0.0.0.0`.
    #[must_use]
    pub fn resolve(&self, observed: Option<std::net::IpAddr>) -> LocalAddress {
        let ip = self
            .local_ip
            .or_else(|| match observed {
                Some(std::net::IpAddr::V4(v4)) => Some(v4),
                Some(std::net::IpAddr::V6(v6)) => v6.to_ipv4_mapped(),
                None => None,
            })
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        LocalAddress::new(ip)
    }
}

/// An IPv4 address paired with its dotted and packed-hex renderings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalAddress {
    ip: Ipv4Addr,
    dotted: String,
    hex: String,
}

impl LocalAddress {
    /// Render both forms of `ip`.
    #[must_use]
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            dotted: ip.to_string(),
            hex: packed_hex(ip),
        }
    }

    #[must_use]
    pub const fn ip(&self) -> Ipv4Addr { self.ip }

    #[must_use]
    pub fn dotted(&self) -> &str { &self.dotted }

    #[must_use]
    pub fn hex(&self) -> &str { &self.hex }
}
