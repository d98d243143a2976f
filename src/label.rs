//! Routing labels identifying the endpoints of an envelope exchange.

use std::fmt;

use crate::device::{DeviceContext, LocalAddress};

/// Role announced by the client in its own label.
pub const AGENT_ROLE: &str = "Agent";
/// Role of the relay the client registers with.
pub const PROXY_ROLE: &str = "Proxy";
/// Packed address used for the relay, which the client does not resolve.
pub const UNRESOLVED_HEX: &str = "00000000";

/// Addressing tuple for one endpoint of an exchange.
///
/// Labels are immutable values; headers hold their own copies.
///
/// The wire form is `role:sequence@address_hex/address:port#device_tag`.
///
/// # Examples
///
/// ```
/// use relaylink::label::RoutingLabel;
///
/// let label = RoutingLabel::proxy("10.0.0.5", 9090);
/// assert_eq!(label.to_string(), "Proxy:0@00000000/10.0.0.5:9090#");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoutingLabel {
    role: String,
    sequence: String,
    address_hex: String,
    address: String,
    port: String,
    device_tag: String,
}

impl RoutingLabel {
    /// Build a label from its six fields.
    #[must_use]
    pub fn new(
        role: impl Into<String>,
        sequence: impl Into<String>,
        address_hex: impl Into<String>,
        address: impl Into<String>,
        port: impl Into<String>,
        device_tag: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            sequence: sequence.into(),
            address_hex: address_hex.into(),
            address: address.into(),
            port: port.into(),
            device_tag: device_tag.into(),
        }
    }

    /// Label announcing this device as an agent.
    #[must_use]
    pub fn agent(local: &LocalAddress, device: &DeviceContext) -> Self {
        Self::new(
            AGENT_ROLE,
            "0",
            local.hex(),
            local.dotted(),
            device.port().to_string(),
            device.tag(),
        )
    }

    /// Label addressing the relay at `address:port`.
    #[must_use]
    pub fn proxy(address: impl Into<String>, port: u16) -> Self {
        Self::new(PROXY_ROLE, "0", UNRESOLVED_HEX, address, port.to_string(), "")
    }

    #[must_use]
    pub fn role(&self) -> &str { &self.role }

    #[must_use]
    pub fn sequence(&self) -> &str { &self.sequence }

    #[must_use]
    pub fn address_hex(&self) -> &str { &self.address_hex }

    #[must_use]
    pub fn address(&self) -> &str { &self.address }

    #[must_use]
    pub fn port(&self) -> &str { &self.port }

    #[must_use]
    pub fn device_tag(&self) -> &str { &self.device_tag }
}

impl fmt::Display for RoutingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}/{}:{}#{}",
            self.role, self.sequence, self.address_hex, self.address, self.port, self.device_tag
        )
    }
}
