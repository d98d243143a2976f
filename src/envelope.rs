//! Envelope types and their text encoding.
//!
//! An [`Envelope`] is one protocol unit sent to the relay: a header naming
//! the method and the routing labels involved, followed by an opaque body.
//! Envelopes are built for a single send, encoded, and discarded. Inbound
//! traffic is never parsed back into this model; the dispatcher receives the
//! raw text.

use std::fmt;

use crate::label::RoutingLabel;

/// Method used to announce a client to the relay.
pub const NOTIFY: &str = "NOTIFY";

const CRLF: &str = "\r\n";

/// Routing header of an [`Envelope`].
///
/// `request_origin` and `request_destination` record the pair the exchange
/// was originally requested under so relays can re-address a message without
/// losing its provenance. Fresh messages mirror `origin` and `destination`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeHeader {
    method: String,
    origin: RoutingLabel,
    destination: RoutingLabel,
    request_origin: RoutingLabel,
    request_destination: RoutingLabel,
    sequence_number: String,
}

impl EnvelopeHeader {
    /// Build a header with explicit request provenance.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        origin: RoutingLabel,
        destination: RoutingLabel,
        request_origin: RoutingLabel,
        request_destination: RoutingLabel,
        sequence_number: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            origin,
            destination,
            request_origin,
            request_destination,
            sequence_number: sequence_number.into(),
        }
    }

    /// Build a header for a message that has not been relayed.
    #[must_use]
    pub fn direct(
        method: impl Into<String>,
        origin: RoutingLabel,
        destination: RoutingLabel,
        sequence_number: impl Into<String>,
    ) -> Self {
        let request_origin = origin.clone();
        let request_destination = destination.clone();
        Self::new(
            method,
            origin,
            destination,
            request_origin,
            request_destination,
            sequence_number,
        )
    }

    #[must_use]
    pub fn method(&self) -> &str { &self.method }

    #[must_use]
    pub fn origin(&self) -> &RoutingLabel { &self.origin }

    #[must_use]
    pub fn destination(&self) -> &RoutingLabel { &self.destination }

    #[must_use]
    pub fn request_origin(&self) -> &RoutingLabel { &self.request_origin }

    #[must_use]
    pub fn request_destination(&self) -> &RoutingLabel { &self.request_destination }

    #[must_use]
    pub fn sequence_number(&self) -> &str { &self.sequence_number }
}

/// Opaque payload carried after the header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvelopeBody(String);

impl EnvelopeBody {
    /// An empty body, as used by registration.
    #[must_use]
    pub fn empty() -> Self { Self::default() }

    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<String> for EnvelopeBody {
    fn from(value: String) -> Self { Self(value) }
}

impl From<&str> for EnvelopeBody {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

/// One protocol unit: header plus body.
///
/// # Examples
///
/// ```
/// use relaylink::{envelope::Envelope, label::RoutingLabel};
///
/// let local = RoutingLabel::new("Agent", "0", "c0a80102", "192.168.1.2", "8080", "android_client");
/// let relay = RoutingLabel::proxy("10.0.0.5", 9090);
/// let text = Envelope::registration(local, relay).encode();
/// assert!(text.starts_with("NOTIFY\r\n"));
/// assert!(text.ends_with("Content-Length: 0\r\n\r\n"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    header: EnvelopeHeader,
    body: EnvelopeBody,
}

impl Envelope {
    #[must_use]
    pub fn new(header: EnvelopeHeader, body: EnvelopeBody) -> Self { Self { header, body } }

    /// Build the `NOTIFY` envelope announcing `local` to `remote`.
    #[must_use]
    pub fn registration(local: RoutingLabel, remote: RoutingLabel) -> Self {
        Self::new(
            EnvelopeHeader::direct(NOTIFY, local, remote, "0"),
            EnvelopeBody::empty(),
        )
    }

    #[must_use]
    pub fn header(&self) -> &EnvelopeHeader { &self.header }

    #[must_use]
    pub fn body(&self) -> &EnvelopeBody { &self.body }

    /// Render the wire text. Field order is fixed.
    #[must_use]
    pub fn encode(&self) -> String { self.to_string() }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        write!(f, "{}{CRLF}", h.method)?;
        write!(f, "Origin: {}{CRLF}", h.origin)?;
        write!(f, "Destination: {}{CRLF}", h.destination)?;
        write!(f, "Request-Origin: {}{CRLF}", h.request_origin)?;
        write!(f, "Request-Destination: {}{CRLF}", h.request_destination)?;
        write!(f, "Sequence: {}{CRLF}", h.sequence_number)?;
        write!(f, "Content-Length: {}{CRLF}", self.body.0.len())?;
        f.write_str(CRLF)?;
        f.write_str(&self.body.0)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::device::DeviceContext;

    #[fixture]
    fn registration() -> Envelope {
        let device = DeviceContext::default()
            .local_ip(Ipv4Addr::new(192, 168, 1, 2))
            .listen_port(8080);
        let local = RoutingLabel::agent(&device.resolve(None), &device);
        Envelope::registration(local, RoutingLabel::proxy("10.0.0.5", 9090))
    }

    #[rstest]
    fn registration_addresses_relay(registration: Envelope) {
        let header = registration.header();
        assert_eq!(header.method(), NOTIFY);
        assert_eq!(header.sequence_number(), "0");
        assert_eq!(header.origin().address_hex(), "c0a80102");
        assert_eq!(header.destination().address(), "10.0.0.5");
        assert_eq!(header.destination().port(), "9090");
        assert_eq!(header.request_origin(), header.origin());
        assert_eq!(header.request_destination(), header.destination());
        assert!(registration.body().is_empty());
    }

    #[rstest]
    fn registration_wire_text_is_fixed(registration: Envelope) {
        let expected = concat!(
            "NOTIFY\r\n",
            "Origin: Agent:0@c0a80102/192.168.1.2:8080#android_client\r\n",
            "Destination: Proxy:0@00000000/10.0.0.5:9090#\r\n",
            "Request-Origin: Agent:0@c0a80102/192.168.1.2:8080#android_client\r\n",
            "Request-Destination: Proxy:0@00000000/10.0.0.5:9090#\r\n",
            "Sequence: 0\r\n",
            "Content-Length: 0\r\n",
            "\r\n",
        );
        assert_eq!(registration.encode(), expected);
    }

    #[test]
    fn relayed_header_keeps_provenance() {
        let agent = RoutingLabel::new("Agent", "3", "0a000001", "10.0.0.1", "7000", "tv");
        let proxy = RoutingLabel::proxy("10.0.0.5", 9090);
        let viewer = RoutingLabel::new("Agent", "1", "0a000002", "10.0.0.2", "7001", "phone");
        let header =
            EnvelopeHeader::new("PLAY", proxy.clone(), viewer.clone(), agent.clone(), viewer, "7");
        let text = Envelope::new(header, EnvelopeBody::from("uri=a")).encode();

        assert!(text.contains(&format!("Origin: {proxy}\r\n")));
        assert!(text.contains(&format!("Request-Origin: {agent}\r\n")));
        assert!(text.contains("Sequence: 7\r\n"));
        assert!(text.ends_with("Content-Length: 5\r\n\r\nuri=a"));
    }

    #[test]
    fn content_length_counts_bytes() {
        let header = EnvelopeHeader::direct(
            NOTIFY,
            RoutingLabel::proxy("a", 1),
            RoutingLabel::proxy("b", 2),
            "0",
        );
        let text = Envelope::new(header, EnvelopeBody::from("é")).encode();
        assert!(text.contains("Content-Length: 2\r\n"));
    }
}
