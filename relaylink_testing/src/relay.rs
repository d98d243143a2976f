//! In-process stand-in for a relay server.
//!
//! [`StubRelay`] listens on an ephemeral loopback port and hands back one
//! [`RelayPeer`] per accepted client. Peers speak the default
//! length-prefixed framing.

use std::{io, net::SocketAddr, time::Duration};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::{
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// How long helpers wait for the client before failing the test.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Loopback listener posing as a relay.
#[derive(Debug)]
pub struct StubRelay {
    listener: TcpListener,
    addr: SocketAddr,
}

impl StubRelay {
    /// Bind to `127.0.0.1:0`.
    ///
    /// # Errors
    ///
    /// Returns any error raised while binding.
    pub async fn bind() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    #[must_use]
    pub fn port(&self) -> u16 { self.addr.port() }

    /// Accept the next client connection.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if no client connects within [`PEER_TIMEOUT`].
    pub async fn accept(&self) -> io::Result<RelayPeer> {
        let (stream, _) = timeout(PEER_TIMEOUT, self.listener.accept())
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;
        Ok(RelayPeer::new(stream))
    }
}

/// Relay side of one client connection.
#[derive(Debug)]
pub struct RelayPeer {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl RelayPeer {
    #[must_use]
    pub fn new(stream: TcpStream) -> Self {
        Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        }
    }

    /// Read the next message from the client, or `None` once it hangs up.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` after [`PEER_TIMEOUT`], `InvalidData` for non
    /// UTF-8 frames, or any transport error.
    pub async fn next_text(&mut self) -> io::Result<Option<String>> {
        let frame = timeout(PEER_TIMEOUT, self.framed.next())
            .await
            .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?;
        match frame {
            Some(bytes) => String::from_utf8(bytes?.to_vec())
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            None => Ok(None),
        }
    }

    /// Send one message to the client.
    ///
    /// # Errors
    ///
    /// Returns any transport error.
    pub async fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.framed.send(Bytes::copy_from_slice(text.as_bytes())).await
    }

    /// Give up framing and return the raw stream.
    #[must_use]
    pub fn into_inner(self) -> TcpStream { self.framed.into_inner() }
}

/// Envelope text split into method, header lines and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEnvelope {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ParsedEnvelope {
    /// Value of the first header called `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Split CRLF-delimited envelope text.
///
/// Returns `None` if the text has no blank line ending the header block.
#[must_use]
pub fn parse_envelope(text: &str) -> Option<ParsedEnvelope> {
    let (head, body) = text.split_once("\r\n\r\n")?;
    let mut lines = head.split("\r\n");
    let method = lines.next()?.to_owned();
    let headers = lines
        .map(|line| {
            let (key, value) = line.split_once(": ")?;
            Some((key.to_owned(), value.to_owned()))
        })
        .collect::<Option<Vec<_>>>()?;
    Some(ParsedEnvelope {
        method,
        headers,
        body: body.to_owned(),
    })
}

/// Split a routing label `role:sequence@hex/address:port#tag` into its six
/// fields.
#[must_use]
pub fn parse_label(label: &str) -> Option<[String; 6]> {
    let (role, rest) = label.split_once(':')?;
    let (sequence, rest) = rest.split_once('@')?;
    let (hex, rest) = rest.split_once('/')?;
    let (endpoint, tag) = rest.split_once('#')?;
    let (address, port) = endpoint.rsplit_once(':')?;
    Some([role, sequence, hex, address, port, tag].map(str::to_owned))
}
