//! Ordered outbound sends.
//!
//! Any number of callers submit messages through a [`SendQueueHandle`]. One
//! worker per live connection owns the socket's write half and the outbound
//! buffer, and writes jobs one at a time in submission order, so two
//! messages never interleave on the wire. Every job carries a reply channel;
//! callers may await the outcome through the returned [`SendTicket`] or drop
//! it.

use std::future::IntoFuture;

use bytes::BytesMut;
use futures::future::BoxFuture;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{OwnedMutexGuard, mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::SendError;
use crate::{
    framing::FrameCodec,
    metrics::{self, Direction},
};

/// Result of one send: bytes written to the socket, framing included.
pub type SendOutcome = Result<usize, SendError>;

/// One queued outbound message.
#[derive(Debug)]
pub(crate) struct SendJob {
    text: String,
    reply: oneshot::Sender<SendOutcome>,
}

impl SendJob {
    /// Answer the job without writing it.
    pub(crate) fn fail(self, error: SendError) { let _ = self.reply.send(Err(error)); }
}

pub(crate) type SendQueueReceiver = mpsc::UnboundedReceiver<SendJob>;

/// Create an unbounded send queue.
pub(crate) fn channel() -> (SendQueueHandle, SendQueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SendQueueHandle { tx }, rx)
}

/// Producer side of the send queue.
#[derive(Clone, Debug)]
pub(crate) struct SendQueueHandle {
    tx: mpsc::UnboundedSender<SendJob>,
}

impl SendQueueHandle {
    /// Enqueue `text` and return immediately.
    pub(crate) fn submit(&self, text: String) -> SendTicket {
        let (reply, rx) = oneshot::channel();
        match self.tx.send(SendJob { text, reply }) {
            Ok(()) => SendTicket::pending(rx),
            Err(_closed) => SendTicket::failed(SendError::Closed),
        }
    }
}

/// Handle on the outcome of one [`crate::RelayClient::send_message`] call.
///
/// Dropping the ticket makes the send fire-and-forget. Awaiting it (or
/// calling [`SendTicket::outcome`]) yields the number of bytes written or
/// the reason the message was not delivered.
#[derive(Debug)]
#[must_use = "drop the ticket explicitly for fire-and-forget sends"]
pub struct SendTicket(TicketState);

#[derive(Debug)]
enum TicketState {
    Pending(oneshot::Receiver<SendOutcome>),
    Ready(SendError),
}

impl SendTicket {
    fn pending(rx: oneshot::Receiver<SendOutcome>) -> Self { Self(TicketState::Pending(rx)) }

    pub(crate) fn failed(error: SendError) -> Self { Self(TicketState::Ready(error)) }

    /// Wait for the worker to write (or reject) the message.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] if the message was not written in full.
    pub async fn outcome(self) -> SendOutcome {
        match self.0 {
            TicketState::Pending(rx) => rx.await.unwrap_or(Err(SendError::Closed)),
            TicketState::Ready(error) => Err(error),
        }
    }
}

impl IntoFuture for SendTicket {
    type Output = SendOutcome;
    type IntoFuture = BoxFuture<'static, SendOutcome>;

    fn into_future(self) -> Self::IntoFuture { Box::pin(self.outcome()) }
}

/// Writer task for one connection.
///
/// Writes `registration` first, then drains `queue` until `link` fires or
/// every producer is gone. Queued jobs left behind stay in the queue for the
/// connection driver to answer. `client` is the client-wide shutdown token
/// and decides how a write interrupted by cancellation is reported.
pub(crate) async fn run_worker<W>(
    mut queue: OwnedMutexGuard<SendQueueReceiver>,
    mut writer: W,
    mut codec: FrameCodec,
    registration: String,
    link: CancellationToken,
    client: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    let stop = Stop {
        link: &link,
        client: &client,
    };
    let mut buffer = BytesMut::with_capacity(512);
    match write_frame(&mut writer, &mut codec, &mut buffer, &registration, stop).await {
        Ok(bytes) => debug!(bytes, "registration envelope sent"),
        Err(error) => {
            metrics::inc_errors();
            warn!(%error, "failed to send registration envelope");
        }
    }

    loop {
        let job = tokio::select! {
            biased;
            () = link.cancelled() => break,
            job = queue.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        let result = write_frame(&mut writer, &mut codec, &mut buffer, &job.text, stop).await;
        match &result {
            Ok(bytes) => debug!(bytes, "message written"),
            Err(error) => {
                metrics::inc_errors();
                warn!(%error, "failed to write message");
            }
        }
        let _ = job.reply.send(result);
    }
    debug!("send worker stopped");
}

/// Cancellation tokens observed by an in-flight write.
#[derive(Clone, Copy)]
struct Stop<'a> {
    /// Fires when the connection goes away.
    link: &'a CancellationToken,
    /// Fires when the client is destroyed; always cancels `link` too.
    client: &'a CancellationToken,
}

impl Stop<'_> {
    fn interrupted(self) -> SendError {
        if self.client.is_cancelled() {
            SendError::Closed
        } else {
            SendError::NotConnected
        }
    }
}

async fn write_frame<W>(
    writer: &mut W,
    codec: &mut FrameCodec,
    buffer: &mut BytesMut,
    text: &str,
    stop: Stop<'_>,
) -> SendOutcome
where
    W: AsyncWrite + Unpin,
{
    buffer.clear();
    codec.encode(text, buffer)?;
    tokio::select! {
        biased;
        () = stop.link.cancelled() => Err(stop.interrupted()),
        written = writer.write_all(buffer) => {
            written?;
            metrics::inc_frames(Direction::Outbound);
            Ok(buffer.len())
        }
    }
}
