//! Task owning one relay connection from connect to teardown.
//!
//! All lifecycle transitions happen here. The facade talks to the driver
//! through a command channel and a cancellation token; the driver publishes
//! the resulting [`ConnectionState`] for everyone else to observe.

use std::{net::IpAddr, sync::Arc};

use tokio::{
    net::{TcpStream, tcp::OwnedReadHalf},
    sync::{Mutex, mpsc},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    ClientConfig,
    ConnectionState,
    SendError,
    connect::{Connector, connect_with_retry},
    receive::{ReadEvent, ReceiveLoop},
    send_queue::{self, SendQueueReceiver},
    state::StateHandle,
};
use crate::{
    dispatch::{SharedDispatcher, dispatch_guarded},
    envelope::Envelope,
    label::RoutingLabel,
    metrics,
    panic::format_panic,
};

/// Lifecycle requests sent by the facade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Pause,
    Resume,
}

enum LinkExit {
    Shutdown,
    PeerClosed,
}

pub(crate) struct Driver {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) dispatcher: SharedDispatcher,
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,
    pub(crate) outbound: Arc<Mutex<SendQueueReceiver>>,
    pub(crate) state: StateHandle,
    pub(crate) shutdown: CancellationToken,
}

/// Build the registration envelope for a connection whose local socket
/// address is `observed`.
pub(crate) fn registration(config: &ClientConfig, observed: Option<IpAddr>) -> Envelope {
    let device = config.device_context();
    let local = RoutingLabel::agent(&device.resolve(observed), device);
    let relay = RoutingLabel::proxy(config.relay_host(), config.relay_port());
    Envelope::registration(local, relay)
}

impl Driver {
    pub(crate) async fn run(mut self) {
        loop {
            if !self.state.transition(ConnectionState::Connecting) {
                break;
            }
            let connected = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                result = connect_with_retry(
                    self.connector.as_ref(),
                    self.config.relay_host(),
                    self.config.relay_port(),
                    self.config.retry_policy(),
                    self.config.connect_timeout_value(),
                ) => result,
            };
            match connected {
                Ok(stream) => match self.serve(stream).await {
                    LinkExit::Shutdown => break,
                    LinkExit::PeerClosed => info!("relay closed the connection"),
                },
                Err(error) => {
                    metrics::inc_errors();
                    warn!(%error, "relay unreachable, waiting for resume");
                }
            }
            if !self.state.transition(ConnectionState::Disconnected) || !self.await_resume().await
            {
                break;
            }
        }
        self.close_queue().await;
        debug!("connection driver stopped");
    }

    /// Run one established connection until shutdown or peer close.
    async fn serve(&mut self, stream: TcpStream) -> LinkExit {
        let observed = stream.local_addr().ok().map(|addr| addr.ip());
        let peer = stream.peer_addr().ok();
        let envelope = registration(&self.config, observed);
        let (reader, writer) = stream.into_split();

        let link = self.shutdown.child_token();
        let queue = self.outbound.clone().lock_owned().await;
        let codec = self
            .config
            .framing_value()
            .codec(self.config.max_frame_length_value());
        let worker = tokio::spawn(send_queue::run_worker(
            queue,
            writer,
            codec,
            envelope.encode(),
            link.clone(),
            self.shutdown.clone(),
        ));

        metrics::inc_connections();
        let exit = if self.state.transition(ConnectionState::Connected) {
            info!(?peer, "connected to relay");
            let mut receiver = ReceiveLoop::new(reader, &self.config);
            self.read_until_exit(&mut receiver).await
        } else {
            LinkExit::Shutdown
        };
        link.cancel();
        if let Err(e) = worker.await
            && e.is_panic()
        {
            error!(panic = %format_panic(e.into_panic()), "send worker panicked");
        }
        metrics::dec_connections();
        exit
    }

    async fn read_until_exit(&mut self, receiver: &mut ReceiveLoop<OwnedReadHalf>) -> LinkExit {
        let mut paused = false;
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return LinkExit::Shutdown,
                command = self.commands.recv() => {
                    let next = match command {
                        Some(Command::Pause) if !paused => ConnectionState::Paused,
                        Some(Command::Resume) if paused => ConnectionState::Connected,
                        Some(command) => {
                            debug!(?command, paused, "lifecycle command ignored");
                            continue;
                        }
                        None => return LinkExit::Shutdown,
                    };
                    if !self.state.transition(next) {
                        return LinkExit::Shutdown;
                    }
                    paused = next == ConnectionState::Paused;
                    info!(state = ?next, "receive loop state changed");
                }
                event = receiver.next_event(), if !paused => match event {
                    Ok(ReadEvent::Messages(messages)) => self.dispatch_all(messages),
                    Ok(ReadEvent::Closed(messages)) => {
                        self.dispatch_all(messages);
                        return LinkExit::PeerClosed;
                    }
                    Err(error) => {
                        metrics::inc_errors();
                        warn!(%error, "read failed, abandoning iteration");
                    }
                },
            }
        }
    }

    fn dispatch_all(&self, messages: Vec<String>) {
        for text in messages {
            debug!(len = text.len(), "dispatching inbound message");
            dispatch_guarded(self.dispatcher.as_ref(), text);
        }
    }

    /// Reject sends until resumed. Returns `false` if the driver should stop.
    async fn await_resume(&mut self) -> bool {
        let outbound = self.outbound.clone();
        let mut queue = outbound.lock().await;
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return false,
                command = self.commands.recv() => match command {
                    Some(Command::Resume) => {
                        info!("resume requested, reconnecting");
                        return true;
                    }
                    Some(Command::Pause) => debug!("pause ignored while disconnected"),
                    None => return false,
                },
                job = queue.recv() => match job {
                    Some(job) => job.fail(SendError::NotConnected),
                    None => return false,
                },
            }
        }
    }

    /// Stop accepting sends and answer everything still queued.
    async fn close_queue(&self) {
        let mut queue = self.outbound.lock().await;
        queue.close();
        while let Ok(job) = queue.try_recv() {
            job.fail(SendError::Closed);
        }
    }
}
