//! The relay client facade.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::{
    ClientConfig,
    ConnectionState,
    SendError,
    SendTicket,
    connect::{Connector, TcpConnector},
    driver::{Command, Driver},
    send_queue::{self, SendQueueHandle},
    state::StateCell,
};
use crate::dispatch::{MessageDispatcher, SharedDispatcher};

/// Client holding one persistent connection to a relay.
///
/// `RelayClient` is a cheap, cloneable handle. Every lifecycle method
/// returns immediately; the connection itself is driven by a background
/// task on the tokio runtime that was current when [`RelayClient::init`]
/// was called. Progress is observable through [`RelayClient::state`] and
/// [`RelayClient::subscribe`].
///
/// # Examples
///
/// ```no_run
/// use relaylink::{RelayClient, client::ClientConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let client = RelayClient::new(ClientConfig::new("10.0.0.5", 9090), |text: String| {
///     println!("relay says: {text}");
/// });
/// client.init();
/// let ticket = client.send_message("hello");
/// if let Err(e) = ticket.await {
///     eprintln!("send failed: {e}");
/// }
/// client.destroy();
/// # }
/// ```
#[derive(Clone)]
pub struct RelayClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<ClientConfig>,
    dispatcher: SharedDispatcher,
    connector: Arc<dyn Connector>,
    runtime: Option<Handle>,
    state: StateCell,
    driver: Mutex<Option<DriverHandle>>,
}

struct DriverHandle {
    commands: mpsc::UnboundedSender<Command>,
    outbound: SendQueueHandle,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl RelayClient {
    /// Create an idle client. Nothing happens on the network until
    /// [`RelayClient::init`].
    #[must_use]
    pub fn new(config: ClientConfig, dispatcher: impl MessageDispatcher) -> Self {
        let connector = TcpConnector::new(config.socket_options_value());
        Self::with_connector(config, dispatcher, Arc::new(connector))
    }

    /// Create an idle client that opens connections through `connector`.
    #[must_use]
    pub fn with_connector(
        config: ClientConfig,
        dispatcher: impl MessageDispatcher,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: Arc::new(config),
                dispatcher: Arc::new(dispatcher),
                connector,
                runtime: None,
                state: StateCell::new(),
                driver: Mutex::new(None),
            }),
        }
    }

    /// Spawn the connection driver on `runtime` instead of the runtime that
    /// is current when [`RelayClient::init`] runs.
    ///
    /// Only effective before the handle is cloned.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.runtime = Some(runtime),
            None => warn!("runtime override ignored on a shared client handle"),
        }
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig { &self.inner.config }

    /// Start connecting to the relay in the background.
    ///
    /// Does nothing when the relay address is incomplete or a connection
    /// driver is already running. After [`RelayClient::destroy`], calling
    /// `init` again starts a fresh connection.
    pub fn init(&self) {
        let config = &self.inner.config;
        if !config.is_addressed() {
            info!(
                host = config.relay_host(),
                port = config.relay_port(),
                "relay address incomplete, not connecting"
            );
            return;
        }
        let mut slot = self.inner.driver_slot();
        if slot.as_ref().is_some_and(|driver| !driver.task.is_finished()) {
            debug!("connection driver already running");
            return;
        }
        let runtime = match self.inner.runtime.clone().map_or_else(Handle::try_current, Ok) {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "init requires a tokio runtime");
                return;
            }
        };

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = send_queue::channel();
        let shutdown = CancellationToken::new();
        let driver = Driver {
            config: config.clone(),
            connector: self.inner.connector.clone(),
            dispatcher: self.inner.dispatcher.clone(),
            commands: command_rx,
            outbound: Arc::new(tokio::sync::Mutex::new(outbound_rx)),
            state: self.inner.state.begin(),
            shutdown: shutdown.clone(),
        };
        let span = info_span!(
            "relay_connection",
            relay = %format_args!("{}:{}", config.relay_host(), config.relay_port())
        );
        let task = runtime.spawn(driver.run().instrument(span));
        *slot = Some(DriverHandle {
            commands,
            outbound,
            shutdown,
            task,
        });
    }

    /// Queue `text` for delivery and return at once.
    ///
    /// Messages are written in the order they were queued. Messages queued
    /// while connecting are written after the registration envelope. Drop
    /// the returned ticket to ignore the outcome.
    pub fn send_message(&self, text: impl Into<String>) -> SendTicket {
        let slot = self.inner.driver_slot();
        match slot.as_ref() {
            Some(driver) => driver.outbound.submit(text.into()),
            None if self.state() == ConnectionState::Destroyed => {
                SendTicket::failed(SendError::Closed)
            }
            None => SendTicket::failed(SendError::NotConnected),
        }
    }

    /// Stop dispatching inbound messages. The socket stays open and sends
    /// keep flowing.
    pub fn pause_socket(&self) { self.command(Command::Pause); }

    /// Resume dispatching after [`RelayClient::pause_socket`], or reconnect
    /// if the connection was lost.
    pub fn resume_socket(&self) { self.command(Command::Resume); }

    /// Tear down the connection and answer every pending send.
    ///
    /// Safe to call any number of times, from any thread.
    pub fn destroy(&self) {
        let driver = self.inner.driver_slot().take();
        self.inner.state.destroy();
        match driver {
            Some(driver) => {
                driver.shutdown.cancel();
                info!("relay client destroyed");
            }
            None => debug!("destroy on a client without a connection driver"),
        }
    }

    /// Whether a connection to the relay is currently held.
    #[must_use]
    pub fn is_prepared(&self) -> bool { self.state().is_prepared() }

    #[must_use]
    pub fn state(&self) -> ConnectionState { self.inner.state.current() }

    /// Watch lifecycle transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> { self.inner.state.subscribe() }

    fn command(&self, command: Command) {
        let slot = self.inner.driver_slot();
        let delivered = slot
            .as_ref()
            .is_some_and(|driver| driver.commands.send(command).is_ok());
        if !delivered {
            debug!(?command, "no running connection driver, command dropped");
        }
    }
}

impl Inner {
    fn driver_slot(&self) -> MutexGuard<'_, Option<DriverHandle>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.driver.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(driver) = slot.take() {
            driver.shutdown.cancel();
        }
    }
}

impl fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayClient")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
